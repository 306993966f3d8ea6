#[macro_use]
extern crate maplit;

use std::time::Duration;

use cql_driver::cluster::session::TcpSessionBuilder;
use cql_driver::cluster::NodeTcpConfigBuilder;
use cql_driver::consistency::Consistency;
use cql_driver::load_balancing::RoundRobinLoadBalancingStrategy;
use cql_driver::speculative_execution::ConstantSpeculativeExecutionPolicy;
use cql_driver::statement::StatementParamsBuilder;
use cql_driver::types::value::Value;

#[tokio::main]
async fn main() {
    let config = NodeTcpConfigBuilder::new()
        .with_contact_point("localhost:9042".into())
        .build()
        .await
        .unwrap();
    let session = TcpSessionBuilder::new(RoundRobinLoadBalancingStrategy::new(), config)
        .with_speculative_execution_policy(Box::new(ConstantSpeculativeExecutionPolicy::new(
            2,
            Duration::from_millis(100),
        )))
        .build()
        .await
        .expect("session error");

    session
        .query(
            "CREATE KEYSPACE IF NOT EXISTS test_ks WITH REPLICATION = { \
             'class' : 'SimpleStrategy', 'replication_factor' : 1 };",
        )
        .await
        .expect("keyspace creation error");
    session
        .query("CREATE TABLE IF NOT EXISTS test_ks.users (id int PRIMARY KEY, name text)")
        .await
        .expect("table creation error");
    session.query("USE test_ks").await.expect("use error");

    let insert = session
        .prepare("INSERT INTO users (id, name) VALUES (?, ?)")
        .await
        .expect("prepare error");

    for id in 0..10 {
        session
            .execute_with_values(&insert, vec![Value::new(id), Value::new(format!("user {id}"))])
            .await
            .expect("insert error");
    }

    // only idempotent statements are executed speculatively
    let params = StatementParamsBuilder::new()
        .with_values(hashmap! { "id" => 3 }.into())
        .with_consistency(Consistency::LocalQuorum)
        .with_timeout(Duration::from_secs(2))
        .idempotent(true)
        .build();

    let response = session
        .query_with_params("SELECT * FROM users WHERE id = :id", params)
        .await
        .expect("select error");

    let rows = response
        .response_body()
        .expect("body error")
        .into_rows()
        .unwrap_or_default();
    for row in rows {
        println!("{:?}", row.get_by_name("name"));
    }
}
