use std::sync::Arc;

use cql_driver::authenticators::NoneAuthenticatorProvider;
use cql_driver::cluster::session::TcpSessionBuilder;
use cql_driver::cluster::NodeTcpConfigBuilder;
use cql_driver::events::TopologyEvent;
use cql_driver::load_balancing::{DcAwareLoadBalancingStrategy, TopologyAwareNodeDistanceEvaluator};

#[tokio::main]
async fn main() {
    let config = NodeTcpConfigBuilder::new()
        .with_contact_point("127.0.0.1:9042".into())
        .with_authenticator_provider(Arc::new(NoneAuthenticatorProvider))
        .build()
        .await
        .unwrap();

    // at most 2 nodes from every remote datacenter can be used as a fallback
    let session = TcpSessionBuilder::new(DcAwareLoadBalancingStrategy::new(Some(2), false), config)
        .with_node_distance_evaluator(Box::new(TopologyAwareNodeDistanceEvaluator::new(
            "datacenter1".into(),
        )))
        .build()
        .await
        .expect("session error");

    for node in session.cluster_metadata().nodes().values() {
        println!(
            "node {} in {}/{} is {:?}",
            node.broadcast_rpc_address(),
            node.datacenter(),
            node.rack(),
            node.distance()
        );
    }

    let mut events = session.subscribe_topology_changes();

    println!("Start listening for topology changes");

    while let Ok(event) = events.recv().await {
        match event {
            TopologyEvent::NodeDown(addr) => println!("lost node {addr}"),
            event => println!("{event}"),
        }
    }
}
