use derivative::Derivative;
use std::marker::PhantomData;
use std::sync::Mutex;

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::cluster::{ClusterMetadata, ConnectionManager};
use crate::load_balancing::{LoadBalancingStrategy, QueryPlan, Request};
use crate::transport::CqlTransport;

/// Pure random load balancing. The strategy owns its random generator, which can be seeded for
/// reproducible plans.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RandomLoadBalancingStrategy<T: CqlTransport, CM: ConnectionManager<T>> {
    #[derivative(Debug = "ignore")]
    rng: Mutex<StdRng>,
    #[derivative(Debug = "ignore")]
    _transport: PhantomData<T>,
    #[derivative(Debug = "ignore")]
    _connection_manager: PhantomData<CM>,
}

impl<T: CqlTransport, CM: ConnectionManager<T>> RandomLoadBalancingStrategy<T, CM> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        RandomLoadBalancingStrategy {
            rng: Mutex::new(rng),
            _transport: Default::default(),
            _connection_manager: Default::default(),
        }
    }
}

impl<T: CqlTransport, CM: ConnectionManager<T>> Default for RandomLoadBalancingStrategy<T, CM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CqlTransport, CM: ConnectionManager<T>> LoadBalancingStrategy<T, CM>
    for RandomLoadBalancingStrategy<T, CM>
{
    fn query_plan(
        &self,
        _request: Option<Request>,
        cluster: &ClusterMetadata<T, CM>,
    ) -> QueryPlan<T, CM> {
        let mut result = cluster.unignored_nodes();

        result.shuffle(&mut *self.rng.lock().unwrap());
        result
    }
}
