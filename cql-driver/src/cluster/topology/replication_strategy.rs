use fxhash::FxHashMap;

/// A replication strategy determines the nodes where replicas are placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationStrategy {
    SimpleStrategy {
        replication_factor: usize,
    },
    NetworkTopologyStrategy {
        datacenter_replication_factor: FxHashMap<String, usize>,
    },
    /// A strategy unknown to the driver, with its raw options.
    Other {
        class: String,
        options: FxHashMap<String, String>,
    },
}
