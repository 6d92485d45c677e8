//! Service metric mappings
//!
//! One module per supported service. Each mapping scans the parsed bean
//! document, fills its curated gauge set and registers everything into
//! the per-request registry handed to it.

pub mod common;
pub mod document;

mod datanode;
mod hbase_master;
mod hbase_regionserver;
mod hiveserver2;
mod journalnode;
mod namenode;
mod nodemanager;
mod resourcemanager;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use prometheus::Registry;

pub use common::{BaseMetrics, FieldSpec, OsMetrics, ScalarGroup};
pub use document::{Bean, BeanDocument};

use crate::error::MappingError;
use crate::resolver::ServiceKind;

/// A stateless mapping from one service's bean document to gauges
///
/// Implementations build fresh gauges per call; nothing is shared
/// between scrapes.
pub trait ServiceCollector: Send + Sync {
    /// Scan `document` and register this service's gauges into `registry`
    ///
    /// A bean with a missing or mistyped field only drops that bean's
    /// contribution; the error returned here is reserved for failures
    /// that invalidate the whole mapping (gauge registration).
    fn populate(&self, document: &BeanDocument, registry: &Registry) -> Result<(), MappingError>;
}

/// Process-wide mapping table, read-only after initialization
static COLLECTORS: Lazy<HashMap<ServiceKind, Box<dyn ServiceCollector>>> = Lazy::new(|| {
    let mut table: HashMap<ServiceKind, Box<dyn ServiceCollector>> = HashMap::new();
    table.insert(ServiceKind::NameNode, Box::new(namenode::NameNodeCollector));
    table.insert(ServiceKind::DataNode, Box::new(datanode::DataNodeCollector));
    table.insert(
        ServiceKind::ResourceManager,
        Box::new(resourcemanager::ResourceManagerCollector),
    );
    table.insert(
        ServiceKind::JournalNode,
        Box::new(journalnode::JournalNodeCollector),
    );
    table.insert(
        ServiceKind::HiveServer2,
        Box::new(hiveserver2::HiveServer2Collector),
    );
    table.insert(
        ServiceKind::NodeManager,
        Box::new(nodemanager::NodeManagerCollector),
    );
    table.insert(
        ServiceKind::HbaseMaster,
        Box::new(hbase_master::HbaseMasterCollector),
    );
    table.insert(
        ServiceKind::HbaseRegionServer,
        Box::new(hbase_regionserver::HbaseRegionServerCollector),
    );
    table
});

/// Look up the mapping for a resolved service
pub fn lookup(kind: ServiceKind) -> Option<&'static dyn ServiceCollector> {
    COLLECTORS.get(&kind).map(|collector| collector.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_service_has_a_mapping() {
        for kind in [
            ServiceKind::NameNode,
            ServiceKind::DataNode,
            ServiceKind::ResourceManager,
            ServiceKind::JournalNode,
            ServiceKind::HiveServer2,
            ServiceKind::NodeManager,
            ServiceKind::HbaseMaster,
            ServiceKind::HbaseRegionServer,
        ] {
            assert!(lookup(kind).is_some(), "missing mapping for {kind:?}");
        }
    }
}
