//! HDFS JournalNode mapping (namespace `hdfs_journalnode`)

use prometheus::Registry;
use tracing::warn;

use super::common::{BaseMetrics, GC_CMS_BEAN, GC_PARNEW_BEAN, MEMORY_BEAN};
use super::document::{Bean, BeanDocument};
use super::ServiceCollector;
use crate::error::MappingError;

const NAMESPACE: &str = "hdfs_journalnode";

pub struct JournalNodeCollector;

impl ServiceCollector for JournalNodeCollector {
    fn populate(&self, document: &BeanDocument, registry: &Registry) -> Result<(), MappingError> {
        let base = BaseMetrics::new(NAMESPACE)?;
        for bean in document.beans() {
            if let Err(e) = visit(&base, bean) {
                warn!(
                    bean = bean.name().unwrap_or("<unnamed>"),
                    error = %e,
                    "Dropping bean from JournalNode mapping"
                );
            }
        }
        base.register(registry)
    }
}

fn visit(base: &BaseMetrics, bean: &Bean) -> Result<(), MappingError> {
    match bean.name() {
        Some(GC_PARNEW_BEAN) => base.fill_gc_collector("ParNew", bean),
        Some(GC_CMS_BEAN) => base.fill_gc_collector("ConcurrentMarkSweep", bean),
        Some(MEMORY_BEAN) => base.fill_heap(bean),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate_journalnode_fixture() {
        let body = r#"{"beans": [
            {"name": "java.lang:type=GarbageCollector,name=ParNew",
             "CollectionCount": 11, "CollectionTime": 230},
            {"name": "java.lang:type=GarbageCollector,name=ConcurrentMarkSweep",
             "CollectionCount": 2, "CollectionTime": 45},
            {"name": "java.lang:type=Memory",
             "HeapMemoryUsage": {"committed": 1, "init": 2, "max": 3, "used": 4}}
        ]}"#;
        let document = BeanDocument::parse(body.as_bytes()).unwrap();
        let registry = Registry::new();
        JournalNodeCollector.populate(&document, &registry).unwrap();

        let families = registry.gather();
        let gc_count = families
            .iter()
            .find(|f| f.get_name() == "hdfs_journalnode_jvm_metrics_gc_count")
            .unwrap();
        assert_eq!(gc_count.get_metric().len(), 2);
    }
}
