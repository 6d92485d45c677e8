//! YARN NodeManager mapping (namespace `yarn_nodemanager`)

use prometheus::Registry;
use tracing::warn;

use super::common::{BaseMetrics, GC_CMS_BEAN, GC_PARNEW_BEAN, MEMORY_BEAN};
use super::document::{Bean, BeanDocument};
use super::ServiceCollector;
use crate::error::MappingError;

const NAMESPACE: &str = "yarn_nodemanager";

pub struct NodeManagerCollector;

impl ServiceCollector for NodeManagerCollector {
    fn populate(&self, document: &BeanDocument, registry: &Registry) -> Result<(), MappingError> {
        let base = BaseMetrics::new(NAMESPACE)?;
        for bean in document.beans() {
            if let Err(e) = visit(&base, bean) {
                warn!(
                    bean = bean.name().unwrap_or("<unnamed>"),
                    error = %e,
                    "Dropping bean from NodeManager mapping"
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
