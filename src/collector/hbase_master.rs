//! HBase Master mapping (namespace `hbase_master`)

use prometheus::Registry;
use tracing::warn;

use super::common::{
    BaseMetrics, OsMetrics, GC_CMS_BEAN, GC_PARNEW_BEAN, MEMORY_BEAN, OPERATING_SYSTEM_BEAN,
};
use super::document::{Bean, BeanDocument};
use super::ServiceCollector;
use crate::error::MappingError;

const NAMESPACE: &str = "hbase_master";

pub struct HbaseMasterCollector;

impl ServiceCollector for HbaseMasterCollector {
    fn populate(&self, document: &BeanDocument, registry: &Registry) -> Result<(), MappingError> {
        let mut metrics = HbaseMasterMetrics::new()?;
        for bean in document.beans() {
            if let Err(e) = metrics.visit(bean) {
                warn!(
                    bean = bean.name().unwrap_or("<unnamed>"),
                    error = %e,
                    "Dropping bean from HBase Master mapping"
                );
            }
        }
        metrics.register(registry)
    }
}

struct HbaseMasterMetrics {
    base: BaseMetrics,
    os: OsMetrics,
    os_seen: bool,
}

impl HbaseMasterMetrics {
    fn new() -> Result<Self, MappingError> {
        Ok(Self {
            base: BaseMetrics::new(NAMESPACE)?,
            os: OsMetrics::new()?,
            os_seen: false,
        })
    }

    fn visit(&mut self, bean: &Bean) -> Result<(), MappingError> {
        match bean.name() {
            Some(GC_PARNEW_BEAN) => self.base.fill_gc_collector("ParNew", bean),
            Some(GC_CMS_BEAN) => self.base.fill_gc_collector("ConcurrentMarkSweep", bean),
            Some(MEMORY_BEAN) => self.base.fill_heap(bean),
            Some(OPERATING_SYSTEM_BEAN) => {
                self.os.fill(bean)?;
                self.os_seen = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn register(self, registry: &Registry) -> Result<(), MappingError> {
        self.base.register(registry)?;
        if self.os_seen {
            self.os.register(registry)?;
        }
        Ok(())
    }
}
