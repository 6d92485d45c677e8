//! HBase RegionServer mapping (namespace `hbase_regionserver`)
//!
//! RegionServers report GC totals as plain scalars on the HBase
//! JvmMetrics bean, so this mapping uses unlabeled gc gauges instead of
//! the per-type vectors of the other services.

use prometheus::{Gauge, GaugeVec, Registry};
use tracing::warn;

use super::common::{self, OsMetrics, MEMORY_BEAN, OPERATING_SYSTEM_BEAN};
use super::document::{Bean, BeanDocument};
use super::ServiceCollector;
use crate::error::MappingError;

const NAMESPACE: &str = "hbase_regionserver";

const JVM_METRICS_BEAN: &str = "Hadoop:service=HBase,name=JvmMetrics";

pub struct HbaseRegionServerCollector;

impl ServiceCollector for HbaseRegionServerCollector {
    fn populate(&self, document: &BeanDocument, registry: &Registry) -> Result<(), MappingError> {
        let mut metrics = HbaseRegionServerMetrics::new()?;
        for bean in document.beans() {
            if let Err(e) = metrics.visit(bean) {
                warn!(
                    bean = bean.name().unwrap_or("<unnamed>"),
                    error = %e,
                    "Dropping bean from HBase RegionServer mapping"
                );
            }
        }
        metrics.register(registry)
    }
}

struct HbaseRegionServerMetrics {
    heap_memory_usage: GaugeVec,
    gc_count: Gauge,
    gc_time: Gauge,
    os: OsMetrics,
    os_seen: bool,
}

impl HbaseRegionServerMetrics {
    fn new() -> Result<Self, MappingError> {
        Ok(Self {
            heap_memory_usage: common::heap_memory_vec(NAMESPACE)?,
            gc_count: common::gauge(NAMESPACE, "jvm_metrics", "gc_count", "Total GC count")?,
            gc_time: common::gauge(
                NAMESPACE,
                "jvm_metrics",
                "gc_time_milliseconds",
                "Total GC time in milliseconds",
            )?,
            os: OsMetrics::new()?,
            os_seen: false,
        })
    }

    fn visit(&mut self, bean: &Bean) -> Result<(), MappingError> {
        match bean.name() {
            Some(MEMORY_BEAN) => common::fill_heap_vec(&self.heap_memory_usage, bean),
            Some(JVM_METRICS_BEAN) => {
                // Read both before setting either.
                let count = bean.number("GcCount")?;
                let time = bean.number("GcTimeMillis")?;
                self.gc_count.set(count);
                self.gc_time.set(time);
                Ok(())
            }
            Some(OPERATING_SYSTEM_BEAN) => {
                self.os.fill(bean)?;
                self.os_seen = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn register(self, registry: &Registry) -> Result<(), MappingError> {
        registry.register(Box::new(self.heap_memory_usage))?;
        registry.register(Box::new(self.gc_count))?;
        registry.register(Box::new(self.gc_time))?;
        if self.os_seen {
            self.os.register(registry)?;
        }
        Ok(())
    }
}
