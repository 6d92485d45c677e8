//! HDFS DataNode mapping (namespace `hdfs_datanode`)

use prometheus::{Gauge, GaugeVec, Registry};
use serde::Deserialize;
use tracing::warn;

use super::common::{self, BaseMetrics, MEMORY_BEAN};
use super::document::{Bean, BeanDocument};
use super::ServiceCollector;
use crate::error::MappingError;

const NAMESPACE: &str = "hdfs_datanode";
const SUBSYSTEM: &str = "fs_dataset_state";

const FSDATASET_BEAN: &str = "Hadoop:service=DataNode,name=FSDatasetState";
const JVM_METRICS_BEAN: &str = "Hadoop:service=DataNode,name=JvmMetrics";

pub struct DataNodeCollector;

impl ServiceCollector for DataNodeCollector {
    fn populate(&self, document: &BeanDocument, registry: &Registry) -> Result<(), MappingError> {
        let metrics = DataNodeMetrics::new()?;
        for bean in document.beans() {
            if let Err(e) = metrics.visit(bean) {
                warn!(
                    bean = bean.name().unwrap_or("<unnamed>"),
                    error = %e,
                    "Dropping bean from DataNode mapping"
                );
            }
        }
        metrics.register(registry)
    }
}

#[derive(Deserialize)]
struct FsDatasetState {
    #[serde(rename = "Capacity")]
    capacity: f64,
    #[serde(rename = "DfsUsed")]
    dfs_used: f64,
    #[serde(rename = "Remaining")]
    remaining: f64,
    #[serde(rename = "CacheCapacity")]
    cache_capacity: f64,
    #[serde(rename = "CacheUsed")]
    cache_used: f64,
    #[serde(rename = "NumFailedVolumes")]
    failed_volumes: f64,
    #[serde(rename = "EstimatedCapacityLostTotal")]
    estimated_capacity_lost: f64,
    #[serde(rename = "NumBlocksCached")]
    blocks_cached: f64,
    #[serde(rename = "NumBlocksFailedToCache")]
    blocks_failed_to_cache: f64,
    #[serde(rename = "NumBlocksFailedToUncache")]
    blocks_failed_to_uncache: f64,
}

struct DataNodeMetrics {
    base: BaseMetrics,
    capacity: GaugeVec,
    cache_capacity: Gauge,
    cache_used: Gauge,
    failed_volumes: Gauge,
    estimated_capacity_lost: Gauge,
    blocks_cached: Gauge,
    blocks_failed_to_cache: Gauge,
    blocks_failed_to_uncache: Gauge,
}

impl DataNodeMetrics {
    fn new() -> Result<Self, MappingError> {
        let dataset = |name: &str, help: &str| common::gauge(NAMESPACE, SUBSYSTEM, name, help);

        Ok(Self {
            base: BaseMetrics::new(NAMESPACE)?,
            capacity: common::gauge_vec(
                NAMESPACE,
                SUBSYSTEM,
                "capacity_bytes",
                "Current DataNode capacity in each mode in bytes",
                &["mode"],
            )?,
            cache_capacity: dataset("cache_capacity_bytes", "Total cache capacity in bytes")?,
            cache_used: dataset("cache_used_bytes", "Cache space used in bytes")?,
            failed_volumes: dataset("failed_volumes", "Number of failed volumes")?,
            estimated_capacity_lost: dataset(
                "estimated_capacity_lost_bytes",
                "Estimated capacity lost to failed volumes in bytes",
            )?,
            blocks_cached: dataset("blocks_cached", "Number of blocks cached")?,
            blocks_failed_to_cache: dataset(
                "blocks_failed_to_cache",
                "Number of blocks that failed to cache",
            )?,
            blocks_failed_to_uncache: dataset(
                "blocks_failed_to_uncache",
                "Number of blocks that failed to uncache",
            )?,
        })
    }

    fn visit(&self, bean: &Bean) -> Result<(), MappingError> {
        match bean.name() {
            Some(FSDATASET_BEAN) => self.fill_dataset(bean),
            Some(JVM_METRICS_BEAN) => self.base.fill_hadoop_gc(bean),
            Some(MEMORY_BEAN) => self.base.fill_heap(bean),
            _ => Ok(()),
        }
    }

    fn fill_dataset(&self, bean: &Bean) -> Result<(), MappingError> {
        let state: FsDatasetState = bean.decode()?;

        self.capacity
            .with_label_values(&["Total"])
            .set(state.capacity);
        self.capacity
            .with_label_values(&["DfsUsed"])
            .set(state.dfs_used);
        self.capacity
            .with_label_values(&["Remaining"])
            .set(state.remaining);

        self.cache_capacity.set(state.cache_capacity);
        self.cache_used.set(state.cache_used);
        self.failed_volumes.set(state.failed_volumes);
        self.estimated_capacity_lost
            .set(state.estimated_capacity_lost);
        self.blocks_cached.set(state.blocks_cached);
        self.blocks_failed_to_cache.set(state.blocks_failed_to_cache);
        self.blocks_failed_to_uncache
            .set(state.blocks_failed_to_uncache);
        Ok(())
    }

    fn register(self, registry: &Registry) -> Result<(), MappingError> {
        self.base.register(registry)?;
        registry.register(Box::new(self.capacity))?;
        for gauge in [
            self.cache_capacity,
            self.cache_used,
            self.failed_volumes,
            self.estimated_capacity_lost,
            self.blocks_cached,
            self.blocks_failed_to_cache,
            self.blocks_failed_to_uncache,
        ] {
            registry.register(Box::new(gauge))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate_datanode_fixture() {
        let body = r#"{"beans": [
            {"name": "Hadoop:service=DataNode,name=FSDatasetState",
             "Capacity": 1000, "DfsUsed": 300, "Remaining": 700,
             "CacheCapacity": 64, "CacheUsed": 16,
             "NumFailedVolumes": 1, "EstimatedCapacityLostTotal": 50,
             "NumBlocksCached": 8, "NumBlocksFailedToCache": 2,
             "NumBlocksFailedToUncache": 0},
            {"name": "java.lang:type=Memory",
             "HeapMemoryUsage": {"committed": 1, "init": 2, "max": 3, "used": 4}}
        ]}"#;
        let document = BeanDocument::parse(body.as_bytes()).unwrap();
        let registry = Registry::new();
        DataNodeCollector.populate(&document, &registry).unwrap();

        let families = registry.gather();
        let used = families
            .iter()
            .find(|f| f.get_name() == "hdfs_datanode_fs_dataset_state_cache_used_bytes")
            .unwrap();
        assert_eq!(used.get_metric()[0].get_gauge().get_value(), 16.0);

        let capacity = families
            .iter()
            .find(|f| f.get_name() == "hdfs_datanode_fs_dataset_state_capacity_bytes")
            .unwrap();
        assert_eq!(capacity.get_metric().len(), 3);
    }

    #[test]
    fn test_incomplete_dataset_bean_contributes_nothing() {
        let body = r#"{"beans": [
            {"name": "Hadoop:service=DataNode,name=FSDatasetState", "Capacity": 1000}
        ]}"#;
        let document = BeanDocument::parse(body.as_bytes()).unwrap();
        let registry = Registry::new();
        DataNodeCollector.populate(&document, &registry).unwrap();

        // Typed decode failed before any label child was created.
        let families = registry.gather();
        let capacity = families
            .iter()
            .find(|f| f.get_name() == "hdfs_datanode_fs_dataset_state_capacity_bytes");
        assert!(capacity.map_or(true, |f| f.get_metric().is_empty()));
    }
}
