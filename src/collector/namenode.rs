//! HDFS NameNode mapping (namespace `hdfs_namenode`)

use prometheus::{Gauge, GaugeVec, Registry};
use serde::Deserialize;
use tracing::warn;

use super::common::{
    self, BaseMetrics, FieldSpec, OsMetrics, ScalarGroup, MEMORY_BEAN, OPERATING_SYSTEM_BEAN,
};
use super::document::{Bean, BeanDocument};
use super::ServiceCollector;
use crate::error::MappingError;

const NAMESPACE: &str = "hdfs_namenode";

const FSNAMESYSTEM_BEAN: &str = "Hadoop:service=NameNode,name=FSNamesystem";
const JVM_METRICS_BEAN: &str = "Hadoop:service=NameNode,name=JvmMetrics";
const RPC_MODELER_PREFIX: &str = "RpcActivityForPort";

/// Scalars with a bean of their own
const STATUS_FIELDS: &[FieldSpec] = &[FieldSpec {
    bean: "Hadoop:service=NameNode,name=NameNodeStatus",
    attribute: "LastHATransitionTime",
    subsystem: "namenode_status",
    name: "last_ha_transition_time",
    help: "Time of the last HA transition",
}];

pub struct NameNodeCollector;

impl ServiceCollector for NameNodeCollector {
    fn populate(&self, document: &BeanDocument, registry: &Registry) -> Result<(), MappingError> {
        let mut metrics = NameNodeMetrics::new()?;
        for bean in document.beans() {
            if let Err(e) = metrics.visit(bean) {
                warn!(
                    bean = bean.name().unwrap_or("<unnamed>"),
                    error = %e,
                    "Dropping bean from NameNode mapping"
                );
            }
        }
        metrics.register(registry)
    }
}

#[derive(Deserialize)]
struct FsNamesystem {
    #[serde(rename = "MissingBlocks")]
    missing_blocks: f64,
    #[serde(rename = "UnderReplicatedBlocks")]
    under_replicated_blocks: f64,
    #[serde(rename = "CapacityTotal")]
    capacity_total: f64,
    #[serde(rename = "CapacityUsed")]
    capacity_used: f64,
    #[serde(rename = "CapacityRemaining")]
    capacity_remaining: f64,
    #[serde(rename = "CapacityUsedNonDFS")]
    capacity_used_non_dfs: f64,
    #[serde(rename = "BlocksTotal")]
    blocks_total: f64,
    #[serde(rename = "FilesTotal")]
    files_total: f64,
    #[serde(rename = "CorruptBlocks")]
    corrupt_blocks: f64,
    #[serde(rename = "ExcessBlocks")]
    excess_blocks: f64,
    #[serde(rename = "StaleDataNodes")]
    stale_datanodes: f64,
    #[serde(rename = "tag.HAState")]
    ha_state: Option<String>,
}

#[derive(Deserialize)]
struct RpcActivity {
    #[serde(rename = "tag.port")]
    port: String,
    #[serde(rename = "ReceivedBytes")]
    received_bytes: f64,
    #[serde(rename = "SentBytes")]
    sent_bytes: f64,
    #[serde(rename = "RpcQueueTimeNumOps")]
    queue_time_num_ops: f64,
    #[serde(rename = "RpcQueueTimeAvgTime")]
    queue_time_avg_time: f64,
    #[serde(rename = "RpcProcessingTimeAvgTime")]
    processing_time_avg_time: f64,
    #[serde(rename = "NumOpenConnections")]
    open_connections: f64,
    #[serde(rename = "CallQueueLength")]
    call_queue_length: f64,
}

struct NameNodeMetrics {
    base: BaseMetrics,
    os: OsMetrics,
    os_seen: bool,
    missing_blocks: Gauge,
    under_replicated_blocks: Gauge,
    capacity: GaugeVec,
    blocks_total: Gauge,
    files_total: Gauge,
    corrupt_blocks: Gauge,
    excess_blocks: Gauge,
    stale_datanodes: Gauge,
    ha_state: Gauge,
    ha_state_seen: bool,
    status: ScalarGroup,
    rpc_received_bytes: GaugeVec,
    rpc_sent_bytes: GaugeVec,
    rpc_call_count: GaugeVec,
    rpc_avg_time: GaugeVec,
    rpc_open_connections: GaugeVec,
    rpc_call_queue_length: GaugeVec,
}

impl NameNodeMetrics {
    fn new() -> Result<Self, MappingError> {
        let fsname = |name: &str, help: &str| common::gauge(NAMESPACE, "fsname_system", name, help);
        let rpc_vec = |name: &str, help: &str, labels: &[&str]| {
            common::gauge_vec(NAMESPACE, "rpc_activity", name, help, labels)
        };

        Ok(Self {
            base: BaseMetrics::new(NAMESPACE)?,
            os: OsMetrics::new()?,
            os_seen: false,
            missing_blocks: fsname("missing_blocks", "Current number of missing blocks")?,
            under_replicated_blocks: fsname(
                "under_replicated_blocks",
                "Current number of blocks under replicated",
            )?,
            capacity: common::gauge_vec(
                NAMESPACE,
                "fsname_system",
                "capacity_bytes",
                "Current DataNodes capacity in each mode in bytes",
                &["mode"],
            )?,
            blocks_total: fsname(
                "blocks_total",
                "Current number of allocated blocks in the system",
            )?,
            files_total: fsname("files_total", "Current number of files and directories")?,
            corrupt_blocks: fsname(
                "corrupt_blocks",
                "Current number of blocks with corrupt replicas",
            )?,
            excess_blocks: fsname("excess_blocks", "Current number of excess blocks")?,
            stale_datanodes: fsname(
                "stale_datanodes",
                "Current number of DataNodes marked stale due to delayed heartbeat",
            )?,
            ha_state: fsname(
                "hastate",
                "Current HA state: 0 initializing, 1 active, 2 standby, 3 stopping",
            )?,
            ha_state_seen: false,
            status: ScalarGroup::new(NAMESPACE, STATUS_FIELDS)?,
            rpc_received_bytes: rpc_vec(
                "received_bytes",
                "Total number of received bytes",
                &["port"],
            )?,
            rpc_sent_bytes: rpc_vec("sent_bytes", "Total number of sent bytes", &["port"])?,
            rpc_call_count: rpc_vec(
                "call_count",
                "Total number of RPC calls",
                &["port", "method"],
            )?,
            rpc_avg_time: rpc_vec(
                "avg_time_milliseconds",
                "Average RPC time in milliseconds",
                &["port", "method"],
            )?,
            rpc_open_connections: rpc_vec(
                "open_connections_count",
                "Current number of open connections",
                &["port"],
            )?,
            rpc_call_queue_length: rpc_vec(
                "call_queue_length",
                "Current length of the call queue",
                &["port"],
            )?,
        })
    }

    fn visit(&mut self, bean: &Bean) -> Result<(), MappingError> {
        // RPC beans have generated names; they are recognized by modelerType.
        if bean
            .modeler_type()
            .is_some_and(|m| m.starts_with(RPC_MODELER_PREFIX))
        {
            return self.fill_rpc(bean);
        }

        match bean.name() {
            Some(FSNAMESYSTEM_BEAN) => self.fill_fsnamesystem(bean),
            Some(JVM_METRICS_BEAN) => self.base.fill_hadoop_gc(bean),
            Some(MEMORY_BEAN) => self.base.fill_heap(bean),
            Some(OPERATING_SYSTEM_BEAN) => {
                self.os.fill(bean)?;
                self.os_seen = true;
                Ok(())
            }
            _ => self.status.fill(bean).map(|_| ()),
        }
    }

    fn fill_fsnamesystem(&mut self, bean: &Bean) -> Result<(), MappingError> {
        let fs: FsNamesystem = bean.decode()?;

        self.missing_blocks.set(fs.missing_blocks);
        self.under_replicated_blocks.set(fs.under_replicated_blocks);
        self.capacity
            .with_label_values(&["Total"])
            .set(fs.capacity_total);
        self.capacity
            .with_label_values(&["Used"])
            .set(fs.capacity_used);
        self.capacity
            .with_label_values(&["Remaining"])
            .set(fs.capacity_remaining);
        self.capacity
            .with_label_values(&["UsedNonDFS"])
            .set(fs.capacity_used_non_dfs);
        self.blocks_total.set(fs.blocks_total);
        self.files_total.set(fs.files_total);
        self.corrupt_blocks.set(fs.corrupt_blocks);
        self.excess_blocks.set(fs.excess_blocks);
        self.stale_datanodes.set(fs.stale_datanodes);

        if let Some(value) = fs.ha_state.as_deref().and_then(common::ha_state_value) {
            self.ha_state.set(value);
            self.ha_state_seen = true;
        }
        Ok(())
    }

    fn fill_rpc(&self, bean: &Bean) -> Result<(), MappingError> {
        let rpc: RpcActivity = bean.decode()?;
        let port = rpc.port.as_str();

        self.rpc_received_bytes
            .with_label_values(&[port])
            .set(rpc.received_bytes);
        self.rpc_sent_bytes
            .with_label_values(&[port])
            .set(rpc.sent_bytes);
        self.rpc_call_count
            .with_label_values(&[port, "QueueTime"])
            .set(rpc.queue_time_num_ops);
        self.rpc_avg_time
            .with_label_values(&[port, "RpcQueueTime"])
            .set(rpc.queue_time_avg_time);
        self.rpc_avg_time
            .with_label_values(&[port, "RpcProcessingTime"])
            .set(rpc.processing_time_avg_time);
        self.rpc_open_connections
            .with_label_values(&[port])
            .set(rpc.open_connections);
        self.rpc_call_queue_length
            .with_label_values(&[port])
            .set(rpc.call_queue_length);
        Ok(())
    }

    fn register(self, registry: &Registry) -> Result<(), MappingError> {
        self.base.register(registry)?;
        if self.os_seen {
            self.os.register(registry)?;
        }

        for gauge in [
            self.missing_blocks,
            self.under_replicated_blocks,
            self.blocks_total,
            self.files_total,
            self.corrupt_blocks,
            self.excess_blocks,
            self.stale_datanodes,
        ] {
            registry.register(Box::new(gauge))?;
        }
        registry.register(Box::new(self.capacity))?;
        if self.ha_state_seen {
            registry.register(Box::new(self.ha_state))?;
        }
        self.status.register(registry)?;

        for vec in [
            self.rpc_received_bytes,
            self.rpc_sent_bytes,
            self.rpc_call_count,
            self.rpc_avg_time,
            self.rpc_open_connections,
            self.rpc_call_queue_length,
        ] {
            registry.register(Box::new(vec))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gather_names(registry: &Registry) -> Vec<String> {
        registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect()
    }

    fn sample(registry: &Registry, name: &str) -> Option<f64> {
        registry
            .gather()
            .iter()
            .find(|f| f.get_name() == name)
            .map(|f| f.get_metric()[0].get_gauge().get_value())
    }

    const FIXTURE: &str = r#"{"beans": [
        {"name": "Hadoop:service=NameNode,name=FSNamesystem",
         "MissingBlocks": 3, "UnderReplicatedBlocks": 7,
         "CapacityTotal": 1000, "CapacityUsed": 400, "CapacityRemaining": 500,
         "CapacityUsedNonDFS": 100, "BlocksTotal": 12, "FilesTotal": 34,
         "CorruptBlocks": 0, "ExcessBlocks": 1, "StaleDataNodes": 2,
         "tag.HAState": "active"},
        {"name": "Hadoop:service=NameNode,name=NameNodeStatus",
         "LastHATransitionTime": 1700000000},
        {"name": "Hadoop:service=NameNode,name=JvmMetrics",
         "GcCountParNew": 5, "GcCountConcurrentMarkSweep": 2,
         "GcTimeMillisParNew": 120, "GcTimeMillisConcurrentMarkSweep": 80},
        {"name": "Hadoop:service=NameNode,name=RpcActivityForPort8020",
         "modelerType": "RpcActivityForPort8020", "tag.port": "8020",
         "ReceivedBytes": 100, "SentBytes": 200,
         "RpcQueueTimeNumOps": 10, "RpcQueueTimeAvgTime": 1.5,
         "RpcProcessingTimeAvgTime": 2.5, "NumOpenConnections": 4,
         "CallQueueLength": 0},
        {"name": "java.lang:type=Memory",
         "HeapMemoryUsage": {"committed": 10, "init": 5, "max": 100, "used": 42}}
    ]}"#;

    #[test]
    fn test_populate_namenode_fixture() {
        let document = BeanDocument::parse(FIXTURE.as_bytes()).unwrap();
        let registry = Registry::new();
        NameNodeCollector.populate(&document, &registry).unwrap();

        assert_eq!(
            sample(&registry, "hdfs_namenode_fsname_system_missing_blocks"),
            Some(3.0)
        );
        assert_eq!(
            sample(
                &registry,
                "hdfs_namenode_fsname_system_under_replicated_blocks"
            ),
            Some(7.0)
        );
        assert_eq!(
            sample(&registry, "hdfs_namenode_fsname_system_hastate"),
            Some(1.0)
        );
        assert_eq!(
            sample(
                &registry,
                "hdfs_namenode_namenode_status_last_ha_transition_time"
            ),
            Some(1700000000.0)
        );

        let names = gather_names(&registry);
        assert!(names.contains(&"hdfs_namenode_rpc_activity_received_bytes".to_string()));
        assert!(names.contains(&"hdfs_namenode_memory_heap_memory_usage_bytes".to_string()));
        // No OperatingSystem bean in the fixture, so no OS gauges.
        assert!(!names.iter().any(|n| n.starts_with("hadoop_os_")));
    }

    #[test]
    fn test_bad_bean_is_dropped_without_failing_scrape() {
        let body = r#"{"beans": [
            {"name": "Hadoop:service=NameNode,name=FSNamesystem",
             "MissingBlocks": "not a number"},
            {"name": "Hadoop:service=NameNode,name=JvmMetrics",
             "GcCountParNew": 5, "GcCountConcurrentMarkSweep": 2,
             "GcTimeMillisParNew": 120, "GcTimeMillisConcurrentMarkSweep": 80}
        ]}"#;
        let document = BeanDocument::parse(body.as_bytes()).unwrap();
        let registry = Registry::new();
        NameNodeCollector.populate(&document, &registry).unwrap();

        // The broken FSNamesystem bean contributed nothing.
        assert_eq!(
            sample(&registry, "hdfs_namenode_fsname_system_missing_blocks"),
            Some(0.0)
        );
        // The JvmMetrics bean still mapped.
        let gc = registry
            .gather()
            .into_iter()
            .find(|f| f.get_name() == "hdfs_namenode_jvm_metrics_gc_count")
            .unwrap();
        assert_eq!(gc.get_metric().len(), 2);
    }

    #[test]
    fn test_unrecognized_ha_state_leaves_gauge_out() {
        let body = r#"{"beans": [
            {"name": "Hadoop:service=NameNode,name=FSNamesystem",
             "MissingBlocks": 0, "UnderReplicatedBlocks": 0,
             "CapacityTotal": 0, "CapacityUsed": 0, "CapacityRemaining": 0,
             "CapacityUsedNonDFS": 0, "BlocksTotal": 0, "FilesTotal": 0,
             "CorruptBlocks": 0, "ExcessBlocks": 0, "StaleDataNodes": 0,
             "tag.HAState": "rebooting"}
        ]}"#;
        let document = BeanDocument::parse(body.as_bytes()).unwrap();
        let registry = Registry::new();
        NameNodeCollector.populate(&document, &registry).unwrap();

        assert!(!gather_names(&registry)
            .contains(&"hdfs_namenode_fsname_system_hastate".to_string()));
    }
}
