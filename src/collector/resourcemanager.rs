//! YARN ResourceManager mapping (namespace `yarn_resourcemanager`)

use prometheus::{GaugeVec, Registry};
use serde::Deserialize;
use tracing::warn;

use super::common::{self, BaseMetrics, MEMORY_BEAN};
use super::document::{Bean, BeanDocument};
use super::ServiceCollector;
use crate::error::MappingError;

const NAMESPACE: &str = "yarn_resourcemanager";

const CLUSTER_METRICS_BEAN: &str = "Hadoop:service=ResourceManager,name=ClusterMetrics";
const QUEUE_METRICS_PREFIX: &str = "Hadoop:service=ResourceManager,name=QueueMetrics";
const JVM_METRICS_BEAN: &str = "Hadoop:service=ResourceManager,name=JvmMetrics";

pub struct ResourceManagerCollector;

impl ServiceCollector for ResourceManagerCollector {
    fn populate(&self, document: &BeanDocument, registry: &Registry) -> Result<(), MappingError> {
        let metrics = ResourceManagerMetrics::new()?;
        for bean in document.beans() {
            if let Err(e) = metrics.visit(bean) {
                warn!(
                    bean = bean.name().unwrap_or("<unnamed>"),
                    error = %e,
                    "Dropping bean from ResourceManager mapping"
                );
            }
        }
        metrics.register(registry)
    }
}

#[derive(Deserialize)]
struct ClusterMetricsBean {
    #[serde(rename = "NumActiveNMs")]
    active: f64,
    // Not exposed by every Hadoop release.
    #[serde(rename = "NumDecommissioningNMs")]
    decommissioning: Option<f64>,
    #[serde(rename = "NumDecommissionedNMs")]
    decommissioned: f64,
    #[serde(rename = "NumLostNMs")]
    lost: f64,
    #[serde(rename = "NumUnhealthyNMs")]
    unhealthy: f64,
    #[serde(rename = "NumRebootedNMs")]
    rebooted: f64,
    #[serde(rename = "NumShutdownNMs")]
    shutdown: f64,
}

#[derive(Deserialize)]
struct QueueMetricsBean {
    #[serde(rename = "tag.Queue")]
    queue: String,
    #[serde(rename = "AppsSubmitted")]
    submitted: f64,
    #[serde(rename = "AppsRunning")]
    running: f64,
    #[serde(rename = "AppsPending")]
    pending: f64,
    #[serde(rename = "AppsCompleted")]
    completed: f64,
    #[serde(rename = "AppsKilled")]
    killed: f64,
    #[serde(rename = "AppsFailed")]
    failed: f64,
}

struct ResourceManagerMetrics {
    base: BaseMetrics,
    nodemanager_nums: GaugeVec,
    apps_count: GaugeVec,
}

impl ResourceManagerMetrics {
    fn new() -> Result<Self, MappingError> {
        Ok(Self {
            base: BaseMetrics::new(NAMESPACE)?,
            nodemanager_nums: common::gauge_vec(
                NAMESPACE,
                "cluster_metrics",
                "nodemanager_nums",
                "Current number of NodeManagers in each state",
                &["state"],
            )?,
            apps_count: common::gauge_vec(
                NAMESPACE,
                "queue_metrics",
                "apps_count",
                "Applications count of each state",
                &["queue", "state"],
            )?,
        })
    }

    fn visit(&self, bean: &Bean) -> Result<(), MappingError> {
        match bean.name() {
            Some(CLUSTER_METRICS_BEAN) => self.fill_cluster(bean),
            Some(name) if name.starts_with(QUEUE_METRICS_PREFIX) => self.fill_queue(bean),
            Some(JVM_METRICS_BEAN) => self.base.fill_hadoop_gc(bean),
            Some(MEMORY_BEAN) => self.base.fill_heap(bean),
            _ => Ok(()),
        }
    }

    fn fill_cluster(&self, bean: &Bean) -> Result<(), MappingError> {
        let cluster: ClusterMetricsBean = bean.decode()?;
        let nums = &self.nodemanager_nums;

        nums.with_label_values(&["active"]).set(cluster.active);
        if let Some(decommissioning) = cluster.decommissioning {
            nums.with_label_values(&["decommissioning"])
                .set(decommissioning);
        }
        nums.with_label_values(&["decommissioned"])
            .set(cluster.decommissioned);
        nums.with_label_values(&["lost"]).set(cluster.lost);
        nums.with_label_values(&["unhealthy"]).set(cluster.unhealthy);
        nums.with_label_values(&["rebooted"]).set(cluster.rebooted);
        nums.with_label_values(&["shutdown"]).set(cluster.shutdown);
        Ok(())
    }

    fn fill_queue(&self, bean: &Bean) -> Result<(), MappingError> {
        let metrics: QueueMetricsBean = bean.decode()?;
        let queue = metrics.queue.as_str();

        for (state, value) in [
            ("submitted", metrics.submitted),
            ("running", metrics.running),
            ("pending", metrics.pending),
            ("completed", metrics.completed),
            ("killed", metrics.killed),
            ("failed", metrics.failed),
        ] {
            self.apps_count.with_label_values(&[queue, state]).set(value);
        }
        Ok(())
    }

    fn register(self, registry: &Registry) -> Result<(), MappingError> {
        self.base.register(registry)?;
        registry.register(Box::new(self.nodemanager_nums))?;
        registry.register(Box::new(self.apps_count))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate_resourcemanager_fixture() {
        let body = r#"{"beans": [
            {"name": "Hadoop:service=ResourceManager,name=ClusterMetrics",
             "NumActiveNMs": 10, "NumDecommissionedNMs": 1, "NumLostNMs": 0,
             "NumUnhealthyNMs": 2, "NumRebootedNMs": 0, "NumShutdownNMs": 3},
            {"name": "Hadoop:service=ResourceManager,name=QueueMetrics,q0=root,q1=default",
             "tag.Queue": "root.default",
             "AppsSubmitted": 100, "AppsRunning": 5, "AppsPending": 2,
             "AppsCompleted": 90, "AppsKilled": 1, "AppsFailed": 2}
        ]}"#;
        let document = BeanDocument::parse(body.as_bytes()).unwrap();
        let registry = Registry::new();
        ResourceManagerCollector
            .populate(&document, &registry)
            .unwrap();

        let families = registry.gather();
        let nums = families
            .iter()
            .find(|f| f.get_name() == "yarn_resourcemanager_cluster_metrics_nodemanager_nums")
            .unwrap();
        // Six states filled; decommissioning is absent from this dump.
        assert_eq!(nums.get_metric().len(), 6);

        let apps = families
            .iter()
            .find(|f| f.get_name() == "yarn_resourcemanager_queue_metrics_apps_count")
            .unwrap();
        assert_eq!(apps.get_metric().len(), 6);
        let running = apps
            .get_metric()
            .iter()
            .find(|m| {
                m.get_label()
                    .iter()
                    .any(|l| l.get_name() == "state" && l.get_value() == "running")
            })
            .unwrap();
        assert_eq!(running.get_gauge().get_value(), 5.0);
        assert!(running
            .get_label()
            .iter()
            .any(|l| l.get_name() == "queue" && l.get_value() == "root.default"));
    }

    #[test]
    fn test_queue_bean_without_tag_is_dropped() {
        let body = r#"{"beans": [
            {"name": "Hadoop:service=ResourceManager,name=QueueMetrics,q0=root",
             "AppsSubmitted": 100, "AppsRunning": 5, "AppsPending": 2,
             "AppsCompleted": 90, "AppsKilled": 1, "AppsFailed": 2}
        ]}"#;
        let document = BeanDocument::parse(body.as_bytes()).unwrap();
        let registry = Registry::new();
        ResourceManagerCollector
            .populate(&document, &registry)
            .unwrap();

        let families = registry.gather();
        let apps = families
            .iter()
            .find(|f| f.get_name() == "yarn_resourcemanager_queue_metrics_apps_count");
        assert!(apps.map_or(true, |f| f.get_metric().is_empty()));
    }
}
