//! HiveServer2 mapping (namespace `hive_hiveserver2`)
//!
//! HiveServer2 publishes codahale-style meter beans named
//! `metrics:name=<meter>`, each carrying a single `Count` or `Value`
//! attribute. The simple meters live in one declarative field table;
//! the per-operation-state families are matched by bean name prefix
//! with the lowercased last `_` segment as the `state` label.

use prometheus::{GaugeVec, Registry};
use tracing::warn;

use super::common::{self, FieldSpec, ScalarGroup, MEMORY_BEAN};
use super::document::{Bean, BeanDocument};
use super::ServiceCollector;
use crate::error::MappingError;

const NAMESPACE: &str = "hive_hiveserver2";
const SUBSYSTEM: &str = "metrics";

/// Single-valued meter beans
const METER_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        bean: "metrics:name=jvm.pause.extraSleepTime",
        attribute: "Count",
        subsystem: "jvm",
        name: "pause_extra_sleep_time_count_milliseconds",
        help: "Extra sleep time accumulated by the JVM pause monitor in milliseconds",
    },
    FieldSpec {
        bean: "metrics:name=open_connections",
        attribute: "Count",
        subsystem: SUBSYSTEM,
        name: "open_connections_count",
        help: "Current number of open connections",
    },
    FieldSpec {
        bean: "metrics:name=open_operations",
        attribute: "Count",
        subsystem: SUBSYSTEM,
        name: "open_operations_count",
        help: "Current number of open operations",
    },
    FieldSpec {
        bean: "cumulative_connection_count",
        attribute: "Count",
        subsystem: SUBSYSTEM,
        name: "cumulative_connection_count",
        help: "Total number of connections made so far",
    },
    FieldSpec {
        bean: "metrics:name=metastore_hive_locks",
        attribute: "Count",
        subsystem: SUBSYSTEM,
        name: "metastore_hive_locks",
        help: "Current number of metastore locks held",
    },
    FieldSpec {
        bean: "metrics:name=exec_async_queue_size",
        attribute: "Value",
        subsystem: SUBSYSTEM,
        name: "exec_async_queue_size",
        help: "Current size of the async operation queue",
    },
    FieldSpec {
        bean: "metrics:name=exec_async_pool_size",
        attribute: "Value",
        subsystem: SUBSYSTEM,
        name: "exec_async_pool_size",
        help: "Current size of the async operation pool",
    },
    FieldSpec {
        bean: "metrics:name=waiting_compile_ops",
        attribute: "Count",
        subsystem: SUBSYSTEM,
        name: "waiting_compile_ops",
        help: "Current number of operations waiting to compile",
    },
    FieldSpec {
        bean: "metrics:name=hive_tez_tasks",
        attribute: "Count",
        subsystem: SUBSYSTEM,
        name: "hive_tez_tasks",
        help: "Total number of Hive on Tez tasks submitted",
    },
];

/// Bean name prefixes whose suffix encodes an operation state
const STATE_FAMILIES: &[(&str, &str, &str)] = &[
    (
        "metrics:name=active_calls_api_hs2_sql_operation_",
        "active_calls_api_hs2_sql_operation",
        "Active SQL operation API calls in each state",
    ),
    (
        "metrics:name=active_calls_api_hs2_operation_",
        "active_calls_api_hs2_operation",
        "Active operation API calls in each state",
    ),
    (
        "metrics:name=api_hs2_sql_operation_",
        "api_hs2_sql_operation",
        "SQL operation API calls in each state",
    ),
    (
        "metrics:name=hs2_completed_sql_operation_",
        "hs2_completed_sql_operation",
        "Completed SQL operations in each state",
    ),
    (
        "metrics:name=hs2_completed_operation_",
        "hs2_completed_operation",
        "Completed operations in each state",
    ),
];

pub struct HiveServer2Collector;

impl ServiceCollector for HiveServer2Collector {
    fn populate(&self, document: &BeanDocument, registry: &Registry) -> Result<(), MappingError> {
        let metrics = HiveServer2Metrics::new()?;
        for bean in document.beans() {
            if let Err(e) = metrics.visit(bean) {
                warn!(
                    bean = bean.name().unwrap_or("<unnamed>"),
                    error = %e,
                    "Dropping bean from HiveServer2 mapping"
                );
            }
        }
        metrics.register(registry)
    }
}

struct HiveServer2Metrics {
    heap_memory_usage: GaugeVec,
    meters: ScalarGroup,
    state_families: Vec<(&'static str, GaugeVec)>,
}

impl HiveServer2Metrics {
    fn new() -> Result<Self, MappingError> {
        let mut state_families = Vec::with_capacity(STATE_FAMILIES.len());
        for (prefix, name, help) in STATE_FAMILIES {
            state_families.push((
                *prefix,
                common::gauge_vec(NAMESPACE, SUBSYSTEM, name, help, &["state"])?,
            ));
        }

        Ok(Self {
            heap_memory_usage: common::heap_memory_vec(NAMESPACE)?,
            meters: ScalarGroup::new(NAMESPACE, METER_FIELDS)?,
            state_families,
        })
    }

    fn visit(&self, bean: &Bean) -> Result<(), MappingError> {
        let Some(name) = bean.name() else {
            return Ok(());
        };

        if name == MEMORY_BEAN {
            return common::fill_heap_vec(&self.heap_memory_usage, bean);
        }

        if self.meters.fill(bean)? {
            return Ok(());
        }

        // Longest prefixes are listed first, so the first match is exact.
        for (prefix, family) in &self.state_families {
            if let Some(suffix) = name.strip_prefix(prefix) {
                let state = suffix
                    .rsplit('_')
                    .next()
                    .unwrap_or(suffix)
                    .to_lowercase();
                family
                    .with_label_values(&[&state])
                    .set(bean.number("Count")?);
                return Ok(());
            }
        }
        Ok(())
    }

    fn register(self, registry: &Registry) -> Result<(), MappingError> {
        registry.register(Box::new(self.heap_memory_usage))?;
        self.meters.register(registry)?;
        for (_, family) in self.state_families {
            registry.register(Box::new(family))?;
        }
        Ok(())
    }
}
