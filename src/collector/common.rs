//! Shared sub-mappings and gauge plumbing
//!
//! The pieces every service mapping composes: JVM heap and GC gauges,
//! operating system gauges, and the declarative scalar field table.

use prometheus::{Gauge, GaugeVec, Opts, Registry};
use serde::Deserialize;

use super::document::Bean;
use crate::error::MappingError;

/// `java.lang:type=Memory` bean name
pub const MEMORY_BEAN: &str = "java.lang:type=Memory";
/// `java.lang:type=OperatingSystem` bean name
pub const OPERATING_SYSTEM_BEAN: &str = "java.lang:type=OperatingSystem";
/// ParNew garbage collector bean name
pub const GC_PARNEW_BEAN: &str = "java.lang:type=GarbageCollector,name=ParNew";
/// CMS garbage collector bean name
pub const GC_CMS_BEAN: &str = "java.lang:type=GarbageCollector,name=ConcurrentMarkSweep";

/// Build a namespaced gauge
pub(crate) fn gauge(
    namespace: &str,
    subsystem: &str,
    name: &str,
    help: &str,
) -> Result<Gauge, MappingError> {
    Ok(Gauge::with_opts(
        Opts::new(name, help).namespace(namespace).subsystem(subsystem),
    )?)
}

/// Build a namespaced gauge vector
pub(crate) fn gauge_vec(
    namespace: &str,
    subsystem: &str,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, MappingError> {
    Ok(GaugeVec::new(
        Opts::new(name, help).namespace(namespace).subsystem(subsystem),
        labels,
    )?)
}

/// Heap usage gauge vector labeled by mode (committed/init/max/used)
pub(crate) fn heap_memory_vec(namespace: &str) -> Result<GaugeVec, MappingError> {
    gauge_vec(
        namespace,
        "memory",
        "heap_memory_usage_bytes",
        "Current heap memory of each mode in bytes",
        &["mode"],
    )
}

#[derive(Deserialize)]
struct MemoryBean {
    #[serde(rename = "HeapMemoryUsage")]
    heap: HeapUsage,
}

#[derive(Deserialize)]
struct HeapUsage {
    committed: f64,
    init: f64,
    max: f64,
    used: f64,
}

/// Fill a heap vector from the `java.lang:type=Memory` bean
pub(crate) fn fill_heap_vec(vec: &GaugeVec, bean: &Bean) -> Result<(), MappingError> {
    let memory: MemoryBean = bean.decode()?;
    for (mode, value) in [
        ("committed", memory.heap.committed),
        ("init", memory.heap.init),
        ("max", memory.heap.max),
        ("used", memory.heap.used),
    ] {
        vec.with_label_values(&[mode]).set(value);
    }
    Ok(())
}

/// JVM gauges common to every service mapping
///
/// GC gauges are filled either from the Hadoop `JvmMetrics` bean or from
/// the `java.lang` GarbageCollector beans, depending on what the service
/// exposes.
pub struct BaseMetrics {
    pub heap_memory_usage: GaugeVec,
    pub gc_count: GaugeVec,
    pub gc_time: GaugeVec,
}

#[derive(Deserialize)]
struct JvmMetricsBean {
    #[serde(rename = "GcCountParNew")]
    gc_count_par_new: f64,
    #[serde(rename = "GcCountConcurrentMarkSweep")]
    gc_count_cms: f64,
    #[serde(rename = "GcTimeMillisParNew")]
    gc_time_par_new: f64,
    #[serde(rename = "GcTimeMillisConcurrentMarkSweep")]
    gc_time_cms: f64,
}

#[derive(Deserialize)]
struct GarbageCollectorBean {
    #[serde(rename = "CollectionCount")]
    collection_count: f64,
    #[serde(rename = "CollectionTime")]
    collection_time: f64,
}

impl BaseMetrics {
    pub fn new(namespace: &str) -> Result<Self, MappingError> {
        Ok(Self {
            heap_memory_usage: heap_memory_vec(namespace)?,
            gc_count: gauge_vec(
                namespace,
                "jvm_metrics",
                "gc_count",
                "GC count of each type",
                &["type"],
            )?,
            gc_time: gauge_vec(
                namespace,
                "jvm_metrics",
                "gc_time_milliseconds",
                "GC time of each type in milliseconds",
                &["type"],
            )?,
        })
    }

    /// Fill heap gauges from the `java.lang:type=Memory` bean
    pub fn fill_heap(&self, bean: &Bean) -> Result<(), MappingError> {
        fill_heap_vec(&self.heap_memory_usage, bean)
    }

    /// Fill GC gauges from a Hadoop `JvmMetrics` bean
    pub fn fill_hadoop_gc(&self, bean: &Bean) -> Result<(), MappingError> {
        let jvm: JvmMetricsBean = bean.decode()?;
        self.gc_count
            .with_label_values(&["ParNew"])
            .set(jvm.gc_count_par_new);
        self.gc_count
            .with_label_values(&["ConcurrentMarkSweep"])
            .set(jvm.gc_count_cms);
        self.gc_time
            .with_label_values(&["ParNew"])
            .set(jvm.gc_time_par_new);
        self.gc_time
            .with_label_values(&["ConcurrentMarkSweep"])
            .set(jvm.gc_time_cms);
        Ok(())
    }

    /// Fill GC gauges from a `java.lang` GarbageCollector bean
    pub fn fill_gc_collector(&self, gc_type: &str, bean: &Bean) -> Result<(), MappingError> {
        let gc: GarbageCollectorBean = bean.decode()?;
        self.gc_count
            .with_label_values(&[gc_type])
            .set(gc.collection_count);
        self.gc_time
            .with_label_values(&[gc_type])
            .set(gc.collection_time);
        Ok(())
    }

    pub fn register(&self, registry: &Registry) -> Result<(), MappingError> {
        registry.register(Box::new(self.heap_memory_usage.clone()))?;
        registry.register(Box::new(self.gc_count.clone()))?;
        registry.register(Box::new(self.gc_time.clone()))?;
        Ok(())
    }
}

/// Operating system gauges, shared namespace `hadoop_os` across services
///
/// Registered only when the OperatingSystem bean was actually seen, so
/// dumps without it stay free of zero-valued OS samples.
pub struct OsMetrics {
    open_file_descriptor_count: Gauge,
    max_file_descriptor_count: Gauge,
    committed_virtual_memory_size: Gauge,
    total_swap_space_size: Gauge,
    free_swap_space_size: Gauge,
    process_cpu_time: Gauge,
    free_physical_memory_size: Gauge,
    total_physical_memory_size: Gauge,
    system_cpu_load: Gauge,
    process_cpu_load: Gauge,
    available_processors: Gauge,
    system_load_average: Gauge,
    uname_info: GaugeVec,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OperatingSystemBean {
    open_file_descriptor_count: f64,
    max_file_descriptor_count: f64,
    committed_virtual_memory_size: f64,
    total_swap_space_size: f64,
    free_swap_space_size: f64,
    process_cpu_time: f64,
    free_physical_memory_size: f64,
    total_physical_memory_size: f64,
    system_cpu_load: f64,
    process_cpu_load: f64,
    available_processors: f64,
    system_load_average: f64,
    arch: String,
    name: String,
    version: String,
}

const OS_NAMESPACE: &str = "hadoop";
const OS_SUBSYSTEM: &str = "os";

impl OsMetrics {
    pub fn new() -> Result<Self, MappingError> {
        let os = |name: &str, help: &str| gauge(OS_NAMESPACE, OS_SUBSYSTEM, name, help);

        Ok(Self {
            open_file_descriptor_count: os(
                "open_file_descriptor_count",
                "Number of open file descriptors",
            )?,
            max_file_descriptor_count: os(
                "max_file_descriptor_count",
                "Maximum number of file descriptors",
            )?,
            committed_virtual_memory_size: os(
                "committed_virtual_memory_size_bytes",
                "Committed virtual memory in bytes",
            )?,
            total_swap_space_size: os("total_swap_space_size_bytes", "Total swap space in bytes")?,
            free_swap_space_size: os("free_swap_space_size_bytes", "Free swap space in bytes")?,
            process_cpu_time: os("process_cpu_time_nanoseconds", "Process CPU time in nanoseconds")?,
            free_physical_memory_size: os(
                "free_physical_memory_size_bytes",
                "Free physical memory in bytes",
            )?,
            total_physical_memory_size: os(
                "total_physical_memory_size_bytes",
                "Total physical memory in bytes",
            )?,
            system_cpu_load: os("system_cpu_load", "Recent system CPU load")?,
            process_cpu_load: os("process_cpu_load", "Recent process CPU load")?,
            available_processors: os("available_processors", "Number of available processors")?,
            system_load_average: os("system_load_average", "System load average")?,
            uname_info: gauge_vec(
                OS_NAMESPACE,
                OS_SUBSYSTEM,
                "uname_info",
                "Operating system identification",
                &["arch", "name", "version"],
            )?,
        })
    }

    /// Fill from the `java.lang:type=OperatingSystem` bean
    pub fn fill(&self, bean: &Bean) -> Result<(), MappingError> {
        let os: OperatingSystemBean = bean.decode()?;
        self.open_file_descriptor_count
            .set(os.open_file_descriptor_count);
        self.max_file_descriptor_count
            .set(os.max_file_descriptor_count);
        self.committed_virtual_memory_size
            .set(os.committed_virtual_memory_size);
        self.total_swap_space_size.set(os.total_swap_space_size);
        self.free_swap_space_size.set(os.free_swap_space_size);
        self.process_cpu_time.set(os.process_cpu_time);
        self.free_physical_memory_size
            .set(os.free_physical_memory_size);
        self.total_physical_memory_size
            .set(os.total_physical_memory_size);
        self.system_cpu_load.set(os.system_cpu_load);
        self.process_cpu_load.set(os.process_cpu_load);
        self.available_processors.set(os.available_processors);
        self.system_load_average.set(os.system_load_average);
        self.uname_info
            .with_label_values(&[&os.arch, &os.name, &os.version])
            .set(1.0);
        Ok(())
    }

    pub fn register(&self, registry: &Registry) -> Result<(), MappingError> {
        for gauge in [
            &self.open_file_descriptor_count,
            &self.max_file_descriptor_count,
            &self.committed_virtual_memory_size,
            &self.total_swap_space_size,
            &self.free_swap_space_size,
            &self.process_cpu_time,
            &self.free_physical_memory_size,
            &self.total_physical_memory_size,
            &self.system_cpu_load,
            &self.process_cpu_load,
            &self.available_processors,
            &self.system_load_average,
        ] {
            registry.register(Box::new(gauge.clone()))?;
        }
        registry.register(Box::new(self.uname_info.clone()))?;
        Ok(())
    }
}

/// Translate an HA state tag into its numeric encoding
///
/// Unrecognized tags yield `None`; the caller leaves the gauge
/// unregistered rather than emitting a misleading zero.
pub fn ha_state_value(tag: &str) -> Option<f64> {
    match tag {
        "initializing" => Some(0.0),
        "active" => Some(1.0),
        "standby" => Some(2.0),
        "stopping" => Some(3.0),
        _ => None,
    }
}

/// One scalar gauge sourced from a named bean attribute
pub struct FieldSpec {
    /// Exact bean name the attribute lives on
    pub bean: &'static str,
    /// JSON attribute to read
    pub attribute: &'static str,
    pub subsystem: &'static str,
    pub name: &'static str,
    pub help: &'static str,
}

struct ScalarEntry {
    bean: &'static str,
    attribute: &'static str,
    gauge: Gauge,
}

/// A table of scalar gauges with a generic fill loop
///
/// All attributes sourced from one bean are read before any gauge is
/// set, so a single bad field drops that bean's whole contribution.
pub struct ScalarGroup {
    entries: Vec<ScalarEntry>,
}

impl ScalarGroup {
    pub fn new(namespace: &str, specs: &[FieldSpec]) -> Result<Self, MappingError> {
        let mut entries = Vec::with_capacity(specs.len());
        for spec in specs {
            entries.push(ScalarEntry {
                bean: spec.bean,
                attribute: spec.attribute,
                gauge: gauge(namespace, spec.subsystem, spec.name, spec.help)?,
            });
        }
        Ok(Self { entries })
    }

    /// Fill every gauge sourced from `bean`
    ///
    /// Returns `Ok(true)` when the bean matched at least one entry.
    pub fn fill(&self, bean: &Bean) -> Result<bool, MappingError> {
        let Some(name) = bean.name() else {
            return Ok(false);
        };

        let matched: Vec<&ScalarEntry> =
            self.entries.iter().filter(|e| e.bean == name).collect();
        if matched.is_empty() {
            return Ok(false);
        }

        // Two-phase: read all values first, then set.
        let mut staged = Vec::with_capacity(matched.len());
        for entry in &matched {
            staged.push((*entry, bean.number(entry.attribute)?));
        }
        for (entry, value) in staged {
            entry.gauge.set(value);
        }
        Ok(true)
    }

    pub fn register(&self, registry: &Registry) -> Result<(), MappingError> {
        for entry in &self.entries {
            registry.register(Box::new(entry.gauge.clone()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::document::BeanDocument;

    fn bean(body: &str) -> Bean {
        BeanDocument::parse(format!(r#"{{"beans": [{body}]}}"#).as_bytes())
            .unwrap()
            .beans()[0]
            .clone()
    }

    #[test]
    fn test_ha_state_translation() {
        assert_eq!(ha_state_value("initializing"), Some(0.0));
        assert_eq!(ha_state_value("active"), Some(1.0));
        assert_eq!(ha_state_value("standby"), Some(2.0));
        assert_eq!(ha_state_value("stopping"), Some(3.0));
        assert_eq!(ha_state_value("rebooting"), None);
        assert_eq!(ha_state_value(""), None);
    }

    #[test]
    fn test_fill_heap() {
        let base = BaseMetrics::new("test_service").unwrap();
        let memory = bean(
            r#"{"name": "java.lang:type=Memory",
                "HeapMemoryUsage": {"committed": 10.0, "init": 5.0, "max": 100.0, "used": 42.0}}"#,
        );
        base.fill_heap(&memory).unwrap();

        let used = base
            .heap_memory_usage
            .get_metric_with_label_values(&["used"])
            .unwrap();
        assert_eq!(used.get(), 42.0);
    }

    #[test]
    fn test_fill_heap_rejects_incomplete_usage() {
        let base = BaseMetrics::new("test_service").unwrap();
        let memory = bean(
            r#"{"name": "java.lang:type=Memory", "HeapMemoryUsage": {"committed": 10.0}}"#,
        );
        assert!(base.fill_heap(&memory).is_err());
    }

    #[test]
    fn test_fill_gc_collector() {
        let base = BaseMetrics::new("test_service").unwrap();
        let gc = bean(
            r#"{"name": "java.lang:type=GarbageCollector,name=ParNew",
                "CollectionCount": 7.0, "CollectionTime": 123.0}"#,
        );
        base.fill_gc_collector("ParNew", &gc).unwrap();

        let count = base
            .gc_count
            .get_metric_with_label_values(&["ParNew"])
            .unwrap();
        assert_eq!(count.get(), 7.0);
    }

    #[test]
    fn test_os_metrics_fill() {
        let os = OsMetrics::new().unwrap();
        let os_bean = bean(
            r#"{"name": "java.lang:type=OperatingSystem",
                "OpenFileDescriptorCount": 256, "MaxFileDescriptorCount": 65536,
                "CommittedVirtualMemorySize": 1.0, "TotalSwapSpaceSize": 2.0,
                "FreeSwapSpaceSize": 3.0, "ProcessCpuTime": 4.0,
                "FreePhysicalMemorySize": 5.0, "TotalPhysicalMemorySize": 6.0,
                "SystemCpuLoad": 0.5, "ProcessCpuLoad": 0.25,
                "AvailableProcessors": 8, "SystemLoadAverage": 1.5,
                "Arch": "amd64", "Name": "Linux", "Version": "5.4"}"#,
        );
        os.fill(&os_bean).unwrap();

        let registry = Registry::new();
        os.register(&registry).unwrap();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "hadoop_os_open_file_descriptor_count"));
        assert!(families.iter().any(|f| f.get_name() == "hadoop_os_uname_info"));
    }

    #[test]
    fn test_scalar_group_two_phase_fill() {
        const SPECS: &[FieldSpec] = &[
            FieldSpec {
                bean: "test:bean=A",
                attribute: "First",
                subsystem: "sub",
                name: "first",
                help: "First attribute",
            },
            FieldSpec {
                bean: "test:bean=A",
                attribute: "Second",
                subsystem: "sub",
                name: "second",
                help: "Second attribute",
            },
        ];
        let group = ScalarGroup::new("test", SPECS).unwrap();

        // A bean with one bad attribute contributes nothing.
        let bad = bean(r#"{"name": "test:bean=A", "First": 1.0, "Second": "oops"}"#);
        assert!(group.fill(&bad).is_err());
        assert_eq!(group.entries[0].gauge.get(), 0.0);

        let good = bean(r#"{"name": "test:bean=A", "First": 1.0, "Second": 2.0}"#);
        assert!(group.fill(&good).unwrap());
        assert_eq!(group.entries[0].gauge.get(), 1.0);
        assert_eq!(group.entries[1].gauge.get(), 2.0);

        // Unrelated beans are ignored.
        let other = bean(r#"{"name": "test:bean=B", "First": 9.0}"#);
        assert!(!group.fill(&other).unwrap());
    }
}
