//! Service resolution
//!
//! Decides which Hadoop ecosystem service produced a JMX dump by looking
//! at bean names. The first bean carrying the `Hadoop:service=` prefix
//! decides; dumps interleaving beans of several services are not
//! expected from real servlets.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::collector::document::BeanDocument;
use crate::error::ResolutionError;

/// Bean name prefix that identifies a service-owned MBean
pub const SERVICE_NAME_PREFIX: &str = "Hadoop:service=";

/// Captures the service identifier out of a bean name,
/// e.g. `Hadoop:service=NameNode,name=FSNamesystem` -> `NameNode`
static SERVICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Hadoop:service=(.*?),").expect("static pattern compiles"));

/// The services this exporter knows how to map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    NameNode,
    DataNode,
    ResourceManager,
    JournalNode,
    HiveServer2,
    NodeManager,
    HbaseMaster,
    HbaseRegionServer,
}

impl ServiceKind {
    /// Identifier as it appears in bean names, used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::NameNode => "NameNode",
            ServiceKind::DataNode => "DataNode",
            ServiceKind::ResourceManager => "ResourceManager",
            ServiceKind::JournalNode => "JournalNode",
            ServiceKind::HiveServer2 => "hiveserver2",
            ServiceKind::NodeManager => "NodeManager",
            ServiceKind::HbaseMaster => "HbaseMaster",
            ServiceKind::HbaseRegionServer => "HbaseRegionServer",
        }
    }

    /// Look up a kind by the identifier found in bean names
    fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "NameNode" => Some(ServiceKind::NameNode),
            "DataNode" => Some(ServiceKind::DataNode),
            "ResourceManager" => Some(ServiceKind::ResourceManager),
            "JournalNode" => Some(ServiceKind::JournalNode),
            "hiveserver2" => Some(ServiceKind::HiveServer2),
            "NodeManager" => Some(ServiceKind::NodeManager),
            _ => None,
        }
    }
}

/// Resolve the service that produced `document`
///
/// Scans beans in document order; the first bean whose name starts with
/// [`SERVICE_NAME_PREFIX`] decides. HBase uses one shared identifier for
/// both daemons, refined by the rest of the bean name.
///
/// Returns `Ok(None)` when no prefix bean exists or the identifier has
/// no registered mapping. Resolution is pure: the same document always
/// resolves the same way.
///
/// # Errors
/// `ResolutionError::UnknownJmxSchema` when a prefix bean does not follow
/// the `Hadoop:service=<id>,...` shape
pub fn resolve(document: &BeanDocument) -> Result<Option<ServiceKind>, ResolutionError> {
    for bean in document.beans() {
        let Some(name) = bean.name() else { continue };
        if !name.starts_with(SERVICE_NAME_PREFIX) {
            continue;
        }

        let identifier = SERVICE_PATTERN
            .captures(name)
            .and_then(|captures| captures.get(1))
            .ok_or_else(|| ResolutionError::UnknownJmxSchema(name.to_string()))?
            .as_str();

        let kind = if identifier == "HBase" {
            // Master and RegionServer share the HBase identifier; the
            // bean name tells them apart.
            if name.contains("RegionServer") {
                Some(ServiceKind::HbaseRegionServer)
            } else if name.contains("Master") {
                Some(ServiceKind::HbaseMaster)
            } else {
                None
            }
        } else {
            ServiceKind::from_identifier(identifier)
        };

        if kind.is_none() {
            debug!(identifier, bean = name, "No mapping for resolved service");
        }
        return Ok(kind);
    }

    Ok(None)
}
