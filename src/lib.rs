pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod runtime;
pub mod storage;
pub mod util;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag value and measurement used for events that match no known kind.
pub const UNKNOWN_KIND: &str = "unknown";
pub const UNKNOWN_MEASUREMENT: &str = "UnknownContainerEvents";

/// The closed set of workloads this monitor knows how to watch.
///
/// Each kind maps 1:1 to a measurement in the sink and to the image substring
/// its poller matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    Nginx,
    Httpd,
    Postgres,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 3] = [
        WorkloadKind::Nginx,
        WorkloadKind::Httpd,
        WorkloadKind::Postgres,
    ];

    /// Name used as the `ContainerName` tag and as the image pattern.
    pub fn name(&self) -> &'static str {
        match self {
            WorkloadKind::Nginx => "nginx",
            WorkloadKind::Httpd => "httpd",
            WorkloadKind::Postgres => "postgres",
        }
    }

    pub fn measurement(&self) -> &'static str {
        match self {
            WorkloadKind::Nginx => "NginxContainerEvents",
            WorkloadKind::Httpd => "HttpdContainerEvents",
            WorkloadKind::Postgres => "PostgresContainerEvents",
        }
    }

    pub fn pattern(&self) -> &'static str {
        self.name()
    }

    /// Whether a container running `image` belongs to this kind.
    pub fn matches(&self, image: &str) -> bool {
        image.contains(self.pattern())
    }

    pub fn from_name(name: &str) -> Option<WorkloadKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Start,
    Stop,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Start => "start",
            LifecycleStatus::Stop => "stop",
        }
    }

    pub fn parse(value: &str) -> Option<LifecycleStatus> {
        match value {
            "start" => Some(LifecycleStatus::Start),
            "stop" => Some(LifecycleStatus::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a workload at one instant.
///
/// Stop observations usually carry nothing but `name` and the status, since
/// there is no running container left to describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSnapshot {
    /// Kind name, empty for containers that matched no kind
    pub name: String,
    /// Runtime container id, truncated to a short prefix
    pub id: String,
    pub image_name: String,
    /// Creation time reported by the runtime (unix seconds)
    pub created_at: Option<i64>,
    pub network: String,
    pub runtime_state: String,
    pub runtime_status_text: String,
    pub lifecycle_status: LifecycleStatus,
}

impl WorkloadSnapshot {
    /// Observation that no container of `kind` is running.
    pub fn stopped(kind: WorkloadKind) -> Self {
        Self {
            name: kind.name().to_string(),
            id: String::new(),
            image_name: String::new(),
            created_at: None,
            network: String::new(),
            runtime_state: String::new(),
            runtime_status_text: String::new(),
            lifecycle_status: LifecycleStatus::Stop,
        }
    }
}
