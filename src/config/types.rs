use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::membership::types::NodeId;
use crate::tasks::input::InputFolders;
use crate::tasks::naming::ExtensionPolicy;
use crate::tasks::postprocess::{CommandTemplate, Hooks};

/// Process-wide settings, as read from the YAML file and the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub farm: FarmSettings,
    pub worker_threads: usize,
    pub transport: TransportSettings,
    pub pipelines: Vec<PipelineSettings>,
    pub retention: RetentionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            farm: FarmSettings::default(),
            worker_threads: 4,
            transport: TransportSettings::default(),
            pipelines: Vec::new(),
            retention: RetentionSettings::default(),
        }
    }
}

impl Settings {
    /// Every folder the retention sweep covers, in configuration order.
    pub fn retention_folders(&self) -> Vec<PathBuf> {
        self.pipelines
            .iter()
            .flat_map(|p| {
                [
                    &p.output_folder,
                    &p.processed_folder,
                    &p.ack_folder,
                    &p.ack_ok_folder,
                    &p.ack_failed_folder,
                ]
            })
            .flatten()
            .cloned()
            .collect()
    }

    pub fn needs_transport(&self) -> bool {
        self.pipelines
            .iter()
            .any(|p| p.input_folder.is_some() || p.output_folder.is_some())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FarmSettings {
    /// 1-based position of this node in `members`. 0 means single mode.
    pub node_id: u32,
    /// `host:port` of every farm member, this node included.
    pub members: Vec<String>,
    pub retry_backoff_ms: u64,
    pub rpc_timeout_ms: u64,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            node_id: 0,
            members: Vec::new(),
            retry_backoff_ms: 500,
            rpc_timeout_ms: 2000,
        }
    }
}

impl FarmSettings {
    pub fn local_node_id(&self) -> Option<NodeId> {
        (self.node_id > 0 && !self.members.is_empty()).then_some(NodeId(self.node_id))
    }

    pub fn self_address(&self) -> Option<&str> {
        let index = (self.node_id as usize).checked_sub(1)?;
        self.members.get(index).map(String::as_str)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 30,
        }
    }
}

impl TransportSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One folder pair. Either side may be left out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub input_folder: Option<PathBuf>,
    pub processed_folder: Option<PathBuf>,
    pub ack_folder: Option<PathBuf>,
    pub ack_ok_folder: Option<PathBuf>,
    pub ack_failed_folder: Option<PathBuf>,
    pub input_interval_secs: u64,

    pub output_folder: Option<PathBuf>,
    pub output_interval_secs: u64,
    pub message_types: Vec<String>,
    pub extension: ExtensionPolicy,

    pub post_process: PostProcessSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            input_folder: None,
            processed_folder: None,
            ack_folder: None,
            ack_ok_folder: None,
            ack_failed_folder: None,
            input_interval_secs: 60,
            output_folder: None,
            output_interval_secs: 60,
            message_types: Vec::new(),
            extension: ExtensionPolicy::Auto,
            post_process: PostProcessSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn input_folders(&self) -> Option<InputFolders> {
        Some(InputFolders {
            input: self.input_folder.clone()?,
            processed: self.processed_folder.clone(),
            ack: self.ack_folder.clone(),
            ack_ok: self.ack_ok_folder.clone(),
            ack_failed: self.ack_failed_folder.clone(),
        })
    }

    pub fn input_interval(&self) -> Duration {
        Duration::from_secs(self.input_interval_secs)
    }

    pub fn output_interval(&self) -> Duration {
        Duration::from_secs(self.output_interval_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostProcessSettings {
    pub on_sent: Option<String>,
    pub on_failed: Option<String>,
    pub on_received: Option<String>,
}

impl PostProcessSettings {
    pub fn hooks(&self) -> Hooks {
        let parse = |t: &Option<String>| t.as_deref().and_then(CommandTemplate::parse);
        Hooks {
            on_sent: parse(&self.on_sent),
            on_failed: parse(&self.on_failed),
            on_received: parse(&self.on_received),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    /// 0 disables retention.
    pub days: u32,
    pub backup_folder: Option<PathBuf>,
    pub interval_secs: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            days: 0,
            backup_folder: None,
            interval_secs: 24 * 60 * 60,
        }
    }
}

impl RetentionSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}
