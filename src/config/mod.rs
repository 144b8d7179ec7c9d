//! Configuration
//!
//! Settings come from a YAML file, overridden by `MAGIC_FOLDER__*` environment variables
//! (`MAGIC_FOLDER__FARM__NODE_ID=2`). Validation runs once at startup; any
//! [`ConfigError`] is fatal.

pub mod types;

#[cfg(test)]
mod tests;

use std::path::Path;
use thiserror::Error;

use crate::tasks::types::MIN_POLL_INTERVAL;
pub use types::*;

pub const ENV_PREFIX: &str = "MAGIC_FOLDER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("node id {node_id} is outside the farm member list ({members} entries)")]
    NodeIdOutOfRange { node_id: u32, members: usize },

    #[error("farm member '{0}' is not a host:port address")]
    InvalidMember(String),

    #[error("transport.base_url is required when a pipeline has an input or output folder")]
    MissingBaseUrl,

    #[error("pipeline {0} has neither an input nor an output folder")]
    EmptyPipeline(usize),

    #[error("worker_threads must be at least 1")]
    NoWorkerThreads,
}

/// Reads `path` plus environment overrides. `node_id` (from the command line) wins over both.
pub fn load(path: &Path, node_id: Option<u32>) -> Result<Settings, ConfigError> {
    let environment = ::config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("farm.members")
        .try_parsing(true);

    let mut settings: Settings = ::config::Config::builder()
        .add_source(::config::File::from(path).format(::config::FileFormat::Yaml))
        .add_source(environment)
        .set_override_option("farm.node_id", node_id.map(u64::from))?
        .build()?
        .try_deserialize()?;

    settings.validate()?;
    Ok(settings)
}

/// Parses and validates YAML text without consulting the environment.
pub fn from_yaml_str(text: &str) -> Result<Settings, ConfigError> {
    let mut settings: Settings = ::config::Config::builder()
        .add_source(::config::File::from_str(text, ::config::FileFormat::Yaml))
        .build()?
        .try_deserialize()?;

    settings.validate()?;
    Ok(settings)
}

fn is_host_port(member: &str) -> bool {
    match member.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p > 0),
        None => false,
    }
}

fn clamp_interval(value: &mut u64, what: &str) {
    let floor = MIN_POLL_INTERVAL.as_secs();
    if *value < floor {
        tracing::warn!("{} of {}s is below the {}s minimum, using {}s", what, value, floor, floor);
        *value = floor;
    }
}

impl Settings {
    /// Rejects unusable settings and raises poll intervals to the minimum.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::NoWorkerThreads);
        }

        if let Some(bad) = self.farm.members.iter().find(|m| !is_host_port(m)) {
            return Err(ConfigError::InvalidMember(bad.clone()));
        }
        if self.farm.node_id as usize > self.farm.members.len() {
            return Err(ConfigError::NodeIdOutOfRange {
                node_id: self.farm.node_id,
                members: self.farm.members.len(),
            });
        }

        if self.needs_transport() && self.transport.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }

        for (index, pipeline) in self.pipelines.iter_mut().enumerate() {
            if pipeline.input_folder.is_none() && pipeline.output_folder.is_none() {
                return Err(ConfigError::EmptyPipeline(index));
            }
            clamp_interval(&mut pipeline.input_interval_secs, "input_interval_secs");
            clamp_interval(&mut pipeline.output_interval_secs, "output_interval_secs");
        }

        Ok(())
    }
}
