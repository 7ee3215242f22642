//! Build collaborator seam
//!
//! The merge engine hands the canonical configuration object to a
//! [`BuildRuntime`] implementation, which owns the schema's semantic
//! validation and produces the runtime representation. Its internals are
//! opaque to the pipeline; errors pass through unchanged.

use crate::conf::ServerConfig;

/// Rejection from the external builder.
///
/// Opaque to the config pipeline, which only propagates it.
#[derive(Debug, thiserror::Error)]
#[error("failed to build runtime config: {message}")]
pub struct BuildError {
    message: String,
}

impl BuildError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Turns a merged canonical object into the runtime representation.
pub trait BuildRuntime<C> {
    type Output;

    fn build(&self, config: &C) -> Result<Self::Output, BuildError>;
}

/// Runtime representation of a validated server configuration.
///
/// A placeholder for the running server's wiring; the pipeline only ever
/// passes it along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub inbound_tags: Vec<String>,
    pub outbound_tags: Vec<String>,
}

/// Minimal builder for [`ServerConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerBuilder;

impl BuildRuntime<ServerConfig> for ServerBuilder {
    type Output = RuntimeConfig;

    fn build(&self, config: &ServerConfig) -> Result<RuntimeConfig, BuildError> {
        if config.inbounds.is_empty() {
            return Err(BuildError::new("at least one inbound is required"));
        }
        for inbound in &config.inbounds {
            if inbound.port.is_empty() {
                return Err(BuildError::new(format!(
                    "inbound '{}' has no listening port",
                    inbound.tag
                )));
            }
        }
        Ok(RuntimeConfig {
            inbound_tags: config.inbounds.iter().map(|i| i.tag.clone()).collect(),
            outbound_tags: config.outbounds.iter().map(|o| o.tag.clone()).collect(),
        })
    }
}
