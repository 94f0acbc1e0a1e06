//! Local replica configuration consumed by topology building and selection.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::network::ServerUrl;
use crate::node::{GenerationId, GroupId, ServerId};

/// Static settings of the local directory server.
///
/// `replication_servers` lists the RS addresses declared locally; an RS whose
/// advertised address matches one of them is flagged locally configured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    pub server_id: ServerId,
    #[serde(default)]
    pub group_id: GroupId,
    /// `None` until the generation of the local data set is known.
    #[serde(default)]
    pub generation_id: Option<GenerationId>,
    #[serde(default)]
    pub replication_servers: Vec<String>,
}

impl LocalConfig {
    pub fn new(server_id: ServerId, generation_id: GenerationId) -> Self {
        Self {
            server_id,
            group_id: GroupId::DEFAULT,
            generation_id: Some(generation_id),
            replication_servers: Vec::new(),
        }
    }

    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_replication_server(mut self, url: impl Into<String>) -> Self {
        self.replication_servers.push(url.into());
        self
    }

    /// Check the preconditions selection relies on.
    pub fn validate(&self) -> Result<ValidConfig<'_>, ConfigError> {
        if self.server_id.0 == 0 {
            return Err(ConfigError::ReservedServerId);
        }
        if !(1..=127).contains(&self.group_id.0) {
            return Err(ConfigError::InvalidGroupId(self.group_id.0));
        }
        let generation_id = self.generation_id.ok_or(ConfigError::UnknownGenerationId)?;
        for url in &self.replication_servers {
            if ServerUrl::parse(url).is_err() {
                return Err(ConfigError::InvalidReplicationServer(url.clone()));
            }
        }
        Ok(ValidConfig {
            config: self,
            generation_id,
        })
    }
}

/// A [`LocalConfig`] that passed [`LocalConfig::validate`].
#[derive(Clone, Copy, Debug)]
pub struct ValidConfig<'a> {
    config: &'a LocalConfig,
    generation_id: GenerationId,
}

impl<'a> ValidConfig<'a> {
    pub fn server_id(&self) -> ServerId {
        self.config.server_id
    }

    pub fn group_id(&self) -> GroupId {
        self.config.group_id
    }

    pub fn generation_id(&self) -> GenerationId {
        self.generation_id
    }

    pub fn config(&self) -> &'a LocalConfig {
        self.config
    }
}
