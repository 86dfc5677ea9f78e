//! One [`ToolClient`] per learner.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, info};
use tutorlink_protocol::{Error, Result};

use crate::config::ClientConfig;
use crate::invoker::ToolClient;

/// Clients keyed by learner id, created on first use.
///
/// Creation happens under the key's shard lock, so concurrent first uses of
/// one learner id still produce a single client.
#[derive(Debug)]
pub struct LearnerRegistry {
    config: ClientConfig,
    clients: DashMap<String, Arc<ToolClient>>,
}

impl LearnerRegistry {
    /// Empty registry; every client is built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `config` does not validate.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        Ok(Self {
            config,
            clients: DashMap::new(),
        })
    }

    /// The learner's client, created if this is the first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the client cannot be built.
    pub fn client_for(&self, learner_id: &str) -> Result<Arc<ToolClient>> {
        if let Some(client) = self.clients.get(learner_id) {
            return Ok(Arc::clone(client.value()));
        }

        match self.clients.entry(learner_id.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let client = Arc::new(ToolClient::new(&self.config)?);
                entry.insert(Arc::clone(&client));
                info!(learner_id, "Created tool client");
                Ok(client)
            }
        }
    }

    /// The learner's client, if one exists
    pub fn get(&self, learner_id: &str) -> Option<Arc<ToolClient>> {
        self.clients
            .get(learner_id)
            .map(|client| Arc::clone(client.value()))
    }

    /// Disconnect and forget the learner's client. Returns whether one
    /// existed.
    pub fn remove(&self, learner_id: &str) -> bool {
        match self.clients.remove(learner_id) {
            Some((_, client)) => {
                client.disconnect();
                debug!(learner_id, "Removed tool client");
                true
            }
            None => false,
        }
    }

    /// Number of learners with a client
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client has been created
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Disconnect and forget every client.
    pub fn shutdown(&self) {
        let learners: Vec<String> = self.clients.iter().map(|entry| entry.key().clone()).collect();
        for learner_id in &learners {
            self.remove(learner_id);
        }
        info!(clients = learners.len(), "Learner registry shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_created_once_per_learner() {
        let registry = LearnerRegistry::new(ClientConfig::default()).unwrap();
        assert!(registry.is_empty());

        let first = registry.client_for("maya").unwrap();
        let again = registry.client_for("maya").unwrap();
        let other = registry.client_for("leo").unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_and_shutdown() {
        let registry = LearnerRegistry::new(ClientConfig::default()).unwrap();
        registry.client_for("maya").unwrap();
        registry.client_for("leo").unwrap();

        assert!(registry.remove("maya"));
        assert!(!registry.remove("maya"));
        assert!(registry.get("maya").is_none());
        assert!(registry.get("leo").is_some());

        registry.shutdown();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ClientConfig {
            base_url: "::not-a-url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            LearnerRegistry::new(config),
            Err(Error::Configuration(_))
        ));
    }
}
