//! Collaborators that resolve who is acting and from where.

use async_trait::async_trait;

use crate::config::ActorConfig;

/// The actor on whose behalf audit entries are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    /// Organizational scope (the college) entries are filed under.
    pub organization_id: String,
}

/// Resolves the current actor. `None` means no flush can proceed yet.
#[async_trait]
pub trait ActorResolver: Send + Sync {
    async fn current_actor(&self) -> Option<Actor>;
}

/// Network details attached to each record when it is logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMetadata {
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
}

/// Resolves client metadata for the call currently being logged.
#[async_trait]
pub trait ClientContext: Send + Sync {
    async fn client_metadata(&self) -> ClientMetadata;
}

/// Fixed actor, typically the daemon's service identity.
#[derive(Debug, Clone, Default)]
pub struct StaticActor {
    actor: Option<Actor>,
}

impl StaticActor {
    pub fn new(actor: Option<Actor>) -> Self {
        Self { actor }
    }

    /// Build from config; both the actor id and organization must be set.
    pub fn from_config(config: &ActorConfig) -> Self {
        let actor = match (&config.actor_id, &config.organization_id) {
            (Some(id), Some(org)) => Some(Actor {
                id: id.clone(),
                organization_id: org.clone(),
            }),
            _ => None,
        };
        Self { actor }
    }
}

#[async_trait]
impl ActorResolver for StaticActor {
    async fn current_actor(&self) -> Option<Actor> {
        self.actor.clone()
    }
}

/// Fixed client metadata.
#[derive(Debug, Clone, Default)]
pub struct StaticClientContext {
    metadata: ClientMetadata,
}

impl StaticClientContext {
    pub fn new(metadata: ClientMetadata) -> Self {
        Self { metadata }
    }

    pub fn from_config(config: &ActorConfig) -> Self {
        Self::new(ClientMetadata {
            source_address: config.source_address.clone(),
            client_agent: config.client_agent.clone(),
        })
    }
}

#[async_trait]
impl ClientContext for StaticClientContext {
    async fn client_metadata(&self) -> ClientMetadata {
        self.metadata.clone()
    }
}
