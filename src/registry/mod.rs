//! Entity registration and type-erased instances.
//!
//! The registry maps service names to entity definitions. A driver asks it
//! for a fresh [`EntityInstance`] per entity identity and holds that instance
//! for as long as the identity stays active. Descriptors describe every
//! registered entity the way an entity-discovery reply would.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::codec::{Envelope, Payload};
use crate::config::EngineConfig;
use crate::error::{DispatchError, Result};
use crate::eventsourced::{EntityEvent, EventSourcedDispatcher, EventSourcedEntity};
use crate::outcome::CommandOutcome;
use crate::value::{ValueEntity, ValueEntityDispatcher};

/// Persistence model of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    EventSourced,
    Value,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::EventSourced => f.write_str("event-sourced"),
            EntityKind::Value => f.write_str("value"),
        }
    }
}

/// What a registered entity accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub service_name: String,
    pub kind: EntityKind,
    /// Command names across all behaviors, sorted.
    pub commands: Vec<String>,
    /// Event types across all behaviors, sorted. Empty for value entities.
    pub event_types: Vec<String>,
    pub passivation_timeout: Option<Duration>,
}

/// One live entity instance, whatever its state type.
///
/// Both dispatchers implement this so a driver can keep instances of
/// different entity types side by side.
pub trait EntityInstance: Send {
    fn service_name(&self) -> &str;

    fn entity_id(&self) -> &str;

    fn kind(&self) -> EntityKind;

    /// See [`EventSourcedDispatcher::handle_command`] and
    /// [`ValueEntityDispatcher::handle_command`].
    fn handle_command(&mut self, command_name: &str, payload: &Envelope) -> Result<CommandOutcome>;

    /// Fold a stored event delivered with its sequence number.
    ///
    /// Value entities have no event log and return [`DispatchError::Defect`].
    fn handle_event(&mut self, sequence: u64, event: &Envelope) -> Result<()>;
}

type InstantiateFn = Box<dyn Fn(&str) -> Box<dyn EntityInstance> + Send + Sync>;
type RecoverFn = Box<dyn Fn(&str, &Envelope) -> Result<Box<dyn EntityInstance>> + Send + Sync>;

struct Registration {
    descriptor: EntityDescriptor,
    instantiate: InstantiateFn,
    recover: RecoverFn,
}

/// Service name → entity definition.
#[derive(Default)]
pub struct EntityRegistry {
    config: EngineConfig,
    entities: BTreeMap<String, Registration>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose instances follow `config`.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            entities: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register an event-sourced entity. Replaces an earlier registration
    /// under the same service name.
    pub fn register_event_sourced<S, E>(&mut self, entity: Arc<EventSourcedEntity<S, E>>) -> &mut Self
    where
        S: Clone + Send + 'static,
        E: EntityEvent,
    {
        let descriptor = EntityDescriptor {
            service_name: entity.service_name().to_string(),
            kind: EntityKind::EventSourced,
            commands: entity.command_names(),
            event_types: entity.event_types(),
            passivation_timeout: entity
                .passivation()
                .or_else(|| self.config.entity.passivation_timeout()),
        };

        let enforce = self.config.replay.enforce_sequence;
        let instantiate: InstantiateFn = {
            let entity = Arc::clone(&entity);
            Box::new(move |entity_id: &str| {
                Box::new(
                    EventSourcedDispatcher::new(Arc::clone(&entity), entity_id)
                        .with_sequence_enforcement(enforce),
                ) as Box<dyn EntityInstance>
            })
        };
        let service = descriptor.service_name.clone();
        let recover: RecoverFn = Box::new(move |entity_id: &str, _snapshot: &Envelope| {
            Err(DispatchError::Defect(format!(
                "{service} is event-sourced; {entity_id} recovers by replaying its events"
            )))
        });

        self.insert(descriptor, instantiate, recover);
        self
    }

    /// Register a value entity. Replaces an earlier registration under the
    /// same service name.
    pub fn register_value<S>(&mut self, entity: Arc<ValueEntity<S>>) -> &mut Self
    where
        S: Payload + Clone + Send + 'static,
    {
        let descriptor = EntityDescriptor {
            service_name: entity.service_name().to_string(),
            kind: EntityKind::Value,
            commands: entity.command_names(),
            event_types: Vec::new(),
            passivation_timeout: entity
                .passivation()
                .or_else(|| self.config.entity.passivation_timeout()),
        };

        let instantiate: InstantiateFn = {
            let entity = Arc::clone(&entity);
            Box::new(move |entity_id: &str| {
                Box::new(ValueEntityDispatcher::new(Arc::clone(&entity), entity_id))
                    as Box<dyn EntityInstance>
            })
        };
        let recover: RecoverFn = Box::new(move |entity_id: &str, snapshot: &Envelope| {
            let dispatcher = ValueEntityDispatcher::recover(Arc::clone(&entity), entity_id, snapshot)?;
            Ok(Box::new(dispatcher) as Box<dyn EntityInstance>)
        });

        self.insert(descriptor, instantiate, recover);
        self
    }

    fn insert(&mut self, descriptor: EntityDescriptor, instantiate: InstantiateFn, recover: RecoverFn) {
        let service = descriptor.service_name.clone();
        info!(
            service = %service,
            kind = %descriptor.kind,
            commands = descriptor.commands.len(),
            "entity registered"
        );
        let previous = self.entities.insert(
            service.clone(),
            Registration {
                descriptor,
                instantiate,
                recover,
            },
        );
        if previous.is_some() {
            warn!(service = %service, "entity registration replaced");
        }
    }

    /// Create a fresh instance of `service` for `entity_id`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownEntity`] if no entity is registered under `service`.
    pub fn instantiate(&self, service: &str, entity_id: &str) -> Result<Box<dyn EntityInstance>> {
        let registration = self.lookup(service)?;
        debug!(service, entity_id, "entity instantiated");
        Ok((registration.instantiate)(entity_id))
    }

    /// Restore a value entity instance from its persisted snapshot.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::UnknownEntity`] if no entity is registered under `service`.
    /// - [`DispatchError::Defect`] if `service` is event-sourced.
    /// - [`DispatchError::Codec`] if the snapshot does not decode.
    pub fn recover(
        &self,
        service: &str,
        entity_id: &str,
        snapshot: &Envelope,
    ) -> Result<Box<dyn EntityInstance>> {
        let registration = self.lookup(service)?;
        (registration.recover)(entity_id, snapshot)
    }

    /// Descriptor for one service.
    pub fn descriptor(&self, service: &str) -> Option<&EntityDescriptor> {
        self.entities.get(service).map(|r| &r.descriptor)
    }

    /// Descriptors for every registered entity, ordered by service name.
    pub fn descriptors(&self) -> Vec<EntityDescriptor> {
        self.entities
            .values()
            .map(|r| r.descriptor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn lookup(&self, service: &str) -> Result<&Registration> {
        self.entities
            .get(service)
            .ok_or_else(|| DispatchError::UnknownEntity(service.to_string()))
    }
}
