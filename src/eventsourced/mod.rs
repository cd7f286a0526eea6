//! Event-sourced entities.
//!
//! An [`EventSourcedEntity`] is the immutable definition of an entity type:
//! its service name, its `initial` state factory and one or more named
//! [`Behavior`]s mapping command names to command handlers and event types to
//! fold functions. An optional selector picks the active behavior from the
//! current state, so which commands and events are accepted can follow a
//! per-entity state machine.
//!
//! An [`EventSourcedDispatcher`] owns the state of one entity instance and
//! drives commands and events through the definition.

mod context;
mod dispatcher;

pub use context::EventSourcedContext;
pub use dispatcher::EventSourcedDispatcher;

use std::collections::HashMap;
use std::time::Duration;

use crate::codec::{type_name_from_url, Envelope, Payload};
use crate::error::{CommandResult, DispatchError, Result};

/// Behavior used when no selector is installed.
pub const DEFAULT_BEHAVIOR: &str = "default";

/// A domain event with an explicit discriminator.
///
/// The discriminator routes the event to its fold function. Event enums
/// usually return a constant per variant.
pub trait EntityEvent: Payload + Clone + Send + Sync + 'static {
    fn event_type(&self) -> &str;
}

/// Raw envelopes are routed by the type name in their type URL.
impl EntityEvent for Envelope {
    fn event_type(&self) -> &str {
        type_name_from_url(&self.type_url)
    }
}

/// Type-erased command handler: decode, invoke, encode.
pub(crate) type CommandFn<S, E> =
    Box<dyn Fn(&Envelope, &S, &mut EventSourcedContext<E>) -> Result<Envelope> + Send + Sync>;

/// Fold function: `(event, prior state) -> next state`.
pub(crate) type EventFn<S, E> = Box<dyn Fn(&E, S) -> S + Send + Sync>;

/// Handler table active while the entity is in a given state.
pub struct Behavior<S, E> {
    command_handlers: HashMap<String, CommandFn<S, E>>,
    event_handlers: HashMap<String, EventFn<S, E>>,
}

impl<S, E> Default for Behavior<S, E> {
    fn default() -> Self {
        Self {
            command_handlers: HashMap::new(),
            event_handlers: HashMap::new(),
        }
    }
}

impl<S: 'static, E: EntityEvent> Behavior<S, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command handler.
    ///
    /// The payload is decoded as `C` before the handler runs and the reply is
    /// encoded from `R`. Returning `Err` rejects the command the same way
    /// [`fail`](crate::CommandContext::fail) does.
    pub fn command<C, R, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        C: Payload + 'static,
        R: Payload + 'static,
        F: Fn(C, &S, &mut EventSourcedContext<E>) -> CommandResult<R> + Send + Sync + 'static,
    {
        let erased: CommandFn<S, E> = Box::new(
            move |payload: &Envelope, state: &S, ctx: &mut EventSourcedContext<E>| {
                let command = C::from_envelope(payload)?;
                let reply = handler(command, state, ctx)?;
                Ok(reply.to_envelope()?)
            },
        );
        self.command_handlers.insert(name.into(), erased);
        self
    }

    /// Register the fold function for an event type.
    pub fn event<F>(mut self, event_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&E, S) -> S + Send + Sync + 'static,
    {
        self.event_handlers
            .insert(event_type.into(), Box::new(handler));
        self
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.command_handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered event types, sorted.
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.event_handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub(crate) fn command_handler(&self, name: &str) -> Option<&CommandFn<S, E>> {
        self.command_handlers.get(name)
    }

    pub(crate) fn event_handler(&self, event_type: &str) -> Option<&EventFn<S, E>> {
        self.event_handlers.get(event_type)
    }
}

/// Definition of an event-sourced entity type.
///
/// Built once at setup and shared read-only (usually behind an `Arc`) by every
/// dispatcher of that type.
pub struct EventSourcedEntity<S, E> {
    service_name: String,
    initial: Box<dyn Fn(&str) -> S + Send + Sync>,
    behaviors: HashMap<String, Behavior<S, E>>,
    selector: Option<fn(&S) -> &'static str>,
    passivation_timeout: Option<Duration>,
}

impl<S: 'static, E: EntityEvent> EventSourcedEntity<S, E> {
    /// Create a definition with an empty default behavior.
    ///
    /// `initial` builds the state of an entity with no events.
    pub fn new<I>(service_name: impl Into<String>, initial: I) -> Self
    where
        I: Fn(&str) -> S + Send + Sync + 'static,
    {
        let mut behaviors = HashMap::new();
        behaviors.insert(DEFAULT_BEHAVIOR.to_string(), Behavior::new());
        Self {
            service_name: service_name.into(),
            initial: Box::new(initial),
            behaviors,
            selector: None,
            passivation_timeout: None,
        }
    }

    /// Register a command handler on the default behavior.
    pub fn command<C, R, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        C: Payload + 'static,
        R: Payload + 'static,
        F: Fn(C, &S, &mut EventSourcedContext<E>) -> CommandResult<R> + Send + Sync + 'static,
    {
        let behavior = self.behaviors.remove(DEFAULT_BEHAVIOR).unwrap_or_default();
        self.behaviors.insert(
            DEFAULT_BEHAVIOR.to_string(),
            behavior.command(name, handler),
        );
        self
    }

    /// Register a fold function on the default behavior.
    pub fn event<F>(mut self, event_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&E, S) -> S + Send + Sync + 'static,
    {
        let behavior = self.behaviors.remove(DEFAULT_BEHAVIOR).unwrap_or_default();
        self.behaviors.insert(
            DEFAULT_BEHAVIOR.to_string(),
            behavior.event(event_type, handler),
        );
        self
    }

    /// Add (or replace) a named behavior.
    pub fn behavior(mut self, name: impl Into<String>, behavior: Behavior<S, E>) -> Self {
        self.behaviors.insert(name.into(), behavior);
        self
    }

    /// Choose the active behavior from the current state.
    pub fn select_behavior(mut self, selector: fn(&S) -> &'static str) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Idle time after which the driver may passivate an instance.
    pub fn passivation_timeout(mut self, timeout: Duration) -> Self {
        self.passivation_timeout = Some(timeout);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn passivation(&self) -> Option<Duration> {
        self.passivation_timeout
    }

    /// State of an entity with an empty log.
    pub fn initial_state(&self, entity_id: &str) -> S {
        (self.initial)(entity_id)
    }

    /// Every command name accepted by any behavior, sorted and deduplicated.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .behaviors
            .values()
            .flat_map(|b| b.command_handlers.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Every event type folded by any behavior, sorted and deduplicated.
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .behaviors
            .values()
            .flat_map(|b| b.event_handlers.keys().cloned())
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Name of the behavior active for `state`.
    pub fn behavior_name(&self, state: &S) -> &str {
        match self.selector {
            Some(select) => select(state),
            None => DEFAULT_BEHAVIOR,
        }
    }

    /// The behavior active for `state`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Defect`] when the selector names an unregistered behavior.
    pub fn active_behavior(&self, state: &S) -> Result<&Behavior<S, E>> {
        let name = self.behavior_name(state);
        self.behaviors.get(name).ok_or_else(|| {
            DispatchError::Defect(format!(
                "{} selected unknown behavior {name}",
                self.service_name
            ))
        })
    }

    /// Fold one event into `state` using the behavior active for `state`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownEvent`] when the active behavior has no handler
    /// for the event's type.
    pub fn apply(&self, event: &E, state: S) -> Result<S> {
        let behavior = self.active_behavior(&state)?;
        let handler = behavior.event_handler(event.event_type()).ok_or_else(|| {
            DispatchError::UnknownEvent {
                service: self.service_name.clone(),
                event_type: event.event_type().to_string(),
            }
        })?;
        Ok(handler(event, state))
    }
}
