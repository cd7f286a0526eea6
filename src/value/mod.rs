//! Value entities.
//!
//! A value entity keeps one state snapshot instead of an event log. Handlers
//! request an update or a delete through their [`ValueEntityContext`]; the
//! dispatcher applies it only if the command succeeds and reports it as a
//! [`StateAction`](crate::outcome::StateAction) for the driver to persist.

mod context;
mod dispatcher;

pub use context::ValueEntityContext;
pub use dispatcher::ValueEntityDispatcher;

use std::collections::HashMap;
use std::time::Duration;

use crate::codec::{Envelope, Payload};
use crate::error::{CommandResult, Result};

pub(crate) type ValueCommandFn<S> =
    Box<dyn Fn(&Envelope, &S, &mut ValueEntityContext<S>) -> Result<Envelope> + Send + Sync>;

/// Definition of a value entity type.
pub struct ValueEntity<S> {
    service_name: String,
    initial: Box<dyn Fn(&str) -> S + Send + Sync>,
    command_handlers: HashMap<String, ValueCommandFn<S>>,
    passivation_timeout: Option<Duration>,
}

impl<S: Payload + Clone + Send + 'static> ValueEntity<S> {
    /// `initial` builds the state of an entity that has never been persisted,
    /// and the state a deleted entity reverts to.
    pub fn new<I>(service_name: impl Into<String>, initial: I) -> Self
    where
        I: Fn(&str) -> S + Send + Sync + 'static,
    {
        Self {
            service_name: service_name.into(),
            initial: Box::new(initial),
            command_handlers: HashMap::new(),
            passivation_timeout: None,
        }
    }

    /// Register a command handler.
    pub fn command<C, R, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        C: Payload + 'static,
        R: Payload + 'static,
        F: Fn(C, &S, &mut ValueEntityContext<S>) -> CommandResult<R> + Send + Sync + 'static,
    {
        let erased: ValueCommandFn<S> = Box::new(
            move |payload: &Envelope, state: &S, ctx: &mut ValueEntityContext<S>| {
                let command = C::from_envelope(payload)?;
                let reply = handler(command, state, ctx)?;
                Ok(reply.to_envelope()?)
            },
        );
        self.command_handlers.insert(name.into(), erased);
        self
    }

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

    pub fn initial_state(&self, entity_id: &str) -> S {
        (self.initial)(entity_id)
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.command_handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn command_handler(&self, name: &str) -> Option<&ValueCommandFn<S>> {
        self.command_handlers.get(name)
    }
}
