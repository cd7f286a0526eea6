//! Command context for event-sourced entities.

use std::ops::{Deref, DerefMut};

use crate::context::{CommandContext, ContextParts};

/// [`CommandContext`] plus the events emitted by the handler.
///
/// Emitted events are not applied until the handler returns; the handler
/// always sees the state as it was when the command arrived.
#[derive(Debug)]
pub struct EventSourcedContext<E> {
    base: CommandContext,
    sequence: u64,
    events: Vec<E>,
}

impl<E> EventSourcedContext<E> {
    pub(crate) fn new(entity_id: &str, command_name: &str, sequence: u64) -> Self {
        Self {
            base: CommandContext::new(entity_id, command_name),
            sequence,
            events: Vec::new(),
        }
    }

    /// Emit an event. Events are applied in emission order.
    pub fn emit(&mut self, event: E) {
        self.events.push(event);
    }

    /// Events emitted so far by this command.
    pub fn events(&self) -> &[E] {
        &self.events
    }

    /// Sequence number of the last event applied before this command.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn into_parts(self) -> (ContextParts, Vec<E>) {
        (self.base.into_parts(), self.events)
    }
}

impl<E> Deref for EventSourcedContext<E> {
    type Target = CommandContext;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<E> DerefMut for EventSourcedContext<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}
