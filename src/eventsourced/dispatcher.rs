//! Dispatcher owning one event-sourced entity instance.

use std::sync::Arc;

use tracing::{debug, error, info_span, warn};

use super::{EntityEvent, EventSourcedContext, EventSourcedEntity};
use crate::codec::Envelope;
use crate::error::{DispatchError, Result};
use crate::outcome::{CommandOutcome, SequencedEvent};
use crate::registry::{EntityInstance, EntityKind};

/// Holds the current state of one entity instance and its event log view.
///
/// Commands must be delivered one at a time per instance; `&mut self` on
/// [`handle_command`](Self::handle_command) is the only sequencing there is.
pub struct EventSourcedDispatcher<S, E> {
    entity: Arc<EventSourcedEntity<S, E>>,
    entity_id: String,
    state: S,
    sequence: u64,
    log: Vec<E>,
    enforce_sequence: bool,
}

impl<S, E> EventSourcedDispatcher<S, E>
where
    S: Clone + Send + 'static,
    E: EntityEvent,
{
    /// Start an instance with an empty log: `state = initial(entity_id)`.
    pub fn new(entity: Arc<EventSourcedEntity<S, E>>, entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        let state = entity.initial_state(&entity_id);
        Self {
            entity,
            entity_id,
            state,
            sequence: 0,
            log: Vec::new(),
            enforce_sequence: true,
        }
    }

    /// Rebuild an instance by folding a stored log, in order, from `initial`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownEvent`] if any stored event has no fold function.
    pub fn replay<I>(
        entity: Arc<EventSourcedEntity<S, E>>,
        entity_id: impl Into<String>,
        events: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = E>,
    {
        let mut dispatcher = Self::new(entity, entity_id);
        for event in events {
            dispatcher.handle_event(event)?;
        }
        Ok(dispatcher)
    }

    /// Whether [`handle_event_at`](Self::handle_event_at) rejects gaps and reordering.
    pub fn with_sequence_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_sequence = enforce;
        self
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Sequence number of the last applied event; 0 for an empty log.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Every event applied to this instance, in order.
    pub fn events(&self) -> &[E] {
        &self.log
    }

    pub fn entity(&self) -> &EventSourcedEntity<S, E> {
        &self.entity
    }

    /// Handle one command.
    ///
    /// The handler runs against the current state. Its events are then folded,
    /// in emission order, into a working copy of the state which replaces the
    /// current state only if the command succeeds. A declared failure, a codec
    /// error or an unknown event leaves the state, sequence and log untouched.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::UnknownCommand`] if the active behavior has no handler.
    /// - [`DispatchError::Rejected`] if the handler failed the command.
    /// - [`DispatchError::Codec`] if the payload, reply or an event can't be (de)coded.
    /// - [`DispatchError::UnknownEvent`] if an emitted event has no fold function.
    pub fn handle_command(&mut self, command_name: &str, payload: &Envelope) -> Result<CommandOutcome> {
        let span = info_span!(
            "handle_command",
            service = %self.entity.service_name(),
            entity_id = %self.entity_id,
            command = %command_name,
        );
        let _enter = span.enter();

        let behavior = self.entity.active_behavior(&self.state)?;
        let Some(handler) = behavior.command_handler(command_name) else {
            error!("no handler for command");
            return Err(DispatchError::UnknownCommand {
                service: self.entity.service_name().to_string(),
                command: command_name.to_string(),
            });
        };

        let mut ctx = EventSourcedContext::new(&self.entity_id, command_name, self.sequence);
        let reply = handler(payload, &self.state, &mut ctx);
        let (parts, emitted) = ctx.into_parts();

        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                if err.is_declared_failure() {
                    warn!(error = %err, "command rejected");
                } else {
                    error!(error = %err, "command failed");
                }
                return Err(err);
            }
        };
        if let Some(failure) = parts.failure {
            warn!(reason = %failure.reason, discarded_events = emitted.len(), "command rejected");
            return Err(failure.into());
        }

        let mut next = self.state.clone();
        let mut sequence = self.sequence;
        let mut applied = Vec::with_capacity(emitted.len());
        for event in &emitted {
            next = self.entity.apply(event, next).inspect_err(|err| {
                error!(error = %err, "emitted event could not be applied");
            })?;
            sequence = self.next_sequence(sequence)?;
            applied.push(SequencedEvent {
                sequence,
                event: event.to_envelope()?,
            });
            debug!(event_type = event.event_type(), sequence, "event applied");
        }

        self.state = next;
        self.sequence = sequence;
        self.log.extend(emitted);

        let reply = parts.forward.is_none().then_some(reply);
        Ok(CommandOutcome {
            reply,
            effects: parts.effects,
            forward: parts.forward,
            events: applied,
            state_action: None,
        })
    }

    /// Fold one event into the state and append it to the log view.
    ///
    /// This is the only path by which the state of an event-sourced entity changes
    /// outside of [`handle_command`](Self::handle_command); it is what replay uses.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownEvent`] if the active behavior has no fold function.
    pub fn handle_event(&mut self, event: E) -> Result<()> {
        let next_sequence = self.next_sequence(self.sequence)?;
        self.apply_at(next_sequence, event)
    }

    /// Decode and fold an event received as an envelope.
    pub fn handle_event_envelope(&mut self, event: &Envelope) -> Result<()> {
        self.handle_event(E::from_envelope(event)?)
    }

    /// Fold an event the driver delivered with its stored sequence number.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Defect`] when `sequence` does not advance past the last
    /// applied event or, with sequence enforcement on, is not exactly one past it.
    pub fn handle_event_at(&mut self, sequence: u64, event: &Envelope) -> Result<()> {
        let expected = self.next_sequence(self.sequence)?;
        let in_order = if self.enforce_sequence {
            sequence == expected
        } else {
            sequence >= expected
        };
        if !in_order {
            error!(
                entity_id = %self.entity_id,
                expected,
                sequence,
                "event out of sequence"
            );
            return Err(DispatchError::Defect(format!(
                "event sequence {sequence} on {}, expected {expected}",
                self.entity_id
            )));
        }
        let event = E::from_envelope(event)?;
        self.apply_at(sequence, event)
    }

    fn next_sequence(&self, sequence: u64) -> Result<u64> {
        sequence.checked_add(1).ok_or_else(|| {
            error!(entity_id = %self.entity_id, "event sequence exhausted");
            DispatchError::Defect(format!("event sequence of {} exhausted", self.entity_id))
        })
    }

    fn apply_at(&mut self, sequence: u64, event: E) -> Result<()> {
        let state = self.state.clone();
        self.state = self.entity.apply(&event, state)?;
        self.sequence = sequence;
        debug!(
            entity_id = %self.entity_id,
            event_type = event.event_type(),
            sequence,
            "event applied"
        );
        self.log.push(event);
        Ok(())
    }
}

impl<S, E> EntityInstance for EventSourcedDispatcher<S, E>
where
    S: Clone + Send + 'static,
    E: EntityEvent,
{
    fn service_name(&self) -> &str {
        self.entity.service_name()
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::EventSourced
    }

    fn handle_command(&mut self, command_name: &str, payload: &Envelope) -> Result<CommandOutcome> {
        EventSourcedDispatcher::handle_command(self, command_name, payload)
    }

    fn handle_event(&mut self, sequence: u64, event: &Envelope) -> Result<()> {
        self.handle_event_at(sequence, event)
    }
}
