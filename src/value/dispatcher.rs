use std::sync::Arc;

use tracing::{debug, error, info_span, warn};

use super::{ValueEntity, ValueEntityContext};
use crate::codec::{Envelope, Payload};
use crate::error::{DispatchError, Result};
use crate::outcome::{CommandOutcome, StateAction};
use crate::registry::{EntityInstance, EntityKind};

/// Holds the current state of one value entity instance.
pub struct ValueEntityDispatcher<S> {
    entity: Arc<ValueEntity<S>>,
    entity_id: String,
    state: S,
}

impl<S: Payload + Clone + Send + 'static> ValueEntityDispatcher<S> {
    /// Start an instance with no persisted state.
    pub fn new(entity: Arc<ValueEntity<S>>, entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        let state = entity.initial_state(&entity_id);
        Self {
            entity,
            entity_id,
            state,
        }
    }

    /// Restore an instance from its persisted snapshot.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Codec`] if the snapshot does not decode as `S`.
    pub fn recover(
        entity: Arc<ValueEntity<S>>,
        entity_id: impl Into<String>,
        snapshot: &Envelope,
    ) -> Result<Self> {
        let state = S::from_envelope(snapshot)?;
        let entity_id = entity_id.into();
        debug!(service = %entity.service_name(), entity_id = %entity_id, "value entity recovered");
        Ok(Self {
            entity,
            entity_id,
            state,
        })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn entity(&self) -> &ValueEntity<S> {
        &self.entity
    }

    /// Handle one command.
    ///
    /// On success a delete request resets the state to `initial` and wins over
    /// an update; otherwise an update replaces the state. On failure neither
    /// is applied.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::UnknownCommand`] if no handler is registered.
    /// - [`DispatchError::Rejected`] if the handler failed the command.
    /// - [`DispatchError::Codec`] if the payload or reply can't be (de)coded.
    /// - [`DispatchError::Defect`] if the updated state can't be encoded.
    pub fn handle_command(&mut self, command_name: &str, payload: &Envelope) -> Result<CommandOutcome> {
        let span = info_span!(
            "handle_command",
            service = %self.entity.service_name(),
            entity_id = %self.entity_id,
            command = %command_name,
        );
        let _enter = span.enter();

        let Some(handler) = self.entity.command_handler(command_name) else {
            error!("no handler for command");
            return Err(DispatchError::UnknownCommand {
                service: self.entity.service_name().to_string(),
                command: command_name.to_string(),
            });
        };

        let mut ctx = ValueEntityContext::new(&self.entity_id, command_name);
        let reply = handler(payload, &self.state, &mut ctx);
        let (parts, updated_state, delete_requested) = ctx.into_parts();

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
            warn!(reason = %failure.reason, "command rejected");
            return Err(failure.into());
        }

        let state_action = if delete_requested {
            self.state = self.entity.initial_state(&self.entity_id);
            debug!("state deleted");
            Some(StateAction::Delete)
        } else if let Some(next) = updated_state {
            let snapshot = next.to_envelope().map_err(|err| {
                error!(error = %err, "updated state could not be encoded");
                DispatchError::Defect(format!(
                    "state of {} could not be encoded: {err}",
                    self.entity_id
                ))
            })?;
            self.state = next;
            debug!("state updated");
            Some(StateAction::Update(snapshot))
        } else {
            None
        };

        let reply = parts.forward.is_none().then_some(reply);
        Ok(CommandOutcome {
            reply,
            effects: parts.effects,
            forward: parts.forward,
            events: Vec::new(),
            state_action,
        })
    }
}

impl<S: Payload + Clone + Send + 'static> EntityInstance for ValueEntityDispatcher<S> {
    fn service_name(&self) -> &str {
        self.entity.service_name()
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Value
    }

    fn handle_command(&mut self, command_name: &str, payload: &Envelope) -> Result<CommandOutcome> {
        ValueEntityDispatcher::handle_command(self, command_name, payload)
    }

    fn handle_event(&mut self, _sequence: u64, _event: &Envelope) -> Result<()> {
        Err(DispatchError::Defect(format!(
            "value entity {} does not accept events",
            self.entity_id
        )))
    }
}
