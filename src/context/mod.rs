//! Per-command context.
//!
//! A [`CommandContext`] is built by the dispatcher for each `handle_command`
//! call and handed to the business handler by `&mut`. It records what the
//! handler asked for (side effects, a forward, a failure) without acting on
//! any of it; the driver executes effects and forwards after the dispatcher
//! returns.

use std::collections::BTreeMap;

use tracing::debug;

use crate::codec::{CodecError, Envelope, Payload};
use crate::error::CommandRejected;

/// Metadata attached to an effect or forward.
pub type Metadata = BTreeMap<String, String>;

/// A secondary call declared by the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    /// Fully-qualified target method, e.g. `example.Inventory/Reserve`.
    pub service_method: String,
    pub payload: Envelope,
    /// When true the driver must complete the call before replying.
    pub synchronous: bool,
    pub metadata: Metadata,
}

/// Directive to reply by forwarding to another method instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Forward {
    pub service_method: String,
    pub payload: Envelope,
    pub metadata: Metadata,
}

/// Everything a handler recorded, handed back by [`CommandContext::into_parts`].
#[derive(Debug, Default)]
pub(crate) struct ContextParts {
    pub effects: Vec<Effect>,
    pub forward: Option<Forward>,
    pub failure: Option<CommandRejected>,
}

/// Mutable record of one command invocation.
#[derive(Debug)]
pub struct CommandContext {
    entity_id: String,
    command_name: String,
    effects: Vec<Effect>,
    forward: Option<Forward>,
    failure: Option<CommandRejected>,
}

impl CommandContext {
    pub(crate) fn new(entity_id: impl Into<String>, command_name: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            command_name: command_name.into(),
            effects: Vec::new(),
            forward: None,
            failure: None,
        }
    }

    /// Identity of the entity handling the command.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Name of the command being handled.
    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    /// Reject the command.
    ///
    /// Does not abort the handler. Once it returns, anything it emitted or
    /// updated during this invocation is discarded. A later call replaces the
    /// reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let rejection = CommandRejected::new(reason);
        debug!(command = %self.command_name, reason = %rejection.reason, "command failed");
        self.failure = Some(rejection);
    }

    /// Declare a side effect. Effects are reported in declaration order.
    pub fn effect<P: Payload>(
        &mut self,
        service_method: impl Into<String>,
        payload: &P,
        synchronous: bool,
        metadata: Metadata,
    ) -> Result<(), CodecError> {
        let effect = Effect {
            service_method: service_method.into(),
            payload: payload.to_envelope()?,
            synchronous,
            metadata,
        };
        debug!(target_method = %effect.service_method, synchronous, "effect declared");
        self.effects.push(effect);
        Ok(())
    }

    /// Forward the command to another method. Replaces any earlier forward.
    pub fn forward<P: Payload>(
        &mut self,
        service_method: impl Into<String>,
        payload: &P,
    ) -> Result<(), CodecError> {
        self.forward_with_metadata(service_method, payload, Metadata::new())
    }

    /// Forward with metadata. Replaces any earlier forward.
    pub fn forward_with_metadata<P: Payload>(
        &mut self,
        service_method: impl Into<String>,
        payload: &P,
        metadata: Metadata,
    ) -> Result<(), CodecError> {
        let forward = Forward {
            service_method: service_method.into(),
            payload: payload.to_envelope()?,
            metadata,
        };
        debug!(target_method = %forward.service_method, "forward set");
        self.forward = Some(forward);
        Ok(())
    }

    /// Effects declared so far.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// The forward directive, if any.
    pub fn forward_to(&self) -> Option<&Forward> {
        self.forward.as_ref()
    }

    /// The recorded failure, if any.
    pub fn failure(&self) -> Option<&CommandRejected> {
        self.failure.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub(crate) fn into_parts(self) -> ContextParts {
        ContextParts {
            effects: self.effects,
            forward: self.forward,
            failure: self.failure,
        }
    }
}

#[cfg(test)]
mod tests;
