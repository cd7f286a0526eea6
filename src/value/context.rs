//! Command context for value entities.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::context::{CommandContext, ContextParts};

/// [`CommandContext`] plus the state directive recorded by the handler.
#[derive(Debug)]
pub struct ValueEntityContext<S> {
    base: CommandContext,
    updated_state: Option<S>,
    delete_requested: bool,
}

impl<S> ValueEntityContext<S> {
    pub(crate) fn new(entity_id: &str, command_name: &str) -> Self {
        Self {
            base: CommandContext::new(entity_id, command_name),
            updated_state: None,
            delete_requested: false,
        }
    }

    /// Replace the entity state once the handler returns successfully.
    ///
    /// A later call replaces the earlier one.
    pub fn update_state(&mut self, state: S) {
        debug!(command = %self.base.command_name(), "state update requested");
        self.updated_state = Some(state);
    }

    /// Delete the entity state. Wins over any update in the same invocation.
    pub fn delete_state(&mut self) {
        debug!(command = %self.base.command_name(), "state delete requested");
        self.delete_requested = true;
    }

    pub fn updated_state(&self) -> Option<&S> {
        self.updated_state.as_ref()
    }

    pub fn is_delete_requested(&self) -> bool {
        self.delete_requested
    }

    pub(crate) fn into_parts(self) -> (ContextParts, Option<S>, bool) {
        (
            self.base.into_parts(),
            self.updated_state,
            self.delete_requested,
        )
    }
}

impl<S> Deref for ValueEntityContext<S> {
    type Target = CommandContext;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<S> DerefMut for ValueEntityContext<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}
