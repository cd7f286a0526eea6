//! What a successful command hands back to the driver.

use crate::codec::Envelope;
use crate::context::{Effect, Forward};

/// An emitted event together with its position in the entity's log.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedEvent {
    /// 1-based, gap-free position in the entity's event log.
    pub sequence: u64,
    pub event: Envelope,
}

/// Value-entity persistence directive.
#[derive(Debug, Clone, PartialEq)]
pub enum StateAction {
    /// Persist the new state snapshot.
    Update(Envelope),
    /// Remove the persisted state.
    Delete,
}

/// Result of a successfully handled command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandOutcome {
    /// The encoded reply. `None` when the handler forwarded instead.
    pub reply: Option<Envelope>,
    /// Side effects, in declaration order.
    pub effects: Vec<Effect>,
    pub forward: Option<Forward>,
    /// Events to append, in emission order (event-sourced entities only).
    pub events: Vec<SequencedEvent>,
    /// State change to persist (value entities only).
    pub state_action: Option<StateAction>,
}

impl CommandOutcome {
    /// True when the driver should forward rather than reply.
    pub fn is_forward(&self) -> bool {
        self.forward.is_some()
    }
}
