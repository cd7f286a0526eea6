//! Entity dispatch engine.
//!
//! Routes commands and events, delivered by an external proxy as opaque
//! [`Envelope`]s, to business handlers registered per entity type, and hands
//! back what the proxy must persist and execute. Two persistence models are
//! supported:
//!
//! - [`eventsourced`]: state is the fold of an event log; handlers emit events.
//! - [`value`]: state is a single snapshot; handlers update or delete it.
//!
//! [`codec`] converts between envelopes and primitive, JSON and protobuf
//! payloads.
//!
//! ```rust,ignore
//! let counter = Arc::new(
//!     EventSourcedEntity::new("example.Counter", |_id: &str| Counter::default())
//!         .command("Add", |cmd: Add, _state: &Counter, ctx: &mut EventSourcedContext<CounterEvent>| {
//!             ctx.emit(CounterEvent::Added { amount: cmd.amount });
//!             Ok(())
//!         })
//!         .event("Added", |event: &CounterEvent, state: Counter| state.apply(event)),
//! );
//!
//! let mut registry = EntityRegistry::with_config(EngineConfig::load(None)?);
//! registry.register_event_sourced(counter);
//! let mut instance = registry.instantiate("example.Counter", "c-1")?;
//! let outcome = instance.handle_command("Add", &Add { amount: 5 }.to_envelope()?)?;
//! ```

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod eventsourced;
pub mod outcome;
pub mod registry;
pub mod utils;
pub mod value;

pub use codec::{CodecError, Envelope, Kind, Payload, PrimitiveKind, Value};
pub use config::EngineConfig;
pub use context::{CommandContext, Effect, Forward, Metadata};
pub use error::{CommandRejected, CommandResult, DispatchError, Result};
pub use eventsourced::{
    Behavior, EntityEvent, EventSourcedContext, EventSourcedDispatcher, EventSourcedEntity,
};
pub use outcome::{CommandOutcome, SequencedEvent, StateAction};
pub use registry::{EntityDescriptor, EntityInstance, EntityKind, EntityRegistry};
pub use value::{ValueEntity, ValueEntityContext, ValueEntityDispatcher};
