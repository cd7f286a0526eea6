//! Event-sourced counter step definitions.

use std::sync::Arc;

use cucumber::{given, then, when, World};
use entity_dispatch::{
    CommandOutcome, DispatchError, EntityEvent, EventSourcedContext, EventSourcedDispatcher,
    EventSourcedEntity, Payload,
};
use prost::Message;
use serde::{Deserialize, Serialize};

/// Add command, carried as a protobuf message.
#[derive(Clone, PartialEq, Message)]
pub struct Add {
    #[prost(int64, tag = "1")]
    pub amount: i64,
}

entity_dispatch::proto_payload!(Add => "example.counter.Add");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CounterEvent {
    Added { amount: i64 },
}

entity_dispatch::json_payload!(CounterEvent => "example.counter.CounterEvent");

impl EntityEvent for CounterEvent {
    fn event_type(&self) -> &str {
        match self {
            CounterEvent::Added { .. } => "Added",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
    value: i64,
}

fn counter_entity() -> Arc<EventSourcedEntity<Counter, CounterEvent>> {
    Arc::new(
        EventSourcedEntity::new("example.Counter", |_id: &str| Counter::default())
            .command(
                "Add",
                |cmd: Add, _state: &Counter, ctx: &mut EventSourcedContext<CounterEvent>| {
                    if cmd.amount <= 0 {
                        ctx.fail("amount must be positive");
                    } else {
                        ctx.emit(CounterEvent::Added { amount: cmd.amount });
                    }
                    Ok(())
                },
            )
            .event("Added", |event: &CounterEvent, state: Counter| match event {
                CounterEvent::Added { amount } => Counter {
                    value: state.value + amount,
                },
            }),
    )
}

/// Test context for counter scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct CounterWorld {
    entity: Arc<EventSourcedEntity<Counter, CounterEvent>>,
    counter: Option<EventSourcedDispatcher<Counter, CounterEvent>>,
    replayed: Option<EventSourcedDispatcher<Counter, CounterEvent>>,
    last_result: Option<Result<CommandOutcome, DispatchError>>,
    last_event_error: Option<DispatchError>,
}

impl std::fmt::Debug for CounterWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterWorld")
            .field("state", &self.counter.as_ref().map(|c| c.state()))
            .field("last_result", &self.last_result)
            .finish()
    }
}

impl CounterWorld {
    fn new() -> Self {
        Self {
            entity: counter_entity(),
            counter: None,
            replayed: None,
            last_result: None,
            last_event_error: None,
        }
    }

    fn counter(&mut self) -> &mut EventSourcedDispatcher<Counter, CounterEvent> {
        self.counter.as_mut().expect("counter not created")
    }

    fn send(&mut self, command: &str, amount: i64) {
        let payload = Add { amount }.to_envelope().expect("encode command");
        let result = self.counter().handle_command(command, &payload);
        self.last_result = Some(result);
    }
}

// --- Given steps ---

#[given(expr = "a counter entity {string}")]
async fn given_counter(world: &mut CounterWorld, entity_id: String) {
    world.counter = Some(EventSourcedDispatcher::new(world.entity.clone(), entity_id));
}

// --- When steps ---

#[when(expr = "I send Add with amount {int}")]
async fn when_send_add(world: &mut CounterWorld, amount: i64) {
    world.send("Add", amount);
}

#[when(expr = "I send {string} with amount {int}")]
async fn when_send_named(world: &mut CounterWorld, command: String, amount: i64) {
    world.send(&command, amount);
}

#[when("I replay the event log into a fresh instance")]
async fn when_replay(world: &mut CounterWorld) {
    let log = world.counter().events().to_vec();
    let entity_id = world.counter().entity_id().to_string();
    let replayed =
        EventSourcedDispatcher::replay(world.entity.clone(), entity_id, log).expect("replay");
    world.replayed = Some(replayed);
}

#[when(expr = "the driver delivers an Added event of {int} at sequence {int}")]
async fn when_driver_delivers(world: &mut CounterWorld, amount: i64, sequence: u64) {
    let event = CounterEvent::Added { amount }
        .to_envelope()
        .expect("encode event");
    if let Err(err) = world.counter().handle_event_at(sequence, &event) {
        world.last_event_error = Some(err);
    }
}

// --- Then steps ---

#[then(expr = "the counter value is {int}")]
async fn then_counter_value(world: &mut CounterWorld, value: i64) {
    assert_eq!(world.counter().state().value, value);
}

#[then(expr = "the replayed counter value is {int}")]
async fn then_replayed_value(world: &mut CounterWorld, value: i64) {
    let live = world.counter().state().clone();
    let replayed = world.replayed.as_ref().expect("nothing replayed");
    assert_eq!(replayed.state().value, value);
    assert_eq!(replayed.state(), &live);
}

#[then(expr = "the event log is {string}")]
async fn then_event_log(world: &mut CounterWorld, expected: String) {
    let log: Vec<String> = world
        .counter()
        .events()
        .iter()
        .map(|event| match event {
            CounterEvent::Added { amount } => format!("Added({amount})"),
        })
        .collect();
    assert_eq!(log.join(", "), expected);
}

#[then(expr = "the last outcome carries {int} event with sequence {int}")]
async fn then_outcome_events(world: &mut CounterWorld, count: usize, sequence: u64) {
    let outcome = match &world.last_result {
        Some(Ok(outcome)) => outcome,
        other => panic!("expected a successful outcome, got {other:?}"),
    };
    assert_eq!(outcome.events.len(), count);
    assert_eq!(outcome.events[count - 1].sequence, sequence);
}

#[then(expr = "the command is rejected with {string}")]
async fn then_rejected(world: &mut CounterWorld, reason: String) {
    match &world.last_result {
        Some(Err(err)) => assert_eq!(err.rejection_reason(), Some(reason.as_str())),
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[then("the command fails as unknown")]
async fn then_unknown(world: &mut CounterWorld) {
    assert!(matches!(
        world.last_result,
        Some(Err(DispatchError::UnknownCommand { .. }))
    ));
}

#[then("the event is refused as out of sequence")]
async fn then_out_of_sequence(world: &mut CounterWorld) {
    assert!(matches!(
        world.last_event_error,
        Some(DispatchError::Defect(_))
    ));
}
