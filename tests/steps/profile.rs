//! Value entity profile step definitions.

use std::sync::Arc;

use cucumber::{given, then, when, World};
use entity_dispatch::{
    CommandOutcome, DispatchError, Payload, StateAction, ValueEntity, ValueEntityContext,
    ValueEntityDispatcher,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    name: String,
}

entity_dispatch::json_payload!(Profile => "example.profile.Profile");

fn profile_entity() -> Arc<ValueEntity<Profile>> {
    Arc::new(
        ValueEntity::new("example.Profile", |_id: &str| Profile::default())
            .command(
                "SetName",
                |name: String, _state: &Profile, ctx: &mut ValueEntityContext<Profile>| {
                    ctx.update_state(Profile { name: name.clone() });
                    if name == "admin" {
                        ctx.fail("name is reserved");
                    }
                    Ok(())
                },
            )
            .command(
                "Delete",
                |_: (), _state: &Profile, ctx: &mut ValueEntityContext<Profile>| {
                    ctx.delete_state();
                    Ok(())
                },
            ),
    )
}

/// Test context for profile scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct ProfileWorld {
    entity: Arc<ValueEntity<Profile>>,
    profile: Option<ValueEntityDispatcher<Profile>>,
    last_result: Option<Result<CommandOutcome, DispatchError>>,
}

impl std::fmt::Debug for ProfileWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileWorld")
            .field("state", &self.profile.as_ref().map(|p| p.state()))
            .field("last_result", &self.last_result)
            .finish()
    }
}

impl ProfileWorld {
    fn new() -> Self {
        Self {
            entity: profile_entity(),
            profile: None,
            last_result: None,
        }
    }

    fn profile(&mut self) -> &mut ValueEntityDispatcher<Profile> {
        self.profile.as_mut().expect("profile not created")
    }

    fn last_outcome(&self) -> &CommandOutcome {
        match &self.last_result {
            Some(Ok(outcome)) => outcome,
            other => panic!("expected a successful outcome, got {other:?}"),
        }
    }
}

// --- Given steps ---

#[given(expr = "a profile entity {string}")]
async fn given_profile(world: &mut ProfileWorld, entity_id: String) {
    world.profile = Some(ValueEntityDispatcher::new(world.entity.clone(), entity_id));
}

#[given(expr = "a profile {string} recovered with name {string}")]
async fn given_recovered_profile(world: &mut ProfileWorld, entity_id: String, name: String) {
    let snapshot = Profile { name }.to_envelope().expect("encode snapshot");
    let profile = ValueEntityDispatcher::recover(world.entity.clone(), entity_id, &snapshot)
        .expect("recover");
    world.profile = Some(profile);
}

// --- When steps ---

#[when(expr = "I set the name to {string}")]
async fn when_set_name(world: &mut ProfileWorld, name: String) {
    let payload = name.to_envelope().expect("encode name");
    let result = world.profile().handle_command("SetName", &payload);
    world.last_result = Some(result);
}

#[when("I delete the profile")]
async fn when_delete(world: &mut ProfileWorld) {
    let payload = ().to_envelope().expect("encode unit");
    let result = world.profile().handle_command("Delete", &payload);
    world.last_result = Some(result);
}

// --- Then steps ---

#[then(expr = "the profile name is {string}")]
async fn then_profile_name(world: &mut ProfileWorld, name: String) {
    assert_eq!(world.profile().state().name, name);
}

#[then("the driver is told to update the state")]
async fn then_update(world: &mut ProfileWorld) {
    let expected = world.profile().state().to_envelope().expect("encode state");
    assert_eq!(
        world.last_outcome().state_action,
        Some(StateAction::Update(expected))
    );
}

#[then("the driver is told to delete the state")]
async fn then_delete(world: &mut ProfileWorld) {
    assert_eq!(world.last_outcome().state_action, Some(StateAction::Delete));
}

#[then(expr = "the command is rejected with {string}")]
async fn then_rejected(world: &mut ProfileWorld, reason: String) {
    match &world.last_result {
        Some(Err(err)) => assert_eq!(err.rejection_reason(), Some(reason.as_str())),
        other => panic!("expected a rejection, got {other:?}"),
    }
}
