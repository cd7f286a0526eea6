use super::*;

fn ctx() -> CommandContext {
    CommandContext::new("cart-1", "AddItem")
}

#[test]
fn test_new_context_is_empty() {
    let ctx = ctx();
    assert_eq!(ctx.entity_id(), "cart-1");
    assert_eq!(ctx.command_name(), "AddItem");
    assert!(ctx.effects().is_empty());
    assert!(ctx.forward_to().is_none());
    assert!(!ctx.is_failed());
}

#[test]
fn test_fail_records_failure() {
    let mut ctx = ctx();
    ctx.fail("out of stock");
    assert!(ctx.is_failed());
    assert_eq!(ctx.failure().unwrap().reason, "out of stock");
}

#[test]
fn test_second_fail_replaces_reason() {
    let mut ctx = ctx();
    ctx.fail("first");
    ctx.fail("second");
    assert_eq!(ctx.failure().unwrap().reason, "second");
}

#[test]
fn test_effects_keep_declaration_order() {
    let mut ctx = ctx();
    ctx.effect("example.Inventory/Reserve", &"sku-1".to_string(), false, Metadata::new())
        .unwrap();

    let mut metadata = Metadata::new();
    metadata.insert("trace".to_string(), "abc".to_string());
    ctx.effect("example.Audit/Record", &7i64, true, metadata.clone())
        .unwrap();

    let effects = ctx.effects();
    assert_eq!(effects.len(), 2);
    assert_eq!(effects[0].service_method, "example.Inventory/Reserve");
    assert!(!effects[0].synchronous);
    assert_eq!(effects[1].service_method, "example.Audit/Record");
    assert!(effects[1].synchronous);
    assert_eq!(effects[1].metadata, metadata);
    assert_eq!(effects[1].payload, 7i64.to_envelope().unwrap());
}

#[test]
fn test_forward_replaces_previous() {
    let mut ctx = ctx();
    ctx.forward("example.A/One", &1i32).unwrap();
    ctx.forward("example.B/Two", &2i32).unwrap();

    let forward = ctx.forward_to().unwrap();
    assert_eq!(forward.service_method, "example.B/Two");
    assert_eq!(forward.payload, 2i32.to_envelope().unwrap());
}

#[test]
fn test_into_parts_hands_back_everything() {
    let mut ctx = ctx();
    ctx.effect("example.A/One", &true, false, Metadata::new())
        .unwrap();
    ctx.forward("example.B/Two", &()).unwrap();
    ctx.fail("nope");

    let parts = ctx.into_parts();
    assert_eq!(parts.effects.len(), 1);
    assert!(parts.forward.is_some());
    assert_eq!(parts.failure, Some(CommandRejected::new("nope")));
}
