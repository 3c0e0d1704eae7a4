//! Proxied host objects: translated members, live mutation, enumeration

use super::{Sample, bridge, caught, eval_in, nested_sample, sample};
use caramel::{Error, HostFunction, HostRef, HostValue};

#[test]
fn test_translated_fields_read_host_values() {
    let ctx = bridge();
    ctx.publish_proxy("s", sample()).unwrap();

    assert_eq!(eval_in(&ctx, "s.int"), HostValue::Int(42));
    assert_eq!(eval_in(&ctx, "s.float64"), HostValue::Float(21.5));
    assert_eq!(
        eval_in(&ctx, "s.foo"),
        HostValue::Array(vec![
            HostValue::Int(1),
            HostValue::Int(2),
            HostValue::Int(3),
        ])
    );
}

#[test]
fn test_unknown_property_read_throws() {
    let ctx = bridge();
    ctx.publish_proxy("s", sample()).unwrap();

    // Catchable script-side, with the member name in the message.
    let text = caught(&ctx, "s.missing");
    assert!(text.contains("undefined property: missing"), "{text}");

    // Uncaught, it surfaces host-side as a script exception.
    let err = ctx.eval("s.alsoMissing").unwrap_err();
    assert!(matches!(err, Error::Script { .. }), "{err}");
    assert!(err.to_string().contains("undefined property"), "{err}");
}

#[test]
fn test_field_writes_reach_the_host() {
    let ctx = bridge();
    let shared = sample();
    ctx.publish_proxy("s", shared.clone()).unwrap();

    assert_eq!(eval_in(&ctx, "s.int = 7; s.int"), HostValue::Int(7));
    assert_eq!(shared.downcast::<Sample>().unwrap().int, 7);

    eval_in(&ctx, "s.foo = [9, 8]");
    assert_eq!(shared.downcast::<Sample>().unwrap().foo, vec![9, 8]);
}

#[test]
fn test_method_name_writes_are_soft() {
    let ctx = bridge();
    ctx.publish_proxy("s", sample()).unwrap();

    // The write reports failure without throwing, and the method survives.
    assert_eq!(
        eval_in(&ctx, "s.multiply = 99; typeof s.multiply"),
        HostValue::Str("function".to_string())
    );
    assert_eq!(eval_in(&ctx, "s.multiply(2)"), HostValue::Int(84));
}

#[test]
fn test_methods_return_declared_outputs() {
    let ctx = bridge();
    ctx.publish_proxy("s", sample()).unwrap();

    assert_eq!(eval_in(&ctx, "s.multiply(3)"), HostValue::Int(126));
    assert_eq!(
        eval_in(&ctx, "s.string()"),
        HostValue::Str("qux".to_string())
    );
}

#[test]
fn test_method_extracted_as_value_stays_bound() {
    let ctx = bridge();
    ctx.publish_proxy("s", sample()).unwrap();

    assert_eq!(
        eval_in(&ctx, "var m = s.multiply; m(2)"),
        HostValue::Int(84)
    );
}

#[test]
fn test_enumeration_follows_declaration_order() {
    let ctx = bridge();
    ctx.publish_proxy("s", sample()).unwrap();

    assert_eq!(
        eval_in(&ctx, "Object.keys(s).join(',')"),
        HostValue::Str("int,float64,empty,nested,foo,multiply,string".to_string())
    );
}

#[test]
fn test_membership_via_in() {
    let ctx = bridge();
    ctx.publish_proxy("s", sample()).unwrap();

    assert_eq!(eval_in(&ctx, "'int' in s"), HostValue::Bool(true));
    assert_eq!(eval_in(&ctx, "'multiply' in s"), HostValue::Bool(true));
    assert_eq!(eval_in(&ctx, "'missing' in s"), HostValue::Bool(false));
    // Host spellings are not script members.
    assert_eq!(eval_in(&ctx, "'Int' in s"), HostValue::Bool(false));
}

#[test]
fn test_nested_composites_share_identity() {
    let ctx = bridge();
    let (outer, inner) = nested_sample();
    ctx.publish_proxy("s", outer).unwrap();

    assert_eq!(eval_in(&ctx, "s.nested.int"), HostValue::Int(5));
    assert_eq!(eval_in(&ctx, "s.nested.multiply(4)"), HostValue::Int(20));

    // A write through the outer path lands on the one shared object.
    eval_in(&ctx, "s.nested.int = 11");
    assert_eq!(inner.downcast::<Sample>().unwrap().int, 11);
    assert_eq!(eval_in(&ctx, "s.nested.int"), HostValue::Int(11));
}

#[test]
fn test_nil_composite_rejects_members() {
    let ctx = bridge();
    ctx.publish_proxy("s", sample()).unwrap();

    // The unset slot still proxies, but every member access fails.
    assert_eq!(eval_in(&ctx, "typeof s.empty"), HostValue::Str("object".to_string()));
    let text = caught(&ctx, "s.empty.foo");
    assert!(text.contains("undefined property"), "{text}");
}

#[test]
fn test_map_objects_use_raw_keys() {
    let ctx = bridge();
    let mut map = indexmap::IndexMap::new();
    map.insert("Exact".to_string(), HostValue::Int(1));
    map.insert("lower".to_string(), HostValue::Str("x".to_string()));
    ctx.publish_proxy("m", HostRef::new(map)).unwrap();

    // No translation for maps; the raw key is the member.
    assert_eq!(eval_in(&ctx, "m.Exact"), HostValue::Int(1));
    assert_eq!(eval_in(&ctx, "m.lower"), HostValue::Str("x".to_string()));
    // Missing keys read as undefined instead of throwing.
    assert_eq!(eval_in(&ctx, "m.absent"), HostValue::Null);

    eval_in(&ctx, "m.added = 7");
    assert_eq!(
        eval_in(&ctx, "Object.keys(m).join(',')"),
        HostValue::Str("Exact,lower,added".to_string())
    );
}

#[test]
fn test_proxy_round_trip_preserves_identity() {
    let ctx = bridge();
    let shared = sample();
    ctx.publish_proxy("s", shared.clone()).unwrap();

    let original = shared.clone();
    ctx.publish_function(
        "isSame",
        HostFunction::new(move |candidate: HostRef| candidate.ptr_eq(&original)),
    )
    .unwrap();

    assert_eq!(eval_in(&ctx, "isSame(s)"), HostValue::Bool(true));
}

#[test]
fn test_unresolvable_handle_is_rejected() {
    let ctx = bridge();

    // A plain object wearing the reserved marker is not a bridge proxy.
    let err = ctx
        .eval("({ '\\u0001hostProxyHandle': 999999 })")
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedHandle), "{err}");
}

#[test]
fn test_snapshot_fields_detach_methods_stay_live() {
    let ctx = bridge();
    let shared = sample();
    ctx.publish_struct("snap", shared.clone()).unwrap();
    ctx.publish_proxy("live", shared.clone()).unwrap();

    shared.downcast::<Sample>().unwrap().int = 100;

    // The snapshot keeps publication-time fields; the proxy tracks the
    // host; methods on both dispatch against the live object.
    assert_eq!(eval_in(&ctx, "snap.int"), HostValue::Int(42));
    assert_eq!(eval_in(&ctx, "live.int"), HostValue::Int(100));
    assert_eq!(eval_in(&ctx, "snap.multiply(1)"), HostValue::Int(100));
}

#[test]
fn test_published_constructor_builds_fresh_objects() {
    let ctx = bridge();
    ctx.publish_type::<Sample>("Sample").unwrap();

    assert_eq!(eval_in(&ctx, "var a = Sample(); a.int"), HostValue::Int(42));
    // Each call constructs an independent object.
    assert_eq!(
        eval_in(&ctx, "var b = Sample(); b.int = 1; a.int"),
        HostValue::Int(42)
    );
    assert_eq!(eval_in(&ctx, "b.multiply(3)"), HostValue::Int(3));
}
