//! Value conversion across the boundary, both directions

use super::{bridge, eval_in};
use caramel::HostValue;

#[test]
fn test_primitives_round_trip() {
    let ctx = bridge();
    ctx.publish_value("n", HostValue::Int(42)).unwrap();
    ctx.publish_value("u", HostValue::Uint(7)).unwrap();
    ctx.publish_value("f", HostValue::Float(2.5)).unwrap();
    ctx.publish_value("b", HostValue::Bool(true)).unwrap();
    ctx.publish_value("s", HostValue::Str("héllo".to_string()))
        .unwrap();

    assert_eq!(eval_in(&ctx, "n"), HostValue::Int(42));
    // Unsignedness does not survive the trip; the value does.
    assert_eq!(eval_in(&ctx, "u"), HostValue::Int(7));
    assert_eq!(eval_in(&ctx, "f"), HostValue::Float(2.5));
    assert_eq!(eval_in(&ctx, "b"), HostValue::Bool(true));
    assert_eq!(eval_in(&ctx, "s"), HostValue::Str("héllo".to_string()));
    assert_eq!(eval_in(&ctx, "s.length"), HostValue::Int(5));
}

#[test]
fn test_integers_beyond_i32_publish_exactly() {
    let ctx = bridge();
    ctx.publish_value("wide", HostValue::Int(1_i64 << 40)).unwrap();
    ctx.publish_value("edge", HostValue::Int(i64::from(i32::MAX) + 1))
        .unwrap();

    assert_eq!(eval_in(&ctx, "wide"), HostValue::Int(1_i64 << 40));
    assert_eq!(eval_in(&ctx, "edge === 2147483648"), HostValue::Bool(true));
}

#[test]
fn test_integral_doubles_canonicalize_to_integers() {
    let ctx = bridge();
    ctx.publish_value("f", HostValue::Float(3.0)).unwrap();

    // Script numbers have one shape; the narrowest faithful host kind
    // wins on the way back.
    assert_eq!(eval_in(&ctx, "f === 3"), HostValue::Bool(true));
    assert_eq!(eval_in(&ctx, "f"), HostValue::Int(3));
    assert_eq!(eval_in(&ctx, "-0.5"), HostValue::Float(-0.5));
}

#[test]
fn test_arrays_marshal_elementwise() {
    let ctx = bridge();
    ctx.publish_value(
        "a",
        HostValue::Array(vec![
            HostValue::Int(1),
            HostValue::Str("two".to_string()),
            HostValue::Bool(true),
        ]),
    )
    .unwrap();

    assert_eq!(eval_in(&ctx, "a.length"), HostValue::Int(3));
    assert_eq!(eval_in(&ctx, "a[1]"), HostValue::Str("two".to_string()));
    assert_eq!(
        eval_in(&ctx, "a"),
        HostValue::Array(vec![
            HostValue::Int(1),
            HostValue::Str("two".to_string()),
            HostValue::Bool(true),
        ])
    );
}

#[test]
fn test_maps_keep_insertion_order() {
    let ctx = bridge();
    let mut entries = indexmap::IndexMap::new();
    entries.insert("one".to_string(), HostValue::Int(1));
    entries.insert("two".to_string(), HostValue::Int(2));
    ctx.publish_value("m", HostValue::Map(entries)).unwrap();

    assert_eq!(eval_in(&ctx, "m.one + m.two"), HostValue::Int(3));
    assert_eq!(
        eval_in(&ctx, "Object.keys(m).join(',')"),
        HostValue::Str("one,two".to_string())
    );
}

#[test]
fn test_script_objects_decode_in_insertion_order() {
    let ctx = bridge();
    let HostValue::Map(decoded) = eval_in(&ctx, "({ b: 1, a: 2 })") else {
        panic!("expected a map");
    };
    let keys: Vec<&str> = decoded.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["b", "a"]);
    assert_eq!(decoded.get("a"), Some(&HostValue::Int(2)));
}

#[test]
fn test_null_and_undefined_surface_as_null() {
    let ctx = bridge();
    ctx.publish_value("nothing", HostValue::Null).unwrap();

    assert_eq!(eval_in(&ctx, "nothing === null"), HostValue::Bool(true));
    assert_eq!(eval_in(&ctx, "undefined"), HostValue::Null);
    // Values with no structural form fold to null as well.
    assert_eq!(eval_in(&ctx, "(function () {})"), HostValue::Null);
}

#[test]
fn test_bytes_publish_as_text() {
    let ctx = bridge();
    ctx.publish_value("b", HostValue::Bytes(b"hi".to_vec()))
        .unwrap();

    assert_eq!(eval_in(&ctx, "b"), HostValue::Str("hi".to_string()));
    assert_eq!(eval_in(&ctx, "b.length"), HostValue::Int(2));
}

#[test]
fn test_json_values_publish_structurally() {
    let ctx = bridge();
    ctx.publish_value(
        "j",
        HostValue::Json(serde_json::json!({ "deep": { "list": [1, 2, 3] } })),
    )
    .unwrap();

    assert_eq!(eval_in(&ctx, "j.deep.list[2]"), HostValue::Int(3));
    assert_eq!(eval_in(&ctx, "j.deep.list.length"), HostValue::Int(3));
}

#[test]
fn test_nested_structures_round_trip() {
    let ctx = bridge();
    let value = eval_in(&ctx, "({ items: [1, 'x', { ok: true }], n: null })");
    let HostValue::Map(map) = value else {
        panic!("expected a map");
    };
    let HostValue::Array(items) = map.get("items").cloned().unwrap() else {
        panic!("expected an array");
    };
    assert_eq!(items[0], HostValue::Int(1));
    assert_eq!(items[1], HostValue::Str("x".to_string()));
    let HostValue::Map(inner) = items[2].clone() else {
        panic!("expected a map");
    };
    assert_eq!(inner.get("ok"), Some(&HostValue::Bool(true)));
    assert_eq!(map.get("n"), Some(&HostValue::Null));
}
