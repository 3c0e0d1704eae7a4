//! Published host functions and script callbacks crossing the boundary

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{bridge, caught, eval_in};
use caramel::{
    Error, HostFunction, HostValue, Json, ScriptCallback, TypeTag, Variadic,
};

#[test]
fn test_fixed_arity_call() {
    let ctx = bridge();
    ctx.publish_function("inc", HostFunction::new(|n: i64| n + 1))
        .unwrap();

    assert_eq!(eval_in(&ctx, "inc(41)"), HostValue::Int(42));
}

#[test]
fn test_missing_arguments_zero_fill() {
    let ctx = bridge();
    ctx.publish_function(
        "join3",
        HostFunction::new(|a: String, b: String, c: bool| format!("{a}|{b}|{c}")),
    )
    .unwrap();

    assert_eq!(
        eval_in(&ctx, "join3('x')"),
        HostValue::Str("x||false".to_string())
    );
    assert_eq!(
        eval_in(&ctx, "join3('x', 'y', true)"),
        HostValue::Str("x|y|true".to_string())
    );
}

#[test]
fn test_surplus_arguments_are_ignored() {
    let ctx = bridge();
    ctx.publish_function("inc", HostFunction::new(|n: i64| n + 1))
        .unwrap();

    // The extras would not even decode as integers; they must never be
    // converted at all.
    assert_eq!(eval_in(&ctx, "inc(1, 99, 'junk')"), HostValue::Int(2));
}

#[test]
fn test_variadic_tail_collects_the_rest() {
    let ctx = bridge();
    ctx.publish_function(
        "sum",
        HostFunction::new(|prefix: String, rest: Variadic<i64>| {
            let total: i64 = rest.iter().sum();
            format!("{prefix}{total}")
        }),
    )
    .unwrap();

    assert_eq!(
        eval_in(&ctx, "sum('=', 1, 2, 3)"),
        HostValue::Str("=6".to_string())
    );
    assert_eq!(eval_in(&ctx, "sum('=')"), HostValue::Str("=0".to_string()));
    // Below the fixed arity the prefix zero-fills and the tail is empty.
    assert_eq!(eval_in(&ctx, "sum()"), HostValue::Str("0".to_string()));
}

#[test]
fn test_argument_decode_mismatch_is_fatal() {
    let ctx = bridge();
    ctx.publish_function("inc", HostFunction::new(|n: i64| n + 1))
        .unwrap();

    let text = caught(&ctx, "inc('nope')");
    assert!(text.contains("cannot decode"), "{text}");
}

#[test]
fn test_fallible_functions_throw_their_error() {
    let ctx = bridge();
    ctx.publish_function(
        "div",
        HostFunction::new(|a: i64, b: i64| -> Result<i64, String> {
            if b == 0 {
                Err("division by zero".to_string())
            } else {
                Ok(a / b)
            }
        }),
    )
    .unwrap();

    assert_eq!(eval_in(&ctx, "div(10, 2)"), HostValue::Int(5));
    let text = caught(&ctx, "div(1, 0)");
    assert!(text.contains("division by zero"), "{text}");
}

#[test]
fn test_multiple_outputs_pack_into_an_array() {
    let ctx = bridge();
    ctx.publish_function("swap", HostFunction::new(|a: i64, b: i64| (b, a)))
        .unwrap();

    assert_eq!(
        eval_in(&ctx, "Array.isArray(swap(0, 0))"),
        HostValue::Bool(true)
    );
    assert_eq!(
        eval_in(&ctx, "var r = swap(1, 2); r[0] * 10 + r[1]"),
        HostValue::Int(21)
    );
}

#[test]
fn test_procedures_complete_as_undefined() {
    let ctx = bridge();
    let hits = Arc::new(AtomicUsize::new(0));
    let counted = hits.clone();
    ctx.publish_function(
        "note",
        HostFunction::new(move |_msg: String| {
            counted.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();

    assert_eq!(eval_in(&ctx, "note('x')"), HostValue::Null);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_any_parameter_accepts_every_kind() {
    let ctx = bridge();
    ctx.publish_function("kind", HostFunction::new(|v: HostValue| v.kind_name()))
        .unwrap();

    assert_eq!(eval_in(&ctx, "kind(1)"), HostValue::Str("int".to_string()));
    assert_eq!(
        eval_in(&ctx, "kind('x')"),
        HostValue::Str("string".to_string())
    );
    assert_eq!(
        eval_in(&ctx, "kind([1, 2])"),
        HostValue::Str("array".to_string())
    );
    assert_eq!(
        eval_in(&ctx, "kind({ a: 1 })"),
        HostValue::Str("map".to_string())
    );
    assert_eq!(
        eval_in(&ctx, "kind(null)"),
        HostValue::Str("null".to_string())
    );
}

#[test]
fn test_typed_json_parameters_decode_structurally() {
    #[derive(serde::Deserialize)]
    struct Point {
        x: f64,
        y: f64,
    }

    let ctx = bridge();
    ctx.publish_function(
        "describe",
        HostFunction::new(|Json(p): Json<Point>| format!("{}:{}", p.x, p.y)),
    )
    .unwrap();

    assert_eq!(
        eval_in(&ctx, "describe({ x: 3, y: 4 })"),
        HostValue::Str("3:4".to_string())
    );
}

#[test]
fn test_script_functions_decode_as_callbacks() {
    let ctx = bridge();
    ctx.publish_function(
        "apply",
        HostFunction::new(|cb: ScriptCallback, n: i64| -> caramel::Result<i64> {
            cb.call_typed(&[HostValue::Int(n)], &TypeTag::Int)?.to_i64()
        }),
    )
    .unwrap();

    assert_eq!(
        eval_in(&ctx, "apply(function (x) { return x + 1; }, 41)"),
        HostValue::Int(42)
    );
}

#[test]
fn test_helper_tokens_decode_as_callbacks() {
    let ctx = bridge();
    ctx.publish_function(
        "apply",
        HostFunction::new(|cb: ScriptCallback, n: i64| -> caramel::Result<i64> {
            cb.call_typed(&[HostValue::Int(n)], &TypeTag::Int)?.to_i64()
        }),
    )
    .unwrap();

    assert_eq!(
        eval_in(
            &ctx,
            "apply(Caramel.proxy(function (x) { return x * 2; }), 21)"
        ),
        HostValue::Int(42)
    );
}

#[test]
fn test_callback_exceptions_surface_in_the_call() {
    let ctx = bridge();
    ctx.publish_function(
        "apply",
        HostFunction::new(|cb: ScriptCallback, n: i64| -> caramel::Result<i64> {
            cb.call_typed(&[HostValue::Int(n)], &TypeTag::Int)?.to_i64()
        }),
    )
    .unwrap();

    let text = caught(&ctx, "apply(function () { throw new Error('boom'); }, 1)");
    assert!(text.contains("script callback failed"), "{text}");
    assert!(text.contains("boom"), "{text}");
}

#[test]
fn test_callbacks_survive_past_the_capturing_call() {
    let ctx = bridge();
    let stash: Arc<Mutex<Option<ScriptCallback>>> = Arc::new(Mutex::new(None));
    let slot = stash.clone();
    ctx.publish_function(
        "keep",
        HostFunction::new(move |cb: ScriptCallback| {
            *slot.lock().unwrap() = Some(cb);
        }),
    )
    .unwrap();

    eval_in(&ctx, "keep(function (a, b) { return a + b; })");

    let cb = stash.lock().unwrap().take().unwrap();
    let out = cb
        .call(&[HostValue::Int(40), HostValue::Int(2)])
        .unwrap();
    assert_eq!(out, HostValue::Int(42));
}

#[test]
fn test_released_tokens_fail_the_callback() {
    let ctx = bridge();
    let stash: Arc<Mutex<Option<ScriptCallback>>> = Arc::new(Mutex::new(None));
    let slot = stash.clone();
    ctx.publish_function(
        "keep",
        HostFunction::new(move |cb: ScriptCallback| {
            *slot.lock().unwrap() = Some(cb);
        }),
    )
    .unwrap();

    eval_in(&ctx, "keep(function () { return 1; })");
    let cb = stash.lock().unwrap().take().unwrap();
    assert_eq!(cb.call(&[]).unwrap(), HostValue::Int(1));

    eval_in(&ctx, &format!("Caramel.release({})", cb.token()));
    let err = cb.call(&[]).unwrap_err();
    assert!(matches!(err, Error::Callback { .. }), "{err}");
    assert!(err.to_string().contains("unknown callback token"), "{err}");
}

#[test]
fn test_reentrant_calls_nest() {
    let ctx = bridge();
    ctx.publish_function(
        "outer",
        HostFunction::new(|cb: ScriptCallback| -> caramel::Result<i64> {
            cb.call_typed(&[], &TypeTag::Int)?.to_i64()
        }),
    )
    .unwrap();
    ctx.publish_function("base", HostFunction::new(|| 21i64))
        .unwrap();

    // Script calls the host, the host calls back into the script, and
    // that script code calls the host again, all on one engine frame.
    assert_eq!(
        eval_in(&ctx, "outer(function () { return base() * 2; })"),
        HostValue::Int(42)
    );
}
