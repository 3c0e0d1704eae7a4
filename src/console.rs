//! Console shim routed through `tracing`.
//!
//! Installs a `console` global with the usual level methods. Arguments
//! are coerced to text with the script's own `String` conversion and
//! joined with spaces, so logging a proxy or an object never throws.

use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Value};

use crate::error::Result;

fn coerce<'js>(cx: &Ctx<'js>, value: Value<'js>) -> String {
    if let Ok(convert) = cx.globals().get::<_, Function>("String") {
        if let Ok(text) = convert.call::<_, String>((value,)) {
            return text;
        }
    }
    "?".to_string()
}

fn join<'js>(cx: &Ctx<'js>, args: Vec<Value<'js>>) -> String {
    args.into_iter()
        .map(|arg| coerce(cx, arg))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn install<'js>(ctx: &Ctx<'js>) -> Result<()> {
    let console = Object::new(ctx.clone())?;

    console.set(
        "log",
        Function::new(ctx.clone(), |cx: Ctx<'js>, args: Rest<Value<'js>>| {
            tracing::info!(target: "caramel::console", "{}", join(&cx, args.0));
        })?,
    )?;

    console.set(
        "info",
        Function::new(ctx.clone(), |cx: Ctx<'js>, args: Rest<Value<'js>>| {
            tracing::info!(target: "caramel::console", "{}", join(&cx, args.0));
        })?,
    )?;

    console.set(
        "warn",
        Function::new(ctx.clone(), |cx: Ctx<'js>, args: Rest<Value<'js>>| {
            tracing::warn!(target: "caramel::console", "{}", join(&cx, args.0));
        })?,
    )?;

    console.set(
        "error",
        Function::new(ctx.clone(), |cx: Ctx<'js>, args: Rest<Value<'js>>| {
            tracing::error!(target: "caramel::console", "{}", join(&cx, args.0));
        })?,
    )?;

    console.set(
        "debug",
        Function::new(ctx.clone(), |cx: Ctx<'js>, args: Rest<Value<'js>>| {
            tracing::debug!(target: "caramel::console", "{}", join(&cx, args.0));
        })?,
    )?;

    ctx.globals().set("console", console)?;
    Ok(())
}
