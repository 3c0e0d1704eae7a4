//! Conversions between [`HostValue`] and live engine values.
//!
//! Host to script is a direct walk. Script to host is layered: proxied
//! host objects are recognized first by their reserved handle property,
//! callable parameters capture functions (or numeric tokens) into the
//! script-side function table, and everything else goes through the
//! engine's JSON stringifier and decodes structurally against the target
//! tag. Values the stringifier cannot represent come back as
//! [`HostValue::Null`].

use std::sync::Arc;

use rquickjs::function::This;
use rquickjs::{Array, Ctx, Function, IntoJs, Null, Object, Undefined, Value};

use crate::context::{self, EngineCore};
use crate::error::{Error, Result};
use crate::function::ScriptCallback;
use crate::proxy;
use crate::registry::Handle;
use crate::value::{HostValue, TypeTag};

/// Property of the helper global holding captured script functions.
pub(crate) const FUNCTIONS_PROP: &str = "_functions";

/// Property of the helper global holding the next callback token.
pub(crate) const NEXT_TOKEN_PROP: &str = "_next";

/// Convert a host value into an engine value.
pub(crate) fn to_script<'js>(
    core: &Arc<EngineCore>,
    ctx: &Ctx<'js>,
    value: &HostValue,
) -> Result<Value<'js>> {
    let out = match value {
        HostValue::Null => Null.into_js(ctx)?,
        HostValue::Bool(b) => b.into_js(ctx)?,
        // Small integers stay integers; the rest become doubles, which
        // is what script arithmetic produces anyway.
        HostValue::Int(i) => match i32::try_from(*i) {
            Ok(small) => small.into_js(ctx)?,
            Err(_) => (*i as f64).into_js(ctx)?,
        },
        HostValue::Uint(u) => match i32::try_from(*u) {
            Ok(small) => small.into_js(ctx)?,
            Err(_) => (*u as f64).into_js(ctx)?,
        },
        HostValue::Float(f) => f.into_js(ctx)?,
        HostValue::Str(s) => s.as_str().into_js(ctx)?,
        HostValue::Bytes(b) => String::from_utf8_lossy(b).as_ref().into_js(ctx)?,
        HostValue::Array(items) => {
            let arr = Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                arr.set(i, to_script(core, ctx, item)?)?;
            }
            arr.into_value()
        }
        HostValue::Map(entries) => {
            let obj = Object::new(ctx.clone())?;
            for (key, item) in entries {
                obj.set(key.as_str(), to_script(core, ctx, item)?)?;
            }
            obj.into_value()
        }
        HostValue::Json(raw) => {
            let text = serde_json::to_string(raw)
                .map_err(|e| Error::decode("script value", e.to_string()))?;
            ctx.json_parse(text)?
        }
        HostValue::Object(host_ref) => proxy::make_proxy(core, ctx, host_ref.clone())?,
        HostValue::Function(func) => proxy::bind_host_function(core, ctx, func.clone())?,
        HostValue::Callback(cb) => stored_callback(ctx, cb.token)?,
    };
    Ok(out)
}

/// Convert an engine value into a host value against a target tag.
pub(crate) fn from_script<'js>(
    core: &Arc<EngineCore>,
    ctx: &Ctx<'js>,
    value: Value<'js>,
    tag: &TypeTag,
) -> Result<HostValue> {
    if matches!(tag, TypeTag::Callback) {
        return capture_callback(core, ctx, value);
    }

    // Proxied host objects carry the reserved handle property. They must
    // be recognized before the JSON walk, which would trip their traps.
    if let Some(obj) = value.as_object() {
        let marker: Value = obj.get(proxy::HANDLE_PROP)?;
        if marker.is_number() {
            let number: f64 = marker.get()?;
            let handle = Handle::from_number(number).ok_or(Error::UnexpectedHandle)?;
            let host_ref = core
                .registry
                .lock()
                .get(handle)
                .ok_or(Error::UnexpectedHandle)?;
            return Ok(HostValue::Object(host_ref));
        }
    }

    let text = match ctx.json_stringify(value)? {
        Some(s) => s.to_string()?,
        // Functions, undefined and friends have no JSON form.
        None => return Ok(HostValue::Null),
    };
    let raw: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| Error::decode(tag.describe(), e.to_string()))?;
    decode_tagged(raw, tag)
}

/// Decode a structural value against a target tag. `null` passes through
/// as [`HostValue::Null`] for every tag; kind mismatches are fatal.
pub(crate) fn decode_tagged(raw: serde_json::Value, tag: &TypeTag) -> Result<HostValue> {
    if raw.is_null() {
        return Ok(HostValue::Null);
    }
    match tag {
        TypeTag::Any | TypeTag::Json => Ok(match tag {
            TypeTag::Json => HostValue::Json(raw),
            _ => HostValue::from_json(raw),
        }),
        TypeTag::Bool => match raw.as_bool() {
            Some(b) => Ok(HostValue::Bool(b)),
            None => Err(Error::decode("bool", json_kind(&raw))),
        },
        TypeTag::Int => match raw.as_i64() {
            Some(i) => Ok(HostValue::Int(i)),
            // Fractional numbers truncate toward zero, like script
            // integer conversion does.
            None => match raw.as_f64() {
                Some(f) => Ok(HostValue::Int(f as i64)),
                None => Err(Error::decode("int", json_kind(&raw))),
            },
        },
        TypeTag::Uint => match raw.as_u64() {
            Some(u) => Ok(HostValue::Uint(u)),
            None => match raw.as_f64() {
                Some(f) => Ok(HostValue::Uint(f as u64)),
                None => Err(Error::decode("uint", json_kind(&raw))),
            },
        },
        TypeTag::Float => match raw.as_f64() {
            Some(f) => Ok(HostValue::Float(f)),
            None => Err(Error::decode("float", json_kind(&raw))),
        },
        TypeTag::Str => match raw {
            serde_json::Value::String(s) => Ok(HostValue::Str(s)),
            other => Err(Error::decode("string", json_kind(&other))),
        },
        TypeTag::Object => Err(Error::decode("proxied object", json_kind(&raw))),
        TypeTag::Callback => Err(Error::decode("callable", json_kind(&raw))),
    }
}

fn json_kind(raw: &serde_json::Value) -> &'static str {
    match raw {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Capture a script function (or a numeric token from the helper's
/// `proxy` idiom) into the function table and wrap the token.
fn capture_callback<'js>(
    core: &Arc<EngineCore>,
    ctx: &Ctx<'js>,
    value: Value<'js>,
) -> Result<HostValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(HostValue::Null);
    }
    if value.is_number() {
        let token: f64 = value.get()?;
        return Ok(HostValue::Callback(ScriptCallback {
            token: token as u64,
            core: core.clone(),
        }));
    }
    if !value.is_function() {
        return Err(Error::decode("callable", type_of(&value)));
    }

    let helper: Object = ctx.globals().get(context::GLOBAL)?;
    let table: Object = helper.get(FUNCTIONS_PROP)?;
    let next: f64 = helper.get(NEXT_TOKEN_PROP)?;
    let token = next as u64;
    table.set(token.to_string(), value)?;
    helper.set(NEXT_TOKEN_PROP, next + 1.0)?;

    Ok(HostValue::Callback(ScriptCallback {
        token,
        core: core.clone(),
    }))
}

/// Fetch the script function stored under a callback token, or
/// `undefined` if the token was released.
fn stored_callback<'js>(ctx: &Ctx<'js>, token: u64) -> Result<Value<'js>> {
    let helper: Object = ctx.globals().get(context::GLOBAL)?;
    let table: Object = helper.get(FUNCTIONS_PROP)?;
    let stored: Value = table.get(token.to_string())?;
    if stored.is_undefined() {
        return Ok(Undefined.into_js(ctx)?);
    }
    Ok(stored)
}

/// Apply the script function behind `token` and convert the result.
pub(crate) fn invoke_callback<'js>(
    core: &Arc<EngineCore>,
    ctx: &Ctx<'js>,
    token: u64,
    args: &[HostValue],
    tag: &TypeTag,
) -> Result<HostValue> {
    let helper: Object = ctx.globals().get(context::GLOBAL)?;
    let call: Function = helper.get("_call")?;
    let packed = Array::new(ctx.clone())?;
    for (i, arg) in args.iter().enumerate() {
        packed.set(i, to_script(core, ctx, arg)?)?;
    }
    let result: Value = call
        .call((This(helper), token as f64, packed))
        .map_err(|e| match map_engine_err(ctx, e) {
            Error::Script { message } => Error::Callback { message },
            other => other,
        })?;
    from_script(core, ctx, result, tag)
}

fn type_of(value: &Value<'_>) -> &'static str {
    if value.is_string() {
        "a string"
    } else if value.is_number() {
        "a number"
    } else if value.is_bool() {
        "a boolean"
    } else if value.is_array() {
        "an array"
    } else if value.is_object() {
        "an object"
    } else {
        "an unsupported value"
    }
}

/// Turn a bridge error into a pending script exception.
pub(crate) fn throw_error(ctx: &Ctx<'_>, err: &Error) -> rquickjs::Error {
    throw_message(ctx, &err.to_string())
}

/// Throw a plain message as a script exception.
pub(crate) fn throw_message(ctx: &Ctx<'_>, message: &str) -> rquickjs::Error {
    match message.into_js(ctx) {
        Ok(v) => ctx.throw(v),
        Err(e) => e,
    }
}

/// Describe the pending script exception.
pub(crate) fn exception_text(ctx: &Ctx<'_>) -> String {
    let caught = ctx.catch();
    let coerce: std::result::Result<Function, _> = ctx.globals().get("String");
    if let Ok(coerce) = coerce {
        if let Ok(text) = coerce.call::<_, String>((caught,)) {
            return text;
        }
    }
    "unknown script exception".to_string()
}

/// Fold a pending exception into [`Error::Script`]; pass other engine
/// failures through.
pub(crate) fn map_engine_err(ctx: &Ctx<'_>, err: rquickjs::Error) -> Error {
    if matches!(err, rquickjs::Error::Exception) {
        Error::Script {
            message: exception_text(ctx),
        }
    } else {
        Error::Engine(err)
    }
}
