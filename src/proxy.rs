//! Proxy publication of host objects.
//!
//! A published object appears script-side as a `Proxy` around a plain
//! target object. The target carries exactly one own property, the
//! reserved handle slot; every member access goes through the traps
//! installed here, which resolve the handle back to the live [`HostRef`]
//! and run the member protocol. Field reads see current host state,
//! writes apply to it, and methods bind against the shared reference, so
//! a proxy is a live view rather than a copy.
//!
//! Member names cross the boundary through [`crate::names`]: scripts use
//! the translated spellings, and members whose translation equals their
//! host spelling stay invisible.

use std::sync::{Arc, Weak};

use rquickjs::function::Rest;
use rquickjs::{Array, Ctx, Function, IntoJs, Object, Undefined, Value};

use crate::context::{self, EngineCore};
use crate::error::{Error, Result};
use crate::function::{FunctionShape, HostFunction};
use crate::marshal;
use crate::names;
use crate::object::{HostRef, ObjectKind, SetOutcome};
use crate::registry::Handle;
use crate::value::{HostValue, TypeTag};

/// Reserved own property of a proxy target holding the packed handle.
/// The leading control character keeps it clear of real member names.
pub(crate) const HANDLE_PROP: &str = "\u{1}hostProxyHandle";

/// Register `host_ref` and build its script-side proxy.
pub(crate) fn make_proxy<'js>(
    core: &Arc<EngineCore>,
    ctx: &Ctx<'js>,
    host_ref: HostRef,
) -> Result<Value<'js>> {
    let handle = core.registry.lock().add(host_ref);

    let target = Object::new(ctx.clone())?;
    target.set(HANDLE_PROP, handle.to_number())?;

    let handler = Object::new(ctx.clone())?;
    install_traps(core, ctx, &handler)?;

    let helper: Object = ctx.globals().get(context::GLOBAL)?;
    let wrap: Function = helper.get("_wrap")?;
    let proxy: Value = wrap.call((target, handler))?;
    Ok(proxy)
}

/// Resolve a proxy target back to its live host reference.
fn resolve(core: &Arc<EngineCore>, target: &Object<'_>) -> Result<HostRef> {
    let marker: f64 = target.get(HANDLE_PROP)?;
    let handle = Handle::from_number(marker).ok_or(Error::UnexpectedHandle)?;
    core.registry
        .lock()
        .get(handle)
        .ok_or(Error::UnexpectedHandle)
}

fn string_key(key: &Value<'_>) -> Option<String> {
    if key.is_string() {
        key.get().ok()
    } else {
        // Symbol probes (iterators, primitive hints) get neutral answers.
        None
    }
}

fn upgrade(weak: &Weak<EngineCore>, ctx: &Ctx<'_>) -> rquickjs::Result<Arc<EngineCore>> {
    weak.upgrade()
        .ok_or_else(|| marshal::throw_message(ctx, "bridge context dropped"))
}

fn install_traps<'js>(
    core: &Arc<EngineCore>,
    ctx: &Ctx<'js>,
    handler: &Object<'js>,
) -> Result<()> {
    let weak = Arc::downgrade(core);
    let get = Function::new(
        ctx.clone(),
        move |cx: Ctx<'js>,
              target: Object<'js>,
              key: Value<'js>,
              _extra: Rest<Value<'js>>|
              -> rquickjs::Result<Value<'js>> {
            let core = upgrade(&weak, &cx)?;
            let Some(name) = string_key(&key) else {
                return Ok(Undefined.into_js(&cx)?);
            };
            if name == HANDLE_PROP {
                return target.get(HANDLE_PROP);
            }
            let host_ref = resolve(&core, &target).map_err(|e| marshal::throw_error(&cx, &e))?;
            let value = member_get(&host_ref, &name).map_err(|e| marshal::throw_error(&cx, &e))?;
            marshal::to_script(&core, &cx, &value).map_err(|e| marshal::throw_error(&cx, &e))
        },
    )?;
    handler.set("get", get)?;

    let weak = Arc::downgrade(core);
    let set = Function::new(
        ctx.clone(),
        move |cx: Ctx<'js>,
              target: Object<'js>,
              key: Value<'js>,
              value: Value<'js>,
              _extra: Rest<Value<'js>>|
              -> rquickjs::Result<bool> {
            let core = upgrade(&weak, &cx)?;
            let Some(name) = string_key(&key) else {
                return Ok(false);
            };
            if name == HANDLE_PROP {
                return Ok(false);
            }
            let host_ref = resolve(&core, &target).map_err(|e| marshal::throw_error(&cx, &e))?;
            let converted = marshal::from_script(&core, &cx, value, &TypeTag::Any)
                .map_err(|e| marshal::throw_error(&cx, &e))?;
            member_set(&host_ref, &name, converted).map_err(|e| marshal::throw_error(&cx, &e))
        },
    )?;
    handler.set("set", set)?;

    let weak = Arc::downgrade(core);
    let has = Function::new(
        ctx.clone(),
        move |cx: Ctx<'js>,
              target: Object<'js>,
              key: Value<'js>,
              _extra: Rest<Value<'js>>|
              -> rquickjs::Result<bool> {
            let core = upgrade(&weak, &cx)?;
            let Some(name) = string_key(&key) else {
                return Ok(false);
            };
            // The handle slot is the bridge's own business, not a member.
            if name == HANDLE_PROP {
                return Ok(false);
            }
            let host_ref = resolve(&core, &target).map_err(|e| marshal::throw_error(&cx, &e))?;
            Ok(member_has(&host_ref, &name))
        },
    )?;
    handler.set("has", has)?;

    let weak = Arc::downgrade(core);
    let own_keys = Function::new(
        ctx.clone(),
        move |cx: Ctx<'js>,
              target: Object<'js>,
              _extra: Rest<Value<'js>>|
              -> rquickjs::Result<Vec<String>> {
            let core = upgrade(&weak, &cx)?;
            let host_ref = resolve(&core, &target).map_err(|e| marshal::throw_error(&cx, &e))?;
            Ok(member_names(&host_ref))
        },
    )?;
    handler.set("ownKeys", own_keys)?;

    let weak = Arc::downgrade(core);
    let descriptor = Function::new(
        ctx.clone(),
        move |cx: Ctx<'js>,
              target: Object<'js>,
              key: Value<'js>,
              _extra: Rest<Value<'js>>|
              -> rquickjs::Result<Value<'js>> {
            let core = upgrade(&weak, &cx)?;
            let Some(name) = string_key(&key) else {
                return Ok(Undefined.into_js(&cx)?);
            };
            let host_ref = resolve(&core, &target).map_err(|e| marshal::throw_error(&cx, &e))?;
            if name == HANDLE_PROP || !member_has(&host_ref, &name) {
                return Ok(Undefined.into_js(&cx)?);
            }
            let value = member_get(&host_ref, &name).map_err(|e| marshal::throw_error(&cx, &e))?;
            let desc = Object::new(cx.clone())?;
            desc.set(
                "value",
                marshal::to_script(&core, &cx, &value).map_err(|e| marshal::throw_error(&cx, &e))?,
            )?;
            desc.set("writable", true)?;
            // Enumeration (for..in, Object.keys) filters on this flag.
            desc.set("enumerable", true)?;
            desc.set("configurable", true)?;
            Ok(desc.into_value())
        },
    )?;
    handler.set("getOwnPropertyDescriptor", descriptor)?;

    Ok(())
}

/// Expose a host function as a native script function. Arguments convert
/// against the descriptor, missing ones bind as zero values, surplus
/// ones are dropped, and outputs bind as nothing, one value or an array.
pub(crate) fn bind_host_function<'js>(
    core: &Arc<EngineCore>,
    ctx: &Ctx<'js>,
    func: HostFunction,
) -> Result<Value<'js>> {
    let weak = Arc::downgrade(core);
    let bound = Function::new(
        ctx.clone(),
        move |cx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            let core = upgrade(&weak, &cx)?;
            let _reentry = core.mutex.reenter();
            invoke_host(&core, &cx, &func, args.0).map_err(|e| marshal::throw_error(&cx, &e))
        },
    )?;
    Ok(bound.into_value())
}

/// Snapshot publication: a plain object whose fields are marshaled at
/// publication time and whose methods stay bound to the live reference.
/// Host field writes after publication are not reflected.
pub(crate) fn snapshot_object<'js>(
    core: &Arc<EngineCore>,
    ctx: &Ctx<'js>,
    host_ref: &HostRef,
) -> Result<Object<'js>> {
    let snapshot = Object::new(ctx.clone())?;

    // Collect under the lock, marshal after releasing it; marshaling a
    // composite field builds a proxy, which takes other locks.
    let kind = host_ref.lock().kind();
    match kind {
        ObjectKind::Nil => {}
        ObjectKind::Map => {
            let entries: Vec<(String, HostValue)> = {
                let guard = host_ref.lock();
                guard
                    .fields()
                    .into_iter()
                    .map(|key| {
                        let value = guard.get_field(&key).unwrap_or(HostValue::Null);
                        (key, value)
                    })
                    .collect()
            };
            for (key, value) in entries {
                snapshot.set(key.as_str(), marshal::to_script(core, ctx, &value)?)?;
            }
        }
        ObjectKind::Struct => {
            let (fields, methods) = {
                let guard = host_ref.lock();
                let fields: Vec<(String, HostValue)> = guard
                    .fields()
                    .into_iter()
                    .filter(|f| names::is_visible(f))
                    .map(|f| {
                        let value = guard.get_field(&f).unwrap_or(HostValue::Null);
                        (names::to_script_name(&f), value)
                    })
                    .collect();
                let methods: Vec<(String, FunctionShape)> = guard
                    .methods()
                    .into_iter()
                    .filter(|m| names::is_visible(m))
                    .map(|m| {
                        let shape = guard.method_shape(&m).unwrap_or_else(dynamic_shape);
                        (m, shape)
                    })
                    .collect();
                (fields, methods)
            };
            for (name, value) in fields {
                snapshot.set(name.as_str(), marshal::to_script(core, ctx, &value)?)?;
            }
            for (method, shape) in methods {
                let bound = HostFunction::bound(host_ref.clone(), method.clone(), shape);
                snapshot.set(
                    names::to_script_name(&method).as_str(),
                    bind_host_function(core, ctx, bound)?,
                )?;
            }
        }
    }
    Ok(snapshot)
}

fn invoke_host<'js>(
    core: &Arc<EngineCore>,
    ctx: &Ctx<'js>,
    func: &HostFunction,
    raw_args: Vec<Value<'js>>,
) -> Result<Value<'js>> {
    let shape = func.shape();

    let mut args = Vec::with_capacity(raw_args.len().max(shape.fixed_params()));
    for (i, raw) in raw_args.into_iter().enumerate() {
        match shape.param_tag(i) {
            Some(tag) => args.push(marshal::from_script(core, ctx, raw, tag)?),
            None => break,
        }
    }
    while args.len() < shape.fixed_params() {
        args.push(HostValue::Null);
    }

    let outputs = func.call(args)?;
    match outputs.as_slice() {
        [] => Ok(Undefined.into_js(ctx)?),
        [single] => marshal::to_script(core, ctx, single),
        many => {
            let arr = Array::new(ctx.clone())?;
            for (i, out) in many.iter().enumerate() {
                arr.set(i, marshal::to_script(core, ctx, out)?)?;
            }
            Ok(arr.into_value())
        }
    }
}

/// Find the host field whose translated name matches `name`.
fn find_field(host_ref: &HostRef, name: &str) -> Option<String> {
    host_ref
        .lock()
        .fields()
        .into_iter()
        .find(|f| names::is_visible(f) && names::to_script_name(f) == name)
}

/// Find the host method whose translated name matches `name`.
fn find_method(host_ref: &HostRef, name: &str) -> Option<String> {
    host_ref
        .lock()
        .methods()
        .into_iter()
        .find(|m| names::is_visible(m) && names::to_script_name(m) == name)
}

/// Descriptor for methods that do not declare one: anything in, anything
/// out.
fn dynamic_shape() -> FunctionShape {
    FunctionShape {
        params: vec![TypeTag::Any],
        variadic: true,
        returns: vec![TypeTag::Any],
        fallible: true,
    }
}

/// Read a member. Fields come back as values, methods as bound
/// functions; unknown members are an error.
pub(crate) fn member_get(host_ref: &HostRef, name: &str) -> Result<HostValue> {
    // The guard must drop before the arms run; they take the lock again.
    let kind = host_ref.lock().kind();
    match kind {
        ObjectKind::Nil => Err(Error::undefined(name)),
        ObjectKind::Map => Ok(host_ref.lock().get_field(name).unwrap_or(HostValue::Null)),
        ObjectKind::Struct => {
            if let Some(field) = find_field(host_ref, name) {
                return Ok(host_ref
                    .lock()
                    .get_field(&field)
                    .unwrap_or(HostValue::Null));
            }
            if let Some(method) = find_method(host_ref, name) {
                let shape = host_ref
                    .lock()
                    .method_shape(&method)
                    .unwrap_or_else(dynamic_shape);
                return Ok(HostValue::Function(HostFunction::bound(
                    host_ref.clone(),
                    method,
                    shape,
                )));
            }
            Err(Error::undefined(name))
        }
    }
}

/// Write a member. Assigning to a method name reports an unapplied
/// write, which the set trap surfaces as a soft failure; unknown members
/// are an error.
pub(crate) fn member_set(host_ref: &HostRef, name: &str, value: HostValue) -> Result<bool> {
    let kind = host_ref.lock().kind();
    match kind {
        ObjectKind::Nil => Err(Error::undefined(name)),
        ObjectKind::Map => {
            let outcome = host_ref.lock().set_field(name, value)?;
            Ok(matches!(outcome, SetOutcome::Applied))
        }
        ObjectKind::Struct => {
            if let Some(field) = find_field(host_ref, name) {
                let outcome = host_ref.lock().set_field(&field, value)?;
                return Ok(matches!(outcome, SetOutcome::Applied));
            }
            if find_method(host_ref, name).is_some() {
                return Ok(false);
            }
            Err(Error::undefined(name))
        }
    }
}

/// Membership test; never errors, a nil object simply has no members.
pub(crate) fn member_has(host_ref: &HostRef, name: &str) -> bool {
    let kind = host_ref.lock().kind();
    match kind {
        ObjectKind::Nil => false,
        ObjectKind::Map => host_ref.lock().get_field(name).is_some(),
        ObjectKind::Struct => {
            find_field(host_ref, name).is_some() || find_method(host_ref, name).is_some()
        }
    }
}

/// Enumerable member names in declaration order, fields before methods,
/// translated for script use.
pub(crate) fn member_names(host_ref: &HostRef) -> Vec<String> {
    let guard = host_ref.lock();
    match guard.kind() {
        ObjectKind::Nil => Vec::new(),
        ObjectKind::Map => guard.fields(),
        ObjectKind::Struct => guard
            .fields()
            .into_iter()
            .chain(guard.methods())
            .filter(|n| names::is_visible(n))
            .map(|n| names::to_script_name(&n))
            .collect(),
    }
}
