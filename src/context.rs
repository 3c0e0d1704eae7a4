//! Engine context, helper global, and publication operations.
//!
//! A [`Context`] owns one embedded engine instance plus the per-context
//! bridge state: handle registry, transaction mutex, module table, and
//! transaction id counter. Nothing is process-wide; two contexts never
//! share state.
//!
//! Every operation funnels through [`EngineCore::enter`], which scopes a
//! frame on the engine. Entering is re-entrant per thread: a host
//! function invoked from script runs inside a live frame, and any bridge
//! work it does (callbacks, nested evaluation) reuses that frame instead
//! of re-locking the engine against itself.

use std::cell::Cell;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rquickjs::{Ctx, Function, Object, Value};

use crate::error::Result;
use crate::function::{FunctionShape, HostFunction};
use crate::marshal;
use crate::modules::{ModulePublisher, ModuleTable};
use crate::object::{HostObject, HostRef};
use crate::proxy;
use crate::registry::Registry;
use crate::transaction::{Transaction, TxId, TxMutex};
use crate::value::{HostValue, TypeTag};

/// Name of the script-side helper global.
pub(crate) const GLOBAL: &str = "Caramel";

/// Helper global installed at context creation. Holds the callback
/// table, the token counter, and the small amount of glue the bridge
/// calls back into (`Proxy` construction, callback application).
const PRELUDE: &str = r#"
globalThis.Caramel = {
    _functions: {},
    _next: 1,
    _wrap: function (target, handler) {
        return new Proxy(target, handler);
    },
    proxy: function (fn) {
        var token = this._next;
        this._functions[token] = fn;
        this._next = token + 1;
        return token;
    },
    _call: function (token, args) {
        var fn = this._functions[token];
        if (fn === undefined) {
            throw new TypeError("unknown callback token " + token);
        }
        return fn.apply(undefined, args);
    },
    release: function (token) {
        delete this._functions[token];
    },
};
"#;

thread_local! {
    /// Engine frame live on this thread, if any: the owning core and a
    /// type-erased pointer to the frame's `Ctx`. The owner tag keeps two
    /// contexts nested on one thread from reusing each other's frames.
    static ACTIVE: Cell<(*const (), *const ())> =
        const { Cell::new((std::ptr::null(), std::ptr::null())) };
}

struct RestoreActive {
    prev: (*const (), *const ()),
}

impl Drop for RestoreActive {
    fn drop(&mut self) {
        ACTIVE.with(|cell| cell.set(self.prev));
    }
}

/// Shared bridge state behind a [`Context`] and its [`Transaction`]s.
pub(crate) struct EngineCore {
    context: rquickjs::Context,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) mutex: TxMutex,
    pub(crate) modules: Mutex<ModuleTable>,
    next_tx: AtomicU64,
}

impl EngineCore {
    /// Run `f` inside an engine frame. A fresh frame is opened unless
    /// this thread is already inside one, in which case that live frame
    /// is reused (host frame triggered from script, calling back in).
    pub(crate) fn enter<R>(
        self: &Arc<Self>,
        f: impl for<'js> FnOnce(&Ctx<'js>) -> Result<R>,
    ) -> Result<R> {
        let me = Arc::as_ptr(self) as *const ();
        let (owner, stashed) = ACTIVE.with(|cell| cell.get());
        if owner == me && !stashed.is_null() {
            // Safety: the pointer was stashed by the frame below on this
            // same thread and is restored before that frame ends, so it
            // still points at a live Ctx.
            let live = unsafe { &*(stashed as *const Ctx<'static>) };
            let ctx = live.clone();
            return f(&ctx);
        }
        self.context.with(|ctx| {
            let _restore = RestoreActive {
                prev: ACTIVE
                    .with(|cell| cell.replace((me, &ctx as *const Ctx<'_> as *const ()))),
            };
            f(&ctx)
        })
    }
}

/// One engine instance plus its bridge state.
///
/// Cheap to clone and safe to share across threads; operations serialize
/// on the engine. Single-shot operations run outside any transaction;
/// [`Context::transaction`] hands out an identity under which a sequence
/// of operations excludes all other transactions.
#[derive(Clone)]
pub struct Context {
    core: Arc<EngineCore>,
}

impl Context {
    /// Fresh engine with the helper global (and console shim) installed.
    pub fn new() -> Result<Context> {
        let runtime = rquickjs::Runtime::new()?;
        let context = rquickjs::Context::full(&runtime)?;
        let core = Arc::new(EngineCore {
            context,
            registry: Mutex::new(Registry::new()),
            mutex: TxMutex::new(),
            modules: Mutex::new(ModuleTable::default()),
            // 0 is the "no transaction" id.
            next_tx: AtomicU64::new(1),
        });
        core.context.with(|ctx| -> Result<()> {
            ctx.eval::<(), _>(PRELUDE)
                .map_err(|e| marshal::map_engine_err(&ctx, e))?;
            #[cfg(feature = "console")]
            crate::console::install(&ctx)?;
            install_require(&core, &ctx)?;
            Ok(())
        })?;
        Ok(Context { core })
    }

    /// Marshal any host value and bind it at global `name`. Composites
    /// are proxied (live), primitives copied.
    pub fn publish_value(&self, name: &str, value: HostValue) -> Result<()> {
        op_publish_value(&self.core, TxId::NONE, name, value)
    }

    /// Proxy a shared composite at global `name` (live view).
    pub fn publish_proxy(&self, name: &str, object: HostRef) -> Result<()> {
        op_publish_value(&self.core, TxId::NONE, name, HostValue::Object(object))
    }

    /// Snapshot a shared composite at global `name`: fields copied at
    /// publication time, methods bound to the live reference.
    pub fn publish_struct(&self, name: &str, object: HostRef) -> Result<()> {
        op_publish_struct(&self.core, TxId::NONE, name, object)
    }

    /// Bind a host function at global `name`.
    pub fn publish_function(&self, name: &str, function: HostFunction) -> Result<()> {
        op_publish_function(&self.core, TxId::NONE, name, function)
    }

    /// Bind a constructor for `T` at global `name`: calling it from
    /// script yields a fresh default-valued `T`, proxied.
    pub fn publish_type<T: HostObject + Default>(&self, name: &str) -> Result<()> {
        op_publish_type::<T>(&self.core, TxId::NONE, name)
    }

    /// Evaluate script source; the completion value converts by the
    /// generic path (script functions surface as null here).
    pub fn eval(&self, source: &str) -> Result<HostValue> {
        op_eval(&self.core, TxId::NONE, source)
    }

    /// Evaluate a script file.
    pub fn eval_file(&self, path: impl AsRef<Path>) -> Result<HostValue> {
        let source = std::fs::read_to_string(path)?;
        op_eval(&self.core, TxId::NONE, &source)
    }

    /// Install `publisher` under `key` for `require` and
    /// [`publish_module`](Context::publish_module).
    pub fn register_module(
        &self,
        key: &str,
        publisher: impl Fn() -> HostValue + Send + Sync + 'static,
    ) {
        self.core.modules.lock().register(key, Arc::new(publisher));
    }

    /// Evaluate the publisher registered under `key` and bind its value
    /// at global `alias` (the key itself when no alias is given).
    pub fn publish_module(&self, key: &str, alias: Option<&str>) -> Result<()> {
        op_publish_module(&self.core, TxId::NONE, key, alias)
    }

    /// Allocate a transaction identity. The handle exposes the same
    /// operations, each bracketed by the transaction's lock.
    pub fn transaction(&self) -> Transaction {
        Transaction {
            id: TxId(self.core.next_tx.fetch_add(1, Ordering::Relaxed)),
            core: self.core.clone(),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("objects", &self.core.registry.lock().len())
            .finish()
    }
}

fn install_require<'js>(core: &Arc<EngineCore>, ctx: &Ctx<'js>) -> Result<()> {
    let weak = Arc::downgrade(core);
    let require = Function::new(
        ctx.clone(),
        move |cx: Ctx<'js>, key: String| -> rquickjs::Result<Value<'js>> {
            let core = weak
                .upgrade()
                .ok_or_else(|| marshal::throw_message(&cx, "bridge context dropped"))?;
            let publisher = core
                .modules
                .lock()
                .resolve(&key)
                .map_err(|e| marshal::throw_error(&cx, &e))?;
            let value = publisher();
            marshal::to_script(&core, &cx, &value).map_err(|e| marshal::throw_error(&cx, &e))
        },
    )?;
    let helper: Object = ctx.globals().get(GLOBAL)?;
    helper.set("require", require)?;
    Ok(())
}

pub(crate) fn op_publish_value(
    core: &Arc<EngineCore>,
    id: TxId,
    name: &str,
    value: HostValue,
) -> Result<()> {
    let _guard = core.mutex.guard(id);
    tracing::debug!(name, "publishing value");
    core.enter(|ctx| {
        let bound = marshal::to_script(core, ctx, &value)?;
        ctx.globals().set(name, bound)?;
        Ok(())
    })
}

pub(crate) fn op_publish_struct(
    core: &Arc<EngineCore>,
    id: TxId,
    name: &str,
    object: HostRef,
) -> Result<()> {
    let _guard = core.mutex.guard(id);
    tracing::debug!(name, type_name = object.type_name(), "publishing snapshot");
    core.enter(|ctx| {
        let snapshot = proxy::snapshot_object(core, ctx, &object)?;
        ctx.globals().set(name, snapshot)?;
        Ok(())
    })
}

pub(crate) fn op_publish_function(
    core: &Arc<EngineCore>,
    id: TxId,
    name: &str,
    function: HostFunction,
) -> Result<()> {
    let _guard = core.mutex.guard(id);
    tracing::debug!(name, "publishing function");
    core.enter(|ctx| {
        let bound = proxy::bind_host_function(core, ctx, function)?;
        ctx.globals().set(name, bound)?;
        Ok(())
    })
}

pub(crate) fn op_publish_type<T: HostObject + Default>(
    core: &Arc<EngineCore>,
    id: TxId,
    name: &str,
) -> Result<()> {
    let constructor = HostFunction::from_parts(
        FunctionShape::new(Vec::new(), vec![TypeTag::Object]),
        |_args| Ok(vec![HostValue::Object(HostRef::new(T::default()))]),
    );
    op_publish_function(core, id, name, constructor)
}

pub(crate) fn op_eval(core: &Arc<EngineCore>, id: TxId, source: &str) -> Result<HostValue> {
    let _guard = core.mutex.guard(id);
    tracing::trace!(len = source.len(), "evaluating");
    core.enter(|ctx| {
        let completed: Value = ctx
            .eval_with_options(
                source,
                rquickjs::context::EvalOptions {
                    strict: false,
                    ..Default::default()
                },
            )
            .map_err(|e| marshal::map_engine_err(ctx, e))?;
        marshal::from_script(core, ctx, completed, &TypeTag::Any)
    })
}

pub(crate) fn op_publish_module(
    core: &Arc<EngineCore>,
    id: TxId,
    key: &str,
    alias: Option<&str>,
) -> Result<()> {
    let _guard = core.mutex.guard(id);
    let publisher: ModulePublisher = core.modules.lock().resolve(key)?;
    let value = publisher();
    let name = alias.unwrap_or(key);
    tracing::debug!(key, name, "publishing module");
    core.enter(|ctx| {
        let bound = marshal::to_script(core, ctx, &value)?;
        ctx.globals().set(name, bound)?;
        Ok(())
    })
}

/// Apply the script function behind `token`. Runs as part of whatever
/// transaction this thread already holds, re-entering its lock rather
/// than deadlocking against it.
pub(crate) fn op_callback_invoke(
    core: &Arc<EngineCore>,
    token: u64,
    args: &[HostValue],
    tag: &TypeTag,
) -> Result<HostValue> {
    let _reentry = core.mutex.reenter();
    tracing::trace!(token, "invoking script callback");
    core.enter(|ctx| marshal::invoke_callback(core, ctx, token, args, tag))
}
