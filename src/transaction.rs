//! Transaction-scoped mutual exclusion for bridge operations.
//!
//! A transaction is a cheap identity, not a critical section: every
//! bridge operation brackets itself with `lock(id)`/`unlock(id)` of its
//! transaction, so operations of distinct transactions never interleave
//! while re-entrant work under one id (a callback calling back into the
//! bridge) proceeds freely. Unlocking an id that does not hold the lock
//! is a programming error and faults the process.

use std::path::Path;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::{Condvar, Mutex};

use crate::context::{self, EngineCore};
use crate::error::Result;
use crate::function::HostFunction;
use crate::object::{HostObject, HostRef};
use crate::value::HostValue;

/// Identity of a transaction, unique within its context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxId(pub(crate) u64);

impl TxId {
    /// The "no transaction" identity: locking with it is a no-op.
    pub const NONE: TxId = TxId(0);

    pub fn is_none(self) -> bool {
        self == TxId::NONE
    }
}

#[derive(Default)]
struct MutexState {
    holder: u64,
    count: u32,
    thread: Option<ThreadId>,
}

/// Re-entrant mutex keyed by transaction identity.
pub(crate) struct TxMutex {
    state: Mutex<MutexState>,
    freed: Condvar,
}

impl TxMutex {
    pub(crate) fn new() -> TxMutex {
        TxMutex {
            state: Mutex::new(MutexState::default()),
            freed: Condvar::new(),
        }
    }

    /// Acquire for `id`, blocking while another transaction holds the
    /// lock. Re-entrant for the holding id.
    pub(crate) fn lock(&self, id: TxId) {
        if id.is_none() {
            return;
        }
        let mut state = self.state.lock();
        loop {
            if state.count == 0 {
                state.holder = id.0;
                state.count = 1;
                state.thread = Some(std::thread::current().id());
                return;
            }
            if state.holder == id.0 {
                state.count += 1;
                return;
            }
            self.freed.wait(&mut state);
        }
    }

    /// Release one acquisition of `id`.
    ///
    /// # Panics
    ///
    /// Unlocking with an id that does not hold the lock is lock misuse
    /// and panics; it is not a recoverable error.
    pub(crate) fn unlock(&self, id: TxId) {
        if id.is_none() {
            return;
        }
        let mut state = self.state.lock();
        if state.count == 0 || state.holder != id.0 {
            #[allow(clippy::panic)]
            {
                panic!("unlock of invalid transaction id {}", id.0);
            }
        }
        state.count -= 1;
        if state.count == 0 {
            state.holder = 0;
            state.thread = None;
            self.freed.notify_all();
        }
    }

    /// RAII bracket for one bridge operation.
    pub(crate) fn guard(&self, id: TxId) -> TxGuard<'_> {
        self.lock(id);
        TxGuard { mutex: self, id }
    }

    /// Re-enter as the current holder, if the calling thread is the one
    /// running under the lock. Used by trampolines triggered from script
    /// code: the operation that entered the engine already holds the
    /// lock, and nested bridge work must not block on it.
    pub(crate) fn reenter(&self) -> ReentryGuard<'_> {
        let mut state = self.state.lock();
        if state.count > 0 && state.thread == Some(std::thread::current().id()) {
            state.count += 1;
            ReentryGuard {
                mutex: self,
                id: TxId(state.holder),
            }
        } else {
            ReentryGuard {
                mutex: self,
                id: TxId::NONE,
            }
        }
    }
}

pub(crate) struct TxGuard<'a> {
    mutex: &'a TxMutex,
    id: TxId,
}

impl Drop for TxGuard<'_> {
    fn drop(&mut self) {
        self.mutex.unlock(self.id);
    }
}

pub(crate) struct ReentryGuard<'a> {
    mutex: &'a TxMutex,
    id: TxId,
}

impl Drop for ReentryGuard<'_> {
    fn drop(&mut self) {
        self.mutex.unlock(self.id);
    }
}

/// A transaction over a bridge context.
///
/// Operations mirror [`crate::Context`]; each one runs bracketed by this
/// transaction's lock, so sequences from two transactions never
/// interleave mid-operation. Clone freely; clones share the identity,
/// which is what makes host functions able to nest work under the
/// transaction that triggered them.
#[derive(Clone)]
pub struct Transaction {
    pub(crate) id: TxId,
    pub(crate) core: Arc<EngineCore>,
}

impl Transaction {
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Marshal and bind a host value at a script global.
    pub fn publish_value(&self, name: &str, value: HostValue) -> Result<()> {
        context::op_publish_value(&self.core, self.id, name, value)
    }

    /// Proxy a shared composite at a script global (live view).
    pub fn publish_proxy(&self, name: &str, object: HostRef) -> Result<()> {
        context::op_publish_value(&self.core, self.id, name, HostValue::Object(object))
    }

    /// Snapshot a shared composite at a script global (fields copied at
    /// publication time, methods bound live).
    pub fn publish_struct(&self, name: &str, object: HostRef) -> Result<()> {
        context::op_publish_struct(&self.core, self.id, name, object)
    }

    /// Bind a host function at a script global.
    pub fn publish_function(&self, name: &str, function: HostFunction) -> Result<()> {
        context::op_publish_function(&self.core, self.id, name, function)
    }

    /// Bind a constructor for `T`: calling it from script yields a fresh
    /// default-valued `T`, proxied.
    pub fn publish_type<T: HostObject + Default>(&self, name: &str) -> Result<()> {
        context::op_publish_type::<T>(&self.core, self.id, name)
    }

    /// Evaluate script source under this transaction.
    pub fn eval(&self, source: &str) -> Result<HostValue> {
        context::op_eval(&self.core, self.id, source)
    }

    /// Evaluate a script file under this transaction.
    pub fn eval_file(&self, path: impl AsRef<Path>) -> Result<HostValue> {
        let source = std::fs::read_to_string(path)?;
        context::op_eval(&self.core, self.id, &source)
    }

    /// Install `publisher` under `key` for `require` and
    /// [`publish_module`](Transaction::publish_module).
    pub fn register_module(
        &self,
        key: &str,
        publisher: impl Fn() -> HostValue + Send + Sync + 'static,
    ) {
        let _guard = self.core.mutex.guard(self.id);
        self.core.modules.lock().register(key, Arc::new(publisher));
    }

    /// Bind a registered module's value at a script global.
    pub fn publish_module(&self, key: &str, alias: Option<&str>) -> Result<()> {
        context::op_publish_module(&self.core, self.id, key, alias)
    }
}
