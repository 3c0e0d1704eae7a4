//! Module registration and lookup.
//!
//! A module is a named publisher: a host closure producing the module's
//! value on demand. Publishers run lazily, once per `require` or
//! [`publish_module`](crate::Context::publish_module) call, so a module
//! can hand out fresh state or a shared [`HostRef`](crate::HostRef) as
//! it sees fit. The table is per context; nothing is process-wide.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::value::HostValue;

/// Producer of a module's value.
pub(crate) type ModulePublisher = Arc<dyn Fn() -> HostValue + Send + Sync>;

#[derive(Default)]
pub(crate) struct ModuleTable {
    entries: FxHashMap<String, ModulePublisher>,
}

impl ModuleTable {
    /// Install `publisher` under `key`, replacing any previous one.
    pub(crate) fn register(&mut self, key: &str, publisher: ModulePublisher) {
        tracing::debug!(key, "registering module");
        self.entries.insert(key.to_string(), publisher);
    }

    /// Look up the publisher for `key`.
    pub(crate) fn resolve(&self, key: &str) -> Result<ModulePublisher> {
        self.entries.get(key).cloned().ok_or_else(|| {
            tracing::debug!(key, "module lookup failed");
            Error::ModuleNotFound {
                key: key.to_string(),
            }
        })
    }
}
