//! Host objects exposed to scripts.
//!
//! There is no runtime reflection to lean on, so a type describes its own
//! shape through [`HostObject`]: member names in declaration order, field
//! access, and method dispatch. The bridge layers name translation and
//! the property protocol on top. Implementations are written by hand for
//! now; a derive macro can be added later without changing the trait.
//!
//! [`HostRef`] is the shared ownership form the registry stores: writes
//! coming from scripts go through it, so the host observes them.

use std::any::Any;
use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::Result;
use crate::function::FunctionShape;
use crate::value::HostValue;

/// How the property protocol treats an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// Named fields and methods, accessed through name translation.
    Struct,
    /// String-keyed entries, accessed by untranslated key.
    Map,
    /// An empty value: no members, every get is an undefined property.
    Nil,
}

/// Outcome of a property write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOutcome {
    /// The write reached the host value.
    Applied,
    /// The member exists but does not accept writes (a method name).
    /// Reported softly so scripts can probe writability defensively.
    NotApplied,
}

/// Upcast support for downcasting trait objects back to concrete types.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Shape of a host object exposed to scripts.
///
/// Names use the host spelling; only names whose translation differs
/// (see [`crate::names::is_visible`]) are reachable from scripts. The
/// `fields`/`methods` lists define enumeration order, so keep them in
/// declaration order.
pub trait HostObject: AsAny + Send + 'static {
    /// Host-side type name, for diagnostics.
    fn type_name(&self) -> &'static str;

    fn kind(&self) -> ObjectKind {
        ObjectKind::Struct
    }

    /// Field names in declaration order, host spelling.
    fn fields(&self) -> Vec<String> {
        Vec::new()
    }

    /// Method names in declaration order, host spelling.
    fn methods(&self) -> Vec<String> {
        Vec::new()
    }

    /// Read a field by host name. `None` when the name is not a field.
    fn get_field(&self, name: &str) -> Option<HostValue> {
        let _ = name;
        None
    }

    /// Write a field by host name. Called only for names listed in
    /// `fields` (or any key, for map shapes); implementations coerce the
    /// incoming value with the [`HostValue`] helpers and may fail with a
    /// decode error.
    fn set_field(&mut self, name: &str, value: HostValue) -> Result<SetOutcome> {
        let _ = (name, value);
        Ok(SetOutcome::NotApplied)
    }

    /// Descriptor of a method by host name, used to convert call
    /// arguments. `None` when the name is not a method.
    fn method_shape(&self, name: &str) -> Option<FunctionShape> {
        let _ = name;
        None
    }

    /// Invoke a method by host name with already-converted arguments.
    ///
    /// Returns the output values in order. A method following the
    /// trailing-error convention reports failure as
    /// [`crate::Error::Function`], which the bridge throws script-side.
    fn call_method(&mut self, name: &str, args: Vec<HostValue>) -> Result<Vec<HostValue>> {
        let _ = args;
        Err(crate::error::Error::undefined(name))
    }
}

/// String-keyed map shape: direct key lookup, insertion order preserved.
impl HostObject for indexmap::IndexMap<String, HostValue> {
    fn type_name(&self) -> &'static str {
        "map"
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Map
    }

    fn fields(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn get_field(&self, name: &str) -> Option<HostValue> {
        self.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: HostValue) -> Result<SetOutcome> {
        self.insert(name.to_string(), value);
        Ok(SetOutcome::Applied)
    }
}

/// The empty-pointer analog: proxied, but memberless.
pub(crate) struct NilObject;

impl HostObject for NilObject {
    fn type_name(&self) -> &'static str {
        "nil"
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Nil
    }
}

/// Shared, mutable handle to a host object.
///
/// This is the ownership form that crosses the bridge: the registry
/// stores it, proxies resolve to it, and nested composite fields hold
/// clones of it, so mutation through any path is visible through all of
/// them.
#[derive(Clone)]
pub struct HostRef {
    cell: Arc<Mutex<dyn HostObject>>,
}

impl HostRef {
    pub fn new<T: HostObject>(value: T) -> Self {
        HostRef {
            cell: Arc::new(Mutex::new(value)),
        }
    }

    /// A reference to nothing; proxying it yields an object that rejects
    /// every access instead of crashing.
    pub fn nil() -> Self {
        HostRef::new(NilObject)
    }

    /// Lock the underlying object for host-side access.
    pub fn lock(&self) -> MutexGuard<'_, dyn HostObject> {
        self.cell.lock()
    }

    /// Lock and downcast to the concrete type this reference was built
    /// from. `None` if the type does not match.
    pub fn downcast<T: HostObject>(&self) -> Option<MappedMutexGuard<'_, T>> {
        MutexGuard::try_map(self.cell.lock(), |obj| obj.as_any_mut().downcast_mut::<T>()).ok()
    }

    /// Whether two references share one underlying object.
    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn type_name(&self) -> &'static str {
        self.cell.lock().type_name()
    }
}

impl std::fmt::Debug for HostRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRef")
            .field("type", &self.type_name())
            .finish()
    }
}
