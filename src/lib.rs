//! Host↔script value bridge over an embedded JavaScript engine.
//!
//! `caramel` publishes Rust values, shared objects, and functions into a
//! QuickJS context and marshals values and calls in both directions.
//! Composite host objects cross as live proxies backed by a handle
//! registry, so script-side reads and writes observe the shared Rust
//! value instead of a copy. Script functions flow back as callable
//! adapters, and sequences of operations can be grouped under a
//! transaction id that excludes other transactions without holding the
//! engine hostage between operations.
//!
//! # Example
//!
//! ```
//! use caramel::{Context, HostFunction, HostValue};
//!
//! let ctx = Context::new().unwrap();
//! ctx.publish_function("double", HostFunction::new(|n: i64| n * 2))
//!     .unwrap();
//! assert_eq!(ctx.eval("double(21)").unwrap(), HostValue::Int(42));
//! ```

#[cfg(feature = "console")]
mod console;
pub mod context;
pub mod error;
pub mod function;
mod marshal;
mod modules;
pub mod names;
pub mod object;
mod proxy;
mod registry;
pub mod transaction;
pub mod value;

pub use context::Context;
pub use error::Error;
pub use error::Result;
pub use function::FunctionShape;
pub use function::HostArg;
pub use function::HostFunction;
pub use function::IntoHostFn;
pub use function::IntoHostReturn;
pub use function::IntoHostValue;
pub use function::Json;
pub use function::ScriptCallback;
pub use function::Variadic;
pub use object::HostObject;
pub use object::HostRef;
pub use object::ObjectKind;
pub use object::SetOutcome;
pub use transaction::Transaction;
pub use transaction::TxId;
pub use value::HostValue;
pub use value::TypeTag;
