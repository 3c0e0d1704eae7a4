//! Host-side values crossing the bridge.
//!
//! [`HostValue`] is the polymorphic value the marshaler moves in both
//! directions; [`TypeTag`] names the target shape a script value should
//! decode into. Composite shared objects and callables are carried by
//! reference ([`HostRef`], [`HostFunction`], [`ScriptCallback`]) so they
//! round-trip with identity instead of being copied.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::function::{HostFunction, ScriptCallback};
use crate::object::HostRef;

/// Target shape for decoding a script value into a host value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeTag {
    /// Anything; numbers, strings, arrays and plain objects decode
    /// structurally, proxies resolve to their registered object.
    Any,
    Bool,
    /// Signed integer; script doubles truncate toward zero.
    Int,
    /// Unsigned integer; script doubles truncate toward zero.
    Uint,
    Float,
    Str,
    /// Raw structural value, kept as JSON for a typed decode later.
    Json,
    /// A proxied host object; anything else is a decode failure.
    Object,
    /// A script function or a numeric callback token.
    Callback,
}

impl TypeTag {
    /// Short description used in decode failure messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TypeTag::Any => "value",
            TypeTag::Bool => "boolean",
            TypeTag::Int => "integer",
            TypeTag::Uint => "unsigned integer",
            TypeTag::Float => "number",
            TypeTag::Str => "string",
            TypeTag::Json => "structural value",
            TypeTag::Object => "proxied object",
            TypeTag::Callback => "callable",
        }
    }
}

/// A host value in transit across the bridge.
#[derive(Clone, Debug, Default)]
pub enum HostValue {
    /// Absent or nil; marshals to script `null`, decodes to zero values.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    /// Byte sequences surface script-side as strings (lossy UTF-8).
    Bytes(Vec<u8>),
    Array(Vec<HostValue>),
    /// Order-preserving string-keyed map; marshals to a plain object.
    Map(IndexMap<String, HostValue>),
    /// Structural value carried as JSON text engine-side.
    Json(serde_json::Value),
    /// Shared composite object; marshals to a live proxy.
    Object(HostRef),
    /// Host function; marshals to a bound script function.
    Function(HostFunction),
    /// Script function adapter obtained from the reverse bridge.
    Callback(ScriptCallback),
}

impl HostValue {
    /// Name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Uint(_) => "uint",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "string",
            HostValue::Bytes(_) => "bytes",
            HostValue::Array(_) => "array",
            HostValue::Map(_) => "map",
            HostValue::Json(_) => "json",
            HostValue::Object(_) => "object",
            HostValue::Function(_) => "function",
            HostValue::Callback(_) => "callback",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Coerce to a signed integer. Doubles truncate toward zero, null is
    /// zero; anything non-numeric is a decode failure.
    pub fn to_i64(&self) -> Result<i64> {
        match self {
            HostValue::Null => Ok(0),
            HostValue::Int(v) => Ok(*v),
            HostValue::Uint(v) => Ok(*v as i64),
            HostValue::Float(v) => Ok(*v as i64),
            other => Err(Error::decode("integer", other.kind_name())),
        }
    }

    /// Coerce to an unsigned integer, truncating doubles toward zero.
    pub fn to_u64(&self) -> Result<u64> {
        match self {
            HostValue::Null => Ok(0),
            HostValue::Int(v) => Ok(*v as u64),
            HostValue::Uint(v) => Ok(*v),
            HostValue::Float(v) => Ok(*v as u64),
            other => Err(Error::decode("unsigned integer", other.kind_name())),
        }
    }

    /// Coerce to a double.
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            HostValue::Null => Ok(0.0),
            HostValue::Int(v) => Ok(*v as f64),
            HostValue::Uint(v) => Ok(*v as f64),
            HostValue::Float(v) => Ok(*v),
            other => Err(Error::decode("number", other.kind_name())),
        }
    }

    /// Coerce to a boolean; only booleans and null qualify.
    pub fn to_bool(&self) -> Result<bool> {
        match self {
            HostValue::Null => Ok(false),
            HostValue::Bool(v) => Ok(*v),
            other => Err(Error::decode("boolean", other.kind_name())),
        }
    }

    /// Coerce to an owned string; bytes convert lossily, null is empty.
    pub fn to_text(&self) -> Result<String> {
        match self {
            HostValue::Null => Ok(String::new()),
            HostValue::Str(s) => Ok(s.clone()),
            HostValue::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
            other => Err(Error::decode("string", other.kind_name())),
        }
    }

    /// Build a host value from a structural JSON value.
    ///
    /// Numbers prefer the narrowest faithful variant: `i64`, then `u64`,
    /// then `f64`.
    pub fn from_json(value: serde_json::Value) -> HostValue {
        match value {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    HostValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    HostValue::Uint(u)
                } else {
                    HostValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => HostValue::Str(s),
            serde_json::Value::Array(items) => {
                HostValue::Array(items.into_iter().map(HostValue::from_json).collect())
            }
            serde_json::Value::Object(entries) => HostValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, HostValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Structural encoding of this value, for the JSON fallback path.
    ///
    /// Live objects and callables have no structural form; asking for one
    /// is a decode failure.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            HostValue::Null => Ok(serde_json::Value::Null),
            HostValue::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            HostValue::Int(v) => Ok(serde_json::Value::from(*v)),
            HostValue::Uint(v) => Ok(serde_json::Value::from(*v)),
            HostValue::Float(v) => Ok(serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null)),
            HostValue::Str(s) => Ok(serde_json::Value::String(s.clone())),
            HostValue::Bytes(b) => Ok(serde_json::Value::String(
                String::from_utf8_lossy(b).into_owned(),
            )),
            HostValue::Array(items) => Ok(serde_json::Value::Array(
                items.iter().map(HostValue::to_json).collect::<Result<_>>()?,
            )),
            HostValue::Map(entries) => {
                let mut out = serde_json::Map::with_capacity(entries.len());
                for (k, v) in entries {
                    out.insert(k.clone(), v.to_json()?);
                }
                Ok(serde_json::Value::Object(out))
            }
            HostValue::Json(v) => Ok(v.clone()),
            other => Err(Error::decode("structural value", other.kind_name())),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Uint(a), HostValue::Uint(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::Bytes(a), HostValue::Bytes(b)) => a == b,
            (HostValue::Array(a), HostValue::Array(b)) => a == b,
            (HostValue::Map(a), HostValue::Map(b)) => a == b,
            (HostValue::Json(a), HostValue::Json(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => a.ptr_eq(b),
            (HostValue::Callback(a), HostValue::Callback(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for HostValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostValue::Null => write!(f, "null"),
            HostValue::Bool(b) => write!(f, "{b}"),
            HostValue::Int(v) => write!(f, "{v}"),
            HostValue::Uint(v) => write!(f, "{v}"),
            HostValue::Float(v) => write!(f, "{v}"),
            HostValue::Str(s) => write!(f, "{s}"),
            HostValue::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            HostValue::Array(_) | HostValue::Map(_) | HostValue::Json(_) => match self.to_json() {
                Ok(v) => write!(f, "{v}"),
                Err(_) => write!(f, "[composite]"),
            },
            HostValue::Object(r) => write!(f, "[object {}]", r.type_name()),
            HostValue::Function(_) => write!(f, "[function]"),
            HostValue::Callback(c) => write!(f, "[callback {}]", c.token()),
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Int(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::Str(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::Str(v)
    }
}
