//! Host functions and script callbacks.
//!
//! A host function crosses the bridge with an explicit descriptor
//! ([`FunctionShape`]): ordered input tags, a variadic flag, ordered
//! output tags, and whether the function follows the trailing-error
//! convention (Rust's `Result` is that convention). Closures become
//! [`HostFunction`]s through [`IntoHostFn`], which infers the descriptor
//! from the signature; [`HostArg`] and [`IntoHostValue`] are the
//! per-type conversions on the way in and out.
//!
//! The reverse direction is [`ScriptCallback`]: an adapter owning a
//! token into the script-side function table, callable from any host
//! thread.

use std::sync::Arc;

use crate::context::{self, EngineCore};
use crate::error::{Error, Result};
use crate::object::HostRef;
use crate::value::{HostValue, TypeTag};

/// Descriptor of a bridged function.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionShape {
    /// Input tags in order. For a variadic function the last tag is the
    /// element tag of the trailing sequence.
    pub params: Vec<TypeTag>,
    pub variadic: bool,
    /// Output tags in order; empty for procedures.
    pub returns: Vec<TypeTag>,
    /// Trailing-error convention: failures throw script-side.
    pub fallible: bool,
}

impl FunctionShape {
    pub fn new(params: Vec<TypeTag>, returns: Vec<TypeTag>) -> FunctionShape {
        FunctionShape {
            params,
            variadic: false,
            returns,
            fallible: false,
        }
    }

    /// Number of non-variadic parameters.
    pub fn fixed_params(&self) -> usize {
        if self.variadic {
            self.params.len().saturating_sub(1)
        } else {
            self.params.len()
        }
    }

    /// Tag for the argument at `index`, honoring the variadic tail.
    /// `None` when a surplus argument should be ignored.
    pub fn param_tag(&self, index: usize) -> Option<&TypeTag> {
        if index < self.fixed_params() {
            return self.params.get(index);
        }
        if self.variadic {
            return self.params.last();
        }
        None
    }
}

type DynHostFn = dyn Fn(Vec<HostValue>) -> Result<Vec<HostValue>> + Send + Sync;

/// A host function in bridge form.
#[derive(Clone)]
pub struct HostFunction {
    shape: FunctionShape,
    call: Arc<DynHostFn>,
}

impl HostFunction {
    /// Wrap a Rust closure, inferring its descriptor from the signature.
    pub fn new<Marker, F: IntoHostFn<Marker>>(f: F) -> HostFunction {
        f.into_host_fn()
    }

    /// Build from an explicit descriptor and an untyped callable.
    pub fn from_parts(
        shape: FunctionShape,
        call: impl Fn(Vec<HostValue>) -> Result<Vec<HostValue>> + Send + Sync + 'static,
    ) -> HostFunction {
        HostFunction {
            shape,
            call: Arc::new(call),
        }
    }

    /// A method of `object`, bound so later calls lock and dispatch on
    /// the live value.
    pub(crate) fn bound(object: HostRef, method: String, shape: FunctionShape) -> HostFunction {
        HostFunction::from_parts(shape, move |args| object.lock().call_method(&method, args))
    }

    pub fn shape(&self) -> &FunctionShape {
        &self.shape
    }

    /// Invoke with already-converted arguments. Missing trailing
    /// arguments bind as [`HostValue::Null`] (zero values); surplus
    /// arguments to a non-variadic function are ignored.
    pub fn call(&self, args: Vec<HostValue>) -> Result<Vec<HostValue>> {
        (self.call)(args)
    }
}

impl std::fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunction")
            .field("shape", &self.shape)
            .finish()
    }
}

/// Adapter for a script function held by the host.
///
/// Obtained when a script passes a function (or a numeric token from the
/// helper `proxy` idiom) to a callable parameter. Calling it enters the
/// engine; from a foreign thread that is a fresh entry, from inside a
/// script-triggered host frame it re-enters the live one. The adapter
/// keeps its context alive.
#[derive(Clone)]
pub struct ScriptCallback {
    pub(crate) token: u64,
    pub(crate) core: Arc<EngineCore>,
}

impl ScriptCallback {
    /// Token into the script-side function table.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Apply the script function and convert the result generically.
    pub fn call(&self, args: &[HostValue]) -> Result<HostValue> {
        self.call_typed(args, &TypeTag::Any)
    }

    /// Apply the script function and convert the result against a target
    /// tag.
    pub fn call_typed(&self, args: &[HostValue], result: &TypeTag) -> Result<HostValue> {
        context::op_callback_invoke(&self.core, self.token, args, result)
    }
}

impl std::fmt::Debug for ScriptCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptCallback")
            .field("token", &self.token)
            .finish()
    }
}

impl PartialEq for ScriptCallback {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token && Arc::ptr_eq(&self.core, &other.core)
    }
}

/// Marker for the last parameter of a variadic host function.
///
/// Collects the trailing script arguments; an absent tail is an empty
/// sequence, never a missing one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Variadic<T>(pub Vec<T>);

impl<T> std::ops::Deref for Variadic<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> IntoIterator for Variadic<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Typed structural parameter: the script value decodes through JSON
/// into `T`.
#[derive(Clone, Debug, PartialEq)]
pub struct Json<T>(pub T);

/// A parameter type of a host function.
pub trait HostArg: Sized + Send + 'static {
    fn type_tag() -> TypeTag;
    fn from_value(value: HostValue) -> Result<Self>;
}

macro_rules! impl_host_arg_int {
    ($($ty:ty),*) => {$(
        impl HostArg for $ty {
            fn type_tag() -> TypeTag {
                TypeTag::Int
            }

            fn from_value(value: HostValue) -> Result<Self> {
                Ok(value.to_i64()? as $ty)
            }
        }
    )*};
}

macro_rules! impl_host_arg_uint {
    ($($ty:ty),*) => {$(
        impl HostArg for $ty {
            fn type_tag() -> TypeTag {
                TypeTag::Uint
            }

            fn from_value(value: HostValue) -> Result<Self> {
                Ok(value.to_u64()? as $ty)
            }
        }
    )*};
}

impl_host_arg_int!(i8, i16, i32, i64, isize);
impl_host_arg_uint!(u8, u16, u32, u64, usize);

impl HostArg for f64 {
    fn type_tag() -> TypeTag {
        TypeTag::Float
    }

    fn from_value(value: HostValue) -> Result<Self> {
        value.to_f64()
    }
}

impl HostArg for f32 {
    fn type_tag() -> TypeTag {
        TypeTag::Float
    }

    fn from_value(value: HostValue) -> Result<Self> {
        Ok(value.to_f64()? as f32)
    }
}

impl HostArg for bool {
    fn type_tag() -> TypeTag {
        TypeTag::Bool
    }

    fn from_value(value: HostValue) -> Result<Self> {
        value.to_bool()
    }
}

impl HostArg for String {
    fn type_tag() -> TypeTag {
        TypeTag::Str
    }

    fn from_value(value: HostValue) -> Result<Self> {
        value.to_text()
    }
}

impl HostArg for HostValue {
    fn type_tag() -> TypeTag {
        TypeTag::Any
    }

    fn from_value(value: HostValue) -> Result<Self> {
        Ok(value)
    }
}

impl HostArg for HostRef {
    fn type_tag() -> TypeTag {
        TypeTag::Object
    }

    fn from_value(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Object(r) => Ok(r),
            other => Err(Error::decode("proxied object", other.kind_name())),
        }
    }
}

impl HostArg for ScriptCallback {
    fn type_tag() -> TypeTag {
        TypeTag::Callback
    }

    fn from_value(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Callback(c) => Ok(c),
            other => Err(Error::decode("callable", other.kind_name())),
        }
    }
}

impl<T: HostArg> HostArg for Option<T> {
    fn type_tag() -> TypeTag {
        T::type_tag()
    }

    fn from_value(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: HostArg> HostArg for Vec<T> {
    fn type_tag() -> TypeTag {
        TypeTag::Any
    }

    fn from_value(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Null => Ok(Vec::new()),
            HostValue::Array(items) => items.into_iter().map(T::from_value).collect(),
            HostValue::Json(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|v| T::from_value(HostValue::from_json(v)))
                .collect(),
            other => Err(Error::decode("array", other.kind_name())),
        }
    }
}

impl<T> HostArg for Json<T>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    fn type_tag() -> TypeTag {
        TypeTag::Json
    }

    fn from_value(value: HostValue) -> Result<Self> {
        let raw = match value {
            HostValue::Json(v) => v,
            other => other.to_json()?,
        };
        serde_json::from_value(raw)
            .map(Json)
            .map_err(|e| Error::decode("structural value", e.to_string()))
    }
}

/// A value a host function can hand back to the script.
pub trait IntoHostValue: Send + 'static {
    fn type_tag() -> TypeTag;
    fn into_host(self) -> HostValue;
}

macro_rules! impl_into_host_value {
    ($($ty:ty => $tag:ident, $build:expr;)*) => {$(
        impl IntoHostValue for $ty {
            fn type_tag() -> TypeTag {
                TypeTag::$tag
            }

            #[allow(clippy::redundant_closure_call)]
            fn into_host(self) -> HostValue {
                ($build)(self)
            }
        }
    )*};
}

impl_into_host_value! {
    bool => Bool, HostValue::Bool;
    i8 => Int, |v| HostValue::Int(v as i64);
    i16 => Int, |v| HostValue::Int(v as i64);
    i32 => Int, |v| HostValue::Int(v as i64);
    i64 => Int, HostValue::Int;
    isize => Int, |v| HostValue::Int(v as i64);
    u8 => Uint, |v| HostValue::Uint(v as u64);
    u16 => Uint, |v| HostValue::Uint(v as u64);
    u32 => Uint, |v| HostValue::Uint(v as u64);
    u64 => Uint, HostValue::Uint;
    usize => Uint, |v| HostValue::Uint(v as u64);
    f32 => Float, |v| HostValue::Float(v as f64);
    f64 => Float, HostValue::Float;
    String => Str, HostValue::Str;
    &'static str => Str, |v: &str| HostValue::Str(v.to_string());
    HostValue => Any, |v| v;
    HostRef => Object, HostValue::Object;
    ScriptCallback => Callback, HostValue::Callback;
    serde_json::Value => Json, HostValue::Json;
}

impl IntoHostValue for indexmap::IndexMap<String, HostValue> {
    fn type_tag() -> TypeTag {
        TypeTag::Any
    }

    fn into_host(self) -> HostValue {
        HostValue::Map(self)
    }
}

impl<T: IntoHostValue> IntoHostValue for Vec<T> {
    fn type_tag() -> TypeTag {
        TypeTag::Any
    }

    fn into_host(self) -> HostValue {
        HostValue::Array(self.into_iter().map(IntoHostValue::into_host).collect())
    }
}

impl<T: IntoHostValue> IntoHostValue for Option<T> {
    fn type_tag() -> TypeTag {
        T::type_tag()
    }

    fn into_host(self) -> HostValue {
        match self {
            Some(v) => v.into_host(),
            None => HostValue::Null,
        }
    }
}

/// The return side of a host function: output tags plus the
/// trailing-error flag, and the conversion of an actual return value
/// into output values.
pub trait IntoHostReturn: Send + 'static {
    /// `(output tags, fallible)`.
    fn return_shape() -> (Vec<TypeTag>, bool);
    fn into_return(self) -> Result<Vec<HostValue>>;
}

impl IntoHostReturn for () {
    fn return_shape() -> (Vec<TypeTag>, bool) {
        (Vec::new(), false)
    }

    fn into_return(self) -> Result<Vec<HostValue>> {
        Ok(Vec::new())
    }
}

macro_rules! impl_into_host_return {
    ($($ty:ty),*) => {$(
        impl IntoHostReturn for $ty {
            fn return_shape() -> (Vec<TypeTag>, bool) {
                (vec![<$ty as IntoHostValue>::type_tag()], false)
            }

            fn into_return(self) -> Result<Vec<HostValue>> {
                Ok(vec![self.into_host()])
            }
        }
    )*};
}

impl_into_host_return!(
    bool,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    String,
    &'static str,
    HostValue,
    HostRef,
    ScriptCallback,
    serde_json::Value,
    indexmap::IndexMap<String, HostValue>
);

impl<T: IntoHostValue> IntoHostReturn for Vec<T> {
    fn return_shape() -> (Vec<TypeTag>, bool) {
        (vec![TypeTag::Any], false)
    }

    fn into_return(self) -> Result<Vec<HostValue>> {
        Ok(vec![self.into_host()])
    }
}

impl<T: IntoHostValue> IntoHostReturn for Option<T> {
    fn return_shape() -> (Vec<TypeTag>, bool) {
        (vec![T::type_tag()], false)
    }

    fn into_return(self) -> Result<Vec<HostValue>> {
        Ok(vec![self.into_host()])
    }
}

impl<A: IntoHostValue, B: IntoHostValue> IntoHostReturn for (A, B) {
    fn return_shape() -> (Vec<TypeTag>, bool) {
        (vec![A::type_tag(), B::type_tag()], false)
    }

    fn into_return(self) -> Result<Vec<HostValue>> {
        Ok(vec![self.0.into_host(), self.1.into_host()])
    }
}

impl<A: IntoHostValue, B: IntoHostValue, C: IntoHostValue> IntoHostReturn for (A, B, C) {
    fn return_shape() -> (Vec<TypeTag>, bool) {
        (vec![A::type_tag(), B::type_tag(), C::type_tag()], false)
    }

    fn into_return(self) -> Result<Vec<HostValue>> {
        Ok(vec![self.0.into_host(), self.1.into_host(), self.2.into_host()])
    }
}

/// Trailing-error convention: `Err` throws script-side with the error's
/// description; `Ok` strips the error slot.
impl<R, E> IntoHostReturn for std::result::Result<R, E>
where
    R: IntoHostReturn,
    E: std::fmt::Display + Send + 'static,
{
    fn return_shape() -> (Vec<TypeTag>, bool) {
        let (returns, _) = R::return_shape();
        (returns, true)
    }

    fn into_return(self) -> Result<Vec<HostValue>> {
        match self {
            Ok(r) => r.into_return(),
            Err(e) => Err(Error::Function {
                message: e.to_string(),
            }),
        }
    }
}

/// Conversion of a Rust closure into a [`HostFunction`].
///
/// Implemented for `Fn` closures of up to six parameters, optionally
/// ending in [`Variadic`]; the marker parameter carries the signature so
/// the impls do not overlap.
pub trait IntoHostFn<Marker>: Send + Sync + 'static {
    fn into_host_fn(self) -> HostFunction;
}

macro_rules! impl_into_host_fn {
    ($($arg:ident),*) => {
        impl<Func, $($arg,)* Ret> IntoHostFn<fn($($arg),*) -> Ret> for Func
        where
            Func: Fn($($arg),*) -> Ret + Send + Sync + 'static,
            $($arg: HostArg,)*
            Ret: IntoHostReturn,
        {
            fn into_host_fn(self) -> HostFunction {
                let (returns, fallible) = Ret::return_shape();
                let shape = FunctionShape {
                    params: vec![$($arg::type_tag()),*],
                    variadic: false,
                    returns,
                    fallible,
                };
                HostFunction::from_parts(shape, move |args| {
                    #[allow(unused_mut, unused_variables)]
                    let mut args = args.into_iter();
                    $(
                        #[allow(non_snake_case)]
                        let $arg = $arg::from_value(args.next().unwrap_or(HostValue::Null))?;
                    )*
                    (self)($($arg),*).into_return()
                })
            }
        }
    };
}

impl_into_host_fn!();
impl_into_host_fn!(A0);
impl_into_host_fn!(A0, A1);
impl_into_host_fn!(A0, A1, A2);
impl_into_host_fn!(A0, A1, A2, A3);
impl_into_host_fn!(A0, A1, A2, A3, A4);
impl_into_host_fn!(A0, A1, A2, A3, A4, A5);

macro_rules! impl_into_host_fn_variadic {
    ($($arg:ident),*) => {
        impl<Func, $($arg,)* Var, Ret> IntoHostFn<(Variadic<Var>, fn($($arg),*) -> Ret)> for Func
        where
            Func: Fn($($arg,)* Variadic<Var>) -> Ret + Send + Sync + 'static,
            $($arg: HostArg,)*
            Var: HostArg,
            Ret: IntoHostReturn,
        {
            fn into_host_fn(self) -> HostFunction {
                let (returns, fallible) = Ret::return_shape();
                let shape = FunctionShape {
                    params: vec![$($arg::type_tag(),)* Var::type_tag()],
                    variadic: true,
                    returns,
                    fallible,
                };
                HostFunction::from_parts(shape, move |args| {
                    #[allow(unused_mut)]
                    let mut args = args.into_iter();
                    $(
                        #[allow(non_snake_case)]
                        let $arg = $arg::from_value(args.next().unwrap_or(HostValue::Null))?;
                    )*
                    let tail = args
                        .map(Var::from_value)
                        .collect::<Result<Vec<Var>>>()?;
                    (self)($($arg,)* Variadic(tail)).into_return()
                })
            }
        }
    };
}

impl_into_host_fn_variadic!();
impl_into_host_fn_variadic!(A0);
impl_into_host_fn_variadic!(A0, A1);
impl_into_host_fn_variadic!(A0, A1, A2);
impl_into_host_fn_variadic!(A0, A1, A2, A3);
