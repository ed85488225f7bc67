//! Invocation requests: a method name plus an ordered parameter list.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One positional parameter, labelled with its runtime type name.
///
/// The type label names the parameter's section in diagnostic envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    #[serde(rename = "type")]
    pub type_name: Cow<'static, str>,
    pub value: Value,
}

impl Param {
    /// Serializes `value`, labelling it with the last path segment of `T`.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if `value` cannot be represented as JSON.
    pub fn of<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            type_name: Cow::Borrowed(short_type_name::<T>()),
            value: serde_json::to_value(value)?,
        })
    }

    /// Wraps an already-serialized value under an explicit type label.
    #[must_use]
    pub fn named(type_name: impl Into<Cow<'static, str>>, value: Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }

    /// Decodes the parameter into `T`.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error if the value does not fit `T`.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.value)
    }
}

/// A single call: consumed once by the invoker, never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub method: String,
    pub params: Vec<Param>,
}

impl InvocationRequest {
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Serializes and appends a typed parameter.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if `value` cannot be represented as JSON.
    pub fn arg<T: Serialize>(self, value: &T) -> Result<Self, serde_json::Error> {
        Ok(self.param(Param::of(value)?))
    }
}

/// `std::any::type_name` without the module path or generic arguments.
#[must_use]
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
