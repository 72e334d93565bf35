//! Commands sent to the editor and the replies it produces

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Parameter mapping for a command.
///
/// Optional arguments go through [`Params::with_opt`] / [`Params::insert_opt`],
/// which leave the key out entirely when the value is `None`. The editor treats
/// a present key as "apply this field", so an explicit `null` is never sent on
/// behalf of an absent argument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter (builder form)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a parameter only if a value is provided (builder form)
    pub fn with_opt<V: Into<Value>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.insert_opt(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn insert_opt<V: Into<Value>>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Params> for Value {
    fn from(params: Params) -> Self {
        Value::Object(params.0)
    }
}

impl TryFrom<Value> for Params {
    type Error = Value;

    /// Succeeds for JSON objects and hands anything else back unchanged
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// A named command with its resolved parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub params: Params,
}

impl Command {
    pub fn new(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Uniform reply handed to tool adapters.
///
/// On success `data` carries the payload; on failure `error` does. `message` is
/// an optional human-readable note on either path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Look up a field of the `data` object
    pub fn data_field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }

    /// Render as the JSON mapping tool adapters consume
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(self.success));
        if let Some(data) = &self.data {
            map.insert("data".to_string(), data.clone());
        }
        if let Some(error) = &self.error {
            map.insert("error".to_string(), Value::String(error.clone()));
        }
        if let Some(message) = &self.message {
            map.insert("message".to_string(), Value::String(message.clone()));
        }
        Value::Object(map)
    }
}

impl From<Error> for Response {
    /// Normalize a transport failure: the class goes in `error`, the detail in `message`
    fn from(err: Error) -> Self {
        Self::failure(err.kind().label()).with_message(err.to_string())
    }
}
