//! Protocol message types for host↔bus communication.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request sent from the host to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
#[non_exhaustive]
pub enum Request {
    /// Enumerate every device reachable on the bus.
    List,
    /// Describe the methods of the device with the given id.
    Methods(String),
    /// Invoke a method on a device.
    Invoke(InvokeReq),
}

/// Method invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeReq {
    /// Target device id, as reported by [`Response::List`].
    pub device_id: String,
    /// Method name (the selector).
    pub name: String,
    /// Positional parameters.
    pub parameters: Vec<Value>,
}

/// Response sent from the bus to the host.
///
/// Deserialization goes through a loose envelope so that a missing `data`
/// field reads as `null` and an unknown `type` is reported by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
#[serde(try_from = "Envelope")]
#[non_exhaustive]
pub enum Response {
    /// Reply to [`Request::List`], in bus-enumeration order.
    List(Vec<DeviceEntry>),
    /// Reply to [`Request::Methods`].
    Methods(Vec<MethodEntry>),
    /// Successful reply to [`Request::Invoke`].
    Result(Value),
    /// The bus or device rejected the request.
    Error(String),
}

/// One device in a [`Response::List`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    /// Opaque device id, valid for the current bus session.
    pub device_id: String,
    /// Capability names the device advertises.
    #[serde(default)]
    pub type_names: Vec<String>,
}

/// One method in a [`Response::Methods`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodEntry {
    /// Method name, usable as an invoke selector.
    pub name: String,
    /// Declared return type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Description of the returned value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value_description: Option<String>,
    /// Positional parameters.
    #[serde(default)]
    pub parameters: Vec<ParameterEntry>,
}

/// One parameter of a [`MethodEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterEntry {
    /// Parameter name, if the device declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Declared parameter type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Untyped response envelope.
#[derive(Deserialize)]
struct Envelope {
    /// Message type tag.
    #[serde(rename = "type")]
    kind: String,
    /// Payload; absent means `null`.
    #[serde(default)]
    data: Value,
}

impl TryFrom<Envelope> for Response {
    type Error = String;

    fn try_from(env: Envelope) -> Result<Self, String> {
        match env.kind.as_str() {
            "list" => serde_json::from_value(env.data)
                .map(Self::List)
                .map_err(|e| format!("malformed list response: {e}")),
            "methods" => serde_json::from_value(env.data)
                .map(Self::Methods)
                .map_err(|e| format!("malformed methods response: {e}")),
            "result" => Ok(Self::Result(env.data)),
            "error" => match env.data {
                Value::String(reason) => Ok(Self::Error(reason)),
                Value::Null => Ok(Self::Error("unspecified error".into())),
                other => Ok(Self::Error(other.to_string())),
            },
            other => Err(format!("unknown response type `{other}`")),
        }
    }
}
