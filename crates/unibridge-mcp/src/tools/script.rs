//! C# script management
//!
//! Script bodies travel base64-encoded for `create` and `update` so that quotes,
//! braces and line endings survive the editor's JSON handling untouched.

use base64::Engine as _;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use unibridge_core::{Params, Response};

/// Request for managing a C# script
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ManageScriptRequest {
    /// Operation: "create", "read", "update", or "delete"
    pub action: String,

    /// Script name without the .cs extension
    pub name: String,

    /// Asset folder for the script (e.g. "Assets/Scripts/Player")
    #[serde(default)]
    pub path: Option<String>,

    /// Full C# source for "create" or "update"
    #[serde(default)]
    pub contents: Option<String>,

    /// Script template hint, such as "MonoBehaviour" or "ScriptableObject"
    #[serde(default)]
    pub script_type: Option<String>,

    /// Namespace to wrap generated code in
    #[serde(default)]
    pub namespace: Option<String>,
}

impl ManageScriptRequest {
    pub fn to_params(&self) -> Params {
        let mut params = Params::new()
            .with("action", self.action.as_str())
            .with("name", self.name.as_str())
            .with_opt("path", self.path.as_deref())
            .with_opt("scriptType", self.script_type.as_deref())
            .with_opt("namespace", self.namespace.as_deref());

        if let Some(contents) = &self.contents {
            if matches!(self.action.to_lowercase().as_str(), "create" | "update") {
                let encoded = base64::engine::general_purpose::STANDARD.encode(contents.as_bytes());
                params.insert("encodedContents", encoded);
                params.insert("contentsEncoded", true);
            } else {
                params.insert("contents", contents.as_str());
            }
        }
        params
    }
}

/// Replace an encoded script body in a reply with the plain text
pub fn decode_contents(response: &mut Response) {
    let Some(Value::Object(data)) = response.data.as_mut() else {
        return;
    };
    if data.get("contentsEncoded").and_then(Value::as_bool) != Some(true) {
        return;
    }

    let decoded = data
        .get("encodedContents")
        .and_then(Value::as_str)
        .and_then(|encoded| base64::engine::general_purpose::STANDARD.decode(encoded).ok());
    if let Some(bytes) = decoded {
        data.insert(
            "contents".to_string(),
            Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        );
        data.remove("encodedContents");
        data.remove("contentsEncoded");
    }
}
