//! Editor control: play mode, menu items, the console, and script compilation

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request for editor state and play mode control
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ManageEditorRequest {
    /// Operation: "play", "pause", "stop", "get_state", "get_selection",
    /// "set_active_tool", "add_tag", "remove_tag", "add_layer", "remove_layer", ...
    pub action: String,

    /// Block until the operation finishes, where supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_completion: Option<bool>,

    /// Tool for "set_active_tool"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Tag for tag operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,

    /// Layer for layer operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_name: Option<String>,
}

/// Request for running an editor menu item
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ExecuteMenuItemRequest {
    /// Full menu path, such as "GameObject/Create Empty"
    pub menu_path: String,

    /// Operation: "execute" (default), "get_available_menus"
    #[serde(default = "default_menu_action")]
    pub action: String,

    /// Extra arguments for the menu item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

fn default_menu_action() -> String {
    "execute".to_string()
}

/// Request for reading or clearing the editor console
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ReadConsoleRequest {
    /// Operation: "get" (default) or "clear"
    #[serde(default = "default_console_action")]
    pub action: String,

    /// Message types to include: "error", "warning", "log", "all"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,

    /// Maximum number of messages to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    /// Only messages containing this text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_text: Option<String>,

    /// Only messages after this ISO 8601 timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_timestamp: Option<String>,

    /// Output format: "plain", "detailed", or "json"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Include stack traces in the output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_stacktrace: Option<bool>,
}

fn default_console_action() -> String {
    "get".to_string()
}

/// Request for recompiling scripts and reloading the domain
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CompileAndReloadRequest {
    /// Operation, "compile_and_reload" unless the editor offers a finer one
    #[serde(default = "default_compile_action")]
    pub action: String,
}

fn default_compile_action() -> String {
    "compile_and_reload".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::to_params;
    use serde_json::json;

    #[test]
    fn test_console_defaults() {
        let request: ReadConsoleRequest =
            serde_json::from_value(json!({"types": ["error"], "include_stacktrace": false})).unwrap();
        let params = to_params(&request).unwrap();
        assert_eq!(
            Value::from(params),
            json!({"action": "get", "types": ["error"], "includeStacktrace": false})
        );
    }

    #[test]
    fn test_menu_item_keeps_snake_case_path() {
        let request: ExecuteMenuItemRequest =
            serde_json::from_value(json!({"menu_path": "File/Save Project"})).unwrap();
        let params = to_params(&request).unwrap();
        assert_eq!(
            Value::from(params),
            json!({"menu_path": "File/Save Project", "action": "execute"})
        );
    }

    #[test]
    fn test_compile_action_default() {
        let request: CompileAndReloadRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.action, "compile_and_reload");
    }

    #[test]
    fn test_editor_request() {
        let request: ManageEditorRequest =
            serde_json::from_value(json!({"action": "add_tag", "tag_name": "Enemy"})).unwrap();
        let params = to_params(&request).unwrap();
        assert_eq!(Value::from(params), json!({"action": "add_tag", "tagName": "Enemy"}));
    }
}
