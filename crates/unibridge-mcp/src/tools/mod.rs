//! MCP tool requests for the editor bridge
//!
//! Each tool deserializes a typed request, turns it into the command's
//! parameter mapping, and leaves out every argument the caller did not give:
//! - Scripts (manage_script)
//! - Scenes (manage_scene, get_current_hierarchy)
//! - GameObjects (manage_gameobject)
//! - Assets and prefabs (manage_asset, manage_prefab_variant)
//! - Editor control (manage_editor, execute_menu_item, compile_and_reload, read_console)
//! - Screenshots (take_screenshot)

pub mod asset;
pub mod editor;
pub mod gameobject;
pub mod prefab;
pub mod scene;
pub mod screenshot;
pub mod script;

use rmcp::ErrorData as McpError;
use serde::Serialize;
use unibridge_core::Params;

/// Serialize a request into wire parameters.
///
/// Requests mark every optional field `skip_serializing_if = "Option::is_none"`,
/// so absent arguments never reach the editor as `null`.
pub fn to_params<T: Serialize>(request: &T) -> Result<Params, McpError> {
    let value = serde_json::to_value(request)
        .map_err(|e| McpError::invalid_params(format!("invalid arguments: {e}"), None))?;
    Params::try_from(value)
        .map_err(|_| McpError::internal_error("tool request did not serialize to an object", None))
}
