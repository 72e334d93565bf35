//! unibridge MCP server - Unity editor tools for AI agents
//!
//! Every tool is a thin adapter over [`Dispatcher::send_command`]: it turns
//! typed arguments into a parameter mapping, sends the named command to the
//! editor bridge, and reshapes the reply. Tools never hold the connection;
//! concurrent tool calls queue on the dispatcher and reach the editor one
//! at a time.
//!
//! ## Tools
//!
//! - `manage_script`, `manage_scene`, `manage_editor`, `manage_gameobject`,
//!   `manage_asset`, `read_console`, `execute_menu_item`
//! - `take_screenshot`, `get_current_hierarchy`
//! - `compile_and_reload`, `manage_prefab_variant`

pub mod reply;
pub mod tools;

use base64::Engine as _;
use rmcp::{
    ErrorData as McpError,
    ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use serde_json::{Value, json};
use unibridge_core::{Dispatcher, Params, Response};

use crate::tools::{
    asset::ManageAssetRequest,
    editor::{CompileAndReloadRequest, ExecuteMenuItemRequest, ManageEditorRequest, ReadConsoleRequest},
    gameobject::ManageGameObjectRequest,
    prefab::ManagePrefabVariantRequest,
    scene::ManageSceneRequest,
    screenshot::TakeScreenshotRequest,
    script::{self, ManageScriptRequest},
    to_params,
};

// Re-export for binary
pub use rmcp;

/// The unibridge MCP service
#[derive(Clone)]
pub struct UnityMcpService {
    dispatcher: Dispatcher,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl UnityMcpService {
    /// Create a service that sends commands through `dispatcher`
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            tool_router: Self::tool_router(),
        }
    }

    async fn send(&self, command: &str, params: Params) -> Response {
        tracing::debug!(command, params = params.len(), "tool command");
        self.dispatcher.send_command(command, params).await
    }

    // ========================================================================
    // Scripts and Scenes
    // ========================================================================

    #[tool(description = "Create, read, update, or delete a C# script in the Unity project. Provide the full source in `contents` for create/update.")]
    pub async fn manage_script(
        &self,
        params: Parameters<ManageScriptRequest>,
    ) -> Result<CallToolResult, McpError> {
        let request = params.0;
        let mut response = self.send("manage_script", request.to_params()).await;
        script::decode_contents(&mut response);
        Ok(reply::into_result(reply::standard(&response)))
    }

    #[tool(description = "Load, save, or create scenes, and query the active scene or build settings.")]
    pub async fn manage_scene(
        &self,
        params: Parameters<ManageSceneRequest>,
    ) -> Result<CallToolResult, McpError> {
        let params = to_params(&params.0)?;
        let response = self.send("manage_scene", params).await;
        Ok(reply::into_result(reply::standard(&response)))
    }

    #[tool(description = "Get the GameObject hierarchy of the active scene as YAML.")]
    pub async fn get_current_hierarchy(&self) -> Result<CallToolResult, McpError> {
        let response = self.send("get_current_hierarchy", Params::new()).await;
        Ok(reply::into_result(reply::hierarchy(&response)))
    }

    // ========================================================================
    // GameObjects, Assets, and Prefabs
    // ========================================================================

    #[tool(description = "Create, modify, find, or delete GameObjects, and add, remove, or configure their components.")]
    pub async fn manage_gameobject(
        &self,
        params: Parameters<ManageGameObjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        let params = to_params(&params.0)?;
        let response = self.send("manage_gameobject", params).await;
        Ok(reply::into_result(reply::standard(&response)))
    }

    #[tool(description = "Import, create, modify, delete, move, rename, or search assets in the project's asset database.")]
    pub async fn manage_asset(
        &self,
        params: Parameters<ManageAssetRequest>,
    ) -> Result<CallToolResult, McpError> {
        let params = to_params(&params.0)?;
        let response = self.send("manage_asset", params).await;
        Ok(reply::into_result(reply::standard(&response)))
    }

    #[tool(description = "Create prefab variants and inspect, apply, or revert their overrides.")]
    pub async fn manage_prefab_variant(
        &self,
        params: Parameters<ManagePrefabVariantRequest>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.send("manage_prefab_variant", params.0.to_params()).await;
        Ok(reply::into_result(reply::standard(&response)))
    }

    // ========================================================================
    // Editor Control
    // ========================================================================

    #[tool(description = "Control the editor: enter, pause, or stop play mode, query editor state and selection, switch tools, and manage tags and layers.")]
    pub async fn manage_editor(
        &self,
        params: Parameters<ManageEditorRequest>,
    ) -> Result<CallToolResult, McpError> {
        let params = to_params(&params.0)?;
        let response = self.send("manage_editor", params).await;
        Ok(reply::into_result(reply::standard(&response)))
    }

    #[tool(description = "Execute a Unity editor menu item by its path, e.g. \"GameObject/3D Object/Cube\".")]
    pub async fn execute_menu_item(
        &self,
        params: Parameters<ExecuteMenuItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let params = to_params(&params.0)?;
        let response = self.send("execute_menu_item", params).await;
        Ok(reply::into_result(reply::standard(&response)))
    }

    #[tool(description = "Read or clear the Unity console. Filter by message type, text, or timestamp.")]
    pub async fn read_console(
        &self,
        params: Parameters<ReadConsoleRequest>,
    ) -> Result<CallToolResult, McpError> {
        let params = to_params(&params.0)?;
        let response = self.send("read_console", params).await;
        Ok(reply::into_result(reply::standard(&response)))
    }

    #[tool(description = "Recompile scripts and reload the script domain. Call after creating or editing C# scripts.")]
    pub async fn compile_and_reload(
        &self,
        params: Parameters<CompileAndReloadRequest>,
    ) -> Result<CallToolResult, McpError> {
        let params = to_params(&params.0)?;
        let response = self.send("compile_and_reload", params).await;
        Ok(reply::into_result(reply::standard(&response)))
    }

    // ========================================================================
    // Screenshots
    // ========================================================================

    #[tool(description = "Capture the Game view or Scene view to a PNG in the project's Screenshots folder. Set include_image to also return the image.")]
    pub async fn take_screenshot(
        &self,
        params: Parameters<TakeScreenshotRequest>,
    ) -> Result<CallToolResult, McpError> {
        let request = params.0;
        if let Err(message) = request.validate() {
            return Ok(reply::into_result(json!({"success": false, "message": message})));
        }

        let response = self.send("take_screenshot", request.to_params()).await;
        let body = reply::screenshot(&response, request.resolution);

        let mut extra = Vec::new();
        if request.include_image && response.success {
            extra.push(attach_image(&body).await);
        }
        Ok(reply::into_result_with(body, extra))
    }
}

/// Read the captured PNG named by `absolutePath`, or explain why it could not be attached
async fn attach_image(body: &Value) -> Content {
    let Some(path) = body.get("absolutePath").and_then(Value::as_str) else {
        return Content::text("Image not attached: the editor did not report a file path");
    };
    match tokio::fs::read(path).await {
        Ok(png_bytes) => {
            let b64 = base64::engine::general_purpose::STANDARD.encode(&png_bytes);
            Content::image(b64, "image/png")
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "screenshot not readable");
            Content::text(format!("Image not attached: cannot read {path}: {e}"))
        }
    }
}

#[tool_handler]
impl ServerHandler for UnityMcpService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "unibridge-mcp".to_string(),
                title: Some("Unity Editor Bridge".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools for driving a running Unity editor through its bridge on localhost. \
                 \n\nEvery tool returns a JSON object with a `success` flag; failures carry the \
                 reason in `message`.\n\n\
                 Typical flow:\n\
                 1. get_current_hierarchy() - See what is in the open scene\n\
                 2. manage_gameobject() / manage_asset() / manage_script() - Make changes\n\
                 3. compile_and_reload() - After editing scripts\n\
                 4. read_console() - Check for errors\n\
                 5. take_screenshot(include_image=true) - Look at the result"
                    .to_string(),
            ),
        }
    }
}
