use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Request for scene operations
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ManageSceneRequest {
    /// Operation: "load", "save", "create", "get_active", or "get_build_settings"
    pub action: String,

    /// Scene name without extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Asset folder containing the scene (e.g. "Assets/Scenes")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Index in build settings, used by "load"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_index: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::to_params;
    use serde_json::json;

    #[test]
    fn test_absent_fields_omitted() {
        let request: ManageSceneRequest =
            serde_json::from_value(json!({"action": "load", "build_index": 2})).unwrap();
        let params = to_params(&request).unwrap();
        assert_eq!(
            serde_json::Value::from(params),
            json!({"action": "load", "buildIndex": 2})
        );
    }
}
