use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request for asset database operations
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ManageAssetRequest {
    /// Operation: "import", "create", "modify", "delete", "duplicate", "move",
    /// "rename", "search", "get_info", "create_folder", "get_components"
    pub action: String,

    /// Asset path (e.g. "Assets/Materials/Ground.mat") or search scope
    pub path: String,

    /// Asset type for "create", such as "Material" or "Folder"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,

    /// Properties to set on create or modify
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    /// Target path for "duplicate", "move", and "rename"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Include a base64 preview image in the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_preview: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,

    /// Only assets modified after this ISO 8601 timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_date_after: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::to_params;
    use serde_json::json;

    #[test]
    fn test_search_request() {
        let request: ManageAssetRequest = serde_json::from_value(json!({
            "action": "search",
            "path": "Assets",
            "filter_type": "Material",
            "page_size": 20,
        }))
        .unwrap();

        let params = to_params(&request).unwrap();
        assert_eq!(
            Value::from(params),
            json!({"action": "search", "path": "Assets", "filterType": "Material", "pageSize": 20})
        );
    }
}
