use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request for creating, modifying, finding, and deleting GameObjects
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ManageGameObjectRequest {
    /// Operation: "create", "modify", "delete", "find", "get_components",
    /// "add_component", "remove_component", "set_component_property"
    pub action: String,

    /// Object to act on, by name, path, or instance id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// How to resolve `target` or `search_term`: "by_name", "by_id", "by_path",
    /// "by_tag", "by_layer", "by_component"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_method: Option<String>,

    /// Name for a new object, or the new name when modifying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Parent object to attach to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Local position [x, y, z]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 3]>,

    /// Local euler rotation [x, y, z] in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f64; 3]>,

    /// Local scale [x, y, z]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 3]>,

    /// Component type names to add
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components_to_add: Option<Vec<String>>,

    /// Primitive to create: "Cube", "Sphere", "Capsule", "Cylinder", "Plane", "Quad"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primitive_type: Option<String>,

    /// Save the created object as a prefab
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_as_prefab: Option<bool>,

    /// Asset path for the prefab
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefab_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_active: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,

    /// Component type names to remove
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components_to_remove: Option<Vec<String>>,

    /// Property values keyed by component, e.g. {"Rigidbody": {"mass": 2.0}}
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_properties: Option<Map<String, Value>>,

    /// Search text for "find"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,

    /// Return every match instead of the first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub find_all: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_in_children: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_inactive: Option<bool>,

    /// Component for "set_component_property" and "remove_component"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::to_params;
    use serde_json::json;

    #[test]
    fn test_create_primitive() {
        let request: ManageGameObjectRequest = serde_json::from_value(json!({
            "action": "create",
            "name": "Floor",
            "primitive_type": "Plane",
            "position": [0.0, -0.5, 0.0],
            "component_properties": {"MeshRenderer": {"enabled": true}},
        }))
        .unwrap();

        let params = to_params(&request).unwrap();
        assert_eq!(
            Value::from(params),
            json!({
                "action": "create",
                "name": "Floor",
                "primitiveType": "Plane",
                "position": [0.0, -0.5, 0.0],
                "componentProperties": {"MeshRenderer": {"enabled": true}},
            })
        );
    }

    #[test]
    fn test_find_only_sends_given_fields() {
        let request: ManageGameObjectRequest = serde_json::from_value(json!({
            "action": "find",
            "search_term": "Enemy",
            "search_method": "by_tag",
            "find_all": true,
        }))
        .unwrap();

        let params = to_params(&request).unwrap();
        assert_eq!(params.len(), 4);
        assert_eq!(params.get("findAll"), Some(&json!(true)));
        assert!(!params.contains_key("target"));
    }
}
