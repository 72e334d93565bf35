use schemars::JsonSchema;
use serde::Deserialize;
use unibridge_core::Params;

/// Request for prefab variant operations
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ManagePrefabVariantRequest {
    /// Operation: "create", "get_overrides", "apply_overrides", "revert_overrides",
    /// "get_variant_info"
    pub action: String,

    /// Prefab the variant derives from
    #[serde(default)]
    pub base_prefab_path: Option<String>,

    /// Existing variant asset path
    #[serde(default)]
    pub variant_path: Option<String>,

    /// Name for a new variant
    #[serde(default)]
    pub variant_name: Option<String>,

    /// Apply every override rather than a selection
    #[serde(default = "default_true")]
    pub apply_all: bool,

    /// Revert every override rather than a selection
    #[serde(default = "default_true")]
    pub revert_all: bool,
}

fn default_true() -> bool {
    true
}

impl ManagePrefabVariantRequest {
    pub fn to_params(&self) -> Params {
        Params::new()
            .with("action", self.action.as_str())
            .with_opt("base_prefab_path", self.base_prefab_path.as_deref())
            .with_opt("variant_path", self.variant_path.as_deref())
            .with_opt("variant_name", self.variant_name.as_deref())
            .with("apply_all", self.apply_all)
            .with("revert_all", self.revert_all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_defaults_and_omission() {
        let request: ManagePrefabVariantRequest = serde_json::from_value(json!({
            "action": "create",
            "base_prefab_path": "Assets/Prefabs/Enemy.prefab",
            "variant_name": "EnemyFast",
        }))
        .unwrap();

        assert_eq!(
            Value::from(request.to_params()),
            json!({
                "action": "create",
                "base_prefab_path": "Assets/Prefabs/Enemy.prefab",
                "variant_name": "EnemyFast",
                "apply_all": true,
                "revert_all": true,
            })
        );
    }
}
