//! The `asset_creation_strategy` prompt.

use serde::Serialize;
use serde_json::{json, Value};

/// A prompt definition for `prompts/list`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDefinition {
    /// Unique prompt name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

const ASSET_CREATION_STRATEGY: PromptDefinition = PromptDefinition {
    name: "asset_creation_strategy",
    description: "Defines the preferred strategy for creating assets in Blender",
};

const ASSET_CREATION_STRATEGY_TEXT: &str = r#"When creating 3D content in Blender, always start by checking if integrations are available:

0. Before anything, always check the scene from get_scene_info()
1. First use the following tools to verify if the following integrations are enabled:
    1. PolyHaven
        Use get_polyhaven_status() to verify its status
        If PolyHaven is enabled:
        - For objects/models: Use download_polyhaven_asset() with asset_type="models"
        - For materials/textures: Use download_polyhaven_asset() with asset_type="textures"
        - For environment lighting: Use download_polyhaven_asset() with asset_type="hdris"
    2. Sketchfab
        Sketchfab is good at Realistic models, and has a wider variety of models than PolyHaven.
        Use get_sketchfab_status() to verify its status
        If Sketchfab is enabled:
        - For objects/models: First search using search_sketchfab_models() with your query
        - Then download specific models using download_sketchfab_model() with the UID
    3. Hyper3D(Rodin)
        Hyper3D Rodin is good at generating 3D models for single item.
        Use get_hyper3d_status() to verify its status
        If Hyper3D is enabled:
        - Use generate_hyper3d_model_via_text() or generate_hyper3d_model_via_images()
        - Poll with poll_rodin_job_status()
        - Import with import_generated_asset()
    4. Hunyuan3D
        Hunyuan3D is good at generating 3D models for single item.
        Use get_hunyuan3d_status() to verify its status
        If Hunyuan3D is enabled:
        - Use generate_hunyuan3d_model()
        - Poll with poll_hunyuan_job_status()
        - Import with import_generated_asset_hunyuan()

2. Recommended asset source priority:
    - For specific existing objects: First try Sketchfab, then PolyHaven
    - For generic objects/furniture: First try PolyHaven, then Sketchfab
    - For custom or unique items: Use Hyper3D Rodin or Hunyuan3D
    - For environment lighting: Use PolyHaven HDRIs
    - For materials/textures: Use PolyHaven textures

3. Only fall back to scripting when:
    - All integrations are disabled
    - A simple primitive is explicitly requested
    - No suitable asset exists in any libraries"#;

/// All prompts, for `prompts/list`.
#[must_use]
pub fn prompt_definitions() -> Vec<PromptDefinition> {
    vec![ASSET_CREATION_STRATEGY]
}

/// The `prompts/get` result for `name`, or `None` if there is no such prompt.
#[must_use]
pub fn get_prompt(name: &str) -> Option<Value> {
    (name == ASSET_CREATION_STRATEGY.name).then(|| {
        json!({
            "description": ASSET_CREATION_STRATEGY.description,
            "messages": [{
                "role": "assistant",
                "content": { "type": "text", "text": ASSET_CREATION_STRATEGY_TEXT }
            }]
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_prompt() {
        let prompts = prompt_definitions();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].name, "asset_creation_strategy");
    }

    #[test]
    fn strategy_is_one_assistant_message() {
        let prompt = get_prompt("asset_creation_strategy").unwrap();
        let messages = prompt["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "assistant");
        let text = messages[0]["content"]["text"].as_str().unwrap();
        assert!(text.starts_with("When creating 3D content in Blender"));
        assert!(text.contains("import_generated_asset_hunyuan()"));
    }

    #[test]
    fn unknown_prompt_is_none() {
        assert!(get_prompt("scene_cleanup").is_none());
    }
}
