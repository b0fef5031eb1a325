//! The tool catalogue advertised through `tools/list`.

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::mcp::server::ToolDefinition;

/// Immutable name → definition map, in advertised order.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Builds the registry with every tool.
    #[must_use]
    pub fn new() -> Self {
        let tools = tool_definitions()
            .into_iter()
            .map(|tool| (tool.name.clone(), tool))
            .collect();
        Self { tools }
    }

    /// Looks a tool up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// All definitions, in advertised order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
    }
}

fn no_arguments() -> Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}

#[allow(clippy::too_many_lines)]
fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        // === Scene ===
        tool(
            "get_scene_info",
            "Get detailed information about the current Blender scene",
            no_arguments(),
        ),
        tool(
            "get_object_info",
            "Get detailed information about a specific object in the scene",
            json!({
                "type": "object",
                "properties": {
                    "object_name": { "type": "string", "description": "Name of the object" }
                },
                "required": ["object_name"]
            }),
        ),
        tool(
            "execute_blender_code",
            "Execute Python code in Blender. Break complex operations into smaller steps.",
            json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string", "description": "Python code to execute" }
                },
                "required": ["code"]
            }),
        ),
        tool(
            "get_viewport_screenshot",
            "Capture a screenshot of the current Blender 3D viewport",
            json!({
                "type": "object",
                "properties": {
                    "max_size": {
                        "type": "integer",
                        "description": "Maximum size in pixels (default 800)"
                    }
                },
                "required": []
            }),
        ),
        // === PolyHaven ===
        tool(
            "get_polyhaven_status",
            "Check if PolyHaven integration is enabled in Blender",
            no_arguments(),
        ),
        tool(
            "get_polyhaven_categories",
            "Get categories for a specific asset type on PolyHaven",
            json!({
                "type": "object",
                "properties": {
                    "asset_type": {
                        "type": "string",
                        "description": "Asset type: hdris, textures, models, all"
                    }
                },
                "required": []
            }),
        ),
        tool(
            "search_polyhaven_assets",
            "Search for assets on PolyHaven with optional filtering",
            json!({
                "type": "object",
                "properties": {
                    "asset_type": { "type": "string", "description": "Type: hdris, textures, models, all" },
                    "categories": { "type": "string", "description": "Comma-separated categories" }
                },
                "required": []
            }),
        ),
        tool(
            "download_polyhaven_asset",
            "Download and import a PolyHaven asset into Blender",
            json!({
                "type": "object",
                "properties": {
                    "asset_id": { "type": "string", "description": "Asset ID" },
                    "asset_type": { "type": "string", "description": "Type: hdris, textures, models" },
                    "resolution": { "type": "string", "description": "Resolution: 1k, 2k, 4k" },
                    "file_format": {
                        "type": "string",
                        "description": "Format: hdr, exr, jpg, png, gltf, fbx"
                    }
                },
                "required": ["asset_id", "asset_type"]
            }),
        ),
        tool(
            "set_texture",
            "Apply a downloaded PolyHaven texture to an object",
            json!({
                "type": "object",
                "properties": {
                    "object_name": { "type": "string", "description": "Object name" },
                    "texture_id": { "type": "string", "description": "PolyHaven texture ID" }
                },
                "required": ["object_name", "texture_id"]
            }),
        ),
        // === Sketchfab ===
        tool(
            "get_sketchfab_status",
            "Check if Sketchfab integration is enabled in Blender",
            no_arguments(),
        ),
        tool(
            "search_sketchfab_models",
            "Search for models on Sketchfab",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" },
                    "categories": { "type": "string", "description": "Comma-separated categories" },
                    "count": { "type": "integer", "description": "Max results (default 20)" },
                    "downloadable": { "type": "boolean", "description": "Only downloadable models" }
                },
                "required": ["query"]
            }),
        ),
        tool(
            "download_sketchfab_model",
            "Download and import a Sketchfab model by UID",
            json!({
                "type": "object",
                "properties": {
                    "uid": { "type": "string", "description": "Sketchfab model UID" }
                },
                "required": ["uid"]
            }),
        ),
        // === Hyper3D Rodin ===
        tool(
            "get_hyper3d_status",
            "Check if Hyper3D Rodin integration is enabled in Blender",
            no_arguments(),
        ),
        tool(
            "generate_hyper3d_model_via_text",
            "Generate 3D asset using Hyper3D from text description",
            json!({
                "type": "object",
                "properties": {
                    "text_prompt": { "type": "string", "description": "Description in English" },
                    "bbox_condition": {
                        "type": "array",
                        "items": { "type": "number" },
                        "description": "[Length, Width, Height] ratio"
                    }
                },
                "required": ["text_prompt"]
            }),
        ),
        tool(
            "generate_hyper3d_model_via_images",
            "Generate 3D asset using Hyper3D from images",
            json!({
                "type": "object",
                "properties": {
                    "input_image_paths": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Absolute paths to images"
                    },
                    "input_image_urls": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "URLs of images"
                    },
                    "bbox_condition": {
                        "type": "array",
                        "items": { "type": "number" },
                        "description": "[L,W,H] ratio"
                    }
                },
                "required": []
            }),
        ),
        tool(
            "poll_rodin_job_status",
            "Check if Hyper3D Rodin generation task is completed",
            json!({
                "type": "object",
                "properties": {
                    "subscription_key": { "type": "string", "description": "For MAIN_SITE mode" },
                    "request_id": { "type": "string", "description": "For FAL_AI mode" }
                },
                "required": []
            }),
        ),
        tool(
            "import_generated_asset",
            "Import asset generated by Hyper3D Rodin",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Object name in scene" },
                    "task_uuid": { "type": "string", "description": "For MAIN_SITE mode" },
                    "request_id": { "type": "string", "description": "For FAL_AI mode" }
                },
                "required": ["name"]
            }),
        ),
        // === Hunyuan3D ===
        tool(
            "get_hunyuan3d_status",
            "Check if Hunyuan3D integration is enabled in Blender",
            no_arguments(),
        ),
        tool(
            "generate_hunyuan3d_model",
            "Generate 3D asset using Hunyuan3D from text or image",
            json!({
                "type": "object",
                "properties": {
                    "text_prompt": { "type": "string", "description": "Text description" },
                    "input_image_url": { "type": "string", "description": "Image URL" }
                },
                "required": []
            }),
        ),
        tool(
            "poll_hunyuan_job_status",
            "Check if Hunyuan3D generation task is completed",
            json!({
                "type": "object",
                "properties": {
                    "job_id": { "type": "string", "description": "Job ID from generate step" }
                },
                "required": ["job_id"]
            }),
        ),
        tool(
            "import_generated_asset_hunyuan",
            "Import asset generated by Hunyuan3D",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Object name in scene" },
                    "zip_file_url": {
                        "type": "string",
                        "description": "ZIP file URL from generate step"
                    }
                },
                "required": ["name", "zip_file_url"]
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_twenty_one_unique_tools() {
        let definitions = tool_definitions();
        assert_eq!(definitions.len(), 21);

        let registry = ToolRegistry::new();
        assert_eq!(registry.len(), 21, "tool names must be unique");
    }

    #[test]
    fn every_schema_is_an_object_schema() {
        for tool in ToolRegistry::new().definitions() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(tool.input_schema["properties"].is_object(), "{}", tool.name);

            let properties = tool.input_schema["properties"].as_object().unwrap();
            for required in tool.input_schema["required"].as_array().unwrap() {
                let required = required.as_str().unwrap();
                assert!(
                    properties.contains_key(required),
                    "{} requires undeclared '{required}'",
                    tool.name
                );
            }
        }
    }

    #[test]
    fn lookup_by_name() {
        let registry = ToolRegistry::new();
        assert!(registry.get("get_scene_info").is_some());
        assert!(registry.get("render_animation").is_none());
    }

    #[test]
    fn definitions_serialise_with_camel_case_schema() {
        let registry = ToolRegistry::new();
        let tool = registry.get("execute_blender_code").unwrap();
        let json = serde_json::to_value(tool).unwrap();
        assert!(json.get("inputSchema").is_some());
        assert_eq!(json["inputSchema"]["required"][0], "code");
    }
}
