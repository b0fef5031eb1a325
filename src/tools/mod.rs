//! Tool registry and dispatcher.
//!
//! Every `tools/call` is validated against the tool's declared input schema
//! before anything is sent to Blender. Valid calls are routed to one of:
//!
//! - the [`BlenderProxy`] directly (scene, code, screenshot, status tools and
//!   `set_texture`)
//! - an asset gateway ([`PolyHaven`], [`Sketchfab`])
//! - the [`JobTracker`] (Hyper3D and Hunyuan3D generation, polling, import)

mod error;
pub mod prompts;
pub mod registry;
pub mod schema;

pub use error::ToolError;
pub use registry::ToolRegistry;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde_json::{json, Map, Value};

use crate::assets::polyhaven::DownloadRequest;
use crate::assets::sketchfab::SearchQuery;
use crate::assets::{PolyHaven, Sketchfab};
use crate::blender::{embedded_error, BlenderProxy};
use crate::jobs::{GenerationRequest, JobTracker, PollOutcome};
use crate::mcp::server::{ToolCallResult, ToolContent};

/// Search results listed in a tool response.
const MAX_LISTED_RESULTS: usize = 20;

const DEFAULT_SCREENSHOT_SIZE: u64 = 800;

/// Routes tool calls to their handlers.
///
/// Owns the Blender proxy and the job table; both are only touched from the
/// dispatch loop.
#[derive(Debug)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    proxy: BlenderProxy,
    jobs: JobTracker,
}

impl ToolDispatcher {
    /// Creates a dispatcher over `proxy` and `jobs`.
    #[must_use]
    pub fn new(proxy: BlenderProxy, jobs: JobTracker) -> Self {
        Self {
            registry: ToolRegistry::new(),
            proxy,
            jobs,
        }
    }

    /// The tool catalogue.
    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The Blender proxy.
    #[must_use]
    pub const fn proxy(&self) -> &BlenderProxy {
        &self.proxy
    }

    /// The generation job table.
    #[must_use]
    pub const fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    /// Validates and executes a tool call.
    ///
    /// `arguments` may be `null` (treated as `{}`) or an object.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`]; see [`ToolError::is_invalid_params`] for how
    /// it is reported.
    pub async fn call(&mut self, name: &str, arguments: Value) -> Result<ToolCallResult, ToolError> {
        let args = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => {
                return Err(ToolError::InvalidParams(
                    "Tool arguments must be an object".to_string(),
                ))
            }
        };

        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        schema::validate(&tool.input_schema, &args).map_err(ToolError::InvalidParams)?;

        tracing::debug!(tool = name, "Dispatching tool call");
        let args = Args(&args);

        match name {
            // Scene
            "get_scene_info" => self.call_pretty("get_scene_info", json!({})).await,
            "get_object_info" => {
                let params = json!({ "name": args.required_str("object_name")? });
                self.call_pretty("get_object_info", params).await
            }
            "execute_blender_code" => self.call_execute_code(&args).await,
            "get_viewport_screenshot" => self.call_viewport_screenshot(&args).await,
            // Integration status
            "get_polyhaven_status" => self.call_status("get_polyhaven_status", "PolyHaven").await,
            "get_sketchfab_status" => self.call_status("get_sketchfab_status", "Sketchfab").await,
            "get_hyper3d_status" => self.call_status("get_hyper3d_status", "Hyper3D").await,
            "get_hunyuan3d_status" => self.call_status("get_hunyuan3d_status", "Hunyuan3D").await,
            // PolyHaven
            "get_polyhaven_categories" => self.call_polyhaven_categories(&args).await,
            "search_polyhaven_assets" => self.call_search_polyhaven(&args).await,
            "download_polyhaven_asset" => self.call_download_polyhaven(&args).await,
            "set_texture" => self.call_set_texture(&args).await,
            // Sketchfab
            "search_sketchfab_models" => self.call_search_sketchfab(&args).await,
            "download_sketchfab_model" => self.call_download_sketchfab(&args).await,
            // Generation
            "generate_hyper3d_model_via_text" => {
                let request = GenerationRequest::Hyper3dText {
                    text_prompt: args.required_str("text_prompt")?.to_string(),
                    bbox_condition: args.bbox_condition()?,
                };
                self.submit(&request).await
            }
            "generate_hyper3d_model_via_images" => self.call_generate_from_images(&args).await,
            "generate_hunyuan3d_model" => {
                let request = GenerationRequest::Hunyuan3d {
                    text_prompt: args.str("text_prompt").map(str::to_string),
                    input_image_url: args.str("input_image_url").map(str::to_string),
                };
                if matches!(
                    request,
                    GenerationRequest::Hunyuan3d {
                        text_prompt: None,
                        input_image_url: None
                    }
                ) {
                    return Err(ToolError::InvalidParams(
                        "Provide text_prompt or input_image_url".to_string(),
                    ));
                }
                self.submit(&request).await
            }
            "poll_rodin_job_status" => {
                let key = args
                    .first_str(&["subscription_key", "request_id"])
                    .ok_or_else(|| {
                        ToolError::InvalidParams(
                            "Provide subscription_key (MAIN_SITE) or request_id (FAL_AI)"
                                .to_string(),
                        )
                    })?;
                self.poll(key).await
            }
            "poll_hunyuan_job_status" => self.poll(args.required_str("job_id")?).await,
            "import_generated_asset" => {
                let key = args.first_str(&["task_uuid", "request_id"]).ok_or_else(|| {
                    ToolError::InvalidParams(
                        "Provide task_uuid (MAIN_SITE) or request_id (FAL_AI)".to_string(),
                    )
                })?;
                self.import(key, args.required_str("name")?).await
            }
            "import_generated_asset_hunyuan" => {
                self.import(args.required_str("zip_file_url")?, args.required_str("name")?)
                    .await
            }
            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    /// Sends a command and rejects results carrying an embedded error.
    async fn command(
        &self,
        kind: &str,
        params: Value,
        context: &'static str,
    ) -> Result<Value, ToolError> {
        let result = self.proxy.send(kind, params).await?;
        match embedded_error(&result) {
            Some(message) => Err(ToolError::Remote { context, message }),
            None => Ok(result),
        }
    }

    async fn call_pretty(&self, kind: &str, params: Value) -> Result<ToolCallResult, ToolError> {
        let result = self.command(kind, params, "Blender error").await?;
        Ok(ToolCallResult::text(pretty(&result)))
    }

    async fn call_execute_code(&self, args: &Args<'_>) -> Result<ToolCallResult, ToolError> {
        let params = json!({ "code": args.required_str("code")? });
        let result = self.command("execute_code", params, "Code execution error").await?;
        let output = match result.get("result") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        Ok(ToolCallResult::text(format!("Code executed: {output}")))
    }

    async fn call_viewport_screenshot(&self, args: &Args<'_>) -> Result<ToolCallResult, ToolError> {
        let path = screenshot_path();
        let params = json!({
            "max_size": args.u64_or("max_size", DEFAULT_SCREENSHOT_SIZE)?,
            "filepath": path.to_string_lossy(),
            "format": "png",
        });
        self.command("get_viewport_screenshot", params, "Screenshot error")
            .await?;

        let data = read_file(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!(path = %path.display(), error = %e, "Could not remove screenshot file");
        }

        Ok(ToolCallResult {
            content: vec![ToolContent::Image {
                data: BASE64_STANDARD.encode(data?),
                mime_type: "image/png".to_string(),
            }],
            is_error: false,
        })
    }

    async fn call_status(
        &self,
        kind: &str,
        integration: &str,
    ) -> Result<ToolCallResult, ToolError> {
        let result = self.command(kind, json!({}), "Status error").await?;
        Ok(ToolCallResult::text(message_or(&result, || {
            format!("{integration} status unknown")
        })))
    }

    async fn call_polyhaven_categories(&self, args: &Args<'_>) -> Result<ToolCallResult, ToolError> {
        let asset_type = args.str("asset_type").unwrap_or("hdris");
        let categories = PolyHaven::new(&self.proxy).categories(asset_type).await?;

        let mut text = String::from("Categories:");
        for (name, count) in categories {
            text.push_str(&format!("\n- {name}: {count} assets"));
        }
        Ok(ToolCallResult::text(text))
    }

    async fn call_search_polyhaven(&self, args: &Args<'_>) -> Result<ToolCallResult, ToolError> {
        let search = PolyHaven::new(&self.proxy)
            .search(
                args.str("asset_type").unwrap_or("all"),
                args.str("categories"),
                MAX_LISTED_RESULTS,
            )
            .await?;

        let mut text = format!("Found {} assets:", search.total_count);
        for asset in search.assets {
            text.push_str(&format!("\n- {} (ID: {})", asset.name, asset.id));
        }
        Ok(ToolCallResult::text(text))
    }

    async fn call_download_polyhaven(&self, args: &Args<'_>) -> Result<ToolCallResult, ToolError> {
        let request = DownloadRequest {
            asset_id: args.required_str("asset_id")?,
            asset_type: args.required_str("asset_type")?,
            resolution: args.str("resolution").unwrap_or("1k"),
            file_format: args.str("file_format"),
        };
        let message = PolyHaven::new(&self.proxy).download(&request).await?;
        Ok(ToolCallResult::text(message))
    }

    async fn call_set_texture(&self, args: &Args<'_>) -> Result<ToolCallResult, ToolError> {
        let params = json!({
            "object_name": args.required_str("object_name")?,
            "texture_id": args.required_str("texture_id")?,
        });
        let result = self.command("set_texture", params, "Texture error").await?;
        Ok(ToolCallResult::text(format!(
            "Texture applied: {}",
            message_or(&result, || "success".to_string())
        )))
    }

    async fn call_search_sketchfab(&self, args: &Args<'_>) -> Result<ToolCallResult, ToolError> {
        let query = SearchQuery {
            query: args.required_str("query")?,
            categories: args.str("categories"),
            count: args.u64_or("count", 20)?,
            downloadable: args.bool_or("downloadable", true),
        };
        let models = Sketchfab::new(&self.proxy).search(&query).await?;

        let mut text = format!("Found {} models:", models.len());
        for model in models.iter().take(MAX_LISTED_RESULTS) {
            text.push_str(&format!("\n- {} (UID: {})", model.name, model.uid));
        }
        Ok(ToolCallResult::text(text))
    }

    async fn call_download_sketchfab(&self, args: &Args<'_>) -> Result<ToolCallResult, ToolError> {
        let objects = Sketchfab::new(&self.proxy)
            .download(args.required_str("uid")?)
            .await?;

        Ok(ToolCallResult::text(if objects.is_empty() {
            "Model imported".to_string()
        } else {
            format!("Imported: {}", objects.join(", "))
        }))
    }

    async fn call_generate_from_images(
        &mut self,
        args: &Args<'_>,
    ) -> Result<ToolCallResult, ToolError> {
        let paths = args.str_array("input_image_paths");
        let image_urls = args.str_array("input_image_urls");
        if paths.is_none() && image_urls.is_none() {
            return Err(ToolError::InvalidParams(
                "Provide input_image_paths or input_image_urls".to_string(),
            ));
        }
        let bbox_condition = args.bbox_condition()?;

        let images = match paths {
            Some(paths) => {
                let mut encoded = Vec::with_capacity(paths.len());
                for path in paths {
                    let bytes = read_file(Path::new(&path)).await?;
                    encoded.push(BASE64_STANDARD.encode(bytes));
                }
                Some(encoded)
            }
            None => None,
        };

        self.submit(&GenerationRequest::Hyper3dImages {
            images,
            image_urls,
            bbox_condition,
        })
        .await
    }

    async fn submit(&mut self, request: &GenerationRequest) -> Result<ToolCallResult, ToolError> {
        let job = self.jobs.submit(&self.proxy, request).await?;
        Ok(ToolCallResult::text(pretty(&job.summary())))
    }

    async fn poll(&mut self, key: &str) -> Result<ToolCallResult, ToolError> {
        let outcome = self.jobs.poll(&self.proxy, key).await?;
        Ok(ToolCallResult::text(pretty(&poll_report(&outcome))))
    }

    async fn import(&mut self, key: &str, name: &str) -> Result<ToolCallResult, ToolError> {
        let imported = self.jobs.import_result(&self.proxy, key, name).await?;
        Ok(ToolCallResult::text(format!("Imported: {}", imported.message)))
    }
}

/// Borrowed view over validated tool arguments.
struct Args<'a>(&'a Map<String, Value>);

impl<'a> Args<'a> {
    fn str(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).and_then(Value::as_str)
    }

    fn required_str(&self, key: &str) -> Result<&'a str, ToolError> {
        self.str(key)
            .ok_or_else(|| ToolError::InvalidParams(format!("Missing required parameter: {key}")))
    }

    /// First non-empty string among `keys`.
    fn first_str(&self, keys: &[&str]) -> Option<&'a str> {
        keys.iter()
            .filter_map(|key| self.str(key))
            .find(|s| !s.is_empty())
    }

    /// Non-negative integer argument; whole floats such as `5.0` are accepted.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // whole, non-negative
    fn u64_or(&self, key: &str, default: u64) -> Result<u64, ToolError> {
        let Some(value) = self.0.get(key).filter(|v| !v.is_null()) else {
            return Ok(default);
        };
        value
            .as_u64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            })
            .ok_or_else(|| {
                ToolError::InvalidParams(format!(
                    "Invalid parameter '{key}': expected a non-negative integer, got {value}"
                ))
            })
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    fn str_array(&self, key: &str) -> Option<Vec<String>> {
        self.0.get(key).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }

    fn bbox_condition(&self) -> Result<Option<Vec<i64>>, ToolError> {
        match self.0.get("bbox_condition").and_then(Value::as_array) {
            Some(values) => normalize_bbox(values).map(Some),
            None => Ok(None),
        }
    }
}

/// Normalises a `[length, width, height]` ratio.
///
/// All-integer input passes through. Otherwise every entry must be positive
/// and is scaled so the largest becomes 100.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] for non-positive or non-numeric entries.
#[allow(clippy::cast_possible_truncation)] // entries are scaled into 0..=100
pub fn normalize_bbox(values: &[Value]) -> Result<Vec<i64>, ToolError> {
    if let Some(integers) = values.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
        return Ok(integers);
    }

    let floats = values
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ToolError::InvalidParams("bbox_condition must contain numbers".into()))?;

    if floats.iter().any(|&x| x <= 0.0) {
        return Err(ToolError::InvalidParams(
            "bbox_condition values must be > 0".into(),
        ));
    }

    let max = floats.iter().copied().fold(f64::MIN, f64::max);
    Ok(floats
        .iter()
        .map(|x| (x / max * 100.0).trunc() as i64)
        .collect())
}

fn poll_report(outcome: &PollOutcome) -> Value {
    let mut report = outcome.job.summary();
    if let Value::Object(map) = &mut report {
        map.insert("cached".to_string(), json!(outcome.is_cached()));
        map.insert(
            "remote_status".to_string(),
            outcome.remote.clone().unwrap_or(Value::Null),
        );
    }
    report
}

fn message_or(result: &Value, default: impl FnOnce() -> String) -> String {
    result
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(default, str::to_string)
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn screenshot_path() -> PathBuf {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    let n = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("blender_screenshot_{}_{n}.png", std::process::id()))
}

async fn read_file(path: &Path) -> Result<Vec<u8>, ToolError> {
    tokio::fs::read(path).await.map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::JobsConfig;

    fn dispatcher() -> ToolDispatcher {
        // Nothing listens on port 1; calls that reach the proxy fail to connect.
        let proxy = BlenderProxy::new("127.0.0.1", 1, Duration::from_secs(1));
        ToolDispatcher::new(proxy, JobTracker::new(&JobsConfig::default()))
    }

    #[test]
    fn bbox_integers_pass_through() {
        let values = vec![json!(1), json!(2), json!(0)];
        assert_eq!(normalize_bbox(&values).unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn bbox_floats_are_scaled_to_100() {
        let values = vec![json!(1), json!(2.5), json!(5.0)];
        assert_eq!(normalize_bbox(&values).unwrap(), vec![20, 50, 100]);

        let values = vec![json!(1.0), json!(3), json!(2)];
        assert_eq!(normalize_bbox(&values).unwrap(), vec![33, 100, 66]);
    }

    #[test]
    fn bbox_rejects_non_positive_floats() {
        let values = vec![json!(1.5), json!(0), json!(2)];
        let err = normalize_bbox(&values).unwrap_err();
        assert!(err.is_invalid_params());
    }

    #[test]
    fn integer_arguments_accept_whole_floats() {
        let map = args_map(json!({ "count": 5.0, "max_size": 400, "empty": null }));
        let args = Args(&map);
        assert_eq!(args.u64_or("count", 20).unwrap(), 5);
        assert_eq!(args.u64_or("max_size", 800).unwrap(), 400);
        assert_eq!(args.u64_or("empty", 800).unwrap(), 800);
        assert_eq!(args.u64_or("absent", 20).unwrap(), 20);
    }

    #[test]
    fn negative_integer_arguments_are_rejected() {
        for value in [json!(-3), json!(-1.0), json!(2.5)] {
            let map = args_map(json!({ "count": value }));
            let err = Args(&map).u64_or("count", 20).unwrap_err();
            assert!(err.is_invalid_params(), "{value}");
            assert!(err.to_string().contains("count"));
        }
    }

    fn args_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let err = dispatcher().call("render_animation", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
        assert!(err.is_invalid_params());
    }

    #[tokio::test]
    async fn schema_violations_never_reach_blender() {
        let mut dispatcher = dispatcher();

        let err = dispatcher
            .call("get_object_info", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));

        let err = dispatcher
            .call("execute_blender_code", json!({ "code": 7 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));

        let err = dispatcher
            .call("get_scene_info", json!(["not", "an", "object"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn image_generation_needs_a_source() {
        let err = dispatcher()
            .call("generate_hyper3d_model_via_images", json!({}))
            .await
            .unwrap_err();
        assert!(err.is_invalid_params());
    }

    #[tokio::test]
    async fn hunyuan_generation_needs_a_prompt_or_image() {
        let err = dispatcher()
            .call("generate_hunyuan3d_model", json!({ "text_prompt": null }))
            .await
            .unwrap_err();
        assert!(err.is_invalid_params());
    }

    #[tokio::test]
    async fn polling_unknown_job_is_invalid_state() {
        let err = dispatcher()
            .call("poll_hunyuan_job_status", json!({ "job_id": "never-issued" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Job(_)));
        assert!(err.is_invalid_params());
    }

    #[tokio::test]
    async fn rodin_poll_needs_a_key() {
        let err = dispatcher()
            .call("poll_rodin_job_status", json!({ "subscription_key": "" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn missing_blender_is_a_tool_error() {
        let err = dispatcher()
            .call("get_scene_info", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Blender(_)));
        assert!(!err.is_invalid_params());
    }

    #[tokio::test]
    async fn unreadable_image_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.png");
        let err = dispatcher()
            .call(
                "generate_hyper3d_model_via_images",
                json!({ "input_image_paths": [missing.to_string_lossy()] }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Io { .. }));
        assert!(!err.is_invalid_params());
    }
}
