//! Sketchfab: searchable library of downloadable models.

use serde_json::{json, Value};

use super::{request, GatewayError};
use crate::blender::BlenderProxy;

const SERVICE: &str = "Sketchfab";

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSummary {
    /// Sketchfab model UID.
    pub uid: String,
    /// Display name.
    pub name: String,
}

/// Parameters for [`Sketchfab::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery<'a> {
    /// Free-text query.
    pub query: &'a str,
    /// Comma-separated category filter.
    pub categories: Option<&'a str>,
    /// Maximum number of results requested from Sketchfab.
    pub count: u64,
    /// Only return downloadable models.
    pub downloadable: bool,
}

/// Sketchfab gateway borrowing the shared proxy.
#[derive(Debug, Clone, Copy)]
pub struct Sketchfab<'a> {
    proxy: &'a BlenderProxy,
}

impl<'a> Sketchfab<'a> {
    /// Creates a gateway over `proxy`.
    #[must_use]
    pub const fn new(proxy: &'a BlenderProxy) -> Self {
        Self { proxy }
    }

    /// Searches models.
    ///
    /// # Errors
    ///
    /// Returns an error if the add-on or Sketchfab fails.
    pub async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<ModelSummary>, GatewayError> {
        let result = request(
            self.proxy,
            SERVICE,
            "search_sketchfab_models",
            json!({
                "query": query.query,
                "categories": query.categories,
                "count": query.count,
                "downloadable": query.downloadable,
            }),
        )
        .await?;

        Ok(result
            .get("results")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .map(|m| ModelSummary {
                        uid: m.get("uid").and_then(Value::as_str).unwrap_or("?").to_string(),
                        name: m
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or("Unnamed")
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Downloads a model by UID and imports it, returning the new object names.
    ///
    /// # Errors
    ///
    /// Returns an error if the add-on or Sketchfab fails.
    pub async fn download(&self, uid: &str) -> Result<Vec<String>, GatewayError> {
        let result = request(
            self.proxy,
            SERVICE,
            "download_sketchfab_model",
            json!({ "uid": uid }),
        )
        .await?;

        Ok(result
            .get("imported_objects")
            .and_then(Value::as_array)
            .map(|objects| {
                objects
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}
