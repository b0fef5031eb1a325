//! PolyHaven: free HDRIs, textures and models.

use serde_json::{json, Value};

use super::{request, GatewayError};
use crate::blender::BlenderProxy;

const SERVICE: &str = "PolyHaven";

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSummary {
    /// PolyHaven asset id.
    pub id: String,
    /// Display name (falls back to the id).
    pub name: String,
}

/// Result of [`PolyHaven::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSearch {
    /// Total number of matches reported by PolyHaven.
    pub total_count: u64,
    /// The returned subset.
    pub assets: Vec<AssetSummary>,
}

/// Parameters for [`PolyHaven::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest<'a> {
    /// Asset id.
    pub asset_id: &'a str,
    /// `hdris`, `textures` or `models`.
    pub asset_type: &'a str,
    /// `1k`, `2k`, `4k`, ...
    pub resolution: &'a str,
    /// `hdr`, `exr`, `jpg`, `png`, `gltf`, `fbx`; add-on default when `None`.
    pub file_format: Option<&'a str>,
}

/// PolyHaven gateway borrowing the shared proxy.
#[derive(Debug, Clone, Copy)]
pub struct PolyHaven<'a> {
    proxy: &'a BlenderProxy,
}

impl<'a> PolyHaven<'a> {
    /// Creates a gateway over `proxy`.
    #[must_use]
    pub const fn new(proxy: &'a BlenderProxy) -> Self {
        Self { proxy }
    }

    /// Lists categories for an asset type with their asset counts, largest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the add-on or PolyHaven fails.
    pub async fn categories(&self, asset_type: &str) -> Result<Vec<(String, u64)>, GatewayError> {
        let result = request(
            self.proxy,
            SERVICE,
            "get_polyhaven_categories",
            json!({ "asset_type": asset_type }),
        )
        .await?;

        let mut categories: Vec<(String, u64)> = result
            .get("categories")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .map(|(name, count)| (name.clone(), count.as_u64().unwrap_or(0)))
                    .collect()
            })
            .unwrap_or_default();
        categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(categories)
    }

    /// Searches assets, returning at most `limit` summaries.
    ///
    /// # Errors
    ///
    /// Returns an error if the add-on or PolyHaven fails.
    pub async fn search(
        &self,
        asset_type: &str,
        categories: Option<&str>,
        limit: usize,
    ) -> Result<AssetSearch, GatewayError> {
        let result = request(
            self.proxy,
            SERVICE,
            "search_polyhaven_assets",
            json!({ "asset_type": asset_type, "categories": categories }),
        )
        .await?;

        let assets = result
            .get("assets")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .take(limit)
                    .map(|(id, data)| AssetSummary {
                        id: id.clone(),
                        name: data
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or(id)
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(AssetSearch {
            total_count: result
                .get("total_count")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            assets,
        })
    }

    /// Downloads an asset and imports it into the scene.
    ///
    /// Returns the add-on's message.
    ///
    /// # Errors
    ///
    /// Returns an error if the add-on or PolyHaven fails.
    pub async fn download(&self, req: &DownloadRequest<'_>) -> Result<String, GatewayError> {
        let result = request(
            self.proxy,
            SERVICE,
            "download_polyhaven_asset",
            json!({
                "asset_id": req.asset_id,
                "asset_type": req.asset_type,
                "resolution": req.resolution,
                "file_format": req.file_format,
            }),
        )
        .await?;

        Ok(result
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Asset downloaded")
            .to_string())
    }
}
