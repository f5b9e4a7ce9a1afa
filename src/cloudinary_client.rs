// src/cloudinary_client.rs
// Cloudinary Admin + Upload API client
// Docs: https://cloudinary.com/documentation/admin_api, https://cloudinary.com/documentation/image_upload_api_reference

use crate::config::CloudinaryConfig;
use crate::error::{PosterError, Result};
use crate::types::MediaResource;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_BASE_URL: &str = "https://api.cloudinary.com";
/// Cloudinary files audio under the video resource type too, so both source
/// folders and the merged output live under it.
const VIDEO_RESOURCE: &str = "video";
/// Admin API page size ceiling.
pub const MAX_RESULTS: usize = 500;

#[derive(Debug, Clone)]
pub struct CloudinaryClient {
    client: Client,
    config: CloudinaryConfig,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ResourceListResponse {
    pub resources: Vec<MediaResource>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub public_id: String,
    pub secure_url: String,
    #[serde(default)]
    pub existing: Option<bool>,
}

/// Options of a signed upload. Every field here is part of the signature.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub folder: String,
    pub use_filename: bool,
    pub unique_filename: bool,
    pub overwrite: bool,
}

impl UploadOptions {
    pub fn into_folder(folder: &str) -> Self {
        Self {
            folder: folder.to_string(),
            use_filename: true,
            unique_filename: false,
            overwrite: false,
        }
    }

    fn params(&self, timestamp: i64) -> Vec<(&'static str, String)> {
        vec![
            ("folder", self.folder.clone()),
            ("overwrite", self.overwrite.to_string()),
            ("timestamp", timestamp.to_string()),
            ("unique_filename", self.unique_filename.to_string()),
            ("use_filename", self.use_filename.to_string()),
        ]
    }
}

/// Request signature: params sorted by name, joined as `k=v&k=v`, with the
/// API secret appended, hashed with SHA-256.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(config: CloudinaryConfig, base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(600))
                .build()
                .unwrap_or_default(),
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn resources_url(&self) -> String {
        format!(
            "{}/v1_1/{}/resources/{}/upload",
            self.base_url, self.config.cloud_name, VIDEO_RESOURCE
        )
    }

    pub fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/{}/upload",
            self.base_url, self.config.cloud_name, VIDEO_RESOURCE
        )
    }

    /// List up to `max_results` uploaded assets under `folder/`, following
    /// pagination cursors.
    pub async fn list_resources(&self, folder: &str, max_results: usize) -> Result<Vec<MediaResource>> {
        let prefix = format!("{}/", folder);
        let mut resources: Vec<MediaResource> = Vec::new();
        let mut cursor: Option<String> = None;

        info!("☁️ Listing resources in Cloudinary folder '{}'", folder);

        loop {
            let page_size = (max_results - resources.len()).min(MAX_RESULTS);
            let mut query = vec![
                ("prefix", prefix.clone()),
                ("max_results", page_size.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("next_cursor", c.clone()));
            }

            let response = self
                .client
                .get(self.resources_url())
                .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
                .query(&query)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                error!("Cloudinary list failed ({}): {}", status, error_text);
                return Err(PosterError::Cloudinary(format!(
                    "Failed to list '{}' ({}): {}",
                    folder, status, error_text
                )));
            }

            let page: ResourceListResponse = response.json().await?;
            resources.extend(page.resources);

            match page.next_cursor {
                Some(next) if resources.len() < max_results => cursor = Some(next),
                _ => break,
            }
        }

        info!("✅ Found {} resources in '{}'", resources.len(), folder);
        Ok(resources)
    }

    /// Signed upload of a local video file. Returns the asset's secure URL.
    pub async fn upload_video(&self, file_path: &Path, options: &UploadOptions) -> Result<String> {
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video.mp4")
            .to_string();

        info!(
            "📤 Uploading merged video '{}' to Cloudinary folder '{}'",
            file_name, options.folder
        );

        let video_data = tokio::fs::read(file_path).await?;
        let timestamp = chrono::Utc::now().timestamp();
        let params = options.params(timestamp);
        let signature = sign_params(&params, &self.config.api_secret);

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(video_data)
                    .file_name(file_name)
                    .mime_str("video/mp4")?,
            )
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (name, value) in params {
            form = form.text(name, value);
        }

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Cloudinary upload failed ({}): {}", status, error_text);
            return Err(PosterError::Cloudinary(format!(
                "Upload failed ({}): {}",
                status, error_text
            )));
        }

        let uploaded: UploadResponse = response.json().await?;
        if uploaded.existing.unwrap_or(false) {
            info!("Asset {} already existed, reusing it", uploaded.public_id);
        }
        info!("✅ Uploaded merged video. Secure URL: {}", uploaded.secure_url);
        Ok(uploaded.secure_url)
    }
}
