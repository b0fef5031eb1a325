//! Tracker for asynchronous 3D generation jobs.
//!
//! Hyper3D Rodin and Hunyuan3D generate assets remotely and slowly. The
//! workflow exposed to the client is two-phase:
//!
//! 1. **Submit**: a generate tool sends the request through the add-on and
//!    receives a job id. The job is tracked from here on.
//! 2. **Poll**: the client calls a `poll_*_job_status` tool, which performs
//!    exactly one remote status check. Once a job reaches `Succeeded` or
//!    `Failed`, polls answer from the cached state without touching Blender.
//! 3. **Import**: only a `Succeeded` job can be imported; a successful import
//!    drops it from the table.
//!
//! The tracker never polls on its own. Abandoned jobs are bounded by the
//! retention settings in [`crate::config::JobsConfig`]: jobs past the
//! retention window are pruned, and the oldest job is evicted when the table
//! is full, both checked when a new job is submitted.

mod error;
pub mod status;

pub use error::JobError;
pub use status::{JobStatus, Provider};

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::blender::{embedded_error, BlenderCommand, BlenderProxy};
use crate::config::JobsConfig;

/// Upper bound on ids one job can be addressed by.
const ALIASES_PER_JOB: usize = 3;

/// What to generate.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationRequest {
    /// Hyper3D Rodin from a text prompt.
    Hyper3dText {
        /// Description of the asset, in English.
        text_prompt: String,
        /// Normalised `[length, width, height]` ratio.
        bbox_condition: Option<Vec<i64>>,
    },
    /// Hyper3D Rodin from reference images.
    Hyper3dImages {
        /// Base64-encoded image files.
        images: Option<Vec<String>>,
        /// Image URLs.
        image_urls: Option<Vec<String>>,
        /// Normalised `[length, width, height]` ratio.
        bbox_condition: Option<Vec<i64>>,
    },
    /// Hunyuan3D from a text prompt and/or an image URL.
    Hunyuan3d {
        /// Description of the asset.
        text_prompt: Option<String>,
        /// Reference image URL.
        input_image_url: Option<String>,
    },
}

impl GenerationRequest {
    /// Provider that handles this request.
    #[must_use]
    pub const fn provider(&self) -> Provider {
        match self {
            Self::Hyper3dText { .. } | Self::Hyper3dImages { .. } => Provider::Hyper3d,
            Self::Hunyuan3d { .. } => Provider::Hunyuan3d,
        }
    }

    fn command(&self) -> BlenderCommand {
        match self {
            Self::Hyper3dText {
                text_prompt,
                bbox_condition,
            } => BlenderCommand::with_params(
                "create_rodin_job",
                json!({
                    "text_prompt": text_prompt,
                    "images": null,
                    "bbox_condition": bbox_condition,
                }),
            ),
            Self::Hyper3dImages {
                images,
                image_urls,
                bbox_condition,
            } => BlenderCommand::with_params(
                "create_rodin_job",
                json!({
                    "text_prompt": null,
                    "images": images,
                    "image_urls": image_urls,
                    "bbox_condition": bbox_condition,
                }),
            ),
            Self::Hunyuan3d {
                text_prompt,
                input_image_url,
            } => BlenderCommand::with_params(
                "generate_hunyuan3d_model",
                json!({
                    "text_prompt": text_prompt,
                    "input_image_url": input_image_url,
                }),
            ),
        }
    }
}

/// How the provider identifies a job.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RemoteHandle {
    /// Rodin main site: imported by task uuid, polled by subscription key.
    RodinMainSite {
        task_uuid: String,
        subscription_key: String,
    },
    /// Rodin via fal.ai: one request id for everything.
    RodinFalAi { request_id: String },
    /// Hunyuan3D job id.
    Hunyuan { job_id: String },
}

impl RemoteHandle {
    fn from_submission(provider: Provider, result: &Value) -> Result<Self, JobError> {
        if let Some(message) = embedded_error(result) {
            return Err(JobError::Remote { provider, message });
        }

        let handle = match provider {
            Provider::Hyper3d => {
                let task_uuid = str_field(result, "uuid");
                let subscription_key = result
                    .get("jobs")
                    .and_then(|jobs| str_field(jobs, "subscription_key"));
                match (task_uuid, subscription_key) {
                    (Some(task_uuid), Some(subscription_key)) => Some(Self::RodinMainSite {
                        task_uuid,
                        subscription_key,
                    }),
                    _ => str_field(result, "request_id")
                        .map(|request_id| Self::RodinFalAi { request_id }),
                }
            }
            Provider::Hunyuan3d => str_field(result, "job_id")
                .or_else(|| str_field(result, "JobId"))
                .or_else(|| result.get("Response").and_then(|r| str_field(r, "JobId")))
                .map(|job_id| Self::Hunyuan { job_id }),
        };

        handle.ok_or_else(|| JobError::Remote {
            provider,
            message: format!("unexpected submission response: {result}"),
        })
    }

    fn job_id(&self) -> &str {
        match self {
            Self::RodinMainSite { task_uuid, .. } => task_uuid,
            Self::RodinFalAi { request_id } => request_id,
            Self::Hunyuan { job_id } => job_id,
        }
    }

    fn aliases(&self) -> Vec<&str> {
        match self {
            Self::RodinMainSite {
                task_uuid,
                subscription_key,
            } => vec![task_uuid, subscription_key],
            Self::RodinFalAi { request_id } => vec![request_id],
            Self::Hunyuan { job_id } => vec![job_id],
        }
    }

    fn poll_command(&self) -> BlenderCommand {
        match self {
            Self::RodinMainSite {
                subscription_key, ..
            } => BlenderCommand::with_params(
                "poll_rodin_job_status",
                json!({ "subscription_key": subscription_key, "request_id": null }),
            ),
            Self::RodinFalAi { request_id } => BlenderCommand::with_params(
                "poll_rodin_job_status",
                json!({ "subscription_key": null, "request_id": request_id }),
            ),
            Self::Hunyuan { job_id } => BlenderCommand::with_params(
                "poll_hunyuan_job_status",
                json!({ "job_id": job_id }),
            ),
        }
    }

    fn import_command(&self, name: &str, result_ref: Option<&str>) -> BlenderCommand {
        match self {
            Self::RodinMainSite { task_uuid, .. } => BlenderCommand::with_params(
                "import_generated_asset",
                json!({ "name": name, "task_uuid": task_uuid, "request_id": null }),
            ),
            Self::RodinFalAi { request_id } => BlenderCommand::with_params(
                "import_generated_asset",
                json!({ "name": name, "task_uuid": null, "request_id": request_id }),
            ),
            Self::Hunyuan { .. } => BlenderCommand::with_params(
                "import_generated_asset_hunyuan",
                json!({ "name": name, "zip_file_url": result_ref }),
            ),
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A tracked generation job.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationJob {
    /// Id the job is keyed by (Rodin task uuid / request id, Hunyuan job id).
    pub job_id: String,
    /// Generating service.
    pub provider: Provider,
    /// When the submission succeeded.
    pub submitted_at: DateTime<Utc>,
    /// Last known state.
    pub status: JobStatus,
    /// What to import once succeeded (Hunyuan ZIP URL, Rodin task id).
    pub result_ref: Option<String>,
    handle: RemoteHandle,
}

impl GenerationJob {
    /// Provider-specific keys the client was given at submission.
    #[must_use]
    pub fn client_keys(&self) -> Value {
        match &self.handle {
            RemoteHandle::RodinMainSite {
                task_uuid,
                subscription_key,
            } => json!({ "task_uuid": task_uuid, "subscription_key": subscription_key }),
            RemoteHandle::RodinFalAi { request_id } => json!({ "request_id": request_id }),
            RemoteHandle::Hunyuan { job_id } => json!({ "job_id": job_id }),
        }
    }

    /// JSON summary returned to the client.
    #[must_use]
    pub fn summary(&self) -> Value {
        let mut summary = json!({
            "job_id": self.job_id,
            "provider": self.provider,
            "status": self.status,
            "submitted_at": self.submitted_at.to_rfc3339(),
        });
        if let (Value::Object(out), Value::Object(keys)) = (&mut summary, self.client_keys()) {
            out.extend(keys);
            if let Some(result_ref) = &self.result_ref {
                out.insert("result_ref".to_string(), json!(result_ref));
            }
        }
        summary
    }
}

/// Result of [`JobTracker::poll`].
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// Job state after the poll.
    pub job: GenerationJob,
    /// Raw provider answer; `None` when served from the cached terminal state.
    pub remote: Option<Value>,
}

impl PollOutcome {
    /// True if no remote call was made.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        self.remote.is_none()
    }
}

/// Result of [`JobTracker::import_result`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedAsset {
    /// Job the asset came from.
    pub job_id: String,
    /// Generating service.
    pub provider: Provider,
    /// Object name in the Blender scene.
    pub name: String,
    /// Message reported by the add-on.
    pub message: String,
}

/// Owns all generation job state.
#[derive(Debug)]
pub struct JobTracker {
    /// Jobs in submission order.
    jobs: IndexMap<String, GenerationJob>,
    /// Every id a job can be addressed by, mapped to its job id.
    aliases: HashMap<String, String>,
    /// Aliases of imported jobs, oldest first.
    imported: IndexMap<String, String>,
    max_tracked: usize,
    retention: Duration,
}

impl JobTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new(config: &JobsConfig) -> Self {
        Self {
            jobs: IndexMap::new(),
            aliases: HashMap::new(),
            imported: IndexMap::new(),
            max_tracked: config.max_tracked.max(1),
            retention: config.retention(),
        }
    }

    /// Number of tracked jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True if no jobs are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Looks a job up by id or alias.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&GenerationJob> {
        self.aliases.get(key).and_then(|id| self.jobs.get(id))
    }

    /// Submits a generation request and starts tracking the job.
    ///
    /// Nothing is tracked if the submission fails.
    ///
    /// # Errors
    ///
    /// - [`JobError::Blender`] if the add-on is unreachable or fails
    /// - [`JobError::Remote`] if the provider rejects the request
    pub async fn submit(
        &mut self,
        proxy: &BlenderProxy,
        request: &GenerationRequest,
    ) -> Result<&GenerationJob, JobError> {
        let provider = request.provider();
        let command = request.command();
        let result = proxy.invoke(&command, proxy.default_timeout()).await?;
        let handle = RemoteHandle::from_submission(provider, &result)?;

        let now = Utc::now();
        self.make_room(now);

        let job_id = handle.job_id().to_string();
        for alias in handle.aliases() {
            self.imported.shift_remove(alias);
            self.aliases.insert(alias.to_string(), job_id.clone());
        }

        tracing::info!(job_id = %job_id, provider = %provider, "Generation job submitted");

        let job = GenerationJob {
            job_id: job_id.clone(),
            provider,
            submitted_at: now,
            status: JobStatus::Queued,
            result_ref: None,
            handle,
        };
        self.jobs.insert(job_id.clone(), job);
        self.jobs
            .get(&job_id)
            .ok_or(JobError::UnknownJob { job_id })
    }

    /// Checks the job's status.
    ///
    /// Performs one remote check for a non-terminal job; terminal jobs are
    /// answered from the stored state without contacting Blender.
    ///
    /// # Errors
    ///
    /// - [`JobError::UnknownJob`] / [`JobError::AlreadyImported`] for ids not tracked
    /// - [`JobError::Blender`] or [`JobError::Remote`] if the check fails; the
    ///   stored state is left unchanged
    pub async fn poll(&mut self, proxy: &BlenderProxy, key: &str) -> Result<PollOutcome, JobError> {
        let job_id = self.resolve(key)?;
        let Some(job) = self.jobs.get(&job_id) else {
            return Err(JobError::UnknownJob { job_id });
        };

        if job.status.is_terminal() {
            tracing::debug!(job_id = %job_id, status = %job.status, "Returning cached terminal status");
            return Ok(PollOutcome {
                job: job.clone(),
                remote: None,
            });
        }

        let provider = job.provider;
        let command = job.handle.poll_command();
        let remote = proxy.invoke(&command, proxy.default_timeout()).await?;
        if let Some(message) = embedded_error(&remote) {
            return Err(JobError::Remote { provider, message });
        }

        let observed = match provider {
            Provider::Hyper3d => status::normalize_rodin(&remote),
            Provider::Hunyuan3d => status::normalize_hunyuan(&remote),
        };

        let Some(job) = self.jobs.get_mut(&job_id) else {
            return Err(JobError::UnknownJob { job_id });
        };
        let previous = job.status;
        job.status = previous.advance(observed);

        if job.status != previous {
            tracing::info!(job_id = %job_id, from = %previous, to = %job.status, "Generation job status changed");
        }

        let mut new_alias = None;
        if job.status == JobStatus::Succeeded && job.result_ref.is_none() {
            job.result_ref = match provider {
                Provider::Hyper3d => Some(job.job_id.clone()),
                Provider::Hunyuan3d => {
                    let url = status::hunyuan_result_url(&remote);
                    new_alias.clone_from(&url);
                    url
                }
            };
        }
        let job = job.clone();

        if let Some(url) = new_alias {
            self.aliases.insert(url, job_id);
        }

        Ok(PollOutcome {
            job,
            remote: Some(remote),
        })
    }

    /// Imports a succeeded job's result into the scene as `name`.
    ///
    /// On success the job is dropped; importing it again fails with
    /// [`JobError::AlreadyImported`].
    ///
    /// # Errors
    ///
    /// - [`JobError::UnknownJob`] / [`JobError::AlreadyImported`] for ids not tracked
    /// - [`JobError::NotReady`] unless the job is `Succeeded`
    /// - [`JobError::Remote`] for a Hunyuan3D job that reported no result file
    /// - [`JobError::Blender`] or [`JobError::Remote`] if the import fails; the
    ///   job stays tracked so it can be retried
    pub async fn import_result(
        &mut self,
        proxy: &BlenderProxy,
        key: &str,
        name: &str,
    ) -> Result<ImportedAsset, JobError> {
        let job_id = self.resolve(key)?;
        let Some(job) = self.jobs.get(&job_id) else {
            return Err(JobError::UnknownJob { job_id });
        };

        if job.status != JobStatus::Succeeded {
            return Err(JobError::NotReady {
                job_id,
                status: job.status,
            });
        }

        let provider = job.provider;
        if provider == Provider::Hunyuan3d && job.result_ref.is_none() {
            return Err(JobError::Remote {
                provider,
                message: "job succeeded but reported no result file to import".to_string(),
            });
        }
        let command = job.handle.import_command(name, job.result_ref.as_deref());
        let result = proxy.invoke(&command, proxy.default_timeout()).await?;
        if let Some(message) = embedded_error(&result) {
            return Err(JobError::Remote { provider, message });
        }

        let message = result
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| "success".to_string(), str::to_string);

        self.retire(&job_id);
        tracing::info!(job_id = %job_id, name, "Generated asset imported");

        Ok(ImportedAsset {
            job_id,
            provider,
            name: name.to_string(),
            message,
        })
    }

    /// Drops every job submitted more than the retention window before `now`.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) {
        let retention = self.retention;
        let expired: Vec<String> = self
            .jobs
            .values()
            .filter(|job| {
                (now - job.submitted_at)
                    .to_std()
                    .is_ok_and(|age| age > retention)
            })
            .map(|job| job.job_id.clone())
            .collect();

        for job_id in expired {
            tracing::debug!(job_id = %job_id, "Pruning expired generation job");
            self.jobs.shift_remove(&job_id);
            self.aliases.retain(|_, id| *id != job_id);
        }
    }

    fn make_room(&mut self, now: DateTime<Utc>) {
        self.prune_expired(now);
        while self.jobs.len() >= self.max_tracked {
            let Some((job_id, _)) = self.jobs.shift_remove_index(0) else {
                break;
            };
            tracing::warn!(job_id = %job_id, "Evicting oldest generation job, tracker is full");
            self.aliases.retain(|_, id| *id != job_id);
        }
    }

    fn resolve(&self, key: &str) -> Result<String, JobError> {
        if let Some(job_id) = self.aliases.get(key) {
            return Ok(job_id.clone());
        }
        if let Some(job_id) = self.imported.get(key) {
            return Err(JobError::AlreadyImported {
                job_id: job_id.clone(),
            });
        }
        Err(JobError::UnknownJob {
            job_id: key.to_string(),
        })
    }

    /// Moves a job from the table to the imported tombstones.
    fn retire(&mut self, job_id: &str) {
        self.jobs.shift_remove(job_id);
        let keys: Vec<String> = self
            .aliases
            .iter()
            .filter(|(_, id)| id.as_str() == job_id)
            .map(|(alias, _)| alias.clone())
            .collect();
        for alias in keys {
            self.aliases.remove(&alias);
            self.imported.insert(alias, job_id.to_string());
        }

        let cap = self.max_tracked.saturating_mul(ALIASES_PER_JOB);
        while self.imported.len() > cap {
            self.imported.shift_remove_index(0);
        }
    }
}
