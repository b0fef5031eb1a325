//! Canonical job states and per-provider status vocabularies.
//!
//! Each provider reports progress in its own words. The functions here map
//! those onto [`JobStatus`]; anything unrecognised reads as
//! [`JobStatus::Processing`] so an unexpected word never ends a job early.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Remote service that generates the asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Provider {
    /// Hyper3D Rodin (main site or fal.ai).
    #[serde(rename = "Hyper3D")]
    Hyper3d,
    /// Tencent Hunyuan3D.
    #[serde(rename = "Hunyuan3D")]
    Hunyuan3d,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hyper3d => write!(f, "Hyper3D"),
            Self::Hunyuan3d => write!(f, "Hunyuan3D"),
        }
    }
}

/// Lifecycle of a generation job.
///
/// `Queued → Processing → {Succeeded, Failed}`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum JobStatus {
    /// Accepted, not started.
    Queued,
    /// Being generated (or in a state we do not recognise).
    Processing,
    /// Finished; the result can be imported.
    Succeeded,
    /// Finished without a result.
    Failed,
}

impl JobStatus {
    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Combines the stored state with a freshly observed one.
    ///
    /// Terminal states are sticky and a job never moves back to `Queued`
    /// once it was seen processing.
    #[must_use]
    pub fn advance(self, observed: Self) -> Self {
        if self.is_terminal() {
            self
        } else {
            self.max(observed)
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "Queued",
            Self::Processing => "Processing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Normalises a Hyper3D Rodin poll result.
///
/// The main site reports one status per sub-job in `status_list`
/// (`Waiting`, `Generating`, `Done`, `Failed`); fal.ai reports a single
/// `status` (`IN_QUEUE`, `IN_PROGRESS`, `COMPLETED`).
#[must_use]
pub fn normalize_rodin(result: &Value) -> JobStatus {
    if let Some(list) = result.get("status_list").and_then(Value::as_array) {
        let statuses: Vec<&str> = list.iter().filter_map(Value::as_str).collect();
        return normalize_rodin_status_list(&statuses);
    }
    result
        .get("status")
        .and_then(Value::as_str)
        .map_or(JobStatus::Processing, normalize_fal_status)
}

fn normalize_rodin_status_list(statuses: &[&str]) -> JobStatus {
    if statuses.is_empty() {
        return JobStatus::Processing;
    }
    if statuses.iter().any(|s| s.eq_ignore_ascii_case("failed")) {
        return JobStatus::Failed;
    }
    if statuses.iter().all(|s| s.eq_ignore_ascii_case("done")) {
        return JobStatus::Succeeded;
    }
    if statuses.iter().all(|s| s.eq_ignore_ascii_case("waiting")) {
        return JobStatus::Queued;
    }
    JobStatus::Processing
}

fn normalize_fal_status(status: &str) -> JobStatus {
    match status.to_ascii_uppercase().as_str() {
        "COMPLETED" => JobStatus::Succeeded,
        "IN_QUEUE" => JobStatus::Queued,
        "FAILED" | "ERROR" => JobStatus::Failed,
        _ => JobStatus::Processing,
    }
}

/// Normalises a Hunyuan3D poll result (`WAIT`, `RUN`, `DONE`, `FAIL`).
///
/// The add-on may pass the Tencent response through unwrapped or nested
/// under `Response`, with either `status` or `Status`.
#[must_use]
pub fn normalize_hunyuan(result: &Value) -> JobStatus {
    let body = hunyuan_body(result);
    let status = body
        .get("status")
        .or_else(|| body.get("Status"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    match status.to_ascii_uppercase().as_str() {
        "DONE" => JobStatus::Succeeded,
        "WAIT" => JobStatus::Queued,
        "FAIL" | "FAILED" => JobStatus::Failed,
        _ => JobStatus::Processing,
    }
}

/// Extracts the ZIP URL of a finished Hunyuan3D job.
#[must_use]
pub fn hunyuan_result_url(result: &Value) -> Option<String> {
    let body = hunyuan_body(result);
    if let Some(url) = body.get("zip_file_url").and_then(Value::as_str) {
        return Some(url.to_string());
    }
    match body.get("ResultFile3Ds")? {
        Value::String(url) => Some(url.clone()),
        Value::Array(files) => files.iter().find_map(|file| match file {
            Value::String(url) => Some(url.clone()),
            Value::Object(obj) => obj
                .get("Url")
                .or_else(|| obj.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }),
        _ => None,
    }
}

fn hunyuan_body(result: &Value) -> &Value {
    result
        .get("Response")
        .filter(|v| v.is_object())
        .unwrap_or(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rodin_main_site_vocabulary() {
        let cases = [
            (json!({"status_list": ["Done", "Done"]}), JobStatus::Succeeded),
            (json!({"status_list": ["Done", "Generating"]}), JobStatus::Processing),
            (json!({"status_list": ["Waiting", "Waiting"]}), JobStatus::Queued),
            (json!({"status_list": ["Done", "Failed"]}), JobStatus::Failed),
            (json!({"status_list": []}), JobStatus::Processing),
        ];
        for (result, expected) in cases {
            assert_eq!(normalize_rodin(&result), expected, "{result}");
        }
    }

    #[test]
    fn rodin_fal_vocabulary() {
        assert_eq!(normalize_rodin(&json!({"status": "COMPLETED"})), JobStatus::Succeeded);
        assert_eq!(normalize_rodin(&json!({"status": "IN_QUEUE"})), JobStatus::Queued);
        assert_eq!(normalize_rodin(&json!({"status": "IN_PROGRESS"})), JobStatus::Processing);
        assert_eq!(normalize_rodin(&json!({"status": "processing"})), JobStatus::Processing);
    }

    #[test]
    fn hunyuan_vocabulary() {
        assert_eq!(normalize_hunyuan(&json!({"status": "DONE"})), JobStatus::Succeeded);
        assert_eq!(normalize_hunyuan(&json!({"Status": "WAIT"})), JobStatus::Queued);
        assert_eq!(normalize_hunyuan(&json!({"status": "RUN"})), JobStatus::Processing);
        assert_eq!(
            normalize_hunyuan(&json!({"Response": {"Status": "FAIL"}})),
            JobStatus::Failed
        );
    }

    #[test]
    fn unrecognised_states_are_processing() {
        assert_eq!(normalize_rodin(&json!({})), JobStatus::Processing);
        assert_eq!(normalize_rodin(&json!({"status": 7})), JobStatus::Processing);
        assert_eq!(normalize_hunyuan(&json!({"status": "EXPLODED"})), JobStatus::Processing);
        assert_eq!(normalize_hunyuan(&Value::Null), JobStatus::Processing);
    }

    #[test]
    fn advance_is_monotonic() {
        assert_eq!(JobStatus::Queued.advance(JobStatus::Processing), JobStatus::Processing);
        assert_eq!(JobStatus::Processing.advance(JobStatus::Queued), JobStatus::Processing);
        assert_eq!(JobStatus::Succeeded.advance(JobStatus::Failed), JobStatus::Succeeded);
        assert_eq!(JobStatus::Failed.advance(JobStatus::Queued), JobStatus::Failed);
        assert_eq!(JobStatus::Processing.advance(JobStatus::Failed), JobStatus::Failed);
    }

    #[test]
    fn hunyuan_result_url_shapes() {
        assert_eq!(
            hunyuan_result_url(&json!({"ResultFile3Ds": "https://x/a.zip"})).as_deref(),
            Some("https://x/a.zip")
        );
        assert_eq!(
            hunyuan_result_url(&json!({"ResultFile3Ds": [{"Type": "OBJ", "Url": "https://x/b.zip"}]}))
                .as_deref(),
            Some("https://x/b.zip")
        );
        assert_eq!(
            hunyuan_result_url(&json!({"Response": {"ResultFile3Ds": ["https://x/c.zip"]}}))
                .as_deref(),
            Some("https://x/c.zip")
        );
        assert_eq!(hunyuan_result_url(&json!({"status": "DONE"})), None);
    }
}
