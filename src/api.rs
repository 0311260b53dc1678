use crate::config::Settings;
use crate::model::{EvidenceRecord, Methodology, Project};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api request failed: {0}")]
    Request(String),
    #[error("api responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode api response: {0}")]
    Decode(String),
}

/// Body of `POST /exec` against the command-runner service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    pub timeout_sec: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecResponse {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub returncode: i64,
}

/// Seam for the command-runner collaborator.
pub trait CommandApi {
    fn exec(&self, request: &CommandRequest) -> Result<ExecResponse, ApiError>;
}

/// Seam for the methodology persistence collaborator.
pub trait MethodologyApi {
    fn update_methodology(&self, methodology: &Methodology) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    api_base: String,
}

impl ApiClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.resolve_api_base())
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        let response = ureq::get(&self.endpoint(path))
            .call()
            .map_err(map_call_error)?;
        response
            .into_json::<T>()
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    fn send_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let payload =
            serde_json::to_value(body).map_err(|err| ApiError::Request(err.to_string()))?;
        let response = ureq::request(method, &self.endpoint(path))
            .send_json(payload)
            .map_err(map_call_error)?;
        response
            .into_json::<T>()
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    pub fn exec_command(&self, request: &CommandRequest) -> Result<ExecResponse, ApiError> {
        self.send_json("POST", "exec", request)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.get_json("projects")
    }

    pub fn list_methodologies(&self) -> Result<Vec<Methodology>, ApiError> {
        self.get_json("methodologies")
    }

    pub fn put_methodology(&self, methodology: &Methodology) -> Result<(), ApiError> {
        let _ack: serde_json::Value =
            self.send_json("PUT", &format!("methodologies/{}", methodology.id), methodology)?;
        Ok(())
    }

    pub fn step_evidence(
        &self,
        project_id: i64,
        methodology_id: i64,
        step_id: &str,
    ) -> Result<Vec<EvidenceRecord>, ApiError> {
        self.get_json(&format!(
            "manual-evidence/{project_id}/{methodology_id}/{}",
            urlencoding::encode(step_id)
        ))
    }
}

fn map_call_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            ApiError::Status { status, body }
        }
        other => ApiError::Request(other.to_string()),
    }
}

impl CommandApi for ApiClient {
    fn exec(&self, request: &CommandRequest) -> Result<ExecResponse, ApiError> {
        self.exec_command(request)
    }
}

impl MethodologyApi for ApiClient {
    fn update_methodology(&self, methodology: &Methodology) -> Result<(), ApiError> {
        self.put_methodology(methodology)
    }
}
