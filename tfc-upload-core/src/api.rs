//! JSON:API wire format of the workspace service.
//!
//! Request bodies and response parsing live here so that every HTTP
//! implementation of [`crate::contract::WorkspaceApi`] agrees on the schema.
//! A body that parses as JSON but lacks a required field is a
//! `MalformedResponse`; so is one that is not JSON at all.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::contract::{ConfigurationVersion, Run, RunStatus, WorkspaceLockState};
use crate::error::{UploadError, UploadResult};

pub const CONTENT_TYPE: &str = "application/vnd.api+json";

/// Body of the configuration-version creation request.
pub fn configuration_version_request() -> Value {
    json!({ "data": { "type": "configuration-version" } })
}

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: Option<String>,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    relationships: Relationships,
}

#[derive(Debug, Default, Deserialize)]
struct Attributes {
    #[serde(rename = "upload-url")]
    upload_url: Option<String>,
    status: Option<String>,
    locked: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct Relationships {
    #[serde(rename = "configuration-version")]
    configuration_version: Option<Relationship>,
    #[serde(rename = "locked-by")]
    locked_by: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    data: Option<Identifier>,
}

#[derive(Debug, Deserialize)]
struct Identifier {
    id: String,
}

impl Relationship {
    fn id(self) -> Option<String> {
        self.data.map(|d| d.id)
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str, what: &str) -> UploadResult<T> {
    let doc: Document<T> = serde_json::from_str(body)
        .map_err(|e| UploadError::MalformedResponse(format!("{what}: {e}")))?;
    doc.data
        .ok_or_else(|| UploadError::MalformedResponse(format!("{what}: missing data")))
}

fn require_id(resource: &Resource, what: &str) -> UploadResult<String> {
    resource
        .id
        .clone()
        .ok_or_else(|| UploadError::MalformedResponse(format!("{what}: missing data.id")))
}

/// Workspace lookup → workspace id.
pub fn parse_workspace_id(body: &str) -> UploadResult<String> {
    let ws: Resource = decode(body, "workspace")?;
    require_id(&ws, "workspace")
}

pub fn parse_configuration_version(body: &str) -> UploadResult<ConfigurationVersion> {
    let cv: Resource = decode(body, "configuration version")?;
    let id = require_id(&cv, "configuration version")?;
    let upload_url = cv.attributes.upload_url.ok_or_else(|| {
        UploadError::MalformedResponse("configuration version: missing upload-url".into())
    })?;
    Ok(ConfigurationVersion { id, upload_url })
}

fn into_run(resource: Resource) -> UploadResult<Run> {
    let id = require_id(&resource, "run")?;
    let status = resource
        .attributes
        .status
        .as_deref()
        .map(RunStatus::from)
        .ok_or_else(|| UploadError::MalformedResponse(format!("run {id}: missing status")))?;
    Ok(Run {
        id,
        status,
        configuration_version_id: resource
            .relationships
            .configuration_version
            .and_then(Relationship::id),
    })
}

pub fn parse_runs(body: &str) -> UploadResult<Vec<Run>> {
    let runs: Vec<Resource> = decode(body, "run listing")?;
    runs.into_iter().map(into_run).collect()
}

pub fn parse_run(body: &str) -> UploadResult<Run> {
    into_run(decode(body, "run")?)
}

pub fn parse_workspace_lock(body: &str) -> UploadResult<WorkspaceLockState> {
    let ws: Resource = decode(body, "workspace")?;
    let locked = ws.attributes.locked.ok_or_else(|| {
        UploadError::MalformedResponse("workspace: missing locked attribute".into())
    })?;
    Ok(WorkspaceLockState {
        locked,
        lock_owner_id: ws.relationships.locked_by.and_then(Relationship::id),
    })
}
