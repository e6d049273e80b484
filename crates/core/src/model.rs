//! Typed release-service entities.
//!
//! The entity tree is `ReleaseCenter -> Extension -> Product -> Build`, and
//! each build owns its configuration, packages (with input files and a
//! manifest) and executions. Every entity is deserialized from a payload
//! that has already been through [`normalize_payload`](crate::normalize::normalize_payload),
//! so relations arrive in `links`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::hypermedia::string_links;
use crate::status::ExecutionStatus;
use crate::types::{EntityId, LinkMap, Timestamp};

/// Id of the international edition extension.
pub const INTERNATIONAL_EDITION_ID: &str = "snomed_ct_international_edition";

/// Display format for execution creation times.
pub const CREATION_TIME_FORMAT: &str = "%d %b, %Y %I:%M:%S (UTC)";

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

/// Top-level owner of extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseCenter {
    pub id: EntityId,
    #[validate(length(min = 3, message = "name must be at least 3 characters"))]
    pub name: String,
    #[validate(length(min = 3, message = "shortName must be at least 3 characters"))]
    pub short_name: String,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "string_links")]
    pub links: LinkMap,
}

impl ReleaseCenter {
    /// Check the fields a user can edit before they are sent upstream.
    pub fn validate_fields(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "string_links")]
    pub links: LinkMap,
}

impl Extension {
    pub fn is_international_edition(&self) -> bool {
        self.id == INTERNATIONAL_EDITION_ID
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "string_links")]
    pub links: LinkMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "string_links")]
    pub links: LinkMap,
}

/// Build configuration as shown to the user. `config_str` is the
/// pretty-printed source payload, produced during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    pub id: EntityId,
    pub config_str: String,
    #[serde(default, deserialize_with = "string_links")]
    pub links: LinkMap,
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "string_links")]
    pub links: LinkMap,
}

/// An uploaded input file. After normalization `id` is the file's URL and
/// `filename` carries the server-side name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFile {
    pub id: EntityId,
    pub filename: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "string_links")]
    pub links: LinkMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: EntityId,
    pub filename: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "string_links")]
    pub links: LinkMap,
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

/// One run of a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: EntityId,
    #[serde(default, alias = "creationTimeString")]
    pub creation_time: Option<String>,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "buildScripts_url")]
    pub build_scripts_url: Option<String>,
    #[serde(default, deserialize_with = "string_links")]
    pub links: LinkMap,
}

impl Execution {
    pub fn is_built(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_triggered(&self) -> bool {
        self.status.is_triggered()
    }

    pub fn status_title(&self) -> &'static str {
        self.status.title()
    }

    /// URL of the execution resource itself, which doubles as its status
    /// endpoint. Falls back to the `self` relation.
    pub fn resource_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or_else(|| self.links.get("self").map(String::as_str))
    }

    /// Creation time parsed from the wire string. The server sends either
    /// RFC 3339 or a bare `YYYY-MM-DDTHH:MM:SS` in UTC.
    pub fn created_at(&self) -> Option<Timestamp> {
        let raw = self.creation_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }

    /// Creation time formatted like `31 Mar, 2014 09:30:23 (UTC)`.
    pub fn creation_time_display(&self) -> Option<String> {
        self.created_at()
            .map(|at| at.format(CREATION_TIME_FORMAT).to_string())
    }
}

/// Free-form configuration snapshot of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfiguration {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionConfiguration {
    /// Two-space indented JSON of the configuration.
    pub fn json(&self) -> String {
        serde_json::to_string_pretty(&self.fields).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Creation requests
// ---------------------------------------------------------------------------

/// Body of a new release center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewReleaseCenter {
    #[validate(length(min = 3, message = "name must be at least 3 characters"))]
    pub name: String,
    #[validate(length(min = 3, message = "shortName must be at least 3 characters"))]
    pub short_name: String,
}

impl NewReleaseCenter {
    pub fn validate_fields(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))
    }
}

/// Body of a new product, build or package: all three are created by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewNamedEntity {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
}

impl NewNamedEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn validate_fields(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// The caller as seen by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub authentication_token: String,
}
