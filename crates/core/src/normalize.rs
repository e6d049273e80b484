//! Inbound payload normalization.
//!
//! Every payload fetched from the API passes through [`normalize_payload`]
//! before anything else looks at it: hypermedia links are resolved first,
//! then a few entity kinds get the id rewrites the portal relies on.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::hypermedia::resolve_links;
use crate::types::Payload;

/// Path segment that precedes the manifest id in a manifest URL.
const BUILDS_SEGMENT: &str = "builds/";

/// The kind of entity a payload is being decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Center,
    Extension,
    Product,
    Build,
    BuildConfig,
    Package,
    InputFile,
    Manifest,
    Execution,
    ExecutionConfiguration,
    User,
}

impl EntityKind {
    /// Name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Center => "center",
            EntityKind::Extension => "extension",
            EntityKind::Product => "product",
            EntityKind::Build => "build",
            EntityKind::BuildConfig => "buildConfig",
            EntityKind::Package => "package",
            EntityKind::InputFile => "inputFile",
            EntityKind::Manifest => "manifest",
            EntityKind::Execution => "execution",
            EntityKind::ExecutionConfiguration => "executionConfiguration",
            EntityKind::User => "user",
        }
    }
}

/// Resolve links and apply the per-kind rewrites.
pub fn normalize_payload(kind: EntityKind, mut payload: Payload) -> Result<Payload, CoreError> {
    resolve_links(&mut payload);

    match kind {
        EntityKind::BuildConfig => normalize_build_config(&mut payload)?,
        EntityKind::Manifest => normalize_manifest(&mut payload)?,
        EntityKind::InputFile => normalize_input_files(&mut payload),
        _ => {}
    }

    Ok(payload)
}

/// Normalize and deserialize into a typed entity.
pub fn decode<T: DeserializeOwned>(kind: EntityKind, payload: Payload) -> Result<T, CoreError> {
    let normalized = normalize_payload(kind, payload)?;
    serde_json::from_value(normalized)
        .map_err(|e| CoreError::Validation(format!("malformed {} payload: {e}", kind.name())))
}

/// Build configs have no id of their own; give each fetch a fresh one and
/// keep a tab-indented rendering of the whole payload for display.
fn normalize_build_config(payload: &mut Payload) -> Result<(), CoreError> {
    let object = expect_object(payload, EntityKind::BuildConfig)?;
    object.insert(
        "id".into(),
        Value::String(uuid::Uuid::new_v4().to_string()),
    );

    let rendered = to_tab_indented(&*object)?;
    object.insert("configStr".into(), Value::String(rendered));
    Ok(())
}

/// Manifest id is the URL tail after `builds/` plus `.` and the filename.
fn normalize_manifest(payload: &mut Payload) -> Result<(), CoreError> {
    let object = expect_object(payload, EntityKind::Manifest)?;

    let url = string_field(object, "url", EntityKind::Manifest)?;
    let filename = string_field(object, "filename", EntityKind::Manifest)?;

    let tail = url
        .find(BUILDS_SEGMENT)
        .map(|at| &url[at + BUILDS_SEGMENT.len()..])
        .ok_or_else(|| {
            CoreError::Validation(format!("manifest url has no `{BUILDS_SEGMENT}` segment: {url}"))
        })?;

    let id = format!("{tail}.{filename}");
    object.insert("id".into(), Value::String(id));
    Ok(())
}

/// Input files are listed by name; the name moves to `filename` and the
/// URL becomes the id.
fn normalize_input_files(payload: &mut Payload) {
    let Value::Array(files) = payload else {
        return;
    };

    for file in files.iter_mut().filter_map(Value::as_object_mut) {
        if let Some(name) = file.get("id").cloned() {
            file.insert("filename".into(), name);
        }
        if let Some(url) = file.get("url").cloned() {
            file.insert("id".into(), url);
        }
    }
}

fn expect_object(payload: &mut Payload, kind: EntityKind) -> Result<&mut Map<String, Value>, CoreError> {
    payload
        .as_object_mut()
        .ok_or_else(|| CoreError::Validation(format!("{} payload must be an object", kind.name())))
}

fn string_field(
    object: &Map<String, Value>,
    field: &str,
    kind: EntityKind,
) -> Result<String, CoreError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CoreError::Validation(format!("{} payload is missing `{field}`", kind.name())))
}

fn to_tab_indented<T: Serialize + ?Sized>(value: &T) -> Result<String, CoreError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| CoreError::Internal(format!("failed to render payload: {e}")))?;
    String::from_utf8(out).map_err(|e| CoreError::Internal(e.to_string()))
}
