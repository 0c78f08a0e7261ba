//! Request and response bodies of the HTTP API.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::editor::EditOptions;
use crate::generator::{GenerationResult, GenerationSuccess};
use crate::storage::ContentStore;

#[derive(Debug, Clone, Deserialize)]
pub struct ImageRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub video_path: PathBuf,
    pub edit_options: EditOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaQuery {
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Flatten a successful result into a JSON object.
///
/// Artifact results gain a `url` under which the server exposes the file.
pub fn success_object(success: &GenerationSuccess, store: &ContentStore) -> Map<String, Value> {
    let mut object = match serde_json::to_value(success) {
        Ok(Value::Object(object)) => object,
        _ => Map::new(),
    };
    let result = GenerationResult::Success(success.clone());
    if let Some(url) = result
        .artifact_ref()
        .and_then(|artifact| store.web_path(&artifact.path))
    {
        object.insert("url".to_string(), Value::String(url));
    }
    object
}

/// `{"success": true, "message": ..., ...fields}`.
pub fn success_body(message: &str, fields: Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert("message".to_string(), Value::String(message.to_string()));
    body.extend(fields);
    Value::Object(body)
}
