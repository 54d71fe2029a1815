//! Template storage boundary and best-effort preview attachment
//!
//! The template store itself lives outside this crate; [`TemplateStore`] is
//! the shape of its API. [`save_with_preview`] applies the pipeline's
//! propagation policy: a preview is an enhancement, so any capture or
//! validation failure is logged and the template is saved without one.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::CaptureOverrides;
use crate::pipeline::ScreenshotPipeline;
use crate::rendering::Rasterizer;
use crate::{Error, Result};

/// Payload accepted by the template-storage API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInput {
    pub name: String,
    pub description: String,
    pub category: String,
    pub content: String,
    pub is_html: bool,
    /// `dataUrl` of a validated preview
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
}

/// A stored template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub id: u64,
    #[serde(flatten)]
    pub input: TemplateInput,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn create_template(&self, input: TemplateInput) -> Result<TemplateRecord>;

    /// Replace every field of template `id`, including its preview
    async fn update_template(&self, id: u64, input: TemplateInput) -> Result<TemplateRecord>;
}

/// Process-local store, used by the CLI and tests
#[derive(Default)]
pub struct InMemoryTemplateStore {
    records: Mutex<Vec<TemplateRecord>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u64) -> Option<TemplateRecord> {
        self.records
            .lock()
            .ok()?
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn create_template(&self, input: TemplateInput) -> Result<TemplateRecord> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::StorageError("template store lock poisoned".into()))?;
        let record = TemplateRecord {
            id: records.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            input,
            updated_at: Utc::now(),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn update_template(&self, id: u64, input: TemplateInput) -> Result<TemplateRecord> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::StorageError("template store lock poisoned".into()))?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::StorageError(format!("template {} not found", id)))?;
        record.input = input;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

/// Attach a preview of `input.content` when one can be produced.
///
/// Never fails: the returned input has `preview_image` set on success and
/// cleared otherwise. Plain-text templates get no preview.
pub async fn with_preview<R: Rasterizer>(
    pipeline: &ScreenshotPipeline<R>,
    mut input: TemplateInput,
    overrides: &CaptureOverrides,
) -> TemplateInput {
    input.preview_image = None;
    if !input.is_html || input.content.trim().is_empty() {
        return input;
    }
    match pipeline.capture_validated(&input.content, overrides).await {
        Ok(preview) => input.preview_image = Some(preview.data_url),
        Err(e) if e.is_capture_failure() => {
            warn!("Saving template '{}' without preview, capture failed: {}", input.name, e)
        }
        Err(e) => warn!("Saving template '{}' without preview: {}", input.name, e),
    }
    input
}

/// Save `input` (creating it, or overwriting template `id`) with a
/// best-effort preview. Only storage errors are returned.
pub async fn save_with_preview<R: Rasterizer, S: TemplateStore + ?Sized>(
    pipeline: &ScreenshotPipeline<R>,
    store: &S,
    id: Option<u64>,
    input: TemplateInput,
    overrides: &CaptureOverrides,
) -> Result<TemplateRecord> {
    let input = with_preview(pipeline, input, overrides).await;
    let has_preview = input.preview_image.is_some();
    let record = match id {
        Some(id) => store.update_template(id, input).await?,
        None => store.create_template(input).await?,
    };
    info!("Saved template {} (preview: {})", record.id, if has_preview { "yes" } else { "no" });
    Ok(record)
}
