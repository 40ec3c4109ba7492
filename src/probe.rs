use crate::{config::Config, util::guess_mime};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// An uploaded file held in memory, as handed to the analyzer.
#[derive(Debug, Clone, Serialize)]
pub struct Upload {
    pub filename: String,
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(bytes: Vec<u8>, filename: &str, mime_type: &str) -> Self {
        Self {
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Reads `input` into memory, enforcing the upload size limit. The declared
/// MIME type is `mime_override` or a guess from the extension.
pub fn probe_file(cfg: &Config, input: &Path, mime_override: Option<&str>) -> Result<Upload> {
    let meta = std::fs::metadata(input).with_context(|| format!("stat {}", input.display()))?;
    if !meta.is_file() {
        anyhow::bail!("input is not a regular file: {}", input.display());
    }
    if meta.len() > cfg.limits.max_upload_bytes {
        anyhow::bail!(
            "input exceeds max_upload_bytes ({} > {}): {}",
            meta.len(),
            cfg.limits.max_upload_bytes,
            input.display()
        );
    }

    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let filename = input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("upload")
        .to_string();
    let mime_type = mime_override
        .map(str::to_string)
        .unwrap_or_else(|| guess_mime(input).to_string());

    Ok(Upload {
        filename,
        mime_type,
        bytes,
    })
}
