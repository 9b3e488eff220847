use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::markdown::FigureRef;
use crate::orchestration::{log_event, EventType};
use crate::projects::{Project, ProjectLayout};

/// An uploaded image registered against a `{{figureN.M}}` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub placeholder_id: String,
    pub chapter_number: u32,
    pub figure_number: u32,
    pub caption: String,
    /// File name relative to the project figure directory.
    pub source: String,
    pub content_type: String,
    pub registered_at: DateTime<Utc>,
}

pub struct FigureUpload<'a> {
    pub figure: FigureRef,
    pub caption: &'a str,
    pub file_name: &'a str,
    pub bytes: &'a [u8],
}

pub struct FigureStore {
    metadata_path: PathBuf,
    assets_dir: PathBuf,
}

impl FigureStore {
    pub fn new(project: &Project) -> Self {
        let layout = ProjectLayout::new(project);
        Self {
            metadata_path: layout.figure_records,
            assets_dir: layout.figures_dir,
        }
    }

    pub fn assets_dir(&self) -> &PathBuf {
        &self.assets_dir
    }

    fn store_image(&self, figure: FigureRef, file_name: &str, bytes: &[u8]) -> Result<String> {
        fs::create_dir_all(&self.assets_dir)?;
        let stored = format!("{}-{}", figure.placeholder_id(), sanitize_file_name(file_name));
        let path = self.assets_dir.join(&stored);
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to store figure {}", path.display()))?;
        Ok(stored)
    }

    /// Stores the payload and records the asset; an existing record with the
    /// same placeholder id is replaced in place.
    pub fn register(&self, upload: FigureUpload<'_>) -> Result<ImageAsset> {
        let source = self.store_image(upload.figure, upload.file_name, upload.bytes)?;
        let asset = ImageAsset {
            placeholder_id: upload.figure.placeholder_id(),
            chapter_number: upload.figure.chapter,
            figure_number: upload.figure.figure,
            caption: upload.caption.trim().to_string(),
            source,
            content_type: sniff_content_type(upload.bytes),
            registered_at: Utc::now(),
        };

        let mut records = self.load_records()?;
        match records
            .iter_mut()
            .find(|record| record.placeholder_id == asset.placeholder_id)
        {
            Some(existing) => {
                if existing.source != asset.source {
                    let stale = self.assets_dir.join(&existing.source);
                    if stale.exists() {
                        fs::remove_file(&stale).with_context(|| {
                            format!("Failed to remove replaced figure {}", stale.display())
                        })?;
                    }
                }
                *existing = asset.clone();
            }
            None => records.push(asset.clone()),
        }
        self.persist_all(&records)?;
        Ok(asset)
    }

    pub fn load_records(&self) -> Result<Vec<ImageAsset>> {
        if !self.metadata_path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.metadata_path)?;
        let mut records = Vec::new();
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            let record: ImageAsset = serde_json::from_str(line)
                .with_context(|| format!("Invalid figure record in {}", self.metadata_path.display()))?;
            records.push(record);
        }
        Ok(records)
    }

    pub fn persist_all(&self, records: &[ImageAsset]) -> Result<()> {
        if let Some(parent) = self.metadata_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&self.metadata_path)?;
        for record in records {
            file.write_all(serde_json::to_string(record)?.as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// Registers an uploaded figure for `project` and logs the event.
pub fn register_figure(project: &Project, upload: FigureUpload<'_>) -> Result<ImageAsset> {
    let asset = FigureStore::new(project).register(upload)?;
    log_event(
        project,
        EventType::FigureRegistered,
        serde_json::json!({
            "placeholder_id": asset.placeholder_id,
            "caption": asset.caption,
            "content_type": asset.content_type,
        }),
    )?;
    Ok(asset)
}

fn sniff_content_type(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}
