use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::projects::{Project, ProjectLayout};

/// Reads and writes per-chapter payloads in a project's AI layer.
pub struct ChapterStore {
    layout: ProjectLayout,
}

impl ChapterStore {
    pub fn new(project: &Project) -> Self {
        Self {
            layout: ProjectLayout::new(project),
        }
    }

    pub fn chapters_dir(&self) -> &Path {
        &self.layout.chapters_dir
    }

    pub fn chapter_path(&self, number: u32) -> PathBuf {
        self.layout.chapter_file(number)
    }

    pub fn load_chapter<T: DeserializeOwned>(&self, number: u32) -> Result<Option<T>> {
        read_json(&self.chapter_path(number))
    }

    pub fn save_chapter<T: Serialize>(&self, number: u32, payload: &T) -> Result<PathBuf> {
        let path = self.chapter_path(number);
        write_json(&path, payload)?;
        Ok(path)
    }

    /// Chapter numbers with a stored payload, ascending.
    pub fn chapter_numbers(&self) -> Result<Vec<u32>> {
        let dir = self.chapters_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut numbers = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Failed to list chapters in {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let parsed = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u32>().ok());
            match parsed {
                Some(number) => numbers.push(number),
                None => log::debug!("ignoring stray file {} in chapter store", path.display()),
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }

    pub fn load_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let mut chapters = Vec::new();
        for number in self.chapter_numbers()? {
            if let Some(chapter) = self.load_chapter(number)? {
                chapters.push(chapter);
            }
        }
        Ok(chapters)
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read AI-layer payload {}", path.display()))?;
    let payload = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse AI-layer payload {}", path.display()))?;
    Ok(Some(payload))
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data)
        .with_context(|| format!("Failed to write AI-layer payload {}", path.display()))?;
    Ok(())
}
