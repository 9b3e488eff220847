//! Filesystem layout of a single project.
//!
//! Human-facing files (figures, builds, the compiled bibliography) live in
//! the user layer; machine state (chapters, registry, logs) in the AI layer.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::Project;

pub const PROJECT_FILE: &str = "project.json";
pub const CHAPTERS_SUBDIR: &str = "chapters";
pub const FIGURES_SUBDIR: &str = "figures";
pub const BUILDS_SUBDIR: &str = "builds";
pub const COMPILED_REFERENCES_FILE: &str = "references.json";
pub const FIGURE_RECORDS_FILE: &str = "figure_assets.jsonl";
pub const EVENTS_FILE: &str = "events.jsonl";
pub const EXPORTS_FILE: &str = "exports.jsonl";

#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub project_file: PathBuf,
    pub chapters_dir: PathBuf,
    pub figures_dir: PathBuf,
    pub builds_dir: PathBuf,
    pub compiled_references: PathBuf,
    pub figure_records: PathBuf,
    pub events: PathBuf,
    pub exports: PathBuf,
}

impl ProjectLayout {
    pub fn new(project: &Project) -> Self {
        let ai = &project.ai_layer_path;
        let user = &project.user_layer_path;
        Self {
            project_file: ai.join(PROJECT_FILE),
            chapters_dir: ai.join(CHAPTERS_SUBDIR),
            figures_dir: user.join(FIGURES_SUBDIR),
            builds_dir: user.join(BUILDS_SUBDIR),
            compiled_references: user.join(COMPILED_REFERENCES_FILE),
            figure_records: ai.join(FIGURE_RECORDS_FILE),
            events: ai.join(EVENTS_FILE),
            exports: ai.join(EXPORTS_FILE),
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.chapters_dir, &self.figures_dir, &self.builds_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create project directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn chapter_file(&self, number: u32) -> PathBuf {
        self.chapters_dir.join(format!("{number:03}.json"))
    }
}
