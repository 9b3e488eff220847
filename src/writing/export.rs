//! Assembling a project into a `.docx` build and recording what was written.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::chapters::{load_chapters, numbering_gaps};
use super::WritingResult;
use crate::citations::{CitationStyle, RegistryStore};
use crate::document::{assemble, AssemblyRequest, DocxSerializer};
use crate::error::ExportError;
use crate::figures::{FigureStore, FileAssetSource, ImageResolver};
use crate::orchestration::{log_event, EventType};
use crate::projects::{Project, ProjectLayout, ProjectManager};

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Document title; the project title when unset.
    pub title: Option<String>,
    /// Citation style identifier overriding the project style for this build.
    pub style: Option<String>,
}

/// One line of a project's `exports.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub export_id: Uuid,
    pub project_id: Uuid,
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
    pub citation_style: CitationStyle,
    pub chapter_count: usize,
    pub reference_count: usize,
    pub figures_embedded: usize,
    pub figures_missing: usize,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub manifest: ExportManifest,
    pub warnings: Vec<String>,
}

pub fn export_project(
    manager: &ProjectManager,
    project: &Project,
    options: ExportOptions,
) -> WritingResult<ExportOutcome> {
    let chapters = load_chapters(project)?;
    if chapters.is_empty() {
        return Err(ExportError::MissingChapters.into());
    }
    let mut warnings = numbering_gaps(&chapters);

    let style = match options.style.as_deref() {
        Some(id) => id.parse::<CitationStyle>()?,
        None => project.citation_style,
    };
    let references = manager
        .registry_store()
        .load(&project.id)?
        .compile(style.as_str())?;

    let assets = FigureStore::new(project).load_records()?;
    let resolver = ImageResolver::with_settings(
        assets,
        Arc::new(FileAssetSource::for_project(project)),
        &manager.config.export,
    );
    let title = options.title.unwrap_or_else(|| project.title.clone());
    let document = assemble(
        &AssemblyRequest {
            title: &title,
            style,
            chapters: &chapters,
            missing_content_text: &manager.config.export.missing_content_text,
        },
        &references,
        &resolver,
    )?;
    for figure in &document.missing_figures {
        warnings.push(format!("Figure {figure} has no usable image"));
    }

    let bytes = DocxSerializer::default().serialize(&document)?;
    let layout = ProjectLayout::new(project);
    fs::create_dir_all(&layout.builds_dir)
        .with_context(|| format!("Failed to create {}", layout.builds_dir.display()))?;
    let created_at = Utc::now();
    let path = layout.builds_dir.join(format!(
        "{}-{}.docx",
        created_at.format("%Y%m%dT%H%M%S%3f"),
        project.slug
    ));
    fs::write(&path, &bytes)
        .with_context(|| format!("Failed to write export {}", path.display()))?;

    let manifest = ExportManifest {
        export_id: Uuid::new_v4(),
        project_id: project.id,
        sha256: hash_path(&path)?,
        size_bytes: bytes.len() as u64,
        path: path.clone(),
        citation_style: style,
        chapter_count: chapters.len(),
        reference_count: references.len(),
        figures_embedded: document.images.len(),
        figures_missing: document.missing_figures.len(),
        warnings: warnings.clone(),
        created_at,
    };
    append_manifest(&layout.exports, &manifest)?;
    log_event(
        project,
        EventType::ExportCompleted,
        json!({
            "export_id": manifest.export_id,
            "path": path.display().to_string(),
            "sha256": manifest.sha256,
            "warnings": warnings.len(),
        }),
    )?;

    Ok(ExportOutcome {
        path,
        manifest,
        warnings,
    })
}

/// SHA-256 of a file as lowercase hex.
pub fn hash_path(path: &Path) -> WritingResult<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Unable to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn append_manifest(path: &Path, manifest: &ExportManifest) -> WritingResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open export manifest {}", path.display()))?;
    file.write_all(serde_json::to_string(manifest)?.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

pub fn read_export_manifests(project: &Project) -> WritingResult<Vec<ExportManifest>> {
    let path = ProjectLayout::new(project).exports;
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read export manifest {}", path.display()))?;
    let mut manifests = Vec::new();
    for line in data.lines().filter(|l| !l.trim().is_empty()) {
        manifests.push(serde_json::from_str(line)?);
    }
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writing::{record_chapter, ChapterInput};
    use tempfile::TempDir;

    #[test]
    fn hash_path_matches_known_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            hash_path(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn export_without_chapters_fails() {
        let dir = TempDir::new().unwrap();
        let mut manager = ProjectManager::with_root(dir.path()).unwrap();
        let project = manager.create_project("Empty", None).unwrap();
        let err = export_project(&manager, &project, ExportOptions::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ExportError>(),
            Some(&ExportError::MissingChapters)
        );
    }

    #[test]
    fn unknown_style_override_fails() {
        let dir = TempDir::new().unwrap();
        let mut manager = ProjectManager::with_root(dir.path()).unwrap();
        let project = manager.create_project("Styled", None).unwrap();
        record_chapter(
            &manager,
            &project,
            ChapterInput {
                number: 1,
                title: "Intro",
                body: Some("Hello."),
                is_final: true,
            },
        )
        .unwrap();
        let err = export_project(
            &manager,
            &project,
            ExportOptions {
                style: Some("chicago".into()),
                ..ExportOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::UnknownCitationStyle(style)) if style == "chicago"
        ));
    }

    #[test]
    fn export_writes_file_and_manifest() {
        let dir = TempDir::new().unwrap();
        let mut manager = ProjectManager::with_root(dir.path()).unwrap();
        let project = manager.create_project("Solar Thesis", None).unwrap();
        for number in [1, 3] {
            record_chapter(
                &manager,
                &project,
                ChapterInput {
                    number,
                    title: "Section",
                    body: Some("Body text with {{figure1.1}}."),
                    is_final: number == 3,
                },
            )
            .unwrap();
        }

        let outcome = export_project(&manager, &project, ExportOptions::default()).unwrap();
        assert!(outcome.path.exists());
        assert_eq!(outcome.manifest.sha256, hash_path(&outcome.path).unwrap());
        assert_eq!(outcome.manifest.chapter_count, 2);
        assert_eq!(outcome.manifest.figures_missing, 1);
        assert_eq!(outcome.warnings.len(), 2);
        assert_eq!(read_export_manifests(&project).unwrap(), vec![outcome.manifest]);
    }
}
