use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::Result;
use thesisbase::projects::{Project, ProjectManager};
use thesisbase::writing::{record_chapter, ChapterInput, ChapterOutcome};

/// 1x1 transparent PNG.
pub const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

pub fn record(
    manager: &ProjectManager,
    project: &Project,
    number: u32,
    title: &str,
    body: &str,
    is_final: bool,
) -> Result<ChapterOutcome> {
    record_chapter(
        manager,
        project,
        ChapterInput {
            number,
            title,
            body: Some(body),
            is_final,
        },
    )
}

pub fn docx_part(path: &Path, name: &str) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut part = archive.by_name(name)?;
    let mut text = String::new();
    part.read_to_string(&mut text)?;
    Ok(text)
}

pub fn docx_entries(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    let archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    Ok(archive.file_names().map(str::to_string).collect())
}
