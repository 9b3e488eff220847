//! Chapter recording and project export workflows.

pub mod chapters;
pub mod export;

pub use chapters::{
    compile_references, final_chapter, load_chapters, numbering_gaps, record_chapter, Chapter,
    ChapterInput, ChapterOutcome,
};
pub use export::{
    export_project, hash_path, read_export_manifests, ExportManifest, ExportOptions, ExportOutcome,
};

pub type WritingResult<T> = anyhow::Result<T>;
