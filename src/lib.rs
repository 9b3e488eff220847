pub mod citations;
pub mod document;
pub mod error;
pub mod figures;
pub mod markdown;
pub mod orchestration;
pub mod projects;
pub mod storage;
pub mod writing;

// Re-export commonly used types for convenience.
pub use citations::{CitationStyle, CompiledReference, Reference, RegistryState, RegistryStore};
pub use error::ExportError;
pub use orchestration::{EventType, OrchestrationEvent, OrchestrationLog};
pub use projects::{AppConfig, Project, ProjectManager};
pub use writing::{export_project, record_chapter, ChapterInput, ExportOptions};
