use std::path::Path;

use tempfile::TempDir;
use thesisbase::projects::{Project, ProjectManager};
use thesisbase::CitationStyle;

pub struct IntegrationHarness {
    workspace: TempDir,
}

impl IntegrationHarness {
    pub fn new() -> Self {
        let workspace = TempDir::new().expect("failed to create temp workspace");
        Self { workspace }
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    pub fn project_manager(&self) -> ProjectManager {
        ProjectManager::with_root(self.workspace_path())
            .expect("failed to initialize ProjectManager for tests")
    }

    pub fn create_project(
        &self,
        manager: &mut ProjectManager,
        title: &str,
        style: CitationStyle,
    ) -> Project {
        manager
            .create_project(title, Some(style))
            .expect("failed to create project")
    }
}

mod support;

mod chapter_registry;
mod export_docx;
mod figure_fallback;
mod stale_references;
