pub mod config;
pub mod layout;

pub use config::{
    config_file_path_in, load_from, save_to, workspace_root, AppConfig, CitationSettings, ExportSettings, StaleReferencePolicy,
};
pub use layout::ProjectLayout;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::citations::{CitationStyle, JsonRegistryStore};
use crate::orchestration::{log_event, EventType};

/// A multi-chapter document with its own registry, figures and builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub citation_style: CitationStyle,
    #[serde(default)]
    pub author: Option<String>,
    pub user_layer_path: PathBuf,
    pub ai_layer_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Workspace-level directories.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub user_dir: PathBuf,
    pub ai_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            user_dir: root.join("User"),
            ai_dir: root.join("AI"),
            root,
        }
    }

    /// Ensures the workspace structure exists (User/ and AI/ directories).
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.user_dir)
            .with_context(|| format!("Failed to create {}", self.user_dir.display()))?;
        fs::create_dir_all(&self.ai_dir)
            .with_context(|| format!("Failed to create {}", self.ai_dir.display()))?;
        Ok(())
    }

    pub fn project_user_layer(&self, slug: &str) -> PathBuf {
        self.user_dir.join(slug)
    }

    pub fn project_ai_layer(&self, project_id: &Uuid) -> PathBuf {
        self.ai_dir.join(project_id.to_string())
    }
}

/// Manages projects, configuration and storage locations.
pub struct ProjectManager {
    pub config: AppConfig,
    pub paths: WorkspacePaths,
    pub config_path: PathBuf,
}

impl ProjectManager {
    /// Opens the workspace at the default root.
    pub fn new() -> Result<Self> {
        Self::with_root(workspace_root()?)
    }

    /// Opens (creating if needed) a workspace rooted at `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Result<Self> {
        let paths = WorkspacePaths::new(root.as_ref());
        paths.ensure()?;
        let config_path = config_file_path_in(&paths.root);
        let config = load_from(&config_path)?;
        Ok(Self {
            config,
            paths,
            config_path,
        })
    }

    pub fn save_config(&self) -> Result<()> {
        save_to(&self.config, &self.config_path)
    }

    /// Registry persistence for every project in this workspace.
    pub fn registry_store(&self) -> JsonRegistryStore {
        JsonRegistryStore::new(&self.paths.ai_dir)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects = Vec::new();
        if !self.paths.ai_dir.exists() {
            return Ok(projects);
        }
        for entry in fs::read_dir(&self.paths.ai_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let metadata = entry.path().join(layout::PROJECT_FILE);
            if metadata.exists() {
                let project: Project = serde_json::from_slice(&fs::read(&metadata)?)
                    .with_context(|| format!("Invalid project file {}", metadata.display()))?;
                projects.push(project);
            }
        }
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    pub fn get_project(&self, slug: &str) -> Result<Option<Project>> {
        Ok(self.list_projects()?.into_iter().find(|p| p.slug == slug))
    }

    pub fn require_project(&self, slug: &str) -> Result<Project> {
        self.get_project(slug)?
            .with_context(|| format!("Project '{slug}' does not exist"))
    }

    /// Creates a project; the configured default style applies when `style` is `None`.
    pub fn create_project(&mut self, title: &str, style: Option<CitationStyle>) -> Result<Project> {
        let slug = slugify(title);
        if slug.is_empty() {
            bail!("Project title '{title}' does not produce a usable slug");
        }
        if self.get_project(&slug)?.is_some() {
            bail!("A project with slug '{slug}' already exists");
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        let project = Project {
            id,
            title: title.trim().to_string(),
            user_layer_path: self.paths.project_user_layer(&slug),
            ai_layer_path: self.paths.project_ai_layer(&id),
            slug,
            citation_style: style.unwrap_or(self.config.citations.default_style),
            author: None,
            created_at: now,
            updated_at: now,
        };
        ProjectLayout::new(&project).ensure_dirs()?;
        self.persist_project(&project)?;
        log_event(
            &project,
            EventType::ProjectCreated,
            serde_json::json!({
                "slug": project.slug,
                "title": project.title,
                "citation_style": project.citation_style,
            }),
        )?;
        self.set_active_project(&project)?;
        Ok(project)
    }

    pub fn persist_project(&self, project: &Project) -> Result<()> {
        let path = ProjectLayout::new(project).project_file;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, serde_json::to_vec_pretty(project)?)
            .with_context(|| format!("Failed to write project file {}", path.display()))?;
        Ok(())
    }

    pub fn set_active_project(&mut self, project: &Project) -> Result<()> {
        self.config.last_active_project = Some(project.slug.clone());
        log_event(
            project,
            EventType::ProjectSelected,
            serde_json::json!({ "slug": project.slug }),
        )?;
        self.save_config()
    }

    pub fn active_project(&self) -> Result<Option<Project>> {
        match &self.config.last_active_project {
            Some(slug) => self.get_project(slug),
            None => Ok(None),
        }
    }
}

/// Create a filesystem-safe slug from a project title.
fn slugify(name: &str) -> String {
    let mut slug = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    slug.trim_matches('-').to_string()
}
