use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::projects::{Project, ProjectLayout};

/// Type of events recorded in a project's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ProjectCreated,
    ProjectSelected,
    ChapterRecorded,
    ReferencesMerged,
    ReferencesPruned,
    ReferencesCompiled,
    FigureRegistered,
    ExportCompleted,
}

/// General-purpose event stored as JSONL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationEvent {
    pub event_id: Uuid,
    pub project_id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

/// Append-only event log for one project.
pub struct OrchestrationLog {
    events_path: PathBuf,
}

impl OrchestrationLog {
    pub fn for_project(project: &Project) -> Self {
        Self {
            events_path: ProjectLayout::new(project).events,
        }
    }

    pub fn append_event(&self, event: &OrchestrationEvent) -> Result<()> {
        if let Some(parent) = self.events_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .with_context(|| format!("Failed to open event log {}", self.events_path.display()))?;
        file.write_all(serde_json::to_string(event)?.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    pub fn load_events(&self) -> Result<Vec<OrchestrationEvent>> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.events_path)?;
        let mut events = Vec::new();
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            let event: OrchestrationEvent = serde_json::from_str(line)?;
            events.push(event);
        }
        Ok(events)
    }

    pub fn load_events_of(&self, event_type: EventType) -> Result<Vec<OrchestrationEvent>> {
        Ok(self
            .load_events()?
            .into_iter()
            .filter(|event| event.event_type == event_type)
            .collect())
    }
}

/// Append a simple event for `project`.
pub fn log_event(
    project: &Project,
    event_type: EventType,
    details: serde_json::Value,
) -> Result<Uuid> {
    let event = OrchestrationEvent {
        event_id: Uuid::new_v4(),
        project_id: project.id,
        event_type,
        timestamp: Utc::now(),
        details,
    };
    OrchestrationLog::for_project(project).append_event(&event)?;
    Ok(event.event_id)
}
