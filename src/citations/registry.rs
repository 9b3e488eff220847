use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExportError;
use crate::storage::ai_layer::{read_json, write_json};

use super::parser::strip_list_marker;
use super::style::{CitationStyle, ReferenceOrdering};

const REGISTRY_FILE: &str = "citation_registry.json";
const REGISTRY_VERSION: &str = "1.0.0";

/// One bibliographic entry tracked for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub key: String,
    pub raw_text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    /// Label the content source used (`3` for `[3]`); chapter-local, never an identity.
    #[serde(default)]
    pub source_label: Option<String>,
    pub first_used_chapter: u32,
    #[serde(default)]
    pub used_in_chapters: BTreeSet<u32>,
}

impl Reference {
    pub fn new(key: impl Into<String>, raw_text: impl Into<String>, chapter: u32) -> Self {
        Self {
            key: key.into(),
            raw_text: raw_text.into(),
            author: None,
            year: None,
            source_label: None,
            first_used_chapter: chapter,
            used_in_chapters: BTreeSet::from([chapter]),
        }
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn with_year(mut self, year: Option<String>) -> Self {
        self.year = year;
        self
    }

    pub fn with_source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = Some(label.into());
        self
    }

    fn author_sort_key(&self) -> Option<String> {
        self.author
            .as_deref()
            .map(str::trim)
            .filter(|author| !author.is_empty())
            .map(str::to_lowercase)
    }
}

/// A reference placed in the final list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledReference {
    pub order_number: u32,
    /// `[n]` for numeric styles, the citation key otherwise.
    pub label: String,
    pub reference: Reference,
}

impl CompiledReference {
    /// Text of the entry as it appears in the References section.
    pub fn display_text(&self, style: CitationStyle) -> String {
        let entry = strip_list_marker(&self.reference.raw_text);
        match style.rules().map(|rules| rules.ordering) {
            Some(ReferenceOrdering::FirstUse) => {
                format!("{} {}", self.label, strip_numeric_label(entry))
            }
            _ => entry.to_string(),
        }
    }
}

fn strip_numeric_label(text: &str) -> &str {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some(close) = rest.find(']') {
            if close > 0 && rest[..close].chars().all(|c| c.is_ascii_digit()) {
                return rest[close + 1..].trim_start();
            }
        }
    }
    trimmed
}

/// Counts reported by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
}

/// Accumulated references for one project, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl RegistryState {
    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Reference> {
        self.references.iter().find(|reference| reference.key == key)
    }

    /// Folds a chapter's parsed references into the registry.
    ///
    /// Existing keys only gain the chapter in their usage set and keep the
    /// lowest chapter seen as `first_used_chapter`. Re-merging the same input
    /// leaves the state unchanged.
    pub fn merge<I>(&mut self, chapter: u32, references: I) -> MergeSummary
    where
        I: IntoIterator<Item = Reference>,
    {
        let mut index: HashMap<String, usize> = self
            .references
            .iter()
            .enumerate()
            .map(|(idx, reference)| (reference.key.clone(), idx))
            .collect();
        let mut summary = MergeSummary::default();

        for incoming in references {
            match index.get(&incoming.key) {
                Some(&idx) => {
                    let existing = &mut self.references[idx];
                    let newly_used = existing.used_in_chapters.insert(chapter);
                    let earlier = chapter < existing.first_used_chapter;
                    if earlier {
                        existing.first_used_chapter = chapter;
                    }
                    if newly_used || earlier {
                        summary.updated += 1;
                    }
                }
                None => {
                    let mut reference = incoming;
                    reference.first_used_chapter = chapter;
                    reference.used_in_chapters = BTreeSet::from([chapter]);
                    index.insert(reference.key.clone(), self.references.len());
                    self.references.push(reference);
                    summary.added += 1;
                }
            }
        }
        summary
    }

    /// Withdraws `chapter` from every reference whose key is not in `keep`.
    ///
    /// References left without any chapter are dropped and the first-use
    /// chapter of the rest is recomputed. Returns the number of dropped
    /// references.
    pub fn retract_chapter(&mut self, chapter: u32, keep: &HashSet<String>) -> usize {
        let before = self.references.len();
        for reference in self.references.iter_mut() {
            if keep.contains(&reference.key) {
                continue;
            }
            if reference.used_in_chapters.remove(&chapter) {
                if let Some(&first) = reference.used_in_chapters.iter().next() {
                    reference.first_used_chapter = first;
                }
            }
        }
        self.references
            .retain(|reference| !reference.used_in_chapters.is_empty());
        before - self.references.len()
    }

    /// Produces the ordered, numbered reference list for a style identifier.
    pub fn compile(&self, style_id: &str) -> Result<Vec<CompiledReference>, ExportError> {
        let style: CitationStyle = style_id.parse()?;
        Ok(self.compile_style(style))
    }

    pub fn compile_style(&self, style: CitationStyle) -> Vec<CompiledReference> {
        let Some(rules) = style.rules() else {
            return Vec::new();
        };
        let mut ordered: Vec<&Reference> = self.references.iter().collect();
        match rules.ordering {
            ReferenceOrdering::FirstUse => {
                ordered.sort_by_key(|reference| reference.first_used_chapter);
            }
            ReferenceOrdering::Alphabetical => {
                ordered.sort_by(|a, b| {
                    match (a.author_sort_key(), b.author_sort_key()) {
                        (Some(left), Some(right)) => left.cmp(&right),
                        (Some(_), None) => std::cmp::Ordering::Less,
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (None, None) => std::cmp::Ordering::Equal,
                    }
                    .then_with(|| a.raw_text.cmp(&b.raw_text))
                });
            }
        }

        ordered
            .into_iter()
            .enumerate()
            .map(|(idx, reference)| {
                let order_number = idx as u32 + 1;
                let label = match rules.ordering {
                    ReferenceOrdering::FirstUse => format!("[{order_number}]"),
                    ReferenceOrdering::Alphabetical => reference.key.clone(),
                };
                CompiledReference {
                    order_number,
                    label,
                    reference: reference.clone(),
                }
            })
            .collect()
    }
}

/// Persistence boundary for registry state.
pub trait RegistryStore {
    fn load(&self, project_id: &Uuid) -> anyhow::Result<RegistryState>;
    fn save(&self, project_id: &Uuid, state: &RegistryState) -> anyhow::Result<()>;
}

/// Keeps registries in process memory.
#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    states: Mutex<HashMap<Uuid, RegistryState>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for MemoryRegistryStore {
    fn load(&self, project_id: &Uuid) -> anyhow::Result<RegistryState> {
        let states = self
            .states
            .lock()
            .map_err(|_| anyhow!("Registry store lock poisoned"))?;
        Ok(states.get(project_id).cloned().unwrap_or_default())
    }

    fn save(&self, project_id: &Uuid, state: &RegistryState) -> anyhow::Result<()> {
        let mut states = self
            .states
            .lock()
            .map_err(|_| anyhow!("Registry store lock poisoned"))?;
        states.insert(*project_id, state.clone());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryFile {
    version: String,
    project_id: Uuid,
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    state: RegistryState,
}

/// Stores each project's registry as JSON under `<ai root>/<project id>/`.
#[derive(Debug, Clone)]
pub struct JsonRegistryStore {
    ai_root: PathBuf,
}

impl JsonRegistryStore {
    pub fn new(ai_root: impl Into<PathBuf>) -> Self {
        Self {
            ai_root: ai_root.into(),
        }
    }

    pub fn registry_path(&self, project_id: &Uuid) -> PathBuf {
        self.ai_root
            .join(project_id.to_string())
            .join(REGISTRY_FILE)
    }
}

impl RegistryStore for JsonRegistryStore {
    fn load(&self, project_id: &Uuid) -> anyhow::Result<RegistryState> {
        let file: Option<RegistryFile> = read_json(&self.registry_path(project_id))?;
        Ok(file.map(|file| file.state).unwrap_or_default())
    }

    fn save(&self, project_id: &Uuid, state: &RegistryState) -> anyhow::Result<()> {
        let file = RegistryFile {
            version: REGISTRY_VERSION.to_string(),
            project_id: *project_id,
            saved_at: Utc::now(),
            state: state.clone(),
        };
        write_json(&self.registry_path(project_id), &file)
    }
}
