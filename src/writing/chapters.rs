//! Recording generated chapters and feeding their reference lists into the
//! project registry.

use std::collections::HashSet;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::WritingResult;
use crate::citations::{
    citation_drift, parse_references, split_reference_section, CompiledReference, MergeSummary,
    RegistryStore,
};
use crate::orchestration::{log_event, EventType};
use crate::projects::{Project, ProjectLayout, ProjectManager, StaleReferencePolicy};
use crate::storage::ChapterStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    /// `None` until the chapter has been generated.
    #[serde(default)]
    pub body_markdown: Option<String>,
    #[serde(default)]
    pub is_final: bool,
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    pub fn is_generated(&self) -> bool {
        self.body_markdown
            .as_deref()
            .is_some_and(|body| !body.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChapterInput<'a> {
    pub number: u32,
    pub title: &'a str,
    pub body: Option<&'a str>,
    /// Marks the chapter that triggers bibliography compilation. Without a
    /// flag anywhere, the highest generated chapter does.
    pub is_final: bool,
}

#[derive(Debug, Clone)]
pub struct ChapterOutcome {
    pub chapter: Chapter,
    pub parsed_references: usize,
    pub merge: MergeSummary,
    /// References dropped because no chapter cites them anymore.
    pub pruned: usize,
    /// Citation drift between the chapter text and its reference list.
    pub warnings: Vec<String>,
    /// Present when this chapter triggered compilation.
    pub compiled: Option<Vec<CompiledReference>>,
}

/// Stores a (re)generated chapter and merges its references into the registry.
pub fn record_chapter(
    manager: &ProjectManager,
    project: &Project,
    input: ChapterInput<'_>,
) -> WritingResult<ChapterOutcome> {
    if input.number == 0 {
        bail!("Chapter numbers start at 1");
    }
    let store = ChapterStore::new(project);
    if input.is_final {
        clear_final_flag(&store, input.number)?;
    }

    let chapter = Chapter {
        number: input.number,
        title: input.title.trim().to_string(),
        body_markdown: input.body.map(str::to_string),
        is_final: input.is_final,
        updated_at: Utc::now(),
    };
    store
        .save_chapter(chapter.number, &chapter)
        .with_context(|| format!("Failed to store chapter {}", chapter.number))?;
    log_event(
        project,
        EventType::ChapterRecorded,
        json!({
            "number": chapter.number,
            "title": chapter.title,
            "generated": chapter.is_generated(),
            "is_final": chapter.is_final,
        }),
    )?;

    let style = project.citation_style;
    let text = split_reference_section(chapter.body_markdown.as_deref().unwrap_or_default());
    let references = text
        .references
        .as_deref()
        .map(|section| parse_references(style, section, chapter.number))
        .unwrap_or_default();
    let warnings = citation_drift(style, &text.body, &references);
    for warning in &warnings {
        log::warn!("chapter {}: {warning}", chapter.number);
    }

    let registry = manager.registry_store();
    let mut state = registry.load(&project.id)?;
    let pruned = match manager.config.citations.stale_references {
        StaleReferencePolicy::Retain => 0,
        StaleReferencePolicy::Prune => {
            let keep: HashSet<String> = references.iter().map(|r| r.key.clone()).collect();
            state.retract_chapter(chapter.number, &keep)
        }
    };
    if pruned > 0 {
        log_event(
            project,
            EventType::ReferencesPruned,
            json!({ "chapter": chapter.number, "removed": pruned }),
        )?;
    }

    let parsed_references = references.len();
    let merge = state.merge(chapter.number, references);
    registry.save(&project.id, &state)?;
    log_event(
        project,
        EventType::ReferencesMerged,
        json!({
            "chapter": chapter.number,
            "parsed": parsed_references,
            "added": merge.added,
            "updated": merge.updated,
            "registry_size": state.len(),
        }),
    )?;

    let closes_project = final_chapter(&load_chapters(project)?)
        .is_some_and(|closing| closing.number == chapter.number);
    let compiled = if closes_project {
        Some(compile_references(manager, project)?)
    } else {
        None
    };

    Ok(ChapterOutcome {
        chapter,
        parsed_references,
        merge,
        pruned,
        warnings,
        compiled,
    })
}

/// Compiles the registry for the project style and writes the snapshot to
/// the user layer.
pub fn compile_references(
    manager: &ProjectManager,
    project: &Project,
) -> WritingResult<Vec<CompiledReference>> {
    let state = manager.registry_store().load(&project.id)?;
    let compiled = state.compile_style(project.citation_style);
    let path = ProjectLayout::new(project).compiled_references;
    crate::storage::ai_layer::write_json(&path, &compiled)?;
    log_event(
        project,
        EventType::ReferencesCompiled,
        json!({
            "style": project.citation_style,
            "entries": compiled.len(),
            "path": path.display().to_string(),
        }),
    )?;
    Ok(compiled)
}

/// All stored chapters, ascending by number.
pub fn load_chapters(project: &Project) -> WritingResult<Vec<Chapter>> {
    ChapterStore::new(project).load_all()
}

/// The chapter that closes the project: the flagged one, else the
/// highest-numbered generated chapter.
pub fn final_chapter(chapters: &[Chapter]) -> Option<&Chapter> {
    chapters
        .iter()
        .filter(|chapter| chapter.is_final)
        .max_by_key(|chapter| chapter.number)
        .or_else(|| {
            chapters
                .iter()
                .filter(|chapter| chapter.is_generated())
                .max_by_key(|chapter| chapter.number)
        })
}

/// Gaps or a missing chapter 1 in an ascending chapter list.
pub fn numbering_gaps(chapters: &[Chapter]) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut expected = 1;
    for chapter in chapters {
        if chapter.number != expected {
            warnings.push(format!(
                "Chapter numbering is not contiguous: expected chapter {expected}, found {}",
                chapter.number
            ));
        }
        expected = chapter.number + 1;
    }
    warnings
}

fn clear_final_flag(store: &ChapterStore, keep: u32) -> WritingResult<()> {
    for number in store.chapter_numbers()? {
        if number == keep {
            continue;
        }
        if let Some(mut chapter) = store.load_chapter::<Chapter>(number)? {
            if chapter.is_final {
                chapter.is_final = false;
                store.save_chapter(number, &chapter)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citations::CitationStyle;
    use crate::orchestration::OrchestrationLog;
    use tempfile::TempDir;

    const CHAPTER_ONE: &str = "\
## CHAPTER ONE: INTRODUCTION
Adoption is rising [1].

## References
[1] C. Okafor, \"Rural electrification,\" Energy Policy, 2020.
[2] A. Bello, \"Solar adoption patterns,\" Renewable Energy, 2019.";

    fn setup(style: CitationStyle) -> (TempDir, ProjectManager, Project) {
        let dir = TempDir::new().unwrap();
        let mut manager = ProjectManager::with_root(dir.path()).unwrap();
        let project = manager.create_project("Chapters", Some(style)).unwrap();
        (dir, manager, project)
    }

    fn chapter(number: u32, body: Option<&str>, is_final: bool) -> Chapter {
        Chapter {
            number,
            title: format!("Chapter {number}"),
            body_markdown: body.map(str::to_string),
            is_final,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn recording_merges_and_reports_drift() {
        let (_dir, manager, project) = setup(CitationStyle::Ieee);
        let outcome = record_chapter(
            &manager,
            &project,
            ChapterInput {
                number: 1,
                title: "Introduction",
                body: Some(CHAPTER_ONE),
                is_final: false,
            },
        )
        .unwrap();

        assert_eq!(outcome.parsed_references, 2);
        assert_eq!(outcome.merge.added, 2);
        assert!(outcome.compiled.is_some());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(manager.registry_store().load(&project.id).unwrap().len(), 2);
        assert_eq!(load_chapters(&project).unwrap(), vec![outcome.chapter]);
    }

    #[test]
    fn final_chapter_compiles_snapshot() {
        let (_dir, manager, project) = setup(CitationStyle::Ieee);
        let outcome = record_chapter(
            &manager,
            &project,
            ChapterInput {
                number: 1,
                title: "Introduction",
                body: Some(CHAPTER_ONE),
                is_final: true,
            },
        )
        .unwrap();

        let compiled = outcome.compiled.unwrap();
        assert_eq!(compiled[0].label, "[1]");
        assert!(ProjectLayout::new(&project).compiled_references.exists());
        let events = OrchestrationLog::for_project(&project)
            .load_events_of(EventType::ReferencesCompiled)
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn highest_generated_chapter_compiles_without_flag() {
        let (_dir, manager, project) = setup(CitationStyle::Apa);
        let record = |number: u32| {
            record_chapter(
                &manager,
                &project,
                ChapterInput {
                    number,
                    title: "Body",
                    body: Some("Uptake grew (Bello, 2019).\n\n## References\nBello, A. (2019). Solar adoption."),
                    is_final: false,
                },
            )
            .unwrap()
        };
        record(1);
        let second = record(2);
        assert_eq!(second.compiled.map(|entries| entries.len()), Some(1));
        assert!(ProjectLayout::new(&project).compiled_references.exists());

        let regenerated = record(1);
        assert!(regenerated.compiled.is_none());
        let events = OrchestrationLog::for_project(&project)
            .load_events_of(EventType::ReferencesCompiled)
            .unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn flagging_a_new_final_chapter_clears_the_old_flag() {
        let (_dir, manager, project) = setup(CitationStyle::None);
        for (number, is_final) in [(1, true), (2, true)] {
            record_chapter(
                &manager,
                &project,
                ChapterInput {
                    number,
                    title: "Body",
                    body: Some("Text."),
                    is_final,
                },
            )
            .unwrap();
        }
        let chapters = load_chapters(&project).unwrap();
        let flagged: Vec<u32> = chapters
            .iter()
            .filter(|c| c.is_final)
            .map(|c| c.number)
            .collect();
        assert_eq!(flagged, vec![2]);
    }

    #[test]
    fn chapter_zero_is_rejected() {
        let (_dir, manager, project) = setup(CitationStyle::Apa);
        let input = ChapterInput {
            number: 0,
            title: "Preface",
            body: None,
            is_final: false,
        };
        assert!(record_chapter(&manager, &project, input).is_err());
    }

    #[test]
    fn final_chapter_prefers_flag_then_highest_generated() {
        let chapters = vec![
            chapter(1, Some("a"), false),
            chapter(2, Some("b"), false),
            chapter(3, None, false),
        ];
        assert_eq!(final_chapter(&chapters).map(|c| c.number), Some(2));

        let flagged = vec![chapter(1, Some("a"), true), chapter(2, Some("b"), false)];
        assert_eq!(final_chapter(&flagged).map(|c| c.number), Some(1));
        assert!(final_chapter(&[]).is_none());
    }

    #[test]
    fn numbering_gaps_are_reported() {
        let chapters = vec![chapter(1, None, false), chapter(3, None, false)];
        assert_eq!(numbering_gaps(&chapters).len(), 1);
        let shifted = vec![chapter(2, None, false)];
        assert_eq!(numbering_gaps(&shifted).len(), 1);
        let contiguous = vec![chapter(1, None, false), chapter(2, None, false)];
        assert!(numbering_gaps(&contiguous).is_empty());
    }
}
