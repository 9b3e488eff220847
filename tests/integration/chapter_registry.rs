use super::support::record;
use super::IntegrationHarness;
use anyhow::Result;
use pretty_assertions::assert_eq;
use thesisbase::citations::RegistryStore;
use thesisbase::orchestration::EventType;
use thesisbase::projects::ProjectLayout;
use thesisbase::{CitationStyle, OrchestrationLog};

const APA_ONE: &str = "\
## CHAPTER ONE: INTRODUCTION
Rural demand is growing (Okafor, 2020).

## References
Okafor, C. O. (2020). Rural electrification in West Africa. Energy Policy, 12(3), 44-60.";

const APA_TWO: &str = "\
## CHAPTER TWO: LITERATURE REVIEW
Earlier studies (Bello, 2019; Okafor, 2020) and (Adeyemi, 2021) agree.

## References
Bello, A. (2019). Solar adoption patterns in Nigeria. Renewable Energy, 8, 1-9.
Okafor, C. O. (2020). Rural electrification in West Africa. Energy Policy, 12(3), 44-60.
Adeyemi, T. (2021). Mini-grid tariffs and rural uptake. Energy for Sustainable Development, 4, 10-22.";

#[test]
fn apa_registry_accumulates_and_compiles_alphabetically() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut manager = harness.project_manager();
    let project = harness.create_project(&mut manager, "Mini-grid Study", CitationStyle::Apa);

    let first = record(&manager, &project, 1, "Introduction", APA_ONE, false)?;
    assert_eq!(first.merge.added, 1);
    assert!(first.warnings.is_empty());

    let second = record(&manager, &project, 2, "Literature Review", APA_TWO, true)?;
    assert_eq!(second.merge.added, 2);
    assert_eq!(second.merge.updated, 1);

    let compiled = second.compiled.expect("final chapter compiles");
    let authors: Vec<&str> = compiled
        .iter()
        .map(|entry| entry.reference.author.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(authors, vec!["Adeyemi", "Bello", "Okafor"]);
    let labels: Vec<&str> = compiled.iter().map(|entry| entry.label.as_str()).collect();
    assert_eq!(labels, vec!["Adeyemi2021", "Bello2019", "Okafor2020"]);

    let state = manager.registry_store().load(&project.id)?;
    let okafor = state.get("Okafor2020").expect("merged reference");
    assert_eq!(okafor.first_used_chapter, 1);
    assert_eq!(okafor.used_in_chapters.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert!(ProjectLayout::new(&project).compiled_references.exists());
    Ok(())
}

#[test]
fn rerecording_a_chapter_is_idempotent() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut manager = harness.project_manager();
    let project = harness.create_project(&mut manager, "Idempotence", CitationStyle::Apa);

    record(&manager, &project, 2, "Literature Review", APA_TWO, false)?;
    let before = manager.registry_store().load(&project.id)?;
    let again = record(&manager, &project, 2, "Literature Review", APA_TWO, false)?;
    let after = manager.registry_store().load(&project.id)?;

    assert_eq!(again.merge.added, 0);
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn ieee_numbering_follows_first_use_chapter() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut manager = harness.project_manager();
    let project = harness.create_project(&mut manager, "Grid Control", CitationStyle::Ieee);

    // Chapters arrive out of order; each cites one distinct work as [1].
    let bodies = [
        (3, "[1] C. Three, \"Chapter three source,\" 2021."),
        (1, "[1] A. One, \"Chapter one source,\" 2019."),
        (2, "[1] B. Two, \"Chapter two source,\" 2020."),
    ];
    for (number, entry) in bodies {
        let body = format!("Text [1].\n\n## References\n{entry}");
        record(&manager, &project, number, "Chapter", &body, false)?;
    }

    let state = manager.registry_store().load(&project.id)?;
    let compiled = state.compile("ieee")?;
    let order: Vec<(String, u32)> = compiled
        .iter()
        .map(|entry| (entry.label.clone(), entry.reference.first_used_chapter))
        .collect();
    assert_eq!(
        order,
        vec![
            ("[1]".to_string(), 1),
            ("[2]".to_string(), 2),
            ("[3]".to_string(), 3)
        ]
    );
    assert_eq!(
        compiled[0].display_text(CitationStyle::Ieee),
        "[1] A. One, \"Chapter one source,\" 2019."
    );
    assert!(state.compile("mla").is_err());

    let merged = OrchestrationLog::for_project(&project).load_events_of(EventType::ReferencesMerged)?;
    assert_eq!(merged.len(), 3);
    Ok(())
}
