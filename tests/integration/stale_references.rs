use super::support::record;
use super::IntegrationHarness;
use anyhow::Result;
use thesisbase::citations::RegistryStore;
use thesisbase::projects::StaleReferencePolicy;
use thesisbase::CitationStyle;

const FIRST_DRAFT: &str = "\
Evidence (Okafor, 2020) and (Bello, 2019).

## References
Okafor, C. O. (2020). Rural electrification in West Africa. Energy Policy, 12(3), 44-60.
Bello, A. (2019). Solar adoption patterns in Nigeria. Renewable Energy, 8, 1-9.";

const SECOND_DRAFT: &str = "\
Evidence (Okafor, 2020).

## References
Okafor, C. O. (2020). Rural electrification in West Africa. Energy Policy, 12(3), 44-60.";

#[test]
fn retain_policy_keeps_dropped_references() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut manager = harness.project_manager();
    let project = harness.create_project(&mut manager, "Retained", CitationStyle::Apa);

    record(&manager, &project, 1, "Intro", FIRST_DRAFT, false)?;
    let outcome = record(&manager, &project, 1, "Intro", SECOND_DRAFT, false)?;

    assert_eq!(outcome.pruned, 0);
    let state = manager.registry_store().load(&project.id)?;
    assert!(state.get("Bello2019").is_some());
    Ok(())
}

#[test]
fn prune_policy_drops_references_no_chapter_cites() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut manager = harness.project_manager();
    manager.config.citations.stale_references = StaleReferencePolicy::Prune;
    let project = harness.create_project(&mut manager, "Pruned", CitationStyle::Apa);

    record(&manager, &project, 1, "Intro", FIRST_DRAFT, false)?;
    record(&manager, &project, 2, "Review", FIRST_DRAFT, false)?;
    let outcome = record(&manager, &project, 1, "Intro", SECOND_DRAFT, false)?;

    // Chapter 2 still cites Bello, so only chapter 1's usage is withdrawn.
    assert_eq!(outcome.pruned, 0);
    let state = manager.registry_store().load(&project.id)?;
    let bello = state.get("Bello2019").expect("still cited by chapter 2");
    assert_eq!(bello.first_used_chapter, 2);

    let outcome = record(&manager, &project, 2, "Review", SECOND_DRAFT, false)?;
    assert_eq!(outcome.pruned, 1);
    let state = manager.registry_store().load(&project.id)?;
    assert!(state.get("Bello2019").is_none());
    assert_eq!(state.len(), 1);
    Ok(())
}
