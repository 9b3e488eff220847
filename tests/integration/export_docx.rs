use super::support::{docx_entries, docx_part, record, PIXEL_PNG};
use super::IntegrationHarness;
use anyhow::Result;
use thesisbase::figures::{register_figure, FigureUpload};
use thesisbase::markdown::FigureRef;
use thesisbase::orchestration::EventType;
use thesisbase::writing::{export_project, hash_path, read_export_manifests, ExportOptions};
use thesisbase::{CitationStyle, OrchestrationLog};

const CHAPTER_ONE: &str = "\
## CHAPTER ONE: INTRODUCTION
Solar uptake is **accelerating** across *rural* districts [1].

### Scope
- household systems
- mini-grids

| District | Households |
|----------|------------|
| Kano | 1200 |

{{figure1.1}}

## References
[1] C. Okafor, \"Rural electrification in West Africa,\" Energy Policy, 2020.";

const CHAPTER_TWO: &str = "\
## CHAPTER TWO: METHODS
1. Survey design [1], [2].
2. Field visits.

## References
[1] C. Okafor, \"Rural electrification in West Africa,\" Energy Policy, 2020.
[2] A. Bello, \"Solar adoption patterns,\" Renewable Energy, 2019.";

#[test]
fn export_produces_docx_with_media_and_manifest() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut manager = harness.project_manager();
    let project = harness.create_project(&mut manager, "Solar Uptake", CitationStyle::Ieee);

    register_figure(
        &project,
        FigureUpload {
            figure: FigureRef::new(1, 1),
            caption: "Study districts",
            file_name: "districts.png",
            bytes: PIXEL_PNG,
        },
    )?;
    record(&manager, &project, 1, "Introduction", CHAPTER_ONE, false)?;
    record(&manager, &project, 2, "Methods", CHAPTER_TWO, true)?;

    let outcome = export_project(&manager, &project, ExportOptions::default())?;
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    assert_eq!(outcome.manifest.reference_count, 2);
    assert_eq!(outcome.manifest.figures_embedded, 1);
    assert_eq!(outcome.manifest.sha256, hash_path(&outcome.path)?);

    let entries = docx_entries(&outcome.path)?;
    for part in [
        "[Content_Types].xml",
        "_rels/.rels",
        "word/document.xml",
        "word/styles.xml",
        "word/_rels/document.xml.rels",
        "word/media/image1.png",
    ] {
        assert!(entries.iter().any(|entry| entry == part), "missing {part}");
    }

    let body = docx_part(&outcome.path, "word/document.xml")?;
    assert!(body.contains("Solar Uptake"));
    assert!(body.contains("Table of Contents"));
    assert!(body.contains("Chapter 1: Introduction"));
    assert!(!body.contains("## CHAPTER"));
    assert!(body.contains("accelerating"));
    assert!(body.contains("Figure 1.1: Study districts"));
    assert!(body.contains("[1] C. Okafor"));
    assert!(body.contains("[2] A. Bello"));
    assert!(!body.contains("|----"));

    let manifests = read_export_manifests(&project)?;
    assert_eq!(manifests.len(), 1);
    let completed = OrchestrationLog::for_project(&project).load_events_of(EventType::ExportCompleted)?;
    assert_eq!(completed.len(), 1);
    Ok(())
}

#[test]
fn style_none_omits_references_and_gaps_warn() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut manager = harness.project_manager();
    let project = harness.create_project(&mut manager, "No Citations", CitationStyle::Ieee);

    record(&manager, &project, 1, "Introduction", CHAPTER_ONE, false)?;
    record(&manager, &project, 3, "Results", "", true)?;

    let outcome = export_project(
        &manager,
        &project,
        ExportOptions {
            title: Some("Draft Without References".into()),
            style: Some("none".into()),
        },
    )?;
    assert_eq!(outcome.manifest.reference_count, 0);
    assert_eq!(outcome.manifest.citation_style, CitationStyle::None);
    assert!(outcome
        .warnings
        .iter()
        .any(|warning| warning.contains("expected chapter 2")));
    assert!(outcome
        .warnings
        .iter()
        .any(|warning| warning.contains("Figure 1.1")));

    let body = docx_part(&outcome.path, "word/document.xml")?;
    assert!(body.contains("Draft Without References"));
    assert!(body.contains("Content not available"));
    assert!(!body.contains(">References<"));
    Ok(())
}
