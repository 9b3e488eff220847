use super::support::{docx_part, record, PIXEL_PNG};
use super::IntegrationHarness;
use anyhow::Result;
use std::fs;
use thesisbase::figures::{register_figure, FigureStore, FigureUpload};
use thesisbase::markdown::FigureRef;
use thesisbase::writing::{export_project, ExportOptions};
use thesisbase::CitationStyle;

const BODY: &str = "\
Overview of the sites.
{{figure2.1}}
Comparison {{figure2.2}} and {{figure2.3}}.";

#[test]
fn unresolved_and_unreadable_figures_fall_back_to_text() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut manager = harness.project_manager();
    let project = harness.create_project(&mut manager, "Site Survey", CitationStyle::Apa);

    // Registered under an unrelated number; resolves positionally as figure 2.1.
    register_figure(
        &project,
        FigureUpload {
            figure: FigureRef::new(2, 9),
            caption: "Site map",
            file_name: "map.png",
            bytes: PIXEL_PNG,
        },
    )?;
    let broken = register_figure(
        &project,
        FigureUpload {
            figure: FigureRef::new(2, 2),
            caption: "Panel layout",
            file_name: "layout.png",
            bytes: PIXEL_PNG,
        },
    )?;
    fs::remove_file(FigureStore::new(&project).assets_dir().join(&broken.source))?;

    record(&manager, &project, 1, "Background", "Intro text.", false)?;
    record(&manager, &project, 2, "Sites", BODY, true)?;

    let outcome = export_project(&manager, &project, ExportOptions::default())?;
    assert_eq!(outcome.manifest.figures_embedded, 1);
    assert_eq!(outcome.manifest.figures_missing, 2);

    let body = docx_part(&outcome.path, "word/document.xml")?;
    assert!(body.contains("Figure 2.1: Site map"));
    assert!(body.contains("[Figure 2.2 — image not available]"));
    assert!(body.contains("[Figure 2.3 — image not available]"));
    assert!(body.contains("Comparison and ."));
    Ok(())
}
