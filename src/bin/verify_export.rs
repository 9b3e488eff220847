use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use thesisbase::projects::{ProjectLayout, ProjectManager};
use thesisbase::writing::{hash_path, read_export_manifests};
use walkdir::WalkDir;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let report_untracked = args.iter().any(|arg| arg == "--untracked");
    let slug = args.iter().find(|arg| !arg.starts_with("--"));

    let manager = ProjectManager::new()?;
    let project = match slug {
        Some(slug) => manager.require_project(slug)?,
        None => manager.active_project()?.context(
            "No active project. Usage: cargo run --bin verify_export -- [project-slug] [--untracked]",
        )?,
    };
    let manifests = read_export_manifests(&project)?;

    let mut failures = Vec::new();
    for manifest in &manifests {
        if !manifest.path.exists() {
            failures.push(format!("[missing] {}", manifest.path.display()));
            continue;
        }
        let current_hash = hash_path(&manifest.path)?;
        if current_hash != manifest.sha256 {
            failures.push(format!(
                "[mismatch] {} expected {}, found {}",
                manifest.path.display(),
                manifest.sha256,
                current_hash
            ));
        }
    }

    if report_untracked {
        let tracked: HashSet<&PathBuf> = manifests.iter().map(|m| &m.path).collect();
        let builds = ProjectLayout::new(&project).builds_dir;
        for entry in WalkDir::new(&builds).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path().to_path_buf();
            if entry.file_type().is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some("docx")
                && !tracked.contains(&path)
            {
                println!("  ? untracked build {}", path.display());
            }
        }
    }

    if failures.is_empty() {
        println!(
            "Project {} verified: {} exports match recorded hashes.",
            project.slug,
            manifests.len()
        );
        Ok(())
    } else {
        println!("Export verification failed:");
        for failure in &failures {
            println!("  - {}", failure);
        }
        anyhow::bail!("Export verification failed ({} problems)", failures.len())
    }
}
