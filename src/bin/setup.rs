use std::env;

use anyhow::{anyhow, Context, Result};
use thesisbase::projects::{ProjectManager, StaleReferencePolicy};
use thesisbase::CitationStyle;

fn main() -> Result<()> {
    let args = CliArgs::parse()?;
    let mut manager = ProjectManager::new()?;
    let first_run = !manager.config_path.exists();
    let mut changed = first_run;

    let config = &mut manager.config;
    if let Some(style) = args.style {
        changed |= replace(&mut config.citations.default_style, style);
    }
    if let Some(policy) = args.stale_policy {
        changed |= replace(&mut config.citations.stale_references, policy);
    }
    if let Some(timeout) = args.timeout_ms {
        changed |= replace(&mut config.export.image_fetch_timeout_ms, timeout);
    }
    if let Some(parallel) = args.parallel {
        changed |= replace(&mut config.export.max_parallel_image_fetches, parallel);
    }
    if let Some(text) = args.missing_text {
        changed |= replace(&mut config.export.missing_content_text, text);
    }

    if changed {
        manager.save_config()?;
        println!(
            "Export settings recorded at {}",
            manager.config_path.display()
        );
    } else {
        println!("Export settings already configured.");
    }
    println!(
        "  default style: {}, stale references: {:?}, image timeout: {} ms, parallel fetches: {}",
        manager.config.citations.default_style,
        manager.config.citations.stale_references,
        manager.config.export.image_fetch_timeout_ms,
        manager.config.export.max_parallel_image_fetches
    );

    Ok(())
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[derive(Default)]
struct CliArgs {
    style: Option<CitationStyle>,
    stale_policy: Option<StaleReferencePolicy>,
    timeout_ms: Option<u64>,
    parallel: Option<u32>,
    missing_text: Option<String>,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--style" => {
                    let value = args.next().context("Expected a style after --style")?;
                    parsed.style = Some(value.parse()?);
                }
                "--stale-policy" => {
                    let value = args
                        .next()
                        .context("Expected retain or prune after --stale-policy")?;
                    parsed.stale_policy = Some(match value.to_ascii_lowercase().as_str() {
                        "retain" => StaleReferencePolicy::Retain,
                        "prune" => StaleReferencePolicy::Prune,
                        other => return Err(anyhow!("Unknown stale reference policy '{other}'")),
                    });
                }
                "--timeout-ms" => {
                    let value = args
                        .next()
                        .context("Expected milliseconds after --timeout-ms")?;
                    parsed.timeout_ms = Some(
                        value
                            .parse()
                            .with_context(|| format!("Invalid timeout '{value}'"))?,
                    );
                }
                "--parallel" => {
                    let value = args.next().context("Expected a count after --parallel")?;
                    let count: u32 = value
                        .parse()
                        .with_context(|| format!("Invalid parallelism '{value}'"))?;
                    if count == 0 {
                        return Err(anyhow!("--parallel must be at least 1"));
                    }
                    parsed.parallel = Some(count);
                }
                "--missing-text" => {
                    let value = args
                        .next()
                        .context("Expected text after --missing-text")?;
                    parsed.missing_text = Some(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument '{other}'. Run with --help for usage instructions."
                    ));
                }
            }
        }
        Ok(parsed)
    }
}

fn print_usage() {
    println!("ThesisBase setup");
    println!("Records citation and export settings in config.toml.");
    println!("Usage: cargo run --bin setup -- [options]");
    println!("Options:");
    println!("  --style <apa|harvard|ieee|none>   Default citation style for new projects");
    println!("  --stale-policy <retain|prune>     What regenerated chapters do to dropped references");
    println!("  --timeout-ms <ms>                 Per-figure fetch timeout (default: 10000)");
    println!("  --parallel <n>                    Concurrent figure fetches (default: 4)");
    println!("  --missing-text <text>             Paragraph used for empty chapters");
}
