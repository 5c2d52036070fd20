//! One-shot commands — `finrouter ask` and `finrouter plan`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use console::style;
use finrouter::capabilities::Artifacts;
use finrouter::finrouter_config::FinrouterConfig;
use finrouter::orchestrator::{RunRequest, StepOutcome};
use finrouter_common::Identity;
use indicatif::{ProgressBar, ProgressStyle};

fn existing(path: Option<PathBuf>, what: &str) -> Result<Option<PathBuf>> {
    match path {
        Some(p) if !p.is_file() => bail!("{} not found: {}", what, p.display()),
        Some(p) => Ok(Some(
            p.canonicalize()
                .with_context(|| format!("Failed to resolve {}", p.display()))?,
        )),
        None => Ok(None),
    }
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .expect("progress bar template is a valid static string"),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

pub async fn cmd_ask(
    config: FinrouterConfig,
    message: String,
    identity: Identity,
    document: Option<PathBuf>,
    image: Option<PathBuf>,
) -> Result<()> {
    finrouter::logging::init(config.verbose, None);

    let artifacts = Artifacts {
        document: existing(document, "Document")?,
        image: existing(image, "Image")?,
    };
    let orchestrator = finrouter::runtime::build_orchestrator(&config)?;
    let request = RunRequest::new(message, identity).with_artifacts(artifacts);

    let bar = spinner("Thinking...");
    let result = orchestrator.handle(request).await;
    bar.finish_and_clear();
    let report = result.context("Run failed")?;

    println!("{}", report.response);

    if !report.outcomes.is_empty() {
        let steps: Vec<String> = report
            .outcomes
            .iter()
            .map(|outcome| match outcome {
                StepOutcome::Succeeded { kind, .. } => format!("{} {}", style("✓").green(), kind),
                StepOutcome::Failed { kind, reason } => {
                    format!("{} {} ({})", style("✗").red(), kind, reason)
                }
            })
            .collect();
        eprintln!();
        eprintln!("{} {}", style("Steps:").dim(), steps.join(", "));
    }
    if report.snapshot.fell_back {
        eprintln!("{}", style("Planner output was unusable; fallback plan used.").yellow());
    }
    Ok(())
}

pub async fn cmd_plan(config: FinrouterConfig, message: String, identity: Identity) -> Result<()> {
    finrouter::logging::init(config.verbose, None);

    let orchestrator = finrouter::runtime::build_orchestrator(&config)?;
    let decision = orchestrator.plan(&RunRequest::new(message, identity)).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&decision).context("Failed to serialize plan")?
    );
    Ok(())
}
