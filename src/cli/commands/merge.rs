use crate::cli::MergeArgs;
use crate::cli::commands::preview::render_preview;
use crate::config;
use crate::error::Result;
use crate::merge::{HistoryMerger, MergeOutcome};
use crate::model::MergePreview;
use serde::Serialize;

#[derive(Serialize)]
struct MergeOutput {
    preview: MergePreview,
    nothing_to_merge: bool,
    dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<MergeOutcome>,
}

/// Execute the merge command.
///
/// The preview is computed first; when it finds nothing to add or update the
/// merge is not run at all.
///
/// # Errors
///
/// Returns an error if configuration is invalid, a store is missing or
/// unreadable, or the target cannot be written.
pub fn execute(
    args: &MergeArgs,
    json: bool,
    quiet: bool,
    cli: &config::CliOverrides,
) -> Result<()> {
    let options = config::resolve_merge_options(cli)?;
    let merger = HistoryMerger::new(&args.source, &args.target)
        .dry_run(args.dry_run)
        .with_options(options);

    let preview = merger.preview()?;
    let show = !json && !quiet;

    if show {
        println!("Merge plan:");
        for line in render_preview(&preview).lines() {
            println!("  {line}");
        }
    }

    if preview.nothing_to_merge() {
        if json {
            print_json(&MergeOutput {
                preview,
                nothing_to_merge: true,
                dry_run: args.dry_run,
                outcome: None,
            })?;
        } else if show {
            println!("Nothing to merge");
        }
        return Ok(());
    }

    let outcome = merger.run()?;

    if json {
        print_json(&MergeOutput {
            preview,
            nothing_to_merge: false,
            dry_run: args.dry_run,
            outcome: Some(outcome),
        })?;
    } else if show {
        println!("{}", render_outcome(&outcome, args.dry_run));
    }
    Ok(())
}

fn print_json(output: &MergeOutput) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

fn render_outcome(outcome: &MergeOutcome, dry_run: bool) -> String {
    let stats = &outcome.stats;
    let mut text = format!(
        "{}:\n  URLs added: {}\n  URLs updated: {}\n  Visits added: {}",
        if dry_run {
            "Dry run (target not modified)"
        } else {
            "Merged history"
        },
        stats.urls_added,
        stats.urls_updated,
        stats.visits_added,
    );
    if !dry_run && !outcome.wrote_back {
        text.push_str("\nTarget unchanged");
    }
    text
}
