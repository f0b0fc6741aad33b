use crate::cli::PreviewArgs;
use crate::config;
use crate::error::Result;
use crate::merge::HistoryMerger;
use crate::model::MergePreview;

/// Execute the preview command.
///
/// # Errors
///
/// Returns an error if configuration is invalid or either store is missing
/// or unreadable.
pub fn execute(
    args: &PreviewArgs,
    json: bool,
    quiet: bool,
    cli: &config::CliOverrides,
) -> Result<()> {
    let options = config::resolve_merge_options(cli)?;
    let preview = HistoryMerger::new(&args.source, &args.target)
        .with_options(options)
        .preview()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else if !quiet {
        print_preview(&preview);
    }
    Ok(())
}

/// Human-readable rendering shared with the merge command.
pub(crate) fn render_preview(preview: &MergePreview) -> String {
    format!(
        "Source: {} URLs, {} visits\n\
         Target: {} URLs, {} visits\n\
         New URLs to add: {}\n\
         Existing URLs to update: {}",
        preview.source_urls,
        preview.source_visits,
        preview.target_urls,
        preview.target_visits,
        preview.new_urls_to_add,
        preview.existing_urls_to_update,
    )
}

fn print_preview(preview: &MergePreview) {
    println!("{}", render_preview(preview));
}
