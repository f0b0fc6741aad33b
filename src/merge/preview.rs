//! Read-only merge preview.

use crate::error::Result;
use crate::model::MergePreview;
use crate::storage::HistoryStore;

/// Count what a merge of `source` into `target` would do.
///
/// Source URLs with visits are split by whether their string already exists
/// anywhere in the target, which is exactly how the planner decides between
/// inserting and updating. Visit additions are not predicted.
///
/// # Errors
///
/// Returns `StoreUnreadable` if either store cannot be queried.
pub fn compute_preview(source: &HistoryStore, target: &HistoryStore) -> Result<MergePreview> {
    let mut preview = MergePreview {
        source_urls: source.count_visited_urls()?,
        source_visits: source.count_visits()?,
        target_urls: target.count_visited_urls()?,
        target_visits: target.count_visits()?,
        ..MergePreview::default()
    };

    let known = target.url_set()?;
    for url in source.visited_url_strings()? {
        if known.contains(&url) {
            preview.existing_urls_to_update += 1;
        } else {
            preview.new_urls_to_add += 1;
        }
    }

    tracing::debug!(
        new_urls = preview.new_urls_to_add,
        existing_urls = preview.existing_urls_to_update,
        "Computed merge preview"
    );
    Ok(preview)
}
