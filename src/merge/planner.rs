//! Folding a source store into a target store.

use crate::error::Result;
use crate::model::{MergeStats, UrlIdMapping, UrlTotals};
use crate::storage::HistoryStore;

/// Merge `source` into `target` in a single transaction.
///
/// URLs are matched by their string. Matching URLs get summed counts and the
/// later `last_visit_time`; new URLs are inserted with ids assigned by the
/// target. Visits follow their URL through the id mapping and are skipped when
/// the target already has one at the same `(url, visit_time)`. Copied visits
/// lose their `from_visit` link since the referenced id is source-local.
///
/// # Errors
///
/// Returns an error if either store cannot be read or the target cannot be
/// written; the target transaction is rolled back.
pub fn execute_merge(source: &HistoryStore, target: &mut HistoryStore) -> Result<MergeStats> {
    let stats = target.mutate("merge_history", |writer| {
        let mut totals = writer.url_totals_by_url()?;
        let mut mapping = UrlIdMapping::new();
        let mut stats = MergeStats::default();

        source.for_each_visited_url(|record| {
            if let Some(existing) = totals.get_mut(&record.url) {
                existing.absorb(&record);
                writer.update_url_totals(existing)?;
                mapping.insert(record.id, existing.id);
                stats.urls_updated = stats.urls_updated.saturating_add(1);
            } else {
                let new_id = writer.insert_url(&record)?;
                tracing::trace!(url = %record.url, source_id = record.id, new_id, "Added URL");
                mapping.insert(record.id, new_id);
                totals.insert(record.url.clone(), UrlTotals::for_inserted(new_id, &record));
                stats.urls_added = stats.urls_added.saturating_add(1);
            }
            Ok(())
        })?;

        let mut seen = writer.visit_keys()?;
        let mut orphaned = 0_usize;
        let mut duplicates = 0_usize;

        source.for_each_visit(|mut visit| {
            let Some(target_id) = mapping.resolve(visit.url_id) else {
                orphaned += 1;
                return Ok(());
            };
            if !seen.insert((target_id, visit.visit_time)) {
                duplicates += 1;
                return Ok(());
            }

            visit.url_id = target_id;
            visit.from_visit = 0;
            writer.insert_visit(&visit)?;
            stats.visits_added = stats.visits_added.saturating_add(1);
            Ok(())
        })?;

        tracing::debug!(
            mapped_urls = mapping.len(),
            orphaned,
            duplicates,
            "Visit pass complete"
        );
        Ok(stats)
    })?;

    tracing::info!(
        urls_added = stats.urls_added,
        urls_updated = stats.urls_updated,
        visits_added = stats.visits_added,
        "Merged history"
    );
    Ok(stats)
}
