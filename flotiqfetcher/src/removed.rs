use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use crate::client::FlotiqClient;
use crate::error::Result;
use crate::models::ContentTypeDefinition;
use crate::params::SyncOptions;
use crate::workers::{run_workers, JobQueue};

/// Asks every content type for the ids deleted after `since` and passes each
/// one to `on_deleted`. Returns the number of ids reported.
///
/// A failed request only drops that content type from this pass.
pub async fn get_deleted_objects<F>(
    client: &FlotiqClient,
    options: &SyncOptions,
    since: &str,
    content_types: &[ContentTypeDefinition],
    on_deleted: F,
) -> Result<usize>
where
    F: Fn(&ContentTypeDefinition, &str) -> Result<()>,
{
    let removed = AtomicUsize::new(0);
    let queue: JobQueue<&ContentTypeDefinition> = content_types.iter().collect();

    let (counter, on_deleted) = (&removed, &on_deleted);

    let report = run_workers(&queue, options.max_concurrent_data_downloads(), move |ctd| {
        async move {
            let url = client.removed_url(&ctd.name, since);
            log::info!("Fetching removed content type {}: {}", ctd.name, url);
            let ids: Vec<Value> = match client.get_json(&url).await {
                Ok(ids) => ids,
                Err(err) if err.is_transient() => {
                    log::warn!("Error fetching removed objects of {}: {}", ctd.name, err);
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            for id in ids.iter().filter_map(removed_id) {
                counter.fetch_add(1, Ordering::SeqCst);
                on_deleted(ctd, &id)?;
            }
            Ok(())
        }
    })
    .await;

    if let Some(err) = report.errors.into_iter().next() {
        return Err(err);
    }
    Ok(removed.load(Ordering::SeqCst))
}

fn removed_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
