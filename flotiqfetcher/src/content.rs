//! Paginated, optionally delta-filtered download of content objects.

use std::sync::atomic::{AtomicUsize, Ordering};

use fgraph::store::GraphStore;

use crate::client::FlotiqClient;
use crate::error::Result;
use crate::models::{ContentObject, ContentPage, ContentTypeDefinition};
use crate::params::SyncOptions;
use crate::workers::{run_workers, JobQueue};

/// One page request. Page 1 is queued per content type up front; later pages
/// are queued once page 1 reports the total page count.
#[derive(Debug, Clone)]
pub struct DownloadJob<'a> {
    pub url_prefix: String,
    /// Objects this content type may still bring in.
    pub object_limit: u64,
    pub per_page: u64,
    pub page: u64,
    pub total_pages: Option<u64>,
    pub ctd: &'a ContentTypeDefinition,
}

impl DownloadJob<'_> {
    pub fn url(&self) -> String {
        format!("{}&page={}", self.url_prefix, self.page)
    }

    /// Last page worth requesting, given the remote page count.
    pub fn page_cap(&self, total_pages: u64) -> u64 {
        total_pages.min(self.object_limit.div_ceil(self.per_page))
    }

    fn describe_page(&self) -> String {
        match self.total_pages {
            Some(total) if self.page > 1 => format!("{}/{}", self.page, total),
            _ => "first page".to_string(),
        }
    }
}

/// Initial jobs, one per content type. In delta mode the budget shrinks by the
/// nodes already materialized for that type.
pub fn initial_jobs<'a>(
    client: &FlotiqClient,
    store: &dyn GraphStore,
    options: &SyncOptions,
    since: Option<&str>,
    content_types: &'a [ContentTypeDefinition],
) -> Result<Vec<DownloadJob<'a>>> {
    let per_page = options.per_page();
    content_types
        .iter()
        .map(|ctd| -> Result<DownloadJob<'a>> {
            let existing = match since {
                Some(_) => store.count_nodes_by_type(&ctd.node_type())? as u64,
                None => 0,
            };
            Ok(DownloadJob {
                url_prefix: client.content_url_prefix(&ctd.name, per_page, since),
                object_limit: options.object_limit.saturating_sub(existing),
                per_page,
                page: 1,
                total_pages: None,
                ctd,
            })
        })
        .collect()
}

struct Download<'a, F> {
    client: &'a FlotiqClient,
    queue: JobQueue<DownloadJob<'a>>,
    on_object: F,
    changed: AtomicUsize,
    delta: bool,
}

impl<'a, F> Download<'a, F>
where
    F: Fn(&ContentTypeDefinition, ContentObject) -> Result<()>,
{
    async fn run(&self, job: DownloadJob<'a>) -> Result<()> {
        log::info!(
            "Fetching{}: {} {}",
            if self.delta { " updates" } else { "" },
            job.ctd.name,
            job.describe_page()
        );
        let url = job.url();
        let page: ContentPage = match self.client.get_json(&url).await {
            Ok(page) => page,
            Err(err) if err.is_transient() => {
                log::warn!("Error fetching data from {}: {}", url, err);
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for datum in page.data {
            self.changed.fetch_add(1, Ordering::SeqCst);
            (self.on_object)(job.ctd, datum)?;
        }

        if job.page == 1 && page.total_pages > 1 {
            let cap = job.page_cap(page.total_pages);
            log::debug!(
                "{} has {} page(s), downloading {}",
                job.ctd.name,
                page.total_pages,
                cap
            );
            for next in 2..=cap {
                self.queue.push(DownloadJob {
                    page: next,
                    total_pages: Some(cap),
                    ..job.clone()
                });
            }
        }
        Ok(())
    }
}

/// Downloads every content type through the worker pool and hands each object
/// to `on_object`. Returns the number of objects received.
///
/// Failed page requests are logged and skipped. An error from `on_object`
/// does not stop other pages, but is returned once the pool has drained.
pub async fn fetch_content_objects<F>(
    client: &FlotiqClient,
    store: &dyn GraphStore,
    options: &SyncOptions,
    since: Option<&str>,
    content_types: &[ContentTypeDefinition],
    on_object: F,
) -> Result<usize>
where
    F: Fn(&ContentTypeDefinition, ContentObject) -> Result<()>,
{
    let jobs = initial_jobs(client, store, options, since, content_types)?;
    let download = Download {
        client,
        queue: jobs.into_iter().collect(),
        on_object,
        changed: AtomicUsize::new(0),
        delta: since.is_some(),
    };

    let report = run_workers(
        &download.queue,
        options.max_concurrent_data_downloads(),
        |job| download.run(job),
    )
    .await;

    if let Some(err) = report.errors.into_iter().next() {
        return Err(err);
    }
    let changed = download.changed.load(Ordering::SeqCst);
    log::info!("Fetched {} object(s) in {} request(s)", changed, report.completed);
    Ok(changed)
}
