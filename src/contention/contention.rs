use std::num::NonZeroUsize;
use std::thread::available_parallelism;

use compio::dispatcher::{Dispatcher, DispatcherBuilder};
use compio::runtime::spawn;
use futures::StreamExt;
use futures_channel::mpsc::{self, UnboundedSender};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::metadata::{MetadataStore, MutationOutcome, Rejection, StoreError};
use crate::paths::{join_child, split_parent_and_name};
use crate::repository::{Content, Entry, MemoryCache};

/// Default number of worker threads when unable to determine system parallelism
const DEFAULT_WORKER_THREADS: NonZeroUsize = NonZeroUsize::MIN;

type ClientResult = Result<Vec<(String, MutationOutcome)>, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentionPlan {
    pub directory: String,
    pub clients: usize,
    pub files_per_client: usize,
}

impl ContentionPlan {
    fn file_path(&self, client: usize, index: usize) -> String {
        join_child(&self.directory, &format!("c{client}-{index}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentionReport {
    pub created: Vec<String>,
    pub rejected: Vec<(String, Rejection)>,
    /// Created by a client but absent from the final listing.
    pub unlisted: Vec<String>,
}

impl ContentionReport {
    pub fn converged(&self) -> bool {
        self.unlisted.is_empty()
    }
}

/// Runs independent clients on a worker pool, all creating files in the same
/// directory of one shared cache pair, and checks the listing afterwards.
pub struct ContentionDriver {
    dispatcher: Dispatcher,
    metadata: MemoryCache<Entry>,
    files: MemoryCache<Content>,
    retry_limit: usize,
}

impl ContentionDriver {
    pub fn new(
        metadata: MemoryCache<Entry>,
        files: MemoryCache<Content>,
        retry_limit: usize,
    ) -> Result<Self, ContentionError> {
        let workers_num = Self::determine_worker_count();
        debug!("Using {} worker threads for contention clients", workers_num);

        let dispatcher = DispatcherBuilder::new()
            .worker_threads(workers_num)
            .build()
            .context(DispatcherSnafu)?;

        Ok(Self {
            dispatcher,
            metadata,
            files,
            retry_limit,
        })
    }

    fn determine_worker_count() -> NonZeroUsize {
        available_parallelism().unwrap_or(DEFAULT_WORKER_THREADS)
    }

    fn store(&self) -> MetadataStore<MemoryCache<Entry>, MemoryCache<Content>> {
        MetadataStore::new(self.metadata.clone(), self.files.clone()).with_retry_limit(self.retry_limit)
    }

    pub async fn run(&self, plan: &ContentionPlan) -> Result<ContentionReport, ContentionError> {
        let store = self.store();
        let prepared = store
            .create_directory(&plan.directory)
            .await
            .context(PrepareSnafu)?;
        if let MutationOutcome::Rejected(rejection) = prepared {
            return Err(ContentionError::DirectoryUnavailable {
                directory: plan.directory.clone(),
                rejection,
            });
        }

        let (result_sender, mut result_receiver) = mpsc::unbounded::<ClientResult>();
        for client in 0..plan.clients {
            self.dispatch_client(result_sender.clone(), plan, client)?;
        }
        drop(result_sender);

        let mut report = ContentionReport::default();
        let mut finished = 0;
        while let Some(result) = result_receiver.next().await {
            finished += 1;
            for (path, outcome) in result.context(ClientFailedSnafu)? {
                match outcome {
                    MutationOutcome::Applied(_) => report.created.push(path),
                    MutationOutcome::Rejected(rejection) => report.rejected.push((path, rejection)),
                }
            }
        }
        if finished != plan.clients {
            return Err(ContentionError::ClientsLost {
                expected: plan.clients,
                finished,
            });
        }

        let listing = store
            .list_directory(&plan.directory)
            .await
            .context(PrepareSnafu)?;
        report.unlisted = report
            .created
            .iter()
            .filter(|path| {
                let (_, name) = split_parent_and_name(path);
                !listing.iter().any(|listed| listed == name)
            })
            .cloned()
            .collect();

        info!(
            "{} clients finished: {} created, {} rejected, {} unlisted",
            finished,
            report.created.len(),
            report.rejected.len(),
            report.unlisted.len()
        );
        Ok(report)
    }

    /// Dispatch one client to the pool and forward its result to the receiver
    fn dispatch_client(
        &self,
        result_sender: UnboundedSender<ClientResult>,
        plan: &ContentionPlan,
        client: usize,
    ) -> Result<(), ContentionError> {
        let store = self.store();
        let paths: Vec<String> = (0..plan.files_per_client)
            .map(|index| plan.file_path(client, index))
            .collect();

        let receiver = self
            .dispatcher
            .dispatch(move || async move { run_client(store, paths).await })
            .map_err(|e| ContentionError::DispatchError {
                client,
                error: e.to_string(),
            })?;

        debug!("Dispatched client {}", client);

        spawn(async move {
            let result = match receiver.await {
                Ok(inner) => inner,
                Err(e) => {
                    debug!("Client {} was canceled: {}", client, e);
                    Err(ClientError::Canceled { source: e })
                }
            };

            if let Err(send_err) = result_sender.unbounded_send(result) {
                debug!("Failed to send result of client {}: {}", client, send_err);
            }
        })
        .detach();

        Ok(())
    }
}

async fn run_client(
    store: MetadataStore<MemoryCache<Entry>, MemoryCache<Content>>,
    paths: Vec<String>,
) -> ClientResult {
    let mut outcomes = Vec::with_capacity(paths.len());
    for path in paths {
        let outcome = store.create_file(&path).await.context(StoreSnafu)?;
        if !outcome.is_success() {
            warn!("Client could not create {}: {}", path, outcome);
        }
        outcomes.push((path, outcome));
    }
    Ok(outcomes)
}

#[derive(Debug, Snafu)]
pub enum ClientError {
    #[snafu(display("Client failed to reach the store"))]
    StoreError { source: StoreError },
    #[snafu(display("Client got cancelled"))]
    Canceled {
        source: futures_channel::oneshot::Canceled,
    },
}

#[derive(Debug, Snafu)]
pub enum ContentionError {
    #[snafu(display("Failed to create the client worker pool"))]
    DispatcherError { source: std::io::Error },
    #[snafu(display("Failed to dispatch client {}: {}", client, error))]
    DispatchError { client: usize, error: String },
    #[snafu(display("Failed to prepare or inspect the contended directory"))]
    PrepareError { source: StoreError },
    #[snafu(display("Directory '{}' cannot be used: {}", directory, rejection))]
    DirectoryUnavailable {
        directory: String,
        rejection: Rejection,
    },
    #[snafu(display("A client failed"))]
    ClientFailed { source: ClientError },
    #[snafu(display("Only {} of {} clients reported back", finished, expected))]
    ClientsLost { expected: usize, finished: usize },
}
