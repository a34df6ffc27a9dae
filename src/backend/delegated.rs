//! Delegated backend: a pool of background workers fed by correlated messages.
//!
//! Each collection is bound to one worker when first registered. Requests for
//! it are queued on that worker's channel in call order, and a per-worker
//! dispatcher task hands every response to the caller waiting on its request id.
//! When a worker stops, every request still waiting on it fails with
//! `WorkerUnavailable` and its collections are gone until re-registered.

use super::{SearchBackend, lock};
use crate::config::{DispatchPolicy, SearchConfig};
use crate::error::{Result, SearchError};
use crate::search::Registry;
use crate::types::{IndexResource, Record, RecordId};
use crate::worker::{
    RequestId, WorkerMessage, WorkerOp, WorkerReply, WorkerRequest, WorkerResponse, spawn_worker,
};
use ahash::AHashMap;
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

type Waiter = oneshot::Sender<Result<WorkerReply>>;

/// Requests awaiting a response from one worker.
#[derive(Debug)]
struct PendingTable {
    /// Cleared once the worker is stopping or gone; no new waiters after that
    alive: bool,
    waiters: AHashMap<RequestId, Waiter>,
}

/// The facade's handle on one worker.
struct WorkerSlot {
    id: usize,
    requests: mpsc::UnboundedSender<WorkerMessage>,
    pending: Arc<Mutex<PendingTable>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerSlot {
    fn is_alive(&self) -> bool {
        lock(&self.pending).alive
    }

    fn load(&self) -> usize {
        lock(&self.pending).waiters.len()
    }

    /// Stop accepting requests and ask the worker to exit after its queue.
    fn stop(&self) -> bool {
        let was_alive = std::mem::replace(&mut lock(&self.pending).alive, false);
        let _ = self.requests.send(WorkerMessage::Terminate);
        was_alive
    }
}

/// Routes responses from one worker to their waiting callers.
///
/// Runs until the worker drops its response channel, then fails everything
/// still pending with `WorkerUnavailable`.
async fn dispatch(
    worker: usize,
    mut responses: mpsc::UnboundedReceiver<WorkerResponse>,
    pending: Arc<Mutex<PendingTable>>,
) {
    while let Some(response) = responses.recv().await {
        let waiter = lock(&pending).waiters.remove(&response.request_id);
        match waiter {
            Some(waiter) => {
                // Receiver may have timed out and gone away
                let _ = waiter.send(response.outcome);
            }
            None => {
                tracing::trace!(
                    "Dropping response to abandoned request {} from worker {}",
                    response.request_id,
                    worker
                );
            }
        }
    }

    let orphaned = {
        let mut table = lock(&pending);
        table.alive = false;
        std::mem::take(&mut table.waiters)
    };

    if orphaned.is_empty() {
        tracing::debug!("Dispatcher for search worker {} finished", worker);
    } else {
        tracing::error!(
            "Search worker {} stopped with {} pending requests",
            worker,
            orphaned.len()
        );
    }

    for (_, waiter) in orphaned {
        let _ = waiter.send(Err(SearchError::WorkerUnavailable { worker }));
    }
}

/// Offloads indexing and search to a pool of worker threads.
///
/// Must be created inside a Tokio runtime; the dispatchers are Tokio tasks.
pub struct DelegatedBackend {
    workers: Vec<WorkerSlot>,
    /// Collection name to owning worker
    routes: Mutex<AHashMap<String, usize>>,
    next_request: AtomicU64,
    next_worker: AtomicUsize,
    policy: DispatchPolicy,
    timeout: Duration,
}

impl fmt::Debug for DelegatedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedBackend")
            .field("workers", &self.workers.len())
            .field("live_workers", &self.live_workers())
            .field("collections", &lock(&self.routes).len())
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DelegatedBackend {
    /// Start `config.workers` workers and their dispatchers.
    pub fn spawn(config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            SearchError::config(format!("delegated backend requires a Tokio runtime: {}", e))
        })?;

        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let registry = Registry::new(config)?;
            let (request_tx, request_rx) = mpsc::unbounded_channel();
            let (response_tx, response_rx) = mpsc::unbounded_channel();
            let pending = Arc::new(Mutex::new(PendingTable {
                alive: true,
                waiters: AHashMap::new(),
            }));

            let thread = spawn_worker(id, registry, request_rx, response_tx)?;
            runtime.spawn(dispatch(id, response_rx, Arc::clone(&pending)));

            workers.push(WorkerSlot {
                id,
                requests: request_tx,
                pending,
                thread: Mutex::new(Some(thread)),
            });
        }

        tracing::info!(
            "Started {} search workers ({:?} dispatch, {:?} timeout)",
            workers.len(),
            config.dispatch,
            config.request_timeout()
        );

        Ok(Self {
            workers,
            routes: Mutex::new(AHashMap::new()),
            next_request: AtomicU64::new(1),
            next_worker: AtomicUsize::new(0),
            policy: config.dispatch,
            timeout: config.request_timeout(),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of workers still accepting requests.
    pub fn live_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.is_alive()).count()
    }

    /// The worker a collection is bound to, if registered.
    pub fn worker_for(&self, collection: &str) -> Option<usize> {
        lock(&self.routes).get(collection).copied()
    }

    /// Stop one worker.
    ///
    /// Requests queued ahead of the stop are still answered; later ones fail
    /// with `WorkerUnavailable`. The worker's collections are lost. Returns
    /// `false` if the worker does not exist or was already stopped.
    pub fn terminate_worker(&self, worker: usize) -> bool {
        let Some(slot) = self.workers.get(worker) else {
            return false;
        };
        let stopped = slot.stop();
        if stopped {
            tracing::info!("Terminating search worker {}", worker);
        }
        stopped
    }

    /// Picks a live worker for a new collection according to the policy.
    fn pick_worker(&self) -> Result<usize> {
        let count = self.workers.len();
        let start = self.next_worker.fetch_add(1, Ordering::Relaxed);

        // Round-robin order starting at the cursor, live workers only
        let mut candidates = (0..count)
            .map(|offset| (start + offset) % count)
            .filter(|&i| self.workers[i].is_alive());

        let chosen = match self.policy {
            DispatchPolicy::RoundRobin => candidates.next(),
            // min_by_key keeps the first minimum, so ties stay round-robin
            DispatchPolicy::LeastBusy => candidates.min_by_key(|&i| self.workers[i].load()),
        };

        chosen.ok_or(SearchError::WorkerUnavailable {
            worker: start % count.max(1),
        })
    }

    /// Worker owning an already registered collection.
    fn route(&self, collection: &str) -> Result<usize> {
        self.worker_for(collection)
            .ok_or_else(|| SearchError::unknown_collection(collection))
    }

    /// Worker for an indexing call: the bound worker if it is alive, otherwise
    /// a freshly picked one (first registration or re-registration).
    fn route_or_assign(&self, collection: &str) -> Result<usize> {
        let mut routes = lock(&self.routes);
        if let Some(&worker) = routes.get(collection) {
            if self.workers[worker].is_alive() {
                return Ok(worker);
            }
            tracing::warn!(
                "Collection '{}' lost with worker {}, re-registering",
                collection,
                worker
            );
        }

        let worker = self.pick_worker()?;
        routes.insert(collection.to_string(), worker);
        tracing::debug!("Collection '{}' bound to worker {}", collection, worker);
        Ok(worker)
    }

    /// Enqueues a request and registers its waiter.
    fn submit(
        &self,
        worker: usize,
        collection: &str,
        op: WorkerOp,
    ) -> Result<(RequestId, oneshot::Receiver<Result<WorkerReply>>)> {
        let slot = &self.workers[worker];
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut table = lock(&slot.pending);
            if !table.alive {
                return Err(SearchError::WorkerUnavailable { worker });
            }
            table.waiters.insert(request_id, tx);
        }

        let message = WorkerMessage::Request(WorkerRequest {
            request_id,
            collection: collection.to_string(),
            op,
        });
        if slot.requests.send(message).is_err() {
            lock(&slot.pending).waiters.remove(&request_id);
            return Err(SearchError::WorkerUnavailable { worker });
        }

        Ok((request_id, rx))
    }

    /// Submits now and returns a future bounded by the request timeout.
    fn request(
        &self,
        worker: usize,
        collection: &str,
        op: WorkerOp,
    ) -> BoxFuture<'static, Result<WorkerReply>> {
        let (request_id, rx) = match self.submit(worker, collection, op) {
            Ok(submitted) => submitted,
            Err(e) => return future::ready(Err(e)).boxed(),
        };

        let timeout = self.timeout;
        let pending = Arc::clone(&self.workers[worker].pending);

        async move {
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(outcome)) => outcome,
                // Waiter dropped without an answer
                Ok(Err(_)) => Err(SearchError::WorkerUnavailable { worker }),
                Err(_) => {
                    lock(&pending).waiters.remove(&request_id);
                    tracing::warn!(
                        "Request {} to worker {} timed out after {:?}",
                        request_id,
                        worker,
                        timeout
                    );
                    Err(SearchError::Timeout {
                        request_id,
                        after: timeout,
                    })
                }
            }
        }
        .boxed()
    }

    fn request_done(
        &self,
        worker: Result<usize>,
        collection: &str,
        op: WorkerOp,
    ) -> BoxFuture<'static, Result<()>> {
        match worker {
            Ok(worker) => self
                .request(worker, collection, op)
                .map(|reply| reply.map(|_| ()))
                .boxed(),
            Err(e) => future::ready(Err(e)).boxed(),
        }
    }
}

impl SearchBackend for DelegatedBackend {
    fn index_resource(&self, request: IndexResource) -> BoxFuture<'_, Result<()>> {
        let collection = request.resource_name.clone();
        let worker = self.route_or_assign(&collection);
        self.request_done(worker, &collection, WorkerOp::Index(request))
    }

    fn index_record(&self, collection: &str, record: Record) -> BoxFuture<'_, Result<()>> {
        self.request_done(self.route(collection), collection, WorkerOp::IndexRecord(record))
    }

    fn perform_search(
        &self,
        collection: &str,
        query: &str,
    ) -> BoxFuture<'_, Result<Vec<RecordId>>> {
        let worker = match self.route(collection) {
            Ok(worker) => worker,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        let op = WorkerOp::Search {
            query: query.to_string(),
        };

        self.request(worker, collection, op)
            .map(|reply| -> Result<Vec<RecordId>> {
                match reply? {
                    WorkerReply::Ids(ids) => Ok(ids),
                    WorkerReply::Done => Ok(Vec::new()),
                }
            })
            .boxed()
    }

    fn remove_resource(&self, collection: &str, id: RecordId) -> BoxFuture<'_, Result<()>> {
        self.request_done(self.route(collection), collection, WorkerOp::Remove { id })
    }

    fn remove_collection(&self, collection: &str) -> BoxFuture<'_, Result<()>> {
        let worker = lock(&self.routes)
            .remove(collection)
            .ok_or_else(|| SearchError::unknown_collection(collection));
        self.request_done(worker, collection, WorkerOp::RemoveCollection)
    }

    fn terminate(&self) -> BoxFuture<'_, ()> {
        lock(&self.routes).clear();
        let mut handles = Vec::new();
        for slot in &self.workers {
            slot.stop();
            if let Some(handle) = lock(&slot.thread).take() {
                handles.push((slot.id, handle));
            }
        }
        tracing::info!("Terminating {} search workers", handles.len());

        async move {
            // Joining blocks; keep it off the async workers
            let joined = tokio::task::spawn_blocking(move || {
                for (id, handle) in handles {
                    if handle.join().is_err() {
                        tracing::error!("Search worker {} panicked", id);
                    }
                }
            })
            .await;
            if let Err(e) = joined {
                tracing::error!("Failed to join search workers: {}", e);
            }
        }
        .boxed()
    }
}

impl Drop for DelegatedBackend {
    fn drop(&mut self) {
        for slot in &self.workers {
            slot.stop();
        }
        tracing::trace!("DelegatedBackend dropped, stopped {} workers", self.workers.len());
    }
}
