//! Background search worker and its message schema.
//!
//! A worker is a dedicated thread owning a [`Registry`] replica for the
//! collections routed to it. It consumes request messages strictly in arrival
//! order and answers each one with a response carrying the same request id.
//! No index state ever crosses the channel boundary; only requests, ids and
//! errors do.

use crate::error::{Result, SearchError};
use crate::search::Registry;
use crate::types::{IndexResource, Record, RecordId};
use tokio::sync::mpsc;

/// Correlates a response with the request that produced it.
pub type RequestId = u64;

/// Operation carried by a request message.
#[derive(Debug)]
pub enum WorkerOp {
    /// Register (on first use) and index a batch of records.
    Index(IndexResource),
    /// Index one record with the collection's bound descriptor.
    IndexRecord(Record),
    Search { query: String },
    Remove { id: RecordId },
    RemoveCollection,
}

/// A request addressed to one collection.
#[derive(Debug)]
pub struct WorkerRequest {
    pub request_id: RequestId,
    pub collection: String,
    pub op: WorkerOp,
}

/// Messages a worker accepts.
#[derive(Debug)]
pub enum WorkerMessage {
    Request(WorkerRequest),
    /// Stop after the messages already queued ahead of this one.
    Terminate,
}

/// Successful result of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerReply {
    Done,
    Ids(Vec<RecordId>),
}

/// Answer to a [`WorkerRequest`].
#[derive(Debug)]
pub struct WorkerResponse {
    pub request_id: RequestId,
    pub outcome: Result<WorkerReply>,
}

/// A sequential execution context owning one registry.
#[derive(Debug)]
pub struct SearchWorker {
    id: usize,
    registry: Registry,
}

impl SearchWorker {
    /// Create a new worker with an empty registry.
    pub fn new(id: usize, registry: Registry) -> Self {
        Self { id, registry }
    }

    /// Applies one request to the registry.
    pub fn handle(&mut self, request: WorkerRequest) -> WorkerResponse {
        let WorkerRequest {
            request_id,
            collection,
            op,
        } = request;

        tracing::trace!(
            "Worker {} handling request {} for '{}'",
            self.id,
            request_id,
            collection
        );

        let outcome = match op {
            WorkerOp::Index(request) => self
                .registry
                .index_resource(request)
                .map(|()| WorkerReply::Done),
            WorkerOp::IndexRecord(record) => self
                .registry
                .index_record(&collection, record)
                .map(|()| WorkerReply::Done),
            WorkerOp::Search { query } => self
                .registry
                .search(&collection, &query)
                .map(WorkerReply::Ids),
            WorkerOp::Remove { id } => self
                .registry
                .remove_record(&collection, &id)
                .map(|_| WorkerReply::Done),
            WorkerOp::RemoveCollection => self
                .registry
                .remove_collection(&collection)
                .map(|()| WorkerReply::Done),
        };

        WorkerResponse {
            request_id,
            outcome,
        }
    }

    /// Runs the worker loop until terminated or until either channel closes.
    ///
    /// Blocks the calling thread; run it on a dedicated thread.
    pub fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<WorkerMessage>,
        responses: mpsc::UnboundedSender<WorkerResponse>,
    ) {
        tracing::debug!("Search worker {} started", self.id);

        while let Some(message) = requests.blocking_recv() {
            let request = match message {
                WorkerMessage::Request(request) => request,
                WorkerMessage::Terminate => {
                    tracing::debug!("Search worker {} received terminate", self.id);
                    break;
                }
            };

            let response = self.handle(request);
            if responses.send(response).is_err() {
                tracing::warn!("Search worker {} lost its dispatcher, stopping", self.id);
                break;
            }
        }

        tracing::info!(
            "Search worker {} stopped ({} collections dropped)",
            self.id,
            self.registry.len()
        );
    }
}

/// Spawn a worker on a dedicated, named OS thread.
pub fn spawn_worker(
    id: usize,
    registry: Registry,
    requests: mpsc::UnboundedReceiver<WorkerMessage>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
) -> Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("search-worker-{}", id))
        .spawn(move || SearchWorker::new(id, registry).run(requests, responses))
        .map_err(|e| SearchError::config(format!("failed to spawn search worker {}: {}", id, e)))
}
