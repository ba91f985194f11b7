//! Upload orchestrator: sequential chunk dispatch for a batch of files.
//!
//! Files are uploaded one after another and the chunks of a file one after
//! another; a request is only issued once the previous response has been
//! received. Progress and per-file results are delivered over channels
//! taken from the returned [`UploadHandle`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chunkup_protocol::{
    AdditionalFormData, ChunkEnvelope, ChunkSequence, ProgressData, ProtocolError, RESERVED_FIELDS,
};
use chunkup_transfer::{ChunkCompletion, ChunkRange, ChunkSize, ProgressAggregator, plan_chunks};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::http::HttpTransport;
use crate::source::UploadFile;
use crate::transport::UploadTransport;
use crate::types::UploadResponse;

/// Result stream item: one per file, or the error that ended the batch.
pub type UploadResult = Result<UploadResponse, UploadError>;

/// Uploads batches of files through an [`UploadTransport`].
pub struct UploadOrchestrator {
    config: UploaderConfig,
    chunk_size: ChunkSize,
    transport: Arc<dyn UploadTransport>,
}

impl UploadOrchestrator {
    /// Validates `config` and binds it to `transport`.
    pub fn new(
        config: UploaderConfig,
        transport: Arc<dyn UploadTransport>,
    ) -> Result<Self, UploadError> {
        let chunk_size = config.validate()?;
        info!(
            url = %config.url,
            chunk_size = chunk_size.get(),
            use_chunks = config.use_chunks,
            add_checksum = config.add_checksum,
            "uploader configured"
        );
        Ok(Self {
            config,
            chunk_size,
            transport,
        })
    }

    /// Orchestrator posting to `config.url` over HTTP.
    pub fn http(config: UploaderConfig) -> Result<Self, UploadError> {
        let transport = HttpTransport::new(&config)?;
        Self::new(config, Arc::new(transport))
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Starts uploading `files` in order on a background task.
    ///
    /// `additional` is attached to every request when its data is a string
    /// or an object. Must be called from within a Tokio runtime.
    pub fn upload(
        &self,
        files: Vec<UploadFile>,
        additional: Option<AdditionalFormData>,
    ) -> Result<UploadHandle, UploadError> {
        if files.is_empty() {
            return Err(UploadError::Validation("no files supplied".into()));
        }
        if let Some(extra) = &additional {
            if RESERVED_FIELDS.contains(&extra.field_name.as_str()) {
                return Err(ProtocolError::ReservedField(extra.field_name.clone()).into());
            }
            if !extra.is_sendable() {
                debug!(field = %extra.field_name, "additional data is neither string nor object, not sent");
            }
        }

        // At most one result per file, so the session never waits on a
        // caller that drains progress first.
        let (results_tx, results_rx) = mpsc::channel(files.len());
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let session = UploadSession {
            transport: Arc::clone(&self.transport),
            chunk_size: self.chunk_size,
            use_chunks: self.config.use_chunks,
            add_checksum: self.config.add_checksum,
            additional,
            cancel: cancel.clone(),
            results_tx,
            progress: ProgressSink::new(files.len(), progress_tx),
        };
        tokio::spawn(session.run(files));

        Ok(UploadHandle {
            results: results_rx,
            progress: Some(progress_rx),
            cancel,
        })
    }
}

/// Caller side of a running upload.
///
/// Dropping the handle stops the upload before its next request.
pub struct UploadHandle {
    results: mpsc::Receiver<UploadResult>,
    progress: Option<mpsc::UnboundedReceiver<ProgressData>>,
    cancel: CancellationToken,
}

impl UploadHandle {
    /// Takes the progress receiver. Can only be called once.
    pub fn take_progress(&mut self) -> Option<mpsc::UnboundedReceiver<ProgressData>> {
        self.progress.take()
    }

    /// Waits for the next file result. `None` once the batch has ended.
    pub async fn next_result(&mut self) -> Option<UploadResult> {
        self.results.recv().await
    }

    /// Drains every remaining result.
    pub async fn collect(mut self) -> Vec<UploadResult> {
        let mut out = Vec::new();
        while let Some(result) = self.results.recv().await {
            out.push(result);
        }
        out
    }

    /// Stops the upload before its next request. A request already in
    /// flight is not aborted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Publishes aggregated progress for one batch.
///
/// The sender is dropped once every file has completed, which ends the
/// caller's progress stream.
struct ProgressSink {
    state: Mutex<SinkState>,
}

struct SinkState {
    aggregator: ProgressAggregator,
    tx: Option<mpsc::UnboundedSender<ProgressData>>,
}

impl SinkState {
    fn publish(&self, event: Option<ProgressData>) {
        if let (Some(event), Some(tx)) = (event, &self.tx) {
            let _ = tx.send(event);
        }
    }
}

impl ProgressSink {
    fn new(file_count: usize, tx: mpsc::UnboundedSender<ProgressData>) -> Self {
        Self {
            state: Mutex::new(SinkState {
                aggregator: ProgressAggregator::new(file_count),
                tx: Some(tx),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, file_index: usize, sequence: Option<ChunkSequence>) {
        self.lock().aggregator.begin_chunk(file_index, sequence);
    }

    fn tick(&self, file_index: usize, bytes_sent: u64, bytes_total: u64) {
        let mut state = self.lock();
        let event = state.aggregator.record(file_index, bytes_sent, bytes_total);
        state.publish(event);
    }

    fn complete(&self, file_index: usize) -> ChunkCompletion {
        let mut state = self.lock();
        let completion = state.aggregator.complete_chunk(file_index);
        state.publish(completion.progress);
        if completion.batch_complete {
            state.tx = None;
        }
        completion
    }
}

/// State of one `upload` call, owned by its background task.
struct UploadSession {
    transport: Arc<dyn UploadTransport>,
    chunk_size: ChunkSize,
    use_chunks: bool,
    add_checksum: bool,
    additional: Option<AdditionalFormData>,
    cancel: CancellationToken,
    results_tx: mpsc::Sender<UploadResult>,
    progress: ProgressSink,
}

impl UploadSession {
    async fn run(self, files: Vec<UploadFile>) {
        let file_count = files.len();
        info!(files = file_count, chunked = self.use_chunks, "upload batch started");

        for (index, file) in files.iter().enumerate() {
            match self.upload_file(index, file_count, file).await {
                Ok(response) => {
                    if self.results_tx.send(Ok(response)).await.is_err() {
                        debug!("result receiver dropped, stopping upload");
                        return;
                    }
                }
                Err(UploadError::Cancelled) => {
                    info!(file = %file.name(), index, "upload cancelled");
                    let _ = self.results_tx.send(Err(UploadError::Cancelled)).await;
                    return;
                }
                Err(e) => {
                    error!(file = %file.name(), index, error = %e, "upload failed");
                    let _ = self.results_tx.send(Err(e)).await;
                    return;
                }
            }
        }

        info!(files = file_count, "upload batch finished");
    }

    /// Sends every chunk of one file and returns the final response.
    async fn upload_file(
        &self,
        index: usize,
        file_count: usize,
        file: &UploadFile,
    ) -> Result<UploadResponse, UploadError> {
        self.check_cancelled()?;

        let file_data = file.describe(self.add_checksum).await?;
        let ranges = if self.use_chunks {
            plan_chunks(file_data.size, self.chunk_size)
        } else {
            vec![ChunkRange {
                start_byte: 0,
                end_byte: file_data.size,
            }]
        };
        let total_chunks = ranges.len();

        let mut last_response = None;
        for (i, range) in ranges.into_iter().enumerate() {
            self.check_cancelled()?;

            let chunk = if self.use_chunks {
                Some(range.chunk_data(i, total_chunks)?)
            } else {
                None
            };
            let envelope = ChunkEnvelope {
                bytes: file.read_range(range).await?,
                file_data: file_data.clone(),
                chunk,
                additional: self.additional.clone(),
            };

            self.progress.begin(index, chunk.map(|c| c.sequence()));
            debug!(
                file = %file_data.name,
                sequence = chunk.map(|c| c.sequence),
                total_chunks,
                start_byte = range.start_byte,
                end_byte = range.end_byte,
                "sending chunk"
            );

            let on_progress =
                |bytes_sent: u64, bytes_total: u64| self.progress.tick(index, bytes_sent, bytes_total);
            let response = self.transport.send(envelope, &on_progress).await?;

            let completion = self.progress.complete(index);
            debug!(
                file = %file_data.name,
                sequence = chunk.map(|c| c.sequence),
                status = response.status,
                "chunk acknowledged"
            );
            if completion.batch_complete {
                info!(files = file_count, "every file of the batch acknowledged");
            }
            last_response = Some(response);
        }

        let mut response = last_response
            .ok_or_else(|| UploadError::Validation(format!("no chunks planned for {}", file_data.name)))?;
        response.file_index = (file_count > 1).then_some(index);
        info!(file = %file_data.name, index, chunks = total_chunks, "file uploaded");
        Ok(response)
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() || self.results_tx.is_closed() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}
