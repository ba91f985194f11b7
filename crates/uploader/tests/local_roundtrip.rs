//! End-to-end uploads into a storage directory through `LocalTransport`.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chunkup_protocol::{AdditionalFormData, ChunkEnvelope};
use chunkup_uploader::{
    LocalTransport, ProgressFn, UploadError, UploadFile, UploadOrchestrator, UploadResponse,
    UploadTransport, UploaderConfig,
};
use serde_json::json;
use tempfile::TempDir;

/// Event observed by the recording transport.
#[derive(Debug, Clone, PartialEq)]
enum Event {
    Request { file: String, sequence: Option<u32> },
    Response { file: String, terminal: bool },
}

/// Wraps `LocalTransport` and logs every request and response in order.
struct RecordingTransport {
    inner: LocalTransport,
    events: Mutex<Vec<Event>>,
}

impl RecordingTransport {
    fn new(root: &std::path::Path) -> Self {
        Self {
            inner: LocalTransport::new(root),
            events: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl UploadTransport for RecordingTransport {
    fn send<'a>(
        &'a self,
        envelope: ChunkEnvelope,
        on_progress: ProgressFn<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<UploadResponse, UploadError>> + Send + 'a>> {
        Box::pin(async move {
            let file = envelope.file_data.name.clone();
            self.events.lock().unwrap().push(Event::Request {
                file: file.clone(),
                sequence: envelope.chunk.map(|c| c.sequence),
            });
            let response = self.inner.send(envelope, on_progress).await?;
            let terminal = response.receipt().is_some_and(|r| r.is_terminal());
            self.events
                .lock()
                .unwrap()
                .push(Event::Response { file, terminal });
            Ok(response)
        })
    }
}

fn chunked_config(chunk_size: i64) -> UploaderConfig {
    let mut config = UploaderConfig::new("http://localhost/upload");
    config.use_chunks = true;
    config.chunk_size = chunk_size;
    config
}

fn patterned(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[tokio::test]
async fn chunked_file_is_reassembled() {
    let storage = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let data = patterned(10_000, 7);
    let path = source.path().join("video.mp4");
    std::fs::write(&path, &data).unwrap();

    let transport = Arc::new(LocalTransport::new(storage.path()));
    let orch = UploadOrchestrator::new(chunked_config(1024), transport).unwrap();

    let results = orch
        .upload(vec![UploadFile::from_path(&path)], None)
        .unwrap()
        .collect()
        .await;

    let receipt = results[0].as_ref().unwrap().receipt().unwrap();
    assert!(receipt.is_terminal());
    assert_eq!(receipt.chunk_data().unwrap().total_chunks, 10);
    assert_eq!(receipt.fields["fileData"]["type"], "video/mp4");
    assert_eq!(std::fs::read(storage.path().join("video.mp4")).unwrap(), data);
}

#[tokio::test]
async fn stale_destination_is_replaced() {
    let storage = TempDir::new().unwrap();
    std::fs::write(
        storage.path().join("a.bin"),
        patterned(50_000, 1),
    )
    .unwrap();

    let data = patterned(3000, 2);
    let transport = Arc::new(LocalTransport::new(storage.path()));
    let orch = UploadOrchestrator::new(chunked_config(1024), transport).unwrap();
    let results = orch
        .upload(vec![UploadFile::from_bytes("a.bin", data.clone())], None)
        .unwrap()
        .collect()
        .await;

    assert!(results[0].is_ok());
    assert_eq!(std::fs::read(storage.path().join("a.bin")).unwrap(), data);
}

#[tokio::test]
async fn unchunked_upload_overwrites() {
    let storage = TempDir::new().unwrap();
    std::fs::write(storage.path().join("notes.txt"), b"old and longer").unwrap();

    let transport = Arc::new(LocalTransport::new(storage.path()));
    let orch =
        UploadOrchestrator::new(UploaderConfig::new("http://localhost/upload"), transport).unwrap();
    let mut handle = orch
        .upload(vec![UploadFile::from_bytes("notes.txt", b"new".to_vec())], None)
        .unwrap();
    let mut progress = handle.take_progress().unwrap();
    let results = handle.collect().await;

    let receipt = results[0].as_ref().unwrap().receipt().unwrap();
    assert!(receipt.chunk_data().is_none());
    assert_eq!(std::fs::read(storage.path().join("notes.txt")).unwrap(), b"new");

    let mut last = None;
    while let Some(p) = progress.recv().await {
        last = Some(p.progress);
    }
    assert_eq!(last, Some(100));
}

#[tokio::test]
async fn batch_files_are_strictly_sequential() {
    let storage = TempDir::new().unwrap();
    let transport = Arc::new(RecordingTransport::new(storage.path()));
    let orch = UploadOrchestrator::new(
        chunked_config(1024),
        Arc::clone(&transport) as Arc<dyn UploadTransport>,
    )
    .unwrap();

    let files = vec![
        UploadFile::from_bytes("one.bin", patterned(2500, 1)),
        UploadFile::from_bytes("two.bin", patterned(0, 2)),
        UploadFile::from_bytes("three.bin", patterned(1024, 3)),
    ];
    let mut handle = orch
        .upload(files, Some(AdditionalFormData::new("batch", json!({"id": 9}))))
        .unwrap();
    let mut progress = handle.take_progress().unwrap();
    let results = handle.collect().await;
    assert_eq!(results.len(), 3);

    // Every request comes after the previous response, and a file starts
    // only after the previous file's terminal response.
    let events = transport.events();
    let mut finished: Vec<String> = Vec::new();
    let mut awaiting_response = false;
    for event in &events {
        match event {
            Event::Request { file, .. } => {
                assert!(!awaiting_response, "request issued while another was in flight");
                assert!(!finished.contains(file), "request for finished file {file}");
                awaiting_response = true;
            }
            Event::Response { file, terminal } => {
                awaiting_response = false;
                if *terminal {
                    finished.push(file.clone());
                }
            }
        }
    }
    assert_eq!(finished, vec!["one.bin", "two.bin", "three.bin"]);

    for (i, result) in results.iter().enumerate() {
        let response = result.as_ref().unwrap();
        assert_eq!(response.file_index, Some(i));
        assert_eq!(response.receipt().unwrap().fields["batch"], json!({"id": 9}));
    }
    assert_eq!(
        std::fs::read(storage.path().join("one.bin")).unwrap(),
        patterned(2500, 1)
    );
    assert!(
        std::fs::read(storage.path().join("two.bin"))
            .unwrap()
            .is_empty()
    );

    let mut last_per_file = [0u8; 3];
    while let Some(p) = progress.recv().await {
        let index = p.file_index.unwrap();
        assert!(p.progress >= last_per_file[index]);
        last_per_file[index] = p.progress;
    }
    assert_eq!(last_per_file, [100, 100, 100]);
}

#[tokio::test]
async fn rejected_name_fails_only_that_file() {
    let storage = TempDir::new().unwrap();
    let transport = Arc::new(LocalTransport::new(storage.path()));
    let orch = UploadOrchestrator::new(chunked_config(1024), transport).unwrap();

    let files = vec![
        UploadFile::from_bytes("ok.bin", b"fine".to_vec()),
        UploadFile::from_bytes("../escape.bin", b"nope".to_vec()),
    ];
    let results = orch.upload(files, None).unwrap().collect().await;

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(UploadError::Transfer(_))));
    assert_eq!(std::fs::read(storage.path().join("ok.bin")).unwrap(), b"fine");
    assert!(!storage.path().parent().unwrap().join("escape.bin").exists());
}

#[tokio::test]
async fn checksum_travels_in_receipt() {
    let storage = TempDir::new().unwrap();
    let mut config = chunked_config(1024);
    config.add_checksum = true;
    let transport = Arc::new(LocalTransport::new(storage.path()));
    let orch = UploadOrchestrator::new(config, transport).unwrap();

    let results = orch
        .upload(vec![UploadFile::from_bytes("abc.txt", b"abc".to_vec())], None)
        .unwrap()
        .collect()
        .await;

    let receipt = results[0].as_ref().unwrap().receipt().unwrap();
    assert_eq!(
        receipt.fields["fileData"]["sha256Checksum"],
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
