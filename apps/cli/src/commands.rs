//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use chunkup_protocol::{
    AdditionalFormData, ChunkData, FIELD_CHUNK_DATA, FIELD_FILE_DATA, deserialize_field,
};
use chunkup_transfer::{ChunkReceiver, ChunkSize, IncomingUpload, file_checksum, plan_chunks};
use chunkup_uploader::{LocalTransport, UploadFile, UploadOrchestrator, UploaderConfig};
use tracing::{info, warn};

use crate::{ReceiveArgs, UploadArgs};

/// Builds the uploader configuration: the config file if given, then the
/// command-line overrides.
pub fn build_config(args: &UploadArgs) -> anyhow::Result<UploaderConfig> {
    let mut config = match (&args.config, &args.url, &args.dest_dir) {
        (Some(path), _, _) => UploaderConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        (None, Some(url), _) => UploaderConfig::new(url.clone()),
        (None, None, Some(dir)) => UploaderConfig::new(format!("file://{}", dir.display())),
        (None, None, None) => bail!("one of --config, --url or --dest-dir is required"),
    };

    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if args.chunks {
        config.use_chunks = true;
    }
    if args.checksum {
        config.add_checksum = true;
    }
    Ok(config)
}

/// Parses `NAME=VALUE`; the value is read as JSON when it parses, else as
/// a plain string.
pub fn parse_field(raw: &str) -> anyhow::Result<AdditionalFormData> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected NAME=VALUE, got {raw:?}");
    };
    if name.is_empty() {
        bail!("empty field name in {raw:?}");
    }
    Ok(AdditionalFormData::new(name, deserialize_field(value)))
}

pub async fn upload(args: UploadArgs) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    let additional = args.field.as_deref().map(parse_field).transpose()?;

    let orchestrator = match &args.dest_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            UploadOrchestrator::new(config, Arc::new(LocalTransport::new(dir)))?
        }
        None => UploadOrchestrator::http(config)?,
    };

    let files = UploadFile::collect_paths(args.files);
    let mut handle = orchestrator.upload(files, additional)?;

    if let Some(mut progress) = handle.take_progress() {
        tokio::spawn(async move {
            while let Some(p) = progress.recv().await {
                match p.file_index {
                    Some(index) => eprintln!("[{index}] {:>3}%", p.progress),
                    None => eprintln!("{:>3}%", p.progress),
                }
            }
        });
    }

    let mut failed = 0usize;
    while let Some(result) = handle.next_result().await {
        match result {
            Ok(response) => println!("{}", serde_json::to_string(&response)?),
            Err(e) => {
                warn!(error = %e, "upload did not complete");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} file(s) failed to upload");
    }
    Ok(())
}

/// Chunk metadata for every range of `path`.
pub async fn plan_file(chunk_size: i64, path: &Path) -> anyhow::Result<Vec<ChunkData>> {
    let chunk_size = ChunkSize::try_from(chunk_size)?;
    let size = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?
        .len();
    let ranges = plan_chunks(size, chunk_size);
    let chunks = ranges
        .iter()
        .enumerate()
        .map(|(i, range)| range.chunk_data(i, ranges.len()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(chunks)
}

pub async fn plan(chunk_size: i64, path: &Path) -> anyhow::Result<()> {
    for chunk in plan_file(chunk_size, path).await? {
        println!("{}", serde_json::to_string(&chunk)?);
    }
    Ok(())
}

pub async fn checksum(paths: Vec<std::path::PathBuf>) -> anyhow::Result<()> {
    for path in paths {
        let digest = file_checksum(path.clone())
            .await
            .with_context(|| format!("hashing {}", path.display()))?;
        println!("{digest}  {}", path.display());
    }
    Ok(())
}

/// Builds the request that `receive` applies.
pub async fn incoming_from_args(args: &ReceiveArgs) -> anyhow::Result<IncomingUpload> {
    let mut fields = vec![(FIELD_FILE_DATA.to_string(), args.file_data.clone())];
    for raw in &args.fields {
        let Some((name, value)) = raw.split_once('=') else {
            bail!("expected NAME=VALUE, got {raw:?}");
        };
        fields.push((name.to_string(), value.to_string()));
    }
    if let Some(chunk) = &args.chunk_data {
        fields.push((FIELD_CHUNK_DATA.to_string(), chunk.clone()));
    }

    let file_name = args.file_name.clone().or_else(|| {
        args.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    });
    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;

    Ok(IncomingUpload {
        fields,
        file_name,
        bytes,
    })
}

pub async fn receive(args: ReceiveArgs) -> anyhow::Result<()> {
    let upload = incoming_from_args(&args).await?;
    let receiver = ChunkReceiver::new(&args.root);
    let outcome = receiver.receive(upload).await?;
    info!(
        path = %outcome.path.display(),
        strategy = ?outcome.strategy,
        bytes = outcome.bytes_written,
        terminal = outcome.terminal,
        "request applied"
    );
    println!("{}", serde_json::to_string(&outcome.receipt)?);
    Ok(())
}
