mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chunkup")]
#[command(about = "Chunked file uploads over multipart HTTP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload files to a server or into a local directory.
    Upload(UploadArgs),
    /// Print the chunk ranges planned for a file.
    Plan {
        #[arg(long, default_value_t = chunkup_transfer::DEFAULT_CHUNK_SIZE as i64, allow_hyphen_values = true)]
        chunk_size: i64,
        file: PathBuf,
    },
    /// Print the SHA-256 digest of each file.
    Checksum {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Apply one upload request to a storage directory.
    Receive(ReceiveArgs),
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Upload endpoint; overrides the config file.
    #[arg(long)]
    pub url: Option<String>,
    /// Write into this directory instead of posting over HTTP.
    #[arg(long, conflicts_with = "url")]
    pub dest_dir: Option<PathBuf>,
    /// Chunk size in bytes, a multiple of 1024.
    #[arg(long, allow_hyphen_values = true)]
    pub chunk_size: Option<i64>,
    /// Split files into chunks.
    #[arg(long)]
    pub chunks: bool,
    /// Send a SHA-256 digest of each file.
    #[arg(long)]
    pub checksum: bool,
    /// Extra form field sent with every request.
    #[arg(long, value_name = "NAME=VALUE")]
    pub field: Option<String>,
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    /// Storage root for received files.
    #[arg(long)]
    pub root: PathBuf,
    /// `fileData` field as sent by the client.
    #[arg(long)]
    pub file_data: String,
    /// `chunkData` field; omit for an unchunked request.
    #[arg(long)]
    pub chunk_data: Option<String>,
    /// Further form fields.
    #[arg(long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,
    /// File name of the binary part; defaults to the input's name.
    #[arg(long)]
    pub file_name: Option<String>,
    /// Bytes of the binary part.
    pub input: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chunkup=debug")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Upload(args) => commands::upload(args).await,
        Command::Plan { chunk_size, file } => commands::plan(chunk_size, &file).await,
        Command::Checksum { files } => commands::checksum(files).await,
        Command::Receive(args) => commands::receive(args).await,
    }
}
