//! Admin CLI: push a local video into object storage through the upload
//! API, then print (or register) the resulting catalog URL.

use clap::Parser;
use filmroom::uploader::http::{HttpPartTransport, HttpUploadApi, LocalFileSource};
use filmroom::uploader::{FileSource, Progress, ProgressSink, UploadRequest, Uploader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload a video through the FilmRoom admin API", long_about = None)]
struct Args {
    /// Local file to upload
    file: PathBuf,

    /// API base URL
    #[arg(long, default_value = "http://localhost:5001/api")]
    api_url: String,

    /// Admin bearer token
    #[arg(long, env = "FILMROOM_TOKEN")]
    token: String,

    /// Destination folder prefix
    #[arg(long)]
    folder: Option<String>,

    /// Content type of the file
    #[arg(long, default_value = "video/mp4")]
    content_type: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upload_video=info,filmroom=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let file_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("file has no usable name"))?
        .to_string();

    let source = LocalFileSource::open(&args.file).await?;
    info!("📦 {} ({} bytes)", file_name, source.len());

    let api = Arc::new(HttpUploadApi::new(args.api_url, args.token));
    let transport = Arc::new(HttpPartTransport::new());
    let uploader = Uploader::new(api, transport);

    let request = UploadRequest {
        file_name,
        content_type: args.content_type,
        folder: args.folder,
    };

    let progress: ProgressSink = Box::new(|p: Progress| {
        let percent = if p.total_bytes == 0 {
            100.0
        } else {
            p.bytes_transferred as f64 * 100.0 / p.total_bytes as f64
        };
        info!(
            "⬆️  part {} done: {}/{} bytes ({:.1}%)",
            p.part_number, p.bytes_transferred, p.total_bytes, percent
        );
    });

    let uploaded = uploader.upload(&source, &request, Some(progress)).await?;

    info!("✅ Upload complete");
    println!("key: {}", uploaded.key);
    println!("url: {}", uploaded.file_url);

    Ok(())
}
