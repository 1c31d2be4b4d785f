use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rustydocs::{
    config, logging,
    processing::DocumentProcessor,
    vector_store::{SearchFilter, VectorStoreClient},
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "rustydocs",
    about = "Extract, chunk, embed, and search documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a file and store its chunks.
    Ingest {
        path: PathBuf,
        /// Declared file type; defaults to the file extension.
        #[arg(long)]
        file_type: Option<String>,
    },
    /// Search stored chunks by similarity to a query.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Only return chunks cut from this parent document.
        #[arg(long)]
        document_id: Option<String>,
    },
    /// Show a stored chunk.
    Get { id: String },
    /// Delete stored chunks by id.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Create the configured index.
    CreateIndex,
    /// Delete the configured index and everything in it.
    DeleteIndex,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::try_init_config().context("failed to load configuration")?;
    logging::init_tracing();

    match cli.command {
        Command::Ingest { path, file_type } => {
            let file_type = match file_type {
                Some(value) => value,
                None => extension_of(&path)?,
            };
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let mut file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;

            let processor = DocumentProcessor::from_config(config).await?;
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received; finishing the current chunk");
                    on_interrupt.cancel();
                }
            });

            let document = processor
                .process_with_cancellation(&mut file, &file_name, &file_type, &cancel)
                .await
                .with_context(|| format!("failed to process {}", path.display()))?;
            print_json(&document)?;
            print_json(&processor.metrics_snapshot())?;
        }
        Command::Search {
            query,
            top_k,
            document_id,
        } => {
            let processor = DocumentProcessor::from_config(config).await?;
            let filter = document_id.map(|id| {
                SearchFilter::new()
                    .with_metadata(rustydocs::document::metadata_keys::ORIGINAL_DOCUMENT_ID, id)
            });
            let results = processor.search(&query, top_k, filter.as_ref()).await?;
            print_json(&results)?;
        }
        Command::Get { id } => {
            let store = VectorStoreClient::from_config(config)?;
            match store.get_document(&id).await {
                Some(record) => print_json(&serde_json::json!({
                    "id": record.id,
                    "content": record.content,
                    "metadata": record.metadata,
                    "dimensions": record.vector.len(),
                }))?,
                None => bail!("document {id} not found"),
            }
        }
        Command::Delete { ids } => {
            let store = VectorStoreClient::from_config(config)?;
            if !store.delete_documents(&ids).await {
                bail!("failed to delete every requested document");
            }
            println!("deleted {} document(s)", ids.len());
        }
        Command::CreateIndex => {
            let store = VectorStoreClient::from_config(config)?;
            if !store.create_index().await {
                bail!("failed to create index {}", store.index_name());
            }
            println!("index {} ready", store.index_name());
        }
        Command::DeleteIndex => {
            let store = VectorStoreClient::from_config(config)?;
            if !store.delete_index().await {
                bail!("failed to delete index {}", store.index_name());
            }
            println!("index {} deleted", store.index_name());
        }
    }

    Ok(())
}

fn extension_of(path: &Path) -> Result<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .with_context(|| {
            format!(
                "cannot infer file type of {}; pass --file-type",
                path.display()
            )
        })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
