//! Console support bot over a question/answer dataset.
//!
//! On first run every record of the `SQLite` dataset is embedded and inserted into an
//! approximate nearest neighbor index, which is saved next to the dataset. Later runs load
//! the saved index. The bot then introduces itself, reads one question and streams an answer
//! grounded in the closest records.
//!
//! # Usage
//!
//! ```bash
//! # Build (or load) dataset.vdb from dataset.db and answer one question from stdin
//! OPENAI_API_KEY=xxx cargo run -p qadex-cli
//!
//! # Spanish prompts, non-interactive question
//! cargo run -p qadex-cli -- --language es --question "¿Cómo cambio mi contraseña?"
//!
//! # Discard the saved index and build it again
//! cargo run -p qadex-cli -- --rebuild
//!
//! # Show retrieved identifiers and distances
//! RUST_LOG=qadex_rag=debug cargo run -p qadex-cli
//! ```

mod language;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use futures_core::Stream;
use futures_lite::{StreamExt, pin};
use qadex_core::EmbeddingModel;
use qadex_openai::{EMBEDDING_SMALL, GPT4O_MINI, OpenAI};
use qadex_rag::{
    BuildProgress, BuildStage, IndexBuilder, IndexConfig, RagConfig, Retriever,
    SqliteRecordStore, SupportSession,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::language::Language;

/// Environment variable holding the API key.
const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Answer support questions from a question/answer dataset.
#[derive(Parser, Debug)]
#[command(name = "qadex", version, about)]
struct Args {
    /// `SQLite` file holding the question/answer records.
    #[arg(short, long, default_value = "dataset.db")]
    database: PathBuf,

    /// Table holding the records.
    #[arg(long, default_value = qadex_rag::records::DEFAULT_TABLE)]
    table: String,

    /// Path of the vector index. Built from the database when missing.
    #[arg(short, long, default_value = "dataset.vdb")]
    index: PathBuf,

    /// Number of records handed to the model as context.
    #[arg(short = 'k', long, default_value_t = 10)]
    top_k: usize,

    /// Chat model.
    #[arg(short, long, default_value = GPT4O_MINI)]
    model: String,

    /// Embedding model. Must match the one the index was built with.
    #[arg(long, default_value = EMBEDDING_SMALL)]
    embedding_model: String,

    /// Custom API base URL (for OpenAI-compatible endpoints, proxies, etc.)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Prompt language (en, es).
    #[arg(short, long, default_value_t = Language::English)]
    language: Language,

    /// Delete the saved index and build it again.
    #[arg(long)]
    rebuild: bool,

    /// Seconds to wait for each embedding call or generated chunk.
    #[arg(long)]
    timeout: Option<u64>,

    /// Question to answer. Read from stdin when omitted.
    #[arg(short, long)]
    question: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let api_key =
        std::env::var(API_KEY_VAR).map_err(|_| anyhow!("Set {API_KEY_VAR} in your environment"))?;
    let mut client = OpenAI::builder(api_key)
        .model(&args.model)
        .embedding_model(&args.embedding_model);
    if let Some(url) = &args.base_url {
        client = client.base_url(url);
    }
    let client = client.build();

    let config = rag_config(&args, client.dim())?;
    let records = SqliteRecordStore::open_table(&args.database, &args.table)
        .with_context(|| format!("failed to open dataset {}", args.database.display()))?;

    if args.rebuild {
        remove_index(&config.index_path)?;
    }

    let mut builder = IndexBuilder::new(&client, &records, config.index.clone());
    if let Some(timeout) = config.gateway_timeout {
        builder = builder.gateway_timeout(timeout);
    }
    let (index, report) = builder
        .open(&config.index_path, report_progress)
        .await
        .with_context(|| {
            format!(
                "failed to open vector index {} (use --rebuild to recreate it)",
                config.index_path.display()
            )
        })?;
    if !report.skipped.is_empty() {
        eprintln!(
            "{} record(s) could not be indexed; run with RUST_LOG=warn for details",
            report.skipped.len()
        );
    }
    info!(records = index.len(), loaded = report.loaded, "vector index ready");

    let retriever = Retriever::new(client.clone(), index, records).with_config(&config);
    let mut session = SupportSession::new(retriever, client)
        .system_instruction(args.language.system_instruction())
        .template(args.language.template());
    if let Some(timeout) = config.gateway_timeout {
        session = session.gateway_timeout(timeout);
    }

    print_stream(session.greet(args.language.greeting()))
        .await
        .context("failed to generate greeting")?;

    let question = match args.question {
        Some(question) => question,
        None => match read_question()? {
            Some(question) => question,
            None => return Ok(()),
        },
    };

    print_stream(session.ask(&question))
        .await
        .context("failed to answer question")?;

    Ok(())
}

fn rag_config(args: &Args, dimension: usize) -> Result<RagConfig> {
    let index = IndexConfig::builder().dimension(dimension).build()?;
    let mut config = RagConfig::builder()
        .index_path(&args.index)
        .default_top_k(args.top_k)
        .index(index);
    if let Some(secs) = args.timeout {
        config = config.gateway_timeout(Duration::from_secs(secs));
    }
    Ok(config.build())
}

fn remove_index(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "removed vector index for rebuild");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}

fn report_progress(progress: BuildProgress) {
    match progress.stage {
        BuildStage::Embedding if progress.processed == 0 => {
            eprintln!("Creating vector database ({} records)", progress.total);
        }
        BuildStage::Inserted => {
            if let Some(id) = progress.current {
                eprintln!(
                    "[{}/{}] Inserted {id} into vector database",
                    progress.processed, progress.total
                );
            }
        }
        BuildStage::Skipped { reason } => {
            if let Some(id) = progress.current {
                eprintln!(
                    "[{}/{}] Skipped {id}: {reason}",
                    progress.processed, progress.total
                );
            }
        }
        BuildStage::Done => eprintln!("Finished creating vector database"),
        BuildStage::Embedding | BuildStage::Saving | BuildStage::Loaded => {}
    }
}

/// Streams text chunks to stdout as they arrive.
async fn print_stream<E>(stream: impl Stream<Item = Result<String, E>>) -> Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pin!(stream);
    let mut stdout = io::stdout();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        stdout.write_all(chunk.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn read_question() -> Result<Option<String>> {
    print!("> ");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_dataset_layout() {
        let args = Args::parse_from(["qadex"]);
        assert_eq!(args.database, PathBuf::from("dataset.db"));
        assert_eq!(args.index, PathBuf::from("dataset.vdb"));
        assert_eq!(args.table, "converted");
        assert_eq!(args.top_k, 10);
        assert_eq!(args.model, "gpt-4o-mini");
        assert_eq!(args.language, Language::English);
        assert!(!args.rebuild);

        let config = rag_config(&args, 1536).unwrap();
        assert_eq!(config.default_top_k, 10);
        assert_eq!(config.index.dimension, 1536);
        assert_eq!(config.gateway_timeout, None);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "qadex",
            "--language",
            "es",
            "-k",
            "3",
            "--timeout",
            "20",
            "--question",
            "hola",
        ]);
        assert_eq!(args.language, Language::Spanish);
        assert_eq!(args.question.as_deref(), Some("hola"));

        let config = rag_config(&args, 8).unwrap();
        assert_eq!(config.default_top_k, 3);
        assert_eq!(config.gateway_timeout, Some(Duration::from_secs(20)));
    }

    #[test]
    fn removing_a_missing_index_is_fine() {
        let dir = std::env::temp_dir().join("qadex-cli-missing-index.vdb");
        assert!(remove_index(&dir).is_ok());
    }
}
