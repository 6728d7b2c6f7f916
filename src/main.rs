use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use vecdoc::config;
use vecdoc::initialization::build_document_manager;
use vecdoc::input::read_jsonl;
use vecdoc::{DocumentFilter, DocumentManager, Filters, WhereFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed and store documents read from a JSON Lines file.
    Upsert {
        /// One `{"text", "metadata"?, "id"?}` object per line.
        #[arg(long)]
        file: PathBuf,
        /// Upsert in batches over several workers.
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Print the documents most similar to a query, one JSON object per line.
    Search {
        query: String,
        #[arg(short, long, default_value_t = vecdoc::domain::document_manager::DEFAULT_SEARCH_K)]
        k: usize,
        /// Metadata filter, e.g. '{"source": "wiki"}'.
        #[arg(long = "where")]
        where_filter: Option<WhereFilter>,
        /// Document text filter, e.g. '{"$contains": "rust"}'.
        #[arg(long)]
        where_document: Option<DocumentFilter>,
    },
    /// Delete documents by id, by filter, or both. With neither, deletes everything.
    Delete {
        #[arg(long = "id")]
        ids: Vec<String>,
        #[arg(long = "where")]
        where_filter: Option<WhereFilter>,
        #[arg(long)]
        where_document: Option<DocumentFilter>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    log::debug!("Running command: {:?}", cli.command);

    let config = config::load_config()?;
    log::info!("Configuration loaded: {:?}", config);
    let manager = build_document_manager(&config).await?;

    match cli.command {
        Command::Upsert {
            file,
            parallel,
            batch_size,
            workers,
        } => {
            let request = tokio::task::spawn_blocking(move || read_jsonl(&file)).await??;
            let count = request.texts.len();
            if parallel {
                manager
                    .upsert_parallel(
                        request.texts,
                        request.metadatas,
                        request.ids,
                        batch_size.unwrap_or(config.upsert.batch_size),
                        workers.unwrap_or(config.upsert.workers),
                    )
                    .await?;
            } else {
                manager
                    .upsert(request.texts, request.metadatas, request.ids)
                    .await?;
            }
            log::info!("Upserted {} documents into '{}'.", count, config.collection.name);
        }
        Command::Search {
            query,
            k,
            where_filter,
            where_document,
        } => {
            let documents = manager
                .search(&query, k, Filters::new(where_filter, where_document))
                .await?;
            for document in documents {
                println!("{}", serde_json::to_string(&document)?);
            }
        }
        Command::Delete {
            ids,
            where_filter,
            where_document,
        } => {
            let ids = if ids.is_empty() { None } else { Some(ids) };
            let filters = Filters::new(where_filter, where_document);
            let filters = if filters.is_empty() { None } else { Some(filters) };
            let deleted = manager.delete(ids, filters).await?;
            println!("{} documents deleted", deleted);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_search_filters() {
        let cli = Cli::try_parse_from([
            "vecdoc",
            "search",
            "vector databases",
            "-k",
            "3",
            "--where",
            r#"{"source": "wiki"}"#,
            "--where-document",
            r#"{"$contains": "qdrant"}"#,
        ])
        .unwrap();
        match cli.command {
            Command::Search {
                query,
                k,
                where_filter,
                where_document,
            } => {
                assert_eq!(query, "vector databases");
                assert_eq!(k, 3);
                assert_eq!(where_filter, Some(WhereFilter::eq("source", "wiki")));
                assert_eq!(where_document, Some(DocumentFilter::Contains("qdrant".to_string())));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_malformed_filter() {
        let result = Cli::try_parse_from(["vecdoc", "delete", "--where", r#"{"a": 1, "b": 2}"#]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_collects_repeated_ids() {
        let cli = Cli::try_parse_from(["vecdoc", "delete", "--id", "a", "--id", "b"]).unwrap();
        match cli.command {
            Command::Delete { ids, where_filter, .. } => {
                assert_eq!(ids, vec!["a", "b"]);
                assert!(where_filter.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
