mod config;
mod embedder;
mod error;
mod llm;
mod retriever;
mod session;
mod utils;
mod vector_db;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use embedder::SentenceEmbedder;
use llm::LLM;
use retriever::Retriever;
use session::{ask, render_turn, ChatHistory};
use vector_db::CorpusStore;

const USAGE_HINT: &str = "Tip: ask about Java concepts, code, or textbook content. \
Each answer is based only on the most relevant textbook chunks. Ctrl+D to exit.";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match dotenvy::dotenv() {
        Ok(path) => debug!(?path, "loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "ignoring unreadable .env file"),
    }

    let config = Config::parse();
    config.validate()?;

    let store = CorpusStore::load(&config.embeddings, &config.chunks)
        .context("failed to load the knowledge base")?;

    println!("Loading sentence-embedding model (first run downloads it)...");
    let embedder = SentenceEmbedder::new(config.model_cache_dir()?);
    embedder.warm_up()?;

    let retriever = Retriever::new(&store, &embedder)
        .context("knowledge base does not match the embedding model")?;
    let llm = LLM::new(config.llm_config()?)?;

    if store.is_empty() {
        warn!("knowledge base is empty; questions will get no context");
    }

    println!("Java RAG Chatbot ready ({} chunks).", store.len());
    println!("{USAGE_HINT}\n");

    let mut history = ChatHistory::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break; // EOF (Ctrl+D)
        };

        if line.trim().is_empty() {
            continue;
        }

        println!("Searching knowledge base and generating answer...");
        if let Some(turn) = ask(&mut history, &retriever, &llm, &line, config.top_k).await {
            println!("\n{}", render_turn(turn, config.show_context));
        }
    }

    if !history.is_empty() {
        println!("\n=== Session history ({} turns, newest first) ===\n", history.len());
        println!("{}", history.render(config.show_context));
    }

    Ok(())
}
