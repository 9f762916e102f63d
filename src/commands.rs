use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{error, info};

use crate::config::{Config, VectorBackend};
use crate::embeddings::NvidiaEmbeddings;
use crate::generation::NvidiaChat;
use crate::http::run_blocking;
use crate::pipeline::RagPipeline;
use crate::server;
use crate::vector_store;

/// Start the web UI, dropping the previous collection when configured to
#[inline]
pub async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate().context("Invalid server settings")?;

    let pipeline = RagPipeline::from_config(&config)
        .await
        .context("Failed to initialize pipeline")?;

    eprintln!(
        "{} http://{}:{}",
        style("Chat UI available at").bold().green(),
        config.server.host,
        config.server.port
    );

    server::serve(&config, pipeline)
        .await
        .context("Server failed")?;
    Ok(())
}

/// Ingest PDF files into the existing collection
#[inline]
pub async fn ingest(config: &Config, files: &[PathBuf]) -> Result<()> {
    let pipeline = RagPipeline::connect(config)
        .await
        .context("Failed to initialize pipeline")?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(files.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut total_chunks = 0;
    for path in files {
        bar.set_message(path.display().to_string());

        let report = match pipeline.ingest_file(path).await {
            Ok(report) => report,
            Err(e) => {
                bar.abandon();
                error!("Ingestion of {} failed: {}", path.display(), e);
                return Err(e).with_context(|| format!("Failed to ingest {}", path.display()));
            }
        };

        total_chunks += report.chunks;
        bar.println(format!(
            "  {} {} ({} pages, {} chunks)",
            style("✓").green(),
            path.display(),
            report.pages,
            report.chunks
        ));
        bar.inc(1);
    }
    bar.finish_and_clear();

    info!("Ingested {} files", files.len());
    eprintln!(
        "{} {} files, {} chunks stored in {}",
        style("Ingested").bold().green(),
        files.len(),
        total_chunks,
        pipeline.store().describe()
    );
    Ok(())
}

/// Answer one question against the existing collection
#[inline]
pub async fn ask(config: &Config, question: &str) -> Result<()> {
    let pipeline = RagPipeline::connect(config)
        .await
        .context("Failed to initialize pipeline")?;

    let result = pipeline
        .ask(question)
        .await
        .context("Failed to answer question")?;

    println!("{}", result.answer);

    if !result.sources.is_empty() {
        eprintln!();
        eprintln!("{}", style("Sources:").bold().yellow());
        for hit in &result.sources {
            eprintln!(
                "  {} page {} chunk {} {}",
                hit.chunk.metadata.source,
                hit.chunk.metadata.page + 1,
                hit.chunk.metadata.chunk_index,
                style(format!("(distance {:.4})", hit.distance)).dim()
            );
        }
    }

    Ok(())
}

/// Check the embedding service, the language model and the vector store
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 RAG Chatbot Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🧮 Embeddings Status:");
    match NvidiaEmbeddings::new(&config.embeddings) {
        Ok(client) => match run_blocking(move || client.health_check()).await {
            Ok(()) => {
                println!("   ✅ Embeddings: Connected ({})", config.embeddings.url);
                println!("   📋 Model: {}", config.embeddings.model);
            }
            Err(e) => println!("   ⚠️  Embeddings: Unhealthy - {:#}", e),
        },
        Err(e) => println!("   ❌ Embeddings: Invalid configuration - {}", e),
    }

    println!("🤖 LLM Status:");
    match NvidiaChat::new(&config.llm) {
        Ok(client) => match run_blocking(move || client.health_check()).await {
            Ok(()) => {
                println!("   ✅ LLM: Connected ({})", config.llm.url);
                println!("   📋 Model: {}", config.llm.model);
            }
            Err(e) => println!("   ⚠️  LLM: Unhealthy - {:#}", e),
        },
        Err(e) => println!("   ❌ LLM: Invalid configuration - {}", e),
    }

    println!("🔍 Vector Store Status:");
    match vector_store::from_config(config).await {
        Ok(store) => match store.count().await {
            Ok(count) => {
                println!("   ✅ {}", store.describe());
                println!("   📄 Stored chunks: {}", count);
            }
            Err(e) => println!("   ⚠️  {}: Unhealthy - {}", store.describe(), e),
        },
        Err(e) => println!("   ❌ Vector store: Failed to connect - {}", e),
    }

    Ok(())
}

/// Print the effective configuration
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Language Model:").bold().yellow());
    eprintln!("  URL: {}", style(&config.llm.url).cyan());
    eprintln!("  Model: {}", style(&config.llm.model).cyan());
    if let Some(max_tokens) = config.llm.max_tokens {
        eprintln!("  Max Tokens: {}", style(max_tokens).cyan());
    }
    if let Some(temperature) = config.llm.temperature {
        eprintln!("  Temperature: {}", style(temperature).cyan());
    }

    eprintln!();
    eprintln!("{}", style("Embeddings:").bold().yellow());
    eprintln!("  URL: {}", style(&config.embeddings.url).cyan());
    eprintln!("  Model: {}", style(&config.embeddings.model).cyan());
    eprintln!("  Batch Size: {}", style(config.embeddings.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Vector Store:").bold().yellow());
    eprintln!("  Backend: {}", style(config.vector_store.backend).cyan());
    eprintln!(
        "  Collection: {}",
        style(&config.vector_store.collection_name).cyan()
    );
    eprintln!("  Drop On Start: {}", style(config.vector_store.drop_old).cyan());
    match config.vector_store.backend {
        VectorBackend::Milvus => {
            let milvus = &config.vector_store.milvus;
            eprintln!("  Milvus URL: {}", style(&milvus.url).cyan());
            eprintln!("  Database: {}", style(&milvus.db_name).cyan());
            eprintln!(
                "  Index: {} / {} / {}",
                style(&milvus.index_type).cyan(),
                style(&milvus.metric_type).cyan(),
                style(&milvus.consistency_level).cyan()
            );
        }
        VectorBackend::Lancedb => {
            eprintln!(
                "  Path: {}",
                style(config.lancedb_path().display()).cyan()
            );
        }
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!(
        "  Tokens Per Chunk: {}",
        style(config.chunking.tokens_per_chunk).cyan()
    );
    eprintln!("  Chunk Overlap: {}", style(config.chunking.chunk_overlap).cyan());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!("{}", style("Server:").bold().yellow());
    eprintln!(
        "  Address: {}",
        style(format!("{}:{}", config.server.host, config.server.port)).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Write the effective configuration to the config file
#[inline]
pub fn write_config(config: &Config) -> Result<()> {
    config.save().context("Failed to save configuration")?;
    eprintln!(
        "{} {}",
        style("Configuration written to").green(),
        config.config_file_path().display()
    );
    Ok(())
}
