//! oceanrag-server entry point
//!
//! - `oceanrag-server` / `oceanrag-server serve` - HTTP server
//! - `oceanrag-server init` - Scaffold a configuration
//! - `oceanrag-server ingest <manifest>` - Ingest documents
//! - `oceanrag-server query <question>` - Ask a question
//! - `oceanrag-server backup|restore [id]`, `backups` - Snapshots
//! - `oceanrag-server config` - Show or validate the configuration

use anyhow::Context;
use oceanrag::{
    api::routes::create_router,
    cli::{
        init::{self, InitConfig, InitResult},
        output::Output,
        Cli, Commands,
    },
    rag::ingest::DocumentManifest,
    types::QueryRequest,
    utils::toml_config::ServerConfig,
    AppState, ConfigManager, OceanConfig, QueryEngine,
};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Some(Commands::Init {
            path,
            force,
            provider,
            host,
            port,
        }) => {
            let result = init::run(
                InitConfig {
                    path,
                    force,
                    provider,
                    host,
                    port,
                },
                &output,
            );
            match result {
                InitResult::Success | InitResult::AlreadyExists => Ok(()),
                InitResult::Error(e) => Err(anyhow::anyhow!(e)),
            }
        }
        Some(Commands::Config { full, validate }) => {
            run_config(&cli.config, full, validate, &output)
        }
        None => serve(cli.config, false, cli.verbose).await,
        Some(Commands::Serve { watch }) => serve(cli.config, watch, cli.verbose).await,
        Some(command) => {
            let config = load_config(&cli.config)?;
            init_tracing(&config.server, cli.verbose);
            let engine = QueryEngine::from_config(&config).await?;
            run_command(command, &engine, &output).await
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<OceanConfig> {
    OceanConfig::load(path).with_context(|| {
        format!(
            "failed to load {} (run `oceanrag-server init` to create one)",
            path.display()
        )
    })
}

fn init_tracing(server: &ServerConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        server.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.log_format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(config_path: PathBuf, watch: bool, verbose: bool) -> anyhow::Result<()> {
    let config_manager = Arc::new(ConfigManager::new(&config_path).with_context(|| {
        format!(
            "failed to load {} (run `oceanrag-server init` to create one)",
            config_path.display()
        )
    })?);
    let config = config_manager.config();
    init_tracing(&config.server, verbose);

    if watch {
        config_manager.start_watching()?;
    }

    let engine = Arc::new(QueryEngine::from_config(&config).await?);
    let stats = engine.stats();
    info!(
        documents = stats.documents,
        chunks = stats.chunks,
        dimensions = stats.dimensions,
        metric = %stats.metric,
        "Engine ready"
    );

    let state = AppState {
        config_manager: Arc::clone(&config_manager),
        engine,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "oceanrag server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    config_manager.stop_watching();

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn run_command(command: Commands, engine: &QueryEngine, output: &Output) -> anyhow::Result<()> {
    match command {
        Commands::Ingest { manifest } => run_ingest(&manifest, engine, output).await,
        Commands::Query {
            question,
            k,
            show_passages,
        } => run_query(question, k, show_passages, engine, output).await,
        Commands::Backup { id } => {
            let manifest = engine.backup(Some(&id)).await?;
            output.success(&format!("Snapshot '{}' created", manifest.snapshot_id));
            output.kv("entries", &manifest.entry_count.to_string());
            output.kv("documents", &manifest.document_count.to_string());
            output.kv("checksum", &manifest.checksum);
            Ok(())
        }
        Commands::Restore { id } => {
            let manifest = engine.restore(Some(&id)).await?;
            output.success(&format!("Snapshot '{}' restored", manifest.snapshot_id));
            output.kv("entries", &manifest.entry_count.to_string());
            output.kv("documents", &manifest.document_count.to_string());
            Ok(())
        }
        Commands::Backups => {
            let snapshots = engine.backups().await?;
            if snapshots.is_empty() {
                output.info("No snapshots");
                return Ok(());
            }
            output.header("Snapshots");
            output.snapshots(&snapshots);
            Ok(())
        }
        Commands::Serve { .. } | Commands::Init { .. } | Commands::Config { .. } => Ok(()),
    }
}

async fn run_ingest(manifest_path: &Path, engine: &QueryEngine, output: &Output) -> anyhow::Result<()> {
    let manifest = DocumentManifest::load(manifest_path).await?;
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let requests = manifest.into_requests(base_dir).await?;
    let total = requests.len();

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let summary = engine.ingest_all(requests, &cancel).await;
    watcher.abort();

    output.header("Ingestion");
    for response in &summary.ingested {
        output.created(
            &format!("{} chunks", response.chunk_ids.len()),
            &response.document_id,
        );
    }
    for (source, error) in &summary.failed {
        output.error(&format!("{}: {}", source, error));
    }
    if summary.cancelled {
        output.warning("Ingestion cancelled; remaining documents were skipped");
    }
    output.info(&format!(
        "{} of {} documents ingested",
        summary.ingested.len(),
        total
    ));

    if summary.failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("{} documents failed", summary.failed.len()))
    }
}

async fn run_query(
    question: String,
    k: Option<usize>,
    show_passages: bool,
    engine: &QueryEngine,
    output: &Output,
) -> anyhow::Result<()> {
    let response = engine
        .ask(QueryRequest {
            question,
            k,
            min_score: None,
            document_ids: None,
        })
        .await?;

    output.answer(&response.answer);
    if show_passages && !response.passages.is_empty() {
        output.passages(&response.passages);
    }
    Ok(())
}

fn run_config(path: &Path, full: bool, validate: bool, output: &Output) -> anyhow::Result<()> {
    let config = load_config(path)?;

    if validate {
        output.success(&format!("{} is valid", path.display()));
        return Ok(());
    }

    if full {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    output.kv(
        "server",
        &format!("{}:{}", config.server.host, config.server.port),
    );
    output.kv("data_dir", &config.storage.data_dir.display().to_string());
    output.kv("backup_dir", &config.storage.backup_dir.display().to_string());
    output.kv(
        "index",
        &format!("{} dims, {}", config.index.dimensions, config.index.metric),
    );
    output.kv(
        "chunking",
        &format!(
            "{:?} size={} overlap={}",
            config.chunking.strategy, config.chunking.chunk_size, config.chunking.chunk_overlap
        ),
    );
    output.kv("default_k", &config.retrieval.default_k.to_string());
    Ok(())
}
