//! Init command implementation
//!
//! Scaffolds an oceanrag working directory: `oceanrag.toml`, `.env.example`,
//! a `corpus.toml` manifest with one sample document, and the data, backup
//! and document directories.

use super::output::Output;
use std::fs;
use std::path::Path;

/// Result of the init operation
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// oceanrag.toml already exists
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: std::path::PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Provider for embeddings and generation (ollama or openai)
    pub provider: String,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Scaffold the working directory. Existing files are kept unless `force`.
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing oceanrag");

    if !matches!(config.provider.as_str(), "ollama" | "openai") {
        output.error(&format!(
            "Unknown provider '{}' (expected ollama or openai)",
            config.provider
        ));
        return InitResult::Error(format!("unknown provider: {}", config.provider));
    }

    let base = &config.path;
    if base.join("oceanrag.toml").exists() && !config.force {
        output.warning("oceanrag.toml already exists");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Directories");
    for dir in ["data", "backups", "docs"] {
        let dir_path = base.join(dir);
        if dir_path.is_dir() {
            output.skipped(dir, "already exists");
        } else if let Err(e) = fs::create_dir_all(&dir_path) {
            output.error(&format!("Failed to create {}: {}", dir, e));
            return InitResult::Error(e.to_string());
        } else {
            output.created("directory", dir);
        }
    }

    output.subheader("Files");
    let files = [
        ("config", "oceanrag.toml", generate_config_toml(&config)),
        ("env", ".env.example", ENV_EXAMPLE.to_string()),
        ("manifest", "corpus.toml", CORPUS_MANIFEST.to_string()),
        ("document", SAMPLE_DOCUMENT_PATH, SAMPLE_DOCUMENT.to_string()),
    ];
    for (label, name, content) in &files {
        let path = base.join(name);
        if path.exists() && !config.force {
            output.skipped(name, "already exists");
            continue;
        }
        if let Err(e) = fs::write(&path, content) {
            output.error(&format!("Failed to write {}: {}", name, e));
            return InitResult::Error(e.to_string());
        }
        output.created(label, name);
    }

    output.success("oceanrag initialized");
    print_next_steps(&config, output);
    InitResult::Success
}

fn print_next_steps(config: &InitConfig, output: &Output) {
    output.header("Next Steps");
    output.newline();
    if config.provider == "openai" {
        output.info("1. Set your API key in .env:");
        output.command("cp .env.example .env");
    } else {
        output.info("1. Pull the models:");
        output.command("ollama pull nomic-embed-text");
        output.command("ollama pull llama3.2:3b");
    }
    output.newline();
    output.info("2. Add documents to corpus.toml, then ingest them:");
    output.command("oceanrag-server ingest corpus.toml");
    output.newline();
    output.info("3. Ask a question or start the server:");
    output.command("oceanrag-server query \"Who may designate marine protected areas?\"");
    output.command("oceanrag-server serve");
    output.hint(&format!(
        "The API will listen on http://{}:{}",
        config.host, config.port
    ));
}

const SAMPLE_DOCUMENT_PATH: &str = "docs/sample-policy.txt";

const SAMPLE_DOCUMENT: &str = "Area-based management tools

Parties may submit proposals for area-based management tools, including
marine protected areas, in areas beyond national jurisdiction. Proposals are
based on the best available science and traditional knowledge.

Environmental impact assessments

Before authorizing a planned activity that may cause substantial pollution of
or significant changes to the marine environment, a Party shall conduct an
environmental impact assessment and publish its report.
";

const CORPUS_MANIFEST: &str = r#"# Documents to ingest with `oceanrag-server ingest corpus.toml`.
# Paths are relative to this file. `id` and `title` are optional.

[[documents]]
id = "sample-policy"
title = "Sample policy text"
source_uri = "file://docs/sample-policy.txt"
path = "docs/sample-policy.txt"
"#;

const ENV_EXAMPLE: &str = r#"# oceanrag environment
# Copy to .env and fill in the values you need.

# Required when a provider is of type "openai"
OPENAI_API_KEY=

# Log filter (overrides server.log_level)
RUST_LOG=info
"#;

fn generate_config_toml(config: &InitConfig) -> String {
    let (dimensions, providers) = if config.provider == "openai" {
        (
            1536,
            r#"[embedding]
type = "openai"
api_key_env = "OPENAI_API_KEY"
model = "text-embedding-3-small"
batch_size = 32
cache_capacity = 1024

[generation]
type = "openai"
api_key_env = "OPENAI_API_KEY"
model = "gpt-4o-mini"
temperature = 0.3
"#,
        )
    } else {
        (
            768,
            r#"[embedding]
type = "ollama"
base_url = "http://localhost:11434"
model = "nomic-embed-text"
batch_size = 32
cache_capacity = 1024

[generation]
type = "ollama"
base_url = "http://localhost:11434"
model = "llama3.2:3b"
temperature = 0.3
"#,
        )
    };

    format!(
        r#"# oceanrag configuration
# Secrets are read from the environment variables named below (see .env.example).

[server]
host = "{host}"
port = {port}
log_level = "info"
log_format = "pretty"

[storage]
data_dir = "./data"
backup_dir = "./backups"
sync_writes = true

[index]
dimensions = {dimensions}
metric = "cosine"

[chunking]
strategy = "sections"
chunk_size = 200
chunk_overlap = 20

{providers}
[retrieval]
default_k = 5
candidate_multiplier = 4

[retrieval.rerank]
strategy = "none"

[synthesis]
max_context_tokens = 2000

[retry]
max_attempts = 3
initial_backoff_ms = 200
max_backoff_ms = 5000
timeout_secs = 30
"#,
        host = config.host,
        port = config.port,
        dimensions = dimensions,
        providers = providers,
    )
}
