//! Sitesmith CLI
//!
//! Command-line surface for the generate / projects / preview operations.
//! Bodies are printed to stdout as JSON; failures print an error body to
//! stderr and exit non-zero.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use sitesmith::manifest::{normalize_with, Limits};
use sitesmith::service::{GenerateRequest, ProjectsQuery};
use sitesmith::{bundle, Config, Result, SiteError, SiteService, StoreBackend};
use tracing_subscriber::{fmt, EnvFilter};

/// Sitesmith CLI
#[derive(Parser, Debug)]
#[command(name = "sitesmith")]
#[command(about = "Generate small websites from prompts and preview stored versions")]
#[command(version)]
struct Args {
    /// Embedded store directory (ignored when --kv-addr is set)
    #[arg(long, env = "SITESMITH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address of a sitesmith-kv server
    #[arg(long, env = "SITESMITH_KV_ADDR")]
    kv_addr: Option<String>,

    /// Completion service credential
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Completion endpoint
    #[arg(long, env = "SITESMITH_API_URL")]
    api_url: Option<String>,

    /// Default model
    #[arg(long, env = "SITESMITH_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a site and store it as the project's next version
    Generate {
        /// What the site should be
        #[arg(short, long)]
        prompt: String,

        /// Display name of the owner
        #[arg(short, long)]
        username: String,

        /// Stable owner id (preferred storage key)
        #[arg(long)]
        user_id: Option<String>,

        #[arg(long)]
        project_id: String,

        /// Model override for this request
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List an owner's projects, or print one stored manifest
    Projects {
        #[arg(long)]
        user_key: String,

        #[arg(long, requires = "version")]
        project_id: Option<String>,

        #[arg(long, requires = "project_id")]
        version: Option<u64>,
    },

    /// Bundle a stored version into a single HTML document
    Preview {
        #[arg(long)]
        user_key: String,

        #[arg(long)]
        project_id: String,

        #[arg(long)]
        version: u64,

        /// Write here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Normalize a raw completion (or manifest JSON) file and print the manifest
    Normalize {
        input: PathBuf,
    },

    /// Normalize and bundle a local file without touching the store
    Bundle {
        input: PathBuf,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,sitesmith=info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = ?e.kind(), "{}", e);
            eprintln!(
                "{}",
                json!({ "error": e.code(), "message": e.public_message() })
            );
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = build_config(&args);

    match args.command {
        Commands::Generate {
            prompt,
            username,
            user_id,
            project_id,
            model,
        } => {
            let service = SiteService::from_config(&config)?;
            let response = service.generate(&GenerateRequest {
                prompt,
                username,
                user_id,
                project_id,
                model,
            })?;
            print_json(&response)
        }
        Commands::Projects {
            user_key,
            project_id,
            version,
        } => {
            let service = SiteService::from_config(&config)?;
            let response = service.projects(&ProjectsQuery {
                user_key,
                project_id,
                version,
            })?;
            print_json(&response)
        }
        Commands::Preview {
            user_key,
            project_id,
            version,
            out,
        } => {
            let service = SiteService::from_config(&config)?;
            let document = service
                .preview(&user_key, &project_id, version)?
                .ok_or_else(|| {
                    SiteError::InvalidRequest(format!(
                        "No version {} of project {} for {}",
                        version, project_id, user_key
                    ))
                })?;
            emit(&document, out)
        }
        Commands::Normalize { input } => {
            let raw = fs::read_to_string(&input)?;
            print_json(&normalize_with(&raw, &Limits::from_config(&config)))
        }
        Commands::Bundle { input, out } => {
            let raw = fs::read_to_string(&input)?;
            let manifest = normalize_with(&raw, &Limits::from_config(&config));
            emit(&bundle(&manifest), out)
        }
    }
}

fn build_config(args: &Args) -> Config {
    let backend = match (&args.kv_addr, &args.data_dir) {
        (Some(addr), _) => StoreBackend::Remote { addr: addr.clone() },
        (None, Some(_)) => StoreBackend::Embedded,
        (None, None) => StoreBackend::Disabled,
    };

    let mut builder = Config::builder()
        .store_backend(backend)
        .api_key(args.api_key.clone());
    if let Some(dir) = &args.data_dir {
        builder = builder.data_dir(dir);
    }
    if let Some(url) = &args.api_url {
        builder = builder.api_url(url);
    }
    if let Some(model) = &args.model {
        builder = builder.model(model);
    }
    builder.build()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit(document: &str, out: Option<PathBuf>) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(&path, document)?;
            tracing::info!(path = %path.display(), bytes = document.len(), "Wrote preview");
        }
        None => println!("{}", document),
    }
    Ok(())
}
