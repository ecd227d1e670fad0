//! Command-line client for sigtrack.

mod api_client;

use anyhow::{Context, Result};
use api_client::{ApiClient, SignatureRequest};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use sigtrack_core::SigningRequestDraft;
use sigtrack_core::config::RecordStoreConfig;
use sigtrack_records::SignatureRequestRepo;
use std::path::{Path, PathBuf};

const DEFAULT_SERVER: &str = "http://localhost:3001";

#[derive(Parser)]
#[command(name = "sigtrack")]
#[command(about = "Command-line client for the signature request tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ApiArgs {
    /// Server base URL
    #[arg(long, env = "SIGTRACK_SERVER", default_value = DEFAULT_SERVER)]
    server: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List every tracked signature request
    List {
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Register a new signature request
    Create {
        #[command(flatten)]
        request: CreateArgs,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Check that the server is up
    Ping {
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Delete every record from the configured record store
    Clear {
        /// Server configuration file (only the [records] section is used)
        #[arg(short, long, env = "SIGTRACK_CONFIG", default_value = "config/sigtrack.toml")]
        config: PathBuf,
        /// Confirm deletion
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Args, Clone)]
struct CreateArgs {
    #[arg(long)]
    user_name: String,
    #[arg(long)]
    user_email: String,
    #[arg(long)]
    session_id: String,
    /// Provider document id of the signing workflow
    #[arg(long)]
    document_id: String,
    #[arg(long)]
    signing_url: String,
    #[arg(long)]
    user_id: Option<String>,
    #[arg(long)]
    document_type: Option<String>,
    #[arg(long, default_value_t = false)]
    new_to_switzerland: bool,
    /// Signing URL of the linked cancellation document
    #[arg(long)]
    cancellation_signing_url: Option<String>,
}

impl From<CreateArgs> for SigningRequestDraft {
    fn from(args: CreateArgs) -> Self {
        Self {
            user_name: Some(args.user_name),
            user_email: Some(args.user_email),
            user_id: args.user_id,
            session_id: Some(args.session_id),
            application_document_id: Some(args.document_id),
            signing_url: Some(args.signing_url),
            is_new_to_switzerland: Some(args.new_to_switzerland),
            document_type: args.document_type,
            cancellation_signing_url: args.cancellation_signing_url,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let Cli { command } = Cli::parse();

    match command {
        Commands::List { api } => handle_list_command(&api).await,
        Commands::Create { request, api } => handle_create_command(request, &api).await,
        Commands::Ping { api } => handle_ping_command(&api).await,
        Commands::Clear { config, yes } => handle_clear_command(&config, yes).await,
    }
}

async fn handle_list_command(api: &ApiArgs) -> Result<()> {
    let client = ApiClient::new(&api.server)?;
    let requests = client.list_requests().await?;
    if requests.is_empty() {
        println!("No signature requests.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<24}  {:<10}  {:<24}  {:<10}  USER",
        "ID", "DOCUMENT", "STATUS", "CANCELLATION", "STATUS"
    );
    for request in &requests {
        println!("{}", format_row(request));
    }
    println!("\n{} request(s)", requests.len());
    Ok(())
}

fn format_row(request: &SignatureRequest) -> String {
    format!(
        "{:<36}  {:<24}  {:<10}  {:<24}  {:<10}  {} <{}>",
        request.id,
        request.document_id,
        request.status,
        request.cancellation_document_id.as_deref().unwrap_or("-"),
        request.cancellation_status.as_deref().unwrap_or("-"),
        request.user_name,
        request.user_email,
    )
}

async fn handle_create_command(args: CreateArgs, api: &ApiArgs) -> Result<()> {
    let client = ApiClient::new(&api.server)?;
    let created = client.create_request(&args.into()).await?;
    println!("Created signature request {}", created.id);
    println!("  document:     {}", created.document_id);
    println!("  status:       {}", created.status);
    if let Some(cancellation) = &created.cancellation_document_id {
        println!("  cancellation: {cancellation}");
    }
    Ok(())
}

async fn handle_ping_command(api: &ApiArgs) -> Result<()> {
    let client = ApiClient::new(&api.server)?;
    if client.ping().await? {
        println!("{} is up", api.server);
        Ok(())
    } else {
        anyhow::bail!("{} answered without pong", api.server)
    }
}

/// Record store section of the server configuration.
fn load_records_config(config_path: &Path) -> Result<RecordStoreConfig> {
    let mut figment = Figment::new();
    if config_path.exists() {
        figment = figment.merge(Toml::file(config_path));
    }
    let figment =
        figment.merge(Env::prefixed("SIGTRACK_").ignore(&["CONFIG", "SERVER"]).split("__"));
    if !figment.contains("records") {
        return Ok(RecordStoreConfig::default());
    }
    figment
        .extract_inner::<RecordStoreConfig>("records")
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("invalid [records] configuration")
}

async fn handle_clear_command(config_path: &Path, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("refusing to delete all records without --yes");
    }
    let config = load_records_config(config_path)?;
    let store = sigtrack_records::from_config(&config)
        .await
        .context("failed to open record store")?;
    let deleted = store
        .delete_all()
        .await
        .context("failed to delete records")?;
    println!("Deleted {deleted} signature request(s)");
    Ok(())
}
