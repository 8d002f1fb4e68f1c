mod commands;
mod views;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use hostpanel::ApiClient;
use shared::config::Config;
use shared_http::api::{DEFAULT_CONTEXT_LENGTH, KvQuant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hostpanel", version, about = "Control panel for a remote host-management backend")]
struct Cli {
    /// Backend base URL; overrides HOSTPANEL_BACKEND_URL
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether the host is online
    Status {
        /// Keep polling and print every check until Ctrl+C
        #[arg(long)]
        watch: bool,
    },
    /// Print the host's hostname
    Hostname,
    /// Print the host's operating system
    Os,
    /// Print GPU memory usage
    Vram,
    /// Start or shut down the desktop
    Power {
        #[command(subcommand)]
        action: PowerAction,
    },
    /// List or run maintenance scripts
    Scripts {
        #[command(subcommand)]
        cmd: ScriptsCmd,
    },
    /// List the GGUF models available to the inference server
    Models,
    /// Download a model from Hugging Face and follow its progress
    Download(DownloadArgs),
    /// Set inference parameters for a model
    SetParams(SetParamsArgs),
    /// Live status with host panels while it is online
    Dashboard,
}

#[derive(Subcommand, Clone, Copy)]
enum PowerAction {
    On,
    Off,
}

#[derive(Subcommand)]
enum ScriptsCmd {
    /// List scripts grouped by folder
    List,
    /// Run a script by name
    Run { name: String },
}

#[derive(Args)]
struct DownloadArgs {
    /// `org/repo`, `org/repo:branch` or a huggingface.co URL
    hf_model: String,
    /// Download a single file from the repository
    #[arg(long)]
    file: Option<String>,
    /// Branch to download from; overrides a `:branch` suffix
    #[arg(long)]
    branch: Option<String>,
}

#[derive(Args)]
struct SetParamsArgs {
    /// Model path as listed by `models`
    model: String,
    /// Context length in tokens (presets: 8192, 15360, 20480)
    #[arg(long, default_value_t = DEFAULT_CONTEXT_LENGTH, value_parser = clap::value_parser!(u32).range(1..))]
    context: u32,
    /// KV cache quantization: f16, q8 or q4
    #[arg(long)]
    kv_quant: Option<KvQuant>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment variables from {}", path.display()),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(backend) = cli.backend.as_deref() {
        config = config.with_backend_url(backend)?;
    }
    let client = ApiClient::new(config)?;

    match cli.command {
        Command::Status { watch: false } => commands::status(&client).await,
        Command::Status { watch: true } => commands::watch_status(&client).await,
        Command::Hostname => commands::hostname(&client).await,
        Command::Os => commands::os(&client).await,
        Command::Vram => commands::vram(&client).await,
        Command::Power { action } => {
            commands::power(&client, matches!(action, PowerAction::On)).await
        }
        Command::Scripts { cmd: ScriptsCmd::List } => commands::list_scripts(&client).await,
        Command::Scripts {
            cmd: ScriptsCmd::Run { name },
        } => commands::run_script(&client, &name).await,
        Command::Models => commands::models(&client).await,
        Command::Download(args) => {
            commands::download(&client, &args.hf_model, args.branch, args.file).await
        }
        Command::SetParams(args) => {
            commands::set_params(&client, &args.model, args.context, args.kv_quant).await
        }
        Command::Dashboard => commands::dashboard(&client).await,
    }
}
