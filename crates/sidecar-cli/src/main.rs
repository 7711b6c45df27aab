mod capture;
mod logging;
mod render;
mod repl;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use sidecar_core::config::sidecar_dir;
use sidecar_core::{
    FileStore, KeyValueStore, MemoryStore, ModelType, PersistenceGateway, SessionEvent, Settings,
};
use sidecar_llm::GeminiProvider;
use sidecar_session::{SessionController, TurnOutcome};
use tokio::sync::mpsc;

use crate::capture::ClipboardCapture;
use crate::render::print_usage;
use crate::repl::{write_export, Terminal};

#[derive(Parser)]
#[command(name = "sidecar")]
#[command(about = "Gemini code assistant for the terminal")]
#[command(version)]
struct Cli {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model tier (fast or smart)
    #[arg(long)]
    model: Option<ModelType>,

    /// Ground replies with Google Search
    #[arg(long)]
    search: bool,

    /// Keep the conversation in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Directory holding config.json and the stored conversation
    #[arg(long, env = "SIDECAR_HOME")]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat (default)
    Chat,
    /// Send a single message and print the reply
    Send {
        /// Message content
        message: String,
        /// Technical context appended to the message
        #[arg(long)]
        context: Option<String>,
    },
    /// Write the stored conversation as Markdown
    Export {
        /// Output file, defaults to gemini-chat-<date>.md
        path: Option<PathBuf>,
    },
    /// Delete the stored conversation
    Clear,
    /// Show context usage of the stored conversation
    Usage,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug);

    let data_dir = cli.data_dir.clone().unwrap_or_else(sidecar_dir);
    let settings = load_settings(&cli, &data_dir);
    log::debug!(
        "Using {} (model {}, search {})",
        data_dir.display(),
        settings.model,
        settings.use_search
    );

    let (mut controller, events) = open_session(&cli, &data_dir, settings).await?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let settings_dir = (!cli.ephemeral).then(|| data_dir.clone());
            let mut terminal = Terminal::new(controller, events, settings_dir);
            let result = terminal.run().await;
            terminal.shutdown().await;
            result?;
        }
        Commands::Send { message, context } => {
            let mut terminal = Terminal::new(controller, events, None);
            if let Some(context) = context {
                terminal.controller_mut().set_extra_context(context);
            }
            let outcome = terminal.send(message).await;
            terminal.shutdown().await;
            if let Some(TurnOutcome::Failed { error, .. }) = outcome? {
                anyhow::bail!(error);
            }
        }
        Commands::Export { path } => {
            let path = write_export(&controller, path.as_deref())?;
            println!("{}", format!("📄 Exported to {}", path.display()).green());
            controller.shutdown().await;
        }
        Commands::Clear => {
            controller.clear_chat().await;
            println!("{}", "🧹 Stored conversation cleared.".green());
            controller.shutdown().await;
        }
        Commands::Usage => {
            println!(
                "{}",
                format!("{} messages", controller.history().len()).dimmed()
            );
            print_usage(&controller.usage());
            controller.shutdown().await;
        }
    }

    Ok(())
}

/// Stored settings, then environment, then command line flags.
fn load_settings(cli: &Cli, data_dir: &Path) -> Settings {
    let mut settings = Settings::load_from(data_dir, Path::new("config.toml"));
    settings.apply_env_overrides();

    if let Some(api_key) = &cli.api_key {
        settings.api_key = Some(api_key.clone());
    }
    if let Some(model) = cli.model {
        settings.model = model;
    }
    if cli.search {
        settings.use_search = true;
    }
    settings
}

async fn open_session(
    cli: &Cli,
    data_dir: &Path,
    settings: Settings,
) -> anyhow::Result<(SessionController, mpsc::UnboundedReceiver<SessionEvent>)> {
    let store: Arc<dyn KeyValueStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        let store = FileStore::new(data_dir.join("storage"));
        store.init().await?;
        Arc::new(store)
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let mut controller = SessionController::builder(
        settings,
        Arc::new(GeminiProvider::new()),
        PersistenceGateway::new(store),
    )
    .capture(Arc::new(ClipboardCapture))
    .events(tx)
    .build();

    let restored = controller.restore().await;
    log::debug!("[{}] Restored {} messages", controller.session_id(), restored);
    Ok((controller, rx))
}
