use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

use crate::config;
use crate::models::Conversation;
use crate::providers::{BackendId, BackendRouter};
use crate::services::conversation::partition_pinned;
use crate::services::export::export_to_markdown;
use crate::services::{
    ChatController, ChatState, ConversationStore, Database, SettingsService, SimpleChat,
};

#[derive(Parser)]
#[command(name = "chatline")]
#[command(version)]
#[command(about = "Local chat conversations with streamed assistant replies", long_about = None)]
pub struct Cli {
    /// Directory holding the conversation store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Reply backend for this run (fake, echo, http, unconfigured)
    #[arg(long, global = true, value_parser = parse_backend)]
    backend: Option<BackendId>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List conversations, pinned first
    List {
        /// Only show conversations whose title or messages contain this text
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Start a new conversation
    New,
    /// Print a conversation
    Show { id: Option<String> },
    /// Send a message and stream the reply
    Send {
        #[arg(required = true)]
        text: Vec<String>,
        /// Conversation to send to (defaults to the most recent one)
        #[arg(long)]
        chat: Option<String>,
    },
    /// Rename a conversation; an empty title keeps the current one
    Rename { id: String, title: Option<String> },
    /// Delete a conversation
    Delete { id: String },
    /// Pin or unpin a conversation
    Pin { id: String },
    /// Export all conversations as JSON, or one as Markdown
    Export {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long)]
        markdown: Option<String>,
    },
    /// One-off exchange that is not saved
    Quick {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Show or change settings
    Config {
        #[arg(long = "set-backend", value_parser = parse_backend)]
        set_backend: Option<BackendId>,
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        fragment_chars: Option<usize>,
        #[arg(long)]
        fragment_delay_ms: Option<u64>,
    },
}

fn parse_backend(s: &str) -> Result<BackendId, String> {
    BackendId::from_str(s).ok_or_else(|| {
        let names: Vec<&str> = BackendId::ALL.iter().map(|b| b.as_str()).collect();
        format!("unknown backend '{}', expected one of: {}", s, names.join(", "))
    })
}

pub async fn run(cli: Cli) -> Result<()> {
    let data_dir = config::data_dir(cli.data_dir)?;
    let db = Database::open(&config::db_path(&data_dir))?;
    let mut settings = SettingsService::load(&db).await;

    if let Commands::Config {
        set_backend,
        endpoint,
        fragment_chars,
        fragment_delay_ms,
    } = cli.command
    {
        let changed = set_backend.is_some()
            || endpoint.is_some()
            || fragment_chars.is_some()
            || fragment_delay_ms.is_some();
        if let Some(backend) = set_backend {
            settings.backend = backend;
        }
        if let Some(endpoint) = endpoint {
            settings.endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
        }
        if let Some(chars) = fragment_chars {
            settings.fake_fragment_chars = chars;
        }
        if let Some(ms) = fragment_delay_ms {
            settings.fake_fragment_delay_ms = ms;
        }
        if changed {
            SettingsService::save(&db, &settings).await?;
        }
        println!("backend:   {} ({})", settings.backend.as_str(), settings.backend.display_name());
        println!("endpoint:  {}", settings.endpoint.as_deref().unwrap_or("-"));
        println!(
            "fragments: {} chars every {} ms",
            settings.fake_fragment_chars, settings.fake_fragment_delay_ms
        );
        println!("data:      {}", data_dir.display());
        return Ok(());
    }

    let router = BackendRouter::from_settings(&settings);
    let backend = router.get(cli.backend.unwrap_or(settings.backend))?;

    if let Commands::Quick { text } = cli.command {
        let mut chat = SimpleChat::new(backend);
        chat.send(&text.join(" ")).await;
        for msg in chat.messages() {
            println!("{}: {}", msg.role.display_name(), msg.content);
        }
        return Ok(());
    }

    let store = ConversationStore::new(db);
    let mut controller = ChatController::open(store, Arc::clone(&backend)).await?;

    match cli.command {
        Commands::List { query } => {
            let (pinned, others) = match query {
                Some(query) => partition_pinned(controller.search(&query)),
                None => controller.state().partitioned(),
            };
            print_section("Library", &pinned, controller.state());
            print_section("All chats", &others, controller.state());
        }
        Commands::New => {
            let id = controller.create().await?;
            println!("{}", id);
        }
        Commands::Show { id } => {
            let conv = match id {
                Some(id) => {
                    let id = resolve_id(controller.state(), &id)?;
                    controller.state().get(&id).cloned()
                }
                None => Some(controller.state().active().clone()),
            };
            if let Some(conv) = conv {
                print_conversation(&conv);
            }
        }
        Commands::Send { text, chat } => {
            if let Some(chat) = chat {
                let id = resolve_id(controller.state(), &chat)?;
                controller.select(&id).await?;
            }
            let id = controller.state().active_id().to_string();
            if !controller.send(&text.join(" ")).await? {
                bail!("Nothing to send");
            }
            stream_to_stdout(&mut controller, &id).await?;
        }
        Commands::Rename { id, title } => {
            let id = resolve_id(controller.state(), &id)?;
            controller.rename(&id, title.as_deref()).await?;
        }
        Commands::Delete { id } => {
            let id = resolve_id(controller.state(), &id)?;
            controller.delete(&id).await?;
        }
        Commands::Pin { id } => {
            let id = resolve_id(controller.state(), &id)?;
            controller.toggle_pin(&id).await?;
            let pinned = controller.state().get(&id).is_some_and(|c| c.pinned);
            println!("{}", if pinned { "Pinned" } else { "Unpinned" });
        }
        Commands::Export { dir, markdown } => match markdown {
            Some(id) => {
                let id = resolve_id(controller.state(), &id)?;
                if let Some(conv) = controller.state().get(&id) {
                    let path = dir.join(format!("{}.md", conv.id));
                    std::fs::write(&path, export_to_markdown(conv))
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("{}", path.display());
                }
            }
            None => {
                let path = controller.export_json(&dir)?;
                println!("{}", path.display());
            }
        },
        Commands::Quick { .. } | Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Print fragments as they are applied. Ctrl-C stops the reply and keeps what
/// arrived.
async fn stream_to_stdout(controller: &mut ChatController, id: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let interrupted = tokio::select! {
        result = controller.wait_for_stream(id, |fragment| {
            let _ = write!(stdout, "{}", fragment);
            let _ = stdout.flush();
        }) => {
            result?;
            false
        }
        _ = &mut ctrl_c => true,
    };

    if interrupted {
        tracing::info!("Stopping reply");
        controller.stop(id);
        let queued = controller.pump().await?;
        tracing::debug!("Applied {} queued events after stop", queued);
        controller.wait_for_stream(id, |_| {}).await?;
    }
    println!();
    Ok(())
}

/// Accept a full id or an unambiguous prefix of one.
fn resolve_id(state: &ChatState, prefix: &str) -> Result<String> {
    let matches: Vec<&Conversation> = state
        .conversations()
        .iter()
        .filter(|c| c.id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [conv] => Ok(conv.id.clone()),
        [] => bail!("No conversation matches '{}'", prefix),
        _ => bail!("'{}' matches {} conversations", prefix, matches.len()),
    }
}

/// First eight characters of an id, for listings.
fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(end, _)| &id[..end])
}

fn print_section(heading: &str, conversations: &[&Conversation], state: &ChatState) {
    println!("{}", heading);
    if conversations.is_empty() {
        println!("  (none)");
    }
    for conv in conversations {
        let marker = if conv.id == state.active_id() { "*" } else { " " };
        println!(
            "{} {}  {}  {}",
            marker,
            short_id(&conv.id),
            conv.title,
            conv.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
    println!();
}

fn print_conversation(conv: &Conversation) {
    println!("# {}\n", conv.title);
    for msg in conv.visible_messages() {
        println!(
            "[{}] {}\n{}\n",
            msg.created_at.with_timezone(&Local).format("%H:%M:%S"),
            msg.role.as_str(),
            msg.content
        );
    }
}
