use std::error::Error;
use std::sync::Arc;

use chat_feed::auth::{StaticIdentity, generate_nonce, sha256_hex};
use chat_feed::config::{self, AppConfig};
use chat_feed::feed::aggregate;
use chat_feed::session::{self, ChatViewState, SessionHandle};
use chat_feed::storage::{DocumentStore, SqliteStore};
use chat_feed::{ChatCommand, ChatEvent, FeedError, MessageRecord};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "chat-feed",
    version,
    about = "Terminal chat over a live, deduplicated message feed"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Display name to post as (overrides the config file)
    #[arg(long)]
    name: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, PartialEq, Eq)]
enum Command {
    /// Join the chat: stdin lines are sent, `/quit` logs out
    Chat,
    /// Print the current feed once
    History,
    /// Write the effective configuration to the config file
    Init,
    /// Print a login nonce and its SHA-256 digest
    Nonce {
        #[arg(long)]
        length: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    app_config.apply_env_overrides();
    if let Some(name) = cli.name {
        app_config.display_name = name;
    }

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(app_config).await,
        Command::History => print_history(&app_config),
        Command::Init => {
            config::save_config(&cli.config, &app_config)?;
            log::info!("Wrote configuration to {}", cli.config);
            Ok(())
        }
        Command::Nonce { length } => {
            let nonce = generate_nonce(length.unwrap_or(app_config.nonce_length))
                .map_err(FeedError::from)?;
            println!("nonce:  {nonce}");
            println!("sha256: {}", sha256_hex(&nonce));
            Ok(())
        }
    }
}

async fn run_chat(app_config: AppConfig) -> Result<(), Box<dyn Error>> {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::with_path(&app_config.database_path)?);
    let identity = Arc::new(StaticIdentity::signed_in(
        app_config.uid(),
        app_config.display_name.clone(),
    ));

    let SessionHandle {
        commands,
        mut events,
        task,
    } = session::spawn(store, identity, &app_config.collection);
    log::info!(
        "Chatting in `{}` as {}",
        app_config.collection,
        app_config.display_name
    );

    let mut state = ChatViewState::new(app_config.display_name.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut quitting = false;
    let mut logged_out = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let refresh = matches!(event, ChatEvent::ChatsUpdated(_));
                state.apply_event(event);
                if refresh {
                    render(&state);
                }
                if let Some(notice) = state.notice.take() {
                    eprintln!("! {notice}");
                }
                if state.signed_out {
                    break;
                }
                let command = match state.next_queued() {
                    Some(body) => ChatCommand::Send(body),
                    None if quitting && !logged_out && state.pending.is_none() => ChatCommand::Logout,
                    None => continue,
                };
                if matches!(command, ChatCommand::Logout) {
                    logged_out = true;
                    stdin_open = false;
                }
                commands
                    .send(command)
                    .await
                    .map_err(|_| FeedError::SessionClosed)?;
            }
            line = lines.next_line(), if stdin_open => {
                let command = match line? {
                    Some(line) if line.trim() == "/quit" => {
                        quitting = true;
                        if state.pending.is_some() {
                            continue;
                        }
                        ChatCommand::Logout
                    }
                    Some(line) => match state.compose(line) {
                        Some(body) => ChatCommand::Send(body),
                        None => {
                            if !state.queued.is_empty() {
                                eprintln!("! Queued until the previous message is sent");
                            }
                            continue;
                        }
                    },
                    None => {
                        stdin_open = false;
                        quitting = true;
                        // queued lines go out before logging out
                        if state.pending.is_some() {
                            continue;
                        }
                        ChatCommand::Logout
                    }
                };
                if matches!(command, ChatCommand::Logout) {
                    logged_out = true;
                    stdin_open = false;
                }
                commands
                    .send(command)
                    .await
                    .map_err(|_| FeedError::SessionClosed)?;
            }
        }
    }

    drop(commands);
    task.await??;
    Ok(())
}

fn print_history(app_config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let store = SqliteStore::with_path(&app_config.database_path)?;
    let documents = store.snapshot(&app_config.collection)?;
    let aggregation = aggregate(&documents);

    let state = ChatViewState {
        messages: aggregation.messages,
        ..ChatViewState::new(app_config.display_name.clone())
    };
    render(&state);

    if aggregation.dropped > 0 {
        eprintln!("({} unreadable record(s) skipped)", aggregation.dropped);
    }
    Ok(())
}

fn render(state: &ChatViewState) {
    println!("--- {} message(s) ---", state.messages.len());
    for message in &state.messages {
        println!("{}", format_line(message, state.is_own(message)));
    }
}

fn format_line(message: &MessageRecord, own: bool) -> String {
    let time = message
        .timestamp
        .to_datetime()
        .map(|datetime| {
            datetime
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "--:--:--".to_string());
    let marker = if own { " (you)" } else { "" };
    format!("[{time}] {}{marker}: {}", message.sender, message.body)
}
