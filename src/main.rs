use std::io::Write;

use anyhow::Context;
use serde_json::Map;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use agentic_console::client::HttpApi;
use agentic_console::config::Config;
use agentic_console::models::{ChatMessage, ReplyMode};
use agentic_console::service::chat_service::ChatService;
use agentic_console::service::conversation::{ContentObserver, ConversationHandle};
use agentic_console::session::Session;
use agentic_console::stream::StreamState;

/// One line typed at the prompt.
#[derive(Debug, PartialEq)]
enum Command<'a> {
    Send(&'a str),
    History,
    Clear,
    Stats,
    Mode(Option<ReplyMode>),
    Logout,
    Help,
    Quit,
    Empty,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return if line.is_empty() { Command::Empty } else { Command::Send(line) };
        };
        let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        match name {
            "history" => Command::History,
            "clear" => Command::Clear,
            "stats" => Command::Stats,
            "mode" => Command::Mode(arg.parse().ok()),
            "logout" => Command::Logout,
            "quit" | "exit" => Command::Quit,
            _ => Command::Help,
        }
    }
}

const HELP: &str = "Commandes : /history, /clear, /stats, /mode stream|send, /logout, /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so replies on stdout stay readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentic_console=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;

    // ── Session & wiring ──────────────────────────────────────────────────────
    let session = match &config.token {
        Some(token) => Session::with_token(token),
        None => Session::new(),
    };
    let api = HttpApi::new(&config.api_url, session.clone());
    let svc = ChatService::new(api, session.clone(), ConversationHandle::default());

    let user = if session.is_authenticated() {
        svc.refresh_user().await.context("AGENTIC_TOKEN was rejected")?
    } else if let Some(request) = config.registration() {
        svc.login_or_register(&request).await.context("Sign-in failed")?
    } else if let Some((email, password)) = config.login_credentials() {
        svc.login(email, password).await.context("Login failed")?
    } else {
        anyhow::bail!(
            "Set AGENTIC_TOKEN, or AGENTIC_EMAIL and AGENTIC_PASSWORD (plus AGENTIC_USERNAME to create the account)"
        );
    };
    info!("Connected to {} as {}", config.api_url, user.username);

    for message in svc.conversation().snapshot() {
        print_message(&message);
    }

    // ── Prompt loop ───────────────────────────────────────────────────────────
    let mut mode = config.mode;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} > ", user.display_name());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else { break };
        match Command::parse(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Mode(Some(new_mode)) => {
                mode = new_mode;
                println!("Mode : {mode:?}");
            }
            Command::Mode(None) => println!("Usage : /mode stream|send"),
            Command::Stats => match svc.stats().await {
                Ok(stats) => println!(
                    "{} agents, {} documents, {:.1} Mo, {} requêtes",
                    stats.agents_count,
                    stats.documents_count,
                    stats.storage_used_mb,
                    stats.total_queries
                ),
                Err(e) => eprintln!("{e}"),
            },
            Command::History => match svc.load_history().await {
                Ok(_) => svc.conversation().snapshot().iter().for_each(print_message),
                Err(e) => eprintln!("{e}"),
            },
            Command::Clear => match svc.clear_history().await {
                Ok(()) => println!("Historique effacé."),
                Err(e) => eprintln!("{e}"),
            },
            Command::Logout => {
                svc.logout().await;
                println!("Déconnecté.");
                break;
            }
            Command::Send(text) => {
                print!("assistant: ");
                std::io::stdout().flush()?;
                let outcome = svc.send_observed(text, Map::new(), mode, Some(echo_to_stdout())).await?;
                println!();
                if outcome.state == StreamState::Failed && !session.is_authenticated() {
                    anyhow::bail!("Session expired, sign in again");
                }
            }
        }
    }

    Ok(())
}

fn print_message(message: &ChatMessage) {
    println!("{}: {}", message.role, message.content);
}

/// Writes each content change to stdout. Streamed content only grows, so
/// only the new suffix is printed; a replacement (failure notice) is printed
/// on its own line.
fn echo_to_stdout() -> ContentObserver {
    echo_into(std::io::stdout())
}

fn echo_into<W: Write + Send + 'static>(mut out: W) -> ContentObserver {
    let mut shown = String::new();
    Box::new(move |content: &str| {
        let written = match content.strip_prefix(shown.as_str()) {
            Some(suffix) => write!(out, "{suffix}"),
            None => write!(out, "\n{content}"),
        };
        if let Err(e) = written.and_then(|()| out.flush()) {
            debug!("Reply echo failed: {e}");
        }
        shown = content.to_string();
    })
}
