//! Command-line front-end: provider management subcommands and the chat REPL.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::chat::ChatSession;
use crate::error::ChatError;
use crate::store::CredentialInput;
use crate::templates::PromptTemplate;

/// Prompt optimizer chat client for several LLM providers.
#[derive(Parser, Debug)]
#[command(name = "promptlab", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List known providers and their credential status.
    Providers,
    /// Select the provider used for chat.
    Select { id: String },
    /// Store a custom API key for a provider.
    Key { id: String, key: String },
    /// Override a provider's endpoint URL; omit the URL to reset it.
    Url { id: String, url: Option<String> },
    /// Prefer operator-provided default keys over custom ones.
    DefaultKey { state: Toggle },
    /// Probe a provider (default: the selected one) with its current credentials.
    Validate { id: Option<String> },
    /// Save credentials, validate them, and select the provider on success.
    Confirm {
        id: String,
        /// Custom API key; without it the default key is used.
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Send one message and print the reply.
    Ask {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Start the interactive chat (the default).
    Chat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Cli {
    pub async fn run(self, mut session: ChatSession) -> Result<()> {
        match self.command.unwrap_or(Command::Chat) {
            Command::Providers => print_providers(&session),
            Command::Select { id } => {
                session.store_mut().select_provider(&id)?;
                println!("Selected {}", session.store().selected_profile().display_name);
            }
            Command::Key { id, key } => {
                session.store_mut().set_custom_key(&id, &key)?;
                println!("Key saved for {}", id);
            }
            Command::Url { id, url } => {
                session
                    .store_mut()
                    .set_url_override(&id, url.as_deref().unwrap_or(""))?;
                println!("{} -> {}", id, session.store().resolve_api_url(&id)?);
            }
            Command::DefaultKey { state } => {
                session
                    .store_mut()
                    .set_use_default_key(matches!(state, Toggle::On))?;
                println!(
                    "Default keys {}",
                    if session.store().use_default_key() { "on" } else { "off" }
                );
            }
            Command::Validate { id } => {
                let id = id.unwrap_or_else(|| session.store().selected_id().to_string());
                session.store().profile(&id)?;
                if !session.validate_credential(&id).await {
                    bail!("credentials for {} did not validate", id);
                }
                println!("{}: OK", id);
            }
            Command::Confirm { id, key, url } => {
                let input = CredentialInput {
                    custom_key: key,
                    url_override: url,
                };
                session.confirm_provider(&id, &input).await?;
                println!("{} confirmed and selected", id);
            }
            Command::Ask { message } => {
                let text = message.join(" ");
                send_and_print(&mut session, &text).await?;
            }
            Command::Chat => run_chat_loop(session).await?,
        }
        Ok(())
    }
}

fn print_providers(session: &ChatSession) {
    let store = session.store();
    let selected = store.selected_id();
    for profile in store.list_providers() {
        let marker = if profile.id == selected { "*" } else { " " };
        let key = if !store.resolve_api_key(&profile.id).unwrap_or_default().is_empty() {
            "key"
        } else if profile.use_proxy && store.proxy_url().is_some() {
            "proxy"
        } else {
            "no key"
        };
        let default = if store.default_key(&profile.id).is_some() { ", default key" } else { "" };
        let confirmed = if store.is_confirmed(&profile.id) { ", confirmed" } else { "" };
        println!(
            "{} {:<10} {:<10} {:<28} [{}{}{}]",
            marker, profile.id, profile.request_format, profile.model_id, key, default, confirmed
        );
        if !profile.description.is_empty() {
            println!("             {}", profile.description);
        }
    }
    println!(
        "\nDefault keys: {}",
        if store.use_default_key() { "on" } else { "off" }
    );
}

/// Stream one reply to stdout. Ctrl-C cancels the in-flight request.
async fn send_and_print(session: &mut ChatSession, text: &str) -> Result<String, ChatError> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut print_delta = |delta: &str| {
        print!("{}", delta);
        std::io::stdout().flush().ok();
    };
    let result = session.send_message(text, &mut print_delta, &cancel).await;
    watcher.abort();
    println!();
    result
}

fn report_error(session: &ChatSession, err: &ChatError) {
    match err {
        ChatError::Cancelled { partial } if partial.is_empty() => println!("[Cancelled]"),
        ChatError::Cancelled { partial } => {
            println!("[Cancelled after {} characters]", partial.chars().count())
        }
        e if e.is_auth() => println!(
            "[Error: {}] Set a key with `promptlab key {} <key>` or `/key <key>`.",
            e,
            session.store().selected_id()
        ),
        e => println!("[Error: {}]", e),
    }
}

fn run_slash_command(session: &mut ChatSession, input: &str) {
    let (command, arg) = match input.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (input, ""),
    };
    match command.to_lowercase().as_str() {
        "/clear" => {
            session.clear_history();
            println!("[Cleared]");
        }
        "/history" => println!("[{} messages]", session.history().len()),
        "/template" if arg.is_empty() => {
            for template in PromptTemplate::ALL {
                let marker = if template == session.template() { "*" } else { " " };
                println!("{} {:<8} {}", marker, template.name(), template.title());
            }
        }
        "/template" => match PromptTemplate::from_name(arg) {
            Some(template) => {
                session.set_template(template);
                println!("[Template: {}]", template.title());
            }
            None => println!("[Error: unknown template '{}']", arg),
        },
        "/provider" if arg.is_empty() => print_providers(session),
        "/provider" => match session.store_mut().select_provider(arg) {
            Ok(()) => println!(
                "[Provider: {}]",
                session.store().selected_profile().display_name
            ),
            Err(e) => println!("[Error: {}]", e),
        },
        "/key" if !arg.is_empty() => {
            let id = session.store().selected_id().to_string();
            match session.store_mut().set_custom_key(&id, arg) {
                Ok(()) => println!("[Key saved for {}]", id),
                Err(e) => println!("[Error: {}]", e),
            }
        }
        "/help" => {
            println!("/clear              reset the conversation");
            println!("/history            show how many messages are kept");
            println!("/template [name]    list or switch prompt templates");
            println!("/provider [id]      list or switch providers");
            println!("/key <key>          set the key for the current provider");
            println!("quit | exit         leave");
        }
        _ => println!("[Unknown command '{}', try /help]", command),
    }
}

pub async fn run_chat_loop(mut session: ChatSession) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    repl(&mut session, stdin, tokio::signal::ctrl_c).await
}

/// Read lines from `input` until EOF, `quit`, or `interrupt` firing at the prompt.
async fn repl<R, I, F>(session: &mut ChatSession, input: R, mut interrupt: I) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    I: FnMut() -> F,
    F: Future,
{
    println!(
        "Provider: {} | Template: {}",
        session.store().selected_profile().display_name,
        session.template().title()
    );
    if !session.store().has_usable_key() {
        println!("No API key for this provider yet. Use `/key <key>` to set one.");
    }
    println!(
        "Type your message. Type quit or exit (or press Ctrl-D) to leave, /help for commands."
    );

    let mut lines = input.lines();
    loop {
        print!("You > ");
        std::io::stdout().flush().ok();
        // Ctrl-C cancels a running reply; at the prompt it leaves.
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = interrupt() => {
                println!("\nGoodbye!");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "/quit" | "/exit") {
            println!("Goodbye!");
            break;
        }
        if input.starts_with('/') {
            run_slash_command(session, input);
            continue;
        }

        print!("Assistant > ");
        std::io::stdout().flush().ok();
        if let Err(e) = send_and_print(session, input).await {
            report_error(session, &e);
        }
        println!();
    }
    Ok(())
}
