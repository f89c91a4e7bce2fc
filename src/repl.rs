//! Line-oriented chat session on stdin/stdout.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::{chat, knowledge};
use crate::db::models::Chat;
use crate::error::AppError;
use crate::rag::IngestOutcome;
use crate::session::SessionContext;
use crate::state::AppState;

const HELP: &str = "\
Type a question to chat. Commands:
  /new              start a new chat
  /chats            list chats
  /open <n|id>      switch to a chat
  /delete <n|id>    delete a chat
  /upload <path>    attach a PDF, TXT or DOCX file to the current chat
  /voice <path>     ask a question from a recorded audio file
  /history          show the current transcript
  /help             show this help
  /quit             leave";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    New,
    Chats,
    Open(String),
    Delete(String),
    Upload(PathBuf),
    Voice(PathBuf),
    History,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Ask(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg.is_empty()) {
            ("new", _) => Command::New,
            ("chats", _) => Command::Chats,
            ("history", _) => Command::History,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            ("open", false) => Command::Open(arg.to_string()),
            ("delete", false) => Command::Delete(arg.to_string()),
            ("upload", false) => Command::Upload(PathBuf::from(arg)),
            ("voice", false) => Command::Voice(PathBuf::from(arg)),
            ("open" | "delete" | "upload" | "voice", true) => {
                Command::Invalid(format!("/{} needs an argument", name))
            }
            _ => Command::Invalid(format!("unknown command /{}", name)),
        }
    }
}

/// Resolve a 1-based position in the last listing, or a literal chat id.
fn resolve_chat<'a>(listing: &'a [Chat], key: &str) -> Option<&'a Chat> {
    if let Ok(n) = key.parse::<usize>() {
        if let Some(chat) = n.checked_sub(1).and_then(|i| listing.get(i)) {
            return Some(chat);
        }
    }
    listing.iter().find(|c| c.id == key)
}

pub async fn run(state: &AppState) -> Result<(), AppError> {
    let mut ctx = SessionContext::new();
    let mut listing = chat::list_chats(state).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("How can I help you today? (/help for commands)");
    while let Some(line) = lines.next_line().await? {
        let command = Command::parse(&line);
        if command == Command::Quit {
            break;
        }
        if let Err(e) = dispatch(state, &mut ctx, &mut listing, command).await {
            tracing::error!("turn failed: {}", e);
            println!("Error: {}", e);
        }
    }
    Ok(())
}

async fn dispatch(
    state: &AppState,
    ctx: &mut SessionContext,
    listing: &mut Vec<Chat>,
    command: Command,
) -> Result<(), AppError> {
    match command {
        Command::Ask(question) => {
            let reply = chat::send_message(state, ctx, &question).await?;
            println!("assistant: {}", reply.content);
        }
        Command::New => {
            let chat = chat::new_chat(state, ctx).await?;
            println!("Started chat {}", chat.id);
        }
        Command::Chats => {
            *listing = chat::list_chats(state).await?;
            if listing.is_empty() {
                println!("No chats yet.");
            }
            for (i, c) in listing.iter().enumerate() {
                let marker = if ctx.chat_id.as_deref() == Some(c.id.as_str()) { "*" } else { " " };
                println!("{}{:>3}. {}", marker, i + 1, c.display_title());
            }
        }
        Command::Open(key) => match resolve_chat(listing, &key) {
            Some(c) => {
                chat::select_chat(state, ctx, &c.id).await?;
                println!("Opened \"{}\"", c.display_title());
                print_history(ctx);
            }
            None => println!("No such chat: {} (try /chats)", key),
        },
        Command::Delete(key) => match resolve_chat(listing, &key).map(|c| c.id.clone()) {
            Some(id) => {
                chat::delete_chat(state, ctx, &id).await?;
                *listing = chat::list_chats(state).await?;
                println!("Deleted.");
            }
            None => println!("No such chat: {} (try /chats)", key),
        },
        Command::Upload(path) => match knowledge::upload_file(state, ctx, &path).await? {
            IngestOutcome::Stored { .. } => println!("File processed!"),
            IngestOutcome::Duplicate => println!("Already processed."),
            IngestOutcome::Unsupported | IngestOutcome::Empty => {}
        },
        Command::Voice(path) => {
            let audio = tokio::fs::read(&path).await?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("audio.wav")
                .to_string();
            let (question, reply) = chat::voice_message(state, ctx, audio, &file_name).await?;
            println!("user: {}", question);
            println!("assistant: {}", reply.content);
        }
        Command::History => print_history(ctx),
        Command::Help => println!("{}", HELP),
        Command::Invalid(reason) => println!("{}", reason),
        Command::Empty | Command::Quit => {}
    }
    Ok(())
}

fn print_history(ctx: &SessionContext) {
    for m in &ctx.messages {
        println!("{}: {}", m.role, m.content);
    }
}
