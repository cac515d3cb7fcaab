use clap::{Parser, Subcommand};
use std::path::PathBuf;
use todo_core::error::AppError;

#[derive(Parser, Debug)]
#[command(author, version, about = "Todo list chat bot with daily reminders", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path of the JSON config file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve chats through the Telegram Bot API
    ///
    /// Example: TELEGRAM_APITOKEN=123:abc todo_bot telegram
    Telegram,
    /// Talk to the bot on stdin/stdout as a single chat
    ///
    /// Example: todo_bot console --chat-id 42
    Console {
        #[arg(long, default_value_t = 1)]
        chat_id: i64,
    },
}

/// First line of a clap error, without clap's `error: ` prefix.
pub fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}
