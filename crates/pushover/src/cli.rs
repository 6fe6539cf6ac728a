//! Clap derive structures for the `pushover` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pushover -- receive Pushover notifications on the command line
#[derive(Debug, Parser)]
#[command(
    name = "pushover",
    version,
    about = "Pushover open client: receive notifications and run commands from them",
    long_about = "Registers this machine as a Pushover open-client device, lists and\n\
        acknowledges pending messages, and listens on the realtime socket,\n\
        dispatching each message to configured shell commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "PUSHOVER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Credential file (defaults to ~/.pushover-open-client-creds.json)
    #[arg(long, env = "PUSHOVER_CREDENTIALS", global = true)]
    pub credentials: Option<PathBuf>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and register this machine as a device
    Login(LoginArgs),

    /// List pending messages
    #[command(alias = "ls")]
    Messages(MessagesArgs),

    /// Acknowledge (delete) every pending message
    Ack,

    /// Stay connected and dispatch messages as they arrive
    Listen(ListenArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account email (prompted when omitted)
    #[arg(long, short = 'e')]
    pub email: Option<String>,

    /// Account password (prompted when omitted)
    #[arg(long, env = "PUSHOVER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Two-factor code, if the account requires one
    #[arg(long)]
    pub twofa: Option<String>,

    /// Device name to register (1-25 of A-Z a-z 0-9 _ -)
    #[arg(long, short = 'n')]
    pub device_name: Option<String>,

    /// Discard any stored session and log in again
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct MessagesArgs {
    /// Print the raw message objects as JSON
    #[arg(long)]
    pub json: bool,

    /// Acknowledge the listed messages afterwards
    #[arg(long)]
    pub ack: bool,
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Skip the catch-up fetch after each (re)connect
    #[arg(long)]
    pub no_sync: bool,

    /// Do not print messages, only run configured commands
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
