//! Clap derive structures for the `botlink` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// botlink -- send natural-language commands to a robot and follow them
#[derive(Debug, Parser)]
#[command(
    name = "botlink",
    version,
    about = "Send commands to a robot and follow their progress",
    long_about = "Submits natural-language commands to a robot's HTTP API and follows\n\
        each command to completion, over the device's event stream when it is\n\
        available and by polling when it is not.",
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
    /// Device profile to use
    #[arg(long, short = 'p', env = "BOTLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device API URL (overrides profile)
    #[arg(long, short = 'u', env = "BOTLINK_URL", global = true)]
    pub url: Option<String>,

    /// Bearer token (overrides profile)
    #[arg(long, env = "BOTLINK_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "BOTLINK_OUTPUT",
        default_value = "plain",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "BOTLINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Never use the event stream; poll for status instead
    #[arg(long, global = true)]
    pub no_push: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines (default)
    Plain,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON, one object per line
    JsonCompact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a command and follow it to completion
    #[command(alias = "s")]
    Send(SendArgs),

    /// Fetch the current status of a command once
    Status(StatusArgs),

    /// Stream sync events until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Check that the device API is reachable
    Health,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Send ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Natural-language command, e.g. "go to the kitchen"
    pub prompt: String,

    /// Extra options as a JSON object
    #[arg(long, value_name = "JSON")]
    pub options: Option<String>,

    /// Print the request id and exit without following the command
    #[arg(long)]
    pub no_wait: bool,

    /// Give up after this many busy responses
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Stop following after this many seconds
    #[arg(long, value_name = "SECS")]
    pub wait_timeout: Option<u64>,
}

// ── Status / Watch ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Request id returned by `send`
    pub request_id: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Track this request id (otherwise only push events are shown)
    pub request_id: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile
    Init {
        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Device API URL
        #[arg(long = "device-url", value_name = "URL")]
        device_url: String,

        /// Environment variable that holds the bearer token
        #[arg(long)]
        token_env: Option<String>,

        /// Poll instead of using the event stream
        #[arg(long)]
        poll_only: bool,

        /// Make this the default profile
        #[arg(long)]
        set_default: bool,

        /// Overwrite an existing profile
        #[arg(long)]
        force: bool,
    },

    /// Display the resolved configuration (tokens redacted)
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
