//! CLI surface: one subcommand per component plus an `all-in-one` dev
//! mode, each a `clap`-derived variant of `Commands`.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "callrelay", about = "Real-time call transcription and intent pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest Gateway: terminates carrier/native audio WebSockets.
    Gateway {
        #[arg(long, env = "PORT", default_value_t = 8443)]
        port: u16,
    },
    /// ASR Worker: per-call audio aggregation and provider sessions.
    AsrWorker,
    /// Transcript Consumer: forwards bus transcripts to the App API.
    Consumer {
        #[arg(long, env = "APP_BASE_URL", default_value = "http://127.0.0.1:3001")]
        app_base_url: String,
    },
    /// App API: HTTP ingest, SSE hub and the Intent/Disposition services.
    App {
        #[arg(long, env = "PORT", default_value_t = 3001)]
        port: u16,
        #[arg(long, env = "DATABASE_URL", default_value = "sqlite::memory:")]
        database_url: String,
    },
    /// Runs every component in one process, sharing one in-memory bus —
    /// intended for local development only.
    AllInOne {
        #[arg(long, env = "APP_PORT", default_value_t = 3001)]
        app_port: u16,
        #[arg(long, env = "GATEWAY_PORT", default_value_t = 8443)]
        gateway_port: u16,
        #[arg(long, env = "DATABASE_URL", default_value = "sqlite::memory:")]
        database_url: String,
    },
}
