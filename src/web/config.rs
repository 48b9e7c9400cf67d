//! Configuration for the linkhub-web server.

use std::path::PathBuf;

use clap::Parser;

pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// REST backend for the linkhub social network.
///
/// Serves profiles, posts, connections, messages and notifications from a
/// single SQLite database.
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug, Default)]
#[command(name = "linkhub-web", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: LINKHUB_BIND] [default: 127.0.0.1:5000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Data directory holding linkhub.db [env: LINKHUB_HOME] [default: ~/.linkhub]
    #[arg(long, short = 'd')]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        let data_dir = cli
            .data_dir
            .or_else(|| std::env::var("LINKHUB_HOME").ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".linkhub"))
                    .unwrap_or_else(|_| PathBuf::from(".linkhub"))
            });

        let bind_addr = cli
            .bind
            .or_else(|| std::env::var("LINKHUB_BIND").ok())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        Self {
            bind_addr,
            data_dir,
        }
    }
}
