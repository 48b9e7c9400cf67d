//! Logging setup and id formatting helpers.
//!
//! Log lines go through `tracing`; [`init`] installs a `tracing-subscriber`
//! formatter on stderr filtered by `RUST_LOG` (default `info`).
//!
//! Entity ids are rendered as short tags so they stand out in log output:
//!
//! ```text
//! 2026-10-15T09:12:03.120Z  INFO linkhub::connections: connection c-4 accepted by u-2 (requester u-1)
//! ```
//!
//! When stderr is a terminal, user tags get a consistent colour derived from
//! the id.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

static COLOUR_ENABLED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber. Call once at startup; later calls are ignored.
pub fn init() {
    let is_terminal = std::io::stderr().is_terminal();
    COLOUR_ENABLED.store(is_terminal, Ordering::Relaxed);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(is_terminal)
        .try_init();
}

pub fn colour_enabled() -> bool {
    COLOUR_ENABLED.load(Ordering::Relaxed)
}

const RESET: &str = "\x1b[0m";

const ID_COLOURS: &[&str] = &[
    "\x1b[91m", "\x1b[92m", "\x1b[93m", "\x1b[94m", "\x1b[95m", "\x1b[96m",
];

fn id_colour(id: i64) -> &'static str {
    ID_COLOURS[id.unsigned_abs() as usize % ID_COLOURS.len()]
}

/// Format a user id, e.g. `u-17`.
pub fn user_id(id: i64) -> String {
    if colour_enabled() {
        format!("{}u-{id}{RESET}", id_colour(id))
    } else {
        format!("u-{id}")
    }
}

/// Format a connection id, e.g. `c-4`.
pub fn conn_id(id: i64) -> String {
    format!("c-{id}")
}

/// Format a message id, e.g. `m-9`.
pub fn msg_id(id: i64) -> String {
    format!("m-{id}")
}
