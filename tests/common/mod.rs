//! Common test utilities: tracing setup and arena helpers.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     let arena = common::arena(1, 4096);
//!     // ...
//!     common::assert_fully_free(&arena);
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Filter directives (e.g., `avl_arena=debug,avl_arena::tree=trace`)
//! - `AVL_ARENA_LOG_DIR`: Log directory (default: `logs/`)
//! - `AVL_ARENA_LOG_CONSOLE`: Set to "0" to disable console output
//!
//! Crate-internal events are only emitted when the tests are built with
//! `--features tracing`.
//!
//! # Log Files
//!
//! Logs are written to `logs/avl_arena.jsonl` as newline-delimited JSON.
//!
//! ```bash
//! # Every exhausted request
//! cat logs/avl_arena.jsonl | jq 'select(.fields.message == "arena exhausted")'
//!
//! # Merges touching one block offset
//! cat logs/avl_arena.jsonl | jq 'select(.fields.message == "coalesced")'
//! ```

#![allow(dead_code)]

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Once;

use avl_arena::{Arena, ArenaConfig};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber with file and console logging.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        setup_tracing();
    });
}

/// Configuration for tracing setup.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Directory for log files.
    pub log_dir: PathBuf,
    /// Log file name.
    pub log_file: String,
    /// Enable console output.
    pub console_enabled: bool,
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_file: "avl_arena.jsonl".to_string(),
            console_enabled: true,
            default_level: Level::INFO,
        }
    }
}

impl TracingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var("AVL_ARENA_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if env::var("AVL_ARENA_LOG_CONSOLE").is_ok_and(|v| v == "0") {
            config.console_enabled = false;
        }

        config
    }
}

fn make_filter(default_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{default_level}")))
}

#[expect(clippy::expect_used)]
fn setup_tracing() {
    let config = TracingConfig::from_env();

    std::fs::create_dir_all(&config.log_dir).expect("Failed to create log directory");
    let log_path = config.log_dir.join(&config.log_file);

    // Append: nextest runs tests in separate processes.
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .expect("Failed to open log file");

    let console_layer = config.console_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .compact()
            .with_filter(make_filter(config.default_level))
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(make_filter(config.default_level));

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

// ============================================================================
//  Arena helpers
// ============================================================================

/// Arena of `block_count` blocks of `block_size` bytes, default granularity.
#[expect(clippy::expect_used)]
pub fn arena(block_count: usize, block_size: usize) -> Arena {
    Arena::new(ArenaConfig::new(block_count, block_size)).expect("valid test arena")
}

/// Every block is back to a single free segment and nothing is live.
#[expect(clippy::expect_used)]
pub fn assert_fully_free(arena: &Arena) {
    arena.validate().expect("arena invariants");

    let stats = arena.stats();
    let usable = arena.config().usable_block_size();

    assert_eq!(stats.live_allocations, 0, "leaked allocations: {stats:?}");
    assert_eq!(stats.free_segments(), stats.blocks.len(), "not coalesced: {stats:?}");
    assert_eq!(stats.largest_free(), usable);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_init() {
        init_tracing();
        tracing::info!("Tracing initialized successfully");
        tracing::debug!(blocks = 1, block_size = 4096, "Debug event");
    }

    #[test]
    fn test_fresh_arena_is_fully_free() {
        assert_fully_free(&arena(3, 4096));
    }
}
