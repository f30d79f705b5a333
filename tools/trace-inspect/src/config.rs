use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use trace_store::CacheConfig;

#[derive(Debug, Parser)]
#[command(
    name = "trace-inspect",
    version,
    about = "Inspect instruction execution traces without loading them into memory."
)]
pub struct Cli {
    #[command(flatten)]
    pub options: Options,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct Options {
    /// Maximum number of parsed records kept in memory.
    ///
    /// Environment variable: `TRACE_INSPECT_CACHE_CAPACITY`.
    #[arg(
        long,
        global = true,
        env = "TRACE_INSPECT_CACHE_CAPACITY",
        default_value_t = CacheConfig::default().capacity
    )]
    pub cache_capacity: usize,

    /// Lines warmed in the background around each visited line (0 disables prefetch).
    ///
    /// Environment variable: `TRACE_INSPECT_PREFETCH_WINDOW`.
    #[arg(
        long,
        global = true,
        env = "TRACE_INSPECT_PREFETCH_WINDOW",
        default_value_t = CacheConfig::default().prefetch_window
    )]
    pub prefetch_window: usize,

    /// Pending prefetch requests before new ones are dropped.
    ///
    /// Environment variable: `TRACE_INSPECT_QUEUE_DEPTH`.
    #[arg(
        long,
        global = true,
        env = "TRACE_INSPECT_QUEUE_DEPTH",
        default_value_t = CacheConfig::default().queue_depth
    )]
    pub queue_depth: usize,

    /// Log filter (tracing-subscriber EnvFilter syntax).
    ///
    /// Environment variable: `TRACE_INSPECT_LOG`.
    #[arg(long, global = true, env = "TRACE_INSPECT_LOG", default_value = "warn")]
    pub log_level: String,
}

impl Options {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache_capacity,
            prefetch_window: self.prefetch_window,
            queue_depth: self.queue_depth,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the line count and size of a trace.
    Info {
        trace: PathBuf,
    },

    /// Print one record and the registers it changed.
    Show {
        trace: PathBuf,
        /// 0-based line number.
        line: usize,
        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,
    },

    /// Print consecutive records starting at a line.
    Dump {
        trace: PathBuf,
        #[arg(long, default_value_t = 0)]
        from: usize,
        #[arg(long, default_value_t = 16)]
        count: usize,
        /// One JSON object per line instead of the trace format.
        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,
    },

    /// Parse every line and report the malformed ones.
    Check {
        trace: PathBuf,
        /// Maximum number of malformed lines to list.
        #[arg(long, default_value_t = 20)]
        max_errors: usize,
    },
}
