//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;
use reqmind_core::AppConfig;

/// ReqMind - ask questions about your requirements documents
#[derive(Parser, Debug)]
#[command(name = "reqmind")]
#[command(about = "Answer questions about requirements documents with cited sources")]
#[command(version)]
pub struct Cli {
    /// Ask a single question, print the answer and exit
    #[arg(short, long, value_name = "TEXT")]
    pub query: Option<String>,

    /// Rebuild the index from the corpus directory
    #[arg(long)]
    pub recreate: bool,

    /// Directory with .txt, .md and .pdf documents
    #[arg(long, value_name = "DIR")]
    pub corpus_dir: Option<PathBuf>,

    /// Directory holding the vector index
    #[arg(long, value_name = "DIR")]
    pub index_dir: Option<PathBuf>,

    /// Number of chunks retrieved per question
    #[arg(long, value_name = "N")]
    pub top_k: Option<usize>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Print as JSON (one-shot mode only)
    #[arg(long)]
    pub json: bool,

    /// Log pipeline progress to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command line overrides on top of environment configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.corpus_dir {
            config.corpus_dir = dir.clone();
        }
        if let Some(dir) = &self.index_dir {
            config.index_dir = dir.clone();
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }
    }
}
