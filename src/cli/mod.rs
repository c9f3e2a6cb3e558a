//! CLI Module
//!
//! Command-line interface for working with OpenRaster documents.

pub mod commands;
pub mod script;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use script::{PaintScript, ScriptOp};

/// orapaint - layered painting documents from the command line
#[derive(Parser, Debug)]
#[command(name = "orapaint")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a blank single-layer document
    #[command(name = "new")]
    New {
        /// Output .ora path
        path: PathBuf,

        /// Canvas width (defaults to the configured canvas)
        #[arg(long)]
        width: Option<u32>,

        /// Canvas height (defaults to the configured canvas)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Print canvas size and layer list
    #[command(name = "info")]
    Info {
        /// Document to inspect
        path: PathBuf,
    },

    /// Composite all visible layers into one PNG
    #[command(name = "flatten")]
    Flatten {
        /// Document to flatten
        path: PathBuf,

        /// Output PNG
        #[arg(short, long)]
        output: PathBuf,

        /// Keep transparency instead of compositing over white
        #[arg(long)]
        transparent: bool,
    },

    /// Unpack a document into a directory
    #[command(name = "extract")]
    Extract {
        /// Document to unpack
        path: PathBuf,

        /// Destination directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replay a JSON paint script and save the result
    #[command(name = "paint")]
    Paint {
        /// Script file
        script: PathBuf,

        /// Output .ora path
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the composited view as PNG
        #[arg(long)]
        preview: Option<PathBuf>,
    },
}
