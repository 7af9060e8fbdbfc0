use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pak",
    about = "Browse, preview and extract Eyedentity .pak archives.",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(visible_aliases = ["l", "ls"], about = "List files in the loaded paks")]
    List(ListArgs),

    #[command(about = "Show the merged directory tree")]
    Tree(TreeArgs),

    #[command(about = "Show pak or entry information")]
    Info(InfoArgs),

    #[command(about = "Write the content of an entry to stdout")]
    Cat(CatArgs),

    #[command(visible_alias = "x", about = "Extract entries to a directory")]
    Extract(ExtractArgs),
}

/// Where the namespace comes from: explicit paks, or a virtual pak directory.
#[derive(Debug, clap::Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Pak file to load; repeat to overlay several, later ones winning
    #[arg(short = 'p', long = "pak", value_name = "FILE")]
    pub paks: Vec<PathBuf>,

    /// Load every .pak file in a directory as one virtual pak
    #[arg(long = "virtual", value_name = "DIR")]
    pub virtual_dir: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output in JSON format
    #[arg(short = 'j', long)]
    pub json: bool,
}

#[derive(Debug, clap::Args)]
pub struct TreeArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Maximum depth to descend
    #[arg(short = 'd', long)]
    pub depth: Option<usize>,

    /// Directory to start from (defaults to the root)
    pub path: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Optional entry to show info for
    pub path: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct CatArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Entry to print, e.g. resource/uistring/uistring.xml
    pub path: String,

    /// Write bytes as stored, without decoding EUC-KR text
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, clap::Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output directory (defaults to current directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Entries to extract; directories contribute their contents (extracts everything if none specified)
    pub paths: Vec<String>,
}
