mod annotator;
mod assembler;
mod clean;
mod commands;
mod config;
mod diagnostics;
mod docx;
mod error;
mod fixtures;
mod intake;
mod preview;
mod redline;
mod resolver;
mod segmenter;
mod types;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use crate::assembler::ExportMode;
use crate::commands::Inputs;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "redliner", version, about = "Block-addressed contract redlining")]
struct Cli {
    /// Revision author for tracked changes and comments
    #[arg(long, global = true)]
    author: Option<String>,
    /// What to do.
    #[command(subcommand)]
    command: Commands,
    /// Config file to use instead of `.redliner.toml` in the working directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Leave edit rationales out of exports
    #[arg(long, global = true)]
    no_comments: bool,
}

/// Subcommands, one per pipeline stage.
#[derive(Subcommand)]
enum Commands {
    /// Print the block-marker stream the analysis step reads
    Annotate {
        /// Segmented document JSON
        document: PathBuf,
        /// Add section dividers before headings
        #[arg(long)]
        readable: bool,
    },
    /// Write a sample contract, its analysis and both exports
    Demo {
        /// Output directory
        dir: PathBuf,
    },
    /// Write the review as a DOCX package
    Export {
        /// Analysis result JSON
        analysis: PathBuf,
        /// Segmented document JSON; without it only the summary is written
        #[arg(long)]
        document: Option<PathBuf>,
        /// Tracked changes or revised text
        #[arg(long, value_enum)]
        mode: ExportMode,
        /// Output .docx path
        #[arg(short, long)]
        output: PathBuf,
        /// Decisions or explicit edits.
        #[command(flatten)]
        sources: EditSources,
    },
    /// Print the heading outline and document statistics
    Outline {
        /// Segmented document JSON
        document: PathBuf,
    },
    /// Print the export as plain text with change markup
    Preview {
        /// Segmented document JSON
        document: PathBuf,
        /// Analysis result JSON
        analysis: PathBuf,
        /// Tracked changes or revised text
        #[arg(long, value_enum, default_value_t = ExportMode::Redline)]
        mode: ExportMode,
        /// Decisions or explicit edits.
        #[command(flatten)]
        sources: EditSources,
    },
    /// Report which proposed edits survive, block by block
    Resolve {
        /// Segmented document JSON
        document: PathBuf,
        /// Analysis result JSON
        analysis: PathBuf,
        /// Print surviving edits as JSON operations
        #[arg(long)]
        json: bool,
        /// Decisions or explicit edits.
        #[command(flatten)]
        sources: EditSources,
    },
    /// Split extracted text into blocks and write Document JSON
    Segment {
        /// Extracted plain text, paragraphs separated by blank lines
        text: PathBuf,
        /// Source filename to record; defaults to the text file's name
        #[arg(long)]
        filename: Option<String>,
        /// Page count of the source file
        #[arg(long)]
        pages: Option<u32>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Where the selected edits come from when not taken from the default plans.
#[derive(Args)]
struct EditSources {
    /// Reviewer decisions JSON, keyed by issue id
    #[arg(long)]
    decisions: Option<PathBuf>,
    /// Selected edits JSON, bypassing the analysis plans
    #[arg(long, conflicts_with = "decisions")]
    edits: Option<PathBuf>,
}

impl EditSources {
    /// Borrow as command inputs alongside an analysis path.
    fn inputs<'a>(&'a self, analysis: &'a Path) -> Inputs<'a> {
        return Inputs {
            analysis,
            decisions: self.decisions.as_deref(),
            edits: self.edits.as_deref(),
        };
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    return match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::FAILURE
        },
    };
}

/// Load config and dispatch to the command body.
///
/// # Errors
///
/// Returns whatever the command returns.
fn run(cli: Cli) -> Result<(), error::Error> {
    let config = commands::load_config(cli.config.as_deref(), cli.author.as_deref(), cli.no_comments)?;

    return match cli.command {
        Commands::Annotate { document, readable } => commands::annotate(&document, readable),
        Commands::Demo { dir } => commands::demo(&dir, &config),
        Commands::Export { analysis, document, mode, output, sources } => {
            commands::export(document.as_deref(), &sources.inputs(&analysis), mode, &output, &config)
        },
        Commands::Outline { document } => commands::outline(&document),
        Commands::Preview { document, analysis, mode, sources } => {
            commands::preview(&document, &sources.inputs(&analysis), mode, &config)
        },
        Commands::Resolve { document, analysis, json, sources } => {
            commands::resolve(&document, &sources.inputs(&analysis), json, &config)
        },
        Commands::Segment { text, filename, pages, output } => {
            commands::segment(&text, filename.as_deref(), pages, output.as_deref())
        },
    };
}
