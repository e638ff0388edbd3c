//! CLI command bodies for redliner: segment, annotate, outline, resolve, preview, export, demo.

use std::path::Path;

use chrono::Utc;

use crate::annotator::{self, BlockIndex};
use crate::assembler::{self, Composition, ExportMode, ExportRequest};
use crate::config::Config;
use crate::docx;
use crate::error;
use crate::fixtures;
use crate::intake::{self, Decisions};
use crate::resolver::{self, BlockResolution, Change, DiscardReason, ResolvedEdit};
use crate::segmenter;
use crate::types::{AnalysisResult, Block, Document, EditOperation};

/// Excerpt length used to label blocks in the resolution report.
const REPORT_EXCERPT_CHARS: usize = 60;

/// Where the edits for one run come from.
pub struct Inputs<'a> {
    /// Analysis result JSON.
    pub analysis: &'a Path,
    /// Reviewer decisions JSON; every issue takes the defaults when absent.
    pub decisions: Option<&'a Path>,
    /// Selected edits JSON, used instead of the analysis plans.
    pub edits: Option<&'a Path>,
}

/// Parsed and cross-checked inputs.
struct Loaded {
    /// Analysis with block references validated against `document`.
    analysis: AnalysisResult,
    /// Segmented document, if one was given.
    document: Option<Document>,
    /// Selected edit proposals, not yet resolved.
    edits: Vec<EditOperation>,
}

/// Print the block-marker stream for a segmented document.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the document is missing, or
/// `Error::DocumentInvalid` / `Error::Json` if it does not parse.
pub fn annotate(document: &Path, readable: bool) -> Result<(), error::Error> {
    let doc = load_document(document)?;
    let stream = if readable {
        annotator::annotate_readable(&doc.blocks)
    } else {
        annotator::annotate(&doc.blocks)
    };
    println!("{stream}");
    return Ok(());
}

/// Assemble one export from loaded inputs, stamped with the current time.
fn compose(loaded: &Loaded, mode: ExportMode, config: &Config) -> Composition {
    let request = ExportRequest {
        analysis: &loaded.analysis,
        document: loaded.document.as_ref(),
        edits: &loaded.edits,
        mode,
    };
    return assembler::assemble(&request, config, Utc::now());
}

/// Write the sample document, its analysis and both exports into `dir`.
///
/// # Errors
///
/// Returns `Error::Io` if the directory or a file cannot be written, or
/// package errors from the DOCX writer.
pub fn demo(dir: &Path, config: &Config) -> Result<(), error::Error> {
    std::fs::create_dir_all(dir)?;

    let document = fixtures::sample_document();
    let analysis = fixtures::sample_analysis(&document);
    let edits = intake::select_edits(&analysis.issues, &Decisions::new(), config.include_comments);

    std::fs::write(dir.join("document.json"), serde_json::to_string_pretty(&document)?)?;
    std::fs::write(dir.join("analysis.json"), serde_json::to_string_pretty(&analysis)?)?;

    let loaded = Loaded { analysis, document: Some(document), edits };
    for (mode, name) in [(ExportMode::Redline, "redline.docx"), (ExportMode::Clean, "clean.docx")] {
        let composition = compose(&loaded, mode, config);
        std::fs::write(dir.join(name), docx::write_package(&composition)?)?;
    }

    eprintln!(
        "Wrote document.json, analysis.json, redline.docx and clean.docx to {}",
        dir.display()
    );
    return Ok(());
}

/// One-line description of what a kept edit does.
fn describe_change(edit: &ResolvedEdit) -> String {
    return match &edit.change {
        Change::Append(text) => format!("append {text:?}"),
        Change::Delete(range) => format!("delete [{}, {})", range.start, range.end),
        Change::Replace(range, text) => format!("replace [{}, {}) with {text:?}", range.start, range.end),
    };
}

/// One-line description of why an edit was dropped.
fn describe_reason(reason: &DiscardReason) -> String {
    return match reason {
        DiscardReason::DegenerateRange { end, len, start } => {
            format!("empty range [{start}, {end}) in a block of {len} chars")
        },
        DiscardReason::EmptyInsertion => "nothing to append".to_string(),
        DiscardReason::Overlap { kept_end } => format!("overlaps a kept edit ending at {kept_end}"),
    };
}

/// Assemble an export and write it as a DOCX package.
///
/// Without a document, or when no edit survives, the summary layout is
/// written regardless of `mode`.
///
/// # Errors
///
/// Returns input errors from loading, package errors from the DOCX writer,
/// or `Error::Io` if the output cannot be written.
pub fn export(
    document: Option<&Path>,
    inputs: &Inputs<'_>,
    mode: ExportMode,
    output: &Path,
    config: &Config,
) -> Result<(), error::Error> {
    let loaded = load_inputs(document, inputs, config)?;
    let composition = compose(&loaded, mode, config);
    let bytes = docx::write_package(&composition)?;
    std::fs::write(output, bytes)?;

    let layout = format!("{:?}", composition.layout).to_lowercase();
    eprintln!("Wrote {layout} export to {}", output.display());
    return Ok(());
}

/// Load config from `--config` or the working directory, then apply flag overrides.
///
/// # Errors
///
/// Returns `Error::ConfigNotFound` if an explicit config path is missing, or
/// `Error::TomlDe` / `Error::Io` if the file cannot be read.
pub fn load_config(explicit: Option<&Path>, author: Option<&str>, no_comments: bool) -> Result<Config, error::Error> {
    let mut config = match explicit {
        Some(path) => Config::load_from(path)?,
        None => Config::load(Path::new("."))?,
    };
    if let Some(author) = author {
        config.author = author.to_string();
    }
    if no_comments {
        config.include_comments = false;
    }
    return Ok(config);
}

/// Read and validate document JSON.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the file is missing, or parse errors from
/// [`Document::from_json`].
fn load_document(path: &Path) -> Result<Document, error::Error> {
    return Document::from_json(&read_input(path)?);
}

/// Read every input, validate the analysis against the document, and select edits.
///
/// # Errors
///
/// Returns `Error::FileNotFound` for a missing input, or the parse error of
/// whichever input is malformed.
fn load_inputs(document: Option<&Path>, inputs: &Inputs<'_>, config: &Config) -> Result<Loaded, error::Error> {
    let document = document.map(load_document).transpose()?;
    let raw = read_input(inputs.analysis)?;
    let mut analysis = intake::parse_analysis(&raw)?;

    if let Some(doc) = &document {
        intake::validate_references(&mut analysis, &doc.blocks);
        for id in annotator::unresolved_markers(&raw, &doc.blocks) {
            log::warn!("analysis quotes a marker for block {id}, which is not in {}", doc.filename);
        }
    }

    let edits = if let Some(path) = inputs.edits {
        intake::parse_edits(&read_input(path)?)?
    } else {
        let decisions = match inputs.decisions {
            Some(path) => intake::parse_decisions(&read_input(path)?)?,
            None => Decisions::new(),
        };
        intake::select_edits(&analysis.issues, &decisions, config.include_comments)
    };

    log::info!("loaded {} issues and {} proposed edits", analysis.issues.len(), edits.len());
    return Ok(Loaded { analysis, document, edits });
}

/// Print the heading outline and metadata of a segmented document.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the document is missing, or parse errors.
pub fn outline(document: &Path) -> Result<(), error::Error> {
    let doc = load_document(document)?;
    print!("{}", annotator::outline(&doc));
    return Ok(());
}

/// Print the assembled export as plain text.
///
/// # Errors
///
/// Returns input errors from loading.
pub fn preview(document: &Path, inputs: &Inputs<'_>, mode: ExportMode, config: &Config) -> Result<(), error::Error> {
    let loaded = load_inputs(Some(document), inputs, config)?;
    print!("{}", crate::preview::render_preview(&compose(&loaded, mode, config)));
    return Ok(());
}

/// Print what happened to the proposals for one block.
fn print_block_report(index: &BlockIndex<'_>, doc: &Document, position: usize, resolution: &BlockResolution, issues: &[&str]) {
    let section = annotator::find_parent_heading(&doc.blocks, position)
        .map_or("(no section)", |heading: &Block| return heading.text.as_str());
    let text = annotator::excerpt(index, std::slice::from_ref(&resolution.block_id), REPORT_EXCERPT_CHARS);

    println!("## {} [{section}]", resolution.block_id);
    println!("{text}");
    if !issues.is_empty() {
        println!("issues: {}", issues.join(", "));
    }
    for edit in resolution.edits() {
        println!("  KEPT       {}  {}", edit.id, describe_change(edit));
    }
    for dropped in &resolution.discarded {
        println!("  DISCARDED  {}  {}", dropped.edit_id, describe_reason(&dropped.reason));
    }
    println!();
    return;
}

/// Read an input file, reporting a missing one by path.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the file does not exist, or `Error::Io`.
fn read_input(path: &Path) -> Result<String, error::Error> {
    return std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            return error::Error::FileNotFound { path: path.to_path_buf() };
        }
        return error::Error::Io(e);
    });
}

/// Resolve the selected edits against the document and report the outcome.
///
/// With `json`, prints the surviving edits as operations instead, in
/// document order.
///
/// # Errors
///
/// Returns input errors from loading, or `Error::Json` if serializing fails.
pub fn resolve(document: &Path, inputs: &Inputs<'_>, json: bool, config: &Config) -> Result<(), error::Error> {
    let loaded = load_inputs(Some(document), inputs, config)?;
    let Some(doc) = loaded.document.as_ref() else {
        return Ok(());
    };
    let set = resolver::resolve_document(&doc.blocks, &loaded.edits);

    if json {
        let kept: Vec<EditOperation> = doc
            .blocks
            .iter()
            .filter_map(|b| return set.for_block(&b.id))
            .flat_map(BlockResolution::to_operations)
            .collect();
        println!("{}", serde_json::to_string_pretty(&kept)?);
        return Ok(());
    }

    let cited = annotator::issues_by_block(&loaded.analysis.issues);
    let index = BlockIndex::new(&doc.blocks);
    for (position, block) in doc.blocks.iter().enumerate() {
        let Some(resolution) = set.for_block(&block.id) else { continue };
        let issues = cited.get(&block.id).map_or(&[][..], Vec::as_slice);
        print_block_report(&index, doc, position, resolution, issues);
    }

    for op in &set.rejected {
        println!("REJECTED   {}  block {} does not exist", op.id, op.block_id);
    }
    if !set.rejected.is_empty() {
        println!();
    }

    println!(
        "{} kept, {} discarded, {} rejected",
        set.kept_count(),
        set.discarded_count(),
        set.rejected.len()
    );
    return Ok(());
}

/// Split extracted text into paragraphs, segment it, and write Document JSON.
///
/// The filename defaults to the text file's own name.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the text file is missing, or `Error::Io`
/// if the output cannot be written.
pub fn segment(
    text: &Path,
    filename: Option<&str>,
    pages: Option<u32>,
    output: Option<&Path>,
) -> Result<(), error::Error> {
    let raw = read_input(text)?;
    let paragraphs = segmenter::split_paragraphs(&raw);
    let name = filename.map_or_else(
        || return text.file_name().map(|n| return n.to_string_lossy().into_owned()).unwrap_or_default(),
        str::to_string,
    );

    let doc = segmenter::segment_document(&name, &paragraphs, pages);
    let json = serde_json::to_string_pretty(&doc)?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))?;
            eprintln!("Segmented {} blocks into {}", doc.blocks.len(), path.display());
        },
        None => println!("{json}"),
    }
    return Ok(());
}
