//! Export assembly: front matter, per-block output and the summary fallback,
//! laid out as a format-neutral [`Composition`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::annotator::{BlockIndex, EXCERPT_CHARS, excerpt, find_parent_heading};
use crate::clean::render_clean;
use crate::config::{CleanScope, Config};
use crate::redline::{Span, render_redline};
use crate::resolver::{BlockResolution, EditSet, resolve_document};
use crate::types::{AnalysisResult, Block, Document, EditOperation};

/// Muted grey for dates and intro text.
const MUTED: &str = "999999";

/// Accent used for recommended actions.
const ACCENT: &str = "A64A30";

/// Export mode requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportMode {
    /// Edits applied, no change markup.
    Clean,
    /// Edits shown as tracked changes.
    Redline,
}

/// What the composition actually holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Revised text.
    Clean,
    /// Tracked changes.
    Redline,
    /// Findings only; used when there is nothing to edit.
    Summary,
}

/// A comment anchored to the spans of one edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Edit whose spans the comment covers.
    pub edit_id: String,
    /// Sequential id, starting at 1.
    pub id: u32,
    /// Comment body.
    pub text: String,
}

/// Author identity and timestamp shared by every change and comment of one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Change author.
    pub author: String,
    /// Comment initials.
    pub initials: String,
    /// Export time.
    pub timestamp: DateTime<Utc>,
}

/// A text run with character formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// Bold weight.
    pub bold: bool,
    /// Hex RGB color.
    pub color: Option<String>,
    /// Italic style.
    pub italic: bool,
    /// Literal text.
    pub text: String,
}

impl Run {
    /// Make the run bold.
    #[must_use]
    pub const fn bold(mut self) -> Self {
        self.bold = true;
        return self;
    }

    /// Color the run.
    #[must_use]
    pub fn color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        return self;
    }

    /// Make the run italic.
    #[must_use]
    pub const fn italic(mut self) -> Self {
        self.italic = true;
        return self;
    }

    /// An unformatted run.
    pub fn plain(text: impl Into<String>) -> Self {
        return Self {
            bold: false,
            color: None,
            italic: false,
            text: text.into(),
        };
    }
}

/// One body element, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// Heading at the given outline level.
    Heading {
        /// 1 to 3.
        level: u8,
        /// Runs of the heading text.
        runs: Vec<Run>,
    },
    /// Body paragraph.
    Paragraph(Vec<Run>),
    /// Quoted contract text, set off from the body.
    Quote(Vec<Run>),
    /// A block rendered with tracked changes.
    Redline(Vec<Span>),
    /// Horizontal separator.
    Rule,
    /// Two-column label/value table.
    Table(Vec<(String, String)>),
}

impl Element {
    /// Heading made of a single bold run.
    fn heading(level: u8, text: impl Into<String>) -> Self {
        return Self::Heading {
            level,
            runs: vec![Run::plain(text).bold()],
        };
    }

    /// Paragraph made of a single run.
    fn text(run: Run) -> Self {
        return Self::Paragraph(vec![run]);
    }
}

/// A laid-out export, ready to write as a package or print as text.
#[derive(Debug, Clone)]
pub struct Composition {
    /// Header brand label.
    pub brand: String,
    /// Comments, in id order.
    pub comments: Vec<Comment>,
    /// Body elements.
    pub elements: Vec<Element>,
    /// Document font.
    pub font: String,
    /// Header text after the brand: document name and layout.
    pub header_label: String,
    /// What the body holds.
    pub layout: Layout,
    /// Author and timestamp for changes, comments and package properties.
    pub revision: Revision,
    /// Package title.
    pub title: String,
}

impl Composition {
    /// Comment anchored to an edit, if any.
    pub fn comment_for(&self, edit_id: &str) -> Option<&Comment> {
        return self.comments.iter().find(|c| return c.edit_id == edit_id);
    }

    /// Long-form date of the export, e.g. `October 19, 2026`.
    pub fn date_label(&self) -> String {
        return self.revision.timestamp.format("%B %-d, %Y").to_string();
    }

    /// Whether the package should open with change tracking on.
    pub fn tracks_revisions(&self) -> bool {
        return self.layout == Layout::Redline;
    }
}

/// Everything one export needs.
pub struct ExportRequest<'a> {
    /// Validated analysis result.
    pub analysis: &'a AnalysisResult,
    /// Segmented document; `None` forces the summary layout.
    pub document: Option<&'a Document>,
    /// Selected proposals, not yet resolved.
    pub edits: &'a [EditOperation],
    /// Requested mode.
    pub mode: ExportMode,
}

/// Lay out an export.
///
/// Falls back to the summary layout when there is no document or no block
/// keeps a single edit after resolution.
pub fn assemble(request: &ExportRequest<'_>, config: &Config, timestamp: DateTime<Utc>) -> Composition {
    let revision = Revision {
        author: config.author.clone(),
        initials: config.initials.clone(),
        timestamp,
    };
    let mut composition = Composition {
        brand: config.brand.clone(),
        comments: Vec::new(),
        elements: Vec::new(),
        font: config.font.clone(),
        header_label: String::new(),
        layout: Layout::Summary,
        revision,
        title: String::new(),
    };

    let resolved = request
        .document
        .filter(|doc| return !doc.blocks.is_empty())
        .map(|doc| return (doc, resolve_document(&doc.blocks, request.edits)))
        .filter(|(_, set)| return set.has_edits());

    let Some((doc, set)) = resolved else {
        log::info!("no edits survive resolution, exporting the summary document");
        let name = request.document.map_or(request.analysis.document.as_str(), |d| return d.filename.as_str());
        compose_summary(&mut composition, request.analysis, request.document, name);
        return composition;
    };

    let name = if doc.filename.is_empty() { "Document" } else { doc.filename.as_str() };
    match request.mode {
        ExportMode::Clean => compose_clean(&mut composition, request.analysis, doc, &set, config, name),
        ExportMode::Redline => compose_redline(&mut composition, request.analysis, doc, &set, config, name),
    }
    log::info!(
        "assembled {:?} export: {} edits kept, {} discarded, {} rejected",
        composition.layout,
        set.kept_count(),
        set.discarded_count(),
        set.rejected.len(),
    );
    return composition;
}

/// Clean layout: revised text with edits applied.
fn compose_clean(
    composition: &mut Composition,
    analysis: &AnalysisResult,
    doc: &Document,
    set: &EditSet,
    config: &Config,
    name: &str,
) {
    composition.layout = Layout::Clean;
    composition.title = format!("{name} — Revised");
    composition.header_label = format!("{name} — Revised Document");

    let kept = set.kept_count();
    let plural = if kept == 1 { "" } else { "s" };
    let generated = format!("Generated: {} — {kept} edit{plural} applied", composition.date_label());
    front_matter(composition, analysis, "Revised Document", generated);

    match config.clean_scope {
        CleanScope::Edited => {
            composition.elements.push(Element::heading(2, "Revised Clauses"));
            composition.elements.push(Element::text(
                Run::plain("The following clauses show the proposed language with all changes accepted.")
                    .italic()
                    .color("666666"),
            ));
            for_each_edited_block(composition, doc, set, &config.fallback_section, |block, resolution| {
                return Element::text(Run::plain(render_clean(block, Some(resolution))));
            });
        },
        CleanScope::Full => {
            composition.elements.push(Element::heading(2, "Revised Text"));
            for block in &doc.blocks {
                let text = render_clean(block, set.for_block(&block.id));
                if text.trim().is_empty() {
                    continue;
                }
                let element = match block.heading_level() {
                    Some(level) => Element::heading(level.clamp(1, 3), text),
                    None => Element::text(Run::plain(text)),
                };
                composition.elements.push(element);
            }
        },
    }

    next_steps(composition, analysis);
}

/// Redline layout: edited blocks as tracked changes under section headers.
fn compose_redline(
    composition: &mut Composition,
    analysis: &AnalysisResult,
    doc: &Document,
    set: &EditSet,
    config: &Config,
    name: &str,
) {
    composition.layout = Layout::Redline;
    composition.title = format!("{name} — Redline Review");
    composition.header_label = format!("{name} — Redline Review");

    if config.include_comments {
        let with_comments = doc
            .blocks
            .iter()
            .filter_map(|b| return set.for_block(&b.id))
            .flat_map(|r| return r.edits())
            .filter_map(|e| return e.comment.as_ref().map(|text| return (e.id.clone(), text.clone())));
        composition.comments = (1_u32..)
            .zip(with_comments)
            .map(|(id, (edit_id, text))| return Comment { edit_id, id, text })
            .collect();
    }

    let generated = format!("Generated: {}", composition.date_label());
    front_matter(composition, analysis, "Redline Review", generated);

    composition.elements.push(Element::heading(2, "Proposed Changes"));
    composition.elements.push(Element::text(
        Run::plain(
            "The following clauses contain proposed edits shown as tracked changes. \
             Review and accept or reject each change in your word processor.",
        )
        .italic()
        .color("666666"),
    ));
    for_each_edited_block(composition, doc, set, &config.fallback_section, |block, resolution| {
        return Element::Redline(render_redline(block, Some(resolution)));
    });

    next_steps(composition, analysis);
}

/// Summary layout: findings with no block content.
fn compose_summary(
    composition: &mut Composition,
    analysis: &AnalysisResult,
    doc: Option<&Document>,
    name: &str,
) {
    let name = if name.is_empty() { "Document" } else { name };
    composition.layout = Layout::Summary;
    composition.title = format!("{name} — Contract Review");
    composition.header_label = format!("{name} — Contract Review");

    let generated = format!("Generated: {}", composition.date_label());
    front_matter(composition, analysis, "Contract Review", generated);

    if !analysis.screening.is_empty() {
        composition.elements.push(Element::heading(2, "Screening"));
        let rows = analysis
            .screening
            .iter()
            .map(|item| {
                let value = if item.note.is_empty() {
                    item.status.label().to_string()
                } else {
                    format!("{} — {}", item.status.label(), item.note)
                };
                return (item.criterion.clone(), value);
            })
            .collect();
        composition.elements.push(Element::Table(rows));
    }

    let index = doc.map(|d| return BlockIndex::new(&d.blocks));
    let issues = &analysis.issues;
    if !issues.is_empty() {
        composition
            .elements
            .push(Element::heading(2, format!("Issues Found ({})", issues.len())));
    }
    for (number, issue) in (1_usize..).zip(issues) {
        if number > 1 {
            composition.elements.push(Element::Rule);
        }
        composition.elements.push(Element::Heading {
            level: 3,
            runs: vec![
                Run::plain(format!("[{}] ", issue.severity.issue_label()))
                    .bold()
                    .color(issue.severity.color()),
                Run::plain(format!("Issue {number}: {}", issue.title)).bold(),
            ],
        });
        if !issue.description.is_empty() {
            composition.elements.push(Element::text(Run::plain(issue.description.clone())));
        }

        let quote = issue.source_quote.clone().or_else(|| {
            let text = excerpt(index.as_ref()?, &issue.source_block_ids, EXCERPT_CHARS);
            return if text.is_empty() { None } else { Some(text) };
        });
        if let Some(quote) = quote {
            composition.elements.push(Element::Quote(vec![
                Run::plain("Contract says: ").bold().color("666666"),
                Run::plain(format!("\"{quote}\"")).italic().color("666666"),
            ]));
        }
        if !issue.risk.is_empty() {
            composition.elements.push(Element::Paragraph(vec![
                Run::plain("Risk: ").bold(),
                Run::plain(issue.risk.clone()),
            ]));
        }
        if !issue.recommendation.is_empty() {
            composition.elements.push(Element::Paragraph(vec![
                Run::plain("Recommended Action: ").bold().color(ACCENT),
                Run::plain(issue.recommendation.clone()).bold(),
            ]));
        }
    }

    if !analysis.recommendation.is_empty() {
        composition.elements.push(Element::heading(2, "Overall Recommendation"));
        composition
            .elements
            .push(Element::text(Run::plain(analysis.recommendation.clone())));
    }

    next_steps(composition, analysis);
}

/// Emit each edited block in document order under its deduplicated section header.
fn for_each_edited_block(
    composition: &mut Composition,
    doc: &Document,
    set: &EditSet,
    fallback_section: &str,
    render: impl Fn(&Block, &BlockResolution) -> Element,
) {
    let mut emitted_sections: HashSet<String> = HashSet::new();

    for (position, block) in doc.blocks.iter().enumerate() {
        let Some(resolution) = set.for_block(&block.id).filter(|r| return !r.is_empty()) else {
            continue;
        };

        let section = find_parent_heading(&doc.blocks, position)
            .map_or(fallback_section, |heading| return heading.text.as_str());
        if emitted_sections.insert(section.to_string()) {
            composition.elements.push(Element::heading(3, section));
        }
        composition.elements.push(render(block, resolution));
    }
}

/// Title, classification badge, date line, summary and the contract summary table.
fn front_matter(composition: &mut Composition, analysis: &AnalysisResult, title: &str, generated: String) {
    let classification = analysis.classification;
    let issues = analysis.issues.len().to_string();
    let or_dash = |value: &str| return if value.is_empty() { "—".to_string() } else { value.to_string() };

    composition.elements.extend([
        Element::heading(1, title),
        Element::text(
            Run::plain(classification.classification_label())
                .bold()
                .color(classification.color()),
        ),
        Element::text(Run::plain(generated).color(MUTED)),
    ]);
    if !analysis.summary.is_empty() {
        composition
            .elements
            .push(Element::text(Run::plain(analysis.summary.clone())));
    }
    composition.elements.push(Element::heading(2, "Contract Summary"));
    composition.elements.push(Element::Table(vec![
        ("Document".to_string(), or_dash(&analysis.document)),
        ("Parties".to_string(), or_dash(&analysis.parties)),
        ("Type".to_string(), or_dash(&analysis.contract_type)),
        ("Term".to_string(), or_dash(&analysis.term)),
        ("Governing Law".to_string(), or_dash(&analysis.governing_law)),
        ("Issues Found".to_string(), issues),
    ]));
}

/// Numbered next steps, verbatim.
fn next_steps(composition: &mut Composition, analysis: &AnalysisResult) {
    if analysis.next_steps.is_empty() {
        return;
    }
    composition.elements.push(Element::heading(2, "Next Steps"));
    for (number, step) in (1_usize..).zip(&analysis.next_steps) {
        composition
            .elements
            .push(Element::text(Run::plain(format!("{number}. {step}"))));
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::indexing_slicing, clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::fixtures::{sample_analysis, sample_document};
    use crate::intake::{Decisions, select_edits};
    use crate::redline::SpanKind;
    use crate::types::{BlockId, EditAction};

    fn stamp() -> DateTime<Utc> {
        return DateTime::parse_from_rfc3339("2026-10-19T09:30:00Z").unwrap().with_timezone(&Utc);
    }

    fn headings(composition: &Composition, level: u8) -> Vec<String> {
        return composition
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::Heading { level: l, runs } if *l == level => {
                    return Some(runs.iter().map(|r| return r.text.as_str()).collect());
                },
                _ => return None,
            })
            .collect();
    }

    #[test]
    fn redline_groups_edited_blocks_under_sections() {
        let doc = sample_document();
        let analysis = sample_analysis(&doc);
        let edits = select_edits(&analysis.issues, &Decisions::new(), true);
        let request = ExportRequest { analysis: &analysis, document: Some(&doc), edits: &edits, mode: ExportMode::Redline };
        let composition = assemble(&request, &Config::default(), stamp());

        assert_eq!(composition.layout, Layout::Redline);
        assert!(composition.tracks_revisions());
        assert_eq!(composition.date_label(), "October 19, 2026");
        assert_eq!(headings(&composition, 1), vec!["Redline Review"]);

        let sections = headings(&composition, 3);
        let unique: HashSet<_> = sections.iter().collect();
        assert_eq!(unique.len(), sections.len(), "section headers repeat: {sections:?}");
        assert!(!sections.is_empty());

        assert!(!composition.comments.is_empty());
        let ids: Vec<u32> = composition.comments.iter().map(|c| return c.id).collect();
        assert_eq!(ids, (1..=u32::try_from(ids.len()).unwrap()).collect::<Vec<_>>());

        let redlines = composition.elements.iter().filter(|e| return matches!(e, Element::Redline(_))).count();
        assert!(redlines > 0);
        assert_eq!(headings(&composition, 2).last().map(String::as_str), Some("Next Steps"));
    }

    #[test]
    fn orphan_edit_gets_the_fallback_section() {
        let doc = crate::segmenter::segment_document("memo.txt", &["This memo has no headings at all."], None);
        let analysis = sample_analysis(&doc);
        let edits = vec![EditOperation {
            action: EditAction::DeleteRange { end: 13, start: 5 },
            block_id: doc.blocks[0].id.clone(),
            comment: Some("Trim".to_string()),
            id: "only".to_string(),
            issue_id: "x".to_string(),
        }];
        let request = ExportRequest { analysis: &analysis, document: Some(&doc), edits: &edits, mode: ExportMode::Redline };
        let composition = assemble(&request, &Config::default(), stamp());
        assert_eq!(headings(&composition, 3), vec!["General Provisions"]);
        assert_eq!(composition.comments.len(), 1);

        let config = Config { include_comments: false, ..Config::default() };
        assert!(assemble(&request, &config, stamp()).comments.is_empty());
    }

    #[test]
    fn no_surviving_edits_falls_back_to_summary() {
        let doc = sample_document();
        let analysis = sample_analysis(&doc);
        let stale = vec![EditOperation {
            action: EditAction::InsertAfter { text: "ignored".to_string() },
            block_id: BlockId::from("gone"),
            comment: None,
            id: "stale".to_string(),
            issue_id: "x".to_string(),
        }];

        for (document, edits) in [(Some(&doc), &[][..]), (Some(&doc), &stale[..]), (None, &stale[..])] {
            let request = ExportRequest { analysis: &analysis, document, edits, mode: ExportMode::Redline };
            let composition = assemble(&request, &Config::default(), stamp());
            assert_eq!(composition.layout, Layout::Summary);
            assert!(!composition.tracks_revisions());
            assert!(composition.elements.iter().all(|e| return !matches!(e, Element::Redline(_))));
            assert_eq!(headings(&composition, 1), vec!["Contract Review"]);
        }
    }

    #[test]
    fn summary_lists_issues_with_labels_and_separators() {
        let doc = sample_document();
        let analysis = sample_analysis(&doc);
        let request = ExportRequest { analysis: &analysis, document: None, edits: &[], mode: ExportMode::Clean };
        let composition = assemble(&request, &Config::default(), stamp());

        let issue_headings = headings(&composition, 3);
        assert_eq!(issue_headings.len(), analysis.issues.len());
        assert!(issue_headings[0].starts_with(&format!("[{}] Issue 1:", analysis.issues[0].severity.issue_label())));
        let rules = composition.elements.iter().filter(|e| return **e == Element::Rule).count();
        assert_eq!(rules, analysis.issues.len() - 1);
        assert!(headings(&composition, 2).contains(&"Overall Recommendation".to_string()));
    }

    #[test]
    fn clean_scopes_choose_blocks() {
        let doc = sample_document();
        let analysis = sample_analysis(&doc);
        let edits = select_edits(&analysis.issues, &Decisions::new(), true);
        let request = ExportRequest { analysis: &analysis, document: Some(&doc), edits: &edits, mode: ExportMode::Clean };

        let edited = assemble(&request, &Config::default(), stamp());
        assert_eq!(edited.layout, Layout::Clean);
        assert!(edited.comments.is_empty());
        assert!(headings(&edited, 2).contains(&"Revised Clauses".to_string()));

        let full_config = Config { clean_scope: CleanScope::Full, ..Config::default() };
        let full = assemble(&request, &full_config, stamp());
        let body_paragraphs = full.elements.iter().filter(|e| return matches!(e, Element::Paragraph(_))).count();
        let edited_paragraphs = edited.elements.iter().filter(|e| return matches!(e, Element::Paragraph(_))).count();
        assert!(body_paragraphs > edited_paragraphs);
        assert!(headings(&full, 2).contains(&"Revised Text".to_string()));
    }

    #[test]
    fn redline_and_clean_agree_per_block() {
        let doc = sample_document();
        let analysis = sample_analysis(&doc);
        let edits = select_edits(&analysis.issues, &Decisions::new(), true);
        let base = ExportRequest { analysis: &analysis, document: Some(&doc), edits: &edits, mode: ExportMode::Redline };
        let redline = assemble(&base, &Config::default(), stamp());
        let clean = assemble(&ExportRequest { mode: ExportMode::Clean, ..base }, &Config::default(), stamp());

        let accepted: Vec<String> = redline
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::Redline(spans) => {
                    return Some(
                        spans
                            .iter()
                            .filter(|s| return s.kind != SpanKind::Deleted)
                            .map(|s| return s.text.as_str())
                            .collect(),
                    );
                },
                _ => return None,
            })
            .collect();
        for text in &accepted {
            let found = clean.elements.iter().any(|e| {
                return matches!(e, Element::Paragraph(runs) if runs.len() == 1 && &runs[0].text == text);
            });
            assert!(found, "clean output lacks {text:?}");
        }
    }
}
