//! Plain-text rendering of a [`Composition`] for the terminal.
//!
//! Deletions print as `[-text-]`, insertions as `{+text+}`, and a commented
//! edit is followed by a `[^n]` marker resolved in a trailing comment list.

use std::fmt::Write as _;

use crate::assembler::{Composition, Element, Run};
use crate::redline::{Span, SpanKind};

/// Render the whole composition.
pub fn render_preview(composition: &Composition) -> String {
    let mut out = format!("{} | {}\n", composition.brand, composition.header_label);
    for element in &composition.elements {
        out.push('\n');
        render_element(&mut out, composition, element);
    }

    if !composition.comments.is_empty() {
        out.push_str("\nComments:\n");
        for comment in &composition.comments {
            let _ = writeln!(out, "[^{}] {}: {}", comment.id, composition.revision.initials, comment.text);
        }
    }
    return out;
}

/// Append one element and its trailing newline.
fn render_element(out: &mut String, composition: &Composition, element: &Element) {
    match element {
        Element::Heading { level, runs } => {
            let marks = "#".repeat(usize::from(*level));
            let _ = writeln!(out, "{marks} {}", run_text(runs));
        },
        Element::Paragraph(runs) => {
            let _ = writeln!(out, "{}", run_text(runs));
        },
        Element::Quote(runs) => {
            let _ = writeln!(out, "> {}", run_text(runs));
        },
        Element::Redline(spans) => {
            let _ = writeln!(out, "{}", render_spans(composition, spans));
        },
        Element::Rule => out.push_str("---\n"),
        Element::Table(rows) => {
            let width = rows.iter().map(|(label, _)| return label.chars().count()).max().unwrap_or(0);
            for (label, value) in rows {
                let _ = writeln!(out, "{label:<width$}  {value}");
            }
        },
    }
}

/// Inline change markup for one redlined block.
fn render_spans(composition: &Composition, spans: &[Span]) -> String {
    let mut line = String::new();
    for (position, span) in spans.iter().enumerate() {
        match span.kind {
            SpanKind::Deleted => {
                let _ = write!(line, "[-{}-]", span.text);
            },
            SpanKind::Inserted => {
                let _ = write!(line, "{{+{}+}}", span.text);
            },
            SpanKind::Unchanged => line.push_str(&span.text),
        }

        let Some(edit_id) = span.edit_id.as_deref() else {
            continue;
        };
        let edit_continues = spans
            .get(position.saturating_add(1))
            .is_some_and(|next| return next.edit_id.as_deref() == Some(edit_id));
        if let Some(comment) = composition.comment_for(edit_id).filter(|_| return !edit_continues) {
            let _ = write!(line, "[^{}]", comment.id);
        }
    }
    return line;
}

/// Concatenated run text, formatting dropped.
fn run_text(runs: &[Run]) -> String {
    return runs.iter().map(|r| return r.text.as_str()).collect();
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::assembler::{ExportMode, ExportRequest, assemble};
    use crate::config::Config;
    use crate::fixtures::{sample_analysis, sample_document};
    use crate::intake::{Decisions, select_edits};

    fn preview(mode: ExportMode, document: bool) -> String {
        let doc = sample_document();
        let analysis = sample_analysis(&doc);
        let edits = select_edits(&analysis.issues, &Decisions::new(), true);
        let request = ExportRequest {
            analysis: &analysis,
            document: document.then_some(&doc),
            edits: &edits,
            mode,
        };
        let stamp = DateTime::parse_from_rfc3339("2026-10-19T09:30:00Z").unwrap().with_timezone(&Utc);
        return render_preview(&assemble(&request, &Config::default(), stamp));
    }

    #[test]
    fn redline_marks_changes_and_comments() {
        let text = preview(ExportMode::Redline, true);
        assert!(text.starts_with("REDLINER | sample-nda.docx — Redline Review\n"));
        assert!(text.contains("survive for [-five (5) years-]{+two (2) years+}[^"));
        assert!(text.contains("{+ Oral disclosures qualify"));
        assert!(text.contains("\nComments:\n[^1] CRA: "));
        assert!(text.contains("### 3. TERM\n"));
    }

    #[test]
    fn clean_has_no_markup() {
        let text = preview(ExportMode::Clean, true);
        assert!(text.contains("survive for two (2) years after termination."));
        assert!(!text.contains("[-"));
        assert!(!text.contains("{+"));
        assert!(!text.contains("Comments:"));
    }

    #[test]
    fn summary_aligns_table_labels() {
        let text = preview(ExportMode::Redline, false);
        assert!(text.contains("# Contract Review\n"));
        assert!(text.contains("\nParties        Acme Corp. and Beta Industries LLC\n"));
        assert!(text.contains("\nGoverning Law  Delaware\n"));
        assert!(text.contains("\n---\n"));
    }
}
