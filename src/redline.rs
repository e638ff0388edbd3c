//! Tracked-change rendering of one block.

use crate::resolver::{BlockResolution, Change};
use crate::types::{Block, char_slice};

/// How a span reads in the redline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Text the edit removes.
    Deleted,
    /// Text the edit adds.
    Inserted,
    /// Original text outside every edit.
    Unchanged,
}

/// A run of text with its change marking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Edit that produced this span; `None` for unchanged text.
    pub edit_id: Option<String>,
    /// Change marking.
    pub kind: SpanKind,
    /// Literal text.
    pub text: String,
}

impl Span {
    /// An edited span.
    fn edited(kind: SpanKind, text: &str, edit_id: &str) -> Self {
        return Self {
            edit_id: Some(edit_id.to_string()),
            kind,
            text: text.to_string(),
        };
    }

    /// An unchanged span.
    fn unchanged(text: &str) -> Self {
        return Self {
            edit_id: None,
            kind: SpanKind::Unchanged,
            text: text.to_string(),
        };
    }
}

/// Render a block and its resolved edits as spans.
///
/// A replacement yields a deleted span followed by an inserted span, both
/// tagged with the edit id. Appends come last, each prefixed with a space.
/// With no edits the result is a single unchanged span holding the block text.
pub fn render_redline(block: &Block, resolution: Option<&BlockResolution>) -> Vec<Span> {
    let Some(resolution) = resolution.filter(|r| return !r.is_empty()) else {
        return vec![Span::unchanged(&block.text)];
    };

    let text = block.text.as_str();
    let mut spans = Vec::new();
    let mut cursor = 0;

    for edit in &resolution.ranges {
        let (range, replacement) = match &edit.change {
            Change::Delete(range) => (range, None),
            Change::Replace(range, new_text) => (range, Some(new_text)),
            Change::Append(_) => continue,
        };
        if cursor < range.start {
            spans.push(Span::unchanged(char_slice(text, cursor, range.start)));
        }
        spans.push(Span::edited(SpanKind::Deleted, char_slice(text, range.start, range.end), &edit.id));
        if let Some(new_text) = replacement {
            spans.push(Span::edited(SpanKind::Inserted, new_text, &edit.id));
        }
        cursor = range.end;
    }

    let len = block.char_len();
    if cursor < len {
        spans.push(Span::unchanged(char_slice(text, cursor, len)));
    }

    for edit in &resolution.appends {
        if let Change::Append(appended) = &edit.change {
            spans.push(Span::edited(SpanKind::Inserted, &format!(" {appended}"), &edit.id));
        }
    }
    return spans;
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::indexing_slicing, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::resolver::resolve_block;
    use crate::segmenter::segment;
    use crate::types::{EditAction, EditOperation};

    fn op(block: &Block, id: &str, action: EditAction) -> EditOperation {
        return EditOperation {
            action,
            block_id: block.id.clone(),
            comment: None,
            id: id.to_string(),
            issue_id: "term".to_string(),
        };
    }

    fn shape(spans: &[Span]) -> Vec<(SpanKind, &str)> {
        return spans.iter().map(|s| return (s.kind, s.text.as_str())).collect();
    }

    #[test]
    fn replacement_renders_deleted_then_inserted() {
        let block = segment(&["five (5) years"]).remove(0);
        let ops = [op(&block, "e1", EditAction::ReplaceRange { end: 8, start: 0, text: "three (3)".to_string() })];
        let spans = render_redline(&block, Some(&resolve_block(&block, &ops)));

        assert_eq!(
            shape(&spans),
            vec![
                (SpanKind::Deleted, "five (5)"),
                (SpanKind::Inserted, "three (3)"),
                (SpanKind::Unchanged, " years"),
            ]
        );
        assert_eq!(spans[0].edit_id.as_deref(), Some("e1"));
        assert_eq!(spans[1].edit_id.as_deref(), Some("e1"));
        assert!(spans[2].edit_id.is_none());
    }

    #[test]
    fn no_edits_is_one_unchanged_span() {
        let block = segment(&["The Recipient shall protect the information."]).remove(0);
        assert_eq!(shape(&render_redline(&block, None)), vec![(SpanKind::Unchanged, block.text.as_str())]);

        let nothing_survived = resolve_block(&block, &[op(&block, "bad", EditAction::DeleteRange { end: 3, start: 3 })]);
        assert_eq!(render_redline(&block, Some(&nothing_survived)).len(), 1);
    }

    #[test]
    fn deletes_and_appends_mix_with_unchanged_text() {
        let block = segment(&["Term of five years."]).remove(0);
        let ops = [
            op(&block, "tail", EditAction::InsertAfter { text: "Renewal is automatic.".to_string() }),
            op(&block, "cut", EditAction::DeleteRange { end: 13, start: 8 }),
        ];
        let spans = render_redline(&block, Some(&resolve_block(&block, &ops)));
        assert_eq!(
            shape(&spans),
            vec![
                (SpanKind::Unchanged, "Term of "),
                (SpanKind::Deleted, "five "),
                (SpanKind::Unchanged, "years."),
                (SpanKind::Inserted, " Renewal is automatic."),
            ]
        );
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let block = segment(&["Café “owner’s” duty"]).remove(0);
        let ops = [op(&block, "q", EditAction::ReplaceRange { end: 14, start: 5, text: "operator".to_string() })];
        let spans = render_redline(&block, Some(&resolve_block(&block, &ops)));
        assert_eq!(
            shape(&spans),
            vec![
                (SpanKind::Unchanged, "Café "),
                (SpanKind::Deleted, "“owner’s”"),
                (SpanKind::Inserted, "operator"),
                (SpanKind::Unchanged, " duty"),
            ]
        );
    }
}
