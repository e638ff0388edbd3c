//! Clean-merge rendering: edits applied, no change markup.

use crate::resolver::{BlockResolution, Change};
use crate::types::{Block, char_slice};

/// Apply a block's resolved edits and return the final text.
///
/// Deleted ranges are omitted, replaced ranges take their new text and
/// appends follow the range edits, each prefixed with a space.
pub fn render_clean(block: &Block, resolution: Option<&BlockResolution>) -> String {
    let Some(resolution) = resolution else {
        return block.text.clone();
    };

    let text = block.text.as_str();
    let mut merged = String::with_capacity(text.len());
    let mut cursor = 0;

    for edit in &resolution.ranges {
        match &edit.change {
            Change::Delete(range) => {
                merged.push_str(char_slice(text, cursor, range.start));
                cursor = range.end;
            },
            Change::Replace(range, new_text) => {
                merged.push_str(char_slice(text, cursor, range.start));
                merged.push_str(new_text);
                cursor = range.end;
            },
            Change::Append(_) => {},
        }
    }
    merged.push_str(char_slice(text, cursor, block.char_len()));

    for edit in &resolution.appends {
        if let Change::Append(appended) = &edit.change {
            merged.push(' ');
            merged.push_str(appended);
        }
    }
    return merged;
}

#[cfg(test)]
#[allow(
    clippy::arithmetic_side_effects,
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    reason = "test assertions"
)]
mod tests {
    use super::*;
    use crate::redline::{SpanKind, render_redline};
    use crate::resolver::resolve_block;
    use crate::segmenter::segment;
    use crate::types::{EditAction, EditOperation};

    fn op(block: &Block, id: &str, action: EditAction) -> EditOperation {
        return EditOperation {
            action,
            block_id: block.id.clone(),
            comment: None,
            id: id.to_string(),
            issue_id: "issue".to_string(),
        };
    }

    /// What accepting every change in the redline would leave.
    fn accepted(block: &Block, resolution: Option<&BlockResolution>) -> String {
        return render_redline(block, resolution)
            .into_iter()
            .filter(|s| return s.kind != SpanKind::Deleted)
            .map(|s| return s.text)
            .collect();
    }

    #[test]
    fn replacement_scenario() {
        let block = segment(&["five (5) years"]).remove(0);
        let ops = [op(&block, "e1", EditAction::ReplaceRange { end: 8, start: 0, text: "three (3)".to_string() })];
        assert_eq!(render_clean(&block, Some(&resolve_block(&block, &ops))), "three (3) years");
    }

    #[test]
    fn no_edits_returns_original_text() {
        let block = segment(&["Unchanged clause."]).remove(0);
        assert_eq!(render_clean(&block, None), "Unchanged clause.");
        let empty = resolve_block(&block, std::iter::empty());
        assert_eq!(render_clean(&block, Some(&empty)), "Unchanged clause.");
    }

    #[test]
    fn appends_follow_range_edits() {
        let block = segment(&["Term of five years."]).remove(0);
        let ops = [
            op(&block, "a", EditAction::InsertAfter { text: "Renewal is automatic.".to_string() }),
            op(&block, "b", EditAction::InsertAfter { text: "Either party may opt out.".to_string() }),
            op(&block, "c", EditAction::DeleteRange { end: 13, start: 8 }),
        ];
        assert_eq!(
            render_clean(&block, Some(&resolve_block(&block, &ops))),
            "Term of years. Renewal is automatic. Either party may opt out."
        );
    }

    #[test]
    fn clean_matches_accepted_redline() {
        let block = segment(&["Either party may terminate this Agreement on thirty (30) days’ notice."]).remove(0);
        let mut seed: u32 = 0x9e37_79b9;
        let mut next = |modulus: u32| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            return i64::from((seed >> 8) % modulus) - 5;
        };

        for round in 0..300 {
            let ops: Vec<_> = (0..6)
                .map(|i| {
                    let id = format!("{round}-{i}");
                    let start = next(80);
                    let end = start + next(25);
                    return match i % 3 {
                        0 => op(&block, &id, EditAction::DeleteRange { end, start }),
                        1 => op(&block, &id, EditAction::ReplaceRange { end, start, text: format!("r{i}") }),
                        _ => op(&block, &id, EditAction::InsertAfter { text: format!("tail {i}") }),
                    };
                })
                .collect();
            let resolution = resolve_block(&block, &ops);
            assert_eq!(render_clean(&block, Some(&resolution)), accepted(&block, Some(&resolution)));
        }
        assert_eq!(render_clean(&block, None), accepted(&block, None));
    }
}
