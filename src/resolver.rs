use std::collections::HashMap;
use std::ops::Range;

use crate::types::{Block, BlockId, EditAction, EditOperation};

/// Why an operation did not survive resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// After clamping to `[0, len]` the range was empty or inverted.
    DegenerateRange {
        /// Proposed end offset.
        end: i64,
        /// Block length in chars.
        len: usize,
        /// Proposed start offset.
        start: i64,
    },
    /// An append whose text is the empty string.
    EmptyInsertion,
    /// The range starts inside an edit that was already kept.
    Overlap {
        /// End of the last kept range.
        kept_end: usize,
    },
}

/// What a resolved edit does to the block text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Append text after the block, space separated.
    Append(String),
    /// Remove a char range.
    Delete(Range<usize>),
    /// Replace a char range with new text.
    Replace(Range<usize>, String),
}

/// An edit after clamping and overlap resolution.
///
/// Ranges satisfy `start < end <= len(block.text)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEdit {
    /// What the edit does.
    pub change: Change,
    /// Rationale carried over from the proposal.
    pub comment: Option<String>,
    /// Proposal id.
    pub id: String,
    /// Originating issue.
    pub issue_id: String,
}

impl ResolvedEdit {
    /// Char range this edit covers, `None` for appends.
    pub fn range(&self) -> Option<Range<usize>> {
        return match &self.change {
            Change::Append(_) => None,
            Change::Delete(range) | Change::Replace(range, _) => Some(range.clone()),
        };
    }

    /// Convert back into an operation against `block_id`.
    pub fn to_operation(&self, block_id: &BlockId) -> EditOperation {
        let offset = |n: usize| return i64::try_from(n).unwrap_or(i64::MAX);
        let action = match &self.change {
            Change::Append(text) => EditAction::InsertAfter { text: text.clone() },
            Change::Delete(range) => EditAction::DeleteRange {
                end: offset(range.end),
                start: offset(range.start),
            },
            Change::Replace(range, text) => EditAction::ReplaceRange {
                end: offset(range.end),
                start: offset(range.start),
                text: text.clone(),
            },
        };
        return EditOperation {
            action,
            block_id: block_id.clone(),
            comment: self.comment.clone(),
            id: self.id.clone(),
            issue_id: self.issue_id.clone(),
        };
    }
}

/// One operation that was dropped, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discarded {
    /// Proposal id.
    pub edit_id: String,
    /// Why it was dropped.
    pub reason: DiscardReason,
}

/// Resolution outcome for a single block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResolution {
    /// Appends in input order.
    pub appends: Vec<ResolvedEdit>,
    /// Block these edits target.
    pub block_id: BlockId,
    /// Dropped proposals.
    pub discarded: Vec<Discarded>,
    /// Non-overlapping range edits in ascending start order.
    pub ranges: Vec<ResolvedEdit>,
}

impl BlockResolution {
    /// Range edits followed by appends: the order renderers apply them in.
    pub fn edits(&self) -> impl Iterator<Item = &ResolvedEdit> {
        return self.ranges.iter().chain(&self.appends);
    }

    /// Whether nothing survived.
    pub fn is_empty(&self) -> bool {
        return self.ranges.is_empty() && self.appends.is_empty();
    }

    /// Surviving edits as operations, ranges first.
    pub fn to_operations(&self) -> Vec<EditOperation> {
        return self.edits().map(|e| return e.to_operation(&self.block_id)).collect();
    }
}

/// Resolution outcome for a whole document.
#[derive(Debug, Default)]
pub struct EditSet {
    /// Per-block results for blocks that had at least one proposal.
    by_block: HashMap<BlockId, BlockResolution>,
    /// Proposals whose block does not exist.
    pub rejected: Vec<EditOperation>,
}

impl EditSet {
    /// Number of proposals dropped during per-block resolution.
    pub fn discarded_count(&self) -> usize {
        return self.by_block.values().map(|r| return r.discarded.len()).sum();
    }

    /// Resolution for one block, if it had any proposals.
    pub fn for_block(&self, id: &BlockId) -> Option<&BlockResolution> {
        return self.by_block.get(id);
    }

    /// Whether any block has at least one surviving edit.
    pub fn has_edits(&self) -> bool {
        return self.by_block.values().any(|r| return !r.is_empty());
    }

    /// Number of surviving edits.
    pub fn kept_count(&self) -> usize {
        return self
            .by_block
            .values()
            .map(|r| return r.ranges.len().saturating_add(r.appends.len()))
            .sum();
    }
}

/// Clamp a proposed offset into `[0, len]`.
fn clamp_offset(offset: i64, len: usize) -> usize {
    return usize::try_from(offset).unwrap_or(0).min(len);
}

/// Resolve the proposals for one block.
///
/// Range edits are clamped to the block, degenerate ones are dropped, the
/// rest are sorted by start and kept only if they begin at or after the end
/// of the last kept range. Appends are kept in input order. Proposals for a
/// different block are ignored.
pub fn resolve_block<'a>(block: &Block, ops: impl IntoIterator<Item = &'a EditOperation>) -> BlockResolution {
    let len = block.char_len();
    let mut appends = Vec::new();
    let mut candidates = Vec::new();
    let mut discarded = Vec::new();

    for op in ops {
        if op.block_id != block.id {
            log::warn!("edit {} targets block {}, not {}; ignored", op.id, op.block_id, block.id);
            continue;
        }
        let resolved = |change: Change| {
            return ResolvedEdit {
                change,
                comment: op.comment.clone(),
                id: op.id.clone(),
                issue_id: op.issue_id.clone(),
            };
        };

        let (start, end, replacement) = match &op.action {
            EditAction::InsertAfter { text } => {
                if text.is_empty() {
                    log::warn!("edit {} appends nothing to block {}, discarded", op.id, block.id);
                    discarded.push(Discarded {
                        edit_id: op.id.clone(),
                        reason: DiscardReason::EmptyInsertion,
                    });
                } else {
                    appends.push(resolved(Change::Append(text.clone())));
                }
                continue;
            },
            EditAction::DeleteRange { end, start } => (*start, *end, None),
            EditAction::ReplaceRange { end, start, text } => (*start, *end, Some(text)),
        };

        let range = clamp_offset(start, len)..clamp_offset(end, len);
        if range.start >= range.end {
            log::warn!(
                "edit {} has invalid range [{start}, {end}) in block {} (length {len}), discarded",
                op.id,
                block.id,
            );
            discarded.push(Discarded {
                edit_id: op.id.clone(),
                reason: DiscardReason::DegenerateRange { end, len, start },
            });
            continue;
        }

        let change = match replacement {
            Some(text) if !text.is_empty() => Change::Replace(range, text.clone()),
            Some(_) | None => Change::Delete(range),
        };
        candidates.push(resolved(change));
    }

    // Stable sort: equal starts keep proposal order, so the earlier proposal wins.
    candidates.sort_by_key(|e| return e.range().map_or(0, |r| return r.start));

    let mut ranges: Vec<ResolvedEdit> = Vec::new();
    let mut kept_end = 0;
    for edit in candidates {
        let Some(range) = edit.range() else { continue };
        if range.start >= kept_end {
            kept_end = range.end;
            ranges.push(edit);
        } else {
            log::warn!(
                "edit {} at [{}, {}) overlaps a kept edit ending at {kept_end} in block {}, discarded",
                edit.id,
                range.start,
                range.end,
                block.id,
            );
            discarded.push(Discarded {
                edit_id: edit.id,
                reason: DiscardReason::Overlap { kept_end },
            });
        }
    }

    log::debug!(
        "block {}: {} range edits, {} appends, {} discarded",
        block.id,
        ranges.len(),
        appends.len(),
        discarded.len(),
    );
    return BlockResolution {
        appends,
        block_id: block.id.clone(),
        discarded,
        ranges,
    };
}

/// Resolve every proposal against its block.
///
/// Proposals naming a block that does not exist are logged and set aside in
/// [`EditSet::rejected`]; every other proposal is still resolved.
pub fn resolve_document(blocks: &[Block], ops: &[EditOperation]) -> EditSet {
    let mut grouped: HashMap<&BlockId, Vec<&EditOperation>> = HashMap::new();
    let mut rejected = Vec::new();

    for op in ops {
        if blocks.iter().any(|b| return b.id == op.block_id) {
            grouped.entry(&op.block_id).or_default().push(op);
        } else {
            log::warn!("edit {} references non-existent block {}, excluded", op.id, op.block_id);
            rejected.push(op.clone());
        }
    }

    let by_block = blocks
        .iter()
        .filter_map(|block| {
            let proposals = grouped.remove(&block.id)?;
            return Some((block.id.clone(), resolve_block(block, proposals)));
        })
        .collect();

    return EditSet { by_block, rejected };
}

#[cfg(test)]
#[allow(
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    reason = "test assertions"
)]
mod tests {
    use super::*;
    use crate::segmenter::segment;

    fn block(text: &str) -> Block {
        return segment(&[text]).remove(0);
    }

    fn range_op(block: &Block, id: &str, start: i64, end: i64, text: Option<&str>) -> EditOperation {
        let action = match text {
            Some(text) => EditAction::ReplaceRange { end, start, text: text.to_string() },
            None => EditAction::DeleteRange { end, start },
        };
        return EditOperation {
            action,
            block_id: block.id.clone(),
            comment: None,
            id: id.to_string(),
            issue_id: "issue".to_string(),
        };
    }

    fn append_op(block: &Block, id: &str, text: &str) -> EditOperation {
        return EditOperation {
            action: EditAction::InsertAfter { text: text.to_string() },
            block_id: block.id.clone(),
            comment: None,
            id: id.to_string(),
            issue_id: "issue".to_string(),
        };
    }

    fn ranges(resolution: &BlockResolution) -> Vec<Range<usize>> {
        return resolution.ranges.iter().filter_map(ResolvedEdit::range).collect();
    }

    #[test]
    fn offsets_clamp_into_block() {
        let b = block("five (5) years");
        let r = resolve_block(&b, &[range_op(&b, "a", -5, 100, Some("ten"))]);
        assert_eq!(ranges(&r), vec![0..14]);
    }

    #[test]
    fn degenerate_ranges_are_discarded_alone() {
        let b = block("five (5) years");
        let ops = [
            range_op(&b, "empty", 8, 8, None),
            range_op(&b, "past-end", 20, 30, None),
            range_op(&b, "inverted", 6, 2, None),
            range_op(&b, "ok", 9, 14, None),
        ];
        let r = resolve_block(&b, &ops);
        assert_eq!(ranges(&r), vec![9..14]);
        let dropped: Vec<_> = r.discarded.iter().map(|d| return d.edit_id.as_str()).collect();
        assert_eq!(dropped, vec!["empty", "past-end", "inverted"]);
        assert!(matches!(r.discarded[1].reason, DiscardReason::DegenerateRange { len: 14, .. }));
    }

    #[test]
    fn first_of_overlapping_ranges_wins() {
        let b = block("The Recipient shall not disclose any information.");
        let r = resolve_block(&b, &[range_op(&b, "first", 0, 10, None), range_op(&b, "second", 5, 15, None)]);
        assert_eq!(ranges(&r), vec![0..10]);
        assert_eq!(r.discarded[0].edit_id, "second");
        assert_eq!(r.discarded[0].reason, DiscardReason::Overlap { kept_end: 10 });
    }

    #[test]
    fn ranges_come_out_sorted_and_touching_ranges_survive() {
        let b = block("The Recipient shall not disclose any information.");
        let ops = [
            range_op(&b, "late", 20, 24, None),
            range_op(&b, "early", 0, 4, Some("A")),
            range_op(&b, "touching", 4, 13, Some("party")),
            range_op(&b, "tie", 20, 23, None),
        ];
        let r = resolve_block(&b, &ops);
        assert_eq!(ranges(&r), vec![0..4, 4..13, 20..24]);
        assert_eq!(r.discarded.len(), 1);
        assert_eq!(r.discarded[0].edit_id, "tie");
    }

    #[test]
    fn appends_keep_input_order_and_empty_replacement_deletes() {
        let b = block("Term of five years.");
        let ops = [
            append_op(&b, "x", "unless renewed."),
            range_op(&b, "del", 8, 13, Some("")),
            append_op(&b, "empty", ""),
            append_op(&b, "blank", "  "),
            append_op(&b, "y", "Survival applies."),
        ];
        let r = resolve_block(&b, &ops);
        let appended: Vec<_> = r.appends.iter().map(|e| return e.id.as_str()).collect();
        assert_eq!(appended, vec!["x", "blank", "y"]);
        assert_eq!(r.appends[1].change, Change::Append("  ".to_string()));
        assert_eq!(r.ranges[0].change, Change::Delete(8..13));
        assert_eq!(r.discarded.len(), 1);
        assert_eq!(r.discarded[0].edit_id, "empty");
        assert_eq!(r.discarded[0].reason, DiscardReason::EmptyInsertion);
    }

    #[test]
    fn unknown_blocks_are_rejected_without_affecting_others() {
        let blocks = segment(&["alpha beta", "gamma delta"]);
        let mut stale = range_op(&blocks[0], "stale", 0, 3, None);
        stale.block_id = BlockId::from("no-such-block");
        let ops = [range_op(&blocks[1], "good", 0, 5, Some("GAMMA")), stale];

        let set = resolve_document(&blocks, &ops);
        assert_eq!(set.rejected.len(), 1);
        assert_eq!(set.rejected[0].id, "stale");
        assert!(set.for_block(&blocks[0].id).is_none());
        assert_eq!(set.for_block(&blocks[1].id).unwrap().ranges.len(), 1);
        assert!(set.has_edits());
        assert_eq!(set.kept_count(), 1);
    }

    #[test]
    fn resolving_a_resolved_set_is_a_no_op() {
        let b = block("The Recipient shall not disclose any information.");
        let ops = [
            range_op(&b, "a", -3, 4, Some("A")),
            range_op(&b, "b", 2, 9, None),
            range_op(&b, "c", 14, 19, Some("must")),
            append_op(&b, "d", "Ever."),
        ];
        let once = resolve_block(&b, &ops);
        let twice = resolve_block(&b, &once.to_operations());
        assert_eq!(twice.ranges, once.ranges);
        assert_eq!(twice.appends, once.appends);
        assert!(twice.discarded.is_empty());
    }

    #[test]
    fn arbitrary_proposals_resolve_to_sorted_disjoint_in_bounds_ranges() {
        let b = block("Either party may terminate this Agreement on thirty (30) days notice.");
        let len = b.char_len();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = |modulus: i64| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            return i64::try_from(seed % 1000).unwrap() % modulus - 10;
        };

        for round in 0..200 {
            let ops: Vec<_> = (0..8)
                .map(|i| {
                    let start = next(90);
                    let end = start + next(30);
                    return range_op(&b, &format!("{round}-{i}"), start, end, Some("x"));
                })
                .collect();
            let r = resolve_block(&b, &ops);
            let got = ranges(&r);
            assert_eq!(got.len() + r.discarded.len(), ops.len());
            for pair in got.windows(2) {
                assert!(pair[0].end <= pair[1].start, "overlap in {got:?}");
            }
            assert!(got.iter().all(|range| return range.start < range.end && range.end <= len));
        }
    }
}
