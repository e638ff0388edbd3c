/// Core domain types for redliner blocks, edit operations, and analysis results.
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Separator placed between block texts in the whole-document concatenation.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Opaque block identifier. Assigned once at segmentation, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(
    /// The identifier text, a v4 UUID for freshly segmented documents.
    pub String,
);

impl BlockId {
    /// Mint a fresh identifier.
    pub fn generate() -> Self {
        return Self(uuid::Uuid::new_v4().to_string());
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        return Self(value.to_string());
    }
}

/// A unit of document content. Immutable once segmented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlockRecord", into = "BlockRecord")]
pub struct Block {
    /// Offset one past the last char of this block in the full text.
    pub char_end: usize,
    /// Offset of the first char of this block in the full text.
    pub char_start: usize,
    /// Stable identifier.
    pub id: BlockId,
    /// Paragraph, heading (with level) or list item (with list info).
    pub kind: BlockKind,
    /// Literal content at segmentation time.
    pub text: String,
}

impl Block {
    /// Length of the block text in chars, the unit all edit offsets use.
    pub fn char_len(&self) -> usize {
        return self.text.chars().count();
    }

    /// Heading level, if this block is a heading.
    pub const fn heading_level(&self) -> Option<u8> {
        return match self.kind {
            BlockKind::Heading { level } => Some(level),
            BlockKind::ListItem(_) | BlockKind::Paragraph => None,
        };
    }

    /// Whether this block is a heading.
    pub const fn is_heading(&self) -> bool {
        return matches!(self.kind, BlockKind::Heading { .. });
    }
}

/// Flat wire shape of a block, shared with the extraction collaborator.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockRecord {
    /// See [`Block::char_end`].
    char_end: usize,
    /// See [`Block::char_start`].
    char_start: usize,
    /// See [`Block::id`].
    id: BlockId,
    /// `paragraph`, `heading`, `list-item` or `table-cell`.
    #[serde(rename = "type")]
    kind: String,
    /// Heading level, headings only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<u8>,
    /// List structure, list items only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    list_info: Option<ListInfo>,
    /// Block content. The extraction collaborator calls it `content`.
    #[serde(alias = "content")]
    text: String,
}

impl TryFrom<BlockRecord> for Block {
    type Error = String;

    fn try_from(record: BlockRecord) -> Result<Self, Self::Error> {
        if record.char_start > record.char_end {
            return Err(format!(
                "block {} has charStart {} > charEnd {}",
                record.id, record.char_start, record.char_end
            ));
        }

        let kind = match record.kind.as_str() {
            "heading" => BlockKind::Heading {
                level: record.level.unwrap_or(1).max(1),
            },
            "list-item" => BlockKind::ListItem(record.list_info.unwrap_or(ListInfo {
                depth: 0,
                index: 0,
                style: ListStyle::Bullet,
            })),
            // Table cells carry no structure we render, so they read as paragraphs.
            "paragraph" | "table-cell" => BlockKind::Paragraph,
            other => return Err(format!("block {} has unknown type `{other}`", record.id)),
        };

        return Ok(Self {
            char_end: record.char_end,
            char_start: record.char_start,
            id: record.id,
            kind,
            text: record.text,
        });
    }
}

impl From<Block> for BlockRecord {
    fn from(block: Block) -> Self {
        let (kind, level, list_info) = match block.kind {
            BlockKind::Heading { level } => ("heading", Some(level), None),
            BlockKind::ListItem(info) => ("list-item", None, Some(info)),
            BlockKind::Paragraph => ("paragraph", None, None),
        };
        return Self {
            char_end: block.char_end,
            char_start: block.char_start,
            id: block.id,
            kind: kind.to_string(),
            level,
            list_info,
            text: block.text,
        };
    }
}

/// Block classification. Heading level and list info only exist on their kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Section heading; level is at least 1.
    Heading {
        /// Nesting depth inferred from the enumerator or casing.
        level: u8,
    },
    /// Bulleted or numbered list entry.
    ListItem(ListInfo),
    /// Anything else.
    Paragraph,
}

/// A segmented document: blocks plus derived full text and metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Blocks in document order.
    pub blocks: Vec<Block>,
    /// Source filename reported by the extraction collaborator.
    pub filename: String,
    /// Block texts joined by [`BLOCK_SEPARATOR`].
    pub full_text: String,
    /// Counts derived from the blocks.
    pub metadata: DocumentMetadata,
}

/// Inbound document JSON. Derived fields are recomputed, never trusted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRecord {
    /// Blocks in document order.
    blocks: Vec<Block>,
    /// Source filename.
    #[serde(default)]
    filename: String,
    /// Extraction metadata, mostly ignored.
    #[serde(default)]
    metadata: Option<MetadataRecord>,
}

/// The only inbound metadata field that cannot be derived from blocks.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRecord {
    /// Pages in the source file, paginated formats only.
    #[serde(default)]
    page_count: Option<u32>,
}

impl Document {
    /// Assemble a document from already-segmented blocks.
    pub fn from_blocks(filename: &str, blocks: Vec<Block>, page_count: Option<u32>) -> Self {
        let full_text = blocks
            .iter()
            .map(|b| return b.text.as_str())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR);
        let metadata = DocumentMetadata {
            block_count: blocks.len(),
            has_lists: blocks.iter().any(|b| return matches!(b.kind, BlockKind::ListItem(_))),
            page_count,
            word_count: full_text.split_whitespace().count(),
        };
        return Self {
            blocks,
            filename: filename.to_string(),
            full_text,
            metadata,
        };
    }

    /// Parse and validate document JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the JSON does not match the block shape, or
    /// `Error::DocumentInvalid` if ids repeat or offsets are inverted.
    pub fn from_json(content: &str) -> Result<Self, Error> {
        let record: DocumentRecord = serde_json::from_str(content).map_err(|e| {
            // Block-level invariant failures surface through serde as custom errors.
            if e.is_data() {
                return Error::DocumentInvalid { reason: e.to_string() };
            }
            return Error::Json(e);
        })?;
        validate_unique_ids(&record.blocks)?;
        let page_count = record.metadata.and_then(|m| return m.page_count);
        return Ok(Self::from_blocks(&record.filename, record.blocks, page_count));
    }
}

/// Derived document statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Number of blocks.
    pub block_count: usize,
    /// Whether any block is a list item.
    pub has_lists: bool,
    /// Page count for paginated sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    /// Whitespace-separated words in the full text.
    pub word_count: usize,
}

/// What a proposed edit does. Range offsets are raw proposals and may be
/// negative or past the end of the block until resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    /// Remove `[start, end)`.
    DeleteRange {
        /// Exclusive end offset in chars.
        end: i64,
        /// Start offset in chars.
        start: i64,
    },
    /// Append text after the block content.
    InsertAfter {
        /// Text to append.
        text: String,
    },
    /// Replace `[start, end)` with `text`.
    ReplaceRange {
        /// Exclusive end offset in chars.
        end: i64,
        /// Start offset in chars.
        start: i64,
        /// Replacement text.
        text: String,
    },
}

/// A proposed mutation against exactly one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "OperationRecord")]
pub struct EditOperation {
    /// What the edit does.
    pub action: EditAction,
    /// Target block.
    pub block_id: BlockId,
    /// Optional human-readable rationale.
    pub comment: Option<String>,
    /// Unique within the analysis result.
    pub id: String,
    /// Originating issue.
    pub issue_id: String,
}

impl EditOperation {
    /// Wire name of the operation kind, for logs and reports.
    pub const fn kind_name(&self) -> &'static str {
        return match self.action {
            EditAction::DeleteRange { .. } => "delete_range",
            EditAction::InsertAfter { .. } => "insert_after",
            EditAction::ReplaceRange { .. } => "replace_range",
        };
    }
}

/// Flat wire shape of an edit operation, as the analysis step writes it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationRecord {
    /// Target block.
    block_id: BlockId,
    /// Rationale.
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    /// Exclusive end, range edits only.
    #[serde(skip_serializing_if = "Option::is_none")]
    end_char: Option<i64>,
    /// Operation id.
    id: String,
    /// Originating issue.
    issue_id: String,
    /// Wire name of the operation kind.
    #[serde(rename = "type")]
    kind: &'static str,
    /// Replacement or appended text.
    #[serde(skip_serializing_if = "Option::is_none")]
    new_text: Option<String>,
    /// Start, range edits only.
    #[serde(skip_serializing_if = "Option::is_none")]
    start_char: Option<i64>,
}

impl From<EditOperation> for OperationRecord {
    fn from(op: EditOperation) -> Self {
        let kind = op.kind_name();
        let (start_char, end_char, new_text) = match op.action {
            EditAction::DeleteRange { end, start } => (Some(start), Some(end), None),
            EditAction::InsertAfter { text } => (None, None, Some(text)),
            EditAction::ReplaceRange { end, start, text } => (Some(start), Some(end), Some(text)),
        };
        return Self {
            block_id: op.block_id,
            comment: op.comment,
            end_char,
            id: op.id,
            issue_id: op.issue_id,
            kind,
            new_text,
            start_char,
        };
    }
}

/// A set of edits proposed together for one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditPlan {
    /// Why this plan.
    pub description: String,
    /// Ordered operations.
    pub operations: Vec<EditOperation>,
    /// Stronger position or compromise.
    pub variant: PlanVariant,
}

/// A finding from the analysis step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// What the clause says.
    pub description: String,
    /// Zero or more plans; none means informational only.
    pub edit_plans: Vec<EditPlan>,
    /// Unique issue id.
    pub id: String,
    /// Recommended action.
    pub recommendation: String,
    /// Business or legal risk.
    pub risk: String,
    /// Severity level.
    pub severity: Severity,
    /// Blocks where the issue was found. Only ids that exist survive intake.
    pub source_block_ids: Vec<BlockId>,
    /// Literal quote from the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_quote: Option<String>,
    /// Short title.
    pub title: String,
}

/// The whole analysis result, after boundary validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Overall classification.
    pub classification: Severity,
    /// Contract or NDA type.
    #[serde(rename = "type")]
    pub contract_type: String,
    /// Document name as the analysis saw it.
    pub document: String,
    /// Governing law jurisdiction.
    pub governing_law: String,
    /// Findings.
    pub issues: Vec<Issue>,
    /// Next steps, rendered verbatim.
    pub next_steps: Vec<String>,
    /// Parties involved.
    pub parties: String,
    /// Overall recommendation.
    pub recommendation: String,
    /// Screening checklist.
    pub screening: Vec<ScreeningItem>,
    /// Brief summary, rendered verbatim.
    pub summary: String,
    /// Term duration.
    pub term: String,
}

/// List structure captured for list-item blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInfo {
    /// Nesting depth from leading whitespace, two columns per level.
    #[serde(rename = "level")]
    pub depth: usize,
    /// Running index among list items seen so far in the document.
    pub index: usize,
    /// Bullet or numbered marker.
    #[serde(rename = "type")]
    pub style: ListStyle,
}

/// Marker family of a list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    /// `•`, `-` or `*`.
    Bullet,
    /// `1.` or `1)`.
    Numbered,
}

/// Which plan of an issue a reviewer picked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanVariant {
    /// The compromise position.
    Fallback,
    /// The stronger position.
    #[default]
    Preferred,
}

/// A screening checklist row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreeningItem {
    /// What was checked.
    pub criterion: String,
    /// Free-text note.
    pub note: String,
    /// Outcome.
    pub status: ScreeningStatus,
}

/// Outcome of one screening criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreeningStatus {
    /// Criterion failed.
    Fail,
    /// Needs a look.
    Flag,
    /// Criterion met.
    Pass,
}

impl ScreeningStatus {
    /// Upper-case label for reports.
    pub const fn label(self) -> &'static str {
        return match self {
            ScreeningStatus::Fail => "FAIL",
            ScreeningStatus::Flag => "FLAG",
            ScreeningStatus::Pass => "PASS",
        };
    }
}

/// Traffic-light severity shared by issues and the overall classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Standard approval.
    Green,
    /// Escalation required.
    Red,
    /// Counsel review.
    Yellow,
}

impl Severity {
    /// Banner text for the overall classification.
    pub const fn classification_label(self) -> &'static str {
        return match self {
            Severity::Green => "GREEN — STANDARD APPROVAL",
            Severity::Red => "RED — ESCALATION REQUIRED",
            Severity::Yellow => "YELLOW — COUNSEL REVIEW",
        };
    }

    /// Hex RGB used for severity text.
    pub const fn color(self) -> &'static str {
        return match self {
            Severity::Green => "2E7D32",
            Severity::Red => "C62828",
            Severity::Yellow => "F9A825",
        };
    }

    /// Per-issue label.
    pub const fn issue_label(self) -> &'static str {
        return match self {
            Severity::Green => "PASS",
            Severity::Red => "CRITICAL",
            Severity::Yellow => "WARNING",
        };
    }
}

/// Reject a block list whose ids repeat.
///
/// # Errors
///
/// Returns `Error::DocumentInvalid` naming the first repeated id.
fn validate_unique_ids(blocks: &[Block]) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for block in blocks {
        if !seen.insert(&block.id) {
            return Err(Error::DocumentInvalid {
                reason: format!("duplicate block id `{}`", block.id),
            });
        }
    }
    return Ok(());
}

/// Slice `text` by char offsets. Offsets past the end clamp to the end.
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |char_idx: usize| {
        return text
            .char_indices()
            .nth(char_idx)
            .map_or(text.len(), |(byte, _)| return byte);
    };
    let start_byte = byte_at(start);
    let end_byte = byte_at(end.max(start));
    return text.get(start_byte..end_byte).unwrap_or("");
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;

    #[test]
    fn char_slice_counts_chars_not_bytes() {
        let text = "Café owner’s duty";
        assert_eq!(char_slice(text, 0, 4), "Café");
        assert_eq!(char_slice(text, 5, 12), "owner’s");
        assert_eq!(char_slice(text, 13, 999), "duty");
        assert_eq!(char_slice(text, 8, 3), "");
    }

    #[test]
    fn document_json_round_trips_block_kinds() {
        let json = r#"{
            "filename": "nda.docx",
            "blocks": [
                {"id": "h", "type": "heading", "content": "1. TERM", "charStart": 0, "charEnd": 7, "level": 1},
                {"id": "l", "type": "list-item", "text": "- five (5) years", "charStart": 9, "charEnd": 25,
                 "listInfo": {"type": "bullet", "level": 0, "index": 0}},
                {"id": "c", "type": "table-cell", "text": "cell", "charStart": 27, "charEnd": 31}
            ],
            "metadata": {"pageCount": 3}
        }"#;
        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.blocks.len(), 3);
        assert_eq!(doc.blocks[0].heading_level(), Some(1));
        assert!(matches!(doc.blocks[1].kind, BlockKind::ListItem(_)));
        assert_eq!(doc.blocks[2].kind, BlockKind::Paragraph);
        assert_eq!(doc.metadata.page_count, Some(3));
        assert_eq!(doc.full_text, "1. TERM\n\n- five (5) years\n\ncell");

        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["blocks"][0]["type"], "heading");
        assert_eq!(out["blocks"][1]["listInfo"]["type"], "bullet");
        assert_eq!(out["metadata"]["blockCount"], 3);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"{"blocks": [
            {"id": "a", "type": "paragraph", "text": "x", "charStart": 0, "charEnd": 1},
            {"id": "a", "type": "paragraph", "text": "y", "charStart": 3, "charEnd": 4}
        ]}"#;
        let err = Document::from_json(json).unwrap_err();
        assert!(matches!(err, Error::DocumentInvalid { .. }), "got {err}");
    }

    #[test]
    fn inverted_offsets_are_rejected() {
        let json = r#"{"blocks": [
            {"id": "a", "type": "paragraph", "text": "x", "charStart": 5, "charEnd": 1}
        ]}"#;
        let err = Document::from_json(json).unwrap_err();
        assert!(matches!(err, Error::DocumentInvalid { .. }), "got {err}");
    }
}
