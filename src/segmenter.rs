//! Block segmentation: raw paragraph strings in, typed ID-stable blocks out.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{BLOCK_SEPARATOR, Block, BlockId, BlockKind, Document, ListInfo, ListStyle};

/// `ARTICLE IV`, `Section 2`, `EXHIBIT A`...
static ARTICLE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^(?i:ARTICLE|SECTION|EXHIBIT|SCHEDULE|ANNEX)\s+([IVX]+|\d+|[A-Z])\b")
        .expect("valid regex");
});

/// Optional enumerator followed by an all-caps title, e.g. `2.1 CONFIDENTIALITY`.
static CAPS_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^(\d+(\.\d+)*\.?\s+)?[A-Z][A-Z\s]{2,}$").expect("valid regex");
});

/// Leading enumerator followed by capitalized text, e.g. `3.2 Term of Agreement`.
static ENUMERATED_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^(\d+(\.\d+)*\.?|[A-Z]\.)\s+[A-Z]").expect("valid regex");
});

/// Bullet or enumerator at the start of a line.
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^([•\-\*]|\d+[\.\)]|\(?[a-z]\))\s+\S").expect("valid regex");
});

/// Dotted numeric prefix used to infer heading depth.
static NUMERIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^(\d+(\.\d+)*)").expect("valid regex");
});

/// Paragraph boundary in extracted text: a blank line or a page break.
static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"\n[ \t\r]*\n|\x0C").expect("valid regex");
});

/// Deepest heading level we infer from numbering.
const MAX_HEADING_LEVEL: usize = 6;

/// Enumerated and article headings must be shorter than this many chars.
const MAX_ENUMERATED_TITLE_CHARS: usize = 100;

/// Unnumbered all-caps headings must be shorter than this many chars.
const MAX_CAPS_HEADING_CHARS: usize = 80;

/// Unnumbered all-caps headings must be longer than this many chars.
const MIN_CAPS_HEADING_CHARS: usize = 3;

/// Running state while walking one document's paragraphs.
struct Segmenter {
    /// Ids handed out so far in this document.
    issued: HashSet<BlockId>,
    /// Number of list items classified so far.
    list_items: usize,
    /// Char offset where the next block starts.
    offset: usize,
}

impl Segmenter {
    /// Classify one trimmed paragraph. Heading rules win over list rules.
    fn classify(&mut self, text: &str, indent_columns: usize) -> BlockKind {
        if let Some(level) = heading_level(text) {
            return BlockKind::Heading { level };
        }
        if let Some(style) = list_style(text) {
            let index = self.list_items;
            self.list_items = self.list_items.saturating_add(1);
            return BlockKind::ListItem(ListInfo {
                depth: indent_columns / 2,
                index,
                style,
            });
        }
        return BlockKind::Paragraph;
    }

    /// Mint an id never issued before in this document.
    fn fresh_id(&mut self) -> BlockId {
        loop {
            let id = BlockId::generate();
            if self.issued.insert(id.clone()) {
                return id;
            }
            log::debug!("block id collision on {id}, regenerating");
        }
    }

    /// Turn one raw paragraph into a block, or `None` if it is blank.
    fn push(&mut self, raw: &str) -> Option<Block> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        let kind = self.classify(text, indent_columns(raw));
        let char_start = self.offset;
        let char_end = char_start.saturating_add(text.chars().count());
        self.offset = char_end.saturating_add(BLOCK_SEPARATOR.chars().count());

        return Some(Block {
            char_end,
            char_start,
            id: self.fresh_id(),
            kind,
            text: text.to_string(),
        });
    }
}

/// Infer a heading level, or `None` if the text does not read as a heading.
fn heading_level(text: &str) -> Option<u8> {
    let len = text.chars().count();
    let has_letters = text.chars().any(char::is_alphabetic);

    let enumerated_title = ENUMERATED_TITLE.is_match(text)
        && len < MAX_ENUMERATED_TITLE_CHARS
        && !text.ends_with(['.', ';', ':', ',']);
    let caps_line = has_letters
        && text == text.to_uppercase()
        && len > MIN_CAPS_HEADING_CHARS
        && len < MAX_CAPS_HEADING_CHARS;

    let is_heading = CAPS_TITLE.is_match(text)
        || enumerated_title
        || (ARTICLE_MARKER.is_match(text) && len < MAX_ENUMERATED_TITLE_CHARS)
        || caps_line;
    if !is_heading {
        return None;
    }

    if let Some(prefix) = NUMERIC_PREFIX.captures(text).and_then(|c| return c.get(1)) {
        let depth = prefix.as_str().split('.').count().min(MAX_HEADING_LEVEL);
        return Some(u8::try_from(depth).unwrap_or(1));
    }

    let upper = text.to_uppercase();
    if upper.starts_with("SECTION") {
        return Some(2);
    }
    if upper.starts_with("ARTICLE") || text == upper {
        return Some(1);
    }
    return Some(2);
}

/// Leading whitespace width in columns; a tab counts as two.
fn indent_columns(raw: &str) -> usize {
    return raw
        .trim_start_matches(['\n', '\r'])
        .chars()
        .take_while(|c| return *c == ' ' || *c == '\t')
        .map(|c| return if c == '\t' { 2 } else { 1 })
        .sum();
}

/// Marker family if the text starts with a bullet or enumerator.
fn list_style(text: &str) -> Option<ListStyle> {
    let marker = LIST_MARKER.captures(text)?.get(1)?.as_str();
    if marker.starts_with(['•', '-', '*']) {
        return Some(ListStyle::Bullet);
    }
    return Some(ListStyle::Numbered);
}

/// Segment ordered paragraphs into blocks with fresh ids and running offsets.
///
/// Blank paragraphs are dropped before id assignment and consume no offset.
pub fn segment<S: AsRef<str>>(paragraphs: &[S]) -> Vec<Block> {
    let mut segmenter = Segmenter {
        issued: HashSet::new(),
        list_items: 0,
        offset: 0,
    };
    return paragraphs
        .iter()
        .filter_map(|p| return segmenter.push(p.as_ref()))
        .collect();
}

/// Segment paragraphs and wrap them as a [`Document`].
pub fn segment_document<S: AsRef<str>>(
    filename: &str,
    paragraphs: &[S],
    page_count: Option<u32>,
) -> Document {
    let blocks = segment(paragraphs);
    log::debug!("segmented {filename} into {} blocks", blocks.len());
    return Document::from_blocks(filename, blocks, page_count);
}

/// Split extracted text into paragraphs on blank lines and page breaks.
///
/// Leading indentation is kept so list depth survives; trailing whitespace
/// and empty pieces are removed.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    return PARAGRAPH_BREAK
        .split(text)
        .map(|p| return p.trim_start_matches(['\n', '\r']).trim_end().to_string())
        .filter(|p| return !p.trim().is_empty())
        .collect();
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::indexing_slicing, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::types::char_slice;

    fn kinds(paragraphs: &[&str]) -> Vec<BlockKind> {
        return segment(paragraphs).into_iter().map(|b| return b.kind).collect();
    }

    #[test]
    fn concatenation_reproduces_full_text() {
        let paragraphs = [
            "MUTUAL NON-DISCLOSURE AGREEMENT",
            "   ",
            "1. Definitions",
            "“Confidential Information” means any information disclosed by either party.",
            "- trade secrets",
            "",
            "The term is five (5) years.",
        ];
        let doc = segment_document("nda.docx", &paragraphs, None);

        let joined = doc
            .blocks
            .iter()
            .map(|b| return b.text.as_str())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR);
        assert_eq!(doc.full_text, joined);
        assert_eq!(doc.blocks.len(), 5);

        for block in &doc.blocks {
            assert!(block.char_start <= block.char_end);
            assert_eq!(char_slice(&doc.full_text, block.char_start, block.char_end), block.text);
        }
    }

    #[test]
    fn blank_paragraphs_consume_no_offset() {
        let blocks = segment(&["alpha", "", "  \t ", "beta"]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].char_start, 0);
        assert_eq!(blocks[0].char_end, 5);
        assert_eq!(blocks[1].char_start, 7);
        assert_eq!(blocks[1].char_end, 11);
    }

    #[test]
    fn ids_are_unique() {
        let paragraphs: Vec<String> = (0..500).map(|i| return format!("paragraph {i}")).collect();
        let blocks = segment(&paragraphs);
        let ids: HashSet<_> = blocks.iter().map(|b| return b.id.clone()).collect();
        assert_eq!(ids.len(), blocks.len());
    }

    #[test]
    fn heading_levels_follow_enumerator_depth() {
        assert_eq!(
            kinds(&["1. DEFINITIONS", "2.1 Exclusions", "3.2.1 Notice Period", "ARTICLE IV", "Section 5 Remedies"]),
            vec![
                BlockKind::Heading { level: 1 },
                BlockKind::Heading { level: 2 },
                BlockKind::Heading { level: 3 },
                BlockKind::Heading { level: 1 },
                BlockKind::Heading { level: 2 },
            ]
        );
    }

    #[test]
    fn all_caps_short_lines_are_level_one_headings() {
        assert_eq!(kinds(&["GOVERNING LAW"]), vec![BlockKind::Heading { level: 1 }]);
        // Too short, or no letters at all.
        assert_eq!(kinds(&["NO."]), vec![BlockKind::Paragraph]);
        assert_eq!(kinds(&["-----"]), vec![BlockKind::Paragraph]);
    }

    #[test]
    fn sentences_with_enumerators_are_list_items() {
        let blocks = segment(&[
            "1. The Recipient shall hold all Confidential Information in confidence.",
            "  - including copies",
            "(a) notes and analyses;",
            "Plain prose paragraph.",
        ]);
        assert_eq!(
            blocks[0].kind,
            BlockKind::ListItem(ListInfo { depth: 0, index: 0, style: ListStyle::Numbered })
        );
        assert_eq!(
            blocks[1].kind,
            BlockKind::ListItem(ListInfo { depth: 1, index: 1, style: ListStyle::Bullet })
        );
        assert_eq!(
            blocks[2].kind,
            BlockKind::ListItem(ListInfo { depth: 0, index: 2, style: ListStyle::Numbered })
        );
        assert_eq!(blocks[3].kind, BlockKind::Paragraph);
        assert_eq!(blocks[1].text, "- including copies");
    }

    #[test]
    fn classification_is_deterministic() {
        let paragraphs = ["1. TERM", "This Agreement lasts five (5) years.", "* bullet"];
        assert_eq!(kinds(&paragraphs), kinds(&paragraphs));
    }

    #[test]
    fn split_paragraphs_on_blank_lines_and_page_breaks() {
        let text = "TITLE\n\nFirst line\ncontinues\n  \n  - nested item\x0CPage two\n\n\n";
        assert_eq!(
            split_paragraphs(text),
            vec!["TITLE", "First line\ncontinues", "  - nested item", "Page two"]
        );
    }
}
