//! Block-marker streams for the analysis step, and mapping its references back to blocks.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Block, BlockId, Document, Issue};

/// Opening marker of one block in an annotated stream.
static OPEN_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"\[BLOCK:([^\]\s]+)\]").expect("valid regex");
});

/// Marker look-alikes inside block text: `[BLOCK:` or `[/BLOCK]`.
static MARKER_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"\[(/?BLOCK[:\]])").expect("valid regex");
});

/// Default excerpt length for quotes assembled from blocks.
pub const EXCERPT_CHARS: usize = 200;

/// Position lookup for the blocks of one document.
pub struct BlockIndex<'a> {
    /// Blocks in document order.
    blocks: &'a [Block],
    /// Block id to position in `blocks`.
    positions: HashMap<&'a BlockId, usize>,
}

impl<'a> BlockIndex<'a> {
    /// Borrow the block with this id.
    pub fn get(&self, id: &BlockId) -> Option<&'a Block> {
        let position = *self.positions.get(id)?;
        return self.blocks.get(position);
    }

    /// Index a block list.
    pub fn new(blocks: &'a [Block]) -> Self {
        let positions = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| return (&b.id, i))
            .collect();
        return Self { blocks, positions };
    }
}

/// Serialize blocks as `[BLOCK:id][H1] text [/BLOCK]`, blank-line separated.
///
/// Marker look-alikes in block text are written with `(` in place of `[`,
/// so every marker in the stream is one this function wrote.
pub fn annotate(blocks: &[Block]) -> String {
    return blocks
        .iter()
        .map(|block| {
            let level = block
                .heading_level()
                .map(|l| return format!("[H{l}]"))
                .unwrap_or_default();
            return format!("[BLOCK:{}]{level} {} [/BLOCK]", block.id, marker_safe(&block.text));
        })
        .collect::<Vec<_>>()
        .join("\n\n");
}

/// Like [`annotate`], with `--- SECTION n ---` dividers before headings.
pub fn annotate_readable(blocks: &[Block]) -> String {
    let mut section = 0_u32;
    let mut subsection = 0_u32;

    return blocks
        .iter()
        .map(|block| {
            let divider = match block.heading_level() {
                Some(1) => {
                    section = section.saturating_add(1);
                    subsection = 0;
                    format!("\n--- SECTION {section} ---\n")
                },
                Some(_) => {
                    subsection = subsection.saturating_add(1);
                    format!("\n-- {section}.{subsection} --\n")
                },
                None => String::new(),
            };
            return format!("{divider}[BLOCK:{}] {} [/BLOCK]", block.id, marker_safe(&block.text));
        })
        .collect::<Vec<_>>()
        .join("\n\n");
}

/// First block whose text contains `quote`, ignoring case.
pub fn block_for_quote<'a>(blocks: &'a [Block], quote: &str) -> Option<&'a Block> {
    let needle = quote.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    return blocks.iter().find(|b| return b.text.to_lowercase().contains(&needle));
}

/// The heading and every block under it, up to the next heading of the same
/// or a higher level. Empty if `heading_id` is not a heading.
pub fn blocks_in_section<'a>(blocks: &'a [Block], heading_id: &BlockId) -> &'a [Block] {
    let Some(start) = blocks.iter().position(|b| return &b.id == heading_id) else {
        return &[];
    };
    let Some(level) = blocks.get(start).and_then(Block::heading_level) else {
        return &[];
    };

    let rest = blocks.get(start.saturating_add(1)..).unwrap_or(&[]);
    let len = rest
        .iter()
        .position(|b| return b.heading_level().is_some_and(|l| return l <= level))
        .unwrap_or(rest.len());
    return blocks.get(start..=start.saturating_add(len)).unwrap_or(&[]);
}

/// Join the texts of the given blocks, truncated to `max_chars` with `...`.
pub fn excerpt(index: &BlockIndex<'_>, ids: &[BlockId], max_chars: usize) -> String {
    let full = ids
        .iter()
        .filter_map(|id| return index.get(id))
        .map(|b| return b.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if full.chars().count() <= max_chars {
        return full;
    }
    let kept: String = full.chars().take(max_chars.saturating_sub(3)).collect();
    return format!("{kept}...");
}

/// Nearest heading strictly before the block at `position`.
pub fn find_parent_heading(blocks: &[Block], position: usize) -> Option<&Block> {
    return blocks
        .get(..position)
        .unwrap_or(blocks)
        .iter()
        .rev()
        .find(|b| return b.is_heading());
}

/// Ids of the issues citing each block, in issue order.
pub fn issues_by_block(issues: &[Issue]) -> HashMap<&BlockId, Vec<&str>> {
    let mut map: HashMap<&BlockId, Vec<&str>> = HashMap::new();
    for issue in issues {
        for id in &issue.source_block_ids {
            let cited = map.entry(id).or_default();
            if !cited.contains(&issue.id.as_str()) {
                cited.push(issue.id.as_str());
            }
        }
    }
    return map;
}

/// Every block id named by an opening marker, in stream order.
pub fn marker_ids(stream: &str) -> Vec<BlockId> {
    return OPEN_MARKER
        .captures_iter(stream)
        .filter_map(|c| return c.get(1))
        .map(|m| return BlockId::from(m.as_str()))
        .collect();
}

/// `text` with marker look-alikes defused.
fn marker_safe(text: &str) -> Cow<'_, str> {
    return MARKER_LIKE.replace_all(text, "($1");
}

/// Render the heading outline and metadata of a document.
pub fn outline(doc: &Document) -> String {
    let mut out = format!(
        "Document: {}\nWord Count: {}\nBlock Count: {}\nHas Lists: {}\n",
        doc.filename, doc.metadata.word_count, doc.metadata.block_count, doc.metadata.has_lists,
    );
    if let Some(pages) = doc.metadata.page_count {
        let _ = writeln!(out, "Pages: {pages}");
    }
    out.push_str("\nDocument Structure:\n");

    for heading in doc.blocks.iter().filter(|b| return b.is_heading()) {
        let level = usize::from(heading.heading_level().unwrap_or(1));
        let indent = "  ".repeat(level.saturating_sub(1));
        let blocks = blocks_in_section(&doc.blocks, &heading.id).len();
        let _ = writeln!(out, "{indent}- {} ({blocks} blocks)", heading.text);
    }
    return out;
}

/// Marker ids in `stream` that do not resolve to exactly one block.
pub fn unresolved_markers(stream: &str, blocks: &[Block]) -> Vec<BlockId> {
    return marker_ids(stream)
        .into_iter()
        .filter(|id| return blocks.iter().filter(|b| return &b.id == id).count() != 1)
        .collect();
}
