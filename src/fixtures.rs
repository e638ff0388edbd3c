//! Sample contract and analysis for demos and tests, built fresh on every call.

use crate::segmenter::segment_document;
use crate::types::{
    AnalysisResult, Block, BlockId, Document, EditAction, EditOperation, EditPlan, Issue, PlanVariant,
    ScreeningItem, ScreeningStatus, Severity,
};

/// Filename reported for the sample document.
pub const SAMPLE_FILENAME: &str = "sample-nda.docx";

/// Paragraphs of a short mutual NDA, as an extractor would return them.
pub fn sample_paragraphs() -> Vec<String> {
    return [
        "MUTUAL NON-DISCLOSURE AGREEMENT",
        "This Mutual Non-Disclosure Agreement is entered into by Acme Corp. and Beta Industries LLC.",
        "1. DEFINITIONS",
        "“Confidential Information” means all information disclosed by either party, whether oral or \
         written, including information disclosed before the Effective Date.",
        "2. OBLIGATIONS",
        "The Receiving Party shall hold Confidential Information in strict confidence and shall not \
         disclose it to any third party.",
        "- use it solely to evaluate the proposed transaction;",
        "- restrict access to employees with a need to know.",
        "3. TERM",
        "The obligations of this Agreement survive for five (5) years after termination.",
        "4. REMEDIES",
        "The Disclosing Party is entitled to injunctive relief without posting bond, and the Receiving \
         Party shall indemnify the Disclosing Party for all losses.",
        "5. GOVERNING LAW",
        "This Agreement is governed by the laws of the State of Delaware.",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
}

/// The sample paragraphs, segmented.
pub fn sample_document() -> Document {
    return segment_document(SAMPLE_FILENAME, &sample_paragraphs(), Some(2));
}

/// Findings against `doc`, with plans targeting the blocks that hold each quote.
///
/// Plans are only attached where the quoted clause is present, so any
/// document yields a usable result.
pub fn sample_analysis(doc: &Document) -> AnalysisResult {
    let issues = vec![
        issue(
            doc,
            &IssueSeed {
                description: "Confidentiality obligations survive for five years after termination.",
                id: "term",
                quote: "five (5) years",
                recommendation: "Reduce the survival period to two years.",
                risk: "Long tails raise compliance cost for information that quickly goes stale.",
                severity: Severity::Red,
                title: "Survival period too long",
            },
            &[
                (
                    PlanVariant::Preferred,
                    "Two-year tail",
                    &[replace("five (5) years", "two (2) years", "Two years matches our standard position.")],
                ),
                (
                    PlanVariant::Fallback,
                    "Three-year tail",
                    &[replace("five (5) years", "three (3) years", "Three years is the most we accept.")],
                ),
            ],
        ),
        issue(
            doc,
            &IssueSeed {
                description: "The Receiving Party indemnifies the Disclosing Party for all losses.",
                id: "indemnity",
                quote: "shall indemnify the Disclosing Party for all losses",
                recommendation: "Strike the indemnity or cap it.",
                risk: "Uncapped indemnity is unusual in an NDA and shifts unlimited liability.",
                severity: Severity::Yellow,
                title: "Uncapped indemnity",
            },
            &[
                (
                    PlanVariant::Preferred,
                    "Remove the indemnity",
                    &[delete(
                        ", and the Receiving Party shall indemnify the Disclosing Party for all losses",
                        "Indemnity is outside the scope of a standard NDA.",
                    )],
                ),
                (
                    PlanVariant::Fallback,
                    "Cap the indemnity",
                    &[append(
                        "for all losses",
                        "Liability under this Section is capped at $100,000.",
                        "Cap agreed as a fallback.",
                    )],
                ),
            ],
        ),
        issue(
            doc,
            &IssueSeed {
                description: "Oral disclosures are protected without any written confirmation.",
                id: "definition",
                quote: "whether oral or written",
                recommendation: "Require oral disclosures to be confirmed in writing.",
                risk: "Disputes over what was said in meetings are hard to resolve.",
                severity: Severity::Yellow,
                title: "Broad definition",
            },
            &[(
                PlanVariant::Preferred,
                "Written confirmation",
                &[
                    replace("whether oral or written", "in writing", "Limit to written disclosures."),
                    append(
                        "whether oral or written",
                        "Oral disclosures qualify only if summarized in writing within thirty (30) days.",
                        "",
                    ),
                ],
            )],
        ),
        issue(
            doc,
            &IssueSeed {
                description: "Delaware law governs the agreement.",
                id: "law",
                quote: "State of Delaware",
                recommendation: "No change needed.",
                risk: "",
                severity: Severity::Green,
                title: "Governing law",
            },
            &[],
        ),
    ];

    return AnalysisResult {
        classification: Severity::Yellow,
        contract_type: "Mutual NDA".to_string(),
        document: doc.filename.clone(),
        governing_law: "Delaware".to_string(),
        issues,
        next_steps: vec![
            "Send the redline to the counterparty.".to_string(),
            "Escalate the survival period if they push back.".to_string(),
        ],
        parties: "Acme Corp. and Beta Industries LLC".to_string(),
        recommendation: "Sign once the survival period and indemnity are fixed.".to_string(),
        screening: vec![
            ScreeningItem {
                criterion: "Mutual obligations".to_string(),
                note: String::new(),
                status: ScreeningStatus::Pass,
            },
            ScreeningItem {
                criterion: "Term of five years or less".to_string(),
                note: "Five years after termination".to_string(),
                status: ScreeningStatus::Flag,
            },
            ScreeningItem {
                criterion: "No indemnity".to_string(),
                note: "Uncapped indemnity in Remedies".to_string(),
                status: ScreeningStatus::Fail,
            },
        ],
        summary: "A mostly standard mutual NDA with a long survival period and an unusual indemnity."
            .to_string(),
        term: "Five years after termination".to_string(),
    };
}

/// Fixed fields of one sample issue.
struct IssueSeed {
    /// See [`Issue::description`].
    description: &'static str,
    /// See [`Issue::id`].
    id: &'static str,
    /// Literal quote used to find the issue's block.
    quote: &'static str,
    /// See [`Issue::recommendation`].
    recommendation: &'static str,
    /// See [`Issue::risk`].
    risk: &'static str,
    /// See [`Issue::severity`].
    severity: Severity,
    /// See [`Issue::title`].
    title: &'static str,
}

/// An operation described by the text it targets rather than by offsets.
struct OpSeed {
    /// Rationale; empty for none.
    comment: &'static str,
    /// Text located in the block; the range for range edits.
    target: &'static str,
    /// Replacement or appended text; `None` deletes `target`.
    text: Option<&'static str>,
    /// Append after the block instead of editing `target`.
    whole_block: bool,
}

/// Append `text` to the block containing `anchor`.
const fn append(anchor: &'static str, text: &'static str, comment: &'static str) -> OpSeed {
    return OpSeed {
        comment,
        target: anchor,
        text: Some(text),
        whole_block: true,
    };
}

/// Delete `target`.
const fn delete(target: &'static str, comment: &'static str) -> OpSeed {
    return OpSeed {
        comment,
        target,
        text: None,
        whole_block: false,
    };
}

/// Build one issue, placing each operation against the block holding its target.
fn issue(doc: &Document, seed: &IssueSeed, plans: &[(PlanVariant, &str, &[OpSeed])]) -> Issue {
    let source_block_ids = locate(&doc.blocks, seed.quote)
        .map(|(block, _)| return vec![block.id.clone()])
        .unwrap_or_default();

    let edit_plans = plans
        .iter()
        .map(|(variant, description, ops)| {
            let operations = ops
                .iter()
                .enumerate()
                .filter_map(|(i, op)| {
                    let id = format!("{}-{variant:?}-{i}", seed.id).to_lowercase();
                    return operation(doc, seed.id, id, op);
                })
                .collect();
            return EditPlan {
                description: (*description).to_string(),
                operations,
                variant: *variant,
            };
        })
        .collect();

    return Issue {
        description: seed.description.to_string(),
        edit_plans,
        id: seed.id.to_string(),
        recommendation: seed.recommendation.to_string(),
        risk: seed.risk.to_string(),
        severity: seed.severity,
        source_block_ids,
        source_quote: Some(seed.quote.to_string()),
        title: seed.title.to_string(),
    };
}

/// First block containing `needle`, with the needle's char range in it.
fn locate<'a>(blocks: &'a [Block], needle: &str) -> Option<(&'a Block, (i64, i64))> {
    return blocks.iter().find_map(|block| {
        let byte = block.text.find(needle)?;
        let start = block.text.get(..byte)?.chars().count();
        let end = start.saturating_add(needle.chars().count());
        return Some((block, (i64::try_from(start).ok()?, i64::try_from(end).ok()?)));
    });
}

/// Place one seeded operation, or `None` if its target text is absent.
fn operation(doc: &Document, issue_id: &str, id: String, seed: &OpSeed) -> Option<EditOperation> {
    let (block, (start, end)) = locate(&doc.blocks, seed.target)?;
    let action = match (seed.whole_block, seed.text) {
        (true, Some(text)) => EditAction::InsertAfter { text: text.to_string() },
        (false, Some(text)) => EditAction::ReplaceRange {
            end,
            start,
            text: text.to_string(),
        },
        (_, None) => EditAction::DeleteRange { end, start },
    };
    return Some(EditOperation {
        action,
        block_id: BlockId(block.id.0.clone()),
        comment: (!seed.comment.is_empty()).then(|| return seed.comment.to_string()),
        id,
        issue_id: issue_id.to_string(),
    });
}

/// Replace `target` with `text`.
const fn replace(target: &'static str, text: &'static str, comment: &'static str) -> OpSeed {
    return OpSeed {
        comment,
        target,
        text: Some(text),
        whole_block: false,
    };
}
