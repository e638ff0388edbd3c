//! Boundary validation for the analysis result and reviewer selections.
//!
//! The analysis step sends loosely shaped JSON. It is checked and coerced here
//! exactly once: anything that cannot become a strict [`Issue`] or
//! [`EditOperation`] is dropped with a warning, and only a result that has no
//! usable shape at all is a fatal [`Error::AnalysisMalformed`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::annotator::{BlockIndex, block_for_quote};
use crate::error::Error;
use crate::types::{
    AnalysisResult, Block, BlockId, EditAction, EditOperation, EditPlan, Issue, PlanVariant,
    ScreeningItem, ScreeningStatus, Severity,
};

/// Reviewer choice for one issue. Absent fields take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IssueDecision {
    /// Whether the issue's edits go into the export at all.
    pub apply: bool,
    /// Whether edit rationales become comments.
    pub include_comment: bool,
    /// Which plan to take.
    pub variant: PlanVariant,
}

impl Default for IssueDecision {
    fn default() -> Self {
        return Self {
            apply: true,
            include_comment: true,
            variant: PlanVariant::Preferred,
        };
    }
}

/// Reviewer decisions keyed by issue id.
pub type Decisions = HashMap<String, IssueDecision>;

/// Loose top-level shape of an analysis result.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    /// Overall traffic light. Required.
    #[serde(deserialize_with = "lenient_text")]
    classification: String,
    /// Contract type; the wire name is `type`.
    #[serde(default, rename = "type", deserialize_with = "lenient_text")]
    contract_type: String,
    /// Document name.
    #[serde(default, deserialize_with = "lenient_text")]
    document: String,
    /// Governing law.
    #[serde(default, deserialize_with = "lenient_text")]
    governing_law: String,
    /// Issues, coerced one at a time. Required.
    issues: Vec<Value>,
    /// Next steps.
    #[serde(default, deserialize_with = "lenient_list")]
    next_steps: Vec<Value>,
    /// Parties.
    #[serde(default, deserialize_with = "lenient_text")]
    parties: String,
    /// Overall recommendation.
    #[serde(default, deserialize_with = "lenient_text")]
    recommendation: String,
    /// Screening rows.
    #[serde(default, deserialize_with = "lenient_list")]
    screening: Vec<Value>,
    /// Summary paragraph.
    #[serde(default, deserialize_with = "lenient_text")]
    summary: String,
    /// Term.
    #[serde(default, deserialize_with = "lenient_text")]
    term: String,
}

/// Loose shape of one issue.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIssue {
    /// What the clause says.
    #[serde(default, deserialize_with = "lenient_text")]
    description: String,
    /// Plans, coerced one at a time.
    #[serde(default, deserialize_with = "lenient_list")]
    edit_plans: Vec<Value>,
    /// Issue id; generated when missing.
    #[serde(default, deserialize_with = "lenient_text")]
    id: String,
    /// Recommended action.
    #[serde(default, deserialize_with = "lenient_text")]
    recommendation: String,
    /// Risk.
    #[serde(default, deserialize_with = "lenient_text")]
    risk: String,
    /// Severity name.
    #[serde(default, deserialize_with = "lenient_text")]
    severity: String,
    /// Referenced block ids.
    #[serde(default, deserialize_with = "lenient_list")]
    source_block_ids: Vec<Value>,
    /// Literal quote.
    #[serde(default, deserialize_with = "lenient_optional_text")]
    source_quote: Option<String>,
    /// Title.
    #[serde(default, deserialize_with = "lenient_text")]
    title: String,
}

/// Loose shape of one edit operation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOperation {
    /// Target block.
    #[serde(default, deserialize_with = "lenient_text")]
    block_id: String,
    /// Rationale.
    #[serde(default, deserialize_with = "lenient_optional_text")]
    comment: Option<String>,
    /// End offset, any JSON value until checked.
    #[serde(default)]
    end_char: Option<Value>,
    /// Operation id; generated when missing.
    #[serde(default, deserialize_with = "lenient_text")]
    id: String,
    /// Originating issue.
    #[serde(default, deserialize_with = "lenient_text")]
    issue_id: String,
    /// `replace_range`, `delete_range` or `insert_after`.
    #[serde(default, rename = "type", deserialize_with = "lenient_text")]
    kind: String,
    /// Replacement or appended text.
    #[serde(default, deserialize_with = "lenient_optional_text")]
    new_text: Option<String>,
    /// Start offset, any JSON value until checked.
    #[serde(default)]
    start_char: Option<Value>,
}

/// Loose shape of one edit plan.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlan {
    /// Why this plan.
    #[serde(default, deserialize_with = "lenient_text")]
    description: String,
    /// Operations, coerced one at a time.
    #[serde(default, deserialize_with = "lenient_list")]
    operations: Vec<Value>,
    /// `preferred` or `fallback`.
    #[serde(default, deserialize_with = "lenient_text")]
    variant: String,
}

/// Loose shape of one screening row.
#[derive(Deserialize)]
struct RawScreening {
    /// What was checked.
    #[serde(default, deserialize_with = "lenient_text")]
    criterion: String,
    /// Note.
    #[serde(default, deserialize_with = "lenient_text")]
    note: String,
    /// `pass`, `flag` or `fail`.
    #[serde(default, deserialize_with = "lenient_text")]
    status: String,
}

/// Turn one raw issue into a strict one. `None` if it is not an object.
fn coerce_issue(value: Value, position: usize) -> Option<Issue> {
    let raw: RawIssue = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("skipping issue #{}: {e}", position.saturating_add(1));
            return None;
        },
    };

    let id = if raw.id.is_empty() {
        format!("issue-{}", position.saturating_add(1))
    } else {
        raw.id
    };
    let severity = parse_severity(&raw.severity, &format!("issue {id}"));

    let edit_plans = raw
        .edit_plans
        .into_iter()
        .enumerate()
        .filter_map(|(i, plan)| return coerce_plan(plan, &id, i))
        .collect();
    let source_block_ids = raw
        .source_block_ids
        .iter()
        .map(value_text)
        .filter(|s| return !s.is_empty())
        .map(BlockId)
        .collect();

    return Some(Issue {
        description: raw.description,
        edit_plans,
        id,
        recommendation: raw.recommendation,
        risk: raw.risk,
        severity,
        source_block_ids,
        source_quote: raw.source_quote,
        title: if raw.title.is_empty() { "Untitled issue".to_string() } else { raw.title },
    });
}

/// Turn one raw operation into a strict one, or drop it with a warning.
///
/// Operations nested under an issue always belong to that issue.
fn coerce_operation(value: Value, issue_id: Option<&str>, position: usize) -> Option<EditOperation> {
    let raw: RawOperation = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("skipping edit operation #{}: {e}", position.saturating_add(1));
            return None;
        },
    };

    let issue_id = issue_id.map_or(raw.issue_id, str::to_string);
    let id = if raw.id.is_empty() {
        format!("{issue_id}-edit-{}", position.saturating_add(1))
    } else {
        raw.id
    };
    if raw.block_id.is_empty() {
        log::warn!("edit {id} has no blockId, skipped");
        return None;
    }

    let action = match raw.kind.as_str() {
        "delete_range" | "replace_range" => {
            let (Some(start), Some(end)) = (offset(raw.start_char.as_ref()), offset(raw.end_char.as_ref()))
            else {
                log::warn!("edit {id} ({}) lacks integer startChar/endChar, skipped", raw.kind);
                return None;
            };
            if raw.kind == "delete_range" {
                EditAction::DeleteRange { end, start }
            } else {
                EditAction::ReplaceRange {
                    end,
                    start,
                    text: raw.new_text.unwrap_or_default(),
                }
            }
        },
        "insert_after" => {
            let Some(text) = raw.new_text.filter(|t| return !t.is_empty()) else {
                log::warn!("edit {id} (insert_after) has no newText, skipped");
                return None;
            };
            EditAction::InsertAfter { text }
        },
        other => {
            log::warn!("edit {id} has unknown type `{other}`, skipped");
            return None;
        },
    };

    return Some(EditOperation {
        action,
        block_id: BlockId(raw.block_id),
        comment: raw.comment.filter(|c| return !c.trim().is_empty()),
        id,
        issue_id,
    });
}

/// Turn one raw plan into a strict one.
fn coerce_plan(value: Value, issue_id: &str, position: usize) -> Option<EditPlan> {
    let raw: RawPlan = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("skipping plan #{} of issue {issue_id}: {e}", position.saturating_add(1));
            return None;
        },
    };

    let variant = match raw.variant.to_lowercase().as_str() {
        "fallback" => PlanVariant::Fallback,
        "preferred" | "" => PlanVariant::Preferred,
        other => {
            log::warn!("plan of issue {issue_id} has unknown variant `{other}`, treating as preferred");
            PlanVariant::Preferred
        },
    };
    let operations = raw
        .operations
        .into_iter()
        .enumerate()
        .filter_map(|(i, op)| return coerce_operation(op, Some(issue_id), i))
        .collect();

    return Some(EditPlan {
        description: raw.description,
        operations,
        variant,
    });
}

/// Turn one raw screening row into a strict one.
fn coerce_screening(value: Value) -> Option<ScreeningItem> {
    let raw: RawScreening = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("skipping screening row: {e}");
            return None;
        },
    };
    let status = match raw.status.to_lowercase().as_str() {
        "pass" => ScreeningStatus::Pass,
        "fail" => ScreeningStatus::Fail,
        "flag" => ScreeningStatus::Flag,
        other => {
            log::warn!("screening `{}` has unknown status `{other}`, flagging", raw.criterion);
            ScreeningStatus::Flag
        },
    };
    return Some(ScreeningItem {
        criterion: raw.criterion,
        note: raw.note,
        status,
    });
}

/// Slice from the first `{` to the last `}`, dropping prose or code fences
/// around the object.
fn json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    return raw.get(start..=end);
}

/// Accept any JSON value where a list is expected. `null` is empty and a
/// scalar is a one-element list.
fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    return Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    });
}

/// Like [`lenient_text`], with empty text read as absent.
fn lenient_optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let text = value_text(&Value::deserialize(deserializer)?);
    return Ok(if text.is_empty() { None } else { Some(text) });
}

/// Accept any JSON value where text is expected.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    return Ok(value_text(&Value::deserialize(deserializer)?));
}

/// Integer offset from a number or a numeric string.
fn offset(value: Option<&Value>) -> Option<i64> {
    return match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(_) | Value::Bool(_) | Value::Null | Value::Object(_) => None,
    };
}

/// Parse an analysis result out of the analysis step's raw output.
///
/// # Errors
///
/// Returns `Error::AnalysisMalformed` carrying the raw text when there is no
/// JSON object, it does not parse, or it lacks `classification` or an
/// `issues` list.
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult, Error> {
    let malformed = |reason: String| {
        return Error::AnalysisMalformed {
            raw: raw.to_string(),
            reason,
        };
    };

    let body = json_object(raw).ok_or_else(|| return malformed("no JSON object found".to_string()))?;
    let value: Value = serde_json::from_str(body).map_err(|e| return malformed(e.to_string()))?;
    let parsed: RawAnalysis = serde_json::from_value(value).map_err(|e| return malformed(e.to_string()))?;

    let issues: Vec<Issue> = parsed
        .issues
        .into_iter()
        .enumerate()
        .filter_map(|(i, issue)| return coerce_issue(issue, i))
        .collect();
    let screening = parsed.screening.into_iter().filter_map(coerce_screening).collect();
    let next_steps = parsed
        .next_steps
        .iter()
        .map(value_text)
        .filter(|s| return !s.is_empty())
        .collect();

    log::info!("analysis result accepted with {} issues", issues.len());
    return Ok(AnalysisResult {
        classification: parse_severity(&parsed.classification, "classification"),
        contract_type: parsed.contract_type,
        document: parsed.document,
        governing_law: parsed.governing_law,
        issues,
        next_steps,
        parties: parsed.parties,
        recommendation: parsed.recommendation,
        screening,
        summary: parsed.summary,
        term: parsed.term,
    });
}

/// Parse reviewer decisions, a JSON object keyed by issue id.
///
/// # Errors
///
/// Returns `Error::Json` if the text is not such an object.
pub fn parse_decisions(raw: &str) -> Result<Decisions, Error> {
    return Ok(serde_json::from_str(raw)?);
}

/// Parse directly selected edits: a JSON list, or an object holding one
/// under `selectedEdits`.
///
/// # Errors
///
/// Returns `Error::AnalysisMalformed` if the text is not JSON of either shape.
pub fn parse_edits(raw: &str) -> Result<Vec<EditOperation>, Error> {
    let malformed = |reason: &str| {
        return Error::AnalysisMalformed {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| return malformed(&e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("selectedEdits") {
            Some(Value::Array(items)) => items,
            _ => return Err(malformed("expected a list under `selectedEdits`")),
        },
        Value::Bool(_) | Value::Null | Value::Number(_) | Value::String(_) => {
            return Err(malformed("expected a list of edit operations"));
        },
    };

    let mut edits: Vec<EditOperation> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, op)| return coerce_operation(op, None, i))
        .collect();
    unique_ids(&mut edits);
    return Ok(edits);
}

/// Map a severity name to a level. Unknown names drop to yellow.
fn parse_severity(raw: &str, what: &str) -> Severity {
    return match raw.trim().to_lowercase().as_str() {
        "red" | "critical" | "high" => Severity::Red,
        "green" | "pass" | "low" => Severity::Green,
        "yellow" | "warning" | "medium" => Severity::Yellow,
        other => {
            log::warn!("{what} has unknown severity `{other}`, treating as yellow");
            Severity::Yellow
        },
    };
}

/// Collect the operations of each applied issue's chosen plan, in issue order.
///
/// Issues without a decision are applied with their preferred plan. When the
/// chosen variant is missing the first plan is used. Comments are kept only
/// when both `include_comments` and the issue's decision allow them.
pub fn select_edits(issues: &[Issue], decisions: &Decisions, include_comments: bool) -> Vec<EditOperation> {
    for id in decisions.keys() {
        if !issues.iter().any(|issue| return &issue.id == id) {
            log::warn!("decision for unknown issue {id} ignored");
        }
    }

    let mut selected = Vec::new();
    for issue in issues {
        let decision = decisions.get(&issue.id).copied().unwrap_or_default();
        if !decision.apply {
            log::debug!("issue {} not applied", issue.id);
            continue;
        }
        let Some(plan) = issue
            .edit_plans
            .iter()
            .find(|p| return p.variant == decision.variant)
            .or_else(|| return issue.edit_plans.first())
        else {
            continue;
        };
        if plan.variant != decision.variant {
            log::debug!("issue {} has no {:?} plan, using {:?}", issue.id, decision.variant, plan.variant);
        }

        let keep_comment = include_comments && decision.include_comment;
        selected.extend(plan.operations.iter().cloned().map(|mut op| {
            if !keep_comment {
                op.comment = None;
            }
            return op;
        }));
    }

    unique_ids(&mut selected);
    return selected;
}

/// Suffix repeated operation ids so comment anchors stay distinct.
fn unique_ids(ops: &mut [EditOperation]) {
    let mut seen = HashSet::new();
    for op in ops.iter_mut() {
        let mut candidate = op.id.clone();
        let mut n = 1_usize;
        while !seen.insert(candidate.clone()) {
            n = n.saturating_add(1);
            candidate = format!("{}-{n}", op.id);
        }
        if candidate != op.id {
            log::warn!("edit id {} repeats, renamed to {candidate}", op.id);
            op.id = candidate;
        }
    }
}

/// Exclude issue references to blocks that do not exist.
///
/// Each stale id is logged and dropped on its own. An issue left with no
/// valid reference but carrying a quote is re-anchored to the first block
/// containing that quote.
pub fn validate_references(analysis: &mut AnalysisResult, blocks: &[Block]) {
    let index = BlockIndex::new(blocks);

    for issue in &mut analysis.issues {
        issue.source_block_ids.retain(|id| {
            let known = index.get(id).is_some();
            if !known {
                log::warn!("issue {} references unknown block {id}, reference excluded", issue.id);
            }
            return known;
        });

        if !issue.source_block_ids.is_empty() {
            continue;
        }
        let anchor = issue
            .source_quote
            .as_deref()
            .and_then(|quote| return block_for_quote(blocks, quote));
        if let Some(block) = anchor {
            log::info!("issue {} re-anchored to block {} by its quote", issue.id, block.id);
            issue.source_block_ids.push(block.id.clone());
        }
    }
}

/// Text of a scalar JSON value; empty for null and containers.
fn value_text(value: &Value) -> String {
    return match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Null | Value::Object(_) => String::new(),
    };
}
