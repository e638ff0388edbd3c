use std::fmt::Write as _;

use crate::config::CONFIG_FILE;
use crate::error::Error;

/// ANSI bold, for headings on stderr.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// How much of a malformed analysis result to echo back.
const RAW_EXCERPT_CHARS: usize = 400;

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is one,
/// how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::AnalysisMalformed { raw, reason } => render_analysis_malformed(raw, reason),
        Error::DocumentInvalid { reason } => render_document_invalid(reason),
        _ => render_generic(e),
    };
}

/// Reason plus an excerpt of what was received.
fn render_analysis_malformed(raw: &str, reason: &str) -> String {
    let mut out = format!(
        "\
# Error: Analysis Result Malformed

{reason}

Nothing was exported. Reference, range and overlap problems are skipped one
edit at a time; this error means the result as a whole has no usable shape.
"
    );

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        out.push_str("\nThe analysis result was empty.\n");
    } else {
        let excerpt: String = trimmed.chars().take(RAW_EXCERPT_CHARS).collect();
        out.push_str("\n## Received\n\n");
        for line in excerpt.lines() {
            let _ = writeln!(out, "    {line}");
        }
        if trimmed.chars().count() > RAW_EXCERPT_CHARS {
            out.push_str("    ...\n");
        }
    }

    out.push_str(
        "\
\n## Fix

The result must contain one JSON object with a `classification` and an
`issues` list. Re-run the analysis step, or repair the file by hand.
",
    );
    return out;
}

/// Broken block invariant, with the command that produces valid blocks.
fn render_document_invalid(reason: &str) -> String {
    return format!(
        "\
# Error: Document Invalid

{reason}

## Fix

Block ids must be unique and every block needs `charStart <= charEnd`.
Re-segment the source text:

    redliner segment <text-file> -o document.json
"
    );
}

/// Variants that need no more than a heading and the message.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::FileNotFound { path } => format!(
            "\
# Error: File Not Found

`{}` does not exist.
",
            path.display()
        ),

        Error::ConfigNotFound { path } => format!(
            "\
# Error: Config Not Found

`{}` does not exist.

## Fix

Pass an existing file to `--config`, or drop the flag to use `{CONFIG_FILE}`
from the working directory.
",
            path.display()
        ),

        Error::Io(e) => format!(
            "\
# Error: I/O

{e}
"
        ),
        Error::Json(e) => format!(
            "\
# Error: Invalid JSON

{e}
"
        ),
        Error::TomlDe(e) => format!(
            "\
# Error: Invalid TOML

{e}

## Fix

Check `{CONFIG_FILE}`. Known keys: `author`, `initials`, `brand`,
`fallback_section`, `include_comments`, `clean_scope`, `font`.
"
        ),
        Error::Xml(e) => format!(
            "\
# Error: Package XML

{e}
"
        ),
        Error::Zip(e) => format!(
            "\
# Error: Package Archive

{e}
"
        ),
        Error::AnalysisMalformed { .. } | Error::DocumentInvalid { .. } => format!(
            "\
# Error

{e}
"
        ),
    };
}

#[cfg(test)]
#[allow(
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    clippy::missing_panics_doc,
    reason = "test assertions"
)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn malformed_analysis_echoes_the_raw_text() {
        let md = render_error(&Error::AnalysisMalformed {
            raw: "I could not review this contract.".to_string(),
            reason: "no JSON object found".to_string(),
        });
        assert!(md.starts_with("# Error: Analysis Result Malformed\n"));
        assert!(md.contains("no JSON object found"));
        assert!(md.contains("## Received\n\n    I could not review this contract.\n"));
        assert!(md.contains("## Fix"));
    }

    #[test]
    fn long_raw_text_is_truncated() {
        let raw = "x".repeat(RAW_EXCERPT_CHARS * 2);
        let md = render_error(&Error::AnalysisMalformed { raw, reason: "bad".to_string() });
        assert!(md.contains("    ..."));
        assert!(!md.contains(&"x".repeat(RAW_EXCERPT_CHARS + 1)));
    }

    #[test]
    fn every_variant_has_a_heading() {
        let errors = [
            Error::ConfigNotFound { path: PathBuf::from("team.toml") },
            Error::DocumentInvalid { reason: "duplicate block id `a`".to_string() },
            Error::FileNotFound { path: PathBuf::from("nda.json") },
            Error::Io(std::io::Error::other("disk full")),
        ];
        for error in &errors {
            assert!(render_error(error).starts_with("# Error"), "{error}");
        }
        assert!(render_error(&errors[0]).contains("--config"));
        assert!(render_error(&errors[1]).contains("redliner segment"));
    }
}
