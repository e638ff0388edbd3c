use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    return Path::new("tests/fixtures").join(name);
}

fn redliner(args: &[&str]) -> Output {
    return Command::new(env!("CARGO_BIN_EXE_redliner"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    return String::from_utf8_lossy(&output.stdout).into_owned();
}

fn docx_part(path: &Path, part: &str) -> Option<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(part).ok()?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).unwrap();
    return Some(xml);
}

fn path_str(path: &Path) -> &str {
    return path.to_str().unwrap();
}

#[test]
fn segment_writes_document_json() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("document.json");
    let output = redliner(&[
        "segment",
        path_str(&fixture("services.txt")),
        "--pages",
        "2",
        "-o",
        path_str(&out),
    ]);
    assert!(output.status.success(), "segment failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Segmented 8 blocks"));

    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc["filename"], "services.txt");
    assert_eq!(doc["metadata"]["pageCount"], 2);
    assert_eq!(doc["metadata"]["hasLists"], true);
    let blocks = doc["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 8);
    assert_eq!(blocks[0]["type"], "heading");
    assert_eq!(blocks[5]["type"], "list-item");
    assert_eq!(blocks[6]["text"], "3. NOTICES");
}

#[test]
fn annotate_and_outline_read_the_document() {
    let document = fixture("document.json");
    let stream = stdout(&redliner(&["annotate", path_str(&document)]));
    assert!(stream.starts_with("[BLOCK:b-title][H1] SERVICES AGREEMENT [/BLOCK]"));
    assert!(stream.contains("[BLOCK:b-pay] Customer shall pay"));

    let readable = stdout(&redliner(&["annotate", path_str(&document), "--readable"]));
    assert!(readable.contains("--- SECTION 2 ---"));

    let outline = stdout(&redliner(&["outline", path_str(&document)]));
    assert!(outline.contains("Document: services.docx"));
    assert!(outline.contains("Pages: 3"));
    assert!(outline.contains("- 1. PAYMENT (2 blocks)"));
}

#[test]
fn resolve_reports_kept_discarded_and_rejected_edits() {
    let report = stdout(&redliner(&[
        "resolve",
        path_str(&fixture("document.json")),
        path_str(&fixture("analysis.txt")),
    ]));
    assert!(report.contains("## b-renew [2. TERM]"), "{report}");
    assert!(report.contains("issues: renewal"), "quote should re-anchor the stale reference");
    assert!(report.contains("  KEPT       payment-1  replace [39, 54) with \"thirty (30) days\""));
    assert!(report.contains("  DISCARDED  renewal-1  overlaps a kept edit ending at 35"));
    assert!(report.contains("REJECTED   renewal-4  block b-missing does not exist"));
    assert!(report.ends_with("3 kept, 1 discarded, 1 rejected\n"));
}

#[test]
fn resolve_json_lists_surviving_operations() {
    let json = stdout(&redliner(&[
        "resolve",
        path_str(&fixture("document.json")),
        path_str(&fixture("analysis.txt")),
        "--json",
    ]));
    let ops: serde_json::Value = serde_json::from_str(&json).unwrap();
    let ids: Vec<&str> = ops.as_array().unwrap().iter().map(|op| return op["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["payment-1", "renewal-2", "renewal-3"]);
    assert_eq!(ops[0]["type"], "replace_range");
    assert_eq!(ops[0]["blockId"], "b-pay");
    assert_eq!(ops[0]["startChar"], 39);
}

#[test]
fn decisions_pick_plans_and_skip_issues() {
    let preview = stdout(&redliner(&[
        "preview",
        path_str(&fixture("document.json")),
        path_str(&fixture("analysis.txt")),
        "--decisions",
        path_str(&fixture("decisions.json")),
    ]));
    assert!(preview.contains("within [-sixty (60) days-]{+forty-five (45) days+}[^1] of receipt."));
    assert!(!preview.contains("renews automatically"), "the renewal issue was not applied");
    assert!(preview.contains("[^1] CRA: Net 45 as a compromise."));
}

#[test]
fn explicit_edits_bypass_the_plans() {
    let preview = stdout(&redliner(&[
        "preview",
        path_str(&fixture("document.json")),
        path_str(&fixture("analysis.txt")),
        "--mode",
        "clean",
        "--edits",
        path_str(&fixture("edits.json")),
    ]));
    assert!(preview.contains("within net thirty (30) days of receipt."));
    assert!(!preview.contains("renew by written agreement"));
}

#[test]
fn redline_export_tracks_changes_with_comments() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("redline.docx");
    let output = redliner(&[
        "export",
        path_str(&fixture("analysis.txt")),
        "--document",
        path_str(&fixture("document.json")),
        "--mode",
        "redline",
        "-o",
        path_str(&out),
        "--author",
        "Dana Reviewer",
    ]);
    assert!(output.status.success(), "export failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Wrote redline export"));

    let body = docx_part(&out, "word/document.xml").unwrap();
    assert!(body.contains("<w:ins "));
    assert!(body.contains("<w:delText xml:space=\"preserve\">sixty (60) days</w:delText>"));
    assert!(body.contains("w:author=\"Dana Reviewer\""));
    let comments = docx_part(&out, "word/comments.xml").unwrap();
    assert!(comments.contains("Net 30 is our standard."));
    assert!(comments.contains("No evergreen terms."));
    assert!(docx_part(&out, "word/settings.xml").unwrap().contains("w:trackRevisions"));
}

#[test]
fn comments_can_be_switched_off() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("redline.docx");
    let output = redliner(&[
        "--no-comments",
        "export",
        path_str(&fixture("analysis.txt")),
        "--document",
        path_str(&fixture("document.json")),
        "--mode",
        "redline",
        "-o",
        path_str(&out),
    ]);
    assert!(output.status.success(), "export failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(docx_part(&out, "word/comments.xml").is_none());
    assert!(docx_part(&out, "word/document.xml").unwrap().contains("<w:del "));
}

#[test]
fn export_without_document_writes_the_summary() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("summary.docx");
    let output = redliner(&[
        "export",
        path_str(&fixture("analysis.txt")),
        "--mode",
        "clean",
        "-o",
        path_str(&out),
    ]);
    assert!(output.status.success(), "export failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Wrote summary export"));

    let body = docx_part(&out, "word/document.xml").unwrap();
    assert!(body.contains("Contract Review"));
    assert!(body.contains("Evergreen renewal"));
    assert!(!body.contains("<w:ins "));
}

#[test]
fn demo_writes_inputs_and_both_exports() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("demo");
    let output = redliner(&["demo", path_str(&target)]);
    assert!(output.status.success(), "demo failed: {}", String::from_utf8_lossy(&output.stderr));

    for name in ["document.json", "analysis.json", "redline.docx", "clean.docx"] {
        assert!(target.join(name).exists(), "{name} not written");
    }
    let clean = docx_part(&target.join("clean.docx"), "word/document.xml").unwrap();
    assert!(clean.contains("two (2) years"));
    assert!(!clean.contains("<w:del "));

    // The demo inputs feed straight back into the other commands.
    let report = stdout(&redliner(&[
        "resolve",
        path_str(&target.join("document.json")),
        path_str(&target.join("analysis.json")),
    ]));
    assert!(report.contains("0 rejected"));
}

#[test]
fn malformed_analysis_fails_with_a_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("analysis.txt");
    std::fs::write(&bad, "I was unable to review this contract.").unwrap();

    let output = redliner(&["resolve", path_str(&fixture("document.json")), path_str(&bad)]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: Analysis Result Malformed"));
    assert!(stderr.contains("I was unable to review this contract."));
}

#[test]
fn missing_inputs_and_config_are_named() {
    let output = redliner(&["outline", "no/such/document.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no/such/document.json"));

    let output = redliner(&["--config", "no/such/team.toml", "outline", path_str(&fixture("document.json"))]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Config Not Found"));
}
