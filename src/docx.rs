//! OOXML word-processing package writer.
//!
//! A [`Composition`] becomes a minimal but complete `.docx`: content types,
//! relationships, core properties, styles, settings, an optional comments
//! part, a branded header and a footer with page numbers. Redline spans are
//! written as `w:ins`/`w:del` revisions sharing the composition's author and
//! timestamp.

use std::borrow::Cow;
use std::io::{Cursor, Write as _};

use chrono::SecondsFormat;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::assembler::{Composition, Element, Run};
use crate::error::Error;
use crate::redline::{Span, SpanKind};

/// WordprocessingML main namespace.
const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Office document relationships namespace.
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Package relationships namespace.
const NS_PACKAGE_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Prefix shared by the part relationship types.
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Prefix shared by the WordprocessingML content types.
const WML_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml";

/// Header rule and brand accent.
const ACCENT: &str = "A64A30";

/// Table and footer border grey.
const BORDER: &str = "E0E0E0";

/// Footer and header secondary text.
const MUTED: &str = "999999";

/// Half-point sizes for heading levels 1 to 3.
const HEADING_SIZES: [(u8, &str); 3] = [(1, "32"), (2, "26"), (3, "22")];

/// Document relationship ids.
const RID_STYLES: &str = "rId1";
/// See [`RID_STYLES`].
const RID_SETTINGS: &str = "rId2";
/// See [`RID_STYLES`].
const RID_HEADER: &str = "rId3";
/// See [`RID_STYLES`].
const RID_FOOTER: &str = "rId4";
/// See [`RID_STYLES`].
const RID_COMMENTS: &str = "rId5";

/// One XML part under construction.
struct Part {
    /// Underlying event writer.
    writer: Writer<Vec<u8>>,
}

impl Part {
    /// Write a closing tag.
    fn close(&mut self, name: &str) -> Result<(), Error> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        return Ok(());
    }

    /// Write a self-closing tag.
    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        let values: Vec<Cow<'_, str>> = attrs.iter().map(|&(_, value)| return xml_safe(value)).collect();
        let start = BytesStart::new(name)
            .with_attributes(attrs.iter().zip(&values).map(|(&(key, _), value)| return (key, value.as_ref())));
        self.writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    /// The serialized part.
    fn finish(self) -> Vec<u8> {
        return self.writer.into_inner();
    }

    /// Write `<name attrs>text</name>`.
    fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), Error> {
        self.open(name, attrs)?;
        self.text(text)?;
        return self.close(name);
    }

    /// Start a part with the standalone XML declaration.
    fn new() -> Result<Self, Error> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        return Ok(Self { writer });
    }

    /// Write an opening tag.
    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        let values: Vec<Cow<'_, str>> = attrs.iter().map(|&(_, value)| return xml_safe(value)).collect();
        let start = BytesStart::new(name)
            .with_attributes(attrs.iter().zip(&values).map(|(&(key, _), value)| return (key, value.as_ref())));
        self.writer.write_event(Event::Start(start))?;
        return Ok(());
    }

    /// Write escaped character data, minus characters XML cannot carry.
    fn text(&mut self, text: &str) -> Result<(), Error> {
        self.writer.write_event(Event::Text(BytesText::new(&xml_safe(text))))?;
        return Ok(());
    }
}

/// Writes the body of `word/document.xml`, numbering revisions as it goes.
struct BodyWriter<'a> {
    /// What is being written.
    composition: &'a Composition,
    /// Next free annotation id. Starts past the comment ids.
    next_revision: u32,
    /// Output part.
    part: Part,
    /// Revision date attribute.
    timestamp: String,
}

impl BodyWriter<'_> {
    /// Write one body element.
    fn element(&mut self, element: &Element) -> Result<(), Error> {
        return match element {
            Element::Heading { level, runs } => {
                let style = format!("Heading{}", (*level).clamp(1, 3));
                self.paragraph(Some(&style), runs)
            },
            Element::Paragraph(runs) => self.paragraph(None, runs),
            Element::Quote(runs) => self.quote(runs),
            Element::Redline(spans) => self.redline(spans),
            Element::Rule => self.rule(),
            Element::Table(rows) => self.table(rows),
        };
    }

    /// Plain paragraph with optional style.
    fn paragraph(&mut self, style: Option<&str>, runs: &[Run]) -> Result<(), Error> {
        self.part.open("w:p", &[])?;
        if let Some(style) = style {
            self.part.open("w:pPr", &[])?;
            self.part.empty("w:pStyle", &[("w:val", style)])?;
            self.part.close("w:pPr")?;
        }
        for run in runs {
            write_run(&mut self.part, run)?;
        }
        return self.part.close("w:p");
    }

    /// Indented paragraph with a left bar.
    fn quote(&mut self, runs: &[Run]) -> Result<(), Error> {
        self.part.open("w:p", &[])?;
        self.part.open("w:pPr", &[])?;
        self.part.open("w:pBdr", &[])?;
        self.part.empty(
            "w:left",
            &[("w:val", "single"), ("w:sz", "12"), ("w:space", "8"), ("w:color", "CCCCCC")],
        )?;
        self.part.close("w:pBdr")?;
        self.part.empty("w:ind", &[("w:left", "720")])?;
        self.part.close("w:pPr")?;
        for run in runs {
            write_run(&mut self.part, run)?;
        }
        return self.part.close("w:p");
    }

    /// One block as tracked changes. Consecutive spans of an edit that has a
    /// comment are wrapped in a comment range.
    fn redline(&mut self, spans: &[Span]) -> Result<(), Error> {
        let composition = self.composition;
        let comment_id = |span: &Span| {
            let edit_id = span.edit_id.as_deref()?;
            return composition.comment_for(edit_id).map(|c| return c.id.to_string());
        };

        self.part.open("w:p", &[])?;
        let mut previous: Option<&Span> = None;
        for (position, span) in spans.iter().enumerate() {
            let comment = comment_id(span);
            let same_edit = |other: Option<&Span>| {
                return other.is_some_and(|o| return o.edit_id.is_some() && o.edit_id == span.edit_id);
            };

            if let Some(id) = comment.as_deref().filter(|_| return !same_edit(previous)) {
                self.part.empty("w:commentRangeStart", &[("w:id", id)])?;
            }
            self.span(span)?;
            let next = spans.get(position.saturating_add(1));
            if let Some(id) = comment.as_deref().filter(|_| return !same_edit(next)) {
                self.part.empty("w:commentRangeEnd", &[("w:id", id)])?;
                self.part.open("w:r", &[])?;
                self.part.empty("w:commentReference", &[("w:id", id)])?;
                self.part.close("w:r")?;
            }
            previous = Some(span);
        }
        return self.part.close("w:p");
    }

    /// Claim the next annotation id.
    fn revision_id(&mut self) -> String {
        let id = self.next_revision;
        self.next_revision = self.next_revision.saturating_add(1);
        return id.to_string();
    }

    /// Empty paragraph with a bottom border.
    fn rule(&mut self) -> Result<(), Error> {
        self.part.open("w:p", &[])?;
        self.part.open("w:pPr", &[])?;
        self.part.open("w:pBdr", &[])?;
        self.part.empty(
            "w:bottom",
            &[("w:val", "single"), ("w:sz", "6"), ("w:space", "1"), ("w:color", BORDER)],
        )?;
        self.part.close("w:pBdr")?;
        self.part.close("w:pPr")?;
        return self.part.close("w:p");
    }

    /// One span, wrapped in a revision when it is a change.
    fn span(&mut self, span: &Span) -> Result<(), Error> {
        let wrapper = match span.kind {
            SpanKind::Deleted => "w:del",
            SpanKind::Inserted => "w:ins",
            SpanKind::Unchanged => {
                return write_run(&mut self.part, &Run::plain(span.text.as_str()));
            },
        };

        let id = self.revision_id();
        let author = self.composition.revision.author.as_str();
        self.part.open(
            wrapper,
            &[("w:id", id.as_str()), ("w:author", author), ("w:date", self.timestamp.as_str())],
        )?;
        self.part.open("w:r", &[])?;
        let text_tag = if span.kind == SpanKind::Deleted { "w:delText" } else { "w:t" };
        write_text(&mut self.part, text_tag, &span.text)?;
        self.part.close("w:r")?;
        return self.part.close(wrapper);
    }

    /// Two-column label/value table.
    fn table(&mut self, rows: &[(String, String)]) -> Result<(), Error> {
        self.part.open("w:tbl", &[])?;
        self.part.open("w:tblPr", &[])?;
        self.part.empty("w:tblW", &[("w:w", "5000"), ("w:type", "pct")])?;
        self.part.open("w:tblBorders", &[])?;
        for edge in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
            self.part
                .empty(edge, &[("w:val", "single"), ("w:sz", "4"), ("w:space", "0"), ("w:color", BORDER)])?;
        }
        self.part.close("w:tblBorders")?;
        self.part.close("w:tblPr")?;
        self.part.open("w:tblGrid", &[])?;
        self.part.empty("w:gridCol", &[("w:w", "2808")])?;
        self.part.empty("w:gridCol", &[("w:w", "6552")])?;
        self.part.close("w:tblGrid")?;

        for (label, value) in rows {
            self.part.open("w:tr", &[])?;
            table_cell(&mut self.part, "1500", Some("F5F5F5"), &Run::plain(label.as_str()).bold().color("444444"))?;
            table_cell(&mut self.part, "3500", None, &Run::plain(value.as_str()))?;
            self.part.close("w:tr")?;
        }
        return self.part.close("w:tbl");
    }
}

/// Zip container being filled with parts.
struct Package {
    /// Options applied to every entry.
    options: SimpleFileOptions,
    /// Archive over an in-memory buffer.
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl Package {
    /// Add one part.
    fn add(&mut self, name: &str, bytes: &[u8]) -> Result<(), Error> {
        self.zip.start_file(name, self.options)?;
        self.zip.write_all(bytes)?;
        return Ok(());
    }
}

/// `word/comments.xml`.
fn comments_part(composition: &Composition, timestamp: &str) -> Result<Vec<u8>, Error> {
    let revision = &composition.revision;
    let mut part = Part::new()?;
    part.open("w:comments", &[("xmlns:w", NS_W)])?;
    for comment in &composition.comments {
        let id = comment.id.to_string();
        part.open(
            "w:comment",
            &[
                ("w:id", id.as_str()),
                ("w:author", revision.author.as_str()),
                ("w:date", timestamp),
                ("w:initials", revision.initials.as_str()),
            ],
        )?;
        part.open("w:p", &[])?;
        write_run(&mut part, &Run::plain(comment.text.as_str()))?;
        part.close("w:p")?;
        part.close("w:comment")?;
    }
    part.close("w:comments")?;
    return Ok(part.finish());
}

/// `[Content_Types].xml`.
fn content_types_part(with_comments: bool) -> Result<Vec<u8>, Error> {
    let mut part = Part::new()?;
    part.open("Types", &[("xmlns", "http://schemas.openxmlformats.org/package/2006/content-types")])?;
    part.empty(
        "Default",
        &[("Extension", "rels"), ("ContentType", "application/vnd.openxmlformats-package.relationships+xml")],
    )?;
    part.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;

    let mut overrides = vec![
        ("/word/document.xml", format!("{WML_TYPE}.document.main+xml")),
        ("/word/styles.xml", format!("{WML_TYPE}.styles+xml")),
        ("/word/settings.xml", format!("{WML_TYPE}.settings+xml")),
        ("/word/header1.xml", format!("{WML_TYPE}.header+xml")),
        ("/word/footer1.xml", format!("{WML_TYPE}.footer+xml")),
        (
            "/docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml".to_string(),
        ),
    ];
    if with_comments {
        overrides.push(("/word/comments.xml", format!("{WML_TYPE}.comments+xml")));
    }
    for (name, content_type) in &overrides {
        part.empty("Override", &[("PartName", *name), ("ContentType", content_type.as_str())])?;
    }
    part.close("Types")?;
    return Ok(part.finish());
}

/// `docProps/core.xml`.
fn core_part(composition: &Composition, timestamp: &str) -> Result<Vec<u8>, Error> {
    let mut part = Part::new()?;
    part.open(
        "cp:coreProperties",
        &[
            ("xmlns:cp", "http://schemas.openxmlformats.org/package/2006/metadata/core-properties"),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    )?;
    part.leaf("dc:title", &[], &composition.title)?;
    part.leaf("dc:creator", &[], &composition.revision.author)?;
    part.leaf("dcterms:created", &[("xsi:type", "dcterms:W3CDTF")], timestamp)?;
    part.close("cp:coreProperties")?;
    return Ok(part.finish());
}

/// `word/document.xml`.
fn document_part(composition: &Composition, timestamp: &str) -> Result<Vec<u8>, Error> {
    let comment_count = u32::try_from(composition.comments.len()).unwrap_or(u32::MAX);
    let mut body = BodyWriter {
        composition,
        next_revision: comment_count.saturating_add(1),
        part: Part::new()?,
        timestamp: timestamp.to_string(),
    };

    body.part.open("w:document", &[("xmlns:w", NS_W), ("xmlns:r", NS_R)])?;
    body.part.open("w:body", &[])?;
    for element in &composition.elements {
        body.element(element)?;
    }

    let part = &mut body.part;
    part.open("w:sectPr", &[])?;
    part.empty("w:headerReference", &[("w:type", "default"), ("r:id", RID_HEADER)])?;
    part.empty("w:footerReference", &[("w:type", "default"), ("r:id", RID_FOOTER)])?;
    part.empty("w:pgSz", &[("w:w", "12240"), ("w:h", "15840")])?;
    part.empty(
        "w:pgMar",
        &[
            ("w:top", "1440"),
            ("w:right", "1440"),
            ("w:bottom", "1440"),
            ("w:left", "1440"),
            ("w:header", "720"),
            ("w:footer", "720"),
            ("w:gutter", "0"),
        ],
    )?;
    part.close("w:sectPr")?;
    part.close("w:body")?;
    part.close("w:document")?;
    return Ok(body.part.finish());
}

/// `word/_rels/document.xml.rels`.
fn document_rels_part(with_comments: bool) -> Result<Vec<u8>, Error> {
    let mut rels = vec![
        (RID_STYLES, "styles", "styles.xml"),
        (RID_SETTINGS, "settings", "settings.xml"),
        (RID_HEADER, "header", "header1.xml"),
        (RID_FOOTER, "footer", "footer1.xml"),
    ];
    if with_comments {
        rels.push((RID_COMMENTS, "comments", "comments.xml"));
    }
    return relationships(&rels);
}

/// `word/footer1.xml`: confidentiality line, then `Page X of Y`.
fn footer_part(composition: &Composition) -> Result<Vec<u8>, Error> {
    let small = |run: Run| return run.color(MUTED);
    let mut part = Part::new()?;
    part.open("w:ftr", &[("xmlns:w", NS_W)])?;

    part.open("w:p", &[])?;
    part.open("w:pPr", &[])?;
    part.open("w:pBdr", &[])?;
    part.empty("w:top", &[("w:val", "single"), ("w:sz", "4"), ("w:space", "4"), ("w:color", BORDER)])?;
    part.close("w:pBdr")?;
    part.empty("w:jc", &[("w:val", "center")])?;
    part.close("w:pPr")?;
    write_run(&mut part, &small(Run::plain(format!("Confidential — {}", composition.brand)).bold()))?;
    write_run(&mut part, &small(Run::plain(format!("  |  Generated {}  |  ", composition.date_label()))))?;
    write_run(&mut part, &small(Run::plain("This analysis does not constitute legal advice.").italic()))?;
    part.close("w:p")?;

    part.open("w:p", &[])?;
    part.open("w:pPr", &[])?;
    part.empty("w:jc", &[("w:val", "center")])?;
    part.close("w:pPr")?;
    write_run(&mut part, &small(Run::plain("Page ")))?;
    page_field(&mut part, " PAGE ")?;
    write_run(&mut part, &small(Run::plain(" of ")))?;
    page_field(&mut part, " NUMPAGES ")?;
    part.close("w:p")?;

    part.close("w:ftr")?;
    return Ok(part.finish());
}

/// `word/header1.xml`: brand, a bar, then the header label.
fn header_part(composition: &Composition) -> Result<Vec<u8>, Error> {
    let mut part = Part::new()?;
    part.open("w:hdr", &[("xmlns:w", NS_W)])?;
    part.open("w:p", &[])?;
    part.open("w:pPr", &[])?;
    part.open("w:pBdr", &[])?;
    part.empty("w:bottom", &[("w:val", "single"), ("w:sz", "4"), ("w:space", "4"), ("w:color", ACCENT)])?;
    part.close("w:pBdr")?;
    part.close("w:pPr")?;
    write_run(&mut part, &Run::plain(composition.brand.as_str()).bold())?;
    write_run(&mut part, &Run::plain("  |  ").color(ACCENT))?;
    write_run(&mut part, &Run::plain(composition.header_label.as_str()).color("666666"))?;
    part.close("w:p")?;
    part.close("w:hdr")?;
    return Ok(part.finish());
}

/// Whether XML 1.0 allows `c` in character data and attribute values.
const fn is_xml_char(c: char) -> bool {
    return matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    );
}

/// A simple field whose cached result is `1`.
fn page_field(part: &mut Part, instruction: &str) -> Result<(), Error> {
    part.open("w:fldSimple", &[("w:instr", instruction)])?;
    write_run(part, &Run::plain("1").color(MUTED))?;
    return part.close("w:fldSimple");
}

/// `_rels/.rels`.
fn package_rels_part() -> Result<Vec<u8>, Error> {
    let mut part = Part::new()?;
    part.open("Relationships", &[("xmlns", NS_PACKAGE_RELS)])?;
    part.empty(
        "Relationship",
        &[
            ("Id", "rId1"),
            ("Type", format!("{REL_TYPE}/officeDocument").as_str()),
            ("Target", "word/document.xml"),
        ],
    )?;
    part.empty(
        "Relationship",
        &[
            ("Id", "rId2"),
            ("Type", "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties"),
            ("Target", "docProps/core.xml"),
        ],
    )?;
    part.close("Relationships")?;
    return Ok(part.finish());
}

/// A relationships part from `(id, type suffix, target)` triples.
fn relationships(rels: &[(&str, &str, &str)]) -> Result<Vec<u8>, Error> {
    let mut part = Part::new()?;
    part.open("Relationships", &[("xmlns", NS_PACKAGE_RELS)])?;
    for (id, kind, target) in rels {
        let kind = format!("{REL_TYPE}/{kind}");
        part.empty("Relationship", &[("Id", *id), ("Type", kind.as_str()), ("Target", *target)])?;
    }
    part.close("Relationships")?;
    return Ok(part.finish());
}

/// `word/settings.xml`. Redline packages open with change tracking on.
fn settings_part(composition: &Composition) -> Result<Vec<u8>, Error> {
    let mut part = Part::new()?;
    part.open("w:settings", &[("xmlns:w", NS_W)])?;
    if composition.tracks_revisions() {
        part.empty("w:trackRevisions", &[])?;
    }
    part.empty("w:defaultTabStop", &[("w:val", "720")])?;
    part.close("w:settings")?;
    return Ok(part.finish());
}

/// `word/styles.xml`: default font plus Normal and Heading1-3.
fn styles_part(composition: &Composition) -> Result<Vec<u8>, Error> {
    let font = composition.font.as_str();
    let mut part = Part::new()?;
    part.open("w:styles", &[("xmlns:w", NS_W)])?;

    part.open("w:docDefaults", &[])?;
    part.open("w:rPrDefault", &[])?;
    part.open("w:rPr", &[])?;
    part.empty("w:rFonts", &[("w:ascii", font), ("w:hAnsi", font), ("w:cs", font)])?;
    part.empty("w:sz", &[("w:val", "20")])?;
    part.close("w:rPr")?;
    part.close("w:rPrDefault")?;
    part.close("w:docDefaults")?;

    part.open("w:style", &[("w:type", "paragraph"), ("w:default", "1"), ("w:styleId", "Normal")])?;
    part.empty("w:name", &[("w:val", "Normal")])?;
    part.open("w:pPr", &[])?;
    part.empty("w:spacing", &[("w:after", "120")])?;
    part.close("w:pPr")?;
    part.close("w:style")?;

    for (level, size) in HEADING_SIZES {
        let id = format!("Heading{level}");
        let name = format!("heading {level}");
        let outline = level.saturating_sub(1).to_string();
        part.open("w:style", &[("w:type", "paragraph"), ("w:styleId", id.as_str())])?;
        part.empty("w:name", &[("w:val", name.as_str())])?;
        part.empty("w:basedOn", &[("w:val", "Normal")])?;
        part.empty("w:next", &[("w:val", "Normal")])?;
        part.empty("w:qFormat", &[])?;
        part.open("w:pPr", &[])?;
        part.empty("w:keepNext", &[])?;
        part.empty("w:spacing", &[("w:before", "240"), ("w:after", "120")])?;
        part.empty("w:outlineLvl", &[("w:val", outline.as_str())])?;
        part.close("w:pPr")?;
        part.open("w:rPr", &[])?;
        part.empty("w:b", &[])?;
        part.empty("w:sz", &[("w:val", size)])?;
        part.close("w:rPr")?;
        part.close("w:style")?;
    }

    part.close("w:styles")?;
    return Ok(part.finish());
}

/// One table cell holding a single run.
fn table_cell(part: &mut Part, width_fiftieths: &str, fill: Option<&str>, run: &Run) -> Result<(), Error> {
    part.open("w:tc", &[])?;
    part.open("w:tcPr", &[])?;
    part.empty("w:tcW", &[("w:w", width_fiftieths), ("w:type", "pct")])?;
    if let Some(fill) = fill {
        part.empty("w:shd", &[("w:val", "clear"), ("w:color", "auto"), ("w:fill", fill)])?;
    }
    part.close("w:tcPr")?;
    part.open("w:p", &[])?;
    write_run(part, run)?;
    part.close("w:p")?;
    return part.close("w:tc");
}

/// Serialize a composition as a `.docx` package.
///
/// # Errors
///
/// Returns `Error::Xml` or `Error::Io` if a part cannot be written, or
/// `Error::Zip` if the container cannot be built.
pub fn write_package(composition: &Composition) -> Result<Vec<u8>, Error> {
    let timestamp = composition.revision.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
    let with_comments = !composition.comments.is_empty();

    let mut package = Package {
        options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        zip: ZipWriter::new(Cursor::new(Vec::new())),
    };
    package.add("[Content_Types].xml", &content_types_part(with_comments)?)?;
    package.add("_rels/.rels", &package_rels_part()?)?;
    package.add("docProps/core.xml", &core_part(composition, &timestamp)?)?;
    package.add("word/_rels/document.xml.rels", &document_rels_part(with_comments)?)?;
    package.add("word/document.xml", &document_part(composition, &timestamp)?)?;
    package.add("word/styles.xml", &styles_part(composition)?)?;
    package.add("word/settings.xml", &settings_part(composition)?)?;
    package.add("word/header1.xml", &header_part(composition)?)?;
    package.add("word/footer1.xml", &footer_part(composition)?)?;
    if with_comments {
        package.add("word/comments.xml", &comments_part(composition, &timestamp)?)?;
    }

    let bytes = package.zip.finish()?.into_inner();
    log::info!(
        "wrote {:?} package `{}`: {} elements, {} comments, {} bytes",
        composition.layout,
        composition.title,
        composition.elements.len(),
        composition.comments.len(),
        bytes.len(),
    );
    return Ok(bytes);
}

/// One formatted run. Newlines inside the text become line breaks.
fn write_run(part: &mut Part, run: &Run) -> Result<(), Error> {
    part.open("w:r", &[])?;
    if run.bold || run.italic || run.color.is_some() {
        part.open("w:rPr", &[])?;
        if run.bold {
            part.empty("w:b", &[])?;
        }
        if run.italic {
            part.empty("w:i", &[])?;
        }
        if let Some(color) = &run.color {
            part.empty("w:color", &[("w:val", color.as_str())])?;
        }
        part.close("w:rPr")?;
    }
    write_text(part, "w:t", &run.text)?;
    return part.close("w:r");
}

/// Run text, whitespace preserved, with `w:br` between lines.
///
/// A vertical tab is Word's own manual line break in extracted text.
fn write_text(part: &mut Part, tag: &str, text: &str) -> Result<(), Error> {
    for (line_number, line) in text.split(['\n', '\u{0B}']).enumerate() {
        if line_number > 0 {
            part.empty("w:br", &[])?;
        }
        part.leaf(tag, &[("xml:space", "preserve")], line)?;
    }
    return Ok(());
}

/// `text` without the characters XML 1.0 forbids.
fn xml_safe(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        return Cow::Borrowed(text);
    }
    return Cow::Owned(text.chars().filter(|&c| return is_xml_char(c)).collect());
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::indexing_slicing, clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use std::io::Read as _;

    use chrono::{DateTime, Utc};
    use quick_xml::Reader;

    use super::*;
    use crate::assembler::{Comment, ExportMode, ExportRequest, Layout, Revision, assemble};
    use crate::config::Config;
    use crate::fixtures::{sample_analysis, sample_document};
    use crate::intake::{Decisions, select_edits};

    fn stamp() -> DateTime<Utc> {
        return DateTime::parse_from_rfc3339("2026-10-19T09:30:00Z").unwrap().with_timezone(&Utc);
    }

    fn export(mode: ExportMode) -> Composition {
        let doc = sample_document();
        let analysis = sample_analysis(&doc);
        let edits = select_edits(&analysis.issues, &Decisions::new(), true);
        let request = ExportRequest { analysis: &analysis, document: Some(&doc), edits: &edits, mode };
        return assemble(&request, &Config::default(), stamp());
    }

    fn read_part(bytes: &[u8], name: &str) -> Option<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).ok()?;
        let mut xml = String::new();
        file.read_to_string(&mut xml).unwrap();
        return Some(xml);
    }

    fn assert_well_formed(xml: &str) {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(_) => {},
                Err(e) => panic!("malformed xml: {e}\n{xml}"),
            }
        }
    }

    #[test]
    fn redline_package_tracks_changes_and_comments() {
        let composition = export(ExportMode::Redline);
        let bytes = write_package(&composition).unwrap();

        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "word/_rels/document.xml.rels",
            "word/document.xml",
            "word/styles.xml",
            "word/settings.xml",
            "word/header1.xml",
            "word/footer1.xml",
            "word/comments.xml",
        ] {
            let xml = read_part(&bytes, name);
            assert!(xml.is_some(), "missing {name}");
            assert_well_formed(&xml.unwrap());
        }

        let document = read_part(&bytes, "word/document.xml").unwrap();
        assert!(document.contains("<w:ins "));
        assert!(document.contains("<w:del "));
        assert!(document.contains("<w:delText xml:space=\"preserve\">five (5) years</w:delText>"));
        assert!(document.contains("w:author=\"Contract Review Assistant\""));
        assert!(document.contains("w:date=\"2026-10-19T09:30:00Z\""));
        assert_eq!(document.matches("<w:commentRangeStart ").count(), composition.comments.len());
        assert_eq!(document.matches("<w:commentReference ").count(), composition.comments.len());

        let comments = read_part(&bytes, "word/comments.xml").unwrap();
        assert_eq!(comments.matches("<w:comment ").count(), composition.comments.len());
        assert!(comments.contains("w:initials=\"CRA\""));

        assert!(read_part(&bytes, "word/settings.xml").unwrap().contains("<w:trackRevisions/>"));
        assert!(read_part(&bytes, "word/footer1.xml").unwrap().contains("NUMPAGES"));
        assert!(read_part(&bytes, "word/header1.xml").unwrap().contains("REDLINER"));
    }

    #[test]
    fn clean_package_has_no_revisions() {
        let composition = export(ExportMode::Clean);
        let bytes = write_package(&composition).unwrap();

        let document = read_part(&bytes, "word/document.xml").unwrap();
        assert_well_formed(&document);
        assert!(!document.contains("<w:ins "));
        assert!(!document.contains("<w:del "));
        assert!(document.contains("two (2) years"));
        assert!(read_part(&bytes, "word/comments.xml").is_none());
        assert!(!read_part(&bytes, "word/settings.xml").unwrap().contains("trackRevisions"));
        assert!(!read_part(&bytes, "[Content_Types].xml").unwrap().contains("comments"));
    }

    #[test]
    fn revision_ids_do_not_collide_with_comment_ids() {
        let composition = export(ExportMode::Redline);
        let document = read_part(&write_package(&composition).unwrap(), "word/document.xml").unwrap();
        for comment in &composition.comments {
            let revision_with_comment_id = format!("<w:ins w:id=\"{}\"", comment.id);
            assert!(!document.contains(&revision_with_comment_id));
        }
    }

    #[test]
    fn text_is_escaped_and_lines_break() {
        let composition = Composition {
            brand: "A&B".to_string(),
            comments: Vec::new(),
            elements: vec![
                Element::Paragraph(vec![Run::plain("Acme <Holdings> & Co.\nSecond line")]),
                Element::Table(vec![("Parties".to_string(), "\"Acme\" & 'Beta'".to_string())]),
                Element::Rule,
            ],
            font: "Georgia".to_string(),
            header_label: "memo.docx — Contract Review".to_string(),
            layout: Layout::Summary,
            revision: Revision { author: "Legal Ops".to_string(), initials: "LO".to_string(), timestamp: stamp() },
            title: "memo.docx — Contract Review".to_string(),
        };
        let bytes = write_package(&composition).unwrap();

        let document = read_part(&bytes, "word/document.xml").unwrap();
        assert_well_formed(&document);
        assert!(document.contains("Acme &lt;Holdings&gt; &amp; Co."));
        assert!(document.contains("<w:br/>"));
        assert!(read_part(&bytes, "word/styles.xml").unwrap().contains("w:ascii=\"Georgia\""));
        assert!(read_part(&bytes, "docProps/core.xml").unwrap().contains("<dc:creator>Legal Ops</dc:creator>"));
        assert!(read_part(&bytes, "word/header1.xml").unwrap().contains("A&amp;B"));
    }

    #[test]
    fn control_characters_never_reach_the_package() {
        let span = |kind: SpanKind, text: &str, edit_id: Option<&str>| {
            return Span { edit_id: edit_id.map(str::to_string), kind, text: text.to_string() };
        };
        let composition = Composition {
            brand: "RED\u{1}LINER".to_string(),
            comments: vec![Comment { edit_id: "e1".to_string(), id: 1, text: "Shorter\u{8} term.".to_string() }],
            elements: vec![Element::Redline(vec![
                span(SpanKind::Unchanged, "Term\u{0B}of ", None),
                span(SpanKind::Deleted, "five\u{1F}", Some("e1")),
                span(SpanKind::Inserted, "two\u{FFFF}", Some("e1")),
                span(SpanKind::Unchanged, " years.\u{1}", None),
            ])],
            font: "Arial".to_string(),
            header_label: "nda.docx\u{0} — Redline Review".to_string(),
            layout: Layout::Redline,
            revision: Revision { author: "Dana\u{7} Reviewer".to_string(), initials: "DR".to_string(), timestamp: stamp() },
            title: "nda.docx — Redline Review".to_string(),
        };
        let bytes = write_package(&composition).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).unwrap();
            let mut xml = String::new();
            file.read_to_string(&mut xml).unwrap();
            let illegal: Vec<u32> = xml
                .chars()
                .filter(|&c| return !is_xml_char(c))
                .map(u32::from)
                .collect();
            assert!(illegal.is_empty(), "{} carries {illegal:?}", file.name());
        }

        let document = read_part(&bytes, "word/document.xml").unwrap();
        assert!(document.contains("<w:t xml:space=\"preserve\">Term</w:t><w:br/><w:t xml:space=\"preserve\">of </w:t>"));
        assert!(document.contains("<w:delText xml:space=\"preserve\">five</w:delText>"));
        assert!(document.contains("w:author=\"Dana Reviewer\""));
        assert!(read_part(&bytes, "word/comments.xml").unwrap().contains("Shorter term."));
    }
}
