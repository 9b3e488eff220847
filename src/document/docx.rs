//! Minimal WordprocessingML writer.
//!
//! Emits only the parts Word needs to open the file: content types, package
//! and document relationships, core properties, styles, the document body and
//! one media entry per embedded image. Bullets and numbered items are
//! rendered as indented paragraphs with a literal marker so no numbering part
//! is required.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use quick_xml::escape::escape;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::model::{CompiledDocument, ContentNode, EmbeddedImage, Section, SectionKind};
use crate::markdown::Span;

const EMU_PER_PIXEL: u64 = 9_525;
/// 6 inches, the text width of an A4 page with 1" margins (rounded down).
const DEFAULT_MAX_IMAGE_WIDTH_EMU: u64 = 5_486_400;
const TABLE_WIDTH_TWIPS: u32 = 9_000;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const STYLES_PART: &str = "word/styles.xml";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
</Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Times New Roman" w:hAnsi="Times New Roman" w:cs="Times New Roman"/><w:sz w:val="24"/></w:rPr></w:rPrDefault>
<w:pPrDefault><w:pPr><w:spacing w:after="120" w:line="360" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults>
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/><w:pPr><w:jc w:val="both"/></w:pPr></w:style>
<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:jc w:val="center"/><w:spacing w:after="480"/></w:pPr><w:rPr><w:b/><w:sz w:val="40"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:jc w:val="center"/><w:spacing w:before="240" w:after="240"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:caps/><w:sz w:val="32"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:jc w:val="left"/><w:spacing w:before="240"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:jc w:val="left"/><w:spacing w:before="200"/><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:b/><w:sz w:val="26"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading4"><w:name w:val="heading 4"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:jc w:val="left"/><w:outlineLvl w:val="3"/></w:pPr><w:rPr><w:b/><w:i/><w:sz w:val="24"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Caption"><w:name w:val="caption"/><w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:jc w:val="center"/></w:pPr><w:rPr><w:i/><w:sz w:val="20"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:style>
<w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style>
</w:styles>"#;

/// Writes a [`CompiledDocument`] as a `.docx` package.
#[derive(Debug, Clone)]
pub struct DocxSerializer {
    pub max_image_width_emu: u64,
}

impl Default for DocxSerializer {
    fn default() -> Self {
        Self {
            max_image_width_emu: DEFAULT_MAX_IMAGE_WIDTH_EMU,
        }
    }
}

impl DocxSerializer {
    pub fn serialize(&self, document: &CompiledDocument) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);

        let parts: [(&str, Cow<'_, str>); 6] = [
            (CONTENT_TYPES_PART, Cow::Owned(content_types(&document.images))),
            ("_rels/.rels", Cow::Borrowed(PACKAGE_RELS)),
            ("docProps/core.xml", Cow::Owned(core_properties(&document.title))),
            (
                "word/_rels/document.xml.rels",
                Cow::Owned(document_relationships(&document.images)),
            ),
            (STYLES_PART, Cow::Borrowed(STYLES_XML)),
            (DOCUMENT_PART, Cow::Owned(self.document_xml(document))),
        ];
        for (name, body) in parts {
            zip.start_file(name, options)
                .with_context(|| format!("Failed to start docx part {name}"))?;
            zip.write_all(body.as_bytes())?;
        }

        for (index, image) in document.images.iter().enumerate() {
            let name = format!("word/{}", media_target(index, image));
            zip.start_file(name.as_str(), stored)
                .with_context(|| format!("Failed to start docx part {name}"))?;
            zip.write_all(&image.bytes)?;
        }

        let cursor = zip.finish().context("Failed to finalise docx archive")?;
        Ok(cursor.into_inner())
    }

    fn document_xml(&self, document: &CompiledDocument) -> String {
        let mut body = String::new();
        paragraph(&mut body, Some("Title"), false, &[Span::plain(&document.title)]);
        for section in &document.sections {
            self.write_section(&mut body, section, document);
        }
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<w:document xmlns:w="{w}" xmlns:r="{r}" xmlns:wp="{wp}" xmlns:a="{a}" xmlns:pic="{pic}">"#,
                "<w:body>{body}",
                r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>"#,
                "</w:body></w:document>"
            ),
            w = NS_W,
            r = NS_R,
            wp = NS_WP,
            a = NS_A,
            pic = NS_PIC,
            body = body
        )
    }

    fn write_section(&self, out: &mut String, section: &Section, document: &CompiledDocument) {
        let page_break = !matches!(section.kind, SectionKind::TableOfContents);
        paragraph(out, Some("Heading1"), page_break, &[Span::plain(&section.title)]);

        let mut table: Vec<(&[Vec<Span>], bool)> = Vec::new();
        for node in &section.nodes {
            if let ContentNode::TableRow { cells, header } = node {
                table.push((cells.as_slice(), *header));
                continue;
            }
            flush_table(out, &mut table);
            match node {
                ContentNode::Heading { level, spans } => {
                    let style = format!("Heading{}", (*level).clamp(1, 3) + 1);
                    paragraph(out, Some(&style), false, spans);
                }
                ContentNode::Paragraph { spans } => paragraph(out, None, false, spans),
                ContentNode::Bullet { spans } => {
                    list_item(out, "\u{2022}", spans);
                }
                ContentNode::Numbered { number, spans } => {
                    list_item(out, &format!("{number}."), spans);
                }
                ContentNode::Figure {
                    figure,
                    image,
                    caption,
                } => {
                    if let Some(embedded) = document.images.get(*image) {
                        self.drawing(out, *image, embedded, &figure.to_string());
                    }
                    paragraph(out, Some("Caption"), false, &[Span::plain(caption)]);
                }
                ContentNode::TableRow { .. } => {}
            }
        }
        flush_table(out, &mut table);
    }

    fn drawing(&self, out: &mut String, index: usize, image: &EmbeddedImage, label: &str) {
        let (cx, cy) = self.extent(image);
        let id = index + 1;
        let name = xml_text(label);
        let _ = write!(
            out,
            concat!(
                r#"<w:p><w:pPr><w:keepNext/><w:jc w:val="center"/></w:pPr><w:r><w:drawing>"#,
                r#"<wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/>"#,
                r#"<wp:docPr id="{id}" name="Figure {name}"/>"#,
                r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
                r#"<a:graphic><a:graphicData uri="{pic_uri}"><pic:pic>"#,
                r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="Figure {name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
                r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
            ),
            cx = cx,
            cy = cy,
            id = id,
            name = name,
            pic_uri = NS_PIC,
            rid = image_rel_id(index)
        );
    }

    /// Native pixel size in EMU, scaled down to fit the text width.
    fn extent(&self, image: &EmbeddedImage) -> (u64, u64) {
        let width = u64::from(image.width.max(1)) * EMU_PER_PIXEL;
        let height = u64::from(image.height.max(1)) * EMU_PER_PIXEL;
        if width <= self.max_image_width_emu {
            return (width, height);
        }
        let scaled = height * self.max_image_width_emu / width;
        (self.max_image_width_emu, scaled.max(1))
    }
}

fn paragraph(out: &mut String, style: Option<&str>, page_break: bool, spans: &[Span]) {
    out.push_str("<w:p>");
    if style.is_some() || page_break {
        out.push_str("<w:pPr>");
        if let Some(style) = style {
            let _ = write!(out, r#"<w:pStyle w:val="{style}"/>"#);
        }
        if page_break {
            out.push_str("<w:pageBreakBefore/>");
        }
        out.push_str("</w:pPr>");
    }
    runs(out, spans, false);
    out.push_str("</w:p>");
}

fn list_item(out: &mut String, marker: &str, spans: &[Span]) {
    out.push_str(r#"<w:p><w:pPr><w:pStyle w:val="ListParagraph"/></w:pPr>"#);
    runs(out, &[Span::plain(format!("{marker}\t"))], false);
    runs(out, spans, false);
    out.push_str("</w:p>");
}

fn runs(out: &mut String, spans: &[Span], force_bold: bool) {
    for span in spans {
        out.push_str("<w:r>");
        let bold = span.bold || force_bold;
        if bold || span.italic {
            out.push_str("<w:rPr>");
            if bold {
                out.push_str("<w:b/>");
            }
            if span.italic {
                out.push_str("<w:i/>");
            }
            out.push_str("</w:rPr>");
        }
        for (index, piece) in span.text.split('\t').enumerate() {
            if index > 0 {
                out.push_str("<w:tab/>");
            }
            if !piece.is_empty() {
                let _ = write!(out, r#"<w:t xml:space="preserve">{}</w:t>"#, xml_text(piece));
            }
        }
        out.push_str("</w:r>");
    }
}

/// Escaped character data with the code points XML 1.0 forbids removed.
fn xml_text(text: &str) -> String {
    let cleaned: Cow<'_, str> = if text.chars().any(forbidden_in_xml) {
        Cow::Owned(text.chars().filter(|c| !forbidden_in_xml(*c)).collect())
    } else {
        Cow::Borrowed(text)
    };
    escape(cleaned.as_ref()).into_owned()
}

fn forbidden_in_xml(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}

fn flush_table(out: &mut String, rows: &mut Vec<(&[Vec<Span>], bool)>) {
    if rows.is_empty() {
        return;
    }
    let columns = rows.iter().map(|(cells, _)| cells.len()).max().unwrap_or(1).max(1);
    let width = TABLE_WIDTH_TWIPS / columns as u32;

    let _ = write!(
        out,
        r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="{TABLE_WIDTH_TWIPS}" w:type="dxa"/></w:tblPr><w:tblGrid>"#
    );
    for _ in 0..columns {
        let _ = write!(out, r#"<w:gridCol w:w="{width}"/>"#);
    }
    out.push_str("</w:tblGrid>");

    for (cells, header) in rows.drain(..) {
        out.push_str("<w:tr>");
        if header {
            out.push_str("<w:trPr><w:tblHeader/></w:trPr>");
        }
        for column in 0..columns {
            let _ = write!(
                out,
                r#"<w:tc><w:tcPr><w:tcW w:w="{width}" w:type="dxa"/></w:tcPr><w:p><w:pPr><w:jc w:val="left"/></w:pPr>"#
            );
            if let Some(spans) = cells.get(column) {
                runs(out, spans, header);
            }
            out.push_str("</w:p></w:tc>");
        }
        out.push_str("</w:tr>");
    }
    out.push_str("</w:tbl>");
}

fn image_rel_id(index: usize) -> String {
    format!("rIdImage{}", index + 1)
}

fn media_target(index: usize, image: &EmbeddedImage) -> String {
    format!("media/image{}.{}", index + 1, image.extension)
}

fn content_types(images: &[EmbeddedImage]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
"#,
    );
    let mut seen: Vec<&str> = Vec::new();
    for image in images {
        if seen.contains(&image.extension.as_str()) {
            continue;
        }
        seen.push(&image.extension);
        let _ = writeln!(
            xml,
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            escape(image.extension.as_str()),
            escape(image.content_type.as_str())
        );
    }
    xml.push_str(concat!(
        r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
        "\n",
        r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#,
        "\n",
        r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
        "\n</Types>"
    ));
    xml
}

fn document_relationships(images: &[EmbeddedImage]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rIdStyles" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
"#,
    );
    for (index, image) in images.iter().enumerate() {
        let _ = writeln!(
            xml,
            r#"<Relationship Id="{}" Type="{REL_IMAGE}" Target="{}"/>"#,
            image_rel_id(index),
            media_target(index, image)
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn core_properties(title: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            "<dc:title>{title}</dc:title><dc:creator>thesisbase</dc:creator>",
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{created}</dcterms:created>"#,
            "</cp:coreProperties>"
        ),
        title = xml_text(title),
        created = Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citations::CitationStyle;
    use crate::markdown::FigureRef;
    use std::io::Read;
    use std::sync::Arc;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut text = String::new();
        part.read_to_string(&mut text).unwrap();
        text
    }

    fn image(width: u32, height: u32) -> EmbeddedImage {
        EmbeddedImage {
            bytes: Arc::new(vec![1, 2, 3]),
            content_type: "image/png".into(),
            extension: "png".into(),
            width,
            height,
        }
    }

    fn sample() -> CompiledDocument {
        CompiledDocument {
            title: "Solar & Storage".into(),
            style: CitationStyle::Apa,
            sections: vec![
                Section {
                    kind: SectionKind::TableOfContents,
                    title: "Table of Contents".into(),
                    nodes: vec![ContentNode::paragraph("Chapter 1: Intro")],
                },
                Section {
                    kind: SectionKind::Chapter { number: 1 },
                    title: "Chapter 1: Intro".into(),
                    nodes: vec![
                        ContentNode::Paragraph {
                            spans: vec![Span::plain("Cost < price "), Span::bold("matters")],
                        },
                        ContentNode::TableRow {
                            cells: vec![vec![Span::plain("A")], vec![Span::plain("B")]],
                            header: true,
                        },
                        ContentNode::TableRow {
                            cells: vec![vec![Span::plain("1")]],
                            header: false,
                        },
                        ContentNode::Figure {
                            figure: FigureRef::new(1, 1),
                            image: 0,
                            caption: "Figure 1.1: Map".into(),
                        },
                    ],
                },
            ],
            images: vec![image(2, 1)],
            missing_figures: Vec::new(),
        }
    }

    #[test]
    fn package_contains_required_parts_and_media() {
        let bytes = DocxSerializer::default().serialize(&sample()).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in [
            CONTENT_TYPES_PART,
            "_rels/.rels",
            "docProps/core.xml",
            "word/_rels/document.xml.rels",
            STYLES_PART,
            DOCUMENT_PART,
            "word/media/image1.png",
        ] {
            assert!(names.contains(&part), "missing {part}");
        }
        assert!(read_part(&bytes, CONTENT_TYPES_PART).contains(r#"Extension="png""#));
        assert!(read_part(&bytes, "word/_rels/document.xml.rels")
            .contains(r#"Id="rIdImage1""#));
    }

    #[test]
    fn body_escapes_text_and_keeps_structure() {
        let bytes = DocxSerializer::default().serialize(&sample()).unwrap();
        let body = read_part(&bytes, DOCUMENT_PART);

        assert!(body.contains("Solar &amp; Storage"));
        assert!(body.contains("Cost &lt; price "));
        assert!(body.contains("<w:b/>"));
        assert!(body.contains("<w:pageBreakBefore/>"));
        assert!(body.contains(r#"r:embed="rIdImage1""#));
        assert_eq!(body.matches("<w:tbl>").count(), 1);
        assert_eq!(body.matches("<w:tr>").count(), 2);
        assert!(body.contains("<w:tblHeader/>"));
        assert!(read_part(&bytes, STYLES_PART).contains(r#"<w:jc w:val="both"/>"#));
    }

    #[test]
    fn control_characters_are_dropped_from_text() {
        let mut document = sample();
        document.title = "Solar\u{1} Report".into();
        document.sections[1].nodes =
            vec![ContentNode::paragraph("Grid\u{0b}load\u{1b} rose\tsharply")];
        let bytes = DocxSerializer::default().serialize(&document).unwrap();
        let body = read_part(&bytes, DOCUMENT_PART);

        assert!(body.contains("Gridload rose"));
        assert!(body.contains("<w:tab/>"));
        assert!(!body.chars().any(forbidden_in_xml));
        assert!(read_part(&bytes, "docProps/core.xml")
            .contains("<dc:title>Solar Report</dc:title>"));
    }

    #[test]
    fn wide_images_are_scaled_to_text_width() {
        let serializer = DocxSerializer::default();
        assert_eq!(serializer.extent(&image(100, 50)), (952_500, 476_250));
        let (cx, cy) = serializer.extent(&image(4000, 2000));
        assert_eq!(cx, DEFAULT_MAX_IMAGE_WIDTH_EMU);
        assert_eq!(cy, DEFAULT_MAX_IMAGE_WIDTH_EMU / 2);
    }
}
