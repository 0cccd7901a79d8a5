//! Word-processor backend: a minimal OOXML package with keyframe JPEGs
//! embedded inline under `word/media/`.
//!
//! The package is written with fixed zip options and no wall-clock
//! timestamps anywhere, so the same tree always produces the same bytes.

use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::document::{DocumentTree, NodeId, NodeKind, NodePayload};
use crate::core::error::Result;
use crate::core::export::{
    named_images, ExportArtifact, OutputFormat, EXPORT_JPEG_QUALITY,
};
use crate::core::keyframe::Keyframe;

const EMU_PER_PIXEL: u64 = 9525;
/// 6 inches, the usable width of a default page.
const MAX_WIDTH_EMU: u64 = 5_486_400;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Default Extension="jpg" ContentType="image/jpeg"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:styleId="Heading2">
<w:name w:val="heading 2"/>
<w:pPr><w:spacing w:before="200" w:after="80"/></w:pPr>
<w:rPr><w:b/><w:sz w:val="30"/></w:rPr>
</w:style>
<w:style w:type="paragraph" w:styleId="Caption">
<w:name w:val="caption"/>
<w:rPr><w:i/><w:sz w:val="18"/></w:rPr>
</w:style>
</w:styles>"#;

pub(crate) fn export_docx(tree: &DocumentTree) -> Result<ExportArtifact> {
    let images = named_images(tree);
    let document_xml = build_document_xml(tree)?;
    let rels_xml = build_document_rels(&images)?;

    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    archive.start_file("[Content_Types].xml", options)?;
    archive.write_all(CONTENT_TYPES.as_bytes())?;

    archive.start_file("_rels/.rels", options)?;
    archive.write_all(PACKAGE_RELS.as_bytes())?;

    archive.start_file("word/document.xml", options)?;
    archive.write_all(&document_xml)?;

    archive.start_file("word/_rels/document.xml.rels", options)?;
    archive.write_all(&rels_xml)?;

    archive.start_file("word/styles.xml", options)?;
    archive.write_all(STYLES.as_bytes())?;

    for (name, keyframe) in &images {
        archive.start_file(format!("word/media/{}", name), options)?;
        archive.write_all(&keyframe.frame.encode_jpeg(EXPORT_JPEG_QUALITY)?)?;
    }

    let cursor = archive.finish()?;
    Ok(ExportArtifact {
        format: OutputFormat::Docx,
        document: cursor.into_inner(),
        // Everything is embedded; nothing for the caller to write.
        images: Vec::new(),
    })
}

/// `word/_rels/document.xml.rels`: rId1 = styles, images from rId2 up,
/// matching `image_rel_id`.
fn build_document_rels(images: &[(String, Keyframe)]) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut root = BytesStart::new("Relationships");
    root.push_attribute((
        "xmlns",
        "http://schemas.openxmlformats.org/package/2006/relationships",
    ));
    writer.write_event(Event::Start(root))?;

    let mut styles = BytesStart::new("Relationship");
    styles.push_attribute(("Id", "rId1"));
    styles.push_attribute((
        "Type",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles",
    ));
    styles.push_attribute(("Target", "styles.xml"));
    writer.write_event(Event::Empty(styles))?;

    for (ordinal, (name, _)) in images.iter().enumerate() {
        let mut rel = BytesStart::new("Relationship");
        rel.push_attribute(("Id", image_rel_id(ordinal).as_str()));
        rel.push_attribute((
            "Type",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image",
        ));
        rel.push_attribute(("Target", format!("media/{}", name).as_str()));
        writer.write_event(Event::Empty(rel))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Relationships")))?;
    Ok(writer.into_inner().into_inner())
}

fn image_rel_id(ordinal: usize) -> String {
    format!("rId{}", ordinal + 2)
}

fn build_document_xml(tree: &DocumentTree) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut doc = BytesStart::new("w:document");
    doc.push_attribute(("xmlns:w", NS_W));
    doc.push_attribute(("xmlns:wp", NS_WP));
    doc.push_attribute(("xmlns:a", NS_A));
    doc.push_attribute(("xmlns:pic", NS_PIC));
    doc.push_attribute(("xmlns:r", NS_R));
    writer.write_event(Event::Start(doc))?;
    writer.write_event(Event::Start(BytesStart::new("w:body")))?;

    let mut image_ordinal = 0usize;
    write_node(&mut writer, tree, tree.root(), &mut image_ordinal)?;

    writer.write_event(Event::Empty(BytesStart::new("w:sectPr")))?;
    writer.write_event(Event::End(BytesEnd::new("w:body")))?;
    writer.write_event(Event::End(BytesEnd::new("w:document")))?;
    Ok(writer.into_inner().into_inner())
}

fn write_node(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    tree: &DocumentTree,
    id: NodeId,
    image_ordinal: &mut usize,
) -> Result<()> {
    let node = tree.node(id);
    match (node.kind, &node.payload) {
        // Sections have no body-level markup of their own; their children
        // flatten into the paragraph stream in document order.
        (NodeKind::Section, _) => {
            for (child, _) in tree.children(id) {
                write_node(writer, tree, child, image_ordinal)?;
            }
        }
        (NodeKind::Heading, NodePayload::Text(text)) => {
            write_text_paragraph(writer, Some("Heading2"), text)?;
        }
        (NodeKind::Paragraph, NodePayload::Text(text)) => {
            write_text_paragraph(writer, None, text)?;
        }
        (NodeKind::Caption, NodePayload::Text(text)) => {
            write_text_paragraph(writer, Some("Caption"), text)?;
        }
        (NodeKind::Image, NodePayload::Image(keyframe)) => {
            let ordinal = *image_ordinal;
            *image_ordinal += 1;
            write_image_paragraph(writer, keyframe, ordinal)?;
        }
        _ => {}
    }
    Ok(())
}

fn write_text_paragraph(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    style: Option<&str>,
    text: &str,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    if let Some(style) = style {
        writer.write_event(Event::Start(BytesStart::new("w:pPr")))?;
        let mut el = BytesStart::new("w:pStyle");
        el.push_attribute(("w:val", style));
        writer.write_event(Event::Empty(el))?;
        writer.write_event(Event::End(BytesEnd::new("w:pPr")))?;
    }
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    writer.write_event(Event::Start(BytesStart::new("w:t")))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

/// `wp:inline` drawing referencing the embedded JPEG by relationship id.
fn write_image_paragraph(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    keyframe: &Keyframe,
    ordinal: usize,
) -> Result<()> {
    let (cx, cy) = display_extent(keyframe.frame.width, keyframe.frame.height);
    let rel_id = image_rel_id(ordinal);
    let doc_pr_id = (ordinal + 1).to_string();
    let name = format!("Scene {} keyframe", keyframe.scene_id + 1);

    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    writer.write_event(Event::Start(BytesStart::new("w:drawing")))?;

    let mut inline = BytesStart::new("wp:inline");
    for margin in ["distT", "distB", "distL", "distR"] {
        inline.push_attribute((margin, "0"));
    }
    writer.write_event(Event::Start(inline))?;

    let mut extent = BytesStart::new("wp:extent");
    extent.push_attribute(("cx", cx.to_string().as_str()));
    extent.push_attribute(("cy", cy.to_string().as_str()));
    writer.write_event(Event::Empty(extent))?;

    let mut doc_pr = BytesStart::new("wp:docPr");
    doc_pr.push_attribute(("id", doc_pr_id.as_str()));
    doc_pr.push_attribute(("name", name.as_str()));
    writer.write_event(Event::Empty(doc_pr))?;

    let mut graphic = BytesStart::new("a:graphic");
    graphic.push_attribute(("xmlns:a", NS_A));
    writer.write_event(Event::Start(graphic))?;

    let mut graphic_data = BytesStart::new("a:graphicData");
    graphic_data.push_attribute((
        "uri",
        "http://schemas.openxmlformats.org/drawingml/2006/picture",
    ));
    writer.write_event(Event::Start(graphic_data))?;

    let mut pic = BytesStart::new("pic:pic");
    pic.push_attribute(("xmlns:pic", NS_PIC));
    writer.write_event(Event::Start(pic))?;

    writer.write_event(Event::Start(BytesStart::new("pic:nvPicPr")))?;
    let mut c_nv_pr = BytesStart::new("pic:cNvPr");
    c_nv_pr.push_attribute(("id", doc_pr_id.as_str()));
    c_nv_pr.push_attribute(("name", name.as_str()));
    writer.write_event(Event::Empty(c_nv_pr))?;
    writer.write_event(Event::Empty(BytesStart::new("pic:cNvPicPr")))?;
    writer.write_event(Event::End(BytesEnd::new("pic:nvPicPr")))?;

    writer.write_event(Event::Start(BytesStart::new("pic:blipFill")))?;
    let mut blip = BytesStart::new("a:blip");
    blip.push_attribute(("r:embed", rel_id.as_str()));
    writer.write_event(Event::Empty(blip))?;
    writer.write_event(Event::Start(BytesStart::new("a:stretch")))?;
    writer.write_event(Event::Empty(BytesStart::new("a:fillRect")))?;
    writer.write_event(Event::End(BytesEnd::new("a:stretch")))?;
    writer.write_event(Event::End(BytesEnd::new("pic:blipFill")))?;

    writer.write_event(Event::Start(BytesStart::new("pic:spPr")))?;
    writer.write_event(Event::Start(BytesStart::new("a:xfrm")))?;
    let mut off = BytesStart::new("a:off");
    off.push_attribute(("x", "0"));
    off.push_attribute(("y", "0"));
    writer.write_event(Event::Empty(off))?;
    let mut ext = BytesStart::new("a:ext");
    ext.push_attribute(("cx", cx.to_string().as_str()));
    ext.push_attribute(("cy", cy.to_string().as_str()));
    writer.write_event(Event::Empty(ext))?;
    writer.write_event(Event::End(BytesEnd::new("a:xfrm")))?;
    let mut geom = BytesStart::new("a:prstGeom");
    geom.push_attribute(("prst", "rect"));
    writer.write_event(Event::Start(geom))?;
    writer.write_event(Event::Empty(BytesStart::new("a:avLst")))?;
    writer.write_event(Event::End(BytesEnd::new("a:prstGeom")))?;
    writer.write_event(Event::End(BytesEnd::new("pic:spPr")))?;

    writer.write_event(Event::End(BytesEnd::new("pic:pic")))?;
    writer.write_event(Event::End(BytesEnd::new("a:graphicData")))?;
    writer.write_event(Event::End(BytesEnd::new("a:graphic")))?;
    writer.write_event(Event::End(BytesEnd::new("wp:inline")))?;
    writer.write_event(Event::End(BytesEnd::new("w:drawing")))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

/// Display size in EMUs, capped at the page width with aspect preserved.
fn display_extent(width_px: u32, height_px: u32) -> (u64, u64) {
    let cx = width_px as u64 * EMU_PER_PIXEL;
    let cy = height_px as u64 * EMU_PER_PIXEL;
    if cx <= MAX_WIDTH_EMU {
        return (cx, cy);
    }
    let scale = MAX_WIDTH_EMU as f64 / cx as f64;
    (MAX_WIDTH_EMU, (cy as f64 * scale).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::{assemble, StaticCaptions};
    use crate::core::keyframe::KeyframeMode;
    use crate::core::segmenter::Scene;
    use crate::core::video::frame::Frame;
    use std::io::Read;
    use std::time::Duration;

    fn fixture_tree() -> DocumentTree {
        let scenes = vec![
            Scene {
                id: 0,
                start_frame: 0,
                end_frame: 5,
                start_time: Duration::ZERO,
                end_time: Duration::from_secs(4),
                boundary_score: 0.0,
            },
            Scene {
                id: 1,
                start_frame: 5,
                end_frame: 8,
                start_time: Duration::from_secs(5),
                end_time: Duration::from_secs(7),
                boundary_score: 0.6,
            },
        ];
        let keyframes: Vec<Keyframe> = scenes
            .iter()
            .map(|s| Keyframe {
                scene_id: s.id,
                frame: Frame::new(
                    s.start_frame,
                    s.start_time,
                    32,
                    24,
                    vec![(60 + s.id * 50) as u8; 32 * 24 * 3],
                ),
                reason: KeyframeMode::First,
            })
            .collect();
        let captions = StaticCaptions::from_pairs([(0, "first")]);
        assemble(&scenes, &keyframes, &captions)
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn entry_string(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut out = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_package_has_expected_entries() {
        let artifact = export_docx(&fixture_tree()).unwrap();
        assert!(artifact.images.is_empty());

        let names = entry_names(&artifact.document);
        for expected in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/_rels/document.xml.rels",
            "word/styles.xml",
            "word/media/scene-000.jpg",
            "word/media/scene-001.jpg",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_document_xml_structure() {
        let artifact = export_docx(&fixture_tree()).unwrap();
        let doc = entry_string(&artifact.document, "word/document.xml");

        assert!(doc.contains("<w:t>Scene 1</w:t>"));
        assert!(doc.contains("<w:t>Scene 2</w:t>"));
        assert!(doc.contains("w:val=\"Heading2\""));
        assert!(doc.contains("w:val=\"Caption\""));
        assert!(doc.contains("r:embed=\"rId2\""));
        assert!(doc.contains("r:embed=\"rId3\""));

        let first = doc.find("Scene 1").unwrap();
        let second = doc.find("Scene 2").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_relationships_point_at_media() {
        let artifact = export_docx(&fixture_tree()).unwrap();
        let rels = entry_string(&artifact.document, "word/_rels/document.xml.rels");
        assert!(rels.contains("Target=\"media/scene-000.jpg\""));
        assert!(rels.contains("Target=\"media/scene-001.jpg\""));
        assert!(rels.contains("Target=\"styles.xml\""));
    }

    #[test]
    fn test_docx_is_deterministic() {
        let tree = fixture_tree();
        let a = export_docx(&tree).unwrap();
        let b = export_docx(&tree).unwrap();
        assert_eq!(a.document, b.document);
    }

    #[test]
    fn test_display_extent_caps_width() {
        let (cx, cy) = display_extent(32, 24);
        assert_eq!(cx, 32 * 9525);
        assert_eq!(cy, 24 * 9525);

        let (cx, cy) = display_extent(1920, 1080);
        assert_eq!(cx, MAX_WIDTH_EMU);
        assert!(cy < cx);
    }
}
