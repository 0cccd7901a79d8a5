//! HTML backend. Same sidecar-image layout as markdown.

use crate::core::document::{DocumentTree, NodeId, NodeKind, NodePayload};
use crate::core::error::Result;
use crate::core::export::{
    named_images, ExportArtifact, OutputFormat, SidecarImage, EXPORT_JPEG_QUALITY,
};

pub(crate) fn export_html(tree: &DocumentTree) -> Result<ExportArtifact> {
    let named = named_images(tree);
    let names: Vec<String> = named.iter().map(|(n, _)| n.clone()).collect();

    let mut body = String::new();
    let mut image_ordinal = 0usize;
    render(tree, tree.root(), &names, &mut image_ordinal, &mut body);

    let document = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Scene digest</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        body
    );

    let mut images = Vec::with_capacity(named.len());
    for (name, keyframe) in &named {
        images.push(SidecarImage {
            relative_path: format!("images/{}", name),
            data: keyframe.frame.encode_jpeg(EXPORT_JPEG_QUALITY)?,
        });
    }

    Ok(ExportArtifact {
        format: OutputFormat::Html,
        document: document.into_bytes(),
        images,
    })
}

fn render(
    tree: &DocumentTree,
    id: NodeId,
    names: &[String],
    image_ordinal: &mut usize,
    out: &mut String,
) {
    let node = tree.node(id);
    match (node.kind, &node.payload) {
        (NodeKind::Section, _) => {
            let is_root = id == tree.root();
            if !is_root {
                out.push_str("<section>\n");
            }
            for (child, _) in tree.children(id) {
                render(tree, child, names, image_ordinal, out);
            }
            if !is_root {
                out.push_str("</section>\n");
            }
        }
        (NodeKind::Heading, NodePayload::Text(text)) => {
            out.push_str(&format!("<h2>{}</h2>\n", escape(text)));
        }
        (NodeKind::Paragraph, NodePayload::Text(text)) => {
            out.push_str(&format!("<p>{}</p>\n", escape(text)));
        }
        (NodeKind::Image, NodePayload::Image(keyframe)) => {
            let name = &names[*image_ordinal];
            *image_ordinal += 1;
            out.push_str(&format!(
                "<figure><img src=\"images/{}\" alt=\"Scene {} keyframe\"></figure>\n",
                name,
                keyframe.scene_id + 1
            ));
        }
        (NodeKind::Caption, NodePayload::Text(text)) => {
            out.push_str(&format!("<p><em>{}</em></p>\n", escape(text)));
        }
        _ => {}
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::{assemble, StaticCaptions};
    use crate::core::keyframe::{Keyframe, KeyframeMode};
    use crate::core::segmenter::Scene;
    use crate::core::video::frame::Frame;
    use std::time::Duration;

    fn fixture_tree() -> DocumentTree {
        let scenes = vec![Scene {
            id: 0,
            start_frame: 0,
            end_frame: 4,
            start_time: Duration::ZERO,
            end_time: Duration::from_secs(3),
            boundary_score: 0.0,
        }];
        let keyframes = vec![Keyframe {
            scene_id: 0,
            frame: Frame::new(0, Duration::ZERO, 16, 16, vec![40; 16 * 16 * 3]),
            reason: KeyframeMode::First,
        }];
        let captions = StaticCaptions::from_pairs([(0, "a < b & c")]);
        assemble(&scenes, &keyframes, &captions)
    }

    #[test]
    fn test_html_structure() {
        let artifact = export_html(&fixture_tree()).unwrap();
        let text = String::from_utf8(artifact.document).unwrap();

        assert!(text.starts_with("<!DOCTYPE html>"));
        assert!(text.contains("<section>"));
        assert!(text.contains("<h2>Scene 1</h2>"));
        assert!(text.contains("src=\"images/scene-000.jpg\""));
        assert_eq!(artifact.images.len(), 1);
    }

    #[test]
    fn test_html_escapes_caption_text() {
        let artifact = export_html(&fixture_tree()).unwrap();
        let text = String::from_utf8(artifact.document).unwrap();
        assert!(text.contains("<em>a &lt; b &amp; c</em>"));
    }

    #[test]
    fn test_html_is_deterministic() {
        let tree = fixture_tree();
        let a = export_html(&tree).unwrap();
        let b = export_html(&tree).unwrap();
        assert_eq!(a.document, b.document);
    }
}
