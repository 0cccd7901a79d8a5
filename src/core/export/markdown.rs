//! Lightweight-markup backend.
//!
//! Images are referenced as `images/<name>` relative paths; the payloads
//! ride along as sidecar files for the caller to write next to the
//! document.

use crate::core::document::{DocumentTree, NodeId, NodeKind, NodePayload};
use crate::core::error::Result;
use crate::core::export::{
    named_images, ExportArtifact, OutputFormat, SidecarImage, EXPORT_JPEG_QUALITY,
};

pub(crate) fn export_markdown(tree: &DocumentTree) -> Result<ExportArtifact> {
    let named = named_images(tree);
    let names: Vec<String> = named.iter().map(|(n, _)| n.clone()).collect();

    let mut out = String::new();
    let mut image_ordinal = 0usize;
    render(tree, tree.root(), &names, &mut image_ordinal, &mut out);

    let mut images = Vec::with_capacity(named.len());
    for (name, keyframe) in &named {
        images.push(SidecarImage {
            relative_path: format!("images/{}", name),
            data: keyframe.frame.encode_jpeg(EXPORT_JPEG_QUALITY)?,
        });
    }

    Ok(ExportArtifact {
        format: OutputFormat::Markdown,
        document: out.into_bytes(),
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
            for (child, _) in tree.children(id) {
                render(tree, child, names, image_ordinal, out);
            }
        }
        (NodeKind::Heading, NodePayload::Text(text)) => {
            out.push_str("## ");
            out.push_str(text);
            out.push_str("\n\n");
        }
        (NodeKind::Paragraph, NodePayload::Text(text)) => {
            out.push_str(text);
            out.push_str("\n\n");
        }
        (NodeKind::Image, NodePayload::Image(keyframe)) => {
            let name = &names[*image_ordinal];
            *image_ordinal += 1;
            out.push_str(&format!(
                "![Scene {} keyframe](images/{})\n\n",
                keyframe.scene_id + 1,
                name
            ));
        }
        (NodeKind::Caption, NodePayload::Text(text)) => {
            out.push('*');
            out.push_str(text);
            out.push_str("*\n\n");
        }
        _ => {}
    }
}
