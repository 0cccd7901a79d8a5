//! Scene list → document tree.

use std::time::Duration;

use crate::core::document::caption::CaptionProvider;
use crate::core::document::tree::{DocumentTree, NodeKind, NodePayload};
use crate::core::keyframe::Keyframe;
use crate::core::segmenter::Scene;

/// Build the document: one section per scene, each with a heading, a
/// time-range paragraph, one image per keyframe, and an optional caption.
/// Pure and total: every scene becomes exactly one section, every keyframe
/// exactly one image node, in input order.
pub fn assemble(
    scenes: &[Scene],
    keyframes: &[Keyframe],
    captions: &dyn CaptionProvider,
) -> DocumentTree {
    let mut tree = DocumentTree::new();
    let root = tree.root();

    for scene in scenes {
        let section = tree.push(root, NodeKind::Section, NodePayload::Empty);

        tree.push(
            section,
            NodeKind::Heading,
            NodePayload::Text(format!("Scene {}", scene.id + 1)),
        );
        tree.push(
            section,
            NodeKind::Paragraph,
            NodePayload::Text(format!(
                "{} – {} · frames {}–{}",
                format_timestamp(scene.start_time),
                format_timestamp(scene.end_time),
                scene.start_frame,
                scene.end_frame,
            )),
        );

        for keyframe in keyframes.iter().filter(|k| k.scene_id == scene.id) {
            tree.push(section, NodeKind::Image, NodePayload::Image(keyframe.clone()));
        }

        if let Some(text) = captions.caption(scene) {
            tree.push(section, NodeKind::Caption, NodePayload::Text(text));
        }
    }

    tree
}

/// `mm:ss` below one hour, `h:mm:ss` above. Sub-second precision is not
/// useful in a reading document.
pub fn format_timestamp(t: Duration) -> String {
    let total = t.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
