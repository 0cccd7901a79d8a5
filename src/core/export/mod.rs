//! Document serialization backends.

pub mod docx;
pub mod html;
pub mod markdown;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::document::DocumentTree;
use crate::core::error::{PipelineError, Result};
use crate::core::keyframe::Keyframe;

/// JPEG quality for exported keyframes. Constant so re-exports stay
/// byte-identical.
pub(crate) const EXPORT_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Word-processor document with images embedded inline.
    Docx,
    /// Lightweight markup with relative-path image references.
    Markdown,
    /// HTML page with the same sidecar-image layout as markdown.
    Html,
}

impl OutputFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = PipelineError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "docx" => Ok(OutputFormat::Docx),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            other => Err(PipelineError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Image payload the caller must write next to the document (markdown and
/// html variants; empty for docx, whose images are embedded).
#[derive(Debug, Clone)]
pub struct SidecarImage {
    pub relative_path: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub format: OutputFormat,
    pub document: Vec<u8>,
    pub images: Vec<SidecarImage>,
}

impl ExportArtifact {
    /// Write the document (and any sidecar images) under `dir`, returning
    /// the document path.
    pub fn write_to(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let doc_path = dir.join(format!("{}.{}", stem, self.format.file_extension()));
        fs::write(&doc_path, &self.document)?;

        for image in &self.images {
            let path = dir.join(&image.relative_path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &image.data)?;
        }

        log::info!(
            "wrote {} ({} bytes, {} images)",
            doc_path.display(),
            self.document.len(),
            self.images.len()
        );
        Ok(doc_path)
    }
}

/// Serialize the tree in the requested format. Deterministic: the same
/// tree and format always yield the same bytes.
pub fn export(tree: &DocumentTree, format: OutputFormat) -> Result<ExportArtifact> {
    log::debug!("exporting {} nodes as {:?}", tree.len(), format);
    match format {
        OutputFormat::Docx => docx::export_docx(tree),
        OutputFormat::Markdown => markdown::export_markdown(tree),
        OutputFormat::Html => html::export_html(tree),
    }
}

/// Deterministic image names in document order: first keyframe of scene N
/// is `scene-00N.jpg`, later keyframes of the same scene get a `-k`
/// suffix.
pub(crate) fn named_images(tree: &DocumentTree) -> Vec<(String, Keyframe)> {
    let mut seen: HashMap<usize, usize> = HashMap::new();
    tree.images()
        .into_iter()
        .map(|(_, keyframe)| {
            let ordinal = seen.entry(keyframe.scene_id).or_insert(0);
            *ordinal += 1;
            let name = if *ordinal == 1 {
                format!("scene-{:03}.jpg", keyframe.scene_id)
            } else {
                format!("scene-{:03}-{}.jpg", keyframe.scene_id, ordinal)
            };
            (name, keyframe.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse_known_tags() {
        assert_eq!("docx".parse::<OutputFormat>().unwrap(), OutputFormat::Docx);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("html".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
    }

    #[test]
    fn test_format_parse_unknown_tag_fails() {
        let err = "rtf".parse::<OutputFormat>().unwrap_err();
        match err {
            PipelineError::UnsupportedFormat(tag) => assert_eq!(tag, "rtf"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_file_extensions() {
        assert_eq!(OutputFormat::Docx.file_extension(), "docx");
        assert_eq!(OutputFormat::Markdown.file_extension(), "md");
        assert_eq!(OutputFormat::Html.file_extension(), "html");
    }

    #[test]
    fn test_artifact_write_to_writes_document_and_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ExportArtifact {
            format: OutputFormat::Markdown,
            document: b"# digest".to_vec(),
            images: vec![SidecarImage {
                relative_path: "images/scene-000.jpg".to_string(),
                data: vec![1, 2, 3],
            }],
        };

        let doc_path = artifact.write_to(dir.path(), "digest").unwrap();
        assert!(doc_path.ends_with("digest.md"));
        assert_eq!(fs::read(&doc_path).unwrap(), b"# digest");
        assert_eq!(
            fs::read(dir.path().join("images/scene-000.jpg")).unwrap(),
            vec![1, 2, 3]
        );
    }
}
