//! Caption text injection.
//!
//! How captions are derived (OCR, manual entry, a labeling model) is the
//! caller's business; the assembler only asks this trait for text per
//! scene and omits the caption node when there is none.

use std::collections::HashMap;

use crate::core::segmenter::Scene;

pub trait CaptionProvider: Send + Sync {
    fn caption(&self, scene: &Scene) -> Option<String>;
}

/// No captions at all; the default.
pub struct NoCaptions;

impl CaptionProvider for NoCaptions {
    fn caption(&self, _scene: &Scene) -> Option<String> {
        None
    }
}

/// Fixed text per scene id, for callers that already know their captions
/// (and for tests).
pub struct StaticCaptions {
    by_scene: HashMap<usize, String>,
}

impl StaticCaptions {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        Self {
            by_scene: pairs.into_iter().map(|(id, s)| (id, s.into())).collect(),
        }
    }
}

impl CaptionProvider for StaticCaptions {
    fn caption(&self, scene: &Scene) -> Option<String> {
        self.by_scene.get(&scene.id).cloned()
    }
}
