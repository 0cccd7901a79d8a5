pub mod assembler;
pub mod caption;
pub mod tree;

pub use assembler::assemble;
pub use caption::{CaptionProvider, NoCaptions, StaticCaptions};
pub use tree::{DocumentTree, NodeId, NodeKind, NodePayload};
