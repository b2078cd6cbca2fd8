//! Block kind → governing behaviour.
//!
//! The table is a fixed `match`; it has no runtime mutation point.

use serde::{Deserialize, Serialize};

/// Structural kind of an emitted span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Body text.
    #[default]
    Prose,
    /// Section or chapter heading.
    Heading,
    /// Diagram, table or figure; the text is its caption.
    Visual,
}

/// How the engine treats a block kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockBehavior {
    /// Words count toward the guide's word budget.
    pub counts_words: bool,
    /// Block consumes one unit of the visual budget.
    pub counts_as_visual: bool,
    /// Block goes through expansion classification (and may be cut).
    pub classify: bool,
}

impl BlockKind {
    /// Lookup the governing behaviour for this kind.
    pub const fn behavior(self) -> BlockBehavior {
        match self {
            Self::Prose => BlockBehavior {
                counts_words: true,
                counts_as_visual: false,
                classify: true,
            },
            Self::Heading => BlockBehavior {
                counts_words: true,
                counts_as_visual: false,
                classify: false,
            },
            Self::Visual => BlockBehavior {
                counts_words: false,
                counts_as_visual: true,
                classify: false,
            },
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prose => write!(f, "prose"),
            Self::Heading => write!(f, "heading"),
            Self::Visual => write!(f, "visual"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavior_table() {
        assert!(BlockKind::Prose.behavior().classify);
        assert!(BlockKind::Prose.behavior().counts_words);
        assert!(!BlockKind::Heading.behavior().classify);
        assert!(BlockKind::Heading.behavior().counts_words);
        assert!(BlockKind::Visual.behavior().counts_as_visual);
        assert!(!BlockKind::Visual.behavior().counts_words);
    }

    #[test]
    fn test_block_kind_serde_default() {
        assert_eq!(BlockKind::default(), BlockKind::Prose);
        let parsed: BlockKind = serde_json::from_str("\"visual\"").unwrap();
        assert_eq!(parsed, BlockKind::Visual);
    }
}
