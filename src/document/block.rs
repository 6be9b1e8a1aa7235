//! Blocks: the typed nodes of the document tree.

use serde::{Deserialize, Serialize};

/// The closed set of block types.
///
/// Builders assign an initial type from detector labels; processors may
/// re-type a block (e.g. `Unknown` → `Table`) but the set itself is fixed —
/// after the pipeline completes every block carries one of these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    /// A single detected text line; leaf content of most other types.
    Line,
    Text,
    /// Body text containing inline math runs.
    TextInlineMath,
    SectionHeader,
    PageHeader,
    PageFooter,
    Footnote,
    Equation,
    Code,
    Blockquote,
    /// Container grouping consecutive list items.
    ListGroup,
    ListItem,
    Table,
    TableCell,
    TableOfContents,
    Form,
    Figure,
    Picture,
    Caption,
    Handwriting,
    Reference,
    /// Nested layout the detector could not decompose.
    ComplexRegion,
    /// Detector label that maps to nothing; processors retype or renderers
    /// fall back to raw text.
    Unknown,
}

impl BlockType {
    /// The kebab-case name used in configuration (relabel rules) and chunk
    /// output. Inverse of [`BlockType::from_name`].
    pub fn name(self) -> &'static str {
        match self {
            BlockType::Line => "line",
            BlockType::Text => "text",
            BlockType::TextInlineMath => "text-inline-math",
            BlockType::SectionHeader => "section-header",
            BlockType::PageHeader => "page-header",
            BlockType::PageFooter => "page-footer",
            BlockType::Footnote => "footnote",
            BlockType::Equation => "equation",
            BlockType::Code => "code",
            BlockType::Blockquote => "blockquote",
            BlockType::ListGroup => "list-group",
            BlockType::ListItem => "list-item",
            BlockType::Table => "table",
            BlockType::TableCell => "table-cell",
            BlockType::TableOfContents => "table-of-contents",
            BlockType::Form => "form",
            BlockType::Figure => "figure",
            BlockType::Picture => "picture",
            BlockType::Caption => "caption",
            BlockType::Handwriting => "handwriting",
            BlockType::Reference => "reference",
            BlockType::ComplexRegion => "complex-region",
            BlockType::Unknown => "unknown",
        }
    }

    /// Look up a type by its kebab-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: &[BlockType] = &[
            BlockType::Line,
            BlockType::Text,
            BlockType::TextInlineMath,
            BlockType::SectionHeader,
            BlockType::PageHeader,
            BlockType::PageFooter,
            BlockType::Footnote,
            BlockType::Equation,
            BlockType::Code,
            BlockType::Blockquote,
            BlockType::ListGroup,
            BlockType::ListItem,
            BlockType::Table,
            BlockType::TableCell,
            BlockType::TableOfContents,
            BlockType::Form,
            BlockType::Figure,
            BlockType::Picture,
            BlockType::Caption,
            BlockType::Handwriting,
            BlockType::Reference,
            BlockType::ComplexRegion,
            BlockType::Unknown,
        ];
        ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Types whose text body is prose (candidates for line merging,
    /// hyphenation fixes, inline-math detection).
    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            BlockType::Text
                | BlockType::TextInlineMath
                | BlockType::Blockquote
                | BlockType::Footnote
                | BlockType::ListItem
                | BlockType::Reference
                | BlockType::Unknown
        )
    }

    /// Types excluded from rendered output (repeated furniture).
    pub fn is_furniture(self) -> bool {
        matches!(self, BlockType::PageHeader | BlockType::PageFooter)
    }
}

/// Axis-aligned bounding box in PDF points, origin top-left, `y` growing
/// downward (provider coordinates are normalised to this at build time).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Fraction of `self`'s height that vertically overlaps `other`.
    pub fn vertical_overlap(&self, other: &BBox) -> f32 {
        let overlap = (self.y1.min(other.y1) - self.y0.max(other.y0)).max(0.0);
        if self.height() == 0.0 {
            0.0
        } else {
            overlap / self.height()
        }
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Per-block bookkeeping written by the LLM service.
///
/// Both counters are monotonic: one increment per successful LLM call that
/// targeted this block, and the sum of input+output tokens those calls
/// reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub llm_request_count: u32,
    pub llm_tokens_used: u64,
}

impl BlockMetadata {
    /// Record one successful LLM call against this block.
    pub fn record_llm_call(&mut self, tokens: u64) {
        self.llm_request_count += 1;
        self.llm_tokens_used += tokens;
    }

    fn is_zero(&self) -> bool {
        self.llm_request_count == 0 && self.llm_tokens_used == 0
    }
}

/// A typed node in the tree.
///
/// Geometry is inherited from detection and is read-only once the structure
/// builder has run. Everything else is fair game for processors, with one
/// rule: re-typing is allowed, orphaning children is not — children move
/// with their block or into another block, never out of the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub block_type: BlockType,

    pub bbox: BBox,

    /// Raw or derived text content. For composite blocks this is usually
    /// empty until a processor consolidates the children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Structured content for tables and forms (an HTML fragment).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Heading level 1–6, section headers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,

    /// Language tag, code blocks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Alternative text, figures and pictures only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,

    /// Numbered vs. bulleted, list groups only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordered: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,

    #[serde(default, skip_serializing_if = "BlockMetadata::is_zero")]
    pub metadata: BlockMetadata,
}

impl Block {
    pub fn new(block_type: BlockType, bbox: BBox) -> Self {
        Self {
            block_type,
            bbox,
            text: None,
            html: None,
            heading_level: None,
            language: None,
            alt_text: None,
            ordered: None,
            children: Vec::new(),
            metadata: BlockMetadata::default(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// The block's own text, or the concatenation of its descendants' text
    /// (lines joined with newlines) when it has none of its own.
    pub fn raw_text(&self) -> String {
        if let Some(ref t) = self.text {
            return t.clone();
        }
        let mut parts = Vec::new();
        for child in &self.children {
            let t = child.raw_text();
            if !t.is_empty() {
                parts.push(t);
            }
        }
        parts.join("\n")
    }

    /// Direct children of the given type.
    pub fn children_of_type(&self, t: BlockType) -> impl Iterator<Item = &Block> {
        self.children.iter().filter(move |c| c.block_type == t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip() {
        for t in [
            BlockType::Text,
            BlockType::SectionHeader,
            BlockType::TableOfContents,
            BlockType::ComplexRegion,
            BlockType::Unknown,
        ] {
            assert_eq!(BlockType::from_name(t.name()), Some(t));
        }
        assert_eq!(BlockType::from_name("nonsense"), None);
    }

    #[test]
    fn serde_uses_kebab_case_tags() {
        let b = Block::new(BlockType::SectionHeader, BBox::default());
        let json = serde_json::to_string(&b).unwrap();
        assert!(json.contains("\"section-header\""), "got: {json}");
    }

    #[test]
    fn raw_text_prefers_own_text_over_children() {
        let mut b = Block::new(BlockType::Text, BBox::default());
        b.children
            .push(Block::new(BlockType::Line, BBox::default()).with_text("line one"));
        b.children
            .push(Block::new(BlockType::Line, BBox::default()).with_text("line two"));
        assert_eq!(b.raw_text(), "line one\nline two");

        b.text = Some("consolidated".into());
        assert_eq!(b.raw_text(), "consolidated");
    }

    #[test]
    fn metadata_counters_are_monotonic() {
        let mut m = BlockMetadata {
            llm_request_count: 2,
            llm_tokens_used: 100,
        };
        m.record_llm_call(15);
        assert_eq!(m.llm_request_count, 3);
        assert_eq!(m.llm_tokens_used, 115);
    }

    #[test]
    fn zero_metadata_is_omitted_from_serialization() {
        let b = Block::new(BlockType::Text, BBox::default());
        let json = serde_json::to_string(&b).unwrap();
        assert!(!json.contains("llm_request_count"));
    }

    #[test]
    fn vertical_overlap_fraction() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(0.0, 5.0, 10.0, 15.0);
        assert!((a.vertical_overlap(&b) - 0.5).abs() < f32::EPSILON);
        let far = BBox::new(0.0, 20.0, 10.0, 30.0);
        assert_eq!(a.vertical_overlap(&far), 0.0);
    }
}
