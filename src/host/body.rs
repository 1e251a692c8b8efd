//! Parsed configuration bodies: attributes and nested blocks.

use super::expr::Expression;
use super::range::SourceRange;

/// `name = expr` inside a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub expr: Expression,
    pub range: SourceRange,
}

impl Attribute {
    pub fn new(name: impl Into<String>, expr: Expression, range: SourceRange) -> Self {
        Attribute {
            name: name.into(),
            expr,
            range,
        }
    }
}

/// `type "label" ... { body }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub block_type: String,
    pub labels: Vec<String>,
    pub body: Body,
    /// The block header, used as the subject of block-level diagnostics.
    pub def_range: SourceRange,
}

impl Block {
    pub fn new(
        block_type: impl Into<String>,
        labels: Vec<String>,
        body: Body,
        def_range: SourceRange,
    ) -> Self {
        Block {
            block_type: block_type.into(),
            labels,
            body,
            def_range,
        }
    }
}

/// An ordered set of attributes and blocks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<Block>,
}

impl Body {
    pub fn new() -> Self {
        Body::default()
    }

    pub fn with_attribute(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.blocks.is_empty()
    }
}
