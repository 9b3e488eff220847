use std::sync::Arc;

use crate::citations::CitationStyle;
use crate::markdown::{FigureRef, Span};

/// Format-neutral document tree handed to a serializer.
#[derive(Debug, Clone)]
pub struct CompiledDocument {
    pub title: String,
    pub style: CitationStyle,
    pub sections: Vec<Section>,
    /// Payloads referenced by the `image` index of figure nodes.
    pub images: Vec<EmbeddedImage>,
    /// Placeholders rendered as fallback text, in first-seen order.
    pub missing_figures: Vec<FigureRef>,
}

impl CompiledDocument {
    pub fn chapters(&self) -> impl Iterator<Item = &Section> {
        self.sections
            .iter()
            .filter(|section| matches!(section.kind, SectionKind::Chapter { .. }))
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|section| section.kind == kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    TableOfContents,
    Chapter { number: u32 },
    References,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub kind: SectionKind,
    pub title: String,
    pub nodes: Vec<ContentNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentNode {
    Heading { level: u8, spans: Vec<Span> },
    Paragraph { spans: Vec<Span> },
    Bullet { spans: Vec<Span> },
    Numbered { number: u32, spans: Vec<Span> },
    TableRow { cells: Vec<Vec<Span>>, header: bool },
    Figure {
        figure: FigureRef,
        image: usize,
        caption: String,
    },
}

impl ContentNode {
    pub fn paragraph(text: impl Into<String>) -> Self {
        ContentNode::Paragraph {
            spans: vec![Span::plain(text)],
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub bytes: Arc<Vec<u8>>,
    pub content_type: String,
    pub extension: String,
    pub width: u32,
    pub height: u32,
}

/// Text substituted for a figure whose image cannot be resolved.
pub fn figure_fallback_text(figure: FigureRef) -> String {
    format!("[Figure {figure} — image not available]")
}

/// Caption line rendered under an embedded figure.
pub fn figure_caption(figure: FigureRef, caption: &str) -> String {
    let caption = caption.trim();
    if caption.is_empty() {
        format!("Figure {figure}")
    } else {
        format!("Figure {figure}: {caption}")
    }
}
