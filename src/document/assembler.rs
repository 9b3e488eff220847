//! Turns stored chapters, the compiled reference list and resolved figures
//! into a [`CompiledDocument`].

use std::collections::HashMap;

use anyhow::Result;

use super::model::{
    figure_caption, figure_fallback_text, CompiledDocument, ContentNode, EmbeddedImage, Section,
    SectionKind,
};
use crate::citations::{split_reference_section, CitationStyle, CompiledReference};
use crate::error::ExportError;
use crate::figures::{ImageResolver, Resolution};
use crate::markdown::{
    classify_chapter, figure_placeholders, format_inline, strip_figure_tokens, BlockKind,
    FigureRef, Span,
};
use crate::writing::Chapter;

pub const TABLE_OF_CONTENTS_TITLE: &str = "Table of Contents";
pub const REFERENCES_TITLE: &str = "References";

pub struct AssemblyRequest<'a> {
    pub title: &'a str,
    pub style: CitationStyle,
    pub chapters: &'a [Chapter],
    pub missing_content_text: &'a str,
}

struct PlacedFigure {
    image: usize,
    caption: String,
}

#[derive(Default)]
struct FigureTable {
    order: Vec<FigureRef>,
    placed: HashMap<FigureRef, Option<PlacedFigure>>,
}

pub fn assemble(
    request: &AssemblyRequest<'_>,
    references: &[CompiledReference],
    resolver: &ImageResolver,
) -> Result<CompiledDocument> {
    if request.chapters.is_empty() {
        return Err(ExportError::MissingChapters.into());
    }

    let mut chapters: Vec<&Chapter> = request.chapters.iter().collect();
    chapters.sort_by_key(|chapter| chapter.number);

    let bodies: Vec<Option<String>> = chapters
        .iter()
        .map(|chapter| {
            chapter
                .body_markdown
                .as_deref()
                .filter(|body| !body.trim().is_empty())
                .map(|body| split_reference_section(body).body)
        })
        .collect();

    let (figures, images) = resolve_figures(&bodies, resolver)?;
    let missing_figures = figures
        .order
        .iter()
        .filter(|figure| matches!(figures.placed.get(*figure), Some(None)))
        .copied()
        .collect();

    let mut sections = Vec::with_capacity(chapters.len() + 2);
    sections.push(Section {
        kind: SectionKind::TableOfContents,
        title: TABLE_OF_CONTENTS_TITLE.to_string(),
        nodes: chapters
            .iter()
            .map(|chapter| ContentNode::paragraph(chapter_heading(chapter)))
            .collect(),
    });

    for (chapter, body) in chapters.iter().zip(&bodies) {
        let mut nodes = body
            .as_deref()
            .map(|body| chapter_nodes(body, &figures))
            .unwrap_or_default();
        if nodes.is_empty() {
            nodes.push(ContentNode::paragraph(request.missing_content_text));
        }
        sections.push(Section {
            kind: SectionKind::Chapter {
                number: chapter.number,
            },
            title: chapter_heading(chapter),
            nodes,
        });
    }

    if request.style.rules().is_some() && !references.is_empty() {
        sections.push(Section {
            kind: SectionKind::References,
            title: REFERENCES_TITLE.to_string(),
            nodes: references
                .iter()
                .map(|entry| ContentNode::paragraph(entry.display_text(request.style)))
                .collect(),
        });
    }

    Ok(CompiledDocument {
        title: request.title.to_string(),
        style: request.style,
        sections,
        images,
        missing_figures,
    })
}

/// `Chapter N: Title`, unless the title already names the chapter.
fn chapter_heading(chapter: &Chapter) -> String {
    let title = chapter.title.trim();
    let names_chapter = title
        .to_lowercase()
        .strip_prefix("chapter")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace));
    if names_chapter {
        title.to_string()
    } else {
        format!("Chapter {}: {}", chapter.number, title)
    }
}

fn resolve_figures(
    bodies: &[Option<String>],
    resolver: &ImageResolver,
) -> Result<(FigureTable, Vec<EmbeddedImage>)> {
    let mut wanted: Vec<FigureRef> = Vec::new();
    for body in bodies.iter().flatten() {
        for (kind, line) in classify_chapter(body) {
            if !matches!(kind, BlockKind::FigurePlaceholder { .. }) {
                continue;
            }
            for figure in figure_placeholders(line) {
                if !wanted.contains(&figure) {
                    wanted.push(figure);
                }
            }
        }
    }

    let mut table = FigureTable::default();
    let mut images = Vec::new();
    for (figure, resolution) in wanted.iter().zip(resolver.resolve_all(&wanted)?) {
        let placed = match resolution {
            Resolution::Found(resolved) => {
                images.push(EmbeddedImage {
                    bytes: resolved.bytes,
                    content_type: resolved.content_type,
                    extension: resolved.extension,
                    width: resolved.width,
                    height: resolved.height,
                });
                Some(PlacedFigure {
                    image: images.len() - 1,
                    caption: figure_caption(*figure, &resolved.asset.caption),
                })
            }
            Resolution::Missing => None,
        };
        table.placed.insert(*figure, placed);
    }
    table.order = wanted;
    Ok((table, images))
}

fn chapter_nodes(body: &str, figures: &FigureTable) -> Vec<ContentNode> {
    let mut nodes = Vec::new();
    let mut in_table = false;

    for (kind, line) in classify_chapter(body) {
        let is_table_row = matches!(kind, BlockKind::TableRow { .. });
        match kind {
            BlockKind::Heading { level, text } => nodes.push(ContentNode::Heading {
                level,
                spans: format_inline(&text),
            }),
            BlockKind::Bullet { text } => nodes.push(ContentNode::Bullet {
                spans: format_inline(&text),
            }),
            BlockKind::NumberedItem { number, text } => nodes.push(ContentNode::Numbered {
                number,
                spans: format_inline(&text),
            }),
            BlockKind::TableRow {
                separator: true, ..
            } => {}
            BlockKind::TableRow { cells, .. } => nodes.push(ContentNode::TableRow {
                cells: cells.iter().map(|cell| format_inline(cell)).collect(),
                header: !in_table,
            }),
            BlockKind::FigurePlaceholder { .. } => {
                let text = strip_figure_tokens(line);
                if !text.is_empty() {
                    nodes.push(ContentNode::Paragraph {
                        spans: format_inline(&text),
                    });
                }
                for figure in figure_placeholders(line) {
                    nodes.push(match figures.placed.get(&figure) {
                        Some(Some(placed)) => ContentNode::Figure {
                            figure,
                            image: placed.image,
                            caption: placed.caption.clone(),
                        },
                        _ => ContentNode::Paragraph {
                            spans: vec![Span::italic(figure_fallback_text(figure))],
                        },
                    });
                }
            }
            BlockKind::Blank => {}
            BlockKind::Paragraph { text } => nodes.push(ContentNode::Paragraph {
                spans: format_inline(&text),
            }),
        }
        in_table = is_table_row;
    }
    nodes
}
