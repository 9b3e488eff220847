//! Line-oriented reader for the markdown dialect chapters are written in.
//!
//! Only what the content source emits is understood: `##`–`####` headings,
//! bullet and numbered items, pipe tables, `{{figureN.M}}` placeholders and
//! `**bold**` / `*italic*` spans. Anything else is a paragraph.

pub mod blocks;
pub mod inline;

pub use blocks::{
    classify, classify_chapter, figure_placeholders, strip_figure_tokens, BlockKind, FigureRef,
};
pub use inline::{format_inline, plain_text, Span};
