use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static FIGURE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{figure(\d+)\.(\d+)\}\}").expect("figure token pattern"));

/// Chapter/figure coordinates carried by a `{{figureN.M}}` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FigureRef {
    pub chapter: u32,
    pub figure: u32,
}

impl FigureRef {
    pub fn new(chapter: u32, figure: u32) -> Self {
        Self { chapter, figure }
    }

    /// Identifier assets are registered under, e.g. `figure3.2`.
    pub fn placeholder_id(&self) -> String {
        format!("figure{}.{}", self.chapter, self.figure)
    }
}

impl fmt::Display for FigureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.chapter, self.figure)
    }
}

/// Structural kind of one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Levels 1..=3; both `#` and `##` map to level 1.
    Heading { level: u8, text: String },
    Bullet { text: String },
    NumberedItem { number: u32, text: String },
    TableRow { cells: Vec<String>, separator: bool },
    FigurePlaceholder { figure: FigureRef },
    Blank,
    Paragraph { text: String },
}

const HEADING_MARKERS: [(&str, u8); 4] = [("#### ", 3), ("### ", 2), ("## ", 1), ("# ", 1)];

/// Classifies a single line. First matching rule wins.
pub fn classify(line: &str) -> BlockKind {
    let trimmed = line.trim_start();

    for (marker, level) in HEADING_MARKERS {
        if let Some(text) = trimmed.strip_prefix(marker) {
            return BlockKind::Heading {
                level,
                text: text.trim().to_string(),
            };
        }
    }

    if let Some(text) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
    {
        return BlockKind::Bullet {
            text: text.trim().to_string(),
        };
    }

    if let Some((number, text)) = numbered_item(trimmed) {
        return BlockKind::NumberedItem {
            number,
            text: text.trim().to_string(),
        };
    }

    if trimmed.starts_with('|') {
        return BlockKind::TableRow {
            cells: table_cells(trimmed),
            separator: is_separator_row(trimmed),
        };
    }

    if let Some(figure) = figure_placeholders(trimmed).into_iter().next() {
        return BlockKind::FigurePlaceholder { figure };
    }

    if trimmed.is_empty() {
        return BlockKind::Blank;
    }

    BlockKind::Paragraph {
        text: line.trim().to_string(),
    }
}

/// Classifies a chapter body, dropping the first level-1 heading.
///
/// The content source repeats the chapter heading inline; the title is
/// rendered from chapter metadata instead.
pub fn classify_chapter(body: &str) -> Vec<(BlockKind, &str)> {
    let mut suppressed = false;
    let mut blocks = Vec::new();
    for line in body.lines() {
        let kind = classify(line);
        if !suppressed && matches!(kind, BlockKind::Heading { level: 1, .. }) {
            suppressed = true;
            continue;
        }
        blocks.push((kind, line));
    }
    blocks
}

/// Every `{{figureN.M}}` token in the line, in order of appearance.
pub fn figure_placeholders(line: &str) -> Vec<FigureRef> {
    FIGURE_TOKEN
        .captures_iter(line)
        .filter_map(|caps| {
            let chapter = caps.get(1)?.as_str().parse().ok()?;
            let figure = caps.get(2)?.as_str().parse().ok()?;
            Some(FigureRef::new(chapter, figure))
        })
        .collect()
}

/// The line with all figure tokens removed and whitespace collapsed.
pub fn strip_figure_tokens(line: &str) -> String {
    FIGURE_TOKEN
        .replace_all(line, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn numbered_item(line: &str) -> Option<(u32, &str)> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let text = line[digits..].strip_prefix(". ")?;
    let number = line[..digits].parse().ok()?;
    Some((number, text))
}

fn table_cells(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|');
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn is_separator_row(line: &str) -> bool {
    let line = line.trim();
    line.contains('-') && line.chars().all(|c| matches!(c, '-' | '|' | ':' | ' '))
}
