use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::registry::Reference;
use super::style::{CitationFormat, CitationStyle, EntryFormat};

static NUMBERED_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d+)\]\s+(.+)$").expect("numbered entry pattern"));
static INITIALS_THEN_SURNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\p{Lu}\.[\s\-]*)+(\p{Lu}[\p{L}'\-]+)").expect("initials pattern")
});
static LEADING_NAME_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\p{Lu}[\p{L}'\-]+(?:\s+\p{Lu}[\p{L}'\-]+)*)").expect("name sequence pattern")
});
static FIRST_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("year pattern"));
static AUTHOR_DATE_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((\d{4})([a-z]?)[),]|,\s*(\d{4})([a-z]?)\b").expect("author-date year pattern")
});
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*]\s+|\d+\.\s+)").expect("list marker pattern"));
static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]+)\)").expect("parenthetical pattern"));
static AUTHOR_YEAR_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\p{Lu}[^,;()]*?),?\s+(\d{4})[a-z]?\b").expect("author-year pattern")
});
static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d+(?:\s*[,\u{2013}\-]\s*\d+)*)\]").expect("bracketed citation pattern")
});

/// A chapter body separated from its trailing reference list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterText {
    /// Everything except the reference block.
    pub body: String,
    /// Lines between the References heading and the next `#`/`##` heading.
    pub references: Option<String>,
}

/// Splits off the `## References` / `# References` block (case-insensitive).
pub fn split_reference_section(text: &str) -> ChapterText {
    let mut body = Vec::new();
    let mut references: Option<Vec<&str>> = None;
    let mut inside = false;

    for line in text.lines() {
        if is_reference_heading(line) {
            inside = true;
            references.get_or_insert_with(Vec::new);
            continue;
        }
        if inside && is_section_heading(line) {
            inside = false;
        }
        if inside {
            if let Some(section) = references.as_mut() {
                section.push(line);
            }
        } else {
            body.push(line);
        }
    }

    ChapterText {
        body: body.join("\n"),
        references: references.map(|lines| lines.join("\n")),
    }
}

fn is_reference_heading(line: &str) -> bool {
    let lowered = line.trim_start().to_lowercase();
    lowered.starts_with("## references") || lowered.starts_with("# references")
}

fn is_section_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("# ") || trimmed.starts_with("## ")
}

/// Extracts reference records from a reference-list block.
///
/// Lines that cannot be understood are skipped; this never fails.
pub fn parse_references(style: CitationStyle, section: &str, chapter: u32) -> Vec<Reference> {
    let Some(rules) = style.rules() else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    section
        .lines()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .filter_map(|raw| {
            let line = strip_list_marker(raw);
            if line.chars().count() < rules.min_entry_len {
                log::debug!("Skipping short reference line in chapter {chapter}: {line}");
                return None;
            }
            let parsed = match rules.entries {
                EntryFormat::Numbered => parse_numbered_entry(raw, line, chapter),
                EntryFormat::AuthorDate => parse_author_date_entry(raw, line, chapter),
            };
            if parsed.is_none() {
                log::debug!("Discarding unparsable reference line in chapter {chapter}: {line}");
            }
            parsed
        })
        .filter(|reference| seen.insert(reference.key.clone()))
        .collect()
}

/// The entry text of a reference-list line, without a leading `- ` or `1. `.
pub(crate) fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim();
    match LIST_MARKER.find(trimmed) {
        Some(marker) if !trimmed.starts_with('[') => trimmed[marker.end()..].trim(),
        _ => trimmed,
    }
}

fn parse_numbered_entry(raw: &str, line: &str, chapter: u32) -> Option<Reference> {
    let caps = NUMBERED_ENTRY.captures(line)?;
    let label = caps.get(1)?.as_str();
    let entry = caps.get(2)?.as_str().trim();
    let key = fingerprint(entry);
    if key.is_empty() {
        return None;
    }
    let author = INITIALS_THEN_SURNAME
        .captures(entry)
        .or_else(|| LEADING_NAME_SEQUENCE.captures(entry))
        .and_then(|caps| caps.get(1))
        .map(|m| first_word(m.as_str()).to_string());
    let year = FIRST_YEAR
        .captures(entry)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    Some(
        Reference::new(format!("ieee:{key}"), raw, chapter)
            .with_author(author)
            .with_year(year)
            .with_source_label(label),
    )
}

fn parse_author_date_entry(raw: &str, line: &str, chapter: u32) -> Option<Reference> {
    let author = LEADING_NAME_SEQUENCE
        .captures(line)?
        .get(1)?
        .as_str()
        .to_string();
    let caps = AUTHOR_DATE_YEAR.captures(line)?;
    let year = caps.get(1).or_else(|| caps.get(3))?.as_str().to_string();
    let suffix = caps
        .get(2)
        .or_else(|| caps.get(4))
        .map(|m| m.as_str())
        .unwrap_or_default();
    let key = format!("{author}{year}{suffix}");
    Some(
        Reference::new(key, raw, chapter)
            .with_author(Some(author))
            .with_year(Some(year)),
    )
}

/// Lowercased alphanumeric content, used to recognise the same numbered entry across chapters.
fn fingerprint(entry: &str) -> String {
    entry
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or(text)
}

/// An in-text citation found in chapter prose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InTextCitation {
    AuthorDate { author: String, year: String },
    Numeric(u32),
}

/// Finds citation markers in a chapter body for diagnostics.
pub fn extract_in_text_citations(style: CitationStyle, body: &str) -> Vec<InTextCitation> {
    let Some(rules) = style.rules() else {
        return Vec::new();
    };
    match rules.citations {
        CitationFormat::Parenthetical => PARENTHETICAL
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .flat_map(|group| group.as_str().split(';'))
            .filter_map(|part| {
                let caps = AUTHOR_YEAR_PART.captures(part)?;
                Some(InTextCitation::AuthorDate {
                    author: caps.get(1)?.as_str().trim().to_string(),
                    year: caps.get(2)?.as_str().to_string(),
                })
            })
            .collect(),
        CitationFormat::Bracketed => BRACKETED
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .flat_map(|group| expand_numbers(group.as_str()))
            .map(InTextCitation::Numeric)
            .collect(),
    }
}

fn expand_numbers(list: &str) -> Vec<u32> {
    let mut numbers = Vec::new();
    for part in list.split(',') {
        let bounds: Vec<u32> = part
            .split(|c| c == '-' || c == '\u{2013}')
            .filter_map(|n| n.trim().parse().ok())
            .collect();
        match bounds.as_slice() {
            [single] => numbers.push(*single),
            [start, end] if start <= end && end - start < 100 => numbers.extend(*start..=*end),
            _ => {}
        }
    }
    numbers
}

/// Mismatches between a chapter's in-text citations and its reference list.
pub fn citation_drift(
    style: CitationStyle,
    body: &str,
    references: &[Reference],
) -> Vec<String> {
    let citations = extract_in_text_citations(style, body);
    let mut warnings = Vec::new();
    let mut cited_keys = HashSet::new();

    for citation in dedup(citations) {
        let matched = references.iter().find(|reference| match &citation {
            InTextCitation::AuthorDate { author, year } => {
                let surname = first_word(author).to_lowercase();
                reference.year.as_deref() == Some(year.as_str())
                    && reference
                        .author
                        .as_deref()
                        .map(|a| first_word(a).to_lowercase() == surname)
                        .unwrap_or(false)
            }
            InTextCitation::Numeric(n) => {
                reference.source_label.as_deref() == Some(n.to_string().as_str())
            }
        });
        match matched {
            Some(reference) => {
                cited_keys.insert(reference.key.clone());
            }
            None => warnings.push(match &citation {
                InTextCitation::AuthorDate { author, year } => {
                    format!("Citation ({author}, {year}) has no matching reference entry")
                }
                InTextCitation::Numeric(n) => {
                    format!("Citation [{n}] has no matching reference entry")
                }
            }),
        }
    }

    for reference in references {
        if !cited_keys.contains(&reference.key) {
            warnings.push(format!(
                "Reference '{}' is never cited in the chapter text",
                strip_list_marker(&reference.raw_text)
            ));
        }
    }
    warnings
}

fn dedup(citations: Vec<InTextCitation>) -> Vec<InTextCitation> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|citation| seen.insert(citation.clone()))
        .collect()
}
