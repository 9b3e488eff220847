use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExportError;

/// Citation conventions a project can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    #[default]
    Apa,
    Harvard,
    Ieee,
    None,
}

/// Shape of one line in a reference list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFormat {
    /// `[n] Author, "Title," ...`
    Numbered,
    /// `Author, A. (2020). Title ...`
    AuthorDate,
}

/// Shape of an in-text citation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationFormat {
    /// `[3]`, `[1, 4]`, `[2-5]`
    Bracketed,
    /// `(Okafor, 2020)` or `(Okafor 2020)`
    Parenthetical,
}

/// How the compiled reference list is ordered and labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceOrdering {
    /// Ascending first-use chapter; entries relabelled `[1]..[n]`.
    FirstUse,
    /// Case-insensitive by author surname; keys are kept as labels.
    Alphabetical,
}

/// Everything style-specific the parser and registry need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleRules {
    pub entries: EntryFormat,
    pub citations: CitationFormat,
    pub ordering: ReferenceOrdering,
    /// Reference lines shorter than this are treated as noise.
    pub min_entry_len: usize,
}

const NUMERIC_RULES: StyleRules = StyleRules {
    entries: EntryFormat::Numbered,
    citations: CitationFormat::Bracketed,
    ordering: ReferenceOrdering::FirstUse,
    min_entry_len: 0,
};

const AUTHOR_DATE_RULES: StyleRules = StyleRules {
    entries: EntryFormat::AuthorDate,
    citations: CitationFormat::Parenthetical,
    ordering: ReferenceOrdering::Alphabetical,
    min_entry_len: 20,
};

impl CitationStyle {
    pub const ALL: [CitationStyle; 4] = [
        CitationStyle::Apa,
        CitationStyle::Harvard,
        CitationStyle::Ieee,
        CitationStyle::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CitationStyle::Apa => "apa",
            CitationStyle::Harvard => "harvard",
            CitationStyle::Ieee => "ieee",
            CitationStyle::None => "none",
        }
    }

    /// Rules for this style, or `None` when references are not tracked at all.
    pub fn rules(&self) -> Option<StyleRules> {
        match self {
            CitationStyle::Ieee => Some(NUMERIC_RULES),
            CitationStyle::Apa | CitationStyle::Harvard => Some(AUTHOR_DATE_RULES),
            CitationStyle::None => None,
        }
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CitationStyle {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        CitationStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == normalized)
            .ok_or_else(|| ExportError::unknown_style(value))
    }
}
