use serde::{Deserialize, Serialize};

/// A run of text with uniform emphasis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            italic: false,
        }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: true,
        }
    }
}

/// Splits one line into plain, bold (`**x**`) and italic (`*x*`) spans.
///
/// Markers that never close are kept as literal text. Consecutive plain
/// text is emitted as a single span.
pub fn format_inline(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut plain = String::new();
    let mut rest = line;

    while let Some(pos) = rest.find('*') {
        plain.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(inner) = tail.strip_prefix("**") {
            match inner.find("**") {
                Some(end) if end > 0 => {
                    flush_plain(&mut spans, &mut plain);
                    spans.push(Span::bold(&inner[..end]));
                    rest = &inner[end + 2..];
                }
                _ => {
                    plain.push_str("**");
                    rest = inner;
                }
            }
            continue;
        }

        let inner = &tail[1..];
        match italic_end(inner) {
            Some(end) => {
                flush_plain(&mut spans, &mut plain);
                spans.push(Span::italic(&inner[..end]));
                rest = &inner[end + 1..];
            }
            None => {
                plain.push('*');
                rest = inner;
            }
        }
    }

    plain.push_str(rest);
    flush_plain(&mut spans, &mut plain);
    spans
}

/// Concatenates span text, dropping emphasis.
pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}

/// Closing position of a single-asterisk italic run starting at `inner`.
fn italic_end(inner: &str) -> Option<usize> {
    let end = inner.find('*')?;
    if end == 0 {
        return None;
    }
    let content = &inner[..end];
    let padded = content.starts_with(char::is_whitespace) || content.ends_with(char::is_whitespace);
    if padded {
        None
    } else {
        Some(end)
    }
}

fn flush_plain(spans: &mut Vec<Span>, plain: &mut String) {
    if !plain.is_empty() {
        spans.push(Span::plain(std::mem::take(plain)));
    }
}
