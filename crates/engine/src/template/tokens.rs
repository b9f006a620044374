//! Placeholder tokenizer.
//!
//! Splits a template string into an ordered list of literal-text and
//! `{{ dotted.path }}` placeholder segments with a single left-to-right
//! scan. Anything between braces that is not a dotted path stays literal
//! text, as does an unterminated `{{`.

/// One segment of a tokenized template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// A `{{ path }}` placeholder.
    Placeholder {
        /// The dotted path, split into segments.
        path: Vec<String>,
        /// The original placeholder text, used verbatim when unresolved.
        raw: String,
    },
}

/// Tokenize a template string into ordered segments.
pub fn parse_segments(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        literal.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        let Some(close) = after_open.find("}}") else {
            // Unterminated open brace: the remainder is literal text.
            literal.push_str(&rest[open..]);
            rest = "";
            break;
        };

        let inner = &after_open[..close];
        let raw = &rest[open..open + 2 + close + 2];

        match parse_path(inner) {
            Some(path) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder {
                    path,
                    raw: raw.to_string(),
                });
            }
            None => literal.push_str(raw),
        }

        rest = &after_open[close + 2..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    segments
}

/// Parse the inside of a placeholder as a dotted path.
///
/// Returns `None` when the content is not a plain path (empty, embedded
/// whitespace or braces within a segment).
fn parse_path(inner: &str) -> Option<Vec<String>> {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut path = Vec::new();
    for segment in trimmed.split('.') {
        if segment.is_empty()
            || segment.contains(char::is_whitespace)
            || segment.contains(['{', '}'])
        {
            return None;
        }
        path.push(segment.to_string());
    }
    Some(path)
}

/// If the template is exactly one placeholder (no surrounding literals),
/// return its path.
pub fn whole_placeholder(segments: &[Segment]) -> Option<&[String]> {
    match segments {
        [Segment::Placeholder { path, .. }] => Some(path),
        _ => None,
    }
}
