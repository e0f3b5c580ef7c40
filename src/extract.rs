//! Lightweight structured parsing of markdown-like artifact documents.
//!
//! Every artifact source uses the same anchor-to-next-heading convention:
//! a section starts at a known `## Heading` line and runs until the next
//! heading of the same level or end of input. The helpers here make the
//! edge cases explicit — missing heading, empty body, unclosed code fence
//! — instead of leaving them to incidental regex behavior.

/// Content of the `## <heading>` section, up to the next `## ` heading.
///
/// Returns `None` when the heading is absent and `Some` (possibly empty,
/// trimmed) when it is present with no body.
pub fn section<'a>(content: &'a str, heading: &str) -> Option<&'a str> {
    section_at_level(content, heading, "## ")
}

/// Content of a `### <heading>` sub-section, up to the next `### ` or
/// `## ` heading.
pub fn subsection<'a>(content: &'a str, heading: &str) -> Option<&'a str> {
    section_at_level(content, heading, "### ")
}

fn section_at_level<'a>(content: &'a str, heading: &str, marker: &str) -> Option<&'a str> {
    let anchor = format!("{}{}", marker, heading);
    let mut offset = 0;

    for line in content.lines() {
        let line_start = offset;
        offset += line.len() + 1;
        if line.trim_end() != anchor {
            continue;
        }

        let body_start = (line_start + line.len() + 1).min(content.len());
        let body = &content[body_start..];

        // The body ends at the next heading of this level or a higher one.
        let mut end = body.len();
        let mut scan = 0;
        for body_line in body.lines() {
            if body_line.starts_with(marker)
                || (marker == "### " && body_line.starts_with("## "))
            {
                end = scan;
                break;
            }
            scan += body_line.len() + 1;
        }

        return Some(body[..end.min(body.len())].trim());
    }

    None
}

/// All complete fenced code blocks in `text`, fence markers stripped.
///
/// An opening fence without a closing one yields no block: a truncated
/// artifact must not contribute a half-captured error.
pub fn fenced_blocks(text: &str) -> Vec<String> {
    enum State {
        Outside,
        Inside(Vec<String>),
    }

    let mut state = State::Outside;
    let mut blocks = Vec::new();

    for line in text.lines() {
        let is_fence = line.trim_start().starts_with("```");
        state = match (state, is_fence) {
            (State::Outside, true) => State::Inside(Vec::new()),
            (State::Outside, false) => State::Outside,
            (State::Inside(lines), true) => {
                blocks.push(lines.join("\n").trim().to_string());
                State::Outside
            }
            (State::Inside(mut lines), false) => {
                lines.push(line.to_string());
                State::Inside(lines)
            }
        };
    }

    blocks.retain(|b| !b.is_empty());
    blocks
}

/// `###`-or-`##` titled blocks inside a section, as (title, body) pairs.
///
/// Text before the first heading belongs to no block and is dropped.
pub fn titled_blocks(text: &str) -> Vec<(String, String)> {
    let mut blocks: Vec<(String, String)> = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in text.lines() {
        let heading = line
            .strip_prefix("### ")
            .or_else(|| line.strip_prefix("## "));
        if let Some(title) = heading {
            if let Some((title, body)) = current.take() {
                blocks.push((title, body.trim().to_string()));
            }
            current = Some((title.trim().to_string(), String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }

    if let Some((title, body)) = current {
        blocks.push((title, body.trim().to_string()));
    }

    blocks.retain(|(title, body)| !title.is_empty() && !body.is_empty());
    blocks
}

/// Extract the resolved-question text from a ledger line, if the line is
/// marked resolved with a checked box (`- [x] ...`) or strikethrough
/// (`- ~~...~~`).
pub fn resolved_item(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix('-')?.trim_start();

    let checked = rest
        .get(..3)
        .map_or(false, |p| p.eq_ignore_ascii_case("[x]"));
    if checked {
        let text = rest[3..].replace("~~", "");
        let text = text.trim();
        return (!text.is_empty()).then(|| text.to_string());
    }

    if rest.starts_with("~~") {
        let text = rest.trim_matches('~').trim();
        return (!text.is_empty()).then(|| text.to_string());
    }

    None
}

/// First line of a text, trimmed.
pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
