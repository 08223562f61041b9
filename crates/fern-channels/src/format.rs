use crate::types::ChannelCapabilities;

/// Render `content` into one or more strings ready to send over a channel
/// with the given `capabilities`.
///
/// When the target doesn't render markdown, markup is stripped to plain
/// text first. The result is then chunked to `max_message_length`: whole if
/// it fits, otherwise split on paragraph boundaries, with any paragraph
/// still too long split further on sentence boundaries. A paragraph that
/// resists even that split is sent whole as one oversize chunk — delivering
/// something intact beats silently truncating it.
pub fn format_for_channel(content: &str, capabilities: &ChannelCapabilities) -> Vec<String> {
    let rendered = if capabilities.markdown {
        content.to_string()
    } else {
        strip_markdown(content)
    };

    if rendered.chars().count() <= capabilities.max_message_length {
        return vec![rendered];
    }

    chunk(&rendered, capabilities.max_message_length)
}

/// Strip markdown markup down to its inner text, platform-agnostically:
/// code fences keep their contents, inline code loses its backticks,
/// bold/italic markers are removed, ATX headers become plain title lines,
/// links become `text (url)`, and horizontal rules collapse to nothing.
fn strip_markdown(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut in_fence = false;

    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        if is_horizontal_rule(trimmed) {
            continue;
        }

        let line = strip_atx_header(line);
        let line = strip_links(&line);
        let line = strip_emphasis(&line);
        let line = strip_inline_code(&line);

        out.push_str(&line);
        out.push('\n');
    }

    // Drop the trailing newline `lines()` reconstruction always adds.
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

fn is_horizontal_rule(trimmed: &str) -> bool {
    let cleaned: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    cleaned.len() >= 3
        && (cleaned.chars().all(|c| c == '-') || cleaned.chars().all(|c| c == '*') || cleaned.chars().all(|c| c == '_'))
}

fn strip_atx_header(line: &str) -> String {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return line.to_string();
    }
    match trimmed.as_bytes().get(hashes) {
        Some(b' ') | None => trimmed[hashes..].trim_start().to_string(),
        _ => line.to_string(),
    }
}

/// `[text](url)` → `text (url)`.
fn strip_links(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(bracket) = rest.find('[') {
        let (before, after_bracket) = rest.split_at(bracket);
        out.push_str(before);
        let after_bracket = &after_bracket[1..];

        let Some(close) = after_bracket.find(']') else {
            out.push('[');
            rest = after_bracket;
            continue;
        };
        let (text, after_text) = after_bracket.split_at(close);
        let after_text = &after_text[1..];

        if !after_text.starts_with('(') {
            out.push('[');
            out.push_str(text);
            out.push(']');
            rest = after_text;
            continue;
        }
        let after_paren = &after_text[1..];
        let Some(paren_close) = after_paren.find(')') else {
            out.push('[');
            out.push_str(text);
            out.push(']');
            out.push('(');
            rest = after_paren;
            continue;
        };
        let (url, after_url) = after_paren.split_at(paren_close);
        let after_url = &after_url[1..];

        out.push_str(text);
        out.push_str(" (");
        out.push_str(url);
        out.push(')');
        rest = after_url;
    }
    out.push_str(rest);
    out
}

/// `**bold**`, `__bold__`, `*italic*`, `_italic_` → inner text.
fn strip_emphasis(line: &str) -> String {
    let mut result = line.to_string();
    for marker in ["**", "__"] {
        result = strip_paired_marker(&result, marker);
    }
    for marker in ["*", "_"] {
        result = strip_paired_marker(&result, marker);
    }
    result
}

fn strip_paired_marker(line: &str, marker: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    loop {
        match rest.find(marker) {
            Some(start) => {
                let after_start = &rest[start + marker.len()..];
                match after_start.find(marker) {
                    Some(end) => {
                        out.push_str(&rest[..start]);
                        out.push_str(&after_start[..end]);
                        rest = &after_start[end + marker.len()..];
                    }
                    None => {
                        out.push_str(rest);
                        rest = "";
                        break;
                    }
                }
            }
            None => {
                out.push_str(rest);
                rest = "";
                break;
            }
        }
    }
    if !rest.is_empty() {
        out.push_str(rest);
    }
    out
}

fn strip_inline_code(line: &str) -> String {
    strip_paired_marker(line, "`")
}

/// Greedily pack paragraphs (blank-line separated) into chunks no longer
/// than `limit`. A paragraph longer than `limit` is split on sentence
/// boundaries; a single sentence still longer than `limit` is emitted as
/// its own oversize chunk rather than cut mid-word.
fn chunk(content: &str, limit: usize) -> Vec<String> {
    let paragraphs: Vec<&str> = content.split("\n\n").collect();
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        let pieces = if paragraph.chars().count() > limit {
            split_sentences(paragraph, limit)
        } else {
            vec![paragraph.to_string()]
        };

        for piece in pieces {
            let would_be = if current.is_empty() {
                piece.chars().count()
            } else {
                current.chars().count() + 2 + piece.chars().count()
            };

            if would_be <= limit || current.is_empty() {
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(&piece);
                if would_be > limit {
                    // Oversize piece that could not be split further; flush
                    // it alone rather than keep packing onto it.
                    chunks.push(std::mem::take(&mut current));
                }
            } else {
                chunks.push(std::mem::take(&mut current));
                current.push_str(&piece);
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split `paragraph` on sentence boundaries (`.`, `!`, `?` followed by
/// whitespace), greedily packing sentences up to `limit`. A sentence that
/// alone exceeds `limit` is kept whole.
fn split_sentences(paragraph: &str, limit: usize) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<char> = paragraph.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if matches!(chars[i], '.' | '!' | '?') {
            let mut end = i + 1;
            if end < chars.len() && chars[end].is_whitespace() {
                end += 1;
                sentences.push(chars[start..end].iter().collect::<String>());
                start = end;
                i = end;
                continue;
            }
        }
        i += 1;
    }
    if start < chars.len() {
        sentences.push(chars[start..].iter().collect::<String>());
    }
    if sentences.is_empty() {
        sentences.push(paragraph.to_string());
    }

    let mut packed = Vec::new();
    let mut current = String::new();
    for sentence in sentences {
        let trimmed = sentence.trim();
        if trimmed.is_empty() {
            continue;
        }
        let would_be = if current.is_empty() {
            trimmed.chars().count()
        } else {
            current.chars().count() + 1 + trimmed.chars().count()
        };
        if would_be <= limit || current.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(trimmed);
        } else {
            packed.push(std::mem::take(&mut current));
            current.push_str(trimmed);
        }
    }
    if !current.is_empty() {
        packed.push(current);
    }
    packed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(markdown: bool, max_len: usize) -> ChannelCapabilities {
        ChannelCapabilities {
            markdown,
            streaming: false,
            max_message_length: max_len,
            supports_attachments: false,
            supports_reply: false,
        }
    }

    #[test]
    fn fits_as_is_when_under_limit() {
        let out = format_for_channel("hello world", &caps(true, 100));
        assert_eq!(out, vec!["hello world".to_string()]);
    }

    #[test]
    fn strips_bold_italic_and_headers_for_non_markdown_targets() {
        let out = format_for_channel("# Title\n\nThis is **bold** and _italic_.", &caps(false, 1000));
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("Title"));
        assert!(!out[0].contains('#'));
        assert!(!out[0].contains('*'));
        assert!(!out[0].contains('_'));
        assert!(out[0].contains("bold"));
        assert!(out[0].contains("italic"));
    }

    #[test]
    fn preserves_code_fence_contents_while_stripping_other_markup() {
        let out = format_for_channel("```\nlet x = 1;\n```\n\n**bold**", &caps(false, 1000));
        assert!(out[0].contains("let x = 1;"));
        assert!(out[0].contains("bold"));
        assert!(!out[0].contains("**"));
    }

    #[test]
    fn converts_links_to_text_with_parenthetical_url() {
        let out = format_for_channel("See [the docs](https://example.com/docs) for more.", &caps(false, 1000));
        assert_eq!(out[0].trim(), "See the docs (https://example.com/docs) for more.");
    }

    #[test]
    fn chunks_on_paragraph_boundaries_when_over_limit() {
        let content = "first paragraph here.\n\nsecond paragraph here.\n\nthird paragraph here.";
        let out = format_for_channel(content, &caps(true, 25));
        assert!(out.len() > 1);
        for piece in &out {
            assert!(piece.chars().count() <= 25 || piece.split_whitespace().count() <= 3);
        }
    }

    #[test]
    fn splits_oversize_paragraph_on_sentence_boundaries() {
        let content = "One sentence here. Another sentence follows. And a third one too.";
        let out = format_for_channel(content, &caps(true, 30));
        assert!(out.len() > 1);
        assert!(out.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn oversize_unsplittable_paragraph_is_returned_whole() {
        let word = "a".repeat(500);
        let out = format_for_channel(&word, &caps(true, 50));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], word);
    }
}
