//! Mention extraction from instruction text
//!
//! Finds `@namespace:path` and `@path` tokens, skipping fenced code blocks,
//! inline code, and email addresses. Tokens are returned unique, in order of
//! first appearance, with the `@` prefix kept.

/// Characters allowed inside a mention token after the `@`.
fn is_mention_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '/' | '-')
}

/// Extract mentions from text, excluding code blocks and emails.
pub fn parse_mentions(text: &str) -> Vec<String> {
    let stripped = strip_code(text);

    let mut seen = std::collections::HashSet::new();
    let mut mentions = Vec::new();

    let bytes = stripped.as_bytes();
    let mut prev: Option<char> = None;
    let mut iter = stripped.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if c != '@' {
            prev = Some(c);
            continue;
        }

        // An @ glued to a word is an email local part, not a mention
        if prev.is_some_and(|p| p.is_ascii_alphanumeric()) {
            prev = Some(c);
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < bytes.len() {
            let next = stripped[end..].chars().next();
            match next {
                Some(nc) if is_mention_char(nc) => end += nc.len_utf8(),
                _ => break,
            }
        }

        if end > start {
            let token = format!("@{}", &stripped[start..end]);
            if seen.insert(token.clone()) {
                mentions.push(token);
            }
            // Skip past the consumed token
            while let Some(&(j, _)) = iter.peek() {
                if j < end {
                    iter.next();
                } else {
                    break;
                }
            }
            prev = stripped[..end].chars().last();
        } else {
            prev = Some(c);
        }
    }

    mentions
}

/// Remove fenced code blocks and inline code spans.
fn strip_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        strip_inline_code(line, &mut out);
        out.push('\n');
    }

    out
}

/// Remove `backtick` spans from one line. An unmatched backtick is kept.
fn strip_inline_code(line: &str, out: &mut String) {
    let mut rest = line;
    while let Some(start) = rest.find('`') {
        match rest[start + 1..].find('`') {
            Some(len) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + 1 + len + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_namespace_and_bare_mentions() {
        let text = "Read @foundation:philosophy and @docs/guide.md before starting.";
        assert_eq!(
            parse_mentions(text),
            vec!["@foundation:philosophy", "@docs/guide.md"]
        );
    }

    #[test]
    fn test_duplicates_collapse_preserving_order() {
        let text = "@a:x then @b:y then @a:x again";
        assert_eq!(parse_mentions(text), vec!["@a:x", "@b:y"]);
    }

    #[test]
    fn test_emails_are_not_mentions() {
        assert!(parse_mentions("mail me at user@example.com").is_empty());
    }

    #[test]
    fn test_fenced_code_is_ignored() {
        let text = "before\n```sh\necho @fake:mention\n```\n@real:mention\n";
        assert_eq!(parse_mentions(text), vec!["@real:mention"]);
    }

    #[test]
    fn test_inline_code_is_ignored() {
        let text = "use `@fake:mention` but read @real:mention";
        assert_eq!(parse_mentions(text), vec!["@real:mention"]);
    }

    #[test]
    fn test_bare_at_is_not_a_mention() {
        assert!(parse_mentions("a lone @ sign").is_empty());
    }
}
