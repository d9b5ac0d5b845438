//! String-literal-aware text scanning.
//!
//! A small state machine over raw source text, shared by the text-driven
//! strategies and the code quality analyzer. It tracks single-quote,
//! double-quote, and backtick string state (with backslash escapes, no
//! nested template expressions) so brace matching and pattern positions
//! ignore literal contents.

/// Find the byte offset of the `}` matching the `{` at `open`, or `None`
/// when the block never closes. `source[open]` must be `{`.
pub fn matching_brace(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    debug_assert_eq!(bytes.get(open), Some(&b'{'));

    let mut depth = 0usize;
    let mut string: Option<u8> = None;
    let mut escaped = false;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(quote) = string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == quote {
                string = None;
            }
        } else {
            match b {
                b'\'' | b'"' | b'`' => string = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Find the next `{` at or after `from` that is outside any string literal.
pub fn next_open_brace(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut string: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(quote) = string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == quote {
                string = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => string = Some(b),
            b'{' if i >= from => return Some(i),
            _ => {}
        }
    }
    None
}

/// 1-indexed line number of a byte offset.
pub fn line_of_offset(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// True when a string delimiter opens before `column` on the line, leaving
/// the column inside a literal. Used by the comment-marker scans.
pub fn in_string_before(line: &str, column: usize) -> bool {
    let mut string: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if i >= column {
            break;
        }
        if let Some(quote) = string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                string = None;
            }
            continue;
        }
        if c == '\'' || c == '"' || c == '`' {
            string = Some(c);
        }
    }
    string.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_brace_simple() {
        let src = "for (x) { a; { b; } c; } rest";
        let open = src.find('{').unwrap();
        let close = matching_brace(src, open).unwrap();
        assert_eq!(&src[open..=close], "{ a; { b; } c; }");
    }

    #[test]
    fn test_matching_brace_ignores_string_braces() {
        let src = "{ let s = \"}\"; done }";
        let close = matching_brace(src, 0).unwrap();
        assert_eq!(close, src.len() - 1);
    }

    #[test]
    fn test_matching_brace_respects_escapes() {
        let src = "{ let s = '\\'}'; x } tail";
        let close = matching_brace(src, 0).unwrap();
        assert_eq!(&src[close..close + 1], "}");
        assert!(src[..close].contains("x"));
    }

    #[test]
    fn test_unclosed_returns_none() {
        assert_eq!(matching_brace("{ open", 0), None);
    }

    #[test]
    fn test_line_of_offset() {
        let src = "a\nb\nc";
        assert_eq!(line_of_offset(src, 0), 1);
        assert_eq!(line_of_offset(src, 2), 2);
        assert_eq!(line_of_offset(src, 4), 3);
    }

    #[test]
    fn test_in_string_before() {
        let line = "let x = \"TODO: not a comment\"; // TODO real";
        let quoted = line.find("TODO").unwrap();
        assert!(in_string_before(line, quoted));
        let comment = line.rfind("TODO").unwrap();
        assert!(!in_string_before(line, comment));
    }
}
