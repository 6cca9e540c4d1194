//! RFC 5545 content-line output: folding and TEXT escaping.
//!
//! Reading is left to the `ical` parser, which unfolds lines and splits
//! parameters but hands TEXT values back still escaped.

/// Maximum line length in octets (not characters) per RFC 5545 §3.1.
const MAX_LINE_OCTETS: usize = 75;

/// Folds a line to 75 octets, inserting CRLF + space at UTF-8 boundaries.
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut result = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut current_len = 0;
    let mut first_segment = true;

    for c in line.chars() {
        let char_len = c.len_utf8();
        let limit = if first_segment {
            MAX_LINE_OCTETS
        } else {
            MAX_LINE_OCTETS - 1
        };

        if current_len + char_len > limit {
            result.push_str("\r\n ");
            current_len = 0;
            first_segment = false;
        }

        result.push(c);
        current_len += char_len;
    }

    result
}

/// Escape a TEXT value (backslash, semicolon, comma, newline).
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

/// Reverse of [`escape_text`].
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line_unchanged() {
        let line = "SUMMARY:Standup";
        assert_eq!(fold_line(line), line);
    }

    #[test]
    fn fold_at_75_octets() {
        let line = "X".repeat(80);
        let folded = fold_line(&line);
        let first_line: String = folded.chars().take_while(|&c| c != '\r').collect();
        assert_eq!(first_line.len(), 75);
        for segment in folded.split("\r\n") {
            assert!(segment.len() <= 75);
        }
    }

    #[test]
    fn fold_respects_utf8() {
        let line = format!("DESCRIPTION:{}", "日".repeat(40));
        let folded = fold_line(&line);
        for part in folded.split("\r\n ") {
            assert!(part.is_char_boundary(part.len()));
        }
    }

    #[test]
    fn text_escaping_reverses() {
        let raw = "Room 4; bring laptop, charger\nand notes \\ slides";
        assert_eq!(unescape_text(&escape_text(raw)), raw);
        assert_eq!(escape_text("a,b;c"), "a\\,b\\;c");
    }
}
