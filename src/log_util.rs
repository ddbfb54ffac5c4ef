//! Smol utilities for logging

/// Make an Ascii-safe string
pub fn ascii_escape(s: &[u8]) -> String {
    s.iter()
        .flat_map(|&b| std::ascii::escape_default(b))
        .map(char::from)
        .collect()
}

/// Truncates `s` for a log line, marking the cut.
pub fn abbreviate(s: &[u8], max: usize) -> String {
    if s.len() <= max {
        ascii_escape(s)
    } else {
        format!("{}... ({} bytes)", ascii_escape(&s[..max]), s.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn escapes_control_bytes() {
        assert_eq!(ascii_escape(b"PHP Notice:\r\n\xff"), "PHP Notice:\\r\\n\\xff");
    }

    #[test]
    fn abbreviates_long_output() {
        assert_eq!(abbreviate(b"abcdef", 3), "abc... (6 bytes)");
        assert_eq!(abbreviate(b"abc", 3), "abc");
    }
}
