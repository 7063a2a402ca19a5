//! Log sanitation for message bodies and other user-supplied strings.
//! SMS bodies arrive from the queue server verbatim and may contain
//! newlines or control characters that would break single-line logs.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///   Other control characters become `\xNN`. Strings longer than the
///   preview cap are truncated with an ellipsis to keep log noise down.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 160; // SMS bodies are short; this covers a full segment
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_log;

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_log("pick up\nmilk\r\tnow"), "pick up\\nmilk\\r\\tnow");
        assert_eq!(escape_log("bell\x07"), "bell\\x07");
    }

    #[test]
    fn truncates_long_bodies() {
        let long = "a".repeat(500);
        let escaped = escape_log(&long);
        assert!(escaped.ends_with('…'));
        assert!(escaped.chars().count() <= 161);
    }
}
