//! Outbound message shaping for Telegram
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0
//!
//! ## Changelog
//! - 1.0.0: Initial release with chunking and truncation helpers

/// Telegram message text limit (characters as counted by the Bot API)
pub const TELEGRAM_LIMIT: usize = 4096;

/// Chunk text into pieces that fit the Telegram message limit
///
/// Splits respecting UTF-8 character boundaries and preferring line
/// boundaries; a single over-long line falls back to character splitting.
pub fn chunk_message(text: &str) -> Vec<String> {
    chunk_text(text, TELEGRAM_LIMIT)
}

/// Chunk text into pieces of at most `max_size` bytes (UTF-8 safe, line-aware)
pub fn chunk_text(text: &str, max_size: usize) -> Vec<String> {
    if text.len() <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let line_with_newline = format!("{line}\n");
        if current.len() + line_with_newline.len() > max_size {
            if !current.is_empty() {
                chunks.push(current.trim_end().to_string());
                current = String::new();
            }
            if line_with_newline.len() > max_size {
                chunks.extend(chunk_long_line(line, max_size));
            } else {
                current = line_with_newline;
            }
        } else {
            current.push_str(&line_with_newline);
        }
    }
    if !current.is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

/// Split a single long line into chunks respecting UTF-8 boundaries
fn chunk_long_line(line: &str, max_size: usize) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();

    for ch in line.chars() {
        let ch_len = ch.len_utf8();
        if current.len() + ch_len > max_size && !current.is_empty() {
            result.push(current);
            current = String::new();
        }
        current.push(ch);
    }

    if !current.is_empty() {
        result.push(current);
    }

    result
}

/// Truncate text to the Telegram limit, adding ellipsis if needed
pub fn truncate_message(text: &str) -> String {
    if text.len() <= TELEGRAM_LIMIT {
        return text.to_string();
    }
    // Find a safe UTF-8 boundary with room for "..."
    let mut end = TELEGRAM_LIMIT - 3;
    while !text.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_no_chunk() {
        let result = chunk_text("hola", 100);
        assert_eq!(result, vec!["hola"]);
    }

    #[test]
    fn test_chunk_prefers_line_boundaries() {
        let text = "primera línea\nsegunda línea\ntercera línea";
        let result = chunk_text(text, 20);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0], "primera línea");
    }

    #[test]
    fn test_chunk_long_single_line() {
        let text = "a".repeat(50);
        let result = chunk_text(&text, 20);
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|c| c.len() <= 20));
        assert_eq!(result.join(""), text);
    }

    #[test]
    fn test_chunk_never_splits_multibyte_chars() {
        // "ñ" is two bytes; a naive byte split would corrupt the text
        let text = "ñ".repeat(30);
        let result = chunk_text(&text, 7);
        for chunk in &result {
            assert!(chunk.len() <= 7);
            assert!(chunk.chars().all(|c| c == 'ñ'));
        }
        assert_eq!(result.concat(), text);
    }

    #[test]
    fn test_truncate_under_limit_unchanged() {
        assert_eq!(truncate_message("hola"), "hola");
    }

    #[test]
    fn test_truncate_over_limit_adds_ellipsis() {
        let text = "x".repeat(TELEGRAM_LIMIT + 100);
        let result = truncate_message(&text);
        assert_eq!(result.len(), TELEGRAM_LIMIT);
        assert!(result.ends_with("..."));
    }
}
