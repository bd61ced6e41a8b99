//! Output size limits

/// Largest tool output kept in the transcript
pub const MAX_OUTPUT_BYTES: usize = 100 * 1024;

/// Keep the head of `text`, noting how much was cut
pub fn truncate_output(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }

    format!(
        "{}\n\n[... output truncated: {} bytes omitted]",
        &text[..cut],
        text.len() - cut
    )
}
