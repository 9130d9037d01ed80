//! Splits long contract text into printable pages.
//!
//! Lengths are measured in `char`s. Each page ends at the coarsest natural
//! break (paragraph, then line, then word) that still fills at least
//! [`MIN_FILL_RATIO`] of the page; otherwise the text is hard-cut at the limit.

pub const DEFAULT_MAX_CHARS_PER_PAGE: usize = 2200;

/// A break point closer to the page start than this fraction is ignored.
pub const MIN_FILL_RATIO: f64 = 0.6;

const BREAKS: [&str; 3] = ["\n\n", "\n", " "];

/// Paginate `text` into pages of at most `max_chars_per_page` characters.
///
/// Always returns at least one page; an empty input yields a single empty page.
pub fn paginate(text: &str, max_chars_per_page: usize) -> Vec<String> {
    let max = max_chars_per_page.max(1);
    if text.chars().count() <= max {
        return vec![text.to_string()];
    }

    let mut pages = Vec::new();
    let mut remaining = text;

    while remaining.chars().count() > max {
        let (page_end, resume_at) = find_break(remaining, max);
        pages.push(remaining[..page_end].trim_end().to_string());
        remaining = remaining[resume_at..].trim_start();
    }

    if !remaining.is_empty() || pages.is_empty() {
        pages.push(remaining.to_string());
    }

    pages
}

/// Returns `(page_end, resume_at)` byte offsets; `resume_at > 0` always holds.
fn find_break(remaining: &str, max: usize) -> (usize, usize) {
    let limit = byte_offset(remaining, max);
    let min_chars = (max as f64 * MIN_FILL_RATIO).ceil() as usize;

    for separator in BREAKS {
        // A separator starting right at the limit still yields a full page.
        let end = if remaining[limit..].starts_with(separator) {
            limit + separator.len()
        } else {
            limit
        };
        let window = &remaining[..end];
        if let Some(position) = window.rfind(separator) {
            let chars_before = window[..position].chars().count();
            if chars_before > 0 && chars_before >= min_chars {
                return (position, position + separator.len());
            }
        }
    }

    (limit, limit)
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}
