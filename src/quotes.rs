//! Quote styles and selection helpers.

use rand::seq::SliceRandom;

/// Visual style of a stored quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `"text"` followed by `© author`
    Classic,
    /// Emoji-decorated variant
    Emoji,
}

impl QuoteStyle {
    pub fn as_db(self) -> i64 {
        match self {
            QuoteStyle::Classic => 1,
            QuoteStyle::Emoji => 2,
        }
    }

    /// Unknown stored values fall back to the classic style
    pub fn from_db(value: i64) -> Self {
        if value == 2 {
            QuoteStyle::Emoji
        } else {
            QuoteStyle::Classic
        }
    }
}

pub fn format_quote(text: &str, author: &str, style: QuoteStyle) -> String {
    match style {
        QuoteStyle::Classic => format!("\"{text}\"\n\n© {author}"),
        QuoteStyle::Emoji => format!("💬 \"{text}\"\n\n👤 {author}"),
    }
}

/// Display name built from Telegram first/last name
pub fn author_display_name(first_name: &str, last_name: Option<&str>) -> String {
    match last_name {
        Some(last) if !last.is_empty() => format!("{first_name} {last}"),
        _ => first_name.to_string(),
    }
}

/// Pick the `number`-th item (1-based) or a random one when `number` is `None`
///
/// Returns `Err(total)` when the number is out of range; `None` for an empty list.
pub fn pick_numbered<T>(items: &[T], number: Option<i64>) -> Option<Result<&T, usize>> {
    if items.is_empty() {
        return None;
    }
    Some(match number {
        None => items.choose(&mut rand::thread_rng()).ok_or(items.len()),
        Some(n) if n >= 1 && (n as usize) <= items.len() => Ok(&items[n as usize - 1]),
        Some(_) => Err(items.len()),
    })
}
