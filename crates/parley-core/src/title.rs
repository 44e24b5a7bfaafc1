//! Conversation titles, derived from the first user message on read.

/// Shown for conversations that have no messages yet.
pub const UNTITLED: &str = "Untitled Conversation";

/// Number of leading words of the first user message kept in a title.
pub const TITLE_WORDS: usize = 5;

/// Title for a conversation whose first user message is `first_user_message`.
///
/// Whitespace runs collapse to single spaces.
pub fn derive_title(first_user_message: Option<&str>) -> String {
  let words: Vec<&str> = first_user_message
    .map(|text| text.split_whitespace().take(TITLE_WORDS).collect())
    .unwrap_or_default();

  if words.is_empty() {
    UNTITLED.to_owned()
  } else {
    words.join(" ")
  }
}
