//! Reconstruction of the cumulative response from token deltas.
//!
//! Deltas are joined with a single space unless punctuation or an opening
//! bracket/quote makes the join look wrong. This is a heuristic, not a
//! tokenizer, and the character sets below decide the exact output.

/// A fragment starting with one of these attaches directly to the text before it.
const NO_SPACE_BEFORE: &[char] = &['.', ',', '!', '?', ';', ':', ')', '}', ']', '"', '\''];

/// Text ending with one of these takes the next fragment without a space.
const NO_SPACE_AFTER: &[char] = &['(', '[', '{', '"', '\''];

/// Whether a space goes between `cumulative` and `fragment`.
pub fn needs_space(cumulative: &str, fragment: &str) -> bool {
    let Some(last) = cumulative.chars().next_back() else {
        return false;
    };

    if fragment.starts_with(NO_SPACE_BEFORE) {
        return false;
    }

    !(NO_SPACE_AFTER.contains(&last) || last.is_whitespace())
}

/// Append-only cumulative response.
#[derive(Debug, Default, Clone)]
pub struct SpacingAccumulator {
    text: String,
}

impl SpacingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment, inserting a space first when [`needs_space`] says so.
    pub fn push(&mut self, fragment: &str) {
        if needs_space(&self.text, fragment) {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}
