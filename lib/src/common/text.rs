//! # Colugo Text Utilities (`common::text`)
//!
//! File: lib/src/common/text.rs
//!
//! ## Overview
//!
//! Small string helpers used to turn the raw text a child process produced
//! into lines, tokens and wrapped messages:
//! - **`trim`**: strip a set of characters from both ends.
//! - **`split`**: split on a (possibly multi-character) separator.
//! - **`split_on_any`**: split on any one of a set of characters.
//! - **`textwrap`**: greedy word wrap with first-line and hanging indents.
//!
//! Splitting behavior is controlled by `SplitOptions` (maximum number of
//! splits, whether tokens are trimmed, whether empty tokens are kept).
//!
//! ```rust
//! use colugo::common::text::{split_on_any, SplitOptions, WHITESPACE};
//!
//! let opts = SplitOptions::default().include_empty(false);
//! assert_eq!(split_on_any("1  2\t3", WHITESPACE, opts), vec!["1", "2", "3"]);
//! ```
//!

/// Characters treated as whitespace by `trim` and the split helpers.
pub const WHITESPACE: &str = " \t\n\r";

/// Options controlling `split` and `split_on_any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOptions {
    /// Maximum number of separators to split on (0 = no limit). The remainder
    /// after the last split becomes the final token.
    pub max_splits: usize,
    /// Strip leading and trailing whitespace from each token.
    pub trim_tokens: bool,
    /// Keep empty tokens produced by consecutive separators.
    pub include_empty: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            max_splits: 0,
            trim_tokens: true,
            include_empty: true,
        }
    }
}

impl SplitOptions {
    pub fn max_splits(mut self, max_splits: usize) -> Self {
        self.max_splits = max_splits;
        self
    }

    pub fn trim_tokens(mut self, trim_tokens: bool) -> Self {
        self.trim_tokens = trim_tokens;
        self
    }

    pub fn include_empty(mut self, include_empty: bool) -> Self {
        self.include_empty = include_empty;
        self
    }

    fn shape<'a>(&self, token: &'a str) -> &'a str {
        if self.trim_tokens {
            trim(token, WHITESPACE)
        } else {
            token
        }
    }
}

/// Returns `s` with any of the characters in `to_trim` removed from both ends.
pub fn trim<'a>(s: &'a str, to_trim: &str) -> &'a str {
    s.trim_matches(|c: char| to_trim.contains(c))
}

/// Splits `src` into tokens delimited by the separator string `sep`.
///
/// An empty separator yields the whole (optionally trimmed) input as a single
/// token.
pub fn split(src: &str, sep: &str, options: SplitOptions) -> Vec<String> {
    if sep.is_empty() {
        return split_with(src, options, |_| None);
    }
    split_with(src, options, |rest| rest.find(sep).map(|pos| (pos, sep.len())))
}

/// Splits `src` into tokens delimited by any character contained in `seps`.
pub fn split_on_any(src: &str, seps: &str, options: SplitOptions) -> Vec<String> {
    split_with(src, options, |rest| {
        rest.char_indices()
            .find(|(_, c)| seps.contains(*c))
            .map(|(pos, c)| (pos, c.len_utf8()))
    })
}

// `next_sep` returns the byte offset and byte length of the next separator.
fn split_with<F>(src: &str, options: SplitOptions, mut next_sep: F) -> Vec<String>
where
    F: FnMut(&str) -> Option<(usize, usize)>,
{
    let mut tokens = Vec::new();
    let mut rest = src;
    let mut splits = 0;

    while options.max_splits == 0 || splits < options.max_splits {
        let Some((pos, len)) = next_sep(rest) else {
            break;
        };
        let token = options.shape(&rest[..pos]);
        if !token.is_empty() || options.include_empty {
            tokens.push(token.to_string());
            splits += 1;
        }
        rest = &rest[pos + len..];
    }

    let last = options.shape(rest);
    if !last.is_empty() || options.include_empty {
        tokens.push(last.to_string());
    }
    tokens
}

/// Wraps `source` to lines of at most `line_width` columns.
///
/// Words are separated by spaces and never broken; a word longer than the
/// width sits on its own line. Explicit newlines in `source` are preserved.
/// The first output line is indented by `first_line_indent` spaces, every
/// later line by `subsequent_line_indent`. A width of 0 disables wrapping.
pub fn textwrap(
    source: &str,
    line_width: usize,
    first_line_indent: usize,
    subsequent_line_indent: usize,
) -> String {
    let width = if line_width == 0 {
        usize::MAX
    } else {
        line_width
    };
    let mut wrapped = String::with_capacity(source.len());
    let mut first_line = true;

    for (index, paragraph) in source.split('\n').enumerate() {
        if index > 0 {
            wrapped.push('\n');
        }
        let mut column = 0;
        let mut line_has_word = false;

        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let word_len = word.chars().count();
            if line_has_word && column + 1 + word_len > width {
                wrapped.push('\n');
                line_has_word = false;
            }
            if line_has_word {
                wrapped.push(' ');
                column += 1;
            } else {
                let indent = if first_line {
                    first_line_indent
                } else {
                    subsequent_line_indent
                };
                first_line = false;
                wrapped.extend(std::iter::repeat(' ').take(indent));
                column = indent;
            }
            wrapped.push_str(word);
            column += word_len;
            line_has_word = true;
        }
        // A blank line still counts as a line for indentation purposes.
        first_line = false;
    }
    wrapped
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_default_whitespace() {
        assert_eq!(trim("  \thello world\r\n", WHITESPACE), "hello world");
        assert_eq!(trim("   ", WHITESPACE), "");
        assert_eq!(trim("", WHITESPACE), "");
    }

    #[test]
    fn test_trim_custom_characters() {
        assert_eq!(trim("--==value==--", "-="), "value");
    }

    #[test]
    fn test_split_trims_and_keeps_empty_by_default() {
        let tokens = split("a, b,, c ", ",", SplitOptions::default());
        assert_eq!(tokens, vec!["a", "b", "", "c"]);
    }

    #[test]
    fn test_split_drops_empty_tokens() {
        let opts = SplitOptions::default().include_empty(false);
        assert_eq!(split("a,,b,", ",", opts), vec!["a", "b"]);
    }

    #[test]
    fn test_split_respects_max_splits() {
        let opts = SplitOptions::default().max_splits(1);
        assert_eq!(split("key=value=more", "=", opts), vec!["key", "value=more"]);
    }

    #[test]
    fn test_split_multi_character_separator() {
        let opts = SplitOptions::default().trim_tokens(false);
        assert_eq!(split("one::two::three", "::", opts), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_split_without_separator_present() {
        assert_eq!(split("single", ",", SplitOptions::default()), vec!["single"]);
        assert_eq!(split(" whole ", "", SplitOptions::default()), vec!["whole"]);
    }

    #[test]
    fn test_split_on_any_whitespace_table_row() {
        let opts = SplitOptions::default().include_empty(false);
        let row = split_on_any("  10\t20   30 ", WHITESPACE, opts);
        assert_eq!(row, vec!["10", "20", "30"]);
    }

    #[test]
    fn test_textwrap_breaks_on_word_boundaries() {
        let wrapped = textwrap("the quick brown fox jumps over the lazy dog", 10, 0, 0);
        assert_eq!(wrapped, "the quick\nbrown fox\njumps over\nthe lazy\ndog");
        for line in wrapped.lines() {
            assert!(line.len() <= 10, "line too long: {:?}", line);
        }
    }

    #[test]
    fn test_textwrap_indents() {
        let wrapped = textwrap("aaa bbb ccc ddd", 9, 2, 4);
        assert_eq!(wrapped, "  aaa bbb\n    ccc\n    ddd");
    }

    #[test]
    fn test_textwrap_preserves_newlines_and_long_words() {
        let wrapped = textwrap("short\nsupercalifragilistic word", 8, 0, 0);
        assert_eq!(wrapped, "short\nsupercalifragilistic\nword");
    }

    #[test]
    fn test_textwrap_zero_width_disables_wrapping() {
        assert_eq!(textwrap("a b c", 0, 0, 0), "a b c");
    }
}
