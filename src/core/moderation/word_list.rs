// Word list compiler - turns a comma separated list from the admin console
// into one case-insensitive alternation regex.

use regex::Regex;
use thiserror::Error;

/// Template for profanity lists: each entry must be a standalone token.
pub const WORD_BOUNDARY_TEMPLATE: &str = r"(?mi)\b(%s)\b";

/// Template for domain and username lists, which are matched as substrings
/// of a larger string. Entries may be regex fragments such as `spam.*`.
pub const SUBSTRING_TEMPLATE: &str = "(?mi)(%s)";

#[derive(Debug, Error)]
pub enum WordListError {
    #[error("unable to compile regex from word list: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Split, trim and order the entries of a word list, longest first.
///
/// Empty entries (`"a,,b"`, trailing commas) are dropped; an empty
/// alternative would otherwise match everywhere.
pub fn word_list_entries(word_list: &str) -> Vec<&str> {
    let mut entries: Vec<&str> = word_list
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();

    // Longer phrases first, so "abc def" is tried before "abc".
    // sort_by is stable, ties keep their configured order.
    entries.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    entries
}

/// Render the regex source for a word list. The first `%s` in `template`
/// receives the `|`-joined entries.
pub fn word_list_to_pattern(word_list: &str, template: &str) -> String {
    let alternation = word_list_entries(word_list).join("|");
    template.replacen("%s", &alternation, 1)
}

/// Compile a word list into a matcher.
///
/// Returns `Ok(None)` when the list has no entries: an empty list means
/// "no restriction", not "reject everything".
pub fn compile_word_list(
    word_list: &str,
    template: &str,
) -> Result<Option<Regex>, WordListError> {
    if word_list_entries(word_list).is_empty() {
        return Ok(None);
    }

    let pattern = word_list_to_pattern(word_list, template);
    Ok(Some(Regex::new(&pattern)?))
}
