// Diacritic stripping and censoring.
//
// Matching runs against the unaccented form of a message so "bâd" is caught
// as "bad", while censoring has to rewrite the message the author actually
// typed. `NormalizedText` keeps the link between the two.

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Decompose, drop combining marks, recompose.
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

/// Unaccented form of a message plus, for every original char, the byte
/// range its stripped form occupies in `text`.
pub struct NormalizedText<'a> {
    original: &'a str,
    text: String,
    spans: Vec<(usize, usize)>,
}

impl<'a> NormalizedText<'a> {
    pub fn new(original: &'a str) -> Self {
        let mut text = String::with_capacity(original.len());
        let mut spans = Vec::with_capacity(original.len());
        let mut buf = [0u8; 4];

        for c in original.chars() {
            let start = text.len();
            text.push_str(&strip_diacritics(c.encode_utf8(&mut buf)));
            spans.push((start, text.len()));
        }

        Self {
            original,
            text,
            spans,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Every match of `regex` in the unaccented text.
    pub fn find_all(&self, regex: &Regex) -> Vec<String> {
        regex
            .find_iter(&self.text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Rewrite the original message, replacing each match of `regex` (found in
    /// the unaccented text) with one `censor` per matched char.
    pub fn censor(&self, regex: &Regex, censor: &str) -> String {
        let mut covered: Vec<Option<usize>> = vec![None; self.spans.len()];
        let mut runs = Vec::new();

        for m in regex.find_iter(&self.text) {
            let run = runs.len();
            runs.push(m.as_str().chars().count());
            for (index, &(start, end)) in self.spans.iter().enumerate() {
                // Chars that vanished when stripped (lone combining marks)
                // belong to the match they sit inside or trail.
                let overlaps = start < m.end() && end > m.start();
                let absorbed = start == end && start > m.start() && start <= m.end();
                if overlaps || absorbed {
                    covered[index] = Some(run);
                }
            }
        }

        let mut output = String::with_capacity(self.original.len());
        let mut last_run = None;
        for (c, run) in self.original.chars().zip(covered) {
            match run {
                Some(run) => {
                    if last_run != Some(run) {
                        output.push_str(&censor.repeat(runs[run]));
                    }
                    last_run = Some(run);
                }
                None => {
                    output.push(c);
                    last_run = None;
                }
            }
        }
        output
    }
}
