//! Word delimiter filter.
//!
//! Splits a token into sub-words at intra-word delimiters:
//!
//! - non-alphanumeric characters (`foo_bar`, `v2.0`), which are dropped;
//! - lowercase to uppercase transitions (`PowerShot` → `Power`, `Shot`);
//! - letter/digit transitions (`SD500` → `SD`, `500`).
//!
//! Depending on [`WordDelimiterConfig`] it also emits concatenations of
//! adjacent word or number parts and keeps the original token. Sub-words get
//! increasing positions and every later token in the stream is shifted
//! accordingly, so positions stay non-decreasing.
//!
//! # Examples
//!
//! ```
//! use repodex::analysis::token::Token;
//! use repodex::analysis::token_filter::word_delimiter::{WordDelimiterConfig, WordDelimiterFilter};
//!
//! let filter = WordDelimiterFilter::new(WordDelimiterConfig::default());
//! let tokens = vec![Token::new("wi-fi", 0)];
//! let texts: Vec<_> = filter
//!     .filter(Box::new(tokens.into_iter()))
//!     .map(|t| (t.text, t.position))
//!     .collect();
//!
//! assert_eq!(
//!     texts,
//!     vec![
//!         ("wi-fi".to_string(), 0),
//!         ("wifi".to_string(), 0),
//!         ("wi".to_string(), 0),
//!         ("fi".to_string(), 1),
//!     ]
//! );
//! ```

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;

use crate::analysis::token::{Token, TokenStream};

/// Default limit on the number of parts a single token may split into.
pub const DEFAULT_MAX_SUB_TOKENS: usize = 32;

/// Options controlling what the delimiter filter emits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordDelimiterConfig {
    /// Emit the alphabetic parts (`Power`, `Shot`)
    pub generate_word_parts: bool,
    /// Emit the numeric parts (`500`)
    pub generate_number_parts: bool,
    /// Emit runs of adjacent word parts joined together (`PowerShot`)
    pub catenate_words: bool,
    /// Emit runs of adjacent number parts joined together (`5002000`)
    pub catenate_numbers: bool,
    /// Emit all parts joined together (`SD500`)
    pub catenate_all: bool,
    /// Emit the unsplit token as well
    pub preserve_original: bool,
    /// Split where a lowercase letter is followed by an uppercase one
    pub split_on_case_change: bool,
    /// Split between letters and digits
    pub split_on_numerics: bool,
    /// Tokens producing more parts than this are left unsplit
    pub max_sub_tokens: usize,
}

impl Default for WordDelimiterConfig {
    fn default() -> Self {
        WordDelimiterConfig {
            generate_word_parts: true,
            generate_number_parts: true,
            catenate_words: true,
            catenate_numbers: true,
            catenate_all: true,
            preserve_original: true,
            split_on_case_change: true,
            split_on_numerics: true,
            max_sub_tokens: DEFAULT_MAX_SUB_TOKENS,
        }
    }
}

impl WordDelimiterConfig {
    /// Whether this configuration can emit anything at all.
    pub fn generates_output(&self) -> bool {
        self.generate_word_parts
            || self.generate_number_parts
            || self.catenate_words
            || self.catenate_numbers
            || self.catenate_all
            || self.preserve_original
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CharClass {
    Lower,
    Upper,
    /// Letters without case (CJK, Arabic, ...)
    Letter,
    Digit,
    Delimiter,
}

impl CharClass {
    fn of(c: char) -> Self {
        if c.is_numeric() {
            CharClass::Digit
        } else if c.is_alphabetic() {
            if c.is_uppercase() {
                CharClass::Upper
            } else if c.is_lowercase() {
                CharClass::Lower
            } else {
                CharClass::Letter
            }
        } else {
            CharClass::Delimiter
        }
    }

    fn is_alpha(self) -> bool {
        matches!(self, CharClass::Lower | CharClass::Upper | CharClass::Letter)
    }
}

/// A sub-word as a byte range of the token text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Part {
    start: usize,
    end: usize,
    numeric: bool,
}

/// Splits tokens on intra-word delimiters.
#[derive(Clone, Debug)]
pub struct WordDelimiterFilter {
    config: WordDelimiterConfig,
}

impl WordDelimiterFilter {
    pub fn new(config: WordDelimiterConfig) -> Self {
        WordDelimiterFilter { config }
    }

    pub fn config(&self) -> &WordDelimiterConfig {
        &self.config
    }

    pub fn filter<'a>(&'a self, tokens: TokenStream<'a>) -> TokenStream<'a> {
        let mut shift = 0usize;
        Box::new(tokens.flat_map(move |token| self.split_token(token, &mut shift)))
    }

    /// Case changes only break lower-to-upper; an uppercase letter never
    /// ends a part, so `XMLParser` stays whole.
    fn is_break(&self, last: CharClass, next: CharClass) -> bool {
        if last == next {
            return false;
        }
        if last.is_alpha() && next.is_alpha() {
            return self.config.split_on_case_change
                && last != CharClass::Upper
                && next == CharClass::Upper;
        }
        self.config.split_on_numerics
    }

    fn parts(&self, text: &str) -> Vec<Part> {
        let mut parts = Vec::new();
        // (start, class of last char, part contains a letter)
        let mut current: Option<(usize, CharClass, bool)> = None;

        for (i, c) in text.char_indices() {
            let class = match (is_combining_mark(c), current) {
                (true, Some((_, last, _))) => last,
                _ => CharClass::of(c),
            };

            if class == CharClass::Delimiter {
                if let Some((start, _, alpha)) = current.take() {
                    parts.push(Part { start, end: i, numeric: !alpha });
                }
                continue;
            }

            current = match current {
                None => Some((i, class, class.is_alpha())),
                Some((start, last, alpha)) if self.is_break(last, class) => {
                    parts.push(Part { start, end: i, numeric: !alpha });
                    Some((i, class, class.is_alpha()))
                }
                Some((start, _, alpha)) => Some((start, class, alpha || class.is_alpha())),
            };
        }

        if let Some((start, _, alpha)) = current {
            parts.push(Part {
                start,
                end: text.len(),
                numeric: !alpha,
            });
        }
        parts
    }

    fn split_token(&self, mut token: Token, shift: &mut usize) -> Vec<Token> {
        let parts = self.parts(&token.text);
        token.position += *shift;

        if parts.is_empty() {
            return if self.config.preserve_original {
                vec![token]
            } else {
                Vec::new()
            };
        }
        let whole = parts.len() == 1 && parts[0].start == 0 && parts[0].end == token.text.len();
        if whole || parts.len() > self.config.max_sub_tokens {
            return vec![token];
        }

        let base = token.position;
        let spans = token.spans_offsets();
        let offsets = |start: usize, end: usize| {
            if spans {
                (token.start_offset + start, token.start_offset + end)
            } else {
                (token.start_offset, token.end_offset)
            }
        };
        let join = |run: &[Part]| -> String {
            run.iter()
                .map(|p| &token.text[p.start..p.end])
                .collect::<String>()
        };

        let mut out: Vec<Token> = Vec::with_capacity(parts.len() * 2 + 2);
        let mut emit = |text: String, position: usize, (start, end): (usize, usize)| {
            if !out.iter().any(|t| t.position == position && t.text == text) {
                out.push(Token::with_offsets(text, position, start, end));
            }
        };

        if self.config.preserve_original {
            emit(
                token.text.clone(),
                base,
                (token.start_offset, token.end_offset),
            );
        }
        if self.config.catenate_all && parts.len() > 1 {
            let last = parts[parts.len() - 1];
            emit(join(&parts), base, offsets(parts[0].start, last.end));
        }

        for (i, part) in parts.iter().enumerate() {
            let run_starts = i == 0 || parts[i - 1].numeric != part.numeric;
            if run_starts {
                let run_len = parts[i..]
                    .iter()
                    .take_while(|p| p.numeric == part.numeric)
                    .count();
                let catenate = if part.numeric {
                    self.config.catenate_numbers
                } else {
                    self.config.catenate_words
                };
                if catenate && run_len > 1 {
                    let run = &parts[i..i + run_len];
                    emit(
                        join(run),
                        base + i,
                        offsets(part.start, run[run_len - 1].end),
                    );
                }
            }

            let generate = if part.numeric {
                self.config.generate_number_parts
            } else {
                self.config.generate_word_parts
            };
            if generate {
                emit(
                    token.text[part.start..part.end].to_string(),
                    base + i,
                    offsets(part.start, part.end),
                );
            }
        }

        *shift += parts.len() - 1;
        out
    }
}

impl Default for WordDelimiterFilter {
    fn default() -> Self {
        Self::new(WordDelimiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(filter: &WordDelimiterFilter, tokens: Vec<Token>) -> Vec<(String, usize)> {
        filter
            .filter(Box::new(tokens.into_iter()))
            .map(|t| (t.text, t.position))
            .collect()
    }

    fn pairs(expected: &[(&str, usize)]) -> Vec<(String, usize)> {
        expected.iter().map(|(t, p)| (t.to_string(), *p)).collect()
    }

    #[test]
    fn test_case_change_split() {
        let filter = WordDelimiterFilter::default();
        let result = run(&filter, vec![Token::new("PowerShot", 0)]);
        assert_eq!(
            result,
            pairs(&[
                ("PowerShot", 0),
                ("Power", 0),
                ("Shot", 1),
            ])
        );
    }

    #[test]
    fn test_numeric_split_and_catenation() {
        let filter = WordDelimiterFilter::default();
        let result = run(&filter, vec![Token::new("SD500", 0)]);
        assert_eq!(result, pairs(&[("SD500", 0), ("SD", 0), ("500", 1)]));

        let result = run(&filter, vec![Token::new("500-42", 0)]);
        assert_eq!(
            result,
            pairs(&[("500-42", 0), ("50042", 0), ("500", 0), ("42", 1)])
        );
    }

    #[test]
    fn test_following_tokens_shifted() {
        let filter = WordDelimiterFilter::default();
        let result = run(
            &filter,
            vec![Token::new("foo_bar_baz", 0), Token::new("next", 1)],
        );
        assert_eq!(result.last(), Some(&("next".to_string(), 3)));
        assert!(result.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_uppercase_run_is_one_part() {
        let filter = WordDelimiterFilter::default();
        let result = run(&filter, vec![Token::new("HTML", 0)]);
        assert_eq!(result, pairs(&[("HTML", 0)]));
    }

    #[test]
    fn test_no_split_after_uppercase() {
        let filter = WordDelimiterFilter::default();
        let result = run(&filter, vec![Token::new("XMLParser", 0)]);
        assert_eq!(result, pairs(&[("XMLParser", 0)]));

        let result = run(&filter, vec![Token::new("parseXMLData", 0)]);
        assert_eq!(
            result,
            pairs(&[("parseXMLData", 0), ("parse", 0), ("XMLData", 1)])
        );
    }

    #[test]
    fn test_unsplit_when_too_many_parts() {
        let filter = WordDelimiterFilter::new(WordDelimiterConfig {
            max_sub_tokens: 2,
            ..WordDelimiterConfig::default()
        });
        let result = run(&filter, vec![Token::new("a_b_c", 0), Token::new("z", 1)]);
        assert_eq!(result, pairs(&[("a_b_c", 0), ("z", 1)]));
    }

    #[test]
    fn test_parts_only() {
        let filter = WordDelimiterFilter::new(WordDelimiterConfig {
            catenate_words: false,
            catenate_numbers: false,
            catenate_all: false,
            preserve_original: false,
            ..WordDelimiterConfig::default()
        });
        let result = run(&filter, vec![Token::new("fooBar", 0)]);
        assert_eq!(result, pairs(&[("foo", 0), ("Bar", 1)]));
    }

    #[test]
    fn test_sub_token_offsets() {
        let filter = WordDelimiterFilter::default();
        let tokens: Vec<_> = filter
            .filter(Box::new(
                vec![Token::with_offsets("fooBar", 0, 10, 16)].into_iter(),
            ))
            .collect();
        let bar = tokens.iter().find(|t| t.text == "Bar").unwrap();
        assert_eq!((bar.start_offset, bar.end_offset), (13, 16));
    }

    #[test]
    fn test_delimiters_only() {
        let filter = WordDelimiterFilter::new(WordDelimiterConfig {
            preserve_original: false,
            ..WordDelimiterConfig::default()
        });
        assert!(run(&filter, vec![Token::new("--", 0)]).is_empty());
    }
}
