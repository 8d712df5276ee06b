//! Diacritic folding filter.
//!
//! Maps every character that has a reasonable ASCII equivalent to it:
//! accented letters lose their marks (`é` → `e`), compatibility forms are
//! expanded (`ﬁ` → `fi`, `²` → `2`) and a handful of letters without a
//! decomposition are spelled out (`ß` → `ss`, `ø` → `o`). Characters with
//! no ASCII equivalent are left as they are.

use std::borrow::Cow;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::analysis::token::TokenStream;

/// Letters that carry no canonical or compatibility decomposition.
const SPECIAL_FOLDINGS: &[(char, &str)] = &[
    ('ß', "ss"),
    ('ẞ', "SS"),
    ('æ', "ae"),
    ('Æ', "AE"),
    ('œ', "oe"),
    ('Œ', "OE"),
    ('ø', "o"),
    ('Ø', "O"),
    ('đ', "d"),
    ('Đ', "D"),
    ('ð', "d"),
    ('Ð', "D"),
    ('ł', "l"),
    ('Ł', "L"),
    ('þ', "th"),
    ('Þ', "TH"),
    ('ı', "i"),
    ('ħ', "h"),
    ('Ħ', "H"),
    ('ŧ', "t"),
    ('Ŧ', "T"),
    ('‘', "'"),
    ('’', "'"),
    ('“', "\""),
    ('”', "\""),
    ('–', "-"),
    ('—', "-"),
];

/// Folds a string to its ASCII equivalent where one exists.
pub fn fold_to_ascii(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        return Cow::Borrowed(text);
    }

    let mut folded = String::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for c in text.chars() {
        if c.is_ascii() {
            folded.push(c);
            continue;
        }
        if let Some(&(_, replacement)) = SPECIAL_FOLDINGS.iter().find(|(from, _)| *from == c) {
            folded.push_str(replacement);
            continue;
        }

        let decomposed: String = c
            .encode_utf8(&mut buf)
            .nfkd()
            .filter(|d| !is_combining_mark(*d))
            .collect();
        if !decomposed.is_empty() && decomposed.is_ascii() {
            folded.push_str(&decomposed);
        } else {
            folded.push(c);
        }
    }
    Cow::Owned(folded)
}

/// A filter that folds token text to ASCII.
///
/// Token count, positions and offsets are unchanged.
#[derive(Clone, Debug, Default)]
pub struct AsciiFoldingFilter;

impl AsciiFoldingFilter {
    pub fn new() -> Self {
        AsciiFoldingFilter
    }

    pub fn filter<'a>(&self, tokens: TokenStream<'a>) -> TokenStream<'a> {
        Box::new(tokens.map(|mut token| {
            if let Cow::Owned(folded) = fold_to_ascii(&token.text) {
                token.text = folded;
            }
            token
        }))
    }
}
