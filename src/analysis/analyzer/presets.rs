//! Analyzer chains used for repository records.

use crate::analysis::analyzer::stage::Stage;

/// Free text such as descriptions and READMEs: markup stripped, words
/// lowercased, English stop words dropped.
pub fn standard() -> Vec<Stage> {
    vec![
        Stage::StripMarkup,
        Stage::tokenize(),
        Stage::Lowercase,
        Stage::stopwords(),
    ]
}

/// Identifiers such as repository names, where `fooBar`, `foo_bar` and
/// `foo-bar` should all be findable by their parts.
pub fn identifier() -> Vec<Stage> {
    vec![
        Stage::tokenize(),
        Stage::delimiter_split(),
        Stage::Fold,
        Stage::Lowercase,
    ]
}

/// Case- and accent-insensitive exact match on the whole value.
pub fn exact_folded() -> Vec<Stage> {
    vec![Stage::Keyword, Stage::Fold, Stage::Lowercase]
}

/// Byte-exact match on the whole value.
pub fn exact() -> Vec<Stage> {
    vec![Stage::Keyword]
}
