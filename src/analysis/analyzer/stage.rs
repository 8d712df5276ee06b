//! Stage descriptors and their compiled forms.
//!
//! [`Stage`] is the serializable description of one step of an analyzer
//! chain. Compiling a list of stages yields the three kinds of runtime step:
//! char filters, exactly one tokenizer and token filters. Each runtime kind is
//! a closed enum dispatched with `match`.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::char_filter::Transformation;
use crate::analysis::char_filter::html_strip::HtmlStripCharFilter;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::ascii_folding::AsciiFoldingFilter;
use crate::analysis::token_filter::lowercase::LowercaseFilter;
use crate::analysis::token_filter::stop::StopFilter;
use crate::analysis::token_filter::word_delimiter::{WordDelimiterConfig, WordDelimiterFilter};
use crate::analysis::tokenizer::keyword::KeywordTokenizer;
use crate::analysis::tokenizer::standard::{DEFAULT_MAX_TOKEN_LENGTH, StandardTokenizer};

fn default_max_token_length() -> usize {
    DEFAULT_MAX_TOKEN_LENGTH
}

/// One step of an analyzer chain.
///
/// Serialized with an internal `type` tag:
///
/// ```
/// use repodex::analysis::analyzer::Stage;
///
/// let stages: Vec<Stage> = serde_json::from_str(
///     r#"[{"type": "tokenize"}, {"type": "lowercase"}, {"type": "stopword_filter"}]"#,
/// ).unwrap();
/// assert_eq!(stages[0], Stage::Tokenize { max_token_length: 255 });
/// assert_eq!(stages[2], Stage::StopwordFilter { words: None });
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    /// Remove markup and decode entities before tokenization
    StripMarkup,
    /// Split on Unicode word boundaries
    Tokenize {
        #[serde(default = "default_max_token_length")]
        max_token_length: usize,
    },
    /// Emit the whole value as one token
    Keyword,
    /// Fold diacritics to ASCII
    Fold,
    /// Unicode lowercasing
    Lowercase,
    /// Split tokens on case, digit and punctuation boundaries
    DelimiterSplit(WordDelimiterConfig),
    /// Drop stop words; `None` selects the English default list
    StopwordFilter {
        #[serde(default)]
        words: Option<Vec<String>>,
    },
}

impl Stage {
    /// A word-boundary tokenizer with the default token length limit.
    pub fn tokenize() -> Self {
        Stage::Tokenize {
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
        }
    }

    /// A delimiter splitter with every option enabled.
    pub fn delimiter_split() -> Self {
        Stage::DelimiterSplit(WordDelimiterConfig::default())
    }

    /// A stop word filter using the English default list.
    pub fn stopwords() -> Self {
        Stage::StopwordFilter { words: None }
    }

    /// Short name used in error messages and debug output.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::StripMarkup => "strip_markup",
            Stage::Tokenize { .. } => "tokenize",
            Stage::Keyword => "keyword",
            Stage::Fold => "fold",
            Stage::Lowercase => "lowercase",
            Stage::DelimiterSplit(_) => "delimiter_split",
            Stage::StopwordFilter { .. } => "stopword_filter",
        }
    }

    pub(crate) fn kind(&self) -> StageKind {
        match self {
            Stage::StripMarkup => StageKind::CharFilter,
            Stage::Tokenize { .. } | Stage::Keyword => StageKind::Tokenizer,
            _ => StageKind::TokenFilter,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StageKind {
    CharFilter,
    Tokenizer,
    TokenFilter,
}

/// A compiled char filter.
#[derive(Clone, Debug)]
pub(crate) enum CharStage {
    StripMarkup(HtmlStripCharFilter),
}

impl CharStage {
    pub(crate) fn apply(&self, text: &str) -> (String, Vec<Transformation>) {
        match self {
            CharStage::StripMarkup(filter) => filter.filter(text),
        }
    }
}

/// A compiled tokenizer.
#[derive(Clone, Debug)]
pub(crate) enum TokenizerStage {
    Standard(StandardTokenizer),
    Keyword(KeywordTokenizer),
}

impl TokenizerStage {
    pub(crate) fn tokenize<'a>(&self, text: Cow<'a, str>) -> TokenStream<'a> {
        match self {
            TokenizerStage::Standard(tokenizer) => tokenizer.tokenize(text),
            TokenizerStage::Keyword(tokenizer) => tokenizer.tokenize(text),
        }
    }
}

/// A compiled token filter.
#[derive(Clone, Debug)]
pub(crate) enum FilterStage {
    Fold(AsciiFoldingFilter),
    Lowercase(LowercaseFilter),
    DelimiterSplit(WordDelimiterFilter),
    Stopwords(StopFilter),
}

impl FilterStage {
    pub(crate) fn apply<'a>(&'a self, tokens: TokenStream<'a>) -> TokenStream<'a> {
        match self {
            FilterStage::Fold(filter) => filter.filter(tokens),
            FilterStage::Lowercase(filter) => filter.filter(tokens),
            FilterStage::DelimiterSplit(filter) => filter.filter(tokens),
            FilterStage::Stopwords(filter) => filter.filter(tokens),
        }
    }
}

/// The runtime form of one stage.
pub(crate) enum Compiled {
    Char(CharStage),
    Tokenizer(TokenizerStage),
    Filter(FilterStage),
}

/// Compile a single descriptor. Parameter validation happens here; ordering
/// rules are checked by the analyzer that assembles the chain.
pub(crate) fn compile(stage: &Stage) -> std::result::Result<Compiled, String> {
    let compiled = match stage {
        Stage::StripMarkup => Compiled::Char(CharStage::StripMarkup(HtmlStripCharFilter::new())),
        Stage::Tokenize { max_token_length } => {
            if *max_token_length == 0 {
                return Err("tokenize: max_token_length must be greater than zero".to_string());
            }
            Compiled::Tokenizer(TokenizerStage::Standard(
                StandardTokenizer::with_max_token_length(*max_token_length),
            ))
        }
        Stage::Keyword => Compiled::Tokenizer(TokenizerStage::Keyword(KeywordTokenizer::new())),
        Stage::Fold => Compiled::Filter(FilterStage::Fold(AsciiFoldingFilter::new())),
        Stage::Lowercase => Compiled::Filter(FilterStage::Lowercase(LowercaseFilter::new())),
        Stage::DelimiterSplit(config) => {
            if config.max_sub_tokens == 0 {
                return Err("delimiter_split: max_sub_tokens must be greater than zero".to_string());
            }
            if !config.generates_output() {
                return Err("delimiter_split: configuration emits no tokens".to_string());
            }
            Compiled::Filter(FilterStage::DelimiterSplit(WordDelimiterFilter::new(
                config.clone(),
            )))
        }
        Stage::StopwordFilter { words } => {
            let filter = match words {
                Some(words) => StopFilter::from_words(words),
                None => StopFilter::new(),
            };
            Compiled::Filter(FilterStage::Stopwords(filter))
        }
    };
    Ok(compiled)
}
