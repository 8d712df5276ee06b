//! Field analyzer: a compiled, immutable analyzer chain.
//!
//! # Examples
//!
//! ```
//! use repodex::analysis::analyzer::{FieldAnalyzer, Stage};
//!
//! let analyzer = FieldAnalyzer::new(
//!     "owner",
//!     vec![Stage::Keyword, Stage::Fold, Stage::Lowercase],
//! ).unwrap();
//!
//! let tokens: Vec<_> = analyzer.analyze("Zoë Smith").map(|t| t.text).collect();
//! assert_eq!(tokens, vec!["zoe smith"]);
//! ```

use std::borrow::Cow;
use std::fmt;

use crate::analysis::analyzer::stage::{
    CharStage, Compiled, FilterStage, Stage, StageKind, TokenizerStage, compile,
};
use crate::analysis::char_filter::correct_offset;
use crate::analysis::token::{Token, TokenStream};
use crate::error::{RepodexError, Result};

/// An analyzer chain bound to one logical field.
///
/// The chain always runs char filters, then one tokenizer, then token
/// filters, in the order they were declared.
#[derive(Clone)]
pub struct FieldAnalyzer {
    name: String,
    stages: Vec<Stage>,
    char_filters: Vec<CharStage>,
    tokenizer: TokenizerStage,
    filters: Vec<FilterStage>,
}

impl FieldAnalyzer {
    /// Compile `stages` into an analyzer.
    ///
    /// Fails with [`RepodexError::Analysis`] when the chain has no tokenizer
    /// or more than one, when a char filter follows the tokenizer, when a
    /// token filter precedes it, or when a stage has invalid parameters.
    pub fn new<S: Into<String>>(name: S, stages: Vec<Stage>) -> Result<Self> {
        let name = name.into();
        let mut char_filters = Vec::new();
        let mut tokenizer: Option<TokenizerStage> = None;
        let mut filters = Vec::new();

        for stage in &stages {
            match (stage.kind(), tokenizer.is_some()) {
                (StageKind::CharFilter, true) => {
                    return Err(RepodexError::analysis(format!(
                        "analyzer '{name}': '{stage}' must come before the tokenizer"
                    )));
                }
                (StageKind::Tokenizer, true) => {
                    return Err(RepodexError::analysis(format!(
                        "analyzer '{name}': more than one tokenizer ('{stage}')"
                    )));
                }
                (StageKind::TokenFilter, false) => {
                    return Err(RepodexError::analysis(format!(
                        "analyzer '{name}': token filter '{stage}' must follow a tokenizer"
                    )));
                }
                _ => {}
            }

            let compiled = compile(stage)
                .map_err(|msg| RepodexError::analysis(format!("analyzer '{name}': {msg}")))?;
            match compiled {
                Compiled::Char(c) => char_filters.push(c),
                Compiled::Tokenizer(t) => tokenizer = Some(t),
                Compiled::Filter(f) => filters.push(f),
            }
        }

        let tokenizer = tokenizer.ok_or_else(|| {
            RepodexError::analysis(format!("analyzer '{name}': no tokenizer stage"))
        })?;

        Ok(FieldAnalyzer {
            name,
            stages,
            char_filters,
            tokenizer,
            filters,
        })
    }

    /// The analyzer's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stage descriptors this analyzer was built from.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Whether the tokenizer keeps the whole value as one token.
    pub fn is_keyword(&self) -> bool {
        matches!(self.tokenizer, TokenizerStage::Keyword(_))
    }

    /// Analyze `text` into a lazy token stream.
    ///
    /// Empty text yields an empty stream. Offsets always refer to `text`.
    pub fn analyze<'a>(&'a self, text: &'a str) -> TokenStream<'a> {
        if self.char_filters.is_empty() {
            return self.run_filters(self.tokenizer.tokenize(Cow::Borrowed(text)));
        }

        let mut filtered = Cow::Borrowed(text);
        let mut transformations = Vec::with_capacity(self.char_filters.len());
        for char_filter in &self.char_filters {
            let (next, applied) = char_filter.apply(&filtered);
            filtered = Cow::Owned(next);
            transformations.push(applied);
        }

        let tokens = self.run_filters(self.tokenizer.tokenize(filtered));
        Box::new(tokens.map(move |mut token| {
            // Undo the char filters from last to first.
            for applied in transformations.iter().rev() {
                token.start_offset = correct_offset(token.start_offset, applied, false);
                token.end_offset = correct_offset(token.end_offset, applied, true);
            }
            token
        }))
    }

    /// Analyze `text` and collect the tokens.
    pub fn analyze_to_vec(&self, text: &str) -> Vec<Token> {
        self.analyze(text).collect()
    }

    fn run_filters<'a>(&'a self, mut tokens: TokenStream<'a>) -> TokenStream<'a> {
        for filter in &self.filters {
            tokens = filter.apply(tokens);
        }
        tokens
    }
}

impl fmt::Debug for FieldAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAnalyzer")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(analyzer: &FieldAnalyzer, text: &str) -> Vec<String> {
        analyzer.analyze(text).map(|t| t.text).collect()
    }

    #[test]
    fn test_rejects_missing_tokenizer() {
        let err = FieldAnalyzer::new("x", vec![]).unwrap_err();
        assert!(matches!(err, RepodexError::Analysis(_)));
    }

    #[test]
    fn test_rejects_two_tokenizers() {
        let err = FieldAnalyzer::new("x", vec![Stage::tokenize(), Stage::Keyword]).unwrap_err();
        assert!(err.to_string().contains("more than one tokenizer"));
    }

    #[test]
    fn test_rejects_misplaced_stages() {
        let err = FieldAnalyzer::new("x", vec![Stage::tokenize(), Stage::StripMarkup]).unwrap_err();
        assert!(err.to_string().contains("before the tokenizer"));

        let err = FieldAnalyzer::new("x", vec![Stage::Lowercase, Stage::tokenize()]).unwrap_err();
        assert!(err.to_string().contains("must follow a tokenizer"));
    }

    #[test]
    fn test_body_chain() {
        let analyzer = FieldAnalyzer::new(
            "body",
            vec![
                Stage::StripMarkup,
                Stage::tokenize(),
                Stage::Lowercase,
                Stage::stopwords(),
            ],
        )
        .unwrap();

        let tokens = analyzer.analyze_to_vec("<h1>The Rust</h1><p>Book &amp; more</p>");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["rust", "book", "more"]);
        // "the" was dropped but its position is kept
        assert_eq!(tokens[0].position, 1);
        assert_eq!(tokens[2].position, 3);
    }

    #[test]
    fn test_offsets_refer_to_raw_text() {
        let analyzer =
            FieldAnalyzer::new("body", vec![Stage::StripMarkup, Stage::tokenize()]).unwrap();
        let raw = "<p>alpha <b>beta</b></p>";
        for token in analyzer.analyze(raw) {
            assert_eq!(&raw[token.start_offset..token.end_offset], token.text);
        }
    }

    #[test]
    fn test_deterministic() {
        let analyzer = FieldAnalyzer::new(
            "name",
            vec![
                Stage::tokenize(),
                Stage::delimiter_split(),
                Stage::Fold,
                Stage::Lowercase,
            ],
        )
        .unwrap();
        let input = "ÜberTool v2_beta-Release";
        assert_eq!(analyzer.analyze_to_vec(input), analyzer.analyze_to_vec(input));
        assert!(texts(&analyzer, input).contains(&"ubertool".to_string()));
    }

    #[test]
    fn test_empty_input() {
        let analyzer = FieldAnalyzer::new("kw", vec![Stage::Keyword]).unwrap();
        assert!(texts(&analyzer, "").is_empty());
    }
}
