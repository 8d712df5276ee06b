//! Query string parser.
//!
//! Syntax, all items combined with OR:
//!
//! - `word`: searched in every target field
//! - `"some phrase"`: phrase searched in every target field
//! - `field:word` / `field:"some phrase"`: restricted to one field
//! - `OR`: accepted and ignored, since OR is implied
//!
//! A `prefix:` whose prefix is not a known field is kept as part of the
//! word, so `https://github.com/acme` is an ordinary word.
//!
//! Every item is normalized with the analyzer registered for the field it
//! is searched in. This must be the registry the index was written with.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::analysis::analyzer::AnalyzerRegistry;
use crate::analysis::token::Token;
use crate::error::{RepodexError, Result};
use crate::lexical::query::{Clause, PhraseSlot, Query};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Word { field: Option<String>, text: String },
    Quoted { field: Option<String>, text: String },
}

/// Parses query strings into [`Query`]s.
#[derive(Debug, Clone)]
pub struct QueryParser {
    registry: Arc<AnalyzerRegistry>,
    target_fields: Vec<String>,
    key_field: String,
}

impl QueryParser {
    /// Create a parser searching `target_fields` by default. Terms for
    /// `key_field` are matched verbatim.
    pub fn new<K: Into<String>>(
        registry: Arc<AnalyzerRegistry>,
        target_fields: Vec<String>,
        key_field: K,
    ) -> Self {
        QueryParser {
            registry,
            target_fields,
            key_field: key_field.into(),
        }
    }

    pub fn target_fields(&self) -> &[String] {
        &self.target_fields
    }

    fn is_known_field(&self, field: &str) -> bool {
        field == self.key_field
            || self.target_fields.iter().any(|f| f == field)
            || self.registry.has_field(field)
    }

    /// Parse `input`. A blank string or malformed syntax is a
    /// [`QueryParse`](RepodexError::QueryParse) error. Input whose terms all
    /// analyze away (e.g. only stop words) yields an empty query.
    pub fn parse(&self, input: &str) -> Result<Query> {
        if input.trim().is_empty() {
            return Err(RepodexError::query_parse("query is empty"));
        }

        let mut query = Query::default();
        for item in self.lex(input)? {
            let (field, text, quoted) = match item {
                Item::Word { field, text } => (field, text, false),
                Item::Quoted { field, text } => (field, text, true),
            };
            let fields = match field {
                Some(field) => vec![field],
                None => self.target_fields.clone(),
            };
            for field in fields {
                for clause in self.clauses_for(&field, &text, quoted) {
                    query.push(clause);
                }
            }
        }
        Ok(query)
    }

    fn clauses_for(&self, field: &str, text: &str, quoted: bool) -> Vec<Clause> {
        if field == self.key_field {
            return vec![Clause::Term {
                field: field.to_string(),
                term: text.to_string(),
            }];
        }

        let tokens: Vec<Token> = self.registry.analyze(field, text).collect();
        let mut by_position: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for token in tokens {
            let terms = by_position.entry(token.position).or_default();
            if !terms.contains(&token.text) {
                terms.push(token.text);
            }
        }

        if quoted && by_position.len() > 1 {
            let first = by_position.keys().next().copied().unwrap_or(0);
            let slots = by_position
                .into_iter()
                .map(|(position, terms)| PhraseSlot {
                    offset: (position - first) as u32,
                    terms,
                })
                .collect();
            return vec![Clause::Phrase {
                field: field.to_string(),
                slots,
            }];
        }

        by_position
            .into_values()
            .flatten()
            .map(|term| Clause::Term {
                field: field.to_string(),
                term,
            })
            .collect()
    }

    fn lex(&self, input: &str) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut rest = input;

        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }

            if let Some(after) = rest.strip_prefix('"') {
                let (text, remaining) = read_quoted(after)?;
                if text.trim().is_empty() {
                    return Err(RepodexError::query_parse("empty phrase"));
                }
                items.push(Item::Quoted { field: None, text });
                rest = remaining;
                continue;
            }

            let end = rest
                .find(|c: char| c.is_whitespace() || c == ':' || c == '"')
                .unwrap_or(rest.len());
            let (head, tail) = rest.split_at(end);

            if let Some(after_colon) = tail.strip_prefix(':') {
                if head.is_empty() {
                    return Err(RepodexError::query_parse(format!(
                        "missing field name before ':' in '{}'",
                        word_at(rest)
                    )));
                }
                if self.is_known_field(head) {
                    let field = Some(head.to_string());
                    if let Some(after_quote) = after_colon.strip_prefix('"') {
                        let (text, remaining) = read_quoted(after_quote)?;
                        if text.trim().is_empty() {
                            return Err(RepodexError::query_parse(format!(
                                "empty phrase for field '{head}'"
                            )));
                        }
                        items.push(Item::Quoted { field, text });
                        rest = remaining;
                    } else {
                        let text = word_at(after_colon);
                        if text.is_empty() {
                            return Err(RepodexError::query_parse(format!(
                                "missing value for field '{head}'"
                            )));
                        }
                        items.push(Item::Word {
                            field,
                            text: text.to_string(),
                        });
                        rest = &after_colon[text.len()..];
                    }
                    continue;
                }
                // Not a field: the colon is part of the word.
                let text = word_at(rest);
                items.push(Item::Word {
                    field: None,
                    text: text.to_string(),
                });
                rest = &rest[text.len()..];
                continue;
            }

            if head != "OR" {
                items.push(Item::Word {
                    field: None,
                    text: head.to_string(),
                });
            }
            rest = tail;
        }

        Ok(items)
    }
}

/// Read up to the closing quote; returns the quoted text and what follows.
fn read_quoted(input: &str) -> Result<(String, &str)> {
    match input.find('"') {
        Some(end) => Ok((input[..end].to_string(), &input[end + 1..])),
        None => Err(RepodexError::query_parse("unterminated quote")),
    }
}

/// The run of non-whitespace, non-quote characters at the start of `input`.
fn word_at(input: &str) -> &str {
    let end = input
        .find(|c: char| c.is_whitespace() || c == '"')
        .unwrap_or(input.len());
    &input[..end]
}
