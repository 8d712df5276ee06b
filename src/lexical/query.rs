//! Parsed queries.
//!
//! A [`Query`] is a flat disjunction of field-scoped clauses. Every clause
//! already holds normalized terms, so executing a query never touches an
//! analyzer.

use std::fmt;

pub mod parser;

pub use parser::QueryParser;

/// One position of a phrase. Several terms at the same offset are
/// alternatives (e.g. `foo-bar`, `foobar` and `foo` from a delimiter split).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhraseSlot {
    /// Position relative to the first slot
    pub offset: u32,
    pub terms: Vec<String>,
}

/// A field-scoped query clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Clause {
    /// Matches documents containing `term` in `field`.
    Term { field: String, term: String },
    /// Matches documents containing the slots in order, at their relative
    /// offsets, in `field`.
    Phrase { field: String, slots: Vec<PhraseSlot> },
}

impl Clause {
    pub fn field(&self) -> &str {
        match self {
            Clause::Term { field, .. } | Clause::Phrase { field, .. } => field,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Term { field, term } => write!(f, "{field}:{term}"),
            Clause::Phrase { field, slots } => {
                let words: Vec<String> = slots.iter().map(|s| s.terms.join("|")).collect();
                write!(f, "{field}:\"{}\"", words.join(" "))
            }
        }
    }
}

/// A disjunction of clauses. A document matches if any clause matches; its
/// score is the sum of the matching clauses' scores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    pub fn new(clauses: Vec<Clause>) -> Self {
        let mut query = Query::default();
        for clause in clauses {
            query.push(clause);
        }
        query
    }

    /// Add a clause unless an identical one is already present.
    pub fn push(&mut self, clause: Clause) {
        if !self.clauses.contains(&clause) {
            self.clauses.push(clause);
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// A query without clauses matches nothing.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clauses: Vec<String> = self.clauses.iter().map(Clause::to_string).collect();
        f.write_str(&clauses.join(" OR "))
    }
}
