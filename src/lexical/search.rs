//! Query execution against a snapshot.

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::lexical::query::{Clause, PhraseSlot, Query};
use crate::lexical::scoring::Bm25;
use crate::lexical::segment::{DocId, SegmentView};
use crate::lexical::snapshot::{FieldStats, Snapshot};

/// A matching document.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub doc_id: DocId,
    pub score: f32,
    pub key: String,
    /// Stored field values
    pub fields: BTreeMap<String, String>,
}

impl Hit {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Ranked results of one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// At most `limit` hits, best first
    pub hits: Vec<Hit>,
    /// Number of matching documents, which may exceed `hits.len()`
    pub total_hits: usize,
    pub max_score: f32,
}

/// Executes queries against one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Searcher<'a> {
    snapshot: &'a Snapshot,
    scoring: Bm25,
}

/// (segment index, ordinal) → accumulated score
type Scores = AHashMap<(usize, u32), f32>;

impl<'a> Searcher<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Searcher {
            snapshot,
            scoring: Bm25::default(),
        }
    }

    pub fn with_scoring(mut self, scoring: Bm25) -> Self {
        self.scoring = scoring;
        self
    }

    /// Score every live document matching `query` and return the best
    /// `limit`. Ties on score are broken by ascending document id, which is
    /// insertion order.
    pub fn search(&self, query: &Query, limit: usize) -> SearchResults {
        let mut scores = Scores::new();
        for clause in query.clauses() {
            match clause {
                Clause::Term { field, term } => self.score_term(field, term, &mut scores),
                Clause::Phrase { field, slots } => self.score_phrase(field, slots, &mut scores),
            }
        }

        let segments = self.snapshot.segments();
        let mut matches: Vec<(f32, DocId, usize, u32)> = scores
            .into_iter()
            .filter_map(|((seg, ord), score)| {
                segments[seg]
                    .segment
                    .doc(ord)
                    .map(|doc| (score, doc.doc_id, seg, ord))
            })
            .collect();
        matches.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let total_hits = matches.len();
        let max_score = matches.first().map_or(0.0, |m| m.0);
        let hits = matches
            .into_iter()
            .take(limit)
            .filter_map(|(score, doc_id, seg, ord)| {
                segments[seg].segment.doc(ord).map(|doc| Hit {
                    doc_id,
                    score,
                    key: doc.key.clone(),
                    fields: doc.stored.clone(),
                })
            })
            .collect();

        SearchResults {
            hits,
            total_hits,
            max_score,
        }
    }

    fn field_length(view: &SegmentView, ord: u32, field: &str) -> f32 {
        view.segment
            .doc(ord)
            .and_then(|doc| doc.field_lengths.get(field))
            .map_or(0.0, |&len| len as f32)
    }

    fn score_term(&self, field: &str, term: &str, scores: &mut Scores) {
        let stats = self.snapshot.field_stats(field);
        let doc_freq = self.snapshot.doc_freq(field, term);
        if doc_freq == 0 {
            return;
        }
        let idf = self.scoring.idf(stats.doc_count, doc_freq);
        let avg_length = stats.avg_length();

        for (seg, view) in self.snapshot.segments().iter().enumerate() {
            let Some(postings) = view.segment.postings(field, term) else {
                continue;
            };
            for posting in postings.iter().filter(|p| view.is_live(p.doc)) {
                let length = Self::field_length(view, posting.doc, field);
                let score =
                    self.scoring
                        .score(posting.frequency() as f32, idf, length, avg_length);
                *scores.entry((seg, posting.doc)).or_insert(0.0) += score;
            }
        }
    }

    /// Phrase weight is the sum over slots of the rarest alternative's idf.
    fn phrase_idf(&self, field: &str, slots: &[PhraseSlot], stats: FieldStats) -> Option<f32> {
        let mut idf = 0.0;
        for slot in slots {
            let best = slot
                .terms
                .iter()
                .map(|term| self.snapshot.doc_freq(field, term))
                .filter(|&df| df > 0)
                .map(|df| self.scoring.idf(stats.doc_count, df))
                .fold(None, |acc: Option<f32>, x| Some(acc.map_or(x, |a| a.max(x))));
            idf += best?;
        }
        Some(idf)
    }

    fn score_phrase(&self, field: &str, slots: &[PhraseSlot], scores: &mut Scores) {
        let Some(first) = slots.first() else {
            return;
        };
        let stats = self.snapshot.field_stats(field);
        let Some(idf) = self.phrase_idf(field, slots, stats) else {
            return;
        };
        let avg_length = stats.avg_length();

        for (seg, view) in self.snapshot.segments().iter().enumerate() {
            let mut candidates: Vec<u32> = first
                .terms
                .iter()
                .filter_map(|term| view.segment.postings(field, term))
                .flat_map(|postings| postings.iter().map(|p| p.doc))
                .filter(|&doc| view.is_live(doc))
                .collect();
            candidates.sort_unstable();
            candidates.dedup();

            for doc in candidates {
                let freq = phrase_frequency(view, field, slots, doc);
                if freq == 0 {
                    continue;
                }
                let length = Self::field_length(view, doc, field);
                let score = self.scoring.score(freq as f32, idf, length, avg_length);
                *scores.entry((seg, doc)).or_insert(0.0) += score;
            }
        }
    }
}

/// Sorted positions in `doc` of any of `terms`.
fn slot_positions(view: &SegmentView, field: &str, terms: &[String], doc: u32) -> Vec<u32> {
    let mut positions: Vec<u32> = terms
        .iter()
        .filter_map(|term| view.segment.postings(field, term))
        .filter_map(|postings| postings.get(doc))
        .flat_map(|posting| posting.positions.iter().copied())
        .collect();
    positions.sort_unstable();
    positions.dedup();
    positions
}

/// Number of positions at which the whole phrase occurs in `doc`.
fn phrase_frequency(view: &SegmentView, field: &str, slots: &[PhraseSlot], doc: u32) -> usize {
    let per_slot: Vec<Vec<u32>> = slots
        .iter()
        .map(|slot| slot_positions(view, field, &slot.terms, doc))
        .collect();
    let Some((starts, rest)) = per_slot.split_first() else {
        return 0;
    };

    starts
        .iter()
        .filter(|&&start| {
            rest.iter().zip(&slots[1..]).all(|(positions, slot)| {
                positions
                    .binary_search(&(start + slot.offset))
                    .is_ok()
            })
        })
        .count()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::analysis::analyzer::AnalyzerRegistry;
    use crate::document::document::Document;
    use crate::document::fields;
    use crate::lexical::query::QueryParser;
    use crate::lexical::snapshot::SnapshotManager;
    use crate::lexical::writer::{IndexWriter, IndexWriterConfig};
    use crate::storage::memory::MemoryStorage;

    struct Fixture {
        manager: SnapshotManager,
        parser: QueryParser,
    }

    fn fixture(docs: &[(&str, &str, &str)]) -> Fixture {
        let registry = Arc::new(AnalyzerRegistry::repositories().unwrap());
        let mut writer = IndexWriter::open(
            Arc::new(MemoryStorage::new()),
            Arc::clone(&registry),
            IndexWriterConfig::default(),
        )
        .unwrap();
        for (url, name, description) in docs {
            let doc = Document::builder(fields::URL, *url)
                .stored_text(fields::NAME, *name)
                .stored_text(fields::DESCRIPTION, *description)
                .build();
            writer.upsert(doc).unwrap();
        }
        let manager = SnapshotManager::new(Arc::new(Mutex::new(writer)));
        manager.refresh().unwrap();
        let parser = QueryParser::new(
            registry,
            fields::DEFAULT_SEARCH.iter().map(|f| f.to_string()).collect(),
            fields::URL,
        );
        Fixture { manager, parser }
    }

    impl Fixture {
        fn search(&self, query: &str, limit: usize) -> SearchResults {
            let query = self.parser.parse(query).unwrap();
            let snapshot = self.manager.acquire().unwrap();
            Searcher::new(&snapshot).search(&query, limit)
        }

        fn keys(&self, query: &str) -> Vec<String> {
            self.search(query, 10).hits.into_iter().map(|h| h.key).collect()
        }
    }

    #[test]
    fn test_term_ranking() {
        let fixture = fixture(&[
            ("a", "alpha", "rocket engine"),
            ("b", "beta", "rocket rocket rocket"),
            ("c", "gamma", "boat"),
        ]);
        let results = fixture.search("rocket", 10);
        assert_eq!(results.total_hits, 2);
        assert_eq!(results.hits[0].key, "b");
        assert_eq!(results.max_score, results.hits[0].score);
        assert_eq!(results.hits[0].field(fields::NAME), Some("beta"));
    }

    #[test]
    fn test_limit_and_ties() {
        let fixture = fixture(&[
            ("a", "same", "x"),
            ("b", "same", "x"),
            ("c", "same", "x"),
        ]);
        let results = fixture.search("same", 2);
        assert_eq!(results.total_hits, 3);
        let keys: Vec<_> = results.hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(fixture.search("same", 0).hits.len(), 0);
    }

    #[test]
    fn test_phrase_requires_adjacency() {
        let fixture = fixture(&[
            ("a", "one", "fast red rocket"),
            ("b", "two", "red fast rocket"),
        ]);
        assert_eq!(fixture.keys("\"fast red\""), vec!["a"]);
        assert_eq!(fixture.keys("description:\"red rocket\""), vec!["a"]);
    }

    #[test]
    fn test_delimiter_split_phrase() {
        let fixture = fixture(&[("a", "PowerShot", ""), ("b", "Shot Power", "")]);
        assert_eq!(fixture.keys("name:\"power shot\""), vec!["a"]);
        assert_eq!(fixture.keys("powershot"), vec!["a"]);
    }

    #[test]
    fn test_key_field_exact() {
        let fixture = fixture(&[("https://x/A", "a", ""), ("https://x/b", "b", "")]);
        assert_eq!(fixture.keys("url:https://x/A"), vec!["https://x/A"]);
        assert!(fixture.keys("url:https://x/a").is_empty());
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let fixture = fixture(&[("a", "the", "")]);
        let results = fixture.search("description:the", 10);
        assert_eq!(results.total_hits, 0);
        assert_eq!(results.max_score, 0.0);
    }
}
