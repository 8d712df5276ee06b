//! Immutable index segments.
//!
//! A [`Segment`] holds stored fields and positional postings for a batch of
//! documents. Segments never change once frozen; deletions are tracked
//! beside them as a set of local ordinals. Documents inside a segment are
//! ordered by their global document id, which is also the insertion order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::token::Token;
use crate::error::{RepodexError, Result};

/// Global, monotonically increasing document identifier.
pub type DocId = u64;

/// Deleted local ordinals of one segment.
pub type Deletions = BTreeSet<u32>;

/// Occurrences of one term in one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Local ordinal of the document inside its segment
    pub doc: u32,
    /// Token positions, ascending
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// All postings of one term, ordered by document ordinal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Posting> {
        self.postings.iter()
    }

    /// Find the posting of a document by ordinal.
    pub fn get(&self, doc: u32) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc, |p| p.doc)
            .ok()
            .map(|i| &self.postings[i])
    }

    fn push(&mut self, posting: Posting) {
        self.postings.push(posting);
    }
}

/// Stored data of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDoc {
    pub doc_id: DocId,
    pub key: String,
    /// Stored field values returned with hits
    pub stored: BTreeMap<String, String>,
    /// Number of tokens indexed per field
    pub field_lengths: BTreeMap<String, u32>,
}

/// One analyzed field of a document.
#[derive(Debug, Clone)]
pub struct AnalyzedField {
    pub name: String,
    pub tokens: Vec<Token>,
}

/// A document after analysis, ready to be added to a segment.
#[derive(Debug, Clone)]
pub struct AnalyzedDocument {
    pub key: String,
    pub stored: BTreeMap<String, String>,
    pub fields: Vec<AnalyzedField>,
}

/// An immutable segment.
#[derive(Debug, Serialize, Deserialize)]
pub struct Segment {
    id: u64,
    docs: Vec<StoredDoc>,
    /// field → term → postings
    postings: BTreeMap<String, BTreeMap<String, PostingList>>,
    #[serde(skip)]
    keys: HashMap<String, u32>,
}

impl Segment {
    fn new(
        id: u64,
        docs: Vec<StoredDoc>,
        postings: BTreeMap<String, BTreeMap<String, PostingList>>,
    ) -> Self {
        let mut segment = Segment {
            id,
            docs,
            postings,
            keys: HashMap::new(),
        };
        segment.rebuild_keys();
        segment
    }

    fn rebuild_keys(&mut self) {
        // Later ordinals win: an upserted key's older copy is already deleted.
        self.keys = self
            .docs
            .iter()
            .enumerate()
            .map(|(ord, doc)| (doc.key.clone(), ord as u32))
            .collect();
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of documents, including deleted ones.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn doc(&self, ord: u32) -> Option<&StoredDoc> {
        self.docs.get(ord as usize)
    }

    pub fn docs(&self) -> &[StoredDoc] {
        &self.docs
    }

    /// Ordinal of the newest document with `key`.
    pub fn ordinal_of_key(&self, key: &str) -> Option<u32> {
        self.keys.get(key).copied()
    }

    /// Ordinal of the document with global id `doc_id`.
    pub fn ordinal_of_doc_id(&self, doc_id: DocId) -> Option<u32> {
        self.docs
            .binary_search_by_key(&doc_id, |d| d.doc_id)
            .ok()
            .map(|i| i as u32)
    }

    pub fn postings(&self, field: &str, term: &str) -> Option<&PostingList> {
        self.postings.get(field).and_then(|terms| terms.get(term))
    }

    /// Number of distinct terms in `field`.
    pub fn term_count(&self, field: &str) -> usize {
        self.postings.get(field).map_or(0, |terms| terms.len())
    }

    /// Serialize with a trailing CRC32 checksum.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        with_checksum(bincode::serialize(self)?)
    }

    /// Deserialize, verifying the trailing checksum.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut segment: Segment = bincode::deserialize(verify_checksum(data)?)?;
        segment.rebuild_keys();
        Ok(segment)
    }

    /// Merge the live documents of `inputs` into a new segment.
    ///
    /// Documents keep their global ids and stay ordered by them.
    pub fn merge(id: u64, inputs: &[(Arc<Segment>, Arc<Deletions>)]) -> Segment {
        let mut live: Vec<(DocId, usize, u32)> = inputs
            .iter()
            .enumerate()
            .flat_map(|(s, (segment, deletions))| {
                segment
                    .docs
                    .iter()
                    .enumerate()
                    .filter(move |(ord, _)| !deletions.contains(&(*ord as u32)))
                    .map(move |(ord, doc)| (doc.doc_id, s, ord as u32))
            })
            .collect();
        live.sort_unstable_by_key(|&(doc_id, _, _)| doc_id);

        let mut remap: AHashMap<(usize, u32), u32> = AHashMap::with_capacity(live.len());
        let mut docs = Vec::with_capacity(live.len());
        for (new_ord, &(_, s, ord)) in live.iter().enumerate() {
            remap.insert((s, ord), new_ord as u32);
            docs.push(inputs[s].0.docs[ord as usize].clone());
        }

        let mut postings: BTreeMap<String, BTreeMap<String, PostingList>> = BTreeMap::new();
        for (s, (segment, _)) in inputs.iter().enumerate() {
            for (field, terms) in &segment.postings {
                let merged_terms = postings.entry(field.clone()).or_default();
                for (term, list) in terms {
                    for posting in list.iter() {
                        if let Some(&doc) = remap.get(&(s, posting.doc)) {
                            merged_terms.entry(term.clone()).or_default().push(Posting {
                                doc,
                                positions: posting.positions.clone(),
                            });
                        }
                    }
                }
            }
        }
        for terms in postings.values_mut() {
            terms.retain(|_, list| !list.is_empty());
            for list in terms.values_mut() {
                list.postings.sort_unstable_by_key(|p| p.doc);
            }
        }
        postings.retain(|_, terms| !terms.is_empty());

        Segment::new(id, docs, postings)
    }
}

/// A segment paired with the deletions visible at the time it was captured.
#[derive(Debug, Clone)]
pub struct SegmentView {
    pub segment: Arc<Segment>,
    pub deletions: Arc<Deletions>,
}

impl SegmentView {
    pub fn is_live(&self, ord: u32) -> bool {
        !self.deletions.contains(&ord)
    }

    pub fn live_count(&self) -> usize {
        self.segment.len() - self.deletions.len()
    }

    /// Live documents with their ordinals.
    pub fn live_docs(&self) -> impl Iterator<Item = (u32, &StoredDoc)> {
        self.segment
            .docs()
            .iter()
            .enumerate()
            .map(|(ord, doc)| (ord as u32, doc))
            .filter(|(ord, _)| self.is_live(*ord))
    }
}

/// Serialize a deletion set with a trailing checksum.
pub fn deletions_to_bytes(deletions: &Deletions) -> Result<Vec<u8>> {
    with_checksum(bincode::serialize(deletions)?)
}

/// Deserialize a deletion set, verifying its checksum.
pub fn deletions_from_bytes(data: &[u8]) -> Result<Deletions> {
    Ok(bincode::deserialize(verify_checksum(data)?)?)
}

fn with_checksum(mut data: Vec<u8>) -> Result<Vec<u8>> {
    let checksum = crc32fast::hash(&data);
    data.extend_from_slice(&checksum.to_le_bytes());
    Ok(data)
}

fn verify_checksum(data: &[u8]) -> Result<&[u8]> {
    if data.len() < 4 {
        return Err(RepodexError::storage("segment file is truncated"));
    }
    let (body, footer) = data.split_at(data.len() - 4);
    let mut expected = [0u8; 4];
    expected.copy_from_slice(footer);
    if crc32fast::hash(body) != u32::from_le_bytes(expected) {
        return Err(RepodexError::storage("segment file checksum mismatch"));
    }
    Ok(body)
}

/// Mutable in-memory segment that accumulates newly added documents.
#[derive(Debug, Default)]
pub struct SegmentBuilder {
    docs: Vec<StoredDoc>,
    postings: AHashMap<String, AHashMap<String, PostingList>>,
    keys: AHashMap<String, u32>,
    deleted: Deletions,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered documents, including deleted ones.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Number of buffered documents that are still live.
    pub fn live_count(&self) -> usize {
        self.docs.len() - self.deleted.len()
    }

    /// Add an analyzed document under global id `doc_id`.
    pub fn add(&mut self, doc_id: DocId, doc: AnalyzedDocument) -> u32 {
        let ord = self.docs.len() as u32;
        let mut field_lengths = BTreeMap::new();

        for field in doc.fields {
            let mut by_term: AHashMap<String, Vec<u32>> = AHashMap::new();
            for token in &field.tokens {
                by_term
                    .entry(token.text.clone())
                    .or_default()
                    .push(token.position as u32);
            }
            let terms = self.postings.entry(field.name.clone()).or_default();
            for (term, mut positions) in by_term {
                positions.sort_unstable();
                terms.entry(term).or_default().push(Posting {
                    doc: ord,
                    positions,
                });
            }
            *field_lengths.entry(field.name).or_insert(0) += field.tokens.len() as u32;
        }

        self.keys.insert(doc.key.clone(), ord);
        self.docs.push(StoredDoc {
            doc_id,
            key: doc.key,
            stored: doc.stored,
            field_lengths,
        });
        ord
    }

    /// Mark the live buffered document with `key` as deleted.
    pub fn delete_key(&mut self, key: &str) -> bool {
        match self.keys.get(key) {
            Some(&ord) => self.deleted.insert(ord),
            None => false,
        }
    }

    /// Turn the buffer into an immutable segment and its deletion set.
    pub fn freeze(self, id: u64) -> (Segment, Deletions) {
        let postings = self
            .postings
            .into_iter()
            .map(|(field, terms)| (field, terms.into_iter().collect::<BTreeMap<_, _>>()))
            .collect();
        (Segment::new(id, self.docs, postings), self.deleted)
    }
}
