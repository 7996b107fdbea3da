//! Retrieval over a session log.
//!
//! [`Retriever`] reads a session's entries and ranks them with a pluggable
//! [`RetrievalStrategy`]. The default is [`FuzzyKeywordStrategy`], an
//! approximate substring match with a similarity threshold.

use std::sync::Arc;
use stepwise_core::session::{RetrievalStrategy, SessionEntry, SessionStore, Snippet};
use tracing::{debug, warn};

/// Default number of snippets returned per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Default minimum similarity for a match.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Query terms shorter than this are ignored.
const MIN_TERM_CHARS: usize = 3;

/// Approximate keyword matching.
///
/// The query is split into lowercase terms. Each term is scored against an
/// entry's serialized text by its best approximate-substring match:
/// `1 - edits / term_len`, where `edits` is the smallest edit distance
/// between the term and any substring of the text. An entry's score is the
/// mean over terms; entries scoring below the threshold are dropped.
pub struct FuzzyKeywordStrategy {
    threshold: f32,
}

impl FuzzyKeywordStrategy {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(f32::EPSILON, 1.0),
        }
    }

    fn terms(query: &str) -> Vec<Vec<char>> {
        let lower = query.to_lowercase();
        let mut terms: Vec<Vec<char>> = Vec::new();
        for word in lower.split(|c: char| !c.is_alphanumeric()) {
            if word.chars().count() < MIN_TERM_CHARS {
                continue;
            }
            let chars: Vec<char> = word.chars().collect();
            if !terms.contains(&chars) {
                terms.push(chars);
            }
        }
        if terms.is_empty() {
            let whole = lower.trim();
            if !whole.is_empty() {
                terms.push(whole.chars().collect());
            }
        }
        terms
    }

    /// Score one entry's lowercase text against the query terms.
    fn score(terms: &[Vec<char>], text: &[char]) -> f32 {
        if terms.is_empty() {
            return 0.0;
        }
        let total: f32 = terms
            .iter()
            .map(|term| {
                let edits = approximate_substring_distance(term, text);
                1.0 - edits as f32 / term.len() as f32
            })
            .sum();
        total / terms.len() as f32
    }
}

impl Default for FuzzyKeywordStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl RetrievalStrategy for FuzzyKeywordStrategy {
    fn name(&self) -> &str {
        "keyword"
    }

    fn rank(&self, entries: &[SessionEntry], query: &str, top_k: usize) -> Vec<Snippet> {
        let terms = Self::terms(query);
        if terms.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut hits: Vec<Snippet> = entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let text = entry.to_text();
                let lower: Vec<char> = text.to_lowercase().chars().collect();
                let score = Self::score(&terms, &lower);
                (score >= self.threshold).then_some(Snippet { index, score, text })
            })
            .collect();

        // Stable sort: equal scores keep log order
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        hits
    }
}

/// Smallest edit distance between `pattern` and any substring of `text`.
///
/// Dynamic programming where the match may start anywhere in `text` for
/// free (the first row is all zeros). Runs in O(|pattern| · |text|) time
/// and O(|pattern|) space.
pub fn approximate_substring_distance(pattern: &[char], text: &[char]) -> usize {
    let m = pattern.len();
    if m == 0 {
        return 0;
    }
    // column[i] = cost of matching pattern[..i] ending at the current text position
    let mut column: Vec<usize> = (0..=m).collect();
    let mut best = m;
    for &tc in text {
        let mut diagonal = column[0];
        column[0] = 0;
        for i in 1..=m {
            let above = column[i];
            let substitution = diagonal + usize::from(pattern[i - 1] != tc);
            column[i] = substitution.min(above + 1).min(column[i - 1] + 1);
            diagonal = above;
        }
        best = best.min(column[m]);
        if best == 0 {
            break;
        }
    }
    best
}

/// Embedding-based retrieval.
///
/// Declared so configurations can select it; it has no embedding model
/// behind it yet and always returns no snippets.
pub struct EmbeddingStrategy;

impl RetrievalStrategy for EmbeddingStrategy {
    fn name(&self) -> &str {
        "embedding"
    }

    fn rank(&self, _entries: &[SessionEntry], _query: &str, _top_k: usize) -> Vec<Snippet> {
        Vec::new()
    }
}

/// Top-K retrieval over the session log held by a [`SessionStore`].
///
/// The retriever owns the handle to the store, so the agent appends its
/// events through the same backing store it later retrieves from.
pub struct Retriever {
    store: Arc<dyn SessionStore>,
    strategy: Box<dyn RetrievalStrategy>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            strategy: Box::new(FuzzyKeywordStrategy::default()),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn RetrievalStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The best matches for `query` in the session's log, best first.
    ///
    /// Read failures are logged and yield no snippets.
    pub async fn retrieve(&self, session_id: &str, query: &str) -> Vec<Snippet> {
        self.retrieve_top(session_id, query, self.top_k).await
    }

    /// Like [`Retriever::retrieve`] with an explicit K.
    pub async fn retrieve_top(&self, session_id: &str, query: &str, top_k: usize) -> Vec<Snippet> {
        let entries = match self.store.read_entries(session_id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(session = session_id, error = %e, "Retrieval skipped: session log unreadable");
                return Vec::new();
            }
        };
        let snippets = self.strategy.rank(&entries, query, top_k);
        debug!(
            session = session_id,
            strategy = self.strategy.name(),
            entries = entries.len(),
            hits = snippets.len(),
            "Retrieved session snippets"
        );
        snippets
    }
}
