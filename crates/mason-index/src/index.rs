use std::collections::{BTreeMap, BTreeSet, HashMap};

use mason_core::{ArtifactCoordinate, ArtifactQuery, QueryClause, QueryField};

/// Upper bound on the number of term clauses a single query may expand to.
/// A wildcard that would exceed it is a query-shape problem, reported as
/// zero matches rather than an error.
pub const MAX_CLAUSE_COUNT: usize = 1024;

/// Raised when a query expands past [`MAX_CLAUSE_COUNT`]; the caller decides
/// whether that surfaces as empty results or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClauseLimitExceeded;

/// Inverted index over artifact coordinates with tombstoned deletion and a
/// generation counter.
///
/// Every successful mutation bumps `generation`; searches always read the
/// current generation, which is the visibility guarantee callers rely on
/// after `add`/`remove`.
#[derive(Debug, Default)]
pub struct ArtifactIndex {
    generation: u64,
    /// Dense doc store; `None` is a tombstone left by removal.
    entries: Vec<Option<ArtifactCoordinate>>,
    ids: HashMap<ArtifactCoordinate, u32>,
    postings: BTreeMap<(QueryField, String), BTreeSet<u32>>,
}

impl ArtifactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of live (non-tombstoned) entries.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Insert a coordinate; re-inserting an existing coordinate is a no-op
    /// and does not bump the generation.
    pub fn add(&mut self, coordinate: ArtifactCoordinate) -> bool {
        if self.ids.contains_key(&coordinate) {
            return false;
        }

        let id = self.entries.len() as u32;
        for term in Self::terms(&coordinate) {
            self.postings.entry(term).or_default().insert(id);
        }
        self.ids.insert(coordinate.clone(), id);
        self.entries.push(Some(coordinate));
        self.generation += 1;
        true
    }

    /// Tombstone a coordinate. Unknown coordinates are ignored.
    pub fn remove(&mut self, coordinate: &ArtifactCoordinate) -> bool {
        let Some(id) = self.ids.remove(coordinate) else {
            return false;
        };
        for term in Self::terms(coordinate) {
            if let Some(ids) = self.postings.get_mut(&term) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        self.entries[id as usize] = None;
        self.generation += 1;
        true
    }

    /// Drop every entry, e.g. before applying a full remote replacement.
    pub fn clear(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        self.entries.clear();
        self.ids.clear();
        self.postings.clear();
        self.generation += 1;
    }

    fn terms(coordinate: &ArtifactCoordinate) -> impl Iterator<Item = (QueryField, String)> {
        let mut terms = vec![
            (QueryField::GroupId, coordinate.group_id.clone()),
            (QueryField::ArtifactId, coordinate.artifact_id.clone()),
            (QueryField::Version, coordinate.version.clone()),
            (QueryField::Packaging, coordinate.packaging.clone()),
        ];
        if let Some(classifier) = &coordinate.classifier {
            terms.push((QueryField::Classifier, classifier.clone()));
        }
        terms.into_iter()
    }

    /// Execute a bounded conjunctive query.
    ///
    /// Wildcard clauses expand against the term dictionary; the total number
    /// of expanded term clauses is capped at [`MAX_CLAUSE_COUNT`].
    pub fn search(
        &self,
        query: &ArtifactQuery,
        max_results: usize,
    ) -> Result<BTreeSet<ArtifactCoordinate>, ClauseLimitExceeded> {
        if query.clauses.is_empty() || max_results == 0 {
            return Ok(BTreeSet::new());
        }

        let mut clause_budget = MAX_CLAUSE_COUNT;
        let mut matching: Option<BTreeSet<u32>> = None;

        for clause in &query.clauses {
            let ids = self.expand_clause(clause, &mut clause_budget)?;
            matching = Some(match matching {
                None => ids,
                Some(current) => current.intersection(&ids).copied().collect(),
            });
            if matching.as_ref().is_some_and(BTreeSet::is_empty) {
                return Ok(BTreeSet::new());
            }
        }

        let mut results = BTreeSet::new();
        for id in matching.unwrap_or_default() {
            if let Some(Some(coordinate)) = self.entries.get(id as usize) {
                results.insert(coordinate.clone());
                if results.len() >= max_results {
                    break;
                }
            }
        }
        Ok(results)
    }

    fn expand_clause(
        &self,
        clause: &QueryClause,
        clause_budget: &mut usize,
    ) -> Result<BTreeSet<u32>, ClauseLimitExceeded> {
        if !is_wildcard(&clause.pattern) {
            *clause_budget = clause_budget.checked_sub(1).ok_or(ClauseLimitExceeded)?;
            return Ok(self
                .postings
                .get(&(clause.field, clause.pattern.clone()))
                .cloned()
                .unwrap_or_default());
        }

        let mut ids = BTreeSet::new();
        let range_start = (clause.field, String::new());
        for ((field, term), term_ids) in self.postings.range(&range_start..) {
            if *field != clause.field {
                break;
            }
            if wildcard_match(&clause.pattern, term) {
                *clause_budget = clause_budget.checked_sub(1).ok_or(ClauseLimitExceeded)?;
                ids.extend(term_ids.iter().copied());
            }
        }
        Ok(ids)
    }

    /// Stream all live entries in bounded chunks. Tombstones and entries
    /// missing any required coordinate field are skipped silently.
    pub fn for_each_chunk(&self, chunk_size: usize, mut sink: impl FnMut(Vec<ArtifactCoordinate>)) {
        let chunk_size = chunk_size.max(1);
        let mut chunk = Vec::with_capacity(chunk_size.min(self.ids.len().max(1)));
        for coordinate in self.entries.iter().flatten() {
            if coordinate.group_id.is_empty()
                || coordinate.artifact_id.is_empty()
                || coordinate.version.is_empty()
            {
                continue;
            }
            chunk.push(coordinate.clone());
            if chunk.len() == chunk_size {
                sink(std::mem::take(&mut chunk));
            }
        }
        if !chunk.is_empty() {
            sink(chunk);
        }
    }
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Minimal glob match supporting `*` (any run) and `?` (any one char).
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // Iterative backtracking over the last `*`.
    let (mut p, mut t) = (0, 0);
    let (mut star, mut star_t) = (None, 0);
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(star_p) = star {
            p = star_p + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
