//! Gazetteer of known brand names.
//!
//! Built from a brand catalog at the start of an analysis (or fetched from
//! a [`GazetteerCache`]). Every normalized variant maps to exactly one
//! catalog entry; lookups are exact normalized-string equality.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use brandlens_features::{normalize, TokenizedText};
use brandlens_model::BrandCatalogEntry;
use serde::Serialize;

/// Variants shorter than this (in characters) are not indexed.
const MIN_KEY_LEN: usize = 2;

/// Two catalog entries claimed the same normalized variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogCollision {
    /// The normalized variant both entries produced
    pub key: String,
    /// Entry that owns the key
    pub kept: String,
    /// Entry that lost it
    pub dropped: String,
}

/// A catalog variant found in a tokenized text.
#[derive(Debug, Clone, Copy)]
pub struct GazetteerHit<'g> {
    /// First token index
    pub start: usize,
    /// One past the last token index
    pub end: usize,
    pub entry: &'g BrandCatalogEntry,
}

/// A whole-word name found by [`Gazetteer::scan_with`].
#[derive(Debug, Clone, Copy)]
pub struct NameHit<'g> {
    pub start: usize,
    pub end: usize,
    /// `None` for a request-supplied name the catalog does not index
    pub entry: Option<&'g BrandCatalogEntry>,
}

/// Normalized phrases keyed by first word, longest first.
#[derive(Debug, Clone, Default)]
struct PhraseIndex {
    by_first: HashMap<String, Vec<Vec<String>>>,
}

impl PhraseIndex {
    fn new<'k>(keys: impl IntoIterator<Item = &'k String>) -> Self {
        let mut by_first: HashMap<String, Vec<Vec<String>>> = HashMap::new();
        for key in keys {
            let words: Vec<String> = key.split(' ').map(str::to_string).collect();
            by_first.entry(words[0].clone()).or_default().push(words);
        }
        for list in by_first.values_mut() {
            list.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        }
        Self { by_first }
    }

    /// Longest indexed phrase starting at token `i`.
    fn longest_at(&self, text: &TokenizedText<'_>, i: usize) -> Option<&[String]> {
        let token = text.tokens.get(i)?;
        self.by_first
            .get(&token.normalized)?
            .iter()
            .find(|phrase| text.matches_at(i, phrase))
            .map(Vec::as_slice)
    }
}

/// Names that arrive with a request instead of the catalog: the org name,
/// its aliases and well-known competitors.
///
/// Scanned alongside the catalog so these names are found whatever their
/// casing, and never depend on the capitalized-run heuristic.
#[derive(Debug, Clone, Default)]
pub struct KnownNames {
    phrases: PhraseIndex,
    len: usize,
}

impl KnownNames {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys: Vec<String> = names
            .into_iter()
            .map(|name| normalize(name.as_ref()))
            .filter(|key| key.chars().count() >= MIN_KEY_LEN)
            .collect();
        keys.sort();
        keys.dedup();
        Self {
            phrases: PhraseIndex::new(&keys),
            len: keys.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Lookup structure over a brand catalog.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    entries: Vec<BrandCatalogEntry>,
    index: HashMap<String, usize>,
    phrases: PhraseIndex,
    collisions: Vec<CatalogCollision>,
}

impl Gazetteer {
    /// A gazetteer that resolves nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from catalog entries.
    ///
    /// When two entries normalize to the same variant, an org-brand entry
    /// wins over a competitor; otherwise the first entry wins. Every
    /// collision is recorded and logged.
    pub fn build(catalog: &[BrandCatalogEntry]) -> Self {
        let entries = catalog.to_vec();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut collisions = Vec::new();

        for (idx, entry) in entries.iter().enumerate() {
            for name in entry.names() {
                let key = normalize(name);
                if key.chars().count() < MIN_KEY_LEN {
                    continue;
                }
                let Some(&existing) = index.get(&key) else {
                    index.insert(key, idx);
                    continue;
                };
                if existing == idx {
                    continue;
                }

                let incumbent = &entries[existing];
                let (kept, dropped) = if entry.is_org_brand && !incumbent.is_org_brand {
                    index.insert(key.clone(), idx);
                    (entry, incumbent)
                } else {
                    (incumbent, entry)
                };
                tracing::warn!(
                    key = %key,
                    kept = %kept.name,
                    dropped = %dropped.name,
                    "Catalog entries share a normalized variant"
                );
                collisions.push(CatalogCollision {
                    key,
                    kept: kept.name.clone(),
                    dropped: dropped.name.clone(),
                });
            }
        }

        let phrases = PhraseIndex::new(index.keys());

        tracing::debug!(
            entries = entries.len(),
            keys = index.len(),
            collisions = collisions.len(),
            "Built gazetteer"
        );

        Self {
            entries,
            index,
            phrases,
            collisions,
        }
    }

    /// Resolve an already-normalized name.
    pub fn resolve(&self, normalized: &str) -> Option<&BrandCatalogEntry> {
        self.index.get(normalized).map(|&idx| &self.entries[idx])
    }

    /// Normalize, then resolve.
    pub fn resolve_name(&self, name: &str) -> Option<&BrandCatalogEntry> {
        self.resolve(&normalize(name))
    }

    /// Find every indexed variant in `text`.
    ///
    /// Scans left to right, preferring the longest variant at each
    /// position. Hits never overlap.
    pub fn scan<'g>(&'g self, text: &TokenizedText<'_>) -> Vec<GazetteerHit<'g>> {
        self.scan_with(text, &KnownNames::empty())
            .into_iter()
            .filter_map(|hit| {
                hit.entry.map(|entry| GazetteerHit {
                    start: hit.start,
                    end: hit.end,
                    entry,
                })
            })
            .collect()
    }

    /// Like [`scan`](Self::scan), also matching `known` names.
    ///
    /// At each position the longest phrase wins; on equal length the
    /// catalog wins. Hits never overlap.
    pub fn scan_with<'g>(
        &'g self,
        text: &TokenizedText<'_>,
        known: &KnownNames,
    ) -> Vec<NameHit<'g>> {
        let mut hits = Vec::new();
        let mut i = 0;

        while i < text.len() {
            let catalog = self
                .phrases
                .longest_at(text, i)
                .and_then(|phrase| self.resolve(&phrase.join(" ")).map(|entry| (phrase.len(), entry)));
            let request = known.phrases.longest_at(text, i).map(<[String]>::len);

            let hit = match (catalog, request) {
                (Some((len, entry)), Some(other)) if len >= other => Some((len, Some(entry))),
                (_, Some(len)) => Some((len, None)),
                (Some((len, entry)), None) => Some((len, Some(entry))),
                (None, None) => None,
            };

            match hit {
                Some((len, entry)) => {
                    hits.push(NameHit {
                        start: i,
                        end: i + len,
                        entry,
                    });
                    i += len;
                }
                None => i += 1,
            }
        }

        hits
    }

    pub fn entries(&self) -> &[BrandCatalogEntry] {
        &self.entries
    }

    /// Org-brand entries only.
    pub fn org_entries(&self) -> impl Iterator<Item = &BrandCatalogEntry> {
        self.entries.iter().filter(|e| e.is_org_brand)
    }

    pub fn collisions(&self) -> &[CatalogCollision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
struct CachedGazetteer {
    version: u64,
    gazetteer: Arc<Gazetteer>,
}

/// Built gazetteers keyed by caller key (e.g. org id) and catalog version.
///
/// Readers share an `Arc<Gazetteer>`. A version change builds a new
/// gazetteer and swaps it in; a built gazetteer is never mutated.
#[derive(Debug, Default)]
pub struct GazetteerCache {
    inner: RwLock<HashMap<String, CachedGazetteer>>,
}

impl GazetteerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached gazetteer for `key` if it was built from `version`.
    pub fn get(&self, key: &str, version: u64) -> Option<Arc<Gazetteer>> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key)
            .filter(|cached| cached.version == version)
            .map(|cached| Arc::clone(&cached.gazetteer))
    }

    /// Cached gazetteer, or build one from `load()` and cache it.
    ///
    /// An older `version` than the cached one is built for the caller but
    /// never replaces the newer entry.
    pub fn get_or_build<F>(&self, key: &str, version: u64, load: F) -> Arc<Gazetteer>
    where
        F: FnOnce() -> Vec<BrandCatalogEntry>,
    {
        if let Some(gazetteer) = self.get(key, version) {
            return gazetteer;
        }

        let built = Arc::new(Gazetteer::build(&load()));

        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match map.get(key) {
            Some(cached) if cached.version == version => return Arc::clone(&cached.gazetteer),
            Some(cached) if cached.version > version => {
                tracing::debug!(
                    key,
                    version,
                    cached = cached.version,
                    "Stale catalog version, not caching"
                );
                return built;
            }
            _ => {}
        }
        tracing::debug!(key, version, "Caching gazetteer");
        map.insert(
            key.to_string(),
            CachedGazetteer {
                version,
                gazetteer: Arc::clone(&built),
            },
        );
        built
    }

    pub fn invalidate(&self, key: &str) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
