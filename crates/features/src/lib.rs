//! Text features for brand mention analysis.
//!
//! Provides pure functions used by every matching step:
//! - Text normalization (lowercase, punctuation folding, whitespace collapsing)
//! - Tokenization with byte offsets into the raw response
//! - Capitalized-run candidate scanning
//! - Legal suffix stripping
//! - Phonetic similarity for catalog variant suggestions

use std::collections::HashSet;

use rphonetic::{Encoder, Metaphone, Soundex};

/// Common non-brand capitalized words: function words and sentence starters.
const STOPWORDS: &[&str] = &[
    "a", "about", "additionally", "after", "all", "also", "although", "an", "and", "another",
    "any", "are", "as", "at", "based", "because", "before", "best", "both", "but", "by",
    "can", "conclusion", "consider", "each", "either", "especially", "even", "every",
    "finally", "first", "for", "from", "furthermore", "great", "has", "have", "he", "her",
    "here", "his", "how", "however", "i", "if", "in", "instead", "is", "it", "its", "just",
    "key", "lastly", "many", "may", "more", "moreover", "most", "my", "next", "no", "not",
    "note", "of", "on", "once", "one", "or", "other", "our", "overall", "pros", "cons",
    "second", "several", "she", "since", "so", "some", "summary", "that", "the", "their",
    "then", "there", "these", "they", "third", "this", "those", "though", "to", "top",
    "ultimately", "unlike", "use", "using", "was", "we", "what", "when", "where", "which",
    "while", "who", "why", "with", "yes", "you", "your",
];

/// Category nouns that never name a brand on their own.
const GENERIC_TERMS: &[&str] = &[
    "ai", "app", "apps", "brand", "brands", "choice", "choices", "company", "companies",
    "cost", "customer", "customers", "features", "free", "integration", "integrations",
    "management", "option", "options", "plan", "plans", "platform", "platforms", "price",
    "pricing", "product", "products", "service", "services", "software", "solution",
    "solutions", "support", "system", "team", "teams", "tool", "tools",
];

/// Legal-entity suffixes that may trail a brand name.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc", "incorporated", "corp", "corporation", "llc", "ltd", "limited", "plc", "co",
    "gmbh", "ag", "sa", "llp", "lp",
];

/// Characters allowed (at most one) between two tokens of the same name.
const CONNECTORS: &[char] = &['-', '&', '+'];

/// Normalize text for comparison.
///
/// Lowercases, replaces every character that is not a letter, digit, or
/// whitespace with a space, collapses whitespace runs, and trims. Idempotent.
pub fn normalize(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            folded.extend(c.to_lowercase().filter(|l| l.is_alphanumeric()));
        } else {
            folded.push(' ');
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized words of a phrase.
pub fn phrase_tokens(text: &str) -> Vec<String> {
    normalize(text).split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect()
}

fn fold_word(word: &str) -> String {
    word.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// One alphanumeric run of the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Byte offset in the raw text
    pub start: usize,
    /// Byte offset one past the end
    pub end: usize,
    pub normalized: String,
    /// First character is uppercase
    pub capitalized: bool,
    /// Separated from the previous token only by spaces and at most one connector
    pub joined: bool,
}

/// A response split into tokens.
///
/// Joining `normalized` of every token with single spaces yields exactly
/// `normalize(raw)`, so token-sequence matches are word-boundary matches
/// on the normalized text.
#[derive(Debug, Clone)]
pub struct TokenizedText<'a> {
    pub raw: &'a str,
    pub tokens: Vec<Token>,
}

/// Tokenize raw text into alphanumeric runs.
pub fn tokenize(raw: &str) -> TokenizedText<'_> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, c) in raw.char_indices() {
        if c.is_alphanumeric() {
            start.get_or_insert(idx);
        } else if let Some(s) = start.take() {
            push_token(raw, s, idx, &mut tokens);
        }
    }
    if let Some(s) = start {
        push_token(raw, s, raw.len(), &mut tokens);
    }

    TokenizedText { raw, tokens }
}

fn push_token(raw: &str, start: usize, end: usize, tokens: &mut Vec<Token>) {
    let word = &raw[start..end];
    let normalized = fold_word(word);
    if normalized.is_empty() {
        return;
    }
    let joined = tokens
        .last()
        .is_some_and(|prev| is_joining_gap(&raw[prev.end..start]));
    tokens.push(Token {
        start,
        end,
        normalized,
        capitalized: word.chars().next().is_some_and(char::is_uppercase),
        joined,
    });
}

fn is_joining_gap(gap: &str) -> bool {
    let mut connectors = 0;
    for c in gap.chars() {
        if c == '\n' || c == '\r' {
            return false;
        }
        if c.is_whitespace() {
            continue;
        }
        if CONNECTORS.contains(&c) {
            connectors += 1;
        } else {
            return false;
        }
    }
    connectors <= 1
}

impl<'a> TokenizedText<'a> {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The normalized text, equal to `normalize(raw)`.
    pub fn normalized(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.normalized.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Byte span covered by tokens `[start, end)`, or `None` when the
    /// range is empty or out of bounds.
    pub fn byte_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end {
            return None;
        }
        let first = self.tokens.get(start)?;
        let last = self.tokens.get(end - 1)?;
        Some((first.start, last.end))
    }

    /// Raw text covered by tokens `[start, end)`.
    pub fn raw_slice(&self, start: usize, end: usize) -> Option<&'a str> {
        let (from, to) = self.byte_span(start, end)?;
        self.raw.get(from..to)
    }

    /// Normalized text covered by tokens `[start, end)`; empty when the
    /// range is out of bounds.
    pub fn normalized_slice(&self, start: usize, end: usize) -> String {
        self.tokens
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|t| t.normalized.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Every token index where `phrase` occurs as a whole-word sequence.
    pub fn find_phrase<S: AsRef<str>>(&self, phrase: &[S]) -> Vec<usize> {
        if phrase.is_empty() || phrase.len() > self.tokens.len() {
            return Vec::new();
        }
        (0..=self.tokens.len() - phrase.len())
            .filter(|&i| self.matches_at(i, phrase))
            .collect()
    }

    /// Whether `phrase` matches the tokens starting at `index`.
    pub fn matches_at<S: AsRef<str>>(&self, index: usize, phrase: &[S]) -> bool {
        index + phrase.len() <= self.tokens.len()
            && self.tokens[index..index + phrase.len()]
                .iter()
                .zip(phrase)
                .all(|(token, word)| token.normalized == word.as_ref())
    }
}

/// Words that are never brand names on their own.
#[derive(Debug, Clone, Default)]
pub struct Stoplist {
    extra: HashSet<String>,
}

impl Stoplist {
    /// Built-in list plus caller additions (normalized on the way in).
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extra: extra
                .into_iter()
                .map(|w| normalize(w.as_ref()))
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Function word or sentence starter.
    pub fn is_stopword(&self, word: &str) -> bool {
        STOPWORDS.contains(&word) || self.extra.contains(word)
    }

    /// Stopword or generic category noun.
    pub fn is_generic(&self, word: &str) -> bool {
        self.is_stopword(word) || GENERIC_TERMS.contains(&word)
    }

    /// Whether a normalized candidate can plausibly name a brand.
    pub fn accepts(&self, normalized: &str, min_len: usize) -> bool {
        if normalized.chars().count() < min_len {
            return false;
        }
        !normalized.split(' ').all(|w| self.is_generic(w))
    }
}

/// A candidate name as a token range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSpan {
    pub start: usize,
    pub end: usize,
}

/// Scan for runs of capitalized tokens.
///
/// A run is a maximal sequence of capitalized, joined tokens. Leading and
/// trailing stopwords are trimmed, long runs are split into chunks of at
/// most `max_tokens`, and chunks rejected by the stoplist are dropped.
/// Results are in text order.
pub fn capitalized_runs(
    text: &TokenizedText<'_>,
    max_tokens: usize,
    min_len: usize,
    stoplist: &Stoplist,
) -> Vec<CandidateSpan> {
    let tokens = &text.tokens;
    let max_tokens = max_tokens.max(1);
    let mut spans = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        if !tokens[i].capitalized {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        while end < tokens.len() && tokens[end].capitalized && tokens[end].joined {
            end += 1;
        }

        let mut chunk_start = i;
        while chunk_start < end {
            let chunk_end = (chunk_start + max_tokens).min(end);
            if let Some(span) = trim_stopwords(text, chunk_start, chunk_end, stoplist) {
                if stoplist.accepts(&text.normalized_slice(span.start, span.end), min_len) {
                    spans.push(span);
                }
            }
            chunk_start = chunk_end;
        }
        i = end;
    }

    spans
}

fn trim_stopwords(
    text: &TokenizedText<'_>,
    mut start: usize,
    mut end: usize,
    stoplist: &Stoplist,
) -> Option<CandidateSpan> {
    while start < end && stoplist.is_stopword(&text.tokens[start].normalized) {
        start += 1;
    }
    while end > start && stoplist.is_stopword(&text.tokens[end - 1].normalized) {
        end -= 1;
    }
    (start < end).then_some(CandidateSpan { start, end })
}

/// Remove trailing legal suffixes from a normalized name.
///
/// Returns `None` when nothing was stripped or nothing would remain.
pub fn strip_legal_suffixes(normalized: &str) -> Option<String> {
    let mut words: Vec<&str> = normalized.split(' ').collect();
    let original_len = words.len();
    while words.len() > 1 && words.last().is_some_and(|w| LEGAL_SUFFIXES.contains(w)) {
        words.pop();
    }
    (words.len() < original_len).then(|| words.join(" "))
}

/// Phonetic encoding results for a name.
#[derive(Debug, Clone, Default)]
pub struct PhoneticCodes {
    pub soundex: Option<String>,
    pub metaphone: Option<String>,
}

/// Compute phonetic encodings for a name.
pub fn compute_phonetics(text: &str) -> PhoneticCodes {
    let soundex = Soundex::default();
    let metaphone = Metaphone::default();
    let upper = text.to_uppercase();

    let soundex_code = soundex.encode(&upper);
    let metaphone_code = metaphone.encode(&upper);

    PhoneticCodes {
        soundex: (!soundex_code.is_empty()).then_some(soundex_code),
        metaphone: (!metaphone_code.is_empty()).then_some(metaphone_code),
    }
}

/// Check if two names are phonetically similar.
///
/// Returns the algorithm and shared code on a match.
pub fn phonetic_match(text1: &str, text2: &str) -> Option<(String, String)> {
    let codes1 = compute_phonetics(text1);
    let codes2 = compute_phonetics(text2);

    if let (Some(s1), Some(s2)) = (&codes1.soundex, &codes2.soundex) {
        if s1 == s2 {
            return Some(("soundex".to_string(), s1.clone()));
        }
    }

    if let (Some(m1), Some(m2)) = (&codes1.metaphone, &codes2.metaphone) {
        if m1 == m2 {
            return Some(("metaphone".to_string(), m1.clone()));
        }
    }

    None
}

/// Compute Levenshtein edit distance between two strings.
pub fn edit_distance(s1: &str, s2: &str) -> usize {
    let s1: Vec<char> = s1.chars().collect();
    let s2: Vec<char> = s2.chars().collect();

    let mut prev: Vec<usize> = (0..=s2.len()).collect();
    let mut curr = vec![0; s2.len() + 1];

    for i in 1..=s1.len() {
        curr[0] = i;
        for j in 1..=s2.len() {
            let cost = usize::from(s1[i - 1] != s2[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[s2.len()]
}

/// Whether an unknown name is likely a variant of a known one.
///
/// Both inputs are normalized names. True when they are equal once spaces
/// are removed, or when they sound alike and differ by at most two edits.
pub fn is_probable_variant(candidate: &str, known: &str) -> bool {
    let a: String = candidate.chars().filter(|c| !c.is_whitespace()).collect();
    let b: String = known.chars().filter(|c| !c.is_whitespace()).collect();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    if a.chars().count() < 4 || b.chars().count() < 4 {
        return false;
    }
    edit_distance(&a, &b) <= 2 && phonetic_match(&a, &b).is_some()
}
