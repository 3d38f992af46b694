//! Tab-completion candidates for command names.

use crate::builtin::BuiltinKind;
use crate::env::SearchPath;
use crate::external::ExecutableLookup;
use std::collections::BTreeSet;

/// Source of completion candidates for the line editor.
pub trait CandidateSource {
    /// Sorted, deduplicated names starting with `prefix`. Empty for an empty prefix.
    fn candidates(&self, prefix: &str) -> Vec<String>;
}

/// Builtin names plus the executables found in every directory of the search path.
pub struct CandidateIndex<'a> {
    lookup: &'a dyn ExecutableLookup,
    search_path: &'a SearchPath,
}

impl<'a> CandidateIndex<'a> {
    pub fn new(lookup: &'a dyn ExecutableLookup, search_path: &'a SearchPath) -> Self {
        Self {
            lookup,
            search_path,
        }
    }
}

impl CandidateSource for CandidateIndex<'_> {
    fn candidates(&self, prefix: &str) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }

        let mut found: BTreeSet<String> = BuiltinKind::names()
            .filter(|name| name.starts_with(prefix))
            .map(String::from)
            .collect();
        for dir in self.search_path.dirs() {
            found.extend(
                self.lookup
                    .executables_in(dir)
                    .into_iter()
                    .filter(|name| name.starts_with(prefix)),
            );
        }
        found.into_iter().collect()
    }
}

/// Longest string that prefixes every candidate.
///
/// `candidates` must be sorted; comparing the first and the last entry is then enough.
pub fn longest_common_prefix(candidates: &[String]) -> &str {
    let (Some(first), Some(last)) = (candidates.first(), candidates.last()) else {
        return "";
    };
    let mut len = first
        .bytes()
        .zip(last.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    while !first.is_char_boundary(len) {
        len -= 1;
    }
    &first[..len]
}

/// What a Tab press can do with the typed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Nothing matches.
    NoMatch,
    /// Exactly one candidate.
    Unique(String),
    /// Several candidates share a prefix longer than what was typed.
    Extend(String),
    /// Several candidates and nothing more can be filled in.
    Ambiguous(Vec<String>),
}

/// Classify the candidates for `prefix` into one of the [`Completion`] outcomes.
pub fn complete(source: &dyn CandidateSource, prefix: &str) -> Completion {
    let mut candidates = source.candidates(prefix);
    match candidates.len() {
        0 => Completion::NoMatch,
        1 => Completion::Unique(candidates.remove(0)),
        _ => {
            let common = longest_common_prefix(&candidates);
            if common.len() > prefix.len() {
                Completion::Extend(common.to_string())
            } else {
                Completion::Ambiguous(candidates)
            }
        }
    }
}
