//! Deterministic fuzzy name resolution for habit/task references.
//!
//! No LLM here: exact match wins, otherwise token-overlap scoring with a fixed
//! cutoff. Ties above the cutoff are ambiguous and bounce back to the user.

use crate::error::{DomainError, DomainResult};

const SIMILARITY_CUTOFF: f64 = 0.5;

fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Similarity in [0, 1]: token-overlap Dice coefficient, with a containment
/// bonus so "run" still matches "morning run".
fn similarity(query: &str, candidate: &str) -> f64 {
    let q = tokenize(query);
    let c = tokenize(candidate);
    if q.is_empty() || c.is_empty() {
        return 0.0;
    }

    let overlap = q.iter().filter(|t| c.contains(t)).count();
    let dice = (2.0 * overlap as f64) / (q.len() + c.len()) as f64;

    let ql = query.trim().to_lowercase();
    let cl = candidate.trim().to_lowercase();
    if dice < 0.9 && (cl.contains(&ql) || ql.contains(&cl)) {
        return dice.max(0.8);
    }
    dice
}

/// Resolve `query` against candidate names, returning the winning index.
///
/// Rules, in order: case-insensitive exact match wins outright; otherwise the
/// unique highest score above the cutoff wins; a score tie is ambiguous;
/// nothing above the cutoff is not found.
pub fn resolve_name(query: &str, candidates: &[&str]) -> DomainResult<usize> {
    let ql = query.trim().to_lowercase();
    if ql.is_empty() {
        return Err(DomainError::Validation("empty reference".to_string()));
    }

    for (i, c) in candidates.iter().enumerate() {
        if c.trim().to_lowercase() == ql {
            return Ok(i);
        }
    }

    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, similarity(query, c)))
        .filter(|(_, s)| *s >= SIMILARITY_CUTOFF)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    match scored.as_slice() {
        [] => Err(DomainError::NotFound(format!("no match for '{query}'"))),
        [(i, _)] => Ok(*i),
        [(i, top), (_, second), ..] if top - second > f64::EPSILON => Ok(*i),
        _ => {
            let top = scored[0].1;
            let candidates = scored
                .iter()
                .filter(|(_, s)| (top - s).abs() <= f64::EPSILON)
                .map(|(i, _)| candidates[*i].to_string())
                .collect();
            Err(DomainError::AmbiguousReference {
                query: query.to_string(),
                candidates,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins_over_fuzzy() {
        let names = ["run", "running club", "Run"];
        // First exact (case-insensitive) hit wins deterministically.
        assert_eq!(resolve_name("run", &names).unwrap(), 0);
    }

    #[test]
    fn unique_fuzzy_match_resolves() {
        let names = ["morning run", "meditation", "read books"];
        assert_eq!(resolve_name("run", &names).unwrap(), 0);
        assert_eq!(resolve_name("meditate", &names).unwrap_err(),
            DomainError::NotFound("no match for 'meditate'".to_string()));
        assert_eq!(resolve_name("reading books", &names).unwrap(), 2);
    }

    #[test]
    fn tie_is_ambiguous() {
        let names = ["evening run", "morning run"];
        let err = resolve_name("run", &names).unwrap_err();
        match err {
            DomainError::AmbiguousReference { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn nothing_above_cutoff_is_not_found() {
        let names = ["meditation", "journaling"];
        assert!(matches!(
            resolve_name("swimming", &names),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn empty_query_is_validation_error() {
        assert!(matches!(
            resolve_name("  ", &["a"]),
            Err(DomainError::Validation(_))
        ));
    }
}
