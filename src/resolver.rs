// src/resolver.rs

//! Dependency closure resolution
//!
//! Computes every package required to satisfy a seed set by following the
//! `deps` maps of the catalog. There is no version solving: a catalog holds
//! exactly one record per name, so the closure is a pure graph walk.
//!
//! Results are kept in ordered sets and depend only on the seed, the index
//! contents, and the policy, never on traversal order.

use crate::error::{Error, Result};
use crate::packages::PackageIndex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info, warn};

/// What to do with names that have no catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownPolicy {
    /// Abort resolution, naming every unknown package
    #[default]
    FailFast,
    /// Drop unknown names; packages depending on them stay in the set
    Skip,
    /// Drop unknown names and every package that transitively needs one
    Prune,
}

/// Outcome of a resolution run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Seed closed under dependencies, minus anything excluded by policy
    pub resolved: BTreeSet<String>,
    /// Referenced names with no catalog entry
    pub unknown: BTreeSet<String>,
    /// Known packages dropped because they depend on an unknown one (`Prune` only)
    pub pruned: BTreeSet<String>,
}

/// Walk the dependency graph from `start`, never entering `excluded`
///
/// Returns the known names reached and the unknown names referenced, along
/// with the reverse edges (dependency -> dependents) that were followed.
fn closure(
    start: impl IntoIterator<Item = String>,
    index: &PackageIndex,
    excluded: &BTreeSet<String>,
) -> (BTreeSet<String>, BTreeSet<String>, BTreeMap<String, BTreeSet<String>>) {
    let mut known = BTreeSet::new();
    let mut unknown = BTreeSet::new();
    let mut required_by: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut queue = VecDeque::new();
    for name in start {
        if !excluded.contains(&name) && seen.insert(name.clone()) {
            queue.push_back(name);
        }
    }

    while let Some(name) = queue.pop_front() {
        let Some(record) = index.get(&name) else {
            unknown.insert(name);
            continue;
        };

        for dep in record.dependency_names() {
            required_by
                .entry(dep.to_string())
                .or_default()
                .insert(name.clone());

            if !excluded.contains(dep) && seen.insert(dep.to_string()) {
                queue.push_back(dep.to_string());
            }
        }
        known.insert(name);
    }

    (known, unknown, required_by)
}

fn describe_dependents(name: &str, required_by: &BTreeMap<String, BTreeSet<String>>) -> String {
    match required_by.get(name) {
        Some(dependents) if !dependents.is_empty() => format!(
            " (required by {})",
            dependents.iter().cloned().collect::<Vec<_>>().join(", ")
        ),
        _ => " (wanted)".to_string(),
    }
}

/// Compute the transitive closure of `seed` over `index`
///
/// Cycles terminate naturally: a name is queued at most once.
pub fn resolve<I, S>(seed: I, index: &PackageIndex, policy: UnknownPolicy) -> Result<Resolution>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let seed: BTreeSet<String> = seed.into_iter().map(|s| s.as_ref().to_string()).collect();
    debug!("Resolving {} wanted packages against {} catalog entries", seed.len(), index.len());

    let (known, unknown, required_by) = closure(seed.iter().cloned(), index, &BTreeSet::new());

    for name in &unknown {
        warn!("Unknown package {}{}", name, describe_dependents(name, &required_by));
    }

    let resolution = match policy {
        UnknownPolicy::FailFast => {
            if !unknown.is_empty() {
                return Err(Error::UnresolvedDependencyError(unknown.into_iter().collect()));
            }
            Resolution {
                resolved: known,
                unknown,
                pruned: BTreeSet::new(),
            }
        }
        UnknownPolicy::Skip => Resolution {
            resolved: known,
            unknown,
            pruned: BTreeSet::new(),
        },
        UnknownPolicy::Prune => {
            // Everything that can reach an unknown name through reverse edges
            let mut pruned = BTreeSet::new();
            let mut queue: VecDeque<&str> = unknown.iter().map(String::as_str).collect();
            while let Some(name) = queue.pop_front() {
                for dependent in required_by.get(name).into_iter().flatten() {
                    if known.contains(dependent) && pruned.insert(dependent.clone()) {
                        queue.push_back(dependent.as_str());
                    }
                }
            }

            for name in &pruned {
                warn!("Dropping {}: depends on an unknown package", name);
            }

            // Packages only needed by pruned ones fall out of the closure too
            let (resolved, _, _) = closure(seed.iter().cloned(), index, &pruned);

            Resolution {
                resolved,
                unknown,
                pruned,
            }
        }
    };

    info!(
        "Resolved {} packages ({} unknown, {} pruned)",
        resolution.resolved.len(),
        resolution.unknown.len(),
        resolution.pruned.len()
    );
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::PackageRecord;

    fn record(name: &str, deps: &[&str]) -> PackageRecord {
        deps.iter().fold(
            PackageRecord::new(name, format!("test/{}", name), "1.0", format!("All/{}-1.0.pkg", name), 1, "0"),
            |record, dep| record.with_dependency(*dep, format!("test/{}", dep), "1.0"),
        )
    }

    fn index(records: impl IntoIterator<Item = PackageRecord>) -> PackageIndex {
        records.into_iter().collect()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_dependency() {
        let index = index([record("A", &[]), record("B", &["A"])]);
        let resolution = resolve(["B"], &index, UnknownPolicy::FailFast).unwrap();

        assert_eq!(resolution.resolved, set(&["A", "B"]));
        assert!(resolution.unknown.is_empty());
    }

    #[test]
    fn test_unknown_seed_skipped() {
        let index = index([record("A", &[])]);
        let resolution = resolve(["B"], &index, UnknownPolicy::Skip).unwrap();

        assert!(resolution.resolved.is_empty());
        assert_eq!(resolution.unknown, set(&["B"]));
    }

    #[test]
    fn test_unknown_seed_fails_fast() {
        let index = index([record("A", &[])]);
        let result = resolve(["B"], &index, UnknownPolicy::FailFast);

        match result {
            Err(Error::UnresolvedDependencyError(names)) => assert_eq!(names, vec!["B".to_string()]),
            other => panic!("expected UnresolvedDependencyError, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_terminates() {
        let index = index([record("A", &["B"]), record("B", &["A"])]);
        let resolution = resolve(["A"], &index, UnknownPolicy::FailFast).unwrap();

        assert_eq!(resolution.resolved, set(&["A", "B"]));
    }

    #[test]
    fn test_transitive_unknown_is_skipped_but_dependent_kept() {
        let index = index([record("app", &["lib", "ghost"]), record("lib", &[])]);
        let resolution = resolve(["app"], &index, UnknownPolicy::Skip).unwrap();

        assert_eq!(resolution.resolved, set(&["app", "lib"]));
        assert_eq!(resolution.unknown, set(&["ghost"]));
    }

    #[test]
    fn test_prune_drops_dependents_transitively() {
        let index = index([
            record("app", &["lib"]),
            record("lib", &["ghost", "only-lib-needs-me"]),
            record("only-lib-needs-me", &[]),
            record("tool", &["shared"]),
            record("shared", &[]),
        ]);
        let resolution = resolve(["app", "tool"], &index, UnknownPolicy::Prune).unwrap();

        assert_eq!(resolution.resolved, set(&["shared", "tool"]));
        assert_eq!(resolution.pruned, set(&["app", "lib"]));
        assert_eq!(resolution.unknown, set(&["ghost"]));
    }

    #[test]
    fn test_closure_completeness_and_seed_containment() {
        let index = index([
            record("a", &["b", "c"]),
            record("b", &["d"]),
            record("c", &["d", "missing"]),
            record("d", &["a"]),
            record("e", &[]),
        ]);
        let seed = set(&["a", "e"]);
        let resolution = resolve(&seed, &index, UnknownPolicy::Skip).unwrap();

        for name in &resolution.resolved {
            for dep in index.get(name).unwrap().dependency_names() {
                assert!(resolution.resolved.contains(dep) || resolution.unknown.contains(dep));
            }
        }
        for name in &seed {
            assert!(resolution.resolved.contains(name) || resolution.unknown.contains(name));
        }
    }

    #[test]
    fn test_deterministic_regardless_of_seed_order() {
        let index = index([record("a", &["c"]), record("b", &["c", "x"]), record("c", &["y"])]);

        let first = resolve(["a", "b", "a"], &index, UnknownPolicy::Skip).unwrap();
        let second = resolve(["b", "a"], &index, UnknownPolicy::Skip).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.unknown, set(&["x", "y"]));
    }

    #[test]
    fn test_fail_fast_names_all_unknown() {
        let index = index([record("a", &["z", "y"])]);
        let result = resolve(["a", "w"], &index, UnknownPolicy::FailFast);

        match result {
            Err(Error::UnresolvedDependencyError(names)) => assert_eq!(names, vec!["w", "y", "z"]),
            other => panic!("expected UnresolvedDependencyError, got {:?}", other),
        }
    }
}
