//! Dependency resolution for mod load requests.
//!
//! Produces a load order in which every dependency precedes its dependents,
//! via a depth-first topological sort over the manifest graph.

use std::collections::HashMap;
use thiserror::Error;

use super::manifest::ModManifest;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("cyclic dependency: {}", chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    #[error("missing dependency '{missing}' (required via {})", chain.join(" -> "))]
    MissingDependency { missing: String, chain: Vec<String> },
}

/// Dependency-respecting sequence of manifests for one load request.
pub type LoadOrder = Vec<ModManifest>;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Compute the load order for `requested_id` against the given manifests.
///
/// Dependencies are visited before their dependents; ties among independent
/// mods are broken by manifest discovery order (the position in
/// `manifests`), so the result is deterministic for a fixed scan. The
/// resolver looks only at the manifest graph — filtering out
/// already-loaded ids is the caller's job.
pub fn resolve(requested_id: &str, manifests: &[ModManifest]) -> Result<LoadOrder, ResolveError> {
    let by_id: HashMap<&str, &ModManifest> =
        manifests.iter().map(|m| (m.id.as_str(), m)).collect();
    let rank: HashMap<&str, usize> = manifests
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.as_str(), i))
        .collect();

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut chain: Vec<String> = Vec::new();
    let mut order: LoadOrder = Vec::new();

    visit(requested_id, &by_id, &rank, &mut marks, &mut chain, &mut order)?;
    Ok(order)
}

fn visit<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a ModManifest>,
    rank: &HashMap<&'a str, usize>,
    marks: &mut HashMap<&'a str, Mark>,
    chain: &mut Vec<String>,
    order: &mut LoadOrder,
) -> Result<(), ResolveError> {
    match marks.get(id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            // Back-edge: the id is already on the current DFS path.
            let mut cycle = chain.clone();
            cycle.push(id.to_string());
            return Err(ResolveError::CyclicDependency { chain: cycle });
        }
        None => {}
    }

    let manifest = match by_id.get(id) {
        Some(m) => *m,
        None => {
            return Err(ResolveError::MissingDependency {
                missing: id.to_string(),
                chain: chain.clone(),
            });
        }
    };

    marks.insert(id, Mark::Visiting);
    chain.push(id.to_string());

    // Visit in discovery order, not dependency-list order; unknown ids go
    // last so the missing-dependency chain stays accurate.
    let mut deps: Vec<&str> = manifest.dependencies.iter().map(|d| d.as_str()).collect();
    deps.sort_by_key(|d| rank.get(d).copied().unwrap_or(usize::MAX));
    for dep in deps {
        visit(dep, by_id, rank, marks, chain, order)?;
    }

    chain.pop();
    marks.insert(id, Mark::Done);
    order.push(manifest.clone());
    Ok(())
}
