use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use anyhow::{Context, Result};
use cargo_metadata::MetadataCommand;

/// Crates that must stay transport-free, with the packages they may never reach.
const RULES: &[(&str, &[&str])] = &[
    (
        "workspaces-core",
        &[
            "axum",
            "hyper",
            "reqwest",
            "workspaces-auth",
            "workspaces-gateway",
        ],
    ),
    (
        "workspaces-contracts",
        &["tokio", "workspaces-core", "workspaces-gateway"],
    ),
];

fn main() -> Result<()> {
    let metadata = MetadataCommand::new()
        .exec()
        .context("failed to run `cargo metadata`")?;

    let resolve = metadata
        .resolve
        .as_ref()
        .context("`cargo metadata` did not include a resolved dependency graph")?;

    let id_to_name: HashMap<_, _> = metadata
        .packages
        .iter()
        .map(|p| (p.id.clone(), p.name.as_str()))
        .collect();

    let adjacency: HashMap<_, _> = resolve
        .nodes
        .iter()
        .map(|node| {
            let deps: Vec<_> = node.deps.iter().map(|dep| dep.pkg.clone()).collect();
            (node.id.clone(), deps)
        })
        .collect();

    let mut failed = false;
    for (package, forbidden) in RULES {
        let root = metadata
            .packages
            .iter()
            .find(|p| p.name == *package)
            .with_context(|| format!("package `{}` not found in workspace", package))?;

        let violations = forbidden_dependencies(&root.id, &adjacency, &id_to_name, forbidden);
        if violations.is_empty() {
            println!(
                "OK: `{}` has no dependency edge to {}",
                package,
                forbidden.join(", ")
            );
        } else {
            eprintln!(
                "FAIL: `{}` depends on forbidden crate(s): {}",
                package,
                violations.join(", ")
            );
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Walks the resolved graph from `root` and names every forbidden package reached.
fn forbidden_dependencies<Id>(
    root: &Id,
    adjacency: &HashMap<Id, Vec<Id>>,
    id_to_name: &HashMap<Id, &str>,
    forbidden: &[&str],
) -> Vec<String>
where
    Id: Clone + Eq + Hash,
{
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(root.clone());
    visited.insert(root.clone());

    let mut violations = Vec::new();

    while let Some(current) = queue.pop_front() {
        let Some(deps) = adjacency.get(&current) else {
            continue;
        };

        for dep in deps.iter().cloned() {
            if !visited.insert(dep.clone()) {
                continue;
            }

            if let Some(name) = id_to_name.get(&dep)
                && forbidden.contains(name)
            {
                violations.push((*name).to_string());
            }

            queue.push_back(dep);
        }
    }

    violations.sort();
    violations.dedup();
    violations
}
