use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use crate::models::Finding;

/// Collapse findings sharing a [`Finding::dedup_key`] into one, keeping the
/// most severe and merging the agents that reported it. First-seen order is kept.
pub fn deduplicate_findings(findings: Vec<Finding>) -> Vec<Finding> {
    let mut slots: HashMap<_, usize> = HashMap::new();
    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());

    for finding in findings {
        match slots.entry(finding.dedup_key()) {
            Entry::Vacant(e) => {
                e.insert(kept.len());
                kept.push(finding);
            }
            Entry::Occupied(e) => {
                let existing = &mut kept[*e.get()];
                let agents = merged_agents(existing, &finding);
                // Keep higher severity (lower rank number)
                if finding.severity.rank() < existing.severity.rank() {
                    *existing = finding;
                }
                existing.corroborated_by = agents;
            }
        }
    }
    kept
}

fn merged_agents(a: &Finding, b: &Finding) -> Vec<String> {
    [a, b]
        .iter()
        .flat_map(|f| std::iter::once(&f.reported_by).chain(f.corroborated_by.iter()))
        .filter(|agent| !agent.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
