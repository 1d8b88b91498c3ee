//! Collapsing of URLs that differ only in insignificant ways.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use super::normalize::normalize_for_comparison;

/// Summary of a deduplication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    /// Number of clusters with more than one member.
    pub duplicates_found: usize,
    /// Members discarded across all clusters.
    pub links_removed: usize,
    /// Distinct links before deduplication.
    pub before: usize,
    /// Links after deduplication.
    pub after: usize,
}

/// A group of links sharing one comparison form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCluster {
    /// The shared comparison form.
    pub normalized: String,
    /// Every raw link in the group, in encounter order.
    pub members: Vec<String>,
    /// The member that survives deduplication.
    pub canonical: String,
}

/// Groups links by comparison form, keeping encounter order.
fn group<I, S>(links: I) -> Vec<(String, Vec<String>)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for link in links {
        let link = link.as_ref();
        if !seen.insert(link.to_string()) {
            continue;
        }
        let key = normalize_for_comparison(link);
        if let Some(&slot) = index.get(&key) {
            groups[slot].1.push(link.to_string());
        } else {
            index.insert(key.clone(), groups.len());
            groups.push((key, vec![link.to_string()]));
        }
    }
    groups
}

/// Prefers an `https://` member, otherwise the first one encountered.
fn pick_canonical(members: &[String]) -> &str {
    members
        .iter()
        .find(|m| m.to_ascii_lowercase().starts_with("https://"))
        .or_else(|| members.first())
        .map_or("", String::as_str)
}

/// Returns every cluster of two or more equivalent links.
#[must_use]
pub fn find_duplicates<I, S>(links: I) -> Vec<DuplicateCluster>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    group(links)
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(normalized, members)| {
            let canonical = pick_canonical(&members).to_string();
            DuplicateCluster {
                normalized,
                members,
                canonical,
            }
        })
        .collect()
}

/// Deduplicates links by comparison form.
///
/// Each cluster keeps one member: the first `https://` one if any, otherwise
/// the first encountered. Running the result through `dedupe` again changes
/// nothing.
#[must_use]
pub fn dedupe<I, S>(links: I) -> (BTreeSet<String>, DedupReport)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let groups = group(links);
    let before = groups.iter().map(|(_, members)| members.len()).sum();

    let mut report = DedupReport {
        before,
        ..DedupReport::default()
    };
    let mut kept = BTreeSet::new();

    for (normalized, members) in &groups {
        let canonical = pick_canonical(members);
        if members.len() > 1 {
            report.duplicates_found += 1;
            report.links_removed += members.len() - 1;
            debug!(normalized = %normalized, kept = %canonical, members = members.len(), "collapsed duplicate links");
        }
        kept.insert(canonical.to_string());
    }

    report.after = kept.len();
    (kept, report)
}
