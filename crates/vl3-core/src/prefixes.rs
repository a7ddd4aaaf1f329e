//! Excluded-prefix list helpers.

use std::collections::HashSet;

/// Drop repeated entries, keeping the first occurrence of each.
pub fn remove_duplicates<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let item = item.as_ref();
        if seen.insert(item.to_string()) {
            out.push(item.to_string());
        }
    }
    out
}

/// Union `incoming` into `existing` in place. Order of first occurrence
/// is preserved and nothing already present is ever removed.
pub fn merge_into(existing: &mut Vec<String>, incoming: &[String]) {
    let merged = remove_duplicates(existing.iter().chain(incoming.iter()));
    *existing = merged;
}
