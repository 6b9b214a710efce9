use std::collections::{HashSet, VecDeque};

use crate::model::Entry;

/// Ids of `target_id` and every entry below it, found breadth-first over
/// the `parent_id` links of a flat listing.
pub fn collect_subtree(listing: &[Entry], target_id: &str) -> HashSet<String> {
    let mut collected = HashSet::new();
    collected.insert(target_id.to_string());

    let mut frontier = VecDeque::new();
    frontier.push_back(target_id.to_string());

    while let Some(parent) = frontier.pop_front() {
        for child in listing.iter().filter(|entry| entry.parent_id == parent) {
            if collected.insert(child.id.clone()) {
                frontier.push_back(child.id.clone());
            }
        }
    }

    collected
}

/// The listing without `target_id` and its descendants.
pub fn remove_subtree(listing: &[Entry], target_id: &str) -> Vec<Entry> {
    let doomed = collect_subtree(listing, target_id);
    listing
        .iter()
        .filter(|entry| !doomed.contains(&entry.id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;

    use super::{collect_subtree, remove_subtree};
    use crate::model::Entry;

    fn listing(keys: &[&str]) -> Vec<Entry> {
        keys.iter()
            .map(|key| Entry::from_key(key, 1, Utc::now()))
            .collect()
    }

    fn ids(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|key| key.to_string()).collect()
    }

    #[test]
    fn subtree_is_reflexive_transitive_closure() {
        let entries = listing(&[
            "docs/",
            "docs/a.txt",
            "docs/2024/",
            "docs/2024/q1.pdf",
            "docs/2024/deep/",
            "docs/2024/deep/x.bin",
            "img.png",
            "docsx/",
            "docsx/b.txt",
        ]);
        let collected = collect_subtree(&entries, "docs/");
        assert_eq!(
            collected,
            ids(&[
                "docs/",
                "docs/a.txt",
                "docs/2024/",
                "docs/2024/q1.pdf",
                "docs/2024/deep/",
                "docs/2024/deep/x.bin",
            ])
        );
    }

    #[test]
    fn file_target_collects_only_itself() {
        let entries = listing(&["docs/", "docs/a.txt", "img.png"]);
        assert_eq!(collect_subtree(&entries, "img.png"), ids(&["img.png"]));
    }

    #[test]
    fn result_is_independent_of_listing_order() {
        let mut entries = listing(&[
            "a/",
            "a/b/",
            "a/b/c/",
            "a/b/c/d.txt",
            "a/e.txt",
            "f.txt",
        ]);
        let forward = collect_subtree(&entries, "a/");
        entries.reverse();
        let backward = collect_subtree(&entries, "a/");
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 5);
    }

    #[test]
    fn unknown_target_still_returns_itself() {
        let entries = listing(&["img.png"]);
        assert_eq!(collect_subtree(&entries, "ghost/"), ids(&["ghost/"]));
    }

    #[test]
    fn remove_subtree_filters_descendants() {
        let entries = listing(&["docs/", "docs/a.txt", "docs/2024/", "docs/2024/q.pdf", "img.png"]);
        let remaining = remove_subtree(&entries, "docs/");
        let remaining_ids: Vec<_> = remaining.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(remaining_ids, vec!["img.png"]);
    }
}
