use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::model::{Entry, SortMode};
use crate::paths::first_level_folder;

/// One object as reported by the gateway's `list` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawObject {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

/// Body of a successful `list` call. `files` is required: a body without
/// it is a decode failure, not an empty folder.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse {
    pub files: Vec<RawObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Maps a raw listing fetched for `prefix` into entries.
///
/// Keys nested below a direct child get synthesized folder entries for
/// every level in between when the store did not report marker objects.
/// `now` stands in for missing or unreadable timestamps.
pub fn entries_from_objects(prefix: &str, objects: &[RawObject], now: DateTime<Utc>) -> Vec<Entry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(objects.len());

    for object in objects {
        if object.name.is_empty() || object.name == prefix {
            continue;
        }
        let modified_at = parse_timestamp(object.last_modified.as_deref()).unwrap_or(now);

        let mut base = prefix.to_string();
        while let Some(folder_key) = first_level_folder(&base, &object.name) {
            if seen.insert(folder_key.clone()) {
                entries.push(Entry::from_key(&folder_key, 0, modified_at));
            }
            base = folder_key;
        }

        if seen.insert(object.name.clone()) {
            entries.push(Entry::from_key(
                &object.name,
                object.size.unwrap_or(0),
                modified_at,
            ));
        } else if let Some(existing) = entries.iter_mut().find(|entry| entry.id == object.name) {
            // an explicit marker replaces the synthesized folder
            existing.modified_at = modified_at;
            existing.created_at = modified_at;
        }
    }

    entries
}

/// RFC 3339, or a naive ISO-8601 datetime (no offset) read as UTC.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn direct_children(listing: &[Entry], prefix: &str) -> Vec<Entry> {
    listing
        .iter()
        .filter(|entry| entry.parent_id == prefix)
        .cloned()
        .collect()
}

pub fn sort_entries(entries: &mut [Entry], sort_mode: SortMode) {
    entries.sort_by(|left, right| {
        let group_cmp = entry_group(left).cmp(&entry_group(right));
        if group_cmp != Ordering::Equal {
            return group_cmp;
        }

        match sort_mode {
            SortMode::Name => cmp_name(left, right),
            SortMode::Size => left
                .size
                .cmp(&right.size)
                .reverse()
                .then_with(|| cmp_name(left, right)),
            SortMode::ModifiedAt => right
                .modified_at
                .cmp(&left.modified_at)
                .then_with(|| cmp_name(left, right)),
        }
    });
}

fn entry_group(entry: &Entry) -> u8 {
    if entry.is_folder() { 0 } else { 1 }
}

fn cmp_name(left: &Entry, right: &Entry) -> Ordering {
    left.name.to_lowercase().cmp(&right.name.to_lowercase())
}
