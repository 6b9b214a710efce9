pub const SEPARATOR: char = '/';

/// Full object key for `entry_name` inside the folder at `current_prefix`.
pub fn compose_object_path(current_prefix: &str, entry_name: &str) -> String {
    if current_prefix.is_empty() {
        entry_name.to_string()
    } else {
        format!("{current_prefix}{entry_name}")
    }
}

/// Normalizes a user supplied folder name into a prefix with exactly one
/// trailing separator. Returns an empty string when nothing is left.
pub fn compose_folder_prefix(name: &str) -> String {
    let trimmed = name.strip_prefix(SEPARATOR).unwrap_or(name);
    let trimmed = trimmed.strip_suffix(SEPARATOR).unwrap_or(trimmed);
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed}{SEPARATOR}")
}

pub fn is_folder_key(key: &str) -> bool {
    key.ends_with(SEPARATOR)
}

/// Prefix of the folder holding `key`; root is the empty string.
pub fn parent_prefix(key: &str) -> &str {
    let body = key.strip_suffix(SEPARATOR).unwrap_or(key);
    match body.rfind(SEPARATOR) {
        Some(idx) => &key[..=idx],
        None => "",
    }
}

/// Last segment of `key`, keeping the trailing separator of folder keys.
pub fn leaf_name(key: &str) -> &str {
    &key[parent_prefix(key).len()..]
}

pub fn display_name(name: &str) -> &str {
    name.strip_suffix(SEPARATOR).unwrap_or(name)
}

/// First level below `prefix` that `key` lives under, if `key` is nested
/// deeper than a direct child.
pub fn first_level_folder(prefix: &str, key: &str) -> Option<String> {
    let rest = key.strip_prefix(prefix)?;
    let idx = rest.find(SEPARATOR)?;
    if idx + 1 == rest.len() {
        return None;
    }
    Some(format!("{prefix}{}", &rest[..=idx]))
}
