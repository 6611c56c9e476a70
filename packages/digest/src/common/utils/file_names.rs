use sha2::{Digest, Sha256};

/// Longest stem kept from a human-readable name before the hash suffix.
const MAX_STEM_CHARS: usize = 80;

/// Turn an arbitrary display string into a single safe path component.
///
/// Path separators, control characters, and characters rejected by common
/// filesystems become `_`; whitespace runs become a single `_`. Leading dots
/// are dropped so the result is never hidden or `..`. Falls back to
/// `untitled` when nothing usable remains.
pub fn safe_file_stem(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;

    for c in name.trim().chars() {
        let mapped = if c.is_whitespace()
            || c.is_control()
            || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        {
            '_'
        } else {
            c
        };

        if mapped == '_' {
            if !last_was_sep {
                out.push('_');
            }
            last_was_sep = true;
        } else {
            out.push(mapped);
            last_was_sep = false;
        }
    }

    let trimmed: String = out
        .trim_start_matches(|c: char| c == '.' || c == '_')
        .trim_end_matches('_')
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();

    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}

/// Short, stable hex digest of `key`.
pub fn short_hash(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..4])
}

/// Unique, filesystem-safe label: sanitized `title` plus a hash of `identity`.
///
/// Two papers with the same title but different identities never collide.
pub fn unique_label(title: &str, identity: &str) -> String {
    format!("{}-{}", safe_file_stem(title), short_hash(identity))
}
