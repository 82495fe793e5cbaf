//! Deterministic, collision-free, length-bounded name generation for
//! `(server_id, tool_name)` pairs — the algorithm the bridge uses to turn
//! every MCP tool into a host-callable tool name.

use std::collections::HashSet;

use sha1::{Digest, Sha1};

pub const MAX_NAME_LEN: usize = 64;

/// Lowercases, collapses every run of non-alphanumeric characters to a
/// single underscore, and trims leading/trailing underscores. Never
/// returns an empty string — an all-punctuation input becomes `"tool"`.
///
/// Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_underscore = false;
    for ch in input.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            last_was_underscore = false;
        } else if !last_was_underscore {
            out.push('_');
            last_was_underscore = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() { "tool".to_string() } else { trimmed.to_string() }
}

/// Computes the safe host-tool name for `(server_id, tool_name)`, registering
/// it in `used` so a later call with a colliding base name gets a
/// hash-disambiguated variant instead. The sanitizer itself never errors —
/// every non-empty pair produces a valid name.
pub fn safe_name(server_id: &str, tool_name: &str, used: &mut HashSet<String>) -> String {
    let base = format!("mcp_{}_{}", sanitize(server_id), sanitize(tool_name));
    let mut candidate =
        if base.len() > MAX_NAME_LEN { truncate_with_hash(&base, server_id, tool_name) } else { base };

    if used.contains(&candidate) {
        candidate = apply_collision_suffix(&candidate, server_id, tool_name);
    }

    used.insert(candidate.clone());
    candidate
}

fn truncate_with_hash(base: &str, server_id: &str, tool_name: &str) -> String {
    let suffix = format!("_{}", hash_suffix(server_id, tool_name));
    if suffix.len() > MAX_NAME_LEN {
        return last_n_bytes(&suffix, MAX_NAME_LEN);
    }
    let prefix_len = MAX_NAME_LEN - suffix.len();
    format!("{}{suffix}", first_n_bytes(base, prefix_len))
}

fn apply_collision_suffix(candidate: &str, server_id: &str, tool_name: &str) -> String {
    let suffix = format!("_{}", hash_suffix(server_id, tool_name));
    let combined = format!("{candidate}{suffix}");
    if combined.len() <= MAX_NAME_LEN {
        combined
    } else {
        truncate_with_hash(candidate, server_id, tool_name)
    }
}

fn hash_suffix(server_id: &str, tool_name: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{server_id}:{tool_name}").as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..8].to_string()
}

fn first_n_bytes(s: &str, n: usize) -> &str {
    let mut end = n.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn last_n_bytes(s: &str, n: usize) -> String {
    let start = s.len().saturating_sub(n);
    let mut start = start;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_valid_charset(name: &str) -> bool {
        name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    #[test]
    fn s1_sanitize_join() {
        let mut used = HashSet::new();
        let name = safe_name("git-hub", "search/repo", &mut used);
        assert_eq!(name, "mcp_git_hub_search_repo");
    }

    #[test]
    fn s2_sanitize_dedupe() {
        let mut used = HashSet::new();
        let first = safe_name("foo-bar", "baz", &mut used);
        assert_eq!(first, "mcp_foo_bar_baz");

        let second = safe_name("foo_bar", "baz", &mut used);
        let expected_suffix = hash_suffix("foo_bar", "baz");
        assert_eq!(second, format!("mcp_foo_bar_baz_{expected_suffix}"));
        assert_eq!(second.len(), 24);
        assert_ne!(first, second);
    }

    #[test]
    fn s3_sanitize_truncate() {
        let server_id = "server".repeat(10);
        let tool_name = "tool".repeat(10);
        let mut used = HashSet::new();
        let name = safe_name(&server_id, &tool_name, &mut used);
        assert!(name.len() <= MAX_NAME_LEN);
        let suffix = format!("_{}", hash_suffix(&server_id, &tool_name));
        assert!(name.ends_with(&suffix));
    }

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize("__hello--world__"), "hello_world");
        assert_eq!(sanitize("Hello World!!"), "hello_world");
        assert_eq!(sanitize("???"), "tool");
        assert_eq!(sanitize(""), "tool");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for input in ["git-hub", "search/repo", "???", "Hello World!!", ""] {
            let once = sanitize(input);
            let twice = sanitize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn invariant_charset_and_length_hold_for_many_pairs() {
        let mut used = HashSet::new();
        for i in 0..200 {
            let name = safe_name(&format!("server-{i}"), &format!("tool/{i}"), &mut used);
            assert!(name.len() <= MAX_NAME_LEN, "{name} exceeds length cap");
            assert!(is_valid_charset(&name), "{name} has invalid characters");
            assert!(!name.starts_with('_') && !name.ends_with('_'), "{name} has stray underscore");
        }
    }

    #[test]
    fn invariant_registered_names_are_pairwise_distinct() {
        let mut used = HashSet::new();
        let mut names = Vec::new();
        for i in 0..50 {
            names.push(safe_name("same-server", &format!("tool-{i}"), &mut used));
        }
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
