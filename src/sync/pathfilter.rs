//! Path-filter grammar for a filtered clone: shell-style glob with one
//! extension, `**`, matching any number of path components.
//!
//! When the filter contains `**`, it is split at the first occurrence
//! into a prefix and a suffix. The path must start with the prefix
//! (trailing slash stripped); if a suffix remains, it is matched as a
//! glob against some tail of the path's remaining components, so
//! `src/**/mod.rs` reaches `src/a/b/mod.rs` as well as `src/mod.rs`.
//! Without `**`, the filter is a plain [`glob::Pattern`].

use glob::Pattern;

pub fn matches(path: &str, filter: &str) -> bool {
    match filter.find("**") {
        Some(idx) => matches_double_star(path, filter, idx),
        None => Pattern::new(filter).map(|p| p.matches(path)).unwrap_or(false),
    }
}

fn matches_double_star(path: &str, filter: &str, star_idx: usize) -> bool {
    let prefix = filter[..star_idx].trim_end_matches('/');
    let suffix = filter[star_idx + 2..].trim_start_matches('/');

    if !prefix.is_empty() && path != prefix && !path.starts_with(&format!("{prefix}/")) {
        return false;
    }

    if suffix.is_empty() {
        return true;
    }

    let Ok(pattern) = Pattern::new(suffix) else {
        return false;
    };

    let remainder = path.strip_prefix(prefix).unwrap_or(path).trim_start_matches('/');
    let components: Vec<&str> = remainder.split('/').collect();
    (0..components.len()).any(|start| pattern.matches(&components[start..].join("/")))
}

/// Join a parent tree path with an entry name, skipping the leading
/// separator when the parent path is the (root) empty string.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_glob_matches_one_directory_level() {
        assert!(matches("docs/b.md", "docs/*"));
        assert!(!matches("src/a.txt", "docs/*"));
    }

    #[test]
    fn double_star_matches_any_depth_of_nesting() {
        assert!(matches("src/mod.rs", "src/**/mod.rs"));
        assert!(matches("src/a/b/mod.rs", "src/**/mod.rs"));
        assert!(!matches("lib/a/mod.rs", "src/**/mod.rs"));
    }

    #[test]
    fn bare_double_star_matches_everything_under_prefix() {
        assert!(matches("docs/a/b/c.md", "docs/**"));
        assert!(!matches("src/a.md", "docs/**"));
    }

    #[test]
    fn join_root_path_has_no_leading_slash() {
        assert_eq!(join("", "src"), "src");
        assert_eq!(join("src", "lib.rs"), "src/lib.rs");
    }
}
