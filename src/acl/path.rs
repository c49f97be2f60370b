//! Path normalization and ancestor chains.

use crate::constants::ROOT_PATH;

/// Canonical form of a path: no surrounding or repeated `/`. The root is `""`.
#[must_use]
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parent of a normalized path, or `None` for the root.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT_PATH {
        return None;
    }
    Some(path.rsplit_once('/').map_or(ROOT_PATH, |(parent, _)| parent))
}

/// The path itself followed by each ancestor, ending with the root.
#[must_use]
pub fn ancestors(path: &str) -> Vec<String> {
    let mut current = normalize(path);
    let mut chain = Vec::with_capacity(current.matches('/').count() + 2);
    loop {
        let next = parent(&current).map(str::to_string);
        chain.push(current);
        match next {
            Some(next) => current = next,
            None => break,
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_slashes() {
        assert_eq!(normalize("/a//b/c/"), "a/b/c");
        assert_eq!(normalize("a/b"), "a/b");
        assert_eq!(normalize("/"), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn ancestors_end_at_root() {
        assert_eq!(ancestors("/base/a/b"), vec!["base/a/b", "base/a", "base", ""]);
        assert_eq!(ancestors("base"), vec!["base", ""]);
        assert_eq!(ancestors("/"), vec![""]);
    }

    #[test]
    fn root_has_no_parent() {
        assert_eq!(parent(""), None);
        assert_eq!(parent("a"), Some(""));
        assert_eq!(parent("a/b"), Some("a"));
    }
}
