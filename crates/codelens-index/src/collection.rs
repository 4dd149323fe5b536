//! Collection naming.

use std::path::Path;

pub const DEFAULT_PREFIX: &str = "codelens";

/// `"{prefix}-{basename}"` for the absolute form of `project_root`.
///
/// Only the final path component is used, so `/a/app` and `/b/app` share a
/// collection. Callers that index both pass an explicit name instead.
#[must_use]
pub fn collection_name(project_root: &Path, prefix: &str) -> String {
    let absolute = std::path::absolute(project_root).unwrap_or_else(|_| project_root.to_path_buf());
    let base = absolute
        .components()
        .next_back()
        .and_then(|c| match c {
            std::path::Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .unwrap_or_else(|| "root".to_owned());
    format!("{prefix}-{}", sanitize(&base))
}

/// Keep names valid for every backend: ASCII alphanumerics, `-`, `_`, `.`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_final_component() {
        assert_eq!(
            collection_name(Path::new("/home/dev/projects/shop-api"), DEFAULT_PREFIX),
            "codelens-shop-api"
        );
    }

    #[test]
    fn same_basename_collides() {
        let a = collection_name(Path::new("/a/app"), DEFAULT_PREFIX);
        let b = collection_name(Path::new("/b/app"), DEFAULT_PREFIX);
        assert_eq!(a, b);
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let expected = collection_name(&cwd, "p");
        assert_eq!(collection_name(Path::new("."), "p"), expected);
    }

    #[test]
    fn trailing_slash_and_odd_chars() {
        assert_eq!(collection_name(Path::new("/srv/my app/"), "x"), "x-my_app");
    }

    #[test]
    fn filesystem_root_falls_back() {
        assert_eq!(collection_name(Path::new("/"), "x"), "x-root");
    }
}
