//! Path validation — filesystem sandboxing to the workspace directory.
//!
//! Ensures file tools can only access paths within allowed roots and
//! blocks access to forbidden paths (e.g., ~/.ssh, /etc).

use std::path::{Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside allowed roots")]
    OutsideAllowedRoots { path: String },

    #[error("Path '{path}' matches forbidden pattern '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

/// Where file tools may read and write.
///
/// Relative paths resolve against `root`; the result must pass
/// [`validate_path`] against the allowed roots and forbidden prefixes.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    root: PathBuf,
    allowed_roots: Vec<String>,
    forbidden_paths: Vec<String>,
}

impl PathPolicy {
    pub fn new(root: impl Into<PathBuf>, allowed_roots: Vec<String>, forbidden_paths: Vec<String>) -> Self {
        let root = root.into();
        let root = root
            .canonicalize()
            .or_else(|_| std::path::absolute(&root))
            .unwrap_or(root);
        Self {
            root,
            allowed_roots,
            forbidden_paths,
        }
    }

    /// A policy rooted at `root` with no restrictions.
    pub fn unrestricted(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Vec::new(), Vec::new())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the workspace root and validate it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        if has_traversal(path) {
            return Err(PathValidationError::PathTraversal { path: path.into() });
        }
        validate_path(&joined.to_string_lossy(), &self.allowed_roots, &self.forbidden_paths)
    }

    /// `path` relative to the workspace root, for display in tool results.
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn has_traversal(path: &str) -> bool {
    let path_str = path.replace('\\', "/");
    path_str.contains("../") || path_str.contains("/..") || path_str == ".."
}

/// Validate that a path is safe to access.
///
/// Checks:
/// 1. No path traversal attacks (`../` sequences)
/// 2. Path is canonicalized to resolve symlinks and relative components
/// 3. Path is within allowed roots (if specified)
/// 4. Path is not in forbidden paths list
///
/// Returns the canonicalized (resolved) path on success.
pub fn validate_path(
    path: &str,
    allowed_roots: &[String],
    forbidden_paths: &[String],
) -> Result<PathBuf, PathValidationError> {
    let input_path = Path::new(path);

    if has_traversal(path) {
        return Err(PathValidationError::PathTraversal { path: path.into() });
    }

    // If the file doesn't exist yet (e.g., for writes), canonicalize the parent.
    let canonical = if input_path.exists() {
        input_path
            .canonicalize()
            .map_err(|e| PathValidationError::CanonicalizeFailed {
                path: path.into(),
                reason: e.to_string(),
            })?
    } else if let Some(parent) = input_path.parent()
        && parent.exists()
    {
        let canonical_parent =
            parent
                .canonicalize()
                .map_err(|e| PathValidationError::CanonicalizeFailed {
                    path: path.into(),
                    reason: format!("Parent dir: {e}"),
                })?;
        canonical_parent.join(input_path.file_name().unwrap_or_default())
    } else {
        input_path.to_path_buf()
    };

    let canonical_str = normalize(&canonical.to_string_lossy());

    for forbidden in forbidden_paths {
        if is_under(&canonical_str, &normalize(&expand_tilde(forbidden))) {
            return Err(PathValidationError::ForbiddenPath {
                path: path.into(),
                pattern: forbidden.clone(),
            });
        }
    }

    if !allowed_roots.is_empty() {
        let is_allowed = allowed_roots
            .iter()
            .any(|root| is_under(&canonical_str, &normalize(&expand_tilde(root))));

        if !is_allowed {
            return Err(PathValidationError::OutsideAllowedRoots { path: path.into() });
        }
    }

    Ok(canonical)
}

/// Forward slashes, lowercase, no Windows extended-length prefix (`\\?\`).
fn normalize(path: &str) -> String {
    let s = path.replace('\\', "/").to_lowercase();
    s.strip_prefix("//?/").unwrap_or(&s).to_string()
}

/// Component-boundary prefix check: `/a/bc` is not under `/a/b`.
fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if (path.starts_with("~/") || path == "~")
        && let Some(home) = home_dir()
    {
        return path.replacen('~', &home, 1);
    }
    path.to_string()
}

fn home_dir() -> Option<String> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok()
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_path_no_restrictions() {
        assert!(validate_path("/home/user/project/file.txt", &[], &[]).is_ok());
    }

    #[test]
    fn path_traversal_blocked() {
        match validate_path("../../../etc/passwd", &[], &[]).unwrap_err() {
            PathValidationError::PathTraversal { .. } => {}
            other => panic!("Expected PathTraversal, got: {other}"),
        }
    }

    #[test]
    fn path_traversal_mid_path_blocked() {
        assert!(validate_path("/home/user/../../../etc/passwd", &[], &[]).is_err());
    }

    #[test]
    fn forbidden_path_blocked() {
        let forbidden = vec!["/etc".into(), "/root".into()];
        match validate_path("/etc/passwd", &[], &forbidden).unwrap_err() {
            PathValidationError::ForbiddenPath { pattern, .. } => assert_eq!(pattern, "/etc"),
            other => panic!("Expected ForbiddenPath, got: {other}"),
        }
    }

    #[test]
    fn sibling_with_shared_prefix_is_not_under_root() {
        let allowed = vec!["/home/user/project1".into()];
        assert!(validate_path("/home/user/project10/file.rs", &allowed, &[]).is_err());
        assert!(validate_path("/home/user/project1/file.rs", &allowed, &[]).is_ok());
    }

    #[test]
    fn allowed_roots_enforced() {
        let allowed = vec!["/home/user/workspace".into()];
        assert!(validate_path("/home/user/workspace/src/main.rs", &allowed, &[]).is_ok());
        match validate_path("/home/other/secret.txt", &allowed, &[]).unwrap_err() {
            PathValidationError::OutsideAllowedRoots { .. } => {}
            other => panic!("Expected OutsideAllowedRoots, got: {other}"),
        }
    }

    #[test]
    fn forbidden_with_tilde_expansion() {
        let forbidden = vec!["~/.ssh".into()];
        if let Some(home) = home_dir() {
            let ssh_path = format!("{home}/.ssh/id_rsa");
            assert!(validate_path(&ssh_path, &[], &forbidden).is_err());
        }
    }

    #[test]
    fn forbidden_takes_precedence_over_allowed() {
        let allowed = vec!["/home/user".into()];
        let forbidden = vec!["/home/user/.ssh".into()];
        assert!(validate_path("/home/user/.ssh/id_rsa", &allowed, &forbidden).is_err());
    }

    #[test]
    fn policy_resolves_relative_paths_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let policy = PathPolicy::unrestricted(dir.path());
        let resolved = policy.resolve("site/index.html").unwrap();
        assert!(resolved.ends_with("site/index.html"));
        assert!(resolved.starts_with(policy.root()));
    }

    #[test]
    fn policy_rejects_relative_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let policy = PathPolicy::unrestricted(dir.path());
        assert!(matches!(
            policy.resolve("../outside.txt"),
            Err(PathValidationError::PathTraversal { .. })
        ));
    }

    #[test]
    fn policy_display_is_root_relative() {
        let policy = PathPolicy::unrestricted("/work");
        assert_eq!(policy.display(Path::new("/work/css/site.css")), "css/site.css");
        assert_eq!(policy.display(Path::new("/elsewhere/x")), "/elsewhere/x");
    }
}
