//! Object-store path type shared by every container definition.
//!
//! Object-store paths are absolute, slash-delimited strings such as
//! `/Altus_Empire_Command_Center/01_Owners/acme-1`. They are not filesystem paths: there is no
//! current directory, no `.`/`..`, and the separator is always `/` whatever the host platform.
//! [`StorePath`] keeps those invariants in one place.

use crate::{AltusError, AltusResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An absolute object-store path.
///
/// Invariants: starts with `/`, has at least one segment, no empty segments (so no trailing
/// slash and no `//`), and no `.` or `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorePath(String);

impl StorePath {
    /// Parses and validates an absolute object-store path.
    ///
    /// # Errors
    ///
    /// Returns [`AltusError::InvalidInput`] if the path breaks any of the type's invariants.
    pub fn parse(raw: &str) -> AltusResult<Self> {
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(AltusError::InvalidInput(format!(
                "path must be absolute: {raw:?}"
            )));
        };
        if rest.is_empty() {
            return Err(AltusError::InvalidInput(
                "path must name at least one folder".into(),
            ));
        }
        for segment in rest.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(AltusError::InvalidInput(format!(
                    "path has an empty or relative segment: {raw:?}"
                )));
            }
        }
        Ok(Self(raw.to_string()))
    }

    /// Wraps a path already known to be valid, such as a compiled-in default.
    pub(crate) fn new_unchecked(raw: &str) -> Self {
        debug_assert!(Self::parse(raw).is_ok(), "invalid store path {raw:?}");
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends one segment.
    ///
    /// Segments come from container names and entity slugs, which never contain `/`.
    pub fn join(&self, segment: &str) -> StorePath {
        debug_assert!(
            !segment.is_empty() && !segment.contains('/'),
            "invalid segment {segment:?}"
        );
        StorePath(format!("{}/{}", self.0, segment))
    }

    /// The containing folder, or `None` for a top-level path.
    pub fn parent(&self) -> Option<StorePath> {
        match self.0.rfind('/') {
            Some(0) | None => None,
            Some(idx) => Some(StorePath(self.0[..idx].to_string())),
        }
    }

    /// Final segment of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// True if `self` is `ancestor` or lies beneath it.
    ///
    /// Comparison is per segment, so `/A/P-10` is not within `/A/P-1`.
    pub fn is_within(&self, ancestor: &StorePath) -> bool {
        self.0 == ancestor.0
            || self
                .0
                .strip_prefix(ancestor.0.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Rewrites the `old` prefix of this path to `new`, if the path lies within `old`.
    pub fn rebase(&self, old: &StorePath, new: &StorePath) -> Option<StorePath> {
        rebase_path(&self.0, old.as_str(), new.as_str()).map(StorePath)
    }

    /// Every path from `root` down to `self`, root first and `self` last.
    ///
    /// Returns `None` when `self` is not within `root`.
    pub fn chain_from(&self, root: &StorePath) -> Option<Vec<StorePath>> {
        if !self.is_within(root) {
            return None;
        }
        let mut chain = vec![self.clone()];
        let mut current = self.clone();
        while current != *root {
            current = current.parent()?;
            chain.push(current.clone());
        }
        chain.reverse();
        Some(chain)
    }
}

/// Rewrites the leading `old` component prefix of `path` to `new`, exactly once.
///
/// Returns `None` unless `path` equals `old` or starts with `old` followed by `/`. The match is
/// on whole segments and ignores case, as object store paths do: `/a/p-1/x` is under `/A/P-1`
/// but `/A/P-10/x` is not. Later occurrences of `old` inside the path are left untouched.
pub fn rebase_path(path: &str, old: &str, new: &str) -> Option<String> {
    let head = path.get(..old.len())?;
    if head.to_lowercase() != old.to_lowercase() {
        return None;
    }
    let rest = path.get(old.len()..)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(format!("{new}{rest}"))
    } else {
        None
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StorePath {
    type Error = AltusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StorePath> for String {
    fn from(value: StorePath) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for raw in ["", "/", "relative/x", "/a/", "/a//b", "/a/./b", "/a/../b"] {
            assert!(StorePath::parse(raw).is_err(), "accepted {raw:?}");
        }
        assert_eq!(p("/a/b").as_str(), "/a/b");
    }

    #[test]
    fn test_join_parent_and_file_name() {
        let path = p("/Root").join("01_Owners").join("acme-1");
        assert_eq!(path.as_str(), "/Root/01_Owners/acme-1");
        assert_eq!(path.file_name(), "acme-1");
        assert_eq!(path.parent(), Some(p("/Root/01_Owners")));
        assert_eq!(p("/Root").parent(), None);
    }

    #[test]
    fn test_is_within_is_component_aware() {
        assert!(p("/A/P-1").is_within(&p("/A/P-1")));
        assert!(p("/A/P-1/x").is_within(&p("/A/P-1")));
        assert!(!p("/A/P-10/x").is_within(&p("/A/P-1")));
        assert!(!p("/A").is_within(&p("/A/P-1")));
    }

    #[test]
    fn test_rebase_path_rewrites_prefix_once() {
        assert_eq!(
            rebase_path("/A/P-1/x.pdf", "/A/P-1", "/B/P-1").as_deref(),
            Some("/B/P-1/x.pdf")
        );
        assert_eq!(
            rebase_path("/A/P-1", "/A/P-1", "/B/P-1").as_deref(),
            Some("/B/P-1")
        );
        // A nested repeat of the prefix is not touched.
        assert_eq!(
            rebase_path("/A/P-1/A/P-1/y", "/A/P-1", "/B/P-1").as_deref(),
            Some("/B/P-1/A/P-1/y")
        );
    }

    #[test]
    fn test_rebase_path_ignores_sibling_prefixes() {
        assert_eq!(rebase_path("/A/P-10/x", "/A/P-1", "/B/P-1"), None);
        assert_eq!(rebase_path("/Z/A/P-1/x", "/A/P-1", "/B/P-1"), None);
    }

    #[test]
    fn test_rebase_path_ignores_case_of_prefix() {
        assert_eq!(
            rebase_path("/a/p-1/Scan.PDF", "/A/P-1", "/B/P-1").as_deref(),
            Some("/B/P-1/Scan.PDF")
        );
        assert_eq!(rebase_path("/a/p-10/x", "/A/P-1", "/B/P-1"), None);
        // A multi-byte character straddling the prefix length is not a match.
        assert_eq!(rebase_path("/A/é", "/A/e", "/B/e"), None);
    }

    #[test]
    fn test_chain_from_root() {
        let chain = p("/R/a/b").chain_from(&p("/R")).unwrap();
        let chain: Vec<&str> = chain.iter().map(StorePath::as_str).collect();
        assert_eq!(chain, vec!["/R", "/R/a", "/R/a/b"]);

        assert_eq!(p("/R").chain_from(&p("/R")).unwrap(), vec![p("/R")]);
        assert!(p("/S/a").chain_from(&p("/R")).is_none());
    }

    #[test]
    fn test_serde_validates() {
        let path: StorePath = serde_json::from_str("\"/R/a\"").unwrap();
        assert_eq!(path, p("/R/a"));
        assert!(serde_json::from_str::<StorePath>("\"R/a\"").is_err());
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"/R/a\"");
    }
}
