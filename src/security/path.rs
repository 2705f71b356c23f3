//! Vault path sandboxing.
//!
//! [`PathValidator`] turns untrusted, caller-supplied path strings into
//! [`ValidatedPath`] values: root-relative, `/`-separated, free of traversal and
//! hidden segments, and guaranteed to resolve inside the vault root. It never
//! touches the filesystem, so results must not be cached across writes.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Why a raw path string was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathRejection {
    #[error("path must not be empty")]
    Empty,
    #[error("path contains a NUL byte")]
    NulByte,
    #[error("path contains a parent-directory traversal ('..')")]
    Traversal,
    #[error("path contains an encoded traversal sequence")]
    EncodedTraversal,
    #[error("home-directory expansion ('~/') is not allowed")]
    HomeExpansion,
    #[error("variable expansion ('$') is not allowed")]
    VariableExpansion,
    #[error("absolute paths are not allowed")]
    Absolute,
    #[error("hidden file or folder segment '{0}' is not allowed")]
    HiddenSegment(String),
    #[error("path resolves to the vault root, not a file")]
    RootItself,
    #[error("path resolves outside the vault")]
    OutsideRoot,
    #[error("extension '.{found}' is not allowed (allowed: {allowed})")]
    DisallowedExtension { found: String, allowed: String },
}

/// A sanitized, root-relative path. The only path type collaborators accept for I/O.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ValidatedPath(String);

impl ValidatedPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute location of this path under `root`.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }

    /// Lower-cased extension of the final segment, if it has one.
    pub fn extension(&self) -> Option<String> {
        let file = self.0.rsplit('/').next().unwrap_or(&self.0);
        file.rsplit_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Parent folder, `None` when the path sits directly under the root.
    pub fn parent(&self) -> Option<ValidatedPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| ValidatedPath(parent.to_string()))
    }
}

impl fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct PathValidator {
    root: PathBuf,
    allowed_extensions: Vec<String>,
    default_extension: String,
}

impl PathValidator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize_path(&root.into()),
            allowed_extensions: vec!["md".into()],
            default_extension: "md".into(),
        }
    }

    pub fn with_extensions(
        mut self,
        allowed: impl IntoIterator<Item = impl Into<String>>,
        default_extension: impl Into<String>,
    ) -> Self {
        self.allowed_extensions = allowed
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self.default_extension = default_extension
            .into()
            .trim_start_matches('.')
            .to_ascii_lowercase();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn validate(&self, raw: &str) -> Result<ValidatedPath, PathRejection> {
        let segments = sanitize(raw)?;
        if segments.is_empty() {
            return Err(PathRejection::RootItself);
        }
        let relative = segments.join("/");

        // Lexical containment check: exact root or root + separator, never a bare prefix.
        let resolved = normalize_path(&self.root.join(&relative));
        if !is_within_root(&self.root, &resolved) || resolved == self.root {
            return Err(PathRejection::OutsideRoot);
        }

        Ok(ValidatedPath(relative))
    }

    /// Validate a file path, appending the default extension when none is given
    /// and `require_extension` is set.
    pub fn validate_with_extension(
        &self,
        raw: &str,
        require_extension: bool,
    ) -> Result<ValidatedPath, PathRejection> {
        let path = self.validate(raw)?;
        match path.extension() {
            Some(ext) if self.allowed_extensions.iter().any(|a| *a == ext) => Ok(path),
            Some(ext) => Err(PathRejection::DisallowedExtension {
                found: ext,
                allowed: self.allowed_extensions.join(", "),
            }),
            None if require_extension => {
                // A trailing dot is an empty extension, not a separator.
                let stem = path.as_str().trim_end_matches('.');
                if stem.len() != path.as_str().len() {
                    return self.validate_with_extension(stem, require_extension);
                }
                self.validate(&format!("{stem}.{}", self.default_extension))
            }
            None => Ok(path),
        }
    }

    /// Validate a folder path. Empty input (or only separators) denotes the root and
    /// yields `Ok(None)`.
    pub fn validate_folder(&self, raw: &str) -> Result<Option<ValidatedPath>, PathRejection> {
        let trimmed = raw.trim_end_matches(['/', '\\']);
        if trimmed.is_empty() || trimmed == "." {
            return Ok(None);
        }
        // Everything else must pass the same rules as a file path.
        let segments = sanitize(trimmed)?;
        if segments.is_empty() {
            return Ok(None);
        }
        self.validate(trimmed).map(Some)
    }
}

/// Reject unsafe input and split it into clean segments (`.` and empty segments dropped).
fn sanitize(raw: &str) -> Result<Vec<&str>, PathRejection> {
    if raw.trim().is_empty() {
        return Err(PathRejection::Empty);
    }
    if raw.contains('\0') {
        return Err(PathRejection::NulByte);
    }
    let lowered = raw.to_ascii_lowercase();
    if lowered.contains("%2e%2e") || lowered.contains("%252e%252e") {
        return Err(PathRejection::EncodedTraversal);
    }
    if raw.contains("..") {
        return Err(PathRejection::Traversal);
    }
    if raw == "~" || raw.starts_with("~/") || raw.starts_with("~\\") {
        return Err(PathRejection::HomeExpansion);
    }
    if raw.starts_with('$') {
        return Err(PathRejection::VariableExpansion);
    }
    if raw.starts_with('/') || raw.starts_with('\\') || has_drive_prefix(raw) {
        return Err(PathRejection::Absolute);
    }

    let mut segments = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            s if s.starts_with('.') => return Err(PathRejection::HiddenSegment(s.to_string())),
            s => segments.push(s),
        }
    }
    Ok(segments)
}

fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// True iff `candidate` is `root` itself or lies beneath `root + separator`.
///
/// Both arguments are expected to be normalized absolute paths.
pub fn is_within_root(root: &Path, candidate: &Path) -> bool {
    let root = root.to_string_lossy();
    let candidate = candidate.to_string_lossy();
    let root = root.trim_end_matches(std::path::MAIN_SEPARATOR);
    if candidate == root {
        return true;
    }
    candidate
        .strip_prefix(root)
        .is_some_and(|rest| rest.starts_with(std::path::MAIN_SEPARATOR))
}

pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !components.is_empty()
                    && !matches!(
                        components.last(),
                        Some(Component::RootDir) | Some(Component::Prefix(_))
                    )
                {
                    components.pop();
                }
            }
            Component::CurDir => {}
            c => components.push(c),
        }
    }

    if components.is_empty() {
        PathBuf::from(".")
    } else {
        components.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> PathValidator {
        PathValidator::new("/vault")
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_path(Path::new("/a/./b")), PathBuf::from("/a/b"));
    }

    #[test]
    fn collapses_current_dir_segments() {
        let path = validator().validate("./Projects/./a.md").unwrap();
        assert_eq!(path.as_str(), "Projects/a.md");
        let path = validator().validate("Projects//nested\\b.md").unwrap();
        assert_eq!(path.as_str(), "Projects/nested/b.md");
    }

    #[test]
    fn sibling_directory_is_not_inside_root() {
        let root = Path::new("/vault");
        assert!(!is_within_root(root, Path::new("/vault-evil/x")));
        assert!(!is_within_root(root, Path::new("/vaultx")));
        assert!(is_within_root(root, Path::new("/vault/x")));
        assert!(is_within_root(root, Path::new("/vault")));
    }

    #[test]
    fn drive_letters_are_absolute() {
        assert_eq!(
            validator().validate("C:\\Windows\\win.ini"),
            Err(PathRejection::Absolute)
        );
        assert_eq!(validator().validate("c:notes.md"), Err(PathRejection::Absolute));
    }

    #[test]
    fn extension_helpers() {
        let v = validator();
        assert_eq!(v.validate("a/b.MD").unwrap().extension().as_deref(), Some("md"));
        assert_eq!(v.validate("a/b").unwrap().extension(), None);
        assert_eq!(v.validate("a/b.md").unwrap().parent().unwrap().as_str(), "a");
        assert!(v.validate("b.md").unwrap().parent().is_none());
    }
}
