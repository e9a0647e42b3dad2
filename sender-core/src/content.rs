// ABOUTME: Loads the static message body sent to every recipient.
// ABOUTME: The file's trimmed contents are used verbatim.

use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// The message body for a run. Never empty once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent(String);

impl MessageContent {
    /// Build from text, rejecting bodies that are empty after trimming.
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct ContentLoader {
    path: PathBuf,
}

impl ContentLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<MessageContent, LoadError> {
        let text =
            std::fs::read_to_string(&self.path).map_err(|e| LoadError::from_io(&self.path, e))?;
        let content = MessageContent::new(&text).ok_or_else(|| LoadError::Empty {
            path: self.path.clone(),
        })?;

        tracing::debug!(
            path = %self.path().display(),
            chars = content.as_str().chars().count(),
            "Loaded message text"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_trims_body() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("first.txt");
        std::fs::write(&path, "\n  Hello there,\nsee you soon.  \n\n").unwrap();

        let content = ContentLoader::new(&path).load().unwrap();
        assert_eq!(content.as_str(), "Hello there,\nsee you soon.");
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("first.txt");
        std::fs::write(&path, " \n\t \n").unwrap();

        let err = ContentLoader::new(&path).load().unwrap_err();
        assert!(matches!(err, LoadError::Empty { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ContentLoader::new(dir.path().join("first.txt"))
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }
}
