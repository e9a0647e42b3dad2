// ABOUTME: Recipient list loading and chat id normalization.
// ABOUTME: Reads a JSON array of phone numbers and reconciles them to the `<digits>@c.us` form.

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// Suffix the messaging service uses for one-to-one contacts
pub const CONTACT_SUFFIX: &str = "@c.us";

/// Characters people put in phone numbers that carry no meaning
const FORMATTING_CHARS: &[char] = &[' ', '-', '.', '(', ')'];

/// A recipient in canonical `<digits>@c.us` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatId(String);

impl ChatId {
    /// Normalize a raw number or an already-qualified contact address.
    ///
    /// Accepts `+1 (555) 010-2030`, `15550102030` and `15550102030@c.us`;
    /// all three yield `15550102030@c.us`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let number = trimmed.strip_suffix(CONTACT_SUFFIX).unwrap_or(trimmed);
        if number.contains('@') {
            return Err(format!("'{}' is not a contact address", trimmed));
        }

        let number = number.strip_prefix('+').unwrap_or(number);
        let digits: String = number
            .chars()
            .filter(|c| !FORMATTING_CHARS.contains(c))
            .collect();

        if digits.is_empty() {
            return Err("empty phone number".to_string());
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("'{}' contains non-digit characters", trimmed));
        }

        Ok(Self(format!("{}{}", digits, CONTACT_SUFFIX)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bare phone number without the contact suffix
    pub fn number(&self) -> &str {
        self.0.strip_suffix(CONTACT_SUFFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ChatId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// File-backed recipient list
#[derive(Debug, Clone)]
pub struct RecipientStore {
    path: PathBuf,
}

impl RecipientStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and normalize the recipient list, preserving file order.
    pub fn load(&self) -> Result<Vec<ChatId>, LoadError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| LoadError::from_io(&self.path, e))?;

        let raw: Vec<String> =
            serde_json::from_str(&content).map_err(|e| LoadError::Malformed {
                path: self.path.clone(),
                reason: format!("expected a JSON array of strings: {}", e),
            })?;

        if raw.is_empty() {
            return Err(LoadError::Empty {
                path: self.path.clone(),
            });
        }

        let recipients = raw
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                ChatId::parse(entry).map_err(|reason| LoadError::Malformed {
                    path: self.path.clone(),
                    reason: format!("entry {}: {}", index, reason),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            path = %self.path.display(),
            count = recipients.len(),
            "Loaded recipient list"
        );

        Ok(recipients)
    }
}

/// Write reachable recipients as a JSON array of bare numbers.
///
/// The output uses the same shape `RecipientStore::load` reads, so a sweep
/// result can be fed straight into a send run.
pub fn write_reachable(path: &Path, recipients: &[ChatId]) -> anyhow::Result<()> {
    use anyhow::Context;

    let numbers: Vec<&str> = recipients.iter().map(ChatId::number).collect();
    let json = serde_json::to_string_pretty(&numbers).context("Failed to serialize numbers")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
