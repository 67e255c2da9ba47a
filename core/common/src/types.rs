//! Common types used throughout drivekit.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// A path relative to a remote folder.
///
/// Used for name/path addressing (`items/{id}:/a/b:`), never for
/// local filesystem paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemPath {
    components: Vec<String>,
}

impl ItemPath {
    /// Create an empty path, addressing the folder itself.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Create a path from string components.
    ///
    /// # Preconditions
    /// - Components must not contain path separators
    /// - Components must not be empty strings
    ///
    /// # Errors
    /// - Returns error if any component is invalid
    pub fn from_components(components: Vec<String>) -> crate::Result<Self> {
        for comp in &components {
            validate_component(comp)?;
        }
        Ok(Self { components })
    }

    /// Parse a path string into ItemPath.
    ///
    /// Uses '/' as separator. Leading and trailing separators are ignored.
    pub fn parse(path: &str) -> crate::Result<Self> {
        let path = path.trim_start_matches('/').trim_end_matches('/');
        if path.is_empty() {
            return Ok(Self::root());
        }

        let components: Vec<String> = path.split('/').map(String::from).collect();
        Self::from_components(components)
    }

    /// Check if this path has no components.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut components = self.components.clone();
            components.pop();
            Some(Self { components })
        }
    }

    /// Get the item name (last component).
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Join this path with a child component.
    pub fn join(&self, child: &str) -> crate::Result<Self> {
        validate_component(child)?;
        let mut components = self.components.clone();
        components.push(child.to_string());
        Ok(Self { components })
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }
}

fn validate_component(comp: &str) -> crate::Result<()> {
    if comp.is_empty() {
        return Err(crate::Error::InvalidInput(
            "Path component cannot be empty".to_string(),
        ));
    }
    if comp.contains('/') || comp.contains('\\') {
        return Err(crate::Error::InvalidInput(
            "Path component cannot contain separators".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

/// Bearer token for the drive APIs. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, Serialize, Deserialize)]
#[zeroize(drop)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the raw token value.
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken([REDACTED; {} chars])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_item_path_root() {
        let path = ItemPath::parse("/").unwrap();
        assert!(path.is_root());
        assert_eq!(path.to_string(), "");
    }

    #[test]
    fn test_item_path_parse() {
        let path = ItemPath::parse("Documents/Reports/q3.xlsx").unwrap();
        assert_eq!(path.components(), &["Documents", "Reports", "q3.xlsx"]);
        assert_eq!(path.name(), Some("q3.xlsx"));
        assert_eq!(path.to_string(), "Documents/Reports/q3.xlsx");
    }

    #[test]
    fn test_item_path_rejects_empty_component() {
        assert!(ItemPath::parse("Documents//q3.xlsx").is_err());
        assert!(ItemPath::root().join("").is_err());
        assert!(ItemPath::root().join("a\\b").is_err());
    }

    #[test]
    fn test_item_path_parent() {
        let path = ItemPath::parse("a/b").unwrap();
        assert_eq!(path.parent().unwrap().to_string(), "a");
        assert!(ItemPath::root().parent().is_none());
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("EwB4A8l6BAAU");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("EwB4A8l6BAAU"));
        assert_eq!(token.secret(), "EwB4A8l6BAAU");
    }

    #[test]
    fn test_access_token_serializes_as_plain_string() {
        let token = AccessToken::new("abc");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"abc\"");
    }

    proptest! {
        #[test]
        fn prop_parse_matches_components(parts in prop::collection::vec("[a-zA-Z0-9 ._-]{1,12}", 0..6)) {
            let joined = parts.join("/");
            let parsed = ItemPath::parse(&joined).unwrap();
            prop_assert_eq!(parsed, ItemPath::from_components(parts).unwrap());
        }
    }
}
