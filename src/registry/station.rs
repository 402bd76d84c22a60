//! Station identifier

use std::borrow::Borrow;

/// Opaque station key (e.g. "QRR")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(String);

impl StationId {
    /// Create a new station id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for StationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_display_and_lookup_by_str() {
        let id = StationId::new("QRR");
        assert_eq!(id.to_string(), "QRR");

        let mut map = HashMap::new();
        map.insert(id.clone(), 1);
        assert_eq!(map.get("QRR"), Some(&1));
        assert_eq!(StationId::from("QRR"), id);
    }
}
