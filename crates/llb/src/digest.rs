//! Content digests for graph nodes
//!
//! A node's digest covers its operation and the digests of every node it
//! reads from, so two nodes with the same digest describe the same work and
//! the external engine can reuse cached results between them.

use sha2::{Digest, Sha256};

/// Incremental digest builder for node identity
pub struct DigestBuilder {
    hasher: Sha256,
}

impl DigestBuilder {
    /// Create a new builder, tagged with the operation kind
    #[must_use]
    pub fn new(kind: &str) -> Self {
        let mut builder = Self {
            hasher: Sha256::new(),
        };
        builder.add_str(kind);
        builder
    }

    /// Add one string field, length-prefixed
    pub fn add_str(&mut self, value: &str) -> &mut Self {
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    /// Add an optional string field; `None` and `Some("")` hash differently
    pub fn add_opt(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(value) => {
                self.hasher.update([1u8]);
                self.add_str(value)
            }
            None => {
                self.hasher.update([0u8]);
                self
            }
        }
    }

    /// Add a boolean flag
    pub fn add_bool(&mut self, value: bool) -> &mut Self {
        self.hasher.update([u8::from(value)]);
        self
    }

    /// Add a list of strings, length-prefixed
    pub fn add_list<S: AsRef<str>>(&mut self, values: &[S]) -> &mut Self {
        self.hasher.update((values.len() as u64).to_le_bytes());
        for value in values {
            self.add_str(value.as_ref());
        }
        self
    }

    /// Finalize and return the `sha256:`-prefixed hex digest
    #[must_use]
    pub fn finalize(self) -> String {
        let result = self.hasher.finalize();
        format!("sha256:{}", hex::encode(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(f: impl FnOnce(&mut DigestBuilder)) -> String {
        let mut builder = DigestBuilder::new("exec");
        f(&mut builder);
        builder.finalize()
    }

    #[test]
    fn test_digest_format() {
        let d = digest(|b| {
            b.add_str("x");
        });
        assert!(d.starts_with("sha256:"));
        assert_eq!(d.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_list_boundaries_matter() {
        let joined = digest(|b| {
            b.add_list(&["ab", "c"]);
        });
        let split = digest(|b| {
            b.add_list(&["a", "bc"]);
        });
        assert_ne!(joined, split);
    }

    #[test]
    fn test_embedded_nul_cannot_shift_field_boundaries() {
        let trailing = digest(|b| {
            b.add_list(&["a\0", "b"]);
        });
        let leading = digest(|b| {
            b.add_list(&["a", "\0b"]);
        });
        assert_ne!(trailing, leading);

        let fields = digest(|b| {
            b.add_str("x\0").add_str("y");
        });
        let shifted = digest(|b| {
            b.add_str("x").add_str("\0y");
        });
        assert_ne!(fields, shifted);
    }

    #[test]
    fn test_option_none_differs_from_empty() {
        let none = digest(|b| {
            b.add_opt(None);
        });
        let empty = digest(|b| {
            b.add_opt(Some(""));
        });
        assert_ne!(none, empty);
    }

    #[test]
    fn test_kind_tag_matters() {
        let exec = DigestBuilder::new("exec").finalize();
        let image = DigestBuilder::new("image").finalize();
        assert_ne!(exec, image);
    }
}
