//! Image metadata resolution
//!
//! The graph builder needs an [`ImageConfig`] for every step image. Where it
//! comes from (a registry, a lock file, a fixture) is up to the caller.

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tektonic_llb::{ImageConfig, ImageReference};
use tracing::debug;

/// Resolves an image reference to the config used to seed a node
#[async_trait]
pub trait ImageMetadataResolver: Send + Sync {
    /// Look up `reference`.
    ///
    /// Implementations report failures as [`crate::Error::ExternalIo`].
    async fn resolve(&self, reference: &ImageReference) -> Result<ImageConfig>;
}

/// Resolver backed by an in-memory table
///
/// References missing from the table resolve to an unpinned, empty config.
#[derive(Debug, Clone, Default)]
pub struct StaticImageResolver {
    images: HashMap<String, ImageConfig>,
}

impl StaticImageResolver {
    /// Create an empty resolver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for `reference`.
    ///
    /// The key is normalized when it parses, so `alpine` and
    /// `docker.io/library/alpine` name the same entry.
    #[must_use]
    pub fn with_image(mut self, reference: &str, config: ImageConfig) -> Self {
        self.insert(reference, config);
        self
    }

    /// Register metadata for `reference` in place
    pub fn insert(&mut self, reference: &str, config: ImageConfig) {
        let key = ImageReference::parse_normalized(reference)
            .map_or_else(|_| reference.to_string(), |r| r.to_string());
        self.images.insert(key, config);
    }

    /// Number of registered images
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether no images are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[async_trait]
impl ImageMetadataResolver for StaticImageResolver {
    async fn resolve(&self, reference: &ImageReference) -> Result<ImageConfig> {
        let key = reference.to_string();
        match self.images.get(&key) {
            Some(config) => Ok(config.clone()),
            None => {
                debug!(image = %key, "No metadata registered, using unpinned config");
                Ok(ImageConfig::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keys_are_normalized() {
        let config = ImageConfig {
            digest: Some(format!("sha256:{}", "b".repeat(64))),
            ..ImageConfig::default()
        };
        let resolver = StaticImageResolver::new().with_image("alpine", config.clone());

        let reference = ImageReference::parse_normalized("docker.io/library/alpine").unwrap();
        assert_eq!(resolver.resolve(&reference).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_unknown_image_is_unpinned() {
        let resolver = StaticImageResolver::new();
        let reference = ImageReference::parse_normalized("busybox:1.36").unwrap();
        assert_eq!(
            resolver.resolve(&reference).await.unwrap(),
            ImageConfig::default()
        );
    }
}
