//! File-backed image metadata
//!
//! The file is a JSON object keyed by image reference:
//!
//! ```json
//! { "golang:1.22": { "digest": "sha256:...", "env": ["PATH=/usr/local/go/bin"], "workingDir": "/go" } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use tektonic_compiler::{Error, Result, StaticImageResolver};
use tektonic_llb::ImageConfig;
use tracing::debug;

/// Load a resolver from a JSON image map
pub async fn load_images(path: &Path) -> Result<StaticImageResolver> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::external_io(format!("read {}", path.display()), e))?;
    let entries: BTreeMap<String, ImageConfig> = serde_json::from_str(&text).map_err(|e| {
        Error::validation(format!("invalid image map {}: {e}", path.display()))
    })?;

    let mut resolver = StaticImageResolver::new();
    for (reference, config) in entries {
        resolver.insert(&reference, config);
    }
    debug!(path = %path.display(), images = resolver.len(), "Loaded image metadata");
    Ok(resolver)
}
