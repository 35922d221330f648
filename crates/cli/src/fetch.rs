//! Build context on the local filesystem

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tektonic_compiler::{Error, Result, SourceFetcher};
use tracing::debug;

/// Reads sources from a directory
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || name.is_empty() {
            return Err(Error::validation(format!(
                "source name '{name}' must be a relative path inside the build context"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl SourceFetcher for LocalSource {
    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        debug!(path = %path.display(), "Reading source");
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::external_io(format!("read {}", path.display()), e))
    }

    async fn list(&self, patterns: &[String]) -> Result<Vec<String>> {
        let root = self.root.clone();
        let patterns = patterns.to_vec();
        tokio::task::spawn_blocking(move || list_matching(&root, &patterns))
            .await
            .map_err(|e| Error::external_io("list build context", e))?
    }
}

fn list_matching(root: &Path, patterns: &[String]) -> Result<Vec<String>> {
    let mut names = BTreeSet::new();
    for pattern in patterns {
        let full = root.join(pattern);
        let entries = glob::glob(&full.to_string_lossy())
            .map_err(|e| Error::validation(format!("invalid context pattern '{pattern}': {e}")))?;
        for entry in entries {
            let path = entry.map_err(|e| Error::external_io("list build context", e))?;
            if !path.is_file() {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(root) {
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                names.insert(name);
            }
        }
    }
    Ok(names.into_iter().collect())
}
