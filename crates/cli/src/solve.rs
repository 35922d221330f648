//! Solver that emits the marshalled definition as JSON

use async_trait::async_trait;
use std::path::PathBuf;
use tektonic_compiler::{Error, Result, SolveResult, Solver};
use tektonic_llb::MarshalledDefinition;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Writes definitions to a file, or stdout when no path is set
#[derive(Debug, Clone, Default)]
pub struct JsonSolver {
    pub output: Option<PathBuf>,
}

impl JsonSolver {
    pub const fn new(output: Option<PathBuf>) -> Self {
        Self { output }
    }
}

#[async_trait]
impl Solver for JsonSolver {
    async fn solve(&self, definition: &MarshalledDefinition) -> Result<SolveResult> {
        let mut json = definition.to_json()?;
        json.push('\n');

        let reference = match &self.output {
            Some(path) => {
                tokio::fs::write(path, json.as_bytes())
                    .await
                    .map_err(|e| Error::external_io(format!("write {}", path.display()), e))?;
                Some(path.display().to_string())
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout
                    .write_all(json.as_bytes())
                    .await
                    .map_err(|e| Error::external_io("write stdout", e))?;
                stdout
                    .flush()
                    .await
                    .map_err(|e| Error::external_io("flush stdout", e))?;
                None
            }
        };

        info!(
            digest = %definition.output_digest,
            nodes = definition.nodes.len(),
            "Definition written"
        );
        Ok(SolveResult {
            output_digest: definition.output_digest.clone(),
            reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tektonic_llb::{Definition, ImageConfig, ImageOp, Op};

    #[tokio::test]
    async fn test_writes_definition_file() {
        let mut definition = Definition::new();
        let node = definition
            .push(Op::Image(ImageOp {
                reference: "docker.io/library/alpine:latest".to_string(),
                config: ImageConfig::default(),
                display_name: "alpine".to_string(),
            }))
            .unwrap();
        let marshalled = definition.marshal(node).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let result = JsonSolver::new(Some(path.clone()))
            .solve(&marshalled)
            .await
            .unwrap();

        assert_eq!(result.output_digest, marshalled.output_digest);
        assert_eq!(result.reference, Some(path.display().to_string()));
        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["outputDigest"], marshalled.output_digest.as_str());
    }
}
