//! Graph building
//!
//! [`GraphBuilder`] appends image and exec nodes for a sequence of step
//! descriptors to a [`Definition`] arena. Step *i* sees step *i-1*'s root
//! filesystem read-only at `/tekton-results/<i-1>`; nothing is copied.

use crate::context::cancellable;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::resolver::ImageMetadataResolver;
use crate::step::{MountOrigin, MountSpec, StepDescriptor};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tektonic_llb::{Definition, ExecOp, ImageConfig, ImageOp, MergeOp, Mount, NodeId, Op};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Appends step chains to a [`Definition`]
pub struct GraphBuilder<'a> {
    definition: &'a mut Definition,
    resolver: &'a dyn ImageMetadataResolver,
    cancel: CancellationToken,
    diagnostics: Arc<dyn Diagnostics>,
    ignore_cache: bool,
    /// Image nodes already added during this build, by normalized reference
    images: HashMap<String, (NodeId, ImageConfig)>,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder over `definition`
    pub fn new(
        definition: &'a mut Definition,
        resolver: &'a dyn ImageMetadataResolver,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            definition,
            resolver,
            cancel: CancellationToken::new(),
            diagnostics,
            ignore_cache: false,
            images: HashMap::new(),
        }
    }

    /// Abort resolver calls when `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Mark every exec node as uncacheable
    #[must_use]
    pub const fn with_ignore_cache(mut self, ignore_cache: bool) -> Self {
        self.ignore_cache = ignore_cache;
        self
    }

    /// Chain `descriptors` into exec nodes and return the last one.
    ///
    /// `extra_mounts` are attached to every step after its own mounts.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyTaskSpec`] when `descriptors` is empty
    /// - [`Error::Cancelled`] when the build is cancelled
    /// - whatever the image resolver reports, wrapped with the step name
    pub async fn build(
        &mut self,
        resource: &str,
        descriptors: &[StepDescriptor],
        extra_mounts: &[MountSpec],
    ) -> Result<NodeId> {
        if descriptors.is_empty() {
            return Err(Error::empty_task_spec(resource));
        }

        let mut outputs: Vec<NodeId> = Vec::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.iter().enumerate() {
            let node = self
                .build_step(index, descriptor, extra_mounts, &outputs)
                .await
                .map_err(|e| e.in_step(&descriptor.display_name))?;
            outputs.push(node);
        }

        debug!(resource, nodes = outputs.len(), "Built step chain");
        outputs
            .last()
            .copied()
            .ok_or_else(|| Error::empty_task_spec(resource))
    }

    /// Combine `inputs` into one node, in order
    ///
    /// # Errors
    ///
    /// Fails if an input is not part of the definition.
    pub fn merge(&mut self, inputs: Vec<NodeId>, display_name: impl Into<String>) -> Result<NodeId> {
        let merge = MergeOp {
            inputs,
            display_name: display_name.into(),
        };
        Ok(self.definition.push(Op::Merge(merge))?)
    }

    async fn build_step(
        &mut self,
        index: usize,
        descriptor: &StepDescriptor,
        extra_mounts: &[MountSpec],
        outputs: &[NodeId],
    ) -> Result<NodeId> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (image, config) = self.image_node(descriptor).await?;

        let previous = index.checked_sub(1).map(MountSpec::step_output);
        let mut mounts = vec![Mount::node("/", image, false)];
        for spec in descriptor
            .mounts
            .iter()
            .chain(extra_mounts)
            .chain(previous.as_ref())
        {
            mounts.push(resolve_mount(spec, outputs)?);
        }

        let cwd = descriptor
            .working_dir
            .clone()
            .or_else(|| config.working_dir.clone())
            .unwrap_or_else(|| "/".to_string());

        let exec = ExecOp {
            args: descriptor.args.clone(),
            env: overlay_env(&config.env, &descriptor.env),
            cwd,
            user: config.user,
            display_name: descriptor.display_name.clone(),
            ignore_cache: self.ignore_cache,
            mounts,
        };
        Ok(self.definition.push(Op::Exec(exec))?)
    }

    async fn image_node(&mut self, descriptor: &StepDescriptor) -> Result<(NodeId, ImageConfig)> {
        let reference = descriptor.image.to_string();
        if let Some(cached) = self.images.get(&reference) {
            return Ok(cached.clone());
        }

        let config = cancellable(&self.cancel, self.resolver.resolve(&descriptor.image)).await?;
        self.diagnostics.emit(DiagnosticEvent::ImageResolved {
            reference: reference.clone(),
            digest: config.digest.clone(),
        });

        let node = self.definition.push(Op::Image(ImageOp {
            reference: reference.clone(),
            config: config.clone(),
            display_name: format!("load metadata for {reference}"),
        }))?;
        self.images.insert(reference, (node, config.clone()));
        Ok((node, config))
    }
}

fn resolve_mount(spec: &MountSpec, outputs: &[NodeId]) -> Result<Mount> {
    let mount = match &spec.origin {
        MountOrigin::Cache { key, sharing } => Mount {
            readonly: spec.readonly,
            ..Mount::cache(spec.target.clone(), key.clone(), *sharing)
        },
        MountOrigin::StepOutput { index } => {
            let node = outputs
                .get(*index)
                .copied()
                .ok_or(tektonic_llb::Error::UnknownNode { node: *index })?;
            Mount::node(spec.target.clone(), node, spec.readonly)
        }
        MountOrigin::Node(node) => Mount::node(spec.target.clone(), *node, spec.readonly),
    };
    Ok(mount)
}

/// Image environment with step entries applied on top, by variable name
fn overlay_env(base: &[String], overrides: &[String]) -> Vec<String> {
    let key = |entry: &str| entry.split_once('=').map_or(entry, |(k, _)| k).to_string();

    let mut env: Vec<String> = base.to_vec();
    for entry in overrides {
        let name = key(entry);
        match env.iter().position(|existing| key(existing) == name) {
            Some(position) => env[position].clone_from(entry),
            None => env.push(entry.clone()),
        }
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::diagnostics::RecordingDiagnostics;
    use crate::resolver::StaticImageResolver;
    use tektonic_llb::{ImageReference, MountSource};

    fn descriptor(name: &str, image: &str) -> StepDescriptor {
        StepDescriptor {
            name: name.to_string(),
            display_name: format!("run/{name}"),
            image: ImageReference::parse_normalized(image).unwrap(),
            args: vec!["true".into()],
            env: vec![],
            working_dir: None,
            mounts: vec![MountSpec::cache("/tekton/results", "run/results")],
        }
    }

    fn exec(definition: &Definition, id: NodeId) -> ExecOp {
        match &definition.node(id).unwrap().op {
            Op::Exec(exec) => exec.clone(),
            other => panic!("expected exec, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chain_mounts_previous_step() {
        let resolver = StaticImageResolver::new();
        let mut definition = Definition::new();
        let mut builder =
            GraphBuilder::new(&mut definition, &resolver, Arc::new(RecordingDiagnostics::new()));

        let last = builder
            .build("run", &[descriptor("a", "alpine"), descriptor("b", "alpine")], &[])
            .await
            .unwrap();

        // one shared image node plus two execs
        assert_eq!(definition.len(), 3);
        let second = exec(&definition, last);
        let previous = second
            .mounts
            .iter()
            .find(|m| m.target == "/tekton-results/0")
            .unwrap();
        assert!(previous.readonly);
        assert_eq!(
            previous.source,
            MountSource::Node {
                node: definition.nodes()[1].id,
                selector: "/".into()
            }
        );
    }

    #[tokio::test]
    async fn test_env_and_cwd_follow_image_config() {
        let resolver = StaticImageResolver::new().with_image(
            "golang:1.22",
            ImageConfig {
                env: vec!["PATH=/usr/local/go/bin".into(), "GOPATH=/go".into()],
                working_dir: Some("/go".into()),
                ..ImageConfig::default()
            },
        );
        let mut definition = Definition::new();
        let mut builder =
            GraphBuilder::new(&mut definition, &resolver, Arc::new(RecordingDiagnostics::new()))
                .with_ignore_cache(true);

        let mut step = descriptor("build", "golang:1.22");
        step.env = vec!["GOPATH=/workspace/go".into(), "CGO_ENABLED=0".into()];
        let id = builder.build("run", &[step], &[]).await.unwrap();

        let exec = exec(&definition, id);
        assert_eq!(exec.cwd, "/go");
        assert!(exec.ignore_cache);
        assert_eq!(
            exec.env,
            vec!["PATH=/usr/local/go/bin", "GOPATH=/workspace/go", "CGO_ENABLED=0"]
        );
    }

    #[tokio::test]
    async fn test_empty_descriptors() {
        let resolver = StaticImageResolver::new();
        let mut definition = Definition::new();
        let mut builder =
            GraphBuilder::new(&mut definition, &resolver, Arc::new(RecordingDiagnostics::new()));
        let err = builder.build("run", &[], &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyTaskSpec);
    }

    #[tokio::test]
    async fn test_cancelled_build() {
        let resolver = StaticImageResolver::new();
        let token = CancellationToken::new();
        token.cancel();
        let mut definition = Definition::new();
        let mut builder =
            GraphBuilder::new(&mut definition, &resolver, Arc::new(RecordingDiagnostics::new()))
                .with_cancellation(token);
        let err = builder
            .build("run", &[descriptor("a", "alpine")], &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_overlay_env_without_values() {
        assert_eq!(
            overlay_env(&["A=1".into()], &["A".into(), "B=2".into()]),
            vec!["A", "B=2"]
        );
    }
}
