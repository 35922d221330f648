//! End-to-end TaskRun compilation tests

use std::sync::Arc;
use tektonic_compiler::{
    BuildContext, BuildOptions, CompiledGraph, DiagnosticEvent, ErrorKind, RecordingDiagnostics,
    StaticImageResolver, compile,
};
use tektonic_llb::{CacheSharing, ExecOp, MountSource, NodeId, Op};
use tektonic_resources::ResourceLoader;

const BUILD_1: &str = r"apiVersion: tekton.dev/v1beta1
kind: TaskRun
metadata:
  name: build-1
spec:
  taskSpec:
    workspaces:
    - name: shared
    steps:
    - name: hello
      image: alpine
      command: [echo]
      args: [hi]
    - name: read
      image: alpine
      command: [cat, /tekton-results/0/out]
";

async fn compile_text(text: &str) -> tektonic_compiler::Result<CompiledGraph> {
    let loaded = ResourceLoader::new().load::<&str>(text, &[])?;
    let ctx = BuildContext::default().with_diagnostics(Arc::new(RecordingDiagnostics::new()));
    compile(
        &loaded,
        &BuildOptions::default(),
        &ctx,
        &StaticImageResolver::new(),
    )
    .await
}

fn execs(graph: &CompiledGraph) -> Vec<(NodeId, ExecOp)> {
    graph
        .definition
        .nodes()
        .iter()
        .filter_map(|node| match &node.op {
            Op::Exec(exec) => Some((node.id, exec.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn build_1_compiles_to_two_chained_execs() {
    let graph = compile_text(BUILD_1).await.unwrap();
    let execs = execs(&graph);
    assert_eq!(execs.len(), 2);

    let (first_id, first) = &execs[0];
    let (second_id, second) = &execs[1];
    assert_eq!(graph.output, *second_id);
    assert_eq!(first.args, vec!["echo", "hi"]);
    assert_eq!(second.args, vec!["cat", "/tekton-results/0/out"]);
    assert_eq!(first.display_name, "build-1/hello");
    assert_eq!(second.display_name, "build-1/read");

    let chained = second
        .mounts
        .iter()
        .find(|m| m.target == "/tekton-results/0")
        .expect("second step mounts the first");
    assert!(chained.readonly);
    assert_eq!(
        chained.source,
        MountSource::Node {
            node: *first_id,
            selector: "/".into()
        }
    );
    assert!(!first.mounts.iter().any(|m| m.target.starts_with("/tekton-results")));
}

#[tokio::test]
async fn shared_workspace_is_a_stable_shared_cache() {
    let first = compile_text(BUILD_1).await.unwrap();
    let second = compile_text(BUILD_1).await.unwrap();

    for (_, exec) in execs(&first) {
        let workspace = exec
            .mounts
            .iter()
            .find(|m| m.target == "/workspace/shared")
            .unwrap();
        assert_eq!(
            workspace.source,
            MountSource::Cache {
                id: "build-1/shared".into(),
                sharing: CacheSharing::Shared
            }
        );
        let results = exec
            .mounts
            .iter()
            .find(|m| m.target == "/tekton/results")
            .unwrap();
        assert_eq!(
            results.source,
            MountSource::Cache {
                id: "build-1/results".into(),
                sharing: CacheSharing::Shared
            }
        );
    }

    assert_eq!(
        first.marshal().unwrap().to_json().unwrap(),
        second.marshal().unwrap().to_json().unwrap()
    );
}

#[tokio::test]
async fn generated_names_are_stable() {
    let text = BUILD_1.replace("name: build-1", "generateName: build-");
    let first = compile_text(&text).await.unwrap();
    let second = compile_text(&text).await.unwrap();
    assert_eq!(
        first.marshal().unwrap().output_digest,
        second.marshal().unwrap().output_digest
    );
}

#[tokio::test]
async fn malformed_image_yields_no_graph() {
    let text = BUILD_1.replace("image: alpine\n      command: [cat", "image: Not//Valid\n      command: [cat");
    let err = compile_text(&text).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidImageReference);
    assert!(err.to_string().contains("build-1/read"), "{err}");
}

#[tokio::test]
async fn script_is_unsupported() {
    let text = r"apiVersion: tekton.dev/v1beta1
kind: TaskRun
metadata:
  name: scripted
spec:
  taskSpec:
    steps:
    - name: run
      image: alpine
      script: |
        echo hi
";
    let err = compile_text(text).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
}

#[tokio::test]
async fn task_ref_without_spec_is_unsupported() {
    let text = r"apiVersion: tekton.dev/v1beta1
kind: TaskRun
metadata:
  name: by-ref
spec:
  taskRef:
    name: compile
";
    let err = compile_text(text).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
}

#[tokio::test]
async fn zero_steps_is_an_explicit_error() {
    let text = r"apiVersion: tekton.dev/v1beta1
kind: TaskRun
metadata:
  name: empty
spec:
  taskSpec:
    steps: []
";
    let err = compile_text(text).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyTaskSpec);
}

#[tokio::test]
async fn params_and_overrides_are_substituted() {
    let text = r"apiVersion: tekton.dev/v1beta1
kind: TaskRun
metadata:
  name: greet
spec:
  params:
  - name: who
    value: world
  taskSpec:
    params:
    - name: who
    - name: punctuation
      default: '!'
    steps:
    - image: alpine
      command: [echo, 'hello $(params.who)$(params.punctuation)']
";
    let loaded = ResourceLoader::new().load::<&str>(text, &[]).unwrap();
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let ctx = BuildContext::default().with_diagnostics(diagnostics.clone());
    let mut options = BuildOptions::default();
    options.params.insert("who".into(), "tekton".into());

    let graph = compile(&loaded, &options, &ctx, &StaticImageResolver::new())
        .await
        .unwrap();
    let execs = execs(&graph);
    assert_eq!(execs[0].1.args, vec!["echo", "hello tekton!"]);
    assert!(diagnostics.events().iter().any(|e| matches!(
        e,
        DiagnosticEvent::StepCompiled { display_name, .. } if display_name == "greet/0"
    )));
}

#[tokio::test]
async fn cancelled_context_returns_nothing() {
    let loaded = ResourceLoader::new().load::<&str>(BUILD_1, &[]).unwrap();
    let ctx = BuildContext::default().with_diagnostics(Arc::new(RecordingDiagnostics::new()));
    ctx.cancel.cancel();
    let err = compile(
        &loaded,
        &BuildOptions::default(),
        &ctx,
        &StaticImageResolver::new(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}
