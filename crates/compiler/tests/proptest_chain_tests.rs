//! Property-based tests for step compilation and chaining.

use proptest::prelude::*;
use std::sync::Arc;
use tektonic_compiler::{
    GraphBuilder, RecordingDiagnostics, StaticImageResolver, StepCompiler, WorkspaceBindings,
};
use tektonic_llb::{Definition, MountSource, Op};
use tektonic_resources::types::{Step, TaskSpec};

fn spec_strategy() -> impl Strategy<Value = TaskSpec> {
    proptest::collection::vec(
        (
            prop_oneof![Just("alpine"), Just("busybox:1.36"), Just("ghcr.io/org/tool:v2")],
            proptest::collection::vec("[a-z]{1,6}", 1..4),
        ),
        1..8,
    )
    .prop_map(|steps| TaskSpec {
        steps: steps
            .into_iter()
            .enumerate()
            .map(|(i, (image, command))| Step {
                name: format!("step-{i}"),
                image: image.to_string(),
                command,
                ..Step::default()
            })
            .collect(),
        ..TaskSpec::default()
    })
}

fn compile_and_build(spec: &TaskSpec) -> (Definition, Vec<String>) {
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let descriptors = StepCompiler::new(diagnostics.clone())
        .compile(spec, "prop", &WorkspaceBindings::new("prop"), &[])
        .unwrap();
    let names = descriptors.iter().map(|d| d.name.clone()).collect();

    let resolver = StaticImageResolver::new();
    let mut definition = Definition::new();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime
        .block_on(async {
            GraphBuilder::new(&mut definition, &resolver, diagnostics)
                .build("prop", &descriptors, &[])
                .await
        })
        .unwrap();
    (definition, names)
}

proptest! {
    #[test]
    fn descriptors_follow_declaration_order(spec in spec_strategy()) {
        let (_, names) = compile_and_build(&spec);
        let declared: Vec<String> = spec.steps.iter().map(|s| s.name.clone()).collect();
        prop_assert_eq!(names, declared);
    }

    #[test]
    fn each_step_mounts_its_predecessor_read_only(spec in spec_strategy()) {
        let (definition, _) = compile_and_build(&spec);
        let execs: Vec<_> = definition
            .nodes()
            .iter()
            .filter_map(|n| match &n.op {
                Op::Exec(exec) => Some((n.id, exec)),
                _ => None,
            })
            .collect();
        prop_assert_eq!(execs.len(), spec.steps.len());

        for i in 1..execs.len() {
            let target = format!("/tekton-results/{}", i - 1);
            let mount = execs[i].1.mounts.iter().find(|m| m.target == target);
            prop_assert!(mount.is_some());
            let mount = mount.unwrap();
            prop_assert!(mount.readonly);
            prop_assert_eq!(
                &mount.source,
                &MountSource::Node { node: execs[i - 1].0, selector: "/".to_string() }
            );
        }
    }

    #[test]
    fn compilation_is_deterministic(spec in spec_strategy()) {
        let (first, _) = compile_and_build(&spec);
        let (second, _) = compile_and_build(&spec);
        prop_assert_eq!(first, second);
    }
}
