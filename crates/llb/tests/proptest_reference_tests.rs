//! Property-based tests for image reference normalization and node digests

use proptest::prelude::*;
use tektonic_llb::{
    CacheSharing, Definition, ExecOp, ImageConfig, ImageOp, ImageReference, Mount, Op,
};

fn reference_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![
            Just(String::new()),
            Just("ghcr.io/".to_string()),
            Just("localhost:5000/".to_string()),
            Just("index.docker.io/".to_string()),
        ],
        proptest::collection::vec("[a-z][a-z0-9]{0,6}", 1..3),
        proptest::option::of("[a-z0-9][a-z0-9.-]{0,8}"),
    )
        .prop_map(|(domain, path, tag)| {
            let mut reference = format!("{domain}{}", path.join("/"));
            if let Some(tag) = tag {
                reference.push(':');
                reference.push_str(&tag);
            }
            reference
        })
}

fn chain(args: &[String]) -> Definition {
    let mut definition = Definition::new();
    let mut previous = definition
        .push(Op::Image(ImageOp {
            reference: "docker.io/library/alpine".to_string(),
            config: ImageConfig::default(),
            display_name: "alpine".to_string(),
        }))
        .unwrap();
    for arg in args {
        previous = definition
            .push(Op::Exec(ExecOp {
                args: vec!["echo".to_string(), arg.clone()],
                env: Vec::new(),
                cwd: "/".to_string(),
                user: None,
                display_name: arg.clone(),
                ignore_cache: false,
                mounts: vec![
                    Mount::node("/", previous, false),
                    Mount::cache("/tekton/results", "run/results", CacheSharing::Shared),
                ],
            }))
            .unwrap();
    }
    definition
}

proptest! {
    #[test]
    fn normalization_is_idempotent(input in reference_strategy()) {
        let once = ImageReference::parse_normalized(&input).unwrap();
        let twice = ImageReference::parse_normalized(&once.to_string()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn normalized_references_always_name_a_registry(input in reference_strategy()) {
        let reference = ImageReference::parse_normalized(&input).unwrap();
        prop_assert!(reference.to_string().starts_with(reference.domain()));
        prop_assert_ne!(reference.domain(), "index.docker.io");
    }

    #[test]
    fn identical_chains_share_digests(args in proptest::collection::vec("[a-z]{1,5}", 1..6)) {
        let first = chain(&args);
        let second = chain(&args);
        prop_assert_eq!(first.nodes(), second.nodes());
    }

    #[test]
    fn changing_an_early_step_changes_every_later_digest(
        args in proptest::collection::vec("[a-z]{1,5}", 2..6)
    ) {
        let mut changed = args.clone();
        changed[0].push('x');

        let original = chain(&args);
        let modified = chain(&changed);
        for (a, b) in original.nodes().iter().zip(modified.nodes()).skip(1) {
            prop_assert_ne!(&a.digest, &b.digest);
        }
    }
}
