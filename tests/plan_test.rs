//! Integration tests for install planning
//!
//! Drives `Config` through `build_plan` the way the CLI does.

use candi::core::config::Config;
use candi::core::package::PackageRequest;
use candi::core::plan::build_plan;
use proptest::prelude::*;
use std::path::Path;

fn plan_names(toml: &str) -> Vec<String> {
    let config = Config::from_toml(toml, Path::new("candi.toml")).unwrap();
    build_plan(&config.requested_packages(), config.dealii.cuda)
        .names()
        .into_iter()
        .map(String::from)
        .collect()
}

#[test]
fn test_default_config_plan() {
    assert_eq!(
        plan_names(""),
        vec!["kokkos", "openmpi", "zlib", "openblas", "p4est", "dealii"]
    );
}

#[test]
fn test_optional_libraries_land_before_dealii() {
    let names = plan_names(
        r#"
packages = ["zlib", "p4est", "openmpi", "dealii"]

[dealii]
sundials = "ON"
caliper = "ON"
"#,
    );
    assert_eq!(
        names,
        vec!["openmpi", "zlib", "p4est", "sundials", "caliper", "dealii"]
    );
}

#[test]
fn test_cuda_toggle_adds_cuda_first() {
    let names = plan_names("packages = [\"zlib\", \"openmpi\", \"kokkos\"]\n[dealii]\ncuda = \"ON\"\n");
    assert_eq!(names, vec!["cuda", "kokkos", "openmpi", "zlib"]);
}

#[test]
fn test_duplicate_request_keeps_first_pin() {
    let requests = vec![
        PackageRequest::parse("openmpi@4.1.6").unwrap(),
        PackageRequest::parse("zlib").unwrap(),
        PackageRequest::parse("openmpi@5.0.6").unwrap(),
    ];
    let plan = build_plan(&requests, false);

    assert_eq!(plan.len(), 2);
    assert_eq!(plan.get("openmpi").unwrap().version.as_deref(), Some("4.1.6"));
}

fn spec_strategy() -> impl Strategy<Value = String> {
    let name = prop_oneof![
        Just("cuda"),
        Just("kokkos"),
        Just("openmpi"),
        Just("zlib"),
        Just("gsl"),
        Just("dealii"),
    ];
    let version = proptest::option::of("[1-9]\\.[0-9]{1,2}");
    (name, version).prop_map(|(name, version)| match version {
        Some(v) => format!("{name}@{v}"),
        None => name.to_string(),
    })
}

proptest! {
    #[test]
    fn prop_plan_keeps_first_request_per_name(specs in proptest::collection::vec(spec_strategy(), 0..10)) {
        let requests: Vec<PackageRequest> = specs
            .iter()
            .map(|s| PackageRequest::parse(s).unwrap())
            .collect();
        let plan = build_plan(&requests, false);

        for entry in &plan {
            let first = requests.iter().find(|r| r.name == entry.name).unwrap();
            prop_assert_eq!(entry, first);
        }
    }

    #[test]
    fn prop_plan_length_matches_distinct_names(specs in proptest::collection::vec(spec_strategy(), 0..10), cuda in any::<bool>()) {
        let requests: Vec<PackageRequest> = specs
            .iter()
            .map(|s| PackageRequest::parse(s).unwrap())
            .collect();
        let mut distinct: Vec<&str> = requests.iter().map(|r| r.name.as_str()).collect();
        if cuda {
            distinct.push("cuda");
        }
        distinct.sort_unstable();
        distinct.dedup();

        prop_assert_eq!(build_plan(&requests, cuda).len(), distinct.len());
    }
}
