// Behaviour of recipe evaluation against a staged archive


use pour::PourError;
use pour::evaluator::{self, Destinations};
use pour::recipe::{InstallStep, LocatedPath, Location};
use std::fs;
use std::path::PathBuf;
use test_helpers::{TestEnvironment, libfoo_steps, recipe, tree};

const URL: &str = "https://example.com/libfoo-2.0.tar.gz";
const SHA: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[test]
fn test_libfoo_layout_is_exact() {
    let env = TestEnvironment::new();
    env.stage(&["lib/libfoo.2.dylib", "include/foo.h"]);

    let recipe = recipe(URL, SHA, libfoo_steps());
    let keg = env.keg("libfoo", "2.0");
    let dests = Destinations::new(&keg);
    dests.prepare(&recipe).unwrap();

    let report = evaluator::execute(&recipe, &env.staging, &dests, false).unwrap();

    assert_eq!(
        tree(&keg),
        vec![
            PathBuf::from("include/foo.h"),
            PathBuf::from("lib/libfoo.2.dylib"),
            PathBuf::from("lib/libfoo.dylib"),
        ]
    );
    assert_eq!(report.steps.len(), 3);
    assert!(!report.has_empty_copies());

    let link = keg.join("lib/libfoo.dylib");
    assert!(link.symlink_metadata().unwrap().is_symlink());
    assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("libfoo.2.dylib"));
    assert_eq!(
        fs::read_to_string(&link).unwrap(),
        "contents of lib/libfoo.2.dylib"
    );
}

#[test]
fn test_second_run_conflicts() {
    let env = TestEnvironment::new();
    env.stage(&["lib/libfoo.2.dylib", "include/foo.h"]);

    let recipe = recipe(URL, SHA, libfoo_steps());
    let keg = env.keg("libfoo", "2.0");
    let dests = Destinations::new(&keg);
    dests.prepare(&recipe).unwrap();

    evaluator::execute(&recipe, &env.staging, &dests, false).unwrap();
    fs::write(env.staging.join("lib/libfoo.2.dylib"), "newer build").unwrap();

    let err = evaluator::execute(&recipe, &env.staging, &dests, false).unwrap_err();
    match &err {
        PourError::Step { index, source, .. } => {
            assert_eq!(*index, 1);
            assert!(matches!(**source, PourError::Conflict { .. }));
        }
        other => panic!("expected a step failure, got {:?}", other),
    }

    // Nothing was overwritten
    assert_eq!(
        fs::read_to_string(keg.join("lib/libfoo.2.dylib")).unwrap(),
        "contents of lib/libfoo.2.dylib"
    );
}

#[test]
fn test_overwrite_still_refuses_existing_symlink() {
    let env = TestEnvironment::new();
    env.stage(&["lib/libfoo.2.dylib", "include/foo.h"]);

    let recipe = recipe(URL, SHA, libfoo_steps());
    let keg = env.keg("libfoo", "2.0");
    let dests = Destinations::new(&keg);
    dests.prepare(&recipe).unwrap();

    evaluator::execute(&recipe, &env.staging, &dests, false).unwrap();
    let err = evaluator::execute(&recipe, &env.staging, &dests, true).unwrap_err();

    assert!(matches!(err, PourError::Step { index: 3, .. }));
    assert!(matches!(err.root(), PourError::PathExists { .. }));
}

#[test]
fn test_symlink_before_copy_is_missing_target() {
    let env = TestEnvironment::new();
    env.stage(&["lib/libfoo.2.dylib", "include/foo.h"]);

    let mut steps = libfoo_steps();
    steps.rotate_right(1);
    let recipe = recipe(URL, SHA, steps);
    let keg = env.keg("libfoo", "2.0");
    let dests = Destinations::new(&keg);
    dests.prepare(&recipe).unwrap();

    let err = evaluator::execute(&recipe, &env.staging, &dests, false).unwrap_err();

    assert!(matches!(err, PourError::Step { index: 1, .. }));
    assert!(matches!(err.root(), PourError::MissingTarget { .. }));
    assert!(tree(&keg).is_empty());
}

#[test]
fn test_failure_leaves_earlier_steps_in_place() {
    let env = TestEnvironment::new();
    env.stage(&["lib/libfoo.2.dylib"]);

    let steps = vec![
        InstallStep::copy("lib/libfoo.2.dylib", Location::Lib),
        InstallStep::symlink(
            LocatedPath::new(Location::Lib, "libbar.1.dylib").unwrap(),
            LocatedPath::new(Location::Lib, "libbar.dylib").unwrap(),
        ),
        InstallStep::copy("include/*", Location::Include),
    ];
    let recipe = recipe(URL, SHA, steps);
    let keg = env.keg("libfoo", "2.0");
    let dests = Destinations::new(&keg);
    dests.prepare(&recipe).unwrap();

    let err = evaluator::execute(&recipe, &env.staging, &dests, false).unwrap_err();

    assert!(matches!(err, PourError::Step { index: 2, .. }));
    assert_eq!(tree(&keg), vec![PathBuf::from("lib/libfoo.2.dylib")]);
}

#[test]
fn test_zero_match_copy_is_reported_not_fatal() {
    let env = TestEnvironment::new();
    env.stage(&["lib/libfoo.2.dylib"]);

    let recipe = recipe(URL, SHA, libfoo_steps());
    let keg = env.keg("libfoo", "2.0");
    let dests = Destinations::new(&keg);
    dests.prepare(&recipe).unwrap();

    let report = evaluator::execute(&recipe, &env.staging, &dests, false).unwrap();

    assert!(report.has_empty_copies());
    let empty = report.empty_copies();
    assert_eq!(empty.len(), 1);
    assert_eq!(empty[0].description(), "copy include/* -> include");
    assert_eq!(
        tree(&keg),
        vec![
            PathBuf::from("lib/libfoo.2.dylib"),
            PathBuf::from("lib/libfoo.dylib"),
        ]
    );
}

#[test]
fn test_step_level_overwrite() {
    let env = TestEnvironment::new();
    env.stage(&["include/foo.h"]);

    let steps = vec![InstallStep::Copy {
        pattern: "include/*".to_string(),
        into: Location::Include,
        overwrite: true,
    }];
    let recipe = recipe(URL, SHA, steps);
    let keg = env.keg("libfoo", "2.0");
    let dests = Destinations::new(&keg);
    dests.prepare(&recipe).unwrap();

    fs::write(keg.join("include/foo.h"), "stale").unwrap();
    evaluator::execute(&recipe, &env.staging, &dests, false).unwrap();

    assert_eq!(
        fs::read_to_string(keg.join("include/foo.h")).unwrap(),
        "contents of include/foo.h"
    );
}

#[test]
fn test_report_lists_all_created_paths() {
    let env = TestEnvironment::new();
    env.stage(&["lib/libfoo.2.dylib", "include/foo.h", "include/foo/config.h"]);

    let recipe = recipe(URL, SHA, libfoo_steps());
    let keg = env.keg("libfoo", "2.0");
    let dests = Destinations::new(&keg);
    dests.prepare(&recipe).unwrap();

    let report = evaluator::execute(&recipe, &env.staging, &dests, false).unwrap();
    let mut files: Vec<PathBuf> = report
        .files()
        .into_iter()
        .map(|p| p.strip_prefix(&keg).unwrap().to_path_buf())
        .collect();
    files.sort();

    assert_eq!(files, tree(&keg));
}

#[test]
fn test_duplicate_names_within_one_step_conflict() {
    let env = TestEnvironment::new();
    env.stage(&["x86_64/lib/libfoo.2.dylib", "arm64/lib/libfoo.2.dylib"]);

    let steps = vec![InstallStep::copy("*/lib/libfoo.2.dylib", Location::Lib)];
    let recipe = recipe(URL, SHA, steps);
    let keg = env.keg("libfoo", "2.0");
    let dests = Destinations::new(&keg);
    dests.prepare(&recipe).unwrap();

    let err = evaluator::execute(&recipe, &env.staging, &dests, false).unwrap_err();

    assert!(matches!(err, PourError::Step { index: 1, .. }));
    assert!(matches!(
        err.root(),
        PourError::Conflict { path } if *path == keg.join("lib/libfoo.2.dylib")
    ));
    assert!(tree(&keg).is_empty());
}

#[test]
fn test_file_blocking_a_directory_is_a_conflict() {
    let env = TestEnvironment::new();
    env.stage(&["include/foo.h", "include/foo/config.h"]);

    let steps = vec![InstallStep::copy("include/*", Location::Include)];
    let recipe = recipe(URL, SHA, steps);
    let keg = env.keg("libfoo", "2.0");
    let dests = Destinations::new(&keg);
    dests.prepare(&recipe).unwrap();
    fs::write(keg.join("include/foo"), "squatter").unwrap();

    let err = evaluator::execute(&recipe, &env.staging, &dests, false).unwrap_err();

    assert!(matches!(
        err.root(),
        PourError::Conflict { path } if *path == keg.join("include/foo")
    ));
    // The conflict was found before anything in the step was copied
    assert_eq!(tree(&keg), vec![PathBuf::from("include/foo")]);
}
