//! Golden Tests for Generated Experiments Code
//!
//! Compiles the fixture catalogue and rollouts and checks the generated
//! header, source, test and Bazel files.

use std::fs;

use chrono::NaiveDate;
use experiments_compiler::{
    Artifact, CompilerError, ExperimentsCompiler, Mode, ReferenceTables, WriteOutcome,
};

const EXPERIMENTS: &str = include_str!("fixtures/experiments.yaml");
const ROLLOUTS: &str = include_str!("fixtures/rollouts.yaml");
const HEADER_PATH: &str = "src/core/lib/experiments/experiments.h";

fn compiled() -> ExperimentsCompiler {
    let mut compiler = ExperimentsCompiler::new(ReferenceTables::default());
    compiler.set_copyright_year(2025);
    compiler.add_experiment_definition(EXPERIMENTS).unwrap();
    compiler.add_rollout_specification(ROLLOUTS).unwrap();
    compiler
}

fn render(compiler: &ExperimentsCompiler, artifact: Artifact, mode: Mode) -> String {
    compiler.render(&artifact, mode).unwrap()
}

fn source_artifact() -> Artifact {
    Artifact::Source {
        header_file_path: HEADER_PATH.to_string(),
    }
}

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn test_foo_round_trip() {
    let compiler = compiled();
    let header = render(&compiler, Artifact::Header, Mode::OssProduction);
    let source = render(&compiler, source_artifact(), Mode::OssProduction);

    assert!(header.contains("inline bool IsFooEnabled() { return true; }\n"));
    assert!(header.contains(
        "#define GRPC_EXPERIMENT_IS_INCLUDED_FOO\ninline bool IsFooEnabled() { return IsExperimentEnabled<kExperimentIdFoo>(); }\n"
    ));
    assert_eq!(
        source
            .matches("    {\"foo\", description_foo, additional_constraints_foo, nullptr, 0, true, true},\n")
            .count(),
        3
    );
}

#[test]
fn test_header_structure() {
    let header = render(&compiled(), Artifact::Header, Mode::OssProduction);

    assert!(header.starts_with("// Copyright 2025 The gRPC Authors\n"));
    assert!(header.contains("#ifndef GRPC_SRC_CORE_LIB_EXPERIMENTS_EXPERIMENTS_H\n"));
    assert!(header.contains("#if defined(GRPC_CFSTREAM)\n"));
    assert!(header.contains("#elif defined(GPR_WINDOWS)\n"));
    assert!(!header.contains("\nelif "));
    assert!(header.contains(
        "enum ExperimentIds {\n  kExperimentIdEventEngineListener,\n  kExperimentIdFoo,\n  kExperimentIdWorkSerializerDispatch,\n  kNumExperiments\n};\n"
    ));
    assert!(header.contains("extern const ExperimentMetadata g_experiment_metadata[kNumExperiments];\n"));
    assert!(header.ends_with("#endif  // GRPC_SRC_CORE_LIB_EXPERIMENTS_EXPERIMENTS_H\n"));
}

#[test]
fn test_platform_values_resolve_per_arm() {
    let header = render(&compiled(), Artifact::Header, Mode::OssProduction);
    let ios = header.find("#if defined(GRPC_CFSTREAM)").unwrap();
    let windows = header.find("#elif defined(GPR_WINDOWS)").unwrap();
    let tunable = header.find("enum ExperimentIds").unwrap();
    assert!(ios < windows && windows < tunable);

    let listener_off = "inline bool IsEventEngineListenerEnabled() { return false; }\n";
    assert!(header[ios..windows].contains(listener_off));
    assert!(header[windows..tunable].contains(listener_off));
    assert!(header[windows..tunable].contains(
        "#ifndef NDEBUG\n#define GRPC_EXPERIMENT_IS_INCLUDED_EVENT_ENGINE_LISTENER\n#endif\n"
    ));
    assert!(!header[ios..windows].contains("GRPC_EXPERIMENT_IS_INCLUDED_EVENT_ENGINE_LISTENER"));
}

#[test]
fn test_requirements_in_source() {
    let source = render(&compiled(), source_artifact(), Mode::OssProduction);

    assert!(source.contains("#include <stdint.h>\n"));
    assert!(source.contains(&format!("#include \"{}\"\n", HEADER_PATH)));
    assert!(source.contains(
        "const char* const additional_constraints_work_serializer_dispatch = \"event_engine_listener\";\n"
    ));
    assert!(source.contains(
        "const uint8_t required_experiments_work_serializer_dispatch[] = {static_cast<uint8_t>(grpc_core::kExperimentIdEventEngineListener)};\n"
    ));
    assert!(source.contains(
        "    {\"work_serializer_dispatch\", description_work_serializer_dispatch, additional_constraints_work_serializer_dispatch, required_experiments_work_serializer_dispatch, 1, kDefaultForDebugOnly, true},\n"
    ));
    assert!(source.contains(
        "const char* const description_work_serializer_dispatch = \"Have the work serializer dispatch \\\"inline\\\" callbacks.\";\n"
    ));
}

#[test]
fn test_modes_differ_only_where_expected() {
    let compiler = compiled();
    let production = render(&compiler, source_artifact(), Mode::OssProduction);
    let test = render(&compiler, source_artifact(), Mode::OssTest);
    let google3 = render(&compiler, source_artifact(), Mode::Google3);

    assert!(production.contains("const ExperimentMetadata g_experiment_metadata[] = {\n"));
    assert!(test.contains("const ExperimentMetadata g_test_experiment_metadata[] = {\n"));
    assert!(google3.contains("gen_experiments_grpc_google3.cc"));
    assert!(production.contains("gen_experiments_grpc_oss.cc"));
}

#[test]
fn test_bzl_lists() {
    let bzl = render(&compiled(), Artifact::Bzl, Mode::OssProduction);

    assert!(bzl.starts_with("# Copyright 2025 The gRPC Authors\n"));
    assert!(bzl.contains("EXPERIMENTS = {\n"));
    // event_engine_listener is broken on ios
    let ios = bzl.find("    \"ios\": {").unwrap();
    let posix = bzl.find("    \"posix\": {").unwrap();
    assert!(!bzl[ios..posix].contains("event_engine_listener\""));
    assert!(bzl[posix..].contains("            \"event_engine_listener_test\": [\n                \"event_engine_listener\",\n"));
}

#[test]
fn test_generated_test_file() {
    let compiler = compiled();
    let test = render(
        &compiler,
        Artifact::Test {
            header_file_path: HEADER_PATH.to_string(),
        },
        Mode::OssProduction,
    );
    assert!(test.contains("TEST(ExperimentsTest, CheckWorkSerializerDispatchExperimentFinalValue) {\n"));
    assert!(test.contains("bool GetFooExperimentValue() { return true; }\n"));
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_output_is_deterministic() {
    let first = compiled();
    let second = compiled();
    for mode in Mode::ALL {
        for artifact in [Artifact::Header, source_artifact(), Artifact::Bzl] {
            assert_eq!(
                render(&first, artifact.clone(), mode),
                render(&second, artifact, mode)
            );
        }
    }
}

// =============================================================================
// File Operations
// =============================================================================

#[test]
fn test_generate_files() {
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join("experiments.h");
    let source = dir.path().join("experiments.cc");
    let compiler = compiled();

    let outcome = compiler
        .generate_experiments_hdr(&header, "grpc_oss_production")
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Written);
    compiler
        .generate_experiments_src(&source, HEADER_PATH, "grpc_oss_production")
        .unwrap();

    assert_eq!(
        fs::read_to_string(&header).unwrap(),
        render(&compiler, Artifact::Header, Mode::OssProduction)
    );
    assert_eq!(
        compiler
            .generate_experiments_hdr(&header, "grpc_oss_production")
            .unwrap(),
        WriteOutcome::Unchanged
    );
}

#[test]
fn test_bogus_mode_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join("experiments.h");
    let bzl = dir.path().join("experiments.bzl");
    let compiler = compiled();

    assert!(matches!(
        compiler.generate_experiments_hdr(&header, "bogus_mode"),
        Err(CompilerError::UnsupportedMode(_))
    ));
    assert!(matches!(
        compiler.gen_experiments_bzl(&bzl, "bogus_mode"),
        Err(CompilerError::UnsupportedMode(_))
    ));
    assert!(!header.exists());
    assert!(!bzl.exists());
}

#[test]
fn test_drift_check() {
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join("experiments.h");
    let compiler = compiled();

    let drift = compiler.check(&header, &Artifact::Header, Mode::OssProduction).unwrap();
    assert!(drift.unwrap().missing);

    compiler.generate_experiments_hdr(&header, "grpc_oss_production").unwrap();
    assert!(compiler
        .check(&header, &Artifact::Header, Mode::OssProduction)
        .unwrap()
        .is_none());

    let stale = fs::read_to_string(&header)
        .unwrap()
        .replace("IsFooEnabled", "IsFuEnabled");
    fs::write(&header, stale).unwrap();
    let drift = compiler
        .check(&header, &Artifact::Header, Mode::OssProduction)
        .unwrap()
        .unwrap();
    assert!(!drift.missing);
    assert!(drift.diff.contains("+inline bool IsFooEnabled() { return true; }\n"));
    assert!(drift.diff.contains("-inline bool IsFuEnabled() { return true; }\n"));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_fixture_validates() {
    let compiler = compiled();
    let today = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
    compiler.validate_on(true, today).unwrap();
    compiler.check_requirements().unwrap();
}

#[test]
fn test_forced_debug_is_reported() {
    let err = compiled().ensure_no_debug_experiments().unwrap_err();
    match err {
        CompilerError::DebugExperiment { experiment, platform } => {
            assert_eq!(experiment, "event_engine_listener");
            assert_eq!(platform, "posix");
        }
        other => panic!("Expected DebugExperiment, got {:?}", other),
    }
}

#[test]
fn test_duplicate_catalogue_is_rejected() {
    let mut compiler = compiled();
    let err = compiler.add_experiment_definition(EXPERIMENTS).unwrap_err();
    assert!(matches!(err, CompilerError::DuplicateExperiment(ref name) if name == "foo"));
}

#[test]
fn test_rollout_for_unknown_experiment() {
    let mut compiler = compiled();
    let err = compiler
        .add_rollout_specification("- name: fooo\n  default_value: true\n")
        .unwrap_err();
    assert_eq!(err.to_string(), "Unknown experiment: fooo (did you mean `foo`?)");
}
