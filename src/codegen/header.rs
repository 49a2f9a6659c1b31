//! Header rendering
//!
//! Final builds get one `#if defined` arm per platform with inline
//! accessors returning constants. Tunable builds get the experiment id enum,
//! runtime accessors and the `extern` metadata table.

use super::banner;
use super::names::{accessor, experiment_id, inclusion_macro};
use super::OutputGenerator;
use crate::error::Result;

const NUM_EXPERIMENTS: &str = "kNumExperiments";
const HEADER_METADATA_SYMBOL: &str = "g_experiment_metadata";

pub(super) fn generate(generator: &OutputGenerator<'_>, output: &mut String) -> Result<()> {
    let dialect = generator.dialect();
    generator.put_preamble(output, "//");
    banner::put_placeholder_text(output, "//");
    output.push('\n');

    output.push_str(&format!("#ifndef {}\n", dialect.include_guard));
    output.push_str(&format!("#define {}\n\n", dialect.include_guard));
    output.push_str("#include <grpc/support/port_platform.h>\n\n");
    output.push_str(&format!("#include \"{}\"\n\n", dialect.config_include));
    output.push_str(&format!("namespace {} {{\n\n", dialect.namespace));

    output.push_str("#ifdef GRPC_EXPERIMENTS_ARE_FINAL\n\n");
    generator.platform_chain(output, |output, platform| {
        final_accessors(generator, output, platform)
    })?;

    output.push_str("\n#else\n");
    tunable_accessors(generator, output);
    output.push_str("#endif\n");

    output.push_str(&format!("}}  // namespace {}\n\n", dialect.namespace));
    output.push_str(&format!("#endif  // {}\n", dialect.include_guard));
    Ok(())
}

/// Constant accessors for one platform
fn final_accessors(
    generator: &OutputGenerator<'_>,
    output: &mut String,
    platform: &str,
) -> Result<()> {
    let tables = generator.tables();
    for experiment in generator.compiler().definitions() {
        let token = experiment.default_value(platform);
        if let Some(define) = tables.final_define(token, &inclusion_macro(experiment.name()))? {
            output.push_str(&define);
            output.push('\n');
        }
        output.push_str(&format!(
            "inline bool {}() {{ {} }}\n",
            accessor(experiment.name()),
            tables.final_return(token)?
        ));
    }
    Ok(())
}

/// Id enum, runtime accessors and the metadata declaration
fn tunable_accessors(generator: &OutputGenerator<'_>, output: &mut String) {
    output.push_str("enum ExperimentIds {\n");
    for experiment in generator.compiler().definitions() {
        output.push_str(&format!("  {},\n", experiment_id(experiment.name())));
    }
    output.push_str(&format!("  {}\n}};\n", NUM_EXPERIMENTS));

    for experiment in generator.compiler().definitions() {
        output.push_str(&format!("#define {}\n", inclusion_macro(experiment.name())));
        output.push_str(&format!(
            "inline bool {}() {{ return IsExperimentEnabled<{}>(); }}\n",
            accessor(experiment.name()),
            experiment_id(experiment.name())
        ));
    }
    output.push('\n');
    output.push_str(&format!(
        "extern const ExperimentMetadata {}[{}];\n\n",
        HEADER_METADATA_SYMBOL, NUM_EXPERIMENTS
    ));
}

#[cfg(test)]
mod tests {
    use crate::codegen::{Mode, OutputGenerator};
    use crate::compiler::ExperimentsCompiler;
    use crate::tables::ReferenceTables;

    const CATALOGUE: &str = r#"
- name: foo
  description: Foo things
  owner: someone@example.com
  expiry: 2025-03-01
  uses_polling: false
  allow_in_fuzzing_config: true
  test_tags: []
- name: bar_baz
  description: Bar things
  owner: someone@example.com
  expiry: 2025-03-01
  uses_polling: true
  allow_in_fuzzing_config: false
  test_tags: [core_end2end_test]
"#;

    const ROLLOUT: &str = r#"
- name: foo
  default_value: true
- name: bar_baz
  platform_value:
    ios: false
    posix: debug
    windows: broken
"#;

    fn header() -> String {
        let mut compiler = ExperimentsCompiler::new(ReferenceTables::default());
        compiler.set_copyright_year(2025);
        compiler.add_experiment_definition(CATALOGUE).unwrap();
        compiler.add_rollout_specification(ROLLOUT).unwrap();
        let mut out = String::new();
        OutputGenerator::new(&compiler, Mode::OssProduction.dialect())
            .generate_header(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_final_platform_chain() {
        let out = header();
        let ios = out.find("#if defined(GRPC_CFSTREAM)").unwrap();
        let windows = out.find("#elif defined(GPR_WINDOWS)").unwrap();
        let posix = out.find("\n#else\n").unwrap();
        assert!(ios < windows && windows < posix);

        // foo is on everywhere
        assert_eq!(out.matches("#define GRPC_EXPERIMENT_IS_INCLUDED_FOO\n").count(), 4);
        assert!(out.contains("inline bool IsFooEnabled() { return true; }"));
        // bar_baz: off on ios, broken on windows, debug on posix
        assert!(out.contains("inline bool IsBarBazEnabled() { return false; }"));
        assert!(out.contains(
            "#ifndef NDEBUG\n#define GRPC_EXPERIMENT_IS_INCLUDED_BAR_BAZ\n#endif\n\
             inline bool IsBarBazEnabled() { \n#ifdef NDEBUG\nreturn false;\n#else\nreturn true;\n#endif\n }"
        ));
    }

    #[test]
    fn test_tunable_branch() {
        let out = header();
        assert!(out.contains(
            "enum ExperimentIds {\n  kExperimentIdBarBaz,\n  kExperimentIdFoo,\n  kNumExperiments\n};\n"
        ));
        assert!(out.contains(
            "inline bool IsFooEnabled() { return IsExperimentEnabled<kExperimentIdFoo>(); }"
        ));
        assert!(out.contains("extern const ExperimentMetadata g_experiment_metadata[kNumExperiments];"));
        assert!(out.trim_end().ends_with("#endif  // GRPC_SRC_CORE_LIB_EXPERIMENTS_EXPERIMENTS_H"));
    }

    #[test]
    fn test_header_is_deterministic() {
        assert_eq!(header(), header());
    }
}
