//! Source rendering
//!
//! Defines the metadata table backing the tunable header, one copy per
//! platform arm.

use super::names::{c_string, experiment_id};
use super::OutputGenerator;
use crate::error::Result;
use crate::tables::DEBUG_ONLY_SENTINEL;

pub(super) fn generate(generator: &OutputGenerator<'_>, output: &mut String) -> Result<()> {
    generator.put_preamble(output, "//");
    output.push('\n');

    let any_requires = generator
        .compiler()
        .definitions()
        .any(|experiment| !experiment.requirements().is_empty());

    output.push_str("#include <grpc/support/port_platform.h>\n\n");
    if any_requires {
        output.push_str("#include <stdint.h>\n\n");
    }
    output.push_str(&format!("#include \"{}\"\n\n", generator.include_path()));

    output.push_str("#ifndef GRPC_EXPERIMENTS_ARE_FINAL\n\n");
    generator.platform_chain(output, |output, platform| {
        platform_source(generator, output, platform)
    })?;
    output.push_str("\n#endif\n");
    Ok(())
}

fn platform_source(
    generator: &OutputGenerator<'_>,
    output: &mut String,
    platform: &str,
) -> Result<()> {
    let tables = generator.tables();
    let dialect = generator.dialect();

    output.push_str("namespace {\n");
    let mut default_for_debug_only = false;
    for experiment in generator.compiler().definitions() {
        let name = experiment.name();
        output.push_str(&format!(
            "const char* const description_{} = {};\n",
            name,
            c_string(experiment.description())
        ));
        output.push_str(&format!(
            "const char* const additional_constraints_{} = {};\n",
            name,
            c_string(experiment.additional_constraints(platform))
        ));
        if !experiment.requirements().is_empty() {
            let ids: Vec<String> = experiment
                .requirements()
                .iter()
                .map(|requirement| {
                    format!(
                        "static_cast<uint8_t>({}::{})",
                        dialect.namespace,
                        experiment_id(requirement)
                    )
                })
                .collect();
            output.push_str(&format!(
                "const uint8_t required_experiments_{}[] = {{{}}};\n",
                name,
                ids.join(",")
            ));
        }
        if tables.default_expr(experiment.default_value(platform))? == DEBUG_ONLY_SENTINEL {
            default_for_debug_only = true;
        }
    }
    if default_for_debug_only {
        output.push_str("#ifdef NDEBUG\n");
        output.push_str(&format!("const bool {} = false;\n", DEBUG_ONLY_SENTINEL));
        output.push_str("#else\n");
        output.push_str(&format!("const bool {} = true;\n", DEBUG_ONLY_SENTINEL));
        output.push_str("#endif\n");
    }
    output.push_str("}  // namespace\n\n");

    output.push_str(&format!("namespace {} {{\n\n", dialect.namespace));
    output.push_str(&format!(
        "const ExperimentMetadata {}[] = {{\n",
        dialect.metadata_symbol()
    ));
    for experiment in generator.compiler().definitions() {
        let name = experiment.name();
        let requirements = experiment.requirements();
        let required = if requirements.is_empty() {
            "nullptr".to_string()
        } else {
            format!("required_experiments_{}", name)
        };
        output.push_str(&format!(
            "    {{{}, description_{}, additional_constraints_{}, {}, {}, {}, {}}},\n",
            c_string(name),
            name,
            name,
            required,
            requirements.len(),
            tables.default_expr(experiment.default_value(platform))?,
            experiment.allow_in_fuzzing_config()
        ));
    }
    output.push_str("};\n\n");
    output.push_str(&format!("}}  // namespace {}\n", dialect.namespace));
    Ok(())
}
