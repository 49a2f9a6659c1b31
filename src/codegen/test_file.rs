//! Experiments test rendering
//!
//! For final builds, checks that every generated accessor agrees with the
//! value the rollout resolved for the current platform.

use super::names::{accessor, snake_to_pascal};
use super::OutputGenerator;
use crate::error::Result;

pub(super) fn generate(generator: &OutputGenerator<'_>, output: &mut String) -> Result<()> {
    let namespace = generator.dialect().namespace;
    generator.put_preamble(output, "//");
    output.push('\n');

    output.push_str("#include <grpc/support/port_platform.h>\n\n");
    output.push_str("#include \"gtest/gtest.h\"\n\n");
    output.push_str(&format!("#include \"{}\"\n\n", generator.include_path()));
    output.push_str("#ifdef GRPC_EXPERIMENTS_ARE_FINAL\n\n");

    generator.platform_chain(output, |output, platform| {
        for experiment in generator.compiler().definitions() {
            let body = generator
                .tables()
                .final_return(experiment.default_value(platform))?;
            output.push_str(&format!(
                "bool Get{}ExperimentValue() {{ {} }}\n",
                snake_to_pascal(experiment.name()),
                body
            ));
        }
        Ok(())
    })?;
    output.push('\n');

    for experiment in generator.compiler().definitions() {
        let pascal = snake_to_pascal(experiment.name());
        output.push_str(&format!(
            "TEST(ExperimentsTest, Check{}ExperimentFinalValue) {{\n",
            pascal
        ));
        output.push_str(&format!(
            "  ASSERT_EQ({}::{}(), Get{}ExperimentValue());\n",
            namespace,
            accessor(experiment.name()),
            pascal
        ));
        output.push_str("}\n\n");
    }

    output.push_str("#endif  // GRPC_EXPERIMENTS_ARE_FINAL\n\n");
    output.push_str("int main(int argc, char** argv) {\n");
    output.push_str("  testing::InitGoogleTest(&argc, argv);\n");
    output.push_str("  return RUN_ALL_TESTS();\n");
    output.push_str("}\n");
    Ok(())
}
