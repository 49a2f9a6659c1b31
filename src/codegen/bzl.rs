//! Bazel test-tag dictionary
//!
//! Emits `EXPERIMENTS = { platform: { list: { tag: [names] } } }` so the build
//! knows which experiments to exercise for each test tag. Experiments that
//! default to `debug` are tested as if they were on.

use std::collections::BTreeMap;

use super::banner;
use super::OutputGenerator;
use crate::error::Result;
use crate::tables::DEBUG_TOKEN;

type TagLists = BTreeMap<String, BTreeMap<String, Vec<String>>>;

pub(super) fn generate(generator: &OutputGenerator<'_>, output: &mut String) -> Result<()> {
    if generator.dialect().bzl_copyright {
        generator.put_preamble(output, "#");
    } else {
        banner::put_generated_by(output, "#", generator.generator_label());
    }
    output.push('\n');
    output.push_str(
        "\"\"\"Dictionary of tags to experiments so we know when to test different experiments.\"\"\"\n\n",
    );

    output.push_str("EXPERIMENTS = {\n");
    for platform in generator.tables().platforms() {
        output.push_str(&format!("    \"{}\": {{\n", platform));
        for (list, tags) in tag_lists(generator, platform) {
            output.push_str(&format!("        \"{}\": {{\n", list));
            for (tag, experiments) in tags {
                output.push_str(&format!("            \"{}\": [\n", tag));
                for experiment in experiments {
                    output.push_str(&format!("                \"{}\",\n", experiment));
                }
                output.push_str("            ],\n");
            }
            output.push_str("        },\n");
        }
        output.push_str("    },\n");
    }
    output.push_str("}\n");
    Ok(())
}

fn tag_lists(generator: &OutputGenerator<'_>, platform: &str) -> TagLists {
    let lists = &generator.tables().bzl_list_for_defaults;
    let mut result: TagLists = lists
        .values()
        .filter(|list| !list.is_empty())
        .map(|list| (list.clone(), BTreeMap::new()))
        .collect();

    for experiment in generator.compiler().definitions() {
        let mut token = experiment.default_value(platform);
        if token == DEBUG_TOKEN {
            token = "true";
        }
        let Some(list) = lists.get(token).filter(|list| !list.is_empty()) else {
            continue;
        };
        let tags = result.entry(list.clone()).or_default();
        for tag in experiment.test_tags() {
            tags.entry(tag.clone())
                .or_default()
                .push(experiment.name().to_string());
        }
    }
    result
}
