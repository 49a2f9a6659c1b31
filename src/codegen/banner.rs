//! Copyright and banner text prepended to every generated file

/// Explanation of the generated API placed at the top of headers
const PLACEHOLDER_TEXT: &[&str] = &[
    "",
    " This file contains the autogenerated parts of the experiments API.",
    "",
    " It generates two symbols for each experiment.",
    "",
    " For the experiment named new_car_project, it generates:",
    "",
    " - a function IsNewCarProjectEnabled() that returns true if the experiment",
    "   should be enabled at runtime.",
    "",
    " - a macro GRPC_EXPERIMENT_IS_INCLUDED_NEW_CAR_PROJECT that is defined if the",
    "   experiment *could* be enabled at runtime.",
    "",
    " The function is used to determine whether to run the experiment or",
    " non-experiment code path.",
    "",
    " If the experiment brings significant bloat, the macro can be used to avoid",
    " including the experiment code path in the binary for binaries that are size",
    " sensitive.",
    "",
    " By default that includes our iOS and Android builds.",
    "",
    " Finally, a small array is included that contains the metadata for each",
    " experiment.",
    "",
    " A macro, GRPC_EXPERIMENTS_ARE_FINAL, controls whether we fix experiment",
    " configuration at build time (if it's defined) or allow it to be tuned at",
    " runtime (if it's disabled).",
    "",
    " If you are using the Bazel build system, that macro can be configured with",
    " --define=grpc_experiments_are_final=true",
];

const LICENSE: &[&str] = &[
    "",
    " Licensed under the Apache License, Version 2.0 (the \"License\");",
    " you may not use this file except in compliance with the License.",
    " You may obtain a copy of the License at",
    "",
    "     http://www.apache.org/licenses/LICENSE-2.0",
    "",
    " Unless required by applicable law or agreed to in writing, software",
    " distributed under the License is distributed on an \"AS IS\" BASIS,",
    " WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.",
    " See the License for the specific language governing permissions and",
    " limitations under the License.",
];

/// Append `lines`, each behind the comment `prefix`
pub fn put_banner(output: &mut String, prefix: &str, lines: &[&str]) {
    for line in lines {
        output.push_str(prefix);
        output.push_str(line);
        output.push('\n');
    }
}

/// Append the license header for `year`
pub fn put_copyright(output: &mut String, prefix: &str, year: i32) {
    let first = format!(" Copyright {} The gRPC Authors", year);
    put_banner(output, prefix, &[first.as_str()]);
    put_banner(output, prefix, LICENSE);
    output.push('\n');
}

/// Append the "Auto generated by" line
pub fn put_generated_by(output: &mut String, prefix: &str, generator: &str) {
    let line = format!(" Auto generated by {}", generator);
    put_banner(output, prefix, &[line.as_str()]);
}

/// Append the explanation of the experiments API
pub fn put_placeholder_text(output: &mut String, prefix: &str) {
    put_banner(output, prefix, PLACEHOLDER_TEXT);
}
