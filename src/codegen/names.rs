//! Identifier Formatting
//!
//! Experiment names are lower_snake_case. Generated code spells them as
//! PascalCase in identifiers and accessors, SCREAMING_CASE in macros, and
//! as escaped C string literals in data.

/// `new_car_project` -> `NewCarProject`
pub fn snake_to_pascal(snake_case: &str) -> String {
    let mut result = String::with_capacity(snake_case.len());
    let mut capitalize_next = true;

    for c in snake_case.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// `new_car_project` -> `GRPC_EXPERIMENT_IS_INCLUDED_NEW_CAR_PROJECT`
pub fn inclusion_macro(name: &str) -> String {
    format!("GRPC_EXPERIMENT_IS_INCLUDED_{}", name.to_ascii_uppercase())
}

/// `new_car_project` -> `IsNewCarProjectEnabled`
pub fn accessor(name: &str) -> String {
    format!("Is{}Enabled", snake_to_pascal(name))
}

/// `new_car_project` -> `kExperimentIdNewCarProject`
pub fn experiment_id(name: &str) -> String {
    format!("kExperimentId{}", snake_to_pascal(name))
}

/// Quote `text` as a C/C++ string literal
pub fn c_string(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + 2);
    result.push('"');
    for c in text.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            // Octal escapes always take exactly three digits, so a following
            // digit cannot extend them.
            c if c.is_ascii_control() => result.push_str(&format!("\\{:03o}", c as u32)),
            // Avoid accidental trigraphs.
            '?' => result.push_str("\\?"),
            c => result.push(c),
        }
    }
    result.push('"');
    result
}
