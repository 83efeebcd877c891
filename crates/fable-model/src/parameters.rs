use indexmap::IndexMap;

/// Ordered name to value bindings used for example rows and step parameters.
pub type Parameters = IndexMap<String, String>;

/// Merges parameter layers in order; later layers override earlier ones.
pub fn merge_parameters<'a>(layers: impl IntoIterator<Item = &'a Parameters>) -> Parameters {
    let mut merged = Parameters::new();
    for layer in layers {
        for (name, value) in layer {
            merged.insert(name.clone(), value.clone());
        }
    }
    merged
}

/// Replaces every `<name>` placeholder whose name is bound in `bound`.
///
/// Unbound placeholders are left untouched. Substituted values are not
/// rescanned.
pub fn substitute_placeholders(value: &str, bound: &Parameters) -> String {
    if bound.is_empty() || !value.contains('<') {
        return value.to_string();
    }

    let mut output = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(open) = rest.find('<') {
        output.push_str(&rest[..open]);
        let candidate = &rest[open + 1..];
        let Some(close) = candidate.find('>') else {
            output.push_str(&rest[open..]);
            return output;
        };
        let name = &candidate[..close];
        match bound.get(name) {
            Some(replacement) if !name.contains('<') => {
                output.push_str(replacement);
                rest = &candidate[close + 1..];
            }
            _ => {
                output.push('<');
                rest = candidate;
            }
        }
    }
    output.push_str(rest);
    output
}

/// Resolves placeholders in every value of `row` against `bound`.
pub fn resolve_placeholders(row: &Parameters, bound: &Parameters) -> Parameters {
    row.iter()
        .map(|(name, value)| (name.clone(), substitute_placeholders(value, bound)))
        .collect()
}
