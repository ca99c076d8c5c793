/// Replace `${ENV_VAR}` placeholders in config text.
///
/// Unresolvable or malformed placeholders are left as-is.
#[must_use]
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match lookup(name).filter(|_| !name.is_empty()) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            None => {
                // No closing brace: emit the remainder verbatim.
                out.push_str(&rest[start..]);
                return out;
            },
        }
    }

    out.push_str(rest);
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "TOKEN" => Some("s3cret".to_string()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_vars() {
        assert_eq!(
            substitute_with("key = \"${TOKEN}\"", lookup),
            "key = \"s3cret\""
        );
    }

    #[test]
    fn leaves_unknown_vars_in_place() {
        assert_eq!(substitute_with("${NOPE} and ${TOKEN}", lookup), "${NOPE} and s3cret");
    }

    #[test]
    fn handles_malformed_placeholders() {
        assert_eq!(substitute_with("tail ${UNCLOSED", lookup), "tail ${UNCLOSED");
        assert_eq!(substitute_with("${}", lookup), "${}");
    }

    #[test]
    fn empty_value_is_a_valid_substitution() {
        assert_eq!(substitute_with("[${EMPTY}]", lookup), "[]");
    }
}
