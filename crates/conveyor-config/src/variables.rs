//! Variable interpolation for command records.
//!
//! Command arguments reference run variables as `${NAME}`, e.g.:
//! - `${ECR_REPOSITORY_URI}` - fully qualified registry + repository URI
//! - `${AWS_ACCOUNT_ID}` / `${AWS_REGION}` - account and region bindings
//! - `${COMMIT_HASH}` / `${IMAGE_TAG}` - derived during pre_build
//!
//! Unknown placeholders are preserved verbatim so a missing binding is
//! visible in logs instead of silently collapsing to an empty string.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static VAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap());

/// The variable bindings available to a run's commands.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    vars: HashMap<String, String>,
}

impl VariableContext {
    pub fn from_bindings(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    /// Interpolate all `${NAME}` placeholders in a string.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let name = &caps[1];
                self.vars
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| format!("${{{}}}", name))
            })
            .to_string()
    }

    /// Interpolate placeholders in a list of arguments.
    pub fn interpolate_args(&self, args: &[String]) -> Vec<String> {
        args.iter().map(|a| self.interpolate(a)).collect()
    }
}

/// The placeholder names referenced by a string, in order of appearance.
/// Used at parse time to derive a command record's required variables.
pub fn find_placeholders(input: &str) -> Vec<String> {
    let mut names = Vec::new();
    for caps in VAR_REGEX.captures_iter(input) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> VariableContext {
        VariableContext::from_bindings(HashMap::from([
            (
                "ECR_REPOSITORY_URI".to_string(),
                "repo.example/app".to_string(),
            ),
            ("IMAGE_TAG".to_string(), "abcdef1".to_string()),
        ]))
    }

    #[test]
    fn test_basic_interpolation() {
        let result = ctx().interpolate("${ECR_REPOSITORY_URI}:${IMAGE_TAG}");
        assert_eq!(result, "repo.example/app:abcdef1");
    }

    #[test]
    fn test_unknown_variable_preserved() {
        let result = ctx().interpolate("push ${NOT_BOUND}");
        assert_eq!(result, "push ${NOT_BOUND}");
    }

    #[test]
    fn test_interpolate_args() {
        let args = vec![
            "tag".to_string(),
            "${ECR_REPOSITORY_URI}:latest".to_string(),
            "${ECR_REPOSITORY_URI}:${IMAGE_TAG}".to_string(),
        ];
        let result = ctx().interpolate_args(&args);
        assert_eq!(
            result,
            vec![
                "tag",
                "repo.example/app:latest",
                "repo.example/app:abcdef1"
            ]
        );
    }

    #[test]
    fn test_find_placeholders_deduplicates() {
        let names =
            find_placeholders("${ECR_REPOSITORY_URI}:latest ${ECR_REPOSITORY_URI}:${IMAGE_TAG}");
        assert_eq!(names, vec!["ECR_REPOSITORY_URI", "IMAGE_TAG"]);
    }

    #[test]
    fn test_nested_braces_untouched() {
        let result = ctx().interpolate(r#"{"imageUri": "${IMAGE_TAG}"}"#);
        assert_eq!(result, r#"{"imageUri": "abcdef1"}"#);
    }
}
