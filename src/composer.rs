//! Build-specification (Dockerfile) rendering.
//!
//! The template carries `__name__` placeholders that are substituted
//! verbatim. The rendered text is not validated; the engine reports any
//! problem at build time.

use crate::config::{EnvVar, KittConfig};

/// Template bundled with the binary.
pub const DEFAULT_TEMPLATE: &str = include_str!("../static/Dockerfile.template");

/// Values substituted into the template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeContext {
    pub image: String,
    pub user: String,
    pub shell: String,
    pub tools: Vec<String>,
    pub envs: Vec<EnvVar>,
    pub plugins: Vec<String>,
}

impl ComposeContext {
    /// Builds the context from a merged config and rendered plugin fragments.
    pub fn from_config(config: &KittConfig, plugins: Vec<String>) -> Self {
        let workspace = &config.workspace;
        Self {
            image: workspace.image.clone(),
            user: workspace.user.clone(),
            shell: workspace.default_shell.clone(),
            tools: workspace.tools.clone(),
            envs: workspace.envs.clone(),
            plugins,
        }
    }
}

/// Renders build specifications from a template.
#[derive(Debug, Clone)]
pub struct Composer {
    template: String,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl Composer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Substitutes every placeholder with the matching context value.
    pub fn compose(&self, context: &ComposeContext) -> String {
        let envs: Vec<String> = context.envs.iter().map(env_instruction).collect();

        self.template
            .replace("__image__", &context.image)
            .replace("__tools__", &context.tools.join(" "))
            .replace("__envs__", &envs.join("\n"))
            .replace("__plugins__", &context.plugins.join("\n"))
            .replace("__shell__", &context.shell)
            .replace("__user__", &context.user)
    }
}

/// `ENV NAME="value"` with the value escaped for a double-quoted string.
fn env_instruction(env: &EnvVar) -> String {
    let value = env.value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("ENV {}=\"{}\"", env.name, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_instruction_escapes_quotes() {
        let env = EnvVar {
            name: "GREETING".to_string(),
            value: r#"say "hi" \o/"#.to_string(),
        };
        assert_eq!(env_instruction(&env), r#"ENV GREETING="say \"hi\" \\o/""#);
    }

    #[test]
    fn test_compose_substitutes_all_placeholders() {
        let context = ComposeContext {
            image: "debian:12".to_string(),
            user: "dev".to_string(),
            shell: "zsh".to_string(),
            tools: vec!["git".to_string(), "jq".to_string()],
            envs: vec![EnvVar {
                name: "LANG".to_string(),
                value: "C.UTF-8".to_string(),
            }],
            plugins: vec!["# Plugin: tmux\nRUN true\n".to_string()],
        };

        let rendered = Composer::default().compose(&context);
        assert!(rendered.starts_with("FROM debian:12\n"));
        assert!(rendered.contains("curl sudo git jq"));
        assert!(rendered.contains("ENV LANG=\"C.UTF-8\""));
        assert!(rendered.contains("USER dev\n"));
        assert!(rendered.contains("--shell /bin/zsh dev"));
        assert!(rendered.contains("# Plugin: tmux"));
        assert!(!rendered.contains("__"));
    }
}
