//! # Plugin Compose Registry
//!
//! Plugins contribute build-specification fragments that customize the shell
//! environment. The registry is closed: a plugin is a [`Plugin`] variant
//! dispatched to a pure render function, and unknown names are rejected
//! before anything is built.
//!
//! | Plugin | Config keys                                   |
//! |--------|-----------------------------------------------|
//! | `zsh`  | `theme` (string), `plugins`, `extras` (lists) |
//! | `tmux` | `config` (list of `.tmux.conf` lines)         |

use crate::error::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Installer for oh-my-zsh with theme and plugin selection.
const ZSH_INSTALLER: &str =
    "https://github.com/deluan/zsh-in-docker/releases/download/v1.1.5/zsh-in-docker.sh";

const ZSH_DEFAULT_THEME: &str = "robbyrussell";

/// Known plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plugin {
    Zsh,
    Tmux,
}

impl Plugin {
    /// All registered plugins.
    pub const ALL: [Plugin; 2] = [Plugin::Zsh, Plugin::Tmux];

    /// Registry name.
    pub fn name(&self) -> &'static str {
        match self {
            Plugin::Zsh => "zsh",
            Plugin::Tmux => "tmux",
        }
    }

    /// Renders this plugin's fragment body (without the header line).
    pub fn render(&self, config: &Value) -> Result<String> {
        match self {
            Plugin::Zsh => render_zsh(&parse_section(self.name(), config)?),
            Plugin::Tmux => render_tmux(&parse_section(self.name(), config)?),
        }
    }
}

impl FromStr for Plugin {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Plugin::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| Error::UnknownPlugin(name.to_string()))
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Renders the fragment for plugin `name`, prefixed with `# Plugin: <name>`.
pub fn compose(name: &str, config: &Value) -> Result<String> {
    let plugin: Plugin = name.parse()?;
    let body = plugin.render(config)?;
    Ok(format!("# Plugin: {}\n{}", name, body))
}

/// Renders every plugin section in declaration order.
pub fn compose_all(plugins: &Map<String, Value>) -> Result<Vec<String>> {
    plugins
        .iter()
        .map(|(name, config)| compose(name, config))
        .collect()
}

fn parse_section<T: DeserializeOwned>(name: &str, config: &Value) -> Result<T> {
    // `[plugins.tmux]` with no keys is a valid, empty section.
    let config = match config {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(config).map_err(|e| Error::PluginConfig {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// zsh
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ZshConfig {
    #[serde(default)]
    theme: Option<String>,
    #[serde(default)]
    plugins: Vec<String>,
    #[serde(default)]
    extras: Vec<String>,
}

fn render_zsh(config: &ZshConfig) -> Result<String> {
    let theme = config.theme.as_deref().unwrap_or(ZSH_DEFAULT_THEME);

    let mut args = vec![format!("-t {}", shell_quote(theme))];
    args.extend(config.plugins.iter().map(|p| format!("-p {}", shell_quote(p))));
    args.extend(config.extras.iter().map(|a| format!("-a {}", shell_quote(a))));
    args.push(format!("-a {}", shell_quote("export SHELL=/usr/bin/zsh")));

    Ok(format!(
        "RUN sh -c \"$(curl -fsSL {})\" -- \\\n    {}\nRUN sudo usermod --shell /usr/bin/zsh \"$(whoami)\"\n",
        ZSH_INSTALLER,
        args.join(" \\\n    ")
    ))
}

// =============================================================================
// tmux
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TmuxConfig {
    #[serde(default)]
    config: Vec<String>,
}

fn render_tmux(config: &TmuxConfig) -> Result<String> {
    let mut out = String::from(
        "RUN sudo apt-get update \\\n && sudo apt-get install -y --no-install-recommends tmux \\\n && sudo rm -rf /var/lib/apt/lists/*\n",
    );

    if !config.config.is_empty() {
        let lines: Vec<String> = config.config.iter().map(|l| shell_quote(l)).collect();
        out.push_str(&format!(
            "RUN printf '%s\\n' {} >> \"$HOME/.tmux.conf\"\n",
            lines.join(" ")
        ));
    }

    Ok(out)
}

/// Single-quotes `value` for `/bin/sh`.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("git"), "'git'");
        assert_eq!(shell_quote("it's"), r#"'it'"'"'s'"#);
    }

    #[test]
    fn test_plugin_names_round_trip() {
        for plugin in Plugin::ALL {
            assert_eq!(plugin.name().parse::<Plugin>().unwrap(), plugin);
        }
    }

    #[test]
    fn test_empty_section_is_valid() {
        assert!(Plugin::Tmux.render(&Value::Null).is_ok());
        assert!(Plugin::Zsh.render(&Value::Object(Map::new())).is_ok());
    }
}
