//! Command line of the external crawl tool

use crate::config::{RunConfig, ToolConfig};
use std::fmt;
use std::path::Path;
use url::Url;

/// A fully resolved crawl tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Builds the invocation for one attempt
    ///
    /// Flags follow the configured tool arguments and the target URL. Path lists are comma-joined
    /// and omitted when empty; `--timeout` is omitted when the run has no timeout.
    pub fn build(tool: &ToolConfig, url: &Url, params: &RunConfig, output_path: &Path) -> Self {
        let mut args = tool.args.clone();
        args.push(url.to_string());

        let mut flag = |name: &str, value: String| {
            args.push(format!("--{}", name));
            args.push(value);
        };

        flag("limit", params.limit.to_string());
        flag("max-depth", params.max_depth.to_string());
        flag("delay", params.delay_ms.to_string());
        flag("max-concurrency", params.max_concurrency.to_string());
        flag("poll-interval", params.poll_interval_secs.to_string());
        if let Some(timeout) = params.timeout_secs {
            flag("timeout", timeout.to_string());
        }
        flag("sitemap", params.sitemap.to_string());
        if !params.include_paths.is_empty() {
            flag("include-paths", params.include_paths.join(","));
        }
        if !params.exclude_paths.is_empty() {
            flag("exclude-paths", params.exclude_paths.join(","));
        }
        flag("output", output_path.display().to_string());

        Self {
            program: tool.command.clone(),
            args,
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Single-quotes an argument for display when it holds shell-significant characters
fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
