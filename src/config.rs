use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "gavel", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file; built-in defaults apply when omitted
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,
}

impl CliArgs {
    /// Load the configuration from the specified file
    pub fn to_config(&self) -> std::io::Result<Config> {
        match &self.config_path {
            Some(path) => {
                let file = std::fs::File::open(path)?;
                let reader = std::io::BufReader::new(file);
                serde_json::from_reader(reader).map_err(|e| e.into())
            }
            None => Ok(Config::default()),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub toolchain: ToolchainConfig,
    pub sandbox: SandboxConfig,
    /// Directory workspaces are created under; system temp dir when absent
    pub workspace_root: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    /// Upper bound on one whole multipart submission, in bytes
    pub max_submission_bytes: usize,
    /// Applied when a request carries no usable time limit
    pub default_time_limit_secs: u64,
    /// Optional deadline for the compile stage; unbounded when absent
    pub compile_time_limit_secs: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_submission_bytes: 110 * 1024,
            default_time_limit_secs: 10,
            compile_time_limit_secs: None,
        }
    }
}

/// The single compile/run toolchain submissions are judged with
///
/// Command templates expand `%SOURCE%` to the staged source file name and
/// `%ENTRY%` to the validated entry name.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ToolchainConfig {
    pub name: String,
    pub source_extension: String,
    pub compile: Vec<String>,
    pub run: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            name: "java".to_string(),
            source_extension: "java".to_string(),
            compile: vec!["javac".to_string(), "%SOURCE%".to_string()],
            run: vec!["java".to_string(), "%ENTRY%".to_string()],
        }
    }
}

impl ToolchainConfig {
    /// File name the source is staged under inside the workspace
    pub fn source_file_name(&self, entry: &str) -> String {
        format!("{entry}.{}", self.source_extension)
    }

    pub fn compile_command(&self, entry: &str) -> Vec<String> {
        let source = self.source_file_name(entry);
        let mut mapping = HashMap::<&str, &str>::new();
        mapping.insert("%SOURCE%", &source);
        mapping.insert("%ENTRY%", entry);
        apply_template(&self.compile, &mapping)
    }

    pub fn run_command(&self, entry: &str) -> Vec<String> {
        let source = self.source_file_name(entry);
        let mut mapping = HashMap::<&str, &str>::new();
        mapping.insert("%SOURCE%", &source);
        mapping.insert("%ENTRY%", entry);
        apply_template(&self.run, &mapping)
    }
}

/// External confinement wrapper the run command is nested under
///
/// `command` is an argv prefix; `%WORKDIR%` expands to the workspace path.
/// An empty prefix disables confinement entirely.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SandboxConfig {
    pub command: Vec<String>,
    /// Leading lines the wrapper itself prints before any program output
    pub banner_lines: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "firejail".to_string(),
                "--quiet".to_string(),
                "--private=%WORKDIR%".to_string(),
                "--net=none".to_string(),
                "--rlimit-fsize=16777216".to_string(),
                "--".to_string(),
            ],
            banner_lines: 0,
        }
    }
}

impl SandboxConfig {
    pub fn wrapper_command(&self, workdir: &str) -> Vec<String> {
        let mut mapping = HashMap::<&str, &str>::new();
        mapping.insert("%WORKDIR%", workdir);
        apply_template(&self.command, &mapping)
    }
}

/// Applies template substitutions to command arguments
fn apply_template(cmd_template: &[String], mapping: &HashMap<&str, &str>) -> Vec<String> {
    cmd_template
        .iter()
        .map(|s| {
            let mut t = s.clone();
            for (k, v) in mapping.iter() {
                t = t.replace(k, v);
            }
            t
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let file = std::fs::File::open("data/example.json").unwrap();
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).unwrap();
        assert_eq!(config.server.bind_address, Some("127.0.0.1".to_string()));
        assert_eq!(config.server.bind_port, Some(8000));
        assert_eq!(config.toolchain.name, "java");
        assert_eq!(config.sandbox.banner_lines, 1);
        assert_eq!(config.workspace_root, Some(PathBuf::from("/tmp/gavel")));
    }

    #[test]
    fn test_empty_config_falls_back_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.limits.max_submission_bytes, 110 * 1024);
        assert_eq!(config.limits.default_time_limit_secs, 10);
        assert_eq!(config.limits.compile_time_limit_secs, None);
        assert_eq!(config.toolchain.source_extension, "java");
        assert_eq!(config.sandbox.command[0], "firejail");
        assert!(config.workspace_root.is_none());
    }

    #[test]
    fn test_compile_command_expansion() {
        let toolchain = ToolchainConfig::default();
        assert_eq!(
            toolchain.compile_command("Main"),
            vec!["javac".to_string(), "Main.java".to_string()]
        );
        assert_eq!(
            toolchain.run_command("Main"),
            vec!["java".to_string(), "Main".to_string()]
        );
    }

    #[test]
    fn test_run_command_may_reference_source() {
        let toolchain = ToolchainConfig {
            name: "shell".to_string(),
            source_extension: "sh".to_string(),
            compile: vec!["/bin/sh".to_string(), "-n".to_string(), "%SOURCE%".to_string()],
            run: vec!["/bin/sh".to_string(), "%SOURCE%".to_string()],
        };
        assert_eq!(
            toolchain.run_command("solution"),
            vec!["/bin/sh".to_string(), "solution.sh".to_string()]
        );
    }

    #[test]
    fn test_wrapper_command_expansion() {
        let sandbox = SandboxConfig::default();
        let expanded = sandbox.wrapper_command("/tmp/ws-1");
        assert_eq!(expanded[2], "--private=/tmp/ws-1");
        assert_eq!(expanded.last(), Some(&"--".to_string()));
    }
}
