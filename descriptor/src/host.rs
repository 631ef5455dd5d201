//! Collaborators through which descriptors reach the inspected host.
//!
//! Every query eventually turns into a command run on the host (PowerShell,
//! `plutil`, `wmic`), an existence probe, or a `$HOME` expansion. Each of those
//! sits behind a trait so that tests and remote transports can stand in for
//! the local implementations.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{DescriptorError, Result};

/// Placeholder expanded to the home directory of the inspected host.
pub const HOME_TOKEN: &str = "$HOME";

/// Captured result of one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_status: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// Stdout of a clean run. A non-zero exit or any stderr output is a
    /// `ParseFailure` for `path` carrying the tool's diagnostic.
    pub fn into_stdout(self, path: &str) -> Result<String> {
        let stderr = self.stderr.trim();
        if self.success() && stderr.is_empty() {
            return Ok(self.stdout);
        }

        let message = if stderr.is_empty() {
            format!("command exited with status {}", self.exit_status)
        } else {
            stderr.to_string()
        };
        Err(DescriptorError::parse_failure(path, message))
    }
}

/// Runs commands on the inspected host.
pub trait CommandRunner: Send + Sync {
    /// Run a command line through the host shell.
    fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Run a PowerShell script.
    fn powershell(&self, script: &str) -> Result<CommandOutput> {
        self.run(&format!(
            "powershell -NoProfile -NonInteractive -Command {}",
            shell_quote(script)
        ))
    }
}

pub trait FileProbe: Send + Sync {
    fn exists(&self, path: &str) -> bool;
}

/// Expands host-specific placeholders in a path before it is probed or passed to a command.
pub trait EnvExpander: Send + Sync {
    fn expand(&self, path: &str) -> Result<String>;
}

/// Executables used by [`ShellRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSettings {
    pub shell: String,
    pub shell_arg: String,
    pub powershell: String,
}

impl Default for CommandSettings {
    fn default() -> Self {
        if cfg!(windows) {
            Self {
                shell: "cmd".to_string(),
                shell_arg: "/C".to_string(),
                powershell: "powershell".to_string(),
            }
        } else {
            Self {
                shell: "sh".to_string(),
                shell_arg: "-c".to_string(),
                powershell: "pwsh".to_string(),
            }
        }
    }
}

/// Runs commands on the local machine with `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    settings: CommandSettings,
}

impl ShellRunner {
    pub fn new(settings: CommandSettings) -> Self {
        Self { settings }
    }

    fn capture(command_line: &str, command: &mut Command) -> Result<CommandOutput> {
        log::debug!("Running command: {}", command_line);
        let output = command.output().map_err(|source| DescriptorError::Command {
            command: command_line.to_string(),
            source,
        })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // 被信号终止时没有退出码
            exit_status: output.status.code().unwrap_or(-1),
        };
        if !result.success() {
            log::warn!(
                "Command `{}` exited with status {}",
                command_line,
                result.exit_status
            );
        }
        Ok(result)
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        let mut cmd = Command::new(&self.settings.shell);
        cmd.arg(&self.settings.shell_arg).arg(command);
        Self::capture(command, &mut cmd)
    }

    fn powershell(&self, script: &str) -> Result<CommandOutput> {
        let mut cmd = Command::new(&self.settings.powershell);
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", script]);
        Self::capture(script, &mut cmd)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileProbe;

impl FileProbe for LocalFileProbe {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }
}

/// Replaces [`HOME_TOKEN`] with the home directory reported by the host.
///
/// The home directory is asked for once (`echo $HOME`) and then reused.
pub struct HomeExpander {
    runner: Arc<dyn CommandRunner>,
    home: OnceCell<String>,
}

impl HomeExpander {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            home: OnceCell::new(),
        }
    }

    fn home(&self) -> Result<&str> {
        let home = self.home.get_or_try_init(|| {
            let output = self.runner.run("echo $HOME")?;
            let home = output.stdout.trim().to_string();
            if home.is_empty() {
                return Err(DescriptorError::Configuration(
                    "unable to determine the home directory of the inspected host".to_string(),
                ));
            }
            log::debug!("Resolved {} to {}", HOME_TOKEN, home);
            Ok(home)
        })?;
        Ok(home.as_str())
    }
}

impl EnvExpander for HomeExpander {
    fn expand(&self, path: &str) -> Result<String> {
        if !path.contains(HOME_TOKEN) {
            return Ok(path.to_string());
        }
        Ok(path.replace(HOME_TOKEN, self.home()?))
    }
}

/// The set of collaborators a descriptor talks to.
#[derive(Clone)]
pub struct Host {
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn FileProbe>,
    expander: Arc<dyn EnvExpander>,
}

impl Host {
    /// Build a host around `runner`, probing the local filesystem and
    /// expanding `$HOME` through the runner.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            expander: Arc::new(HomeExpander::new(runner.clone())),
            probe: Arc::new(LocalFileProbe),
            runner,
        }
    }

    pub fn local(settings: CommandSettings) -> Self {
        Self::new(Arc::new(ShellRunner::new(settings)))
    }

    pub fn with_probe(mut self, probe: Arc<dyn FileProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_expander(mut self, expander: Arc<dyn EnvExpander>) -> Self {
        self.expander = expander;
        self
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn probe(&self) -> &dyn FileProbe {
        self.probe.as_ref()
    }

    pub fn expander(&self) -> &dyn EnvExpander {
        self.expander.as_ref()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::local(CommandSettings::default())
    }
}

/// Quote `value` as a single POSIX shell word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Quote `value` as a PowerShell single-quoted string literal.
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/tmp/a b"), "'/tmp/a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_ps_quote() {
        assert_eq!(ps_quote(r"HKLM:\Software"), r"'HKLM:\Software'");
        assert_eq!(ps_quote("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_into_stdout() {
        let ok = CommandOutput::new("data\n", "", 0);
        assert_eq!(ok.into_stdout("/p").unwrap(), "data\n");

        let denied = CommandOutput::new("", "Access denied\r\n", 1);
        match denied.into_stdout("/p") {
            Err(DescriptorError::ParseFailure { path, message }) => {
                assert_eq!(path, "/p");
                assert_eq!(message, "Access denied");
            }
            other => panic!("Expected parse failure, got {:?}", other),
        }

        let silent = CommandOutput::new("partial", "", 2);
        assert!(matches!(
            silent.into_stdout("/p"),
            Err(DescriptorError::ParseFailure { ref message, .. }) if message.contains("status 2")
        ));

        let warned = CommandOutput::new("partial", "WARNING: truncated", 0);
        assert!(warned.into_stdout("/p").is_err());
    }

    #[test]
    fn test_home_expander_runs_once() {
        let runner = Arc::new(ScriptedRunner::new().on("echo $HOME", "/Users/tester\n"));
        let expander = HomeExpander::new(runner.clone());

        assert_eq!(
            expander.expand("$HOME/Library/Preferences/a.plist").unwrap(),
            "/Users/tester/Library/Preferences/a.plist"
        );
        assert_eq!(expander.expand("$HOME/b.plist").unwrap(), "/Users/tester/b.plist");
        assert_eq!(expander.expand("/etc/c.plist").unwrap(), "/etc/c.plist");
        assert_eq!(runner.call_count("echo $HOME"), 1);
    }

    #[test]
    fn test_home_expander_without_home() {
        let runner = Arc::new(ScriptedRunner::new().on("echo $HOME", ""));
        let expander = HomeExpander::new(runner);

        let err = expander.expand("$HOME/a.plist").unwrap_err();
        assert!(matches!(err, DescriptorError::Configuration(_)));
    }

    #[test]
    fn test_local_file_probe() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("SystemVersion.plist");
        std::fs::write(&file, b"<plist/>").unwrap();

        assert!(LocalFileProbe.exists(file.to_str().unwrap()));
        assert!(!LocalFileProbe.exists(dir.path().join("missing").to_str().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_captures_output() {
        let runner = ShellRunner::new(CommandSettings {
            shell: "sh".to_string(),
            shell_arg: "-c".to_string(),
            powershell: "pwsh".to_string(),
        });

        let output = runner.run("echo hello; echo oops >&2; exit 3").unwrap();
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
        assert_eq!(output.exit_status, 3);
        assert!(!output.success());
    }

    #[test]
    fn test_shell_runner_missing_shell() {
        let runner = ShellRunner::new(CommandSettings {
            shell: "/nonexistent/shell".to_string(),
            shell_arg: "-c".to_string(),
            powershell: "pwsh".to_string(),
        });

        let err = runner.run("true").unwrap_err();
        assert!(matches!(err, DescriptorError::Command { .. }));
    }
}
