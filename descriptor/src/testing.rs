//! Scripted collaborators for tests.
//!
//! [`ScriptedRunner`] answers commands from a list of canned outputs and keeps
//! a log of every command it was asked to run, which makes it easy to assert
//! that a descriptor hydrates only once.
//!
//! ```
//! use descriptor::testing::ScriptedRunner;
//! use descriptor::host::CommandRunner;
//!
//! let runner = ScriptedRunner::new().on("echo $HOME", "/Users/tester\n");
//! assert_eq!(runner.run("echo $HOME").unwrap().stdout, "/Users/tester\n");
//! assert_eq!(runner.call_count("echo"), 1);
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::host::{CommandOutput, CommandRunner, FileProbe, Host};

/// A [`CommandRunner`] that replays canned outputs.
///
/// Rules are matched in insertion order; the first rule whose pattern is a
/// substring of the command wins. Unmatched commands produce empty output and
/// exit status 1.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<(String, CommandOutput)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `pattern` with `stdout` and exit status 0.
    pub fn on(self, pattern: &str, stdout: &str) -> Self {
        self.on_output(pattern, CommandOutput::new(stdout, "", 0))
    }

    pub fn on_output(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.rules.push((pattern.to_string(), output));
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }

    /// Wrap the runner in a [`Host`] that also uses it for `$HOME` expansion.
    pub fn into_host(self) -> (Arc<Self>, Host) {
        let runner = Arc::new(self);
        let host = Host::new(runner.clone());
        (runner, host)
    }

    fn answer(&self, command: &str) -> CommandOutput {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.to_string());
        }
        self.rules
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::new("", "", 1))
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.answer(command))
    }

    fn powershell(&self, script: &str) -> Result<CommandOutput> {
        Ok(self.answer(script))
    }
}

/// A [`FileProbe`] backed by a fixed set of paths.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    paths: HashSet<String>,
}

impl StaticProbe {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl FileProbe for StaticProbe {
    fn exists(&self, path: &str) -> bool {
        self.paths.contains(path)
    }
}
