//! Test utilities
//!
//! A scripted [`ToolRunner`] standing in for external tools, and proptest
//! generators.

use std::sync::Mutex;

use crate::infra::process::{ToolError, ToolInvocation, ToolOutput, ToolRunner};

/// Tool runner that records invocations and answers from a script
///
/// Rules match when the invocation's command line starts with the rule's
/// prefix; the first matching rule wins. Unmatched invocations succeed with
/// empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<(String, ToolOutput)>,
    calls: Mutex<Vec<ToolInvocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `status` for command lines starting with `prefix`
    #[must_use]
    pub fn fail_on(mut self, prefix: &str, status: i32) -> Self {
        self.rules
            .push((prefix.to_string(), ToolOutput::failed(status)));
        self
    }

    /// Succeed with `stdout` for command lines starting with `prefix`
    #[must_use]
    pub fn respond(mut self, prefix: &str, stdout: &str) -> Self {
        self.rules.push((prefix.to_string(), ToolOutput::ok(stdout)));
        self
    }

    /// Everything run so far
    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Command lines run so far
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(ToolInvocation::command_line)
            .collect()
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        let line = invocation.command_line();
        Ok(self
            .rules
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| ToolOutput::ok("")))
    }
}

pub mod generators {
    use proptest::prelude::*;

    /// Generate a valid package name (lowercase alphanumeric with hyphens)
    pub fn package_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,12}"
    }

    /// Generate a request list drawn from a small pool so duplicates occur
    pub fn request_names() -> impl Strategy<Value = Vec<String>> {
        let pool = prop_oneof![
            Just("cuda".to_string()),
            Just("kokkos".to_string()),
            Just("openmpi".to_string()),
            Just("zlib".to_string()),
            Just("openblas".to_string()),
            Just("p4est".to_string()),
            Just("dealii".to_string()),
            package_name(),
        ];
        proptest::collection::vec(pool, 0..12)
    }
}
