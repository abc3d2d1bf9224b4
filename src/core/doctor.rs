//! Host readiness checks
//!
//! Reports which of the tools an install needs are on `PATH`, with the
//! version each one reports.

use serde::Serialize;

use crate::core::config::Config;
use crate::infra::process::{ToolInvocation, ToolRunner};
use crate::infra::toolchain::{detect_compiler, CompilerDetection};

/// Result of a single tool check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// A failed required check blocks installs
    pub required: bool,
}

impl CheckResult {
    pub fn pass(name: &str, version: Option<String>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            version,
            error: None,
            suggestion: None,
            required,
        }
    }

    pub fn fail(name: &str, error: &str, suggestion: Option<&str>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            version: None,
            error: Some(error.to_string()),
            suggestion: suggestion.map(String::from),
            required,
        }
    }
}

/// Overall doctor report
#[derive(Debug, Default, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,
}

impl DoctorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_check(&mut self, result: CheckResult) {
        self.checks.push(result);
    }

    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_required(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .collect()
    }
}

/// Version `command --version` reports, or `None` when it cannot run
pub fn check_command(tools: &dyn ToolRunner, command: &str) -> Option<String> {
    let output = tools
        .run(&ToolInvocation::new(command).arg("--version"))
        .ok()
        .filter(|o| o.success())?;
    extract_version(&format!("{}{}", output.stdout, output.stderr))
        .or_else(|| Some("unknown".to_string()))
}

/// Extract a version string from command output
fn extract_version(output: &str) -> Option<String> {
    let version_regex = regex::Regex::new(r"v?(\d+\.\d+(?:\.\d+)?(?:-\w+)?)").ok()?;
    version_regex
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn check_tool(
    tools: &dyn ToolRunner,
    label: &str,
    command: &str,
    suggestion: &str,
    required: bool,
) -> CheckResult {
    match check_command(tools, command) {
        Some(version) => CheckResult::pass(label, Some(version), required),
        None => CheckResult::fail(
            label,
            &format!("'{command}' not found in PATH"),
            Some(suggestion),
            required,
        ),
    }
}

/// Run every check relevant to `config`
pub fn run_doctor(config: &Config, tools: &dyn ToolRunner) -> DoctorReport {
    let mut report = DoctorReport::new();
    let source_build = !config.use_spack;

    report.add_check(check_tool(tools, "Git", "git", "Install git with your package manager", true));
    for (label, command, suggestion) in [
        ("tar", "tar", "Install GNU tar"),
        ("CMake", "cmake", "Install CMake 3.17 or newer"),
        ("make", "make", "Install GNU make"),
    ] {
        report.add_check(check_tool(tools, label, command, suggestion, source_build));
    }

    if config.use_default_compiler {
        report.add_check(check_tool(tools, "C compiler", "cc", "Install a C compiler", source_build));
        report.add_check(check_tool(tools, "C++ compiler", "c++", "Install a C++ compiler", source_build));
    } else if source_build {
        let name = format!("Compiler {}", config.compiler);
        report.add_check(match detect_compiler(&config.compiler, tools) {
            CompilerDetection::Found(exes) => CheckResult::pass(
                &name,
                Some(exes.cc.display().to_string()),
                true,
            ),
            CompilerDetection::NotFound { reason } => CheckResult::fail(
                &name,
                &reason,
                Some("Install the compiler or set compiler.use_default = \"ON\""),
                true,
            ),
        });
    }
    report.add_check(check_tool(
        tools,
        "Fortran compiler",
        "gfortran",
        "Install gfortran; Open MPI and OpenBLAS build without Fortran support otherwise",
        false,
    ));

    report.add_check(check_tool(
        tools,
        "Spack",
        "spack",
        "Clone https://github.com/spack/spack and source share/spack/setup-env.sh",
        config.use_spack,
    ));

    if config.dealii.cuda {
        report.add_check(check_tool(
            tools,
            "CUDA compiler",
            "nvcc",
            "Install the CUDA toolkit and put nvcc on PATH",
            true,
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::process::{ToolError, ToolOutput};

    /// Knows a fixed set of programs; everything else fails to spawn
    struct Host(&'static [(&'static str, &'static str)]);

    impl ToolRunner for Host {
        fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
            self.0
                .iter()
                .find(|(program, _)| *program == invocation.program)
                .map(|(_, banner)| ToolOutput::ok(*banner))
                .ok_or_else(|| ToolError::Spawn {
                    program: invocation.program.clone(),
                    error: "not found".to_string(),
                })
        }
    }

    const FULL_HOST: &[(&str, &str)] = &[
        ("git", "git version 2.43.0"),
        ("tar", "tar (GNU tar) 1.35"),
        ("cmake", "cmake version 3.28.3"),
        ("make", "GNU Make 4.3"),
        ("cc", "cc (Ubuntu 13.2.0-23ubuntu4) 13.2.0"),
        ("c++", "c++ (Ubuntu 13.2.0-23ubuntu4) 13.2.0"),
    ];

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_version("git version 2.39.0"), Some("2.39.0".to_string()));
        assert_eq!(extract_version("cmake version 3.28.3"), Some("3.28.3".to_string()));
        assert_eq!(extract_version("no version"), None);
    }

    #[test]
    fn test_source_host_passes_without_optional_tools() {
        let report = run_doctor(&Config::default(), &Host(FULL_HOST));
        assert!(report.all_required_passed());
        assert!(!report.all_passed());

        let spack = report.checks.iter().find(|c| c.name == "Spack").unwrap();
        assert!(!spack.passed);
        assert!(!spack.required);
        let cmake = report.checks.iter().find(|c| c.name == "CMake").unwrap();
        assert_eq!(cmake.version.as_deref(), Some("3.28.3"));
    }

    #[test]
    fn test_spack_required_when_enabled() {
        let config = Config {
            use_spack: true,
            ..Config::default()
        };
        let report = run_doctor(&config, &Host(FULL_HOST));
        let failed: Vec<&str> = report.failed_required().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(failed, vec!["Spack"]);
    }

    #[test]
    fn test_missing_build_tool_is_required_failure() {
        let report = run_doctor(&Config::default(), &Host(&[("git", "git version 2.43.0")]));
        let failed: Vec<&str> = report.failed_required().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(failed, vec!["tar", "CMake", "make", "C compiler", "C++ compiler"]);
    }
}
