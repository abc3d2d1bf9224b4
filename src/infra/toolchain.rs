//! Host compiler discovery
//!
//! Looks for the executables of a requested compiler on `PATH` and checks
//! that they report the requested version. Nothing here touches the process
//! environment; callers copy the result into the install context.

use regex::Regex;
use std::path::PathBuf;

use crate::core::package::CompilerSpec;
use crate::infra::process::{ToolInvocation, ToolRunner};

/// Paths of a compiler's drivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerExecutables {
    pub cc: PathBuf,
    pub cxx: PathBuf,
    /// Fortran is optional; several packages build without it
    pub fc: Option<PathBuf>,
}

/// Outcome of [`detect_compiler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerDetection {
    Found(CompilerExecutables),
    NotFound { reason: String },
}

/// Find `spec`'s executables on `PATH`
pub fn detect_compiler(spec: &CompilerSpec, tools: &dyn ToolRunner) -> CompilerDetection {
    detect_compiler_with(spec, tools, |name| which::which(name).ok())
}

/// [`detect_compiler`] with a custom executable lookup
///
/// Versioned names are tried first (`gcc-13.2.0`, `gcc-13.2`, `gcc-13`),
/// then the bare name. A C compiler is accepted only when its `--version`
/// output carries a version starting with `spec.version`.
pub fn detect_compiler_with<F>(spec: &CompilerSpec, tools: &dyn ToolRunner, lookup: F) -> CompilerDetection
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let (cc, cxx, fc) = spec.executables();

    for suffix in version_suffixes(&spec.version) {
        let Some(cc_path) = lookup(&format!("{cc}{suffix}")) else {
            continue;
        };

        match reported_version(tools, &cc_path) {
            Some(found) if version_matches(&found, &spec.version) => {}
            Some(found) => {
                tracing::debug!("{} reports {found}, want {}", cc_path.display(), spec.version);
                continue;
            }
            None => continue,
        }

        let Some(cxx_path) = lookup(&format!("{cxx}{suffix}")) else {
            continue;
        };
        let fc_path = lookup(&format!("{fc}{suffix}"));

        tracing::info!("Using {spec} at {}", cc_path.display());
        return CompilerDetection::Found(CompilerExecutables {
            cc: cc_path,
            cxx: cxx_path,
            fc: fc_path,
        });
    }

    CompilerDetection::NotFound {
        reason: format!("no {cc}/{cxx} reporting version {} on PATH", spec.version),
    }
}

fn version_suffixes(version: &str) -> Vec<String> {
    let parts: Vec<&str> = version.split('.').collect();
    let mut suffixes: Vec<String> = (1..=parts.len())
        .rev()
        .map(|n| format!("-{}", parts[..n].join(".")))
        .collect();
    suffixes.push(String::new());
    suffixes.dedup();
    suffixes
}

fn reported_version(tools: &dyn ToolRunner, cc: &std::path::Path) -> Option<String> {
    let output = tools
        .run(&ToolInvocation::new(cc.display().to_string()).arg("--version"))
        .ok()
        .filter(|o| o.success())?;
    parse_version_output(&output.stdout)
}

/// First dotted version number in a compiler's `--version` banner
pub fn parse_version_output(text: &str) -> Option<String> {
    let first_line = text.lines().next()?;
    let re = Regex::new(r"(\d+\.\d+(?:\.\d+)?)").ok()?;
    re.captures_iter(first_line)
        .last()
        .map(|c| c[1].to_string())
}

fn version_matches(found: &str, wanted: &str) -> bool {
    found == wanted || found.starts_with(&format!("{wanted}."))
        || wanted.starts_with(&format!("{found}."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedRunner;

    fn lookup_in(available: &'static [&'static str]) -> impl Fn(&str) -> Option<PathBuf> {
        move |name| {
            available
                .contains(&name)
                .then(|| PathBuf::from(format!("/usr/bin/{name}")))
        }
    }

    #[test]
    fn test_parse_version_output() {
        assert_eq!(
            parse_version_output("gcc-13 (Ubuntu 13.2.0-4ubuntu3) 13.2.0\nCopyright"),
            Some("13.2.0".to_string())
        );
        assert_eq!(
            parse_version_output("Ubuntu clang version 18.1.3 (1ubuntu1)"),
            Some("18.1.3".to_string())
        );
        assert_eq!(parse_version_output("no digits here"), None);
    }

    #[test]
    fn test_version_suffixes() {
        assert_eq!(version_suffixes("13.2.0"), vec!["-13.2.0", "-13.2", "-13", ""]);
    }

    #[test]
    fn test_versioned_compiler_found() {
        let runner = ScriptedRunner::new().respond("/usr/bin/gcc-13 --version", "gcc-13 (GCC) 13.2.0\n");
        let detection = detect_compiler_with(
            &CompilerSpec::new("gcc", "13.2.0"),
            &runner,
            lookup_in(&["gcc-13", "g++-13", "gfortran-13", "gcc"]),
        );

        assert_eq!(
            detection,
            CompilerDetection::Found(CompilerExecutables {
                cc: PathBuf::from("/usr/bin/gcc-13"),
                cxx: PathBuf::from("/usr/bin/g++-13"),
                fc: Some(PathBuf::from("/usr/bin/gfortran-13")),
            })
        );
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let runner = ScriptedRunner::new().respond("/usr/bin/gcc --version", "gcc (GCC) 11.4.0\n");
        let detection = detect_compiler_with(
            &CompilerSpec::new("gcc", "13.2.0"),
            &runner,
            lookup_in(&["gcc", "g++"]),
        );

        assert!(matches!(detection, CompilerDetection::NotFound { .. }));
    }

    #[test]
    fn test_missing_fortran_is_allowed() {
        let runner = ScriptedRunner::new().respond("/usr/bin/clang --version", "clang version 18.1.3\n");
        let detection = detect_compiler_with(
            &CompilerSpec::new("clang", "18"),
            &runner,
            lookup_in(&["clang", "clang++"]),
        );

        match detection {
            CompilerDetection::Found(exes) => assert!(exes.fc.is_none()),
            other => panic!("expected a compiler, got {other:?}"),
        }
    }
}
