//! CLI command for `candi doctor`
//!
//! Checks the tools an install needs and reports issues with suggestions.

use anyhow::Result;
use serde_json::json;

use crate::cli::output::{
    is_json, is_quiet, print_detail, print_info, print_json, print_success, print_warning, status,
};
use crate::cli::RunSettings;
use crate::core::doctor::{run_doctor, DoctorReport};
use crate::infra::process::SystemToolRunner;

fn missing_required() -> anyhow::Error {
    anyhow::anyhow!("Missing required tools. Run 'candi doctor' for details.")
}

fn overall_status(report: &DoctorReport) -> &'static str {
    if report.all_passed() {
        "success"
    } else if report.all_required_passed() {
        "warning"
    } else {
        "error"
    }
}

/// Execute the doctor command
pub fn execute(settings: &RunSettings) -> Result<()> {
    let report = run_doctor(&settings.config, &SystemToolRunner::new());

    if is_json() {
        print_json(&json!({
            "status": overall_status(&report),
            "mode": if settings.config.use_spack { "spack" } else { "source" },
            "checks": report.checks,
            "passed_count": report.passed_count(),
            "total_count": report.checks.len(),
        }))?;
        return if report.all_required_passed() {
            Ok(())
        } else {
            Err(missing_required())
        };
    }

    if is_quiet() {
        let failed = report.failed_required();
        if failed.is_empty() {
            return Ok(());
        }
        for check in failed {
            eprintln!("{} Missing required: {}", status::ERROR, check.name);
        }
        return Err(missing_required());
    }

    print_info("Checking build tools...");
    println!();

    for check in &report.checks {
        let version = check
            .version
            .as_ref()
            .map(|v| format!(" ({v})"))
            .unwrap_or_default();
        let optional = if check.required { "" } else { " [optional]" };

        if check.passed {
            println!("  {} {}{version}{optional}", status::SUCCESS, check.name);
        } else {
            println!("  {} {}{optional}", status::ERROR, check.name);
            if let Some(error) = &check.error {
                print_detail(&format!("Error: {error}"));
            }
            if let Some(suggestion) = &check.suggestion {
                print_detail(&format!("Suggestion: {suggestion}"));
            }
        }
    }

    println!();
    let passed = report.passed_count();
    let total = report.checks.len();

    if report.all_passed() {
        print_success(&format!("All checks passed ({passed}/{total})"));
    } else if report.all_required_passed() {
        print_warning(&format!(
            "{passed}/{total} checks passed (optional tools missing)"
        ));
        print_detail("The host is ready to install.");
    } else {
        println!("{} {passed}/{total} checks passed", status::ERROR);
        print_detail("Install the missing required tools:");
        for check in report.failed_required() {
            if let Some(suggestion) = &check.suggestion {
                print_detail(&format!("• {}: {suggestion}", check.name));
            }
        }
        return Err(missing_required());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::doctor::CheckResult;

    #[test]
    fn test_overall_status() {
        let mut report = DoctorReport::new();
        report.add_check(CheckResult::pass("Git", Some("2.43.0".to_string()), true));
        assert_eq!(overall_status(&report), "success");

        report.add_check(CheckResult::fail("Spack", "not found", None, false));
        assert_eq!(overall_status(&report), "warning");

        report.add_check(CheckResult::fail("CMake", "not found", None, true));
        assert_eq!(overall_status(&report), "error");
    }
}
