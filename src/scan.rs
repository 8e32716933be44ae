//! Scan runner: spawn the wrapped test command with healing active and
//! mine its output for selector failures the instrumentation missed.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::info;

use crate::report::{confidence_for, suggest_fix, Confidence, Recommendation};

/// Environment variable that switches test fixtures into healing mode.
pub const HEALER_ACTIVE_ENV: &str = "SELECTOR_HEALER_ACTIVE";

/// Default command when none is given on the command line.
pub const DEFAULT_COMMAND: &[&str] = &["npx", "playwright", "test"];

static LOCATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"locator\(['"`]([^'"`]+)['"`]\)"#).unwrap());
static STACK_FRAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"at .*\(([^:()]+):(\d+):\d+\)").unwrap());
static TIMEOUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"waiting for (?:locator\(['"`]([^'"`]+)['"`]\)|selector "([^"]+)")"#).unwrap()
});

pub struct ScanOutcome {
    pub exit_code: i32,
    pub parsed: Vec<Recommendation>,
}

/// Run `command` with the healer activation flag set, streaming its output
/// through while collecting stderr for failure parsing.
pub async fn run_scan(command: &[String], project_root: &Path) -> Result<ScanOutcome> {
    let (program, args) = command
        .split_first()
        .context("scan command must not be empty")?;

    info!(command = %command.join(" "), "starting selector healer scan");

    let mut child = Command::new(program)
        .args(args)
        .current_dir(project_root)
        .env(HEALER_ACTIVE_ENV, "true")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn '{program}'"))?;

    let stdout = child.stdout.take().context("child stdout unavailable")?;
    let stdout_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            println!("{line}");
        }
    });

    let stderr = child.stderr.take().context("child stderr unavailable")?;
    let stderr_task = tokio::spawn(async move {
        let mut collected = String::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            eprintln!("{line}");
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    });

    let status = child.wait().await.context("failed to wait for child")?;
    stdout_task.await.ok();
    let stderr_text = stderr_task.await.unwrap_or_default();

    let parsed = parse_runner_errors(&stderr_text);
    info!(
        exit_code = status.code().unwrap_or(-1),
        parsed = parsed.len(),
        "scan finished"
    );

    Ok(ScanOutcome {
        exit_code: status.code().unwrap_or(1),
        parsed,
    })
}

/// Mine runner output for selector failures: locator not-found errors with
/// a nearby spec-file stack frame, and timeouts waiting for a selector.
pub fn parse_runner_errors(output: &str) -> Vec<Recommendation> {
    let lines: Vec<&str> = output.lines().collect();
    let mut recommendations: Vec<Recommendation> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if let Some(caps) = LOCATOR_RE.captures(line) {
            if line.contains("not found") {
                let broken = caps[1].to_string();
                let (file, line_no) = lines[index..lines.len().min(index + 10)]
                    .iter()
                    .filter(|l| l.contains(".spec."))
                    .find_map(|l| extract_file_info(l))
                    .unwrap_or_else(|| ("unknown".to_string(), 0));
                push_unique(
                    &mut recommendations,
                    Recommendation {
                        file,
                        line: line_no,
                        suggested_fix: suggest_fix(&broken),
                        confidence: confidence_for(&broken),
                        context: line.trim().to_string(),
                        broken_selector: broken,
                    },
                );
                continue;
            }
        }

        if line.contains("Timeout") {
            if let Some(caps) = TIMEOUT_RE.captures(line) {
                let broken = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                if !broken.is_empty() {
                    push_unique(
                        &mut recommendations,
                        Recommendation {
                            file: "unknown".to_string(),
                            line: 0,
                            suggested_fix: suggest_fix(&broken),
                            confidence: Confidence::Medium,
                            context: "Timeout waiting for element".to_string(),
                            broken_selector: broken,
                        },
                    );
                }
            }
        }
    }

    recommendations
}

fn extract_file_info(line: &str) -> Option<(String, u32)> {
    let caps = STACK_FRAME_RE.captures(line)?;
    let file = caps[1].to_string();
    let line_no = caps[2].parse().ok()?;
    Some((file, line_no))
}

fn push_unique(recommendations: &mut Vec<Recommendation>, rec: Recommendation) {
    let duplicate = recommendations
        .iter()
        .any(|r| r.broken_selector == rec.broken_selector && r.file == rec.file);
    if !duplicate {
        recommendations.push(rec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locator_not_found_with_stack() {
        let output = "\
Error: locator('#login-broken') not found\n\
    at LoginPage.submit (/repo/tests/login.spec.ts:42:11)\n";
        let recs = parse_runner_errors(output);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].broken_selector, "#login-broken");
        assert_eq!(recs[0].file, "/repo/tests/login.spec.ts");
        assert_eq!(recs[0].line, 42);
        assert_eq!(recs[0].suggested_fix, "#login");
        assert_eq!(recs[0].confidence, Confidence::High);
    }

    #[test]
    fn test_parse_timeout_waiting_for_locator() {
        let output = "Timeout 5000ms exceeded waiting for locator('#slow-widget')\n";
        let recs = parse_runner_errors(output);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].broken_selector, "#slow-widget");
        assert_eq!(recs[0].context, "Timeout waiting for element");
    }

    #[test]
    fn test_parse_timeout_waiting_for_selector_string() {
        let output = "Timeout exceeded waiting for selector \"#legacy\"\n";
        let recs = parse_runner_errors(output);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].broken_selector, "#legacy");
    }

    #[test]
    fn test_parse_dedupes_repeated_failures() {
        let output = "\
Error: locator('#dup') not found\n\
    at t (/repo/a.spec.ts:1:1)\n\
Error: locator('#dup') not found\n\
    at t (/repo/a.spec.ts:1:1)\n";
        let recs = parse_runner_errors(output);
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn test_parse_ignores_unrelated_lines() {
        let output = "All tests passed\nRunning 3 tests\n";
        assert!(parse_runner_errors(output).is_empty());
    }
}
