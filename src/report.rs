//! Report rendering from the consumed ledger.
//!
//! Produces the machine-readable JSON summary and the human-readable
//! Markdown summary, plus the suggested-fix heuristics used for selectors
//! the healer could not resolve at run time.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use healer_core_types::{HealStatus, LedgerEntry};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Output directory for generated reports, relative to the project root.
pub const REPORT_DIR: &str = "auto-heal-recommendations";
pub const JSON_REPORT_FILE: &str = "selector-recommendations.json";
pub const MARKDOWN_REPORT_FILE: &str = "healing-report.md";

/// Suffixes that usually mark a deliberately broken test selector.
const HIGH_CONFIDENCE_SUFFIXES: &[&str] = &["-broken-2", "-broken", "-wrong", "-invalid", "-error"];
const MEDIUM_CONFIDENCE_SUFFIXES: &[&str] = &["-adaptive", "-test"];

static TRAILING_DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[123]$").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// One actionable recommendation in the generated report.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub file: String,
    pub line: u32,
    pub broken_selector: String,
    pub suggested_fix: String,
    pub confidence: Confidence,
    pub context: String,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ReportStats {
    pub healed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingReport {
    pub timestamp: DateTime<Utc>,
    pub total_tests: usize,
    pub failed_selectors: usize,
    pub recommendations: Vec<Recommendation>,
    pub stats: ReportStats,
}

impl HealingReport {
    /// Merge ledger entries (authoritative) with recommendations parsed
    /// from runner output, deduplicating by broken selector.
    pub fn build(entries: &[LedgerEntry], parsed: Vec<Recommendation>) -> Self {
        let healed = entries
            .iter()
            .filter(|e| e.status == HealStatus::Healed)
            .count();

        let mut recommendations: Vec<Recommendation> = entries
            .iter()
            .map(Recommendation::from_entry)
            .collect();
        recommendations.extend(parsed);
        let mut seen = std::collections::HashSet::new();
        recommendations.retain(|rec| seen.insert(rec.broken_selector.clone()));

        let failed_selectors = recommendations.len();
        Self {
            timestamp: Utc::now(),
            total_tests: 0,
            failed_selectors,
            recommendations,
            stats: ReportStats {
                healed,
                failed: failed_selectors.saturating_sub(healed),
                skipped: 0,
            },
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Selector Healer Report\n\n");
        out.push_str(&format!("Generated: {}\n\n", self.timestamp.to_rfc3339()));
        out.push_str("## Summary\n");
        out.push_str(&format!(
            "- Total failed selectors: {}\n- Healed at run time: {}\n- Recommendations generated: {}\n",
            self.failed_selectors,
            self.stats.healed,
            self.recommendations.len()
        ));
        out.push_str("\n## Recommendations\n");

        for (index, rec) in self.recommendations.iter().enumerate() {
            out.push_str(&format!("\n### {}. {}:{}\n\n", index + 1, rec.file, rec.line));
            out.push_str(&format!("**Broken Selector:** `{}`\n", rec.broken_selector));
            out.push_str(&format!("**Suggested Fix:** `{}`\n", rec.suggested_fix));
            out.push_str(&format!(
                "**Confidence:** {}\n",
                format!("{:?}", rec.confidence).to_lowercase()
            ));
            out.push_str(&format!("**Context:** {}\n", rec.context));
        }

        out.push_str(
            "\n## How to Apply Fixes\n\n\
             Replace the broken selectors in your test files with the suggested fixes above.\n",
        );
        out
    }
}

impl Recommendation {
    fn from_entry(entry: &LedgerEntry) -> Self {
        let (suggested_fix, confidence, context) = match entry.status {
            HealStatus::Healed => (
                entry
                    .new_selector
                    .clone()
                    .unwrap_or_else(|| suggest_fix(&entry.original_selector)),
                Confidence::High,
                "Successfully healed by AI".to_string(),
            ),
            HealStatus::Failed => (
                entry
                    .new_selector
                    .clone()
                    .unwrap_or_else(|| suggest_fix(&entry.original_selector)),
                Confidence::Medium,
                "Failed to heal with AI".to_string(),
            ),
        };
        Self {
            file: entry.file.clone(),
            line: entry.line,
            broken_selector: entry.original_selector.clone(),
            suggested_fix,
            confidence,
            context,
        }
    }
}

/// Heuristic fix for a selector the model never saw: strip suffixes that
/// look like test artifacts, or fall back to a data-testid alternative.
pub fn suggest_fix(broken_selector: &str) -> String {
    for suffix in HIGH_CONFIDENCE_SUFFIXES.iter().chain(MEDIUM_CONFIDENCE_SUFFIXES) {
        if let Some(stripped) = broken_selector.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    if TRAILING_DIGIT_RE.is_match(broken_selector) {
        return broken_selector[..broken_selector.len() - 1].to_string();
    }
    if let Some(id) = broken_selector.strip_prefix('#') {
        return format!("[data-testid=\"{}\"]", id);
    }
    broken_selector.to_string()
}

pub fn confidence_for(selector: &str) -> Confidence {
    if HIGH_CONFIDENCE_SUFFIXES.iter().any(|s| selector.contains(s)) {
        return Confidence::High;
    }
    if MEDIUM_CONFIDENCE_SUFFIXES.iter().any(|s| selector.contains(s))
        || TRAILING_DIGIT_RE.is_match(selector)
    {
        return Confidence::Medium;
    }
    Confidence::Low
}

/// Write both report files, creating the output directory as needed.
pub async fn write_reports(
    project_root: &Path,
    report: &HealingReport,
) -> anyhow::Result<(PathBuf, PathBuf)> {
    let dir = project_root.join(REPORT_DIR);
    tokio::fs::create_dir_all(&dir).await?;

    let json_path = dir.join(JSON_REPORT_FILE);
    tokio::fs::write(&json_path, serde_json::to_vec_pretty(report)?).await?;

    let md_path = dir.join(MARKDOWN_REPORT_FILE);
    tokio::fs::write(&md_path, report.to_markdown()).await?;

    info!(json = %json_path.display(), markdown = %md_path.display(), "reports generated");
    Ok((json_path, md_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use healer_core_types::HealingOutcome;

    fn healed_entry(original: &str, new: &str) -> LedgerEntry {
        LedgerEntry::from_outcome(
            &HealingOutcome::healed(original, new),
            HealStatus::Healed,
            "login.spec.ts",
            12,
        )
    }

    fn failed_entry(original: &str) -> LedgerEntry {
        LedgerEntry::from_outcome(
            &HealingOutcome::failed(original, "no suggestion"),
            HealStatus::Failed,
            "auto-detected",
            0,
        )
    }

    #[test]
    fn test_suggest_fix_strips_suffixes() {
        assert_eq!(suggest_fix("#login-broken"), "#login");
        assert_eq!(suggest_fix("#submit-wrong"), "#submit");
        assert_eq!(suggest_fix(".btn-invalid"), ".btn");
    }

    #[test]
    fn test_suggest_fix_strips_trailing_digit() {
        assert_eq!(suggest_fix("#login2"), "#login");
    }

    #[test]
    fn test_suggest_fix_falls_back_to_test_id() {
        assert_eq!(suggest_fix("#login"), "[data-testid=\"login\"]");
    }

    #[test]
    fn test_suggest_fix_passthrough() {
        assert_eq!(suggest_fix(".plain"), ".plain");
    }

    #[test]
    fn test_confidence_grading() {
        assert_eq!(confidence_for("#x-broken"), Confidence::High);
        assert_eq!(confidence_for("#x-test"), Confidence::Medium);
        assert_eq!(confidence_for("#x2"), Confidence::Medium);
        assert_eq!(confidence_for("#x"), Confidence::Low);
    }

    #[test]
    fn test_report_build_counts_and_dedup() {
        let entries = vec![
            healed_entry("#a-broken", "#a"),
            failed_entry("#b-broken"),
        ];
        let parsed = vec![Recommendation {
            file: "unknown".to_string(),
            line: 0,
            broken_selector: "#a-broken".to_string(),
            suggested_fix: "#a".to_string(),
            confidence: Confidence::Medium,
            context: "Timeout waiting for element".to_string(),
        }];

        let report = HealingReport::build(&entries, parsed);
        assert_eq!(report.stats.healed, 1);
        assert_eq!(report.failed_selectors, 2);
        // "#a-broken" appears once despite the parsed duplicate.
        assert_eq!(report.recommendations.len(), 2);
    }

    #[test]
    fn test_markdown_contains_sections() {
        let report = HealingReport::build(&[healed_entry("#a-broken", "#a")], Vec::new());
        let md = report.to_markdown();
        assert!(md.contains("# Selector Healer Report"));
        assert!(md.contains("`#a-broken`"));
        assert!(md.contains("`#a`"));
        assert!(md.contains("How to Apply Fixes"));
    }

    #[test]
    fn test_json_shape() {
        let report = HealingReport::build(&[healed_entry("#a-broken", "#a")], Vec::new());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["failedSelectors"].is_number());
        assert_eq!(json["recommendations"][0]["brokenSelector"], "#a-broken");
        assert_eq!(json["stats"]["healed"], 1);
    }
}
