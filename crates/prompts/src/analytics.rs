//! Prompt performance analytics.
//!
//! Aggregation happens in SQL (see `PromptTestResultRepo`); this module turns
//! the per-version rows into a report with a best-version pick and
//! fixed-threshold recommendations.

use serde::Serialize;

use arcana_db::models::PromptVersionStats;

/// Versions with a success rate below this are flagged.
const MIN_SUCCESS_RATE: f64 = 0.9;

/// A version whose average execution time exceeds the previous version's by
/// more than this factor is flagged as a regression.
const REGRESSION_FACTOR: f64 = 1.2;

/// Aggregates based on fewer tests than this carry a low-confidence flag.
const MIN_TESTS_FOR_CONFIDENCE: i64 = 10;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Per-version aggregate as reported outward.
#[derive(Debug, Clone, Serialize)]
pub struct VersionPerformance {
    pub version: i32,
    pub total_tests: i64,
    pub avg_execution_time_ms: f64,
    pub avg_token_usage: f64,
    /// Fraction of successful tests in [0, 1].
    pub success_rate: f64,
}

/// Analytics for one template over a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub prompt_name: String,
    pub window_days: i64,
    pub versions: Vec<VersionPerformance>,
    /// Highest success rate, ties broken by lowest average execution time.
    pub best_version: Option<i32>,
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Report construction
// ---------------------------------------------------------------------------

/// Build the full report from SQL aggregates (rows ordered by version asc).
pub fn build_report(
    prompt_name: &str,
    window_days: i64,
    stats: &[PromptVersionStats],
) -> PerformanceReport {
    let versions: Vec<VersionPerformance> = stats
        .iter()
        .map(|s| VersionPerformance {
            version: s.version,
            total_tests: s.total_tests,
            avg_execution_time_ms: s.avg_execution_time_ms.unwrap_or(0.0),
            avg_token_usage: s.avg_token_usage.unwrap_or(0.0),
            success_rate: s.success_rate.unwrap_or(0.0),
        })
        .collect();

    PerformanceReport {
        prompt_name: prompt_name.to_string(),
        window_days,
        best_version: best_version(&versions),
        recommendations: build_recommendations(&versions),
        versions,
    }
}

/// Pick the best-performing version.
fn best_version(versions: &[VersionPerformance]) -> Option<i32> {
    versions
        .iter()
        .max_by(|a, b| {
            a.success_rate
                .partial_cmp(&b.success_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                // Ties: faster wins, so compare times reversed.
                .then_with(|| {
                    b.avg_execution_time_ms
                        .partial_cmp(&a.avg_execution_time_ms)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        })
        .map(|v| v.version)
}

/// Fixed-threshold recommendation rules.
fn build_recommendations(versions: &[VersionPerformance]) -> Vec<String> {
    let mut recs = Vec::new();

    for v in versions {
        if v.success_rate < MIN_SUCCESS_RATE {
            recs.push(format!(
                "Version {} success rate is {:.0}% (below {:.0}%); review recent failures",
                v.version,
                v.success_rate * 100.0,
                MIN_SUCCESS_RATE * 100.0
            ));
        }
        if v.total_tests < MIN_TESTS_FOR_CONFIDENCE {
            recs.push(format!(
                "Version {} has only {} test(s); results are low-confidence",
                v.version, v.total_tests
            ));
        }
    }

    for pair in versions.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        if prev.avg_execution_time_ms > 0.0
            && curr.avg_execution_time_ms > prev.avg_execution_time_ms * REGRESSION_FACTOR
        {
            recs.push(format!(
                "Version {} is {:.0}% slower than version {}; consider rolling back",
                curr.version,
                (curr.avg_execution_time_ms / prev.avg_execution_time_ms - 1.0) * 100.0,
                prev.version
            ));
        }
    }

    recs
}
