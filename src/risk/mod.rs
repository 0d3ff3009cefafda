// Risk scoring: pure arithmetic over context counts and commit history.
// Five factors, each banded to 0..=20 points, summed and scaled to 0..=10.

use serde::{Deserialize, Serialize};

use crate::commit::CommitSummary;
use crate::llm::RiskExplanation;
use crate::query::TargetContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactors {
    pub internal_function_count: usize,
    pub called_by_count: usize,
    pub function_size: usize,
    pub commit_count: usize,
    pub bug_commit_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub function: String,
    pub file: String,
    /// 0.00..=10.00, two decimals.
    pub risk_score: f64,
    pub risk_factors: RiskFactors,
    pub code: String,
    // A flattened None adds no keys, so reports without commentary stay flat.
    #[serde(flatten)]
    pub explanation: Option<RiskExplanation>,
}

/// Score a resolved target. `internal_count` is the count of distinct resolved
/// callees; commit counts come from the (optional) commit analysis summary.
pub fn score_target(
    target: &TargetContext,
    internal_count: usize,
    commits: Option<&CommitSummary>,
) -> RiskReport {
    let function_size = target.code.lines().count();
    let commit_count = commits.map(|s| s.total_commits).unwrap_or(0);
    let bug_commit_count = commits
        .and_then(|s| s.type_distribution.get("Bug&Error").copied())
        .unwrap_or(0);

    let total = score_internal_functions(internal_count)
        + score_called_by(target.called_by_count)
        + score_function_size(function_size)
        + score_commit_count(commit_count)
        + score_bug_commit_count(bug_commit_count);
    let risk_score = (total as f64 / 10.0 * 100.0).round() / 100.0;

    RiskReport {
        function: target.function.clone(),
        file: target.file.clone(),
        risk_score,
        risk_factors: RiskFactors {
            internal_function_count: internal_count,
            called_by_count: target.called_by_count,
            function_size,
            commit_count,
            bug_commit_count,
        },
        code: target.code.clone(),
        explanation: None,
    }
}

pub fn score_internal_functions(count: usize) -> u32 {
    match count {
        0..=1 => 0,
        2..=3 => 5,
        4..=5 => 10,
        6..=7 => 15,
        _ => 20,
    }
}

pub fn score_called_by(count: usize) -> u32 {
    match count {
        0..=1 => 0,
        2..=3 => 5,
        4..=5 => 10,
        6..=7 => 15,
        _ => 20,
    }
}

pub fn score_function_size(lines: usize) -> u32 {
    match lines {
        0..=20 => 0,
        21..=40 => 5,
        41..=60 => 10,
        61..=80 => 15,
        _ => 20,
    }
}

pub fn score_commit_count(count: usize) -> u32 {
    match count {
        0..=2 => 0,
        3..=4 => 5,
        5..=6 => 10,
        7..=9 => 15,
        _ => 20,
    }
}

pub fn score_bug_commit_count(count: usize) -> u32 {
    match count {
        0 => 0,
        1..=2 => 5,
        3..=4 => 10,
        5..=6 => 15,
        _ => 20,
    }
}
