//! Bank statement to ledger transaction matching
//!
//! Pairs each bank statement line with at most one ledger transaction using a
//! single greedy pass:
//!
//! 1. Bank lines are visited largest absolute amount first, so distinctive
//!    amounts claim their ledger rows before small, ambiguous ones compete.
//! 2. A ledger transaction is eligible only if it is unclaimed, within the date
//!    tolerance, and within the amount slack of the bank line. Anything failing
//!    the amount gate is never scored.
//! 3. Eligible rows get a [`MatchConfidence`] tier; the highest tier wins and
//!    ties keep the first row seen in ledger order.
//!
//! The matcher does no I/O and cannot fail.

use serde::{Deserialize, Serialize};

use crate::models::{BankTransaction, LedgerTransaction};
use crate::money::{format_milliunits, to_milliunits, AMOUNT_SLACK_MILLIUNITS};

/// Default date tolerance in days
pub const DEFAULT_DATE_TOLERANCE_DAYS: u32 = 3;

/// Payee similarity above which a pair counts as a similar payee
const SIMILAR_PAYEE_THRESHOLD: f64 = 0.5;

/// Confidence that a bank line and a ledger transaction are the same movement
///
/// Ordered low to high so tiers compare with `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    Low,
    Medium,
    High,
    Exact,
}

impl MatchConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Exact => "exact",
        }
    }
}

impl std::fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Matching thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Maximum days between bank and ledger dates
    pub date_tolerance_days: u32,
    /// Maximum amount difference in milliunits
    pub amount_slack: i64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            date_tolerance_days: DEFAULT_DATE_TOLERANCE_DAYS,
            amount_slack: AMOUNT_SLACK_MILLIUNITS,
        }
    }
}

impl MatchConfig {
    pub fn with_tolerance(mut self, days: u32) -> Self {
        self.date_tolerance_days = days;
        self
    }
}

/// A proposed pairing of a bank line with a ledger transaction
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub bank_transaction: BankTransaction,
    pub ledger_transaction: LedgerTransaction,
    pub confidence: MatchConfidence,
    /// Human-readable reasons, e.g. "Exact amount match"
    pub reasons: Vec<String>,
    /// Absolute amount difference in milliunits
    pub amount_difference: i64,
    pub days_apart: i64,
    pub payee_similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfidenceCounts {
    pub exact: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchSummary {
    pub total_bank: usize,
    pub total_ledger: usize,
    pub matched: usize,
    pub unmatched_bank: usize,
    pub unmatched_ledger: usize,
    /// `matched / total_bank`, 0 when there are no bank lines
    pub match_rate: f64,
    pub by_confidence: ConfidenceCounts,
}

/// Partition of the inputs into matched pairs and leftovers
///
/// Every bank line and every ledger transaction appears exactly once across
/// `matched`, `unmatched_bank`, and `unmatched_ledger`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchResult {
    pub matched: Vec<MatchCandidate>,
    pub unmatched_bank: Vec<BankTransaction>,
    pub unmatched_ledger: Vec<LedgerTransaction>,
    pub summary: MatchSummary,
}

/// Score of one eligible ledger row against the current bank line
struct Scored {
    ledger_index: usize,
    confidence: MatchConfidence,
    reasons: Vec<String>,
    amount_difference: i64,
    days_apart: i64,
    payee_similarity: f64,
}

/// Match bank statement lines against ledger transactions
///
/// `ledger` should already be limited to one account and the statement's date
/// window; the matcher does not filter by account.
pub fn match_transactions(
    bank: &[BankTransaction],
    ledger: &[LedgerTransaction],
    config: &MatchConfig,
) -> MatchResult {
    let tolerance = i64::from(config.date_tolerance_days);

    // Stable sort keeps input order among equal amounts
    let mut order: Vec<usize> = (0..bank.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(to_milliunits(bank[i].amount).unsigned_abs()));

    let mut consumed = vec![false; ledger.len()];
    let mut matched = Vec::new();
    let mut unmatched_bank = Vec::new();

    for bank_index in order {
        let bank_tx = &bank[bank_index];
        let bank_amount = to_milliunits(bank_tx.amount);
        let mut best: Option<Scored> = None;

        for (ledger_index, ledger_tx) in ledger.iter().enumerate() {
            if consumed[ledger_index] {
                continue;
            }

            let days_apart = (ledger_tx.date - bank_tx.date).num_days().abs();
            if days_apart > tolerance {
                continue;
            }

            let amount_difference = ledger_tx.amount.abs_diff(bank_amount);
            if amount_difference > config.amount_slack.max(0).unsigned_abs() {
                continue;
            }
            // Bounded by the slack, so it fits back into i64
            let amount_difference = amount_difference as i64;

            let scored = score_pair(
                bank_tx,
                ledger_tx,
                ledger_index,
                amount_difference,
                days_apart,
                tolerance,
            );

            if best
                .as_ref()
                .map_or(true, |current| scored.confidence > current.confidence)
            {
                best = Some(scored);
            }
        }

        match best {
            Some(scored) => {
                consumed[scored.ledger_index] = true;
                matched.push(MatchCandidate {
                    bank_transaction: bank_tx.clone(),
                    ledger_transaction: ledger[scored.ledger_index].clone(),
                    confidence: scored.confidence,
                    reasons: scored.reasons,
                    amount_difference: scored.amount_difference,
                    days_apart: scored.days_apart,
                    payee_similarity: scored.payee_similarity,
                });
            }
            None => unmatched_bank.push(bank_tx.clone()),
        }
    }

    let unmatched_ledger: Vec<LedgerTransaction> = ledger
        .iter()
        .zip(&consumed)
        .filter(|(_, used)| !**used)
        .map(|(tx, _)| tx.clone())
        .collect();

    let summary = summarize(&matched, bank.len(), ledger.len(), &unmatched_bank, &unmatched_ledger);

    tracing::debug!(
        matched = summary.matched,
        unmatched_bank = summary.unmatched_bank,
        unmatched_ledger = summary.unmatched_ledger,
        "Matched bank transactions"
    );

    MatchResult {
        matched,
        unmatched_bank,
        unmatched_ledger,
        summary,
    }
}

fn score_pair(
    bank_tx: &BankTransaction,
    ledger_tx: &LedgerTransaction,
    ledger_index: usize,
    amount_difference: i64,
    days_apart: i64,
    tolerance: i64,
) -> Scored {
    let exact_amount = amount_difference == 0;
    let (payee_similarity, same_payee) =
        match (bank_tx.payee.as_deref(), ledger_tx.payee_name.as_deref()) {
            (Some(bank_payee), Some(ledger_payee)) => (
                payee_similarity(bank_payee, ledger_payee),
                fold_payee(bank_payee) == fold_payee(ledger_payee),
            ),
            _ => (0.0, false),
        };

    let mut reasons = Vec::new();
    if exact_amount {
        reasons.push("Exact amount match".to_string());
    } else {
        reasons.push(format!(
            "Amount within ${}",
            format_milliunits(amount_difference)
        ));
    }

    if days_apart == 0 {
        reasons.push("Same date".to_string());
    } else {
        reasons.push(format!(
            "Date within {} day{}",
            days_apart,
            if days_apart == 1 { "" } else { "s" }
        ));
    }

    if same_payee {
        reasons.push("Exact payee match".to_string());
    } else if payee_similarity > SIMILAR_PAYEE_THRESHOLD {
        reasons.push("Similar payee name".to_string());
    }

    let confidence = if exact_amount && days_apart == 0 && payee_similarity >= 1.0 {
        MatchConfidence::Exact
    } else if exact_amount && days_apart <= 1 && payee_similarity > SIMILAR_PAYEE_THRESHOLD {
        MatchConfidence::High
    } else if exact_amount && days_apart <= tolerance {
        MatchConfidence::Medium
    } else {
        MatchConfidence::Low
    };

    Scored {
        ledger_index,
        confidence,
        reasons,
        amount_difference,
        days_apart,
        payee_similarity,
    }
}

/// Similarity of two payee strings in [0, 1]
///
/// Identical after trimming and case folding scores 1.0. Otherwise the score
/// is the fraction of whitespace tokens in the shorter string that appear in,
/// or contain, some token of the longer string.
pub fn payee_similarity(a: &str, b: &str) -> f64 {
    let a = fold_payee(a);
    let b = fold_payee(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let shorter_tokens: Vec<&str> = shorter.split_whitespace().collect();
    let longer_tokens: Vec<&str> = longer.split_whitespace().collect();

    if shorter_tokens.is_empty() {
        return 0.0;
    }

    let hits = shorter_tokens
        .iter()
        .filter(|token| {
            longer_tokens
                .iter()
                .any(|other| other.contains(*token) || token.contains(other))
        })
        .count();

    hits as f64 / shorter_tokens.len() as f64
}

fn fold_payee(payee: &str) -> String {
    payee.trim().to_lowercase()
}

fn summarize(
    matched: &[MatchCandidate],
    total_bank: usize,
    total_ledger: usize,
    unmatched_bank: &[BankTransaction],
    unmatched_ledger: &[LedgerTransaction],
) -> MatchSummary {
    let mut by_confidence = ConfidenceCounts::default();
    for candidate in matched {
        match candidate.confidence {
            MatchConfidence::Exact => by_confidence.exact += 1,
            MatchConfidence::High => by_confidence.high += 1,
            MatchConfidence::Medium => by_confidence.medium += 1,
            MatchConfidence::Low => by_confidence.low += 1,
        }
    }

    let match_rate = if total_bank == 0 {
        0.0
    } else {
        matched.len() as f64 / total_bank as f64
    };

    MatchSummary {
        total_bank,
        total_ledger,
        matched: matched.len(),
        unmatched_bank: unmatched_bank.len(),
        unmatched_ledger: unmatched_ledger.len(),
        match_rate,
        by_confidence,
    }
}
