//! Bank statement import
//!
//! Statements arrive as CSV exports or as a JSON array. CSV columns are
//! located by header name so most bank exports work without a per-bank parser.

use std::io::Read;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::BankTransaction;

const DATE_HEADERS: &[&str] = &["date", "transaction date", "posted date", "post date"];
const PAYEE_HEADERS: &[&str] = &["payee", "description", "merchant", "name"];

/// Where each field lives in a statement row
#[derive(Debug)]
struct ColumnMap {
    date: usize,
    amount: AmountColumns,
    payee: Option<usize>,
    memo: Option<usize>,
}

#[derive(Debug)]
enum AmountColumns {
    Signed(usize),
    DebitCredit { debit: usize, credit: usize },
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |names: &[&str]| {
            names.iter().find_map(|name| {
                headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(name))
            })
        };

        let date = find(DATE_HEADERS)
            .ok_or_else(|| Error::Import("Statement has no date column".into()))?;

        let amount = match (find(&["amount"]), find(&["debit"]), find(&["credit"])) {
            (Some(column), _, _) => AmountColumns::Signed(column),
            (None, Some(debit), Some(credit)) => AmountColumns::DebitCredit { debit, credit },
            _ => {
                return Err(Error::Import(
                    "Statement needs an amount column or debit and credit columns".into(),
                ))
            }
        };

        Ok(Self {
            date,
            amount,
            payee: find(PAYEE_HEADERS),
            memo: find(&["memo", "notes"]),
        })
    }
}

/// Parse a CSV statement with a header row
pub fn parse_statement_csv<R: Read>(reader: R) -> Result<Vec<BankTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(rdr.headers()?)?;
    let mut transactions = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1
        let line = index + 2;

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let date = parse_date(record.get(columns.date).unwrap_or(""))
            .map_err(|e| Error::Import(format!("Row {}: {}", line, e)))?;

        let amount = match columns.amount {
            AmountColumns::Signed(column) => parse_amount(record.get(column).unwrap_or("")),
            AmountColumns::DebitCredit { debit, credit } => {
                let debit = record.get(debit).unwrap_or("");
                let credit = record.get(credit).unwrap_or("");
                if !debit.is_empty() {
                    parse_amount(debit).map(|a| -a.abs())
                } else if !credit.is_empty() {
                    parse_amount(credit).map(f64::abs)
                } else {
                    Err("no debit or credit amount".to_string())
                }
            }
        }
        .map_err(|e| Error::Import(format!("Row {}: {}", line, e)))?;

        let text = |column: Option<usize>| {
            column
                .and_then(|c| record.get(c))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        transactions.push(BankTransaction {
            date,
            amount,
            payee: text(columns.payee),
            memo: text(columns.memo),
        });
    }

    debug!(count = transactions.len(), "Parsed CSV statement");
    Ok(transactions)
}

/// Parse a JSON array of statement lines
pub fn parse_statement_json(content: &str) -> Result<Vec<BankTransaction>> {
    let transactions: Vec<BankTransaction> = serde_json::from_str(content)?;
    debug!(count = transactions.len(), "Parsed JSON statement");
    Ok(transactions)
}

/// Parse a statement date (ISO or US format)
pub fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    Err(format!("unable to parse date '{}'", s))
}

/// Parse an amount, handling currency symbols, commas and accounting negatives
fn parse_amount(s: &str) -> std::result::Result<f64, String> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite())
        .ok_or_else(|| format!("unable to parse amount '{}'", s))
}
