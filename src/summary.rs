//! Monthly aggregates over normalized transactions.
//!
//! Every view is computed for a single [`PeriodKey`]; records outside it are
//! ignored. Breakdowns are ordered by descending total, ties by key.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{PeriodKey, TransactionRecord};

/// Number of merchants listed unless the caller asks otherwise.
pub const DEFAULT_TOP_MERCHANTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: Decimal,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownEntry {
    pub key: String,
    pub total: Decimal,
    pub transaction_count: usize,
}

/// Spending on one card. `card` is `None` for rows whose export left the
/// card column blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardTotal {
    pub card: Option<String>,
    pub total: Decimal,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub period: PeriodKey,
    pub total: Decimal,
    pub transaction_count: usize,
    pub daily: Vec<DailyTotal>,
    pub by_category: Vec<BreakdownEntry>,
    pub top_merchants: Vec<BreakdownEntry>,
    pub by_card: Vec<CardTotal>,
}

/// Distinct months present in `records`, oldest first.
pub fn available_periods(records: &[TransactionRecord]) -> Vec<PeriodKey> {
    records
        .iter()
        .map(TransactionRecord::period)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Most recent month present in `records`.
pub fn latest_period(records: &[TransactionRecord]) -> Option<PeriodKey> {
    records.iter().map(TransactionRecord::period).max()
}

pub fn summarize_month(
    records: &[TransactionRecord],
    period: PeriodKey,
    top_merchants: usize,
) -> MonthlySummary {
    let in_month: Vec<&TransactionRecord> =
        records.iter().filter(|r| period.contains(r.date)).collect();

    let mut daily: BTreeMap<NaiveDate, (Decimal, usize)> = BTreeMap::new();
    let mut categories: HashMap<&str, (Decimal, usize)> = HashMap::new();
    let mut merchants: HashMap<&str, (Decimal, usize)> = HashMap::new();
    let mut cards: HashMap<Option<&str>, (Decimal, usize)> = HashMap::new();
    let mut total = Decimal::ZERO;

    for record in &in_month {
        total += record.amount;
        add(daily.entry(record.date).or_default(), record.amount);
        add(
            categories
                .entry(record.category_translated.as_str())
                .or_default(),
            record.amount,
        );
        add(
            merchants
                .entry(record.business_translated.as_str())
                .or_default(),
            record.amount,
        );
        add(cards.entry(record.card.as_deref()).or_default(), record.amount);
    }

    let mut top = ranked(into_entries(merchants));
    top.truncate(top_merchants);

    let mut by_card: Vec<CardTotal> = cards
        .into_iter()
        .map(|(card, (total, transaction_count))| CardTotal {
            card: card.map(str::to_string),
            total,
            transaction_count,
        })
        .collect();
    by_card.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.card.cmp(&b.card)));

    MonthlySummary {
        period,
        total,
        transaction_count: in_month.len(),
        daily: daily
            .into_iter()
            .map(|(date, (total, transaction_count))| DailyTotal {
                date,
                total,
                transaction_count,
            })
            .collect(),
        by_category: ranked(into_entries(categories)),
        top_merchants: top,
        by_card,
    }
}

fn add(slot: &mut (Decimal, usize), amount: Decimal) {
    slot.0 += amount;
    slot.1 += 1;
}

fn into_entries(totals: HashMap<&str, (Decimal, usize)>) -> Vec<BreakdownEntry> {
    totals
        .into_iter()
        .map(|(key, (total, transaction_count))| BreakdownEntry {
            key: key.to_string(),
            total,
            transaction_count,
        })
        .collect()
}

fn ranked(mut entries: Vec<BreakdownEntry>) -> Vec<BreakdownEntry> {
    entries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)));
    entries
}
