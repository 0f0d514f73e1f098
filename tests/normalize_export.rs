use std::str::FromStr;

use anyhow::Result;
use chrono::NaiveDate;
use money_monitor::models::PeriodKey;
use money_monitor::normalize::{TransactionNormalizer, TranslationTable};
use money_monitor::summary::{available_periods, summarize_month};
use money_monitor::ScrapeError;
use rust_decimal::Decimal;

mod support;
use support::fixture;

#[test]
fn sample_export_normalizes_transactions_only() -> Result<()> {
    let records = TransactionNormalizer::default().normalize_file(&fixture("max-sample.xlsx"))?;

    assert_eq!(records.len(), 5);

    let first = &records[0];
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 4, 3).unwrap());
    assert_eq!(first.business, "טיב טעם רשתות  רחובות");
    assert_eq!(first.business_translated, "Tiv Taam");
    assert_eq!(first.category_translated, "Groceries");
    assert_eq!(first.card.as_deref(), Some("2711"));
    assert_eq!(first.amount, Decimal::from_str("250.1")?);

    let unknown = records
        .iter()
        .find(|r| r.business == "חנות חדשה")
        .expect("row without card");
    assert_eq!(unknown.business_translated, "חנות חדשה");
    assert_eq!(unknown.category, "");
    assert_eq!(unknown.card, None);

    assert!(records.iter().all(|r| !r.business.contains("כל העסקאות")));
    Ok(())
}

#[test]
fn sample_export_summarizes_by_month() -> Result<()> {
    let records = TransactionNormalizer::default().normalize_file(&fixture("max-sample.xlsx"))?;

    let periods: Vec<String> = available_periods(&records)
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(periods, vec!["2025-03", "2025-04"]);

    let april = summarize_month(&records, PeriodKey::from_str("2025-04")?, 20);
    assert_eq!(april.transaction_count, 4);
    assert_eq!(april.total, Decimal::from_str("680.0")?);
    assert_eq!(april.by_category[0].key, "Fuel, Electricity & Gas");
    assert_eq!(april.by_card.last().and_then(|c| c.card.clone()), None);
    Ok(())
}

#[test]
fn normalizing_twice_gives_identical_records() -> Result<()> {
    let normalizer = TransactionNormalizer::default();
    let path = fixture("max-sample.xlsx");
    assert_eq!(normalizer.normalize_file(&path)?, normalizer.normalize_file(&path)?);
    Ok(())
}

#[test]
fn untranslated_normalizer_keeps_hebrew_names() -> Result<()> {
    let normalizer = TransactionNormalizer::new(TranslationTable::empty());
    let records = normalizer.normalize_file(&fixture("max-sample.xlsx"))?;
    assert_eq!(records[0].business_translated, records[0].business);
    assert_eq!(records[0].category_translated, "מזון וצריכה");
    Ok(())
}

#[test]
fn missing_file_is_a_parse_error() {
    let err = TransactionNormalizer::default()
        .normalize_file(&fixture("does-not-exist.xlsx"))
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Parse { .. }));
}
