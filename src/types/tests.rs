use super::{AccountNumber, Monetary, ReferenceError, TransactionReference};
use anyhow::Result;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;

#[test]
fn test_monetary_successfully_parses_valid_strings() -> Result<()> {
    let test_cases = vec![
        ("1.0", "1.00"),
        ("1.12", "1.12"),
        ("0.01", "0.01"),
        ("-1.5", "-1.50"),
        ("  1.0  ", "1.00"),
        ("100", "100.00"),
        ("25.500", "25.50"),
    ];

    for (input_string, expected_output) in test_cases {
        assert_eq!(Monetary::from_str(input_string)?.to_string(), expected_output);
    }

    Ok(())
}

#[test]
fn test_monetary_fails_to_parse_invalid_strings() {
    assert!(Monetary::from_str("1.123").is_err());
    assert!(Monetary::from_str("abc").is_err());
    assert!(Monetary::from_str("1.2.3").is_err());
    assert!(Monetary::from_str("").is_err());
    assert!(Monetary::from_str("   ").is_err());
}

#[test]
fn test_monetary_supports_checked_addition_and_subtraction() -> Result<()> {
    let balance = Monetary::from_str("100.00")?;
    let amount = Monetary::from_str("30.25")?;

    assert_eq!(balance.checked_sub(amount).map(|v| v.to_string()), Some("69.75".to_string()));
    assert_eq!(balance.checked_add(amount).map(|v| v.to_string()), Some("130.25".to_string()));

    Ok(())
}

#[test]
fn test_monetary_reports_overflow_instead_of_wrapping() -> Result<()> {
    let maximum = Monetary::try_from(Decimal::MAX.trunc())?;

    assert!(maximum.checked_add(Monetary::from_str("1.00")?).is_none());

    Ok(())
}

#[test]
fn test_monetary_sign_predicates() -> Result<()> {
    assert!(Monetary::zero().is_zero());
    assert!(!Monetary::zero().is_positive());
    assert!(!Monetary::zero().is_negative());
    assert!(Monetary::from_str("0.01")?.is_positive());
    assert!(Monetary::from_str("-0.01")?.is_negative());

    Ok(())
}

#[test]
fn test_generated_references_are_well_formed_and_distinct() -> Result<()> {
    let mut seen = HashSet::new();

    for _ in 0..1_000 {
        let reference = TransactionReference::generate();

        assert!(reference.as_str().starts_with("TXN-"));
        assert_eq!(reference.as_str().len(), 16);
        assert_eq!(TransactionReference::from_str(reference.as_str())?, reference);

        seen.insert(reference);
    }

    assert_eq!(seen.len(), 1_000);

    Ok(())
}

#[test]
fn test_caller_references_are_validated() {
    assert_eq!(TransactionReference::from_str(""), Err(ReferenceError::Empty));
    assert!(matches!(TransactionReference::from_str(&"a".repeat(65)), Err(ReferenceError::TooLong { .. })));
    assert!(matches!(TransactionReference::from_str("has space"), Err(ReferenceError::InvalidCharacters(_))));
    assert!(TransactionReference::from_str("client-retry_42").is_ok());
}

#[test]
fn test_account_numbers_are_prefixed_and_zero_padded() -> Result<()> {
    assert_eq!(AccountNumber::new(42).as_str(), "WB0000000042");
    assert_eq!(AccountNumber::from_str(" wb0000000042 ")?, AccountNumber::new(42));

    let generated = AccountNumber::generate();
    assert_eq!(AccountNumber::from_str(generated.as_str())?, generated);

    assert!(AccountNumber::from_str("WB42").is_err());
    assert!(AccountNumber::from_str("XX0000000042").is_err());
    assert!(AccountNumber::from_str("WB00000000A2").is_err());

    Ok(())
}
