//! Property-Based Tests — Normalizer and Amount Conversion Invariants
//!
//! Uses `proptest` to verify that normalization is total over arbitrary
//! provider payloads and that base-unit conversion round-trips exactly.

use proptest::prelude::*;
use rust_decimal::Decimal;

use chain_connector::domain::{from_base_units, to_base_units};
use chain_connector::ports::rpc_gateway::ProviderTxRecord;
use chain_connector::usecases::normalizer::normalize;

// ── Normalizer Properties ───────────────────────────────────

proptest! {
    /// Any provider record, however malformed, normalizes without panicking
    /// and lands on sentinel values rather than empty fields.
    #[test]
    fn normalize_is_total_over_arbitrary_records(
        txid in proptest::option::of(".*"),
        from in proptest::option::of(".*"),
        to in proptest::option::of(".*"),
        contract_address in proptest::option::of(".*"),
        value in proptest::option::of(".*"),
        timestamp_ms in proptest::option::of(any::<i64>()),
        confirmed in proptest::option::of(any::<bool>()),
        memo in proptest::option::of(".*"),
        decimals in 0u32..=28,
    ) {
        let record = ProviderTxRecord {
            txid,
            from,
            to,
            contract_address,
            value,
            timestamp_ms,
            confirmed,
            memo,
        };
        let tx = normalize(&record, decimals);

        prop_assert!(!tx.hash.is_empty());
        prop_assert!(!tx.from.is_empty());
        prop_assert!(!tx.to.is_empty());
        prop_assert!(tx.amount >= Decimal::ZERO, "amount must never be negative");
        // A record without a positive success flag can never be credited.
        prop_assert_eq!(tx.succeeded, record.confirmed.unwrap_or(false));
    }

    /// Well-formed numeric value strings convert exactly.
    #[test]
    fn normalize_parses_numeric_values_exactly(
        raw in any::<u64>(),
        decimals in 0u32..=12,
    ) {
        let record = ProviderTxRecord {
            txid: Some("hash".to_string()),
            to: Some("dest".to_string()),
            value: Some(raw.to_string()),
            confirmed: Some(true),
            ..ProviderTxRecord::default()
        };
        let tx = normalize(&record, decimals);
        prop_assert_eq!(tx.amount, from_base_units(u128::from(raw), decimals));
    }
}

// ── Amount Conversion Properties ────────────────────────────

proptest! {
    /// Base units → decimal → base units is the identity for amounts that
    /// fit the decimal representation.
    #[test]
    fn base_unit_conversion_round_trips(
        raw in any::<u64>(),
        decimals in 0u32..=12,
    ) {
        let amount = from_base_units(u128::from(raw), decimals);
        prop_assert_eq!(to_base_units(amount, decimals), Some(u128::from(raw)));
    }

    /// Negative decimal amounts are never representable in base units.
    #[test]
    fn negative_amounts_have_no_base_unit_form(
        raw in 1u64..,
        decimals in 0u32..=12,
    ) {
        let amount = -from_base_units(u128::from(raw), decimals);
        prop_assert_eq!(to_base_units(amount, decimals), None);
    }
}
