//! Transaction Normalizer - Provider Record Canonicalization
//!
//! Pure mapping from one provider-native transaction record to the
//! canonical [`NormalizedTransaction`] shape. Provider payloads are messy:
//! fields go missing, amounts arrive as strings, token transfers report
//! their destination in a secondary field. One malformed record must never
//! block detection of the others in the same page, so unparseable fields
//! degrade to sentinel values instead of erroring.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{NormalizedTransaction, UNKNOWN, from_base_units};
use crate::ports::rpc_gateway::ProviderTxRecord;

/// Map a provider record into the canonical transaction shape.
///
/// Never fails and never panics. Missing destination falls back to the
/// record's `contract_address`; a missing or unparseable amount degrades to
/// zero; a missing hash degrades to [`UNKNOWN`]; a missing success flag is
/// treated as not-successful, so the record can never be credited.
pub fn normalize(record: &ProviderTxRecord, decimals: u32) -> NormalizedTransaction {
  let hash = field_or_unknown(record.txid.as_deref());
  let from = field_or_unknown(record.from.as_deref());

  // Token transfers report the receiving account in contract_address
  let to = record
    .to
    .as_deref()
    .filter(|s| !s.trim().is_empty())
    .or(record.contract_address.as_deref())
    .filter(|s| !s.trim().is_empty())
    .unwrap_or(UNKNOWN)
    .to_string();

  let amount = record
    .value
    .as_deref()
    .and_then(|v| v.trim().parse::<u128>().ok())
    .map_or(Decimal::ZERO, |raw| from_base_units(raw, decimals));

  let timestamp = record
    .timestamp_ms
    .and_then(DateTime::from_timestamp_millis)
    .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);

  NormalizedTransaction {
    hash,
    from,
    to,
    amount,
    timestamp,
    succeeded: record.confirmed.unwrap_or(false),
  }
}

fn field_or_unknown(value: Option<&str>) -> String {
  value
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .unwrap_or(UNKNOWN)
    .to_string()
}
