pub mod deposit;
pub mod funding;
pub mod insurance;
pub mod liquidation;
pub mod lp;
pub mod precision;
pub mod settle_pnl;
pub mod trade;

use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::catalog::MarketCatalog;
use crate::error::Error;
use crate::partition::{NaturalKey, PartitionTarget};
use crate::types::EventMetadata;

pub use deposit::DepositRecord;
pub use funding::{FundingPaymentRecord, FundingRateRecord};
pub use insurance::{InsuranceFundRecord, InsuranceFundStakeRecord};
pub use liquidation::LiquidationRecord;
pub use lp::LpRecord;
pub use settle_pnl::SettlePnlRecord;
pub use trade::TradeRecord;

pub const DRIFT_PROGRAM_ID: &str = "dRiftyHA39MWEi3m9aunc5MzRF1JYuBsbn6VPcn33UH";

/// The archived event kinds, named as the program IDL names them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
    strum_macros::VariantNames,
)]
pub enum EventKind {
    OrderActionRecord,
    SettlePnlRecord,
    DepositRecord,
    InsuranceFundRecord,
    InsuranceFundStakeRecord,
    LiquidationRecord,
    LPRecord,
    FundingRateRecord,
    FundingPaymentRecord,
}

impl EventKind {
    pub const ALL: [Self; 9] = [
        Self::OrderActionRecord,
        Self::SettlePnlRecord,
        Self::DepositRecord,
        Self::InsuranceFundRecord,
        Self::InsuranceFundStakeRecord,
        Self::LiquidationRecord,
        Self::LPRecord,
        Self::FundingRateRecord,
        Self::FundingPaymentRecord,
    ];

    pub fn from_event_type(event_type: &str) -> Option<Self> {
        Self::from_str(event_type).ok()
    }

    /// Collection segment of the partition key.
    pub fn collection(self) -> &'static str {
        match self {
            Self::OrderActionRecord => "tradeRecords",
            Self::SettlePnlRecord => "settlePnlRecords",
            Self::DepositRecord => "depositRecords",
            Self::InsuranceFundRecord => "insuranceFundRecords",
            Self::InsuranceFundStakeRecord => "insuranceFundStakeRecords",
            Self::LiquidationRecord => "liquidationRecords",
            Self::LPRecord => "lpRecord",
            Self::FundingRateRecord => "fundingRateRecords",
            Self::FundingPaymentRecord => "fundingPaymentRecords",
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MarketType {
    Perp,
    Spot,
}

impl Serialize for MarketType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_ref())
    }
}

/// One decoded, human-scaled event. Serializes as the flat row of the
/// variant it holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventRecord {
    Trade(TradeRecord),
    SettlePnl(SettlePnlRecord),
    Deposit(DepositRecord),
    InsuranceFund(InsuranceFundRecord),
    InsuranceFundStake(InsuranceFundStakeRecord),
    Liquidation(LiquidationRecord),
    Lp(LpRecord),
    FundingRate(FundingRateRecord),
    FundingPayment(FundingPaymentRecord),
}

impl EventRecord {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Trade(_) => EventKind::OrderActionRecord,
            Self::SettlePnl(_) => EventKind::SettlePnlRecord,
            Self::Deposit(_) => EventKind::DepositRecord,
            Self::InsuranceFund(_) => EventKind::InsuranceFundRecord,
            Self::InsuranceFundStake(_) => EventKind::InsuranceFundStakeRecord,
            Self::Liquidation(_) => EventKind::LiquidationRecord,
            Self::Lp(_) => EventKind::LPRecord,
            Self::FundingRate(_) => EventKind::FundingRateRecord,
            Self::FundingPayment(_) => EventKind::FundingPaymentRecord,
        }
    }

    pub fn tx_sig(&self) -> &str {
        match self {
            Self::Trade(r) => &r.tx_sig,
            Self::SettlePnl(r) => &r.tx_sig,
            Self::Deposit(r) => &r.tx_sig,
            Self::InsuranceFund(r) => &r.tx_sig,
            Self::InsuranceFundStake(r) => &r.tx_sig,
            Self::Liquidation(r) => &r.tx_sig,
            Self::Lp(r) => &r.tx_sig,
            Self::FundingRate(r) => &r.tx_sig,
            Self::FundingPayment(r) => &r.tx_sig,
        }
    }

    pub fn slot(&self) -> u64 {
        match self {
            Self::Trade(r) => r.slot,
            Self::SettlePnl(r) => r.slot,
            Self::Deposit(r) => r.slot,
            Self::InsuranceFund(r) => r.slot,
            Self::InsuranceFundStake(r) => r.slot,
            Self::Liquidation(r) => r.slot,
            Self::Lp(r) => r.slot,
            Self::FundingRate(r) => r.slot,
            Self::FundingPayment(r) => r.slot,
        }
    }

    /// Fields that define logical identity for deduplication.
    pub fn natural_key(&self) -> NaturalKey {
        match self {
            Self::Trade(r) => r.natural_key(),
            Self::SettlePnl(r) => r.natural_key(),
            Self::Deposit(r) => r.natural_key(),
            Self::InsuranceFund(r) => r.natural_key(),
            Self::InsuranceFundStake(r) => r.natural_key(),
            Self::Liquidation(r) => r.natural_key(),
            Self::Lp(r) => r.natural_key(),
            Self::FundingRate(r) => r.natural_key(),
            Self::FundingPayment(r) => r.natural_key(),
        }
    }

    /// Entity partitions this record fans out to.
    pub fn partition_targets(
        &self,
        catalog: &MarketCatalog,
    ) -> Result<Vec<PartitionTarget>, Error> {
        match self {
            Self::Trade(r) => r.partition_targets(catalog),
            Self::SettlePnl(r) => Ok(r.partition_targets()),
            Self::Deposit(r) => Ok(r.partition_targets()),
            Self::InsuranceFund(r) => r.partition_targets(catalog),
            Self::InsuranceFundStake(r) => Ok(r.partition_targets()),
            Self::Liquidation(r) => Ok(r.partition_targets()),
            Self::Lp(r) => Ok(r.partition_targets()),
            Self::FundingRate(r) => r.partition_targets(catalog),
            Self::FundingPayment(r) => Ok(r.partition_targets()),
        }
    }
}

/// Turns decoded program events into typed records.
///
/// Holds the only state decoding needs: the frozen market catalog and the
/// program id stamped on every row.
#[derive(Clone)]
pub struct EventDecoder {
    catalog: Arc<MarketCatalog>,
    program_id: Arc<str>,
}

impl EventDecoder {
    pub fn new(catalog: Arc<MarketCatalog>, program_id: impl Into<Arc<str>>) -> Self {
        Self {
            catalog,
            program_id: program_id.into(),
        }
    }

    pub fn catalog(&self) -> &MarketCatalog {
        &self.catalog
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    /// Decodes one event by name. Unknown names are `UnsupportedEventKind`.
    pub fn decode_named(
        &self,
        name: &str,
        data: &Value,
        meta: &EventMetadata,
    ) -> Result<EventRecord, Error> {
        let kind = EventKind::from_event_type(name)
            .ok_or_else(|| Error::UnsupportedEventKind(name.to_string()))?;
        self.decode(kind, data, meta)
    }

    pub fn decode(
        &self,
        kind: EventKind,
        data: &Value,
        meta: &EventMetadata,
    ) -> Result<EventRecord, Error> {
        let ctx = DecodeContext {
            catalog: &self.catalog,
            meta,
            program_id: &self.program_id,
        };
        let record = match kind {
            EventKind::OrderActionRecord => {
                EventRecord::Trade(trade::decode(parse(kind, data)?, &ctx)?)
            }
            EventKind::SettlePnlRecord => {
                EventRecord::SettlePnl(settle_pnl::decode(parse(kind, data)?, &ctx))
            }
            EventKind::DepositRecord => {
                EventRecord::Deposit(deposit::decode(parse(kind, data)?, &ctx)?)
            }
            EventKind::InsuranceFundRecord => {
                EventRecord::InsuranceFund(insurance::decode_fund(parse(kind, data)?, &ctx)?)
            }
            EventKind::InsuranceFundStakeRecord => EventRecord::InsuranceFundStake(
                insurance::decode_stake(parse(kind, data)?, &ctx)?,
            ),
            EventKind::LiquidationRecord => {
                EventRecord::Liquidation(liquidation::decode(parse(kind, data)?, &ctx)?)
            }
            EventKind::LPRecord => EventRecord::Lp(lp::decode(parse(kind, data)?, &ctx)),
            EventKind::FundingRateRecord => {
                EventRecord::FundingRate(funding::decode_rate(parse(kind, data)?, &ctx))
            }
            EventKind::FundingPaymentRecord => {
                EventRecord::FundingPayment(funding::decode_payment(parse(kind, data)?, &ctx))
            }
        };
        Ok(record)
    }
}

pub(crate) struct DecodeContext<'a> {
    pub catalog: &'a MarketCatalog,
    pub meta: &'a EventMetadata,
    pub program_id: &'a str,
}

fn parse<T: DeserializeOwned>(kind: EventKind, data: &Value) -> Result<T, Error> {
    T::deserialize(data).map_err(|e| Error::Protocol {
        reason: format!("failed to parse {kind} payload: {e}"),
    })
}

/// Whether an `OrderActionRecord` payload describes a fill. Accepts both the
/// indexer's `"Fill"` string and the decoder's `{"Fill": ..}` shape.
pub fn is_fill_action(action: Option<&Value>) -> bool {
    action.and_then(variant_name) == Some("Fill")
}

/// Name of an enum value: either the string itself or the single key of a
/// `{"Variant": {..}}` wrapper.
pub fn variant_name(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(obj) if obj.len() == 1 => obj.keys().next().map(String::as_str),
        _ => None,
    }
}

/// `OrderFilledWithAMM` -> `orderFilledWithAmm`: split on lower→upper
/// boundaries, lowercase the first word, capitalize the rest.
pub fn camel_case(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if prev_lower && ch.is_ascii_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_ascii_lowercase();
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }

    let mut out = String::with_capacity(name.len());
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(&word.to_lowercase());
        } else {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
                out.push_str(&chars.as_str().to_lowercase());
            }
        }
    }
    out
}

/// Convert a JSON value to a base58 pubkey string.
/// Handles both byte arrays (`[u8; 32]`) and direct strings.
pub fn value_to_pubkey(value: &Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    let arr = value.as_array()?;
    let bytes: Vec<u8> = arr
        .iter()
        .filter_map(|v| v.as_u64().map(|n| n as u8))
        .collect();
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    Some(solana_pubkey::Pubkey::new_from_array(bytes).to_string())
}

// serde field adapters shared by the per-kind payload structs

/// Raw integer amount; missing or null reads as zero.
pub(crate) fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// Enum field rendered camelCase; missing reads as empty.
pub(crate) fn enum_camel<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value
        .as_ref()
        .and_then(variant_name)
        .map(camel_case)
        .unwrap_or_default())
}

pub(crate) fn market_type<'de, D: Deserializer<'de>>(d: D) -> Result<MarketType, D::Error> {
    let value = Value::deserialize(d)?;
    let name = variant_name(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid market type: {value}")))?;
    MarketType::from_str(name)
        .map_err(|_| serde::de::Error::custom(format!("unknown market type: {name}")))
}

pub(crate) fn pubkey<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(value_to_pubkey))
}
