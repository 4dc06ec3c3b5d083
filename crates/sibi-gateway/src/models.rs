//! Domain records carried through the gateway.
//!
//! Field names serialize in camelCase, matching what downstream callers see
//! in resolved results and published events.

use serde::{Deserialize, Deserializer, Serialize};

/// Sentinel ticker id meaning "every active market-data line".
pub const CANCEL_ALL: i64 = -1;

/// Order statuses after which the server sends no further updates.
pub const TERMINAL_ORDER_STATUSES: [&str; 4] = ["Filled", "Cancelled", "ApiCancelled", "Inactive"];

/// An instrument description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contract {
    pub con_id: i64,
    pub symbol: String,
    pub sec_type: String,
    pub last_trade_date_or_contract_month: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub strike: f64,
    pub right: String,
    pub multiplier: String,
    pub exchange: String,
    pub primary_exchange: String,
    pub currency: String,
    pub local_symbol: String,
    pub trading_class: String,
    pub include_expired: bool,
    pub sec_id_type: String,
    pub sec_id: String,
    pub issuer_id: String,
    pub combo_legs: Vec<ComboLeg>,
}

impl Contract {
    pub fn is_combo(&self) -> bool {
        self.sec_type == "BAG"
    }
}

/// One leg of a combo (`BAG`) contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComboLeg {
    pub con_id: i64,
    pub ratio: i64,
    pub action: String,
    pub exchange: String,
    pub open_close: i64,
    pub short_sale_slot: i64,
    pub designated_location: String,
    pub exempt_code: i64,
}

impl Default for ComboLeg {
    fn default() -> Self {
        Self {
            con_id: 0,
            ratio: 0,
            action: String::new(),
            exchange: String::new(),
            open_close: 0,
            short_sale_slot: 0,
            designated_location: String::new(),
            exempt_code: -1,
        }
    }
}

/// Order parameters. Prices left as `None` go out as unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    pub order_id: i64,
    pub client_id: i64,
    pub perm_id: i64,
    pub action: String,
    pub total_quantity: f64,
    pub order_type: String,
    pub lmt_price: Option<f64>,
    pub aux_price: Option<f64>,
    pub tif: String,
    pub oca_group: String,
    pub account: String,
    pub open_close: String,
    pub origin: i64,
    pub order_ref: String,
    pub transmit: bool,
    pub parent_id: i64,
    pub outside_rth: bool,
    pub hidden: bool,
    pub all_or_none: bool,
    pub what_if: bool,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            order_id: 0,
            client_id: 0,
            perm_id: 0,
            action: "BUY".to_string(),
            total_quantity: 0.0,
            order_type: "MKT".to_string(),
            lmt_price: None,
            aux_price: None,
            tif: String::new(),
            oca_group: String::new(),
            account: String::new(),
            open_close: String::new(),
            origin: 0,
            order_ref: String::new(),
            transmit: true,
            parent_id: 0,
            outside_rth: false,
            hidden: false,
            all_or_none: false,
            what_if: false,
        }
    }
}

/// An order status update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatus {
    pub order_id: i64,
    pub status: String,
    pub filled: f64,
    pub remaining: f64,
    pub avg_fill_price: f64,
    pub perm_id: i64,
    pub parent_id: i64,
    pub last_fill_price: f64,
    pub client_id: i64,
    pub why_held: String,
    pub mkt_cap_price: f64,
}

impl OrderStatus {
    /// True once the order can no longer change.
    pub fn is_terminal(&self) -> bool {
        TERMINAL_ORDER_STATUSES.contains(&self.status.as_str())
    }
}

/// Contract details record returned by a contract lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetails {
    pub contract: Contract,
    pub market_name: String,
    pub min_tick: f64,
    pub order_types: String,
    pub valid_exchanges: String,
    pub price_magnifier: i64,
    pub under_con_id: i64,
    pub long_name: String,
}

/// One price bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub wap: f64,
    pub bar_count: i64,
}

/// Parameters of a historical bars query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoricalDataRequest {
    pub contract: Contract,
    pub end_date_time: String,
    pub duration_str: String,
    pub bar_size_setting: String,
    pub what_to_show: String,
    pub use_rth: bool,
    pub format_date: i64,
    pub keep_up_to_date: bool,
}

impl Default for HistoricalDataRequest {
    fn default() -> Self {
        Self {
            contract: Contract::default(),
            end_date_time: String::new(),
            duration_str: "1 M".to_string(),
            bar_size_setting: "1 day".to_string(),
            what_to_show: "MIDPOINT".to_string(),
            use_rth: true,
            format_date: 1,
            keep_up_to_date: false,
        }
    }
}

/// Parameters of a live market-data subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketDataRequest {
    pub contract: Contract,
    pub generic_tick_list: String,
    pub snapshot: bool,
    pub regulatory_snapshot: bool,
}

/// Target of a market-data cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelTarget {
    /// Every registered subscription.
    All,
    /// One ticker id.
    Id(i64),
}

impl From<i64> for CancelTarget {
    fn from(value: i64) -> Self {
        if value == CANCEL_ALL {
            CancelTarget::All
        } else {
            CancelTarget::Id(value)
        }
    }
}

/// Accept a number, a numeric string, or an empty string (as 0.0).
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(f64),
        Text(String),
    }

    match Lenient::deserialize(deserializer)? {
        Lenient::Number(value) => Ok(value),
        Lenient::Text(text) if text.trim().is_empty() => Ok(0.0),
        Lenient::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
