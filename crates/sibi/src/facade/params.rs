//! Flat request params mapped onto gateway records.
//!
//! Params are one flat object per call, mixing contract and request or order
//! fields (`{"symbol": "AAPL", "orderType": "LMT", "limitPrice": 101.5}`).
//! Each method fills in its own defaults before the object is read into the
//! typed records, so any contract field (`conId`, `comboLegs`, ...) can be
//! given.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use sibi_gateway::{
    CancelTarget, Channel, Contract, HistoricalDataRequest, MarketDataRequest, Order, CANCEL_ALL,
};

use super::error::{FacadeError, Result};

/// Params as an object, `null` counting as empty.
fn object(params: Value) -> Result<Map<String, Value>> {
    match params {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(FacadeError::InvalidParams(format!(
            "params must be an object, got {other}"
        ))),
    }
}

/// `params` laid over `defaults`.
fn with_defaults(params: Value, defaults: Value) -> Result<Map<String, Value>> {
    let mut merged = object(defaults)?;
    merged.extend(object(params)?);
    Ok(merged)
}

fn read<T: DeserializeOwned>(map: &Map<String, Value>) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(map.clone()))?)
}

/// Move `from` to `to` unless `to` is already set.
fn rename(map: &mut Map<String, Value>, from: &str, to: &str) {
    if let Some(value) = map.remove(from) {
        map.entry(to.to_string()).or_insert(value);
    }
}

/// Accept `0`/`1` where a boolean is expected.
fn coerce_bool(map: &mut Map<String, Value>, key: &str) {
    if let Some(value) = map.get_mut(key) {
        if let Some(number) = value.as_i64() {
            *value = Value::Bool(number != 0);
        }
    }
}

fn required_i64(map: &Map<String, Value>, key: &str) -> Result<i64> {
    match map.get(key) {
        Some(value) => value
            .as_i64()
            .ok_or_else(|| FacadeError::InvalidParams(format!("'{key}' must be an integer"))),
        None => Err(FacadeError::InvalidParams(format!("missing '{key}'"))),
    }
}

pub(crate) fn contract_details(params: Value) -> Result<Contract> {
    let map = with_defaults(
        params,
        json!({ "secType": "STK", "currency": "USD", "exchange": "SMART" }),
    )?;
    let mut contract: Contract = read(&map)?;
    contract.include_expired = false;
    Ok(contract)
}

pub(crate) fn historical_data(params: Value) -> Result<HistoricalDataRequest> {
    let mut map = object(params)?;
    rename(&mut map, "useRTH", "useRth");
    coerce_bool(&mut map, "useRth");
    coerce_bool(&mut map, "keepUpToDate");
    // a nested "contract" would shadow the flat contract fields
    map.remove("contract");

    let contract: Contract = read(&map)?;
    let mut request: HistoricalDataRequest = read(&map)?;
    request.contract = contract;
    Ok(request)
}

pub(crate) fn mkt_data(params: Value) -> Result<MarketDataRequest> {
    let mut map = object(params)?;
    coerce_bool(&mut map, "snapshot");
    coerce_bool(&mut map, "regulatorySnapshot");
    map.remove("contract");

    let mut contract: Contract = read(&map)?;
    contract.include_expired = false;
    let mut request: MarketDataRequest = read(&map)?;
    request.contract = contract;
    Ok(request)
}

pub(crate) fn cancel_mkt_data(params: Value) -> Result<CancelTarget> {
    let map = with_defaults(params, json!({ "tickerId": CANCEL_ALL }))?;
    Ok(required_i64(&map, "tickerId")?.into())
}

pub(crate) fn place_order(params: Value) -> Result<(Contract, Order)> {
    let mut map = with_defaults(
        params,
        json!({
            "secType": "STK",
            "currency": "USD",
            "exchange": "SMART",
            "orderType": "MKT",
            "totalQuantity": 1,
            "action": "BUY",
            "allOrNone": true,
        }),
    )?;
    rename(&mut map, "limitPrice", "lmtPrice");
    coerce_bool(&mut map, "allOrNone");

    let mut contract: Contract = read(&map)?;
    if !contract.is_combo() {
        contract.combo_legs.clear();
    }
    let mut order: Order = read(&map)?;
    // f64::MAX is the conventional "no price"
    order.lmt_price = order.lmt_price.filter(|price| *price != f64::MAX);
    Ok((contract, order))
}

pub(crate) fn cancel_order(params: Value) -> Result<i64> {
    required_i64(&object(params)?, "orderId")
}

/// Requested channel names; every channel when none are given.
pub(crate) fn subscribe(params: Value) -> Result<Vec<Channel>> {
    let map = object(params)?;
    let Some(names) = map.get("channels") else {
        return Ok(Channel::ALL.to_vec());
    };
    let names: Vec<String> = serde_json::from_value(names.clone())?;
    names
        .iter()
        .map(|name| name.parse::<Channel>().map_err(FacadeError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_details_fills_listing_defaults() {
        let contract = contract_details(json!({ "symbol": "AAPL", "strike": "" })).unwrap();

        assert_eq!(contract.symbol, "AAPL");
        assert_eq!(contract.sec_type, "STK");
        assert_eq!(contract.currency, "USD");
        assert_eq!(contract.exchange, "SMART");
        assert_eq!(contract.strike, 0.0);
        assert!(!contract.include_expired);
    }

    #[test]
    fn contract_details_params_override_defaults() {
        let contract = contract_details(json!({
            "symbol": "SPX",
            "secType": "OPT",
            "exchange": "CBOE",
            "strike": "4500",
            "right": "C",
            "lastTradeDateOrContractMonth": "20240119",
        }))
        .unwrap();

        assert_eq!(contract.sec_type, "OPT");
        assert_eq!(contract.exchange, "CBOE");
        assert_eq!(contract.strike, 4500.0);
        assert_eq!(contract.last_trade_date_or_contract_month, "20240119");
    }

    #[test]
    fn historical_data_defaults_and_numeric_flags() {
        let request = historical_data(json!({ "symbol": "EUR", "useRTH": 0 })).unwrap();

        assert_eq!(request.contract.symbol, "EUR");
        assert_eq!(request.contract.sec_type, "");
        assert_eq!(request.duration_str, "1 M");
        assert_eq!(request.bar_size_setting, "1 day");
        assert_eq!(request.what_to_show, "MIDPOINT");
        assert!(!request.use_rth);
        assert_eq!(request.format_date, 1);
        assert!(!request.keep_up_to_date);
    }

    #[test]
    fn mkt_data_reads_contract_and_request_fields() {
        let request = mkt_data(json!({
            "conId": 265598,
            "exchange": "SMART",
            "genericTickList": "233",
            "snapshot": 1,
        }))
        .unwrap();

        assert_eq!(request.contract.con_id, 265598);
        assert_eq!(request.contract.exchange, "SMART");
        assert_eq!(request.generic_tick_list, "233");
        assert!(request.snapshot);
    }

    #[test]
    fn cancel_mkt_data_defaults_to_all() {
        assert_eq!(cancel_mkt_data(Value::Null).unwrap(), CancelTarget::All);
        assert_eq!(
            cancel_mkt_data(json!({ "tickerId": 9 })).unwrap(),
            CancelTarget::Id(9)
        );
        assert!(cancel_mkt_data(json!({ "tickerId": "nine" })).is_err());
    }

    #[test]
    fn place_order_defaults_to_one_share_market_buy() {
        let (contract, order) = place_order(json!({ "symbol": "AAPL" })).unwrap();

        assert_eq!(contract.sec_type, "STK");
        assert_eq!(order.action, "BUY");
        assert_eq!(order.order_type, "MKT");
        assert_eq!(order.total_quantity, 1.0);
        assert!(order.all_or_none);
        assert_eq!(order.lmt_price, None);
    }

    #[test]
    fn place_order_limit_price_and_combo_legs() {
        let (contract, order) = place_order(json!({
            "symbol": "SPY",
            "secType": "BAG",
            "orderType": "LMT",
            "limitPrice": 1.25,
            "action": "SELL",
            "comboLegs": [
                { "conId": 1, "ratio": 1, "action": "BUY", "exchange": "SMART" },
                { "conId": 2, "ratio": 1, "action": "SELL", "exchange": "SMART" },
            ],
        }))
        .unwrap();

        assert_eq!(contract.combo_legs.len(), 2);
        assert_eq!(contract.combo_legs[1].action, "SELL");
        assert_eq!(order.lmt_price, Some(1.25));
        assert_eq!(order.action, "SELL");

        let (plain, order) = place_order(json!({
            "comboLegs": [{ "conId": 1 }],
            "limitPrice": f64::MAX,
        }))
        .unwrap();
        assert!(plain.combo_legs.is_empty());
        assert_eq!(order.lmt_price, None);
    }

    #[test]
    fn cancel_order_requires_an_id() {
        assert_eq!(cancel_order(json!({ "orderId": 1001 })).unwrap(), 1001);
        assert!(cancel_order(Value::Null).is_err());
    }

    #[test]
    fn subscribe_channel_names() {
        assert_eq!(subscribe(Value::Null).unwrap(), Channel::ALL.to_vec());
        assert_eq!(
            subscribe(json!({ "channels": ["orderStatus"] })).unwrap(),
            vec![Channel::OrderStatus]
        );

        let err = subscribe(json!({ "channels": ["tickSize"] })).unwrap_err();
        assert_eq!(err.kind(), "invalid_params");
    }

    #[test]
    fn params_must_be_an_object() {
        let err = contract_details(json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), "invalid_params");
    }
}
