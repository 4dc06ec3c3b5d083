//! Field layouts for the subset of the TWS API the gateway speaks.
//!
//! Layouts assume a negotiated server version of at least 100 (the lowest the
//! handshake offers), so only newer version gates are checked. Orders are
//! encoded as plain orders: algo, scale, hedge, condition, pegged-to-benchmark
//! and delta-neutral parameters always go out unset.

use sibi_frame::Field;

use super::{Codec, CodecError, FieldCursor, InboundEvent, OutboundCall, Result};
use crate::models::{
    Bar, ComboLeg, Contract, ContractDetails, HistoricalDataRequest, MarketDataRequest, Order,
    OrderStatus,
};

/// Build a `Vec<Field>` from values convertible into [`Field`].
macro_rules! fields {
    ($($value:expr),* $(,)?) => {
        vec![$(Field::from($value)),*]
    };
}

mod outgoing {
    pub const REQ_MKT_DATA: i64 = 1;
    pub const CANCEL_MKT_DATA: i64 = 2;
    pub const PLACE_ORDER: i64 = 3;
    pub const CANCEL_ORDER: i64 = 4;
    pub const REQ_CONTRACT_DATA: i64 = 9;
    pub const REQ_HISTORICAL_DATA: i64 = 20;
    pub const START_API: i64 = 71;
}

mod incoming {
    pub const TICK_PRICE: i64 = 1;
    pub const TICK_SIZE: i64 = 2;
    pub const ORDER_STATUS: i64 = 3;
    pub const ERR_MSG: i64 = 4;
    pub const OPEN_ORDER: i64 = 5;
    pub const NEXT_VALID_ID: i64 = 9;
    pub const CONTRACT_DATA: i64 = 10;
    pub const HISTORICAL_DATA: i64 = 17;
    pub const TICK_GENERIC: i64 = 45;
    pub const TICK_STRING: i64 = 46;
    pub const CONTRACT_DATA_END: i64 = 52;
    pub const HISTORICAL_DATA_UPDATE: i64 = 90;
}

/// Server versions that change a layout.
mod min_version {
    pub const OPTIONAL_CAPABILITIES: i32 = 72;
    pub const MD_SIZE_MULTIPLIER: i32 = 110;
    pub const REQ_SMART_COMPONENTS: i32 = 114;
    pub const SYNT_REALTIME_BARS: i32 = 124;
    pub const MARKET_CAP_PRICE: i32 = 131;
    pub const ORDER_CONTAINER: i32 = 145;
    pub const D_PEG_ORDERS: i32 = 148;
    pub const PRICE_MGMT_ALGO: i32 = 151;
    pub const DURATION: i32 = 158;
    pub const POST_TO_ATS: i32 = 160;
    pub const AUTO_CANCEL_PARENT: i32 = 162;
    pub const SIZE_RULES: i32 = 164;
    pub const ADVANCED_ORDER_REJECT: i32 = 166;
    pub const MANUAL_ORDER_TIME: i32 = 169;
    pub const PEGBEST_PEGMID_OFFSETS: i32 = 170;
    pub const BOND_ISSUERID: i32 = 176;
}

const START_API_VERSION: i64 = 2;
const REQ_MKT_DATA_VERSION: i64 = 11;
const CANCEL_MKT_DATA_VERSION: i64 = 2;
const REQ_CONTRACT_DATA_VERSION: i64 = 8;
const REQ_HISTORICAL_DATA_VERSION: i64 = 6;
const PLACE_ORDER_VERSION: i64 = 45;
const CANCEL_ORDER_VERSION: i64 = 1;

/// Codec for the TWS / IB Gateway socket API.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwsCodec;

impl TwsCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for TwsCodec {
    fn encode(&self, call: &OutboundCall, server_version: i32) -> Result<Vec<Field>> {
        let fields = match call {
            OutboundCall::StartApi {
                client_id,
                optional_capabilities,
            } => {
                let mut f = fields![outgoing::START_API, START_API_VERSION, *client_id];
                if server_version >= min_version::OPTIONAL_CAPABILITIES {
                    f.push(Field::from(optional_capabilities));
                }
                f
            }
            OutboundCall::ReqContractDetails { req_id, contract } => {
                encode_contract_details(*req_id, contract, server_version)
            }
            OutboundCall::ReqHistoricalData { req_id, request } => {
                encode_historical_data(*req_id, request, server_version)
            }
            OutboundCall::ReqMktData { req_id, request } => {
                encode_mkt_data(*req_id, request, server_version)
            }
            OutboundCall::CancelMktData { req_id } => {
                fields![outgoing::CANCEL_MKT_DATA, CANCEL_MKT_DATA_VERSION, *req_id]
            }
            OutboundCall::PlaceOrder {
                order_id,
                contract,
                order,
            } => encode_place_order(*order_id, contract, order, server_version),
            OutboundCall::CancelOrder { order_id } => {
                let mut f = fields![outgoing::CANCEL_ORDER, CANCEL_ORDER_VERSION, *order_id];
                if server_version >= min_version::MANUAL_ORDER_TIME {
                    f.push(Field::empty());
                }
                f
            }
        };
        Ok(fields)
    }

    fn decode(&self, fields: &[String], server_version: i32) -> Result<Vec<InboundEvent>> {
        let mut cur = FieldCursor::new(fields)?;
        let event = match cur.msg_id() {
            incoming::TICK_PRICE => decode_tick_price(&mut cur)?,
            incoming::TICK_SIZE => {
                cur.skip(1, "version")?;
                InboundEvent::TickSize {
                    req_id: cur.next_int("reqId")?,
                    tick_type: cur.next_int("tickType")?,
                    size: cur.next_f64("size")?,
                }
            }
            incoming::TICK_STRING => {
                cur.skip(1, "version")?;
                InboundEvent::TickString {
                    req_id: cur.next_int("reqId")?,
                    tick_type: cur.next_int("tickType")?,
                    value: cur.next_string("value")?,
                }
            }
            incoming::TICK_GENERIC => {
                cur.skip(1, "version")?;
                InboundEvent::TickGeneric {
                    req_id: cur.next_int("reqId")?,
                    tick_type: cur.next_int("tickType")?,
                    value: cur.next_f64("value")?,
                }
            }
            incoming::ORDER_STATUS => decode_order_status(&mut cur, server_version)?,
            incoming::ERR_MSG => decode_error(&mut cur)?,
            incoming::OPEN_ORDER => decode_open_order(&mut cur, server_version)?,
            incoming::NEXT_VALID_ID => {
                cur.skip(1, "version")?;
                InboundEvent::NextValidId {
                    order_id: cur.next_int("orderId")?,
                }
            }
            incoming::CONTRACT_DATA => decode_contract_data(&mut cur, server_version)?,
            incoming::CONTRACT_DATA_END => {
                cur.skip(1, "version")?;
                InboundEvent::ContractDetailsEnd {
                    req_id: cur.next_int("reqId")?,
                }
            }
            incoming::HISTORICAL_DATA => return decode_historical_data(&mut cur, server_version),
            incoming::HISTORICAL_DATA_UPDATE => decode_historical_update(&mut cur)?,
            msg_id => InboundEvent::Unknown { msg_id },
        };
        Ok(vec![event])
    }
}

/// Blank for unset, the number otherwise. `f64::MAX` also means unset.
fn price(value: Option<f64>) -> Field {
    match value {
        Some(value) if value != f64::MAX => Field::from(value),
        _ => Field::empty(),
    }
}

/// Contract id through trading class, shared by every request layout.
fn push_contract(f: &mut Vec<Field>, c: &Contract) {
    f.extend(fields![
        c.con_id,
        &c.symbol,
        &c.sec_type,
        &c.last_trade_date_or_contract_month,
        c.strike,
        &c.right,
        &c.multiplier,
        &c.exchange,
        &c.primary_exchange,
        &c.currency,
        &c.local_symbol,
        &c.trading_class,
    ]);
}

fn push_short_combo_legs(f: &mut Vec<Field>, legs: &[ComboLeg]) {
    f.push(Field::from(legs.len() as i64));
    for leg in legs {
        f.extend(fields![leg.con_id, leg.ratio, &leg.action, &leg.exchange]);
    }
}

fn encode_contract_details(req_id: i64, c: &Contract, sv: i32) -> Vec<Field> {
    let mut f = fields![
        outgoing::REQ_CONTRACT_DATA,
        REQ_CONTRACT_DATA_VERSION,
        req_id
    ];
    push_contract(&mut f, c);
    f.extend(fields![c.include_expired, &c.sec_id_type, &c.sec_id]);
    if sv >= min_version::BOND_ISSUERID {
        f.push(Field::from(&c.issuer_id));
    }
    f
}

fn encode_mkt_data(req_id: i64, request: &MarketDataRequest, sv: i32) -> Vec<Field> {
    let c = &request.contract;
    let mut f = fields![outgoing::REQ_MKT_DATA, REQ_MKT_DATA_VERSION, req_id];
    push_contract(&mut f, c);
    if c.is_combo() {
        push_short_combo_legs(&mut f, &c.combo_legs);
    }
    // no delta-neutral contract
    f.push(Field::from(false));
    f.extend(fields![&request.generic_tick_list, request.snapshot]);
    if sv >= min_version::REQ_SMART_COMPONENTS {
        f.push(Field::from(request.regulatory_snapshot));
    }
    // market data options
    f.push(Field::empty());
    f
}

fn encode_historical_data(req_id: i64, request: &HistoricalDataRequest, sv: i32) -> Vec<Field> {
    let c = &request.contract;
    let mut f = fields![outgoing::REQ_HISTORICAL_DATA];
    if sv < min_version::SYNT_REALTIME_BARS {
        f.push(Field::from(REQ_HISTORICAL_DATA_VERSION));
    }
    f.push(Field::from(req_id));
    push_contract(&mut f, c);
    f.extend(fields![
        c.include_expired,
        &request.end_date_time,
        &request.bar_size_setting,
        &request.duration_str,
        request.use_rth,
        &request.what_to_show,
        request.format_date,
    ]);
    if c.is_combo() {
        push_short_combo_legs(&mut f, &c.combo_legs);
    }
    if sv >= min_version::SYNT_REALTIME_BARS {
        f.push(Field::from(request.keep_up_to_date));
    }
    // chart options
    f.push(Field::empty());
    f
}

fn encode_place_order(order_id: i64, c: &Contract, o: &Order, sv: i32) -> Vec<Field> {
    let mut f = fields![outgoing::PLACE_ORDER];
    if sv < min_version::ORDER_CONTAINER {
        f.push(Field::from(PLACE_ORDER_VERSION));
    }
    f.push(Field::from(order_id));

    push_contract(&mut f, c);
    f.extend(fields![&c.sec_id_type, &c.sec_id]);

    f.extend(fields![&o.action, o.total_quantity, &o.order_type]);
    f.extend([price(o.lmt_price), price(o.aux_price)]);

    f.extend(fields![
        &o.tif,
        &o.oca_group,
        &o.account,
        &o.open_close,
        o.origin,
        &o.order_ref,
        o.transmit,
        o.parent_id,
        false, // block order
        false, // sweep to fill
        0,     // display size
        0,     // trigger method
        o.outside_rth,
        o.hidden,
    ]);

    if c.is_combo() {
        f.push(Field::from(c.combo_legs.len() as i64));
        for leg in &c.combo_legs {
            f.extend(fields![
                leg.con_id,
                leg.ratio,
                &leg.action,
                &leg.exchange,
                leg.open_close,
                leg.short_sale_slot,
                &leg.designated_location,
                leg.exempt_code,
            ]);
        }
        // per-leg prices, smart combo routing params
        f.extend(fields![0, 0]);
    }

    // shares allocation (deprecated)
    f.push(Field::empty());

    f.extend(fields![
        0,  // discretionary amount
        "", // good after time
        "", // good till date
        "", // fa group
        "", // fa method
        "", // fa percentage
        "", // fa profile
        "", // model code
        0,  // short sale slot
        "", // designated location
        -1, // exempt code
        0,  // oca type
        "", // rule 80A
        "", // settling firm
        o.all_or_none,
        "",    // min qty
        "",    // percent offset
        false, // e-trade only
        false, // firm quote only
        "",    // nbbo price cap
        0,     // auction strategy
        "",    // starting price
        "",    // stock ref price
        "",    // delta
        "",    // stock range lower
        "",    // stock range upper
        false, // override percentage constraints
        "",    // volatility
        "",    // volatility type
        "",    // delta neutral order type
        "",    // delta neutral aux price
        false, // continuous update
        "",    // reference price type
        "",    // trail stop price
        "",    // trailing percent
        "",    // scale init level size
        "",    // scale subs level size
        "",    // scale price increment
        "",    // scale table
        "",    // active start time
        "",    // active stop time
        "",    // hedge type
        false, // opt out smart routing
        "",    // clearing account
        "",    // clearing intent
        false, // not held
        false, // delta neutral contract
        "",    // algo strategy
        "",    // algo id
        o.what_if,
        "",    // misc options
        false, // solicited
        false, // randomize size
        false, // randomize price
        0,     // conditions
        "",    // adjusted order type
        "",    // trigger price
        "",    // lmt price offset
        "",    // adjusted stop price
        "",    // adjusted stop limit price
        "",    // adjusted trailing amount
        0,     // adjustable trailing unit
        "",    // ext operator
        "",    // soft dollar tier name
        "",    // soft dollar tier value
        "",    // cash qty
        "",    // mifid2 decision maker
        "",    // mifid2 decision algo
        "",    // mifid2 execution trader
        "",    // mifid2 execution algo
        false, // don't use auto price for hedge
    ]);

    if sv >= min_version::ORDER_CONTAINER {
        f.push(Field::from(false));
    }
    if sv >= min_version::D_PEG_ORDERS {
        f.push(Field::from(false));
    }
    if sv >= min_version::PRICE_MGMT_ALGO {
        f.push(Field::empty());
    }
    if sv >= min_version::DURATION {
        f.push(Field::empty());
    }
    if sv >= min_version::POST_TO_ATS {
        f.push(Field::empty());
    }
    if sv >= min_version::AUTO_CANCEL_PARENT {
        f.push(Field::from(false));
    }
    if sv >= min_version::ADVANCED_ORDER_REJECT {
        f.push(Field::empty());
    }
    if sv >= min_version::MANUAL_ORDER_TIME {
        f.push(Field::empty());
    }
    if sv >= min_version::PEGBEST_PEGMID_OFFSETS && c.exchange == "IBKRATS" {
        // min trade qty
        f.push(Field::empty());
    }
    f
}

fn decode_tick_price(cur: &mut FieldCursor<'_>) -> Result<InboundEvent> {
    let version = cur.next_int("version")?;
    let req_id = cur.next_int("reqId")?;
    let tick_type = cur.next_int("tickType")?;
    let price = cur.next_f64("price")?;
    let size = if version >= 2 {
        cur.next_f64("size")?
    } else {
        0.0
    };
    Ok(InboundEvent::TickPrice {
        req_id,
        tick_type,
        price,
        size,
    })
}

fn decode_error(cur: &mut FieldCursor<'_>) -> Result<InboundEvent> {
    let version = cur.next_int("version")?;
    if version < 2 {
        return Ok(InboundEvent::Error {
            id: -1,
            code: -1,
            message: cur.next_string("errorString")?,
        });
    }
    Ok(InboundEvent::Error {
        id: cur.next_int("id")?,
        code: cur.next_int("errorCode")?,
        message: cur.next_string("errorString")?,
    })
}

fn decode_order_status(cur: &mut FieldCursor<'_>, sv: i32) -> Result<InboundEvent> {
    if sv < min_version::MARKET_CAP_PRICE {
        cur.skip(1, "version")?;
    }
    let mut status = OrderStatus {
        order_id: cur.next_int("orderId")?,
        status: cur.next_string("status")?,
        filled: cur.next_f64("filled")?,
        remaining: cur.next_f64("remaining")?,
        avg_fill_price: cur.next_f64("avgFillPrice")?,
        perm_id: cur.next_int("permId")?,
        parent_id: cur.next_int("parentId")?,
        last_fill_price: cur.next_f64("lastFillPrice")?,
        client_id: cur.next_int("clientId")?,
        why_held: cur.next_string("whyHeld")?,
        mkt_cap_price: 0.0,
    };
    if sv >= min_version::MARKET_CAP_PRICE {
        status.mkt_cap_price = cur.next_f64("mktCapPrice")?;
    }
    Ok(InboundEvent::OrderStatus(status))
}

/// Only the order id, contract and leading order fields are read; the
/// order state and the long tail of order attributes are ignored.
fn decode_open_order(cur: &mut FieldCursor<'_>, sv: i32) -> Result<InboundEvent> {
    if sv < min_version::ORDER_CONTAINER {
        cur.skip(1, "version")?;
    }
    let order_id = cur.next_int("orderId")?;

    let contract = Contract {
        con_id: cur.next_int("conId")?,
        symbol: cur.next_string("symbol")?,
        sec_type: cur.next_string("secType")?,
        last_trade_date_or_contract_month: cur.next_string("lastTradeDateOrContractMonth")?,
        strike: cur.next_f64("strike")?,
        right: cur.next_string("right")?,
        multiplier: cur.next_string("multiplier")?,
        exchange: cur.next_string("exchange")?,
        currency: cur.next_string("currency")?,
        local_symbol: cur.next_string("localSymbol")?,
        trading_class: cur.next_string("tradingClass")?,
        ..Contract::default()
    };

    let order = Order {
        order_id,
        action: cur.next_string("action")?,
        total_quantity: cur.next_f64("totalQuantity")?,
        order_type: cur.next_string("orderType")?,
        lmt_price: cur.next_opt_f64("lmtPrice")?,
        aux_price: cur.next_opt_f64("auxPrice")?,
        tif: cur.next_string("tif")?,
        oca_group: cur.next_string("ocaGroup")?,
        account: cur.next_string("account")?,
        open_close: cur.next_string("openClose")?,
        origin: cur.next_int("origin")?,
        order_ref: cur.next_string("orderRef")?,
        client_id: cur.next_int("clientId")?,
        perm_id: cur.next_int("permId")?,
        outside_rth: cur.next_bool("outsideRth")?,
        hidden: cur.next_bool("hidden")?,
        ..Order::default()
    };

    Ok(InboundEvent::OpenOrder {
        order_id,
        contract: Box::new(contract),
        order: Box::new(order),
    })
}

/// Reads through the primary exchange; later descriptive fields are ignored.
fn decode_contract_data(cur: &mut FieldCursor<'_>, sv: i32) -> Result<InboundEvent> {
    let version = if sv < min_version::SIZE_RULES {
        cur.next_int("version")?
    } else {
        8
    };
    let req_id = if version >= 3 {
        cur.next_int("reqId")?
    } else {
        -1
    };

    let mut details = ContractDetails::default();
    let c = &mut details.contract;
    c.symbol = cur.next_string("symbol")?;
    c.sec_type = cur.next_string("secType")?;
    // "YYYYMMDD [HH:MM[ tz]]": keep the date part
    c.last_trade_date_or_contract_month = cur
        .next_str("lastTradeDateOrContractMonth")?
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();
    c.strike = cur.next_f64("strike")?;
    c.right = cur.next_string("right")?;
    c.exchange = cur.next_string("exchange")?;
    c.currency = cur.next_string("currency")?;
    c.local_symbol = cur.next_string("localSymbol")?;
    details.market_name = cur.next_string("marketName")?;
    let c = &mut details.contract;
    c.trading_class = cur.next_string("tradingClass")?;
    c.con_id = cur.next_int("conId")?;
    details.min_tick = cur.next_f64("minTick")?;
    if (min_version::MD_SIZE_MULTIPLIER..min_version::SIZE_RULES).contains(&sv) {
        cur.skip(1, "mdSizeMultiplier")?;
    }
    details.contract.multiplier = cur.next_string("multiplier")?;
    details.order_types = cur.next_string("orderTypes")?;
    details.valid_exchanges = cur.next_string("validExchanges")?;
    details.price_magnifier = cur.next_int("priceMagnifier")?;
    if version >= 4 {
        details.under_con_id = cur.next_int("underConId")?;
    }
    if version >= 5 {
        details.long_name = cur.next_string("longName")?;
        details.contract.primary_exchange = cur.next_string("primaryExchange")?;
    }

    Ok(InboundEvent::ContractDetails {
        req_id,
        details: Box::new(details),
    })
}

fn decode_historical_data(cur: &mut FieldCursor<'_>, sv: i32) -> Result<Vec<InboundEvent>> {
    if sv < min_version::SYNT_REALTIME_BARS {
        cur.skip(1, "version")?;
    }
    let req_id = cur.next_int("reqId")?;
    let start = cur.next_string("startDateStr")?;
    let end = cur.next_string("endDateStr")?;
    let count = cur.next_int("itemCount")?;
    let count = usize::try_from(count).map_err(|_| CodecError::InvalidValue {
        msg_id: cur.msg_id(),
        field: "itemCount",
        value: count.to_string(),
    })?;

    let mut events = Vec::with_capacity(count.min(cur.remaining()) + 1);
    for _ in 0..count {
        let mut bar = Bar {
            date: cur.next_string("date")?,
            open: cur.next_f64("open")?,
            high: cur.next_f64("high")?,
            low: cur.next_f64("low")?,
            close: cur.next_f64("close")?,
            volume: cur.next_f64("volume")?,
            wap: cur.next_f64("wap")?,
            bar_count: 0,
        };
        if sv < min_version::SYNT_REALTIME_BARS {
            cur.skip(1, "hasGaps")?;
        }
        bar.bar_count = cur.next_int("barCount")?;
        events.push(InboundEvent::HistoricalData { req_id, bar });
    }
    events.push(InboundEvent::HistoricalDataEnd { req_id, start, end });
    Ok(events)
}

fn decode_historical_update(cur: &mut FieldCursor<'_>) -> Result<InboundEvent> {
    let req_id = cur.next_int("reqId")?;
    let bar_count = cur.next_int("barCount")?;
    let date = cur.next_string("date")?;
    let open = cur.next_f64("open")?;
    let close = cur.next_f64("close")?;
    let high = cur.next_f64("high")?;
    let low = cur.next_f64("low")?;
    let wap = cur.next_f64("wap")?;
    let volume = cur.next_f64("volume")?;
    Ok(InboundEvent::HistoricalDataUpdate {
        req_id,
        bar: Bar {
            date,
            open,
            high,
            low,
            close,
            volume,
            wap,
            bar_count,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SV: i32 = 176;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn rendered(fields: &[Field]) -> Vec<String> {
        let payload = sibi_frame::encode_payload(fields).unwrap();
        sibi_frame::split_fields(&payload)
    }

    fn aapl() -> Contract {
        Contract {
            symbol: "AAPL".to_string(),
            sec_type: "STK".to_string(),
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            ..Contract::default()
        }
    }

    #[test]
    fn start_api_carries_capabilities_on_modern_servers() {
        let call = OutboundCall::StartApi {
            client_id: 0,
            optional_capabilities: String::new(),
        };

        let modern = TwsCodec.encode(&call, SV).unwrap();
        assert_eq!(rendered(&modern), vec!["71", "2", "0", ""]);

        let old = TwsCodec.encode(&call, 71).unwrap();
        assert_eq!(rendered(&old), vec!["71", "2", "0"]);
    }

    #[test]
    fn contract_details_layout() {
        let call = OutboundCall::ReqContractDetails {
            req_id: 1,
            contract: aapl(),
        };
        let fields = rendered(&TwsCodec.encode(&call, SV).unwrap());

        assert_eq!(
            fields,
            vec![
                "9", "8", "1", "0", "AAPL", "STK", "", "0", "", "", "SMART", "", "USD", "", "",
                "0", "", "", ""
            ]
        );
    }

    #[test]
    fn mkt_data_layout() {
        let call = OutboundCall::ReqMktData {
            req_id: 3,
            request: MarketDataRequest {
                contract: aapl(),
                ..MarketDataRequest::default()
            },
        };
        let fields = rendered(&TwsCodec.encode(&call, SV).unwrap());

        assert_eq!(&fields[..4], &["1", "11", "3", "0"]);
        assert_eq!(fields[4], "AAPL");
        // delta neutral, tick list, snapshot, regulatory snapshot, options
        assert_eq!(&fields[15..], &["0", "", "0", "0", ""]);
    }

    #[test]
    fn historical_layout_omits_version_on_modern_servers() {
        let call = OutboundCall::ReqHistoricalData {
            req_id: 2,
            request: HistoricalDataRequest {
                contract: aapl(),
                ..HistoricalDataRequest::default()
            },
        };
        let fields = rendered(&TwsCodec.encode(&call, SV).unwrap());

        assert_eq!(&fields[..3], &["20", "2", "0"]);
        assert_eq!(
            &fields[14..],
            &["0", "", "1 day", "1 M", "1", "MIDPOINT", "1", "0", ""]
        );
    }

    #[test]
    fn place_order_leaves_unset_prices_blank() {
        let order = Order {
            total_quantity: 10.0,
            order_type: "LMT".to_string(),
            lmt_price: Some(101.25),
            ..Order::default()
        };
        let call = OutboundCall::PlaceOrder {
            order_id: 1001,
            contract: aapl(),
            order,
        };
        let fields = rendered(&TwsCodec.encode(&call, SV).unwrap());

        assert_eq!(&fields[..3], &["3", "1001", "0"]);
        assert_eq!(&fields[16..21], &["BUY", "10", "LMT", "101.25", ""]);
    }

    #[test]
    fn cancel_calls() {
        let cancel_mkt = TwsCodec
            .encode(&OutboundCall::CancelMktData { req_id: 7 }, SV)
            .unwrap();
        assert_eq!(rendered(&cancel_mkt), vec!["2", "2", "7"]);

        let cancel_order = TwsCodec
            .encode(&OutboundCall::CancelOrder { order_id: 1001 }, SV)
            .unwrap();
        assert_eq!(rendered(&cancel_order), vec!["4", "1", "1001", ""]);
    }

    #[test]
    fn decodes_tick_price() {
        let events = TwsCodec
            .decode(&owned(&["1", "6", "3", "1", "187.5", "100", "0"]), SV)
            .unwrap();

        assert_eq!(
            events,
            vec![InboundEvent::TickPrice {
                req_id: 3,
                tick_type: 1,
                price: 187.5,
                size: 100.0
            }]
        );
        assert_eq!(crate::codec::tick_type::name(1), "BID");
    }

    #[test]
    fn decodes_error_with_and_without_advanced_reject() {
        let plain = TwsCodec
            .decode(&owned(&["4", "2", "5", "200", "No security definition"]), SV)
            .unwrap();
        let advanced = TwsCodec
            .decode(&owned(&["4", "2", "5", "201", "rejected", "{\"k\":1}"]), SV)
            .unwrap();

        assert_eq!(
            plain,
            vec![InboundEvent::Error {
                id: 5,
                code: 200,
                message: "No security definition".to_string()
            }]
        );
        assert!(matches!(advanced[0], InboundEvent::Error { code: 201, .. }));
    }

    #[test]
    fn decodes_historical_block_into_bars_and_end() {
        let fields = owned(&[
            "17", "4", "20240101", "20240201", "2", "20240102", "1", "2", "0.5", "1.5", "100",
            "1.2", "10", "20240103", "1.5", "2.5", "1", "2", "200", "1.7", "12",
        ]);
        let events = TwsCodec.decode(&fields, SV).unwrap();

        assert_eq!(events.len(), 3);
        let InboundEvent::HistoricalData { req_id: 4, bar } = &events[0] else {
            panic!("expected first bar, got {events:?}");
        };
        assert_eq!(bar.date, "20240102");
        assert_eq!(bar.bar_count, 10);
        assert!(matches!(
            &events[1],
            InboundEvent::HistoricalData { bar, .. } if bar.close == 2.0 && bar.volume == 200.0
        ));
        assert_eq!(
            events[2],
            InboundEvent::HistoricalDataEnd {
                req_id: 4,
                start: "20240101".to_string(),
                end: "20240201".to_string()
            }
        );
    }

    #[test]
    fn decodes_order_status_without_version() {
        let fields = owned(&[
            "3", "1001", "Filled", "10", "0", "101.2", "555", "0", "101.2", "0", "", "0",
        ]);
        let events = TwsCodec.decode(&fields, SV).unwrap();

        let InboundEvent::OrderStatus(status) = &events[0] else {
            panic!("expected order status, got {events:?}");
        };
        assert_eq!(status.order_id, 1001);
        assert!(status.is_terminal());
        assert_eq!(status.perm_id, 555);
    }

    #[test]
    fn decodes_contract_data_head() {
        let fields = owned(&[
            "10", "1", "AAPL", "STK", "", "0", "", "SMART", "USD", "AAPL", "NMS", "AAPL", "265598",
            "0.01", "", "ACTIVETIM,AD", "SMART,AMEX", "1", "0", "APPLE INC", "NASDAQ", "tail",
        ]);
        let events = TwsCodec.decode(&fields, SV).unwrap();

        let InboundEvent::ContractDetails { req_id, details } = &events[0] else {
            panic!("expected contract details, got {events:?}");
        };
        assert_eq!(*req_id, 1);
        assert_eq!(details.contract.con_id, 265598);
        assert_eq!(details.contract.primary_exchange, "NASDAQ");
        assert_eq!(details.long_name, "APPLE INC");
        assert_eq!(details.min_tick, 0.01);
    }

    #[test]
    fn decodes_simple_messages() {
        assert_eq!(
            TwsCodec.decode(&owned(&["9", "1", "1001"]), SV).unwrap(),
            vec![InboundEvent::NextValidId { order_id: 1001 }]
        );
        assert_eq!(
            TwsCodec.decode(&owned(&["52", "1", "8"]), SV).unwrap(),
            vec![InboundEvent::ContractDetailsEnd { req_id: 8 }]
        );
        assert_eq!(
            TwsCodec.decode(&owned(&["49", "1", "x"]), SV).unwrap(),
            vec![InboundEvent::Unknown { msg_id: 49 }]
        );
    }

    #[test]
    fn truncated_message_is_an_error() {
        let err = TwsCodec.decode(&owned(&["1", "6", "3"]), SV).unwrap_err();
        assert_eq!(
            err,
            CodecError::Truncated {
                msg_id: 1,
                field: "tickType"
            }
        );
    }
}
