//! Public value types and their decode from the wire records.
//!
//! Each record is decoded once, immediately after the engine writes it:
//! owned-text fields go through the ownership bridge (released on decode),
//! numeric text is parsed into `rust_decimal::Decimal`, and enum
//! discriminants are mapped defensively — an out-of-range value from the
//! engine is a decode error, not undefined behaviour.

use std::ffi::CString;
use std::time::Duration;

use rust_decimal::Decimal;

use exlink_sys::{
    FfiAskBid, FfiBalance, FfiCandle, FfiLiquidity, FfiMarketPair, FfiOrder, FfiOrderStatus,
    FfiOrderType, FfiPaginator, FfiSide, FfiTimeInForce, FfiTrade,
};

use crate::error::ExchangeError;
use crate::text::{decode_owned, opt_ptr, to_opt_c_string};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub(crate) fn from_raw(raw: u32) -> Result<Self, ExchangeError> {
        match raw {
            x if x == FfiSide::Buy as u32 => Ok(Self::Buy),
            x if x == FfiSide::Sell as u32 => Ok(Self::Sell),
            other => Err(ExchangeError::NotParsableResponse(format!(
                "unknown side discriminant {other}"
            ))),
        }
    }

    pub(crate) fn to_raw(self) -> u32 {
        match self {
            Self::Buy => FfiSide::Buy as u32,
            Self::Sell => FfiSide::Sell as u32,
        }
    }
}

/// Maker/taker flag on a trade. Unknown discriminants collapse to
/// `Unknown` — the engine reports 0 for exchanges that do not expose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Liquidity {
    #[default]
    Unknown,
    Maker,
    Taker,
}

impl Liquidity {
    pub(crate) fn from_raw(raw: u32) -> Self {
        match raw {
            x if x == FfiLiquidity::Maker as u32 => Self::Maker,
            x if x == FfiLiquidity::Taker as u32 => Self::Taker,
            _ => Self::Unknown,
        }
    }
}

/// Order type reported on order records. Discriminants this crate does
/// not know collapse to `Unknown` (the wire format reserves it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    Limit,
    Market,
    StopLimit,
    StopMarket,
    Unknown,
}

impl OrderType {
    pub(crate) fn from_raw(raw: u32) -> Self {
        match raw {
            x if x == FfiOrderType::Limit as u32 => Self::Limit,
            x if x == FfiOrderType::Market as u32 => Self::Market,
            x if x == FfiOrderType::StopLimit as u32 => Self::StopLimit,
            x if x == FfiOrderType::StopMarket as u32 => Self::StopMarket,
            _ => Self::Unknown,
        }
    }
}

/// Order status reported on order records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
    Open,
    Pending,
    Active,
}

impl OrderStatus {
    pub(crate) fn from_raw(raw: u32) -> Result<Self, ExchangeError> {
        Ok(match raw {
            x if x == FfiOrderStatus::New as u32 => Self::New,
            x if x == FfiOrderStatus::PartiallyFilled as u32 => Self::PartiallyFilled,
            x if x == FfiOrderStatus::Filled as u32 => Self::Filled,
            x if x == FfiOrderStatus::Canceled as u32 => Self::Canceled,
            x if x == FfiOrderStatus::PendingCancel as u32 => Self::PendingCancel,
            x if x == FfiOrderStatus::Rejected as u32 => Self::Rejected,
            x if x == FfiOrderStatus::Expired as u32 => Self::Expired,
            x if x == FfiOrderStatus::Open as u32 => Self::Open,
            x if x == FfiOrderStatus::Pending as u32 => Self::Pending,
            x if x == FfiOrderStatus::Active as u32 => Self::Active,
            other => {
                return Err(ExchangeError::NotParsableResponse(format!(
                    "unknown order status discriminant {other}"
                )));
            }
        })
    }
}

/// Time-in-force for order placement. `GoodTillTime` crosses the boundary
/// as the GTT discriminant plus a millisecond duration argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    GoodTillCancelled,
    FillOrKill,
    ImmediateOrCancelled,
    GoodTillTime(Duration),
}

impl TimeInForce {
    pub(crate) fn to_raw(self) -> (u32, u64) {
        match self {
            Self::GoodTillCancelled => (FfiTimeInForce::Gtc as u32, 0),
            Self::FillOrKill => (FfiTimeInForce::Fok as u32, 0),
            Self::ImmediateOrCancelled => (FfiTimeInForce::Ioc as u32, 0),
            Self::GoodTillTime(d) => (FfiTimeInForce::Gtt as u32, d.as_millis() as u64),
        }
    }
}

/// Candle interval. Crosses the boundary as the engine's textual name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    EightHours,
    TwelveHours,
    OneDay,
    ThreeDays,
    OneWeek,
    OneMonth,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "OneMinute",
            Self::ThreeMinutes => "ThreeMinutes",
            Self::FiveMinutes => "FiveMinutes",
            Self::FifteenMinutes => "FifteenMinutes",
            Self::ThirtyMinutes => "ThirtyMinutes",
            Self::OneHour => "OneHour",
            Self::TwoHours => "TwoHours",
            Self::FourHours => "FourHours",
            Self::SixHours => "SixHours",
            Self::EightHours => "EightHours",
            Self::TwelveHours => "TwelveHours",
            Self::OneDay => "OneDay",
            Self::ThreeDays => "ThreeDays",
            Self::OneWeek => "OneWeek",
            Self::OneMonth => "OneMonth",
        }
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Pagination window for the history fetches. All fields optional; `limit`
/// also sizes the transfer buffer (floored at the default page capacity).
#[derive(Debug, Clone, Default)]
pub struct Paginator {
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub limit: Option<u64>,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Wire form of a paginator plus the `CString`s its pointers borrow from.
/// Must outlive the engine call it is passed to.
pub(crate) struct PaginatorBuf {
    raw: FfiPaginator,
    _before: Option<CString>,
    _after: Option<CString>,
}

impl PaginatorBuf {
    pub(crate) fn as_ptr(&self) -> *const FfiPaginator {
        &self.raw
    }
}

impl Paginator {
    pub(crate) fn to_ffi(&self) -> Result<PaginatorBuf, ExchangeError> {
        let before = to_opt_c_string(self.before.as_deref())?;
        let after = to_opt_c_string(self.after.as_deref())?;
        Ok(PaginatorBuf {
            raw: FfiPaginator {
                start_time: self.start_time.unwrap_or(0),
                end_time: self.end_time.unwrap_or(0),
                limit: self.limit.unwrap_or(0),
                before: opt_ptr(&before) as *mut _,
                after: opt_ptr(&after) as *mut _,
            },
            _before: before,
            _after: after,
        })
    }
}

/// Wire paginator pointer for an optional paginator: null when absent.
pub(crate) fn paginator_ptr(buf: &Option<PaginatorBuf>) -> *const FfiPaginator {
    buf.as_ref().map_or(std::ptr::null(), PaginatorBuf::as_ptr)
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// One order book price level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AskBid {
    pub price: f64,
    pub qty: f64,
}

impl From<FfiAskBid> for AskBid {
    fn from(r: FfiAskBid) -> Self {
        Self {
            price: r.price,
            qty: r.qty,
        }
    }
}

/// One OHLCV candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub time: u64,
    pub low: f64,
    pub high: f64,
    pub open: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<FfiCandle> for Candle {
    fn from(r: FfiCandle) -> Self {
        Self {
            time: r.time,
            low: r.low,
            high: r.high,
            open: r.open,
            close: r.close,
            volume: r.volume,
        }
    }
}

/// A fresh order book snapshot, produced by a synchronous fetch or a
/// streaming push. Bids and asks are in engine-reported order; no local
/// aggregation happens at this layer.
#[derive(Debug, Clone)]
pub struct OrderbookResponse {
    pub market: String,
    pub asks: Vec<AskBid>,
    pub bids: Vec<AskBid>,
    pub last_update_id: u64,
    pub update_id: u64,
}

/// A batch of trades pushed for one market.
#[derive(Debug, Clone)]
pub struct TradesResponse {
    pub market: String,
    pub trades: Vec<Trade>,
}

/// An executed trade.
#[derive(Debug, Clone)]
pub struct Trade {
    pub id: String,
    pub order_id: String,
    pub market_pair: String,
    pub price: f64,
    pub qty: f64,
    pub fees: f64,
    pub side: Side,
    pub liquidity: Liquidity,
    pub created_at: u64,
}

impl Trade {
    /// Decode one wire trade, consuming its string fields.
    ///
    /// # Safety
    ///
    /// `r` must have been written by the engine and not decoded before.
    pub(crate) unsafe fn from_ffi(r: FfiTrade) -> Result<Self, ExchangeError> {
        // Strings first, so they are released even if a discriminant below
        // turns out to be garbage.
        let id = unsafe { decode_owned(r.id) }?.unwrap_or_default();
        let order_id = unsafe { decode_owned(r.order_id) }?.unwrap_or_default();
        let market_pair = unsafe { decode_owned(r.market_pair) }?.unwrap_or_default();
        Ok(Self {
            id,
            order_id,
            market_pair,
            price: r.price,
            qty: r.qty,
            fees: r.fees,
            side: Side::from_raw(r.side)?,
            liquidity: Liquidity::from_raw(r.liquidity),
            created_at: r.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// An order as reported by the engine. `price` is `None` for market
/// orders (the engine reports NaN there).
#[derive(Debug, Clone)]
pub struct Order {
    pub id: String,
    pub market_pair: String,
    pub client_order_id: Option<String>,
    pub created_at: u64,
    pub order_type: OrderType,
    pub side: Side,
    pub status: OrderStatus,
    pub size: f64,
    pub price: Option<f64>,
}

impl Order {
    /// Decode one wire order, consuming its string fields.
    ///
    /// # Safety
    ///
    /// `r` must have been written by the engine and not decoded before.
    pub(crate) unsafe fn from_ffi(r: FfiOrder) -> Result<Self, ExchangeError> {
        let id = unsafe { decode_owned(r.id) }?.unwrap_or_default();
        let market_pair = unsafe { decode_owned(r.market_pair) }?.unwrap_or_default();
        let client_order_id = unsafe { decode_owned(r.client_order_id) }?;
        Ok(Self {
            id,
            market_pair,
            client_order_id,
            created_at: r.created_at,
            order_type: OrderType::from_raw(r.order_type),
            side: Side::from_raw(r.side)?,
            status: OrderStatus::from_raw(r.status)?,
            size: r.size,
            price: if r.price.is_nan() { None } else { Some(r.price) },
        })
    }
}

/// An asset balance. The engine reports decimal text; parsed here to keep
/// full precision.
#[derive(Debug, Clone)]
pub struct Balance {
    pub asset: String,
    pub total: Decimal,
    pub free: Decimal,
}

impl Balance {
    /// # Safety
    ///
    /// `r` must have been written by the engine and not decoded before.
    pub(crate) unsafe fn from_ffi(r: FfiBalance) -> Result<Self, ExchangeError> {
        let asset = unsafe { decode_owned(r.asset) }?.unwrap_or_default();
        let total = unsafe { decode_owned(r.total) }?.unwrap_or_default();
        let free = unsafe { decode_owned(r.free) }?.unwrap_or_default();
        Ok(Self {
            asset,
            total: parse_decimal(&total, "balance total")?,
            free: parse_decimal(&free, "balance free")?,
        })
    }
}

/// A listed market pair with its precision increments.
#[derive(Debug, Clone)]
pub struct MarketPair {
    pub base: String,
    pub quote: String,
    pub symbol: String,
    pub base_increment: Decimal,
    pub quote_increment: Decimal,
    pub min_base_trade_size: Option<Decimal>,
    pub min_quote_trade_size: Option<Decimal>,
}

impl MarketPair {
    /// # Safety
    ///
    /// `r` must have been written by the engine and not decoded before.
    pub(crate) unsafe fn from_ffi(r: FfiMarketPair) -> Result<Self, ExchangeError> {
        let base = unsafe { decode_owned(r.base) }?.unwrap_or_default();
        let quote = unsafe { decode_owned(r.quote) }?.unwrap_or_default();
        let symbol = unsafe { decode_owned(r.symbol) }?.unwrap_or_default();
        let base_increment = unsafe { decode_owned(r.base_increment) }?.unwrap_or_default();
        let quote_increment = unsafe { decode_owned(r.quote_increment) }?.unwrap_or_default();
        let min_base = unsafe { decode_owned(r.base_min_price) }?;
        let min_quote = unsafe { decode_owned(r.quote_min_price) }?;
        Ok(Self {
            base,
            quote,
            symbol,
            base_increment: parse_decimal(&base_increment, "base increment")?,
            quote_increment: parse_decimal(&quote_increment, "quote increment")?,
            min_base_trade_size: min_base
                .map(|s| parse_decimal(&s, "min base trade size"))
                .transpose()?,
            min_quote_trade_size: min_quote
                .map(|s| parse_decimal(&s, "min quote trade size"))
                .transpose()?,
        })
    }
}

fn parse_decimal(text: &str, field: &str) -> Result<Decimal, ExchangeError> {
    text.parse().map_err(|e| {
        ExchangeError::ParseFloat(format!("{field}: cannot parse {text:?} as decimal: {e}"))
    })
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Limit order placement. Size and price are decimal text and cross the
/// boundary verbatim — the engine parses them with full precision.
#[derive(Debug, Clone)]
pub struct LimitOrderRequest {
    pub market: String,
    pub size: String,
    pub price: String,
    pub time_in_force: TimeInForce,
    pub post_only: bool,
}

/// Market order placement.
#[derive(Debug, Clone)]
pub struct MarketOrderRequest {
    pub market: String,
    pub size: String,
}

/// Historic candle fetch.
#[derive(Debug, Clone)]
pub struct HistoricRatesRequest {
    pub market: String,
    pub interval: Interval,
    pub paginator: Option<Paginator>,
}

/// Historic (public) trade fetch.
#[derive(Debug, Clone)]
pub struct HistoricTradesRequest {
    pub market: String,
    pub paginator: Option<Paginator>,
}

/// Own-order history fetch. `market` of `None` means all markets.
#[derive(Debug, Clone, Default)]
pub struct OrderHistoryRequest {
    pub market: Option<String>,
    pub paginator: Option<Paginator>,
}

/// Own-trade history fetch, optionally scoped to a market and/or order.
#[derive(Debug, Clone, Default)]
pub struct TradeHistoryRequest {
    pub market: Option<String>,
    pub order_id: Option<String>,
    pub paginator: Option<Paginator>,
}
