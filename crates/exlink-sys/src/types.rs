//! `#[repr(C)]` wire records matching the engine ABI bit-for-bit.
//!
//! Field order, width and alignment are fixed by the engine; nothing here
//! may be reordered. Enum-valued fields cross the boundary as raw `u32`
//! so that out-of-range values sent by a misbehaving engine can be decoded
//! defensively instead of invoking undefined behaviour — the named
//! `#[repr(u32)]` enums below give the known discriminants and a
//! `from_raw` mapping.
//!
//! Monetary quantities that need full precision (balances, market-pair
//! increments, order size/price on placement) cross as UTF-8 text behind
//! `*mut c_char`; top-of-book and candle numerics cross as `f64`.

use std::os::raw::c_char;

// ---------------------------------------------------------------------------
// Market data records
// ---------------------------------------------------------------------------

/// One price level of an order book, as written by the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FfiAskBid {
    pub price: f64,
    pub qty: f64,
}

/// One OHLCV candle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FfiCandle {
    pub time: u64,
    pub low: f64,
    pub high: f64,
    pub open: f64,
    pub close: f64,
    pub volume: f64,
}

/// A single trade. `id`, `order_id` and `market_pair` are engine-allocated
/// strings whose ownership transfers to the caller on decode.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiTrade {
    pub id: *mut c_char,
    pub order_id: *mut c_char,
    pub market_pair: *mut c_char,
    pub price: f64,
    pub qty: f64,
    pub fees: f64,
    pub side: u32,
    pub liquidity: u32,
    pub created_at: u64,
}

/// An order record. `client_order_id` may be null (absent).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiOrder {
    pub id: *mut c_char,
    pub market_pair: *mut c_char,
    pub client_order_id: *mut c_char,
    pub created_at: u64,
    pub order_type: u32,
    pub side: u32,
    pub status: u32,
    pub size: f64,
    pub price: f64,
}

/// An account balance. All three fields are engine-allocated decimal text.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiBalance {
    pub asset: *mut c_char,
    pub total: *mut c_char,
    pub free: *mut c_char,
}

/// A listed market pair. `base_min_price` / `quote_min_price` may be null.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiMarketPair {
    pub base: *mut c_char,
    pub quote: *mut c_char,
    pub symbol: *mut c_char,
    pub base_increment: *mut c_char,
    pub quote_increment: *mut c_char,
    pub base_min_price: *mut c_char,
    pub quote_min_price: *mut c_char,
}

// ---------------------------------------------------------------------------
// Request records
// ---------------------------------------------------------------------------

/// Pagination window. Zero-valued numeric fields and null pointers mean
/// "unset" on the engine side.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiPaginator {
    pub start_time: u64,
    pub end_time: u64,
    pub limit: u64,
    pub before: *mut c_char,
    pub after: *mut c_char,
}

/// Binance connection config, passed by value to `init_binance`.
/// Null credential pointers select unauthenticated (public-data) mode.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiBinanceConfig {
    pub apikey: *const c_char,
    pub secret: *const c_char,
    pub sandbox: bool,
}

// ---------------------------------------------------------------------------
// Tagged result
// ---------------------------------------------------------------------------

/// Discriminated result record returned by every fallible engine call.
///
/// `tag` is kept raw: the engine may be newer than this crate and report a
/// discriminant we do not know, which must surface as an error rather than
/// be collapsed into a known variant (or worse, UB through an enum field).
/// `message` is an engine-allocated string, present on most failures and
/// occasionally on success; whoever decodes the record owns it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiResult {
    pub tag: u32,
    pub message: *mut c_char,
}

/// Known result discriminants.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTag {
    Ok = 0,
    InvalidArgument = 1,
    BinanceError = 2,
    CoinbaseError = 3,
    NashProtocolError = 4,
    MissingImplementation = 5,
    AssetNotFound = 6,
    NoApiKeySet = 7,
    InternalServerError = 8,
    ServiceUnavailable = 9,
    Unauthorized = 10,
    SymbolNotFound = 11,
    SocketError = 12,
    GetTimestampFailed = 13,
    ReqError = 14,
    InvalidHeaderError = 15,
    InvalidPayloadSignature = 16,
    IoError = 17,
    PoisonError = 18,
    JsonError = 19,
    ParseFloatError = 20,
    UrlParserError = 21,
    Tungstenite = 22,
    TimestampError = 23,
    UnknownResponse = 24,
    NotParsableResponse = 25,
    MissingParameter = 26,
    WebSocketMessageNotSupported = 27,
}

impl ResultTag {
    /// Map a raw discriminant to a known tag, or `None` for values this
    /// crate does not recognize.
    pub fn from_raw(raw: u32) -> Option<Self> {
        use ResultTag::*;
        Some(match raw {
            0 => Ok,
            1 => InvalidArgument,
            2 => BinanceError,
            3 => CoinbaseError,
            4 => NashProtocolError,
            5 => MissingImplementation,
            6 => AssetNotFound,
            7 => NoApiKeySet,
            8 => InternalServerError,
            9 => ServiceUnavailable,
            10 => Unauthorized,
            11 => SymbolNotFound,
            12 => SocketError,
            13 => GetTimestampFailed,
            14 => ReqError,
            15 => InvalidHeaderError,
            16 => InvalidPayloadSignature,
            17 => IoError,
            18 => PoisonError,
            19 => JsonError,
            20 => ParseFloatError,
            21 => UrlParserError,
            22 => Tungstenite,
            23 => TimestampError,
            24 => UnknownResponse,
            25 => NotParsableResponse,
            26 => MissingParameter,
            27 => WebSocketMessageNotSupported,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound enum discriminants
// ---------------------------------------------------------------------------

/// Buy/sell discriminant as sent to (and reported by) the engine.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiSide {
    Buy = 0,
    Sell = 1,
}

/// Maker/taker discriminant reported on trades.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiLiquidity {
    Unknown = 0,
    Maker = 1,
    Taker = 2,
}

/// Time-in-force discriminant for order placement. `Gtt` carries its
/// duration in a separate millisecond argument.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiTimeInForce {
    Gtc = 0,
    Fok = 1,
    Ioc = 2,
    Gtt = 3,
}

/// Order-type discriminant reported on order records.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiOrderType {
    Limit = 0,
    Market = 1,
    StopLimit = 2,
    StopMarket = 3,
    Unknown = 4,
}

/// Order-status discriminant reported on order records.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiOrderStatus {
    New = 0,
    PartiallyFilled = 1,
    Filled = 2,
    Canceled = 3,
    PendingCancel = 4,
    Rejected = 5,
    Expired = 6,
    Open = 7,
    Pending = 8,
    Active = 9,
}

/// Environment selector for `init_nash`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiEnvironment {
    Sandbox = 0,
    Production = 1,
}
