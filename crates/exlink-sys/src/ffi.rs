//! `extern "C"` declarations for every engine entry point.
//!
//! Conventions shared by the whole surface:
//!
//! - The first argument is an opaque handle: the connection handle from
//!   `init_*` for synchronous calls, the subscription handle from
//!   `init_subscriptions` for streaming calls.
//! - Bulk fetches follow the caller-allocated buffer shape: the caller
//!   passes `(buffer, capacity, &mut actual)`; the engine writes at most
//!   `capacity` elements and reports how many it produced. The reported
//!   count is best-effort and must be clamped by the reader.
//! - Every `*mut c_char` the engine hands out (result messages, record
//!   string fields, cancelled ids, callback market names) is owned by the
//!   receiver and must go through [`free_string`] exactly once.
//! - String arguments (`*const c_char`) are borrowed for the duration of
//!   the call; the engine copies what it needs.

use std::ffi::c_void;
use std::os::raw::c_char;

use crate::types::{
    FfiAskBid, FfiBalance, FfiBinanceConfig, FfiCandle, FfiMarketPair, FfiOrder, FfiPaginator,
    FfiResult, FfiTrade,
};

/// Push callback for order-book updates: `(bid_count, ask_count, market,
/// last_update_id, update_id)`. `market` is an owned string.
pub type OnOrderbook = extern "C" fn(u64, u64, *mut c_char, u64, u64);

/// Push callback for trade batches: `(trade_count, market)`. `market` is an
/// owned string.
pub type OnTrades = extern "C" fn(u64, *mut c_char);

/// No-argument push callbacks (ping, stream error, disconnect).
pub type OnSignal = extern "C" fn();

unsafe extern "C" {
    // -- lifecycle ---------------------------------------------------------

    /// Create a Binance-backed connection handle.
    pub fn init_binance(config: FfiBinanceConfig) -> *mut c_void;

    /// Create a Nash-backed connection handle. Null credential pointers
    /// select unauthenticated mode; `environment` is an [`FfiEnvironment`]
    /// discriminant; `affiliate_code` may be null.
    ///
    /// [`FfiEnvironment`]: crate::types::FfiEnvironment
    pub fn init_nash(
        apikey: *const c_char,
        secret: *const c_char,
        client_id: u64,
        environment: u32,
        timeout_ms: u64,
        affiliate_code: *const c_char,
    ) -> *mut c_void;

    /// Register the streaming callbacks and the long-lived shared buffers
    /// the engine writes into before invoking them. Returns the
    /// subscription handle used by `subscribe_*` and `disconnect`.
    pub fn init_subscriptions(
        client: *mut c_void,
        on_error: OnSignal,
        on_ping: OnSignal,
        on_orderbook: OnOrderbook,
        on_trades: OnTrades,
        on_disconnect: OnSignal,
        bids_buff: *mut FfiAskBid,
        bids_buff_len: usize,
        asks_buff: *mut FfiAskBid,
        asks_buff_len: usize,
        trades_buff: *mut FfiTrade,
        trades_buff_len: usize,
    ) -> *mut c_void;

    /// Tear down the streaming side of the connection. The engine confirms
    /// by invoking the `on_disconnect` callback.
    pub fn disconnect(sub_handle: *mut c_void);

    // -- synchronous market data ------------------------------------------

    pub fn order_book(
        client: *mut c_void,
        market: *const c_char,
        bids_buff: *mut FfiAskBid,
        bids_buff_len: u64,
        actual_bids_len: *mut u64,
        asks_buff: *mut FfiAskBid,
        asks_buff_len: u64,
        actual_asks_len: *mut u64,
        last_update_id: *mut u64,
        update_id: *mut u64,
    ) -> FfiResult;

    /// Scalar fetch: latest price, NaN when the engine has none.
    pub fn get_price_ticker(
        client: *mut c_void,
        market: *const c_char,
        price: *mut f64,
    ) -> FfiResult;

    /// `interval` is the engine's textual interval name (e.g. `"OneMinute"`);
    /// `paginator` may be null.
    pub fn get_historic_rates(
        client: *mut c_void,
        market: *const c_char,
        interval: *const c_char,
        paginator: *const FfiPaginator,
        candles_buff: *mut FfiCandle,
        candles_buff_len: usize,
        actual_candles_len: *mut usize,
    ) -> FfiResult;

    pub fn get_historic_trades(
        client: *mut c_void,
        market: *const c_char,
        paginator: *const FfiPaginator,
        trades_buff: *mut FfiTrade,
        trades_buff_len: usize,
        actual_trades_len: *mut usize,
    ) -> FfiResult;

    pub fn receive_pairs(
        client: *mut c_void,
        pairs_buff: *mut FfiMarketPair,
        pairs_buff_len: usize,
        actual_pairs_len: *mut usize,
    ) -> FfiResult;

    // -- account -----------------------------------------------------------

    /// `limit` selects limit (`true`, `price` required) vs market order;
    /// `side` / `tif` are [`FfiSide`] / [`FfiTimeInForce`] discriminants;
    /// `size` and `price` are UTF-8 decimal text. On success the engine
    /// writes one order record into `out_order`; on failure `out_order` is
    /// undefined and must not be decoded.
    ///
    /// [`FfiSide`]: crate::types::FfiSide
    /// [`FfiTimeInForce`]: crate::types::FfiTimeInForce
    pub fn place_order(
        client: *mut c_void,
        market: *const c_char,
        size: *const c_char,
        limit: bool,
        price: *const c_char,
        side: u32,
        tif: u32,
        tif_duration_ms: u64,
        post_only: bool,
        out_order: *mut FfiOrder,
    ) -> FfiResult;

    pub fn get_all_open_orders(
        client: *mut c_void,
        orders_buff: *mut FfiOrder,
        orders_buff_len: usize,
        actual_orders_len: *mut usize,
    ) -> FfiResult;

    /// `market` may be null (all markets).
    pub fn get_order_history(
        client: *mut c_void,
        market: *const c_char,
        paginator: *const FfiPaginator,
        orders_buff: *mut FfiOrder,
        orders_buff_len: usize,
        actual_orders_len: *mut usize,
    ) -> FfiResult;

    /// `market` and `order_id` may each be null (unfiltered).
    pub fn get_trade_history(
        client: *mut c_void,
        market: *const c_char,
        order_id: *const c_char,
        paginator: *const FfiPaginator,
        trades_buff: *mut FfiTrade,
        trades_buff_len: usize,
        actual_trades_len: *mut usize,
    ) -> FfiResult;

    pub fn get_account_balances(
        client: *mut c_void,
        paginator: *const FfiPaginator,
        balances_buff: *mut FfiBalance,
        balances_buff_len: usize,
        actual_balances_len: *mut usize,
    ) -> FfiResult;

    pub fn cancel_order(
        client: *mut c_void,
        order_id: *const c_char,
        market: *const c_char,
    ) -> FfiResult;

    /// Cancels everything (optionally scoped to `market`) and reports the
    /// cancelled order ids as a buffer of owned strings.
    pub fn cancel_all_orders(
        client: *mut c_void,
        market: *const c_char,
        ids_buff: *mut *mut c_char,
        ids_buff_len: usize,
        actual_ids_len: *mut usize,
    ) -> FfiResult;

    // -- streaming ---------------------------------------------------------

    pub fn subscribe_orderbook(sub_handle: *mut c_void, market: *const c_char) -> FfiResult;

    pub fn subscribe_trades(sub_handle: *mut c_void, market: *const c_char) -> FfiResult;

    // -- memory ------------------------------------------------------------

    /// The single deallocation entry point. Every engine-owned string must
    /// be passed here exactly once; null is accepted and ignored.
    pub fn free_string(s: *mut c_char);
}
