//! The exchange client: one connection handle, one subscription handle.
//!
//! Every synchronous call blocks the calling thread until the engine
//! answers; there is no timeout at this layer. Streaming callbacks arrive
//! on engine-owned threads and are fanned out by the process-wide
//! dispatcher — because the engine's callbacks carry no context pointer,
//! at most one *streaming* client may exist per process. Synchronous-only
//! clients are unrestricted.
//!
//! The handle may move between threads but the engine runtime behind it is
//! single-entry, so the client is `Send` and deliberately not `Sync`.

use std::ffi::c_void;
use std::mem::MaybeUninit;
use std::sync::Arc;

use tracing::{debug, info};

use exlink_sys::{self as sys, FfiAskBid, FfiBinanceConfig, FfiOrder};

use crate::buffer::{BOOK_DEPTH, DEFAULT_PAGE_CAPACITY, Page, WIDE_PAGE_CAPACITY, fetch_with, page_capacity};
use crate::config::{BinanceConfig, NashConfig};
use crate::error::{ExchangeError, interpret};
use crate::stream::{
    STREAM_BUF_LEN, SubscriptionToken, dispatcher, on_disconnect_raw, on_error_raw,
    on_orderbook_raw, on_ping_raw, on_trades_raw,
};
use crate::text::{opt_ptr, to_c_string, to_opt_c_string};
use crate::types::{
    AskBid, Balance, Candle, HistoricRatesRequest, HistoricTradesRequest, LimitOrderRequest,
    MarketOrderRequest, MarketPair, Order, OrderHistoryRequest, OrderbookResponse, Paginator,
    Side, TimeInForce, Trade, TradeHistoryRequest, TradesResponse, paginator_ptr,
};

/// A connection to one exchange venue.
pub struct ExchangeClient {
    client: *mut c_void,
    sub: *mut c_void,
}

// SAFETY: the handles are opaque tokens the engine accepts from any
// thread, one call at a time. `&self` methods enter the engine, so the
// type is Send but not Sync.
unsafe impl Send for ExchangeClient {}

impl ExchangeClient {
    /// Connect to Binance and wire the streaming callbacks.
    pub fn connect_binance(config: &BinanceConfig) -> Result<Self, ExchangeError> {
        let api_key = to_opt_c_string(config.api_key.as_deref())?;
        let api_secret = to_opt_c_string(config.api_secret.as_deref())?;
        // SAFETY: the CStrings outlive the call; the engine copies what it
        // keeps.
        let client = unsafe {
            sys::init_binance(FfiBinanceConfig {
                apikey: opt_ptr(&api_key),
                secret: opt_ptr(&api_secret),
                sandbox: config.sandbox,
            })
        };
        if client.is_null() {
            return Err(ExchangeError::InternalServerError(
                "engine returned a null Binance connection handle".to_string(),
            ));
        }
        info!(sandbox = config.sandbox, "binance connection established");
        Self::with_subscriptions(client)
    }

    /// Connect to Nash and wire the streaming callbacks.
    pub fn connect_nash(config: &NashConfig) -> Result<Self, ExchangeError> {
        let api_key = to_opt_c_string(config.api_key.as_deref())?;
        let api_secret = to_opt_c_string(config.api_secret.as_deref())?;
        let affiliate = to_opt_c_string(config.affiliate_code.as_deref())?;
        // SAFETY: as above.
        let client = unsafe {
            sys::init_nash(
                opt_ptr(&api_key),
                opt_ptr(&api_secret),
                config.client_id,
                config.environment.to_raw(),
                config.timeout_ms,
                opt_ptr(&affiliate),
            )
        };
        if client.is_null() {
            return Err(ExchangeError::InternalServerError(
                "engine returned a null Nash connection handle".to_string(),
            ));
        }
        info!(
            client_id = config.client_id,
            environment = ?config.environment,
            "nash connection established"
        );
        Self::with_subscriptions(client)
    }

    /// Register the dispatcher trampolines and shared buffers with the
    /// engine, obtaining the subscription handle.
    fn with_subscriptions(client: *mut c_void) -> Result<Self, ExchangeError> {
        let d = dispatcher();
        // SAFETY: the buffers are 'static allocations of STREAM_BUF_LEN
        // slots each; the trampolines are 'static fns.
        let sub = unsafe {
            sys::init_subscriptions(
                client,
                on_error_raw,
                on_ping_raw,
                on_orderbook_raw,
                on_trades_raw,
                on_disconnect_raw,
                d.buffers.bids,
                STREAM_BUF_LEN,
                d.buffers.asks,
                STREAM_BUF_LEN,
                d.buffers.trades,
                STREAM_BUF_LEN,
            )
        };
        if sub.is_null() {
            return Err(ExchangeError::InternalServerError(
                "engine returned a null subscription handle".to_string(),
            ));
        }
        Ok(Self { client, sub })
    }

    // -- synchronous market data ------------------------------------------

    /// Fetch an order book snapshot, up to 512 levels per side.
    pub fn order_book(&self, market: &str) -> Result<OrderbookResponse, ExchangeError> {
        let market_c = to_c_string(market)?;
        let mut bids = vec![MaybeUninit::<FfiAskBid>::uninit(); BOOK_DEPTH];
        let mut asks = vec![MaybeUninit::<FfiAskBid>::uninit(); BOOK_DEPTH];
        let mut bid_len = 0u64;
        let mut ask_len = 0u64;
        let mut last_update_id = 0u64;
        let mut update_id = 0u64;
        // SAFETY: both buffers hold BOOK_DEPTH slots and stay alive across
        // the call; out-params point at locals.
        let result = unsafe {
            sys::order_book(
                self.client,
                market_c.as_ptr(),
                bids.as_mut_ptr().cast::<FfiAskBid>(),
                BOOK_DEPTH as u64,
                &mut bid_len,
                asks.as_mut_ptr().cast::<FfiAskBid>(),
                BOOK_DEPTH as u64,
                &mut ask_len,
                &mut last_update_id,
                &mut update_id,
            )
        };
        // SAFETY: result comes straight from the call above.
        unsafe { interpret(result) }?;

        let take = |buf: &[MaybeUninit<FfiAskBid>], reported: u64| -> Vec<AskBid> {
            buf.iter()
                .take((reported as usize).min(BOOK_DEPTH))
                // SAFETY: the engine initialized the first `reported` slots.
                .map(|s| AskBid::from(unsafe { s.assume_init() }))
                .collect()
        };
        Ok(OrderbookResponse {
            market: market.to_string(),
            bids: take(&bids, bid_len),
            asks: take(&asks, ask_len),
            last_update_id,
            update_id,
        })
    }

    /// Latest traded price, `None` when the engine has not seen one yet.
    pub fn price_ticker(&self, market: &str) -> Result<Option<f64>, ExchangeError> {
        let market_c = to_c_string(market)?;
        let mut price = f64::NAN;
        // SAFETY: out-param points at a local.
        let result = unsafe { sys::get_price_ticker(self.client, market_c.as_ptr(), &mut price) };
        // SAFETY: result comes straight from the call above.
        unsafe { interpret(result) }?;
        Ok(if price.is_nan() { None } else { Some(price) })
    }

    /// Fetch OHLCV candles for a market and interval.
    pub fn historic_rates(&self, req: &HistoricRatesRequest) -> Result<Page<Candle>, ExchangeError> {
        let market_c = to_c_string(&req.market)?;
        let interval_c = to_c_string(req.interval.as_str())?;
        let pag = req.paginator.as_ref().map(Paginator::to_ffi).transpose()?;
        let capacity = page_capacity(req.paginator.as_ref().and_then(|p| p.limit));
        fetch_with(
            capacity,
            |buf, len, actual| unsafe {
                sys::get_historic_rates(
                    self.client,
                    market_c.as_ptr(),
                    interval_c.as_ptr(),
                    paginator_ptr(&pag),
                    buf,
                    len,
                    actual,
                )
            },
            |r| Ok(Candle::from(r)),
        )
    }

    /// Fetch public trade history for a market.
    pub fn historic_trades(&self, req: &HistoricTradesRequest) -> Result<Page<Trade>, ExchangeError> {
        let market_c = to_c_string(&req.market)?;
        let pag = req.paginator.as_ref().map(Paginator::to_ffi).transpose()?;
        let capacity = page_capacity(req.paginator.as_ref().and_then(|p| p.limit));
        fetch_with(
            capacity,
            |buf, len, actual| unsafe {
                sys::get_historic_trades(
                    self.client,
                    market_c.as_ptr(),
                    paginator_ptr(&pag),
                    buf,
                    len,
                    actual,
                )
            },
            |r| unsafe { Trade::from_ffi(r) },
        )
    }

    /// List the markets the venue offers.
    pub fn market_pairs(&self) -> Result<Page<MarketPair>, ExchangeError> {
        fetch_with(
            WIDE_PAGE_CAPACITY,
            |buf, len, actual| unsafe { sys::receive_pairs(self.client, buf, len, actual) },
            |r| unsafe { MarketPair::from_ffi(r) },
        )
    }

    // -- orders ------------------------------------------------------------

    /// Place a limit buy. Size and price cross as decimal text, verbatim.
    pub fn limit_buy(&self, req: &LimitOrderRequest) -> Result<Order, ExchangeError> {
        self.place_order(
            &req.market,
            &req.size,
            true,
            Some(&req.price),
            Side::Buy,
            req.time_in_force,
            req.post_only,
        )
    }

    /// Place a limit sell.
    pub fn limit_sell(&self, req: &LimitOrderRequest) -> Result<Order, ExchangeError> {
        self.place_order(
            &req.market,
            &req.size,
            true,
            Some(&req.price),
            Side::Sell,
            req.time_in_force,
            req.post_only,
        )
    }

    /// Place a market buy.
    pub fn market_buy(&self, req: &MarketOrderRequest) -> Result<Order, ExchangeError> {
        self.place_order(
            &req.market,
            &req.size,
            false,
            None,
            Side::Buy,
            TimeInForce::GoodTillCancelled,
            false,
        )
    }

    /// Place a market sell.
    pub fn market_sell(&self, req: &MarketOrderRequest) -> Result<Order, ExchangeError> {
        self.place_order(
            &req.market,
            &req.size,
            false,
            None,
            Side::Sell,
            TimeInForce::GoodTillCancelled,
            false,
        )
    }

    fn place_order(
        &self,
        market: &str,
        size: &str,
        limit: bool,
        price: Option<&str>,
        side: Side,
        time_in_force: TimeInForce,
        post_only: bool,
    ) -> Result<Order, ExchangeError> {
        let market_c = to_c_string(market)?;
        let size_c = to_c_string(size)?;
        let price_c = to_opt_c_string(price)?;
        let (tif, tif_duration_ms) = time_in_force.to_raw();
        let mut out = MaybeUninit::<FfiOrder>::uninit();
        // SAFETY: string args outlive the call; `out` points at a local
        // slot the engine writes on success.
        let result = unsafe {
            sys::place_order(
                self.client,
                market_c.as_ptr(),
                size_c.as_ptr(),
                limit,
                opt_ptr(&price_c),
                side.to_raw(),
                tif,
                tif_duration_ms,
                post_only,
                out.as_mut_ptr(),
            )
        };
        // SAFETY: result comes straight from the call above. On failure the
        // out slot is undefined and never read.
        unsafe { interpret(result) }?;
        debug!(market, size, limit, "order placed");
        // SAFETY: the engine wrote the record, decoded exactly once.
        unsafe { Order::from_ffi(out.assume_init()) }
    }

    /// Fetch currently open orders across all markets.
    pub fn open_orders(&self) -> Result<Page<Order>, ExchangeError> {
        fetch_with(
            DEFAULT_PAGE_CAPACITY,
            |buf, len, actual| unsafe { sys::get_all_open_orders(self.client, buf, len, actual) },
            |r| unsafe { Order::from_ffi(r) },
        )
    }

    /// Fetch own-order history, optionally scoped to one market.
    pub fn order_history(&self, req: &OrderHistoryRequest) -> Result<Page<Order>, ExchangeError> {
        let market_c = to_opt_c_string(req.market.as_deref())?;
        let pag = req.paginator.as_ref().map(Paginator::to_ffi).transpose()?;
        let capacity = page_capacity(req.paginator.as_ref().and_then(|p| p.limit));
        fetch_with(
            capacity,
            |buf, len, actual| unsafe {
                sys::get_order_history(
                    self.client,
                    opt_ptr(&market_c),
                    paginator_ptr(&pag),
                    buf,
                    len,
                    actual,
                )
            },
            |r| unsafe { Order::from_ffi(r) },
        )
    }

    /// Fetch own-trade history, optionally scoped to a market and/or order.
    pub fn trade_history(&self, req: &TradeHistoryRequest) -> Result<Page<Trade>, ExchangeError> {
        let market_c = to_opt_c_string(req.market.as_deref())?;
        let order_id_c = to_opt_c_string(req.order_id.as_deref())?;
        let pag = req.paginator.as_ref().map(Paginator::to_ffi).transpose()?;
        let capacity = page_capacity(req.paginator.as_ref().and_then(|p| p.limit));
        fetch_with(
            capacity,
            |buf, len, actual| unsafe {
                sys::get_trade_history(
                    self.client,
                    opt_ptr(&market_c),
                    opt_ptr(&order_id_c),
                    paginator_ptr(&pag),
                    buf,
                    len,
                    actual,
                )
            },
            |r| unsafe { Trade::from_ffi(r) },
        )
    }

    /// Fetch account balances.
    pub fn account_balances(&self, paginator: Option<&Paginator>) -> Result<Page<Balance>, ExchangeError> {
        let pag = paginator.map(Paginator::to_ffi).transpose()?;
        let capacity = page_capacity(paginator.and_then(|p| p.limit));
        fetch_with(
            capacity,
            |buf, len, actual| unsafe {
                sys::get_account_balances(self.client, paginator_ptr(&pag), buf, len, actual)
            },
            |r| unsafe { Balance::from_ffi(r) },
        )
    }

    /// Cancel one order by id, optionally scoped to a market.
    pub fn cancel_order(&self, order_id: &str, market: Option<&str>) -> Result<(), ExchangeError> {
        let order_id_c = to_c_string(order_id)?;
        let market_c = to_opt_c_string(market)?;
        // SAFETY: string args outlive the call.
        let result =
            unsafe { sys::cancel_order(self.client, order_id_c.as_ptr(), opt_ptr(&market_c)) };
        // SAFETY: result comes straight from the call above.
        unsafe { interpret(result) }?;
        info!(order_id, "order cancelled");
        Ok(())
    }

    /// Cancel all open orders (optionally scoped to one market) and return
    /// the ids the engine reports as cancelled.
    pub fn cancel_all_orders(&self, market: Option<&str>) -> Result<Page<String>, ExchangeError> {
        let market_c = to_opt_c_string(market)?;
        let page = fetch_with(
            WIDE_PAGE_CAPACITY,
            |buf, len, actual| unsafe {
                sys::cancel_all_orders(self.client, opt_ptr(&market_c), buf, len, actual)
            },
            // Each id is an owned string, released on decode.
            |p| Ok(unsafe { crate::text::decode_owned(p) }?.unwrap_or_default()),
        )?;
        info!(count = page.len(), "orders cancelled");
        Ok(page)
    }

    // -- streaming ---------------------------------------------------------

    /// Subscribe to order book updates for `market`. The listener runs on
    /// an engine thread and is registered only if the native subscribe
    /// succeeds.
    pub fn subscribe_orderbook<F>(
        &self,
        market: &str,
        listener: F,
    ) -> Result<SubscriptionToken, ExchangeError>
    where
        F: Fn(&OrderbookResponse) + Send + Sync + 'static,
    {
        let market_c = to_c_string(market)?;
        dispatcher().ensure_waiter();
        // SAFETY: the string arg outlives the call.
        let result = unsafe { sys::subscribe_orderbook(self.sub, market_c.as_ptr()) };
        // SAFETY: result comes straight from the call above.
        unsafe { interpret(result) }?;
        debug!(market, "orderbook subscription active");
        Ok(dispatcher().add_orderbook_listener(market, Arc::new(listener)))
    }

    /// Subscribe to trade pushes for `market`.
    pub fn subscribe_trades<F>(
        &self,
        market: &str,
        listener: F,
    ) -> Result<SubscriptionToken, ExchangeError>
    where
        F: Fn(&TradesResponse) + Send + Sync + 'static,
    {
        let market_c = to_c_string(market)?;
        dispatcher().ensure_waiter();
        // SAFETY: the string arg outlives the call.
        let result = unsafe { sys::subscribe_trades(self.sub, market_c.as_ptr()) };
        // SAFETY: result comes straight from the call above.
        unsafe { interpret(result) }?;
        debug!(market, "trades subscription active");
        Ok(dispatcher().add_trades_listener(market, Arc::new(listener)))
    }

    /// Drop one order book listener. The engine-side stream stays open;
    /// further updates for the market simply stop reaching this listener.
    pub fn unsubscribe_orderbook(&self, market: &str, token: SubscriptionToken) -> bool {
        dispatcher().remove_orderbook_listener(market, token)
    }

    /// Drop one trade listener.
    pub fn unsubscribe_trades(&self, market: &str, token: SubscriptionToken) -> bool {
        dispatcher().remove_trades_listener(market, token)
    }

    /// Install the stream error and ping handlers (replacing any previous
    /// ones) and start the background disconnect waiter.
    pub fn listen<E, P>(&self, on_error: E, on_ping: P)
    where
        E: Fn() + Send + Sync + 'static,
        P: Fn() + Send + Sync + 'static,
    {
        dispatcher().set_signal_handlers(Arc::new(on_error), Arc::new(on_ping));
        dispatcher().ensure_waiter();
    }

    /// Ask the engine to tear down the streaming side. Completion is
    /// signalled by the engine invoking the disconnect callback — observe
    /// it via [`wait_for_disconnect`](Self::wait_for_disconnect).
    pub fn disconnect(&self) {
        info!("disconnect requested");
        // SAFETY: the subscription handle stays valid until the engine
        // confirms teardown.
        unsafe { sys::disconnect(self.sub) };
    }

    /// Block until the engine reports the connection closed. Returns
    /// immediately if it already has.
    pub fn wait_for_disconnect(&self) {
        dispatcher().gate.wait();
    }
}
