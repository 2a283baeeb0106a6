//! In-process stand-in for the native engine, test builds only.
//!
//! Defines every ABI symbol the crate declares so test binaries link
//! without the real shared library. The stub tracks string ownership
//! (every allocation must come back through `free_string` exactly once,
//! double and foreign frees panic), serves canned data, and lets tests
//! script the tagged result of any entry point.
//!
//! The engine state is one big mutex. `free_string` locks it too, so the
//! push helpers copy the captured callbacks out and release the lock
//! before invoking them — the callbacks decode owned strings and would
//! deadlock otherwise. Tests share the process-wide dispatcher, so every
//! test takes [`lock_tests`] first and starts with [`reset`].

#![allow(clippy::missing_safety_doc)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::{CStr, CString, c_void};
use std::os::raw::c_char;
use std::ptr::NonNull;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use exlink_sys::{
    FfiAskBid, FfiBalance, FfiBinanceConfig, FfiCandle, FfiMarketPair, FfiOrder, FfiPaginator,
    FfiResult, FfiTrade,
};

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct PlaceOrderCall {
    pub market: String,
    pub size: String,
    pub limit: bool,
    pub price: Option<String>,
    pub side: u32,
    pub tif: u32,
    pub tif_duration_ms: u64,
    pub post_only: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct NashInitCall {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub client_id: u64,
    pub environment: u32,
    pub timeout_ms: u64,
    pub affiliate_code: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StubTrade {
    pub id: String,
    pub order_id: String,
    pub price: f64,
    pub qty: f64,
    pub fees: f64,
    pub side: u32,
    pub liquidity: u32,
    pub created_at: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StubOrder {
    pub id: String,
    pub market_pair: String,
    pub client_order_id: Option<String>,
    pub created_at: u64,
    pub order_type: u32,
    pub side: u32,
    pub status: u32,
    pub size: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StubPair {
    pub base: String,
    pub quote: String,
    pub symbol: String,
    pub base_increment: String,
    pub quote_increment: String,
    pub base_min_price: Option<String>,
    pub quote_min_price: Option<String>,
}

/// Captured `init_subscriptions` registration. Pointers are stored as
/// integers so the state stays `Send`.
#[derive(Clone, Copy)]
struct Callbacks {
    on_error: extern "C" fn(),
    on_ping: extern "C" fn(),
    on_orderbook: extern "C" fn(u64, u64, *mut c_char, u64, u64),
    on_trades: extern "C" fn(u64, *mut c_char),
    on_disconnect: extern "C" fn(),
    bids: usize,
    bids_len: usize,
    asks: usize,
    asks_len: usize,
    trades: usize,
    trades_len: usize,
}

#[derive(Default)]
struct EngineState {
    allocated: usize,
    freed: usize,
    live: HashSet<usize>,
    scripted: HashMap<&'static str, VecDeque<(u32, Option<String>)>>,
    book_bids: Vec<(f64, f64)>,
    book_asks: Vec<(f64, f64)>,
    book_last_update_id: u64,
    book_update_id: u64,
    price: Option<f64>,
    candles: Vec<FfiCandle>,
    trades: Vec<StubTrade>,
    orders: Vec<StubOrder>,
    balances: Vec<(String, String, String)>,
    pairs: Vec<StubPair>,
    cancelled_ids: Vec<String>,
    place_order: Option<PlaceOrderCall>,
    nash_init: Option<NashInitCall>,
    subscribed_orderbooks: Vec<String>,
    subscribed_trades: Vec<String>,
    callbacks: Option<Callbacks>,
}

static ENGINE: LazyLock<Mutex<EngineState>> = LazyLock::new(|| Mutex::new(EngineState::default()));

fn engine() -> MutexGuard<'static, EngineState> {
    ENGINE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Serializes tests: the dispatcher and the engine state are process
/// globals.
pub(crate) fn lock_tests() -> MutexGuard<'static, ()> {
    static GATE: Mutex<()> = Mutex::new(());
    GATE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fresh engine state and a cleared dispatcher.
pub(crate) fn reset() {
    *engine() = EngineState::default();
    crate::stream::dispatcher().reset();
}

// ---------------------------------------------------------------------------
// State accessors for tests
// ---------------------------------------------------------------------------

fn alloc_locked(state: &mut EngineState, s: &str) -> *mut c_char {
    let ptr = CString::new(s).unwrap().into_raw();
    state.allocated += 1;
    state.live.insert(ptr as usize);
    ptr
}

/// Hand out an engine-owned string, as the real engine would.
pub(crate) fn alloc_cstr(s: &str) -> *mut c_char {
    alloc_locked(&mut engine(), s)
}

pub(crate) fn allocated_count() -> usize {
    engine().allocated
}

pub(crate) fn freed_count() -> usize {
    engine().freed
}

/// Queue the tagged result the next call of `entry` will return. Calls
/// with nothing queued succeed with a null message.
pub(crate) fn script_result(entry: &'static str, tag: u32, message: Option<&str>) {
    engine()
        .scripted
        .entry(entry)
        .or_default()
        .push_back((tag, message.map(str::to_string)));
}

pub(crate) fn set_order_book(
    bids: &[(f64, f64)],
    asks: &[(f64, f64)],
    last_update_id: u64,
    update_id: u64,
) {
    let mut state = engine();
    state.book_bids = bids.to_vec();
    state.book_asks = asks.to_vec();
    state.book_last_update_id = last_update_id;
    state.book_update_id = update_id;
}

pub(crate) fn set_price(price: f64) {
    engine().price = Some(price);
}

pub(crate) fn set_candles(candles: Vec<FfiCandle>) {
    engine().candles = candles;
}

pub(crate) fn set_trades(trades: Vec<StubTrade>) {
    engine().trades = trades;
}

pub(crate) fn set_orders(orders: Vec<StubOrder>) {
    engine().orders = orders;
}

/// `(asset, total, free)` triples, decimal text as the engine reports it.
pub(crate) fn set_balances(balances: &[(&str, &str, &str)]) {
    engine().balances = balances
        .iter()
        .map(|(a, t, f)| (a.to_string(), t.to_string(), f.to_string()))
        .collect();
}

pub(crate) fn set_pairs(pairs: Vec<StubPair>) {
    engine().pairs = pairs;
}

pub(crate) fn set_cancelled_ids(ids: &[&str]) {
    engine().cancelled_ids = ids.iter().map(|s| s.to_string()).collect();
}

pub(crate) fn last_place_order() -> Option<PlaceOrderCall> {
    engine().place_order.clone()
}

pub(crate) fn last_nash_init() -> Option<NashInitCall> {
    engine().nash_init.clone()
}

pub(crate) fn subscribed_orderbooks() -> Vec<String> {
    engine().subscribed_orderbooks.clone()
}

#[allow(dead_code)]
pub(crate) fn subscribed_trades() -> Vec<String> {
    engine().subscribed_trades.clone()
}

/// Write a snapshot into the registered buffers and fire the order book
/// callback, exactly as the engine does after a stream update.
pub(crate) fn push_orderbook(
    market: &str,
    bids: &[(f64, f64)],
    asks: &[(f64, f64)],
    last_update_id: u64,
    update_id: u64,
) {
    let (cb, market_ptr) = {
        let mut state = engine();
        let cb = state.callbacks.expect("no streaming client initialized");
        assert!(bids.len() <= cb.bids_len && asks.len() <= cb.asks_len);
        for (i, &(price, qty)) in bids.iter().enumerate() {
            unsafe { (cb.bids as *mut FfiAskBid).add(i).write(FfiAskBid { price, qty }) };
        }
        for (i, &(price, qty)) in asks.iter().enumerate() {
            unsafe { (cb.asks as *mut FfiAskBid).add(i).write(FfiAskBid { price, qty }) };
        }
        (cb, alloc_locked(&mut state, market))
    };
    // Invoked outside the lock: the callback frees the market string.
    (cb.on_orderbook)(
        bids.len() as u64,
        asks.len() as u64,
        market_ptr,
        last_update_id,
        update_id,
    );
}

/// Write a trade batch into the registered buffer and fire the trades
/// callback.
pub(crate) fn push_trades(market: &str, trades: &[StubTrade]) {
    let (cb, market_ptr) = {
        let mut state = engine();
        let cb = state.callbacks.expect("no streaming client initialized");
        assert!(trades.len() <= cb.trades_len);
        for (i, t) in trades.iter().enumerate() {
            let record = trade_record(&mut state, t, market);
            unsafe { (cb.trades as *mut FfiTrade).add(i).write(record) };
        }
        (cb, alloc_locked(&mut state, market))
    };
    (cb.on_trades)(trades.len() as u64, market_ptr);
}

fn trade_record(state: &mut EngineState, t: &StubTrade, market: &str) -> FfiTrade {
    FfiTrade {
        id: alloc_locked(state, &t.id),
        order_id: alloc_locked(state, &t.order_id),
        market_pair: alloc_locked(state, market),
        price: t.price,
        qty: t.qty,
        fees: t.fees,
        side: t.side,
        liquidity: t.liquidity,
        created_at: t.created_at,
    }
}

// ---------------------------------------------------------------------------
// ABI symbol definitions
// ---------------------------------------------------------------------------

fn pop_result(state: &mut EngineState, entry: &'static str) -> FfiResult {
    match state.scripted.get_mut(entry).and_then(VecDeque::pop_front) {
        Some((tag, message)) => FfiResult {
            tag,
            message: message
                .map(|m| alloc_locked(state, &m))
                .unwrap_or(std::ptr::null_mut()),
        },
        None => FfiResult {
            tag: 0,
            message: std::ptr::null_mut(),
        },
    }
}

fn borrow_str(p: *const c_char) -> Option<String> {
    if p.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned())
    }
}

fn dummy_handle() -> *mut c_void {
    NonNull::<u8>::dangling().as_ptr().cast()
}

#[unsafe(no_mangle)]
pub extern "C" fn init_binance(_config: FfiBinanceConfig) -> *mut c_void {
    dummy_handle()
}

#[unsafe(no_mangle)]
pub extern "C" fn init_nash(
    apikey: *const c_char,
    secret: *const c_char,
    client_id: u64,
    environment: u32,
    timeout_ms: u64,
    affiliate_code: *const c_char,
) -> *mut c_void {
    engine().nash_init = Some(NashInitCall {
        api_key: borrow_str(apikey),
        api_secret: borrow_str(secret),
        client_id,
        environment,
        timeout_ms,
        affiliate_code: borrow_str(affiliate_code),
    });
    dummy_handle()
}

#[unsafe(no_mangle)]
pub extern "C" fn init_subscriptions(
    _client: *mut c_void,
    on_error: extern "C" fn(),
    on_ping: extern "C" fn(),
    on_orderbook: extern "C" fn(u64, u64, *mut c_char, u64, u64),
    on_trades: extern "C" fn(u64, *mut c_char),
    on_disconnect: extern "C" fn(),
    bids_buff: *mut FfiAskBid,
    bids_buff_len: usize,
    asks_buff: *mut FfiAskBid,
    asks_buff_len: usize,
    trades_buff: *mut FfiTrade,
    trades_buff_len: usize,
) -> *mut c_void {
    engine().callbacks = Some(Callbacks {
        on_error,
        on_ping,
        on_orderbook,
        on_trades,
        on_disconnect,
        bids: bids_buff as usize,
        bids_len: bids_buff_len,
        asks: asks_buff as usize,
        asks_len: asks_buff_len,
        trades: trades_buff as usize,
        trades_len: trades_buff_len,
    });
    dummy_handle()
}

#[unsafe(no_mangle)]
pub extern "C" fn disconnect(_sub_handle: *mut c_void) {
    let cb = engine().callbacks;
    // Confirmation arrives through the callback, as with the real engine.
    if let Some(cb) = cb {
        (cb.on_disconnect)();
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn order_book(
    _client: *mut c_void,
    _market: *const c_char,
    bids_buff: *mut FfiAskBid,
    bids_buff_len: u64,
    actual_bids_len: *mut u64,
    asks_buff: *mut FfiAskBid,
    asks_buff_len: u64,
    actual_asks_len: *mut u64,
    last_update_id: *mut u64,
    update_id: *mut u64,
) -> FfiResult {
    let mut state = engine();
    let result = pop_result(&mut state, "order_book");
    if result.tag != 0 {
        return result;
    }
    unsafe {
        for (i, &(price, qty)) in state
            .book_bids
            .iter()
            .take(bids_buff_len as usize)
            .enumerate()
        {
            bids_buff.add(i).write(FfiAskBid { price, qty });
        }
        for (i, &(price, qty)) in state
            .book_asks
            .iter()
            .take(asks_buff_len as usize)
            .enumerate()
        {
            asks_buff.add(i).write(FfiAskBid { price, qty });
        }
        *actual_bids_len = state.book_bids.len() as u64;
        *actual_asks_len = state.book_asks.len() as u64;
        *last_update_id = state.book_last_update_id;
        *update_id = state.book_update_id;
    }
    result
}

#[unsafe(no_mangle)]
pub extern "C" fn get_price_ticker(
    _client: *mut c_void,
    _market: *const c_char,
    price: *mut f64,
) -> FfiResult {
    let mut state = engine();
    let result = pop_result(&mut state, "get_price_ticker");
    if result.tag == 0 {
        unsafe { *price = state.price.unwrap_or(f64::NAN) };
    }
    result
}

#[unsafe(no_mangle)]
pub extern "C" fn get_historic_rates(
    _client: *mut c_void,
    _market: *const c_char,
    _interval: *const c_char,
    _paginator: *const FfiPaginator,
    candles_buff: *mut FfiCandle,
    candles_buff_len: usize,
    actual_candles_len: *mut usize,
) -> FfiResult {
    let mut state = engine();
    let result = pop_result(&mut state, "get_historic_rates");
    if result.tag != 0 {
        return result;
    }
    unsafe {
        for (i, c) in state.candles.iter().take(candles_buff_len).enumerate() {
            candles_buff.add(i).write(*c);
        }
        *actual_candles_len = state.candles.len();
    }
    result
}

fn write_trades(
    state: &mut EngineState,
    entry: &'static str,
    buff: *mut FfiTrade,
    buff_len: usize,
    actual_len: *mut usize,
) -> FfiResult {
    let result = pop_result(state, entry);
    if result.tag != 0 {
        return result;
    }
    let trades = state.trades.clone();
    unsafe {
        for (i, t) in trades.iter().take(buff_len).enumerate() {
            let record = trade_record(state, t, "BTC-USDT");
            buff.add(i).write(record);
        }
        *actual_len = trades.len();
    }
    result
}

#[unsafe(no_mangle)]
pub extern "C" fn get_historic_trades(
    _client: *mut c_void,
    _market: *const c_char,
    _paginator: *const FfiPaginator,
    trades_buff: *mut FfiTrade,
    trades_buff_len: usize,
    actual_trades_len: *mut usize,
) -> FfiResult {
    write_trades(
        &mut engine(),
        "get_historic_trades",
        trades_buff,
        trades_buff_len,
        actual_trades_len,
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn receive_pairs(
    _client: *mut c_void,
    pairs_buff: *mut FfiMarketPair,
    pairs_buff_len: usize,
    actual_pairs_len: *mut usize,
) -> FfiResult {
    let mut state = engine();
    let result = pop_result(&mut state, "receive_pairs");
    if result.tag != 0 {
        return result;
    }
    let pairs = state.pairs.clone();
    unsafe {
        for (i, p) in pairs.iter().take(pairs_buff_len).enumerate() {
            let record = FfiMarketPair {
                base: alloc_locked(&mut state, &p.base),
                quote: alloc_locked(&mut state, &p.quote),
                symbol: alloc_locked(&mut state, &p.symbol),
                base_increment: alloc_locked(&mut state, &p.base_increment),
                quote_increment: alloc_locked(&mut state, &p.quote_increment),
                base_min_price: p
                    .base_min_price
                    .as_deref()
                    .map(|s| alloc_locked(&mut state, s))
                    .unwrap_or(std::ptr::null_mut()),
                quote_min_price: p
                    .quote_min_price
                    .as_deref()
                    .map(|s| alloc_locked(&mut state, s))
                    .unwrap_or(std::ptr::null_mut()),
            };
            pairs_buff.add(i).write(record);
        }
        *actual_pairs_len = pairs.len();
    }
    result
}

#[unsafe(no_mangle)]
pub extern "C" fn place_order(
    _client: *mut c_void,
    market: *const c_char,
    size: *const c_char,
    limit: bool,
    price: *const c_char,
    side: u32,
    tif: u32,
    tif_duration_ms: u64,
    post_only: bool,
    out_order: *mut FfiOrder,
) -> FfiResult {
    let mut state = engine();
    let market = borrow_str(market).unwrap_or_default();
    let size = borrow_str(size).unwrap_or_default();
    let price = borrow_str(price);
    state.place_order = Some(PlaceOrderCall {
        market: market.clone(),
        size: size.clone(),
        limit,
        price: price.clone(),
        side,
        tif,
        tif_duration_ms,
        post_only,
    });
    let result = pop_result(&mut state, "place_order");
    if result.tag != 0 {
        return result;
    }
    // Echo the request back as a freshly accepted order.
    let record = FfiOrder {
        id: alloc_locked(&mut state, "stub-order-1"),
        market_pair: alloc_locked(&mut state, &market),
        client_order_id: alloc_locked(&mut state, "client-1"),
        created_at: 1,
        order_type: if limit { 0 } else { 1 },
        side,
        status: 0,
        size: size.parse().unwrap_or(0.0),
        price: price.and_then(|p| p.parse().ok()).unwrap_or(f64::NAN),
    };
    unsafe { out_order.write(record) };
    result
}

fn write_orders(
    state: &mut EngineState,
    entry: &'static str,
    buff: *mut FfiOrder,
    buff_len: usize,
    actual_len: *mut usize,
) -> FfiResult {
    let result = pop_result(state, entry);
    if result.tag != 0 {
        return result;
    }
    let orders = state.orders.clone();
    unsafe {
        for (i, o) in orders.iter().take(buff_len).enumerate() {
            let record = FfiOrder {
                id: alloc_locked(state, &o.id),
                market_pair: alloc_locked(state, &o.market_pair),
                client_order_id: o
                    .client_order_id
                    .as_deref()
                    .map(|s| alloc_locked(state, s))
                    .unwrap_or(std::ptr::null_mut()),
                created_at: o.created_at,
                order_type: o.order_type,
                side: o.side,
                status: o.status,
                size: o.size,
                price: o.price,
            };
            buff.add(i).write(record);
        }
        *actual_len = orders.len();
    }
    result
}

#[unsafe(no_mangle)]
pub extern "C" fn get_all_open_orders(
    _client: *mut c_void,
    orders_buff: *mut FfiOrder,
    orders_buff_len: usize,
    actual_orders_len: *mut usize,
) -> FfiResult {
    write_orders(
        &mut engine(),
        "get_all_open_orders",
        orders_buff,
        orders_buff_len,
        actual_orders_len,
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn get_order_history(
    _client: *mut c_void,
    _market: *const c_char,
    _paginator: *const FfiPaginator,
    orders_buff: *mut FfiOrder,
    orders_buff_len: usize,
    actual_orders_len: *mut usize,
) -> FfiResult {
    write_orders(
        &mut engine(),
        "get_order_history",
        orders_buff,
        orders_buff_len,
        actual_orders_len,
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn get_trade_history(
    _client: *mut c_void,
    _market: *const c_char,
    _order_id: *const c_char,
    _paginator: *const FfiPaginator,
    trades_buff: *mut FfiTrade,
    trades_buff_len: usize,
    actual_trades_len: *mut usize,
) -> FfiResult {
    write_trades(
        &mut engine(),
        "get_trade_history",
        trades_buff,
        trades_buff_len,
        actual_trades_len,
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn get_account_balances(
    _client: *mut c_void,
    _paginator: *const FfiPaginator,
    balances_buff: *mut FfiBalance,
    balances_buff_len: usize,
    actual_balances_len: *mut usize,
) -> FfiResult {
    let mut state = engine();
    let result = pop_result(&mut state, "get_account_balances");
    if result.tag != 0 {
        return result;
    }
    let balances = state.balances.clone();
    unsafe {
        for (i, (asset, total, free)) in balances.iter().take(balances_buff_len).enumerate() {
            let record = FfiBalance {
                asset: alloc_locked(&mut state, asset),
                total: alloc_locked(&mut state, total),
                free: alloc_locked(&mut state, free),
            };
            balances_buff.add(i).write(record);
        }
        *actual_balances_len = balances.len();
    }
    result
}

#[unsafe(no_mangle)]
pub extern "C" fn cancel_order(
    _client: *mut c_void,
    _order_id: *const c_char,
    _market: *const c_char,
) -> FfiResult {
    pop_result(&mut engine(), "cancel_order")
}

#[unsafe(no_mangle)]
pub extern "C" fn cancel_all_orders(
    _client: *mut c_void,
    _market: *const c_char,
    ids_buff: *mut *mut c_char,
    ids_buff_len: usize,
    actual_ids_len: *mut usize,
) -> FfiResult {
    let mut state = engine();
    let result = pop_result(&mut state, "cancel_all_orders");
    if result.tag != 0 {
        return result;
    }
    let ids = state.cancelled_ids.clone();
    unsafe {
        for (i, id) in ids.iter().take(ids_buff_len).enumerate() {
            ids_buff.add(i).write(alloc_locked(&mut state, id));
        }
        *actual_ids_len = ids.len();
    }
    result
}

#[unsafe(no_mangle)]
pub extern "C" fn subscribe_orderbook(
    _sub_handle: *mut c_void,
    market: *const c_char,
) -> FfiResult {
    let mut state = engine();
    let result = pop_result(&mut state, "subscribe_orderbook");
    if result.tag == 0 {
        if let Some(m) = borrow_str(market) {
            state.subscribed_orderbooks.push(m);
        }
    }
    result
}

#[unsafe(no_mangle)]
pub extern "C" fn subscribe_trades(_sub_handle: *mut c_void, market: *const c_char) -> FfiResult {
    let mut state = engine();
    let result = pop_result(&mut state, "subscribe_trades");
    if result.tag == 0 {
        if let Some(m) = borrow_str(market) {
            state.subscribed_trades.push(m);
        }
    }
    result
}

#[unsafe(no_mangle)]
pub extern "C" fn free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    let mut state = engine();
    assert!(
        state.live.remove(&(s as usize)),
        "free_string on a pointer the engine does not own (double free?)"
    );
    state.freed += 1;
    drop(unsafe { CString::from_raw(s) });
}
