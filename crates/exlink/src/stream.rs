//! Subscription registry and streaming dispatcher.
//!
//! The engine pushes market data by writing into long-lived shared buffers
//! and then invoking a registered callback from its own thread. The ABI's
//! callbacks carry no user-data pointer, so all dispatch state lives in a
//! process-wide singleton: per-market listener registries, the at-most-one
//! ping/error handlers, the shared buffers themselves and the disconnect
//! gate.
//!
//! Registry access is rwlock-guarded — subscriptions originate on
//! application threads while delivery runs on engine threads. Listeners
//! are cloned out of the registry before invocation so a listener may
//! itself subscribe without deadlocking.
//!
//! Buffer discipline: each buffer is single-producer (the engine writes
//! before invoking the callback) and single-consumer (the callback decodes
//! on the invoking thread, before returning). No Rust reference to a
//! buffer outlives a callback invocation.

use std::mem::MaybeUninit;
use std::os::raw::c_char;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use ahash::AHashMap;
use tracing::{debug, warn};

use exlink_sys::{FfiAskBid, FfiTrade};

use crate::sync::DisconnectGate;
use crate::text::decode_owned;
use crate::types::{AskBid, OrderbookResponse, Trade, TradesResponse};

/// Capacity of each shared stream buffer (bids, asks, trades), matching
/// the engine's expectations for one push.
pub(crate) const STREAM_BUF_LEN: usize = 1024;

/// Identifies one registered listener, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

pub(crate) type OrderbookListener = Arc<dyn Fn(&OrderbookResponse) + Send + Sync>;
pub(crate) type TradesListener = Arc<dyn Fn(&TradesResponse) + Send + Sync>;
pub(crate) type SignalHandler = Arc<dyn Fn() + Send + Sync>;

// ---------------------------------------------------------------------------
// Shared stream buffers
// ---------------------------------------------------------------------------

/// Raw pointers to the buffers handed to `init_subscriptions`. Allocated
/// once and never reclaimed — the engine keeps the pointers for the
/// process lifetime.
pub(crate) struct StreamBuffers {
    pub(crate) bids: *mut FfiAskBid,
    pub(crate) asks: *mut FfiAskBid,
    pub(crate) trades: *mut FfiTrade,
}

// SAFETY: the pointers address 'static allocations. The engine is the
// sole writer and serializes each write with the callback that reads it
// on the same thread, so no slot is accessed concurrently.
unsafe impl Send for StreamBuffers {}
unsafe impl Sync for StreamBuffers {}

fn alloc_buffer<T: Copy>(len: usize) -> *mut T {
    let boxed: Box<[MaybeUninit<T>]> = vec![MaybeUninit::<T>::zeroed(); len].into_boxed_slice();
    Box::into_raw(boxed) as *mut T
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

type Registry<L> = RwLock<AHashMap<String, Vec<(SubscriptionToken, L)>>>;

pub(crate) struct Dispatcher {
    orderbook: Registry<OrderbookListener>,
    trades: Registry<TradesListener>,
    on_ping: RwLock<Option<SignalHandler>>,
    on_error: RwLock<Option<SignalHandler>>,
    pub(crate) gate: Arc<DisconnectGate>,
    pub(crate) buffers: StreamBuffers,
    waiter_started: AtomicBool,
    next_token: AtomicU64,
}

/// The process-wide dispatcher instance.
pub(crate) fn dispatcher() -> &'static Dispatcher {
    static DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();
    DISPATCHER.get_or_init(|| Dispatcher {
        orderbook: RwLock::new(AHashMap::new()),
        trades: RwLock::new(AHashMap::new()),
        on_ping: RwLock::new(None),
        on_error: RwLock::new(None),
        gate: Arc::new(DisconnectGate::new()),
        buffers: StreamBuffers {
            bids: alloc_buffer(STREAM_BUF_LEN),
            asks: alloc_buffer(STREAM_BUF_LEN),
            trades: alloc_buffer(STREAM_BUF_LEN),
        },
        waiter_started: AtomicBool::new(false),
        next_token: AtomicU64::new(1),
    })
}

impl Dispatcher {
    fn mint_token(&self) -> SubscriptionToken {
        SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Append an order-book listener for `market`. Called only after the
    /// native subscribe call succeeded.
    pub(crate) fn add_orderbook_listener(
        &self,
        market: &str,
        listener: OrderbookListener,
    ) -> SubscriptionToken {
        let token = self.mint_token();
        self.orderbook
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(market.to_string())
            .or_default()
            .push((token, listener));
        token
    }

    pub(crate) fn add_trades_listener(
        &self,
        market: &str,
        listener: TradesListener,
    ) -> SubscriptionToken {
        let token = self.mint_token();
        self.trades
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(market.to_string())
            .or_default()
            .push((token, listener));
        token
    }

    /// Remove one listener by token. Returns whether anything was removed.
    pub(crate) fn remove_orderbook_listener(&self, market: &str, token: SubscriptionToken) -> bool {
        remove_from(&self.orderbook, market, token)
    }

    pub(crate) fn remove_trades_listener(&self, market: &str, token: SubscriptionToken) -> bool {
        remove_from(&self.trades, market, token)
    }

    /// Install the at-most-one ping/error handlers, replacing any previous
    /// ones.
    pub(crate) fn set_signal_handlers(&self, on_error: SignalHandler, on_ping: SignalHandler) {
        *self
            .on_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(on_error);
        *self.on_ping.write().unwrap_or_else(PoisonError::into_inner) = Some(on_ping);
    }

    /// Start the background disconnect waiter, once. Subsequent calls are
    /// no-ops.
    pub(crate) fn ensure_waiter(&self) {
        if self
            .waiter_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let gate = Arc::clone(&self.gate);
            if let Err(e) = std::thread::Builder::new()
                .name("exlink-disconnect-waiter".into())
                .spawn(move || {
                    gate.wait();
                    debug!("disconnect signal received, waiter exiting");
                })
            {
                warn!(error = %e, "could not spawn disconnect waiter");
                self.waiter_started.store(false, Ordering::Release);
            }
        }
    }

    /// Clear all registries, handlers and the gate between test cases.
    #[cfg(test)]
    pub(crate) fn reset(&self) {
        self.orderbook
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.trades
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self
            .on_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self.on_ping.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.gate.signal();
        self.gate.reset();
        self.waiter_started.store(false, Ordering::Release);
    }
}

fn remove_from<L>(registry: &Registry<L>, market: &str, token: SubscriptionToken) -> bool {
    let mut map = registry.write().unwrap_or_else(PoisonError::into_inner);
    let Some(listeners) = map.get_mut(market) else {
        return false;
    };
    let before = listeners.len();
    listeners.retain(|(t, _)| *t != token);
    before != listeners.len()
}

// ---------------------------------------------------------------------------
// Engine-invoked callback handlers
// ---------------------------------------------------------------------------

/// Decode the market name pushed alongside an event. The pointer is owned
/// and released here; a missing or malformed name drops the event.
fn decode_market(market: *mut c_char) -> Option<String> {
    // SAFETY: the engine allocated the string for this invocation and
    // transfers ownership to the callback.
    match unsafe { decode_owned(market) } {
        Ok(Some(m)) => Some(m),
        Ok(None) => {
            warn!("push event with null market, dropping");
            None
        }
        Err(e) => {
            warn!(error = %e, "push event with undecodable market, dropping");
            None
        }
    }
}

/// Order-book push: the engine has written `bid_len`/`ask_len` levels into
/// the shared bid/ask buffers. Runs on an engine thread.
pub(crate) extern "C" fn on_orderbook_raw(
    bid_len: u64,
    ask_len: u64,
    market: *mut c_char,
    last_update_id: u64,
    update_id: u64,
) {
    let Some(market) = decode_market(market) else {
        return;
    };
    let d = dispatcher();

    let bid_count = (bid_len as usize).min(STREAM_BUF_LEN);
    let ask_count = (ask_len as usize).min(STREAM_BUF_LEN);

    // SAFETY: the engine wrote the first `*_count` slots before invoking
    // this callback and will not touch the buffers until it returns.
    let (bids, asks) = unsafe {
        (
            std::slice::from_raw_parts(d.buffers.bids, bid_count),
            std::slice::from_raw_parts(d.buffers.asks, ask_count),
        )
    };
    let snapshot = OrderbookResponse {
        market: market.clone(),
        asks: asks.iter().copied().map(AskBid::from).collect(),
        bids: bids.iter().copied().map(AskBid::from).collect(),
        last_update_id,
        update_id,
    };

    let listeners: Vec<OrderbookListener> = {
        let map = d.orderbook.read().unwrap_or_else(PoisonError::into_inner);
        match map.get(&market) {
            // An update for a market nobody subscribed to is not an error.
            None => return,
            Some(ls) => ls.iter().map(|(_, l)| Arc::clone(l)).collect(),
        }
    };
    for listener in listeners {
        listener(&snapshot);
    }
}

/// Trade push: the engine has written `trade_len` records into the shared
/// trade buffer. Runs on an engine thread.
pub(crate) extern "C" fn on_trades_raw(trade_len: u64, market: *mut c_char) {
    let Some(market) = decode_market(market) else {
        return;
    };
    let d = dispatcher();

    let count = (trade_len as usize).min(STREAM_BUF_LEN);

    // Decode every record before the registry lookup: each one carries
    // owned strings that must be released even when the batch ends up
    // dropped, and a bad record must not strand the strings behind it.
    let mut trades = Vec::with_capacity(count);
    let mut dropped = false;
    for i in 0..count {
        // SAFETY: the engine wrote the first `count` slots before invoking
        // this callback; each record is decoded exactly once.
        let decoded = unsafe { Trade::from_ffi(d.buffers.trades.add(i).read()) };
        match decoded {
            Ok(t) => trades.push(t),
            Err(e) => {
                warn!(error = %e, market, "undecodable trade in push, dropping batch");
                dropped = true;
            }
        }
    }
    if dropped {
        return;
    }

    let listeners: Vec<TradesListener> = {
        let map = d.trades.read().unwrap_or_else(PoisonError::into_inner);
        match map.get(&market) {
            None => return,
            Some(ls) => ls.iter().map(|(_, l)| Arc::clone(l)).collect(),
        }
    };
    let batch = TradesResponse { market, trades };
    for listener in listeners {
        listener(&batch);
    }
}

pub(crate) extern "C" fn on_ping_raw() {
    let handler = dispatcher()
        .on_ping
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    if let Some(h) = handler {
        h();
    }
}

pub(crate) extern "C" fn on_error_raw() {
    let handler = dispatcher()
        .on_error
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    if let Some(h) = handler {
        h();
    }
}

pub(crate) extern "C" fn on_disconnect_raw() {
    debug!("engine disconnect callback");
    dispatcher().gate.signal();
}
