//! Tagged-result decoding and the client error taxonomy.
//!
//! Every fallible engine call returns an [`FfiResult`]: a raw tag plus an
//! optionally attached, engine-owned message string. [`interpret`] turns
//! that record into `Result<(), ExchangeError>` and is called at every
//! call site *before* any buffer contents are trusted.
//!
//! Decode order matters: the message pointer is decoded and released
//! first, whenever it is non-null and regardless of the tag, so a
//! malformed record cannot leak the allocation. Only then is the tag
//! branched on — and a tag outside the known set surfaces as
//! [`ExchangeError::UnknownTag`], never as silent success.

use thiserror::Error;

use exlink_sys::{FfiResult, ResultTag};

use crate::text::decode_owned;

/// Errors surfaced by the client.
///
/// One variant per native result tag, each carrying the engine-supplied
/// message (or the `"Unknown error"` fallback when the engine attached
/// none), plus the two conditions detected on this side of the boundary:
/// [`UnknownTag`](Self::UnknownTag) for protocol drift and
/// [`MalformedString`](Self::MalformedString) for unterminated text.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("binance: {0}")]
    Binance(String),
    #[error("coinbase: {0}")]
    Coinbase(String),
    #[error("nash protocol: {0}")]
    NashProtocol(String),
    #[error("missing implementation: {0}")]
    MissingImplementation(String),
    #[error("asset not found: {0}")]
    AssetNotFound(String),
    #[error("no api key set: {0}")]
    NoApiKeySet(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("socket error: {0}")]
    Socket(String),
    #[error("timestamp retrieval failed: {0}")]
    GetTimestampFailed(String),
    #[error("request error: {0}")]
    Req(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("invalid payload signature: {0}")]
    InvalidPayloadSignature(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("poison error: {0}")]
    Poison(String),
    #[error("json error: {0}")]
    Json(String),
    #[error("float parse error: {0}")]
    ParseFloat(String),
    #[error("url parse error: {0}")]
    UrlParser(String),
    #[error("websocket transport error: {0}")]
    Tungstenite(String),
    #[error("timestamp error: {0}")]
    Timestamp(String),
    #[error("unknown response: {0}")]
    UnknownResponse(String),
    #[error("unparsable response: {0}")]
    NotParsableResponse(String),
    #[error("missing parameter: {0}")]
    MissingParameter(String),
    #[error("websocket message not supported: {0}")]
    WebSocketMessageNotSupported(String),

    /// The engine reported a result tag this crate does not know. Usually
    /// means the engine is newer than the binding.
    #[error("unknown result tag {tag}: {message}")]
    UnknownTag { tag: u32, message: String },

    /// Engine-owned text with no terminator within the scan bound.
    #[error("malformed engine string: {0}")]
    MalformedString(String),
}

/// Fallback used when a failure record carries no message pointer.
const UNKNOWN_MESSAGE: &str = "Unknown error";

/// Decode a tagged result into `Ok(())` or a classified failure, releasing
/// the attached message exactly once.
///
/// # Safety
///
/// `result` must come from an engine call that has not been interpreted
/// yet: its message pointer (if any) is consumed here.
pub(crate) unsafe fn interpret(result: FfiResult) -> Result<(), ExchangeError> {
    // Message first, tag second: a non-null pointer is owned by us no
    // matter what the tag claims.
    let message = match unsafe { decode_owned(result.message) } {
        Ok(Some(m)) => m,
        Ok(None) => UNKNOWN_MESSAGE.to_string(),
        Err(e) => return Err(e),
    };

    let Some(tag) = ResultTag::from_raw(result.tag) else {
        return Err(ExchangeError::UnknownTag {
            tag: result.tag,
            message,
        });
    };

    Err(match tag {
        ResultTag::Ok => return Ok(()),
        ResultTag::InvalidArgument => ExchangeError::InvalidArgument(message),
        ResultTag::BinanceError => ExchangeError::Binance(message),
        ResultTag::CoinbaseError => ExchangeError::Coinbase(message),
        ResultTag::NashProtocolError => ExchangeError::NashProtocol(message),
        ResultTag::MissingImplementation => ExchangeError::MissingImplementation(message),
        ResultTag::AssetNotFound => ExchangeError::AssetNotFound(message),
        ResultTag::NoApiKeySet => ExchangeError::NoApiKeySet(message),
        ResultTag::InternalServerError => ExchangeError::InternalServerError(message),
        ResultTag::ServiceUnavailable => ExchangeError::ServiceUnavailable(message),
        ResultTag::Unauthorized => ExchangeError::Unauthorized(message),
        ResultTag::SymbolNotFound => ExchangeError::SymbolNotFound(message),
        ResultTag::SocketError => ExchangeError::Socket(message),
        ResultTag::GetTimestampFailed => ExchangeError::GetTimestampFailed(message),
        ResultTag::ReqError => ExchangeError::Req(message),
        ResultTag::InvalidHeaderError => ExchangeError::InvalidHeader(message),
        ResultTag::InvalidPayloadSignature => ExchangeError::InvalidPayloadSignature(message),
        ResultTag::IoError => ExchangeError::Io(message),
        ResultTag::PoisonError => ExchangeError::Poison(message),
        ResultTag::JsonError => ExchangeError::Json(message),
        ResultTag::ParseFloatError => ExchangeError::ParseFloat(message),
        ResultTag::UrlParserError => ExchangeError::UrlParser(message),
        ResultTag::Tungstenite => ExchangeError::Tungstenite(message),
        ResultTag::TimestampError => ExchangeError::Timestamp(message),
        ResultTag::UnknownResponse => ExchangeError::UnknownResponse(message),
        ResultTag::NotParsableResponse => ExchangeError::NotParsableResponse(message),
        ResultTag::MissingParameter => ExchangeError::MissingParameter(message),
        ResultTag::WebSocketMessageNotSupported => {
            ExchangeError::WebSocketMessageNotSupported(message)
        }
    })
}
