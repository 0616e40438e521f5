//! Kalshi REST API client.
//!
//! - [`http`]: retrying transport over a pluggable sender
//! - [`signer`]: RSA-PSS request signing
//! - [`paginate`]: cursor pagination with loop detection
//! - [`payload`]: lenient response sanitising
//! - [`types`]: query and order request types
//! - [`client`]: endpoint wrappers

pub mod client;
pub mod http;
pub mod paginate;
pub mod payload;
pub mod signer;
pub mod types;

pub use client::KalshiClient;
pub use http::{HttpRequest, HttpResponse, HttpSend, ReqwestSender, RetryPolicy, RetryingTransport, SendError};
pub use paginate::{Page, PageOptions};
pub use signer::RequestSigner;
pub use types::{
    Action, Choice, CreateOrder, MarketsQuery, MveFilter, OrderStatus, OrdersQuery,
    SelfTradePrevention, SeriesQuery, Side, TimeInForce,
};
