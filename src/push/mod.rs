//! Two-tier push delivery: primary server-side procedure with a direct
//! gateway fallback.

mod backoff;
mod dispatcher;
mod gateway;
mod rpc;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use dispatcher::PushDispatcher;
pub use gateway::{
    GatewayError, HttpPushGateway, PushGateway, PushRequest, PushResponse, PushTicket,
    TicketStatus,
};
pub use rpc::{PostgresPrimaryChannel, PrimaryChannel, RpcError};
