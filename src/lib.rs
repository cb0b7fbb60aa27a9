//! Authenticated gRPC client channels.
//!
//! [`create_channel`] opens a lazily connected channel that attaches
//! `authorization: Bearer <token>` to every call and bounds sent and
//! received messages by the same ceiling. Passing PEM root certificates
//! secures the transport with TLS.

pub mod channel;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod tls;
pub mod tracing;

pub use channel::{
    create_channel,
    create_channel_with_config,
    create_channel_with_interceptor,
    GrpcChannel,
    InterceptedChannel,
    SecurityMode,
};
pub use config::{ChannelConfig, GRPC_MAX_MESSAGE_LENGTH};
pub use error::{ChannelError, ChannelResult};
pub use interceptor::{compose_interceptors, BearerAuthInterceptor, ComposedInterceptor};
