//! Construction of authenticated gRPC channels.
//!
//! The returned [`GrpcChannel`] connects lazily: building it never touches
//! the network, and an unreachable server surfaces as a `tonic::Status` on
//! the first call. Building a channel spawns the transport's background
//! worker, so it must happen inside a Tokio runtime.

use std::fmt;

use tonic::{
    client::Grpc,
    codec::ProstCodec,
    codegen::http::uri::PathAndQuery,
    service::{interceptor::InterceptedService, Interceptor},
    transport::{Channel, ClientTlsConfig, Endpoint},
    IntoRequest,
    Response,
    Status,
};
use tracing::{debug, info};

use crate::{
    config::ChannelConfig,
    error::{ChannelError, ChannelResult},
    interceptor::{compose_interceptors, BearerAuthInterceptor, ComposedInterceptor},
    tls::build_client_tls_config,
};

pub const SECURE_CONNECTION_MESSAGE: &str = "Opened secure gRPC connection using certificates";
pub const INSECURE_CONNECTION_MESSAGE: &str =
    "Opened insecure gRPC connection (no certificates were passed)";

/// Whether the transport is protected by TLS. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    Secure,
    Insecure,
}

/// The service stack every call goes through.
pub type InterceptedChannel<I> = InterceptedService<Channel, I>;

/// A lazily connected channel whose calls carry the bearer token and are
/// bounded by the same message-size ceiling in both directions.
///
/// Cloning is cheap; clones share the underlying connection, which is
/// closed once the last clone is dropped.
#[derive(Clone)]
pub struct GrpcChannel<I = BearerAuthInterceptor> {
    inner: InterceptedChannel<I>,
    max_message_length: usize,
    security: SecurityMode,
}

impl<I> GrpcChannel<I>
where
    I: Interceptor + Clone,
{
    /// The bare intercepted service. It carries the bearer token but NOT the
    /// size ceiling: a client built on it falls back to tonic's defaults.
    /// Use [`GrpcChannel::build_client`] for generated clients.
    pub fn service(&self) -> InterceptedChannel<I> {
        self.inner.clone()
    }

    /// Builds a client on this channel and applies the ceiling to it.
    ///
    /// Generated clients share no trait for their limit setters, so both the
    /// constructor and the setters are passed in:
    ///
    /// ```ignore
    /// let client = channel.build_client(FooClient::new, |client, limit| {
    ///     client
    ///         .max_decoding_message_size(limit)
    ///         .max_encoding_message_size(limit)
    /// });
    /// ```
    pub fn build_client<C>(
        &self,
        new: impl FnOnce(InterceptedChannel<I>) -> C,
        apply_limits: impl FnOnce(C, usize) -> C,
    ) -> C {
        apply_limits(new(self.inner.clone()), self.max_message_length)
    }

    /// A raw client with the channel's size limits applied.
    pub fn client(&self) -> Grpc<InterceptedChannel<I>> {
        self.build_client(Grpc::new, |grpc, limit| {
            grpc.max_decoding_message_size(limit)
                .max_encoding_message_size(limit)
        })
    }

    /// Issues a unary call to `path` (e.g. `/echo.Echo/UnaryEcho`) using the
    /// prost codec. The outcome of the call is returned unchanged.
    ///
    /// A request larger than the ceiling fails with `Code::OutOfRange`
    /// before anything is sent.
    pub async fn unary<Req, Resp>(
        &self,
        path: &'static str,
        request: impl IntoRequest<Req>,
    ) -> Result<Response<Resp>, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let request = request.into_request();
        let encoded_len = request.get_ref().encoded_len();
        if encoded_len > self.max_message_length {
            return Err(Status::out_of_range(format!(
                "Error, encoded message length too large: found {} bytes, the limit is: {} bytes",
                encoded_len, self.max_message_length
            )));
        }

        let mut grpc = self.client();
        grpc.ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {}", e)))?;
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        grpc.unary(
            request,
            PathAndQuery::from_static(path),
            codec,
        )
        .await
    }

    pub fn max_message_length(&self) -> usize {
        self.max_message_length
    }

    pub fn security(&self) -> SecurityMode {
        self.security
    }

    pub fn is_secure(&self) -> bool {
        self.security == SecurityMode::Secure
    }
}

impl<I> fmt::Debug for GrpcChannel<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcChannel")
            .field("max_message_length", &self.max_message_length)
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}

/// Opens a channel to `server_address` that sends `authorization: Bearer
/// <token>` with every call.
///
/// With `root_certificates` the connection is secured by TLS trusting those
/// PEM certificates; without them it is plaintext.
pub fn create_channel(
    server_address: &str,
    token: &str,
    root_certificates: Option<&[u8]>,
    max_message_length: usize,
) -> ChannelResult<GrpcChannel> {
    let mut config =
        ChannelConfig::new(server_address, token).with_max_message_length(max_message_length);
    config.root_certificates = root_certificates.map(<[u8]>::to_vec);
    create_channel_with_config(&config)
}

pub fn create_channel_with_config(config: &ChannelConfig) -> ChannelResult<GrpcChannel> {
    let interceptor = BearerAuthInterceptor::new(&config.token)?;
    open_channel(config, interceptor)
}

/// Like [`create_channel_with_config`], with `interceptor` running after the
/// bearer token has been attached.
pub fn create_channel_with_interceptor<I>(
    config: &ChannelConfig,
    interceptor: I,
) -> ChannelResult<GrpcChannel<ComposedInterceptor<BearerAuthInterceptor, I>>>
where
    I: Interceptor + Clone,
{
    let auth = BearerAuthInterceptor::new(&config.token)?;
    open_channel(config, compose_interceptors(auth, interceptor))
}

fn open_channel<I>(config: &ChannelConfig, interceptor: I) -> ChannelResult<GrpcChannel<I>>
where
    I: Interceptor + Clone,
{
    config.validate()?;

    let tls_config = config
        .root_certificates
        .as_deref()
        .map(|certs| build_client_tls_config(certs, config.domain_name.as_deref()))
        .transpose()?;

    let security = if tls_config.is_some() {
        SecurityMode::Secure
    } else {
        SecurityMode::Insecure
    };

    let endpoint = build_endpoint(config, tls_config)?;
    let channel = endpoint.connect_lazy();

    debug!(server_address = %config.server_address, "Intercepting channel");
    let inner = InterceptedService::new(channel, interceptor);

    match security {
        SecurityMode::Secure => info!(
            server_address = %config.server_address,
            max_message_length = config.max_message_length,
            "{}",
            SECURE_CONNECTION_MESSAGE
        ),
        SecurityMode::Insecure => info!(
            server_address = %config.server_address,
            max_message_length = config.max_message_length,
            "{}",
            INSECURE_CONNECTION_MESSAGE
        ),
    }

    Ok(GrpcChannel {
        inner,
        max_message_length: config.max_message_length,
        security,
    })
}

fn build_endpoint(
    config: &ChannelConfig,
    tls_config: Option<ClientTlsConfig>,
) -> ChannelResult<Endpoint> {
    let uri = endpoint_uri(&config.server_address, tls_config.is_some())?;
    let mut endpoint =
        Endpoint::from_shared(uri).map_err(|source| ChannelError::InvalidAddress {
            address: config.server_address.clone(),
            source,
        })?;

    if let Some(timeout) = config.connect_timeout() {
        endpoint = endpoint.connect_timeout(timeout);
    }

    if let Some(tls_config) = tls_config {
        endpoint = endpoint.tls_config(tls_config).map_err(|e| {
            ChannelError::invalid_certificates(format!("tls config rejected: {}", e))
        })?;
    }

    Ok(endpoint)
}

/// Prepends the scheme matching the transport. An explicit scheme must agree
/// with it: tonic dials `http://` in plaintext even when TLS is configured.
fn endpoint_uri(address: &str, secure: bool) -> ChannelResult<String> {
    let expected = if secure { "https" } else { "http" };
    match address.split_once("://") {
        None => Ok(format!("{}://{}", expected, address)),
        Some((scheme, _)) if scheme.eq_ignore_ascii_case(expected) => Ok(address.to_string()),
        Some((scheme, _)) => Err(ChannelError::SchemeMismatch {
            address: address.to_string(),
            scheme: scheme.to_string(),
            expected,
        }),
    }
}
