//! Call wrappers applied to every outgoing request of a channel.

use std::fmt;

use tonic::{
    metadata::{Ascii, MetadataValue},
    service::Interceptor,
    Request,
    Status,
};

use crate::error::ChannelResult;

pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Injects `authorization: Bearer <token>` into every call.
///
/// The header value is prepared once, so a token that cannot travel in an
/// HTTP header is rejected when the interceptor is built rather than on the
/// first call.
#[derive(Clone)]
pub struct BearerAuthInterceptor {
    header: MetadataValue<Ascii>,
}

impl BearerAuthInterceptor {
    pub fn new(token: &str) -> ChannelResult<Self> {
        let mut header: MetadataValue<Ascii> = format!("Bearer {}", token).try_into()?;
        header.set_sensitive(true);
        Ok(Self { header })
    }

    pub fn header_value(&self) -> &MetadataValue<Ascii> {
        &self.header
    }
}

impl Interceptor for BearerAuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert(AUTHORIZATION_HEADER, self.header.clone());
        Ok(request)
    }
}

impl fmt::Debug for BearerAuthInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuthInterceptor").finish_non_exhaustive()
    }
}

/// Runs `first`, then `second` on its output. The first error wins.
#[derive(Debug, Clone)]
pub struct ComposedInterceptor<A, B> {
    first: A,
    second: B,
}

impl<A, B> Interceptor for ComposedInterceptor<A, B>
where
    A: Interceptor,
    B: Interceptor,
{
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let request = self.first.call(request)?;
        self.second.call(request)
    }
}

pub fn compose_interceptors<A, B>(first: A, second: B) -> ComposedInterceptor<A, B>
where
    A: Interceptor,
    B: Interceptor,
{
    ComposedInterceptor { first, second }
}
