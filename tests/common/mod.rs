//! In-process echo server used to observe what the client puts on the wire.

#![allow(dead_code)]

use std::{
    convert::Infallible,
    net::SocketAddr,
    task::{Context, Poll},
};

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{
    codec::ProstCodec,
    codegen::{http, Body, BoxFuture, Service, StdError},
    server::{Grpc, NamedService, UnaryService},
    transport::{Identity, Server, ServerTlsConfig},
    Request,
    Response,
    Status,
};

pub const UNARY_ECHO: &str = "/echo.Echo/UnaryEcho";

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub payload: Vec<u8>,
    /// When non-zero the reply carries this many bytes instead of the echo.
    #[prost(uint64, tag = "2")]
    pub reply_size: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoReply {
    #[prost(bytes = "vec", tag = "1")]
    pub payload: Vec<u8>,
    /// The `authorization` header as received by the server.
    #[prost(string, tag = "2")]
    pub authorization: String,
    #[prost(string, repeated, tag = "3")]
    pub metadata_keys: Vec<String>,
}

impl EchoRequest {
    pub fn echo(payload: Vec<u8>) -> Self {
        Self {
            payload,
            reply_size: 0,
        }
    }
}

struct UnaryEcho;

impl UnaryService<EchoRequest> for UnaryEcho {
    type Response = EchoReply;
    type Future = BoxFuture<Response<EchoReply>, Status>;

    fn call(&mut self, request: Request<EchoRequest>) -> Self::Future {
        Box::pin(async move {
            let authorization = request
                .metadata()
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let metadata_keys = request
                .metadata()
                .keys()
                .map(|key| match key {
                    tonic::metadata::KeyRef::Ascii(key) => key.as_str().to_string(),
                    tonic::metadata::KeyRef::Binary(key) => key.as_str().to_string(),
                })
                .collect();

            let request = request.into_inner();
            let payload = if request.reply_size > 0 {
                vec![7u8; request.reply_size as usize]
            } else {
                request.payload
            };
            Ok(Response::new(EchoReply {
                payload,
                authorization,
                metadata_keys,
            }))
        })
    }
}

#[derive(Clone, Default)]
pub struct EchoServer;

impl<B> Service<http::Request<B>> for EchoServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        match req.uri().path() {
            UNARY_ECHO => Box::pin(async move {
                let codec: ProstCodec<EchoReply, EchoRequest> = ProstCodec::default();
                let mut grpc = Grpc::new(codec);
                Ok(grpc.unary(UnaryEcho, req).await)
            }),
            _ => Box::pin(async move { Ok(Status::unimplemented("unknown method").into_http()) }),
        }
    }
}

impl NamedService for EchoServer {
    const NAME: &'static str = "echo.Echo";
}

/// Serves [`EchoServer`] on an ephemeral local port.
pub async fn spawn_echo_server(tls: Option<ServerTlsConfig>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut builder = Server::builder();
    if let Some(tls) = tls {
        builder = builder.tls_config(tls).unwrap();
    }
    let router = builder.add_service(EchoServer);
    tokio::spawn(async move {
        router
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub struct TestCerts {
    pub ca_pem: String,
    pub server_cert_pem: String,
    pub server_key_pem: String,
}

impl TestCerts {
    /// A CA and a `localhost` server certificate signed by it.
    pub fn generate() -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "bearer-channel test CA");
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let server_key = KeyPair::generate().unwrap();
        let server_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let server_cert = server_params
            .signed_by(&server_key, &ca_cert, &ca_key)
            .unwrap();

        Self {
            ca_pem: ca_cert.pem(),
            server_cert_pem: server_cert.pem(),
            server_key_pem: server_key.serialize_pem(),
        }
    }

    pub fn server_tls_config(&self) -> ServerTlsConfig {
        ServerTlsConfig::new().identity(Identity::from_pem(
            &self.server_cert_pem,
            &self.server_key_pem,
        ))
    }
}
