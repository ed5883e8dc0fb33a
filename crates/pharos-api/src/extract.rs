//! Request extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

/// Address of the calling peer.
///
/// Proxy headers win over the socket address. `None` when neither is
/// available (e.g. in-process calls).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddr(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for RemoteAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = forwarded_for(&parts.headers) {
            return Ok(Self(Some(ip)));
        }
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string());
        Ok(Self(peer))
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let first = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    first("x-forwarded-for").or_else(|| first("x-real-ip"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Option<String> {
        let (mut parts, ()) = req.into_parts();
        RemoteAddr::from_request_parts(&mut parts, &()).await.unwrap().0
    }

    #[tokio::test]
    async fn proxy_header_wins() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "10.0.0.7, 172.16.0.1")
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(extract(req).await.as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn falls_back_to_socket_address() {
        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(extract(req).await.as_deref(), Some("127.0.0.1"));

        let req = Request::builder().header("x-real-ip", "10.0.0.8").body(()).unwrap();
        assert_eq!(extract(req).await.as_deref(), Some("10.0.0.8"));

        assert_eq!(extract(Request::builder().body(()).unwrap()).await, None);
    }
}
