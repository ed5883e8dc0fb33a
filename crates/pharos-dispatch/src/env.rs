//! Deployment environment — how node endpoints are addressed.
//!
//! Fixed at startup from the `REVERSE_PROXY` and `SECURED` flags:
//!
//! | reverse proxy | secured | scheme | port  | base                  |
//! |---------------|---------|--------|-------|-----------------------|
//! | false         | false   | http   | 48098 | `/api/v1`             |
//! | true          | false   | http   | 80    | `/pharos-node/api/v1` |
//! | true          | true    | https  | 443   | `/pharos-node/api/v1` |

use std::net::Ipv6Addr;

use thiserror::Error;

/// Port the node agent listens on when reached directly.
pub const DEFAULT_NODE_PORT: u16 = 48098;

const DIRECT_BASE: &str = "/api/v1";
const PROXIED_BASE: &str = "/pharos-node/api/v1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("SECURED=true requires REVERSE_PROXY=true")]
    SecuredWithoutProxy,
}

/// Immutable addressing environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    reverse_proxy: bool,
    secured: bool,
}

impl Environment {
    pub fn new(reverse_proxy: bool, secured: bool) -> Result<Self, EnvironmentError> {
        if secured && !reverse_proxy {
            return Err(EnvironmentError::SecuredWithoutProxy);
        }
        Ok(Self {
            reverse_proxy,
            secured,
        })
    }

    /// Plain HTTP, no proxy.
    pub fn direct() -> Self {
        Self {
            reverse_proxy: false,
            secured: false,
        }
    }

    pub fn reverse_proxy(&self) -> bool {
        self.reverse_proxy
    }

    pub fn secured(&self) -> bool {
        self.secured
    }

    pub fn scheme(&self) -> &'static str {
        if self.secured { "https" } else { "http" }
    }

    pub fn node_port(&self) -> u16 {
        match (self.reverse_proxy, self.secured) {
            (false, _) => DEFAULT_NODE_PORT,
            (true, false) => 80,
            (true, true) => 443,
        }
    }

    /// API base path, shared by inbound routes and outbound node URLs.
    pub fn base_path(&self) -> &'static str {
        if self.reverse_proxy {
            PROXIED_BASE
        } else {
            DIRECT_BASE
        }
    }

    /// Build `scheme://ip:port/base/fragment1/fragment2/...`.
    pub fn node_url(&self, ip: &str, fragments: &[&str]) -> String {
        let host = if ip.parse::<Ipv6Addr>().is_ok() {
            format!("[{ip}]")
        } else {
            ip.to_string()
        };

        let mut url = format!(
            "{}://{}:{}{}",
            self.scheme(),
            host,
            self.node_port(),
            self.base_path()
        );
        for fragment in fragments {
            let fragment = fragment.trim_matches('/');
            if !fragment.is_empty() {
                url.push('/');
                url.push_str(fragment);
            }
        }
        url
    }

    /// Build the same path against every address, preserving order.
    pub fn node_urls<'a>(
        &self,
        ips: impl IntoIterator<Item = &'a str>,
        fragments: &[&str],
    ) -> Vec<String> {
        ips.into_iter()
            .map(|ip| self.node_url(ip, fragments))
            .collect()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::direct()
    }
}
