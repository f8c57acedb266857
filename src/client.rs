// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use log::debug;
use url::Url;

use crate::connection::auth::Auth;
use crate::connection::resolver::HostResolver;
use crate::connection::transport::{HttpTransport, UreqTransport};
use crate::connection::{Connection, JsonCodec, SerdeJsonCodec};
use crate::database::Database;
use crate::error::{ArangoError, Result};

/// How a multi-host client picks the host for each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostStrategy {
    /// Stick with one host until a caller excludes it (cluster default).
    #[default]
    Fallback,
    /// Rotate through the hosts request by request.
    RoundRobin,
    /// Pick uniformly at random.
    Random,
}

/// Entry point of the driver.
///
/// A client holds the parsed host list and the pluggable transport/codec
/// pair; [`ArangoClient::db`] mints independent database handles on top of
/// them.
///
/// # Example
/// ```no_run
/// use arango::{ArangoClient, Auth};
///
/// # fn main() -> arango::Result<()> {
/// let client = ArangoClient::new("http://localhost:8529")?;
/// let db = client.db("_system", Auth::basic("root", "passwd"))?;
/// let version = db.version(false)?.value()?;
/// println!("connected to {version}");
/// # Ok(())
/// # }
/// ```
pub struct ArangoClient {
    hosts: Vec<Url>,
    strategy: HostStrategy,
    transport: Arc<dyn HttpTransport>,
    codec: Arc<dyn JsonCodec>,
}

impl std::fmt::Debug for ArangoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArangoClient")
            .field("hosts", &self.hosts)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl ArangoClient {
    /// Create a client for one or more coordinator URLs, comma separated.
    ///
    /// Every entry must be an absolute `http`/`https` URL.
    pub fn new(hosts: &str) -> Result<Self> {
        Self::with_hosts(hosts.split(','))
    }

    /// Create a client from an explicit host list.
    pub fn with_hosts<'a>(hosts: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let hosts = hosts
            .into_iter()
            .map(|host| {
                let host = host.trim();
                let url = Url::parse(host)
                    .map_err(|err| ArangoError::invalid_input(format!("host {host:?}: {err}")))?;
                match url.scheme() {
                    "http" | "https" => Ok(url),
                    scheme => Err(ArangoError::invalid_input(format!(
                        "host {host:?}: unsupported scheme {scheme:?}"
                    ))),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        if hosts.is_empty() {
            return Err(ArangoError::invalid_input("at least one host is required"));
        }
        debug!("client created for {} host(s)", hosts.len());
        Ok(Self {
            hosts,
            strategy: HostStrategy::default(),
            transport: Arc::new(UreqTransport::new()),
            codec: Arc::new(SerdeJsonCodec),
        })
    }

    /// Select how hosts are picked when more than one is configured.
    /// Ignored for single-host clients.
    pub fn with_host_strategy(mut self, strategy: HostStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Swap out the HTTP layer, e.g., for tests.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Swap out JSON encoding/decoding.
    pub fn with_codec(mut self, codec: Arc<dyn JsonCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn hosts(&self) -> &[Url] {
        &self.hosts
    }

    /// Open a handle onto `name`, authenticating every request with `auth`.
    ///
    /// No request is made here; use [`Database::verify_connectivity`] to
    /// eagerly check the credentials.
    pub fn db(&self, name: &str, auth: Auth) -> Result<Database> {
        let resolver = match (self.hosts.len(), self.strategy) {
            (1, _) => HostResolver::single(),
            (n, HostStrategy::Fallback) => HostResolver::fallback(n)?,
            (n, HostStrategy::RoundRobin) => HostResolver::round_robin(n)?,
            (n, HostStrategy::Random) => HostResolver::random(n)?,
        };
        let conn = Connection::new(
            self.hosts.clone(),
            name,
            auth,
            resolver,
            Arc::clone(&self.transport),
            Arc::clone(&self.codec),
        );
        Ok(Database::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_comma_separated_hosts() {
        let client =
            ArangoClient::new("http://a:8529, http://b:8529 ,https://c:8529").unwrap();
        assert_eq!(client.hosts().len(), 3);
        assert_eq!(client.hosts()[1].host_str(), Some("b"));
    }

    #[rstest]
    #[case("")]
    #[case("localhost:8529")]
    #[case("ftp://a:8529")]
    #[case("http://a:8529,not a url")]
    fn rejects_bad_host_lists(#[case] hosts: &str) {
        let err = ArangoClient::new(hosts).unwrap_err();
        assert!(matches!(err, ArangoError::InvalidInput { .. }));
    }

    #[test]
    fn single_host_always_uses_single_resolver() {
        let client = ArangoClient::new("http://a:8529")
            .unwrap()
            .with_host_strategy(HostStrategy::RoundRobin);
        let db = client.db("_system", Auth::None).unwrap();
        assert_eq!(db.name(), "_system");
    }
}
