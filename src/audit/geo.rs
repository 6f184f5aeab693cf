//! IP geolocation for audit entries.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use tracing::warn;
use url::Url;

const INTERNAL_NETWORK: &str = "Internal Network";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub country: Option<String>,
    pub city: Option<String>,
}

impl Location {
    fn internal() -> Self {
        Self {
            country: Some(INTERNAL_NETWORK.to_string()),
            city: Some(INTERNAL_NETWORK.to_string()),
        }
    }
}

/// Resolves a public address to a coarse location.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<Location>;
}

/// Used when no lookup service is configured.
#[derive(Clone, Debug)]
pub struct NoopGeoLookup;

#[async_trait]
impl GeoLookup for NoopGeoLookup {
    async fn lookup(&self, _ip: IpAddr) -> Result<Location> {
        Ok(Location::default())
    }
}

#[derive(Deserialize)]
struct LookupResponse {
    country: Option<String>,
    city: Option<String>,
}

/// Queries `GET {base}/{ip}` and expects `{"country": .., "city": ..}`.
#[derive(Clone, Debug)]
pub struct HttpGeoLookup {
    client: reqwest::Client,
    base: Url,
}

impl HttpGeoLookup {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(std::time::Duration::from_secs(3))
            .build()?;
        Ok(Self { client, base })
    }

    /// `{base}/{ip}`, whether or not `base` ends with a slash.
    fn lookup_url(&self, ip: IpAddr) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("geo lookup url cannot be a base: {}", self.base))?
            .pop_if_empty()
            .push(&ip.to_string());
        Ok(url)
    }
}

#[async_trait]
impl GeoLookup for HttpGeoLookup {
    async fn lookup(&self, ip: IpAddr) -> Result<Location> {
        let url = self.lookup_url(ip)?;
        let response: LookupResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(Location {
            country: response.country,
            city: response.city,
        })
    }
}

/// Private, carrier-grade NAT (tailscale) and loopback ranges.
#[must_use]
pub fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_private() || v4.is_loopback() || (a == 100 && (b & 0xc0) == 64)
        }
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal(IpAddr::V4(v4)),
            None => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
        },
    }
}

/// Location of `ip`, never failing: unparsable addresses and lookup errors
/// yield an empty location.
pub async fn locate(geo: &dyn GeoLookup, ip: &str) -> Location {
    let Ok(addr) = ip.parse::<IpAddr>() else {
        return Location::default();
    };
    if is_internal(addr) {
        return Location::internal();
    }
    match geo.lookup(addr).await {
        Ok(location) => location,
        Err(err) => {
            warn!("Geo lookup failed for {ip}: {err:#}");
            Location::default()
        }
    }
}
