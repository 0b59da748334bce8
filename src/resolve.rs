use crate::{PingError, PingResult};
use std::io;
use std::net::IpAddr;

/// Resolves `host` to a single address.
///
/// Literal addresses are used as they are. Otherwise the first address
/// returned by the system resolver wins; further addresses are ignored.
pub fn lookup_host(host: &str) -> PingResult<IpAddr> {
    if let Ok(ip_addr) = host.parse::<IpAddr>() {
        return Ok(ip_addr);
    }

    let ips: Vec<IpAddr> =
        dns_lookup::lookup_host(host).map_err(|source| PingError::Resolution { host: host.to_owned(), source })?;
    tracing::debug!("resolved {host} to {ips:?}");
    ips.into_iter().next().ok_or_else(|| PingError::Resolution {
        host: host.to_owned(),
        source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
    })
}
