//! Hickory resolver construction.

use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::{
    TokioResolver,
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
};

/// Parse configured nameserver strings, skipping (and logging) invalid ones.
pub(crate) fn parse_nameservers(servers: &[String]) -> Vec<IpAddr> {
    servers
        .iter()
        .filter_map(|server| match server.trim().parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                log::warn!("Ignoring invalid DNS server address: {server}");
                None
            }
        })
        .collect()
}

/// Build a resolver that targets `nameservers`, or the system configuration
/// when the list is empty.
pub(crate) fn build_resolver(nameservers: &[IpAddr], timeout: Duration) -> TokioResolver {
    if !nameservers.is_empty() {
        let config = ResolverConfig::from_parts(
            None,
            vec![],
            NameServerConfigGroup::from_ips_clear(nameservers, 53, true),
        );
        let provider = TokioConnectionProvider::default();
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        return TokioResolver::builder_with_config(config, provider)
            .with_options(opts)
            .build();
    }

    build_system_resolver(timeout)
}

/// Build a resolver using the host system DNS configuration (with fallback).
fn build_system_resolver(timeout: Duration) -> TokioResolver {
    #[cfg(any(unix, target_os = "windows"))]
    {
        match TokioResolver::builder_tokio() {
            Ok(mut builder) => {
                builder.options_mut().timeout = timeout;
                return builder.build();
            }
            Err(e) => {
                log::warn!(
                    "Failed to load system DNS configuration, falling back to defaults: {e}"
                );
            }
        }
    }

    let provider = TokioConnectionProvider::default();
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    TokioResolver::builder_with_config(ResolverConfig::default(), provider)
        .with_options(opts)
        .build()
}
