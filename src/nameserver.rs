//! Nameserver address normalization

use crate::dns::constants::DNS_PORT;
use crate::error::{Result, Rfc2136Error};
use std::net::Ipv6Addr;
use tracing::debug;

/// Return `address` as `host:port`, appending the default DNS port when none is given.
///
/// Addresses that cannot be interpreted are returned unchanged so the transport
/// reports the real cause when it tries to reach them.
pub fn normalize(address: &str) -> String {
    try_normalize(address).unwrap_or_else(|err| {
        debug!("{}", err);
        address.to_string()
    })
}

/// Like [`normalize`], but reports addresses that were left untouched
/// because they are malformed as [`Rfc2136Error::AddressNormalizationSkipped`].
pub fn try_normalize(address: &str) -> Result<String> {
    let skipped = || Rfc2136Error::AddressNormalizationSkipped(address.to_string());

    if address.is_empty() {
        return Err(skipped());
    }

    // Bracketed IPv6, with or without a port
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(skipped)?;
        if host.is_empty() {
            return Err(skipped());
        }
        return match tail {
            "" => Ok(format!("[{}]:{}", host, DNS_PORT)),
            _ => match tail.strip_prefix(':') {
                Some(port) if is_port(port) => Ok(address.to_string()),
                _ => Err(skipped()),
            },
        };
    }

    match address.matches(':').count() {
        0 => Ok(format!("{}:{}", address, DNS_PORT)),
        1 => {
            let (host, port) = address.split_once(':').ok_or_else(skipped)?;
            if !host.is_empty() && is_port(port) {
                Ok(address.to_string())
            } else {
                Err(skipped())
            }
        }
        // Several colons without brackets can only be a bare IPv6 literal
        _ => match address.parse::<Ipv6Addr>() {
            Ok(addr) => Ok(format!("[{}]:{}", addr, DNS_PORT)),
            Err(_) => Err(skipped()),
        },
    }
}

fn is_port(port: &str) -> bool {
    !port.is_empty() && port.parse::<u16>().is_ok()
}
