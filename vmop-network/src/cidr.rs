//! Address normalization: turns an address + subnet mask pair reported by a
//! backend into CIDR notation.

use std::net::IpAddr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use thiserror::Error;

use crate::resources::IpFamily;
use crate::types::IpConfig;

/// Address normalization errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid IP address: {0:?}")]
    InvalidIp(String),

    #[error("invalid CIDR address: {0:?}")]
    InvalidCidr(String),

    #[error("invalid subnet mask {mask:?} for address {ip}")]
    InvalidMask { ip: String, mask: String },

    #[error("address {ip} is not {expected:?}")]
    FamilyMismatch { ip: String, expected: IpFamily },
}

/// Builds the CIDR form of `ip` using the prefix length encoded by `mask`.
///
/// The host bits of the address are kept, so `192.168.1.110` with
/// `255.255.255.0` becomes `192.168.1.110/24`. IPv6 addresses are rendered
/// in their canonical compressed form.
pub fn ip_cidr(ip: &str, mask: &str) -> Result<IpNet, AddressError> {
    let addr: IpAddr = ip
        .trim()
        .parse()
        .map_err(|_| AddressError::InvalidIp(ip.to_string()))?;

    let invalid_mask = || AddressError::InvalidMask {
        ip: ip.to_string(),
        mask: mask.to_string(),
    };

    let mask: IpAddr = mask.trim().parse().map_err(|_| invalid_mask())?;

    match (addr, mask) {
        (IpAddr::V4(addr), IpAddr::V4(mask)) => {
            let prefix = ipnet::ipv4_mask_to_prefix(mask).map_err(|_| invalid_mask())?;
            let net = Ipv4Net::new(addr, prefix).map_err(|_| invalid_mask())?;
            Ok(IpNet::V4(net))
        }
        (IpAddr::V6(addr), IpAddr::V6(mask)) => {
            let prefix = ipnet::ipv6_mask_to_prefix(mask).map_err(|_| invalid_mask())?;
            let net = Ipv6Net::new(addr, prefix).map_err(|_| invalid_mask())?;
            Ok(IpNet::V6(net))
        }
        _ => Err(invalid_mask()),
    }
}

/// Normalizes one backend address entry into an [`IpConfig`].
///
/// `family` is the address family the backend claims for the entry, if it
/// reports one. The gateway is passed through verbatim.
pub fn normalize(
    ip: &str,
    mask: &str,
    gateway: &str,
    family: Option<IpFamily>,
) -> Result<IpConfig, AddressError> {
    let net = ip_cidr(ip, mask)?;
    let is_ipv4 = matches!(net, IpNet::V4(_));

    if let Some(expected) = family {
        if (expected == IpFamily::Ipv4) != is_ipv4 {
            return Err(AddressError::FamilyMismatch {
                ip: ip.to_string(),
                expected,
            });
        }
    }

    Ok(IpConfig {
        ip_cidr: net.to_string(),
        is_ipv4,
        gateway: gateway.to_string(),
    })
}
