use std::net::IpAddr;
use std::str::FromStr;

use crate::config::FilterConfig;
use crate::error::ConfigError;

/// An address block in `addr/prefix` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    base: IpAddr,
    prefix: u8,
}

impl FromStr for Cidr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Range(s.to_owned());
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let base: IpAddr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        let max = if base.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(invalid());
        }
        Ok(Self { base, prefix })
    }
}

impl Cidr {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.base, unmap(ip)) {
            (IpAddr::V4(base), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(base) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(base), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(base) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

/// `::ffff:a.b.c.d` peers from dual-stack sockets compare as IPv4.
fn unmap(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

/// Loopback and private-range membership over the configured lists.
#[derive(Debug, Clone)]
pub struct NetworkPolicy {
    loopback: Vec<String>,
    private: Vec<Cidr>,
}

impl NetworkPolicy {
    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let private = config
            .private_ranges
            .iter()
            .map(|r| r.parse())
            .collect::<Result<Vec<Cidr>, _>>()?;
        Ok(Self {
            loopback: config.loopback.iter().map(|s| s.to_ascii_lowercase()).collect(),
            private,
        })
    }

    pub fn is_loopback(&self, client_ip: &str) -> bool {
        let ip = client_ip.trim();
        if self.loopback.iter().any(|l| l.eq_ignore_ascii_case(ip)) {
            return true;
        }
        ip.parse::<IpAddr>()
            .map(|addr| unmap(addr).is_loopback())
            .unwrap_or(false)
    }

    pub fn is_private(&self, client_ip: &str) -> bool {
        match client_ip.trim().parse::<IpAddr>() {
            Ok(addr) => self.private.iter().any(|block| block.contains(addr)),
            Err(_) => false,
        }
    }

    /// Loopback, private, empty or the `unknown` placeholder.
    pub fn is_local(&self, client_ip: &str) -> bool {
        let ip = client_ip.trim();
        ip.is_empty()
            || ip.eq_ignore_ascii_case("unknown")
            || self.is_loopback(ip)
            || self.is_private(ip)
    }
}
