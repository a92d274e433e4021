//! Live addressing of a connected profile.
//!
//! A [`Session`] is captured from the radio's attach reply and dropped on the
//! DISCONNECTED transition. Every address query is gated twice: the profile
//! must be connected, and the family must be part of the negotiated PDP type.

use log::debug;

use crate::core::errors::{MdcError, Result};
use crate::core::manager::Profile;
use crate::radio::interface::{FamilyAddressing, SessionInfo};
use crate::storage::profile::{IpFamily, PdpType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Session {
    pdp: PdpType,
    info: SessionInfo,
}

impl Session {
    /// Families outside `pdp` are discarded even if the radio reported them.
    pub(crate) fn new(pdp: PdpType, mut info: SessionInfo) -> Self {
        if !pdp.includes(IpFamily::Ipv4) {
            info.ipv4 = None;
        }
        if !pdp.includes(IpFamily::Ipv6) {
            info.ipv6 = None;
        }
        Self { pdp, info }
    }

    pub(crate) fn interface_name(&self) -> &str {
        &self.info.interface_name
    }

    pub(crate) fn has_family(&self, family: IpFamily) -> bool {
        self.pdp.includes(family)
    }

    pub(crate) fn addressing(&self, family: IpFamily) -> Result<&FamilyAddressing> {
        if !self.has_family(family) {
            return Err(MdcError::fault(format!(
                "{} not negotiated for {:?} session",
                family_name(family),
                self.pdp
            )));
        }
        self.info.family(family).ok_or_else(|| {
            MdcError::fault(format!("radio reported no {} addressing", family_name(family)))
        })
    }
}

fn family_name(family: IpFamily) -> &'static str {
    match family {
        IpFamily::Ipv4 => "IPv4",
        IpFamily::Ipv6 => "IPv6",
    }
}

/// Up to two DNS servers for one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsServers {
    pub primary: String,
    pub secondary: Option<String>,
}

impl Profile {
    fn with_session<T>(&self, read: impl FnOnce(&Session) -> Result<T>) -> Result<T> {
        let record = self.slot().record();
        match &record.session {
            Some(session) => read(session),
            None => {
                debug!("Profile {} queried for addressing while disconnected", self.index());
                Err(MdcError::fault(format!(
                    "profile {} is not connected",
                    self.index()
                )))
            }
        }
    }

    pub fn interface_name(&self) -> Result<String> {
        self.with_session(|s| Ok(s.interface_name().to_string()))
    }

    /// False whenever the profile is disconnected.
    pub fn is_ipv4(&self) -> bool {
        self.with_session(|s| Ok(s.has_family(IpFamily::Ipv4)))
            .unwrap_or(false)
    }

    /// False whenever the profile is disconnected.
    pub fn is_ipv6(&self) -> bool {
        self.with_session(|s| Ok(s.has_family(IpFamily::Ipv6)))
            .unwrap_or(false)
    }

    pub fn address(&self, family: IpFamily) -> Result<String> {
        self.with_session(|s| Ok(s.addressing(family)?.address.clone()))
    }

    pub fn gateway_address(&self, family: IpFamily) -> Result<String> {
        self.with_session(|s| Ok(s.addressing(family)?.gateway.clone()))
    }

    pub fn dns_addresses(&self, family: IpFamily) -> Result<DnsServers> {
        self.with_session(|s| {
            let mut servers = s.addressing(family)?.dns.iter().cloned();
            let primary = servers.next().ok_or_else(|| {
                MdcError::fault(format!("radio reported no {} DNS", family_name(family)))
            })?;
            Ok(DnsServers {
                primary,
                secondary: servers.next(),
            })
        })
    }

    pub fn ipv4_address(&self) -> Result<String> {
        self.address(IpFamily::Ipv4)
    }

    pub fn ipv6_address(&self) -> Result<String> {
        self.address(IpFamily::Ipv6)
    }

    pub fn ipv4_dns_addresses(&self) -> Result<DnsServers> {
        self.dns_addresses(IpFamily::Ipv4)
    }

    pub fn ipv6_dns_addresses(&self) -> Result<DnsServers> {
        self.dns_addresses(IpFamily::Ipv6)
    }

    pub fn ipv4_gateway_address(&self) -> Result<String> {
        self.gateway_address(IpFamily::Ipv4)
    }

    pub fn ipv6_gateway_address(&self) -> Result<String> {
        self.gateway_address(IpFamily::Ipv6)
    }
}
