use serde::{Deserialize, Serialize};

use crate::core::errors::{MdcError, Result};

pub const APN_NAME_MAX_LEN: usize = 100;
pub const USER_NAME_MAX_LEN: usize = 64;
pub const PASSWORD_MAX_LEN: usize = 64;

/// Address family of a single IP stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpFamily {
    Ipv4,
    Ipv6,
}

/// Address family policy negotiated for a data session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdpType {
    #[default]
    Ipv4,
    Ipv6,
    Ipv4v6,
}

impl PdpType {
    pub fn includes(self, family: IpFamily) -> bool {
        matches!(
            (self, family),
            (PdpType::Ipv4v6, _)
                | (PdpType::Ipv4, IpFamily::Ipv4)
                | (PdpType::Ipv6, IpFamily::Ipv6)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthKind {
    #[default]
    None,
    Pap,
    Chap,
}

/// Credentials presented to the network on attach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    pub kind: AuthKind,
    pub username: String,
    pub password: String,
}

impl Authentication {
    pub fn new(kind: AuthKind, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            kind,
            username: username.into(),
            password: password.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.username.len() > USER_NAME_MAX_LEN {
            return Err(MdcError::fault(format!(
                "user name exceeds {} bytes",
                USER_NAME_MAX_LEN
            )));
        }
        if self.password.len() > PASSWORD_MAX_LEN {
            return Err(MdcError::fault(format!(
                "password exceeds {} bytes",
                PASSWORD_MAX_LEN
            )));
        }
        Ok(())
    }
}

/// The configuration half of a profile, as stored in the modem.
///
/// JSON looks like:
/// `{ "apn":"internet", "pdp":"Ipv4", "auth":{ "kind":"None", "username":"", "password":"" } }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileData {
    pub apn: String,
    #[serde(default)]
    pub pdp: PdpType,
    #[serde(default)]
    pub auth: Authentication,
}

impl ProfileData {
    pub fn new(apn: impl Into<String>, pdp: PdpType) -> Self {
        Self {
            apn: apn.into(),
            pdp,
            auth: Authentication::default(),
        }
    }
}

pub(crate) fn validate_apn(apn: &str) -> Result<()> {
    if apn.len() > APN_NAME_MAX_LEN {
        return Err(MdcError::fault(format!(
            "APN exceeds {} bytes",
            APN_NAME_MAX_LEN
        )));
    }
    Ok(())
}
