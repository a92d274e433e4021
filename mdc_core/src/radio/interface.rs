use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::MdcError;
use crate::storage::profile::{IpFamily, ProfileData};

/// Connectedness of one profile, as seen by callers and by the radio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConState {
    #[default]
    Disconnected,
    Connected,
}

/// Radio access technology currently in use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rat {
    #[default]
    Unknown,
    Gsm,
    Umts,
    Tdscdma,
    Lte,
    Cdma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatFamily {
    Gsm,
    Cdma,
}

impl Rat {
    /// Unknown technology is treated as GSM family.
    pub fn family(self) -> RatFamily {
        match self {
            Rat::Cdma => RatFamily::Cdma,
            Rat::Unknown | Rat::Gsm | Rat::Umts | Rat::Tdscdma | Rat::Lte => RatFamily::Gsm,
        }
    }
}

/// Home network identity read from the SIM.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HomeNetwork {
    pub mcc: String,
    pub mnc: String,
}

impl HomeNetwork {
    pub fn new(mcc: impl Into<String>, mnc: impl Into<String>) -> Self {
        Self {
            mcc: mcc.into(),
            mnc: mnc.into(),
        }
    }
}

/// Addressing handed out by the network for one IP family.
///
/// Values are kept as the radio reports them; no parsing is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyAddressing {
    pub address: String,
    pub gateway: String,
    pub dns: Vec<String>,
}

/// What the radio reports after a successful attach.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub interface_name: String,
    pub ipv4: Option<FamilyAddressing>,
    pub ipv6: Option<FamilyAddressing>,
}

impl SessionInfo {
    pub fn family(&self, family: IpFamily) -> Option<&FamilyAddressing> {
        match family {
            IpFamily::Ipv4 => self.ipv4.as_ref(),
            IpFamily::Ipv6 => self.ipv6.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisconnectionReason {
    #[default]
    Undefined,
    RegularDeactivation,
    NetworkFailure,
    AuthenticationFailure,
    NoService,
    Rejected,
}

/// Why a session went down, plus the modem's own numeric code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisconnectInfo {
    pub reason: DisconnectionReason,
    pub platform_code: i32,
}

/// Cumulative data-path totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// The modem control layer the manager drives.
///
/// Every call is a request/response exchange with the modem; the manager
/// bounds each one with the configured radio timeout.
#[async_trait]
pub trait Radio: Send + Sync {
    async fn read_profile(&self, index: u32) -> Result<ProfileData, MdcError>;
    async fn write_profile(&self, index: u32, data: &ProfileData) -> Result<(), MdcError>;

    async fn attach(&self, index: u32, config: &ProfileData) -> Result<SessionInfo, MdcError>;
    async fn detach(&self, index: u32) -> Result<DisconnectInfo, MdcError>;
    async fn query_state(&self, index: u32) -> Result<ConState, MdcError>;

    async fn query_traffic(&self) -> Result<TrafficCounters, MdcError>;
    async fn reset_traffic(&self) -> Result<(), MdcError>;

    async fn radio_access_technology(&self) -> Result<Rat, MdcError>;
    async fn home_network(&self) -> Result<HomeNetwork, MdcError>;
    async fn resolve_carrier_default_apn(&self, home: &HomeNetwork) -> Result<String, MdcError>;
}
