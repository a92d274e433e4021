//! An in-process stand-in for the modem.
//!
//! Tests (and hosts without hardware) script the modem through the
//! synchronous setters below, then hand the radio to
//! `DataConnectionManager::new`. Addressing configured for a slot is what
//! the next `attach` on that slot reports.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::core::errors::{ErrorKind, MdcError};
use crate::radio::interface::{
    ConState, DisconnectInfo, DisconnectionReason, FamilyAddressing, HomeNetwork, Radio, Rat,
    SessionInfo, TrafficCounters,
};
use crate::storage::profile::{IpFamily, ProfileData};

#[derive(Default)]
struct SimState {
    profiles: HashMap<u32, ProfileData>,
    interface_names: HashMap<u32, String>,
    addressing: HashMap<(u32, IpFamily), FamilyAddressing>,
    connected: HashSet<u32>,
    traffic: TrafficCounters,
    rat: Rat,
    home: Option<HomeNetwork>,
    carrier_apns: HashMap<HomeNetwork, String>,
    disconnect_info: DisconnectInfo,
    fail_next: Option<ErrorKind>,
    response_delay: Option<Duration>,
    attach_delay: Option<Duration>,
    read_delay: Option<Duration>,
    attach_count: usize,
    detach_count: usize,
}

pub struct SimulatedRadio {
    state: Mutex<SimState>,
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRadio {
    pub fn new() -> Self {
        let mut state = SimState {
            rat: Rat::Gsm,
            disconnect_info: DisconnectInfo {
                reason: DisconnectionReason::RegularDeactivation,
                platform_code: 2,
            },
            ..SimState::default()
        };
        state
            .carrier_apns
            .insert(HomeNetwork::new("208", "01"), "orange".into());
        state
            .carrier_apns
            .insert(HomeNetwork::new("208", "10"), "sl2sfr".into());
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_profile(&self, index: u32, data: ProfileData) {
        self.state().profiles.insert(index, data);
    }

    pub fn profile(&self, index: u32) -> Option<ProfileData> {
        self.state().profiles.get(&index).cloned()
    }

    pub fn set_interface_name(&self, index: u32, name: impl Into<String>) {
        self.state().interface_names.insert(index, name.into());
    }

    pub fn set_ip_address(&self, index: u32, family: IpFamily, address: impl Into<String>) {
        self.state()
            .addressing
            .entry((index, family))
            .or_default()
            .address = address.into();
    }

    pub fn set_dns_addresses(
        &self,
        index: u32,
        family: IpFamily,
        dns1: impl Into<String>,
        dns2: impl Into<String>,
    ) {
        self.state()
            .addressing
            .entry((index, family))
            .or_default()
            .dns = vec![dns1.into(), dns2.into()];
    }

    pub fn set_gateway_address(&self, index: u32, family: IpFamily, gateway: impl Into<String>) {
        self.state()
            .addressing
            .entry((index, family))
            .or_default()
            .gateway = gateway.into();
    }

    pub fn set_data_flow_statistics(&self, traffic: TrafficCounters) {
        self.state().traffic = traffic;
    }

    pub fn set_radio_access_technology(&self, rat: Rat) {
        self.state().rat = rat;
    }

    pub fn set_home_network(&self, home: HomeNetwork) {
        self.state().home = Some(home);
    }

    pub fn set_carrier_apn(&self, home: HomeNetwork, apn: impl Into<String>) {
        self.state().carrier_apns.insert(home, apn.into());
    }

    pub fn set_disconnect_info(&self, info: DisconnectInfo) {
        self.state().disconnect_info = info;
    }

    /// The next session RPC (attach or detach) fails with `kind`.
    pub fn fail_next(&self, kind: ErrorKind) {
        self.state().fail_next = Some(kind);
    }

    /// Delay every session RPC, e.g. to drive the manager into its timeout.
    pub fn set_response_delay(&self, delay: Option<Duration>) {
        self.state().response_delay = delay;
    }

    /// Delay attach only; detach keeps answering at `response_delay`.
    pub fn set_attach_delay(&self, delay: Option<Duration>) {
        self.state().attach_delay = delay;
    }

    /// Delay every profile read.
    pub fn set_profile_read_delay(&self, delay: Option<Duration>) {
        self.state().read_delay = delay;
    }

    /// Network-initiated drop: the modem forgets the session without a detach.
    pub fn drop_session(&self, index: u32) {
        self.state().connected.remove(&index);
    }

    pub fn is_attached(&self, index: u32) -> bool {
        self.state().connected.contains(&index)
    }

    pub fn attach_count(&self) -> usize {
        self.state().attach_count
    }

    pub fn detach_count(&self) -> usize {
        self.state().detach_count
    }

    async fn delay(&self, pick: impl FnOnce(&SimState) -> Option<Duration>) {
        let delay = pick(&self.state());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn session_rpc_preamble(&self) -> Result<(), MdcError> {
        self.delay(|s| s.response_delay).await;
        match self.state().fail_next.take() {
            Some(kind) => Err(error_of_kind(kind)),
            None => Ok(()),
        }
    }
}

fn error_of_kind(kind: ErrorKind) -> MdcError {
    match kind {
        ErrorKind::Fault => MdcError::fault("simulated radio failure"),
        ErrorKind::NotFound => MdcError::not_found("simulated radio lookup miss"),
        ErrorKind::Timeout => MdcError::Timeout,
        ErrorKind::Busy => MdcError::Busy,
        ErrorKind::Unsupported => MdcError::Unsupported,
        ErrorKind::Io => MdcError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "simulated radio I/O failure",
        )),
    }
}

#[async_trait]
impl Radio for SimulatedRadio {
    async fn read_profile(&self, index: u32) -> Result<ProfileData, MdcError> {
        self.delay(|s| s.read_delay).await;
        self.state()
            .profiles
            .get(&index)
            .cloned()
            .ok_or_else(|| MdcError::not_found(format!("no profile stored at slot {}", index)))
    }

    async fn write_profile(&self, index: u32, data: &ProfileData) -> Result<(), MdcError> {
        debug!("simu: write profile {}: {:?}", index, data);
        self.state().profiles.insert(index, data.clone());
        Ok(())
    }

    async fn attach(&self, index: u32, config: &ProfileData) -> Result<SessionInfo, MdcError> {
        self.delay(|s| s.attach_delay).await;
        self.session_rpc_preamble().await?;
        let mut state = self.state();
        state.attach_count += 1;
        let interface_name = state
            .interface_names
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("rmnet{}", index.saturating_sub(1)));
        let negotiated = |family| {
            config
                .pdp
                .includes(family)
                .then(|| state.addressing.get(&(index, family)).cloned())
                .flatten()
        };
        let info = SessionInfo {
            interface_name,
            ipv4: negotiated(IpFamily::Ipv4),
            ipv6: negotiated(IpFamily::Ipv6),
        };
        state.connected.insert(index);
        debug!("simu: attached slot {} as {:?}", index, config.pdp);
        Ok(info)
    }

    async fn detach(&self, index: u32) -> Result<DisconnectInfo, MdcError> {
        self.session_rpc_preamble().await?;
        let mut state = self.state();
        state.detach_count += 1;
        state.connected.remove(&index);
        debug!("simu: detached slot {}", index);
        Ok(state.disconnect_info)
    }

    async fn query_state(&self, index: u32) -> Result<ConState, MdcError> {
        Ok(if self.state().connected.contains(&index) {
            ConState::Connected
        } else {
            ConState::Disconnected
        })
    }

    async fn query_traffic(&self) -> Result<TrafficCounters, MdcError> {
        Ok(self.state().traffic)
    }

    async fn reset_traffic(&self) -> Result<(), MdcError> {
        self.state().traffic = TrafficCounters::default();
        Ok(())
    }

    async fn radio_access_technology(&self) -> Result<Rat, MdcError> {
        Ok(self.state().rat)
    }

    async fn home_network(&self) -> Result<HomeNetwork, MdcError> {
        self.state()
            .home
            .clone()
            .ok_or_else(|| MdcError::fault("SIM not ready"))
    }

    async fn resolve_carrier_default_apn(&self, home: &HomeNetwork) -> Result<String, MdcError> {
        self.state()
            .carrier_apns
            .get(home)
            .cloned()
            .ok_or_else(|| {
                MdcError::not_found(format!("no default APN for {}/{}", home.mcc, home.mnc))
            })
    }
}
