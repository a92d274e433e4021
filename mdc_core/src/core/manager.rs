use std::fmt;
use std::future::Future;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::time::timeout;

use crate::core::errors::{MdcError, Result};
use crate::core::notifier::{NotificationHub, Removal, SessionStateHandlerRef};
use crate::core::session::Session;
use crate::radio::interface::{
    ConState, DisconnectInfo, DisconnectionReason, Radio, RatFamily, TrafficCounters,
};
use crate::storage::config::MdcConfig;
use crate::storage::profile::{validate_apn, AuthKind, Authentication, PdpType, ProfileData};
use crate::storage::store::{ProfileStore, Slot};

/// Selects a profile slot: an explicit index, or whichever slot is the
/// default for the radio technology in use at lookup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileId {
    Index(u32),
    Default,
}

impl From<u32> for ProfileId {
    fn from(index: u32) -> Self {
        ProfileId::Index(index)
    }
}

struct Inner {
    radio: Arc<dyn Radio>,
    config: MdcConfig,
    store: ProfileStore,
    hub: Arc<NotificationHub>,
}

/// Owns the profile slots and drives their session state machines.
///
/// Cloning is cheap (an `Arc` bump), so the manager can be handed to every
/// context that needs it; all clones share the same profiles, sessions and
/// handler registry.
#[derive(Clone)]
pub struct DataConnectionManager {
    inner: Arc<Inner>,
}

/// Handle to one profile slot.
///
/// Getters are plain reads and work in any state and from any thread.
/// Setters and session control go through the radio and are async.
#[derive(Clone)]
pub struct Profile {
    manager: DataConnectionManager,
    slot: Arc<Slot>,
}

impl DataConnectionManager {
    pub fn new(radio: Arc<dyn Radio>, config: MdcConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Data connection manager up: GSM slots {}..={}, CDMA slots {}..={}, radio timeout {} ms",
            config.gsm_profiles.first,
            config.gsm_profiles.last,
            config.cdma_profiles.first,
            config.cdma_profiles.last,
            config.radio_timeout_ms
        );
        Ok(Self {
            inner: Arc::new(Inner {
                radio,
                store: ProfileStore::new(&config),
                config,
                hub: Arc::new(NotificationHub::default()),
            }),
        })
    }

    pub fn config(&self) -> &MdcConfig {
        &self.inner.config
    }

    /// Bound one radio RPC by the configured timeout.
    async fn radio_call<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        timeout(self.inner.config.radio_timeout(), call).await?
    }

    // ── Profile store ────────────────────────────────────────────────────

    /// Resolved at every call; the technology can change between lookups.
    pub async fn default_profile_index(&self) -> u32 {
        let family = match self.radio_call(self.inner.radio.radio_access_technology()).await {
            Ok(rat) => rat.family(),
            Err(e) => {
                warn!("Cannot read radio access technology ({}), assuming GSM", e);
                RatFamily::Gsm
            }
        };
        self.inner.store.default_index(family)
    }

    /// Returns `None` when the index is outside every slot range or when the
    /// radio has no profile stored at the resolved slot.
    pub async fn get_profile(&self, id: impl Into<ProfileId>) -> Option<Profile> {
        let index = match id.into() {
            ProfileId::Index(index) => index,
            ProfileId::Default => self.default_profile_index().await,
        };
        match self.load_slot(index).await {
            Ok(slot) => slot.map(|slot| Profile {
                manager: self.clone(),
                slot,
            }),
            Err(e) => {
                warn!("Cannot read profile {} from radio: {}", index, e);
                None
            }
        }
    }

    /// First profile, in index order, whose APN is `apn`. A radio failure
    /// while scanning ends the lookup with that failure.
    pub async fn get_profile_by_apn(&self, apn: &str) -> Result<Profile> {
        for index in self.inner.store.indices() {
            let Some(slot) = self.load_slot(index).await? else {
                continue;
            };
            if slot.record().data.apn == apn {
                return Ok(Profile {
                    manager: self.clone(),
                    slot,
                });
            }
        }
        Err(MdcError::not_found(format!("no profile with APN '{}'", apn)))
    }

    /// `Ok(None)` for an index outside every range or a slot the radio holds
    /// no profile for; any other radio error is passed through.
    async fn load_slot(&self, index: u32) -> Result<Option<Arc<Slot>>> {
        if !self.inner.store.contains_index(index) {
            debug!("Profile index {} is outside every slot range", index);
            return Ok(None);
        }
        if let Some(slot) = self.inner.store.slot(index) {
            return Ok(Some(slot));
        }
        match self.radio_call(self.inner.radio.read_profile(index)).await {
            Ok(data) => {
                debug!("Loaded profile {} from radio: APN '{}'", index, data.apn);
                Ok(Some(self.inner.store.materialize(index, data)))
            }
            Err(MdcError::NotFound(msg)) => {
                debug!("No profile at slot {}: {}", index, msg);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // ── Session control ──────────────────────────────────────────────────

    /// Attach the profile. Valid only while DISCONNECTED; on any failure the
    /// profile stays DISCONNECTED and the radio's error is returned as-is.
    pub async fn start_session(&self, profile: &Profile) -> Result<()> {
        let slot = &profile.slot;
        let _transition = slot.transition.lock().await;

        let config = {
            let record = slot.record();
            if record.state == ConState::Connected {
                debug!("Profile {} is already connected", slot.index);
                return Err(MdcError::fault(format!(
                    "profile {} is already connected",
                    slot.index
                )));
            }
            record.data.clone()
        };

        info!(
            "Starting session on profile {} (APN '{}', {:?})",
            slot.index, config.apn, config.pdp
        );
        let attach = timeout(
            self.inner.config.radio_timeout(),
            self.inner.radio.attach(slot.index, &config),
        )
        .await;
        let session_info = match attach {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                warn!("Attach of profile {} failed: {}", slot.index, e);
                return Err(e);
            }
            Err(_) => {
                warn!("Attach of profile {} timed out", slot.index);
                self.abandon_attach(slot.index).await;
                return Err(MdcError::Timeout);
            }
        };

        {
            let mut record = slot.record();
            record.state = ConState::Connected;
            record.session = Some(Session::new(config.pdp, session_info));
        }
        info!("Profile {} CONNECTED", slot.index);
        self.inner.hub.publish(profile, ConState::Connected);
        Ok(())
    }

    /// Tear down a session the radio may have set up after we stopped waiting.
    async fn abandon_attach(&self, index: u32) {
        match self.radio_call(self.inner.radio.detach(index)).await {
            Ok(_) => info!("Detached profile {} after attach timeout", index),
            Err(e) => error!(
                "Cleanup detach of profile {} failed ({}); radio state unknown",
                index, e
            ),
        }
    }

    /// Detach the profile. Stopping a DISCONNECTED profile succeeds without
    /// touching the radio. A failed or timed-out detach leaves the profile
    /// CONNECTED with its session snapshot intact.
    pub async fn stop_session(&self, profile: &Profile) -> Result<()> {
        let slot = &profile.slot;
        let _transition = slot.transition.lock().await;

        if slot.record().state == ConState::Disconnected {
            debug!("Profile {} already disconnected, nothing to stop", slot.index);
            return Ok(());
        }

        info!("Stopping session on profile {}", slot.index);
        let disconnect = self
            .radio_call(self.inner.radio.detach(slot.index))
            .await
            .inspect_err(|e| warn!("Detach of profile {} failed: {}", slot.index, e))?;
        self.commit_disconnect(profile, disconnect);
        Ok(())
    }

    /// Reconcile with the radio's view of the session.
    pub async fn refresh_session_state(&self, profile: &Profile) -> Result<ConState> {
        let slot = &profile.slot;
        let _transition = slot.transition.lock().await;

        let reported = self
            .radio_call(self.inner.radio.query_state(slot.index))
            .await?;
        let held = slot.record().state;
        match (held, reported) {
            (ConState::Connected, ConState::Disconnected) => {
                warn!("Network dropped the session of profile {}", slot.index);
                self.commit_disconnect(
                    profile,
                    DisconnectInfo {
                        reason: DisconnectionReason::NetworkFailure,
                        platform_code: 0,
                    },
                );
            }
            (ConState::Disconnected, ConState::Connected) => {
                warn!(
                    "Radio reports a session on profile {} that was not started here",
                    slot.index
                );
            }
            _ => {}
        }
        Ok(slot.record().state)
    }

    fn commit_disconnect(&self, profile: &Profile, disconnect: DisconnectInfo) {
        {
            let mut record = profile.slot.record();
            record.state = ConState::Disconnected;
            record.session = None;
            record.last_disconnect = disconnect;
        }
        info!(
            "Profile {} DISCONNECTED ({:?}, code {})",
            profile.index(),
            disconnect.reason,
            disconnect.platform_code
        );
        self.inner.hub.publish(profile, ConState::Disconnected);
    }

    // ── Notifications ────────────────────────────────────────────────────

    /// Register `handler` on the calling context. It is invoked from that
    /// context's queue, once per CONNECTED/DISCONNECTED transition of `profile`.
    pub fn add_session_state_handler(
        &self,
        profile: &Profile,
        handler: impl FnMut(&Profile, ConState) + 'static,
    ) -> Result<SessionStateHandlerRef> {
        self.inner.hub.add(profile, handler)
    }

    /// Completes immediately on the owning context, otherwise is forwarded
    /// there and completes asynchronously.
    pub fn remove_session_state_handler(&self, handler: SessionStateHandlerRef) -> Result<Removal> {
        self.inner.hub.remove(handler)
    }

    pub fn session_state_handler_count(&self, profile: &Profile) -> usize {
        self.inner.hub.handler_count(profile.index())
    }

    // ── Statistics ───────────────────────────────────────────────────────

    pub async fn bytes_counters(&self) -> Result<TrafficCounters> {
        self.radio_call(self.inner.radio.query_traffic()).await
    }

    pub async fn reset_bytes_counter(&self) -> Result<()> {
        self.radio_call(self.inner.radio.reset_traffic()).await?;
        info!("Data counters reset");
        Ok(())
    }
}

impl Profile {
    pub(crate) fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn index(&self) -> u32 {
        self.slot.index
    }

    pub fn apn(&self) -> String {
        self.slot.record().data.apn.clone()
    }

    pub fn pdp(&self) -> PdpType {
        self.slot.record().data.pdp
    }

    pub fn authentication(&self) -> Authentication {
        self.slot.record().data.auth.clone()
    }

    pub fn session_state(&self) -> ConState {
        self.slot.record().state
    }

    pub fn disconnection_reason(&self) -> DisconnectionReason {
        self.slot.record().last_disconnect.reason
    }

    pub fn platform_specific_disconnection_code(&self) -> i32 {
        self.slot.record().last_disconnect.platform_code
    }

    /// Apply `change` to a copy of the stored data, write it to the radio,
    /// then commit. Rejected with `Fault` while connected.
    async fn modify(&self, what: &str, change: impl FnOnce(&mut ProfileData)) -> Result<()> {
        let _transition = self.slot.transition.lock().await;
        let mut data = {
            let record = self.slot.record();
            if record.state == ConState::Connected {
                debug!("Rejecting {} change on connected profile {}", what, self.index());
                return Err(MdcError::fault(format!(
                    "profile {} is connected; {} cannot change",
                    self.index(),
                    what
                )));
            }
            record.data.clone()
        };
        change(&mut data);
        self.manager
            .radio_call(self.manager.inner.radio.write_profile(self.index(), &data))
            .await?;
        self.slot.record().data = data;
        debug!("Profile {} {} updated", self.index(), what);
        Ok(())
    }

    pub async fn set_apn(&self, apn: &str) -> Result<()> {
        validate_apn(apn)?;
        self.modify("APN", |d| d.apn = apn.to_string()).await
    }

    pub async fn set_pdp(&self, pdp: PdpType) -> Result<()> {
        self.modify("PDP type", |d| d.pdp = pdp).await
    }

    pub async fn set_authentication(
        &self,
        kind: AuthKind,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let auth = Authentication::new(kind, username, password);
        auth.validate()?;
        self.modify("authentication", |d| d.auth = auth).await
    }

    /// Replace the APN with the carrier default for the SIM's home network.
    pub async fn set_default_apn(&self) -> Result<()> {
        if self.session_state() == ConState::Connected {
            return Err(MdcError::fault(format!(
                "profile {} is connected; APN cannot change",
                self.index()
            )));
        }
        let radio = &self.manager.inner.radio;
        let home = self
            .manager
            .radio_call(radio.home_network())
            .await
            .map_err(unresolved_default_apn)?;
        let apn = self
            .manager
            .radio_call(radio.resolve_carrier_default_apn(&home))
            .await
            .map_err(unresolved_default_apn)?;
        info!(
            "Default APN for {}/{} is '{}' (profile {})",
            home.mcc,
            home.mnc,
            apn,
            self.index()
        );
        self.set_apn(&apn).await
    }

    pub async fn start_session(&self) -> Result<()> {
        self.manager.start_session(self).await
    }

    pub async fn stop_session(&self) -> Result<()> {
        self.manager.stop_session(self).await
    }

    pub async fn refresh_session_state(&self) -> Result<ConState> {
        self.manager.refresh_session_state(self).await
    }
}

/// Timeouts keep their kind; any other resolution failure is a `Fault`.
fn unresolved_default_apn(err: MdcError) -> MdcError {
    match err {
        MdcError::Timeout => MdcError::Timeout,
        other => MdcError::fault(format!("default APN unavailable: {}", other)),
    }
}

impl PartialEq for Profile {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Eq for Profile {}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("index", &self.slot.index)
            .finish()
    }
}
