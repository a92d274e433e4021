//! A `SimulatedRadio` pre-loaded with five test profiles, plus the manager
//! that drives it.
//!
//! *  Slots 1..=5 hold APNs `TstAPN0`..`TstAPN4`, IPv4, no authentication.
//! *  The test keeps its own `Arc<SimulatedRadio>` to script the modem
//!    (addresses, counters, failures) while the manager owns a `dyn Radio`.

use std::sync::Arc;

use log::LevelFilter;
use mdc_core::radio::SimulatedRadio;
use mdc_core::{DataConnectionManager, MdcConfig, PdpType, Profile, ProfileData};

pub const NB_PROFILE: u32 = 5;

pub fn init_test_logging() {
    //   Logs will appear only when you run with `-- --nocapture`
    //   or when the test fails.
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub fn test_apn(i: u32) -> String {
    format!("TstAPN{i}")
}

pub struct SeededRadio {
    pub radio: Arc<SimulatedRadio>,
    pub manager: DataConnectionManager,
}

impl SeededRadio {
    pub fn new() -> Self {
        Self::with_config(MdcConfig::default())
    }

    pub fn with_config(config: MdcConfig) -> Self {
        init_test_logging();
        let radio = Arc::new(SimulatedRadio::new());
        for i in 0..NB_PROFILE {
            radio.set_profile(i + 1, ProfileData::new(test_apn(i), PdpType::Ipv4));
        }
        let manager = DataConnectionManager::new(radio.clone(), config)
            .expect("default config must be valid");
        Self { radio, manager }
    }

    /// Allocate the five profiles the way a client would: even ones by APN,
    /// odd ones by index.
    pub async fn profiles(&self) -> Vec<Profile> {
        let mut profiles = Vec::new();
        for i in 0..NB_PROFILE {
            let profile = if i % 2 == 0 {
                self.manager
                    .get_profile_by_apn(&test_apn(i))
                    .await
                    .expect("seeded APN must be found")
            } else {
                self.manager
                    .get_profile(i + 1)
                    .await
                    .expect("seeded slot must exist")
            };
            assert_eq!(profile.index(), i + 1);
            profiles.push(profile);
        }
        profiles
    }
}
