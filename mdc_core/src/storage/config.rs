use std::{fs, io, path::Path, path::PathBuf, time::Duration};

use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::errors::{MdcError, Result};

/// Inclusive range of profile slot indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub first: u32,
    pub last: u32,
}

impl SlotRange {
    pub const fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    pub fn contains(&self, index: u32) -> bool {
        (self.first..=self.last).contains(&index)
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<u32> {
        self.first..=self.last
    }

    fn overlaps(&self, other: &SlotRange) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

/// Manager tuning, read from `mdc.json`.
///
/// Every field is optional in the file:
/// `{ "radio_timeout_ms": 5000, "gsm_profiles": { "first": 1, "last": 16 } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdcConfig {
    /// Bound applied to every radio RPC.
    pub radio_timeout_ms: u64,
    /// 3GPP slots; `first` is the default profile on GSM-family technologies.
    pub gsm_profiles: SlotRange,
    /// 3GPP2 slots; `first` is the default profile on CDMA.
    pub cdma_profiles: SlotRange,
}

impl Default for MdcConfig {
    fn default() -> Self {
        Self {
            radio_timeout_ms: 30_000,
            gsm_profiles: SlotRange::new(1, 16),
            cdma_profiles: SlotRange::new(101, 107),
        }
    }
}

impl MdcConfig {
    /// `~/.config/mdc/mdc.json` on Linux, `%APPDATA%\mdc\mdc.json` on Windows, etc.
    pub fn default_path() -> io::Result<PathBuf> {
        let proj = ProjectDirs::from("", "", "mdc")
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "Unable to locate config dir"))?;
        Ok(proj.config_dir().join("mdc.json"))
    }

    /// Reads the user config, or the defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let config: MdcConfig = serde_json::from_reader(file)?;
        config.validate()?;
        debug!("Loaded config from {:?}: {:?}", path, config);
        Ok(config)
    }

    pub fn radio_timeout(&self) -> Duration {
        Duration::from_millis(self.radio_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        for range in [&self.gsm_profiles, &self.cdma_profiles] {
            if range.first == 0 || range.first > range.last {
                return Err(MdcError::fault(format!(
                    "invalid profile range {}..={}",
                    range.first, range.last
                )));
            }
        }
        if self.gsm_profiles.overlaps(&self.cdma_profiles) {
            return Err(MdcError::fault("GSM and CDMA profile ranges overlap"));
        }
        Ok(())
    }
}
