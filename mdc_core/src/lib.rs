pub mod core;
pub mod radio;
pub mod storage;
pub mod utils;

// re‑export ergonomic entry points
pub use crate::core::context::{ContextHandle, EventLoop};
pub use crate::core::errors::{ErrorKind, MdcError, Result};
pub use crate::core::manager::{DataConnectionManager, Profile, ProfileId};
pub use crate::core::notifier::{Removal, SessionStateHandlerRef};
pub use crate::core::session::DnsServers;
pub use crate::radio::interface::{
    ConState, DisconnectInfo, DisconnectionReason, HomeNetwork, Radio, Rat, SessionInfo,
    TrafficCounters,
};
pub use crate::storage::config::MdcConfig;
pub use crate::storage::profile::{AuthKind, Authentication, IpFamily, PdpType, ProfileData};
