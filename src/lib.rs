pub mod core;
mod config;

pub use config::BrokerConfig;
pub use crate::core::authority::TokenAuthority;
pub use crate::core::broker::{BrokerStats, ConfigBroker, SharedBroker};
pub use crate::core::claim::{Claim, ClaimSlot};
pub use crate::core::error::{BrokerError, ErrorKind};
pub use crate::core::manifest::{CapabilityManifest, CompartmentTokens};
pub use crate::core::registry::ConfigCallback;
pub use crate::core::token::{AuthorizedToken, CapabilityDecl, Direction, SealedToken};
pub use crate::core::validator::{ContentCheck, Validator, Verdict};
pub use crate::core::value::ConfigValue;
