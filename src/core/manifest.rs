use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::core::authority::TokenAuthority;
use crate::core::error::BrokerError;
use crate::core::token::{CapabilityDecl, Direction, SealedToken};

/*
Capabilities every compartment is built with, e.g.

[[capability]]
compartment = "config_source"
direction = "write"
item = "config1"
max_size = 64
*/
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityManifest {
    #[serde(default, rename = "capability")]
    pub capabilities: Vec<CapabilityDecl>,
}

impl CapabilityManifest {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BrokerError> {
        let raw = fs::read_to_string(&path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, BrokerError> {
        toml::from_str(raw).map_err(|e| BrokerError::Config(format!("parsing capability manifest: {e}")))
    }

    pub fn issue_all(&self, authority: &TokenAuthority) -> Result<CompartmentTokens, BrokerError> {
        let mut tokens = CompartmentTokens::default();
        for decl in &self.capabilities {
            let token = authority.issue(decl)?;
            tokens
                .by_compartment
                .entry(decl.compartment.clone())
                .or_default()
                .push(IssuedToken {
                    direction: decl.direction,
                    item: decl.item.clone(),
                    token,
                });
        }
        info!(
            capabilities = self.capabilities.len(),
            compartments = tokens.by_compartment.len(),
            "issued capabilities"
        );
        Ok(tokens)
    }
}

struct IssuedToken {
    direction: Direction,
    item: String,
    token: SealedToken,
}

/// Issued tokens waiting to be handed to their compartments.
#[derive(Default)]
pub struct CompartmentTokens {
    by_compartment: HashMap<String, Vec<IssuedToken>>,
}

impl CompartmentTokens {
    /// Removes and returns the token declared for `compartment`.
    pub fn take(&mut self, compartment: &str, direction: Direction, item: &str) -> Option<SealedToken> {
        let issued = self.by_compartment.get_mut(compartment)?;
        let idx = issued
            .iter()
            .position(|t| t.direction == direction && t.item == item)?;
        Some(issued.remove(idx).token)
    }

    /// Removes and returns every token of `compartment` as `(direction, item, token)`.
    pub fn take_all(&mut self, compartment: &str) -> Vec<(Direction, String, SealedToken)> {
        self.by_compartment
            .remove(compartment)
            .unwrap_or_default()
            .into_iter()
            .map(|t| (t.direction, t.item, t.token))
            .collect()
    }

    pub fn compartments(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_compartment.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
