use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::shape::ShapeSpecification;

/// Up-front sizing for a [`crate::Vm`].
///
/// Hosts usually derive this from every shape they intend to run ([`VmConfig::covering`]) but may also
/// declare it in a config file:
///
/// ```toml
/// label = "npc-worker"
///
/// [capacity]
/// shape_atom_count = 256
/// decider_guard_capacity = 12
/// action_request_capacity = 32
/// ```
///
/// Capacities missing from the file default to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub capacity: ShapeSpecification,
}

impl VmConfig {
    pub fn new(capacity: ShapeSpecification) -> Self {
        Self { label: None, capacity }
    }

    /// Smallest configuration able to run every shape in `specifications`.
    pub fn covering<'a, I>(specifications: I) -> Self
    where
        I: IntoIterator<Item = &'a ShapeSpecification>,
    {
        let capacity = specifications
            .into_iter()
            .fold(ShapeSpecification::default(), |acc, spec| acc.union(spec));
        Self::new(capacity)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("failed to parse VM config (toml)")
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).context("failed to parse VM config (json)")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).context("failed to serialize VM config (toml)")
    }
}
