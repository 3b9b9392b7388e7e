use std::collections::HashSet;

use anyhow::{bail, Result};
use config::Config;
use quorum_common::NodeId;

#[derive(Clone, Debug, serde::Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct HbConfig {
    pub group_id: String,
    pub node_id: NodeId,
    pub nodes: Vec<NodeId>,
    pub batch_size: usize,
    #[serde(default)]
    pub rng_seed: Option<u64>,
    /// Faulty participants to tolerate; the most `nodes` allows when unset
    #[serde(default)]
    pub faulty: Option<usize>,
}

impl HbConfig {
    pub fn try_load(config: &Config) -> Result<Self> {
        let full_config = Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config.default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config.clone())
            .build()?;
        let loaded: Self = full_config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.group_id.is_empty() {
            bail!("group-id must be set");
        }
        if self.batch_size == 0 {
            bail!("batch-size must be positive");
        }
        if self.nodes.is_empty() {
            bail!("nodes must list the consensus participants");
        }
        let unique: HashSet<&NodeId> = self.nodes.iter().collect();
        if unique.len() != self.nodes.len() {
            bail!("nodes contains duplicates");
        }
        if !self.nodes.contains(&self.node_id) {
            bail!("node-id {} is not one of the nodes", self.node_id);
        }
        let (n, f) = (self.nodes.len(), self.max_faulty());
        if n < f.saturating_mul(3).saturating_add(1) {
            bail!("{n} nodes cannot tolerate {f} faulty");
        }
        Ok(())
    }

    /// Faulty participants tolerated: `faulty` if set, else `(N - 1) / 3`
    pub fn max_faulty(&self) -> usize {
        self.faulty.unwrap_or(self.nodes.len().saturating_sub(1) / 3)
    }
}
