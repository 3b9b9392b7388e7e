use anyhow::{bail, Result};
use config::Config;

#[derive(Clone, Debug, serde::Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ChainGrowthConfig {
    pub group_id: String,
    pub resend_local_trxs: bool,
    pub max_resend_count: u32,
}

impl ChainGrowthConfig {
    pub fn try_load(config: &Config) -> Result<Self> {
        let full_config = Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config.default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config.clone())
            .build()?;
        let loaded: Self = full_config.try_deserialize()?;
        if loaded.group_id.is_empty() {
            bail!("group-id must be set");
        }
        Ok(loaded)
    }

    /// Defaults for `group_id`, without going through `config`
    pub fn for_group(group_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            resend_local_trxs: true,
            max_resend_count: 3,
        }
    }
}
