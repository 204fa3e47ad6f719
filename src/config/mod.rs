mod basic;
mod engine;

pub use basic::BasicConfig;
pub use engine::EngineConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Schema engine settings (see `engine` table in config.toml).
    #[serde(default)]
    pub engine: EngineConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "SCHEMAGEN_";

impl Config {
    /// Builds a Figment that merges defaults, an optional config TOML file, then
    /// `SCHEMAGEN_`-prefixed environment variables (`__` separates nested keys, e.g.
    /// `SCHEMAGEN_BASIC__LISTEN_PORT=9000`).
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads configuration from defaults, `config.toml` if present, and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .extract()
            .unwrap();

        assert_eq!(cfg.basic.listen_port, 8188);
        assert_eq!(cfg.basic.database_url, "sqlite://schema_gen.db");
        assert_eq!(cfg.engine.conflict_retry_max_times, 3);
    }

    #[test]
    fn toml_overrides_single_keys() {
        let cfg: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(
                r#"
                [basic]
                listen_port = 9000

                [engine]
                conflict_retry_max_times = 5
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(cfg.basic.listen_port, 9000);
        assert_eq!(cfg.basic.loglevel, "info");
        assert_eq!(cfg.engine.conflict_retry_max_times, 5);
        assert_eq!(cfg.engine.busy_timeout_secs, 5);
    }
}
