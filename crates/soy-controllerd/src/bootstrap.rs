//! Process environment read before anything else starts.
use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context as _;
use soy_observe::{LoggerConfig, LoggerFormat, LoggerLevel};

pub const ENV_CONFIG: &str = "SOYPLANE_CONFIG";
pub const ENV_MANIFESTS: &str = "SOYPLANE_MANIFESTS";
pub const ENV_LOG: &str = "SOYPLANE_LOG";
pub const ENV_LOG_FORMAT: &str = "SOYPLANE_LOG_FORMAT";
pub const ENV_METRICS_ADDR: &str = "SOYPLANE_METRICS_ADDR";

const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

#[derive(Debug, Clone, PartialEq)]
pub struct Bootstrap {
    /// Settings files in override order; empty means the default path.
    pub config_paths: Vec<PathBuf>,
    /// Directory of resource manifests to seed the store with.
    pub manifests: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub metrics_addr: SocketAddr,
}

impl Bootstrap {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config_paths = get(ENV_CONFIG)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        let addr = get(ENV_METRICS_ADDR).unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = addr
            .parse()
            .with_context(|| format!("{ENV_METRICS_ADDR}: invalid socket address {addr:?}"))?;

        Ok(Self {
            config_paths,
            manifests: get(ENV_MANIFESTS).map(PathBuf::from),
            log_level: get(ENV_LOG),
            log_format: get(ENV_LOG_FORMAT),
            metrics_addr,
        })
    }

    /// Settings-file logger section with environment overrides applied.
    pub fn logger_config(&self, mut cfg: LoggerConfig) -> anyhow::Result<LoggerConfig> {
        if let Some(level) = &self.log_level {
            cfg.level = LoggerLevel::new(level.as_str()).context(ENV_LOG)?;
        }
        if let Some(format) = &self.log_format {
            cfg.format = format
                .parse::<LoggerFormat>()
                .context(ENV_LOG_FORMAT)?;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let boot = Bootstrap::from_lookup(lookup(&[])).unwrap();
        assert!(boot.config_paths.is_empty());
        assert!(boot.manifests.is_none());
        assert_eq!(boot.metrics_addr, "0.0.0.0:9090".parse().unwrap());
    }

    #[test]
    fn config_paths_are_comma_separated() {
        let boot = Bootstrap::from_lookup(lookup(&[(
            ENV_CONFIG,
            "/etc/soyplane/base.yaml, /etc/soyplane/site.yaml,",
        )]))
        .unwrap();
        assert_eq!(
            boot.config_paths,
            [
                PathBuf::from("/etc/soyplane/base.yaml"),
                PathBuf::from("/etc/soyplane/site.yaml")
            ]
        );
    }

    #[test]
    fn bad_metrics_addr_is_rejected() {
        assert!(Bootstrap::from_lookup(lookup(&[(ENV_METRICS_ADDR, "nowhere")])).is_err());
    }

    #[test]
    fn environment_overrides_logger_section() {
        let boot = Bootstrap::from_lookup(lookup(&[
            (ENV_LOG, "soy_core=debug,info"),
            (ENV_LOG_FORMAT, "json"),
        ]))
        .unwrap();
        let cfg = boot.logger_config(LoggerConfig::default()).unwrap();
        assert_eq!(cfg.format, LoggerFormat::Json);
        assert_eq!(cfg.level.as_str(), "soy_core=debug,info");
    }

    #[test]
    fn unknown_log_format_fails() {
        let boot = Bootstrap::from_lookup(lookup(&[(ENV_LOG_FORMAT, "xml")])).unwrap();
        assert!(boot.logger_config(LoggerConfig::default()).is_err());
    }
}
