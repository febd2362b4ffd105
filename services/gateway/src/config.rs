use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9090";
pub const DEFAULT_POLICY_PATH: &str = "rbac_config.json";

// Gateway configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub tenant_id: String,
    pub policy_path: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub passthrough_enabled: bool,
    pub verify_signatures: bool,
    pub jwks_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    tenant_id: Option<String>,
    policy_path: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
    passthrough_enabled: Option<bool>,
    verify_signatures: Option<bool>,
    jwks_url: Option<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self::env_only()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::env_only()?;
        if let Ok(path) = std::env::var("AGENTGATE_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read AGENTGATE_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn env_only() -> Result<Self> {
        let bind_addr = std::env::var("AGENTGATE_BIND")
            .unwrap_or_else(|_| DEFAULT_BIND.to_string())
            .parse()
            .with_context(|| "parse AGENTGATE_BIND")?;
        let metrics_bind = std::env::var("AGENTGATE_METRICS_BIND")
            .unwrap_or_else(|_| DEFAULT_METRICS_BIND.to_string())
            .parse()
            .with_context(|| "parse AGENTGATE_METRICS_BIND")?;
        let tenant_id = std::env::var("AGENTGATE_TENANT_ID").unwrap_or_default();
        let policy_path = std::env::var("AGENTGATE_POLICY_PATH")
            .unwrap_or_else(|_| DEFAULT_POLICY_PATH.to_string())
            .into();
        let catalog_path = std::env::var("AGENTGATE_CATALOG_PATH").ok().map(PathBuf::from);
        let passthrough_enabled = env_bool("AGENTGATE_PASSTHROUGH_ENABLED", true)?;
        let verify_signatures = env_bool("AGENTGATE_VERIFY_SIGNATURES", false)?;
        let jwks_url = std::env::var("AGENTGATE_JWKS_URL").ok();
        Ok(Self {
            bind_addr,
            metrics_bind,
            tenant_id,
            policy_path,
            catalog_path,
            passthrough_enabled,
            verify_signatures,
            jwks_url,
        })
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: GatewayConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse gateway config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.tenant_id {
            self.tenant_id = value;
        }
        if let Some(value) = override_cfg.policy_path {
            self.policy_path = value;
        }
        if let Some(value) = override_cfg.catalog_path {
            self.catalog_path = Some(value);
        }
        if let Some(value) = override_cfg.passthrough_enabled {
            self.passthrough_enabled = value;
        }
        if let Some(value) = override_cfg.verify_signatures {
            self.verify_signatures = value;
        }
        if let Some(value) = override_cfg.jwks_url {
            self.jwks_url = Some(value);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.tenant_id.trim().is_empty() {
            bail!("AGENTGATE_TENANT_ID must be set");
        }
        Ok(())
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(value) => parse_bool(&value).with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got `{other}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const KEYS: [&str; 9] = [
        "AGENTGATE_BIND",
        "AGENTGATE_METRICS_BIND",
        "AGENTGATE_TENANT_ID",
        "AGENTGATE_POLICY_PATH",
        "AGENTGATE_CATALOG_PATH",
        "AGENTGATE_PASSTHROUGH_ENABLED",
        "AGENTGATE_VERIFY_SIGNATURES",
        "AGENTGATE_JWKS_URL",
        "AGENTGATE_CONFIG",
    ];

    struct EnvGuard {
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl EnvGuard {
        fn clean() -> Self {
            let saved = KEYS
                .iter()
                .map(|key| (*key, std::env::var(key).ok()))
                .collect();
            for key in KEYS {
                unsafe {
                    std::env::remove_var(key);
                }
            }
            Self { saved }
        }

        fn set(&self, key: &'static str, value: &str) {
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.saved {
                match value {
                    Some(value) => unsafe {
                        std::env::set_var(key, value);
                    },
                    None => unsafe {
                        std::env::remove_var(key);
                    },
                }
            }
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_with_tenant() {
        let env = EnvGuard::clean();
        env.set("AGENTGATE_TENANT_ID", "tenant-1");
        let config = GatewayConfig::from_env().expect("config");
        assert_eq!(config.bind_addr, DEFAULT_BIND.parse().expect("addr"));
        assert_eq!(config.metrics_bind, DEFAULT_METRICS_BIND.parse().expect("addr"));
        assert_eq!(config.policy_path, PathBuf::from(DEFAULT_POLICY_PATH));
        assert!(config.passthrough_enabled);
        assert!(!config.verify_signatures);
        assert!(config.catalog_path.is_none());
        assert!(config.jwks_url.is_none());
    }

    #[test]
    #[serial]
    fn tenant_is_required() {
        let _env = EnvGuard::clean();
        let err = GatewayConfig::from_env().expect_err("tenant missing");
        assert!(err.to_string().contains("AGENTGATE_TENANT_ID"));
    }

    #[test]
    #[serial]
    fn env_values_are_parsed() {
        let env = EnvGuard::clean();
        env.set("AGENTGATE_TENANT_ID", "tenant-1");
        env.set("AGENTGATE_BIND", "127.0.0.1:8100");
        env.set("AGENTGATE_PASSTHROUGH_ENABLED", "false");
        env.set("AGENTGATE_VERIFY_SIGNATURES", "1");
        env.set("AGENTGATE_CATALOG_PATH", "/etc/agentgate/agents.json");
        let config = GatewayConfig::from_env().expect("config");
        assert_eq!(config.bind_addr.port(), 8100);
        assert!(!config.passthrough_enabled);
        assert!(config.verify_signatures);
        assert_eq!(
            config.catalog_path,
            Some(PathBuf::from("/etc/agentgate/agents.json"))
        );
    }

    #[test]
    #[serial]
    fn invalid_values_are_rejected() {
        let env = EnvGuard::clean();
        env.set("AGENTGATE_TENANT_ID", "tenant-1");
        env.set("AGENTGATE_VERIFY_SIGNATURES", "maybe");
        assert!(GatewayConfig::from_env().is_err());

        env.set("AGENTGATE_VERIFY_SIGNATURES", "true");
        env.set("AGENTGATE_BIND", "not-an-addr");
        assert!(GatewayConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn yaml_overrides_env() {
        let env = EnvGuard::clean();
        env.set("AGENTGATE_TENANT_ID", "from-env");
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "tenant_id: from-yaml\nmetrics_bind: 127.0.0.1:9191\npolicy_path: /srv/rbac.json\npassthrough_enabled: false"
        )
        .expect("write");
        env.set("AGENTGATE_CONFIG", &file.path().display().to_string());

        let config = GatewayConfig::from_env_or_yaml().expect("config");
        assert_eq!(config.tenant_id, "from-yaml");
        assert_eq!(config.metrics_bind.port(), 9191);
        assert_eq!(config.policy_path, PathBuf::from("/srv/rbac.json"));
        assert!(!config.passthrough_enabled);
    }

    #[test]
    #[serial]
    fn yaml_can_supply_the_tenant() {
        let env = EnvGuard::clean();
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "tenant_id: yaml-only").expect("write");
        env.set("AGENTGATE_CONFIG", &file.path().display().to_string());
        let config = GatewayConfig::from_env_or_yaml().expect("config");
        assert_eq!(config.tenant_id, "yaml-only");
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for value in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_bool(value).expect(value));
        }
        for value in ["0", "false", "No", "off"] {
            assert!(!parse_bool(value).expect(value));
        }
    }
}
