//! Settings file for the caas CLI
//!
//! Read from `~/.config/caas/config.toml` unless `--config` points elsewhere.
//! A missing file means defaults; an unreadable or invalid one is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use caas_k8s::{ClientOptions, ClusterSource, IngressOptions};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub cluster: ClusterSettings,
    pub ingress: IngressSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterSettings {
    /// Kubeconfig context to use instead of the current one
    pub context: Option<String>,
    /// Force the in-cluster service account config
    pub in_cluster: bool,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IngressSettings {
    pub class_name: Option<String>,
    pub cluster_issuer: Option<String>,
    pub tls: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("caas").join("config.toml"))
    }

    /// Load settings from an explicit path, or the default path if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Apply command-line overrides on top of the file values
    pub fn with_overrides(
        mut self,
        context: Option<String>,
        in_cluster: bool,
        log_level: Option<String>,
    ) -> Self {
        if context.is_some() {
            self.cluster.context = context;
        }
        if in_cluster {
            self.cluster.in_cluster = true;
        }
        if let Some(level) = log_level {
            self.logging.level = level;
        }
        self
    }

    pub fn cluster_source(&self) -> ClusterSource {
        if self.cluster.in_cluster {
            ClusterSource::InCluster
        } else if let Some(context) = &self.cluster.context {
            ClusterSource::Kubeconfig {
                context: Some(context.clone()),
            }
        } else {
            ClusterSource::Auto
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: self.cluster.connect_timeout_secs.map(Duration::from_secs),
            read_timeout: self.cluster.read_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn ingress_options(&self) -> IngressOptions {
        IngressOptions {
            class_name: self.ingress.class_name.clone(),
            cluster_issuer: self.ingress.cluster_issuer.clone(),
            tls: self.ingress.tls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.logging.level, "warn");
        assert_eq!(settings.cluster_source(), ClusterSource::Auto);
        assert_eq!(settings.client_options(), ClientOptions::default());
    }

    #[test]
    fn test_full_file() {
        let settings: Settings = toml::from_str(
            r#"
            [cluster]
            context = "prod"
            connect_timeout_secs = 5
            read_timeout_secs = 30

            [ingress]
            class_name = "nginx"
            cluster_issuer = "letsencrypt-prod"
            tls = true

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(
            settings.cluster_source(),
            ClusterSource::Kubeconfig {
                context: Some("prod".to_string())
            }
        );
        assert_eq!(
            settings.client_options().connect_timeout,
            Some(Duration::from_secs(5))
        );
        let ingress = settings.ingress_options();
        assert_eq!(ingress.class_name.as_deref(), Some("nginx"));
        assert!(ingress.tls);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<Settings>("[cluster]\nnamespace = \"x\"").is_err());
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::default().with_overrides(Some("dev".to_string()), false, None);
        assert_eq!(
            settings.cluster_source(),
            ClusterSource::Kubeconfig {
                context: Some("dev".to_string())
            }
        );

        let settings = settings.with_overrides(None, true, Some("info".to_string()));
        assert_eq!(settings.cluster_source(), ClusterSource::InCluster);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/caas.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read settings file"));
    }
}
