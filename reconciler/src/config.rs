use crate::curator::{CurationPolicy, DEFAULT_TIERS, RankingPolicy};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Table name cannot be empty")]
    EmptyTableName,

    #[error("Filesystem store requires a base_dir")]
    EmptyBaseDir,

    #[error("max_batch_items cannot be 0")]
    InvalidBatchLimit,
}

/// Where records are written.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StoreType {
    Memory {
        #[serde(default)]
        max_batch_items: Option<usize>,
    },
    Filesystem {
        base_dir: String,
    },
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CurationConfig {
    #[serde(default)]
    pub ranking: RankingPolicy,
}

impl CurationConfig {
    pub fn policy(&self) -> CurationPolicy {
        CurationPolicy {
            ranking: self.ranking,
            tiers: DEFAULT_TIERS,
        }
    }
}

/// Reconciler configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for batch submissions
    pub listener: Listener,
    /// Admin listener for health and readiness
    pub admin_listener: Listener,
    /// Table both record types are written to
    pub table_name: String,
    /// Key callers must present in the `x-api-key` header.
    ///
    /// When unset every submission is rejected.
    #[serde(default)]
    pub api_key: Option<String>,
    pub store: StoreType,
    #[serde(default)]
    pub curation: CurationConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.table_name.trim().is_empty() {
            return Err(ValidationError::EmptyTableName);
        }

        match &self.store {
            StoreType::Filesystem { base_dir } if base_dir.is_empty() => {
                Err(ValidationError::EmptyBaseDir)
            }
            StoreType::Memory {
                max_batch_items: Some(0),
            } => Err(ValidationError::InvalidBatchLimit),
            _ => Ok(()),
        }
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 3000
admin_listener:
    host: "127.0.0.1"
    port: 3001
table_name: whatsapp-groups
api_key: secret
store:
    type: filesystem
    base_dir: /var/lib/groupsync
curation:
    ranking: membership_descending
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.listener.port, 3000);
        assert_eq!(config.table_name, "whatsapp-groups");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(
            config.store,
            StoreType::Filesystem {
                base_dir: "/var/lib/groupsync".into()
            }
        );
        assert_eq!(
            config.curation.policy().ranking,
            RankingPolicy::MembershipDescending
        );
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
listener: {host: "0.0.0.0", port: 3000}
admin_listener: {host: "127.0.0.1", port: 3001}
table_name: groups
store: {type: memory}
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.api_key, None);
        assert_eq!(
            config.store,
            StoreType::Memory {
                max_batch_items: None
            }
        );
        assert_eq!(config.curation.policy(), CurationPolicy::default());
    }

    #[test]
    fn test_validation_errors() {
        let base_config = Config {
            listener: Listener {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            admin_listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            table_name: "groups".to_string(),
            api_key: None,
            store: StoreType::Memory {
                max_batch_items: Some(25),
            },
            curation: CurationConfig::default(),
        };
        assert!(base_config.validate().is_ok());

        let mut config = base_config.clone();
        config.admin_listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        let mut config = base_config.clone();
        config.table_name = "  ".to_string();
        assert_eq!(config.validate(), Err(ValidationError::EmptyTableName));

        let mut config = base_config.clone();
        config.store = StoreType::Filesystem {
            base_dir: "".to_string(),
        };
        assert_eq!(config.validate(), Err(ValidationError::EmptyBaseDir));

        let mut config = base_config;
        config.store = StoreType::Memory {
            max_batch_items: Some(0),
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBatchLimit));
    }

    #[test]
    fn test_deserialization_errors() {
        // Unknown store type
        assert!(
            serde_yaml::from_str::<StoreType>("{type: gcs, bucket: b}").is_err()
        );

        // Unknown ranking policy
        assert!(serde_yaml::from_str::<RankingPolicy>("alphabetical").is_err());

        // Missing table name
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: 3000}
admin_listener: {host: "127.0.0.1", port: 3001}
store: {type: memory}
"#
            )
            .is_err()
        );
    }
}
