//! Object model configuration
//!
//! Settings live on a root class (see [`Class::root`](crate::Class::root)) and
//! are inherited by every class extended from it. They can be written as
//! TOML:
//!
//! ```toml
//! initial-observers = "coalesced"
//! guid-prefix = "app"
//! require-init-super = false
//! ```

use serde::{Deserialize, Serialize};

use crate::ObjectResult;

/// How observers fire while `create` applies the initial property hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitialObserverDelivery {
    /// Fire after each individual `set`, like any later mutation
    #[default]
    PerSet,
    /// Hold notifications until the whole hash is applied, then fire once per key
    Coalesced,
}

/// Object model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ObjectModelConfig {
    /// Observer delivery during the initial hash
    pub initial_observers: InitialObserverDelivery,

    /// Prefix of instance guids (default: "kiln")
    pub guid_prefix: String,

    /// Fail `create` when an `init` override never reaches the root `init`
    pub require_init_super: bool,
}

fn default_guid_prefix() -> String {
    "kiln".to_string()
}

impl Default for ObjectModelConfig {
    fn default() -> Self {
        Self {
            initial_observers: InitialObserverDelivery::default(),
            guid_prefix: default_guid_prefix(),
            require_init_super: true,
        }
    }
}

impl ObjectModelConfig {
    /// Parse configuration from a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> ObjectResult<Self> {
        Ok(toml::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ObjectModelConfig::default();
        assert_eq!(config.initial_observers, InitialObserverDelivery::PerSet);
        assert_eq!(config.guid_prefix, "kiln");
        assert!(config.require_init_super);
    }

    #[test]
    fn test_parse_full() {
        let config = ObjectModelConfig::from_toml_str(
            r#"
initial-observers = "coalesced"
guid-prefix = "app"
require-init-super = false
"#,
        )
        .unwrap();

        assert_eq!(config.initial_observers, InitialObserverDelivery::Coalesced);
        assert_eq!(config.guid_prefix, "app");
        assert!(!config.require_init_super);
    }

    #[test]
    fn test_parse_partial_keeps_defaults() {
        let config = ObjectModelConfig::from_toml_str("guid-prefix = \"x\"").unwrap();
        assert_eq!(config.guid_prefix, "x");
        assert_eq!(config.initial_observers, InitialObserverDelivery::PerSet);
        assert!(config.require_init_super);

        assert_eq!(ObjectModelConfig::from_toml_str("").unwrap(), ObjectModelConfig::default());
    }

    #[test]
    fn test_parse_rejects_unknown_delivery() {
        let err = ObjectModelConfig::from_toml_str("initial-observers = \"eventually\"").unwrap_err();
        assert!(matches!(err, crate::ObjectError::Config(_)));
    }
}
