//! Cache generation naming
//!
//! Each deployed version owns exactly two generations: a static one filled at
//! install time and a dynamic one filled at fetch time. Both names embed the
//! version, so bumping the version is the only way to invalidate everything.

use crate::config::schema::WorkerConfig;
use crate::error::{CachefrontError, CachefrontResult};
use std::fmt;

/// The two generation names owned by one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationNames {
    static_name: String,
    dynamic_name: String,
}

impl GenerationNames {
    /// Derive both names as `<label>-<version>`
    pub fn new(static_label: &str, dynamic_label: &str, version: &str) -> CachefrontResult<Self> {
        let static_name = format!("{}-{}", static_label, version);
        let dynamic_name = format!("{}-{}", dynamic_label, version);

        validate_name(&static_name)?;
        validate_name(&dynamic_name)?;

        if static_name == dynamic_name {
            return Err(CachefrontError::InvalidGenerationName(format!(
                "static and dynamic generations would share the name {}",
                static_name
            )));
        }

        Ok(Self {
            static_name,
            dynamic_name,
        })
    }

    /// Derive the names for a configured worker
    pub fn from_config(config: &WorkerConfig) -> CachefrontResult<Self> {
        Self::new(&config.static_label, &config.dynamic_label, &config.version)
    }

    /// Generation holding the install-time manifest
    pub fn static_name(&self) -> &str {
        &self.static_name
    }

    /// Generation holding responses captured at fetch time
    pub fn dynamic_name(&self) -> &str {
        &self.dynamic_name
    }

    /// Whether a generation belongs to this version and survives activation
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_name || name == self.dynamic_name
    }
}

impl fmt::Display for GenerationNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.static_name, self.dynamic_name)
    }
}

/// Generation names double as directory names for the disk backend.
pub fn validate_name(name: &str) -> CachefrontResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(CachefrontError::InvalidGenerationName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_embed_version() {
        let names = GenerationNames::new("app-static", "app-dynamic", "v1").unwrap();
        assert_eq!(names.static_name(), "app-static-v1");
        assert_eq!(names.dynamic_name(), "app-dynamic-v1");
    }

    #[test]
    fn version_change_changes_both_names() {
        let v1 = GenerationNames::new("app-static", "app-dynamic", "v1").unwrap();
        let v2 = GenerationNames::new("app-static", "app-dynamic", "v2").unwrap();

        assert_ne!(v1.static_name(), v2.static_name());
        assert_ne!(v1.dynamic_name(), v2.dynamic_name());
        assert!(!v2.is_current(v1.static_name()));
        assert!(!v2.is_current(v1.dynamic_name()));
    }

    #[test]
    fn is_current_matches_only_own_names() {
        let names = GenerationNames::new("app-static", "app-dynamic", "v3").unwrap();
        assert!(names.is_current("app-static-v3"));
        assert!(names.is_current("app-dynamic-v3"));
        assert!(!names.is_current("app-v3"));
        assert!(!names.is_current("other"));
    }

    #[test]
    fn rejects_identical_labels() {
        assert!(GenerationNames::new("app", "app", "v1").is_err());
    }

    #[test]
    fn validate_name_rejects_path_components() {
        assert!(validate_name("app-static-v1").is_ok());
        assert!(validate_name("app/static").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("").is_err());
    }
}
