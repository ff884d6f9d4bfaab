//! Raw project-descriptor model and profile activation for mason.
//!
//! This crate turns a build descriptor's `<profiles>` (and the external
//! settings file's) into the set of profiles that actually apply:
//! - value types for profiles, dependencies, plugins and activation
//!   descriptors
//! - the activation engine (explicit enable/disable, default activation,
//!   predicate activators, fixed evaluation order)
//! - overlay application of activated profiles onto a working model

mod activation;
mod interpolate;
mod pom;

pub use activation::{
    activate, activate_with, ActivationEnvironment, ActivationResult, ActivatorError,
    ActivatorKind, ExplicitProfileSelection, DEFAULT_ACTIVATOR_ORDER,
};
pub use interpolate::{interpolate_profile, resolve_placeholders};
pub use pom::{read_pom, read_settings, ParentRef, PomFile, SettingsFile};

use std::collections::BTreeMap;
use std::path::PathBuf;

use mason_core::Repository;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse XML in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
}

/// A declared dependency. `version` stays optional: it may be supplied by
/// dependency management in the effective model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

/// A declared build plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Where a profile was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    /// Declared in the project's own descriptor.
    Pom,
    /// Declared in an external settings file.
    Settings,
}

/// `<activation><file>` condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<String>,
}

/// `<activation><property>` condition. A leading `!` on `name` or `value`
/// negates the check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// `<activation><os>` condition. All specified fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Activation predicate descriptor attached to a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileActivation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<PropertySpec>,
    /// JDK version prefix, e.g. `1.8` or `17`; leading `!` negates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jdk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsSpec>,
}

impl ProfileActivation {
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.property.is_none() && self.jdk.is_none() && self.os.is_none()
    }
}

/// A named, optionally conditional configuration overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub source: ProfileSource,
    #[serde(default)]
    pub active_by_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<ProfileActivation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<Plugin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<Repository>,
}

impl Profile {
    pub fn new(id: impl Into<String>, source: ProfileSource) -> Self {
        Self {
            id: id.into(),
            source,
            active_by_default: false,
            activation: None,
            properties: BTreeMap::new(),
            dependencies: Vec::new(),
            plugins: Vec::new(),
            repositories: Vec::new(),
        }
    }
}

/// The working model that activated profiles are overlaid onto.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingModel {
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<Dependency>,
    pub plugins: Vec<Plugin>,
    pub repositories: Vec<Repository>,
}

impl WorkingModel {
    /// Overlay `profiles` in order. Later entries override earlier ones on
    /// conflicting property keys; dependencies, plugins and repositories
    /// accumulate.
    pub fn apply_profiles<'a>(&mut self, profiles: impl IntoIterator<Item = &'a Profile>) {
        for profile in profiles {
            self.properties
                .extend(profile.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.dependencies.extend(profile.dependencies.iter().cloned());
            self.plugins.extend(profile.plugins.iter().cloned());
            self.repositories.extend(profile.repositories.iter().cloned());
        }
    }
}
