use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{interpolate_profile, Profile, ProfileSource};

/// Explicitly enabled/disabled profile ids supplied by the caller per
/// invocation. Disabled always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitProfileSelection {
    pub enabled: BTreeSet<String>,
    pub disabled: BTreeSet<String>,
}

impl ExplicitProfileSelection {
    pub fn from_lists<S: Into<String>>(
        enabled: impl IntoIterator<Item = S>,
        disabled: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            enabled: enabled.into_iter().map(Into::into).collect(),
            disabled: disabled.into_iter().map(Into::into).collect(),
        }
    }
}

/// Outcome of one activation pass. `activated` is ordered — pom-sourced
/// profiles first, then externally sourced — and reproducible for the same
/// inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationResult {
    pub activated: Vec<String>,
    pub deactivated: BTreeSet<String>,
}

/// The closed set of activation predicate kinds, dispatched through a single
/// can-determine/is-active pair so the fixed evaluation order stays explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivatorKind {
    FileExists,
    SystemProperty,
    JdkPrefix,
    OsMatch,
}

/// Fixed evaluation order; the first activator that can determine and is
/// active wins.
pub const DEFAULT_ACTIVATOR_ORDER: [ActivatorKind; 4] = [
    ActivatorKind::FileExists,
    ActivatorKind::SystemProperty,
    ActivatorKind::JdkPrefix,
    ActivatorKind::OsMatch,
];

/// Host state activation predicates are evaluated against. The server takes
/// one snapshot at creation and reuses it for every call.
#[derive(Debug, Clone, Default)]
pub struct ActivationEnvironment {
    /// System/environment properties used both for predicate checks and for
    /// `${...}` interpolation of activation descriptors.
    pub properties: BTreeMap<String, String>,
    pub java_version: String,
    pub os_name: String,
    pub os_family: String,
    pub os_arch: String,
    pub os_version: String,
    /// Base directory that relative file-activation paths resolve against.
    pub base_dir: Option<PathBuf>,
}

impl ActivationEnvironment {
    /// Snapshot the current process environment.
    pub fn snapshot() -> Self {
        let mut properties: BTreeMap<String, String> = std::env::vars()
            .map(|(key, value)| (format!("env.{key}"), value))
            .collect();
        properties.insert("os.name".to_string(), std::env::consts::OS.to_string());
        properties.insert("os.arch".to_string(), std::env::consts::ARCH.to_string());
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            properties.insert("user.home".to_string(), home.to_string_lossy().into_owned());
        }
        let java_version = std::env::var("JAVA_VERSION").unwrap_or_default();
        if !java_version.is_empty() {
            properties.insert("java.version".to_string(), java_version.clone());
        }

        Self {
            properties,
            java_version,
            os_name: std::env::consts::OS.to_string(),
            os_family: if cfg!(windows) { "windows" } else { "unix" }.to_string(),
            os_arch: std::env::consts::ARCH.to_string(),
            os_version: String::new(),
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }
}

/// Select the profiles that apply, given explicit enable/disable sets, an
/// always-on set, and the activator evaluation order.
///
/// The pass is single and ordered:
/// 1. disabled beats every other signal, including default activation and
///    predicate activators;
/// 2. explicit enables and the always-on set activate directly;
/// 3. default-active profiles are collected as a fallback bucket;
/// 4. predicates run against an interpolated copy of the profile, in fixed
///    activator order, short-circuiting on the first match; activator
///    errors are logged and count as "not active";
/// 5. activated profiles bucket by source (pom first, then external);
/// 6. the default bucket applies only when no pom profile activated.
pub fn activate(
    raw_profiles: &[Profile],
    selection: &ExplicitProfileSelection,
    always_on: &BTreeSet<String>,
    activators: &[ActivatorKind],
    env: &ActivationEnvironment,
) -> ActivationResult {
    activate_with(raw_profiles, selection, always_on, activators, env, |profile| {
        interpolate_profile(profile, &env.properties)
    })
}

/// [`activate`] with a caller-supplied interpolator. The interpolated copy
/// of a profile is computed lazily, the first time a predicate needs it,
/// and at most once per profile per pass.
pub fn activate_with(
    raw_profiles: &[Profile],
    selection: &ExplicitProfileSelection,
    always_on: &BTreeSet<String>,
    activators: &[ActivatorKind],
    env: &ActivationEnvironment,
    interpolate: impl Fn(&Profile) -> Profile,
) -> ActivationResult {
    let mut deactivated = BTreeSet::new();
    let mut activated_from_pom: Vec<&Profile> = Vec::new();
    let mut activated_external: Vec<&Profile> = Vec::new();
    let mut active_by_default: Vec<&Profile> = Vec::new();

    for profile in raw_profiles {
        if selection.disabled.contains(&profile.id) {
            deactivated.insert(profile.id.clone());
            continue;
        }

        let mut should_activate =
            selection.enabled.contains(&profile.id) || always_on.contains(&profile.id);

        // Fallback bucket, recorded regardless of `should_activate`.
        if profile.active_by_default {
            active_by_default.push(profile);
        }

        if !should_activate {
            if profile.activation.as_ref().is_some_and(|a| !a.is_empty()) {
                // Interpolated lazily: profiles without predicates never pay
                // for it, and each profile is interpolated at most once.
                let interpolated: OnceCell<Profile> = OnceCell::new();
                for kind in activators {
                    let evaluated = interpolated.get_or_init(|| interpolate(profile));
                    if !kind.can_determine(evaluated) {
                        continue;
                    }
                    match kind.is_active(evaluated, env) {
                        Ok(true) => {
                            should_activate = true;
                            break;
                        }
                        Ok(false) => {}
                        Err(err) => {
                            tracing::warn!(
                                target: "mason.model",
                                profile = %profile.id,
                                activator = ?kind,
                                error = %err,
                                "activator failed; treating as not active"
                            );
                        }
                    }
                }
            }
        }

        if should_activate {
            match profile.source {
                ProfileSource::Pom => activated_from_pom.push(profile),
                ProfileSource::Settings => activated_external.push(profile),
            }
        }
    }

    // Pom profiles override defaults; defaults are the fallback only when no
    // pom profile activated. External activations always append.
    let primary = if activated_from_pom.is_empty() {
        &active_by_default
    } else {
        &activated_from_pom
    };

    let mut activated = Vec::new();
    let mut seen = BTreeSet::new();
    for profile in primary.iter().chain(activated_external.iter()) {
        if seen.insert(profile.id.as_str()) {
            activated.push(profile.id.clone());
        }
    }

    ActivationResult {
        activated,
        deactivated,
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ActivatorError {
    message: String,
}

impl ActivatorError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ActivatorKind {
    /// Whether this activator's descriptor section is present on the
    /// profile at all.
    pub fn can_determine(&self, profile: &Profile) -> bool {
        let Some(activation) = &profile.activation else {
            return false;
        };
        match self {
            ActivatorKind::FileExists => activation
                .file
                .as_ref()
                .is_some_and(|f| f.exists.is_some() || f.missing.is_some()),
            ActivatorKind::SystemProperty => activation
                .property
                .as_ref()
                .is_some_and(|p| !p.name.is_empty()),
            ActivatorKind::JdkPrefix => activation.jdk.is_some(),
            ActivatorKind::OsMatch => activation.os.as_ref().is_some_and(|os| {
                os.name.is_some() || os.family.is_some() || os.arch.is_some() || os.version.is_some()
            }),
        }
    }

    /// Evaluate the predicate against an already-interpolated profile.
    pub fn is_active(
        &self,
        profile: &Profile,
        env: &ActivationEnvironment,
    ) -> Result<bool, ActivatorError> {
        let activation = profile
            .activation
            .as_ref()
            .ok_or_else(|| ActivatorError::new("profile has no activation descriptor"))?;

        match self {
            ActivatorKind::FileExists => {
                let file = activation
                    .file
                    .as_ref()
                    .ok_or_else(|| ActivatorError::new("missing file activation"))?;
                if let Some(exists) = file.exists.as_deref() {
                    Ok(file_exists(exists, env)?)
                } else if let Some(missing) = file.missing.as_deref() {
                    Ok(!file_exists(missing, env)?)
                } else {
                    Err(ActivatorError::new(
                        "file activation declares neither exists nor missing",
                    ))
                }
            }
            ActivatorKind::SystemProperty => {
                let property = activation
                    .property
                    .as_ref()
                    .ok_or_else(|| ActivatorError::new("missing property activation"))?;
                let (name, negate_name) = strip_negation(&property.name);
                if name.is_empty() {
                    return Err(ActivatorError::new("empty property name"));
                }
                let actual = env.properties.get(name).map(String::as_str);

                let matched = match property.value.as_deref() {
                    None => actual.is_some_and(|v| !v.is_empty()),
                    Some(value) => {
                        let (value, negate_value) = strip_negation(value);
                        let equal = actual == Some(value);
                        if negate_value {
                            !equal
                        } else {
                            equal
                        }
                    }
                };
                Ok(if negate_name { !matched } else { matched })
            }
            ActivatorKind::JdkPrefix => {
                let jdk = activation
                    .jdk
                    .as_deref()
                    .ok_or_else(|| ActivatorError::new("missing jdk activation"))?;
                let (prefix, negate) = strip_negation(jdk);
                if prefix.is_empty() {
                    return Err(ActivatorError::new("empty jdk version prefix"));
                }
                if env.java_version.is_empty() {
                    return Err(ActivatorError::new("host JDK version is unknown"));
                }
                let matched = env.java_version.starts_with(prefix);
                Ok(if negate { !matched } else { matched })
            }
            ActivatorKind::OsMatch => {
                let os = activation
                    .os
                    .as_ref()
                    .ok_or_else(|| ActivatorError::new("missing os activation"))?;
                let mut matched = true;
                if let Some(name) = os.name.as_deref() {
                    matched &= negatable_eq(name, &env.os_name);
                }
                if let Some(family) = os.family.as_deref() {
                    matched &= negatable_eq(family, &env.os_family);
                }
                if let Some(arch) = os.arch.as_deref() {
                    matched &= negatable_eq(arch, &env.os_arch);
                }
                if let Some(version) = os.version.as_deref() {
                    matched &= negatable_eq(version, &env.os_version);
                }
                Ok(matched)
            }
        }
    }
}

fn strip_negation(value: &str) -> (&str, bool) {
    match value.strip_prefix('!') {
        Some(rest) => (rest, true),
        None => (value, false),
    }
}

fn negatable_eq(expected: &str, actual: &str) -> bool {
    let (expected, negate) = strip_negation(expected);
    let equal = expected.eq_ignore_ascii_case(actual);
    if negate {
        !equal
    } else {
        equal
    }
}

fn file_exists(path: &str, env: &ActivationEnvironment) -> Result<bool, ActivatorError> {
    if path.contains("${") {
        return Err(ActivatorError::new(format!(
            "unresolved placeholder in file activation path `{path}`"
        )));
    }
    let path = Path::new(path);
    if path.is_absolute() {
        return Ok(path.exists());
    }
    match &env.base_dir {
        Some(base) => Ok(base.join(path).exists()),
        None => Ok(path.exists()),
    }
}
