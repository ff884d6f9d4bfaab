use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::{FileSpec, OsSpec, Profile, ProfileActivation, PropertySpec};

/// Resolve `${...}` references against `props`. Unknown references are kept
/// as-is rather than failing: activation treats a surviving placeholder as
/// an undeterminable condition, never as a hard error.
pub fn resolve_placeholders(text: &str, props: &BTreeMap<String, String>) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

    re.replace_all(text, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        props
            .get(key)
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Interpolate a profile's activation descriptor fields (file paths,
/// property values, JDK and OS specs) against `props`.
///
/// Activator conditions routinely contain `${...}` placeholders, so
/// predicates must never be evaluated against the raw profile. Fields that
/// still contain placeholders after interpolation are logged and kept; the
/// corresponding activator reports "not active" for them.
pub fn interpolate_profile(profile: &Profile, props: &BTreeMap<String, String>) -> Profile {
    let Some(activation) = &profile.activation else {
        return profile.clone();
    };

    let resolve = |text: &str| {
        let resolved = resolve_placeholders(text, props);
        if resolved.contains("${") {
            tracing::debug!(
                target: "mason.model",
                profile = %profile.id,
                value = %text,
                "activation value kept unresolved placeholders"
            );
        }
        resolved
    };
    let resolve_opt = |text: &Option<String>| text.as_deref().map(resolve);

    let mut out = profile.clone();
    out.activation = Some(ProfileActivation {
        file: activation.file.as_ref().map(|file| FileSpec {
            exists: resolve_opt(&file.exists),
            missing: resolve_opt(&file.missing),
        }),
        property: activation.property.as_ref().map(|property| PropertySpec {
            name: resolve(&property.name),
            value: resolve_opt(&property.value),
        }),
        jdk: resolve_opt(&activation.jdk),
        os: activation.os.as_ref().map(|os| OsSpec {
            name: resolve_opt(&os.name),
            family: resolve_opt(&os.family),
            arch: resolve_opt(&os.arch),
            version: resolve_opt(&os.version),
        }),
    });
    out
}
