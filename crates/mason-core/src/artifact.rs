use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The (group, artifact, version, packaging, classifier) tuple identifying a
/// build output or dependency.
///
/// Equality, ordering and hashing are structural over all five fields, so a
/// coordinate can be used directly as a map key for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    /// Packaging/type, `jar` unless declared otherwise.
    #[serde(default = "default_packaging")]
    pub packaging: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

fn default_packaging() -> String {
    "jar".to_string()
}

impl ArtifactCoordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            packaging: default_packaging(),
            classifier: None,
        }
    }

    pub fn with_packaging(mut self, packaging: impl Into<String>) -> Self {
        self.packaging = packaging.into();
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Relative path of this artifact's file under a Maven-layout repository
    /// root, e.g. `com/example/app/1.0/app-1.0.jar`.
    pub fn repository_path(&self) -> PathBuf {
        let group_path = self.group_id.replace('.', "/");
        let file_name = match self.classifier.as_deref() {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, classifier, self.packaging
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.packaging),
        };
        PathBuf::from(group_path)
            .join(&self.artifact_id)
            .join(&self.version)
            .join(file_name)
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)?;
        if self.packaging != "jar" || self.classifier.is_some() {
            write!(f, ":{}", self.packaging)?;
        }
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, ":{}", self.version)
    }
}

/// A remote artifact repository the resolver may consult.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub url: String,
}

impl Repository {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// Outcome of resolving a single coordinate.
///
/// Resolution never fails for "not found": the coordinate comes back
/// unmodified with `resolved = false` and no file, and callers inspect the
/// flag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    pub coordinate: ArtifactCoordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub resolved: bool,
}

impl ResolvedArtifact {
    pub fn resolved(coordinate: ArtifactCoordinate, file: PathBuf) -> Self {
        Self {
            coordinate,
            file: Some(file),
            resolved: true,
        }
    }

    pub fn unresolved(coordinate: ArtifactCoordinate) -> Self {
        Self {
            coordinate,
            file: None,
            resolved: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_display_omits_default_packaging() {
        let plain = ArtifactCoordinate::new("com.example", "app", "1.0");
        assert_eq!(plain.to_string(), "com.example:app:1.0");

        let classified = ArtifactCoordinate::new("com.example", "app", "1.0")
            .with_classifier("sources");
        assert_eq!(classified.to_string(), "com.example:app:jar:sources:1.0");
    }

    #[test]
    fn repository_path_follows_maven_layout() {
        let coord = ArtifactCoordinate::new("org.slf4j", "slf4j-api", "2.0.9");
        assert_eq!(
            coord.repository_path(),
            PathBuf::from("org/slf4j/slf4j-api/2.0.9/slf4j-api-2.0.9.jar")
        );
    }
}
