use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use mason_core::{ArtifactCoordinate, ProjectProblem, Repository, ResolvedArtifact};
use mason_model::{read_pom, Dependency, ModelError, PomFile, WorkingModel};

use crate::{GoalExecutionReport, ModelResolver, ResolvedProjectModel, ResolverError};

const MAX_PARENT_DEPTH: usize = 16;

/// Offline [`ModelResolver`] backed by a Maven-layout local repository.
///
/// Probes artifact files directly and walks dependency POMs for transitive
/// expansion; it never touches the network. Parsed POMs are cached until
/// the explicit cache-clearing calls.
pub struct LocalRepositoryResolver {
    repo_root: PathBuf,
    pom_cache: Mutex<HashMap<PathBuf, Option<Arc<PomFile>>>>,
}

impl LocalRepositoryResolver {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            pom_cache: Mutex::new(HashMap::new()),
        }
    }

    fn pom_path(&self, coordinate: &ArtifactCoordinate) -> PathBuf {
        let pom = ArtifactCoordinate {
            packaging: "pom".to_string(),
            classifier: None,
            ..coordinate.clone()
        };
        self.repo_root.join(pom.repository_path())
    }

    fn cached_pom(&self, path: &Path) -> Option<Arc<PomFile>> {
        if let Some(cached) = self.pom_cache.lock().get(path) {
            return cached.clone();
        }
        let parsed = read_pom(path).ok().map(Arc::new);
        self.pom_cache
            .lock()
            .insert(path.to_path_buf(), parsed.clone());
        parsed
    }

    fn dependency_coordinates(dependencies: &[Dependency]) -> Vec<ArtifactCoordinate> {
        dependencies
            .iter()
            .filter(|dep| {
                !matches!(dep.scope.as_deref(), Some("test") | Some("provided"))
            })
            .filter_map(|dep| {
                let version = dep.version.as_deref()?;
                if version.contains("${") {
                    return None;
                }
                let mut coordinate =
                    ArtifactCoordinate::new(&dep.group_id, &dep.artifact_id, version);
                if let Some(type_) = &dep.type_ {
                    coordinate = coordinate.with_packaging(type_.clone());
                }
                if let Some(classifier) = &dep.classifier {
                    coordinate = coordinate.with_classifier(classifier.clone());
                }
                Some(coordinate)
            })
            .collect()
    }

    fn build_model(
        &self,
        descriptor: &Path,
        pom: &PomFile,
        activated_profile_ids: Vec<String>,
        depth: usize,
        seen: &mut BTreeSet<ArtifactCoordinate>,
    ) -> Result<Arc<ResolvedProjectModel>, ResolverError> {
        let artifact_id = pom.artifact_id.clone().ok_or_else(|| {
            ResolverError::Validation {
                messages: vec![format!("{}: missing artifactId", descriptor.display())],
            }
        })?;
        let group_id = pom.effective_group_id().unwrap_or_default().to_string();
        let version = pom.effective_version().unwrap_or_default().to_string();

        let mut problems = Vec::new();
        if group_id.is_empty() {
            problems.push(ProjectProblem::structure(
                descriptor,
                format!("{artifact_id}: groupId is not declared and has no parent fallback"),
            ));
        }

        let coordinate = ArtifactCoordinate::new(group_id, artifact_id, version).with_packaging(
            pom.packaging.clone().unwrap_or_else(|| "jar".to_string()),
        );

        // Overlay the activated profiles onto the declared model in final
        // activation order; later profiles win on conflicting properties,
        // dependencies accumulate.
        let mut working = WorkingModel {
            properties: pom.properties.clone(),
            dependencies: pom.dependencies.clone(),
            plugins: Vec::new(),
            repositories: Vec::new(),
        };
        working.apply_profiles(activated_profile_ids.iter().filter_map(|id| {
            pom.profiles.iter().find(|profile| &profile.id == id)
        }));

        let parent = self.resolve_parent(pom, depth, seen);

        Ok(Arc::new(ResolvedProjectModel {
            descriptor: descriptor.to_path_buf(),
            coordinate,
            dependencies: Self::dependency_coordinates(&working.dependencies),
            activated_profile_ids,
            parent,
            problems,
        }))
    }

    fn resolve_parent(
        &self,
        pom: &PomFile,
        depth: usize,
        seen: &mut BTreeSet<ArtifactCoordinate>,
    ) -> Option<Arc<ResolvedProjectModel>> {
        if depth >= MAX_PARENT_DEPTH {
            return None;
        }
        let parent_ref = pom.parent.as_ref()?;
        let coordinate = ArtifactCoordinate::new(
            parent_ref.group_id.clone()?,
            parent_ref.artifact_id.clone()?,
            parent_ref.version.clone()?,
        );
        if !seen.insert(coordinate.clone()) {
            return None;
        }

        let parent_pom_path = self.pom_path(&coordinate);
        let parent_pom = self.cached_pom(&parent_pom_path)?;

        // A parent model's own activations are its default-active profiles;
        // it inherits nothing from the layers below it.
        let activated = parent_pom
            .profiles
            .iter()
            .filter(|profile| profile.active_by_default)
            .map(|profile| profile.id.clone())
            .collect();

        self.build_model(&parent_pom_path, &parent_pom, activated, depth + 1, seen)
            .ok()
    }
}

impl ModelResolver for LocalRepositoryResolver {
    fn resolve(
        &self,
        coordinate: &ArtifactCoordinate,
        _repositories: &[Repository],
    ) -> Result<ResolvedArtifact, ResolverError> {
        let file = self.repo_root.join(coordinate.repository_path());
        if file.is_file() {
            Ok(ResolvedArtifact::resolved(coordinate.clone(), file))
        } else {
            Ok(ResolvedArtifact::unresolved(coordinate.clone()))
        }
    }

    fn transitive_closure(
        &self,
        coordinates: &[ArtifactCoordinate],
        _repositories: &[Repository],
    ) -> Result<Vec<ArtifactCoordinate>, ResolverError> {
        let mut queue: VecDeque<ArtifactCoordinate> = coordinates.iter().cloned().collect();
        let mut visited = BTreeSet::new();
        let mut closure = Vec::new();

        while let Some(coordinate) = queue.pop_front() {
            if !visited.insert(coordinate.clone()) {
                continue;
            }
            closure.push(coordinate.clone());

            let pom_path = self.pom_path(&coordinate);
            let Some(pom) = self.cached_pom(&pom_path) else {
                continue;
            };
            queue.extend(Self::dependency_coordinates(&pom.dependencies));
        }

        Ok(closure)
    }

    fn resolve_project_model(
        &self,
        descriptor: &Path,
        active_profiles: &[String],
        _inactive_profiles: &[String],
    ) -> Result<Arc<ResolvedProjectModel>, ResolverError> {
        let pom = match read_pom(descriptor) {
            Ok(pom) => pom,
            Err(ModelError::Xml { path, source }) => {
                return Err(ResolverError::Validation {
                    messages: vec![format!("{}: {source}", path.display())],
                })
            }
            Err(err) => {
                return Err(ResolverError::Fatal {
                    message: err.to_string(),
                    cause: Some(Box::new(err)),
                })
            }
        };

        let mut seen = BTreeSet::new();
        self.build_model(descriptor, &pom, active_profiles.to_vec(), 0, &mut seen)
    }

    fn execute_goals(
        &self,
        _descriptor: &Path,
        goals: &[String],
        _active_profiles: &[String],
        _selected_modules: &[String],
        _make_flags: &[String],
    ) -> Result<GoalExecutionReport, ResolverError> {
        Err(ResolverError::fatal(format!(
            "offline resolver cannot execute goals [{}]; a build tool installation is required",
            goals.join(", ")
        )))
    }

    fn available_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        _repositories: &[Repository],
    ) -> Result<Vec<String>, ResolverError> {
        let dir = self
            .repo_root
            .join(group_id.replace('.', "/"))
            .join(artifact_id);
        let entries = std::fs::read_dir(&dir).map_err(|err| ResolverError::Fatal {
            message: format!("cannot list versions under {}", dir.display()),
            cause: Some(Box::new(err)),
        })?;

        let mut versions: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        Ok(versions)
    }

    fn clear_caches(&self) {
        self.pom_cache.lock().clear();
    }

    fn clear_caches_for(&self, project_id: &str) {
        self.pom_cache
            .lock()
            .retain(|path, _| !path.starts_with(project_id));
    }
}

/// Numeric-aware comparison of dotted version strings; non-numeric segments
/// fall back to lexicographic order.
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let mut left = a.split(['.', '-']);
    let mut right = b.split(['.', '-']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return std::cmp::Ordering::Equal,
            (None, Some(_)) => return std::cmp::Ordering::Less,
            (Some(_), None) => return std::cmp::Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering_is_numeric_aware() {
        let mut versions = vec![
            "2.0.10".to_string(),
            "2.0.9".to_string(),
            "10.0".to_string(),
            "2.0.9-rc1".to_string(),
        ];
        versions.sort_by(|a, b| compare_versions(a, b));
        assert_eq!(versions, ["2.0.9", "2.0.9-rc1", "2.0.10", "10.0"]);
    }
}
