use std::path::Path;

use mason_core::ArtifactCoordinate;

const INDEXABLE_EXTENSIONS: &[&str] = &["jar", "war", "ear", "pom", "zip"];

/// Recognize an artifact file by its position in a Maven-layout repository:
/// `<group/as/dirs>/<artifact>/<version>/<artifact>-<version>[-<classifier>].<ext>`.
///
/// Returns `None` for anything that is not an indexable artifact — checksum
/// and metadata files, files outside the root, names that do not embed the
/// version directory. This is the inverse of the resolver's jar-path
/// construction.
pub fn artifact_at(repo_root: &Path, file: &Path) -> Option<ArtifactCoordinate> {
    let rel = file.strip_prefix(repo_root).ok()?;

    let extension = file.extension()?.to_str()?;
    if !INDEXABLE_EXTENSIONS.contains(&extension) {
        return None;
    }

    let mut components: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;

    // Need at least group segment, artifact dir, version dir and file name.
    if components.len() < 4 {
        return None;
    }

    let file_name = components.pop()?;
    let version = components.pop()?;
    let artifact_id = components.pop()?;
    let group_id = components.join(".");
    if group_id.is_empty() {
        return None;
    }

    let stem = file_name.strip_suffix(&format!(".{extension}"))?;
    let base = format!("{artifact_id}-{version}");
    let classifier = match stem.strip_prefix(&base) {
        Some("") => None,
        Some(rest) => Some(rest.strip_prefix('-')?.to_string()),
        None => return None,
    };

    let mut coordinate =
        ArtifactCoordinate::new(group_id, artifact_id, version).with_packaging(extension);
    if let Some(classifier) = classifier {
        coordinate = coordinate.with_classifier(classifier);
    }
    Some(coordinate)
}
