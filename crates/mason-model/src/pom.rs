use std::collections::BTreeMap;
use std::path::Path;

use mason_core::Repository;

use crate::{
    Dependency, FileSpec, ModelError, OsSpec, Plugin, Profile, ProfileActivation, ProfileSource,
    PropertySpec,
};

/// Parent declaration inside a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
}

/// The raw, uninterpreted contents of one `pom.xml`.
///
/// This is deliberately not an effective model — inheritance, dependency
/// management and interpolation belong to the model resolver. The server
/// only needs enough of the descriptor to feed profile activation and
/// offline repository probing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomFile {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub parent: Option<ParentRef>,
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<Dependency>,
    pub modules: Vec<String>,
    pub profiles: Vec<Profile>,
}

impl PomFile {
    /// groupId falling back to the parent declaration, the way descriptors
    /// omit it in practice.
    pub fn effective_group_id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or_else(|| self.parent.as_ref()?.group_id.as_deref())
    }

    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or_else(|| self.parent.as_ref()?.version.as_deref())
    }
}

/// Profiles and the always-on profile id list from a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsFile {
    pub profiles: Vec<Profile>,
    /// `<activeProfiles>` entries: active for every invocation unless
    /// explicitly disabled.
    pub active_profiles: Vec<String>,
}

pub fn read_pom(path: &Path) -> Result<PomFile, ModelError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let doc = roxmltree::Document::parse(&contents).map_err(|source| ModelError::Xml {
        path: path.to_path_buf(),
        source,
    })?;

    let project = doc.root_element();

    let mut pom = PomFile {
        group_id: child_text(&project, "groupId"),
        artifact_id: child_text(&project, "artifactId"),
        version: child_text(&project, "version"),
        packaging: child_text(&project, "packaging"),
        ..Default::default()
    };

    if let Some(parent_node) = child_element(&project, "parent") {
        pom.parent = Some(ParentRef {
            group_id: child_text(&parent_node, "groupId"),
            artifact_id: child_text(&parent_node, "artifactId"),
            version: child_text(&parent_node, "version"),
        });
    }

    if let Some(props_node) = child_element(&project, "properties") {
        pom.properties = parse_properties(&props_node);
    }

    if let Some(deps_node) = child_element(&project, "dependencies") {
        pom.dependencies = parse_dependencies(&deps_node);
    }

    if let Some(modules_node) = child_element(&project, "modules") {
        pom.modules = modules_node
            .children()
            .filter(|n| n.is_element() && n.has_tag_name("module"))
            .filter_map(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }

    if let Some(profiles_node) = child_element(&project, "profiles") {
        pom.profiles = parse_profiles(&profiles_node, ProfileSource::Pom);
    }

    Ok(pom)
}

/// Profiles plus `<activeProfiles>` from a user/global settings file.
pub fn read_settings(path: &Path) -> Result<SettingsFile, ModelError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let doc = roxmltree::Document::parse(&contents).map_err(|source| ModelError::Xml {
        path: path.to_path_buf(),
        source,
    })?;

    let settings = doc.root_element();
    let mut out = SettingsFile::default();

    if let Some(profiles_node) = child_element(&settings, "profiles") {
        out.profiles = parse_profiles(&profiles_node, ProfileSource::Settings);
    }

    if let Some(active_node) = child_element(&settings, "activeProfiles") {
        out.active_profiles = active_node
            .children()
            .filter(|n| n.is_element() && n.has_tag_name("activeProfile"))
            .filter_map(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }

    Ok(out)
}

fn parse_profiles(profiles_node: &roxmltree::Node<'_, '_>, source: ProfileSource) -> Vec<Profile> {
    profiles_node
        .children()
        .filter(|n| n.is_element() && n.has_tag_name("profile"))
        .filter_map(|profile_node| {
            let id = child_text(&profile_node, "id")?;
            let mut profile = Profile::new(id, source);

            if let Some(activation_node) = child_element(&profile_node, "activation") {
                profile.active_by_default = child_text(&activation_node, "activeByDefault")
                    .is_some_and(|v| v == "true");
                let activation = parse_activation(&activation_node);
                if !activation.is_empty() {
                    profile.activation = Some(activation);
                }
            }

            if let Some(props_node) = child_element(&profile_node, "properties") {
                profile.properties = parse_properties(&props_node);
            }

            if let Some(deps_node) = child_element(&profile_node, "dependencies") {
                profile.dependencies = parse_dependencies(&deps_node);
            }

            if let Some(build_node) = child_element(&profile_node, "build") {
                if let Some(plugins_node) = child_element(&build_node, "plugins") {
                    profile.plugins = parse_plugins(&plugins_node);
                }
            }

            if let Some(repos_node) = child_element(&profile_node, "repositories") {
                profile.repositories = parse_repositories(&repos_node);
            }

            Some(profile)
        })
        .collect()
}

fn parse_activation(activation_node: &roxmltree::Node<'_, '_>) -> ProfileActivation {
    let mut activation = ProfileActivation::default();

    if let Some(file_node) = child_element(activation_node, "file") {
        activation.file = Some(FileSpec {
            exists: child_text(&file_node, "exists"),
            missing: child_text(&file_node, "missing"),
        });
    }

    if let Some(property_node) = child_element(activation_node, "property") {
        if let Some(name) = child_text(&property_node, "name") {
            activation.property = Some(PropertySpec {
                name,
                value: child_text(&property_node, "value"),
            });
        }
    }

    activation.jdk = child_text(activation_node, "jdk");

    if let Some(os_node) = child_element(activation_node, "os") {
        activation.os = Some(OsSpec {
            name: child_text(&os_node, "name"),
            family: child_text(&os_node, "family"),
            arch: child_text(&os_node, "arch"),
            version: child_text(&os_node, "version"),
        });
    }

    activation
}

fn parse_properties(props_node: &roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for child in props_node.children().filter(|n| n.is_element()) {
        let key = child.tag_name().name().to_string();
        if let Some(value) = child.text().map(str::trim).filter(|t| !t.is_empty()) {
            properties.insert(key, value.to_string());
        }
    }
    properties
}

fn parse_dependencies(deps_node: &roxmltree::Node<'_, '_>) -> Vec<Dependency> {
    deps_node
        .children()
        .filter(|n| n.is_element() && n.has_tag_name("dependency"))
        .filter_map(|dep_node| {
            let group_id = child_text(&dep_node, "groupId")?;
            let artifact_id = child_text(&dep_node, "artifactId")?;

            Some(Dependency {
                group_id,
                artifact_id,
                version: child_text(&dep_node, "version"),
                scope: child_text(&dep_node, "scope"),
                classifier: child_text(&dep_node, "classifier"),
                type_: child_text(&dep_node, "type"),
            })
        })
        .collect()
}

fn parse_plugins(plugins_node: &roxmltree::Node<'_, '_>) -> Vec<Plugin> {
    plugins_node
        .children()
        .filter(|n| n.is_element() && n.has_tag_name("plugin"))
        .filter_map(|plugin_node| {
            let artifact_id = child_text(&plugin_node, "artifactId")?;
            Some(Plugin {
                // Maven's implicit default plugin group.
                group_id: child_text(&plugin_node, "groupId")
                    .unwrap_or_else(|| "org.apache.maven.plugins".to_string()),
                artifact_id,
                version: child_text(&plugin_node, "version"),
            })
        })
        .collect()
}

fn parse_repositories(repos_node: &roxmltree::Node<'_, '_>) -> Vec<Repository> {
    repos_node
        .children()
        .filter(|n| n.is_element() && n.has_tag_name("repository"))
        .filter_map(|repo_node| {
            let id = child_text(&repo_node, "id")?;
            let url = child_text(&repo_node, "url")?;
            Some(Repository::new(id, url))
        })
        .collect()
}

fn child_element<'a>(
    node: &'a roxmltree::Node<'a, 'a>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: &roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    child_element(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(path, contents).expect("write file");
    }

    #[test]
    fn reads_profiles_with_activation_blocks() {
        let temp = tempfile::tempdir().expect("temp dir");
        let pom_path = temp.path().join("pom.xml");
        write_file(
            &pom_path,
            r#"
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.example</groupId>
  <artifactId>app</artifactId>
  <version>1.0.0</version>

  <profiles>
    <profile>
      <id>release</id>
      <activation>
        <activeByDefault>false</activeByDefault>
        <property>
          <name>performRelease</name>
          <value>true</value>
        </property>
      </activation>
      <properties>
        <skipTests>true</skipTests>
      </properties>
      <dependencies>
        <dependency>
          <groupId>com.example</groupId>
          <artifactId>release-support</artifactId>
          <version>2.0</version>
        </dependency>
      </dependencies>
    </profile>
    <profile>
      <id>local</id>
      <activation>
        <activeByDefault>true</activeByDefault>
        <file>
          <exists>${basedir}/local.marker</exists>
        </file>
      </activation>
    </profile>
  </profiles>
</project>
"#,
        );

        let pom = read_pom(&pom_path).expect("parse pom");
        assert_eq!(pom.artifact_id.as_deref(), Some("app"));
        assert_eq!(pom.profiles.len(), 2);

        let release = &pom.profiles[0];
        assert_eq!(release.id, "release");
        assert_eq!(release.source, ProfileSource::Pom);
        assert!(!release.active_by_default);
        let property = release
            .activation
            .as_ref()
            .and_then(|a| a.property.as_ref())
            .expect("property activation");
        assert_eq!(property.name, "performRelease");
        assert_eq!(property.value.as_deref(), Some("true"));
        assert_eq!(release.properties.get("skipTests").map(String::as_str), Some("true"));
        assert_eq!(release.dependencies.len(), 1);

        let local = &pom.profiles[1];
        assert!(local.active_by_default);
        assert_eq!(
            local
                .activation
                .as_ref()
                .and_then(|a| a.file.as_ref())
                .and_then(|f| f.exists.as_deref()),
            Some("${basedir}/local.marker")
        );
    }

    #[test]
    fn reads_settings_profiles_and_active_list() {
        let temp = tempfile::tempdir().expect("temp dir");
        let settings_path = temp.path().join("settings.xml");
        write_file(
            &settings_path,
            r#"
<settings>
  <profiles>
    <profile>
      <id>corp-mirror</id>
      <repositories>
        <repository>
          <id>corp</id>
          <url>https://repo.corp.example/maven2</url>
        </repository>
      </repositories>
    </profile>
  </profiles>
  <activeProfiles>
    <activeProfile>corp-mirror</activeProfile>
  </activeProfiles>
</settings>
"#,
        );

        let settings = read_settings(&settings_path).expect("parse settings");
        assert_eq!(settings.active_profiles, ["corp-mirror"]);
        assert_eq!(settings.profiles.len(), 1);
        assert_eq!(settings.profiles[0].source, ProfileSource::Settings);
        assert_eq!(settings.profiles[0].repositories.len(), 1);
    }

    #[test]
    fn parent_fallback_supplies_group_and_version() {
        let temp = tempfile::tempdir().expect("temp dir");
        let pom_path = temp.path().join("pom.xml");
        write_file(
            &pom_path,
            r#"
<project>
  <parent>
    <groupId>com.example</groupId>
    <artifactId>parent</artifactId>
    <version>3.1.4</version>
  </parent>
  <artifactId>child</artifactId>
</project>
"#,
        );

        let pom = read_pom(&pom_path).expect("parse pom");
        assert_eq!(pom.effective_group_id(), Some("com.example"));
        assert_eq!(pom.effective_version(), Some("3.1.4"));
    }
}
