use std::path::{Path, PathBuf};
use std::sync::Arc;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use software_catalog::discovery::{DiscoverySettings, LocalManifest};
use software_catalog::store::FileEntityStore;

pub(crate) const DEFAULT_CONFIG_FILE: &str = "software-catalog.toml";

/// Environment variables and the configuration keys they override.
const ENV_OVERRIDES: [(&str, &str); 7] = [
    ("GITLAB_HOST", "gitlab.host"),
    ("GITLAB_API_TOKEN", "gitlab.token"),
    ("GITLAB_GROUP_TO_SCAN", "gitlab.group_to_scan"),
    ("CATALOG_STORE_PATH", "store.path"),
    ("CATALOG_MANIFESTS_EXTERNAL", "manifests.external"),
    ("CATALOG_MANIFESTS_MANUAL", "manifests.manual"),
    ("CATALOG_MANIFESTS_RESOURCES", "manifests.resources"),
];

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub gitlab: GitLabSettings,
    pub store: StoreSettings,
    pub manifests: ManifestSettings,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub(crate) struct GitLabSettings {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_to_scan: Option<String>,
}

impl Default for GitLabSettings {
    fn default() -> Self {
        Self {
            host: "https://gitlab.com".to_string(),
            token: None,
            group_to_scan: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub(crate) struct StoreSettings {
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("catalog.json"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub(crate) struct ManifestSettings {
    pub external: PathBuf,
    pub manual: PathBuf,
    pub resources: PathBuf,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            external: PathBuf::from("mocks/external-components.yaml"),
            manual: PathBuf::from("mocks/manual-components.yaml"),
            resources: PathBuf::from("mocks/resources.yaml"),
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file at `path` (or [`DEFAULT_CONFIG_FILE`]) when it exists, then
    /// environment variables.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let env_names = ENV_OVERRIDES.map(|(env, _)| env);

        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(
                Env::raw().only(&env_names).map(|key| {
                    ENV_OVERRIDES
                        .iter()
                        .find(|(env, _)| key.as_str().eq_ignore_ascii_case(env))
                        .map(|(_, path)| (*path).into())
                        .unwrap_or_else(|| key.as_str().to_string().into())
                }),
            )
            .extract()
    }

    pub(crate) fn discovery(&self) -> DiscoverySettings {
        DiscoverySettings {
            group_to_scan: self.gitlab.group_to_scan.clone(),
            local_manifests: vec![
                LocalManifest::new(&self.manifests.external, true),
                LocalManifest::new(&self.manifests.manual, false),
                LocalManifest::new(&self.manifests.resources, false),
            ],
        }
    }

    pub(crate) fn entity_store(&self) -> Arc<FileEntityStore> {
        Arc::new(FileEntityStore::new(&self.store.path))
    }
}
