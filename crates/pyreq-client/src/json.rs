use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The response of the JSON API for a project (`/<name>/json`) or a single release
/// (`/<name>/<version>/json`).
///
/// Release endpoints omit `releases`; the files of the requested release are in `urls`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectJson {
    pub info: InfoJson,
    #[serde(default)]
    pub releases: BTreeMap<String, Vec<FileJson>>,
    #[serde(default)]
    pub urls: Vec<FileJson>,
}

/// The core metadata of the latest (or requested) release.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoJson {
    pub name: String,
    pub version: String,
    /// `Requires-Dist` lines, verbatim. `null` when the release didn't upload any.
    #[serde(default)]
    pub requires_dist: Option<Vec<String>>,
    #[serde(default)]
    pub requires_python: Option<String>,
    #[serde(default)]
    pub yanked: bool,
}

/// A single distribution file of a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileJson {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub digests: Digests,
    pub packagetype: PackageType,
    #[serde(default)]
    pub requires_python: Option<String>,
    #[serde(default)]
    pub yanked: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Digests {
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    BdistWheel,
    Sdist,
    #[serde(other)]
    Other,
}

impl FileJson {
    /// The download URL with a `#sha256=` fragment, when the index reported a digest.
    pub fn url_with_hash(&self) -> String {
        match &self.digests.sha256 {
            Some(sha256) => format!("{}#sha256={sha256}", self.url),
            None => self.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{PackageType, ProjectJson};

    #[test]
    fn release_without_releases() {
        let json = r#"{
            "info": {"name": "six", "version": "1.16.0", "requires_dist": null},
            "urls": [
                {
                    "filename": "six-1.16.0-py2.py3-none-any.whl",
                    "url": "https://files.example.com/six-1.16.0-py2.py3-none-any.whl",
                    "digests": {"md5": "00", "sha256": "8abb"},
                    "packagetype": "bdist_wheel",
                    "yanked": false
                },
                {
                    "filename": "six-1.16.0.zip",
                    "url": "https://files.example.com/six-1.16.0.zip",
                    "digests": {},
                    "packagetype": "bdist_msi"
                }
            ]
        }"#;
        let project: ProjectJson = serde_json::from_str(json).unwrap();
        assert!(project.releases.is_empty());
        assert_eq!(project.info.requires_dist, None);
        assert_eq!(project.urls[0].packagetype, PackageType::BdistWheel);
        assert_eq!(
            project.urls[0].url_with_hash(),
            "https://files.example.com/six-1.16.0-py2.py3-none-any.whl#sha256=8abb"
        );
        assert_eq!(project.urls[1].packagetype, PackageType::Other);
        assert_eq!(
            project.urls[1].url_with_hash(),
            "https://files.example.com/six-1.16.0.zip"
        );
    }
}
