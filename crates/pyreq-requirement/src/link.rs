use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::VcsKind;

static EGG_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#&]egg=([^&]*)").expect("egg fragment regex is valid"));
static SUBDIRECTORY_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[#&]subdirectory=([^&]*)").expect("subdirectory fragment regex is valid")
});
static HASH_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sha1|sha224|sha384|sha256|sha512|md5)=([a-f0-9]+)")
        .expect("hash fragment regex is valid")
});

/// A location from which a distribution can be obtained: a remote URL, a local `file://` URL,
/// or a `<vcs>+<url>` reference.
///
/// Links are kept verbatim; the accessors below extract the pieces that the rest of the
/// system cares about (egg name, subdirectory, hash) without normalizing the original text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link(String);

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Create a `file://` link for a local path, resolving it against the working directory.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = std::path::absolute(path.as_ref()).ok()?;
        let url = Url::from_file_path(path).ok()?;
        Some(Self(url.to_string()))
    }

    /// The full link, including any fragment.
    pub fn url(&self) -> &str {
        &self.0
    }

    /// The link with its `#fragment` removed.
    pub fn url_without_fragment(&self) -> &str {
        self.0
            .split_once('#')
            .map_or(self.0.as_str(), |(url, _)| url)
    }

    pub fn fragment(&self) -> Option<&str> {
        self.0.split_once('#').map(|(_, fragment)| fragment)
    }

    /// The URL scheme, e.g., `https` or `git+ssh`.
    pub fn scheme(&self) -> Option<&str> {
        let (scheme, _) = self.0.split_once(':')?;
        let mut chars = scheme.chars();
        if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
            Some(scheme)
        } else {
            None
        }
    }

    /// The project name given by the `#egg=` fragment, without any extras.
    pub fn egg_fragment(&self) -> Option<&str> {
        let captures = EGG_FRAGMENT.captures(&self.0)?;
        let egg = captures.get(1)?.as_str();
        let egg = egg.split_once('[').map_or(egg, |(name, _)| name);
        if egg.is_empty() { None } else { Some(egg) }
    }

    /// The `#subdirectory=` fragment, if any.
    pub fn subdirectory_fragment(&self) -> Option<&str> {
        let captures = SUBDIRECTORY_FRAGMENT.captures(&self.0)?;
        captures
            .get(1)
            .map(|subdirectory| subdirectory.as_str())
            .filter(|subdirectory| !subdirectory.is_empty())
    }

    /// The hash digest embedded in the link (e.g., `#sha256=...`).
    pub fn hash(&self) -> Option<&str> {
        let captures = HASH_FRAGMENT.captures(&self.0)?;
        captures.get(2).map(|hash| hash.as_str())
    }

    /// The name of the hash algorithm embedded in the link.
    pub fn hash_name(&self) -> Option<&str> {
        let captures = HASH_FRAGMENT.captures(&self.0)?;
        captures.get(1).map(|name| name.as_str())
    }

    /// The percent-decoded final path segment.
    pub fn filename(&self) -> String {
        let path = self.path_component().trim_end_matches('/');
        let segment = path.rsplit('/').next().unwrap_or(path);
        percent_decode_str(segment).decode_utf8_lossy().into_owned()
    }

    /// The final segment of the link, without query or fragment.
    pub fn show_url(&self) -> &str {
        let url = self.url_without_fragment();
        let url = url.split_once('?').map_or(url, |(url, _)| url);
        url.rsplit('/').next().unwrap_or(url)
    }

    /// Returns `true` if the link points at the local filesystem.
    pub fn is_file(&self) -> bool {
        self.scheme().is_some_and(|scheme| scheme == "file")
    }

    /// Returns `true` if the link is a `<vcs>+<url>` reference.
    pub fn is_vcs(&self) -> bool {
        VcsKind::from_prefix(&self.0).is_some()
    }

    /// Returns `true` if the link points at a downloadable artifact rather than a repository.
    pub fn is_artifact(&self) -> bool {
        !self.is_vcs()
    }

    /// Convert a `file://` link into a filesystem path.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if !self.is_file() {
            return None;
        }
        Url::parse(self.url_without_fragment())
            .ok()?
            .to_file_path()
            .ok()
    }

    /// The path portion of the link, without scheme, authority, query, or fragment.
    fn path_component(&self) -> &str {
        let url = self.url_without_fragment();
        let url = url.split_once('?').map_or(url, |(url, _)| url);
        match url.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("", |index| &rest[index..]),
            None => url,
        }
    }
}

impl Display for Link {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Link {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::Link;

    #[test]
    fn fragments() {
        let link = Link::new(
            "git+https://github.com/pypa/pip.git@main#egg=pip[extra]&subdirectory=src",
        );
        assert_eq!(link.egg_fragment(), Some("pip"));
        assert_eq!(link.subdirectory_fragment(), Some("src"));
        assert_eq!(link.scheme(), Some("git+https"));
        assert!(link.is_vcs());
        assert!(!link.is_artifact());
        assert_eq!(
            link.url_without_fragment(),
            "git+https://github.com/pypa/pip.git@main"
        );
    }

    #[test]
    fn hash() {
        let link = Link::new(
            "https://files.example.com/packages/six-1.16.0-py2.py3-none-any.whl#sha256=8abb2f1d86890a2dfb989f9a77cfcfd3e47c2a354b01111771326f8aa26e0254",
        );
        assert_eq!(link.hash_name(), Some("sha256"));
        assert_eq!(
            link.hash(),
            Some("8abb2f1d86890a2dfb989f9a77cfcfd3e47c2a354b01111771326f8aa26e0254")
        );
        assert_eq!(link.filename(), "six-1.16.0-py2.py3-none-any.whl");
        assert_eq!(link.show_url(), "six-1.16.0-py2.py3-none-any.whl");
        assert!(link.is_artifact());
        assert!(!link.is_file());
    }

    #[test]
    fn no_hash() {
        let link = Link::new("https://files.example.com/packages/six-1.16.0.tar.gz");
        assert_eq!(link.hash(), None);
        assert_eq!(link.egg_fragment(), None);
    }

    #[test]
    fn filename_is_decoded() {
        let link = Link::new("https://example.com/simple/my%20pkg-1.0.tar.gz?query=1");
        assert_eq!(link.filename(), "my pkg-1.0.tar.gz");
    }

    #[test]
    fn file_path() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let link = Link::from_path(temp_dir.path()).unwrap();
        assert!(link.is_file());
        assert_eq!(link.to_file_path().unwrap(), temp_dir.path());
    }
}
