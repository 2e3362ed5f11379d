use std::fmt::{Display, Formatter};
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use pyreq_normalize::ExtraName;

use crate::Link;

/// A version control system supported in `<vcs>+<url>` requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Hg,
    Svn,
    Bzr,
}

impl VcsKind {
    pub const ALL: [Self; 4] = [Self::Git, Self::Hg, Self::Svn, Self::Bzr];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Hg => "hg",
            Self::Svn => "svn",
            Self::Bzr => "bzr",
        }
    }

    /// Detect a `<vcs>+` prefix at the start of a line.
    pub fn from_prefix(line: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|vcs| {
            line.strip_prefix(vcs.as_str())
                .is_some_and(|rest| rest.starts_with('+'))
        })
    }
}

impl FromStr for VcsKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|vcs| vcs.as_str() == s)
            .ok_or_else(|| format!("Unknown version control system: `{s}`"))
    }
}

impl Display for VcsKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `<vcs>+<url>[@<ref>][#egg=<name>][&subdirectory=<dir>]` reference.
#[derive(Debug, Clone)]
pub struct VcsSource {
    pub vcs: VcsKind,
    /// The repository URL, with the `<vcs>+` prefix but without the reference or fragment.
    pub uri: String,
    pub reference: Option<String>,
    pub subdirectory: Option<String>,
    /// The full link, including the reference and fragment.
    pub link: Link,
}

impl VcsSource {
    /// Parse a `<vcs>+<url>` line (without any `-e` prefix or trailing extras).
    ///
    /// SCP-style Git locations (`git+git@github.com:org/repo.git`) are accepted and kept in
    /// their original spelling.
    pub fn parse(line: &str) -> Option<Self> {
        let vcs = VcsKind::from_prefix(line)?;
        let link = Link::new(line);
        let location = link.url_without_fragment();

        // The reference follows the last `@` in the path, after the authority.
        let authority_end = location
            .find("://")
            .map(|index| index + 3)
            .or_else(|| location.find(':'))
            .unwrap_or(0);
        let path_start = location[authority_end..]
            .find('/')
            .map_or(authority_end, |index| authority_end + index);
        let (uri, reference) = match location[path_start..].rfind('@') {
            Some(index) => {
                let split = path_start + index;
                let reference = &location[split + 1..];
                (
                    location[..split].to_string(),
                    (!reference.is_empty()).then(|| reference.to_string()),
                )
            }
            None => (location.to_string(), None),
        };

        let subdirectory = link.subdirectory_fragment().map(ToString::to_string);
        Some(Self {
            vcs,
            uri,
            reference,
            subdirectory,
            link,
        })
    }

    /// The repository URL without the `<vcs>+` prefix, as written to a Pipfile.
    pub fn repository(&self) -> &str {
        self.uri
            .strip_prefix(self.vcs.as_str())
            .and_then(|uri| uri.strip_prefix('+'))
            .unwrap_or(&self.uri)
    }
}

/// Two sources are equal if they check out the same tree; the spelling of the link is ignored.
impl PartialEq for VcsSource {
    fn eq(&self, other: &Self) -> bool {
        self.vcs == other.vcs
            && self.uri == other.uri
            && self.reference == other.reference
            && self.subdirectory == other.subdirectory
    }
}

impl Eq for VcsSource {}

/// Assemble a `<vcs>+<uri>[@ref][#egg=<name>[extras]][&subdirectory=<dir>]` line.
///
/// The `<vcs>+` anchor (and `-e ` prefix) are only added once, so the function can be re-run
/// on a URI that already carries them.
pub fn build_vcs_link(
    vcs: VcsKind,
    uri: &str,
    name: Option<&str>,
    reference: Option<&str>,
    subdirectory: Option<&str>,
    editable: bool,
    extras: &[ExtraName],
) -> String {
    let uri = uri.strip_prefix("-e ").map_or(uri, str::trim_start);
    let uri = uri
        .strip_prefix(vcs.as_str())
        .and_then(|uri| uri.strip_prefix('+'))
        .unwrap_or(uri);

    let mut line = String::new();
    if editable {
        line.push_str("-e ");
    }
    line.push_str(vcs.as_str());
    line.push('+');
    line.push_str(uri);

    if let Some(reference) = reference {
        line.push('@');
        line.push_str(reference);
    }
    if let Some(name) = name {
        line.push_str("#egg=");
        line.push_str(name);
        if !extras.is_empty() {
            line.push('[');
            line.push_str(&extras.iter().join(","));
            line.push(']');
        }
    }
    if let Some(subdirectory) = subdirectory {
        line.push(if name.is_some() { '&' } else { '#' });
        line.push_str("subdirectory=");
        line.push_str(subdirectory);
    }
    line
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pyreq_normalize::ExtraName;

    use super::{VcsKind, VcsSource, build_vcs_link};

    #[test]
    fn parse_with_reference() {
        let source =
            VcsSource::parse("git+https://github.com/pinax/pinax.git@1.4#egg=pinax").unwrap();
        assert_eq!(source.vcs, VcsKind::Git);
        assert_eq!(source.uri, "git+https://github.com/pinax/pinax.git");
        assert_eq!(source.repository(), "https://github.com/pinax/pinax.git");
        assert_eq!(source.reference.as_deref(), Some("1.4"));
        assert_eq!(source.subdirectory, None);
        assert_eq!(source.link.egg_fragment(), Some("pinax"));
    }

    #[test]
    fn parse_with_credentials() {
        let source =
            VcsSource::parse("git+ssh://git@github.com/org/repo.git#egg=repo&subdirectory=sub")
                .unwrap();
        assert_eq!(source.uri, "git+ssh://git@github.com/org/repo.git");
        assert_eq!(source.reference, None);
        assert_eq!(source.subdirectory.as_deref(), Some("sub"));
    }

    #[test]
    fn parse_scp_style() {
        let source = VcsSource::parse("git+git@github.com:org/repo.git@v2#egg=repo").unwrap();
        assert_eq!(source.uri, "git+git@github.com:org/repo.git");
        assert_eq!(source.repository(), "git@github.com:org/repo.git");
        assert_eq!(source.reference.as_deref(), Some("v2"));
    }

    #[test]
    fn parse_without_vcs() {
        assert!(VcsSource::parse("https://github.com/org/repo.git").is_none());
    }

    #[test]
    fn build() {
        let line = build_vcs_link(
            VcsKind::Git,
            "https://github.com/requests/requests.git",
            Some("requests"),
            Some("master"),
            None,
            false,
            &[ExtraName::from_str("security").unwrap()],
        );
        assert_eq!(
            line,
            "git+https://github.com/requests/requests.git@master#egg=requests[security]"
        );
    }

    #[test]
    fn build_editable_with_subdirectory() {
        let line = build_vcs_link(
            VcsKind::Hg,
            "http://hg.example.com/MyProject",
            Some("MyProject"),
            None,
            Some("src"),
            true,
            &[],
        );
        assert_eq!(
            line,
            "-e hg+http://hg.example.com/MyProject#egg=MyProject&subdirectory=src"
        );
    }

    #[test]
    fn build_is_idempotent_on_anchor() {
        let first = build_vcs_link(
            VcsKind::Git,
            "https://github.com/org/repo.git",
            None,
            None,
            None,
            true,
            &[],
        );
        let second = build_vcs_link(VcsKind::Git, &first, None, None, None, true, &[]);
        assert_eq!(first, "-e git+https://github.com/org/repo.git");
        assert_eq!(first, second);
    }
}
