//! Parsing of requirements-file lines.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use pep440_rs::VersionSpecifiers;

use pyreq_normalize::{ExtraName, PackageName};

use crate::{Link, Requirement, RequirementError, RequirementSource, VcsKind, VcsSource};

/// Schemes for which the marker separator is `; ` rather than `;`.
const SCHEMES: &[&str] = &["http://", "https://", "ftp://", "ftps://", "file://"];

/// Archive extensions recognized as installable files.
const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".whl", ".tar.gz", ".tgz", ".tar.bz2", ".tbz", ".tar.xz", ".txz", ".tar", ".zip",
];

/// How a line (stripped of hashes, markers, and extras) should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Vcs,
    Url,
    Path,
    Named,
}

impl LineKind {
    fn classify(line: &str) -> Self {
        if VcsKind::from_prefix(line).is_some() {
            Self::Vcs
        } else if SCHEMES.iter().any(|scheme| line.starts_with(scheme)) {
            Self::Url
        } else if is_installable_path(line) {
            Self::Path
        } else {
            Self::Named
        }
    }
}

impl Requirement {
    /// Parse a single requirements-file line.
    ///
    /// Accepts named requirements (`requests[security]>=2.0; python_version < "3"`), local
    /// paths and archives (`./project`, `dist/pkg-1.0.tar.gz`), URLs, and version control
    /// references (`-e git+https://github.com/org/repo.git@v1#egg=repo`), each optionally
    /// followed by `--hash=<algorithm>:<digest>` options.
    pub fn from_line(line: &str) -> Result<Self, RequirementError> {
        let line = line.trim();
        let (line, hashes) = split_hashes(line)?;
        let (line, editable) = split_editable(line);
        let (line, markers) = split_markers(line);
        if line.is_empty() {
            return Err(RequirementError::Empty);
        }
        let (stripped, mut extras) = split_extras(line)?;

        let requirement = match LineKind::classify(stripped) {
            LineKind::Vcs => {
                let source = VcsSource::parse(stripped)
                    .ok_or_else(|| RequirementError::MissingName(line.to_string()))?;
                extras.extend(egg_extras(&source.link)?);
                Self {
                    name: source.link.egg_fragment().map(ToString::to_string),
                    source: RequirementSource::Vcs(source),
                    extras,
                    markers,
                    editable,
                    hashes,
                    line: Some(if editable {
                        format!("-e {line}")
                    } else {
                        line.to_string()
                    }),
                    index: None,
                }
            }
            LineKind::Url => {
                let link = Link::new(stripped);
                Self {
                    name: link.egg_fragment().map(ToString::to_string),
                    source: RequirementSource::Url {
                        uri: stripped.to_string(),
                        link,
                        direct_reference: false,
                    },
                    extras,
                    markers,
                    editable,
                    hashes,
                    line: Some(line.to_string()),
                    index: None,
                }
            }
            LineKind::Path => {
                let (path, fragment) = match stripped.split_once('#') {
                    Some((path, fragment)) => (path, Some(fragment)),
                    None => (stripped, None),
                };
                let link = Link::from_path(path)
                    .ok_or_else(|| RequirementError::InvalidPath(path.to_string()))?;
                let link = match fragment {
                    Some(fragment) => Link::new(format!("{link}#{fragment}")),
                    None => link,
                };
                let name = link
                    .egg_fragment()
                    .map(ToString::to_string)
                    .or_else(|| Some(link.show_url().to_string()).filter(|name| !name.is_empty()))
                    .or_else(|| Some(link.filename()).filter(|name| !name.is_empty()));
                Self {
                    name,
                    source: RequirementSource::Path {
                        path: relative_path(path),
                        link,
                    },
                    extras,
                    markers,
                    editable,
                    hashes,
                    line: Some(line.to_string()),
                    index: None,
                }
            }
            LineKind::Named => {
                let named = parse_named(line)?;
                Self {
                    name: Some(named.name),
                    source: named.source,
                    extras: named.extras,
                    markers,
                    editable,
                    hashes,
                    line: Some(line.to_string()),
                    index: None,
                }
            }
        };
        Ok(requirement)
    }
}

/// Split trailing `--hash` options off a line.
fn split_hashes(line: &str) -> Result<(&str, Vec<String>), RequirementError> {
    let Some(index) = line.find(" --hash") else {
        return Ok((line, Vec::new()));
    };
    let (line, options) = line.split_at(index);

    let mut hashes = Vec::new();
    let mut tokens = options.split_whitespace();
    while let Some(token) = tokens.next() {
        let hash = if let Some(hash) = token.strip_prefix("--hash=") {
            hash
        } else if token == "--hash" {
            tokens
                .next()
                .ok_or_else(|| RequirementError::UnexpectedToken(token.to_string()))?
        } else {
            return Err(RequirementError::UnexpectedToken(token.to_string()));
        };
        match hash.split_once(':') {
            Some((algorithm, digest)) if !algorithm.is_empty() && !digest.is_empty() => {
                hashes.push(hash.to_string());
            }
            _ => return Err(RequirementError::InvalidHash(hash.to_string())),
        }
    }
    Ok((line.trim_end(), hashes))
}

/// Strip a leading `-e` or `--editable` flag.
fn split_editable(line: &str) -> (&str, bool) {
    for flag in ["-e", "--editable"] {
        if let Some(rest) = line.strip_prefix(flag) {
            if rest.starts_with(char::is_whitespace) {
                return (rest.trim_start(), true);
            }
            if let Some(rest) = rest.strip_prefix('=') {
                return (rest.trim_start(), true);
            }
        }
    }
    (line, false)
}

/// Split off the environment markers.
///
/// URLs may legitimately contain `;`, so for lines that start with a scheme only `; ` is
/// treated as the separator.
fn split_markers(line: &str) -> (&str, Option<String>) {
    let is_url = SCHEMES.iter().any(|scheme| line.starts_with(scheme))
        || VcsKind::from_prefix(line).is_some();
    let separator = if is_url { "; " } else { ";" };
    match line.split_once(separator) {
        Some((line, markers)) => {
            let markers = markers.trim();
            (
                line.trim_end(),
                (!markers.is_empty()).then(|| markers.to_string()),
            )
        }
        None => (line, None),
    }
}

/// Split a trailing `[extra,...]` group off a line.
fn split_extras(line: &str) -> Result<(&str, BTreeSet<ExtraName>), RequirementError> {
    let Some(body) = line.strip_suffix(']') else {
        return Ok((line, BTreeSet::new()));
    };
    let Some(start) = body.rfind('[') else {
        return Ok((line, BTreeSet::new()));
    };
    let extras = &body[start + 1..];
    if !extras.chars().all(|c| {
        c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '_' | '.' | ',')
    }) {
        return Ok((line, BTreeSet::new()));
    }
    Ok((body[..start].trim_end(), parse_extras(extras)?))
}

fn parse_extras(extras: &str) -> Result<BTreeSet<ExtraName>, RequirementError> {
    extras
        .split(',')
        .map(str::trim)
        .filter(|extra| !extra.is_empty())
        .map(|extra| {
            ExtraName::from_str(extra)
                .map_err(|_| RequirementError::InvalidExtras(extras.to_string()))
        })
        .collect()
}

/// Extras embedded in an `#egg=name[extra]` fragment.
fn egg_extras(link: &Link) -> Result<BTreeSet<ExtraName>, RequirementError> {
    let Some(egg) = link
        .fragment()
        .and_then(|fragment| fragment.split('&').find_map(|part| part.strip_prefix("egg=")))
    else {
        return Ok(BTreeSet::new());
    };
    match egg
        .split_once('[')
        .and_then(|(_, extras)| extras.strip_suffix(']'))
    {
        Some(extras) => parse_extras(extras),
        None => Ok(BTreeSet::new()),
    }
}

/// Returns `true` if the line names a local directory or archive.
///
/// Anything spelled like a path counts; otherwise the line must name an existing project
/// directory or archive.
fn is_installable_path(line: &str) -> bool {
    if line.starts_with('.') || line.starts_with('/') || line.starts_with('\\') {
        return true;
    }
    let mut chars = line.chars();
    if let (Some(drive), Some(':'), Some('\\' | '/')) = (chars.next(), chars.next(), chars.next())
    {
        if drive.is_ascii_alphabetic() {
            return true;
        }
    }

    let path = Path::new(line);
    if path.is_dir() {
        return ["setup.py", "pyproject.toml", "setup.cfg"]
            .iter()
            .any(|marker| path.join(marker).is_file());
    }
    path.is_file()
        && ARCHIVE_EXTENSIONS
            .iter()
            .any(|extension| line.to_ascii_lowercase().ends_with(extension))
}

/// Spell a path relative to the working directory as `./path`.
fn relative_path(path: &str) -> String {
    if path == "." || path.starts_with('.') || Path::new(path).is_absolute() {
        path.to_string()
    } else {
        format!("./{path}")
    }
}

/// A `name[extras] <specifiers>` or `name[extras] @ <url>` requirement.
struct NamedLine {
    name: String,
    extras: BTreeSet<ExtraName>,
    source: RequirementSource,
}

fn parse_named(line: &str) -> Result<NamedLine, RequirementError> {
    let end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(line.len());
    let name = &line[..end];
    if name.is_empty() {
        return Err(RequirementError::MissingName(line.to_string()));
    }
    PackageName::from_str(name)?;

    let mut rest = line[end..].trim_start();
    let mut extras = BTreeSet::new();
    if let Some(bracketed) = rest.strip_prefix('[') {
        let (inner, after) = bracketed
            .split_once(']')
            .ok_or_else(|| RequirementError::InvalidExtras(line.to_string()))?;
        extras = parse_extras(inner)?;
        rest = after.trim_start();
    }

    if let Some(url) = rest.strip_prefix('@') {
        let url = url.trim();
        return Ok(NamedLine {
            name: name.to_string(),
            extras,
            source: RequirementSource::Url {
                uri: url.to_string(),
                link: Link::new(url),
                direct_reference: true,
            },
        });
    }

    let rest = rest
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(rest)
        .trim();
    let specifiers = if rest.is_empty() {
        None
    } else {
        Some(VersionSpecifiers::from_str(rest).map_err(|source| {
            RequirementError::InvalidSpecifier {
                specifier: rest.to_string(),
                source,
            }
        })?)
    };
    Ok(NamedLine {
        name: name.to_string(),
        extras,
        source: RequirementSource::Registry { specifiers },
    })
}

#[cfg(test)]
mod tests {
    use super::{split_editable, split_extras, split_hashes, split_markers};

    #[test]
    fn hashes() {
        let (line, hashes) =
            split_hashes("six==1.16.0 --hash=sha256:abc --hash sha256:def").unwrap();
        assert_eq!(line, "six==1.16.0");
        assert_eq!(hashes, vec!["sha256:abc", "sha256:def"]);
    }

    #[test]
    fn hashes_reject_other_options() {
        assert!(split_hashes("six==1.16.0 --hash=sha256:abc --pre").is_err());
        assert!(split_hashes("six==1.16.0 --hash=abc").is_err());
    }

    #[test]
    fn editable() {
        assert_eq!(split_editable("-e ."), (".", true));
        assert_eq!(split_editable("--editable ./pkg"), ("./pkg", true));
        assert_eq!(split_editable("-e=./pkg"), ("./pkg", true));
        assert_eq!(split_editable("-esomething"), ("-esomething", false));
    }

    #[test]
    fn markers() {
        assert_eq!(
            split_markers("requests;python_version<'3'"),
            ("requests", Some("python_version<'3'".to_string()))
        );
        assert_eq!(
            split_markers("https://example.com/a;b.tar.gz; os_name == 'nt'"),
            ("https://example.com/a;b.tar.gz", Some("os_name == 'nt'".to_string()))
        );
        assert_eq!(split_markers("requests;"), ("requests", None));
    }

    #[test]
    fn extras() {
        let (line, extras) = split_extras("requests[socks, security]").unwrap();
        assert_eq!(line, "requests");
        assert_eq!(extras.len(), 2);

        let (line, extras) = split_extras("http://[::1]/pkg.tar.gz").unwrap();
        assert_eq!(line, "http://[::1]/pkg.tar.gz");
        assert!(extras.is_empty());
    }
}
