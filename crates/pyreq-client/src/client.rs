use std::io::Read;
use std::time::Duration;

use pep440_rs::Version;
use reqwest::StatusCode;
use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::header::ACCEPT_ENCODING;
use tracing::trace;
use url::Url;

use pyreq_cache::{ArtifactError, ArtifactFetcher, open_local_file};
use pyreq_normalize::PackageName;
use pyreq_requirement::Link;

use crate::{Error, ProjectJson};

/// The JSON API of the Python Package Index.
pub const DEFAULT_JSON_API_URL: &str = "https://pypi.org/pypi";

/// A builder for a [`JsonApiClient`].
#[derive(Debug, Clone)]
pub struct JsonApiClientBuilder {
    base_url: String,
    timeout: Duration,
}

impl Default for JsonApiClientBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_JSON_API_URL)
    }
}

impl JsonApiClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<JsonApiClient, Error> {
        let client = ClientBuilder::new()
            .user_agent(format!("pyreq/{}", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(20)
            .timeout(self.timeout)
            .build()?;
        Ok(JsonApiClient {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

/// A blocking client for the JSON API of a package index.
#[derive(Debug, Clone)]
pub struct JsonApiClient {
    base_url: String,
    client: Client,
}

impl JsonApiClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the metadata of a project and the files of all of its releases.
    pub fn project(&self, package_name: &PackageName) -> Result<ProjectJson, Error> {
        let url = Url::parse(&format!("{}/{package_name}/json", self.base_url))?;
        trace!("Fetching metadata for {package_name} from {url}");

        let response = self.client.get(url.clone()).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::PackageNotFound(package_name.to_string()));
        }
        Self::parse(response, &url)
    }

    /// Fetch the metadata and files of a single release.
    pub fn release(
        &self,
        package_name: &PackageName,
        version: &Version,
    ) -> Result<ProjectJson, Error> {
        let url = Url::parse(&format!("{}/{package_name}/{version}/json", self.base_url))?;
        trace!("Fetching metadata for {package_name}=={version} from {url}");

        let response = self.client.get(url.clone()).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::ReleaseNotFound(
                package_name.to_string(),
                version.to_string(),
            ));
        }
        Self::parse(response, &url)
    }

    /// Stream a file from a remote URL, without content decoding, so the bytes read are the
    /// bytes the index hashed.
    pub fn stream(&self, url: &str) -> Result<Response, Error> {
        trace!("Streaming {url}");
        Ok(self
            .client
            .get(url)
            .header(ACCEPT_ENCODING, "identity")
            .send()?
            .error_for_status()?)
    }

    fn parse(response: Response, url: &Url) -> Result<ProjectJson, Error> {
        let text = response.error_for_status()?.text()?;
        serde_json::from_str(&text).map_err(|err| Error::from_json_err(err, url.to_string()))
    }
}

impl ArtifactFetcher for JsonApiClient {
    fn open(&self, link: &Link) -> Result<Box<dyn Read + '_>, ArtifactError> {
        if link.is_file() {
            let path = link
                .to_file_path()
                .ok_or_else(|| ArtifactError::UnsupportedLink(link.to_string()))?;
            return Ok(Box::new(open_local_file(&path)?));
        }
        if !matches!(link.scheme(), Some("http" | "https")) {
            return Err(ArtifactError::UnsupportedLink(link.to_string()));
        }
        let response =
            self.stream(link.url_without_fragment())
                .map_err(|err| ArtifactError::Remote {
                    url: link.url_without_fragment().to_string(),
                    source: Box::new(err),
                })?;
        Ok(Box::new(response))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pep440_rs::Version;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use pyreq_cache::{ArtifactError, Cache, HashCache};
    use pyreq_normalize::PackageName;
    use pyreq_requirement::Link;

    use crate::{Error, JsonApiClientBuilder};

    const PROJECT: &str = r#"{
        "info": {
            "name": "six",
            "version": "1.16.0",
            "requires_dist": null,
            "requires_python": ">=2.7, !=3.0.*, !=3.1.*, !=3.2.*"
        },
        "releases": {
            "1.15.0": [
                {
                    "filename": "six-1.15.0.tar.gz",
                    "url": "https://files.example.com/six-1.15.0.tar.gz",
                    "digests": {"sha256": "30639c"},
                    "packagetype": "sdist"
                }
            ],
            "1.16.0": []
        }
    }"#;

    #[tokio::test(flavor = "multi_thread")]
    async fn project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/six/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PROJECT))
            .mount(&server)
            .await;

        let base_url = format!("{}/pypi/", server.uri());
        let project = tokio::task::spawn_blocking(move || {
            let client = JsonApiClientBuilder::new(base_url).build().unwrap();
            client.project(&PackageName::from_str("Six").unwrap())
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(project.info.version, "1.16.0");
        assert_eq!(
            project.releases.keys().collect::<Vec<_>>(),
            vec!["1.15.0", "1.16.0"]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base_url = format!("{}/pypi", server.uri());
        let (project, release) = tokio::task::spawn_blocking(move || {
            let client = JsonApiClientBuilder::new(base_url).build().unwrap();
            let name = PackageName::from_str("missing").unwrap();
            (
                client.project(&name),
                client.release(&name, &Version::from_str("1.0").unwrap()),
            )
        })
        .await
        .unwrap();

        assert!(matches!(project, Err(Error::PackageNotFound(name)) if name == "missing"));
        assert!(matches!(release, Err(Error::ReleaseNotFound(..))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bad_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let base_url = format!("{}/pypi", server.uri());
        let result = tokio::task::spawn_blocking(move || {
            let client = JsonApiClientBuilder::new(base_url).build().unwrap();
            client.project(&PackageName::from_str("six").unwrap())
        })
        .await
        .unwrap();

        let Err(Error::BadJson { url, .. }) = result else {
            panic!("expected a JSON error, got: {result:?}");
        };
        assert!(url.ends_with("/pypi/six/json"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hash_remote_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/demo-1.0.tar.gz"))
            .and(header("accept-encoding", "identity"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/missing-1.0.tar.gz"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let uri = server.uri();
        let (hash, cached, missing) = tokio::task::spawn_blocking(move || {
            let cache = Cache::temp().unwrap();
            let client = JsonApiClientBuilder::new(format!("{uri}/pypi")).build().unwrap();
            let hashes = HashCache::new(&cache, client);
            let link = Link::new(format!(
                "{uri}/files/demo-1.0.tar.gz#sha256=2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
            ));
            let hash = hashes.get_hash(&link).unwrap();
            let cached = hashes.get_hash(&link).unwrap();
            let missing = hashes.get_hash(&Link::new(format!("{uri}/files/missing-1.0.tar.gz")));
            (hash, cached, missing)
        })
        .await
        .unwrap();

        assert_eq!(
            hash,
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(hash, cached);
        assert!(matches!(missing, Err(ArtifactError::Remote { .. })));
    }
}
