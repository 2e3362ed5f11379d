use std::fmt::{Display, Formatter};
use std::hash::Hasher;

use seahash::SeaHasher;
use url::Url;

/// Compute a hex string hash of a [`StableHash`] value.
///
/// The value returned by [`digest`] should be stable across releases and platforms.
pub fn digest<H: StableHash + ?Sized>(hashable: &H) -> String {
    let mut hasher = StableHasher::new();
    hashable.stable_hash(&mut hasher);
    hex::encode(hasher.finish().to_le_bytes())
}

/// A type that can be hashed in a stable way across Rust releases and platforms.
///
/// Unlike [`std::hash::Hash`], every implementation spells out the exact bytes it feeds to the
/// hasher, so the names of on-disk cache entries never depend on the standard library's
/// encoding.
pub trait StableHash {
    fn stable_hash(&self, state: &mut StableHasher);
}

impl StableHash for str {
    #[inline]
    fn stable_hash(&self, state: &mut StableHasher) {
        state.write_len(self.len());
        state.write(self.as_bytes());
    }
}

impl StableHash for String {
    #[inline]
    fn stable_hash(&self, state: &mut StableHasher) {
        self.as_str().stable_hash(state);
    }
}

impl<T: StableHash> StableHash for [T] {
    fn stable_hash(&self, state: &mut StableHasher) {
        state.write_len(self.len());
        for item in self {
            item.stable_hash(state);
        }
    }
}

impl<T: StableHash> StableHash for Vec<T> {
    fn stable_hash(&self, state: &mut StableHasher) {
        self.as_slice().stable_hash(state);
    }
}

impl<T: StableHash + ?Sized> StableHash for &T {
    #[inline]
    fn stable_hash(&self, state: &mut StableHasher) {
        (**self).stable_hash(state);
    }
}

#[derive(Clone, Default)]
pub struct StableHasher {
    inner: SeaHasher,
}

impl StableHasher {
    pub fn new() -> Self {
        Self {
            inner: SeaHasher::new(),
        }
    }

    /// Lengths are always written as little-endian `u64`, regardless of the platform's pointer
    /// width.
    #[inline]
    fn write_len(&mut self, len: usize) {
        self.inner.write(&(len as u64).to_le_bytes());
    }
}

impl Hasher for StableHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.inner.finish()
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.inner.write(bytes);
    }
}

/// An index URL, normalized such that equivalent spellings share a cache partition.
///
/// The scheme and host are lowercased, default ports are dropped, and a trailing slash or
/// fragment is insignificant. The path is kept as is: index paths are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    pub fn new(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);

        // Strip a trailing slash.
        if url.path().ends_with('/') {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty();
            }
        }

        Self(url)
    }

    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(&Url::parse(url.trim())?))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl StableHash for CanonicalUrl {
    fn stable_hash(&self, state: &mut StableHasher) {
        // The serialization of a URL is specified, unlike the `url` crate's `Hash` impl.
        self.0.as_str().stable_hash(state);
    }
}

impl Display for CanonicalUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}
