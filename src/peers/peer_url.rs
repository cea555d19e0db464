use serde::{Deserialize, Serialize};
use url::Url;

/// Normalized base URL identifying a node.
///
/// Always an absolute http(s) URL without query or fragment, ending in `/`.
/// Two peers are the same peer exactly when their normalized strings match.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PeerUrl(String);

impl PeerUrl {
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(format!("unsupported scheme '{}'", other)),
        }
        if url.host_str().is_none() {
            return Err("missing host".to_string());
        }
        url.set_query(None);
        url.set_fragment(None);
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self(url.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{self}{path}`; `path` must not start with `/`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.0, path.trim_start_matches('/'))
    }
}

impl TryFrom<String> for PeerUrl {
    type Error = String;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        PeerUrl::parse(&raw)
    }
}

impl TryFrom<&str> for PeerUrl {
    type Error = String;

    fn try_from(raw: &str) -> std::result::Result<Self, Self::Error> {
        PeerUrl::parse(raw)
    }
}

impl From<PeerUrl> for String {
    fn from(peer: PeerUrl) -> Self {
        peer.0
    }
}

impl std::fmt::Display for PeerUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
