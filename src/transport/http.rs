use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{PeerClient, PeerResult};
use crate::config_error;
use crate::error::Result;
use crate::gossip::messages::{NotifyRequest, RawPeersResponse, ServiceInfo};
use crate::peers::PeerUrl;
use crate::settings::Settings;

/// [`PeerClient`] over HTTP/JSON
#[derive(Clone, Debug)]
pub struct HttpPeerClient {
    client: reqwest::Client,
    timeout: Duration,
    federation_path: String,
    node_api_path: String,
}

impl HttpPeerClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let timeout = settings.federation.peer_timeout;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| config_error!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            timeout,
            federation_path: settings.federation_path.clone(),
            node_api_path: settings.node_api_path.clone(),
        })
    }

    fn federation_endpoint(&self, peer: &PeerUrl, path: &str) -> String {
        peer.endpoint(&format!("{}{}", self.federation_path, path))
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    #[instrument(skip(self, request), level = "debug")]
    async fn notify(&self, peer: &PeerUrl, request: &NotifyRequest) -> PeerResult<()> {
        self.client
            .post(self.federation_endpoint(peer, "peers"))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_peers(&self, peer: &PeerUrl) -> PeerResult<Vec<PeerUrl>> {
        let response: RawPeersResponse = self
            .client
            .get(self.federation_endpoint(peer, "peers"))
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let peers = response.into_peers();
        debug!("{} reported {} peers", peer, peers.len());
        Ok(peers)
    }

    #[instrument(skip(self), level = "debug")]
    async fn service_info(&self, peer: &PeerUrl, update_peers: bool) -> PeerResult<ServiceInfo> {
        let url = format!(
            "{}?update_peers={}",
            self.federation_endpoint(peer, "service-info"),
            update_peers
        );
        let info = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(info)
    }

    #[instrument(skip(self, body), level = "debug")]
    async fn search(&self, peer: &PeerUrl, search_path: &str, body: Bytes) -> PeerResult<Value> {
        let url = peer.endpoint(&format!(
            "{}{}",
            self.node_api_path,
            search_path.trim_start_matches('/')
        ));
        let answer = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(answer)
    }
}
