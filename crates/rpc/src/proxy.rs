//! Proxy health checks and mobile proxy rotation

use std::time::Duration;

use async_trait::async_trait;
use chainrun_config::RunnerConfig;
use chainrun_execution::{ProxyHealth, ProxyProbe};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::RpcResult;

/// Proxy URL with a scheme; bare `user:pass@host:port` means HTTP
pub fn proxy_url(proxy: &str) -> String {
    let proxy = proxy.trim();
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    }
}

fn outgoing_ip(body: &Value) -> Option<String> {
    body.get("ip")?.as_str().map(str::to_string)
}

/// Probes proxies by fetching the configured URLs through them
#[derive(Debug, Clone)]
pub struct HttpProxyProbe {
    probe_urls: Vec<String>,
    timeout: Duration,
}

impl HttpProxyProbe {
    pub fn new(probe_urls: Vec<String>, timeout: Duration) -> Self {
        Self {
            probe_urls,
            timeout,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.proxy_probe_urls.clone(), config.request_timeout())
    }

    fn client_via(&self, proxy: &str) -> RpcResult<reqwest::Client> {
        let proxy = reqwest::Proxy::all(proxy_url(proxy))?;
        Ok(reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .build()?)
    }
}

#[async_trait]
impl ProxyProbe for HttpProxyProbe {
    async fn probe(&self, proxy: &str) -> ProxyHealth {
        let client = match self.client_via(proxy) {
            Ok(client) => client,
            Err(e) => {
                warn!("Invalid proxy: {}", e);
                return ProxyHealth::Unreachable;
            }
        };

        for url in &self.probe_urls {
            match client.get(url).send().await {
                Ok(response) => {
                    let ip = response
                        .json::<Value>()
                        .await
                        .ok()
                        .as_ref()
                        .and_then(outgoing_ip);
                    match &ip {
                        Some(ip) => info!("Proxy is working, IP: {}", ip),
                        None => info!("Proxy is working, IP unknown"),
                    }
                    return ProxyHealth::Healthy { ip };
                }
                Err(e) => debug!(%url, "Proxy probe failed: {}", e),
            }
        }
        ProxyHealth::Unreachable
    }

    async fn rotate(&self, link: &str) -> anyhow::Result<()> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        client.get(link).send().await?.error_for_status()?;
        info!("Proxy rotation requested");
        Ok(())
    }
}
