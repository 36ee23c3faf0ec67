use crate::error::{PipelineError, Result};
use crate::table::GeoTable;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Some data hosts turn away default client identifiers.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Outbound GET, returning the whole body.
pub trait HttpClient: Send + Sync {
    fn get_bytes(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// reqwest client that identifies as a desktop browser.
pub struct BrowserClient {
    client: reqwest::Client,
}

impl BrowserClient {
    pub fn new(user_agent: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

impl HttpClient for BrowserClient {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await.map_err(|e| PipelineError::fetch(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::fetch(url, format!("server responded {}", status)));
        }
        let bytes = resp.bytes().await.map_err(|e| PipelineError::fetch(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Fetches GeoJSON tables, keeping each parsed table for the life of the process.
pub struct GeoSource<C> {
    client: C,
    memo: RwLock<HashMap<String, Arc<GeoTable>>>,
}

impl<C: HttpClient> GeoSource<C> {
    pub fn new(client: C) -> Self {
        Self { client, memo: RwLock::new(HashMap::new()) }
    }

    pub async fn table(&self, url: &str) -> Result<Arc<GeoTable>> {
        if let Some(table) = self.memo.read().await.get(url) {
            debug!("memo hit: {}", url);
            return Ok(table.clone());
        }

        debug!("memo miss: {}", url);
        let bytes = self.client.get_bytes(url).await?;
        info!("fetched {} bytes of geojson from {}", bytes.len(), url);
        let table = Arc::new(GeoTable::from_geojson_bytes(url, &bytes)?);

        // a concurrent fetch of the same url may have landed first; keep that one
        let mut memo = self.memo.write().await;
        Ok(memo.entry(url.to_string()).or_insert(table).clone())
    }

    /// Raw image bytes. Not memoized.
    pub async fn image(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self.client.get_bytes(url).await?;
        debug!("fetched {} byte image from {}", bytes.len(), url);
        Ok(bytes)
    }

    #[cfg(test)]
    pub fn client(&self) -> &C {
        &self.client
    }
}


#[cfg(test)]
mod tests {
    use super::mock::StaticClient;
    use super::*;
    use crate::table::Crs;

    const STEAM_LOOP_URL: &str = "https://data.example.com/steam_loop.geojson";
    const STEAM_LOOP: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"name": "main"},
         "geometry": {"type": "LineString", "coordinates": [[-75.16, 39.95], [-75.17, 39.96]]}}]}"#;

    #[tokio::test]
    async fn test_same_url_fetched_once() {
        let source = GeoSource::new(StaticClient::default().with(STEAM_LOOP_URL, STEAM_LOOP));

        let first = source.table(STEAM_LOOP_URL).await.unwrap();
        let second = source.table(STEAM_LOOP_URL).await.unwrap();

        assert_eq!(source.client().calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.crs, Some(Crs::WGS84));
        assert_eq!(first.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_table() {
        let source = GeoSource::new(StaticClient::default().with(STEAM_LOOP_URL, STEAM_LOOP));
        let (a, b) = tokio::join!(source.table(STEAM_LOOP_URL), source.table(STEAM_LOOP_URL));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a, b);

        let third = source.table(STEAM_LOOP_URL).await.unwrap();
        assert!(Arc::ptr_eq(&third, &a) || Arc::ptr_eq(&third, &b));
        assert!(source.client().calls() <= 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_memoized() {
        let source = GeoSource::new(StaticClient::default());
        let err = source.table(STEAM_LOOP_URL).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
        assert!(source.table(STEAM_LOOP_URL).await.is_err());
        assert_eq!(source.client().calls(), 2);
    }

    #[tokio::test]
    async fn test_non_geojson_is_parse_error() {
        let source = GeoSource::new(StaticClient::default().with(STEAM_LOOP_URL, "Access Denied"));
        let err = source.table(STEAM_LOOP_URL).await.unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_images_are_not_memoized() {
        let url = "https://img.example.com/edison.jpg";
        let source = GeoSource::new(StaticClient::default().with(url, vec![1u8, 2, 3]));
        assert_eq!(source.image(url).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(source.image(url).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(source.client().calls(), 2);
    }
}
