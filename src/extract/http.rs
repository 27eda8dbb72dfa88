use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use crate::config::ApiSourceConfig;
use crate::error::{ExtractError, FluxError, Result};
use crate::extract::{descend_json_path, rows_from_json};
use crate::types::Batch;
use crate::traits::Extractor;

/// Extrator para APIs REST (GET/POST com corpo JSON)
#[derive(Debug)]
pub struct ApiExtractor {
    url: String,
    method: String,
    headers: HashMap<String, String>,
    params: Option<serde_json::Value>,
    data_path: Option<String>,
    timeout: Duration,
    cursor: AtomicUsize,
}

impl ApiExtractor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            params: None,
            data_path: None,
            timeout: Duration::from_secs(30),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Constrói a partir do descritor de configuração
    pub fn from_config(config: &ApiSourceConfig, timeout_seconds: u64) -> Self {
        Self {
            url: config.url.clone(),
            method: config.method.to_uppercase(),
            headers: config.headers.clone(),
            params: config.params.clone(),
            data_path: config.data_path.clone(),
            timeout: Duration::from_secs(timeout_seconds),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Define o caminho até os registros dentro da resposta
    pub fn with_data_path(mut self, path: impl Into<String>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| FluxError::Extract(ExtractError::Connection(e.to_string())))
    }
}

#[async_trait]
impl Extractor for ApiExtractor {
    async fn extract(&self) -> Result<Batch> {
        let client = self.client()?;

        let mut request = match self.method.as_str() {
            "GET" => {
                let mut req = client.get(&self.url);
                if let Some(params) = &self.params {
                    if let Some(obj) = params.as_object() {
                        let pairs: Vec<(String, String)> = obj
                            .iter()
                            .map(|(k, v)| {
                                let text = v
                                    .as_str()
                                    .map(|s| s.to_string())
                                    .unwrap_or_else(|| v.to_string());
                                (k.clone(), text)
                            })
                            .collect();
                        req = req.query(&pairs);
                    }
                }
                req
            }
            "POST" => {
                let mut req = client.post(&self.url);
                if let Some(params) = &self.params {
                    req = req.json(params);
                }
                req
            }
            other => {
                return Err(FluxError::Extract(ExtractError::InvalidFormat(format!(
                    "método HTTP não suportado: {}",
                    other
                ))));
            }
        };

        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FluxError::Extract(ExtractError::Connection(format!(
                "API respondeu {} para {}",
                status, self.url
            ))));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FluxError::Extract(ExtractError::ParseError(e.to_string())))?;

        let target = if let Some(path) = &self.data_path {
            descend_json_path(&json, path)?
        } else {
            &json
        };

        Ok(rows_from_json(target))
    }

    async fn extract_page(&self, page_size: usize) -> Result<Batch> {
        let offset = self.cursor.fetch_add(page_size, Ordering::SeqCst);
        let all_data = self.extract().await?;
        Ok(all_data.into_iter().skip(offset).take(page_size).collect())
    }

    async fn has_more(&self) -> Result<bool> {
        let total = self.extract().await?.len();
        Ok(self.cursor.load(Ordering::SeqCst) < total)
    }

    async fn reset(&self) -> Result<()> {
        self.cursor.store(0, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unsupported_method_rejected() {
        let mut extractor = ApiExtractor::new("http://localhost:1/api");
        extractor.method = "DELETE".to_string();

        let err = extractor.extract().await.unwrap_err();
        assert!(matches!(
            err,
            FluxError::Extract(ExtractError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        // porta 1 em localhost: conexão recusada imediatamente
        let extractor = ApiExtractor::new("http://127.0.0.1:1/api");
        let err = extractor.extract().await.unwrap_err();
        assert!(matches!(err, FluxError::Extract(_)));
    }
}
