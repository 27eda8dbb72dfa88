use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;
use crate::config::ApiSinkConfig;
use crate::error::{FluxError, LoadError, Result};
use crate::load::row_to_json;
use crate::types::Batch;
use crate::traits::Loader;

/// Carregador para endpoints de API (POST com corpo JSON)
///
/// As linhas são enviadas em lotes de tamanho fixo; qualquer resposta
/// não-2xx falha a carga inteira. Lotes já enviados não são desfeitos;
/// não há garantia transacional entre lotes.
#[derive(Debug, Clone)]
pub struct ApiLoader {
    url: String,
    headers: HashMap<String, String>,
    batch_size: usize,
    timeout: Duration,
}

impl ApiLoader {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            batch_size: 100,
            timeout: Duration::from_secs(30),
        }
    }

    /// Constrói a partir do descritor de configuração
    pub fn from_config(config: &ApiSinkConfig, timeout_seconds: u64) -> Self {
        Self {
            url: config.url.clone(),
            headers: config.headers.clone(),
            batch_size: config.batch_size,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

#[async_trait]
impl Loader for ApiLoader {
    async fn load(&self, data: Batch) -> Result<usize> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| FluxError::Load(LoadError::DestinationConnection(e.to_string())))?;

        let records: Vec<serde_json::Value> = data.iter().map(row_to_json).collect();
        let mut sent = 0usize;

        for chunk in records.chunks(self.batch_size) {
            let mut request = client.post(&self.url).json(&chunk);
            for (key, value) in &self.headers {
                request = request.header(key, value);
            }

            let response = request.send().await.map_err(|e| {
                FluxError::Load(LoadError::DestinationConnection(e.to_string()))
            })?;

            let status = response.status();
            if !status.is_success() {
                // lotes anteriores já foram aceitos pelo destino
                return Err(FluxError::Load(LoadError::RejectedBatch(format!(
                    "API respondeu {} após {} linha(s) enviada(s)",
                    status, sent
                ))));
            }

            sent += chunk.len();
            info!(url = %self.url, sent = sent, total = records.len(), "Lote enviado à API");
        }

        Ok(sent)
    }
}
