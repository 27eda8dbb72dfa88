use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::config::JsonSourceConfig;
use crate::error::{ExtractError, FluxError, Result};
use crate::extract::{descend_json_path, rows_from_json};
use crate::types::Batch;
use crate::traits::Extractor;

/// Extrator para arquivos JSON (array de objetos ou objeto único)
#[derive(Debug)]
pub struct JsonExtractor {
    file_path: String,
    array_path: Option<String>,
    cursor: AtomicUsize,
}

impl JsonExtractor {
    /// Cria um novo extrator JSON
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_string_lossy().to_string(),
            array_path: None,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Constrói a partir do descritor de configuração
    ///
    /// Com `lines: true` o arquivo é tratado como JSON Lines.
    pub fn from_config(config: &JsonSourceConfig) -> Box<dyn Extractor> {
        if config.lines {
            Box::new(JsonLinesExtractor::new(&config.file_path))
        } else {
            let mut extractor = Self::new(&config.file_path);
            extractor.array_path = config.array_path.clone();
            Box::new(extractor)
        }
    }

    /// Define o caminho do array no JSON (para JSONs aninhados)
    pub fn with_array_path(mut self, path: impl Into<String>) -> Self {
        self.array_path = Some(path.into());
        self
    }

    async fn read_file(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.file_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FluxError::Extract(ExtractError::FileNotFound(self.file_path.clone()))
            } else {
                FluxError::Io(e)
            }
        })
    }
}

#[async_trait]
impl Extractor for JsonExtractor {
    async fn extract(&self) -> Result<Batch> {
        let content = self.read_file().await?;
        let json: serde_json::Value = serde_json::from_str(&content)?;

        let target = if let Some(path) = &self.array_path {
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

/// Extrator para JSON Lines (um objeto por linha)
#[derive(Debug)]
pub struct JsonLinesExtractor {
    file_path: String,
    cursor: AtomicUsize,
}

impl JsonLinesExtractor {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_string_lossy().to_string(),
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Extractor for JsonLinesExtractor {
    async fn extract(&self) -> Result<Batch> {
        let content = tokio::fs::read_to_string(&self.file_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FluxError::Extract(ExtractError::FileNotFound(self.file_path.clone()))
            } else {
                FluxError::Io(e)
            }
        })?;

        let mut rows = Batch::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }

            let json: serde_json::Value = serde_json::from_str(line)?;
            rows.extend(rows_from_json(&json));
        }

        Ok(rows)
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
