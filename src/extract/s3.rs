use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::config::{FileFormat, ObjectStoreConfig};
use crate::error::{ExtractError, FluxError, Result};
use crate::extract::parse_bytes;
use crate::types::Batch;
use crate::traits::Extractor;

/// Extrator para objetos em S3
///
/// Baixa o objeto inteiro e interpreta os bytes conforme o formato
/// configurado. O cliente é construído a partir do ambiente (credenciais,
/// região), como nos demais conectores AWS.
#[derive(Debug)]
pub struct S3Extractor {
    bucket: String,
    key: String,
    format: FileFormat,
    cursor: AtomicUsize,
}

impl S3Extractor {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            format: FileFormat::Csv,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Constrói a partir do descritor de configuração
    pub fn from_config(config: &ObjectStoreConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            key: config.key.clone(),
            format: config.format,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    async fn download(&self) -> Result<Vec<u8>> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = aws_sdk_s3::Client::new(&aws_config);

        let object = client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| {
                FluxError::Extract(ExtractError::Connection(format!(
                    "falha ao baixar s3://{}/{}: {}",
                    self.bucket, self.key, e
                )))
            })?;

        let bytes = object.body.collect().await.map_err(|e| {
            FluxError::Extract(ExtractError::ParseError(format!(
                "falha ao ler corpo de s3://{}/{}: {}",
                self.bucket, self.key, e
            )))
        })?;

        Ok(bytes.into_bytes().to_vec())
    }
}

#[async_trait]
impl Extractor for S3Extractor {
    async fn extract(&self) -> Result<Batch> {
        let bytes = self.download().await?;
        parse_bytes(self.format, &bytes)
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
