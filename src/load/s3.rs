use async_trait::async_trait;
use crate::config::{FileFormat, ObjectStoreConfig};
use crate::error::{FluxError, LoadError, Result};
use crate::load::{column_union, row_to_json};
use crate::types::{Batch, DataValue};
use crate::traits::Loader;

/// Carregador para objetos em S3
///
/// Serializa o lote inteiro no formato configurado e faz um único
/// put_object. Cliente construído a partir do ambiente, como no extrator.
#[derive(Debug, Clone)]
pub struct S3Loader {
    bucket: String,
    key: String,
    format: FileFormat,
}

impl S3Loader {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            format: FileFormat::Csv,
        }
    }

    /// Constrói a partir do descritor de configuração
    pub fn from_config(config: &ObjectStoreConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            key: config.key.clone(),
            format: config.format,
        }
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    fn serialize(&self, data: &Batch) -> Result<Vec<u8>> {
        match self.format {
            FileFormat::Csv => {
                let columns = column_union(data);
                let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

                writer
                    .write_record(&columns)
                    .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))?;

                for row in data {
                    let record: Vec<String> = columns
                        .iter()
                        .map(|col| match row.get(col) {
                            Some(DataValue::Null) | None => String::new(),
                            Some(value) => value.as_string().unwrap_or_default(),
                        })
                        .collect();
                    writer
                        .write_record(&record)
                        .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))?;
                }

                writer
                    .into_inner()
                    .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))
            }
            FileFormat::Json => {
                let values: Vec<serde_json::Value> = data.iter().map(row_to_json).collect();
                Ok(serde_json::to_vec(&serde_json::Value::Array(values))?)
            }
            FileFormat::JsonLines => {
                let lines: Vec<String> = data
                    .iter()
                    .map(|row| serde_json::to_string(&row_to_json(row)))
                    .collect::<std::result::Result<Vec<String>, serde_json::Error>>()?;
                Ok(lines.join("\n").into_bytes())
            }
        }
    }
}

#[async_trait]
impl Loader for S3Loader {
    async fn load(&self, data: Batch) -> Result<usize> {
        let bytes = self.serialize(&data)?;

        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = aws_sdk_s3::Client::new(&aws_config);

        client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(aws_sdk_s3::primitives::ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                FluxError::Load(LoadError::WriteError(format!(
                    "falha ao gravar s3://{}/{}: {}",
                    self.bucket, self.key, e
                )))
            })?;

        Ok(data.len())
    }
}
