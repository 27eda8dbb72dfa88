use async_trait::async_trait;
use std::path::Path;
use crate::config::CsvSinkConfig;
use crate::error::{FluxError, LoadError, Result};
use crate::load::column_union;
use crate::types::{Batch, DataValue};
use crate::traits::Loader;

/// Carregador para arquivos CSV
///
/// O cabeçalho é a união ordenada das colunas do lote; colunas ausentes
/// em uma linha saem vazias.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    file_path: String,
    delimiter: u8,
}

impl CsvLoader {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_string_lossy().to_string(),
            delimiter: b',',
        }
    }

    /// Constrói a partir do descritor de configuração
    pub fn from_config(config: &CsvSinkConfig) -> Self {
        Self {
            file_path: config.file_path.clone(),
            delimiter: config.delimiter as u8,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn format_value(value: &DataValue) -> String {
        match value {
            DataValue::Null => String::new(),
            other => other.as_string().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Loader for CsvLoader {
    async fn load(&self, data: Batch) -> Result<usize> {
        if let Some(parent) = Path::new(&self.file_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let columns = column_union(&data);

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());

        writer
            .write_record(&columns)
            .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))?;

        for row in &data {
            let record: Vec<String> = columns
                .iter()
                .map(|col| {
                    row.get(col)
                        .map(Self::format_value)
                        .unwrap_or_default()
                })
                .collect();
            writer
                .write_record(&record)
                .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))?;
        tokio::fs::write(&self.file_path, bytes).await?;

        Ok(data.len())
    }

    async fn health_check(&self) -> Result<bool> {
        if let Some(parent) = Path::new(&self.file_path).parent() {
            if parent.as_os_str().is_empty() {
                return Ok(true);
            }
            Ok(parent.exists() || parent.parent().map(|p| p.exists()).unwrap_or(false))
        } else {
            Ok(true)
        }
    }
}
