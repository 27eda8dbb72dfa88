//! Carregadores para arquivos JSON e JSON Lines

use async_trait::async_trait;
use std::path::Path;
use crate::config::JsonSinkConfig;
use crate::error::Result;
use crate::load::row_to_json;
use crate::types::Batch;
use crate::traits::Loader;

/// Carregador para arquivos JSON (array de objetos)
///
/// Suporta pretty-print e modo append; no append o array existente é
/// lido e estendido.
#[derive(Debug, Clone)]
pub struct JsonLoader {
    file_path: String,
    pretty: bool,
    append: bool,
}

impl JsonLoader {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_string_lossy().to_string(),
            pretty: false,
            append: false,
        }
    }

    /// Constrói a partir do descritor de configuração
    ///
    /// Com `lines: true` o destino é gravado em JSON Lines.
    pub fn from_config(config: &JsonSinkConfig) -> Box<dyn Loader> {
        if config.lines {
            Box::new(JsonLinesLoader {
                file_path: config.file_path.clone(),
                append: config.append,
            })
        } else {
            Box::new(Self {
                file_path: config.file_path.clone(),
                pretty: config.pretty,
                append: config.append,
            })
        }
    }

    /// Define se deve usar formatação pretty-print
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Define se deve adicionar dados ao arquivo existente
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    fn serialize(&self, value: &serde_json::Value) -> Result<String> {
        Ok(if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        })
    }
}

#[async_trait]
impl Loader for JsonLoader {
    async fn load(&self, data: Batch) -> Result<usize> {
        if let Some(parent) = Path::new(&self.file_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let new_values: Vec<serde_json::Value> = data.iter().map(row_to_json).collect();

        let content = if self.append {
            let existing = match tokio::fs::read_to_string(&self.file_path).await {
                Ok(content) => content,
                Err(_) => "[]".to_string(),
            };
            let mut array: serde_json::Value = serde_json::from_str(&existing)?;

            if let serde_json::Value::Array(ref mut items) = array {
                items.extend(new_values);
            }
            self.serialize(&array)?
        } else {
            self.serialize(&serde_json::Value::Array(new_values))?
        };

        tokio::fs::write(&self.file_path, content).await?;
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

/// Carregador para arquivos JSON Lines (um objeto por linha)
#[derive(Debug, Clone)]
pub struct JsonLinesLoader {
    file_path: String,
    append: bool,
}

impl JsonLinesLoader {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_string_lossy().to_string(),
            append: false,
        }
    }

    /// Define se deve adicionar ao final do arquivo existente
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }
}

#[async_trait]
impl Loader for JsonLinesLoader {
    async fn load(&self, data: Batch) -> Result<usize> {
        if let Some(parent) = Path::new(&self.file_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let lines: Vec<String> = data
            .iter()
            .map(|row| serde_json::to_string(&row_to_json(row)))
            .collect::<std::result::Result<Vec<String>, serde_json::Error>>()?;

        let mut content = String::new();
        if self.append && Path::new(&self.file_path).exists() {
            let existing = tokio::fs::read_to_string(&self.file_path).await?;
            content.push_str(&existing);
            if !existing.is_empty() && !existing.ends_with('\n') {
                content.push('\n');
            }
        }
        content.push_str(&lines.join("\n"));

        tokio::fs::write(&self.file_path, content).await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataRow, DataValue};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_json_loader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saida.json");
        let loader = JsonLoader::new(&path).with_pretty(true);

        let mut row1 = DataRow::new();
        row1.insert("name".to_string(), DataValue::String("Alice".to_string()));
        row1.insert("age".to_string(), DataValue::Integer(30));

        let written = loader.load(vec![row1]).await.unwrap();
        assert_eq!(written, 1);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed[0]["name"], serde_json::json!("Alice"));
    }

    #[tokio::test]
    async fn test_json_loader_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saida.json");

        let loader = JsonLoader::new(&path);
        let mut row1 = DataRow::new();
        row1.insert("id".to_string(), DataValue::Integer(1));
        loader.load(vec![row1]).await.unwrap();

        let loader = JsonLoader::new(&path).with_append(true);
        let mut row2 = DataRow::new();
        row2.insert("id".to_string(), DataValue::Integer(2));
        loader.load(vec![row2]).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_jsonl_loader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saida.jsonl");
        let loader = JsonLinesLoader::new(&path);

        let mut row1 = DataRow::new();
        row1.insert("id".to_string(), DataValue::Integer(1));
        let mut row2 = DataRow::new();
        row2.insert("id".to_string(), DataValue::Integer(2));

        loader.load(vec![row1, row2]).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(parsed.is_object());
        }
    }

    #[tokio::test]
    async fn test_jsonl_append_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saida.jsonl");
        let loader = JsonLinesLoader::new(&path).with_append(true);

        let mut row1 = DataRow::new();
        row1.insert("id".to_string(), DataValue::Integer(1));
        loader.load(vec![row1]).await.unwrap();

        let mut row2 = DataRow::new();
        row2.insert("id".to_string(), DataValue::Integer(2));
        loader.load(vec![row2]).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
