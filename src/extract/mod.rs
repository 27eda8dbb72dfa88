//! Extratores: um por tipo de fonte declarado na configuração
//!
//! Adicionar um novo tipo de fonte significa adicionar uma variante ao
//! descritor e um braço na fábrica; o orquestrador nunca é tocado.

#[cfg(feature = "csv")]
pub mod csv;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "database")]
pub mod database;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "cloud")]
pub mod s3;

#[cfg(feature = "sftp")]
pub mod sftp;

use crate::config::{FileFormat, PipelineOptions, SourceConfig};
use crate::error::{ConfigError, ExtractError, FluxError, Result};
use crate::traits::Extractor;
use crate::types::{Batch, DataRow, DataValue};

/// Constrói o extrator correspondente ao descritor de fonte
pub fn build_extractor(
    source: &SourceConfig,
    options: &PipelineOptions,
) -> Result<Box<dyn Extractor>> {
    match source {
        #[cfg(feature = "csv")]
        SourceConfig::Csv(cfg) => Ok(Box::new(csv::CsvExtractor::from_config(cfg))),

        #[cfg(feature = "json")]
        SourceConfig::Json(cfg) => Ok(json::JsonExtractor::from_config(cfg)),

        #[cfg(feature = "database")]
        SourceConfig::Database(cfg) => {
            Ok(Box::new(database::DatabaseExtractor::from_config(cfg)))
        }

        #[cfg(feature = "http")]
        SourceConfig::Api(cfg) => Ok(Box::new(http::ApiExtractor::from_config(
            cfg,
            options.timeout_seconds,
        ))),

        #[cfg(feature = "cloud")]
        SourceConfig::S3(cfg) => Ok(Box::new(s3::S3Extractor::from_config(cfg))),

        #[cfg(feature = "sftp")]
        SourceConfig::Sftp(cfg) => Ok(Box::new(sftp::SftpExtractor::from_config(cfg))),

        #[allow(unreachable_patterns)]
        other => Err(FluxError::Config(ConfigError::InvalidConfig(format!(
            "suporte à fonte '{}' não foi compilado nesta build",
            other.kind()
        )))),
    }
}

/// Converte um valor JSON em DataValue escalar
///
/// Objetos e arrays aninhados são achatados: serializados de volta como
/// string JSON em vez de descartados.
pub(crate) fn json_to_data_value(value: &serde_json::Value) -> DataValue {
    match value {
        serde_json::Value::Null => DataValue::Null,
        serde_json::Value::Bool(b) => DataValue::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                DataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                DataValue::Float(f)
            } else {
                DataValue::String(n.to_string())
            }
        }
        serde_json::Value::String(s) => DataValue::String(s.clone()),
        nested => DataValue::String(nested.to_string()),
    }
}

/// Converte um valor JSON (array de objetos, objeto único ou escalar) em lote
pub(crate) fn rows_from_json(value: &serde_json::Value) -> Batch {
    match value {
        serde_json::Value::Array(items) => items.iter().map(row_from_json_item).collect(),
        serde_json::Value::Object(_) => vec![row_from_json_item(value)],
        other => vec![row_from_json_item(other)],
    }
}

fn row_from_json_item(item: &serde_json::Value) -> DataRow {
    match item {
        serde_json::Value::Object(obj) => obj
            .iter()
            .map(|(key, value)| (key.clone(), json_to_data_value(value)))
            .collect(),
        other => {
            let mut row = DataRow::new();
            row.insert("value".to_string(), json_to_data_value(other));
            row
        }
    }
}

/// Percorre um caminho pontilhado dentro de um documento JSON
pub(crate) fn descend_json_path<'a>(
    json: &'a serde_json::Value,
    path: &str,
) -> Result<&'a serde_json::Value> {
    let mut current = json;
    for part in path.split('.') {
        current = match current {
            serde_json::Value::Object(obj) => obj.get(part).ok_or_else(|| {
                FluxError::Extract(ExtractError::ParseError(format!(
                    "Caminho '{}' não encontrado no JSON",
                    part
                )))
            })?,
            serde_json::Value::Array(arr) => {
                let index: usize = part.parse().map_err(|_| {
                    FluxError::Extract(ExtractError::ParseError(format!(
                        "Caminho '{}' não é um índice de array",
                        part
                    )))
                })?;
                arr.get(index).ok_or_else(|| {
                    FluxError::Extract(ExtractError::ParseError(format!(
                        "Índice '{}' fora do array",
                        part
                    )))
                })?
            }
            _ => {
                return Err(FluxError::Extract(ExtractError::ParseError(format!(
                    "Caminho '{}' não é um objeto nem array",
                    part
                ))));
            }
        };
    }
    Ok(current)
}

/// Interpreta bytes baixados (S3, SFTP) de acordo com o formato configurado
#[allow(dead_code)]
pub(crate) fn parse_bytes(format: FileFormat, bytes: &[u8]) -> Result<Batch> {
    match format {
        #[cfg(feature = "csv")]
        FileFormat::Csv => csv::parse_csv_reader(bytes, b',', true),
        #[cfg(not(feature = "csv"))]
        FileFormat::Csv => Err(FluxError::Config(ConfigError::InvalidConfig(
            "formato csv não foi compilado nesta build".to_string(),
        ))),
        FileFormat::Json => {
            let json: serde_json::Value = serde_json::from_slice(bytes)?;
            Ok(rows_from_json(&json))
        }
        FileFormat::JsonLines => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                FluxError::Extract(ExtractError::InvalidFormat("UTF-8 inválido".to_string()))
            })?;
            let mut rows = Batch::new();
            for line in text.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let json: serde_json::Value = serde_json::from_str(line)?;
                rows.extend(rows_from_json(&json));
            }
            Ok(rows)
        }
    }
}
