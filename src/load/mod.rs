//! Carregadores: um por tipo de destino declarado na configuração

#[cfg(feature = "csv")]
pub mod csv;

pub mod json;
pub mod memory;

#[cfg(feature = "database")]
pub mod database;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "cloud")]
pub mod s3;

use crate::config::{DestinationConfig, PipelineOptions};
use crate::error::{ConfigError, FluxError, Result};
use crate::traits::Loader;
use crate::types::{DataRow, DataValue};

/// Constrói o carregador correspondente ao descritor de destino
pub fn build_loader(
    destination: &DestinationConfig,
    options: &PipelineOptions,
) -> Result<Box<dyn Loader>> {
    match destination {
        #[cfg(feature = "csv")]
        DestinationConfig::Csv(cfg) => Ok(Box::new(csv::CsvLoader::from_config(cfg))),

        DestinationConfig::Json(cfg) => Ok(json::JsonLoader::from_config(cfg)),

        #[cfg(feature = "database")]
        DestinationConfig::Database(cfg) => {
            Ok(Box::new(database::DatabaseLoader::from_config(cfg)?))
        }

        #[cfg(feature = "http")]
        DestinationConfig::Api(cfg) => Ok(Box::new(http::ApiLoader::from_config(
            cfg,
            options.timeout_seconds,
        ))),

        #[cfg(feature = "cloud")]
        DestinationConfig::S3(cfg) => Ok(Box::new(s3::S3Loader::from_config(cfg))),

        #[allow(unreachable_patterns)]
        other => Err(FluxError::Config(ConfigError::InvalidConfig(format!(
            "suporte ao destino '{}' não foi compilado nesta build",
            other.kind()
        )))),
    }
}

/// Converte DataValue para serde_json::Value
pub(crate) fn data_value_to_json(value: &DataValue) -> serde_json::Value {
    match value {
        DataValue::Null => serde_json::Value::Null,
        DataValue::Boolean(b) => serde_json::Value::Bool(*b),
        DataValue::Integer(i) => serde_json::Value::Number(serde_json::Number::from(*i)),
        DataValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        DataValue::String(s) => serde_json::Value::String(s.clone()),
        DataValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
    }
}

/// Converte DataRow para objeto JSON
pub(crate) fn row_to_json(row: &DataRow) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (key, value) in row {
        map.insert(key.clone(), data_value_to_json(value));
    }
    serde_json::Value::Object(map)
}

/// União ordenada das colunas presentes no lote
///
/// Linhas heterogêneas são toleradas; colunas ausentes em uma linha saem
/// como null na escrita.
pub(crate) fn column_union(rows: &[DataRow]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.keys().cloned())
        .collect::<std::collections::BTreeSet<String>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_union_over_heterogeneous_rows() {
        let mut row1 = DataRow::new();
        row1.insert("a".to_string(), DataValue::Integer(1));
        let mut row2 = DataRow::new();
        row2.insert("b".to_string(), DataValue::Integer(2));

        let columns = column_union(&[row1, row2]);
        assert_eq!(columns, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_data_value_to_json() {
        assert_eq!(data_value_to_json(&DataValue::Null), serde_json::Value::Null);
        assert_eq!(
            data_value_to_json(&DataValue::Integer(7)),
            serde_json::json!(7)
        );
        assert_eq!(
            data_value_to_json(&DataValue::Boolean(true)),
            serde_json::json!(true)
        );
    }
}
