use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use crate::config::AggregateFunction;
use crate::error::Result;
use crate::types::{Batch, DataRow, DataValue};
use crate::traits::Transformer;

/// Agrega o lote por um conjunto de colunas de agrupamento
///
/// O valor agregado é gravado de volta sob o nome da própria coluna de
/// origem; uma linha de saída por chave de grupo distinta. O agrupamento
/// usa BTreeMap para que a ordem de saída seja determinística.
#[derive(Debug, Clone)]
pub struct AggregateTransform {
    group_by: Vec<String>,
    aggregations: HashMap<String, AggregateFunction>,
}

impl AggregateTransform {
    pub fn new(group_by: Vec<String>, aggregations: HashMap<String, AggregateFunction>) -> Self {
        Self {
            group_by,
            aggregations,
        }
    }

    fn apply(values: &[DataValue], func: AggregateFunction) -> DataValue {
        match func {
            AggregateFunction::Count => {
                DataValue::Integer(values.iter().filter(|v| !v.is_null()).count() as i64)
            }
            AggregateFunction::Sum => {
                // soma inteira permanece inteira; qualquer float contamina
                let non_null: Vec<&DataValue> =
                    values.iter().filter(|v| !v.is_null()).collect();
                if non_null.is_empty() {
                    return DataValue::Null;
                }
                if non_null.iter().all(|v| matches!(v, DataValue::Integer(_))) {
                    let sum: i64 = non_null.iter().filter_map(|v| v.as_integer()).sum();
                    DataValue::Integer(sum)
                } else {
                    let sum: f64 = non_null.iter().filter_map(|v| v.as_float()).sum();
                    DataValue::Float(sum)
                }
            }
            AggregateFunction::Mean => {
                let floats: Vec<f64> = values.iter().filter_map(|v| v.as_float()).collect();
                if floats.is_empty() {
                    DataValue::Null
                } else {
                    DataValue::Float(floats.iter().sum::<f64>() / floats.len() as f64)
                }
            }
            AggregateFunction::Min => values
                .iter()
                .filter(|v| !v.is_null())
                .min_by(|a, b| a.cmp(b))
                .cloned()
                .unwrap_or(DataValue::Null),
            AggregateFunction::Max => values
                .iter()
                .filter(|v| !v.is_null())
                .max_by(|a, b| a.cmp(b))
                .cloned()
                .unwrap_or(DataValue::Null),
            AggregateFunction::First => values.first().cloned().unwrap_or(DataValue::Null),
            AggregateFunction::Last => values.last().cloned().unwrap_or(DataValue::Null),
        }
    }
}

#[async_trait]
impl Transformer for AggregateTransform {
    async fn transform(&self, data: Batch) -> Result<Batch> {
        let mut groups: BTreeMap<Vec<DataValue>, Vec<DataRow>> = BTreeMap::new();

        for row in data {
            let key: Vec<DataValue> = self
                .group_by
                .iter()
                .map(|col| row.get(col).cloned().unwrap_or(DataValue::Null))
                .collect();
            groups.entry(key).or_default().push(row);
        }

        let mut result = Batch::with_capacity(groups.len());
        for (key, rows) in groups {
            let mut out = DataRow::new();

            for (i, col) in self.group_by.iter().enumerate() {
                if let Some(value) = key.get(i) {
                    out.insert(col.clone(), value.clone());
                }
            }

            for (column, func) in &self.aggregations {
                let values: Vec<DataValue> = rows
                    .iter()
                    .map(|row| row.get(column).cloned().unwrap_or(DataValue::Null))
                    .collect();
                out.insert(column.clone(), Self::apply(&values, *func));
            }

            result.push(out);
        }

        Ok(result)
    }
}

/// Remodela o lote: colunas de índice, uma coluna pivô e colunas de valor
///
/// Uma linha de saída por tupla de índice distinta; para cada valor
/// distinto do pivô surge uma coluna nova. Primeira ocorrência vence em
/// caso de célula repetida.
#[derive(Debug, Clone)]
pub struct PivotTransform {
    index: Vec<String>,
    pivot_column: String,
    values: Vec<String>,
}

impl PivotTransform {
    pub fn new(index: Vec<String>, pivot_column: String, values: Vec<String>) -> Self {
        Self {
            index,
            pivot_column,
            values,
        }
    }

    fn output_column(&self, pivot_label: &str, value_column: &str) -> String {
        if self.values.len() == 1 {
            pivot_label.to_string()
        } else {
            format!("{}_{}", value_column, pivot_label)
        }
    }
}

#[async_trait]
impl Transformer for PivotTransform {
    async fn transform(&self, data: Batch) -> Result<Batch> {
        let mut groups: BTreeMap<Vec<DataValue>, DataRow> = BTreeMap::new();

        for row in data {
            let key: Vec<DataValue> = self
                .index
                .iter()
                .map(|col| row.get(col).cloned().unwrap_or(DataValue::Null))
                .collect();

            let out = groups.entry(key.clone()).or_insert_with(|| {
                let mut base = DataRow::new();
                for (i, col) in self.index.iter().enumerate() {
                    if let Some(value) = key.get(i) {
                        base.insert(col.clone(), value.clone());
                    }
                }
                base
            });

            let pivot_label = row
                .get(&self.pivot_column)
                .and_then(|v| v.as_string())
                .unwrap_or_else(|| "null".to_string());

            for value_column in &self.values {
                let column = self.output_column(&pivot_label, value_column);
                let cell = row.get(value_column).cloned().unwrap_or(DataValue::Null);
                // primeira ocorrência vence
                out.entry(column).or_insert(cell);
            }
        }

        Ok(groups.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, DataValue)]) -> DataRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_aggregate_sum_by_group() {
        // cenário: soma de salary por dept
        let data = vec![
            row(&[
                ("dept", DataValue::String("A".to_string())),
                ("salary", DataValue::Integer(10)),
            ]),
            row(&[
                ("dept", DataValue::String("A".to_string())),
                ("salary", DataValue::Integer(20)),
            ]),
            row(&[
                ("dept", DataValue::String("B".to_string())),
                ("salary", DataValue::Integer(5)),
            ]),
        ];

        let mut aggregations = HashMap::new();
        aggregations.insert("salary".to_string(), AggregateFunction::Sum);

        let transform = AggregateTransform::new(vec!["dept".to_string()], aggregations);
        let result = transform.transform(data).await.unwrap();

        assert_eq!(result.len(), 2);
        let a = result
            .iter()
            .find(|r| r.get("dept") == Some(&DataValue::String("A".to_string())))
            .unwrap();
        assert_eq!(a.get("salary"), Some(&DataValue::Integer(30)));
        let b = result
            .iter()
            .find(|r| r.get("dept") == Some(&DataValue::String("B".to_string())))
            .unwrap();
        assert_eq!(b.get("salary"), Some(&DataValue::Integer(5)));
    }

    #[tokio::test]
    async fn test_aggregate_mean_and_count() {
        let data = vec![
            row(&[("g", DataValue::Integer(1)), ("v", DataValue::Integer(2))]),
            row(&[("g", DataValue::Integer(1)), ("v", DataValue::Integer(4))]),
            row(&[("g", DataValue::Integer(1)), ("v", DataValue::Null)]),
        ];

        let mut aggregations = HashMap::new();
        aggregations.insert("v".to_string(), AggregateFunction::Mean);
        let mean = AggregateTransform::new(vec!["g".to_string()], aggregations)
            .transform(data.clone())
            .await
            .unwrap();
        assert_eq!(mean[0].get("v"), Some(&DataValue::Float(3.0)));

        let mut aggregations = HashMap::new();
        aggregations.insert("v".to_string(), AggregateFunction::Count);
        let count = AggregateTransform::new(vec!["g".to_string()], aggregations)
            .transform(data)
            .await
            .unwrap();
        // count ignora nulos
        assert_eq!(count[0].get("v"), Some(&DataValue::Integer(2)));
    }

    #[tokio::test]
    async fn test_aggregate_is_deterministic() {
        let data = vec![
            row(&[("g", DataValue::String("b".to_string())), ("v", DataValue::Integer(1))]),
            row(&[("g", DataValue::String("a".to_string())), ("v", DataValue::Integer(2))]),
        ];

        let mut aggregations = HashMap::new();
        aggregations.insert("v".to_string(), AggregateFunction::Sum);

        let build = || AggregateTransform::new(vec!["g".to_string()], aggregations.clone());
        let first = build().transform(data.clone()).await.unwrap();
        let second = build().transform(data).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_pivot_single_value_column() {
        let data = vec![
            row(&[
                ("id", DataValue::Integer(1)),
                ("mes", DataValue::String("jan".to_string())),
                ("total", DataValue::Integer(100)),
            ]),
            row(&[
                ("id", DataValue::Integer(1)),
                ("mes", DataValue::String("fev".to_string())),
                ("total", DataValue::Integer(200)),
            ]),
        ];

        let transform = PivotTransform::new(
            vec!["id".to_string()],
            "mes".to_string(),
            vec!["total".to_string()],
        );
        let result = transform.transform(data).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].get("jan"), Some(&DataValue::Integer(100)));
        assert_eq!(result[0].get("fev"), Some(&DataValue::Integer(200)));
    }

    #[tokio::test]
    async fn test_pivot_first_occurrence_wins() {
        let data = vec![
            row(&[
                ("id", DataValue::Integer(1)),
                ("mes", DataValue::String("jan".to_string())),
                ("total", DataValue::Integer(100)),
            ]),
            row(&[
                ("id", DataValue::Integer(1)),
                ("mes", DataValue::String("jan".to_string())),
                ("total", DataValue::Integer(999)),
            ]),
        ];

        let transform = PivotTransform::new(
            vec!["id".to_string()],
            "mes".to_string(),
            vec!["total".to_string()],
        );
        let result = transform.transform(data).await.unwrap();

        assert_eq!(result[0].get("jan"), Some(&DataValue::Integer(100)));
    }
}
