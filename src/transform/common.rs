use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::warn;
use crate::config::{
    CleanOperations, ConditionValue, FilterCondition, FilterOperator, NullHandling, TargetType,
};
use crate::error::{Result, TransformError};
use crate::types::{Batch, DataRow, DataValue};
use crate::traits::Transformer;

/// Remove colunas específicas
///
/// Remover uma coluna ausente do lote é um no-op, nunca um erro; o passo
/// é idempotente.
#[derive(Debug, Clone)]
pub struct DropColumnsTransform {
    columns: Vec<String>,
}

impl DropColumnsTransform {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

#[async_trait]
impl Transformer for DropColumnsTransform {
    async fn transform(&self, data: Batch) -> Result<Batch> {
        Ok(data
            .into_iter()
            .map(|mut row| {
                for column in &self.columns {
                    row.remove(column);
                }
                row
            })
            .collect())
    }
}

/// Renomeia colunas segundo um mapeamento antigo → novo
///
/// Nomes de destino em colisão sobrescrevem em silêncio (última escrita
/// vence); a política está registrada no DESIGN.md.
#[derive(Debug, Clone)]
pub struct RenameColumnsTransform {
    mapping: HashMap<String, String>,
}

impl RenameColumnsTransform {
    pub fn new(mapping: HashMap<String, String>) -> Self {
        Self { mapping }
    }

    pub fn single(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        let mut mapping = HashMap::new();
        mapping.insert(old_name.into(), new_name.into());
        Self { mapping }
    }
}

#[async_trait]
impl Transformer for RenameColumnsTransform {
    async fn transform(&self, data: Batch) -> Result<Batch> {
        Ok(data
            .into_iter()
            .map(|row| {
                let mut new_row = DataRow::new();
                for (key, value) in row {
                    let new_key = self.mapping.get(&key).cloned().unwrap_or(key);
                    new_row.insert(new_key, value);
                }
                new_row
            })
            .collect())
    }
}

/// Filtra linhas por uma conjunção (E lógico) de condições
///
/// Linhas que falham em qualquer condição são descartadas.
#[derive(Debug, Clone)]
pub struct FilterRowsTransform {
    conditions: Vec<FilterCondition>,
}

impl FilterRowsTransform {
    pub fn new(conditions: Vec<FilterCondition>) -> Self {
        Self { conditions }
    }

    fn matches(&self, row: &DataRow) -> Result<bool> {
        for condition in &self.conditions {
            let cell = row.get(&condition.column).cloned().unwrap_or(DataValue::Null);

            let passed = match (&condition.operator, &condition.value) {
                (FilterOperator::In, ConditionValue::Many(values)) => {
                    values.iter().any(|v| cell.cmp(v) == std::cmp::Ordering::Equal)
                }
                (FilterOperator::NotIn, ConditionValue::Many(values)) => {
                    !values.iter().any(|v| cell.cmp(v) == std::cmp::Ordering::Equal)
                }
                (FilterOperator::In, ConditionValue::One(_))
                | (FilterOperator::NotIn, ConditionValue::One(_)) => {
                    return Err(TransformError::MissingParameter(format!(
                        "operador 'in'/'not_in' na coluna '{}' requer uma lista de valores",
                        condition.column
                    ))
                    .into());
                }
                (op, ConditionValue::One(value)) => {
                    let ordering = cell.cmp(value);
                    match op {
                        FilterOperator::Eq => ordering == std::cmp::Ordering::Equal,
                        FilterOperator::Ne => ordering != std::cmp::Ordering::Equal,
                        FilterOperator::Gt => ordering == std::cmp::Ordering::Greater,
                        FilterOperator::Lt => ordering == std::cmp::Ordering::Less,
                        FilterOperator::Ge => ordering != std::cmp::Ordering::Less,
                        FilterOperator::Le => ordering != std::cmp::Ordering::Greater,
                        FilterOperator::In | FilterOperator::NotIn => unreachable!(),
                    }
                }
                (op, ConditionValue::Many(_)) => {
                    return Err(TransformError::UnsupportedOperator(format!(
                        "operador '{:?}' na coluna '{}' requer valor escalar",
                        op, condition.column
                    ))
                    .into());
                }
            };

            if !passed {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl Transformer for FilterRowsTransform {
    async fn transform(&self, data: Batch) -> Result<Batch> {
        let mut result = Batch::with_capacity(data.len());
        for row in data {
            if self.matches(&row)? {
                result.push(row);
            }
        }
        Ok(result)
    }
}

/// Converte tipos de colunas
///
/// Falha de conversão em uma célula vira Null naquela célula, com warning
/// no log; o passo nunca aborta por valor inconvertível.
#[derive(Debug, Clone)]
pub struct ConvertTypesTransform {
    mapping: HashMap<String, TargetType>,
}

impl ConvertTypesTransform {
    pub fn new(mapping: HashMap<String, TargetType>) -> Self {
        Self { mapping }
    }

    pub fn single(column: impl Into<String>, target: TargetType) -> Self {
        let mut mapping = HashMap::new();
        mapping.insert(column.into(), target);
        Self { mapping }
    }

    fn convert(column: &str, value: &DataValue, target: TargetType) -> DataValue {
        if value.is_null() {
            return DataValue::Null;
        }

        let converted = match target {
            TargetType::Datetime => value.as_timestamp().map(DataValue::Timestamp),
            TargetType::Numeric => {
                // inteiro quando possível, senão float
                if let DataValue::Integer(i) = value {
                    Some(DataValue::Integer(*i))
                } else if let Some(i) = value
                    .as_string()
                    .and_then(|s| s.trim().parse::<i64>().ok())
                {
                    Some(DataValue::Integer(i))
                } else {
                    value.as_float().map(DataValue::Float)
                }
            }
            TargetType::Integer => value.as_integer().map(DataValue::Integer),
            TargetType::Float => value.as_float().map(DataValue::Float),
            TargetType::String => value.as_string().map(DataValue::String),
            TargetType::Boolean => value.as_boolean().map(DataValue::Boolean),
        };

        match converted {
            Some(v) => v,
            None => {
                warn!(
                    column = column,
                    value = ?value,
                    target = ?target,
                    "Não foi possível converter o valor; célula substituída por null"
                );
                DataValue::Null
            }
        }
    }
}

#[async_trait]
impl Transformer for ConvertTypesTransform {
    async fn transform(&self, data: Batch) -> Result<Batch> {
        Ok(data
            .into_iter()
            .map(|mut row| {
                for (column, target) in &self.mapping {
                    if let Some(value) = row.get(column) {
                        let converted = Self::convert(column, value, *target);
                        row.insert(column.clone(), converted);
                    }
                }
                row
            })
            .collect())
    }
}

/// Limpeza de dados: deduplicação, tratamento de nulos e trim de strings
#[derive(Debug, Clone)]
pub struct CleanTransform {
    operations: CleanOperations,
}

impl CleanTransform {
    pub fn new(operations: CleanOperations) -> Self {
        Self { operations }
    }

    /// Chave de deduplicação: subconjunto configurado ou a linha inteira,
    /// sempre em ordem estável de coluna
    fn dedup_key(&self, row: &DataRow) -> Vec<(String, DataValue)> {
        match &self.operations.duplicate_subset {
            Some(subset) => subset
                .iter()
                .map(|col| {
                    (
                        col.clone(),
                        row.get(col).cloned().unwrap_or(DataValue::Null),
                    )
                })
                .collect(),
            None => {
                let mut pairs: Vec<(String, DataValue)> = row
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                pairs.sort_by(|a, b| a.0.cmp(&b.0));
                pairs
            }
        }
    }
}

#[async_trait]
impl Transformer for CleanTransform {
    async fn transform(&self, mut data: Batch) -> Result<Batch> {
        if self.operations.remove_duplicates {
            let mut seen: HashSet<Vec<(String, DataValue)>> = HashSet::new();
            let mut deduped = Batch::with_capacity(data.len());
            // primeira ocorrência vence
            for row in data {
                if seen.insert(self.dedup_key(&row)) {
                    deduped.push(row);
                }
            }
            data = deduped;
        }

        match self.operations.handle_nulls {
            Some(NullHandling::Drop) => {
                data.retain(|row| !row.values().any(|v| v.is_null()));
            }
            Some(NullHandling::Fill) => {
                let fill = self
                    .operations
                    .fill_value
                    .clone()
                    .unwrap_or(DataValue::Integer(0));
                for row in data.iter_mut() {
                    for value in row.values_mut() {
                        if value.is_null() {
                            *value = fill.clone();
                        }
                    }
                }
            }
            None => {}
        }

        if self.operations.trim_strings {
            for row in data.iter_mut() {
                for value in row.values_mut() {
                    // nulos ficam intocados
                    if let DataValue::String(s) = value {
                        let trimmed = s.trim();
                        if trimmed.len() != s.len() {
                            *value = DataValue::String(trimmed.to_string());
                        }
                    }
                }
            }
        }

        Ok(data)
    }
}

/// Combina múltiplas transformações em sequência
pub struct CompositeTransformer {
    transformers: Vec<Box<dyn Transformer>>,
}

impl CompositeTransformer {
    pub fn new() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    pub fn add<T: Transformer + 'static>(self, transformer: T) -> Self {
        self.add_boxed(Box::new(transformer))
    }

    pub fn add_boxed(mut self, transformer: Box<dyn Transformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

impl Default for CompositeTransformer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transformer for CompositeTransformer {
    async fn transform(&self, mut data: Batch) -> Result<Batch> {
        for transformer in &self.transformers {
            data = transformer.transform(data).await?;
        }
        Ok(data)
    }
}
