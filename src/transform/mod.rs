//! Passos de transformação: funções puras lote → lote
//!
//! Os passos são aplicados estritamente na ordem declarada na configuração;
//! a saída de um é a entrada do próximo.

pub mod common;
pub mod reshape;

use tracing::warn;
use crate::config::TransformStep;
use crate::error::Result;
use crate::traits::Transformer;
use common::{
    CleanTransform, CompositeTransformer, ConvertTypesTransform, DropColumnsTransform,
    FilterRowsTransform, RenameColumnsTransform,
};
use reshape::{AggregateTransform, PivotTransform};

/// Constrói um passo a partir do descritor; `None` para tipos desconhecidos
pub fn build_step(step: &TransformStep) -> Result<Option<Box<dyn Transformer>>> {
    let transformer: Box<dyn Transformer> = match step {
        TransformStep::DropColumns { columns } => {
            Box::new(DropColumnsTransform::new(columns.clone()))
        }
        TransformStep::RenameColumns { mapping } => {
            Box::new(RenameColumnsTransform::new(mapping.clone()))
        }
        TransformStep::FilterRows { conditions } => {
            Box::new(FilterRowsTransform::new(conditions.clone()))
        }
        TransformStep::ConvertTypes { mapping } => {
            Box::new(ConvertTypesTransform::new(mapping.clone()))
        }
        TransformStep::Clean { operations } => Box::new(CleanTransform::new(operations.clone())),
        TransformStep::Aggregate {
            group_by,
            aggregations,
        } => Box::new(AggregateTransform::new(
            group_by.clone(),
            aggregations.clone(),
        )),
        TransformStep::Pivot {
            index,
            columns,
            values,
        } => Box::new(PivotTransform::new(
            index.clone(),
            columns.clone(),
            values.clone(),
        )),
        TransformStep::Unknown => {
            warn!("Tipo de transformação desconhecido, passo ignorado");
            return Ok(None);
        }
    };

    Ok(Some(transformer))
}

/// Constrói a cadeia ordenada de passos declarada na configuração
pub fn build_transformers(steps: &[TransformStep]) -> Result<CompositeTransformer> {
    let mut composite = CompositeTransformer::new();
    for step in steps {
        if let Some(transformer) = build_step(step)? {
            composite = composite.add_boxed(transformer);
        }
    }
    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Transformer as _;
    use crate::types::{DataRow, DataValue};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_unknown_step_is_skipped() {
        let steps = vec![TransformStep::Unknown];
        let composite = build_transformers(&steps).unwrap();

        let mut row = DataRow::new();
        row.insert("id".to_string(), DataValue::Integer(1));
        let result = composite.transform(vec![row.clone()]).await.unwrap();

        // cadeia vazia: lote passa intocado
        assert_eq!(result, vec![row]);
    }

    #[tokio::test]
    async fn test_steps_apply_in_declared_order() {
        // renomeia a -> b, depois descarta b: nada sobra na linha
        let mut mapping = HashMap::new();
        mapping.insert("a".to_string(), "b".to_string());

        let steps = vec![
            TransformStep::RenameColumns { mapping },
            TransformStep::DropColumns {
                columns: vec!["b".to_string()],
            },
        ];
        let composite = build_transformers(&steps).unwrap();

        let mut row = DataRow::new();
        row.insert("a".to_string(), DataValue::Integer(1));
        let result = composite.transform(vec![row]).await.unwrap();

        assert!(result[0].is_empty());
    }
}
