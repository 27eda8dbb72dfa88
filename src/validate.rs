//! Validação de qualidade de dados
//!
//! O validador executa todos os checks configurados contra o lote e produz
//! um relatório; ele nunca muta dados e nunca decide abortar a execução.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use tracing::warn;
use crate::config::{ValidationCheck, ValidationConfig};
use crate::error::{ConfigError, FluxError, Result};
use crate::types::{DataRow, DataValue, ValidationReport};
use crate::traits::Validator;

/// Check pronto para execução (padrões de formato pré-compilados)
enum CompiledCheck {
    NotNull {
        columns: Vec<String>,
    },
    Unique {
        columns: Vec<String>,
    },
    Range {
        column: String,
        min: Option<DataValue>,
        max: Option<DataValue>,
    },
    Format {
        column: String,
        pattern: String,
        regex: Regex,
    },
}

/// Validador dirigido pelos descritores de check da configuração
pub struct CheckValidator {
    checks: Vec<CompiledCheck>,
}

impl CheckValidator {
    /// Compila os descritores; padrão de formato inválido falha aqui,
    /// antes de qualquer I/O
    pub fn new(checks: &[ValidationCheck]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(checks.len());

        for check in checks {
            match check {
                ValidationCheck::NotNull { columns } => {
                    compiled.push(CompiledCheck::NotNull {
                        columns: columns.clone(),
                    });
                }
                ValidationCheck::Unique { columns } => {
                    compiled.push(CompiledCheck::Unique {
                        columns: columns.clone(),
                    });
                }
                ValidationCheck::Range { column, min, max } => {
                    compiled.push(CompiledCheck::Range {
                        column: column.clone(),
                        min: min.clone(),
                        max: max.clone(),
                    });
                }
                ValidationCheck::Format { column, pattern } => {
                    // match ancorado no início, como o contrato original
                    let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                        FluxError::Config(ConfigError::InvalidValue {
                            param: format!("validation.format[{}]", column),
                            value: e.to_string(),
                        })
                    })?;
                    compiled.push(CompiledCheck::Format {
                        column: column.clone(),
                        pattern: pattern.clone(),
                        regex,
                    });
                }
                ValidationCheck::Unknown => {
                    warn!("Tipo de check de validação desconhecido, ignorado");
                }
            }
        }

        Ok(Self { checks: compiled })
    }

    /// Constrói a partir da seção de validação da configuração
    pub fn from_config(config: &ValidationConfig) -> Result<Self> {
        Self::new(&config.checks)
    }

    fn run_not_null(columns: &[String], data: &[DataRow]) -> (bool, String) {
        for column in columns {
            let nulls = data
                .iter()
                .filter(|row| row.get(column).map(|v| v.is_null()).unwrap_or(true))
                .count();
            if nulls > 0 {
                return (
                    false,
                    format!("coluna '{}' contém {} valor(es) nulo(s)", column, nulls),
                );
            }
        }
        (true, "ok".to_string())
    }

    fn run_unique(columns: &[String], data: &[DataRow]) -> (bool, String) {
        let mut seen: HashSet<Vec<DataValue>> = HashSet::new();
        for row in data {
            let key: Vec<DataValue> = columns
                .iter()
                .map(|col| row.get(col).cloned().unwrap_or(DataValue::Null))
                .collect();
            if !seen.insert(key) {
                return (
                    false,
                    format!("tuplas duplicadas nas colunas {:?}", columns),
                );
            }
        }
        (true, "ok".to_string())
    }

    fn run_range(
        column: &str,
        min: &Option<DataValue>,
        max: &Option<DataValue>,
        data: &[DataRow],
    ) -> (bool, String) {
        for row in data {
            let value = match row.get(column) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };

            if let Some(min) = min {
                if value.cmp(min) == std::cmp::Ordering::Less {
                    return (
                        false,
                        format!("coluna '{}' tem valor abaixo do mínimo", column),
                    );
                }
            }
            if let Some(max) = max {
                if value.cmp(max) == std::cmp::Ordering::Greater {
                    return (
                        false,
                        format!("coluna '{}' tem valor acima do máximo", column),
                    );
                }
            }
        }
        (true, "ok".to_string())
    }

    fn run_format(column: &str, pattern: &str, regex: &Regex, data: &[DataRow]) -> (bool, String) {
        for row in data {
            let text = row
                .get(column)
                .and_then(|v| v.as_string())
                .unwrap_or_default();
            if !regex.is_match(&text) {
                return (
                    false,
                    format!("coluna '{}' não casa com o padrão '{}'", column, pattern),
                );
            }
        }
        (true, "ok".to_string())
    }
}

#[async_trait]
impl Validator for CheckValidator {
    /// Executa todos os checks, mesmo após uma falha, para que o relatório
    /// enumere cada um deles
    async fn validate(&self, data: &[DataRow]) -> Result<ValidationReport> {
        let mut report = ValidationReport::new();

        for check in &self.checks {
            let (kind, (passed, detail)) = match check {
                CompiledCheck::NotNull { columns } => {
                    ("not_null", Self::run_not_null(columns, data))
                }
                CompiledCheck::Unique { columns } => ("unique", Self::run_unique(columns, data)),
                CompiledCheck::Range { column, min, max } => {
                    ("range", Self::run_range(column, min, max, data))
                }
                CompiledCheck::Format {
                    column,
                    pattern,
                    regex,
                } => ("format", Self::run_format(column, pattern, regex, data)),
            };

            if !passed {
                warn!(check = kind, detail = %detail, "Check de qualidade falhou");
            }
            report.record(kind, passed, detail);
        }

        Ok(report)
    }
}
