use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Representa uma linha de dados genérica
pub type DataRow = HashMap<String, DataValue>;

/// Lote de linhas em memória movido entre os estágios do pipeline
pub type Batch = Vec<DataRow>;

/// Valores escalares suportados
///
/// Valores aninhados (objetos/arrays de fontes sem esquema) são achatados
/// na extração, serializados como string JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Timestamp com timezone UTC
    Timestamp(DateTime<Utc>),
}

impl Eq for DataValue {}

impl Hash for DataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DataValue::Null => 0u8.hash(state),
            DataValue::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            DataValue::Integer(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            DataValue::Float(f) => {
                3u8.hash(state);
                // Para f64, convertemos para bits para hash
                f.to_bits().hash(state);
            }
            DataValue::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            DataValue::Timestamp(ts) => {
                5u8.hash(state);
                ts.hash(state);
            }
        }
    }
}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;

        match (self, other) {
            (DataValue::Null, DataValue::Null) => Ordering::Equal,
            (DataValue::Null, _) => Ordering::Less,
            (_, DataValue::Null) => Ordering::Greater,

            (DataValue::Boolean(a), DataValue::Boolean(b)) => a.cmp(b),
            (DataValue::Boolean(_), _) => Ordering::Less,
            (_, DataValue::Boolean(_)) => Ordering::Greater,

            (DataValue::Integer(a), DataValue::Integer(b)) => a.cmp(b),
            (DataValue::Integer(a), DataValue::Float(b)) => (*a as f64)
                .partial_cmp(b)
                .unwrap_or(Ordering::Equal),
            (DataValue::Integer(_), _) => Ordering::Less,

            (DataValue::Float(a), DataValue::Integer(b)) => a
                .partial_cmp(&(*b as f64))
                .unwrap_or(Ordering::Equal),
            (DataValue::Float(a), DataValue::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (DataValue::Float(_), _) => Ordering::Less,

            (DataValue::String(a), DataValue::String(b)) => a.cmp(b),
            (DataValue::String(_), _) => Ordering::Less,

            (DataValue::Timestamp(a), DataValue::Timestamp(b)) => a.cmp(b),
            (DataValue::Timestamp(_), _) => Ordering::Greater,
        }
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::String(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Integer(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Float(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(value: DateTime<Utc>) -> Self {
        DataValue::Timestamp(value)
    }
}

impl DataValue {
    /// Converte para string se possível
    pub fn as_string(&self) -> Option<String> {
        match self {
            DataValue::String(s) => Some(s.clone()),
            DataValue::Integer(i) => Some(i.to_string()),
            DataValue::Float(f) => Some(f.to_string()),
            DataValue::Boolean(b) => Some(b.to_string()),
            DataValue::Timestamp(ts) => Some(ts.to_rfc3339()),
            DataValue::Null => None,
        }
    }

    /// Converte para inteiro se possível
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Integer(i) => Some(*i),
            DataValue::Float(f) => Some(*f as i64),
            DataValue::String(s) => s.trim().parse().ok(),
            DataValue::Boolean(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Converte para float se possível
    pub fn as_float(&self) -> Option<f64> {
        match self {
            DataValue::Float(f) => Some(*f),
            DataValue::Integer(i) => Some(*i as f64),
            DataValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Converte para boolean se possível
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            DataValue::Boolean(b) => Some(*b),
            DataValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => Some(true),
                "false" | "0" | "no" | "n" => Some(false),
                _ => None,
            },
            DataValue::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Converte para timestamp (DateTime<Utc>) se possível
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            DataValue::Timestamp(ts) => Some(*ts),
            DataValue::Integer(i) => DateTime::from_timestamp(*i, 0),
            DataValue::String(s) => {
                // Tenta os formatos mais comuns, do mais específico ao mais simples
                if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                    Some(ts.with_timezone(&Utc))
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                    Some(DateTime::from_naive_utc_and_offset(dt, Utc))
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    Some(DateTime::from_naive_utc_and_offset(dt, Utc))
                } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    let dt = date.and_hms_opt(0, 0, 0)?;
                    Some(DateTime::from_naive_utc_and_offset(dt, Utc))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Verifica se é nulo
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }
}

/// Resultado de uma execução do pipeline
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub rows_extracted: usize,
    pub rows_loaded: usize,
    pub execution_time_ms: u64,
    pub outcome: PipelineOutcome,
    pub validation: Option<ValidationReport>,
}

/// Desfecho de uma execução que terminou sem erro fatal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Todas as etapas concluídas e dados gravados no destino
    Completed,
    /// A extração não produziu nenhuma linha; nada foi transformado ou gravado
    NoData,
}

impl PipelineResult {
    pub fn new() -> Self {
        Self {
            rows_extracted: 0,
            rows_loaded: 0,
            execution_time_ms: 0,
            outcome: PipelineOutcome::Completed,
            validation: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == PipelineOutcome::Completed
    }
}

impl Default for PipelineResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Estados do pipeline para rastreamento de execução
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Extracting,
    Transforming,
    Validating,
    Loading,
    Done,
    Aborted(String),
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState::Idle
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Ocioso"),
            PipelineState::Extracting => write!(f, "Extraindo"),
            PipelineState::Transforming => write!(f, "Transformando"),
            PipelineState::Validating => write!(f, "Validando"),
            PipelineState::Loading => write!(f, "Carregando"),
            PipelineState::Done => write!(f, "Concluído"),
            PipelineState::Aborted(reason) => write!(f, "Abortado: {}", reason),
        }
    }
}

/// Resultado de um check de qualidade individual
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub kind: String,
    pub passed: bool,
    pub detail: String,
}

/// Relatório produzido pelo validador para um lote
///
/// Todos os checks configurados são executados, mesmo após uma falha;
/// o relatório enumera cada um deles. Quem decide abortar é o
/// orquestrador, nunca o validador.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub results: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            passed: true,
            results: Vec::new(),
        }
    }

    /// Registra o resultado de um check, atualizando o status geral
    pub fn record(&mut self, kind: impl Into<String>, passed: bool, detail: impl Into<String>) {
        if !passed {
            self.passed = false;
        }
        self.results.push(CheckResult {
            kind: kind.into(),
            passed,
            detail: detail.into(),
        });
    }

    /// Checks que falharam
    pub fn failures(&self) -> Vec<&CheckResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Contadores de progresso compartilhados entre os workers de migração
///
/// Mutados apenas de forma monotônica, sob lock; servem ao log de progresso,
/// nunca à correção da cópia.
#[derive(Debug, Clone, Default)]
pub struct MigrationProgress {
    pub rows_migrated: u64,
    pub rows_total: u64,
    pub tables_completed: usize,
}

impl MigrationProgress {
    pub fn percent(&self) -> f64 {
        if self.rows_total == 0 {
            0.0
        } else {
            (self.rows_migrated as f64 / self.rows_total as f64) * 100.0
        }
    }
}

/// Eventos do pipeline para monitoramento externo
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Pipeline iniciado
    Started {
        pipeline_id: String,
        timestamp: std::time::SystemTime,
    },
    /// Estado alterado
    StateChanged {
        pipeline_id: String,
        old_state: PipelineState,
        new_state: PipelineState,
        timestamp: std::time::SystemTime,
    },
    /// Lote processado (execução paginada)
    BatchProcessed {
        pipeline_id: String,
        batch_number: usize,
        rows_count: usize,
        timestamp: std::time::SystemTime,
    },
    /// Validação concluída
    ValidationFinished {
        pipeline_id: String,
        report: ValidationReport,
        timestamp: std::time::SystemTime,
    },
    /// Erro ocorreu
    Error {
        pipeline_id: String,
        error: String,
        timestamp: std::time::SystemTime,
    },
    /// Pipeline concluído
    Completed {
        pipeline_id: String,
        result: PipelineResult,
        timestamp: std::time::SystemTime,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_value_ordering() {
        assert!(DataValue::Null < DataValue::Integer(0));
        assert!(DataValue::Integer(1) < DataValue::Integer(2));
        assert!(DataValue::Integer(1) < DataValue::Float(1.5));
        assert!(DataValue::Float(2.5) > DataValue::Integer(2));
        assert!(DataValue::String("a".to_string()) < DataValue::String("b".to_string()));
    }

    #[test]
    fn test_data_value_conversions() {
        assert_eq!(DataValue::String("42".to_string()).as_integer(), Some(42));
        assert_eq!(DataValue::String("x".to_string()).as_integer(), None);
        assert_eq!(DataValue::String("3.5".to_string()).as_float(), Some(3.5));
        assert_eq!(DataValue::Integer(0).as_boolean(), Some(false));
        assert_eq!(DataValue::String("yes".to_string()).as_boolean(), Some(true));
        assert!(DataValue::Null.as_string().is_none());
    }

    #[test]
    fn test_timestamp_parsing() {
        let ts = DataValue::String("2024-03-01 10:30:00".to_string()).as_timestamp();
        assert!(ts.is_some());

        let date_only = DataValue::String("2024-03-01".to_string()).as_timestamp();
        assert!(date_only.is_some());

        assert!(DataValue::String("não é data".to_string()).as_timestamp().is_none());
    }

    #[test]
    fn test_validation_report_records_every_check() {
        let mut report = ValidationReport::new();
        report.record("not_null", true, "ok");
        report.record("unique", false, "duplicatas na coluna id");
        report.record("range", true, "ok");

        assert!(!report.passed);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failures().len(), 1);
    }

    #[test]
    fn test_migration_progress_percent() {
        let progress = MigrationProgress {
            rows_migrated: 50,
            rows_total: 200,
            tables_completed: 1,
        };
        assert!((progress.percent() - 25.0).abs() < f64::EPSILON);

        let empty = MigrationProgress::default();
        assert_eq!(empty.percent(), 0.0);
    }
}
