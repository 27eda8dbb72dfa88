use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use crate::error::{ConfigError, FluxError, Result};
use crate::types::DataValue;

/// Configuração principal do pipeline
///
/// Carregada uma única vez na inicialização (arquivo + ambiente + overrides
/// de linha de comando, nessa ordem) e imutável durante toda a execução.
/// Nenhum estágio recebe acesso mutável a ela.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FluxConfig {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    #[serde(default)]
    pub transformations: Vec<TransformStep>,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub pipeline: PipelineOptions,
    #[serde(default)]
    pub migration: Option<MigrationConfig>,
}

/// Descritor de fonte de dados
///
/// Um tipo desconhecido aqui é fatal: sem fonte não há pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum SourceConfig {
    Csv(CsvSourceConfig),
    Json(JsonSourceConfig),
    Database(DatabaseSourceConfig),
    Api(ApiSourceConfig),
    S3(ObjectStoreConfig),
    Sftp(SftpSourceConfig),
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Csv(_) => "csv",
            SourceConfig::Json(_) => "json",
            SourceConfig::Database(_) => "database",
            SourceConfig::Api(_) => "api",
            SourceConfig::S3(_) => "s3",
            SourceConfig::Sftp(_) => "sftp",
        }
    }
}

/// Descritor de destino de dados
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum DestinationConfig {
    Csv(CsvSinkConfig),
    Json(JsonSinkConfig),
    Database(DatabaseSinkConfig),
    Api(ApiSinkConfig),
    S3(ObjectStoreConfig),
}

impl DestinationConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            DestinationConfig::Csv(_) => "csv",
            DestinationConfig::Json(_) => "json",
            DestinationConfig::Database(_) => "database",
            DestinationConfig::Api(_) => "api",
            DestinationConfig::S3(_) => "s3",
        }
    }
}

/// Formato de arquivo para fontes que entregam bytes (S3, SFTP)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Csv,
    Json,
    JsonLines,
}

impl Default for FileFormat {
    fn default() -> Self {
        FileFormat::Csv
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CsvSourceConfig {
    pub file_path: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_true")]
    pub has_headers: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonSourceConfig {
    pub file_path: String,
    /// Caminho pontilhado até o array de registros em JSONs aninhados
    #[serde(default)]
    pub array_path: Option<String>,
    /// Trata o arquivo como JSON Lines (um objeto por linha)
    #[serde(default)]
    pub lines: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSourceConfig {
    pub connection_string: String,
    pub query: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiSourceConfig {
    pub url: String,
    #[serde(default = "default_get")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    /// Caminho pontilhado até os registros dentro da resposta
    #[serde(default)]
    pub data_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub format: FileFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SftpSourceConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub remote_path: String,
    #[serde(default)]
    pub format: FileFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CsvSinkConfig {
    pub file_path: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonSinkConfig {
    pub file_path: String,
    #[serde(default)]
    pub pretty: bool,
    /// Grava em JSON Lines em vez de um único array
    #[serde(default)]
    pub lines: bool,
    #[serde(default)]
    pub append: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSinkConfig {
    pub connection_string: String,
    pub table_name: String,
    #[serde(default)]
    pub if_exists: IfExists,
}

/// Política de colisão com dados pré-existentes na tabela de destino
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IfExists {
    Append,
    Replace,
    Fail,
}

impl Default for IfExists {
    fn default() -> Self {
        IfExists::Append
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiSinkConfig {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Tamanho fixo dos lotes enviados por requisição
    #[serde(default = "default_api_batch")]
    pub batch_size: usize,
}

/// Descritor de um passo de transformação
///
/// Tipos desconhecidos caem em `Unknown` e são logados e pulados na
/// montagem do pipeline, nunca tratados como fatais.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum TransformStep {
    DropColumns {
        columns: Vec<String>,
    },
    RenameColumns {
        mapping: HashMap<String, String>,
    },
    FilterRows {
        conditions: Vec<FilterCondition>,
    },
    ConvertTypes {
        mapping: HashMap<String, TargetType>,
    },
    #[serde(alias = "clean_data")]
    Clean {
        operations: CleanOperations,
    },
    Aggregate {
        group_by: Vec<String>,
        aggregations: HashMap<String, AggregateFunction>,
    },
    Pivot {
        index: Vec<String>,
        columns: String,
        values: Vec<String>,
    },
    #[serde(other)]
    Unknown,
}

impl TransformStep {
    pub fn kind(&self) -> &'static str {
        match self {
            TransformStep::DropColumns { .. } => "drop_columns",
            TransformStep::RenameColumns { .. } => "rename_columns",
            TransformStep::FilterRows { .. } => "filter_rows",
            TransformStep::ConvertTypes { .. } => "convert_types",
            TransformStep::Clean { .. } => "clean",
            TransformStep::Aggregate { .. } => "aggregate",
            TransformStep::Pivot { .. } => "pivot",
            TransformStep::Unknown => "unknown",
        }
    }
}

/// Condição individual do filtro de linhas (conjunção lógica)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterCondition {
    pub column: String,
    pub operator: FilterOperator,
    pub value: ConditionValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum FilterOperator {
    #[serde(rename = "==", alias = "eq")]
    Eq,
    #[serde(rename = "!=", alias = "ne")]
    Ne,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = ">=", alias = "ge")]
    Ge,
    #[serde(rename = "<=", alias = "le")]
    Le,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
}

/// Valor de comparação: escalar ou lista (para in / not_in)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Many(Vec<DataValue>),
    One(DataValue),
}

/// Tipo-alvo de uma conversão de coluna
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Datetime,
    Numeric,
    Integer,
    Float,
    String,
    Boolean,
}

/// Operações de limpeza habilitadas em um passo `clean`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CleanOperations {
    #[serde(default)]
    pub remove_duplicates: bool,
    /// Subconjunto de colunas usado como chave de deduplicação;
    /// ausente, a linha inteira é a chave
    #[serde(default)]
    pub duplicate_subset: Option<Vec<String>>,
    #[serde(default)]
    pub handle_nulls: Option<NullHandling>,
    #[serde(default)]
    pub fill_value: Option<DataValue>,
    #[serde(default)]
    pub trim_strings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NullHandling {
    Drop,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Sum,
    Count,
    Mean,
    Min,
    Max,
    First,
    Last,
}

/// Seção de validação de qualidade
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub checks: Vec<ValidationCheck>,
}

/// Descritor de um check de qualidade
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum ValidationCheck {
    NotNull {
        columns: Vec<String>,
    },
    Unique {
        columns: Vec<String>,
    },
    Range {
        column: String,
        #[serde(default)]
        min: Option<DataValue>,
        #[serde(default)]
        max: Option<DataValue>,
    },
    Format {
        column: String,
        pattern: String,
    },
    #[serde(other)]
    Unknown,
}

impl ValidationCheck {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationCheck::NotNull { .. } => "not_null",
            ValidationCheck::Unique { .. } => "unique",
            ValidationCheck::Range { .. } => "range",
            ValidationCheck::Format { .. } => "format",
            ValidationCheck::Unknown => "unknown",
        }
    }
}

/// Opções gerais do pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineOptions {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_true")]
    pub stop_on_validation_error: bool,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_workers: default_max_workers(),
            stop_on_validation_error: true,
            timeout_seconds: default_timeout(),
        }
    }
}

/// Seção específica da migração de tabelas em lote
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MigrationConfig {
    /// Tabelas a copiar; vazio significa "decidido na linha de comando"
    #[serde(default)]
    pub tables: Vec<String>,
    /// Passos de transformação aplicados por tabela durante a cópia
    #[serde(default)]
    pub rules: HashMap<String, Vec<TransformStep>>,
}

fn default_delimiter() -> char {
    ','
}

fn default_true() -> bool {
    true
}

fn default_get() -> String {
    "GET".to_string()
}

fn default_sftp_port() -> u16 {
    22
}

fn default_api_batch() -> usize {
    100
}

fn default_batch_size() -> usize {
    1000
}

fn default_max_workers() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    30
}

/// Overrides aplicados sobre o documento bruto antes do parse tipado
///
/// O resultado da mesclagem é o valor final e imutável da configuração;
/// nenhum estágio muta a configuração depois disso.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_type: Option<String>,
    pub destination_type: Option<String>,
    pub batch_size: Option<usize>,
    pub max_workers: Option<usize>,
    pub tables: Option<Vec<String>>,
    pub stop_on_validation_error: Option<bool>,
}

impl ConfigOverrides {
    fn apply(&self, raw: &mut serde_json::Value) {
        if let Some(kind) = &self.source_type {
            set_path(raw, &["source", "type"], serde_json::Value::String(kind.clone()));
        }
        if let Some(kind) = &self.destination_type {
            set_path(raw, &["destination", "type"], serde_json::Value::String(kind.clone()));
        }
        if let Some(size) = self.batch_size {
            set_path(raw, &["pipeline", "batch_size"], serde_json::json!(size));
        }
        if let Some(workers) = self.max_workers {
            set_path(raw, &["pipeline", "max_workers"], serde_json::json!(workers));
        }
        if let Some(stop) = self.stop_on_validation_error {
            set_path(raw, &["pipeline", "stop_on_validation_error"], serde_json::json!(stop));
        }
        if let Some(tables) = &self.tables {
            set_path(raw, &["migration", "tables"], serde_json::json!(tables));
        }
    }
}

/// Overrides vindos do ambiente (aplicados antes dos da linha de comando)
fn apply_env(raw: &mut serde_json::Value) {
    if let Ok(size) = std::env::var("FLUX_BATCH_SIZE") {
        if let Ok(size) = size.parse::<usize>() {
            set_path(raw, &["pipeline", "batch_size"], serde_json::json!(size));
        }
    }
    if let Ok(workers) = std::env::var("FLUX_MAX_WORKERS") {
        if let Ok(workers) = workers.parse::<usize>() {
            set_path(raw, &["pipeline", "max_workers"], serde_json::json!(workers));
        }
    }
    if let Ok(stop) = std::env::var("FLUX_STOP_ON_VALIDATION_ERROR") {
        if let Ok(stop) = stop.parse::<bool>() {
            set_path(raw, &["pipeline", "stop_on_validation_error"], serde_json::json!(stop));
        }
    }
}

fn set_path(raw: &mut serde_json::Value, path: &[&str], value: serde_json::Value) {
    let mut current = raw;
    for key in &path[..path.len() - 1] {
        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            if let Some(obj) = current.as_object_mut() {
                obj.insert((*key).to_string(), serde_json::json!({}));
            }
        }
        current = match current.get_mut(*key) {
            Some(v) => v,
            None => return,
        };
    }
    if let Some(obj) = current.as_object_mut() {
        obj.insert(path[path.len() - 1].to_string(), value);
    }
}

impl FluxConfig {
    /// Carrega configuração de arquivo (YAML, TOML ou JSON, pela extensão)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with_overrides(path, &ConfigOverrides::default())
    }

    /// Carrega configuração de arquivo mesclando overrides de CLI/ambiente
    ///
    /// A mesclagem acontece sobre o documento bruto, antes do parse tipado,
    /// de forma que o valor resultante já nasce completo e imutável.
    pub fn from_file_with_overrides<P: AsRef<Path>>(
        path: P,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;
        let mut raw: serde_json::Value = settings.try_deserialize()?;

        apply_env(&mut raw);
        overrides.apply(&mut raw);
        Self::from_raw(raw)
    }

    /// Carrega configuração de string YAML
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml_str, config::FileFormat::Yaml))
            .build()?;
        let raw: serde_json::Value = settings.try_deserialize()?;
        Self::from_raw(raw)
    }

    /// Carrega configuração de string TOML
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml_str, config::FileFormat::Toml))
            .build()?;
        let raw: serde_json::Value = settings.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: serde_json::Value) -> Result<Self> {
        let cfg: FluxConfig = serde_json::from_value(raw)
            .map_err(|e| FluxError::Config(ConfigError::ParseError(e.to_string())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Valida a configuração antes de qualquer I/O
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            return Err(FluxError::Config(ConfigError::InvalidValue {
                param: "batch_size".to_string(),
                value: "0".to_string(),
            }));
        }

        if self.pipeline.max_workers == 0 {
            return Err(FluxError::Config(ConfigError::InvalidValue {
                param: "max_workers".to_string(),
                value: "0".to_string(),
            }));
        }

        if let DestinationConfig::Api(api) = &self.destination {
            if api.batch_size == 0 {
                return Err(FluxError::Config(ConfigError::InvalidValue {
                    param: "destination.batch_size".to_string(),
                    value: "0".to_string(),
                }));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_YAML: &str = r#"
source:
  type: csv
  config:
    file_path: entrada.csv
destination:
  type: json
  config:
    file_path: saida.json
transformations:
  - type: filter_rows
    config:
      conditions:
        - column: age
          operator: ">="
          value: 18
  - type: fancy_new_step
    config:
      whatever: true
validation:
  checks:
    - type: not_null
      config:
        columns: [id]
pipeline:
  batch_size: 500
"#;

    #[test]
    fn test_parse_full_config() {
        let cfg = FluxConfig::from_yaml(BASE_YAML).unwrap();

        assert_eq!(cfg.source.kind(), "csv");
        assert_eq!(cfg.destination.kind(), "json");
        assert_eq!(cfg.pipeline.batch_size, 500);
        assert!(cfg.pipeline.stop_on_validation_error);
        assert_eq!(cfg.transformations.len(), 2);
        assert_eq!(cfg.validation.checks.len(), 1);
    }

    #[test]
    fn test_unknown_step_kind_is_not_fatal() {
        let cfg = FluxConfig::from_yaml(BASE_YAML).unwrap();
        assert!(matches!(cfg.transformations[1], TransformStep::Unknown));
    }

    #[test]
    fn test_unknown_source_kind_is_fatal() {
        let yaml = r#"
source:
  type: carrier_pigeon
  config: {}
destination:
  type: json
  config:
    file_path: saida.json
"#;
        assert!(FluxConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let yaml = r#"
source:
  type: csv
  config:
    file_path: entrada.csv
destination:
  type: json
  config:
    file_path: saida.json
pipeline:
  batch_size: 0
"#;
        assert!(FluxConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_overrides_apply_before_typed_parse() {
        let mut raw: serde_json::Value = serde_json::json!({
            "source": {"type": "csv", "config": {"file_path": "a.csv"}},
            "destination": {"type": "json", "config": {"file_path": "b.json"}}
        });

        let overrides = ConfigOverrides {
            batch_size: Some(42),
            tables: Some(vec!["users".to_string()]),
            ..Default::default()
        };
        overrides.apply(&mut raw);

        let cfg = FluxConfig::from_raw(raw).unwrap();
        assert_eq!(cfg.pipeline.batch_size, 42);
        assert_eq!(cfg.migration.unwrap().tables, vec!["users".to_string()]);
    }

    #[test]
    fn test_filter_operator_aliases() {
        let yaml = r#"
source:
  type: csv
  config:
    file_path: entrada.csv
destination:
  type: json
  config:
    file_path: saida.json
transformations:
  - type: filter_rows
    config:
      conditions:
        - column: status
          operator: in
          value: [ativo, pendente]
"#;
        let cfg = FluxConfig::from_yaml(yaml).unwrap();
        match &cfg.transformations[0] {
            TransformStep::FilterRows { conditions } => {
                assert_eq!(conditions[0].operator, FilterOperator::In);
                assert!(matches!(conditions[0].value, ConditionValue::Many(_)));
            }
            other => panic!("passo inesperado: {:?}", other),
        }
    }

    #[test]
    fn test_if_exists_default_is_append() {
        let yaml = r#"
source:
  type: csv
  config:
    file_path: entrada.csv
destination:
  type: database
  config:
    connection_string: "sqlite::memory:"
    table_name: destino
"#;
        let cfg = FluxConfig::from_yaml(yaml).unwrap();
        match cfg.destination {
            DestinationConfig::Database(db) => assert_eq!(db.if_exists, IfExists::Append),
            other => panic!("destino inesperado: {:?}", other),
        }
    }
}
