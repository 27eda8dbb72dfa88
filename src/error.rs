use thiserror::Error;

/// Tipo Result principal da biblioteca
pub type Result<T> = std::result::Result<T, FluxError>;

/// Erro principal da biblioteca fluxrs
///
/// Todos os estágios propagam seus erros até o orquestrador; nenhum
/// estágio trata falha localmente. Qualquer variante fatal resulta em
/// código de saída 1 no binário.
#[derive(Error, Debug)]
pub enum FluxError {
    #[error("Erro de extração: {0}")]
    Extract(#[from] ExtractError),

    #[error("Erro de transformação: {0}")]
    Transform(#[from] TransformError),

    #[error("Erro de carga: {0}")]
    Load(#[from] LoadError),

    #[error("Erro de configuração: {0}")]
    Config(#[from] ConfigError),

    #[error("Validação de dados falhou: {0}")]
    Validation(String),

    #[error("Erro de pipeline: {0}")]
    Pipeline(String),

    #[error("Erro de migração: {0}")]
    Migration(String),

    #[error("Erro de I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro de serialização: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Erro genérico: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Erros relacionados à extração de dados
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Erro de conexão: {0}")]
    Connection(String),

    #[error("Arquivo não encontrado: {0}")]
    FileNotFound(String),

    #[error("Formato inválido: {0}")]
    InvalidFormat(String),

    #[error("Erro de parsing: {0}")]
    ParseError(String),

    #[error("Timeout na extração: {0}")]
    Timeout(String),
}

/// Erros relacionados à transformação de dados
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Transformação inválida: {0}")]
    InvalidTransformation(String),

    #[error("Parâmetro obrigatório ausente: {0}")]
    MissingParameter(String),

    #[error("Operador não suportado: {0}")]
    UnsupportedOperator(String),

    #[error("Erro de processamento: {0}")]
    ProcessingError(String),
}

/// Erros relacionados ao carregamento de dados
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Erro de conexão de destino: {0}")]
    DestinationConnection(String),

    #[error("Erro de escrita: {0}")]
    WriteError(String),

    #[error("Conflito de dados: {0}")]
    DataConflict(String),

    #[error("Lote rejeitado pelo destino: {0}")]
    RejectedBatch(String),
}

/// Erros relacionados à configuração
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuração inválida: {0}")]
    InvalidConfig(String),

    #[error("Parâmetro obrigatório ausente: {0}")]
    MissingRequiredParameter(String),

    #[error("Valor inválido para {param}: {value}")]
    InvalidValue { param: String, value: String },

    #[error("Erro de parsing de configuração: {0}")]
    ParseError(String),
}

impl FluxError {
    /// Retorna o código de erro
    pub fn error_code(&self) -> &'static str {
        match self {
            FluxError::Extract(_) => "EXTRACT_ERROR",
            FluxError::Transform(_) => "TRANSFORM_ERROR",
            FluxError::Load(_) => "LOAD_ERROR",
            FluxError::Config(_) => "CONFIG_ERROR",
            FluxError::Validation(_) => "VALIDATION_ERROR",
            FluxError::Pipeline(_) => "PIPELINE_ERROR",
            FluxError::Migration(_) => "MIGRATION_ERROR",
            FluxError::Io(_) => "IO_ERROR",
            FluxError::Serialization(_) => "SERIALIZATION_ERROR",
            FluxError::Generic(_) => "GENERIC_ERROR",
        }
    }
}

impl From<config::ConfigError> for FluxError {
    fn from(err: config::ConfigError) -> Self {
        FluxError::Config(ConfigError::ParseError(err.to_string()))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for FluxError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                FluxError::Extract(ExtractError::Connection(db_err.to_string()))
            }
            sqlx::Error::Io(io_err) => FluxError::Io(io_err),
            _ => FluxError::Generic(anyhow::anyhow!(err)),
        }
    }
}

#[cfg(feature = "csv")]
impl From<csv::Error> for FluxError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(io_err) => {
                FluxError::Io(std::io::Error::new(io_err.kind(), io_err.to_string()))
            }
            csv::ErrorKind::Utf8 { .. } => {
                FluxError::Extract(ExtractError::InvalidFormat("UTF-8 inválido".to_string()))
            }
            _ => FluxError::Extract(ExtractError::ParseError(err.to_string())),
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for FluxError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FluxError::Extract(ExtractError::Timeout(err.to_string()))
        } else if err.is_connect() {
            FluxError::Extract(ExtractError::Connection(err.to_string()))
        } else {
            FluxError::Generic(anyhow::anyhow!(err))
        }
    }
}
