//! # fluxrs - Pipelines de dados dirigidos por configuração
//!
//! Uma biblioteca para pipelines ETL (Extract, Transform, Load) em Rust,
//! com fontes e destinos plugáveis, validação de qualidade de dados e
//! migração de tabelas em lote.
//!
//! ## Características Principais
//!
//! - 🔌 **Dirigido por descritores**: fontes, passos e destinos declarados
//!   em configuração; tipos novos não tocam o orquestrador
//! - 📊 **Múltiplos conectores**: CSV, JSON, bancos de dados, APIs, S3 e SFTP
//! - ✅ **Qualidade de dados**: checks de nulos, unicidade, faixa e formato,
//!   todos executados mesmo após uma falha
//! - 📦 **Extração paginada**: fontes grandes lidas em páginas de tamanho
//!   configurável
//! - 🚚 **Migração em lote**: cópia de tabelas com um worker por tabela,
//!   limitado por semáforo
//!
//! ## Exemplo Rápido
//!
//! ```rust,no_run
//! use fluxrs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Pipeline simples: CSV → filtro → JSON
//!     let config = FluxConfig::from_file("pipeline.yaml")?;
//!     let pipeline = Pipeline::from_config(&config)?;
//!
//!     let result = pipeline.run().await?;
//!     println!("{} registros carregados", result.rows_loaded);
//!     Ok(())
//! }
//! ```
//!
//! ## Arquitetura
//!
//! A biblioteca é estruturada em quatro estágios:
//!
//! ### Extractors
//! Extraem lotes de linhas das fontes configuradas, com paginação para
//! fontes grandes.
//!
//! ### Transformers
//! Funções puras lote → lote, aplicadas na ordem declarada.
//!
//! ### Validators
//! Executam checks de qualidade e produzem um relatório; a decisão de
//! abortar é do orquestrador.
//!
//! ### Loaders
//! Gravam lotes nos destinos configurados.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;
pub mod extract;
pub mod transform;
pub mod validate;
pub mod load;
pub mod pipeline;
pub mod events;

#[cfg(feature = "database")]
pub mod migrate;

// Re-exports para facilitar o uso
pub use config::{ConfigOverrides, FluxConfig};
pub use error::{FluxError, Result};
pub use types::{
    Batch, DataRow, DataValue, PipelineOutcome, PipelineResult, PipelineState, ValidationReport,
};
pub use traits::{EventEmitter, Extractor, Loader, Transformer, Validator};
pub use pipeline::{ConfiguredPipeline, Pipeline};
pub use events::{InMemoryEventEmitter, LoggingEventEmitter};

#[cfg(feature = "database")]
pub use migrate::{MigrationSummary, Migrator};

/// Prelude com imports mais comuns
pub mod prelude {
    pub use crate::config::{ConfigOverrides, FluxConfig, PipelineOptions};
    pub use crate::error::{FluxError, Result};
    pub use crate::types::{
        Batch, DataRow, DataValue, PipelineOutcome, PipelineResult, PipelineState,
        ValidationReport,
    };
    pub use crate::traits::{EventEmitter, Extractor, Loader, Transformer, Validator};
    pub use crate::pipeline::{ConfiguredPipeline, Pipeline};
    pub use crate::events::{InMemoryEventEmitter, LoggingEventEmitter};

    #[cfg(feature = "database")]
    pub use crate::migrate::{MigrationSummary, Migrator};

    // Extractors
    #[cfg(feature = "csv")]
    pub use crate::extract::csv::CsvExtractor;

    #[cfg(feature = "json")]
    pub use crate::extract::json::{JsonExtractor, JsonLinesExtractor};

    #[cfg(feature = "database")]
    pub use crate::extract::database::DatabaseExtractor;

    #[cfg(feature = "http")]
    pub use crate::extract::http::ApiExtractor;

    // Transformers
    pub use crate::transform::common::{
        CleanTransform, CompositeTransformer, ConvertTypesTransform, DropColumnsTransform,
        FilterRowsTransform, RenameColumnsTransform,
    };
    pub use crate::transform::reshape::{AggregateTransform, PivotTransform};

    // Validators
    pub use crate::validate::CheckValidator;

    // Loaders
    #[cfg(feature = "csv")]
    pub use crate::load::csv::CsvLoader;

    pub use crate::load::json::{JsonLinesLoader, JsonLoader};
    pub use crate::load::memory::MemoryLoader;

    #[cfg(feature = "database")]
    pub use crate::load::database::DatabaseLoader;

    #[cfg(feature = "http")]
    pub use crate::load::http::ApiLoader;
}

/// Informações sobre a versão da biblioteca
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
