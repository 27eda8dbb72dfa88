use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Once;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row};
use crate::config::DatabaseSourceConfig;
use crate::error::{ExtractError, FluxError, Result};
use crate::types::{Batch, DataRow, DataValue};
use crate::traits::Extractor;

static DRIVERS: Once = Once::new();

/// Registra os drivers `Any` do sqlx uma única vez por processo
pub(crate) fn ensure_drivers() {
    DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// Abre um pool para a string de conexão informada
pub(crate) async fn connect_pool(connection_string: &str) -> Result<AnyPool> {
    ensure_drivers();
    AnyPoolOptions::new()
        .max_connections(1)
        .connect(connection_string)
        .await
        .map_err(|e| FluxError::Extract(ExtractError::Connection(e.to_string())))
}

/// Decodifica uma linha dinâmica do banco para DataRow
///
/// O driver `Any` expõe um conjunto pequeno de tipos; tentamos do mais
/// específico ao mais genérico e caímos em Null quando nenhum decodifica.
pub(crate) fn decode_row(row: &AnyRow) -> DataRow {
    let mut data_row = DataRow::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();

        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map(DataValue::Integer).unwrap_or(DataValue::Null)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            v.map(DataValue::Float).unwrap_or(DataValue::Null)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
            v.map(DataValue::Boolean).unwrap_or(DataValue::Null)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            v.map(DataValue::String).unwrap_or(DataValue::Null)
        } else {
            DataValue::Null
        };

        data_row.insert(name, value);
    }

    data_row
}

/// Extrator para consultas em banco de dados
///
/// Fontes grandes são lidas em páginas de tamanho configurável em vez de
/// um único lote sem limite; o cursor de offset vive no extrator.
#[derive(Debug)]
pub struct DatabaseExtractor {
    connection_string: String,
    query: String,
    offset: AtomicUsize,
    exhausted: AtomicBool,
}

impl DatabaseExtractor {
    pub fn new(connection_string: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            query: query.into(),
            offset: AtomicUsize::new(0),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Constrói a partir do descritor de configuração
    pub fn from_config(config: &DatabaseSourceConfig) -> Self {
        Self::new(&config.connection_string, &config.query)
    }

    fn paged_query(&self, page_size: usize, offset: usize) -> String {
        format!(
            "SELECT * FROM ({}) AS paged_source LIMIT {} OFFSET {}",
            self.query.trim().trim_end_matches(';'),
            page_size,
            offset
        )
    }
}

#[async_trait]
impl Extractor for DatabaseExtractor {
    async fn extract(&self) -> Result<Batch> {
        let pool = connect_pool(&self.connection_string).await?;

        let rows = sqlx::query(&self.query)
            .fetch_all(&pool)
            .await
            .map_err(|e| FluxError::Extract(ExtractError::ParseError(e.to_string())))?;

        pool.close().await;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn extract_page(&self, page_size: usize) -> Result<Batch> {
        let offset = self.offset.fetch_add(page_size, Ordering::SeqCst);
        let pool = connect_pool(&self.connection_string).await?;

        let query = self.paged_query(page_size, offset);
        let rows = sqlx::query(&query)
            .fetch_all(&pool)
            .await
            .map_err(|e| FluxError::Extract(ExtractError::ParseError(e.to_string())))?;

        pool.close().await;

        if rows.len() < page_size {
            self.exhausted.store(true, Ordering::SeqCst);
        }

        Ok(rows.iter().map(decode_row).collect())
    }

    async fn has_more(&self) -> Result<bool> {
        Ok(!self.exhausted.load(Ordering::SeqCst))
    }

    async fn reset(&self) -> Result<()> {
        self.offset.store(0, Ordering::SeqCst);
        self.exhausted.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seeded_sqlite(dir: &TempDir) -> String {
        let path = dir.path().join("fonte.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());

        let pool = connect_pool(&url).await.unwrap();
        sqlx::query("CREATE TABLE pessoas (id INTEGER PRIMARY KEY, nome TEXT, idade INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        for (id, nome, idade) in [(1, "Alice", 30), (2, "Bob", 25), (3, "Carol", 41)] {
            sqlx::query("INSERT INTO pessoas (id, nome, idade) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(nome)
                .bind(idade)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool.close().await;
        url
    }

    #[tokio::test]
    async fn test_database_extractor() {
        let dir = TempDir::new().unwrap();
        let url = seeded_sqlite(&dir).await;

        let extractor = DatabaseExtractor::new(&url, "SELECT * FROM pessoas ORDER BY id");
        let rows = extractor.extract().await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("nome"), Some(&DataValue::String("Alice".to_string())));
        assert_eq!(rows[0].get("idade"), Some(&DataValue::Integer(30)));
    }

    #[tokio::test]
    async fn test_database_extractor_paged() {
        let dir = TempDir::new().unwrap();
        let url = seeded_sqlite(&dir).await;

        let extractor = DatabaseExtractor::new(&url, "SELECT * FROM pessoas ORDER BY id");

        let page1 = extractor.extract_page(2).await.unwrap();
        assert_eq!(page1.len(), 2);
        assert!(extractor.has_more().await.unwrap());

        let page2 = extractor.extract_page(2).await.unwrap();
        assert_eq!(page2.len(), 1);
        assert!(!extractor.has_more().await.unwrap());

        extractor.reset().await.unwrap();
        assert!(extractor.has_more().await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_connection_is_connection_error() {
        let extractor =
            DatabaseExtractor::new("postgres://invalido:5432/nada", "SELECT 1");
        let err = extractor.extract().await.unwrap_err();
        assert!(matches!(
            err,
            FluxError::Extract(ExtractError::Connection(_))
        ));
    }
}
