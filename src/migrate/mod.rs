//! Migração de tabelas em lote entre bancos de dados
//!
//! Caso degenerado do pipeline: fonte e destino são o mesmo endereço
//! paginado por offset e a transformação é quase-identidade (regras
//! opcionais por tabela). Um worker por tabela, limitado por semáforo;
//! cada worker executa seu próprio laço sequencial de extração e carga
//! com conexões próprias, adquiridas e liberadas dentro do escopo do
//! worker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{error, info};
use crate::config::{DestinationConfig, FluxConfig, SourceConfig, TransformStep};
use crate::error::{ConfigError, FluxError, Result};
use crate::extract::database::{connect_pool, decode_row};
use crate::load::database::{is_sql_identifier, DatabaseLoader};
use crate::traits::{Loader, Transformer};
use crate::types::{Batch, MigrationProgress};

/// Resultado consolidado de uma migração
#[derive(Debug, Clone, Default)]
pub struct MigrationSummary {
    pub tables_completed: usize,
    pub rows_migrated: u64,
    pub failures: Vec<TableFailure>,
}

/// Falha de migração de uma tabela individual
#[derive(Debug, Clone)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
}

impl MigrationSummary {
    pub fn all_completed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Migrador de tabelas entre dois bancos
pub struct Migrator {
    source_url: String,
    target_url: String,
    tables: Vec<String>,
    rules: HashMap<String, Vec<TransformStep>>,
    batch_size: usize,
    max_workers: usize,
}

impl Migrator {
    pub fn new(
        source_url: impl Into<String>,
        target_url: impl Into<String>,
        tables: Vec<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            target_url: target_url.into(),
            tables,
            rules: HashMap::new(),
            batch_size: 1000,
            max_workers: num_cpus::get(),
        }
    }

    /// Monta o migrador a partir da configuração
    ///
    /// Fonte e destino precisam ser do tipo `database`; a lista de tabelas
    /// vem da seção `migration` (ou do override de linha de comando).
    pub fn from_config(config: &FluxConfig) -> Result<Self> {
        let source_url = match &config.source {
            SourceConfig::Database(db) => db.connection_string.clone(),
            other => {
                return Err(FluxError::Config(ConfigError::InvalidConfig(format!(
                    "migração exige fonte 'database', veio '{}'",
                    other.kind()
                ))));
            }
        };

        let target_url = match &config.destination {
            DestinationConfig::Database(db) => db.connection_string.clone(),
            other => {
                return Err(FluxError::Config(ConfigError::InvalidConfig(format!(
                    "migração exige destino 'database', veio '{}'",
                    other.kind()
                ))));
            }
        };

        let migration = config.migration.clone().unwrap_or_default();
        if migration.tables.is_empty() {
            return Err(FluxError::Config(ConfigError::MissingRequiredParameter(
                "migration.tables".to_string(),
            )));
        }

        Ok(Self {
            source_url,
            target_url,
            tables: migration.tables,
            rules: migration.rules,
            batch_size: config.pipeline.batch_size,
            max_workers: config.pipeline.max_workers,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_rules(mut self, rules: HashMap<String, Vec<TransformStep>>) -> Self {
        self.rules = rules;
        self
    }

    /// Copia todas as tabelas configuradas, uma task por tabela
    ///
    /// Os workers não compartilham nenhum estado mutável além do contador
    /// de progresso, entregue a cada um no spawn.
    pub async fn run(&self) -> Result<MigrationSummary> {
        for table in &self.tables {
            if !is_sql_identifier(table) {
                return Err(FluxError::Config(ConfigError::InvalidValue {
                    param: "migration.tables".to_string(),
                    value: table.clone(),
                }));
            }
        }

        info!(
            tables = self.tables.len(),
            max_workers = self.max_workers,
            batch_size = self.batch_size,
            "Iniciando migração de tabelas"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let progress = Arc::new(Mutex::new(MigrationProgress::default()));
        let mut handles = Vec::with_capacity(self.tables.len());

        for table in &self.tables {
            let table = table.clone();
            let source_url = self.source_url.clone();
            let target_url = self.target_url.clone();
            let steps = self.rules.get(&table).cloned().unwrap_or_default();
            let batch_size = self.batch_size;
            let semaphore = Arc::clone(&semaphore);
            let progress = Arc::clone(&progress);

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| FluxError::Migration(e.to_string()))?;

                let rows =
                    migrate_table(&source_url, &target_url, &table, &steps, batch_size, progress)
                        .await?;
                Ok::<(String, u64), FluxError>((table, rows))
            });
            handles.push(handle);
        }

        let mut summary = MigrationSummary::default();
        let results = futures::future::join_all(handles).await;

        for (result, table) in results.into_iter().zip(self.tables.iter()) {
            match result {
                Ok(Ok((table, rows))) => {
                    summary.tables_completed += 1;
                    summary.rows_migrated += rows;
                    info!(table = %table, rows = rows, "Tabela migrada");
                }
                Ok(Err(e)) => {
                    error!(table = %table, error = %e, "Falha ao migrar tabela");
                    summary.failures.push(TableFailure {
                        table: table.clone(),
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(table = %table, error = %e, "Worker de migração encerrou de forma anormal");
                    summary.failures.push(TableFailure {
                        table: table.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            tables_completed = summary.tables_completed,
            rows_migrated = summary.rows_migrated,
            failures = summary.failures.len(),
            "Migração concluída"
        );

        Ok(summary)
    }
}

/// Copia uma única tabela em páginas de offset
async fn migrate_table(
    source_url: &str,
    target_url: &str,
    table: &str,
    steps: &[TransformStep],
    batch_size: usize,
    progress: Arc<Mutex<MigrationProgress>>,
) -> Result<u64> {
    let transformer = crate::transform::build_transformers(steps)?;

    let source = connect_pool(source_url).await?;
    let loader = DatabaseLoader::new(target_url, table)?;

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(&source)
        .await
        .map_err(|e| FluxError::Migration(format!("contagem de '{}' falhou: {}", table, e)))?;

    if total == 0 {
        info!(table = %table, "Tabela vazia, pulando");
        source.close().await;
        return Ok(0);
    }

    {
        let mut progress = progress.lock().unwrap();
        progress.rows_total += total as u64;
    }

    let mut offset = 0usize;
    let mut migrated = 0u64;

    while (offset as i64) < total {
        let query = format!(
            "SELECT * FROM {} LIMIT {} OFFSET {}",
            table, batch_size, offset
        );
        let rows = sqlx::query(&query)
            .fetch_all(&source)
            .await
            .map_err(|e| FluxError::Migration(format!("leitura de '{}' falhou: {}", table, e)))?;

        if rows.is_empty() {
            break;
        }

        let batch: Batch = rows.iter().map(decode_row).collect();
        let batch = transformer.transform(batch).await?;
        let loaded = loader.load(batch).await?;

        migrated += loaded as u64;
        offset += batch_size;

        // contador compartilhado só alimenta o log de progresso
        let (done, all) = {
            let mut progress = progress.lock().unwrap();
            progress.rows_migrated += loaded as u64;
            (progress.rows_migrated, progress.rows_total)
        };
        info!(
            table = %table,
            migrated = migrated,
            total = total,
            overall = format!("{}/{}", done, all),
            "Progresso da migração"
        );
    }

    source.close().await;
    Ok(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConditionValue, FilterCondition, FilterOperator};
    use crate::types::DataValue;
    use tempfile::TempDir;

    async fn seed_source(dir: &TempDir) -> String {
        let path = dir.path().join("origem.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = connect_pool(&url).await.unwrap();

        sqlx::query("CREATE TABLE clientes (id INTEGER, nome TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE pedidos (id INTEGER, valor INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE vazia (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        for i in 0..5 {
            sqlx::query("INSERT INTO clientes (id, nome) VALUES ($1, $2)")
                .bind(i)
                .bind(format!("cliente-{}", i))
                .execute(&pool)
                .await
                .unwrap();
        }
        for i in 0..3 {
            sqlx::query("INSERT INTO pedidos (id, valor) VALUES ($1, $2)")
                .bind(i)
                .bind(i * 100)
                .execute(&pool)
                .await
                .unwrap();
        }

        pool.close().await;
        url
    }

    async fn seed_target(dir: &TempDir) -> String {
        let path = dir.path().join("alvo.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = connect_pool(&url).await.unwrap();

        sqlx::query("CREATE TABLE clientes (id INTEGER, nome TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE pedidos (id INTEGER, valor INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE vazia (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        pool.close().await;
        url
    }

    async fn count(url: &str, table: &str) -> i64 {
        let pool = connect_pool(url).await.unwrap();
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&pool)
            .await
            .unwrap();
        pool.close().await;
        n
    }

    #[tokio::test]
    async fn test_migrate_all_tables() {
        let dir = TempDir::new().unwrap();
        let source = seed_source(&dir).await;
        let target = seed_target(&dir).await;

        let migrator = Migrator::new(
            &source,
            &target,
            vec![
                "clientes".to_string(),
                "pedidos".to_string(),
                "vazia".to_string(),
            ],
        )
        .with_batch_size(2)
        .with_max_workers(2);

        let summary = migrator.run().await.unwrap();

        assert!(summary.all_completed());
        assert_eq!(summary.tables_completed, 3);
        assert_eq!(summary.rows_migrated, 8);
        assert_eq!(count(&target, "clientes").await, 5);
        assert_eq!(count(&target, "pedidos").await, 3);
        assert_eq!(count(&target, "vazia").await, 0);
    }

    #[tokio::test]
    async fn test_migrate_applies_per_table_rules() {
        let dir = TempDir::new().unwrap();
        let source = seed_source(&dir).await;
        let target = seed_target(&dir).await;

        let mut rules = HashMap::new();
        rules.insert(
            "pedidos".to_string(),
            vec![TransformStep::FilterRows {
                conditions: vec![FilterCondition {
                    column: "valor".to_string(),
                    operator: FilterOperator::Gt,
                    value: ConditionValue::One(DataValue::Integer(0)),
                }],
            }],
        );

        let migrator = Migrator::new(&source, &target, vec!["pedidos".to_string()])
            .with_rules(rules)
            .with_batch_size(10);

        let summary = migrator.run().await.unwrap();

        assert!(summary.all_completed());
        // o pedido de valor 0 é filtrado pela regra da tabela
        assert_eq!(count(&target, "pedidos").await, 2);
    }

    #[tokio::test]
    async fn test_missing_target_table_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let source = seed_source(&dir).await;
        let target = seed_target(&dir).await;

        let migrator = Migrator::new(
            &source,
            &target,
            vec!["clientes".to_string(), "nao_existe".to_string()],
        )
        .with_batch_size(10);

        let summary = migrator.run().await.unwrap();

        assert_eq!(summary.tables_completed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].table, "nao_existe");
        assert!(!summary.all_completed());
    }

    #[tokio::test]
    async fn test_invalid_table_identifier_rejected() {
        let migrator = Migrator::new(
            "sqlite::memory:",
            "sqlite::memory:",
            vec!["ok; DROP TABLE x".to_string()],
        );
        assert!(migrator.run().await.is_err());
    }
}
