use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use crate::config::{DatabaseSinkConfig, IfExists};
use crate::error::{ConfigError, FluxError, LoadError, Result};
use crate::extract::database::ensure_drivers;
use crate::load::column_union;
use crate::types::{Batch, DataValue};
use crate::traits::Loader;

/// Valida que o nome pode ser interpolado em SQL como identificador
pub(crate) fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Carregador para tabelas de banco de dados
///
/// A política `if_exists` governa a colisão com dados pré-existentes e é
/// aplicada uma única vez por execução, antes do primeiro lote; lotes
/// subsequentes da mesma execução sempre anexam.
#[derive(Debug)]
pub struct DatabaseLoader {
    connection_string: String,
    table_name: String,
    if_exists: IfExists,
    prepared: AtomicBool,
}

impl DatabaseLoader {
    pub fn new(
        connection_string: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Result<Self> {
        let table_name = table_name.into();
        if !is_sql_identifier(&table_name) {
            return Err(FluxError::Config(ConfigError::InvalidValue {
                param: "table_name".to_string(),
                value: table_name,
            }));
        }

        Ok(Self {
            connection_string: connection_string.into(),
            table_name,
            if_exists: IfExists::Append,
            prepared: AtomicBool::new(false),
        })
    }

    /// Constrói a partir do descritor de configuração
    pub fn from_config(config: &DatabaseSinkConfig) -> Result<Self> {
        let mut loader = Self::new(&config.connection_string, &config.table_name)?;
        loader.if_exists = config.if_exists;
        Ok(loader)
    }

    pub fn with_if_exists(mut self, policy: IfExists) -> Self {
        self.if_exists = policy;
        self
    }

    async fn connect(&self) -> Result<AnyPool> {
        ensure_drivers();
        AnyPoolOptions::new()
            .max_connections(1)
            .connect(&self.connection_string)
            .await
            .map_err(|e| FluxError::Load(LoadError::DestinationConnection(e.to_string())))
    }

    fn placeholder(&self, index: usize) -> String {
        // driver Any não traduz placeholders; o estilo segue o backend
        if self.connection_string.starts_with("postgres") {
            format!("${}", index)
        } else {
            "?".to_string()
        }
    }

    async fn apply_if_exists(&self, pool: &AnyPool) -> Result<()> {
        if self.prepared.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        match self.if_exists {
            IfExists::Append => Ok(()),
            IfExists::Replace => {
                sqlx::query(&format!("DELETE FROM {}", self.table_name))
                    .execute(pool)
                    .await
                    .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))?;
                Ok(())
            }
            IfExists::Fail => {
                let row: (i64,) =
                    sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table_name))
                        .fetch_one(pool)
                        .await
                        .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))?;
                if row.0 > 0 {
                    return Err(FluxError::Load(LoadError::DataConflict(format!(
                        "tabela '{}' já contém {} linha(s)",
                        self.table_name, row.0
                    ))));
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Loader for DatabaseLoader {
    async fn load(&self, data: Batch) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        let pool = self.connect().await?;
        self.apply_if_exists(&pool).await?;

        let columns = column_union(&data);
        for column in &columns {
            if !is_sql_identifier(column) {
                return Err(FluxError::Load(LoadError::WriteError(format!(
                    "nome de coluna inválido para SQL: '{}'",
                    column
                ))));
            }
        }

        let placeholders: Vec<String> = (1..=columns.len())
            .map(|i| self.placeholder(i))
            .collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_name,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))?;

        for row in &data {
            let mut query = sqlx::query(&insert_sql);
            for column in &columns {
                // coluna ausente na linha é gravada como null
                query = match row.get(column).unwrap_or(&DataValue::Null) {
                    DataValue::Null => query.bind(Option::<String>::None),
                    DataValue::Boolean(b) => query.bind(*b),
                    DataValue::Integer(i) => query.bind(*i),
                    DataValue::Float(f) => query.bind(*f),
                    DataValue::String(s) => query.bind(s.clone()),
                    DataValue::Timestamp(ts) => query.bind(ts.to_rfc3339()),
                };
            }

            query
                .execute(&mut *tx)
                .await
                .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))?;
        }

        tx.commit()
            .await
            .map_err(|e| FluxError::Load(LoadError::WriteError(e.to_string())))?;
        pool.close().await;

        Ok(data.len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.connect().await.is_ok())
    }
}
