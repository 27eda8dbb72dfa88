//! Carregador em memória, usado em testes e depuração

use async_trait::async_trait;
use crate::error::Result;
use crate::types::{Batch, DataRow};
use crate::traits::Loader;

/// Carregador que acumula lotes em memória
///
/// Os dados ficam atrás de Arc<Mutex<>>, então clones do loader enxergam
/// o mesmo acumulado.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    data: std::sync::Arc<std::sync::Mutex<Vec<DataRow>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtém uma cópia dos dados armazenados
    pub fn get_data(&self) -> Vec<DataRow> {
        self.data.lock().unwrap().clone()
    }

    /// Limpa todos os dados armazenados
    pub fn clear(&self) {
        self.data.lock().unwrap().clear();
    }

    /// Número de registros armazenados
    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl Loader for MemoryLoader {
    async fn load(&self, data: Batch) -> Result<usize> {
        let written = data.len();
        self.data.lock().unwrap().extend(data);
        Ok(written)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.data.try_lock().is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataValue;

    #[tokio::test]
    async fn test_memory_loader_accumulates() {
        let loader = MemoryLoader::new();

        let mut row1 = DataRow::new();
        row1.insert("id".to_string(), DataValue::Integer(1));
        assert_eq!(loader.load(vec![row1]).await.unwrap(), 1);

        let mut row2 = DataRow::new();
        row2.insert("id".to_string(), DataValue::Integer(2));
        assert_eq!(loader.load(vec![row2]).await.unwrap(), 1);

        assert_eq!(loader.len(), 2);
        assert!(!loader.is_empty());

        loader.clear();
        assert!(loader.is_empty());
    }

    #[tokio::test]
    async fn test_memory_loader_shared_between_clones() {
        let loader = MemoryLoader::new();
        let clone = loader.clone();

        let mut row = DataRow::new();
        row.insert("id".to_string(), DataValue::Integer(1));
        loader.load(vec![row]).await.unwrap();

        assert_eq!(clone.len(), 1);
    }
}
