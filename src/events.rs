//! Sistema de eventos para observabilidade do pipeline

use async_trait::async_trait;
use crate::error::Result;
use crate::traits::EventEmitter;
use crate::types::PipelineEvent;
use tracing::{info, error, warn};

/// Implementação simples de EventEmitter que logga eventos
#[derive(Debug, Clone, Default)]
pub struct LoggingEventEmitter;

impl LoggingEventEmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventEmitter for LoggingEventEmitter {
    async fn emit(&self, event: PipelineEvent) -> Result<()> {
        match event {
            PipelineEvent::Started { pipeline_id, timestamp } => {
                info!(
                    pipeline_id = %pipeline_id,
                    timestamp = ?timestamp,
                    "Pipeline iniciado"
                );
            }
            PipelineEvent::StateChanged {
                pipeline_id,
                old_state,
                new_state,
                timestamp,
            } => {
                info!(
                    pipeline_id = %pipeline_id,
                    old_state = %old_state,
                    new_state = %new_state,
                    timestamp = ?timestamp,
                    "Estado do pipeline alterado"
                );
            }
            PipelineEvent::BatchProcessed {
                pipeline_id,
                batch_number,
                rows_count,
                timestamp,
            } => {
                info!(
                    pipeline_id = %pipeline_id,
                    batch_number = batch_number,
                    rows_count = rows_count,
                    timestamp = ?timestamp,
                    "Lote processado"
                );
            }
            PipelineEvent::ValidationFinished { pipeline_id, report, timestamp } => {
                if report.passed {
                    info!(
                        pipeline_id = %pipeline_id,
                        checks = report.results.len(),
                        timestamp = ?timestamp,
                        "Validação concluída sem falhas"
                    );
                } else {
                    warn!(
                        pipeline_id = %pipeline_id,
                        checks = report.results.len(),
                        failures = report.failures().len(),
                        timestamp = ?timestamp,
                        "Validação concluída com falhas"
                    );
                }
            }
            PipelineEvent::Error { pipeline_id, error, timestamp } => {
                error!(
                    pipeline_id = %pipeline_id,
                    error = %error,
                    timestamp = ?timestamp,
                    "Erro no pipeline"
                );
            }
            PipelineEvent::Completed { pipeline_id, result, timestamp } => {
                info!(
                    pipeline_id = %pipeline_id,
                    rows_extracted = result.rows_extracted,
                    rows_loaded = result.rows_loaded,
                    execution_time_ms = result.execution_time_ms,
                    outcome = ?result.outcome,
                    timestamp = ?timestamp,
                    "Pipeline concluído"
                );
            }
        }

        Ok(())
    }
}

/// EventEmitter que armazena eventos em memória para testes
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventEmitter {
    events: std::sync::Arc<std::sync::Mutex<Vec<PipelineEvent>>>,
}

impl InMemoryEventEmitter {
    pub fn new() -> Self {
        Self {
            events: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Retorna todos os eventos capturados
    pub fn get_events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Limpa todos os eventos armazenados
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Retorna o número de eventos capturados
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl EventEmitter for InMemoryEventEmitter {
    async fn emit(&self, event: PipelineEvent) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
