use crate::config::{FluxConfig, PipelineOptions};
use crate::error::{FluxError, Result};
use crate::events::LoggingEventEmitter;
use crate::traits::{EventEmitter, Extractor, Loader, Transformer, Validator};
use crate::types::{
    PipelineEvent, PipelineOutcome, PipelineResult, PipelineState, ValidationReport,
};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

/// Orquestrador do pipeline: um extrator, passos ordenados de
/// transformação, um validador e um carregador
///
/// Uma execução percorre Idle → Extracting → Transforming → Validating →
/// (Loading | Aborted) → Done. Estados terminais são finais: não há retry
/// automático de execução; reexecutar é papel de um agendador externo.
pub struct Pipeline<E, T, L> {
    extractor: E,
    transformer: T,
    loader: L,
    validator: Option<Box<dyn Validator>>,
    options: PipelineOptions,
    state: Arc<std::sync::Mutex<PipelineState>>,
    event_emitter: Arc<dyn EventEmitter>,
    pipeline_id: String,
}

impl Pipeline<(), (), ()> {
    /// Cria um novo builder de pipeline
    pub fn builder() -> PipelineBuilder<(), (), ()> {
        PipelineBuilder::new()
    }
}

/// Pipeline montado inteiramente a partir dos descritores de configuração
pub type ConfiguredPipeline = Pipeline<
    Box<dyn Extractor>,
    crate::transform::common::CompositeTransformer,
    Box<dyn Loader>,
>;

impl ConfiguredPipeline {
    /// Monta extrator, passos, validador e carregador a partir da
    /// configuração; adicionar um novo tipo não toca este código
    pub fn from_config(config: &FluxConfig) -> Result<ConfiguredPipeline> {
        let extractor = crate::extract::build_extractor(&config.source, &config.pipeline)?;
        let transformer = crate::transform::build_transformers(&config.transformations)?;
        let validator = crate::validate::CheckValidator::from_config(&config.validation)?;
        let loader = crate::load::build_loader(&config.destination, &config.pipeline)?;

        Ok(Pipeline::builder()
            .extract(extractor)
            .transform(transformer)
            .load(loader)
            .validate(validator)
            .options(config.pipeline.clone())
            .build())
    }
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor,
    T: Transformer,
    L: Loader,
{
    /// Retorna o ID do pipeline
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Retorna o estado atual do pipeline
    pub fn current_state(&self) -> PipelineState {
        self.state.lock().unwrap().clone()
    }

    /// Altera o estado do pipeline e emite evento
    async fn set_state(&self, new_state: PipelineState) -> Result<()> {
        let old_state = {
            let mut state = self.state.lock().unwrap();
            let old = state.clone();
            *state = new_state.clone();
            old
        };

        let event = PipelineEvent::StateChanged {
            pipeline_id: self.pipeline_id.clone(),
            old_state,
            new_state,
            timestamp: SystemTime::now(),
        };

        self.event_emitter.emit(event).await?;
        Ok(())
    }

    /// Marca a execução como abortada e emite o evento de erro
    async fn abort(&self, reason: String) -> Result<()> {
        self.set_state(PipelineState::Aborted(reason.clone())).await?;

        let event = PipelineEvent::Error {
            pipeline_id: self.pipeline_id.clone(),
            error: reason,
            timestamp: SystemTime::now(),
        };
        self.event_emitter.emit(event).await?;
        Ok(())
    }

    async fn emit_completed(&self, result: &PipelineResult) -> Result<()> {
        let event = PipelineEvent::Completed {
            pipeline_id: self.pipeline_id.clone(),
            result: result.clone(),
            timestamp: SystemTime::now(),
        };
        self.event_emitter.emit(event).await
    }

    /// Valida o lote e decide, pela política configurada, se a execução
    /// continua; devolve o relatório para o resultado final
    async fn run_validation(&self, data: &[crate::types::DataRow]) -> Result<Option<ValidationReport>> {
        let validator = match &self.validator {
            Some(v) => v,
            None => return Ok(None),
        };

        let report = validator.validate(data).await?;

        let event = PipelineEvent::ValidationFinished {
            pipeline_id: self.pipeline_id.clone(),
            report: report.clone(),
            timestamp: SystemTime::now(),
        };
        self.event_emitter.emit(event).await?;

        if !report.passed {
            tracing::warn!(
                failures = report.failures().len(),
                "Validação de qualidade falhou"
            );
            if self.options.stop_on_validation_error {
                let detail: Vec<String> = report
                    .failures()
                    .iter()
                    .map(|f| format!("{}: {}", f.kind, f.detail))
                    .collect();
                let reason = detail.join("; ");
                self.abort(format!("validação falhou ({})", reason)).await?;
                return Err(FluxError::Validation(reason));
            }
            tracing::warn!("stop_on_validation_error=false; prosseguindo para a carga");
        }

        Ok(Some(report))
    }

    /// Executa o pipeline completo: extração única, transformação,
    /// validação e carga
    pub async fn run(&self) -> Result<PipelineResult> {
        let start_time = Instant::now();
        let mut result = PipelineResult::new();

        let start_event = PipelineEvent::Started {
            pipeline_id: self.pipeline_id.clone(),
            timestamp: SystemTime::now(),
        };
        self.event_emitter.emit(start_event).await?;

        tracing::info!(pipeline_id = %self.pipeline_id, "Iniciando execução do pipeline");

        if !self.loader.health_check().await? {
            let reason = "health check do destino falhou".to_string();
            self.abort(reason.clone()).await?;
            return Err(FluxError::Pipeline(reason));
        }

        // Extração
        self.set_state(PipelineState::Extracting).await?;
        let batch = match self.extractor.extract().await {
            Ok(data) => {
                tracing::info!("Extraídos {} registros", data.len());
                data
            }
            Err(e) => {
                self.abort(format!("erro na extração: {}", e)).await?;
                return Err(e);
            }
        };
        result.rows_extracted = batch.len();

        // Lote vazio aborta com desfecho "sem dados"; não é um erro e
        // nenhum estágio seguinte é invocado
        if batch.is_empty() {
            tracing::warn!("Nenhum dado extraído, pipeline encerrado");
            self.set_state(PipelineState::Aborted("nenhum dado extraído".to_string()))
                .await?;
            result.outcome = PipelineOutcome::NoData;
            result.execution_time_ms = start_time.elapsed().as_millis() as u64;
            self.emit_completed(&result).await?;
            return Ok(result);
        }

        // Transformação
        self.set_state(PipelineState::Transforming).await?;
        let batch = match self.transformer.transform(batch).await {
            Ok(data) => {
                tracing::info!("Transformados {} registros", data.len());
                data
            }
            Err(e) => {
                self.abort(format!("erro na transformação: {}", e)).await?;
                return Err(e);
            }
        };

        // Validação
        self.set_state(PipelineState::Validating).await?;
        result.validation = self.run_validation(&batch).await?;

        // Carga
        self.set_state(PipelineState::Loading).await?;
        let loaded = match self.loader.load(batch).await {
            Ok(rows) => {
                tracing::info!("Carregados {} registros", rows);
                rows
            }
            Err(e) => {
                self.abort(format!("erro no carregamento: {}", e)).await?;
                return Err(e);
            }
        };
        self.loader.finalize().await?;

        result.rows_loaded = loaded;
        result.execution_time_ms = start_time.elapsed().as_millis() as u64;

        self.set_state(PipelineState::Done).await?;
        self.emit_completed(&result).await?;

        tracing::info!(
            rows = result.rows_loaded,
            elapsed_ms = result.execution_time_ms,
            "Pipeline executado com sucesso"
        );

        Ok(result)
    }

    /// Executa o pipeline em páginas de tamanho configurável
    ///
    /// Cada página percorre transformação, validação e carga antes da
    /// próxima ser extraída; não há sobreposição entre estágios.
    pub async fn run_paged(&self) -> Result<PipelineResult> {
        let page_size = self.options.batch_size;
        let start_time = Instant::now();
        let mut result = PipelineResult::new();
        let mut combined = ValidationReport::new();
        let mut batch_number = 0usize;

        let start_event = PipelineEvent::Started {
            pipeline_id: self.pipeline_id.clone(),
            timestamp: SystemTime::now(),
        };
        self.event_emitter.emit(start_event).await?;

        tracing::info!(page_size = page_size, "Iniciando execução paginada do pipeline");

        if !self.loader.health_check().await? {
            let reason = "health check do destino falhou".to_string();
            self.abort(reason.clone()).await?;
            return Err(FluxError::Pipeline(reason));
        }

        loop {
            self.set_state(PipelineState::Extracting).await?;
            let page = match self.extractor.extract_page(page_size).await {
                Ok(data) => data,
                Err(e) => {
                    self.abort(format!("erro na extração: {}", e)).await?;
                    return Err(e);
                }
            };

            if page.is_empty() {
                break;
            }

            batch_number += 1;
            result.rows_extracted += page.len();

            self.set_state(PipelineState::Transforming).await?;
            let page = match self.transformer.transform(page).await {
                Ok(data) => data,
                Err(e) => {
                    self.abort(format!("erro na transformação: {}", e)).await?;
                    return Err(e);
                }
            };

            self.set_state(PipelineState::Validating).await?;
            if let Some(report) = self.run_validation(&page).await? {
                if !report.passed {
                    combined.passed = false;
                }
                combined.results.extend(report.results);
            }

            self.set_state(PipelineState::Loading).await?;
            let loaded = match self.loader.load(page).await {
                Ok(rows) => rows,
                Err(e) => {
                    self.abort(format!("erro no carregamento: {}", e)).await?;
                    return Err(e);
                }
            };
            result.rows_loaded += loaded;

            let event = PipelineEvent::BatchProcessed {
                pipeline_id: self.pipeline_id.clone(),
                batch_number,
                rows_count: loaded,
                timestamp: SystemTime::now(),
            };
            self.event_emitter.emit(event).await?;

            if !self.extractor.has_more().await? {
                break;
            }
        }

        self.loader.finalize().await?;

        if batch_number == 0 {
            tracing::warn!("Nenhum dado extraído, pipeline encerrado");
            self.set_state(PipelineState::Aborted("nenhum dado extraído".to_string()))
                .await?;
            result.outcome = PipelineOutcome::NoData;
        } else {
            self.set_state(PipelineState::Done).await?;
            if !combined.results.is_empty() {
                result.validation = Some(combined);
            }
        }

        result.execution_time_ms = start_time.elapsed().as_millis() as u64;
        self.emit_completed(&result).await?;

        Ok(result)
    }
}

/// Builder para criação de pipelines
pub struct PipelineBuilder<E, T, L> {
    extractor: E,
    transformer: T,
    loader: L,
    validator: Option<Box<dyn Validator>>,
    options: PipelineOptions,
    event_emitter: Option<Arc<dyn EventEmitter>>,
}

impl PipelineBuilder<(), (), ()> {
    /// Cria um novo builder
    pub fn new() -> Self {
        Self {
            extractor: (),
            transformer: (),
            loader: (),
            validator: None,
            options: PipelineOptions::default(),
            event_emitter: None,
        }
    }
}

impl Default for PipelineBuilder<(), (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, T, L> PipelineBuilder<E, T, L> {
    /// Define o extrator
    pub fn extract<NewE: Extractor>(self, extractor: NewE) -> PipelineBuilder<NewE, T, L> {
        PipelineBuilder {
            extractor,
            transformer: self.transformer,
            loader: self.loader,
            validator: self.validator,
            options: self.options,
            event_emitter: self.event_emitter,
        }
    }

    /// Define o transformador
    pub fn transform<NewT: Transformer>(self, transformer: NewT) -> PipelineBuilder<E, NewT, L> {
        PipelineBuilder {
            extractor: self.extractor,
            transformer,
            loader: self.loader,
            validator: self.validator,
            options: self.options,
            event_emitter: self.event_emitter,
        }
    }

    /// Define o carregador
    pub fn load<NewL: Loader>(self, loader: NewL) -> PipelineBuilder<E, T, NewL> {
        PipelineBuilder {
            extractor: self.extractor,
            transformer: self.transformer,
            loader,
            validator: self.validator,
            options: self.options,
            event_emitter: self.event_emitter,
        }
    }

    /// Define o validador
    pub fn validate<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Define as opções do pipeline
    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Define o tamanho da página para execução paginada
    pub fn batch_size(mut self, size: usize) -> Self {
        self.options.batch_size = size;
        self
    }

    /// Define a política de aborto em falha de validação
    pub fn stop_on_validation_error(mut self, stop: bool) -> Self {
        self.options.stop_on_validation_error = stop;
        self
    }

    /// Define o event emitter
    pub fn event_emitter<EventEmitterType: EventEmitter + 'static>(
        mut self,
        emitter: EventEmitterType,
    ) -> Self {
        self.event_emitter = Some(Arc::new(emitter));
        self
    }
}

impl<E, T, L> PipelineBuilder<E, T, L>
where
    E: Extractor,
    T: Transformer,
    L: Loader,
{
    /// Constrói o pipeline
    pub fn build(self) -> Pipeline<E, T, L> {
        Pipeline {
            extractor: self.extractor,
            transformer: self.transformer,
            loader: self.loader,
            validator: self.validator,
            options: self.options,
            state: Arc::new(std::sync::Mutex::new(PipelineState::default())),
            event_emitter: self
                .event_emitter
                .unwrap_or_else(|| Arc::new(LoggingEventEmitter::default())),
            pipeline_id: format!(
                "pipeline-{}-{}",
                std::process::id(),
                SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CleanOperations, ConditionValue, FilterCondition, FilterOperator};
    use crate::events::InMemoryEventEmitter;
    use crate::extract::csv::CsvExtractor;
    use crate::load::memory::MemoryLoader;
    use crate::transform::common::{CleanTransform, CompositeTransformer, FilterRowsTransform};
    use crate::types::{DataValue, ValidationReport};
    use crate::validate::CheckValidator;
    use crate::config::ValidationCheck;
    use async_trait::async_trait;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_pipeline_run_end_to_end() {
        // cenário: idade >= 18 sobre [15, 18, 22]
        let file = csv_file(&["age", "15", "18", "22"]);
        let loader = MemoryLoader::new();

        let pipeline = Pipeline::builder()
            .extract(CsvExtractor::new(file.path()))
            .transform(FilterRowsTransform::new(vec![FilterCondition {
                column: "age".to_string(),
                operator: FilterOperator::Ge,
                value: ConditionValue::One(DataValue::Integer(18)),
            }]))
            .load(loader.clone())
            .build();

        let result = pipeline.run().await.unwrap();

        assert_eq!(result.rows_extracted, 3);
        assert_eq!(result.rows_loaded, 2);
        assert!(result.is_completed());
        assert_eq!(pipeline.current_state(), PipelineState::Done);

        let ages: Vec<i64> = loader
            .get_data()
            .iter()
            .map(|r| r.get("age").unwrap().as_integer().unwrap())
            .collect();
        assert_eq!(ages, vec![18, 22]);
    }

    #[tokio::test]
    async fn test_trim_then_dedup_keeps_first_seen() {
        // cenário: [{id:1,name:" Bob "},{id:1,name:"Ann"}] com trim e
        // dedup por id resulta em uma única linha {id:1,name:"Bob"}
        let file = csv_file(&["id,name", "1, Bob ", "1,Ann"]);
        let loader = MemoryLoader::new();

        let transformer = CompositeTransformer::new()
            .add(CleanTransform::new(CleanOperations {
                trim_strings: true,
                ..Default::default()
            }))
            .add(CleanTransform::new(CleanOperations {
                remove_duplicates: true,
                duplicate_subset: Some(vec!["id".to_string()]),
                ..Default::default()
            }));

        let pipeline = Pipeline::builder()
            .extract(CsvExtractor::new(file.path()))
            .transform(transformer)
            .load(loader.clone())
            .build();

        let result = pipeline.run().await.unwrap();
        assert_eq!(result.rows_loaded, 1);

        let data = loader.get_data();
        assert_eq!(data[0].get("id"), Some(&DataValue::Integer(1)));
        assert_eq!(data[0].get("name"), Some(&DataValue::String("Bob".to_string())));
    }

    #[tokio::test]
    async fn test_empty_batch_aborts_without_later_stages() {
        // apenas o cabeçalho: extração vazia
        let file = csv_file(&["id"]);
        let loader = MemoryLoader::new();
        let emitter = InMemoryEventEmitter::new();

        let pipeline = Pipeline::builder()
            .extract(CsvExtractor::new(file.path()))
            .transform(CompositeTransformer::new())
            .load(loader.clone())
            .event_emitter(emitter.clone())
            .build();

        let result = pipeline.run().await.unwrap();

        assert_eq!(result.outcome, PipelineOutcome::NoData);
        assert!(loader.is_empty());
        assert!(matches!(pipeline.current_state(), PipelineState::Aborted(_)));

        // nenhuma transição para Transforming/Validating/Loading
        for event in emitter.get_events() {
            if let crate::types::PipelineEvent::StateChanged { new_state, .. } = event {
                assert!(!matches!(
                    new_state,
                    PipelineState::Transforming
                        | PipelineState::Validating
                        | PipelineState::Loading
                ));
            }
        }
    }

    #[tokio::test]
    async fn test_validation_failure_aborts_by_default() {
        let file = csv_file(&["id", "1", "1"]);
        let loader = MemoryLoader::new();

        let validator = CheckValidator::new(&[ValidationCheck::Unique {
            columns: vec!["id".to_string()],
        }])
        .unwrap();

        let pipeline = Pipeline::builder()
            .extract(CsvExtractor::new(file.path()))
            .transform(CompositeTransformer::new())
            .load(loader.clone())
            .validate(validator)
            .build();

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, FluxError::Validation(_)));
        assert!(loader.is_empty());
        assert!(matches!(pipeline.current_state(), PipelineState::Aborted(_)));
    }

    #[tokio::test]
    async fn test_validation_failure_proceeds_when_policy_allows() {
        let file = csv_file(&["id", "1", "1"]);
        let loader = MemoryLoader::new();

        let validator = CheckValidator::new(&[ValidationCheck::Unique {
            columns: vec!["id".to_string()],
        }])
        .unwrap();

        let pipeline = Pipeline::builder()
            .extract(CsvExtractor::new(file.path()))
            .transform(CompositeTransformer::new())
            .load(loader.clone())
            .validate(validator)
            .stop_on_validation_error(false)
            .build();

        let result = pipeline.run().await.unwrap();

        assert!(result.is_completed());
        assert_eq!(loader.len(), 2);
        let report = result.validation.unwrap();
        assert!(!report.passed);
    }

    #[tokio::test]
    async fn test_extraction_error_is_fatal() {
        let loader = MemoryLoader::new();

        let pipeline = Pipeline::builder()
            .extract(CsvExtractor::new("/caminho/inexistente.csv"))
            .transform(CompositeTransformer::new())
            .load(loader.clone())
            .build();

        assert!(pipeline.run().await.is_err());
        assert!(loader.is_empty());
        assert!(matches!(pipeline.current_state(), PipelineState::Aborted(_)));
    }

    #[tokio::test]
    async fn test_run_paged_processes_all_pages() {
        let file = csv_file(&["id", "0", "1", "2", "3", "4"]);
        let loader = MemoryLoader::new();
        let emitter = InMemoryEventEmitter::new();

        let pipeline = Pipeline::builder()
            .extract(CsvExtractor::new(file.path()))
            .transform(CompositeTransformer::new())
            .load(loader.clone())
            .event_emitter(emitter.clone())
            .batch_size(2)
            .build();

        let result = pipeline.run_paged().await.unwrap();

        assert_eq!(result.rows_loaded, 5);
        assert_eq!(loader.len(), 5);

        let batches = emitter
            .get_events()
            .iter()
            .filter(|e| matches!(e, crate::types::PipelineEvent::BatchProcessed { .. }))
            .count();
        assert_eq!(batches, 3);
    }

    #[tokio::test]
    async fn test_run_paged_empty_source_is_no_data() {
        let file = csv_file(&["id"]);
        let loader = MemoryLoader::new();

        let pipeline = Pipeline::builder()
            .extract(CsvExtractor::new(file.path()))
            .transform(CompositeTransformer::new())
            .load(loader.clone())
            .batch_size(10)
            .build();

        let result = pipeline.run_paged().await.unwrap();
        assert_eq!(result.outcome, PipelineOutcome::NoData);
    }

    #[tokio::test]
    async fn test_pipeline_from_config_end_to_end() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("entrada.csv");
        let output = dir.path().join("saida.json");
        tokio::fs::write(&input, "id,age\n1,15\n2,18\n3,22\n")
            .await
            .unwrap();

        let yaml = format!(
            r#"
source:
  type: csv
  config:
    file_path: "{}"
destination:
  type: json
  config:
    file_path: "{}"
transformations:
  - type: filter_rows
    config:
      conditions:
        - column: age
          operator: ">="
          value: 18
validation:
  checks:
    - type: not_null
      config:
        columns: [id]
"#,
            input.display(),
            output.display()
        );

        let config = crate::config::FluxConfig::from_yaml(&yaml).unwrap();
        let pipeline = ConfiguredPipeline::from_config(&config).unwrap();
        let result = pipeline.run().await.unwrap();

        assert_eq!(result.rows_extracted, 3);
        assert_eq!(result.rows_loaded, 2);
        assert!(result.validation.unwrap().passed);

        let content = tokio::fs::read_to_string(&output).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    struct AlwaysFailValidator;

    #[async_trait]
    impl crate::traits::Validator for AlwaysFailValidator {
        async fn validate(&self, _data: &[crate::types::DataRow]) -> crate::error::Result<ValidationReport> {
            let mut report = ValidationReport::new();
            report.record("custom_fail", false, "sempre falha");
            Ok(report)
        }
    }

    #[tokio::test]
    async fn test_validation_report_reaches_result() {
        let file = csv_file(&["id", "1"]);
        let loader = MemoryLoader::new();

        let pipeline = Pipeline::builder()
            .extract(CsvExtractor::new(file.path()))
            .transform(CompositeTransformer::new())
            .load(loader.clone())
            .validate(AlwaysFailValidator)
            .stop_on_validation_error(false)
            .build();

        let result = pipeline.run().await.unwrap();
        let report = result.validation.unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].kind, "custom_fail");
    }
}
