use async_trait::async_trait;
use crate::error::Result;
use crate::types::{Batch, DataRow, ValidationReport};

/// Trait para componentes que extraem dados
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extrai todos os dados da fonte em um único lote
    async fn extract(&self) -> Result<Batch>;

    /// Extrai a próxima página de dados (fontes paginadas)
    ///
    /// A implementação padrão lê tudo e devolve apenas a primeira página;
    /// fontes grandes (banco de dados) mantêm um cursor interno.
    async fn extract_page(&self, page_size: usize) -> Result<Batch> {
        let data = self.extract().await?;
        Ok(data.into_iter().take(page_size).collect())
    }

    /// Verifica se há mais páginas disponíveis
    async fn has_more(&self) -> Result<bool> {
        Ok(false)
    }

    /// Reposiciona o cursor interno para reprocessamento
    async fn reset(&self) -> Result<()> {
        Ok(())
    }
}

/// Trait para componentes que transformam dados
///
/// Um passo recebe a posse do lote e devolve o lote resultante; dois
/// estágios nunca seguram o mesmo lote ao mesmo tempo.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Transforma um lote de dados
    async fn transform(&self, data: Batch) -> Result<Batch>;
}

/// Trait para componentes que validam a qualidade de um lote
///
/// A validação nunca muta os dados e nunca decide abortar; ela apenas
/// produz o relatório.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Executa todos os checks configurados contra o lote
    async fn validate(&self, data: &[DataRow]) -> Result<ValidationReport>;
}

/// Trait para componentes que carregam dados
#[async_trait]
pub trait Loader: Send + Sync {
    /// Grava um lote no destino, devolvendo o número de linhas escritas
    async fn load(&self, data: Batch) -> Result<usize>;

    /// Finaliza o carregamento (flush, commit, etc.)
    async fn finalize(&self) -> Result<()> {
        Ok(())
    }

    /// Verifica se o destino está disponível
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Trait para emissão de eventos do pipeline
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emite um evento do pipeline
    async fn emit(&self, event: crate::types::PipelineEvent) -> Result<()>;
}

// Delegações para componentes construídos dinamicamente a partir de
// descritores de configuração.

#[async_trait]
impl Extractor for Box<dyn Extractor> {
    async fn extract(&self) -> Result<Batch> {
        (**self).extract().await
    }

    async fn extract_page(&self, page_size: usize) -> Result<Batch> {
        (**self).extract_page(page_size).await
    }

    async fn has_more(&self) -> Result<bool> {
        (**self).has_more().await
    }

    async fn reset(&self) -> Result<()> {
        (**self).reset().await
    }
}

#[async_trait]
impl Transformer for Box<dyn Transformer> {
    async fn transform(&self, data: Batch) -> Result<Batch> {
        (**self).transform(data).await
    }
}

#[async_trait]
impl Validator for Box<dyn Validator> {
    async fn validate(&self, data: &[DataRow]) -> Result<ValidationReport> {
        (**self).validate(data).await
    }
}

#[async_trait]
impl Loader for Box<dyn Loader> {
    async fn load(&self, data: Batch) -> Result<usize> {
        (**self).load(data).await
    }

    async fn finalize(&self) -> Result<()> {
        (**self).finalize().await
    }

    async fn health_check(&self) -> Result<bool> {
        (**self).health_check().await
    }
}
