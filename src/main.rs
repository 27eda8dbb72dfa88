use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fluxrs::config::ConfigOverrides;
use fluxrs::pipeline::ConfiguredPipeline;
use fluxrs::types::PipelineOutcome;
use fluxrs::{FluxConfig, Migrator};

/// Pipelines de dados dirigidos por configuração
#[derive(Parser)]
#[command(name = "fluxrs", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Executa um pipeline de extração, transformação, validação e carga
    Run(RunArgs),
    /// Copia tabelas em lote entre dois bancos de dados
    Migrate(MigrateArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Arquivo de configuração (YAML, TOML ou JSON)
    #[arg(long)]
    config: PathBuf,

    /// Sobrescreve o tipo da fonte (csv, json, database, api, s3, sftp)
    #[arg(long)]
    source: Option<String>,

    /// Sobrescreve o tipo do destino (csv, json, database, api, s3)
    #[arg(long)]
    target: Option<String>,

    /// Sobrescreve o tamanho de página/lote
    #[arg(long)]
    batch_size: Option<usize>,

    /// Executa em páginas em vez de uma extração única
    #[arg(long)]
    paged: bool,

    /// Apenas valida a configuração, sem executar
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct MigrateArgs {
    /// Arquivo de configuração (YAML, TOML ou JSON)
    #[arg(long)]
    config: PathBuf,

    /// Tabelas a migrar (sobrescreve a seção migration da configuração)
    #[arg(long, num_args = 1..)]
    tables: Option<Vec<String>>,

    /// Sobrescreve o tamanho de lote da cópia
    #[arg(long)]
    batch_size: Option<usize>,

    /// Sobrescreve o número máximo de workers
    #[arg(long)]
    max_workers: Option<usize>,

    /// Apenas valida a configuração, sem executar
    #[arg(long)]
    dry_run: bool,
}

async fn run_pipeline(args: RunArgs) -> ExitCode {
    let overrides = ConfigOverrides {
        source_type: args.source,
        destination_type: args.target,
        batch_size: args.batch_size,
        ..Default::default()
    };

    let config = match FluxConfig::from_file_with_overrides(&args.config, &overrides) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuração inválida");
            return ExitCode::from(1);
        }
    };

    if args.dry_run {
        info!("Configuração válida; nada foi executado (--dry-run)");
        return ExitCode::SUCCESS;
    }

    let pipeline = match ConfiguredPipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "Falha ao montar o pipeline");
            return ExitCode::from(1);
        }
    };

    let outcome = if args.paged {
        pipeline.run_paged().await
    } else {
        pipeline.run().await
    };

    match outcome {
        Ok(result) if result.outcome == PipelineOutcome::Completed => {
            info!(
                rows = result.rows_loaded,
                elapsed_ms = result.execution_time_ms,
                "Pipeline concluído com sucesso"
            );
            ExitCode::SUCCESS
        }
        Ok(_) => {
            warn!("Pipeline encerrado sem dados para carregar");
            ExitCode::from(1)
        }
        Err(e) => {
            error!(error = %e, code = e.error_code(), "Pipeline falhou");
            ExitCode::from(1)
        }
    }
}

async fn run_migration(args: MigrateArgs) -> ExitCode {
    let overrides = ConfigOverrides {
        batch_size: args.batch_size,
        max_workers: args.max_workers,
        tables: args.tables,
        ..Default::default()
    };

    let config = match FluxConfig::from_file_with_overrides(&args.config, &overrides) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuração inválida");
            return ExitCode::from(1);
        }
    };

    if args.dry_run {
        info!("Configuração válida; nada foi executado (--dry-run)");
        return ExitCode::SUCCESS;
    }

    let migrator = match Migrator::from_config(&config) {
        Ok(migrator) => migrator,
        Err(e) => {
            error!(error = %e, "Falha ao montar a migração");
            return ExitCode::from(1);
        }
    };

    match migrator.run().await {
        Ok(summary) if summary.all_completed() => {
            info!(
                tables = summary.tables_completed,
                rows = summary.rows_migrated,
                "Migração concluída com sucesso"
            );
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            for failure in &summary.failures {
                error!(table = %failure.table, error = %failure.error, "Tabela não migrada");
            }
            ExitCode::from(1)
        }
        Err(e) => {
            error!(error = %e, code = e.error_code(), "Migração falhou");
            ExitCode::from(1)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run_pipeline(args).await,
        Command::Migrate(args) => run_migration(args).await,
    }
}
