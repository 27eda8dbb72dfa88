use async_trait::async_trait;
use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use crate::config::{FileFormat, SftpSourceConfig};
use crate::error::{ExtractError, FluxError, Result};
use crate::extract::parse_bytes;
use crate::types::Batch;
use crate::traits::Extractor;

/// Extrator para arquivos em servidores SFTP
///
/// O handshake SSH e a leitura são síncronos (ssh2); rodam em uma thread
/// de bloqueio para não prender o runtime.
#[derive(Debug, Clone)]
pub struct SftpExtractor {
    host: String,
    port: u16,
    username: String,
    password: String,
    remote_path: String,
    format: FileFormat,
}

impl SftpExtractor {
    /// Constrói a partir do descritor de configuração
    pub fn from_config(config: &SftpSourceConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            remote_path: config.remote_path.clone(),
            format: config.format,
        }
    }

    fn download_blocking(&self) -> Result<Vec<u8>> {
        let address = format!("{}:{}", self.host, self.port);
        let tcp = TcpStream::connect(&address).map_err(|e| {
            FluxError::Extract(ExtractError::Connection(format!(
                "falha ao conectar em {}: {}",
                address, e
            )))
        })?;

        let mut session = ssh2::Session::new().map_err(|e| {
            FluxError::Extract(ExtractError::Connection(e.to_string()))
        })?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| {
            FluxError::Extract(ExtractError::Connection(format!(
                "handshake SSH com {} falhou: {}",
                address, e
            )))
        })?;

        session
            .userauth_password(&self.username, &self.password)
            .map_err(|e| {
                FluxError::Extract(ExtractError::Connection(format!(
                    "autenticação SSH falhou: {}",
                    e
                )))
            })?;

        let sftp = session.sftp().map_err(|e| {
            FluxError::Extract(ExtractError::Connection(e.to_string()))
        })?;

        let mut file = sftp.open(Path::new(&self.remote_path)).map_err(|e| {
            FluxError::Extract(ExtractError::FileNotFound(format!(
                "{} em {}: {}",
                self.remote_path, address, e
            )))
        })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(FluxError::Io)?;
        Ok(bytes)
    }
}

#[async_trait]
impl Extractor for SftpExtractor {
    async fn extract(&self) -> Result<Batch> {
        let this = self.clone();
        let bytes = tokio::task::spawn_blocking(move || this.download_blocking())
            .await
            .map_err(|e| FluxError::Pipeline(e.to_string()))??;

        parse_bytes(self.format, &bytes)
    }
}
