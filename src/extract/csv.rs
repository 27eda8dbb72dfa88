use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::config::CsvSourceConfig;
use crate::error::{ExtractError, FluxError, Result};
use crate::types::{Batch, DataRow, DataValue};
use crate::traits::Extractor;

/// Extrator para arquivos CSV
#[derive(Debug)]
pub struct CsvExtractor {
    file_path: String,
    delimiter: u8,
    has_headers: bool,
    cursor: AtomicUsize,
}

impl CsvExtractor {
    /// Cria um novo extrator CSV
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_string_lossy().to_string(),
            delimiter: b',',
            has_headers: true,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Constrói a partir do descritor de configuração
    pub fn from_config(config: &CsvSourceConfig) -> Self {
        Self {
            file_path: config.file_path.clone(),
            delimiter: config.delimiter as u8,
            has_headers: config.has_headers,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Define o delimitador
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Define se tem cabeçalhos
    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    fn open(&self) -> Result<std::fs::File> {
        std::fs::File::open(&self.file_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FluxError::Extract(ExtractError::FileNotFound(self.file_path.clone()))
            } else {
                FluxError::Io(e)
            }
        })
    }
}

/// Interpreta um campo CSV como o tipo nativo mais específico possível
pub(crate) fn parse_field(value: &str) -> DataValue {
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return DataValue::Null;
    }

    if let Ok(int_val) = value.parse::<i64>() {
        return DataValue::Integer(int_val);
    }

    if let Ok(float_val) = value.parse::<f64>() {
        return DataValue::Float(float_val);
    }

    match value.to_lowercase().as_str() {
        "true" | "yes" | "y" => return DataValue::Boolean(true),
        "false" | "no" | "n" => return DataValue::Boolean(false),
        _ => {}
    }

    DataValue::String(value.to_string())
}

/// Lê um CSV completo a partir de qualquer leitor
pub(crate) fn parse_csv_reader(
    reader: impl std::io::Read,
    delimiter: u8,
    has_headers: bool,
) -> Result<Batch> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .from_reader(reader);

    let mut rows = Batch::new();

    if has_headers {
        let headers = csv_reader.headers()?.clone();

        for result in csv_reader.records() {
            let record = result?;
            let mut row = DataRow::new();

            for (i, field) in record.iter().enumerate() {
                if let Some(header) = headers.get(i) {
                    row.insert(header.to_string(), parse_field(field));
                }
            }

            rows.push(row);
        }
    } else {
        for result in csv_reader.records() {
            let record = result?;
            let mut row = DataRow::new();

            for (i, field) in record.iter().enumerate() {
                row.insert(format!("column_{}", i), parse_field(field));
            }

            rows.push(row);
        }
    }

    Ok(rows)
}

#[async_trait]
impl Extractor for CsvExtractor {
    async fn extract(&self) -> Result<Batch> {
        let file = self.open()?;
        let reader = std::io::BufReader::new(file);
        parse_csv_reader(reader, self.delimiter, self.has_headers)
    }

    async fn extract_page(&self, page_size: usize) -> Result<Batch> {
        let offset = self.cursor.fetch_add(page_size, Ordering::SeqCst);
        let all_data = self.extract().await?;
        Ok(all_data.into_iter().skip(offset).take(page_size).collect())
    }

    async fn has_more(&self) -> Result<bool> {
        let total = self.extract().await?.len();
        Ok(self.cursor.load(Ordering::SeqCst) < total)
    }

    async fn reset(&self) -> Result<()> {
        self.cursor.store(0, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_csv_extractor() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "name,age,active").unwrap();
        writeln!(temp_file, "Alice,30,true").unwrap();
        writeln!(temp_file, "Bob,25,false").unwrap();

        let extractor = CsvExtractor::new(temp_file.path());
        let result = extractor.extract().await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].get("name"), Some(&DataValue::String("Alice".to_string())));
        assert_eq!(result[0].get("age"), Some(&DataValue::Integer(30)));
        assert_eq!(result[0].get("active"), Some(&DataValue::Boolean(true)));
    }

    #[tokio::test]
    async fn test_csv_extractor_without_headers() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Alice,30,true").unwrap();

        let extractor = CsvExtractor::new(temp_file.path()).with_headers(false);
        let result = extractor.extract().await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].get("column_0"), Some(&DataValue::String("Alice".to_string())));
        assert_eq!(result[0].get("column_1"), Some(&DataValue::Integer(30)));
    }

    #[tokio::test]
    async fn test_csv_extractor_custom_delimiter() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "name;age").unwrap();
        writeln!(temp_file, "Alice;30").unwrap();

        let extractor = CsvExtractor::new(temp_file.path()).with_delimiter(b';');
        let result = extractor.extract().await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].get("name"), Some(&DataValue::String("Alice".to_string())));
    }

    #[tokio::test]
    async fn test_empty_fields_become_null() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "name,age").unwrap();
        writeln!(temp_file, "Alice,").unwrap();
        writeln!(temp_file, "null,30").unwrap();

        let extractor = CsvExtractor::new(temp_file.path());
        let result = extractor.extract().await.unwrap();

        assert_eq!(result[0].get("age"), Some(&DataValue::Null));
        assert_eq!(result[1].get("name"), Some(&DataValue::Null));
    }

    #[tokio::test]
    async fn test_missing_file_is_extract_error() {
        let extractor = CsvExtractor::new("/caminho/que/nao/existe.csv");
        let err = extractor.extract().await.unwrap_err();
        assert!(matches!(
            err,
            FluxError::Extract(ExtractError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_paged_extraction_advances_cursor() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "id").unwrap();
        for i in 0..5 {
            writeln!(temp_file, "{}", i).unwrap();
        }

        let extractor = CsvExtractor::new(temp_file.path());

        let page1 = extractor.extract_page(2).await.unwrap();
        let page2 = extractor.extract_page(2).await.unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page2.len(), 2);
        assert_eq!(page1[0].get("id"), Some(&DataValue::Integer(0)));
        assert_eq!(page2[0].get("id"), Some(&DataValue::Integer(2)));

        assert!(extractor.has_more().await.unwrap());
        let page3 = extractor.extract_page(2).await.unwrap();
        assert_eq!(page3.len(), 1);
        assert!(!extractor.has_more().await.unwrap());

        extractor.reset().await.unwrap();
        assert!(extractor.has_more().await.unwrap());
    }
}
