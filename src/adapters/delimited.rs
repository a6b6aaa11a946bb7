use crate::utils::encoding::TextEncoding;
use crate::utils::error::{EtlError, Result};
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

/// Layout of the `;`-separated, fully quoted files exchanged between jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedFormat {
    pub delimiter: u8,
    pub quote: u8,
    pub encoding: TextEncoding,
}

impl Default for DelimitedFormat {
    fn default() -> Self {
        Self {
            delimiter: b';',
            quote: b'"',
            encoding: TextEncoding::Latin1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str, file: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| EtlError::MissingColumnError {
                column: name.to_string(),
                file: file.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl DelimitedFormat {
    pub fn with_encoding(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            ..Self::default()
        }
    }

    /// Parses a whole file. The first record is the header; rows may have
    /// any number of fields.
    pub fn read_table(&self, data: &[u8]) -> Result<Table> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut table = Table::default();
        let mut records = reader.byte_records();

        if let Some(header) = records.next() {
            table.header = self.decode_record(&header?);
        }

        for record in records {
            table.rows.push(self.decode_record(&record?));
        }

        tracing::debug!(
            "Parsed {} columns, {} rows",
            table.header.len(),
            table.rows.len()
        );
        Ok(table)
    }

    fn decode_record(&self, record: &csv::ByteRecord) -> Vec<String> {
        record
            .iter()
            .map(|field| self.encoding.decode(field))
            .collect()
    }

    pub fn write_table<H, R, F>(&self, header: &[H], rows: R) -> Result<Vec<u8>>
    where
        H: AsRef<str>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = F>,
        F: AsRef<str>,
    {
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(header.iter().map(|h| self.encoding.encode(h.as_ref())))?;
        for row in rows {
            writer.write_record(row.into_iter().map(|f| self.encoding.encode(f.as_ref())))?;
        }

        writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))
    }
}
