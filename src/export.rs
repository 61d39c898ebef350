//! Plain-text export of layer attributes, e.g. for pasting into a metadata record.

use std::io::Write;

use crate::error::{GpkgError, Result};
use crate::gpkg::GpkgLayer;
use crate::types::Value;

/// Exports larger than this no longer fit into a metadata text field.
pub const TEXT_EXPORT_LIMIT_BYTES: usize = 32 * 1024;

/// Default number of rows exported.
pub const DEFAULT_MAX_LINES: usize = 500;

/// Write the `columns` of up to `max_lines` features as tab-separated lines.
///
/// There is no header and no quoting. `NULL` becomes an empty field, and tabs
/// and line breaks inside values are replaced by spaces so that every feature
/// stays on one line. Returns the number of bytes written.
pub fn export_text<S, W>(
    layer: &GpkgLayer<'_>,
    columns: &[S],
    max_lines: Option<usize>,
    writer: &mut W,
) -> Result<usize>
where
    S: AsRef<str>,
    W: Write,
{
    for column in columns {
        let column = column.as_ref();
        if !layer.property_columns.iter().any(|spec| spec.name == column) {
            return Err(GpkgError::MissingProperty {
                property: column.to_string(),
            });
        }
    }

    let features = match max_lines {
        Some(n) => layer.features_limited(u32::try_from(n).unwrap_or(u32::MAX))?,
        None => layer.features()?,
    };

    let mut counter = ByteCounter {
        inner: writer,
        bytes: 0,
    };
    {
        let mut tsv = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(&mut counter);
        for feature in features {
            let fields = columns
                .iter()
                .map(|column| format_field(feature.property(column.as_ref()).unwrap_or(Value::Null)));
            tsv.write_record(fields)?;
        }
        tsv.flush()?;
    }
    Ok(counter.bytes)
}

// Counts what actually reaches the underlying writer.
struct ByteCounter<'a, W> {
    inner: &'a mut W,
    bytes: usize,
}

impl<W: Write> Write for ByteCounter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn format_field(value: Value) -> String {
    let text = match value {
        Value::Null | Value::Blob(_) => return String::new(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(v) => v,
        Value::Boolean(v) => v.to_string(),
        Value::Date(v) => v.to_string(),
        Value::DateTime(v) => v.to_string(),
    };
    text.replace(['\t', '\r', '\n'], " ")
}
