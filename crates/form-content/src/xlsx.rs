use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde_json::Value;

use crate::export::{SheetTable, TabularWriter, WriterError};

/// Writes exported sheets into an `.xlsx` workbook.
pub struct XlsxWriter {
    workbook: Workbook,
}

impl XlsxWriter {
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
        }
    }
}

impl Default for XlsxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl From<XlsxError> for WriterError {
    fn from(err: XlsxError) -> Self {
        WriterError::Backend(err.to_string())
    }
}

impl TabularWriter for XlsxWriter {
    fn write_table(&mut self, table: &SheetTable) -> Result<(), WriterError> {
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&table.name)?;
        for (index, column) in table.header.iter().enumerate() {
            worksheet.write_string(0, column_index(table, index)?, column)?;
        }
        for (row_index, row) in table.rows.iter().enumerate() {
            let row_number = u32::try_from(row_index + 1).map_err(|_| WriterError::OutOfBounds {
                sheet: table.name.clone(),
                detail: format!("row {row_index}"),
            })?;
            for (index, value) in row.iter().enumerate() {
                if let Some(value) = value {
                    write_value(worksheet, row_number, column_index(table, index)?, value)?;
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, WriterError> {
        Ok(self.workbook.save_to_buffer()?)
    }
}

fn column_index(table: &SheetTable, index: usize) -> Result<u16, WriterError> {
    u16::try_from(index).map_err(|_| WriterError::OutOfBounds {
        sheet: table.name.clone(),
        detail: format!("column {index}"),
    })
}

fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    column: u16,
    value: &Value,
) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(flag) => {
            worksheet.write_boolean(row, column, *flag)?;
        }
        Value::Number(number) => match number.as_f64() {
            Some(number) => {
                worksheet.write_number(row, column, number)?;
            }
            None => {
                worksheet.write_string(row, column, number.to_string())?;
            }
        },
        Value::String(text) => {
            worksheet.write_string(row, column, text)?;
        }
        nested => {
            worksheet.write_string(row, column, nested.to_string())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_a_zip_container() {
        let table = SheetTable {
            name: "survey".into(),
            header: vec!["type".into(), "name".into(), "required".into()],
            rows: vec![vec![Some(json!("text")), Some(json!("q1")), Some(json!(true))]],
        };
        let mut writer = XlsxWriter::new();
        writer.write_table(&table).expect("write table");
        let bytes = writer.finish().expect("finish");
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn rejects_invalid_sheet_names() {
        let table = SheetTable {
            name: "bad[name]".into(),
            header: Vec::new(),
            rows: Vec::new(),
        };
        let err = XlsxWriter::new()
            .write_table(&table)
            .expect_err("brackets are not allowed in sheet names");
        assert!(matches!(err, WriterError::Backend(_)));
    }
}
