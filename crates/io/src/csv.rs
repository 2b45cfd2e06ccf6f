// Delimited-text dump import (CSV, TSV, semicolon or pipe separated)

use std::io::Read;
use std::path::Path;

use capsync_engine::cell::CellValue;
use capsync_engine::sheet::Sheet;

/// Import a delimited dump as a single sheet named `sheet_name`.
///
/// Row 1 is kept as text exactly as written, whitespace included, since it
/// holds column names. Every other field is typed with `CellValue::from_input`:
/// `2024-06-01` becomes a date and `42` a number, while zero-padded digits
/// such as `00042` stay text.
pub fn import(path: &Path, sheet_name: &str) -> Result<Sheet, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&content, delimiter, sheet_name)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// Each candidate is scored by how many sample lines share the first line's
/// field count, times that count. A candidate that splits line 1 into a single
/// field is not viable.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = match counts.first() {
            Some(&n) if n > 1 => n,
            _ => continue,
        };
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read a file as UTF-8, falling back to Windows-1252 (common for Excel-exported dumps).
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| format!("Failed to open '{}': {}", path.display(), e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            log::debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn import_from_string(content: &str, delimiter: u8, sheet_name: &str) -> Result<Sheet, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut sheet = Sheet::new(sheet_name);

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| format!("line {}: {}", row_idx + 1, e))?;
        let row = row_idx + 1;
        for (col_idx, field) in record.iter().enumerate() {
            let value = if row == 1 {
                CellValue::Text(field.to_string())
            } else {
                CellValue::from_input(field)
            };
            if !value.is_empty() {
                sheet.set_value(row, col_idx + 1, value);
            }
        }
    }

    Ok(sheet)
}

/// Write a sheet as delimited text. Tab-separated for `.tsv`, comma otherwise.
pub fn export(sheet: &Sheet, path: &Path) -> Result<(), String> {
    let is_tsv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
    let delimiter = if is_tsv { b'\t' } else { b',' };

    // Trailing empties are omitted, so rows may differ in field count.
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;

    for row in 1..=sheet.max_row() {
        let mut record: Vec<String> = (1..=sheet.max_column())
            .map(|col| sheet.value(row, col).raw_display())
            .collect();
        while record.last().is_some_and(|v| v.is_empty()) {
            record.pop();
        }
        if record.is_empty() {
            continue;
        }
        writer.write_record(&record).map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn sniffs_common_delimiters() {
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3\n"), b',');
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("a\tb\n1\t2\n"), b'\t');
        assert_eq!(sniff_delimiter("single\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn import_types_body_but_not_header() {
        let content = "Number,42,Opened\nINC001,3,2024-06-01\nINC002,,note\n";
        let sheet = import_from_string(content, b',', "dump").unwrap();

        assert_eq!(sheet.name, "dump");
        assert_eq!(sheet.value(1, 2), &CellValue::Text("42".into()));
        assert_eq!(sheet.value(2, 1), &CellValue::Text("INC001".into()));
        assert_eq!(sheet.value(2, 2), &CellValue::Number(3.0));
        assert_eq!(
            sheet.value(2, 3),
            &CellValue::Date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        );
        assert!(sheet.cell(3, 2).is_none());
        assert_eq!(sheet.max_row(), 3);
    }

    #[test]
    fn header_names_are_kept_verbatim() {
        let content = "Number,Status ,  Owner\nK1,Closed,ann\n";
        let sheet = import_from_string(content, b',', "dump").unwrap();
        assert_eq!(sheet.value(1, 2), &CellValue::Text("Status ".into()));
        assert_eq!(sheet.value(1, 3), &CellValue::Text("  Owner".into()));
    }

    #[test]
    fn zero_padded_keys_survive_export_and_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.csv");
        fs::write(&path, "Number,Count\n00042,7\n").unwrap();

        let sheet = import(&path, "dump").unwrap();
        assert_eq!(sheet.value(2, 1), &CellValue::Text("00042".into()));
        assert_eq!(sheet.value(2, 2), &CellValue::Number(7.0));

        export(&sheet, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Number,Count\n00042,7\n");
    }

    #[test]
    fn import_falls_back_to_windows_1252() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.csv");
        // "Café" in Windows-1252
        fs::write(&path, b"Key,Name\nK1,Caf\xe9\n").unwrap();

        let sheet = import(&path, "dump").unwrap();
        assert_eq!(sheet.value(2, 2), &CellValue::Text("Café".into()));
    }

    #[test]
    fn export_then_import_keeps_typed_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.csv");

        let mut sheet = Sheet::new("dump");
        sheet.set_value(1, 1, CellValue::from("Number"));
        sheet.set_value(1, 3, CellValue::from("Opened"));
        sheet.set_value(2, 1, CellValue::from("[INC] 00123:04567"));
        sheet.set_value(2, 3, CellValue::Date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
        sheet.set_value(3, 1, CellValue::from("[INC] 00999:00100"));

        export(&sheet, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Number,,Opened\n[INC] 00123:04567,,2024-06-01\n[INC] 00999:00100\n"
        );

        let back = import(&path, "dump").unwrap();
        assert_eq!(back.value(2, 3), sheet.value(2, 3));
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        fs::write(&path, "\u{feff}Key,Name\nK1,x\n").unwrap();

        let sheet = import(&path, "dump").unwrap();
        assert_eq!(sheet.value(1, 1), &CellValue::Text("Key".into()));
    }
}
