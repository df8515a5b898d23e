use std::io::Write;
use std::path::Path;

use harvest_warc::IterItem;

use crate::error::{ExportError, Result};
use crate::request::ExportFormat;

/// Write `items` under `dest_dir`, chunked per `segment_size` (`None` means
/// one file holding everything). Segment files are named `<id>_NNN.<ext>`,
/// 1-indexed, matching the original exporter's suffixing convention.
pub fn write_segmented(
    items: &[IterItem],
    format: ExportFormat,
    segment_size: Option<usize>,
    id: &str,
    dest_dir: &Path,
) -> Result<()> {
    let ext = format.extension();
    match segment_size {
        None => write_one_segment(&dest_dir.join(format!("{id}_001.{ext}")), format, items),
        Some(0) => Err(ExportError::BadRequest {
            reason: "segment_size must be greater than zero".to_string(),
        }),
        Some(size) => {
            for (index, chunk) in items.chunks(size).enumerate() {
                let path = dest_dir.join(format!("{id}_{:03}.{ext}", index + 1));
                write_one_segment(&path, format, chunk)?;
            }
            Ok(())
        }
    }
}

fn write_one_segment(path: &Path, format: ExportFormat, items: &[IterItem]) -> Result<()> {
    match format {
        ExportFormat::Csv => write_delimited(path, items, b','),
        ExportFormat::Tsv => write_delimited(path, items, b'\t'),
        ExportFormat::Json => write_json_lines(path, items),
        ExportFormat::JsonFull => write_json_full(path, items),
        ExportFormat::Dehydrate => write_dehydrate(path, items),
        ExportFormat::Html | ExportFormat::Xlsx => Err(ExportError::NotYetImplemented { format }),
    }
}

fn item_row(item: &IterItem) -> Result<[String; 5]> {
    Ok([
        item.item_type.clone(),
        item.item_id.clone(),
        item.item_date.to_rfc3339(),
        item.url.clone(),
        serde_json::to_string(&item.item)?,
    ])
}

fn write_delimited(path: &Path, items: &[IterItem], delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_path(path)?;
    writer.write_record(["item_type", "item_id", "item_date", "url", "item"])?;
    for item in items {
        writer.write_record(item_row(item)?)?;
    }
    writer.flush()?;
    Ok(())
}

fn item_value(item: &IterItem) -> serde_json::Value {
    serde_json::json!({
        "item_type": item.item_type,
        "item_id": item.item_id,
        "item_date": item.item_date,
        "url": item.url,
        "item": item.item,
    })
}

fn write_json_lines(path: &Path, items: &[IterItem]) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut file, &item_value(item))?;
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn write_json_full(path: &Path, items: &[IterItem]) -> Result<()> {
    let values: Vec<_> = items.iter().map(item_value).collect();
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &values)?;
    Ok(())
}

fn write_dehydrate(path: &Path, items: &[IterItem]) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for item in items {
        writeln!(file, "{}", item.item_id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str) -> IterItem {
        IterItem {
            item_type: "tweet".to_string(),
            item_id: id.to_string(),
            item_date: Utc::now(),
            url: format!("https://example.com/{id}"),
            item: serde_json::json!({"id": id}),
        }
    }

    #[test]
    fn segment_size_none_writes_one_file_with_all_items() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![item("1"), item("2"), item("3")];
        write_segmented(&items, ExportFormat::Csv, None, "export1", dir.path()).unwrap();

        assert!(dir.path().join("export1_001.csv").exists());
        assert!(!dir.path().join("export1_002.csv").exists());
        let contents = std::fs::read_to_string(dir.path().join("export1_001.csv")).unwrap();
        assert_eq!(contents.lines().count(), 4); // header + 3 rows
    }

    #[test]
    fn segment_size_chunks_into_ceil_n_over_s_files() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![item("1"), item("2"), item("3")];
        write_segmented(&items, ExportFormat::Csv, Some(2), "export1", dir.path()).unwrap();

        assert!(dir.path().join("export1_001.csv").exists());
        assert!(dir.path().join("export1_002.csv").exists());
        assert!(!dir.path().join("export1_003.csv").exists());

        let first = std::fs::read_to_string(dir.path().join("export1_001.csv")).unwrap();
        assert_eq!(first.lines().count(), 3); // header + 2 rows
        let second = std::fs::read_to_string(dir.path().join("export1_002.csv")).unwrap();
        assert_eq!(second.lines().count(), 2); // header + 1 row
    }

    #[test]
    fn dehydrate_writes_one_id_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![item("a"), item("b")];
        write_segmented(&items, ExportFormat::Dehydrate, None, "export1", dir.path()).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("export1_001.txt")).unwrap();
        assert_eq!(contents, "a\nb\n");
    }

    #[test]
    fn html_and_xlsx_are_not_yet_implemented() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_segmented(&[item("1")], ExportFormat::Html, None, "export1", dir.path())
            .unwrap_err();
        assert!(matches!(err, ExportError::NotYetImplemented { format: ExportFormat::Html }));
    }
}
