//! Writing page summaries as CSV.

use csv_async::AsyncSerializer;
use tokio::fs::File;

use crate::{prelude::*, summary::PageSummaryRow};

/// Where should the CSV for `input_path` go?
///
/// We swap the extension for `.csv`. If `output_dir` is given, the file goes
/// there instead of next to the input.
pub fn csv_output_path(input_path: &Path, output_dir: Option<&Path>) -> PathBuf {
    let csv_path = input_path.with_extension("csv");
    match (output_dir, csv_path.file_name()) {
        (Some(dir), Some(file_name)) => dir.join(file_name),
        _ => csv_path,
    }
}

/// Write `rows` to `output_path` as UTF-8 CSV with a header row.
///
/// Missing confidence values become empty cells.
#[instrument(level = "debug", skip_all, fields(path = %output_path.display(), rows = rows.len()))]
pub async fn write_summary_csv(rows: &[PageSummaryRow], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .await
        .with_context(|| format!("Failed to create file at path: {:?}", output_path))?;
    let mut serializer = AsyncSerializer::from_writer(file);
    for row in rows {
        serializer
            .serialize(row)
            .await
            .with_context(|| format!("Failed to write CSV row to {:?}", output_path))?;
    }
    serializer
        .flush()
        .await
        .with_context(|| format!("Failed to flush CSV output to {:?}", output_path))?;
    debug!("Wrote CSV summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<PageSummaryRow> {
        vec![
            PageSummaryRow {
                page_number: 1,
                text: "Hello, world".to_owned(),
                word_count: 2,
                average_confidence: Some(80.0),
                min_confidence: Some(70.0),
                max_confidence: Some(90.0),
            },
            PageSummaryRow {
                page_number: 3,
                text: "unscored".to_owned(),
                word_count: 1,
                average_confidence: None,
                min_confidence: None,
                max_confidence: None,
            },
        ]
    }

    #[test]
    fn output_path_swaps_extension() {
        assert_eq!(
            csv_output_path(Path::new("/tmp/req/doc.pdf"), None),
            PathBuf::from("/tmp/req/doc.csv")
        );
        assert_eq!(
            csv_output_path(Path::new("/tmp/req/doc.pdf"), Some(Path::new("/scratch"))),
            PathBuf::from("/scratch/doc.csv")
        );
        assert_eq!(
            csv_output_path(Path::new("notes"), None),
            PathBuf::from("notes.csv")
        );
    }

    #[tokio::test]
    async fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.csv");
        write_summary_csv(&rows(), &path).await.unwrap();

        let csv = std::fs::read_to_string(&path).unwrap();
        let lines = csv.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "PageNumber,Text,WordCount,AverageConfidence,MinConfidence,MaxConfidence",
                "1,\"Hello, world\",2,80.0,70.0,90.0",
                "3,unscored,1,,,",
            ]
        );
    }

    #[tokio::test]
    async fn same_rows_give_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");
        write_summary_csv(&rows(), &first).await.unwrap();
        write_summary_csv(&rows(), &second).await.unwrap();
        assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
    }

    #[tokio::test]
    async fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("doc.csv");
        assert!(write_summary_csv(&rows(), &path).await.is_err());
    }
}
