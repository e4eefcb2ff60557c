//! CSV export of material lists, summaries and metrics tables

use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::aggregator::MaterialRecord;
use crate::codec::temp_path_for;
use crate::error::{EvalError, EvalResult};
use crate::key::numeric_suffix;
use crate::metrics::MetricsTable;
use crate::summary::{SummaryRow, SummaryTable};

fn create_parent(path: &Path) -> EvalResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Numeric suffix ascending; ids without one follow in lexicographic order
pub fn compare_material_ids(a: &str, b: &str) -> Ordering {
    match (numeric_suffix(a), numeric_suffix(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Write `material_id,formula,n_sources` for every record
///
/// The header is written even when there are no records.
pub fn write_material_ids<'a, I>(records: I, path: &Path) -> EvalResult<usize>
where
    I: IntoIterator<Item = &'a MaterialRecord>,
{
    let mut records: Vec<&MaterialRecord> = records.into_iter().collect();
    records.sort_by(|a, b| compare_material_ids(a.material_id(), b.material_id()));

    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["material_id", "formula", "n_sources"])?;
    for record in &records {
        let n_sources = record.coverage().to_string();
        writer.write_record([record.material_id(), record.formula(), n_sources.as_str()])?;
    }
    writer.flush()?;

    info!(count = records.len(), path = %path.display(), "Wrote material ids");
    Ok(records.len())
}

/// Write a metrics table: `model` followed by the table's column names
pub fn write_metrics_csv(table: &MetricsTable, path: &Path) -> EvalResult<()> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["model".to_string()];
    header.extend(table.columns.iter().map(|c| c.name().to_string()));
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.source.key().to_string()];
        record.extend(row.values.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    info!(
        kind = table.kind.name(),
        models = table.rows.len(),
        path = %path.display(),
        "Wrote metrics table"
    );
    Ok(())
}

/// Write every summary row; missing values are empty cells
///
/// The file is replaced atomically so a concurrent [`read_summary_csv`] never
/// sees a partial table.
pub fn write_summary_csv(summary: &SummaryTable, path: &Path) -> EvalResult<()> {
    create_parent(path)?;
    let temp_path = temp_path_for(path);

    let written = (|| -> EvalResult<()> {
        let mut writer = csv::Writer::from_path(&temp_path)?;
        for row in summary.rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&temp_path, path)?;
        Ok(())
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    info!(rows = summary.len(), path = %path.display(), "Wrote summary table");
    Ok(())
}

/// Read a table written by [`write_summary_csv`]
pub fn read_summary_csv(path: &Path) -> EvalResult<SummaryTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize::<SummaryRow>()
        .collect::<Result<Vec<_>, csv::Error>>()
        .map_err(|e| EvalError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let table = SummaryTable::from_rows(rows)?;

    info!(rows = table.len(), path = %path.display(), "Read summary table");
    Ok(table)
}
