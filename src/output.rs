//! Writing solved variable values into the store's results directory.
//!
//! One table per selected variable family, named after the family, with the
//! family's index columns plus `val`. Rows merge across phases in phase order
//! and keep each phase's deterministic column order, so two identical runs
//! produce byte-identical tables. Values are written unrounded. Nothing is
//! written unless every phase solved.
use anyhow::Result;
use log::info;

use crate::model::VariableFamily;
use crate::phases::PhaseOutcome;
use crate::store::Store;

/// Write one result table per selected family.
///
/// Returns the table names written, in selection order. A family with no
/// instantiated tuples still produces its header-only table.
pub fn write_results(
    store: &Store,
    outcomes: &[PhaseOutcome],
    families: &[VariableFamily],
) -> Result<Vec<String>> {
    let mut written = Vec::with_capacity(families.len());

    for family in families {
        let table = family.to_string();
        let columns: Vec<&str> = family
            .dims()
            .iter()
            .copied()
            .chain(std::iter::once("val"))
            .collect();

        let mut records = Vec::new();
        for outcome in outcomes {
            for (col, key) in outcome.model.variables.keys().enumerate() {
                if key.family() != *family {
                    continue;
                }
                let mut record = key.index_record();
                record.push(outcome.values[col].to_string());
                records.push(record);
            }
        }

        store.write_result_table(&table, &columns, &records)?;
        info!("wrote {} row(s) to results table {table}", records.len());
        written.push(table);
    }

    Ok(written)
}
