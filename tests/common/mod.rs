//! Shared helpers for integration tests.
use osprey::store::Store;
use std::fs;
use tempfile::TempDir;

// The helpers below give spurious warnings about being unused because of the
// multiple `mod common` declarations in different test files, so we suppress
// the warnings manually

/// Replace the body of a table, keeping its header
#[allow(dead_code)]
pub fn write_table(store: &Store, table: &str, rows: &[&str]) {
    let header = store.table_columns(table).unwrap().join(",");
    let mut text = header;
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(store.table_path(table), text).unwrap();
}

/// A one-region scenario with a single generator and a single timeslice.
///
/// Demand is 10 units of electricity in each year, met by a generator with a
/// unit output ratio and a variable cost of 1, so the undiscounted operating
/// cost is 10 per year and the dispatch is forced.
#[allow(dead_code)]
pub fn generator_scenario(years: &[i32]) -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path().join("scenario")).unwrap();

    let year_rows: Vec<String> = years.iter().map(|y| format!("{y},")).collect();
    let rows: Vec<&str> = year_rows.iter().map(String::as_str).collect();
    write_table(&store, "YEAR", &rows);

    write_table(&store, "REGION", &["utopia,"]);
    write_table(&store, "TECHNOLOGY", &["generator,"]);
    write_table(&store, "FUEL", &["electricity,"]);
    write_table(&store, "MODE_OF_OPERATION", &["standard,"]);
    write_table(&store, "TIMESLICE", &["annual,"]);
    write_table(&store, "OperationalLife", &["utopia,generator,40"]);

    for_each_year(&store, years, |y| {
        vec![
            ("YearSplit", format!("annual,{y},1")),
            (
                "SpecifiedAnnualDemand",
                format!("utopia,electricity,{y},10"),
            ),
            (
                "OutputActivityRatio",
                format!("utopia,generator,electricity,standard,{y},1"),
            ),
            ("VariableCost", format!("utopia,generator,standard,{y},1")),
        ]
    });

    (dir, store)
}

/// A two-region scenario joined by a lossless transmission line.
///
/// Demand sits in the north, where generation costs 3 per unit; the south
/// generates at 1 per unit, so the least-cost plan imports everything.
#[allow(dead_code)]
pub fn two_region_scenario(years: &[i32]) -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path().join("scenario")).unwrap();

    let year_rows: Vec<String> = years.iter().map(|y| format!("{y},")).collect();
    let rows: Vec<&str> = year_rows.iter().map(String::as_str).collect();
    write_table(&store, "YEAR", &rows);

    write_table(&store, "REGION", &["north,", "south,"]);
    write_table(&store, "TECHNOLOGY", &["dear_gen,", "cheap_gen,"]);
    write_table(&store, "FUEL", &["electricity,"]);
    write_table(&store, "MODE_OF_OPERATION", &["standard,"]);
    write_table(&store, "TIMESLICE", &["annual,"]);
    write_table(
        &store,
        "TRANSMISSIONLINE",
        &["north_south,north,south,electricity,"],
    );
    write_table(&store, "TransmissionCapacity", &["north_south,100"]);

    for_each_year(&store, years, |y| {
        vec![
            ("YearSplit", format!("annual,{y},1")),
            ("SpecifiedAnnualDemand", format!("north,electricity,{y},10")),
            (
                "OutputActivityRatio",
                format!("north,dear_gen,electricity,standard,{y},1"),
            ),
            (
                "OutputActivityRatio",
                format!("south,cheap_gen,electricity,standard,{y},1"),
            ),
            ("VariableCost", format!("north,dear_gen,standard,{y},3")),
            ("VariableCost", format!("south,cheap_gen,standard,{y},1")),
            ("TransmissionAvailable", format!("north_south,{y},1")),
        ]
    });

    (dir, store)
}

/// Append per-year rows to the named tables
fn for_each_year<F>(store: &Store, years: &[i32], rows_for: F)
where
    F: Fn(i32) -> Vec<(&'static str, String)>,
{
    let mut by_table: Vec<(&str, Vec<String>)> = Vec::new();
    for year in years {
        for (table, row) in rows_for(*year) {
            match by_table.iter_mut().find(|(name, _)| *name == table) {
                Some((_, rows)) => rows.push(row),
                None => by_table.push((table, vec![row])),
            }
        }
    }
    for (table, rows) in by_table {
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        write_table(store, table, &refs);
    }
}
