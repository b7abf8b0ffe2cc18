//! End-to-end solve tests with hand-checkable optima.
use float_cmp::assert_approx_eq;
use osprey::build::TransmissionTopology;
use osprey::error::SolveStatus;
use osprey::run::{solve, Options, YearSelection};
use osprey::store::Store;
use std::fs;

mod common;
use common::{generator_scenario, two_region_scenario, write_table};

/// The optimal objective for the forced-dispatch generator scenario: an
/// operating cost of 10 per year, discounted at 5% to mid-year.
fn forced_dispatch_objective(years: &[i32]) -> f64 {
    let base = years[0];
    years
        .iter()
        .map(|y| 10.0 / 1.05_f64.powf(f64::from(y - base) + 0.5))
        .sum()
}

/// The solved value in a result table for the row with the given index prefix
fn table_value(store: &Store, table: &str, prefix: &str) -> f64 {
    let text = fs::read_to_string(store.result_table_path(table)).unwrap();
    let row = text
        .lines()
        .find(|line| line.starts_with(prefix))
        .unwrap_or_else(|| panic!("no row starting with '{prefix}' in {table}"));
    row.rsplit(',').next().unwrap().parse().unwrap()
}

#[test]
fn test_single_year_objective() {
    std::env::set_var("OSPREY_LOG_LEVEL", "off");
    let (_dir, store) = generator_scenario(&[2025]);

    let output = solve(&store, &Options::default()).unwrap();
    assert_eq!(output.status, SolveStatus::Optimal);
    assert_approx_eq!(
        f64,
        output.objective,
        forced_dispatch_objective(&[2025]),
        epsilon = 1e-9
    );

    // The production table records the energy demanded
    assert_approx_eq!(
        f64,
        table_value(&store, "vproduction", "utopia,annual,electricity,2025,"),
        10.0,
        epsilon = 1e-9
    );
}

#[test]
fn test_multi_year_objective_discounts_each_year() {
    std::env::set_var("OSPREY_LOG_LEVEL", "off");
    let years = [2025, 2026, 2027];
    let (_dir, store) = generator_scenario(&years);

    let output = solve(&store, &Options::default()).unwrap();
    assert_approx_eq!(
        f64,
        output.objective,
        forced_dispatch_objective(&years),
        epsilon = 1e-9
    );
}

#[test]
fn test_variable_restriction_preserves_the_optimum() {
    std::env::set_var("OSPREY_LOG_LEVEL", "off");
    let (_dir, store) = generator_scenario(&[2025, 2026]);

    let restricted = solve(&store, &Options::default()).unwrap();
    let full = solve(
        &store,
        &Options {
            restrict_vars: false,
            ..Options::default()
        },
    )
    .unwrap();
    assert_approx_eq!(f64, restricted.objective, full.objective, epsilon = 1e-9);
}

#[test]
fn test_limited_foresight_matches_perfect_foresight_when_dispatch_is_forced() {
    std::env::set_var("OSPREY_LOG_LEVEL", "off");
    let years = [2025, 2026, 2027];
    let (_dir, store) = generator_scenario(&years);

    let perfect = solve(&store, &Options::default()).unwrap();
    let myopic = solve(
        &store,
        &Options {
            years: YearSelection::Blocks(vec![vec![2025], vec![2026], vec![2027]]),
            ..Options::default()
        },
    )
    .unwrap();
    assert_approx_eq!(f64, perfect.objective, myopic.objective, epsilon = 1e-6);
}

#[test]
fn test_pairwise_transmission_imports_cheap_generation() {
    std::env::set_var("OSPREY_LOG_LEVEL", "off");
    let (_dir, store) = two_region_scenario(&[2025]);

    // Without a line the north must self-supply at 3 per unit
    let isolated = solve(&store, &Options::default()).unwrap();
    assert_approx_eq!(
        f64,
        isolated.objective,
        30.0 / 1.05_f64.powf(0.5),
        epsilon = 1e-9
    );

    // With the line, everything comes from the south at 1 per unit
    let traded = solve(
        &store,
        &Options {
            transmission: TransmissionTopology::Pairwise,
            ..Options::default()
        },
    )
    .unwrap();
    assert_approx_eq!(
        f64,
        traded.objective,
        10.0 / 1.05_f64.powf(0.5),
        epsilon = 1e-9
    );
    assert_approx_eq!(
        f64,
        table_value(&store, "vproduction", "south,annual,electricity,2025,"),
        10.0,
        epsilon = 1e-6
    );
}

#[test]
fn test_priced_emissions_enter_the_objective() {
    std::env::set_var("OSPREY_LOG_LEVEL", "off");
    let (_dir, store) = generator_scenario(&[2025]);

    // Two priced emissions from the same activity: 10 units of forced
    // dispatch emit 5 co2 and 2.5 ch4, penalised at 2 and 3 per unit
    write_table(&store, "EMISSION", &["co2,", "ch4,"]);
    write_table(
        &store,
        "EmissionActivityRatio",
        &[
            "utopia,generator,co2,standard,2025,0.5",
            "utopia,generator,ch4,standard,2025,0.25",
        ],
    );
    write_table(
        &store,
        "EmissionsPenalty",
        &["utopia,co2,2025,2", "utopia,ch4,2025,3"],
    );

    let output = solve(&store, &Options::default()).unwrap();

    // Operating cost 10 plus penalties (0.5*2 + 0.25*3)*10 = 17.5,
    // discounted to mid-year
    let expected = 27.5 / 1.05_f64.powf(0.5);
    assert_approx_eq!(f64, output.objective, expected, epsilon = 1e-9);
    assert_approx_eq!(
        f64,
        table_value(&store, "vtotaldiscountedcost", "utopia,2025,"),
        expected,
        epsilon = 1e-9
    );
    assert_approx_eq!(
        f64,
        table_value(&store, "vannualemissions", "utopia,co2,2025,"),
        5.0,
        epsilon = 1e-9
    );
}

#[test]
fn test_rerun_replaces_result_tables() {
    std::env::set_var("OSPREY_LOG_LEVEL", "off");
    let (_dir, store) = generator_scenario(&[2025]);

    let first = solve(&store, &Options::default()).unwrap();
    assert!(!first.tables_written.is_empty());

    // A second run rewrites the same tables rather than accumulating rows
    let second = solve(&store, &Options::default()).unwrap();
    assert_eq!(first.tables_written, second.tables_written);
    let text = fs::read_to_string(store.result_table_path("vproduction")).unwrap();
    assert_eq!(
        text.lines()
            .filter(|line| line.starts_with("utopia,"))
            .count(),
        1
    );
}
