use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use polars::prelude::*;
use rams_workload::{
    AppConfig, CapacityOverview, EnrichedResourceCapacity, PlanningStore, SqlitePlanningStore,
    WorkCalendar, WorkPackageBudgetStatus, WorkloadFilter, aggregate, load_snapshot_from_json,
    logging, rams_distribution, report, save_snapshot_to_json, workload_matrix,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn cell_text(value: &AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::Float64(v) => format!("{v:.2}"),
        AnyValue::String(s) => s.to_string(),
        AnyValue::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn render_df_as_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        cells.push(
            columns
                .iter()
                .map(|col| col.get(row_idx).map(|av| cell_text(&av)).unwrap_or_default())
                .collect(),
        );
    }

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.len()).collect();
    for row in &cells {
        for (ci, cell) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(cell.len());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let render_row = |values: &[String]| -> String {
        let mut line = String::from("|");
        for (ci, value) in values.iter().enumerate() {
            line.push(' ');
            line.push_str(value);
            line.push_str(&" ".repeat(widths[ci].saturating_sub(value.len())));
            line.push_str(" |");
        }
        line
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(&col_names));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in &cells {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn capacity_frame(resources: &[EnrichedResourceCapacity]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(
            PlSmallStr::from_static("resource"),
            resources.iter().map(|r| r.name.clone()).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("days"),
            resources.iter().map(|r| r.working_days).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("capacity"),
            resources.iter().map(|r| r.monthly_capacity).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("planned"),
            resources.iter().map(|r| r.total_planned_hours).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("utilization_%"),
            resources.iter().map(|r| r.utilization_percentage).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("status"),
            resources.iter().map(|r| r.capacity_status.as_str()).collect::<Vec<_>>(),
        )
        .into_column(),
    ])
}

fn budget_frame(statuses: &[WorkPackageBudgetStatus]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(
            PlSmallStr::from_static("project"),
            statuses.iter().map(|s| s.project_name.clone()).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("work_package"),
            statuses.iter().map(|s| s.work_package_name.clone()).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("rams_tag"),
            statuses.iter().map(|s| s.rams_tag.to_string()).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("standard"),
            statuses.iter().map(|s| s.standard_effort_hours).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("planned"),
            statuses.iter().map(|s| s.total_planned_hours).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("remaining"),
            statuses.iter().map(|s| s.hours_remaining).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("status"),
            statuses.iter().map(|s| s.budget_status.as_str()).collect::<Vec<_>>(),
        )
        .into_column(),
    ])
}

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  resources                          List resources\n  projects                           List projects\n  capacity <year> <month>            Monthly capacity per resource\n  warnings <year> <month>            Over-capacity and high-utilization warnings\n  workload <year> [resource_id]      Hours per resource/project/month\n  budget                             Planned vs standard effort per work package\n  rams                               Totals per RAMS tag\n  log [n]                            Latest n change log entries (default 20)\n  export <file.json>                 Write a snapshot of all records\n  import <file.json>                 Replace all records with a snapshot\n  report capacity <year> <month> <file.csv>\n  report budget <file.csv>\n  report rams <file.csv>\n  report workload <year> <file.csv>\n                                     Write a CSV report\n  quit|exit                          Exit"
    );
}

fn parse_period(year: Option<&str>, month: Option<&str>) -> Option<(i32, u32)> {
    let year = year?.parse().ok()?;
    let month = month?.parse().ok()?;
    Some((year, month))
}

fn load_overview(
    store: &SqlitePlanningStore,
    calendar: &WorkCalendar,
    year: i32,
    month: u32,
) -> CliResult<CapacityOverview> {
    let records = store.monthly_utilization(year, month)?;
    Ok(CapacityOverview::build_on(calendar, &records, year, month))
}

fn budget_statuses(store: &SqlitePlanningStore) -> CliResult<Vec<WorkPackageBudgetStatus>> {
    Ok(store
        .budget_rollups()?
        .iter()
        .map(WorkPackageBudgetStatus::from_rollup)
        .collect())
}

fn create_file(path: &str) -> CliResult<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

fn run_report(
    store: &SqlitePlanningStore,
    calendar: &WorkCalendar,
    args: &[&str],
) -> CliResult<String> {
    match args {
        ["capacity", year, month, path] => {
            let (year, month) = parse_period(Some(*year), Some(*month))
                .ok_or("year and month must be numbers")?;
            let overview = load_overview(store, calendar, year, month)?;
            report::write_capacity_report(create_file(path)?, &overview.resources)?;
            Ok(format!("Capacity report written to {path}"))
        }
        ["budget", path] => {
            report::write_budget_report(create_file(path)?, &budget_statuses(store)?)?;
            Ok(format!("Budget report written to {path}"))
        }
        ["rams", path] => {
            let distribution = rams_distribution(&store.budget_rollups()?);
            report::write_rams_distribution_report(create_file(path)?, &distribution)?;
            Ok(format!("RAMS distribution written to {path}"))
        }
        ["workload", year, path] => {
            let year: i32 = year.parse().map_err(|_| "year must be a number")?;
            let buckets = aggregate(&store.activity_rows()?, year, WorkloadFilter::all());
            report::write_workload_report(create_file(path)?, &buckets)?;
            Ok(format!("Workload report written to {path}"))
        }
        _ => Err("Usage: report <capacity|budget|rams|workload> ... <file.csv>".into()),
    }
}

fn run_command(
    store: &SqlitePlanningStore,
    calendar: &WorkCalendar,
    cmd: &str,
    args: &[&str],
) -> CliResult<String> {
    match cmd {
        "resources" => {
            let mut out = String::new();
            for r in store.list_resources()? {
                out.push_str(&format!(
                    "{:>4}  {}  ({}h/week, {} override(s))\n",
                    r.id,
                    r.name,
                    r.contract_hours,
                    r.monthly_availability_overrides.len()
                ));
            }
            Ok(out)
        }
        "projects" => {
            let mut out = String::new();
            for p in store.list_projects()? {
                out.push_str(&format!(
                    "{:>4}  {}  {} .. {}\n",
                    p.id, p.name, p.start_date, p.end_date
                ));
            }
            Ok(out)
        }
        "capacity" => {
            let (year, month) = parse_period(args.first().copied(), args.get(1).copied())
                .ok_or("Usage: capacity <year> <month>")?;
            let overview = load_overview(store, calendar, year, month)?;
            let summary = &overview.summary;
            Ok(format!(
                "{}{} resource(s), {} over capacity, {} at capacity, average {:.2}%",
                render_df_as_text_table(&capacity_frame(&overview.resources)?),
                summary.resource_count,
                summary.over_capacity,
                summary.at_capacity,
                summary.average_utilization
            ))
        }
        "warnings" => {
            let (year, month) = parse_period(args.first().copied(), args.get(1).copied())
                .ok_or("Usage: warnings <year> <month>")?;
            let overview = load_overview(store, calendar, year, month)?;
            if overview.warnings.is_empty() {
                return Ok("No capacity warnings.".to_string());
            }
            Ok(overview
                .warnings
                .iter()
                .map(|w| format!("[{:?}] {}", w.severity, w.message))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        "workload" => {
            let year: i32 = args
                .first()
                .and_then(|y| y.parse().ok())
                .ok_or("Usage: workload <year> [resource_id]")?;
            let filter = match args.get(1) {
                Some(id) => WorkloadFilter::resource(id.parse().map_err(|_| "invalid resource_id")?),
                None => WorkloadFilter::all(),
            };
            let buckets = aggregate(&store.activity_rows()?, year, filter);
            Ok(render_df_as_text_table(&workload_matrix(&buckets)?))
        }
        "budget" => Ok(render_df_as_text_table(&budget_frame(&budget_statuses(store)?)?)),
        "rams" => {
            let mut out = String::new();
            for group in rams_distribution(&store.budget_rollups()?) {
                out.push_str(&format!(
                    "{:<16} {:>3} WP  {:>9.2}h standard  {:>9.2}h planned  {} resource(s)\n",
                    group.rams_tag,
                    group.work_package_count,
                    group.total_standard_hours,
                    group.total_planned_hours,
                    group.resource_count
                ));
            }
            Ok(out)
        }
        "log" => {
            let limit = match args.first() {
                Some(n) => n.parse().map_err(|_| "Usage: log [n]")?,
                None => 20,
            };
            let mut out = String::new();
            for entry in store.recent_changes(limit)? {
                out.push_str(&format!(
                    "{}  {:<6} {} {}\n",
                    entry.changed_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.action.as_str(),
                    entry.entity_type,
                    entry.entity_id
                ));
            }
            Ok(out)
        }
        "export" => {
            let path = args.first().ok_or("Usage: export <file.json>")?;
            save_snapshot_to_json(&store.export_snapshot()?, path)?;
            Ok(format!("Snapshot written to {path}"))
        }
        "import" => {
            let path = args.first().ok_or("Usage: import <file.json>")?;
            let snapshot = load_snapshot_from_json(path)?;
            store.import_snapshot(&snapshot)?;
            Ok(format!(
                "Imported {} resource(s), {} project(s), {} work package(s), {} activity(ies)",
                snapshot.resources.len(),
                snapshot.projects.len(),
                snapshot.work_packages.len(),
                snapshot.activities.len()
            ))
        }
        "report" => run_report(store, calendar, args),
        _ => Err("Unknown command. Type 'help'.".into()),
    }
}

fn main() -> CliResult<()> {
    let config = AppConfig::from_env()?;
    logging::init(&config.log_filter);

    let database_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or(config.database_path);
    let store = SqlitePlanningStore::new(&database_path)?;
    let calendar = WorkCalendar::default();

    println!(
        "RAMS Workload (CLI) - {} - type 'help' for commands\n",
        database_path.display()
    );

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            _ => match run_command(&store, &calendar, cmd, &args) {
                Ok(output) => println!("{output}"),
                Err(e) => println!("Error: {e}"),
            },
        }
    }
    Ok(())
}
