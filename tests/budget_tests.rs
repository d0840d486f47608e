use rams_workload::budget::{
    BudgetRollup, BudgetStatus, WorkPackageBudgetStatus, budget_status, rams_distribution,
};
use rams_workload::project::RamsTag;

fn rollup(id: i64, tag: RamsTag, standard: f64, planned: f64, resources: &[i64]) -> BudgetRollup {
    BudgetRollup {
        work_package_id: id,
        project_name: "Metro Line 4".to_string(),
        work_package_name: format!("WP {id}"),
        rams_tag: tag,
        standard_effort_hours: standard,
        total_planned_hours: planned,
        resource_ids: resources.to_vec(),
    }
}

#[test]
fn budget_status_boundaries() {
    assert_eq!(budget_status(100.0, 100.0).budget_status, BudgetStatus::AtBudget);
    assert_eq!(budget_status(100.0, 100.01).budget_status, BudgetStatus::OverBudget);
    assert_eq!(budget_status(100.0, 99.99).budget_status, BudgetStatus::UnderBudget);
}

#[test]
fn hours_remaining_goes_negative_when_over_budget() {
    let assessment = budget_status(80.0, 100.0);
    assert_eq!(assessment.hours_remaining, -20.0);
    assert_eq!(assessment.budget_status, BudgetStatus::OverBudget);
}

#[test]
fn work_package_without_activities_is_under_budget() {
    let status = WorkPackageBudgetStatus::from_rollup(&rollup(1, RamsTag::Fta, 40.0, 0.0, &[]));
    assert_eq!(status.hours_remaining, 40.0);
    assert_eq!(status.budget_status, BudgetStatus::UnderBudget);
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["budget_status"], "UNDER_BUDGET");
    assert_eq!(json["rams_tag"], "FTA");
}

#[test]
fn rams_distribution_groups_by_tag_with_distinct_resources() {
    let rollups = vec![
        rollup(1, RamsTag::Hazop, 100.0, 80.0, &[1, 2]),
        rollup(2, RamsTag::Fmeca, 50.0, 60.0, &[2]),
        rollup(3, RamsTag::Hazop, 20.0, 10.0, &[2, 3]),
        rollup(4, RamsTag::Custom("RAM Demo".into()), 5.0, 0.0, &[]),
    ];
    let distribution = rams_distribution(&rollups);
    let labels: Vec<_> = distribution.iter().map(|g| g.rams_tag.as_str()).collect();
    assert_eq!(labels, vec!["FMECA", "HAZOP", "RAM Demo"]);

    let hazop = &distribution[1];
    assert_eq!(hazop.work_package_count, 2);
    assert_eq!(hazop.total_standard_hours, 120.0);
    assert_eq!(hazop.total_planned_hours, 90.0);
    assert_eq!(hazop.resource_count, 3);

    assert_eq!(distribution[2].resource_count, 0);
}
