use commentql::compile::compile;
use commentql::settings::PlannerSettings;

fn setup() -> PlannerSettings {
    PlannerSettings::default()
}

#[test]
fn single_token_searches_every_configured_column() {
    let settings = setup();
    let plan = compile("fts: solar", &settings).expect("compile ok");
    assert_eq!(plan.groups.len(), 1);
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(
        predicate.bind_params,
        vec![("fts_0".to_string(), "%solar%".to_string())]
    );
    assert_eq!(
        predicate.sql_fragment.matches("LIKE").count(),
        settings.fts.columns.len(),
        "one LIKE test per configured column"
    );
    assert!(predicate
        .sql_fragment
        .starts_with("(UPPER(TRIM(CONTRACT_SUBJECT)) LIKE UPPER(:fts_0)"));
    assert!(predicate
        .sql_fragment
        .ends_with("UPPER(TRIM(REPRESENTATIVE_EMAIL)) LIKE UPPER(:fts_0))"));
    assert!(plan.debug.fts.enabled);
    assert_eq!(plan.debug.fts.engine, "like");
    assert!(plan.debug.fts.error.is_none());
}

#[test]
fn or_tokens_widen_the_same_predicate() {
    let settings = setup();
    let plan = compile("fts: it or home care", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(
        predicate.bind_params,
        vec![
            ("fts_0".to_string(), "%it%".to_string()),
            ("fts_1".to_string(), "%home care%".to_string()),
        ]
    );
    // Two per-token column sweeps joined by OR inside one outer paren.
    assert!(predicate.sql_fragment.starts_with("(("));
    assert!(predicate.sql_fragment.contains(") OR ("));
    assert!(!predicate.sql_fragment.contains(") AND ("));
    assert_eq!(plan.debug.blocks[0].fts_tokens, vec!["it", "home care"]);
}

#[test]
fn ampersand_requires_every_token_group() {
    let settings = setup();
    let plan = compile("fts: solar & wind", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(predicate.bind_params.len(), 2);
    assert!(predicate.sql_fragment.contains(") AND ("));
    assert_eq!(plan.debug.blocks[0].fts_tokens, vec!["solar", "wind"]);
}

#[test]
fn short_tokens_are_filtered_out() {
    let settings = setup();
    let plan = compile("fts: a or it", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(
        predicate.bind_params,
        vec![("fts_0".to_string(), "%it%".to_string())]
    );
    assert_eq!(plan.debug.blocks[0].fts_tokens, vec!["it"]);
}

#[test]
fn all_short_tokens_disable_the_search() {
    let settings = setup();
    let plan = compile("fts: a or b", &settings).expect("compile ok");
    assert!(plan.groups.is_empty());
    assert!(!plan.debug.fts.enabled);
    assert_eq!(plan.debug.fts.error.as_deref(), Some("no_tokens"));
}

#[test]
fn missing_column_config_disables_the_search() {
    let mut settings = setup();
    settings.fts.columns.clear();
    let plan = compile("fts: solar", &settings).expect("compile ok");
    assert!(plan.groups.is_empty());
    assert_eq!(plan.where_fragment(), "");
    assert!(!plan.debug.fts.enabled);
    assert_eq!(plan.debug.fts.engine, "like");
    assert_eq!(plan.debug.fts.error.as_deref(), Some("no_columns"));
}

#[test]
fn later_success_clears_an_earlier_failure() {
    let settings = setup();
    let plan = compile("fts: a; fts: solar", &settings).expect("compile ok");
    assert!(plan.debug.fts.enabled);
    assert!(plan.debug.fts.error.is_none());
    assert_eq!(plan.groups.len(), 1);
}

#[test]
fn bind_value_keeps_the_raw_token_case() {
    let settings = setup();
    let plan = compile("fts: Solar", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(predicate.bind_params[0].1, "%Solar%");
    assert!(predicate.sql_fragment.contains("LIKE UPPER(:fts_0)"));
}
