use commentql::compile::compile;
use commentql::error::CommentqlError;
use commentql::settings::PlannerSettings;
use commentql::sql::{gross_expr, render_select};

fn setup() -> PlannerSettings {
    let mut settings = PlannerSettings::default();
    settings.allow_list.push("REPRESENTATIVE_EMAIL".to_string());
    settings
}

fn wide() -> PlannerSettings {
    let mut settings = setup();
    for n in 1..=8 {
        settings.allow_list.push(format!("DEPARTMENT_{n}"));
    }
    settings
}

#[test]
fn contains_compiles_to_per_value_like_tests() {
    let settings = setup();
    let plan = compile("has: ENTITY = DSFH or FARABI", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(
        predicate.sql_fragment,
        "(UPPER(NVL(ENTITY,'')) LIKE UPPER(:like_0) \
         OR UPPER(NVL(ENTITY,'')) LIKE UPPER(:like_1))"
    );
    assert_eq!(
        predicate.bind_params,
        vec![
            ("like_0".to_string(), "%DSFH%".to_string()),
            ("like_1".to_string(), "%FARABI%".to_string()),
        ]
    );
}

#[test]
fn negated_contains_must_miss_every_value() {
    let settings = setup();
    let plan = compile("not_contains: ENTITY = ACME or ORION", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(
        predicate.sql_fragment,
        "(UPPER(NVL(ENTITY,'')) NOT LIKE UPPER(:nlike_0) \
         AND UPPER(NVL(ENTITY,'')) NOT LIKE UPPER(:nlike_1))"
    );
    assert_eq!(predicate.bind_params[0].1, "%ACME%");
    assert_eq!(predicate.bind_params[1].1, "%ORION%");
}

#[test]
fn explicit_wildcards_in_a_pattern_are_kept() {
    let settings = setup();
    let plan = compile("has: ENTITY = DS%H", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(predicate.bind_params[0].1, "DS%H");
}

#[test]
fn empty_and_not_empty_render_trim_nvl_checks() {
    let settings = setup();
    let plan = compile("empty: REPRESENTATIVE_EMAIL", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(
        predicate.sql_fragment,
        "(TRIM(NVL(REPRESENTATIVE_EMAIL,''))='')"
    );
    assert!(predicate.bind_params.is_empty(), "blank checks take no binds");

    let plan = compile("not_empty: REPRESENTATIVE_EMAIL", &settings).expect("compile ok");
    assert_eq!(
        plan.groups[0].predicates[0].sql_fragment,
        "(TRIM(NVL(REPRESENTATIVE_EMAIL,''))<>'')"
    );
}

#[test]
fn negated_fanout_tightens_with_and() {
    let settings = wide();
    let plan = compile("neq: DEPARTMENT != AL FARABI", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(predicate.sql_fragment.matches("NOT IN").count(), 9);
    assert_eq!(predicate.sql_fragment.matches(" AND ").count(), 8);
    assert!(!predicate.sql_fragment.contains(" OR "));
    assert_eq!(
        predicate.bind_params,
        vec![("neq_bg_0".to_string(), "AL FARABI".to_string())],
        "every fanned-out test shares one bind"
    );
}

#[test]
fn debug_text_inlines_binds_with_quote_doubling() {
    let settings = setup();
    let plan = compile("eq: ENTITY = DSFH", &settings).expect("compile ok");
    assert_eq!(
        plan.debug.where_text,
        "(UPPER(TRIM(ENTITY)) IN (UPPER(TRIM('DSFH'))))"
    );

    let plan = compile("eq: ENTITY = O'Neil Group", &settings).expect("compile ok");
    assert!(plan.debug.where_text.contains("'O''NEIL GROUP'"));
}

#[test]
fn query_binds_mirror_the_debug_binds() {
    let settings = setup();
    let plan = compile("fts: solar; eq: ENTITY = DSFH; top: 5", &settings).expect("compile ok");
    let query = render_select(&plan, &settings);
    assert_eq!(query.binds, plan.debug.binds_text);
}

#[test]
fn plain_select_takes_the_default_order() {
    let settings = setup();
    let plan = compile("eq: ENTITY = DSFH", &settings).expect("compile ok");
    let query = render_select(&plan, &settings);
    assert_eq!(
        query.sql,
        "SELECT * FROM \"Contract\" \
         WHERE (UPPER(TRIM(ENTITY)) IN (UPPER(TRIM(:eq_bg_0)))) \
         ORDER BY REQUEST_DATE DESC"
    );
}

#[test]
fn no_predicates_means_no_where_clause() {
    let settings = setup();
    let plan = compile("please review this contract", &settings).expect("compile ok");
    assert!(plan.groups.is_empty());
    let query = render_select(&plan, &settings);
    assert_eq!(query.sql, "SELECT * FROM \"Contract\" ORDER BY REQUEST_DATE DESC");
    assert!(query.binds.is_empty());
}

#[test]
fn grouped_gross_projection_sums_the_vat_adjusted_measure() {
    let settings = setup();
    let plan = compile("group_by: OWNER_DEPARTMENT; gross: true; top: 5", &settings)
        .expect("compile ok");
    let query = render_select(&plan, &settings);
    let expected_select = format!(
        "SELECT OWNER_DEPARTMENT AS GROUP_KEY, SUM({}) AS TOTAL_GROSS, COUNT(*) AS CNT",
        gross_expr(&settings)
    );
    assert!(query.sql.starts_with(&expected_select), "sql was: {}", query.sql);
    assert!(query.sql.contains("GROUP BY OWNER_DEPARTMENT"));
    assert!(query.sql.contains("ORDER BY TOTAL_GROSS DESC"));
    assert!(query.sql.ends_with("FETCH FIRST 5 ROWS ONLY"));
}

#[test]
fn grouped_net_projection_orders_by_count() {
    let settings = setup();
    let plan = compile("group_by: OWNER_DEPARTMENT", &settings).expect("compile ok");
    let query = render_select(&plan, &settings);
    assert_eq!(
        query.sql,
        "SELECT OWNER_DEPARTMENT AS GROUP_KEY, COUNT(*) AS CNT \
         FROM \"Contract\" GROUP BY OWNER_DEPARTMENT ORDER BY CNT DESC"
    );
}

#[test]
fn measure_alias_expands_in_an_ungrouped_order_by() {
    let settings = setup();
    let plan = compile("order_by: VALUE; gross: true", &settings).expect("compile ok");
    let query = render_select(&plan, &settings);
    let expected = format!("ORDER BY {} DESC", gross_expr(&settings));
    assert!(query.sql.ends_with(&expected), "sql was: {}", query.sql);

    let plan = compile("order_by: VALUE", &settings).expect("compile ok");
    let query = render_select(&plan, &settings);
    assert!(query.sql.ends_with("ORDER BY CONTRACT_VALUE_NET_OF_VAT DESC"));
}

#[test]
fn disabled_defaults_render_bare_comparisons() {
    let mut settings = setup();
    settings.default_ci = false;
    settings.default_trim = false;

    let plan = compile("eq: ENTITY = DSFH", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(predicate.sql_fragment, "(ENTITY IN (:eq_bg_0))");
    assert_eq!(predicate.bind_params[0].1, "DSFH");

    // A per-clause flag upgrades just that clause.
    let plan = compile("eq: ENTITY = dsfh (ci)", &settings).expect("compile ok");
    let predicate = &plan.groups[0].predicates[0];
    assert_eq!(predicate.sql_fragment, "(UPPER(ENTITY) IN (UPPER(:eq_bg_0)))");
    assert_eq!(predicate.bind_params[0].1, "DSFH");
}

#[test]
fn empty_allow_list_is_a_config_error() {
    let mut settings = setup();
    settings.allow_list.clear();
    let err = compile("eq: ENTITY = DSFH", &settings).expect_err("must refuse to compile");
    match err {
        CommentqlError::Config(message) => {
            assert!(message.contains("allow_list"), "message was: {message}");
        }
        other => panic!("expected a config error, got {other:?}"),
    }
}
