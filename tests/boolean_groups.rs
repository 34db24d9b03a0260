use commentql::compile::compile;
use commentql::settings::PlannerSettings;

fn setup() -> PlannerSettings {
    // Defaults plus the fan-out targets, so alias expansion survives
    // validation in full.
    let mut settings = PlannerSettings::default();
    let extra: Vec<String> = (1..=8)
        .map(|n| format!("DEPARTMENT_{n}"))
        .chain((1..=8).map(|n| format!("CONTRACT_STAKEHOLDER_{n}")))
        .collect();
    settings.allow_list.extend(extra);
    settings
}

#[test]
fn multi_value_eq_compiles_to_one_in_list() {
    let settings = PlannerSettings::default();
    let plan = compile("eq: ENTITY = DSFH or AL FARABI", &settings).expect("compile ok");
    assert_eq!(plan.groups.len(), 1);
    assert_eq!(plan.groups[0].predicates.len(), 1);
    let fragment = &plan.groups[0].predicates[0].sql_fragment;
    assert_eq!(
        fragment,
        "(UPPER(TRIM(ENTITY)) IN (UPPER(TRIM(:eq_bg_0)), UPPER(TRIM(:eq_bg_1))))"
    );
    assert!(
        !fragment.contains(" = "),
        "a 2-value list must not fall back to OR-chained equality"
    );
    assert_eq!(
        plan.binds(),
        vec![
            ("eq_bg_0".to_string(), "DSFH".to_string()),
            ("eq_bg_1".to_string(), "AL FARABI".to_string())
        ]
    );
}

#[test]
fn or_marker_opens_a_second_group() {
    let settings = setup();
    let plan = compile(
        "fts: it or home care; eq: ENTITY = DSFH; group: or; eq: department = AL FARABI",
        &settings,
    )
    .expect("compile ok");
    assert_eq!(plan.groups.len(), 2, "marker should split into two groups");
    assert_eq!(
        plan.groups[0].predicates.len(),
        2,
        "first group holds the FTS and the ENTITY filter"
    );
    assert_eq!(plan.groups[1].predicates.len(), 1);

    // Group 2 fans AL FARABI out across all nine department columns with
    // one shared bind.
    let fanned = &plan.groups[1].predicates[0].sql_fragment;
    assert_eq!(fanned.matches(":eq_bg_1").count(), 9);
    assert!(fanned.contains("UPPER(TRIM(DEPARTMENT_1)) IN (UPPER(TRIM(:eq_bg_1)))"));
    assert!(fanned.contains("UPPER(TRIM(OWNER_DEPARTMENT)) IN (UPPER(TRIM(:eq_bg_1)))"));
    assert_eq!(plan.groups[1].predicates[0].bind_params.len(), 1);

    // AND inside a group, OR across groups.
    let where_sql = plan.where_fragment();
    assert!(where_sql.contains(" AND (UPPER(TRIM(ENTITY)) IN"));
    assert!(where_sql.contains(") OR ("));

    assert_eq!(plan.debug.blocks.len(), 2);
    assert_eq!(plan.debug.blocks[0].id, "A");
    assert_eq!(plan.debug.blocks[1].id, "B");
    assert_eq!(
        plan.debug.summary,
        "(FTS(it OR home care) AND ENTITY = (DSFH)) OR (DEPARTMENT = (AL FARABI))"
    );
}

#[test]
fn leading_marker_is_a_noop() {
    let settings = PlannerSettings::default();
    let plan = compile("group: or; eq: ENTITY = DSFH", &settings).expect("compile ok");
    assert_eq!(plan.groups.len(), 1);
}

#[test]
fn trailing_marker_is_a_noop() {
    let settings = PlannerSettings::default();
    let plan = compile("eq: ENTITY = DSFH; group: or", &settings).expect("compile ok");
    assert_eq!(plan.groups.len(), 1);
}

#[test]
fn consecutive_markers_collapse_to_one_boundary() {
    let settings = PlannerSettings::default();
    let plan = compile(
        "eq: ENTITY = DSFH; group: or; group: or; eq: CONTRACT_OWNER = Ahmad",
        &settings,
    )
    .expect("compile ok");
    assert_eq!(plan.groups.len(), 2, "double marker must not open an empty group");
}

#[test]
fn bind_names_stay_unique_across_the_whole_plan() {
    let settings = setup();
    let plan = compile(
        "fts: solar; eq: ENTITY = DSFH or NUPCO; contains: CONTRACT_OWNER = Ali; \
         group: or; eq: department = HR; neq: REQUEST_TYPE = Renewal",
        &settings,
    )
    .expect("compile ok");
    let binds = plan.binds();
    let names: Vec<&str> = binds.iter().map(|(name, _)| name.as_str()).collect();
    let mut deduped = names.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), names.len(), "bind names must be unique: {names:?}");
    assert_eq!(
        names,
        vec!["fts_0", "eq_bg_0", "eq_bg_1", "like_0", "eq_bg_2", "neq_bg_0"],
        "bind names follow source order with per-prefix counters"
    );
}

#[test]
fn same_input_compiles_to_identical_plans() {
    let settings = setup();
    let comment = "fts: it or home care; eq: ENTITY = DSFH; group: or; eq: department = AL FARABI; top: 5";
    let first = compile(comment, &settings).expect("compile ok");
    let second = compile(comment, &settings).expect("compile ok");
    assert_eq!(first, second);
    let first_json = serde_json::to_string(&first).expect("serialize");
    let second_json = serde_json::to_string(&second).expect("serialize");
    assert_eq!(first_json, second_json, "plans must be byte-identical");
}
