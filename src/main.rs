use commentql::compile::compile;
use commentql::error::{CommentqlError, Result};
use commentql::settings::PlannerSettings;
use commentql::sql::render_select;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compiles the comment given on the command line and prints the plan and
/// the rendered SELECT as pretty JSON. Settings come from an optional
/// `commentql` settings file in the working directory plus `COMMENTQL_*`
/// environment overrides.
fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: commentql <comment text>");
        eprintln!("example: commentql \"fts: home care; eq: ENTITY = DSFH; top: 10\"");
        std::process::exit(2);
    }
    let comment = args.join(" ");

    match run(&comment) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn run(comment: &str) -> Result<String> {
    let settings = PlannerSettings::load()?;
    let plan = compile(comment, &settings)?;
    let query = render_select(&plan, &settings);
    info!(binds = query.binds.len(), "select rendered");
    let out = serde_json::json!({ "plan": plan, "query": query });
    serde_json::to_string_pretty(&out).map_err(|e| CommentqlError::Invariant(e.to_string()))
}
