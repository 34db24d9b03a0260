//! Renders a [`BooleanPlan`] into one executable SELECT statement.
//!
//! The Oracle-flavored output pairs a SQL string holding only `:named`
//! placeholders with the ordered bind list. Callers that assemble their own
//! queries can ignore this module and read the plan directly.

use serde::Serialize;

use crate::plan::{BooleanPlan, Direction};
use crate::settings::PlannerSettings;

/// A rendered statement plus the binds it expects, in order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SqlQuery {
    pub sql: String,
    pub binds: Vec<(String, String)>,
}

/// The VAT-adjusted gross measure over the configured net column.
pub fn gross_expr(settings: &PlannerSettings) -> String {
    let net = &settings.net_measure_column;
    format!(
        "NVL({net},0) + CASE WHEN NVL(VAT,0) BETWEEN 0 AND 1 \
         THEN NVL({net},0) * NVL(VAT,0) ELSE NVL(VAT,0) END"
    )
}

/// Builds `SELECT ... FROM ... [WHERE] [GROUP BY] ORDER BY ... [FETCH]`.
pub fn render_select(plan: &BooleanPlan, settings: &PlannerSettings) -> SqlQuery {
    let select_clause = build_select_clause(plan, settings);
    let from_clause = format!(" FROM {}", quote_table(&settings.table));
    let where_fragment = plan.where_fragment();
    let where_clause = if where_fragment.is_empty() {
        String::new()
    } else {
        format!(" WHERE {where_fragment}")
    };
    let group_clause = if plan.group_by.is_empty() {
        String::new()
    } else {
        format!(" GROUP BY {}", plan.group_by.join(", "))
    };
    let (order_column, order_direction) = resolve_order(plan, settings);
    let order_clause = format!(" ORDER BY {order_column} {order_direction}");
    let mut sql =
        format!("SELECT {select_clause}{from_clause}{where_clause}{group_clause}{order_clause}");
    if let Some(limit) = &plan.limit {
        sql = format!("{sql}\nFETCH FIRST {} ROWS ONLY", limit.count);
    }
    SqlQuery {
        sql,
        binds: plan.binds(),
    }
}

fn build_select_clause(plan: &BooleanPlan, settings: &PlannerSettings) -> String {
    if plan.group_by.is_empty() {
        return "*".to_string();
    }
    let mut columns: Vec<String> = Vec::new();
    for (i, column) in plan.group_by.iter().enumerate() {
        if i == 0 {
            columns.push(format!("{column} AS GROUP_KEY"));
        } else {
            columns.push(column.clone());
        }
    }
    if plan.gross {
        columns.push(format!("SUM({}) AS TOTAL_GROSS", gross_expr(settings)));
    }
    columns.push("COUNT(*) AS CNT".to_string());
    columns.join(", ")
}

/// ORDER BY is always present: the explicit order, else the limit's
/// bias, else a default. Grouped queries default to their measure alias
/// since the plain default column is not in the projection.
fn resolve_order(plan: &BooleanPlan, settings: &PlannerSettings) -> (String, Direction) {
    if let Some(order) = &plan.order {
        return (
            map_order_column(&order.column, plan, settings),
            order.direction,
        );
    }
    if let Some(limit) = &plan.limit {
        return (
            map_order_column(&limit.column, plan, settings),
            limit.direction,
        );
    }
    if !plan.group_by.is_empty() {
        let column = if plan.gross { "TOTAL_GROSS" } else { "CNT" };
        return (column.to_string(), Direction::Desc);
    }
    (settings.default_order_column.clone(), Direction::Desc)
}

/// Measure-style and group-style sort tokens map onto what the projection
/// actually exposes.
fn map_order_column(column: &str, plan: &BooleanPlan, settings: &PlannerSettings) -> String {
    let upper = column.to_uppercase();
    if !plan.group_by.is_empty() {
        return match upper.as_str() {
            "GROUP" | "GROUP_KEY" => "GROUP_KEY".to_string(),
            "TOTAL_GROSS" | "TOTAL" | "VALUE" | "MEASURE" => {
                if plan.gross {
                    "TOTAL_GROSS".to_string()
                } else {
                    "CNT".to_string()
                }
            }
            _ if upper == settings.net_measure_column => {
                if plan.gross {
                    "TOTAL_GROSS".to_string()
                } else {
                    "CNT".to_string()
                }
            }
            _ => column.to_string(),
        };
    }
    match upper.as_str() {
        "TOTAL_GROSS" | "TOTAL" | "VALUE" | "MEASURE" => {
            if plan.gross {
                gross_expr(settings)
            } else {
                settings.net_measure_column.clone()
            }
        }
        _ => column.to_string(),
    }
}

/// Double-quotes the table name; dotted names quote each part.
fn quote_table(name: &str) -> String {
    let text = name.trim();
    if text.is_empty() {
        return "\"Contract\"".to_string();
    }
    if text.starts_with('"') && text.ends_with('"') {
        return text.to_string();
    }
    if text.contains('.') {
        return text
            .split('.')
            .filter(|part| !part.is_empty())
            .map(quote_table)
            .collect::<Vec<String>>()
            .join(".");
    }
    format!("\"{}\"", text.trim_matches('"'))
}
