use crate::models::internal::{ChartKind, ChartSuggestion, ExecutionResult};

const TIME_TYPES: [&str; 3] = ["DATE", "DATETIME", "TIMESTAMP"];
const NUMERIC_TYPES: [&str; 6] = ["INTEGER", "INT64", "FLOAT", "FLOAT64", "NUMERIC", "BIGNUMERIC"];

pub fn generate_insights(result: &ExecutionResult) -> String {
    if result.rows_returned == 0 {
        return "No results found for your query.".to_string();
    }
    format!("Query returned {} row(s). ", result.rows_returned)
}

/// Picks a chart from the shape of the result set.
pub fn suggest_chart(result: &ExecutionResult) -> Option<ChartSuggestion> {
    let schema = &result.schema;
    if result.rows_returned == 0 || schema.is_empty() {
        return None;
    }

    match schema.len() {
        1 => Some(ChartSuggestion::new(ChartKind::Metric, "Single Value")),
        2 => {
            let first = schema[0].data_type.as_str();
            let second = schema[1].data_type.as_str();
            if TIME_TYPES.contains(&first) {
                Some(ChartSuggestion::new(ChartKind::Line, "Trend Over Time"))
            } else if first == "STRING" && NUMERIC_TYPES.contains(&second) {
                Some(ChartSuggestion::new(ChartKind::Bar, "Comparison"))
            } else {
                Some(ChartSuggestion::new(ChartKind::Table, "Data View"))
            }
        }
        _ => Some(ChartSuggestion::new(ChartKind::Table, "Data Table")),
    }
}
