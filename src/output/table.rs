use std::borrow::Cow;

use comfy_table::{Cell, Color, Table, presets::ASCII_BORDERS_ONLY_CONDENSED};

use super::{FormatOptions, OutputFormatter, ResourceTable};

/// Maximum width for the labels column
const MAX_LABELS_WIDTH: usize = 60;

/// Columns that should have width limits in table mode
const WIDE_COLUMNS: &[&str] = &["Labels", "Status"];

/// Truncate a string to max_len chars, adding "..." if truncated
fn truncate_value(s: &str, max_len: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_len {
        Cow::Borrowed(s)
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        Cow::Owned(format!("{}...", truncated))
    }
}

pub struct TableFormatter;

impl OutputFormatter for TableFormatter {
    fn format(result: &ResourceTable, options: &FormatOptions) -> String {
        if result.is_empty() {
            return "No resources found.".to_string();
        }

        let mut table = Table::new();
        table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);

        let truncate_cols: Vec<bool> = result
            .columns
            .iter()
            .map(|col| WIDE_COLUMNS.contains(&col.as_str()))
            .collect();

        if !options.no_headers {
            table.set_header(&result.columns);
        }

        for (row, updating) in result.rows.iter().zip(&result.updating) {
            let cells: Vec<Cell> = row
                .iter()
                .enumerate()
                .map(|(idx, val)| {
                    let text = if truncate_cols[idx] {
                        truncate_value(val, MAX_LABELS_WIDTH)
                    } else {
                        Cow::Borrowed(val.as_str())
                    };
                    let cell = Cell::new(text);
                    // Still converging after a restart
                    if *updating { cell.fg(Color::Yellow) } else { cell }
                })
                .collect();
            table.add_row(cells);
        }

        let output = table.to_string();
        format!("{}\n({} rows)", output, result.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(columns: &[&str], row: Vec<String>) -> ResourceTable {
        ResourceTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: vec![row],
            updating: vec![false],
        }
    }

    #[test]
    fn test_truncate_value_short() {
        let result = truncate_value("hello", 10);
        assert_eq!(result, "hello");
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_value_too_long() {
        let long = "this is a very long string that needs truncation";
        let result = truncate_value(long, 20);
        assert!(result.ends_with("..."));
        assert!(result.chars().count() <= 20);
        assert!(matches!(result, Cow::Owned(_)));
    }

    #[test]
    fn test_truncate_value_unicode() {
        let unicode = "日本語テストです長い文字列";
        let result = truncate_value(unicode, 8);
        assert!(result.chars().count() <= 8);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_empty_table() {
        let table = ResourceTable {
            columns: vec!["Name".to_string()],
            rows: vec![],
            updating: vec![],
        };
        assert_eq!(
            TableFormatter::format(&table, &FormatOptions::default()),
            "No resources found."
        );
    }

    #[test]
    fn test_truncate_labels_column() {
        let table = table_with(&["Name", "Labels"], vec!["api".to_string(), "a".repeat(80)]);
        let output = TableFormatter::format(&table, &FormatOptions::default());
        assert!(!output.contains(&"a".repeat(80)));
        assert!(output.contains("..."));
        assert!(output.ends_with("(1 rows)"));
    }

    #[test]
    fn test_no_truncate_name_column() {
        let table = table_with(&["Name", "Labels"], vec!["a".repeat(80), "app: api".to_string()]);
        let output = TableFormatter::format(&table, &FormatOptions::default());
        assert!(output.contains(&"a".repeat(80)));
    }

    #[test]
    fn test_no_headers() {
        let table = table_with(&["Name"], vec!["api".to_string()]);
        let output = TableFormatter::format(&table, &FormatOptions { no_headers: true });
        assert!(!output.contains("Name"));
        assert!(output.contains("api"));
    }
}
