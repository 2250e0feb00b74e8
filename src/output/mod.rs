mod csv;
mod json;
mod table;
mod yaml;

pub use csv::CsvFormatter;
pub use json::JsonFormatter;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use std::collections::BTreeSet;

use crate::cli::OutputFormat;
use crate::dashboard::{ResourceRecord, ResourceType};

/// Labels shown before the "(+N more)" marker in compact mode
const VISIBLE_LABELS: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    pub no_headers: bool,
}

pub trait OutputFormatter {
    fn format(table: &ResourceTable, options: &FormatOptions) -> String;
}

/// How the labels cell is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    /// First two labels and a "(+N more)" marker
    Compact,
    /// Every label
    Full,
}

/// Resource list laid out as rows of strings
#[derive(Debug, Clone)]
pub struct ResourceTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows whose resource is still converging
    pub updating: Vec<bool>,
}

/// Column headers for a resource type
pub fn columns_for(resource_type: ResourceType) -> &'static [&'static str] {
    match resource_type {
        ResourceType::Deployment => &[
            "Namespace",
            "Resource Type",
            "Name",
            "Labels",
            "Ready",
            "UpToDate",
            "Age",
        ],
        ResourceType::StatefulSet => &[
            "Namespace",
            "Resource Type",
            "Name",
            "Labels",
            "Ready",
            "Age",
        ],
        ResourceType::Pod => &[
            "Namespace",
            "Resource Type",
            "Name",
            "Labels",
            "Ready",
            "Status",
            "Restarts",
            "Age",
        ],
    }
}

/// Render the labels cell
pub fn format_labels(record: &ResourceRecord, style: LabelStyle) -> String {
    if record.labels.is_empty() {
        return "No labels".to_string();
    }

    let pairs: Vec<String> = record
        .labels
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect();

    match style {
        LabelStyle::Full => pairs.join(", "),
        LabelStyle::Compact => {
            let hidden = pairs.len().saturating_sub(VISIBLE_LABELS);
            let visible = pairs[..pairs.len().min(VISIBLE_LABELS)].join(", ");
            if hidden > 0 {
                format!("{} (+{} more)", visible, hidden)
            } else {
                visible
            }
        }
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

impl ResourceTable {
    /// Lay out records of one type; a selection adds a leading "Select" column
    pub fn build(
        records: &[ResourceRecord],
        resource_type: ResourceType,
        selection: Option<&BTreeSet<String>>,
        labels: LabelStyle,
    ) -> Self {
        let mut columns: Vec<String> = Vec::new();
        if selection.is_some() {
            columns.push("Select".to_string());
        }
        columns.extend(columns_for(resource_type).iter().map(|c| c.to_string()));

        let rows = records
            .iter()
            .map(|record| {
                let mut row = Vec::with_capacity(columns.len());
                if let Some(selection) = selection {
                    let mark = if selection.contains(&record.name) { "[x]" } else { "[ ]" };
                    row.push(mark.to_string());
                }
                row.push(or_default(&record.namespace, "N/A"));
                row.push(record.resource_type.display_name().to_string());
                row.push(or_default(&record.name, "N/A"));
                row.push(format_labels(record, labels));
                row.push(or_default(&record.ready, "0"));
                match resource_type {
                    ResourceType::Deployment => {
                        row.push(or_default(record.up_to_date.as_deref().unwrap_or(""), "0"));
                    }
                    ResourceType::StatefulSet => {}
                    ResourceType::Pod => {
                        row.push(or_default(record.status.as_deref().unwrap_or(""), "N/A"));
                        row.push(record.restarts.unwrap_or(0).to_string());
                    }
                }
                row.push(or_default(&record.age, "0"));
                row
            })
            .collect();

        Self {
            columns,
            rows,
            updating: records.iter().map(|r| r.is_updating()).collect(),
        }
    }

    pub fn format(&self, format: &OutputFormat, no_headers: bool) -> String {
        let options = FormatOptions { no_headers };
        match format {
            OutputFormat::Table => TableFormatter::format(self, &options),
            OutputFormat::Json => JsonFormatter::format(self, &options),
            OutputFormat::Csv => CsvFormatter::format(self, &options),
            OutputFormat::Yaml => YamlFormatter::format(self, &options),
        }
    }

    /// Rows as column-name keyed objects
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(col, val)| (json_key(col), serde_json::Value::String(val.clone())))
                    .collect()
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// "Resource Type" -> "resource_type"
fn json_key(column: &str) -> String {
    column.to_lowercase().replace(' ', "_")
}

/// Render records in the requested format
pub fn render(
    records: &[ResourceRecord],
    resource_type: ResourceType,
    selection: Option<&BTreeSet<String>>,
    format: &OutputFormat,
    no_headers: bool,
) -> String {
    let labels = match format {
        OutputFormat::Table => LabelStyle::Compact,
        _ => LabelStyle::Full,
    };
    ResourceTable::build(records, resource_type, selection, labels).format(format, no_headers)
}

/// One-column table of plain values (namespaces, names)
pub fn render_list(
    column: &str,
    values: &[String],
    format: &OutputFormat,
    no_headers: bool,
) -> String {
    let table = ResourceTable {
        columns: vec![column.to_string()],
        rows: values.iter().map(|v| vec![v.clone()]).collect(),
        updating: vec![false; values.len()],
    };
    table.format(format, no_headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn pod(name: &str, labels: &[(&str, &str)]) -> ResourceRecord {
        ResourceRecord {
            name: name.to_string(),
            namespace: "prod".to_string(),
            resource_type: ResourceType::Pod,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            ready: "1/1".to_string(),
            status: Some("Running".to_string()),
            restarts: Some(4),
            up_to_date: None,
            age: "7d".to_string(),
        }
    }

    #[test]
    fn test_format_labels_compact() {
        let record = pod("a", &[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);
        assert_eq!(
            format_labels(&record, LabelStyle::Compact),
            "a: 1, b: 2 (+2 more)"
        );
        assert_eq!(
            format_labels(&record, LabelStyle::Full),
            "a: 1, b: 2, c: 3, d: 4"
        );
    }

    #[test]
    fn test_format_labels_empty_and_short() {
        assert_eq!(format_labels(&pod("a", &[]), LabelStyle::Compact), "No labels");
        assert_eq!(
            format_labels(&pod("a", &[("app", "web")]), LabelStyle::Compact),
            "app: web"
        );
    }

    #[test]
    fn test_build_pod_columns() {
        let table = ResourceTable::build(
            &[pod("web-0", &[("app", "web")])],
            ResourceType::Pod,
            None,
            LabelStyle::Compact,
        );
        assert_eq!(table.columns, columns_for(ResourceType::Pod));
        assert_eq!(
            table.rows[0],
            vec!["prod", "Pod", "web-0", "app: web", "1/1", "Running", "4", "7d"]
        );
        assert_eq!(table.updating, vec![false]);
    }

    #[test]
    fn test_build_with_selection() {
        let selection = BTreeSet::from(["b".to_string()]);
        let table = ResourceTable::build(
            &[pod("a", &[]), pod("b", &[])],
            ResourceType::Pod,
            Some(&selection),
            LabelStyle::Compact,
        );
        assert_eq!(table.columns[0], "Select");
        assert_eq!(table.rows[0][0], "[ ]");
        assert_eq!(table.rows[1][0], "[x]");
    }

    #[test]
    fn test_missing_fields_use_placeholders() {
        let mut record = pod("", &[]);
        record.resource_type = ResourceType::Deployment;
        record.ready = String::new();
        record.age = String::new();
        let table =
            ResourceTable::build(&[record], ResourceType::Deployment, None, LabelStyle::Full);
        assert_eq!(
            table.rows[0],
            vec!["prod", "Deployment", "N/A", "No labels", "0", "0", "0"]
        );
        assert_eq!(table.updating, vec![true]);
    }

    #[test]
    fn test_json_rows_keys() {
        let table = ResourceTable::build(
            &[pod("web-0", &[])],
            ResourceType::Pod,
            None,
            LabelStyle::Full,
        );
        let rows = table.to_json_rows();
        assert_eq!(rows[0]["resource_type"], "Pod");
        assert_eq!(rows[0]["name"], "web-0");
        assert_eq!(rows[0]["restarts"], "4");
    }

    #[test]
    fn test_render_list_csv() {
        let out = render_list(
            "Namespace",
            &["default".to_string(), "prod".to_string()],
            &OutputFormat::Csv,
            false,
        );
        assert_eq!(out, "Namespace\ndefault\nprod");
    }
}
