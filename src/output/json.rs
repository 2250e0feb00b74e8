use super::{FormatOptions, OutputFormatter, ResourceTable};

pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format(table: &ResourceTable, _options: &FormatOptions) -> String {
        let rows = table.to_json_rows();
        serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
    }
}
