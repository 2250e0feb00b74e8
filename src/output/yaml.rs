use super::{FormatOptions, OutputFormatter, ResourceTable};

pub struct YamlFormatter;

impl OutputFormatter for YamlFormatter {
    fn format(table: &ResourceTable, _options: &FormatOptions) -> String {
        let rows = table.to_json_rows();
        serde_yaml::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
    }
}
