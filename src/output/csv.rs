use super::{FormatOptions, OutputFormatter, ResourceTable};

pub struct CsvFormatter;

fn escape(val: &str) -> String {
    if val.contains(',') || val.contains('"') || val.contains('\n') {
        format!("\"{}\"", val.replace('"', "\"\""))
    } else {
        val.to_string()
    }
}

impl OutputFormatter for CsvFormatter {
    fn format(table: &ResourceTable, options: &FormatOptions) -> String {
        let mut lines = Vec::new();

        if !options.no_headers {
            let header: Vec<String> = table.columns.iter().map(|c| escape(c)).collect();
            lines.push(header.join(","));
        }

        for row in &table.rows {
            let escaped: Vec<String> = row.iter().map(|val| escape(val)).collect();
            lines.push(escaped.join(","));
        }

        lines.join("\n")
    }
}
