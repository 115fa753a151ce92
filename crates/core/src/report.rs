//! Tabular report model and CSV rendering.

/// An ordered table of output rows: one header, zero or more fixed-width rows.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Report {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as CSV. A field is wrapped in quotes (with internal quotes
    /// doubled) iff it contains a comma, quote, or newline.
    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(csv_line(&self.header));
        for row in &self.rows {
            lines.push(csv_line(row));
        }
        lines.join("\n")
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line(fields: &[String]) -> String {
    fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_are_unquoted() {
        assert_eq!(csv_field("BR123"), "BR123");
        assert_eq!(csv_field(""), "");
    }

    #[test]
    fn special_fields_are_quoted_with_doubled_quotes() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line1\nline2"), "\"line1\nline2\"");
    }

    #[test]
    fn report_renders_header_then_rows() {
        let mut report = Report::new(&["A", "B"]);
        report.push_row(vec!["1".into(), "x,y".into()]);
        assert_eq!(report.to_csv(), "A,B\n1,\"x,y\"");
        assert_eq!(report.len(), 1);
    }
}
