/// Minimal CSV writer for list exports. Fields containing the delimiter, a
/// quote, or a line break are quoted with doubled inner quotes (RFC 4180).
pub struct CsvBuilder {
    out: String,
    columns: usize,
}

impl CsvBuilder {
    pub fn new(header: &[&str]) -> Self {
        let mut builder = Self {
            out: String::new(),
            columns: header.len(),
        };
        builder.push_row(header.iter().map(|s| s.to_string()));
        builder
    }

    pub fn push_row<I>(&mut self, row: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut count = 0;
        for (i, field) in row.into_iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.out.push_str(&escape(&field));
            count += 1;
        }
        debug_assert_eq!(count, self.columns, "row width mismatch");
        self.out.push_str("\r\n");
    }

    pub fn finish(self) -> String {
        self.out
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_pass_through() {
        let mut csv = CsvBuilder::new(&["id", "status"]);
        csv.push_row(["1".into(), "pending".into()]);
        assert_eq!(csv.finish(), "id,status\r\n1,pending\r\n");
    }

    #[test]
    fn quotes_fields_with_delimiters_and_quotes() {
        let mut csv = CsvBuilder::new(&["remarks"]);
        csv.push_row(["needs \"manager\" sign-off, resubmit".into()]);
        assert_eq!(
            csv.finish(),
            "remarks\r\n\"needs \"\"manager\"\" sign-off, resubmit\"\r\n"
        );
    }

    #[test]
    fn newlines_are_quoted() {
        let mut csv = CsvBuilder::new(&["remarks"]);
        csv.push_row(["line1\nline2".into()]);
        assert_eq!(csv.finish(), "remarks\r\n\"line1\nline2\"\r\n");
    }
}
