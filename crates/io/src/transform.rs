// Per-column value rewriting applied to raw CSV cells before deserialization

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Rewrites a single cell value.
pub trait FieldTransformer {
    fn transform(&self, value: &str) -> Result<String, String>;
}

impl<F> FieldTransformer for F
where
    F: Fn(&str) -> Result<String, String>,
{
    fn transform(&self, value: &str) -> Result<String, String> {
        self(value)
    }
}

/// Reformats a timestamp from one chrono format to another.
///
/// Inputs without an offset are taken as UTC. With no output format the value
/// becomes RFC 3339, which is what `DateTime<Utc>` fields deserialize from.
#[derive(Debug, Clone)]
pub struct TimeTransformer {
    input: String,
    output: Option<String>,
}

impl TimeTransformer {
    pub fn new(input: impl Into<String>) -> Self {
        Self { input: input.into(), output: None }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    fn parse(&self, value: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_str(value, &self.input) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, &self.input) {
            return Ok(naive.and_utc());
        }
        // Date-only formats
        NaiveDate::parse_from_str(value, &self.input)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or_else(|| format!("'{}' does not match format '{}'", value, self.input))
    }
}

impl FieldTransformer for TimeTransformer {
    fn transform(&self, value: &str) -> Result<String, String> {
        let ts = self.parse(value)?;
        Ok(match &self.output {
            Some(fmt) => ts.format(fmt).to_string(),
            None => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        })
    }
}
