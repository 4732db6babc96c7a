use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use txrecon::ReconError;

// ---------------------------------------------------------------------------
// Top-level job
// ---------------------------------------------------------------------------

/// A reconciliation job: where each party's records come from, which of them
/// take part, and where results go.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub party1: PartyConfig,
    pub party2: PartyConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Parties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Json,
    Csv,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartyConfig {
    pub id: String,
    pub format: SourceFormat,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sftp: Option<SftpConfig>,
    /// JSON pointer to the record array inside the document.
    #[serde(default)]
    pub records_at: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub skip_missing: bool,
    #[serde(default = "default_trim")]
    pub trim: bool,
    /// Fail on values a time field cannot parse instead of passing them through.
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub time_fields: Vec<TimeFieldConfig>,
}

fn default_trim() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeFieldConfig {
    pub column: String,
    pub input: String,
    /// Defaults to RFC 3339.
    #[serde(default)]
    pub output: Option<String>,
}

/// A file on an SFTP server. Secrets are read from the environment, never
/// from the job file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SftpConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub user: String,
    pub remote_path: String,
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    /// Environment variable holding the private key passphrase.
    #[serde(default)]
    pub passphrase_env: Option<String>,
    /// Environment variable holding the password.
    #[serde(default)]
    pub password_env: Option<String>,
    /// Defaults to `~/.ssh/known_hosts`.
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
    #[serde(default)]
    pub trust_on_first_use: bool,
}

fn default_sftp_port() -> u16 {
    txrecon_io::sftp::DEFAULT_SFTP_PORT
}

impl SftpConfig {
    fn validate(&self, party: &str) -> Result<(), ReconError> {
        let invalid = |msg: &str| ReconError::ConfigValidation(format!("party '{party}': sftp {msg}"));
        if self.host.trim().is_empty() {
            return Err(invalid("host must not be empty"));
        }
        if self.user.trim().is_empty() {
            return Err(invalid("user must not be empty"));
        }
        if self.remote_path.trim().is_empty() {
            return Err(invalid("remote_path must not be empty"));
        }
        if self.port == 0 {
            return Err(invalid("port must be positive"));
        }
        if self.passphrase_env.is_some() && self.private_key.is_none() {
            return Err(invalid("passphrase_env requires private_key"));
        }
        Ok(())
    }
}

/// Where a party's bytes live, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Url(String),
    Sftp(SftpConfig),
}

impl PartyConfig {
    /// Resolved source; relative paths are taken from `base_dir`.
    pub fn source(&self, base_dir: &Path) -> Result<Source, ReconError> {
        match (&self.path, &self.url, &self.sftp) {
            (Some(path), None, None) => Ok(Source::Path(base_dir.join(path))),
            (None, Some(url), None) => Ok(Source::Url(url.clone())),
            (None, None, Some(sftp)) => Ok(Source::Sftp(sftp.clone())),
            (None, None, None) => Err(ReconError::ConfigValidation(format!(
                "party '{}': one of path, url or sftp is required",
                self.id
            ))),
            _ => Err(ReconError::ConfigValidation(format!(
                "party '{}': set only one of path, url or sftp",
                self.id
            ))),
        }
    }

    fn validate(&self, label: &str) -> Result<(), ReconError> {
        if self.id.trim().is_empty() {
            return Err(ReconError::ConfigValidation(format!("{label}: id must not be empty")));
        }

        if let Source::Sftp(sftp) = self.source(Path::new(""))? {
            sftp.validate(&self.id)?;
        }

        if !self.headers.is_empty() && self.url.is_none() {
            return Err(ReconError::ConfigValidation(format!(
                "party '{}': headers only apply to url sources",
                self.id
            )));
        }

        if let Some(pointer) = &self.records_at {
            if self.format != SourceFormat::Json {
                return Err(ReconError::ConfigValidation(format!(
                    "party '{}': records_at only applies to json sources",
                    self.id
                )));
            }
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(ReconError::ConfigValidation(format!(
                    "party '{}': records_at must be a JSON pointer like \"/data\", got \"{pointer}\"",
                    self.id
                )));
            }
        }

        if !self.time_fields.is_empty() && self.format != SourceFormat::Csv {
            return Err(ReconError::ConfigValidation(format!(
                "party '{}': time_fields only apply to csv sources",
                self.id
            )));
        }

        if self.timeout_secs == Some(0) {
            return Err(ReconError::ConfigValidation(format!(
                "party '{}': timeout_secs must be positive",
                self.id
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filter / output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Inclusive lower bound on transaction timestamps.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub party1_statuses: Option<Vec<String>>,
    #[serde(default)]
    pub party2_statuses: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Pretty JSON result set.
    #[serde(default)]
    pub json: Option<PathBuf>,
    /// One row per diff item.
    #[serde(default)]
    pub csv: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Parsing / validation
// ---------------------------------------------------------------------------

impl JobConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: JobConfig = toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        self.party1.validate("party1")?;
        self.party2.validate("party2")?;

        let mut ids = HashSet::new();
        for party in [&self.party1, &self.party2] {
            if !ids.insert(party.id.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate party id '{}'",
                    party.id
                )));
            }
        }

        if let (Some(start), Some(end)) = (self.filter.start, self.filter.end) {
            if start > end {
                return Err(ReconError::ConfigValidation(format!(
                    "filter start {start} is after end {end}"
                )));
            }
        }

        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("reconciliation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name = "Daily payouts"

[party1]
id = "ledger"
format = "json"
path = "transfers.json"

[party2]
id = "provider"
format = "csv"
path = "report.csv"
"#;

    fn with(extra: &str) -> String {
        format!("{MINIMAL}\n{extra}")
    }

    fn validation_error(input: &str) -> String {
        match JobConfig::from_toml(input) {
            Err(ReconError::ConfigValidation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = JobConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.display_name(), "Daily payouts");
        assert_eq!(config.party1.format, SourceFormat::Json);
        assert!(config.party2.trim);
        assert!(!config.party2.skip_missing);
        assert!(config.filter.start.is_none());
        assert!(config.output.json.is_none());
    }

    #[test]
    fn full_config_parses() {
        let input = r#"
[party1]
id = "ledger"
format = "json"
url = "https://ledger.example/transfers"
records_at = "/data"
timeout_secs = 5

[party1.headers]
Authorization = "Bearer x"

[party2]
id = "provider"
format = "csv"
path = "report.csv"
skip_missing = true
trim = false

[[party2.time_fields]]
column = "CREATION_DATE"
input = "%Y-%m-%d %H:%M:%S"

[filter]
start = "2024-05-01T00:00:00Z"
end = "2024-05-31T23:59:59Z"
party1_statuses = ["completed", "declined"]

[output]
json = "result.json"
csv = "items.csv"
"#;
        let config = JobConfig::from_toml(input).unwrap();
        assert_eq!(config.party1.headers["Authorization"], "Bearer x");
        assert_eq!(
            config.party1.source(Path::new("/jobs")).unwrap(),
            Source::Url("https://ledger.example/transfers".into())
        );
        assert_eq!(
            config.party2.source(Path::new("/jobs")).unwrap(),
            Source::Path(PathBuf::from("/jobs/report.csv"))
        );
        assert_eq!(config.party2.time_fields[0].column, "CREATION_DATE");
        assert_eq!(config.filter.party1_statuses.as_ref().unwrap().len(), 2);
        assert!(config.filter.party2_statuses.is_none());
        assert_eq!(config.output.csv.as_deref(), Some(Path::new("items.csv")));
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let err = JobConfig::from_toml(&with("[extra]\nfoo = 1")).unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn duplicate_party_ids_rejected() {
        let input = MINIMAL.replace("\"provider\"", "\"ledger\"");
        assert!(validation_error(&input).contains("duplicate party id"));
    }

    #[test]
    fn empty_party_id_rejected() {
        let input = MINIMAL.replace("\"provider\"", "\" \"");
        assert!(validation_error(&input).contains("party2"));
    }

    #[test]
    fn path_and_url_are_exclusive() {
        let input = MINIMAL.replace("path = \"report.csv\"", "path = \"report.csv\"\nurl = \"https://x\"");
        assert!(validation_error(&input).contains("only one of"));

        let input = MINIMAL.replace("path = \"report.csv\"", "");
        assert!(validation_error(&input).contains("required"));
    }

    #[test]
    fn records_at_requires_json() {
        let input = MINIMAL.replace("path = \"report.csv\"", "path = \"report.csv\"\nrecords_at = \"/data\"");
        assert!(validation_error(&input).contains("records_at"));
    }

    #[test]
    fn records_at_must_be_pointer() {
        let input = MINIMAL.replace("path = \"transfers.json\"", "path = \"transfers.json\"\nrecords_at = \"data\"");
        assert!(validation_error(&input).contains("JSON pointer"));
    }

    #[test]
    fn time_fields_require_csv() {
        let input = MINIMAL.replace(
            "path = \"transfers.json\"",
            "path = \"transfers.json\"\ntime_fields = [{ column = \"created_at\", input = \"%Y\" }]",
        );
        assert!(validation_error(&input).contains("time_fields"));
    }

    #[test]
    fn start_after_end_rejected() {
        let input = with("[filter]\nstart = \"2024-06-01T00:00:00Z\"\nend = \"2024-05-01T00:00:00Z\"");
        assert!(validation_error(&input).contains("after end"));
    }

    #[test]
    fn equal_bounds_allowed() {
        let input = with("[filter]\nstart = \"2024-06-01T00:00:00Z\"\nend = \"2024-06-01T00:00:00Z\"");
        assert!(JobConfig::from_toml(&input).is_ok());
    }

    const SFTP_PARTY2: &str = r#"
[party1]
id = "ledger"
format = "json"
path = "transfers.json"

[party2]
id = "provider"
format = "csv"

[party2.sftp]
host = "sftp.provider.example"
user = "recon"
remote_path = "/outbox/payouts.csv"
"#;

    #[test]
    fn sftp_source_gets_defaults() {
        let config = JobConfig::from_toml(SFTP_PARTY2).unwrap();
        match config.party2.source(Path::new("/jobs")).unwrap() {
            Source::Sftp(sftp) => {
                assert_eq!(sftp.host, "sftp.provider.example");
                assert_eq!(sftp.port, 22);
                assert_eq!(sftp.remote_path, "/outbox/payouts.csv");
                assert!(sftp.private_key.is_none());
                assert!(sftp.known_hosts.is_none());
                assert!(!sftp.trust_on_first_use);
            }
            other => panic!("expected sftp source, got {other:?}"),
        }
    }

    #[test]
    fn sftp_with_key_auth_parses() {
        let input = format!(
            "{SFTP_PARTY2}port = 2222\nprivate_key = \"~/.ssh/id_ed25519\"\npassphrase_env = \"SFTP_PASSPHRASE\"\nknown_hosts = \"known_hosts\"\ntrust_on_first_use = true\n"
        );
        let config = JobConfig::from_toml(&input).unwrap();
        let sftp = config.party2.sftp.unwrap();
        assert_eq!(sftp.port, 2222);
        assert_eq!(sftp.private_key.as_deref(), Some(Path::new("~/.ssh/id_ed25519")));
        assert_eq!(sftp.passphrase_env.as_deref(), Some("SFTP_PASSPHRASE"));
        assert!(sftp.trust_on_first_use);
    }

    #[test]
    fn sftp_rejects_inline_password() {
        let err = JobConfig::from_toml(&format!("{SFTP_PARTY2}password = \"hunter2\"\n")).unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn sftp_and_path_are_exclusive() {
        let input = SFTP_PARTY2.replace("format = \"csv\"", "format = \"csv\"\npath = \"report.csv\"");
        assert!(validation_error(&input).contains("only one of"));
    }

    #[test]
    fn sftp_fields_validated() {
        let input = SFTP_PARTY2.replace("host = \"sftp.provider.example\"", "host = \" \"");
        assert!(validation_error(&input).contains("host"));

        let input = SFTP_PARTY2.replace("user = \"recon\"", "user = \"\"");
        assert!(validation_error(&input).contains("user"));

        let input = format!("{SFTP_PARTY2}port = 0\n");
        assert!(validation_error(&input).contains("port"));

        let input = format!("{SFTP_PARTY2}passphrase_env = \"PP\"\n");
        assert!(validation_error(&input).contains("requires private_key"));
    }

    #[test]
    fn headers_require_url() {
        let input = with("[party2.headers]\nx-api-key = \"k\"");
        assert!(validation_error(&input).contains("headers"));
    }
}
