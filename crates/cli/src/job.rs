//! Wires a validated `JobConfig` into readers, collections, filters and the
//! payout comparator, then runs one reconciliation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use txrecon::{
    AllPass, CancelToken, MemoryCollection, ReconError, ReconResultSet, Reconciler, RecordReader, TimestampFilter,
};
use txrecon_io::{
    expand_tilde, CsvReader, HttpResource, JsonReader, LocalResource, Resource, SftpAuth, SftpResource, TimeTransformer,
};
use txrecon_parties::{Payout, PayoutComparator, StatusFilter, Transfer};

use crate::config::{FilterConfig, JobConfig, PartyConfig, SftpConfig, Source, SourceFormat};

pub type BoxedReader<T> = Box<dyn RecordReader<Record = T>>;

fn secret_from_env(party: &str, var: Option<&str>) -> Result<Option<String>, ReconError> {
    let Some(var) = var else {
        return Ok(None);
    };
    std::env::var(var).map(Some).map_err(|_| {
        ReconError::ConfigValidation(format!("party '{party}': environment variable {var} is not set"))
    })
}

/// `~` expands to home; other relative paths are taken from `base_dir`.
fn local_path(path: &Path, base_dir: &Path) -> PathBuf {
    base_dir.join(expand_tilde(path))
}

fn sftp_resource(party: &PartyConfig, sftp: &SftpConfig, base_dir: &Path) -> Result<SftpResource, ReconError> {
    let private_key = sftp.private_key.as_deref().map(|p| local_path(p, base_dir));
    let passphrase = secret_from_env(&party.id, sftp.passphrase_env.as_deref())?;
    let password = secret_from_env(&party.id, sftp.password_env.as_deref())?;
    let auth = SftpAuth::resolve(private_key.as_deref(), passphrase.as_deref(), password.as_deref());
    log::debug!("party '{}': sftp auth {:?}", party.id, auth);

    let mut resource = SftpResource::new(sftp.host.as_str(), sftp.user.as_str(), sftp.remote_path.as_str())
        .with_port(sftp.port)
        .with_auth(auth)
        .trust_on_first_use(sftp.trust_on_first_use);
    if let Some(known_hosts) = &sftp.known_hosts {
        resource = resource.with_known_hosts(local_path(known_hosts, base_dir));
    }
    if let Some(secs) = party.timeout_secs {
        resource = resource.with_timeout(Duration::from_secs(secs));
    }
    Ok(resource)
}

fn resource_for(party: &PartyConfig, base_dir: &Path) -> Result<Box<dyn Resource>, ReconError> {
    let resource: Box<dyn Resource> = match party.source(base_dir)? {
        Source::Path(path) => Box::new(LocalResource::new(path)),
        Source::Url(url) => {
            let mut http = HttpResource::new(url);
            for (name, value) in &party.headers {
                http = http.with_header(name, value);
            }
            if let Some(secs) = party.timeout_secs {
                http = http.with_timeout(Duration::from_secs(secs));
            }
            Box::new(http)
        }
        Source::Sftp(sftp) => Box::new(sftp_resource(party, &sftp, base_dir)?),
    };
    Ok(resource)
}

/// Record reader for one party, decoding `T` in the configured format.
pub fn reader_for<T>(party: &PartyConfig, base_dir: &Path) -> Result<BoxedReader<T>, ReconError>
where
    T: DeserializeOwned + 'static,
{
    let resource = resource_for(party, base_dir)?;
    let reader: BoxedReader<T> = match party.format {
        SourceFormat::Json => {
            let mut reader = JsonReader::<T, _>::new(resource);
            if let Some(pointer) = &party.records_at {
                reader = reader.records_at(pointer.as_str());
            }
            Box::new(reader)
        }
        SourceFormat::Csv => {
            let mut reader = CsvReader::<T, _>::new(resource)
                .trim(party.trim)
                .strict(party.strict)
                .skip_missing(party.skip_missing);
            for field in &party.time_fields {
                let mut transformer = TimeTransformer::new(field.input.as_str());
                if let Some(output) = &field.output {
                    transformer = transformer.with_output(output.as_str());
                }
                reader = reader.transform(field.column.as_str(), transformer);
            }
            Box::new(reader)
        }
    };
    Ok(reader)
}

pub fn filter_for(config: &FilterConfig) -> AllPass {
    let mut filter = AllPass::new();
    if config.start.is_some() || config.end.is_some() {
        filter = filter.with(TimestampFilter::new(config.start, config.end));
    }
    if let Some(statuses) = &config.party1_statuses {
        filter = filter.with(StatusFilter::<Transfer>::new(statuses.iter().cloned()));
    }
    if let Some(statuses) = &config.party2_statuses {
        filter = filter.with(StatusFilter::<Payout>::new(statuses.iter().cloned()));
    }
    filter
}

/// Build and run the job. Party 1 is read as ledger transfers, party 2 as
/// provider payouts.
pub fn run(config: &JobConfig, base_dir: &Path, cancel: &CancelToken) -> Result<ReconResultSet, ReconError> {
    let party1 = MemoryCollection::new(
        config.party1.id.as_str(),
        reader_for::<Transfer>(&config.party1, base_dir)?,
    );
    let party2 = MemoryCollection::new(
        config.party2.id.as_str(),
        reader_for::<Payout>(&config.party2, base_dir)?,
    );

    let mut builder = Reconciler::builder()
        .party_ids(config.party1.id.as_str(), config.party2.id.as_str())
        .party1(party1)
        .party2(party2)
        .comparator(PayoutComparator::new());

    let filter = filter_for(&config.filter);
    if !filter.is_empty() {
        builder = builder.filter(filter);
    }

    log::info!("running '{}'", config.display_name());
    builder.build()?.process(cancel)
}
