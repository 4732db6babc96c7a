// Remote file on an SFTP server, read over an ssh2 session

use std::fmt;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ssh2::{CheckResult, ErrorCode, HashType, HostKeyType, KnownHostFileKind, KnownHostKeyFormat, Session};
use txrecon::{IoOperation, ReconError};

use crate::resource::{not_opened, Resource, DEFAULT_REQUEST_TIMEOUT};

pub const DEFAULT_SFTP_PORT: u16 = 22;
pub const DEFAULT_KNOWN_HOSTS: &str = "~/.ssh/known_hosts";

// LIBSSH2_FX_NO_SUCH_FILE
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[derive(Clone, PartialEq, Eq)]
pub enum SftpAuth {
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
    Password(String),
    Agent,
}

impl SftpAuth {
    /// A private key wins over a password; with neither, ssh-agent is tried.
    pub fn resolve(private_key: Option<&Path>, passphrase: Option<&str>, password: Option<&str>) -> Self {
        if let Some(path) = private_key {
            return Self::PrivateKey {
                path: path.to_path_buf(),
                passphrase: passphrase.map(str::to_string),
            };
        }
        match password {
            Some(pw) => Self::Password(pw.to_string()),
            None => Self::Agent,
        }
    }
}

// secrets stay out of logs
impl fmt::Debug for SftpAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrivateKey { path, passphrase } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "***"))
                .finish(),
            Self::Password(_) => f.write_str("Password(***)"),
            Self::Agent => f.write_str("Agent"),
        }
    }
}

fn authenticate(session: &Session, username: &str, auth: &SftpAuth) -> Result<(), String> {
    match auth {
        SftpAuth::PrivateKey { path, passphrase } => {
            session
                .userauth_pubkey_file(username, None, path, passphrase.as_deref())
                .map_err(|e| format!("public key auth failed: {e}"))?;
        }
        SftpAuth::Agent => {
            session
                .userauth_agent(username)
                .map_err(|e| format!("ssh-agent auth failed: {e}"))?;
        }
        SftpAuth::Password(pw) => {
            session
                .userauth_password(username, pw)
                .map_err(|e| format!("password auth failed: {e}"))?;
        }
    }

    if !session.authenticated() {
        return Err("session not authenticated after auth attempt".to_string());
    }
    Ok(())
}

/// known_hosts entry name; OpenSSH brackets non-default ports.
fn host_entry(host: &str, port: u16) -> String {
    if port == DEFAULT_SFTP_PORT {
        host.to_string()
    } else {
        format!("[{host}]:{port}")
    }
}

fn key_format(key_type: HostKeyType) -> Option<KnownHostKeyFormat> {
    match key_type {
        HostKeyType::Rsa => Some(KnownHostKeyFormat::SshRsa),
        HostKeyType::Dss => Some(KnownHostKeyFormat::SshDss),
        HostKeyType::Ed25519 => Some(KnownHostKeyFormat::Ed25519),
        HostKeyType::Ecdsa256 => Some(KnownHostKeyFormat::Ecdsa256),
        HostKeyType::Ecdsa384 => Some(KnownHostKeyFormat::Ecdsa384),
        HostKeyType::Ecdsa521 => Some(KnownHostKeyFormat::Ecdsa521),
        _ => None,
    }
}

fn fingerprint(session: &Session) -> String {
    match session.host_key_hash(HashType::Sha256) {
        Some(hash) => {
            let hex: String = hash.iter().map(|b| format!("{b:02x}")).collect();
            format!("sha256:{hex}")
        }
        None => "unknown".to_string(),
    }
}

fn timeout_ms(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

struct Connection {
    file: ssh2::File,
    sftp: ssh2::Sftp,
    session: Session,
}

/// A single remote file, opened read-only.
///
/// The server's host key must already be in `known_hosts` unless
/// `trust_on_first_use` is set, in which case an unknown key is added and
/// saved. A changed key is always refused.
pub struct SftpResource {
    id: String,
    host: String,
    port: u16,
    username: String,
    remote_path: String,
    auth: SftpAuth,
    known_hosts: PathBuf,
    trust_on_first_use: bool,
    timeout: Duration,
    conn: Option<Connection>,
}

impl SftpResource {
    pub fn new(host: impl Into<String>, username: impl Into<String>, remote_path: impl Into<String>) -> Self {
        let mut resource = Self {
            id: String::new(),
            host: host.into(),
            port: DEFAULT_SFTP_PORT,
            username: username.into(),
            remote_path: remote_path.into(),
            auth: SftpAuth::Agent,
            known_hosts: expand_tilde(Path::new(DEFAULT_KNOWN_HOSTS)),
            trust_on_first_use: false,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            conn: None,
        };
        resource.refresh_id();
        resource
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self.refresh_id();
        self
    }

    pub fn with_auth(mut self, auth: SftpAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts = path.into();
        self
    }

    pub fn trust_on_first_use(mut self, trust: bool) -> Self {
        self.trust_on_first_use = trust;
        self
    }

    /// Applies to the TCP connect and to every blocking ssh call after it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn refresh_id(&mut self) {
        let sep = if self.remote_path.starts_with('/') { "" } else { "/" };
        self.id = format!("sftp://{}@{}:{}{sep}{}", self.username, self.host, self.port, self.remote_path);
    }

    fn open_error(&self, message: impl Into<String>) -> ReconError {
        ReconError::Io {
            operation: IoOperation::Open,
            resource: self.id.clone(),
            message: message.into(),
            not_found: false,
        }
    }

    fn connect(&self) -> Result<Session, ReconError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| self.open_error(format!("cannot resolve {}:{}: {e}", self.host, self.port)))?
            .next()
            .ok_or_else(|| self.open_error(format!("no address for {}:{}", self.host, self.port)))?;

        let tcp = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| self.open_error(format!("TCP connection to {addr} failed: {e}")))?;

        let mut session = Session::new().map_err(|e| self.open_error(format!("cannot create SSH session: {e}")))?;
        session.set_timeout(timeout_ms(self.timeout));
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| self.open_error(format!("SSH handshake with {addr} failed: {e}")))?;

        self.verify_host_key(&session)?;

        authenticate(&session, &self.username, &self.auth)
            .map_err(|m| self.open_error(format!("authentication failed for {}@{}: {m}", self.username, self.host)))?;
        Ok(session)
    }

    fn verify_host_key(&self, session: &Session) -> Result<(), ReconError> {
        let (key, key_type) = session
            .host_key()
            .ok_or_else(|| self.open_error("server did not present a host key"))?;
        let fingerprint = fingerprint(session);

        let mut known_hosts = session
            .known_hosts()
            .map_err(|e| self.open_error(format!("cannot init known hosts: {e}")))?;
        if self.known_hosts.exists() {
            known_hosts
                .read_file(&self.known_hosts, KnownHostFileKind::OpenSSH)
                .map_err(|e| self.open_error(format!("cannot read {}: {e}", self.known_hosts.display())))?;
        }

        match known_hosts.check_port(&self.host, self.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::NotFound if self.trust_on_first_use => {
                let format = key_format(key_type)
                    .ok_or_else(|| self.open_error(format!("unsupported host key type {key_type:?}")))?;
                known_hosts
                    .add(&host_entry(&self.host, self.port), key, "", format)
                    .map_err(|e| self.open_error(format!("cannot add host key: {e}")))?;
                if let Some(parent) = self.known_hosts.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| self.open_error(format!("cannot create {}: {e}", parent.display())))?;
                }
                known_hosts
                    .write_file(&self.known_hosts, KnownHostFileKind::OpenSSH)
                    .map_err(|e| self.open_error(format!("cannot write {}: {e}", self.known_hosts.display())))?;
                log::warn!(
                    "trusted new host key {} for {}:{}, saved to {}",
                    fingerprint,
                    self.host,
                    self.port,
                    self.known_hosts.display()
                );
                Ok(())
            }
            CheckResult::NotFound => Err(self.open_error(format!(
                "host key {fingerprint} for {}:{} is not in {}; add it or enable trust_on_first_use",
                self.host,
                self.port,
                self.known_hosts.display()
            ))),
            CheckResult::Mismatch => Err(self.open_error(format!(
                "host key mismatch for {}:{}: presented {fingerprint} differs from {}",
                self.host,
                self.port,
                self.known_hosts.display()
            ))),
            CheckResult::Failure => Err(self.open_error(format!(
                "host key check failed for {}:{}",
                self.host, self.port
            ))),
        }
    }
}

fn disconnect(session: &Session, id: &str) -> Result<(), ssh2::Error> {
    let result = session.disconnect(None, "closing", None);
    if let Err(e) = &result {
        log::debug!("'{id}': disconnect failed: {e}");
    }
    result
}

impl Resource for SftpResource {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&mut self) -> Result<(), ReconError> {
        if self.conn.is_some() {
            log::warn!("resource '{}' is already opened", self.id);
            return Ok(());
        }

        let session = self.connect()?;
        let opened = session
            .sftp()
            .map_err(|e| self.open_error(format!("cannot open SFTP channel: {e}")))
            .and_then(|sftp| {
                let file = sftp.open(Path::new(&self.remote_path)).map_err(|e| ReconError::Io {
                    operation: IoOperation::Open,
                    resource: self.id.clone(),
                    message: e.to_string(),
                    not_found: matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)),
                })?;
                Ok((sftp, file))
            });

        match opened {
            Ok((sftp, file)) => {
                log::debug!("opened '{}'", self.id);
                self.conn = Some(Connection { file, sftp, session });
                Ok(())
            }
            Err(e) => {
                let _ = disconnect(&session, &self.id);
                Err(e)
            }
        }
    }

    fn close(&mut self) -> Result<(), ReconError> {
        let Some(Connection { file, sftp, session }) = self.conn.take() else {
            log::info!("resource '{}' is not opened, skip close", self.id);
            return Ok(());
        };
        drop(file);
        drop(sftp);
        disconnect(&session, &self.id).map_err(|e| ReconError::Io {
            operation: IoOperation::Close,
            resource: self.id.clone(),
            message: e.to_string(),
            not_found: false,
        })
    }
}

impl Read for SftpResource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.conn.as_mut() {
            Some(conn) => conn.file.read(buf),
            None => Err(not_opened(&self.id)),
        }
    }
}
