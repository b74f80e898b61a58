//! Authenticated SSH session wrapper
//!
//! One session is opened per remote deployment and reused for every
//! command and file transfer; there is no per-command reconnect. ssh2 is
//! a blocking library, so callers run these methods inside
//! `tokio::task::spawn_blocking`.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use secrecy::ExposeSecret;
use ssh2::Session;
use tracing::debug;

use crate::errors::LandfallError;
use crate::models::config::{AuthMethod, SshConfig};

/// Result of one remote command round trip
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// Combined stdout; stderr is folded in by the shell redirect
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// An authenticated SSH session plus its SFTP sub-channel
pub struct SshSession {
    // ssh2::Session is Send but not Sync; the mutex makes the wrapper
    // shareable across blocking tasks.
    session: Mutex<Session>,
}

impl SshSession {
    /// Connect and authenticate with a bounded TCP connect timeout.
    pub fn connect(config: &SshConfig) -> Result<Self, LandfallError> {
        let addr = format!("{}:{}", config.host, config.port);
        let sock_addr = addr
            .to_socket_addrs()
            .map_err(|e| LandfallError::SshError(format!("cannot resolve {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| LandfallError::SshError(format!("no address for {}", addr)))?;

        let tcp = TcpStream::connect_timeout(
            &sock_addr,
            Duration::from_secs(config.connect_timeout_secs),
        )
        .map_err(|e| LandfallError::SshError(format!("failed to connect to {}: {}", addr, e)))?;

        let mut session = Session::new()
            .map_err(|e| LandfallError::SshError(format!("failed to create session: {}", e)))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| LandfallError::SshError(format!("SSH handshake failed: {}", e)))?;

        match config.auth_method {
            AuthMethod::Key => {
                // validate() guarantees the key path is present
                let key_path = config.key_path.as_deref().unwrap_or_default();
                session
                    .userauth_pubkey_file(&config.user, None, Path::new(key_path), None)
                    .map_err(|e| {
                        LandfallError::SshError(format!("key authentication failed: {}", e))
                    })?;
            }
            AuthMethod::Password => {
                let password = config
                    .password
                    .as_ref()
                    .map(|p| p.expose_secret().to_string())
                    .unwrap_or_default();
                session
                    .userauth_password(&config.user, &password)
                    .map_err(|e| {
                        LandfallError::SshError(format!("password authentication failed: {}", e))
                    })?;
            }
        }

        if !session.authenticated() {
            return Err(LandfallError::SshError(
                "SSH authentication failed".to_string(),
            ));
        }

        debug!(host = %config.host, user = %config.user, "SSH session established");
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Execute one command, returning its combined output. stderr is
    /// redirected into stdout so callers get one transcript per command.
    pub fn exec(&self, command: &str) -> Result<CommandOutput, LandfallError> {
        let session = self
            .session
            .lock()
            .map_err(|_| LandfallError::SshError("session lock poisoned".to_string()))?;

        let mut channel = session
            .channel_session()
            .map_err(|e| LandfallError::SshError(format!("failed to open channel: {}", e)))?;

        let wrapped = format!("{} 2>&1", command);
        channel
            .exec(&wrapped)
            .map_err(|e| LandfallError::SshError(format!("exec failed: {}", e)))?;

        let mut output = String::new();
        channel
            .read_to_string(&mut output)
            .map_err(|e| LandfallError::SshError(format!("failed to read output: {}", e)))?;
        channel
            .wait_close()
            .map_err(|e| LandfallError::SshError(format!("channel close failed: {}", e)))?;
        let exit_code = channel
            .exit_status()
            .map_err(|e| LandfallError::SshError(format!("no exit status: {}", e)))?;

        Ok(CommandOutput { exit_code, output })
    }

    /// Create a remote directory tree over SFTP (like `mkdir -p`).
    pub fn mkdir_p(&self, remote_dir: &str) -> Result<(), LandfallError> {
        let session = self
            .session
            .lock()
            .map_err(|_| LandfallError::SshError("session lock poisoned".to_string()))?;
        let sftp = session
            .sftp()
            .map_err(|e| LandfallError::SshError(format!("failed to open SFTP: {}", e)))?;

        let mut current = String::new();
        for part in remote_dir.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            let path = Path::new(&current);
            if sftp.stat(path).is_err() {
                sftp.mkdir(path, 0o755)
                    .map_err(|e| LandfallError::SshError(format!("mkdir {}: {}", current, e)))?;
            }
        }
        Ok(())
    }

    /// Write a file on the remote host over SFTP.
    pub fn write_file(&self, remote_path: &str, content: &[u8]) -> Result<(), LandfallError> {
        let session = self
            .session
            .lock()
            .map_err(|_| LandfallError::SshError("session lock poisoned".to_string()))?;
        let sftp = session
            .sftp()
            .map_err(|e| LandfallError::SshError(format!("failed to open SFTP: {}", e)))?;

        let mut file = sftp
            .create(Path::new(remote_path))
            .map_err(|e| LandfallError::SshError(format!("create {}: {}", remote_path, e)))?;
        file.write_all(content)
            .map_err(|e| LandfallError::SshError(format!("write {}: {}", remote_path, e)))?;
        Ok(())
    }
}
