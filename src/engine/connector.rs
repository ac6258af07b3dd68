use std::fmt;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::Client;
use redis::FromRedisValue;
use redis::IntoConnectionInfo;
use redis::TlsCertificates;
use tokio::time::timeout;

use crate::CoordinatorConfig;
use crate::EngineError;
use crate::Result;
use crate::StorageError;

/// Credentialed, optionally TLS, connection factory for engine and monitor
/// endpoints. Every call opens a fresh connection so the factory survives
/// engine restarts and address churn.
#[derive(Clone)]
pub struct Connector {
    scheme: &'static str,
    password: String,
    insecure: bool,
    ca_cert: Option<Vec<u8>>,
    timeout: Duration,
}

impl fmt::Debug for Connector {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Connector")
            .field("scheme", &self.scheme)
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Connector {
    pub fn new(
        password: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            scheme: "redis",
            password: password.into(),
            insecure: false,
            ca_cert: None,
            timeout,
        }
    }

    pub fn from_config(config: &CoordinatorConfig) -> Result<Self> {
        let mut connector = Self::new(
            config.credentials.admin_password.clone(),
            Duration::from_millis(config.peers.probe_timeout_ms),
        );
        connector.scheme = config.tls.scheme();
        if config.tls.enable_tls {
            connector.insecure = config.tls.insecure_skip_verify;
            if !connector.insecure {
                let ca = std::fs::read(&config.tls.ca_cert_path).map_err(|source| StorageError::PathError {
                    path: config.tls.ca_cert_path.clone(),
                    source,
                })?;
                connector.ca_cert = Some(ca);
            }
        }
        Ok(connector)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn client(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Client> {
        let mut url = format!("{}://{}:{}", self.scheme, bracket_v6(host), port);
        if self.insecure {
            url.push_str("/#insecure");
        }
        let mut info = url.as_str().into_connection_info()?;
        info.redis.password = Some(self.password.clone());

        let client = match &self.ca_cert {
            Some(ca) => Client::build_with_tls(
                info,
                TlsCertificates {
                    client_tls: None,
                    root_cert: Some(ca.clone()),
                },
            )?,
            None => Client::open(info)?,
        };
        Ok(client)
    }

    pub async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<MultiplexedConnection> {
        let client = self.client(host, port)?;
        match timeout(self.timeout, client.get_multiplexed_async_connection()).await {
            Ok(con) => Ok(con?),
            Err(_) => Err(EngineError::Command {
                command: "CONNECT",
                source: timed_out(),
            }
            .into()),
        }
    }

    /// Connects and runs a single command under the probe timeout.
    pub async fn query<T: FromRedisValue>(
        &self,
        host: &str,
        port: u16,
        command: &'static str,
        cmd: &redis::Cmd,
    ) -> Result<T> {
        let mut con = self.connect(host, port).await?;
        match timeout(self.timeout, cmd.query_async::<_, T>(&mut con)).await {
            Ok(reply) => reply.map_err(|source| EngineError::Command { command, source }.into()),
            Err(_) => Err(EngineError::Command {
                command,
                source: timed_out(),
            }
            .into()),
        }
    }
}

fn timed_out() -> redis::RedisError {
    std::io::Error::new(std::io::ErrorKind::TimedOut, "request timed out").into()
}

fn bracket_v6(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}
