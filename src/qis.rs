use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command as Process};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::address::{parse_device_list, ModuleAddress};
use crate::config::Launcher;
use crate::proto::command::Command;
use crate::proto::connection::Connection;
use crate::proto::{QisError, Result};

const START_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// True when something accepts connections on the QIS port.
pub async fn is_running(addr: impl AsRef<str>) -> bool {
    TcpStream::connect(addr.as_ref()).await.is_ok()
}

/// Service-level commands, on a connection of their own.
pub struct QisInterface {
    conn: Connection,
}

impl QisInterface {
    pub async fn connect(addr: impl AsRef<str>) -> Result<Self> {
        Ok(Self::new(Connection::connect(addr).await?))
    }

    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn version(&mut self) -> Result<String> {
        self.conn.request(Command::Version).await
    }

    pub async fn list_devices(&mut self) -> Result<Vec<ModuleAddress>> {
        let text = self.conn.request(Command::List).await?;
        Ok(parse_device_list(&text))
    }

    pub async fn scan(&mut self) -> Result<()> {
        self.conn.request(Command::Scan).await.map(|_| ())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.conn.request(Command::Shutdown).await.map(|_| ())
    }
}

/// A QIS instance the run depends on. Only an instance started by
/// this process is shut down on close.
pub struct QisService {
    addr: String,
    started: Option<Child>,
}

impl QisService {
    pub async fn ensure_running(addr: impl Into<String>, launcher: &Launcher) -> Result<Self> {
        let addr = addr.into();
        if is_running(&addr).await {
            info!(%addr, "using running QIS");
            return Ok(Self {
                addr,
                started: None,
            });
        }

        info!(java = %launcher.java.display(), jar = %launcher.jar.display(), "starting QIS");
        let child = Process::new(&launcher.java)
            .arg("-jar")
            .arg(&launcher.jar)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let service = Self {
            addr,
            started: Some(child),
        };
        service.wait_ready(launcher.start_timeout).await?;
        Ok(service)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while !is_running(&self.addr).await {
            if Instant::now() >= deadline {
                return Err(QisError::ServiceUnavailable(self.addr.clone()));
            }
            debug!(addr = %self.addr, "waiting for QIS");
            sleep(START_POLL_INTERVAL).await;
        }
        Ok(())
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn started_here(&self) -> bool {
        self.started.is_some()
    }

    pub async fn interface(&self) -> Result<QisInterface> {
        QisInterface::connect(&self.addr).await
    }

    /// Shuts QIS down if this process started it.
    pub async fn close(self) -> Result<()> {
        let Some(mut child) = self.started else {
            return Ok(());
        };
        info!(addr = %self.addr, "closing QIS");
        let shutdown = match QisInterface::connect(&self.addr).await {
            Ok(mut qis) => qis.shutdown().await,
            Err(err) => Err(err),
        };
        if let Err(err) = shutdown {
            warn!(%err, "QIS shutdown command failed, killing process");
            child.kill().await?;
            return Ok(());
        }
        match tokio::time::timeout(Duration::from_secs(10), child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(?status, "QIS exited");
            }
            Err(_) => {
                warn!("QIS did not exit, killing process");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::fake::FakeQis;

    #[tokio::test]
    async fn test_interface() {
        let fake = FakeQis::new(&["TCP::QTL2789-01-001", "USB::QTL2582-01-005"]);
        let mut qis = QisInterface::new(fake.connect());
        assert_eq!(qis.version().await.unwrap(), "QIS v1.46 (fake)");
        let devices = qis.list_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_id(), "QTL2789-01-001");
        qis.scan().await.unwrap();
        qis.shutdown().await.unwrap();
        assert_eq!(
            fake.commands(),
            vec!["$version", "$list", "$scan", "$shutdown"]
        );
    }

    #[tokio::test]
    async fn test_reuse_running_service() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let service = QisService::ensure_running(addr.clone(), &Launcher::default())
            .await
            .unwrap();
        assert!(!service.started_here());
        assert_eq!(service.addr(), addr);
        // Not started here, so nothing is sent.
        service.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_launcher() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let launcher = Launcher {
            java: "/nonexistent/java".into(),
            ..Default::default()
        };
        assert!(matches!(
            QisService::ensure_running(addr, &launcher).await,
            Err(QisError::Io(_))
        ));
    }
}
