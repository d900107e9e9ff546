use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::address::{list_contains, parse_device_list, ModuleAddress};
use crate::interval::ResampleInterval;
use crate::proto::command::{Command, DeviceRequest};
use crate::proto::connection::Connection;
use crate::proto::response::StreamStatus;
use crate::proto::{QisError, Result};
use crate::stream::{Chunk, SharedBuffer, StreamBuffer};

/// How often a running stream is drained into its buffer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const SCAN_INTERVAL: Duration = Duration::from_millis(500);

// Upper bound on drain polls after `rec stop`, in case QIS never sends eof.
const MAX_DRAIN_POLLS: usize = 1000;

type SharedConnection = Arc<Mutex<Connection>>;

struct Pump {
    cancel: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

/// A power module reached through QIS, with its own connection and
/// stream buffer.
pub struct PowerModule {
    address: ModuleAddress,
    target: String,
    conn: SharedConnection,
    buffer: SharedBuffer,
    poll_interval: Duration,
    pump: Option<Pump>,
}

impl PowerModule {
    /// Connects to `address` through the QIS instance at `service`.
    ///
    /// QIS may not have enumerated the module yet, so `$list` is
    /// checked repeatedly with a `$scan` in between until `timeout`.
    pub async fn connect(
        service: impl AsRef<str>,
        address: ModuleAddress,
        timeout: Duration,
    ) -> Result<Self> {
        let conn = Connection::connect(service).await?;
        Self::attach(conn, address, timeout).await
    }

    pub(crate) async fn attach(
        mut conn: Connection,
        address: ModuleAddress,
        timeout: Duration,
    ) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            let list = parse_device_list(&conn.request(Command::List).await?);
            if list_contains(&list, &address) {
                break;
            }
            if Instant::now() >= deadline {
                return Err(QisError::DeviceNotFound {
                    target: address.to_string(),
                    timeout,
                });
            }
            debug!(%address, "module not listed yet, scanning");
            conn.request(Command::Scan).await?;
            sleep(SCAN_INTERVAL.min(deadline.saturating_duration_since(Instant::now()))).await;
        }
        info!(%address, "module connected");
        Ok(Self::from_connection(conn, address))
    }

    pub(crate) fn from_connection(conn: Connection, address: ModuleAddress) -> Self {
        Self {
            target: address.qis_target(),
            address,
            conn: Arc::new(Mutex::new(conn)),
            buffer: StreamBuffer::shared(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            pump: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn address(&self) -> &ModuleAddress {
        &self.address
    }

    pub fn device_id(&self) -> &str {
        self.address.device_id()
    }

    pub fn buffer(&self) -> SharedBuffer {
        self.buffer.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.pump
            .as_ref()
            .is_some_and(|pump| !pump.handle.is_finished())
    }

    async fn request(&self, request: DeviceRequest) -> Result<String> {
        self.conn
            .lock()
            .await
            .request(Command::device(&self.target, request))
            .await
    }

    async fn execute(&self, request: DeviceRequest) -> Result<()> {
        self.conn
            .lock()
            .await
            .execute(Command::device(&self.target, request))
            .await
    }

    pub async fn resample(&self, interval: ResampleInterval) -> Result<()> {
        self.execute(DeviceRequest::Resample(interval)).await
    }

    /// Starts recording into a fresh buffer.
    ///
    /// With a `duration` the stream stops itself once it elapsed.
    pub async fn start_stream(&mut self, duration: Option<Duration>) -> Result<()> {
        if self.pump.is_some() {
            self.stop_stream().await?;
        }
        let header = self.request(DeviceRequest::StreamHeader).await?;
        {
            let mut buffer = self.buffer.lock().await;
            buffer.reset();
            buffer.set_header(header);
        }
        self.execute(DeviceRequest::RecordStream).await?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(pump(
            self.conn.clone(),
            self.target.clone(),
            self.buffer.clone(),
            cancel.clone(),
            duration,
            self.poll_interval,
        ));
        self.pump = Some(Pump { cancel, handle });
        info!(address = %self.address, ?duration, "stream started");
        Ok(())
    }

    /// Stops recording and collects whatever QIS still holds.
    pub async fn stop_stream(&mut self) -> Result<()> {
        // A failed pump still leaves QIS recording, so stop and drain
        // first and report the pump error afterwards.
        let mut pumped = Ok(());
        if let Some(pump) = self.pump.take() {
            pump.cancel.cancel();
            pumped = match pump.handle.await {
                Ok(res) => res,
                Err(err) => Err(err.into()),
            };
            if let Err(err) = &pumped {
                warn!(address = %self.address, %err, "stream pump failed");
            }
        }
        {
            let mut conn = self.conn.lock().await;
            conn.execute(Command::device(&self.target, DeviceRequest::RecordStop))
                .await?;
            drain(&mut conn, &self.target, &self.buffer).await?;
        }
        let rows = self.buffer.lock().await.row_count();
        info!(address = %self.address, rows, "stream stopped");
        pumped
    }

    pub async fn stream_status(&self) -> Result<StreamStatus> {
        let text = self.request(DeviceRequest::StreamStatus).await?;
        Ok(StreamStatus::parse(&text))
    }
}

impl Drop for PowerModule {
    fn drop(&mut self) {
        if let Some(pump) = &self.pump {
            pump.cancel.cancel();
        }
    }
}

async fn pump(
    conn: SharedConnection,
    target: String,
    buffer: SharedBuffer,
    cancel: CancellationToken,
    duration: Option<Duration>,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = duration.map(|d| Instant::now() + d);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = sleep(poll_interval) => {}
        }
        let mut conn = conn.lock().await;
        let chunk = match conn
            .request(Command::device(&target, DeviceRequest::StreamData))
            .await
        {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(%target, %err, "stream poll failed");
                return Err(err);
            }
        };
        if buffer.lock().await.append(&chunk) == Chunk::Eof {
            debug!(%target, "stream reached eof");
            return Ok(());
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!(%target, "stream duration elapsed");
            conn.execute(Command::device(&target, DeviceRequest::RecordStop))
                .await?;
            return drain(&mut conn, &target, &buffer).await;
        }
    }
}

async fn drain(conn: &mut Connection, target: &str, buffer: &SharedBuffer) -> Result<()> {
    for _ in 0..MAX_DRAIN_POLLS {
        let chunk = conn
            .request(Command::device(target, DeviceRequest::StreamData))
            .await?;
        match buffer.lock().await.append(&chunk) {
            Chunk::Eof | Chunk::Rows(0) => return Ok(()),
            Chunk::Rows(_) => {}
        }
    }
    warn!(%target, "stream did not drain");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::fake::{FakeQis, FAKE_HEADER};
    use crate::proto::response::StopReason;

    const TARGET: &str = "TCP::QTL2789-01-001";

    fn address() -> ModuleAddress {
        "TCP:QTL2789-01-001".parse().unwrap()
    }

    async fn module(fake: &FakeQis) -> PowerModule {
        PowerModule::attach(fake.connect(), address(), Duration::from_secs(1))
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_connect_listed_module() {
        let fake = FakeQis::new(&[TARGET]);
        let module = module(&fake).await;
        assert_eq!(module.device_id(), "QTL2789-01-001");
        assert_eq!(fake.commands(), vec!["$list"]);
    }

    #[tokio::test]
    async fn test_connect_after_scan() {
        let fake = FakeQis::new(&[TARGET]);
        fake.hide_until_scan(TARGET, 1);
        module(&fake).await;
        assert_eq!(fake.commands(), vec!["$list", "$scan", "$list"]);
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let fake = FakeQis::new(&[]);
        let res = PowerModule::attach(fake.connect(), address(), Duration::from_millis(600)).await;
        assert!(matches!(res, Err(QisError::DeviceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_resample() {
        let fake = FakeQis::new(&[TARGET]);
        let module = module(&fake).await;
        module
            .resample(ResampleInterval::from_millis(1))
            .await
            .unwrap();
        assert_eq!(
            fake.commands().last().unwrap(),
            "TCP::QTL2789-01-001 stream mode resample 1mS"
        );
    }

    #[tokio::test]
    async fn test_stream_start_stop() {
        let fake = FakeQis::new(&[TARGET]);
        let mut module = module(&fake).await;
        module.start_stream(None).await.unwrap();
        assert!(fake.is_recording(TARGET));
        assert!(module.is_streaming());
        sleep(Duration::from_millis(50)).await;
        module.stop_stream().await.unwrap();
        assert!(!fake.is_recording(TARGET));
        assert!(!module.is_streaming());

        let buffer = module.buffer();
        let buffer = buffer.lock().await;
        assert_eq!(buffer.header(), Some(FAKE_HEADER));
        assert!(buffer.row_count() >= 2);
        assert!(buffer.to_csv().starts_with(FAKE_HEADER));
    }

    #[tokio::test]
    async fn test_stream_duration_stops_itself() {
        let fake = FakeQis::new(&[TARGET]);
        let mut module = module(&fake).await;
        module
            .start_stream(Some(Duration::from_millis(20)))
            .await
            .unwrap();
        sleep(Duration::from_millis(200)).await;
        assert!(!fake.is_recording(TARGET));
        assert!(!module.is_streaming());
        // Stopping again is harmless.
        module.stop_stream().await.unwrap();
        assert!(module.buffer().lock().await.row_count() > 0);
    }

    #[tokio::test]
    async fn test_restart_resets_buffer() {
        let fake = FakeQis::new(&[TARGET]);
        let mut module = module(&fake).await;
        module.start_stream(None).await.unwrap();
        sleep(Duration::from_millis(30)).await;
        module.stop_stream().await.unwrap();
        module.start_stream(None).await.unwrap();
        assert_eq!(module.buffer().lock().await.row_count(), 0);
        module.stop_stream().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_poll_still_stops_recording() {
        let fake = FakeQis::new(&[TARGET]);
        fake.fail_stream_data(TARGET, 1);
        let mut module = module(&fake).await;
        module.start_stream(None).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        assert!(!module.is_streaming());

        let err = module.stop_stream().await.unwrap_err();
        assert!(matches!(err, QisError::Fail(_)));
        assert!(!fake.is_recording(TARGET));
        let stops = fake
            .commands()
            .iter()
            .filter(|c| c.as_str() == "TCP::QTL2789-01-001 rec stop")
            .count();
        assert_eq!(stops, 1);
    }

    #[tokio::test]
    async fn test_stream_status() {
        let fake = FakeQis::new(&[TARGET]);
        let module = module(&fake).await;
        assert_eq!(
            module.stream_status().await.unwrap(),
            StreamStatus::Stopped(StopReason::User, "Stopped: User".to_string())
        );
        fake.set_status(TARGET, "Stopped: Overrun");
        assert!(module.stream_status().await.unwrap().is_overrun());
    }
}
