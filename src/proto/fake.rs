use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

use super::connection::Connection;

pub(crate) const FAKE_HEADER: &str = "Time uS,L1_RMS mV,L1_RMS mA,Tot_PApp mVA";

#[derive(Default)]
struct FakeState {
    devices: Vec<String>,
    // Devices that only show up after this many `$scan`s.
    hidden_until_scan: HashMap<String, usize>,
    scans: usize,
    recording: HashSet<String>,
    samples: HashMap<String, u64>,
    status: HashMap<String, String>,
    // Remaining `stream text all` polls to reject per device.
    failing_polls: HashMap<String, usize>,
    log: Vec<String>,
}

impl FakeState {
    fn visible(&self, device: &str) -> bool {
        self.devices.iter().any(|d| d == device)
            && self
                .hidden_until_scan
                .get(device)
                .map_or(true, |n| self.scans >= *n)
    }

    fn handle(&mut self, line: &str) -> String {
        self.log.push(line.to_string());
        match line {
            "$version" => return "QIS v1.46 (fake)".to_string(),
            "$scan" => {
                self.scans += 1;
                return "OK".to_string();
            }
            "$shutdown" => return "OK".to_string(),
            "$list" => {
                let visible: Vec<String> = self
                    .devices
                    .iter()
                    .filter(|d| self.visible(d))
                    .enumerate()
                    .map(|(n, d)| format!("{}) {}", n + 1, d))
                    .collect();
                return if visible.is_empty() {
                    "No devices found".to_string()
                } else {
                    visible.join("\r\n")
                };
            }
            _ => {}
        }

        let Some((device, cmd)) = line.split_once(' ') else {
            return "FAIL: 0x41 -Unknown command".to_string();
        };
        if !self.visible(device) {
            return format!("FAIL: 0x43 -Device {} not connected", device);
        }
        match cmd {
            c if c.starts_with("stream mode resample ") => "OK".to_string(),
            "stream text header" => FAKE_HEADER.to_string(),
            "rec stream" => {
                self.recording.insert(device.to_string());
                "OK".to_string()
            }
            "rec stop" => {
                self.recording.remove(device);
                "OK".to_string()
            }
            "stream text all" => {
                let failing = self.failing_polls.get_mut(device);
                if let Some(n) = failing.filter(|n| **n > 0) {
                    *n -= 1;
                    return "FAIL: 0x99 -Stream read failed".to_string();
                }
                if self.recording.contains(device) {
                    let n = self.samples.entry(device.to_string()).or_insert(0);
                    let rows: Vec<String> = (0..2)
                        .map(|_| {
                            *n += 1;
                            format!(
                                "{},{},{},{}",
                                *n * 1000,
                                230000 + *n,
                                1500 + *n,
                                345000 + *n
                            )
                        })
                        .collect();
                    rows.join("\r\n")
                } else {
                    "eof".to_string()
                }
            }
            "stream?" => match self.status.get(device) {
                Some(status) => status.clone(),
                None if self.recording.contains(device) => "Running".to_string(),
                None => "Stopped: User".to_string(),
            },
            _ => "FAIL: 0x41 -Unknown command".to_string(),
        }
    }
}

/// In-process stand-in for QIS, served over `tokio::io::duplex`.
#[derive(Clone)]
pub(crate) struct FakeQis {
    state: Arc<Mutex<FakeState>>,
}

impl FakeQis {
    pub(crate) fn new(devices: &[&str]) -> Self {
        let state = FakeState {
            devices: devices.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn hide_until_scan(&self, device: &str, scans: usize) {
        self.lock()
            .hidden_until_scan
            .insert(device.to_string(), scans);
    }

    pub(crate) fn set_status(&self, device: &str, status: &str) {
        self.lock()
            .status
            .insert(device.to_string(), status.to_string());
    }

    pub(crate) fn fail_stream_data(&self, device: &str, polls: usize) {
        self.lock()
            .failing_polls
            .insert(device.to_string(), polls);
    }

    pub(crate) fn is_recording(&self, device: &str) -> bool {
        self.lock().recording.contains(device)
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub(crate) fn connect(&self) -> Connection {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(self.clone().serve(server));
        Connection::from_io(client)
    }

    async fn serve(self, io: DuplexStream) {
        let (read, mut write) = tokio::io::split(io);
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply = self.lock().handle(line.trim());
            let frame = format!("{}\r\n>", reply);
            if write.write_all(frame.as_bytes()).await.is_err() {
                break;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}
