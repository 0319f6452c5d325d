//! Packet sources feeding the flow engine.
//!
//! A [`PacketSource`] pushes [`PacketInfo`] records into the engine's
//! ingest channel until its input is exhausted or shutdown is requested.
//!
//! [`ReplaySource`] reads JSON lines, one packet per line, in either of
//! two shapes:
//!
//! ```text
//! {"src_ip":"10.0.0.1","dst_ip":"10.0.0.2","src_port":5000,"dst_port":80,"protocol":6,"length":60,"timestamp":1700000000.25}
//! {"frame":[0,17,34, ...],"timestamp":1700000000.5}
//! ```
//!
//! `size` is accepted as an alias of `length`, ports default to 0 and a
//! missing `timestamp` means "now". Frames are decoded as Ethernet II.
//! Malformed lines and non-IP frames are logged and skipped.
//!
//! In pace mode the source sleeps for the recorded gap between records
//! and stamps each packet with the wall clock at release, so idle
//! expiry follows the recorded timing.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use netwarden_core::config::CaptureConfig;
use netwarden_core::metrics as m;
use netwarden_core::pipeline::BoxFuture;
use netwarden_core::types::PacketInfo;
use netwarden_flow_engine::decode::decode_ethernet;

/// Counters for one source run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// Non-blank input lines seen.
    pub lines: u64,
    /// Packets handed to the engine.
    pub packets: u64,
    /// Records skipped as malformed or non-IP.
    pub dropped: u64,
}

/// A producer of packet records.
pub trait PacketSource: Send {
    /// Short name used in logs and health reports.
    fn name(&self) -> &str;

    /// Push packets into `tx` until the input ends, `tx` closes or
    /// `cancel` fires.
    fn run(
        self: Box<Self>,
        tx: mpsc::Sender<PacketInfo>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<SourceReport>>;
}

type LineReader = Box<dyn AsyncBufRead + Unpin + Send>;

enum ReplayInput {
    Stdin,
    File(PathBuf),
    Reader(LineReader),
}

impl ReplayInput {
    async fn open(self) -> Result<LineReader> {
        Ok(match self {
            Self::Stdin => Box::new(BufReader::new(tokio::io::stdin())),
            Self::File(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .with_context(|| format!("failed to open replay file {}", path.display()))?;
                Box::new(BufReader::new(file))
            }
            Self::Reader(reader) => reader,
        })
    }

    fn describe(&self) -> String {
        match self {
            Self::Stdin => "stdin".to_owned(),
            Self::File(path) => path.display().to_string(),
            Self::Reader(_) => "reader".to_owned(),
        }
    }
}

/// JSON-lines packet replay.
pub struct ReplaySource {
    input: ReplayInput,
    pace: bool,
}

impl std::fmt::Debug for ReplaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySource")
            .field("input", &self.input.describe())
            .field("pace", &self.pace)
            .finish()
    }
}

impl ReplaySource {
    /// Build from the `[capture]` section. `"-"` selects standard input.
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::from_path(&config.replay_path, config.pace)
    }

    /// Replay from a path, or standard input for `"-"`.
    pub fn from_path(path: &str, pace: bool) -> Self {
        let input = if path == "-" {
            ReplayInput::Stdin
        } else {
            ReplayInput::File(PathBuf::from(path))
        };
        Self { input, pace }
    }

    /// Replay from an in-memory or already opened reader.
    pub fn from_reader(reader: impl AsyncBufRead + Unpin + Send + 'static, pace: bool) -> Self {
        Self {
            input: ReplayInput::Reader(Box::new(reader)),
            pace,
        }
    }

    async fn replay(
        self,
        tx: mpsc::Sender<PacketInfo>,
        cancel: CancellationToken,
    ) -> Result<SourceReport> {
        let origin = self.input.describe();
        let mut reader = self.input.open().await?;
        let mut report = SourceReport::default();
        let mut buf = Vec::new();
        let mut previous: Option<SystemTime> = None;

        info!(input = %origin, pace = self.pace, "packet replay started");

        loop {
            buf.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => break,
                read = reader.read_until(b'\n', &mut buf) => {
                    read.with_context(|| format!("failed to read replay input {origin}"))?
                }
            };
            if read == 0 {
                break;
            }

            let Ok(line) = std::str::from_utf8(&buf) else {
                report.lines += 1;
                drop_record(&mut report, "line is not valid UTF-8");
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            report.lines += 1;

            let mut packet = match parse_record(line, SystemTime::now()) {
                Ok(packet) => packet,
                Err(e) => {
                    drop_record(&mut report, &format!("{e:#}"));
                    continue;
                }
            };

            if self.pace {
                if let Some(gap) = previous.and_then(|p| packet.timestamp.duration_since(p).ok()) {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(gap) => {}
                    }
                }
                previous = Some(packet.timestamp);
                packet.timestamp = SystemTime::now();
            }

            let sent = tokio::select! {
                _ = cancel.cancelled() => break,
                sent = tx.send(packet) => sent,
            };
            if sent.is_err() {
                debug!("flow engine input closed, stopping replay");
                break;
            }
            report.packets += 1;
        }

        info!(
            input = %origin,
            lines = report.lines,
            packets = report.packets,
            dropped = report.dropped,
            "packet replay finished"
        );
        Ok(report)
    }
}

impl PacketSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn run(
        self: Box<Self>,
        tx: mpsc::Sender<PacketInfo>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<SourceReport>> {
        Box::pin((*self).replay(tx, cancel))
    }
}

fn drop_record(report: &mut SourceReport, reason: &str) {
    report.dropped += 1;
    metrics::counter!(m::CAPTURE_RECORDS_DROPPED_TOTAL).increment(1);
    warn!(line = report.lines, reason, "skipping replay record");
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayRecord {
    Frame(FrameRecord),
    Header(HeaderRecord),
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    frame: Vec<u8>,
    #[serde(default)]
    timestamp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HeaderRecord {
    src_ip: IpAddr,
    dst_ip: IpAddr,
    #[serde(default)]
    src_port: u16,
    #[serde(default)]
    dst_port: u16,
    protocol: u8,
    #[serde(alias = "size")]
    length: usize,
    #[serde(default)]
    timestamp: Option<f64>,
}

/// Parse one replay line. `now` stamps records without a timestamp.
pub fn parse_record(line: &str, now: SystemTime) -> Result<PacketInfo> {
    let record: ReplayRecord =
        serde_json::from_str(line).context("not a packet header or frame record")?;

    match record {
        ReplayRecord::Header(h) => {
            let at = resolve_timestamp(h.timestamp, now)?;
            Ok(
                PacketInfo::new(h.src_ip, h.dst_ip, h.src_port, h.dst_port, h.protocol, h.length)
                    .at(at),
            )
        }
        ReplayRecord::Frame(f) => {
            let at = resolve_timestamp(f.timestamp, now)?;
            decode_ethernet(&f.frame, at)
                .ok_or_else(|| anyhow::anyhow!("frame is not a decodable IP packet"))
        }
    }
}

fn resolve_timestamp(secs: Option<f64>, now: SystemTime) -> Result<SystemTime> {
    match secs {
        None => Ok(now),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map(|offset| SystemTime::UNIX_EPOCH + offset)
            .map_err(|e| anyhow::anyhow!("invalid timestamp {}: {}", secs, e)),
    }
}
