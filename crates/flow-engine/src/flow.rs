//! 플로우 모델: 5-tuple 키와 양방향 누적 상태
//!
//! [`Flow`]는 하나의 (양방향) 대화를 나타냅니다. 키는 처음 관찰된 방향의
//! 5-tuple이며, 뒤집힌 키로 들어온 패킷은 backward로 같은 플로우에 누적됩니다.

use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use netwarden_core::types::{PacketInfo, protocol_name};

/// 플로우 식별 키 (src_ip, dst_ip, src_port, dst_port, protocol)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FlowKey {
    /// 출발지 IP
    pub src_ip: IpAddr,
    /// 목적지 IP
    pub dst_ip: IpAddr,
    /// 출발지 포트 (TCP/UDP가 아니면 0)
    pub src_port: u16,
    /// 목적지 포트 (TCP/UDP가 아니면 0)
    pub dst_port: u16,
    /// IP 프로토콜 번호
    pub protocol: u8,
}

impl FlowKey {
    /// 패킷의 진행 방향 그대로 키를 만듭니다.
    pub fn from_packet(packet: &PacketInfo) -> Self {
        Self {
            src_ip: packet.src_ip,
            dst_ip: packet.dst_ip,
            src_port: packet.src_port,
            dst_port: packet.dst_port,
            protocol: packet.protocol,
        }
    }

    /// 반대 방향 키를 반환합니다.
    pub fn reversed(&self) -> Self {
        Self {
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_port: self.dst_port,
            dst_port: self.src_port,
            protocol: self.protocol,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} {}",
            self.src_ip,
            self.src_port,
            self.dst_ip,
            self.dst_port,
            protocol_name(self.protocol)
        )
    }
}

/// 플로우 키 기준 패킷 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 키와 같은 방향 (최초 관찰 방향)
    Forward,
    /// 키의 반대 방향
    Backward,
}

impl Direction {
    /// 로그/메트릭용 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }
}

/// 진행 중인 플로우의 누적 상태
#[derive(Debug, Clone)]
pub struct Flow {
    /// 플로우 키
    pub key: FlowKey,
    /// 첫 패킷 시각
    pub start_time: SystemTime,
    /// 마지막 패킷 시각 (단조 증가)
    pub last_seen: SystemTime,
    /// forward 패킷 수
    pub fwd_packets: u64,
    /// backward 패킷 수
    pub bwd_packets: u64,
    /// forward 바이트 합
    pub fwd_bytes: u64,
    /// backward 바이트 합
    pub bwd_bytes: u64,
    /// 도착 순서대로의 패킷 길이 (양방향)
    ///
    /// 상한이 없어 플로우의 패킷 수에 비례해 자랍니다. 스위퍼는 유휴 플로우만
    /// 복사하므로 활성 플로우의 샘플은 락 안에서 복사되지 않습니다.
    pub lengths: Vec<usize>,
    /// 도착 간격 (마이크로초, 양방향). 길이는 `lengths.len() - 1`입니다.
    pub iat_micros: Vec<f64>,
}

impl Flow {
    /// 패킷 없이 빈 플로우를 만듭니다. 첫 패킷은 [`Flow::record`]로 기록합니다.
    pub fn new(key: FlowKey, start_time: SystemTime) -> Self {
        Self {
            key,
            start_time,
            last_seen: start_time,
            fwd_packets: 0,
            bwd_packets: 0,
            fwd_bytes: 0,
            bwd_bytes: 0,
            lengths: Vec::new(),
            iat_micros: Vec::new(),
        }
    }

    /// 패킷 하나를 누적합니다.
    ///
    /// 도착 간격은 두 번째 패킷부터 기록됩니다. 캡처 순서가 뒤바뀐
    /// 타임스탬프는 간격 0으로 처리되며 `last_seen`은 뒤로 가지 않습니다.
    pub fn record(&mut self, packet: &PacketInfo, direction: Direction) {
        if self.total_packets() > 0 {
            let gap = packet
                .timestamp
                .duration_since(self.last_seen)
                .unwrap_or(Duration::ZERO);
            self.iat_micros.push(gap.as_secs_f64() * 1e6);
        }

        let size = packet.size as u64;
        match direction {
            Direction::Forward => {
                self.fwd_packets += 1;
                self.fwd_bytes += size;
            }
            Direction::Backward => {
                self.bwd_packets += 1;
                self.bwd_bytes += size;
            }
        }
        self.lengths.push(packet.size);

        if packet.timestamp > self.last_seen {
            self.last_seen = packet.timestamp;
        }
    }

    /// 양방향 전체 패킷 수
    pub fn total_packets(&self) -> u64 {
        self.fwd_packets + self.bwd_packets
    }

    /// 양방향 전체 바이트 수
    pub fn total_bytes(&self) -> u64 {
        self.fwd_bytes + self.bwd_bytes
    }

    /// `now - last_seen > timeout`이면 유휴 플로우입니다.
    ///
    /// `now`가 `last_seen`보다 이르면 유휴가 아닙니다.
    pub fn is_idle(&self, now: SystemTime, timeout: Duration) -> bool {
        now.duration_since(self.last_seen)
            .map(|idle| idle > timeout)
            .unwrap_or(false)
    }
}
