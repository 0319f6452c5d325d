//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 캡처 소스와 플로우 엔진이 공유하는 패킷 레코드를 정의합니다.

use std::fmt;
use std::net::IpAddr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// ICMP 프로토콜 번호
pub const PROTO_ICMP: u8 = 1;
/// TCP 프로토콜 번호
pub const PROTO_TCP: u8 = 6;
/// UDP 프로토콜 번호
pub const PROTO_UDP: u8 = 17;
/// ICMPv6 프로토콜 번호
pub const PROTO_ICMPV6: u8 = 58;

/// 프로토콜 번호를 사람이 읽을 수 있는 이름으로 변환합니다.
pub fn protocol_name(protocol: u8) -> &'static str {
    match protocol {
        PROTO_ICMP => "ICMP",
        PROTO_TCP => "TCP",
        PROTO_UDP => "UDP",
        PROTO_ICMPV6 => "ICMPv6",
        _ => "other",
    }
}

/// 파싱된 네트워크 패킷 정보
///
/// 캡처 소스가 전달하는 헤더 수준의 레코드입니다.
/// TCP/UDP가 아닌 경우 포트는 0입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketInfo {
    /// 출발지 IP
    pub src_ip: IpAddr,
    /// 목적지 IP
    pub dst_ip: IpAddr,
    /// 출발지 포트
    pub src_port: u16,
    /// 목적지 포트
    pub dst_port: u16,
    /// 프로토콜 (TCP=6, UDP=17 등)
    pub protocol: u8,
    /// 패킷 크기 (바이트)
    pub size: usize,
    /// 캡처 시각
    pub timestamp: SystemTime,
}

impl PacketInfo {
    /// 현재 시각으로 패킷 레코드를 생성합니다.
    pub fn new(
        src_ip: IpAddr,
        dst_ip: IpAddr,
        src_port: u16,
        dst_port: u16,
        protocol: u8,
        size: usize,
    ) -> Self {
        Self {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            protocol,
            size,
            timestamp: SystemTime::now(),
        }
    }

    /// 캡처 시각을 지정합니다.
    pub fn at(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for PacketInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} proto={} size={}",
            self.src_ip,
            self.src_port,
            self.dst_ip,
            self.dst_port,
            protocol_name(self.protocol),
            self.size,
        )
    }
}
