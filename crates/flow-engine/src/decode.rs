//! 프레임 디코딩: Ethernet II / IP 바이트 → [`PacketInfo`]
//!
//! etherparse로 헤더만 슬라이싱하며 페이로드는 보지 않습니다.
//! IP가 아닌 프레임(ARP 등)과 잘린 프레임은 `None`입니다.

use std::net::IpAddr;
use std::time::SystemTime;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};

use netwarden_core::types::PacketInfo;

/// Ethernet II 프레임을 디코딩합니다. 크기는 프레임 전체 길이입니다.
pub fn decode_ethernet(frame: &[u8], timestamp: SystemTime) -> Option<PacketInfo> {
    let sliced = SlicedPacket::from_ethernet(frame).ok()?;
    from_sliced(&sliced, frame.len(), timestamp)
}

/// L2 헤더 없는 IP 패킷을 디코딩합니다.
pub fn decode_ip(packet: &[u8], timestamp: SystemTime) -> Option<PacketInfo> {
    let sliced = SlicedPacket::from_ip(packet).ok()?;
    from_sliced(&sliced, packet.len(), timestamp)
}

fn from_sliced(sliced: &SlicedPacket<'_>, size: usize, timestamp: SystemTime) -> Option<PacketInfo> {
    let (src_ip, dst_ip, protocol) = match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            (
                IpAddr::from(header.source_addr()),
                IpAddr::from(header.destination_addr()),
                header.protocol().0,
            )
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            (
                IpAddr::from(header.source_addr()),
                IpAddr::from(header.destination_addr()),
                header.next_header().0,
            )
        }
        _ => return None,
    };

    let (src_port, dst_port) = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => (tcp.source_port(), tcp.destination_port()),
        Some(TransportSlice::Udp(udp)) => (udp.source_port(), udp.destination_port()),
        _ => (0, 0),
    };

    Some(PacketInfo::new(src_ip, dst_ip, src_port, dst_port, protocol, size).at(timestamp))
}

#[cfg(test)]
mod tests {
    use etherparse::PacketBuilder;
    use netwarden_core::types::{PROTO_ICMP, PROTO_TCP, PROTO_UDP};

    use super::*;

    fn tcp_syn_frame() -> Vec<u8> {
        let mut pkt = Vec::new();
        // Ethernet
        pkt.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        pkt.extend_from_slice(&[0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb]);
        pkt.extend_from_slice(&[0x08, 0x00]);
        // IPv4
        pkt.extend_from_slice(&[
            0x45, 0x00, // version/IHL, DSCP
            0x00, 0x28, // total length = 40
            0x00, 0x01, // identification
            0x40, 0x00, // DF
            0x40, 0x06, // ttl=64, proto=TCP
            0x00, 0x00, // checksum
            192, 168, 1, 5, // src
            10, 0, 0, 9, // dst
        ]);
        // TCP
        pkt.extend_from_slice(&[
            0x13, 0x88, // src port 5000
            0x00, 0x50, // dst port 80
            0x00, 0x00, 0x00, 0x01, // seq
            0x00, 0x00, 0x00, 0x00, // ack
            0x50, 0x02, // data offset=5, SYN
            0xff, 0xff, // window
            0x00, 0x00, // checksum
            0x00, 0x00, // urgent
        ]);
        pkt
    }

    #[test]
    fn decodes_tcp_over_ipv4() {
        let frame = tcp_syn_frame();
        let at = SystemTime::UNIX_EPOCH;
        let p = decode_ethernet(&frame, at).unwrap();
        assert_eq!(p.src_ip.to_string(), "192.168.1.5");
        assert_eq!(p.dst_ip.to_string(), "10.0.0.9");
        assert_eq!(p.src_port, 5000);
        assert_eq!(p.dst_port, 80);
        assert_eq!(p.protocol, PROTO_TCP);
        assert_eq!(p.size, 54);
        assert_eq!(p.timestamp, at);
    }

    #[test]
    fn decodes_udp_over_ipv6() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv6([0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1], [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2], 64)
            .udp(5353, 53);
        let payload = [0u8; 12];
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, &payload).unwrap();

        let p = decode_ethernet(&frame, SystemTime::now()).unwrap();
        assert_eq!(p.src_ip.to_string(), "fe80::1");
        assert_eq!(p.protocol, PROTO_UDP);
        assert_eq!(p.src_port, 5353);
        assert_eq!(p.dst_port, 53);
        assert_eq!(p.size, frame.len());
    }

    #[test]
    fn icmp_has_zero_ports() {
        let builder = PacketBuilder::ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64).icmpv4_echo_request(1, 1);
        let mut packet = Vec::with_capacity(builder.size(0));
        builder.write(&mut packet, &[]).unwrap();

        let p = decode_ip(&packet, SystemTime::now()).unwrap();
        assert_eq!(p.protocol, PROTO_ICMP);
        assert_eq!((p.src_port, p.dst_port), (0, 0));
    }

    #[test]
    fn arp_frame_is_dropped() {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        frame.extend_from_slice(&[0x08, 0x06]);
        frame.extend_from_slice(&[0u8; 28]);
        assert!(decode_ethernet(&frame, SystemTime::now()).is_none());
    }

    #[test]
    fn truncated_frame_is_dropped() {
        let frame = tcp_syn_frame();
        assert!(decode_ethernet(&frame[..20], SystemTime::now()).is_none());
        assert!(decode_ethernet(&[], SystemTime::now()).is_none());
    }
}
