//! 패킷 역다중화: 패킷 → (플로우 키, 방향)
//!
//! [`resolve`]는 순수 함수로 방향 판정 규칙만 담당하고,
//! [`Demultiplexer`]는 테이블 갱신과 트래픽 카운터/메트릭 기록을 묶습니다.
//!
//! # 판정 규칙
//! 1. forward 키가 테이블에 있으면 → forward
//! 2. 역방향 키가 있으면 → backward
//! 3. 둘 다 없으면 → forward 키로 신규 생성

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use netwarden_core::metrics as m;
use netwarden_core::types::{PacketInfo, protocol_name};

use crate::error::FlowEngineError;
use crate::flow::{Direction, FlowKey};
use crate::stats::TrafficCounters;
use crate::table::{FlowTable, Observation};

/// 패킷 방향 키를 테이블 상태에 따라 (정규 키, 방향)으로 해석합니다.
pub fn resolve<V>(flows: &HashMap<FlowKey, V>, forward: FlowKey) -> (FlowKey, Direction) {
    if flows.contains_key(&forward) {
        return (forward, Direction::Forward);
    }
    let reverse = forward.reversed();
    if flows.contains_key(&reverse) {
        return (reverse, Direction::Backward);
    }
    (forward, Direction::Forward)
}

/// 패킷을 플로우 테이블에 반영하는 역다중화기
///
/// 수집 태스크 하나가 소유하며, 캡처 순서대로 패킷을 처리합니다.
#[derive(Debug, Clone)]
pub struct Demultiplexer {
    table: Arc<FlowTable>,
    counters: Arc<TrafficCounters>,
}

impl Demultiplexer {
    /// 테이블과 카운터를 공유하는 역다중화기를 생성합니다.
    pub fn new(table: Arc<FlowTable>, counters: Arc<TrafficCounters>) -> Self {
        Self { table, counters }
    }

    /// 패킷 하나를 테이블에 반영합니다.
    ///
    /// 실패는 테이블 락 오염뿐이며 치명적 에러입니다.
    pub fn ingest(&self, packet: &PacketInfo) -> Result<Observation, FlowEngineError> {
        let observation = self.table.observe(packet)?;

        self.counters.record_packet(packet.size);
        metrics::counter!(m::FLOW_PACKETS_TOTAL).increment(1);
        metrics::counter!(m::FLOW_BYTES_TOTAL).increment(packet.size as u64);
        metrics::counter!(
            m::FLOW_PROTOCOL_PACKETS_TOTAL,
            m::LABEL_PROTOCOL => protocol_name(packet.protocol)
        )
        .increment(1);

        if observation.created {
            self.counters.record_flow_created();
            metrics::counter!(m::FLOW_CREATED_TOTAL).increment(1);
            trace!(flow = %observation.key, "flow created");
        } else {
            trace!(
                flow = %observation.key,
                direction = observation.direction.as_str(),
                size = packet.size,
                "packet attributed"
            );
        }

        Ok(observation)
    }

    /// 공유 테이블 참조
    pub fn table(&self) -> &Arc<FlowTable> {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use netwarden_core::types::{PROTO_TCP, PROTO_UDP};

    use super::*;

    fn key(src: &str, dst: &str, sp: u16, dp: u16, proto: u8) -> FlowKey {
        FlowKey {
            src_ip: src.parse().unwrap(),
            dst_ip: dst.parse().unwrap(),
            src_port: sp,
            dst_port: dp,
            protocol: proto,
        }
    }

    #[test]
    fn resolve_unknown_key_is_new_forward() {
        let flows: HashMap<FlowKey, ()> = HashMap::new();
        let k = key("10.0.0.1", "10.0.0.2", 1000, 80, PROTO_TCP);
        assert_eq!(resolve(&flows, k), (k, Direction::Forward));
    }

    #[test]
    fn resolve_prefers_forward_key() {
        let k = key("10.0.0.1", "10.0.0.2", 1000, 80, PROTO_TCP);
        let mut flows = HashMap::new();
        flows.insert(k, ());
        flows.insert(k.reversed(), ());
        assert_eq!(resolve(&flows, k), (k, Direction::Forward));
    }

    #[test]
    fn resolve_reverse_key_is_backward() {
        let k = key("10.0.0.1", "10.0.0.2", 1000, 80, PROTO_TCP);
        let mut flows = HashMap::new();
        flows.insert(k, ());
        assert_eq!(resolve(&flows, k.reversed()), (k, Direction::Backward));
    }

    #[test]
    fn resolve_requires_exact_tuple() {
        let k = key("10.0.0.1", "10.0.0.2", 1000, 80, PROTO_TCP);
        let mut flows = HashMap::new();
        flows.insert(k, ());

        let other_port = key("10.0.0.2", "10.0.0.1", 80, 1001, PROTO_TCP);
        assert_eq!(resolve(&flows, other_port), (other_port, Direction::Forward));

        let other_proto = key("10.0.0.2", "10.0.0.1", 80, 1000, PROTO_UDP);
        assert_eq!(resolve(&flows, other_proto).1, Direction::Forward);
    }

    #[test]
    fn ingest_updates_counters() {
        let table = Arc::new(FlowTable::new());
        let counters = Arc::new(TrafficCounters::new());
        let demux = Demultiplexer::new(Arc::clone(&table), Arc::clone(&counters));

        let a = "192.168.1.5".parse().unwrap();
        let b = "10.0.0.9".parse().unwrap();
        demux
            .ingest(&PacketInfo::new(a, b, 5000, 80, PROTO_TCP, 60))
            .unwrap();
        let obs = demux
            .ingest(&PacketInfo::new(b, a, 80, 5000, PROTO_TCP, 1500))
            .unwrap();

        assert_eq!(obs.direction, Direction::Backward);
        let snap = counters.snapshot();
        assert_eq!(snap.packets, 2);
        assert_eq!(snap.bytes, 1560);
        assert_eq!(snap.flows_created, 1);
        assert_eq!(table.len().unwrap(), 1);
    }
}
