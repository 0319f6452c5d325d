//! 알림 이벤트
//!
//! [`FlowAlert`]는 non-benign 플로우 하나에 대한 알림 페이로드이고,
//! [`AlertEvent`]는 이벤트 ID와 메타데이터를 붙인 전송 단위입니다.

use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use serde::{Serialize, Serializer};

use netwarden_core::event::{EVENT_TYPE_ALERT, Event, EventMetadata, MODULE_FLOW_ENGINE};
use netwarden_core::types::protocol_name;

use crate::features::FeatureVector;
use crate::flow::FlowKey;

fn unix_secs<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let secs = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64();
    serializer.serialize_f64(secs)
}

/// 플로우 알림 페이로드
///
/// 직렬화 형식: `{src_ip, dst_ip, src_port, dst_port, protocol, type, timestamp, details}`
#[derive(Debug, Clone, Serialize)]
pub struct FlowAlert {
    /// 플로우 출발지 IP
    pub src_ip: IpAddr,
    /// 플로우 목적지 IP
    pub dst_ip: IpAddr,
    /// 출발지 포트
    pub src_port: u16,
    /// 목적지 포트
    pub dst_port: u16,
    /// IP 프로토콜 번호
    pub protocol: u8,
    /// 판정 레이블 (예: "DDoS")
    #[serde(rename = "type")]
    pub label: String,
    /// 알림 생성 시각 (직렬화 시 Unix 초)
    #[serde(serialize_with = "unix_secs")]
    pub timestamp: SystemTime,
    /// 판정에 사용된 피처 벡터
    pub details: FeatureVector,
}

impl FlowAlert {
    /// 플로우 키, 레이블, 피처로 알림을 만듭니다.
    pub fn new(key: &FlowKey, label: impl Into<String>, details: FeatureVector, timestamp: SystemTime) -> Self {
        Self {
            src_ip: key.src_ip,
            dst_ip: key.dst_ip,
            src_port: key.src_port,
            dst_port: key.dst_port,
            protocol: key.protocol,
            label: label.into(),
            timestamp,
            details,
        }
    }
}

/// 알림 이벤트 (구독자에게 전달되는 단위)
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    /// 이벤트 ID (UUID v4)
    pub id: String,
    /// 메타데이터
    #[serde(skip)]
    pub metadata: EventMetadata,
    /// 알림 페이로드
    pub alert: FlowAlert,
}

impl AlertEvent {
    /// 새 trace로 이벤트를 만듭니다.
    pub fn new(alert: FlowAlert) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_FLOW_ENGINE),
            alert,
        }
    }
}

impl Event for AlertEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_ALERT
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.alert;
        write!(
            f,
            "[{}] {}:{} -> {}:{} {}",
            a.label,
            a.src_ip,
            a.src_port,
            a.dst_ip,
            a.dst_port,
            protocol_name(a.protocol)
        )
    }
}

#[cfg(test)]
mod tests {
    use netwarden_core::types::PROTO_TCP;

    use super::*;
    use crate::features::Feature;

    fn key() -> FlowKey {
        FlowKey {
            src_ip: "192.168.1.5".parse().unwrap(),
            dst_ip: "10.0.0.9".parse().unwrap(),
            src_port: 5000,
            dst_port: 80,
            protocol: PROTO_TCP,
        }
    }

    #[test]
    fn alert_serializes_with_type_field() {
        let mut details = FeatureVector::default();
        details.set(Feature::TotalFwdPackets, 150.0);
        let alert = FlowAlert::new(
            &key(),
            "DDoS",
            details,
            SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_500),
        );

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "DDoS");
        assert_eq!(json["src_ip"], "192.168.1.5");
        assert_eq!(json["dst_ip"], "10.0.0.9");
        assert_eq!(json["timestamp"], 1_700_000_000.5);
        assert_eq!(json["details"]["Total Fwd Packets"], 150.0);
        assert!(json.get("label").is_none());
    }

    #[test]
    fn alert_event_implements_event() {
        let event = AlertEvent::new(FlowAlert::new(
            &key(),
            "PortScan",
            FeatureVector::default(),
            SystemTime::now(),
        ));
        assert_eq!(event.event_type(), "alert");
        assert_eq!(event.event_id().len(), 36);
        assert_eq!(event.metadata().source_module, "flow-engine");
        assert_eq!(
            event.to_string(),
            "[PortScan] 192.168.1.5:5000 -> 10.0.0.9:80 TCP"
        );
    }
}
