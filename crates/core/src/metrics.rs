//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `netwarden_`
//! - 모듈명: `flow_`, `capture_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use netwarden_core::metrics as m;
//!
//! metrics::counter!(m::FLOW_PACKETS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 프로토콜 레이블 키 (TCP, UDP, ICMP, other)
pub const LABEL_PROTOCOL: &str = "protocol";

/// 분류 레이블 키 (DDoS, PortScan 등)
pub const LABEL_CLASS: &str = "class";

/// 실패 단계 레이블 키 (select, scale, predict, decode)
pub const LABEL_STAGE: &str = "stage";

// ─── Flow Engine 메트릭 ────────────────────────────────────────────

/// Flow: 수집된 전체 패킷 수 (counter)
pub const FLOW_PACKETS_TOTAL: &str = "netwarden_flow_packets_total";

/// Flow: 수집된 전체 바이트 수 (counter)
pub const FLOW_BYTES_TOTAL: &str = "netwarden_flow_bytes_total";

/// Flow: 프로토콜별 패킷 수 (counter, label: protocol)
pub const FLOW_PROTOCOL_PACKETS_TOTAL: &str = "netwarden_flow_protocol_packets_total";

/// Flow: 초당 패킷 처리량 (gauge)
pub const FLOW_PACKETS_PER_SECOND: &str = "netwarden_flow_packets_per_second";

/// Flow: 새로 생성된 플로우 수 (counter)
pub const FLOW_CREATED_TOTAL: &str = "netwarden_flow_created_total";

/// Flow: 만료되어 제거된 플로우 수 (counter)
pub const FLOW_EVICTED_TOTAL: &str = "netwarden_flow_evicted_total";

/// Flow: 현재 플로우 테이블 크기 (gauge)
pub const FLOW_ACTIVE: &str = "netwarden_flow_active";

/// Flow: 생성된 알림 수 (counter, label: class)
pub const FLOW_ALERTS_TOTAL: &str = "netwarden_flow_alerts_total";

/// Flow: 분류 실패 수 (counter, label: stage)
pub const FLOW_CLASSIFICATION_FAILURES_TOTAL: &str =
    "netwarden_flow_classification_failures_total";

/// Flow: 휴리스틱 규칙으로 재분류된 플로우 수 (counter)
pub const FLOW_HEURISTIC_OVERRIDES_TOTAL: &str = "netwarden_flow_heuristic_overrides_total";

/// Flow: 스윕 1회 소요 시간 (histogram, 초)
pub const FLOW_SWEEP_DURATION_SECONDS: &str = "netwarden_flow_sweep_duration_seconds";

// ─── Capture 메트릭 ─────────────────────────────────────────────────

/// Capture: 파싱 실패 또는 비-IP로 버려진 레코드 수 (counter)
pub const CAPTURE_RECORDS_DROPPED_TOTAL: &str = "netwarden_capture_records_dropped_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "netwarden_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "netwarden_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 스윕 소요 시간 히스토그램 버킷 (초)
///
/// 100us ~ 5s 범위. 분류기 호출이 포함되므로 상한을 넉넉히 둡니다.
pub const SWEEP_DURATION_BUCKETS: [f64; 9] =
    [0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 1.0, 5.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `netwarden-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Flow Engine
    describe_counter!(FLOW_PACKETS_TOTAL, "Total number of packets ingested");
    describe_counter!(FLOW_BYTES_TOTAL, "Total bytes ingested");
    describe_counter!(
        FLOW_PROTOCOL_PACKETS_TOTAL,
        "Packets ingested per protocol (TCP, UDP, ICMP, other)"
    );
    describe_gauge!(
        FLOW_PACKETS_PER_SECOND,
        "Packet ingestion rate measured over the last sweep interval"
    );
    describe_counter!(FLOW_CREATED_TOTAL, "Total number of flows created");
    describe_counter!(
        FLOW_EVICTED_TOTAL,
        "Total number of idle flows evaluated and removed"
    );
    describe_gauge!(FLOW_ACTIVE, "Number of flows currently in the flow table");
    describe_counter!(
        FLOW_ALERTS_TOTAL,
        "Total number of alerts emitted for non-benign flows"
    );
    describe_counter!(
        FLOW_CLASSIFICATION_FAILURES_TOTAL,
        "Total number of flows whose classification failed"
    );
    describe_counter!(
        FLOW_HEURISTIC_OVERRIDES_TOTAL,
        "Total number of benign verdicts overridden by the volume heuristic"
    );
    describe_histogram!(
        FLOW_SWEEP_DURATION_SECONDS,
        "Time to complete a single expiry sweep in seconds"
    );

    // Capture
    describe_counter!(
        CAPTURE_RECORDS_DROPPED_TOTAL,
        "Total number of capture records dropped (malformed or non-IP)"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Netwarden daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
