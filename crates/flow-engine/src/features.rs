//! 피처 추출: Flow → 78개 고정 스키마 수치 벡터
//!
//! 스키마는 CICIDS2017 컬럼 순서를 그대로 따르며, [`Feature`] enum과
//! [`FEATURE_NAMES`] 정적 테이블로 이름 ↔ 인덱스를 변환합니다.
//!
//! 추적하지 않는 신호(방향별 IAT, TCP 플래그, 헤더 길이, bulk, 초기 윈도우,
//! active/idle)는 항상 0입니다. 방향별 패킷 길이 필드는 양방향 합산 통계를 담습니다.

use std::time::{Duration, SystemTime};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::flow::Flow;

/// 레이트 계산 시 지속 시간 하한 (초)
pub const MIN_DURATION_SECS: f64 = 1e-6;

macro_rules! feature_schema {
    ($( $variant:ident => $name:literal ),+ $(,)?) => {
        /// 피처 스키마의 각 컬럼
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Feature {
            $(
                #[doc = $name]
                $variant,
            )+
        }

        impl Feature {
            /// 스키마 순서대로의 전체 컬럼
            pub const ALL: &'static [Feature] = &[$(Feature::$variant),+];
        }

        /// 스키마 순서대로의 컬럼 이름
        pub const FEATURE_NAMES: &[&str] = &[$($name),+];
    };
}

feature_schema! {
    DestinationPort => "Destination Port",
    FlowDuration => "Flow Duration",
    TotalFwdPackets => "Total Fwd Packets",
    TotalBackwardPackets => "Total Backward Packets",
    TotalLengthFwdPackets => "Total Length of Fwd Packets",
    TotalLengthBwdPackets => "Total Length of Bwd Packets",
    FwdPacketLengthMax => "Fwd Packet Length Max",
    FwdPacketLengthMin => "Fwd Packet Length Min",
    FwdPacketLengthMean => "Fwd Packet Length Mean",
    FwdPacketLengthStd => "Fwd Packet Length Std",
    BwdPacketLengthMax => "Bwd Packet Length Max",
    BwdPacketLengthMin => "Bwd Packet Length Min",
    BwdPacketLengthMean => "Bwd Packet Length Mean",
    BwdPacketLengthStd => "Bwd Packet Length Std",
    FlowBytesPerSec => "Flow Bytes/s",
    FlowPacketsPerSec => "Flow Packets/s",
    FlowIatMean => "Flow IAT Mean",
    FlowIatStd => "Flow IAT Std",
    FlowIatMax => "Flow IAT Max",
    FlowIatMin => "Flow IAT Min",
    FwdIatTotal => "Fwd IAT Total",
    FwdIatMean => "Fwd IAT Mean",
    FwdIatStd => "Fwd IAT Std",
    FwdIatMax => "Fwd IAT Max",
    FwdIatMin => "Fwd IAT Min",
    BwdIatTotal => "Bwd IAT Total",
    BwdIatMean => "Bwd IAT Mean",
    BwdIatStd => "Bwd IAT Std",
    BwdIatMax => "Bwd IAT Max",
    BwdIatMin => "Bwd IAT Min",
    FwdPshFlags => "Fwd PSH Flags",
    BwdPshFlags => "Bwd PSH Flags",
    FwdUrgFlags => "Fwd URG Flags",
    BwdUrgFlags => "Bwd URG Flags",
    FwdHeaderLength => "Fwd Header Length",
    BwdHeaderLength => "Bwd Header Length",
    FwdPacketsPerSec => "Fwd Packets/s",
    BwdPacketsPerSec => "Bwd Packets/s",
    MinPacketLength => "Min Packet Length",
    MaxPacketLength => "Max Packet Length",
    PacketLengthMean => "Packet Length Mean",
    PacketLengthStd => "Packet Length Std",
    PacketLengthVariance => "Packet Length Variance",
    FinFlagCount => "FIN Flag Count",
    SynFlagCount => "SYN Flag Count",
    RstFlagCount => "RST Flag Count",
    PshFlagCount => "PSH Flag Count",
    AckFlagCount => "ACK Flag Count",
    UrgFlagCount => "URG Flag Count",
    CweFlagCount => "CWE Flag Count",
    EceFlagCount => "ECE Flag Count",
    DownUpRatio => "Down/Up Ratio",
    AveragePacketSize => "Average Packet Size",
    AvgFwdSegmentSize => "Avg Fwd Segment Size",
    AvgBwdSegmentSize => "Avg Bwd Segment Size",
    FwdHeaderLength1 => "Fwd Header Length.1",
    FwdAvgBytesBulk => "Fwd Avg Bytes/Bulk",
    FwdAvgPacketsBulk => "Fwd Avg Packets/Bulk",
    FwdAvgBulkRate => "Fwd Avg Bulk Rate",
    BwdAvgBytesBulk => "Bwd Avg Bytes/Bulk",
    BwdAvgPacketsBulk => "Bwd Avg Packets/Bulk",
    BwdAvgBulkRate => "Bwd Avg Bulk Rate",
    SubflowFwdPackets => "Subflow Fwd Packets",
    SubflowFwdBytes => "Subflow Fwd Bytes",
    SubflowBwdPackets => "Subflow Bwd Packets",
    SubflowBwdBytes => "Subflow Bwd Bytes",
    InitWinBytesForward => "Init_Win_bytes_forward",
    InitWinBytesBackward => "Init_Win_bytes_backward",
    ActDataPktFwd => "act_data_pkt_fwd",
    MinSegSizeForward => "min_seg_size_forward",
    ActiveMean => "Active Mean",
    ActiveStd => "Active Std",
    ActiveMax => "Active Max",
    ActiveMin => "Active Min",
    IdleMean => "Idle Mean",
    IdleStd => "Idle Std",
    IdleMax => "Idle Max",
    IdleMin => "Idle Min",
}

/// 스키마 컬럼 수
pub const FEATURE_COUNT: usize = 78;

const _: () = assert!(Feature::ALL.len() == FEATURE_COUNT);
const _: () = assert!(FEATURE_NAMES.len() == FEATURE_COUNT);

impl Feature {
    /// 스키마 내 인덱스
    pub fn index(self) -> usize {
        self as usize
    }

    /// CICIDS2017 컬럼 이름
    pub fn name(self) -> &'static str {
        FEATURE_NAMES[self.index()]
    }

    /// 컬럼 이름으로 피처를 찾습니다. 앞뒤 공백은 무시합니다.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| Self::ALL[i])
    }
}

/// 스키마 순서의 고정 길이 피처 벡터
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl Default for FeatureVector {
    fn default() -> Self {
        Self([0.0; FEATURE_COUNT])
    }
}

impl FeatureVector {
    /// 피처 값을 읽습니다.
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    /// 피처 값을 설정합니다.
    pub fn set(&mut self, feature: Feature, value: f64) {
        self.0[feature.index()] = value;
    }

    /// 스키마 순서의 원시 값
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// (이름, 값) 쌍을 스키마 순서로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }

    /// 필드 수 (항상 [`FEATURE_COUNT`])
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 항상 false
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// 평균, 모표준편차, 최댓값, 최솟값
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Summary {
    mean: f64,
    std: f64,
    max: f64,
    min: f64,
}

impl Summary {
    fn of(values: impl Iterator<Item = f64> + Clone) -> Self {
        let count = values.clone().count();
        if count == 0 {
            return Self::default();
        }
        let n = count as f64;
        let mean = values.clone().sum::<f64>() / n;
        let var = values.clone().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let max = values.clone().fold(f64::MIN, f64::max);
        let min = values.fold(f64::MAX, f64::min);
        Self {
            mean,
            std: var.sqrt(),
            max,
            min,
        }
    }
}

/// 플로우 지속 시간(초). `now - start_time`을 하한 [`MIN_DURATION_SECS`]로 고정합니다.
pub fn flow_duration_secs(flow: &Flow, now: SystemTime) -> f64 {
    now.duration_since(flow.start_time)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
        .max(MIN_DURATION_SECS)
}

/// 플로우의 터미널 스냅샷에서 피처 벡터를 계산합니다.
///
/// `now`는 스윕 시각이며 지속 시간 계산의 기준입니다.
pub fn extract(flow: &Flow, now: SystemTime) -> FeatureVector {
    use Feature::*;

    let duration = flow_duration_secs(flow, now);
    let lengths = Summary::of(flow.lengths.iter().map(|&l| l as f64));
    let iat = Summary::of(flow.iat_micros.iter().copied());

    let fwd_packets = flow.fwd_packets as f64;
    let bwd_packets = flow.bwd_packets as f64;
    let fwd_bytes = flow.fwd_bytes as f64;
    let bwd_bytes = flow.bwd_bytes as f64;

    let mut v = FeatureVector::default();

    v.set(DestinationPort, f64::from(flow.key.dst_port));
    v.set(FlowDuration, duration * 1e6);
    v.set(TotalFwdPackets, fwd_packets);
    v.set(TotalBackwardPackets, bwd_packets);
    v.set(TotalLengthFwdPackets, fwd_bytes);
    v.set(TotalLengthBwdPackets, bwd_bytes);

    for (max, min, mean, std) in [
        (FwdPacketLengthMax, FwdPacketLengthMin, FwdPacketLengthMean, FwdPacketLengthStd),
        (BwdPacketLengthMax, BwdPacketLengthMin, BwdPacketLengthMean, BwdPacketLengthStd),
    ] {
        v.set(max, lengths.max);
        v.set(min, lengths.min);
        v.set(mean, lengths.mean);
        v.set(std, lengths.std);
    }

    v.set(FlowBytesPerSec, (fwd_bytes + bwd_bytes) / duration);
    v.set(FlowPacketsPerSec, (fwd_packets + bwd_packets) / duration);
    v.set(FlowIatMean, iat.mean);
    v.set(FlowIatStd, iat.std);
    v.set(FlowIatMax, iat.max);
    v.set(FlowIatMin, iat.min);

    v.set(FwdPacketsPerSec, fwd_packets / duration);
    v.set(BwdPacketsPerSec, bwd_packets / duration);

    v.set(MinPacketLength, lengths.min);
    v.set(MaxPacketLength, lengths.max);
    v.set(PacketLengthMean, lengths.mean);
    v.set(PacketLengthStd, lengths.std);
    v.set(PacketLengthVariance, lengths.std.powi(2));

    v.set(AveragePacketSize, lengths.mean);
    v.set(AvgFwdSegmentSize, lengths.mean);
    v.set(AvgBwdSegmentSize, lengths.mean);

    v.set(SubflowFwdPackets, fwd_packets);
    v.set(SubflowFwdBytes, fwd_bytes);
    v.set(SubflowBwdPackets, bwd_packets);
    v.set(SubflowBwdBytes, bwd_bytes);

    v
}
