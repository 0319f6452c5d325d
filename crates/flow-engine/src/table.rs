//! 플로우 테이블: 진행 중인 플로우의 동시성 저장소
//!
//! 단일 [`Mutex`]로 보호되는 `HashMap<FlowKey, Flow>`입니다.
//! 수집 태스크는 패킷당 한 번, 스위퍼는 틱당 두 번(스냅샷, 일괄 제거) 락을 잡습니다.
//! 스위퍼는 유휴 플로우만 복사하므로 락 보유 시간은 활성 플로우의 패킷 수와 무관합니다.
//! 피처 추출과 분류는 항상 락 밖에서 수행됩니다.
//!
//! 락 오염(poison)은 테이블 일관성을 보장할 수 없으므로
//! [`FlowEngineError::TablePoisoned`]로 보고되며 엔진 전체를 중단시킵니다.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use netwarden_core::types::PacketInfo;

use crate::demux;
use crate::error::FlowEngineError;
use crate::flow::{Direction, Flow, FlowKey};

/// 패킷 하나를 테이블에 반영한 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// 패킷이 귀속된 플로우의 키
    pub key: FlowKey,
    /// 플로우 키 기준 방향
    pub direction: Direction,
    /// 이 패킷으로 새 플로우가 생성되었는지 여부
    pub created: bool,
}

/// 진행 중인 플로우 저장소
#[derive(Debug, Default)]
pub struct FlowTable {
    flows: Mutex<HashMap<FlowKey, Flow>>,
}

impl FlowTable {
    /// 빈 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<FlowKey, Flow>>, FlowEngineError> {
        self.flows.lock().map_err(|_| FlowEngineError::TablePoisoned)
    }

    /// 방향 판정과 갱신을 한 번의 락 안에서 수행합니다.
    ///
    /// forward 키가 있으면 forward, 역방향 키가 있으면 backward,
    /// 둘 다 없으면 forward 키로 새 플로우를 만듭니다.
    pub fn observe(&self, packet: &PacketInfo) -> Result<Observation, FlowEngineError> {
        let mut flows = self.lock()?;
        let (key, direction) = demux::resolve(&*flows, FlowKey::from_packet(packet));
        let created = !flows.contains_key(&key);
        flows
            .entry(key)
            .or_insert_with(|| Flow::new(key, packet.timestamp))
            .record(packet, direction);
        Ok(Observation {
            key,
            direction,
            created,
        })
    }

    /// 주어진 키와 방향으로 플로우를 생성하거나 갱신합니다.
    ///
    /// 반환값은 새 플로우가 생성되었는지 여부입니다.
    pub fn upsert(
        &self,
        key: FlowKey,
        packet: &PacketInfo,
        direction: Direction,
    ) -> Result<bool, FlowEngineError> {
        let mut flows = self.lock()?;
        let mut created = false;
        flows
            .entry(key)
            .or_insert_with(|| {
                created = true;
                Flow::new(key, packet.timestamp)
            })
            .record(packet, direction);
        Ok(created)
    }

    /// 현재 시점의 (키, 플로우) 복사본을 반환합니다.
    pub fn snapshot(&self) -> Result<Vec<(FlowKey, Flow)>, FlowEngineError> {
        let flows = self.lock()?;
        Ok(flows.iter().map(|(k, f)| (*k, f.clone())).collect())
    }

    /// 유휴 플로우만 골라 복사합니다.
    ///
    /// 반환값은 (검사한 전체 플로우 수, 유휴 플로우 복사본)입니다.
    /// 활성 플로우는 복사하지 않습니다.
    pub fn snapshot_idle(
        &self,
        now: SystemTime,
        timeout: Duration,
    ) -> Result<(usize, Vec<(FlowKey, Flow)>), FlowEngineError> {
        let flows = self.lock()?;
        let idle = flows
            .iter()
            .filter(|(_, f)| f.is_idle(now, timeout))
            .map(|(k, f)| (*k, f.clone()))
            .collect();
        Ok((flows.len(), idle))
    }

    /// 스냅샷 이후 변하지 않은 플로우만 일괄 제거합니다.
    ///
    /// `expected`는 (키, 스냅샷 시점의 전체 패킷 수) 쌍입니다. 그 사이 패킷이
    /// 더 들어온 플로우는 남겨 두며, 반환값은 실제 제거된 수입니다.
    pub fn remove_unchanged(&self, expected: &[(FlowKey, u64)]) -> Result<usize, FlowEngineError> {
        if expected.is_empty() {
            return Ok(0);
        }
        let mut flows = self.lock()?;
        let mut removed = 0;
        for (key, packets) in expected {
            if flows.get(key).is_some_and(|f| f.total_packets() == *packets) {
                flows.remove(key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// 주어진 키들을 일괄 제거하고 실제 제거된 수를 반환합니다.
    pub fn remove(&self, keys: &[FlowKey]) -> Result<usize, FlowEngineError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut flows = self.lock()?;
        Ok(keys.iter().filter(|k| flows.remove(*k).is_some()).count())
    }

    /// 키로 플로우 복사본을 조회합니다.
    pub fn get(&self, key: &FlowKey) -> Result<Option<Flow>, FlowEngineError> {
        Ok(self.lock()?.get(key).cloned())
    }

    /// 진행 중인 플로우 수
    pub fn len(&self) -> Result<usize, FlowEngineError> {
        Ok(self.lock()?.len())
    }

    /// 테이블이 비었는지 확인합니다.
    pub fn is_empty(&self) -> Result<bool, FlowEngineError> {
        Ok(self.lock()?.is_empty())
    }
}
