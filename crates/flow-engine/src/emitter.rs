//! 알림 전달: 구독자별 bounded 채널로 팬아웃
//!
//! 각 구독자는 독립된 `mpsc` 채널을 가집니다. 느린 구독자는 스윕 태스크에만
//! 역압을 걸며 수집 경로에는 영향을 주지 않습니다. 수신측이 닫힌 구독자는
//! 한 번만 기록하고 이후 건너뜁니다.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::AlertEvent;

struct Subscriber {
    name: String,
    tx: mpsc::Sender<AlertEvent>,
    closed: bool,
}

/// 알림 팬아웃 전달자
#[derive(Default)]
pub struct AlertEmitter {
    subscribers: Vec<Subscriber>,
}

impl std::fmt::Debug for AlertEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.subscribers.iter().map(|s| &s.name))
            .finish()
    }
}

impl AlertEmitter {
    /// 구독자 없는 전달자를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 외부에서 만든 송신자를 구독자로 등록합니다.
    pub fn add_sender(&mut self, name: impl Into<String>, tx: mpsc::Sender<AlertEvent>) {
        self.subscribers.push(Subscriber {
            name: name.into(),
            tx,
            closed: false,
        });
    }

    /// 새 채널을 만들어 구독자로 등록하고 수신자를 반환합니다.
    pub fn subscribe(&mut self, name: impl Into<String>, capacity: usize) -> mpsc::Receiver<AlertEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        self.add_sender(name, tx);
        rx
    }

    /// 등록된 구독자 수
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// 아직 열려 있는 구독자 수
    pub fn open_count(&self) -> usize {
        self.subscribers.iter().filter(|s| !s.closed).count()
    }

    /// 알림을 모든 열린 구독자에게 전달하고 전달된 수를 반환합니다.
    ///
    /// 채널이 가득 차면 공간이 생길 때까지 기다립니다.
    pub async fn emit(&mut self, event: AlertEvent) -> usize {
        let mut delivered = 0;
        for sub in self.subscribers.iter_mut().filter(|s| !s.closed) {
            match sub.tx.send(event.clone()).await {
                Ok(()) => delivered += 1,
                Err(_) => {
                    sub.closed = true;
                    warn!(subscriber = sub.name.as_str(), "alert subscriber closed, skipping");
                }
            }
        }
        debug!(alert_id = event.id.as_str(), delivered, "alert emitted");
        delivered
    }
}
