//! 분류기 어댑터: 피처 벡터 → 판정 레이블
//!
//! 외부 분류기는 세 개의 trait([`FlowModel`], [`FeatureScaler`], [`LabelDecoder`])으로
//! 주입되며 [`ClassifierArtifact`]가 선택된 피처 이름과 함께 묶습니다.
//!
//! # 처리 순서
//! ```text
//! FeatureVector ─select─▶ Vec<f64> ─scale─▶ Vec<f64> ─predict─▶ index ─decode─▶ label
//!                                                                                  │
//!                                                          HeuristicRule ◀─────────┘
//! ```
//!
//! 아티팩트가 없으면 판정은 [`Verdict::Unclassified`]("no-model")이며 에러가 아닙니다.

use std::fmt;

use tracing::warn;

use netwarden_core::error::ClassifierError;

use crate::config::HeuristicRule;
use crate::error::{ClassifyStage, FlowEngineError};
use crate::features::{Feature, FeatureVector};

/// 분류기 미로드 시 판정 레이블
pub const NO_MODEL_LABEL: &str = "no-model";

/// 휴리스틱이 부여하는 레이블
pub const HEURISTIC_LABEL: &str = "DDoS";

/// 선택된 피처 벡터에서 클래스 인덱스를 예측합니다.
pub trait FlowModel: Send + Sync {
    /// 입력 차원 (선택된 피처 수)
    fn input_len(&self) -> usize;

    /// 스케일링된 입력으로 클래스 인덱스를 예측합니다.
    fn predict(&self, input: &[f64]) -> Result<usize, ClassifierError>;
}

/// 선택된 피처 벡터를 제자리에서 변환합니다.
pub trait FeatureScaler: Send + Sync {
    /// 입력을 변환합니다.
    fn transform(&self, input: &mut [f64]) -> Result<(), ClassifierError>;
}

/// 클래스 인덱스를 레이블 문자열로 변환합니다.
pub trait LabelDecoder: Send + Sync {
    /// 인덱스를 디코딩합니다.
    fn decode(&self, index: usize) -> Result<String, ClassifierError>;

    /// 알려진 클래스 수
    fn class_count(&self) -> usize;
}

/// 분류기가 요구하는 피처 한 개
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedFeature {
    /// 스키마에 존재하는 피처
    Known(Feature),
    /// 스키마에 없는 이름 (분류 시 MissingFeature 에러)
    Unknown(String),
}

impl SelectedFeature {
    /// 이름으로 해석합니다.
    pub fn resolve(name: &str) -> Self {
        match Feature::from_name(name) {
            Some(feature) => Self::Known(feature),
            None => Self::Unknown(name.to_owned()),
        }
    }
}

/// 모델, 스케일러, 디코더와 선택 피처 목록의 묶음
pub struct ClassifierArtifact {
    selection: Vec<SelectedFeature>,
    scaler: Box<dyn FeatureScaler>,
    model: Box<dyn FlowModel>,
    decoder: Box<dyn LabelDecoder>,
}

impl fmt::Debug for ClassifierArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierArtifact")
            .field("selection", &self.selection)
            .field("input_len", &self.model.input_len())
            .field("classes", &self.decoder.class_count())
            .finish()
    }
}

impl ClassifierArtifact {
    /// 선택 피처 이름과 세 구성 요소로 아티팩트를 만듭니다.
    ///
    /// 스키마에 없는 이름은 경고를 남기고 보존되어, 해당 아티팩트로 분류되는
    /// 모든 플로우가 select 단계에서 실패합니다.
    pub fn new(
        feature_names: &[String],
        scaler: Box<dyn FeatureScaler>,
        model: Box<dyn FlowModel>,
        decoder: Box<dyn LabelDecoder>,
    ) -> Result<Self, ClassifierError> {
        if feature_names.len() != model.input_len() {
            return Err(ClassifierError::DimensionMismatch {
                expected: model.input_len(),
                got: feature_names.len(),
            });
        }

        let selection: Vec<SelectedFeature> = feature_names
            .iter()
            .map(|name| SelectedFeature::resolve(name))
            .collect();

        for unknown in selection.iter().filter_map(|s| match s {
            SelectedFeature::Unknown(name) => Some(name),
            SelectedFeature::Known(_) => None,
        }) {
            warn!(feature = unknown.as_str(), "classifier expects a feature outside the flow schema");
        }

        Ok(Self {
            selection,
            scaler,
            model,
            decoder,
        })
    }

    /// 선택 피처 목록
    pub fn selection(&self) -> &[SelectedFeature] {
        &self.selection
    }

    fn select(&self, features: &FeatureVector) -> Result<Vec<f64>, ClassifierError> {
        self.selection
            .iter()
            .map(|s| match s {
                SelectedFeature::Known(feature) => Ok(features.get(*feature)),
                SelectedFeature::Unknown(name) => Err(ClassifierError::MissingFeature(name.clone())),
            })
            .collect()
    }

    /// select → scale → predict → decode를 수행합니다.
    pub fn predict_label(&self, features: &FeatureVector) -> Result<String, FlowEngineError> {
        let stage = |stage: ClassifyStage| {
            move |source: ClassifierError| FlowEngineError::Classification { stage, source }
        };

        let mut input = self.select(features).map_err(stage(ClassifyStage::Select))?;
        self.scaler
            .transform(&mut input)
            .map_err(stage(ClassifyStage::Scale))?;
        let index = self
            .model
            .predict(&input)
            .map_err(stage(ClassifyStage::Predict))?;
        self.decoder
            .decode(index)
            .map_err(stage(ClassifyStage::Decode))
    }
}

/// 분류 판정
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// 분류기 없음
    Unclassified,
    /// 분류 결과 레이블
    Class(String),
}

impl Verdict {
    /// 레이블 문자열
    pub fn label(&self) -> &str {
        match self {
            Self::Unclassified => NO_MODEL_LABEL,
            Self::Class(label) => label,
        }
    }

    /// benign 판정인지 (대소문자 무시)
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Class(label) if label.eq_ignore_ascii_case("benign"))
    }

    /// 알림 대상인지 (분류기 판정이 있고 benign이 아님)
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Class(_)) && !self.is_benign()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 분류 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// 최종 판정
    pub verdict: Verdict,
    /// 휴리스틱으로 재분류되었는지
    pub heuristic_applied: bool,
}

/// 분류기 어댑터
#[derive(Debug)]
pub struct FlowClassifier {
    artifact: Option<ClassifierArtifact>,
    heuristic: HeuristicRule,
}

impl FlowClassifier {
    /// 분류기 없이 생성합니다. 모든 판정은 "no-model"입니다.
    pub fn disabled(heuristic: HeuristicRule) -> Self {
        Self {
            artifact: None,
            heuristic,
        }
    }

    /// 아티팩트(선택)와 휴리스틱 규칙으로 생성합니다.
    pub fn new(artifact: Option<ClassifierArtifact>, heuristic: HeuristicRule) -> Self {
        Self {
            artifact,
            heuristic,
        }
    }

    /// 분류기가 로드되어 있는지
    pub fn is_enabled(&self) -> bool {
        self.artifact.is_some()
    }

    /// 휴리스틱 규칙
    pub fn heuristic(&self) -> HeuristicRule {
        self.heuristic
    }

    /// 피처 벡터를 분류하고 휴리스틱 재분류를 적용합니다.
    ///
    /// 에러는 플로우 단위이며 호출자가 기록 후 건너뜁니다.
    pub fn classify(&self, features: &FeatureVector) -> Result<Classification, FlowEngineError> {
        let verdict = match &self.artifact {
            Some(artifact) => Verdict::Class(artifact.predict_label(features)?),
            None => Verdict::Unclassified,
        };

        let eligible = match &verdict {
            Verdict::Class(_) => verdict.is_benign(),
            Verdict::Unclassified => self.heuristic.apply_without_model,
        };
        let fwd_packets = features.get(Feature::TotalFwdPackets);

        if eligible && fwd_packets > self.heuristic.fwd_packet_threshold as f64 {
            return Ok(Classification {
                verdict: Verdict::Class(HEURISTIC_LABEL.to_owned()),
                heuristic_applied: true,
            });
        }

        Ok(Classification {
            verdict,
            heuristic_applied: false,
        })
    }
}
