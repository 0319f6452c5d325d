//! JSON 분류기 아티팩트 로더
//!
//! 네 개의 JSON 파일을 읽어 [`ClassifierArtifact`]를 구성합니다.
//!
//! | 파일 | 형식 |
//! |------|------|
//! | features | `["Flow Duration", "Flow Bytes/s", ...]` |
//! | scaler | `{"mean": [...], "scale": [...]}` |
//! | model | `{"coefficients": [[...], ...], "intercepts": [...]}` |
//! | labels | `["BENIGN", "DDoS", ...]` |
//!
//! 모델 파일이 없으면 분류 비활성(`Ok(None)`), 파일은 있지만 형식이나
//! 차원이 맞지 않으면 에러입니다.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use netwarden_core::config::ClassifierConfig;
use netwarden_core::error::ClassifierError;

use crate::classifier::{ClassifierArtifact, FeatureScaler, FlowModel, LabelDecoder};

/// 표준화 스케일러: `(x - mean) / scale`
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    /// 피처별 평균
    pub mean: Vec<f64>,
    /// 피처별 표준편차 (0은 1로 취급)
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// 구조를 검증합니다.
    pub fn validate(&self) -> Result<(), String> {
        if self.mean.len() != self.scale.len() {
            return Err(format!(
                "mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err("non-finite value".to_owned());
        }
        Ok(())
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, input: &mut [f64]) -> Result<(), ClassifierError> {
        if input.len() != self.mean.len() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.mean.len(),
                got: input.len(),
            });
        }
        for ((x, mean), scale) in input.iter_mut().zip(&self.mean).zip(&self.scale) {
            let scale = if *scale == 0.0 { 1.0 } else { *scale };
            *x = (*x - mean) / scale;
        }
        Ok(())
    }
}

/// 선형 다중 클래스 모델
///
/// 클래스별 점수 `w·x + b` 중 최댓값의 인덱스를 반환합니다.
/// 계수 행이 하나뿐이면 이진 분류로 보고 점수 > 0 이면 1, 아니면 0입니다.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    /// 클래스별 계수 (행 = 클래스)
    pub coefficients: Vec<Vec<f64>>,
    /// 클래스별 절편
    pub intercepts: Vec<f64>,
}

impl LinearModel {
    /// 구조를 검증합니다.
    pub fn validate(&self) -> Result<(), String> {
        if self.coefficients.is_empty() {
            return Err("no coefficient rows".to_owned());
        }
        if self.coefficients.len() != self.intercepts.len() {
            return Err(format!(
                "{} coefficient rows but {} intercepts",
                self.coefficients.len(),
                self.intercepts.len()
            ));
        }
        let width = self.coefficients[0].len();
        if width == 0 || self.coefficients.iter().any(|row| row.len() != width) {
            return Err("coefficient rows must share a non-zero width".to_owned());
        }
        let finite = self
            .coefficients
            .iter()
            .flatten()
            .chain(&self.intercepts)
            .all(|v| v.is_finite());
        if !finite {
            return Err("non-finite coefficient".to_owned());
        }
        Ok(())
    }

    /// 모델이 구분하는 클래스 수
    pub fn class_count(&self) -> usize {
        match self.coefficients.len() {
            1 => 2,
            n => n,
        }
    }

    fn score(row: &[f64], intercept: f64, input: &[f64]) -> f64 {
        row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + intercept
    }
}

impl FlowModel for LinearModel {
    fn input_len(&self) -> usize {
        self.coefficients.first().map_or(0, Vec::len)
    }

    fn predict(&self, input: &[f64]) -> Result<usize, ClassifierError> {
        if input.len() != self.input_len() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.input_len(),
                got: input.len(),
            });
        }

        let scores: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| Self::score(row, *b, input))
            .collect();
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(ClassifierError::Prediction("non-finite score".to_owned()));
        }

        if let [score] = scores.as_slice() {
            return Ok(usize::from(*score > 0.0));
        }

        scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .ok_or_else(|| ClassifierError::Prediction("empty model".to_owned()))
    }
}

/// 클래스 인덱스 → 레이블 테이블
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct LabelClasses(pub Vec<String>);

impl LabelDecoder for LabelClasses {
    fn decode(&self, index: usize) -> Result<String, ClassifierError> {
        self.0
            .get(index)
            .cloned()
            .ok_or(ClassifierError::UnknownClass {
                index,
                known: self.0.len(),
            })
    }

    fn class_count(&self) -> usize {
        self.0.len()
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> ClassifierError {
    ClassifierError::Artifact {
        path: path.to_owned(),
        reason: reason.into(),
    }
}

async fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, ClassifierError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| invalid(path, e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| invalid(path, e.to_string()))
}

/// 설정된 경로에서 아티팩트를 로드합니다.
///
/// - 모델 경로가 비었거나 파일이 없으면 경고 후 `Ok(None)`
/// - 나머지 파일 누락, 파싱 실패, 차원 불일치는 `Err`
pub async fn load_artifact(
    config: &ClassifierConfig,
) -> Result<Option<ClassifierArtifact>, ClassifierError> {
    if !config.is_configured() {
        warn!("no classifier configured, flows will expire without alerts");
        return Ok(None);
    }
    if !Path::new(&config.model_path).exists() {
        warn!(
            path = config.model_path.as_str(),
            "classifier model not found, flows will expire without alerts"
        );
        return Ok(None);
    }

    let model: LinearModel = read_json(&config.model_path).await?;
    model
        .validate()
        .map_err(|reason| invalid(&config.model_path, reason))?;

    let scaler: StandardScaler = read_json(&config.scaler_path).await?;
    scaler
        .validate()
        .map_err(|reason| invalid(&config.scaler_path, reason))?;
    if scaler.mean.len() != model.input_len() {
        return Err(invalid(
            &config.scaler_path,
            format!(
                "scaler has {} features but model expects {}",
                scaler.mean.len(),
                model.input_len()
            ),
        ));
    }

    let features: Vec<String> = read_json(&config.features_path).await?;
    let labels: LabelClasses = read_json(&config.labels_path).await?;
    if labels.0.len() < model.class_count() {
        return Err(invalid(
            &config.labels_path,
            format!(
                "{} labels for a model with {} classes",
                labels.0.len(),
                model.class_count()
            ),
        ));
    }

    let input_len = model.input_len();
    let classes = labels.0.len();
    let artifact = ClassifierArtifact::new(
        &features,
        Box::new(scaler),
        Box::new(model),
        Box::new(labels),
    )
    .map_err(|e| invalid(&config.features_path, e.to_string()))?;

    info!(
        model = config.model_path.as_str(),
        features = input_len,
        classes,
        "classifier artifact loaded"
    );
    Ok(Some(artifact))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;
    use crate::classifier::SelectedFeature;

    fn write(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn config(dir: &TempDir, model: &str, scaler: &str, features: &str, labels: &str) -> ClassifierConfig {
        ClassifierConfig {
            model_path: write(dir, "model.json", model),
            scaler_path: write(dir, "scaler.json", scaler),
            features_path: write(dir, "features.json", features),
            labels_path: write(dir, "labels.json", labels),
        }
    }

    #[test]
    fn scaler_standardizes_and_guards_zero_scale() {
        let scaler = StandardScaler {
            mean: vec![10.0, 5.0],
            scale: vec![2.0, 0.0],
        };
        let mut input = [14.0, 7.0];
        scaler.transform(&mut input).unwrap();
        assert_eq!(input, [2.0, 2.0]);

        let mut short = [1.0];
        assert!(scaler.transform(&mut short).is_err());
    }

    #[test]
    fn linear_model_argmax() {
        let model = LinearModel {
            coefficients: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, -1.0]],
            intercepts: vec![0.0, 0.0, 0.0],
        };
        model.validate().unwrap();
        assert_eq!(model.class_count(), 3);
        assert_eq!(model.predict(&[3.0, 1.0]).unwrap(), 0);
        assert_eq!(model.predict(&[1.0, 3.0]).unwrap(), 1);
        assert_eq!(model.predict(&[-3.0, -3.0]).unwrap(), 2);
    }

    #[test]
    fn linear_model_single_row_is_binary() {
        let model = LinearModel {
            coefficients: vec![vec![1.0]],
            intercepts: vec![-10.0],
        };
        assert_eq!(model.class_count(), 2);
        assert_eq!(model.predict(&[5.0]).unwrap(), 0);
        assert_eq!(model.predict(&[15.0]).unwrap(), 1);
    }

    #[test]
    fn linear_model_rejects_bad_input() {
        let model = LinearModel {
            coefficients: vec![vec![1.0, 1.0]],
            intercepts: vec![0.0],
        };
        assert!(matches!(
            model.predict(&[1.0]),
            Err(ClassifierError::DimensionMismatch { expected: 2, got: 1 })
        ));
        assert!(matches!(
            model.predict(&[f64::NAN, 1.0]),
            Err(ClassifierError::Prediction(_))
        ));
    }

    #[test]
    fn linear_model_validate_catches_ragged_rows() {
        let model = LinearModel {
            coefficients: vec![vec![1.0, 1.0], vec![1.0]],
            intercepts: vec![0.0, 0.0],
        };
        assert!(model.validate().is_err());

        let model = LinearModel {
            coefficients: vec![vec![1.0]],
            intercepts: vec![],
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn labels_decode() {
        let labels = LabelClasses(vec!["BENIGN".to_owned(), "DDoS".to_owned()]);
        assert_eq!(labels.decode(1).unwrap(), "DDoS");
        assert!(matches!(
            labels.decode(2),
            Err(ClassifierError::UnknownClass { index: 2, known: 2 })
        ));
    }

    #[tokio::test]
    async fn unconfigured_classifier_is_disabled() {
        let result = load_artifact(&ClassifierConfig::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn missing_model_file_is_disabled() {
        let dir = TempDir::new().unwrap();
        let cfg = ClassifierConfig {
            model_path: dir.path().join("absent.json").to_string_lossy().into_owned(),
            scaler_path: "unused".to_owned(),
            features_path: "unused".to_owned(),
            labels_path: "unused".to_owned(),
        };
        assert!(load_artifact(&cfg).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn loads_complete_artifact() {
        let dir = TempDir::new().unwrap();
        let cfg = config(
            &dir,
            r#"{"coefficients": [[0.0, 1.0]], "intercepts": [-1.0]}"#,
            r#"{"mean": [0.0, 100.0], "scale": [1.0, 10.0]}"#,
            r#"["Total Fwd Packets", "Flow Bytes/s"]"#,
            r#"["BENIGN", "DoS Hulk"]"#,
        );
        let artifact = load_artifact(&cfg).await.unwrap().unwrap();
        assert_eq!(
            artifact.selection()[0],
            SelectedFeature::Known(crate::features::Feature::TotalFwdPackets)
        );

        let mut v = crate::features::FeatureVector::default();
        v.set(crate::features::Feature::FlowBytesPerSec, 300.0);
        assert_eq!(artifact.predict_label(&v).unwrap(), "DoS Hulk");
        v.set(crate::features::Feature::FlowBytesPerSec, 100.0);
        assert_eq!(artifact.predict_label(&v).unwrap(), "BENIGN");
    }

    #[tokio::test]
    async fn malformed_model_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, "{not json", "{}", "[]", "[]");
        let err = load_artifact(&cfg).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Artifact { ref path, .. } if path.ends_with("model.json")));
    }

    #[tokio::test]
    async fn scaler_width_must_match_model() {
        let dir = TempDir::new().unwrap();
        let cfg = config(
            &dir,
            r#"{"coefficients": [[1.0, 1.0]], "intercepts": [0.0]}"#,
            r#"{"mean": [0.0], "scale": [1.0]}"#,
            r#"["Flow Duration", "Flow Bytes/s"]"#,
            r#"["BENIGN", "Bot"]"#,
        );
        let err = load_artifact(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("scaler has 1 features"));
    }

    #[tokio::test]
    async fn feature_list_must_match_model() {
        let dir = TempDir::new().unwrap();
        let cfg = config(
            &dir,
            r#"{"coefficients": [[1.0, 1.0]], "intercepts": [0.0]}"#,
            r#"{"mean": [0.0, 0.0], "scale": [1.0, 1.0]}"#,
            r#"["Flow Duration"]"#,
            r#"["BENIGN", "Bot"]"#,
        );
        let err = load_artifact(&cfg).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Artifact { ref path, .. } if path.ends_with("features.json")));
    }

    #[tokio::test]
    async fn too_few_labels_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cfg = config(
            &dir,
            r#"{"coefficients": [[1.0], [2.0], [3.0]], "intercepts": [0.0, 0.0, 0.0]}"#,
            r#"{"mean": [0.0], "scale": [1.0]}"#,
            r#"["Flow Duration"]"#,
            r#"["BENIGN", "Bot"]"#,
        );
        assert!(load_artifact(&cfg).await.is_err());
    }
}
