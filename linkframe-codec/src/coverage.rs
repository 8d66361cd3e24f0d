//! Detection-coverage simulation.
//!
//! Segments one payload under each scheme of a [`CoveragePlan`], corrupts
//! every frame with every error model and records whether validation caught
//! the corruption.

use crate::error::CodecError;
use crate::frame::{Address, Frame};
use crate::framer::segment;
use crate::inject::{ErrorInjector, ErrorModel};
use crate::redundancy::Scheme;
use crate::validator::Validity;
use serde::Serialize;
use tracing::info;

/// Default frame size, in bytes.
pub const DEFAULT_FRAME_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct CoveragePlan {
    pub schemes: Vec<Scheme>,
    pub models: Vec<ErrorModel>,
    pub frame_size_bytes: usize,
    /// Corruptions per (model, frame).
    pub trials: usize,
    pub seed: u64,
    pub sender: Address,
    pub receiver: Address,
}

impl Default for CoveragePlan {
    fn default() -> Self {
        Self {
            schemes: Scheme::SUPPORTED.to_vec(),
            models: ErrorModel::standard(),
            frame_size_bytes: DEFAULT_FRAME_SIZE,
            trials: 1,
            seed: 0,
            sender: Address::default(),
            receiver: Address::default(),
        }
    }
}

/// One corrupted frame and its validation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageCase {
    pub scheme: Scheme,
    pub model: ErrorModel,
    pub frame: usize,
    pub trial: usize,
    pub flipped: Vec<usize>,
    /// `None` when the corrupted bits no longer parse as a frame.
    pub outcome: Option<Validity>,
    pub detected: bool,
}

impl CoverageCase {
    /// Cases that flipped nothing say nothing about detection.
    pub fn counts(&self) -> bool {
        !self.flipped.is_empty()
    }
}

/// Totals for one (scheme, model) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub scheme: Scheme,
    pub model: ErrorModel,
    pub total: usize,
    pub detected: usize,
    pub undetected: usize,
    /// Cases with no flipped bit, left out of `total`.
    pub skipped: usize,
    pub detection_rate: f64,
}

impl CoverageSummary {
    fn new(scheme: Scheme, model: ErrorModel) -> Self {
        Self {
            scheme,
            model,
            total: 0,
            detected: 0,
            undetected: 0,
            skipped: 0,
            detection_rate: 0.0,
        }
    }

    fn record(&mut self, case: &CoverageCase) {
        if !case.counts() {
            self.skipped += 1;
            return;
        }
        self.total += 1;
        if case.detected {
            self.detected += 1;
        } else {
            self.undetected += 1;
        }
    }

    fn finish(mut self) -> Self {
        self.detection_rate = if self.total == 0 {
            1.0
        } else {
            self.detected as f64 / self.total as f64
        };
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub payload_bits: usize,
    pub frame_size_bytes: usize,
    pub seed: u64,
    pub summaries: Vec<CoverageSummary>,
    pub cases: Vec<CoverageCase>,
}

impl CoverageReport {
    pub fn undetected(&self) -> impl Iterator<Item = &CoverageCase> {
        self.cases.iter().filter(|case| case.counts() && !case.detected)
    }

    pub fn summary(&self, scheme: Scheme, model: &ErrorModel) -> Option<&CoverageSummary> {
        self.summaries
            .iter()
            .find(|s| s.scheme == scheme && &s.model == model)
    }
}

/// Runs every (scheme, model, frame, trial) combination of `plan`.
pub fn run(payload: &[bool], plan: &CoveragePlan) -> Result<CoverageReport, CodecError> {
    let mut injector = ErrorInjector::seeded(plan.seed);
    let mut summaries = Vec::with_capacity(plan.schemes.len() * plan.models.len());
    let mut cases = Vec::new();

    for &scheme in &plan.schemes {
        let frames: Vec<Frame> = segment(
            payload,
            plan.sender,
            plan.receiver,
            scheme,
            plan.frame_size_bytes,
        )?
        .collect();

        for model in &plan.models {
            let mut summary = CoverageSummary::new(scheme, model.clone());
            for (index, frame) in frames.iter().enumerate() {
                for trial in 0..plan.trials {
                    let corruption = injector.inject(frame.as_bits(), model)?;
                    let outcome = Frame::parse(corruption.bits).ok().map(|f| f.validate());
                    let case = CoverageCase {
                        scheme,
                        model: model.clone(),
                        frame: index,
                        trial,
                        flipped: corruption.flipped,
                        outcome,
                        detected: outcome != Some(Validity::Valid),
                    };
                    summary.record(&case);
                    cases.push(case);
                }
            }

            let summary = summary.finish();
            info!(
                %scheme,
                model = %summary.model,
                total = summary.total,
                undetected = summary.undetected,
                "Coverage run finished"
            );
            summaries.push(summary);
        }
    }

    Ok(CoverageReport {
        payload_bits: payload.len(),
        frame_size_bytes: plan.frame_size_bytes,
        seed: plan.seed,
        summaries,
        cases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::text_to_bits;

    #[test]
    fn test_single_and_odd_errors_always_detected_by_crc() {
        let payload = text_to_bits("coverage of crc codes");
        let plan = CoveragePlan {
            schemes: vec![Scheme::Crc8, Scheme::Crc16, Scheme::Crc32],
            models: vec![ErrorModel::Single, ErrorModel::odd()],
            trials: 5,
            seed: 11,
            ..CoveragePlan::default()
        };
        let report = run(&payload, &plan).unwrap();

        assert_eq!(report.summaries.len(), 6);
        for summary in &report.summaries {
            assert!(summary.total > 0);
            assert_eq!(summary.undetected, 0, "{} {}", summary.scheme, summary.model);
            assert_eq!(summary.detection_rate, 1.0);
        }
        assert_eq!(report.undetected().count(), 0);
    }

    #[test]
    fn test_short_bursts_detected_by_crc16() {
        let payload = text_to_bits("burst errors up to the degree");
        let plan = CoveragePlan {
            schemes: vec![Scheme::Crc16],
            models: vec![ErrorModel::Burst { min: 1, max: 16 }],
            trials: 20,
            ..CoveragePlan::default()
        };
        let report = run(&payload, &plan).unwrap();
        let summary = report
            .summary(Scheme::Crc16, &ErrorModel::Burst { min: 1, max: 16 })
            .unwrap();
        assert_eq!(summary.undetected, 0);
    }

    #[test]
    fn test_case_count() {
        let payload = text_to_bits("abcdefghijklmnopqrstuvwxyz");
        let plan = CoveragePlan {
            schemes: vec![Scheme::Checksum],
            trials: 2,
            ..CoveragePlan::default()
        };
        let frames = segment(
            &payload,
            Address::default(),
            Address::default(),
            Scheme::Checksum,
            DEFAULT_FRAME_SIZE,
        )
        .unwrap()
        .len();

        let report = run(&payload, &plan).unwrap();
        assert_eq!(report.cases.len(), frames * 4 * 2);
        assert_eq!(report.payload_bits, payload.len());
    }

    #[test]
    fn test_empty_custom_cases_are_skipped() {
        let plan = CoveragePlan {
            schemes: vec![Scheme::Crc10],
            models: vec![ErrorModel::Custom(vec![100_000])],
            ..CoveragePlan::default()
        };
        let report = run(&text_to_bits("x"), &plan).unwrap();
        let summary = &report.summaries[0];
        assert_eq!(summary.total, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.detection_rate, 1.0);
    }

    #[test]
    fn test_seeded_runs_match() {
        let payload = text_to_bits("determinism");
        let plan = CoveragePlan {
            seed: 99,
            ..CoveragePlan::default()
        };
        let a = run(&payload, &plan).unwrap();
        let b = run(&payload, &plan).unwrap();
        let flips = |r: &CoverageReport| -> Vec<Vec<usize>> {
            r.cases.iter().map(|c| c.flipped.clone()).collect()
        };
        assert_eq!(flips(&a), flips(&b));
        assert_eq!(a.summaries, b.summaries);
    }

    #[test]
    fn test_frame_size_errors_surface() {
        let plan = CoveragePlan {
            frame_size_bytes: 10,
            ..CoveragePlan::default()
        };
        assert!(matches!(
            run(&[], &plan),
            Err(CodecError::FrameTooSmall { .. })
        ));
    }

    #[test]
    fn test_report_serializes() {
        let plan = CoveragePlan {
            schemes: vec![Scheme::Crc8],
            models: vec![ErrorModel::Custom(vec![0, 7])],
            ..CoveragePlan::default()
        };
        let report = run(&text_to_bits("A"), &plan).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summaries"][0]["scheme"], "crc-8");
        assert_eq!(json["summaries"][0]["model"], "custom:0,7");
        assert_eq!(json["cases"][0]["flipped"], serde_json::json!([0, 7]));
        assert_eq!(json["cases"][0]["outcome"], "invalid");
    }
}
