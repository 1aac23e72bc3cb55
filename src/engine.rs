//! Inference engine: runs the full pipeline for one video.
//!
//! FrameSource -> LandmarkExtractor -> SequenceWindower -> BehaviorClassifier
//! -> TemporalAggregator, with the PoseAnalysisReporter tapping the landmark
//! stream for enhanced requests.
//!
//! The pose backend and classifier are expensive to build, so one engine is
//! shared by every request. Each sits behind its own `Mutex`; concurrent
//! requests serialize on them. `SharedEngine` builds the engine on first use
//! under double-checked locking and never caches a failed build.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use crate::analysis::{PoseAnalysis, PoseAnalysisReporter};
use crate::classify::{classify, BehaviorClassifier, StubClassifier};
use crate::config::{DetectorConfig, ServiceConfig};
use crate::detect::{LandmarkExtractor, PoseBackend, StubPoseBackend};
use crate::ingest::{FileOpener, FrameSource, VideoOpener};
use crate::pipeline::{Sequence, SequenceWindower, TemporalAggregator, WindowOutcome};
use crate::result::{EnhancedVideoResult, VideoInfo, VideoResult};

/// Model parameters reported by `/api/v1/model/info`.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ModelInfo {
    pub classes: Vec<String>,
    pub num_classes: usize,
    pub sequence_length: usize,
    pub image_size: u32,
    pub confidence_threshold: f32,
    pub min_duration: f64,
}

pub struct InferenceEngine {
    cfg: DetectorConfig,
    opener: Box<dyn VideoOpener>,
    extractor: Mutex<LandmarkExtractor>,
    classifier: Mutex<Box<dyn BehaviorClassifier>>,
    classes: Vec<String>,
}

impl InferenceEngine {
    pub fn new(
        cfg: DetectorConfig,
        opener: Box<dyn VideoOpener>,
        pose: Box<dyn PoseBackend>,
        classifier: Box<dyn BehaviorClassifier>,
    ) -> Result<Self> {
        cfg.validate()?;
        let classes = classifier.classes().to_vec();
        if classes.is_empty() {
            return Err(anyhow!("classifier '{}' has no classes", classifier.name()));
        }
        if !classes.iter().any(|c| *c == cfg.normal_label) {
            log::warn!(
                "classifier classes do not include the normal label '{}'",
                cfg.normal_label
            );
        }
        let mut extractor = LandmarkExtractor::new(pose);
        extractor.warm_up()?;
        log::info!(
            "inference engine ready (pose: {}, classifier: {}, {} classes, {}-frame windows)",
            extractor.backend_name(),
            classifier.name(),
            classes.len(),
            cfg.sequence_length
        );
        Ok(Self {
            cfg,
            opener,
            extractor: Mutex::new(extractor),
            classifier: Mutex::new(classifier),
            classes,
        })
    }

    /// Engine over the deterministic stub backends.
    pub fn stub(cfg: DetectorConfig) -> Result<Self> {
        Self::new(
            cfg,
            Box::new(FileOpener),
            Box::new(StubPoseBackend::new()),
            Box::new(StubClassifier::new()),
        )
    }

    /// Build the production engine from model artifacts.
    ///
    /// A missing model or label encoder is fatal.
    pub fn load(service: &ServiceConfig) -> Result<Self> {
        require_artifact("model", &service.model_path)?;
        require_artifact("label encoder", &service.label_encoder_path)?;
        let labels = crate::classify::LabelEncoder::load(&service.label_encoder_path)?;

        #[cfg(feature = "backend-tract")]
        {
            require_artifact("pose model", &service.pose_model_path)?;
            let detector = &service.detector;
            let pose = crate::detect::TractPoseBackend::new(
                &service.pose_model_path,
                detector.image_size,
            )?;
            let classifier = crate::classify::TractClassifier::new(
                &service.model_path,
                labels,
                detector.sequence_length,
            )?;
            Self::new(
                detector.clone(),
                Box::new(FileOpener),
                Box::new(pose),
                Box::new(classifier),
            )
        }
        #[cfg(not(feature = "backend-tract"))]
        {
            let _ = labels;
            Err(anyhow!(
                "model inference requires the backend-tract feature"
            ))
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            classes: self.classes.clone(),
            num_classes: self.classes.len(),
            sequence_length: self.cfg.sequence_length,
            image_size: self.cfg.image_size,
            confidence_threshold: self.cfg.confidence_threshold,
            min_duration: self.cfg.min_detection_duration,
        }
    }

    pub fn detect(&self, path: &Path) -> Result<VideoResult> {
        let (result, _) = self.run(path, false)?;
        Ok(result)
    }

    pub fn detect_with_pose_analysis(&self, path: &Path) -> Result<EnhancedVideoResult> {
        let (result, pose_analysis) = self.run(path, true)?;
        let pose_analysis = pose_analysis
            .ok_or_else(|| anyhow!("pose analysis was not collected"))?;
        Ok(EnhancedVideoResult {
            result,
            pose_analysis,
        })
    }

    fn run(&self, path: &Path, with_pose: bool) -> Result<(VideoResult, Option<PoseAnalysis>)> {
        let mut source = FrameSource::open(self.opener.as_ref(), path, &self.cfg);
        let fps = source.fps();
        let mut windower = SequenceWindower::new(self.cfg.sequence_length)?;
        let mut reporter = with_pose.then(|| PoseAnalysisReporter::new(fps));
        let mut sequences: Vec<Sequence> = Vec::new();

        {
            let mut extractor = self
                .extractor
                .lock()
                .map_err(|_| anyhow!("landmark extractor lock poisoned"))?;
            extractor.reset_stats();
            for frame in source.by_ref() {
                let vector = extractor.extract_or_zero(&frame);
                if let Some(reporter) = reporter.as_mut() {
                    reporter.observe(&vector);
                }
                if let Some(sequence) = windower.push(vector) {
                    sequences.push(sequence);
                }
            }
            let stats = extractor.stats();
            log::info!(
                "extracted landmarks from {} frames of {} ({} with pose, {} without, {} errors)",
                stats.frames,
                path.display(),
                stats.detected,
                stats.not_detected,
                stats.errors
            );
        }
        if windower.dropped() > 0 {
            log::debug!(
                "dropped {} trailing frames shorter than a full window",
                windower.dropped()
            );
        }

        let source_stats = source.stats();
        if source_stats.open_failed || source_stats.ended_early {
            log::warn!(
                "video {} yielded {} frames (open failed: {}, ended early: {}, {} read failures)",
                path.display(),
                source_stats.frames_read,
                source_stats.open_failed,
                source_stats.ended_early,
                source_stats.read_failures
            );
        } else {
            log::debug!(
                "video {} yielded {} frames ({} read failures)",
                path.display(),
                source_stats.frames_read,
                source_stats.read_failures
            );
        }
        let frame_count = source.frame_count();
        drop(source);

        let outcomes = self.classify_all(&sequences)?;
        let video_info = VideoInfo {
            duration: frame_count as f64 / fps,
            fps,
            frame_count,
        };
        let result = TemporalAggregator::new(&self.cfg, fps).aggregate(&outcomes, video_info);
        Ok((result, reporter.map(PoseAnalysisReporter::finish)))
    }

    fn classify_all(&self, sequences: &[Sequence]) -> Result<Vec<WindowOutcome>> {
        let mut classifier = self
            .classifier
            .lock()
            .map_err(|_| anyhow!("classifier lock poisoned"))?;
        let outcomes = sequences
            .iter()
            .map(|sequence| match classify(&mut **classifier, sequence) {
                Ok(prediction) => WindowOutcome::Classified(prediction),
                Err(err) => {
                    log::warn!(
                        "skipping window {}: classification failed: {:#}",
                        sequence.index(),
                        err
                    );
                    WindowOutcome::Failed {
                        window_index: sequence.index(),
                    }
                }
            })
            .collect();
        Ok(outcomes)
    }
}

fn require_artifact(kind: &str, path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(anyhow!("{} not found at {}", kind, path.display()));
    }
    Ok(())
}

type EngineFactory = dyn Fn() -> Result<InferenceEngine> + Send + Sync;

/// Process-wide engine, built on first use.
pub struct SharedEngine {
    factory: Box<EngineFactory>,
    engine: OnceLock<Arc<InferenceEngine>>,
    init_lock: Mutex<()>,
}

impl SharedEngine {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<InferenceEngine> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            engine: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Lazily load the production engine from `cfg`'s artifacts.
    pub fn from_config(cfg: ServiceConfig) -> Self {
        Self::new(move || InferenceEngine::load(&cfg))
    }

    /// Wrap an already-built engine.
    pub fn preloaded(engine: InferenceEngine) -> Self {
        let shared = Self::new(|| Err(anyhow!("engine was preloaded")));
        let _ = shared.engine.set(Arc::new(engine));
        shared
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    /// The shared engine, building it if this is the first call.
    pub fn get(&self) -> Result<Arc<InferenceEngine>> {
        if let Some(engine) = self.engine.get() {
            return Ok(engine.clone());
        }
        let _guard = self
            .init_lock
            .lock()
            .map_err(|_| anyhow!("engine init lock poisoned"))?;
        if let Some(engine) = self.engine.get() {
            return Ok(engine.clone());
        }
        log::info!("initializing inference engine");
        let engine = Arc::new((self.factory)()?);
        if self.engine.set(engine.clone()).is_err() {
            return Err(anyhow!("engine initialized twice"));
        }
        Ok(engine)
    }
}
