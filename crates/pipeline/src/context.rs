use std::sync::Arc;

use visionary_replicate::InferenceApi;
use visionary_storage::{MediaFetcher, ObjectStorage};

use crate::access_url::AccessUrlResolver;
use crate::config::PipelineConfig;
use crate::enhancer::PromptEnhancer;
use crate::recorder::{HistoryRecorder, HistoryStore};
use crate::submitter::JobSubmitter;

/// Process-wide handles to the external services.
///
/// Built once at startup and passed explicitly to every component.
/// Cloning is cheap.
#[derive(Clone)]
pub struct PipelineContext {
    pub inference: Arc<dyn InferenceApi>,
    pub storage: Arc<dyn ObjectStorage>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub history: Arc<dyn HistoryStore>,
    pub enhancer: Option<Arc<PromptEnhancer>>,
    pub config: Arc<PipelineConfig>,
}

impl PipelineContext {
    pub fn new(
        inference: Arc<dyn InferenceApi>,
        storage: Arc<dyn ObjectStorage>,
        fetcher: Arc<dyn MediaFetcher>,
        history: Arc<dyn HistoryStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            inference,
            storage,
            fetcher,
            history,
            enhancer: None,
            config: Arc::new(config),
        }
    }

    pub fn with_enhancer(mut self, enhancer: PromptEnhancer) -> Self {
        self.enhancer = Some(Arc::new(enhancer));
        self
    }

    pub fn resolver(&self) -> AccessUrlResolver {
        AccessUrlResolver::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.config),
        )
    }

    pub fn submitter(&self) -> JobSubmitter {
        JobSubmitter::new(
            Arc::clone(&self.inference),
            Arc::clone(&self.fetcher),
            self.resolver(),
            Arc::clone(&self.config),
        )
    }

    pub fn recorder(&self) -> HistoryRecorder {
        HistoryRecorder::new(Arc::clone(&self.history))
    }
}
