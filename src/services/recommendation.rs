use crate::config::LlmConfig;
use crate::core::{FeatureAnalysisRequest, FeatureRelevance, ModelRecommendRequest, Pipeline, Recommendation};
use crate::error::{ForgeError, Result};
use crate::services::backend::Backend;
use crate::state::Ticket;
use std::sync::Arc;

/// RecommendationClient asks the backend which operations or models suit a
/// dataset.
///
/// This service is responsible for:
/// - Ranked model suggestions for a target, with the configured LLM provider
/// - Unranked operation suggestions for cleaning and feature screens
/// - Column relevance analysis against a target
///
/// Each call is independent so one failing never blanks the other's result.
pub struct RecommendationClient<B> {
    backend: Arc<B>,
    llm: LlmConfig,
}

impl<B> Clone for RecommendationClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            llm: self.llm.clone(),
        }
    }
}

impl<B: Backend> RecommendationClient<B> {
    pub fn new(backend: Arc<B>, llm: LlmConfig) -> Self {
        Self { backend, llm }
    }

    /// Suggestions for the selection described by `ticket`
    pub async fn fetch(&self, ticket: &Ticket) -> Result<Vec<Recommendation>> {
        match ticket.pipeline {
            Pipeline::Training => {
                let target = ticket
                    .target
                    .clone()
                    .ok_or_else(|| ForgeError::validation("Model recommendations need a target"))?;
                let api_key = self.llm.api_key();
                if api_key.is_empty() {
                    tracing::debug!("No key in ${}, backend falls back to heuristics", self.llm.api_key_env);
                }
                let request = ModelRecommendRequest {
                    dataset_id: ticket.dataset_id,
                    target_column: target,
                    task_type: ticket.task_type,
                    provider: self.llm.provider.to_string(),
                    api_key,
                    model: self.llm.model_name(),
                };
                let recs = self.backend.recommend_models(&request).await?;
                tracing::debug!("{} model recommendations for dataset {}", recs.len(), ticket.dataset_id);
                Ok(recs)
            }
            pipeline => {
                let ids = self
                    .backend
                    .operation_recommendations(pipeline, ticket.dataset_id)
                    .await?;
                Ok(ids.into_iter().map(Recommendation::from_operation).collect())
            }
        }
    }

    /// Column relevance against the ticket's target
    pub async fn analyze(&self, ticket: &Ticket) -> Result<Vec<FeatureRelevance>> {
        let target = ticket
            .target
            .clone()
            .ok_or_else(|| ForgeError::validation("Feature analysis needs a target"))?;
        self.backend
            .analyze_features(&FeatureAnalysisRequest {
                dataset_id: ticket.dataset_id,
                target_column: target,
            })
            .await
    }
}
