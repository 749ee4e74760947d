//! Selection State Machine.
//!
//! Every setter runs synchronously and returns the network [`Effect`]s it
//! needs. Each effect carries a [`Ticket`] describing the selection it was
//! issued for; responses come back through the `apply_*` methods, which
//! discard anything whose ticket no longer matches the current selection.

use crate::core::{
    Catalog, DatasetId, FeatureRelevance, ModelOption, OperationDescriptor, Pipeline, Preview,
    Recommendation, TaskType, TaskTypeSource,
};
use crate::error::{ForgeError, Result};
use crate::schema::values::{self, ParameterValues};
use crate::schema::{ParameterSpec, resolve};
use crate::state::staging::StagingBuffer;
use serde_json::Value;

/// Identity of the selection a request was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub pipeline: Pipeline,
    pub dataset_id: DatasetId,
    pub target: Option<String>,
    /// Task type sent with the request; `None` asks the backend to detect it
    pub task_type: Option<TaskType>,
}

/// Network work requested by a setter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Column list (and first rows) of the dataset
    FetchPreview(Ticket),
    /// Ranked operations or models for the dataset and target
    FetchRecommendations(Ticket),
    /// Column relevance against the target
    FetchRelevance(Ticket),
}

impl Effect {
    pub fn ticket(&self) -> &Ticket {
        match self {
            Self::FetchPreview(t) | Self::FetchRecommendations(t) | Self::FetchRelevance(t) => t,
        }
    }
}

/// Result of feeding a response back into the selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The selection moved on; the response was dropped
    Stale,
    /// The request failed; the affected field was reset to empty
    Failed(ForgeError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Epochs {
    preview: u64,
    recommendations: u64,
    relevance: u64,
}

/// Current dataset, target, features, operation and parameter values of one
/// screen.
#[derive(Debug, Clone)]
pub struct SelectionState {
    pipeline: Pipeline,
    catalog: Catalog,
    dataset_id: Option<DatasetId>,
    columns: Vec<String>,
    preview: Option<Preview>,
    target: Option<String>,
    features: Vec<String>,
    operation: Option<String>,
    parameter_specs: Vec<ParameterSpec>,
    parameter_values: ParameterValues,
    task_type: Option<TaskType>,
    task_type_source: TaskTypeSource,
    recommendations: Vec<Recommendation>,
    feature_relevance: Vec<FeatureRelevance>,
    staging: StagingBuffer,
    epochs: Epochs,
}

impl SelectionState {
    pub fn new(pipeline: Pipeline, catalog: Catalog) -> Self {
        Self {
            pipeline,
            catalog,
            dataset_id: None,
            columns: Vec::new(),
            preview: None,
            target: None,
            features: Vec::new(),
            operation: None,
            parameter_specs: Vec::new(),
            parameter_values: ParameterValues::new(),
            task_type: None,
            task_type_source: TaskTypeSource::Unset,
            recommendations: Vec::new(),
            feature_relevance: Vec::new(),
            staging: StagingBuffer::new(),
            epochs: Epochs::default(),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn dataset_id(&self) -> Option<DatasetId> {
        self.dataset_id
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub fn parameter_specs(&self) -> &[ParameterSpec] {
        &self.parameter_specs
    }

    pub fn parameter_values(&self) -> &ParameterValues {
        &self.parameter_values
    }

    pub fn task_type(&self) -> Option<TaskType> {
        self.task_type
    }

    pub fn task_type_source(&self) -> TaskTypeSource {
        self.task_type_source
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn feature_relevance(&self) -> &[FeatureRelevance] {
        &self.feature_relevance
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    /// Whether `key` is among the current recommendations
    pub fn is_recommended(&self, key: &str) -> bool {
        self.recommendations.iter().any(|r| r.key == key)
    }

    /// Whether a parameter field should be shown for the current values
    pub fn is_field_visible(&self, key: &str) -> bool {
        values::is_visible(&self.parameter_specs, &self.parameter_values, key)
    }

    /// Operations offered on this screen. Training lists only models of the
    /// current task type once one is known.
    pub fn available_operations(&self) -> Vec<OperationDescriptor> {
        let ops = self.catalog.operations(self.pipeline);
        match (self.pipeline, self.task_type) {
            (Pipeline::Training, Some(task)) => {
                let wanted = task.to_string();
                ops.into_iter().filter(|op| op.category == wanted).collect()
            }
            _ => ops,
        }
    }

    /// Task type to send with recommendation requests
    fn requested_task_type(&self) -> Option<TaskType> {
        match self.task_type_source {
            TaskTypeSource::Explicit => self.task_type,
            _ => None,
        }
    }

    fn ticket(&self, epoch: u64, dataset_id: DatasetId) -> Ticket {
        Ticket {
            epoch,
            pipeline: self.pipeline,
            dataset_id,
            target: self.target.clone(),
            task_type: self.requested_task_type(),
        }
    }

    fn is_current(&self, ticket: &Ticket, epoch: u64) -> bool {
        ticket.epoch == epoch
            && ticket.pipeline == self.pipeline
            && Some(ticket.dataset_id) == self.dataset_id
            && ticket.target == self.target
    }

    fn invalidate_insights(&mut self) {
        self.recommendations.clear();
        self.feature_relevance.clear();
        self.epochs.recommendations += 1;
        self.epochs.relevance += 1;
    }

    fn insight_effects(&self, dataset_id: DatasetId) -> Vec<Effect> {
        let mut effects = vec![Effect::FetchRecommendations(
            self.ticket(self.epochs.recommendations, dataset_id),
        )];
        if self.target.is_some() {
            effects.push(Effect::FetchRelevance(
                self.ticket(self.epochs.relevance, dataset_id),
            ));
        }
        effects
    }

    fn clear_operation(&mut self) {
        self.operation = None;
        self.parameter_specs.clear();
        self.parameter_values.clear();
    }

    /// Select a dataset. Re-selecting the current dataset changes nothing.
    ///
    /// Clears target, features, parameter values, recommendations and staged
    /// edits, then asks for the new column list. The chosen operation is
    /// kept and its fields are re-resolved once the columns arrive.
    pub fn set_dataset(&mut self, id: DatasetId) -> Vec<Effect> {
        if self.dataset_id == Some(id) {
            tracing::debug!("Dataset {} already selected", id);
            return Vec::new();
        }
        tracing::debug!("Selecting dataset {} on {}", id, self.pipeline);
        self.dataset_id = Some(id);
        self.columns.clear();
        self.preview = None;
        self.target = None;
        self.features.clear();
        self.parameter_values.clear();
        self.staging.discard();
        if self.task_type_source == TaskTypeSource::Inferred {
            self.task_type = None;
            self.task_type_source = TaskTypeSource::Unset;
        }
        self.invalidate_insights();
        self.epochs.preview += 1;

        let mut effects = vec![Effect::FetchPreview(self.ticket(self.epochs.preview, id))];
        if self.pipeline != Pipeline::Training {
            effects.extend(self.insight_effects(id));
        }
        effects
    }

    /// Choose the target column. Features become every other column and
    /// recommendations plus relevance are fetched for the new target.
    pub fn set_target(&mut self, column: &str) -> Result<Vec<Effect>> {
        let dataset_id = self
            .dataset_id
            .ok_or_else(|| ForgeError::validation("Select a dataset first"))?;
        if !self.columns.iter().any(|c| c == column) {
            return Err(ForgeError::validation(format!("Unknown column: {column}")));
        }
        self.target = Some(column.to_string());
        self.features = self.columns.iter().filter(|c| *c != column).cloned().collect();
        self.invalidate_insights();
        Ok(self.insight_effects(dataset_id))
    }

    pub fn clear_target(&mut self) {
        self.target = None;
        self.features.clear();
        self.invalidate_insights();
    }

    /// Add or remove a feature column. The target can never be a feature.
    pub fn toggle_feature(&mut self, column: &str) -> Result<()> {
        if self.target.as_deref() == Some(column) {
            return Err(ForgeError::validation(format!(
                "{column} is the target and cannot be a feature"
            )));
        }
        if !self.columns.iter().any(|c| c == column) {
            return Err(ForgeError::validation(format!("Unknown column: {column}")));
        }
        if let Some(pos) = self.features.iter().position(|f| f == column) {
            self.features.remove(pos);
        } else {
            let mut chosen = std::mem::take(&mut self.features);
            chosen.push(column.to_string());
            self.features = self
                .columns
                .iter()
                .filter(|c| chosen.contains(c))
                .cloned()
                .collect();
        }
        Ok(())
    }

    /// Replace the features with every High or Medium relevance column
    pub fn select_relevant_features(&mut self) {
        let useful: Vec<&str> = self
            .feature_relevance
            .iter()
            .filter(|r| r.relevance.is_useful())
            .map(|r| r.feature.as_str())
            .collect();
        self.features = self
            .columns
            .iter()
            .filter(|c| self.target.as_ref() != Some(*c) && useful.contains(&c.as_str()))
            .cloned()
            .collect();
    }

    /// Choose an operation or model. Values are replaced by its defaults.
    pub fn set_operation(&mut self, id: &str) -> Result<()> {
        let specs = resolve(&self.catalog, self.pipeline, id, &self.columns)?;
        let (canonical, seeded) = match self.pipeline {
            Pipeline::Training => {
                let model = self
                    .catalog
                    .model(id)
                    .ok_or_else(|| ForgeError::validation(format!("Unknown model: {id}")))?;
                if let Some(task) = self.task_type.filter(|t| *t != model.task_type) {
                    return Err(ForgeError::validation(format!(
                        "{} is a {} model, current task is {}",
                        model.name, model.task_type, task
                    )));
                }
                (model.key.clone(), model.default_params.clone())
            }
            _ => {
                let canonical = self
                    .catalog
                    .canonical_id(self.pipeline, id)
                    .unwrap_or_else(|| id.to_string());
                (canonical, values::defaults(&specs))
            }
        };
        tracing::debug!("Operation {} selected on {}", canonical, self.pipeline);
        self.operation = Some(canonical);
        self.parameter_specs = specs;
        self.parameter_values = seeded;
        Ok(())
    }

    pub fn unset_operation(&mut self) {
        self.clear_operation();
    }

    /// Set a typed parameter value. Keys without a declared field are kept
    /// as-is and submitted unchanged.
    pub fn set_parameter(&mut self, key: &str, value: Value) -> Result<()> {
        if self.operation.is_none() {
            return Err(ForgeError::validation("Select an operation first"));
        }
        if let Some(spec) = self.parameter_specs.iter().find(|s| s.key == key) {
            values::check_value(spec, &value)?;
        }
        self.parameter_values.insert(key.to_string(), value);
        Ok(())
    }

    /// Set a parameter from raw user text, parsing it for the field's kind
    pub fn set_parameter_text(&mut self, key: &str, raw: &str) -> Result<()> {
        let spec = self
            .parameter_specs
            .iter()
            .find(|s| s.key == key)
            .ok_or_else(|| ForgeError::validation(format!("Unknown parameter: {key}")))?;
        let value = values::coerce_text(spec, raw)?;
        self.parameter_values.insert(key.to_string(), value);
        Ok(())
    }

    /// Choose the task type. Clears the model and recommendations, then
    /// fetches fresh ones scoped to `task` when a target is set. Feature
    /// relevance depends only on the target and is left alone.
    pub fn set_task_type(&mut self, task: TaskType) -> Vec<Effect> {
        self.task_type = Some(task);
        self.task_type_source = TaskTypeSource::Explicit;
        self.clear_operation();
        self.recommendations.clear();
        self.epochs.recommendations += 1;
        match (self.dataset_id, &self.target) {
            (Some(id), Some(_)) => vec![Effect::FetchRecommendations(
                self.ticket(self.epochs.recommendations, id),
            )],
            _ => Vec::new(),
        }
    }

    /// Install the served model registry
    pub fn set_models(&mut self, models: Vec<ModelOption>) {
        self.catalog.set_models(models);
        if self.pipeline != Pipeline::Training {
            return;
        }
        if let Some(op) = self.operation.clone() {
            match resolve(&self.catalog, self.pipeline, &op, &self.columns) {
                Ok(specs) => self.parameter_specs = specs,
                Err(_) => {
                    tracing::debug!("Model {} no longer served, clearing it", op);
                    self.clear_operation();
                }
            }
        }
    }

    pub fn stage_cell(&mut self, row: u64, column: &str, value: Value) -> Result<()> {
        if !self.columns.iter().any(|c| c == column) {
            return Err(ForgeError::validation(format!("Unknown column: {column}")));
        }
        self.staging.stage(row, column, value);
        Ok(())
    }

    pub fn unstage_cell(&mut self, row: u64, column: &str) -> Option<Value> {
        self.staging.unstage(row, column)
    }

    pub fn discard_staged(&mut self) {
        self.staging.discard();
    }

    pub(crate) fn staging_mut(&mut self) -> &mut StagingBuffer {
        &mut self.staging
    }

    /// Names of the selection fields still blocking submission
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.dataset_id.is_none() {
            missing.push("dataset".to_string());
        }
        if self.operation.is_none() {
            missing.push(match self.pipeline {
                Pipeline::Training => "model".to_string(),
                _ => "operation".to_string(),
            });
        }
        if self.pipeline == Pipeline::Training {
            if self.target.is_none() {
                missing.push("target".to_string());
            }
            if self.features.is_empty() {
                missing.push("features".to_string());
            }
        }
        missing.extend(values::missing_required(
            &self.parameter_specs,
            &self.parameter_values,
        ));
        missing
    }

    /// Whether the submit control should be enabled
    pub fn can_submit(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Feed back a preview response
    pub fn apply_preview(&mut self, ticket: &Ticket, result: Result<Preview>) -> ApplyOutcome {
        if !self.is_current(ticket, self.epochs.preview) {
            tracing::debug!("Discarding stale preview for dataset {}", ticket.dataset_id);
            return ApplyOutcome::Stale;
        }
        let preview = match result {
            Ok(preview) => preview,
            Err(err) => {
                tracing::warn!("Preview of dataset {} failed: {}", ticket.dataset_id, err);
                return ApplyOutcome::Failed(err);
            }
        };
        self.columns = preview.columns.clone();
        self.preview = Some(preview);

        let target_gone = self
            .target
            .as_ref()
            .is_some_and(|t| !self.columns.contains(t));
        if target_gone {
            self.target = None;
            self.features.clear();
        }
        let columns = &self.columns;
        self.features.retain(|f| columns.contains(f));
        self.staging.retain_columns(&self.columns);

        if let Some(op) = self.operation.clone() {
            match resolve(&self.catalog, self.pipeline, &op, &self.columns) {
                Ok(specs) => {
                    values::retain_present_columns(&specs, &mut self.parameter_values, &self.columns);
                    let seeded = match self.catalog.model(&op) {
                        Some(model) if self.pipeline == Pipeline::Training => model.default_params.clone(),
                        _ => values::defaults(&specs),
                    };
                    for (key, value) in seeded {
                        self.parameter_values.entry(key).or_insert(value);
                    }
                    self.parameter_specs = specs;
                }
                Err(_) => self.clear_operation(),
            }
        }
        ApplyOutcome::Applied
    }

    /// Feed back a recommendation response.
    ///
    /// When the request went out without a task type on the training
    /// screen, the top recommendation decides the task type and becomes the
    /// selected model.
    pub fn apply_recommendations(
        &mut self,
        ticket: &Ticket,
        result: Result<Vec<Recommendation>>,
    ) -> ApplyOutcome {
        if !self.is_current(ticket, self.epochs.recommendations) {
            tracing::debug!(
                "Discarding stale recommendations for dataset {} target {:?}",
                ticket.dataset_id,
                ticket.target
            );
            return ApplyOutcome::Stale;
        }
        let recs = match result {
            Ok(recs) => recs,
            Err(err) => {
                tracing::warn!("Recommendations for dataset {} failed: {}", ticket.dataset_id, err);
                self.recommendations.clear();
                return ApplyOutcome::Failed(err);
            }
        };
        self.recommendations = recs;

        if self.pipeline == Pipeline::Training && ticket.task_type.is_none() {
            self.infer_from_top_recommendation();
        }
        ApplyOutcome::Applied
    }

    fn infer_from_top_recommendation(&mut self) {
        let Some(top) = self.recommendations.first() else {
            return;
        };
        let key = top.key.clone();
        let Some(task) = self.catalog.model(&key).map(|m| m.task_type) else {
            tracing::debug!("Top recommendation {} is not a served model", key);
            return;
        };
        if self.task_type != Some(task) {
            tracing::info!("Inferred task type {} from recommendation {}", task, key);
            self.clear_operation();
        }
        self.task_type = Some(task);
        self.task_type_source = TaskTypeSource::Inferred;
        if let Err(err) = self.set_operation(&key) {
            tracing::warn!("Could not select recommended model {}: {}", key, err);
        }
    }

    /// Feed back a column relevance response
    pub fn apply_relevance(
        &mut self,
        ticket: &Ticket,
        result: Result<Vec<FeatureRelevance>>,
    ) -> ApplyOutcome {
        if !self.is_current(ticket, self.epochs.relevance) {
            tracing::debug!("Discarding stale relevance for target {:?}", ticket.target);
            return ApplyOutcome::Stale;
        }
        match result {
            Ok(relevance) => {
                self.feature_relevance = relevance;
                ApplyOutcome::Applied
            }
            Err(err) => {
                tracing::warn!("Feature analysis for dataset {} failed: {}", ticket.dataset_id, err);
                self.feature_relevance.clear();
                ApplyOutcome::Failed(err)
            }
        }
    }
}
