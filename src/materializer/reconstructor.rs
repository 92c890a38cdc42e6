//! Caller-facing reconstruction surface.
//!
//! A [`Reconstructor`] is configured once (root type, key, field paths) and then
//! executed any number of times, concurrently if needed: the fold plan is immutable
//! and every execution owns its identity table.

use serde_json::Value;
use std::sync::Arc;

use crate::config::FolderConfig;
use crate::entity_catalog::EntityCatalog;
use crate::row_source::{QueryParams, RowCursor, RowSource};

use super::distinct::PostProcess;
use super::entity::Entity;
use super::errors::MaterializeError;
use super::multi_source::MultiSourceReconstructor;
use super::row_folder::{FoldPlan, FoldStats, RowCallback, RowFolder};
use super::row_shape::{RowShaper, SplitOn};

/// One execution request: SQL text, bound parameters and per-call options
pub struct Query {
    sql: String,
    params: QueryParams,
    split_on: Option<SplitOn>,
    post_process: Vec<PostProcess>,
    on_row: Option<RowCallback>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Query {
            sql: sql.into(),
            params: QueryParams::new(),
            split_on: None,
            post_process: Vec::new(),
            on_row: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: QueryParams) -> Self {
        self.params.extend(params);
        self
    }

    pub fn split_on(mut self, split_on: SplitOn) -> Self {
        self.split_on = Some(split_on);
        self
    }

    /// Add a hook run on every root after folding, in the order added
    pub fn post_process(mut self, hook: PostProcess) -> Self {
        self.post_process.push(hook);
        self
    }

    /// Observe every raw materialized row after it has been folded
    pub fn on_row(mut self, callback: impl FnMut(&[Option<Entity>]) + Send + 'static) -> Self {
        self.on_row = Some(Box::new(callback));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[derive(Debug, Clone)]
pub struct Reconstructor {
    catalog: Arc<EntityCatalog>,
    plan: Arc<FoldPlan>,
    config: FolderConfig,
}

impl Reconstructor {
    /// Resolve the root key and field paths; all path errors surface here
    pub fn new(
        catalog: Arc<EntityCatalog>,
        root_type: &str,
        key_field: &str,
        field_paths: &[&str],
    ) -> Result<Self, MaterializeError> {
        let plan = FoldPlan::new(&catalog, root_type, key_field, field_paths)?;
        Ok(Reconstructor {
            catalog,
            plan: Arc::new(plan),
            config: FolderConfig::default(),
        })
    }

    pub fn with_config(mut self, config: FolderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &Arc<EntityCatalog> {
        &self.catalog
    }

    pub fn plan(&self) -> &Arc<FoldPlan> {
        &self.plan
    }

    pub fn config(&self) -> &FolderConfig {
        &self.config
    }

    /// Run the query and return the distinct roots in first-seen order
    pub async fn execute(
        &self,
        source: &dyn RowSource,
        query: Query,
    ) -> Result<Vec<Entity>, MaterializeError> {
        let (roots, _) = self.execute_with_stats(source, query).await?;
        Ok(roots)
    }

    pub async fn execute_with_stats(
        &self,
        source: &dyn RowSource,
        query: Query,
    ) -> Result<(Vec<Entity>, FoldStats), MaterializeError> {
        let Query {
            sql,
            params,
            split_on,
            post_process,
            on_row,
        } = query;

        log::debug!("Reconstructing `{}` from: {}", self.plan.root_type(), sql);
        let mut cursor = source.query(&sql, &params).await?;
        let (mut roots, stats) = fold_cursor(
            &self.catalog,
            &self.plan,
            &self.config,
            cursor.as_mut(),
            split_on.as_ref(),
            on_row,
        )
        .await?;

        for hook in &post_process {
            for root in roots.iter_mut() {
                hook(root)?;
            }
        }

        log::debug!(
            "Folded {} rows into {} `{}` roots ({} skipped attachments)",
            stats.rows,
            stats.roots,
            self.plan.root_type(),
            stats.skipped_attachments
        );
        Ok((roots, stats))
    }

    /// Fold rows that are already shaped to the type sequence
    pub fn fold_rows<I>(&self, rows: I) -> Result<Vec<Entity>, MaterializeError>
    where
        I: IntoIterator<Item = Vec<Option<Entity>>>,
    {
        let mut folder = RowFolder::new(Arc::clone(&self.plan), self.config.null_policy);
        for row in rows {
            folder.fold(row)?;
        }
        Ok(folder.finish().0)
    }

    /// Start a multi-source configuration rooted at this reconstructor's plan
    pub fn multi_source(
        &self,
        root_sql: impl Into<String>,
    ) -> Result<MultiSourceReconstructor, MaterializeError> {
        MultiSourceReconstructor::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.plan),
            self.config.clone(),
            root_sql.into(),
        )
    }
}

/// Shape and fold every row of `cursor` through `plan`
pub(crate) async fn fold_cursor(
    catalog: &EntityCatalog,
    plan: &Arc<FoldPlan>,
    config: &FolderConfig,
    cursor: &mut dyn RowCursor,
    split_on: Option<&SplitOn>,
    on_row: Option<RowCallback>,
) -> Result<(Vec<Entity>, FoldStats), MaterializeError> {
    let shaper = RowShaper::new(catalog, plan.sequence(), split_on, cursor.columns(), config)?;

    let mut folder = RowFolder::new(Arc::clone(plan), config.null_policy);
    if let Some(callback) = on_row {
        folder = folder.with_row_callback(callback);
    }

    while let Some(values) = cursor.next_row().await? {
        folder.fold(shaper.shape(&values)?)?;
    }
    Ok(folder.finish())
}
