//! Multi-result-set reconstruction.
//!
//! The root and each configured child come from separate statements keyed by the same
//! value, so one-to-many children never multiply each other's rows. Children attach
//! in configuration order. When the source can multiplex and batching is enabled, all
//! statements travel in one round trip; otherwise they run one after another.

use serde_json::Value;
use std::sync::Arc;

use crate::config::FolderConfig;
use crate::entity_catalog::EntityCatalog;
use crate::row_source::parameter_substitution::validate_parameter_name;
use crate::row_source::statement_batch::join_statements;
use crate::row_source::{first_parameter_name, QueryParams, RowCursor, RowSource, RowSourceError};

use super::entity::{Entity, EntityKey};
use super::errors::MaterializeError;
use super::field_path::FieldPath;
use super::reconstructor::fold_cursor;
use super::row_folder::FoldPlan;
use super::row_shape::{RowShaper, SplitOn};
use super::type_sequence::TypeSequence;

/// Per-child options
#[derive(Debug, Clone, Default)]
pub struct ChildOptions {
    /// Bind parameter name; derived from the first `$name` in the SQL when absent
    pub param_name: Option<String>,
    /// Fold the child's own rows before attaching them
    pub folding: Option<ChildFolding>,
}

impl ChildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param_name(mut self, name: impl Into<String>) -> Self {
        self.param_name = Some(name.into());
        self
    }

    pub fn with_folding(mut self, folding: ChildFolding) -> Self {
        self.folding = Some(folding);
        self
    }
}

/// Folding configuration for a child result set that joins its own children
#[derive(Debug, Clone)]
pub struct ChildFolding {
    pub key_field: String,
    pub field_paths: Vec<String>,
    pub split_on: Option<SplitOn>,
}

impl ChildFolding {
    pub fn new(key_field: impl Into<String>) -> Self {
        ChildFolding {
            key_field: key_field.into(),
            field_paths: Vec::new(),
            split_on: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_paths.push(path.into());
        self
    }

    pub fn with_split_on(mut self, split_on: SplitOn) -> Self {
        self.split_on = Some(split_on);
        self
    }
}

#[derive(Debug, Clone)]
enum ChildShape {
    /// One entity per row, attached in row order
    Flat(TypeSequence),
    Folded {
        plan: Arc<FoldPlan>,
        split_on: Option<SplitOn>,
    },
}

#[derive(Debug, Clone)]
struct ChildSource {
    sql: String,
    field: FieldPath,
    param_name: String,
    shape: ChildShape,
}

#[derive(Debug, Clone)]
pub struct MultiSourceReconstructor {
    catalog: Arc<EntityCatalog>,
    root_plan: Arc<FoldPlan>,
    config: FolderConfig,
    root_sql: String,
    root_param: String,
    root_split_on: Option<SplitOn>,
    children: Vec<ChildSource>,
}

impl MultiSourceReconstructor {
    pub(crate) fn new(
        catalog: Arc<EntityCatalog>,
        root_plan: Arc<FoldPlan>,
        config: FolderConfig,
        root_sql: String,
    ) -> Result<Self, MaterializeError> {
        let root_param = derive_param_name(&root_sql, None)?;
        Ok(MultiSourceReconstructor {
            catalog,
            root_plan,
            config,
            root_sql,
            root_param,
            root_split_on: None,
            children: Vec::new(),
        })
    }

    pub fn root_split_on(mut self, split_on: SplitOn) -> Self {
        self.root_split_on = Some(split_on);
        self
    }

    /// Add a child statement feeding `field_path`, which must be declared on the root
    pub fn configure_child(
        mut self,
        sql: impl Into<String>,
        field_path: &str,
        options: ChildOptions,
    ) -> Result<Self, MaterializeError> {
        let sql = sql.into();
        let root_type = self.root_plan.root_type();

        let field = FieldPath::resolve(&self.catalog, field_path)?;
        if field.owner_type() != root_type || field_path.split('.').count() != 2 {
            return Err(MaterializeError::invalid_path(
                field_path,
                format!("child field must be declared directly on `{}`", root_type),
            ));
        }

        let param_name = derive_param_name(&sql, options.param_name)?;

        let shape = match options.folding {
            Some(folding) => {
                let paths: Vec<&str> = folding.field_paths.iter().map(String::as_str).collect();
                let plan = FoldPlan::new(
                    &self.catalog,
                    field.element_type(),
                    &folding.key_field,
                    &paths,
                )?;
                ChildShape::Folded {
                    plan: Arc::new(plan),
                    split_on: folding.split_on,
                }
            }
            None => ChildShape::Flat(TypeSequence::single(field.element_type())),
        };

        self.children.push(ChildSource {
            sql,
            field,
            param_name,
            shape,
        });
        Ok(self)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Reconstruct the root keyed by `key` with every configured child attached.
    /// A root query without rows yields `Ok(None)`.
    pub async fn execute(
        &self,
        source: &dyn RowSource,
        key: impl Into<Value>,
    ) -> Result<Option<Entity>, MaterializeError> {
        let key = key.into();
        let mut params = QueryParams::new();
        params.insert(self.root_param.clone(), key.clone());
        for child in &self.children {
            params.insert(child.param_name.clone(), key.clone());
        }

        if self.config.batch_child_queries && source.supports_multiple_results() {
            self.execute_batched(source, &params, &key).await
        } else {
            self.execute_sequential(source, &params, &key).await
        }
    }

    async fn execute_batched(
        &self,
        source: &dyn RowSource,
        params: &QueryParams,
        key: &Value,
    ) -> Result<Option<Entity>, MaterializeError> {
        let statements: Vec<&str> = std::iter::once(self.root_sql.as_str())
            .chain(self.children.iter().map(|c| c.sql.as_str()))
            .collect();
        let expected = statements.len();
        let batch = join_statements(&statements);

        log::debug!("Executing batch of {} statements: {}", expected, batch);
        let mut results = source.query_multiple(&batch, params).await?;

        let mut root_cursor = results
            .next_result()
            .await?
            .ok_or(RowSourceError::MissingResultSet { index: 0, expected })?;
        let Some(mut root) = self.fold_root(root_cursor.as_mut(), key).await? else {
            return Ok(None);
        };

        for index in 0..self.children.len() {
            let cursor = results
                .next_result()
                .await?
                .ok_or(RowSourceError::MissingResultSet {
                    index: index + 1,
                    expected,
                })?;
            self.attach_child(&mut root, index, cursor).await?;
        }

        if results.next_result().await?.is_some() {
            return Err(MaterializeError::ChildIndexOutOfRange {
                index: self.children.len(),
                configured: self.children.len(),
            });
        }
        Ok(Some(root))
    }

    async fn execute_sequential(
        &self,
        source: &dyn RowSource,
        params: &QueryParams,
        key: &Value,
    ) -> Result<Option<Entity>, MaterializeError> {
        log::debug!("Executing root statement: {}", self.root_sql);
        let mut root_cursor = source.query(&self.root_sql, params).await?;
        let Some(mut root) = self.fold_root(root_cursor.as_mut(), key).await? else {
            return Ok(None);
        };

        for (index, child) in self.children.iter().enumerate() {
            log::debug!("Executing child statement {}: {}", index, child.sql);
            let cursor = source.query(&child.sql, params).await?;
            self.attach_child(&mut root, index, cursor).await?;
        }
        Ok(Some(root))
    }

    async fn fold_root(
        &self,
        cursor: &mut dyn RowCursor,
        key: &Value,
    ) -> Result<Option<Entity>, MaterializeError> {
        let (roots, _) = fold_cursor(
            &self.catalog,
            &self.root_plan,
            &self.config,
            cursor,
            self.root_split_on.as_ref(),
            None,
        )
        .await?;

        let wanted = EntityKey::from_json(key);
        let position = match roots
            .iter()
            .position(|root| self.root_plan.key().extract(root).ok() == wanted)
        {
            Some(position) => position,
            None => {
                if !roots.is_empty() {
                    log::warn!(
                        "No `{}` root matches key {}; using the first of {} roots",
                        self.root_plan.root_type(),
                        key,
                        roots.len()
                    );
                }
                0
            }
        };
        Ok(roots.into_iter().nth(position))
    }

    /// Attach every entity produced by `cursor` to child field `index` of `root`
    pub async fn attach_child(
        &self,
        root: &mut Entity,
        index: usize,
        mut cursor: Box<dyn RowCursor>,
    ) -> Result<(), MaterializeError> {
        let child = self
            .children
            .get(index)
            .ok_or(MaterializeError::ChildIndexOutOfRange {
                index,
                configured: self.children.len(),
            })?;

        let entities = match &child.shape {
            ChildShape::Folded { plan, split_on } => {
                fold_cursor(
                    &self.catalog,
                    plan,
                    &self.config,
                    cursor.as_mut(),
                    split_on.as_ref(),
                    None,
                )
                .await?
                .0
            }
            ChildShape::Flat(sequence) => {
                let shaper =
                    RowShaper::new(&self.catalog, sequence, None, cursor.columns(), &self.config)?;
                let mut entities = Vec::new();
                while let Some(values) = cursor.next_row().await? {
                    entities.extend(shaper.shape(&values)?.into_iter().next().flatten());
                }
                entities
            }
        };

        log::debug!(
            "Attaching {} `{}` entities to `{}`",
            entities.len(),
            child.field.element_type(),
            child.field.path()
        );

        if child.field.is_collection() {
            child.field.set(root, entities);
        } else {
            child.field.set(root, entities.into_iter().next());
        }
        Ok(())
    }
}

fn derive_param_name(sql: &str, explicit: Option<String>) -> Result<String, MaterializeError> {
    let name = explicit
        .or_else(|| first_parameter_name(sql))
        .ok_or_else(|| MaterializeError::MissingParameterName {
            sql: sql.to_string(),
        })?;
    validate_parameter_name(&name).map_err(RowSourceError::from)?;
    Ok(name)
}
