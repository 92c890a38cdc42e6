//! Row folding: the streaming core of reconstruction.
//!
//! Each row carries one materialized instance per type-sequence position. The folder
//! keeps an insertion-ordered identity table of canonical roots; a row whose key is
//! already present folds its children into the canonical root and its own root
//! instance is dropped.
//!
//! Attachment rules per position `i` ≥ 1:
//!
//! - owned by the root (owner position 0): collections are initialized on first
//!   sight and appended to for every non-null value; single-valued fields are set
//!   according to the [`NullPolicy`]
//! - owned by an earlier child (nested): only many-to-one attachments of a non-null
//!   value whose type matches are applied, onto the owner instance placed earlier in
//!   the same row; anything else is skipped with a logged reason and counted

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::entity_catalog::EntityCatalog;

use super::entity::{Entity, EntityKey, FieldValue};
use super::errors::MaterializeError;
use super::field_path::{FieldPath, KeyAccessor};
use super::type_sequence::TypeSequence;

/// How a null child value treats an already-set single-valued field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Every row overwrites the field, null included
    #[default]
    LastWriteWins,
    /// A null never overwrites an existing value
    KeepExisting,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown null policy `{0}` (expected last_write_wins or keep_existing)")]
pub struct ParseNullPolicyError(String);

impl FromStr for NullPolicy {
    type Err = ParseNullPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last_write_wins" => Ok(NullPolicy::LastWriteWins),
            "keep_existing" => Ok(NullPolicy::KeepExisting),
            other => Err(ParseNullPolicyError(other.to_string())),
        }
    }
}

/// Immutable, reusable product of configuration: root key, field paths and the
/// type sequence derived from them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldPlan {
    key: KeyAccessor,
    field_paths: Vec<FieldPath>,
    sequence: TypeSequence,
}

impl FoldPlan {
    /// Resolve a plan against the catalog.
    ///
    /// `key_field` may be a bare field name (`Id`) or a full accessor (`Parent.Id`).
    pub fn new(
        catalog: &EntityCatalog,
        root_type: &str,
        key_field: &str,
        field_paths: &[&str],
    ) -> Result<Self, MaterializeError> {
        catalog.entity(root_type)?;

        let key_path = if key_field.contains('.') {
            key_field.to_string()
        } else {
            format!("{}.{}", root_type, key_field)
        };
        let key = KeyAccessor::resolve(catalog, &key_path)?;
        if key.owner_type() != root_type {
            return Err(MaterializeError::invalid_path(
                key_path,
                format!("key must be declared on the root type `{}`", root_type),
            ));
        }

        let field_paths = field_paths
            .iter()
            .map(|path| FieldPath::resolve(catalog, path))
            .collect::<Result<Vec<_>, _>>()?;
        let sequence = TypeSequence::build(root_type, &field_paths)?;

        Ok(FoldPlan {
            key,
            field_paths,
            sequence,
        })
    }

    pub fn root_type(&self) -> &str {
        self.sequence.root_type()
    }

    pub fn key(&self) -> &KeyAccessor {
        &self.key
    }

    pub fn field_paths(&self) -> &[FieldPath] {
        &self.field_paths
    }

    pub fn sequence(&self) -> &TypeSequence {
        &self.sequence
    }

    /// Field path configured at type-sequence position `position` (≥ 1)
    fn field_at(&self, position: usize) -> &FieldPath {
        &self.field_paths[position - 1]
    }
}

/// Counters for one fold pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FoldStats {
    pub rows: usize,
    pub roots: usize,
    pub skipped_attachments: usize,
}

/// Callback invoked with every raw materialized row after it has been folded
pub type RowCallback = Box<dyn FnMut(&[Option<Entity>]) + Send>;

/// Location of an attached instance, relative to the canonical root
#[derive(Debug, Clone, Copy)]
struct Slot {
    position: usize,
    /// Index within the collection, `None` for single-valued fields
    index: Option<usize>,
}

pub struct RowFolder {
    plan: Arc<FoldPlan>,
    null_policy: NullPolicy,
    table: IndexMap<EntityKey, Entity>,
    stats: FoldStats,
    on_row: Option<RowCallback>,
}

impl RowFolder {
    pub fn new(plan: Arc<FoldPlan>, null_policy: NullPolicy) -> Self {
        RowFolder {
            plan,
            null_policy,
            table: IndexMap::new(),
            stats: FoldStats::default(),
            on_row: None,
        }
    }

    pub fn with_row_callback(mut self, callback: RowCallback) -> Self {
        self.on_row = Some(callback);
        self
    }

    /// Fold one type-sequence-shaped row into the identity table
    pub fn fold(&mut self, row: Vec<Option<Entity>>) -> Result<(), MaterializeError> {
        let plan = Arc::clone(&self.plan);
        let sequence = plan.sequence();

        if row.len() != sequence.len() {
            return Err(MaterializeError::type_mismatch(
                "row arity",
                format!("{} positions", sequence.len()),
                format!("{} positions", row.len()),
            ));
        }

        let snapshot = self.on_row.as_ref().map(|_| row.clone());
        let mut values = row.into_iter();

        let root = values.next().flatten().ok_or_else(|| {
            MaterializeError::KeyExtractionError {
                entity: plan.root_type().to_string(),
                key: plan.key().field().to_string(),
                reason: "root position is null".to_string(),
            }
        })?;
        if root.type_name() != plan.root_type() {
            return Err(MaterializeError::type_mismatch(
                "root position",
                plan.root_type(),
                root.type_name(),
            ));
        }
        let key = plan.key().extract(&root)?;

        let values: Vec<Option<Entity>> = values.collect();
        check_root_collections(&plan, &values)?;

        let (canonical, is_new) = match self.table.entry(key) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(root), true),
        };

        let mut placed: Vec<Option<Vec<Slot>>> = vec![None; sequence.len()];
        placed[0] = Some(Vec::new());

        for (offset, value) in values.into_iter().enumerate() {
            let position = offset + 1;
            let owner = sequence.owner_of(position).unwrap_or(0);

            let slots = if owner == 0 {
                attach_to_root(canonical, &plan, position, value, self.null_policy)?
            } else {
                match attach_nested(canonical, &plan, &placed, position, owner, value) {
                    Ok(slots) => slots,
                    Err(reason) => {
                        log::debug!(
                            "Skipping nested attachment `{}`: {}",
                            plan.field_at(position).path(),
                            reason
                        );
                        self.stats.skipped_attachments += 1;
                        None
                    }
                }
            };
            placed[position] = slots;
        }

        self.stats.rows += 1;
        if is_new {
            self.stats.roots += 1;
        }

        if let (Some(callback), Some(raw)) = (self.on_row.as_mut(), snapshot) {
            callback(&raw);
        }
        Ok(())
    }

    /// Roots in first-seen order, with pass counters
    pub fn finish(self) -> (Vec<Entity>, FoldStats) {
        (self.table.into_values().collect(), self.stats)
    }

    pub fn stats(&self) -> FoldStats {
        self.stats
    }
}

/// Collection elements owned by the root must match their declared element type.
/// Checked before the identity table is touched so a failing row leaves no trace.
fn check_root_collections(
    plan: &FoldPlan,
    values: &[Option<Entity>],
) -> Result<(), MaterializeError> {
    for (offset, value) in values.iter().enumerate() {
        let position = offset + 1;
        if plan.sequence().owner_of(position).unwrap_or(0) != 0 {
            continue;
        }
        let field_path = plan.field_at(position);
        if let Some(child) = value {
            if field_path.is_collection() && child.type_name() != field_path.element_type() {
                return Err(MaterializeError::type_mismatch(
                    field_path.path(),
                    field_path.element_type(),
                    child.type_name(),
                ));
            }
        }
    }
    Ok(())
}

fn attach_to_root(
    canonical: &mut Entity,
    plan: &FoldPlan,
    position: usize,
    value: Option<Entity>,
    null_policy: NullPolicy,
) -> Result<Option<Vec<Slot>>, MaterializeError> {
    let field_path = plan.field_at(position);

    if field_path.is_collection() {
        if !matches!(field_path.get(canonical), Some(FieldValue::Collection(_))) {
            field_path.set(canonical, FieldValue::Collection(Vec::new()));
        }

        let Some(child) = value else {
            return Ok(None);
        };
        if child.type_name() != field_path.element_type() {
            return Err(MaterializeError::type_mismatch(
                field_path.path(),
                field_path.element_type(),
                child.type_name(),
            ));
        }

        match field_path.get_mut(canonical) {
            Some(FieldValue::Collection(items)) => {
                items.push(child);
                Ok(Some(vec![Slot {
                    position,
                    index: Some(items.len() - 1),
                }]))
            }
            _ => Ok(None),
        }
    } else {
        match value {
            Some(child) => {
                field_path.set(canonical, child);
                Ok(Some(vec![Slot {
                    position,
                    index: None,
                }]))
            }
            None => {
                let keep = null_policy == NullPolicy::KeepExisting
                    && field_path.get(canonical).is_some_and(|v| !v.is_null());
                if !keep {
                    field_path.set(canonical, FieldValue::Null);
                }
                Ok(None)
            }
        }
    }
}

/// Attach a many-to-one value to the instance placed at `owner` earlier in this row.
/// `Err` carries the reason an attachment was skipped.
fn attach_nested(
    canonical: &mut Entity,
    plan: &FoldPlan,
    placed: &[Option<Vec<Slot>>],
    position: usize,
    owner: usize,
    value: Option<Entity>,
) -> Result<Option<Vec<Slot>>, String> {
    let field_path = plan.field_at(position);

    let Some(child) = value else {
        return Err("null value".to_string());
    };
    if field_path.is_collection() {
        return Err("nested collection attachments are not wired automatically".to_string());
    }
    if child.type_name() != field_path.element_type() {
        return Err(format!(
            "type mismatch: expected `{}`, found `{}`",
            field_path.element_type(),
            child.type_name()
        ));
    }
    let Some(owner_slots) = placed.get(owner).and_then(Option::as_ref) else {
        return Err(format!("owner at position {} is absent in this row", owner));
    };
    let Some(owner_entity) = navigate(canonical, plan, owner_slots) else {
        return Err(format!("owner at position {} could not be located", owner));
    };

    field_path.set(owner_entity, child);

    let mut slots = owner_slots.clone();
    slots.push(Slot {
        position,
        index: None,
    });
    Ok(Some(slots))
}

fn navigate<'a>(root: &'a mut Entity, plan: &FoldPlan, slots: &[Slot]) -> Option<&'a mut Entity> {
    let mut current = root;
    for slot in slots {
        let field_value = plan.field_at(slot.position).get_mut(current)?;
        current = match (field_value, slot.index) {
            (FieldValue::Entity(child), None) => &mut **child,
            (FieldValue::Collection(items), Some(index)) => items.get_mut(index)?,
            _ => return None,
        };
    }
    Some(current)
}
