//! Shaping flat column rows into one entity per type-sequence position.
//!
//! The split boundary tells the shaper where one type's columns end and the next
//! begin. Column-to-field mappings are computed once per result set; each row then
//! only copies and coerces values.

use serde_json::Value;

use crate::config::FolderConfig;
use crate::entity_catalog::{entity_schema::unqualified_column, EntityCatalog, ScalarType};
use crate::row_source::RowSourceError;

use super::entity::{Entity, FieldValue};
use super::errors::MaterializeError;
use super::type_sequence::TypeSequence;

/// Partitioning of a flat row into per-type column segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitOn {
    /// Column name starting each segment after the first, one per position ≥ 1
    Columns(Vec<String>),
    /// Column count per segment: one per position, or one fewer with the
    /// remainder going to the last segment
    Counts(Vec<usize>),
}

impl SplitOn {
    pub fn columns<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        SplitOn::Columns(names.into_iter().map(Into::into).collect())
    }

    /// Parse a comma-separated list of split column names
    pub fn parse_list(list: &str) -> Self {
        SplitOn::columns(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }
}

#[derive(Debug, Clone)]
struct ColumnMapping {
    column: usize,
    field: String,
    scalar: ScalarType,
}

#[derive(Debug, Clone)]
struct Segment {
    type_name: String,
    start: usize,
    end: usize,
    mappings: Vec<ColumnMapping>,
}

/// Per-result-set converter from flat rows to type-sequence-shaped rows
#[derive(Debug, Clone)]
pub struct RowShaper {
    width: usize,
    segments: Vec<Segment>,
}

impl RowShaper {
    pub fn new(
        catalog: &EntityCatalog,
        sequence: &TypeSequence,
        split: Option<&SplitOn>,
        columns: &[String],
        config: &FolderConfig,
    ) -> Result<Self, MaterializeError> {
        let starts = segment_starts(catalog, sequence, split, columns, config)?;

        let mut segments = Vec::with_capacity(sequence.len());
        for (position, type_name) in sequence.types().iter().enumerate() {
            let start = starts[position];
            let end = starts.get(position + 1).copied().unwrap_or(columns.len());
            let entity_type = catalog.entity(type_name)?;

            let mut mappings = Vec::new();
            for (column, name) in columns.iter().enumerate().take(end).skip(start) {
                match entity_type.scalar_field_for_column(name) {
                    Some((field, scalar)) => mappings.push(ColumnMapping {
                        column,
                        field: field.to_string(),
                        scalar,
                    }),
                    None if config.strict_column_mapping => {
                        return Err(MaterializeError::SplitBoundary(format!(
                            "column `{}` does not map to a scalar field of `{}`",
                            name, type_name
                        )))
                    }
                    None => log::trace!(
                        "Ignoring column `{}`: no scalar field on `{}`",
                        name,
                        type_name
                    ),
                }
            }

            segments.push(Segment {
                type_name: type_name.clone(),
                start,
                end,
                mappings,
            });
        }

        Ok(RowShaper {
            width: columns.len(),
            segments,
        })
    }

    /// Materialize one entity per position. Positions ≥ 1 whose columns are all
    /// null are `None`.
    pub fn shape(&self, values: &[Value]) -> Result<Vec<Option<Entity>>, MaterializeError> {
        if values.len() != self.width {
            return Err(RowSourceError::MalformedRow(format!(
                "expected {} values, got {}",
                self.width,
                values.len()
            ))
            .into());
        }

        let mut row = Vec::with_capacity(self.segments.len());
        for (position, segment) in self.segments.iter().enumerate() {
            let all_null = values[segment.start..segment.end]
                .iter()
                .all(Value::is_null);
            if position > 0 && all_null {
                row.push(None);
                continue;
            }

            let mut entity = Entity::new(segment.type_name.clone());
            for mapping in &segment.mappings {
                let raw = &values[mapping.column];
                let value = if raw.is_null() {
                    FieldValue::Null
                } else {
                    let coerced = mapping.scalar.coerce(raw).ok_or_else(|| {
                        MaterializeError::type_mismatch(
                            format!("{}.{}", segment.type_name, mapping.field),
                            mapping.scalar.to_string(),
                            raw.to_string(),
                        )
                    })?;
                    FieldValue::Scalar(coerced)
                };
                entity.set(mapping.field.clone(), value);
            }
            row.push(Some(entity));
        }

        Ok(row)
    }
}

fn segment_starts(
    catalog: &EntityCatalog,
    sequence: &TypeSequence,
    split: Option<&SplitOn>,
    columns: &[String],
    config: &FolderConfig,
) -> Result<Vec<usize>, MaterializeError> {
    let positions = sequence.len();

    match split {
        Some(SplitOn::Counts(counts)) => starts_from_counts(counts, positions, columns.len()),
        Some(SplitOn::Columns(names)) => {
            if names.len() != positions - 1 {
                return Err(MaterializeError::SplitBoundary(format!(
                    "{} split columns given for {} child positions",
                    names.len(),
                    positions - 1
                )));
            }
            starts_from_names(names, columns)
        }
        None => {
            let mut names = Vec::with_capacity(positions - 1);
            for type_name in &sequence.types()[1..] {
                let entity_type = catalog.entity(type_name)?;
                names.push(
                    entity_type
                        .key
                        .clone()
                        .unwrap_or_else(|| config.default_split_on.clone()),
                );
            }
            starts_from_names(&names, columns)
        }
    }
}

fn starts_from_names(names: &[String], columns: &[String]) -> Result<Vec<usize>, MaterializeError> {
    let mut starts = vec![0];
    for name in names {
        let from = starts.last().copied().unwrap_or(0) + 1;
        let found = columns
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, column)| unqualified_column(column).eq_ignore_ascii_case(name))
            .map(|(index, _)| index)
            .ok_or_else(|| {
                MaterializeError::SplitBoundary(format!(
                    "split column `{}` not found after column {} in [{}]",
                    name,
                    from,
                    columns.join(", ")
                ))
            })?;
        starts.push(found);
    }
    Ok(starts)
}

fn starts_from_counts(
    counts: &[usize],
    positions: usize,
    width: usize,
) -> Result<Vec<usize>, MaterializeError> {
    let total = counts
        .iter()
        .try_fold(0usize, |sum, count| sum.checked_add(*count))
        .ok_or_else(|| {
            MaterializeError::SplitBoundary(format!(
                "segment counts {:?} overflow the column index",
                counts
            ))
        })?;
    let counts: Vec<usize> = if counts.len() == positions {
        if total != width {
            return Err(MaterializeError::SplitBoundary(format!(
                "segment counts sum to {} but the row has {} columns",
                total, width
            )));
        }
        counts.to_vec()
    } else if counts.len() + 1 == positions {
        if total >= width {
            return Err(MaterializeError::SplitBoundary(format!(
                "segment counts sum to {} leaving no columns for the last segment of {}",
                total, width
            )));
        }
        let mut all = counts.to_vec();
        all.push(width - total);
        all
    } else {
        return Err(MaterializeError::SplitBoundary(format!(
            "{} segment counts given for {} positions",
            counts.len(),
            positions
        )));
    };

    if counts.contains(&0) {
        return Err(MaterializeError::SplitBoundary(
            "segment counts must be positive".to_string(),
        ));
    }

    let mut starts = Vec::with_capacity(positions);
    let mut offset = 0;
    for count in counts {
        starts.push(offset);
        offset += count;
    }
    Ok(starts)
}
