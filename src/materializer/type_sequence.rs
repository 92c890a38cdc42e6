use super::errors::MaterializeError;
use super::field_path::FieldPath;

/// Ordered entity types materialized per row, with the owner position of each.
///
/// Position 0 is the root type; position `i` (1-based) is the element type of the
/// `i`-th configured field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSequence {
    types: Vec<String>,
    /// `owner_index[0]` is unused and always 0
    owner_index: Vec<usize>,
}

impl TypeSequence {
    pub fn build(root_type: &str, field_paths: &[FieldPath]) -> Result<Self, MaterializeError> {
        let mut types = Vec::with_capacity(field_paths.len() + 1);
        let mut owner_index = Vec::with_capacity(field_paths.len() + 1);
        types.push(root_type.to_string());
        owner_index.push(0);

        for (offset, field_path) in field_paths.iter().enumerate() {
            let position = offset + 1;
            let owner = owner_position(&types, root_type, field_path.owner_type(), position)
                .ok_or_else(|| {
                    MaterializeError::invalid_path(
                        field_path.path(),
                        format!(
                            "owner type `{}` is neither the root `{}` nor an earlier child type",
                            field_path.owner_type(),
                            root_type
                        ),
                    )
                })?;
            types.push(field_path.element_type().to_string());
            owner_index.push(owner);
        }

        Ok(TypeSequence { types, owner_index })
    }

    /// Sequence for a single root type with no children
    pub fn single(root_type: &str) -> Self {
        TypeSequence {
            types: vec![root_type.to_string()],
            owner_index: vec![0],
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn root_type(&self) -> &str {
        &self.types[0]
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn type_at(&self, position: usize) -> Option<&str> {
        self.types.get(position).map(String::as_str)
    }

    /// Owner position for `position` ≥ 1; `None` for the root or out of range
    pub fn owner_of(&self, position: usize) -> Option<usize> {
        if position == 0 {
            return None;
        }
        self.owner_index.get(position).copied()
    }
}

/// Position that a field declared on `owner_type` attaches to, given the types
/// already placed before `position`.
///
/// Root-declared fields always attach to position 0, even when a nearer position has
/// the same type. Otherwise the nearest preceding position of that type wins, so
/// chained many-to-one attachments bind to the most recently introduced instance.
pub fn owner_position(
    types: &[String],
    root_type: &str,
    owner_type: &str,
    position: usize,
) -> Option<usize> {
    if owner_type == root_type {
        return Some(0);
    }
    (1..position.min(types.len()))
        .rev()
        .find(|&j| types[j] == owner_type)
}
