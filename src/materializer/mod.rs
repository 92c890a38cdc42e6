//! Row-to-object-graph materialization.
//!
//! Flat rows from a join (or from several keyed result sets) are shaped into one
//! entity per type-sequence position and folded into distinct roots whose child
//! fields are populated from every row sharing the root's key.

pub mod distinct;
pub mod entity;
pub mod errors;
pub mod field_path;
pub mod multi_source;
pub mod reconstructor;
pub mod row_folder;
pub mod row_shape;
pub mod type_sequence;

pub use distinct::{
    distinct_by_key, distinct_by_key_all, distinct_by_key_hook, root_collection_field, scalar_key,
    PostProcess,
};
pub use entity::{Entity, EntityKey, FieldValue};
pub use errors::MaterializeError;
pub use field_path::{FieldPath, KeyAccessor};
pub use multi_source::{ChildFolding, ChildOptions, MultiSourceReconstructor};
pub use reconstructor::{Query, Reconstructor};
pub use row_folder::{FoldPlan, FoldStats, NullPolicy, RowCallback, RowFolder};
pub use row_shape::{RowShaper, SplitOn};
pub use type_sequence::TypeSequence;
