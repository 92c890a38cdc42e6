use async_trait::async_trait;
use clickfold::config::FolderConfig;
use clickfold::materializer::{ChildOptions, MaterializeError, MultiSourceReconstructor, Reconstructor};
use clickfold::row_source::{
    MemoryRowSource, QueryParams, ResultSets, RowCursor, RowSource, RowSourceError,
};
use serde_json::json;

use super::fixtures::{canned, collection_ids, family_catalog, names};

const PARENT_SQL: &str = "SELECT ParentId, Name FROM parents WHERE ParentId = $ParentId";
const CHILDREN_SQL: &str =
    "SELECT ChildId, ParentId, Name FROM children WHERE ParentId = $ParentId ORDER BY ChildId";
const PETS_SQL: &str = "SELECT PetId, Name FROM pets WHERE OwnerParentId = $ParentId";

fn family_source() -> MemoryRowSource {
    MemoryRowSource::new()
        .with_result(
            PARENT_SQL,
            canned(&["ParentId", "Name"], vec![vec![json!(1), json!("Parent 1")]]),
        )
        .with_result(
            CHILDREN_SQL,
            canned(
                &["ChildId", "ParentId", "Name"],
                vec![
                    vec![json!(1), json!(1), json!("Child 1.1")],
                    vec![json!(2), json!(1), json!("Child 1.2")],
                ],
            ),
        )
        .with_result(
            PETS_SQL,
            canned(
                &["PetId", "Name"],
                vec![
                    vec![json!(10), json!("Rex")],
                    vec![json!(11), json!("Tom")],
                    vec![json!(12), json!("Nemo")],
                ],
            ),
        )
}

fn family_reconstructor(config: FolderConfig) -> MultiSourceReconstructor {
    Reconstructor::new(family_catalog(), "Parent", "ParentId", &[])
        .unwrap()
        .with_config(config)
        .multi_source(PARENT_SQL)
        .unwrap()
        .configure_child(CHILDREN_SQL, "Parent.Children", ChildOptions::new())
        .unwrap()
}

/// Delegates single queries to an in-memory source but cannot multiplex,
/// like the ClickHouse HTTP interface
struct SingleStatementSource(MemoryRowSource);

#[async_trait]
impl RowSource for SingleStatementSource {
    async fn query(
        &self,
        sql: &str,
        params: &QueryParams,
    ) -> Result<Box<dyn RowCursor>, RowSourceError> {
        self.0.query(sql, params).await
    }
}

/// Returns one result set more than the batch asked for
struct ExtraResultSource(MemoryRowSource);

#[async_trait]
impl RowSource for ExtraResultSource {
    async fn query(
        &self,
        sql: &str,
        params: &QueryParams,
    ) -> Result<Box<dyn RowCursor>, RowSourceError> {
        self.0.query(sql, params).await
    }

    fn supports_multiple_results(&self) -> bool {
        true
    }

    async fn query_multiple(
        &self,
        batch: &str,
        params: &QueryParams,
    ) -> Result<Box<dyn ResultSets>, RowSourceError> {
        let padded = format!("{};\n{}", batch, PETS_SQL);
        self.0.query_multiple(&padded, params).await
    }
}

#[tokio::test]
async fn test_parent_and_children_in_one_round_trip() {
    let source = family_source();
    let root = family_reconstructor(FolderConfig::default())
        .execute(&source, 1)
        .await
        .unwrap()
        .expect("parent 1 exists");

    assert_eq!(names(&root, "Children"), vec!["Child 1.1", "Child 1.2"]);

    let trips = source.round_trips();
    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0].len(), 2);
    assert!(trips[0][0].contains("FROM parents"));
    assert!(trips[0][1].contains("FROM children"));
}

#[tokio::test]
async fn test_sequential_when_batching_disabled() {
    let source = family_source();
    let config = FolderConfig {
        batch_child_queries: false,
        ..Default::default()
    };
    let root = family_reconstructor(config)
        .execute(&source, 1)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(collection_ids(&root, "Children", "ChildId"), vec![1, 2]);
    assert_eq!(source.round_trips().len(), 2);
    assert_eq!(source.statement_count(), 2);
}

#[tokio::test]
async fn test_sequential_when_source_cannot_multiplex() {
    let source = SingleStatementSource(family_source());
    let root = family_reconstructor(FolderConfig::default())
        .execute(&source, 1)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(collection_ids(&root, "Children", "ChildId"), vec![1, 2]);
    assert_eq!(source.0.round_trips().len(), 2);
}

#[tokio::test]
async fn test_independent_children_do_not_fan_out() {
    let source = family_source();
    let root = family_reconstructor(FolderConfig::default())
        .configure_child(PETS_SQL, "Parent.Pets", ChildOptions::new())
        .unwrap()
        .execute(&source, 1)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(collection_ids(&root, "Children", "ChildId"), vec![1, 2]);
    assert_eq!(collection_ids(&root, "Pets", "PetId"), vec![10, 11, 12]);
    assert_eq!(source.statement_count(), 3);
}

#[tokio::test]
async fn test_missing_parent_is_not_an_error() {
    let source = MemoryRowSource::new()
        .with_result(PARENT_SQL, canned(&["ParentId", "Name"], vec![]))
        .with_result(CHILDREN_SQL, canned(&["ChildId", "ParentId", "Name"], vec![]));

    let root = family_reconstructor(FolderConfig::default())
        .execute(&source, 404)
        .await
        .unwrap();
    assert!(root.is_none());
}

#[tokio::test]
async fn test_extra_result_set_is_out_of_range() {
    let source = ExtraResultSource(family_source());
    let result = family_reconstructor(FolderConfig::default())
        .execute(&source, 1)
        .await;

    assert!(matches!(
        result,
        Err(MaterializeError::ChildIndexOutOfRange {
            index: 1,
            configured: 1
        })
    ));
}

#[test]
fn test_child_must_be_declared_on_root() {
    let multi = Reconstructor::new(family_catalog(), "Parent", "ParentId", &[])
        .unwrap()
        .multi_source(PARENT_SQL)
        .unwrap();

    let result = multi.configure_child(CHILDREN_SQL, "Parent.Children.Toy", ChildOptions::new());
    assert!(matches!(
        result,
        Err(MaterializeError::InvalidFieldPath { .. })
    ));
}

#[test]
fn test_parameter_name_required() {
    let multi = Reconstructor::new(family_catalog(), "Parent", "ParentId", &[])
        .unwrap()
        .multi_source(PARENT_SQL)
        .unwrap();

    let without_placeholder = multi.clone().configure_child(
        "SELECT ChildId FROM children",
        "Parent.Children",
        ChildOptions::new(),
    );
    assert!(matches!(
        without_placeholder,
        Err(MaterializeError::MissingParameterName { .. })
    ));

    let explicit = multi.configure_child(
        "SELECT ChildId FROM children",
        "Parent.Children",
        ChildOptions::new().with_param_name("ParentId"),
    );
    assert_eq!(explicit.map(|m| m.child_count()).ok(), Some(1));
}
