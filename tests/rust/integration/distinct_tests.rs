use clickfold::materializer::{
    distinct_by_key, distinct_by_key_hook, scalar_key, Entity, Query, Reconstructor,
};
use clickfold::row_source::MemoryRowSource;
use serde_json::json;

use super::fixtures::{canned, collection_ids, family_catalog};

#[test]
fn test_duplicate_ids_collapse_to_first() {
    let mut parent = Entity::new("Parent").with(
        "Children",
        vec![
            Entity::new("Child").with("ChildId", json!(1)).with("Name", json!("first")),
            Entity::new("Child").with("ChildId", json!(1)).with("Name", json!("second")),
            Entity::new("Child").with("ChildId", json!(2)),
        ],
    );

    distinct_by_key(&mut parent, "Children", scalar_key("ChildId"));

    let children = parent.collection("Children").unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].scalar("Name"), Some(&json!("first")));
}

#[test]
fn test_absent_collection_is_noop() {
    let mut parent = Entity::new("Parent").with("ParentId", json!(1));
    distinct_by_key(&mut parent, "Children", scalar_key("ChildId"));
    assert_eq!(parent.fields().count(), 1);
}

#[tokio::test]
async fn test_hook_runs_after_fold() {
    let sql = "SELECT * FROM parents p JOIN children c ON c.ParentId = p.ParentId";
    let source = MemoryRowSource::new().with_result(
        sql,
        canned(
            &["ParentId", "ChildId"],
            vec![
                vec![json!(1), json!(1)],
                vec![json!(1), json!(1)],
                vec![json!(2), json!(3)],
                vec![json!(1), json!(2)],
            ],
        ),
    );

    let roots = Reconstructor::new(family_catalog(), "Parent", "ParentId", &["Parent.Children"])
        .unwrap()
        .execute(
            &source,
            Query::new(sql).post_process(distinct_by_key_hook("Children", "ChildId")),
        )
        .await
        .unwrap();

    assert_eq!(collection_ids(&roots[0], "Children", "ChildId"), vec![1, 2]);
    assert_eq!(collection_ids(&roots[1], "Children", "ChildId"), vec![3]);
}
