//! End-to-end tests - Reconstruction against a live ClickHouse server
//!
//! These tests need CLICKHOUSE_URL, CLICKHOUSE_USER, CLICKHOUSE_PASSWORD and
//! CLICKHOUSE_DATABASE in the environment (a `.env` file works too) and are ignored
//! by default. Run them with `cargo test --test e2e -- --ignored`.

#[cfg(test)]
mod clickhouse_tests {
    use std::sync::Arc;

    use clickfold::entity_catalog::EntityCatalog;
    use clickfold::materializer::{ChildOptions, Query, Reconstructor};
    use clickfold::row_source::ClickHouseRowSource;
    use serde_json::json;

    const CATALOG: &str = r#"
entities:
  Parent:
    key: ParentId
    fields:
      ParentId: integer
      Name: string
      Children: { collection: Child }
  Child:
    key: ChildId
    fields:
      ChildId: integer
      ParentId: integer
      Name: string
"#;

    const PARENTS: &str = "values('ParentId UInt32, Name String', (1, 'Parent 1'), (2, 'Parent 2'))";
    const CHILDREN: &str =
        "values('ChildId UInt32, ParentId UInt32, Name String', (1, 1, 'Child 1.1'), (2, 1, 'Child 1.2'))";

    fn source() -> ClickHouseRowSource {
        dotenvy::dotenv().ok();
        ClickHouseRowSource::from_env()
            .expect("ClickHouse environment variables must be set")
            .with_max_execution_time(30)
    }

    fn reconstructor(fields: &[&str]) -> Reconstructor {
        let catalog = Arc::new(EntityCatalog::from_yaml_str(CATALOG).unwrap());
        Reconstructor::new(catalog, "Parent", "ParentId", fields).unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn test_join_fold_against_clickhouse() {
        let sql = format!(
            "SELECT p.ParentId, p.Name, c.ChildId, c.ParentId, c.Name \
             FROM {} AS p LEFT JOIN {} AS c ON c.ParentId = p.ParentId \
             WHERE p.ParentId <= $maxId ORDER BY p.ParentId, c.ChildId",
            PARENTS, CHILDREN
        );

        let roots = reconstructor(&["Parent.Children"])
            .execute(&source(), Query::new(sql).param("maxId", 2))
            .await
            .unwrap();

        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].collection("Children").map(|c| c.len()), Some(2));
        assert_eq!(roots[1].collection("Children").map(|c| c.len()), Some(0));
    }

    #[tokio::test]
    #[ignore]
    async fn test_multi_source_against_clickhouse() {
        let root_sql = format!("SELECT ParentId, Name FROM {} WHERE ParentId = $id", PARENTS);
        let child_sql = format!(
            "SELECT ChildId, ParentId, Name FROM {} WHERE ParentId = $id ORDER BY ChildId",
            CHILDREN
        );

        let root = reconstructor(&[])
            .multi_source(root_sql)
            .unwrap()
            .configure_child(child_sql, "Parent.Children", ChildOptions::new())
            .unwrap()
            .execute(&source(), 1)
            .await
            .unwrap()
            .expect("parent 1 exists");

        assert_eq!(root.scalar("Name"), Some(&json!("Parent 1")));
        assert_eq!(root.collection("Children").map(|c| c.len()), Some(2));
    }
}
