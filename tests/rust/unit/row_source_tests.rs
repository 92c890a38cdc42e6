//! Unit tests for row-source plumbing
//!
//! Parameter naming and substitution, statement batching and canned results.

#[cfg(test)]
mod row_source_tests {
    use clickfold::row_source::memory::CannedResult;
    use clickfold::row_source::parameter_substitution::ParameterSubstitutionError;
    use clickfold::row_source::statement_batch::{join_statements, split_statements};
    use clickfold::row_source::{
        first_parameter_name, substitute_parameters, MemoryRowSource, QueryParams, ResultSets,
        RowCursor, RowSource,
    };
    use serde_json::{json, Value};
    use test_case::test_case;

    fn params(pairs: &[(&str, Value)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test_case("SELECT * FROM c WHERE ParentId = $parentId", Some("parentId") ; "single placeholder")]
    #[test_case("SELECT $a, $b", Some("a") ; "first of several")]
    #[test_case("SELECT '$' || x FROM t", None ; "lone dollar")]
    #[test_case("SELECT 1", None ; "no placeholder")]
    fn test_first_parameter_name(sql: &str, expected: Option<&str>) {
        assert_eq!(first_parameter_name(sql).as_deref(), expected);
    }

    #[test]
    fn test_substitution_escapes_literals() {
        let sql = substitute_parameters(
            "SELECT * FROM t WHERE name = $name AND id IN $ids",
            &params(&[("name", json!("O'Brien")), ("ids", json!([1, 2]))]),
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE name = 'O\\'Brien' AND id IN [1, 2]"
        );
    }

    #[test]
    fn test_substitution_missing_parameter() {
        assert_eq!(
            substitute_parameters("SELECT $id", &QueryParams::new()),
            Err(ParameterSubstitutionError::MissingParameter(
                "id".to_string()
            ))
        );
    }

    #[test]
    fn test_batch_split_respects_quotes() {
        let batch = join_statements(&["SELECT 'a;b'", "SELECT 2;"]);
        assert_eq!(split_statements(&batch), vec!["SELECT 'a;b'", "SELECT 2"]);
    }

    #[test]
    fn test_memory_source_serves_canned_rows() {
        let canned = CannedResult::from_compact_json("[\"Id\",\"Name\"]\n[1,\"a\"]\n[2,\"b\"]\n")
            .unwrap();
        let source = MemoryRowSource::new().with_result("SELECT Id, Name FROM t", canned);

        let rows = tokio_test::block_on(async {
            let mut cursor = source
                .query("SELECT Id,   Name FROM t", &QueryParams::new())
                .await
                .unwrap();
            assert_eq!(cursor.columns(), &["Id".to_string(), "Name".to_string()]);

            let mut rows = Vec::new();
            while let Some(row) = cursor.next_row().await.unwrap() {
                rows.push(row);
            }
            rows
        });

        assert_eq!(rows, vec![vec![json!(1), json!("a")], vec![json!(2), json!("b")]]);
        assert_eq!(source.statement_count(), 1);
    }

    #[test]
    fn test_memory_source_multiplexes_batches() {
        let source = MemoryRowSource::new()
            .with_result("SELECT 1 AS x", CannedResult::new(["x"], vec![vec![json!(1)]]))
            .with_result("SELECT 2 AS y", CannedResult::new(["y"], vec![vec![json!(2)]]));
        assert!(source.supports_multiple_results());

        let columns = tokio_test::block_on(async {
            let mut results = source
                .query_multiple(
                    &join_statements(&["SELECT 1 AS x", "SELECT 2 AS y"]),
                    &QueryParams::new(),
                )
                .await
                .unwrap();
            let mut columns = Vec::new();
            while let Some(cursor) = results.next_result().await.unwrap() {
                columns.push(cursor.columns().to_vec());
            }
            columns
        });

        assert_eq!(columns, vec![vec!["x".to_string()], vec!["y".to_string()]]);
        assert_eq!(source.round_trips().len(), 1);
    }

    #[test]
    fn test_malformed_compact_row() {
        assert!(CannedResult::from_compact_json("[\"Id\"]\n[1,2]\n").is_err());
        assert!(CannedResult::from_compact_json("{\"Id\":1}\n").is_err());
    }
}
