//! Unit tests for entity catalog loading
//!
//! Covers YAML parsing and cross-reference validation.

#[cfg(test)]
mod catalog_loading_tests {
    use std::io::Write;

    use clickfold::entity_catalog::{CatalogError, EntityCatalog, FieldKind, ScalarType};
    use test_case::test_case;

    const SHOP_YAML: &str = r#"
name: shop
entities:
  Order:
    key: OrderId
    fields:
      OrderId: integer
      Total: float
      Paid: boolean
      Meta: json
      Lines: { collection: Line }
      Customer: { reference: Customer }
  Line:
    fields:
      Sku: string
  Customer:
    key: CustomerId
    fields:
      CustomerId: string
"#;

    #[test]
    fn test_catalog_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SHOP_YAML.as_bytes()).unwrap();

        let catalog = EntityCatalog::from_yaml_file(file.path()).unwrap();
        assert_eq!(catalog.name.as_deref(), Some("shop"));
        assert_eq!(
            catalog.entity_names().collect::<Vec<_>>(),
            vec!["Order", "Line", "Customer"]
        );

        let order = catalog.entity("Order").unwrap();
        assert_eq!(order.key.as_deref(), Some("OrderId"));
        assert_eq!(order.field("Total"), Some(&FieldKind::Scalar(ScalarType::Float)));
        assert_eq!(
            order.field("Lines"),
            Some(&FieldKind::Collection("Line".to_string()))
        );
        assert!(catalog.entity("Line").unwrap().key.is_none());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EntityCatalog::from_yaml_file("/nonexistent/catalog.yaml"),
            Err(CatalogError::ConfigReadError { .. })
        ));
    }

    #[test_case("entities: {}" ; "empty catalog")]
    #[test_case("entities: { A: { fields: { B: { reference: Nope } } } }" ; "dangling reference")]
    #[test_case("entities: { A: { key: Missing, fields: { X: integer } } }" ; "undeclared key")]
    #[test_case("entities: { A: { fields: { X: decimal } } }" ; "unknown scalar type")]
    #[test_case("entities: [A, B]" ; "not a mapping")]
    fn test_invalid_catalogs(yaml: &str) {
        assert!(EntityCatalog::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_unknown_entity_lookup() {
        let catalog = EntityCatalog::from_yaml_str(SHOP_YAML).unwrap();
        assert!(matches!(
            catalog.entity("Refund"),
            Err(CatalogError::UnknownEntity { .. })
        ));
        assert!(!catalog.contains("Refund"));
    }
}
