//! Macro-generated test suite for `StoreGateway` contract validation.
//!
//! # Generated Tests
//!
//! ## Conditional puts
//! - `test_put_then_get` — stored record is returned verbatim
//! - `test_put_existing_key_fails` — second put reports AlreadyExists, first survives
//! - `test_get_missing` — unknown key returns None
//!
//! ## Transactions
//! - `test_transact_commits_all` — every operation applied
//! - `test_transact_is_all_or_nothing` — one failed condition, nothing applied
//! - `test_transact_reports_every_failed_index`
//! - `test_add_to_set` — set grows, duplicates collapse
//! - `test_add_to_set_requires_record` — missing parent fails the transaction
//! - `test_compare_and_set` — matching/mismatching expectations
//!
//! ## Counters and index
//! - `test_increment` — counts from zero, returns the new value
//! - `test_increment_missing_record`
//! - `test_query_index_filters_and_orders`
//!
//! ## Concurrency
//! - `test_concurrent_increments_are_distinct`
//! - `test_concurrent_claims_have_one_winner`

/// Generate a `StoreGateway` conformance test suite.
///
/// `$factory` must evaluate to a fresh, empty gateway. It is re-evaluated for
/// each test. The concurrency tests also need `Clone + 'static`.
macro_rules! gateway_contract_tests {
    ($factory:expr) => {
        mod gateway_contract_tests {
            use super::*;
            use billing::core::error::StoreError;
            use billing::core::keys::PrimaryKey;
            use billing::core::store::{StoreGateway, WriteOp};

            // ==================================================================
            // Conditional puts
            // ==================================================================

            #[tokio::test]
            async fn test_put_then_get() {
                let gateway = $factory;
                let key = PrimaryKey::single("ACCOUNT#a1");
                let item = record(&key, "Account", None);

                gateway.put_if_absent(item.clone()).await.unwrap();

                let stored = gateway.get(&key).await.unwrap();
                assert_eq!(stored, Some(item));
            }

            #[tokio::test]
            async fn test_put_existing_key_fails() {
                let gateway = $factory;
                let key = PrimaryKey::single("ACCOUNT#a1");
                let first = record(&key, "Account", None);
                let mut second = first.clone();
                second.insert(
                    "Body".to_string(),
                    billing::core::codec::AttributeValue::S("overwritten".to_string()),
                );

                gateway.put_if_absent(first.clone()).await.unwrap();
                let err = gateway.put_if_absent(second).await.unwrap_err();

                assert!(matches!(err, StoreError::AlreadyExists { .. }));
                assert_eq!(gateway.get(&key).await.unwrap(), Some(first));
            }

            #[tokio::test]
            async fn test_get_missing() {
                let gateway = $factory;
                let result = gateway.get(&PrimaryKey::single("NOPE")).await.unwrap();
                assert!(result.is_none());
            }

            // ==================================================================
            // Transactions
            // ==================================================================

            #[tokio::test]
            async fn test_transact_commits_all() {
                let gateway = $factory;
                let key = PrimaryKey::single("ACCOUNT#a1");

                gateway
                    .transact(vec![
                        WriteOp::put_unique(record(&key, "Account", None)),
                        WriteOp::put_unique(marker("ACCOUNTEMAIL#a@x.com")),
                    ])
                    .await
                    .unwrap();

                assert!(gateway.get(&key).await.unwrap().is_some());
                assert!(
                    gateway
                        .get(&PrimaryKey::single("ACCOUNTEMAIL#a@x.com"))
                        .await
                        .unwrap()
                        .is_some()
                );
            }

            #[tokio::test]
            async fn test_transact_is_all_or_nothing() {
                let gateway = $factory;
                gateway.put_if_absent(marker("ACCOUNTEMAIL#a@x.com")).await.unwrap();
                let key = PrimaryKey::single("ACCOUNT#a2");

                let err = gateway
                    .transact(vec![
                        WriteOp::put_unique(record(&key, "Account", None)),
                        WriteOp::put_unique(marker("ACCOUNTEMAIL#a@x.com")),
                    ])
                    .await
                    .unwrap_err();

                assert_eq!(err, StoreError::TransactionConflict { failed: vec![1] });
                assert!(
                    gateway.get(&key).await.unwrap().is_none(),
                    "No member of a failed transaction may persist"
                );
            }

            #[tokio::test]
            async fn test_transact_reports_every_failed_index() {
                let gateway = $factory;
                gateway.put_if_absent(marker("A")).await.unwrap();
                gateway.put_if_absent(marker("C")).await.unwrap();

                let err = gateway
                    .transact(vec![
                        WriteOp::put_unique(marker("A")),
                        WriteOp::put_unique(marker("B")),
                        WriteOp::put_unique(marker("C")),
                    ])
                    .await
                    .unwrap_err();

                assert_eq!(err, StoreError::TransactionConflict { failed: vec![0, 2] });
                assert!(gateway.get(&PrimaryKey::single("B")).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_add_to_set() {
                let gateway = $factory;
                let key = PrimaryKey::single("ACCOUNT#a1");
                gateway.put_if_absent(record(&key, "Account", None)).await.unwrap();

                for client in ["c1", "c2", "c1"] {
                    gateway
                        .transact(vec![WriteOp::AddToSet {
                            key: key.clone(),
                            attribute: "Clients".to_string(),
                            values: string_set(&[client]),
                        }])
                        .await
                        .unwrap();
                }

                let stored = gateway.get(&key).await.unwrap().unwrap();
                assert_eq!(set_members(&stored, "Clients"), string_set(&["c1", "c2"]));
                assert_text(&stored, "Type", "Account");
            }

            #[tokio::test]
            async fn test_add_to_set_requires_record() {
                let gateway = $factory;

                let err = gateway
                    .transact(vec![
                        WriteOp::put_unique(marker("CLIENT#c1")),
                        WriteOp::AddToSet {
                            key: PrimaryKey::single("ACCOUNT#missing"),
                            attribute: "Clients".to_string(),
                            values: string_set(&["c1"]),
                        },
                    ])
                    .await
                    .unwrap_err();

                assert_eq!(err, StoreError::TransactionConflict { failed: vec![1] });
                assert!(gateway.get(&PrimaryKey::single("CLIENT#c1")).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_compare_and_set() {
                let gateway = $factory;
                let key = PrimaryKey::single("ACCOUNT#a1");
                gateway.put_if_absent(record(&key, "Account", None)).await.unwrap();

                let cas = |expected: Option<i64>, value: i64| WriteOp::CompareAndSet {
                    key: key.clone(),
                    attribute: "LastInvoiceNumber".to_string(),
                    expected,
                    value,
                };

                gateway.transact(vec![cas(None, 1)]).await.unwrap();
                gateway.transact(vec![cas(Some(1), 2)]).await.unwrap();

                let err = gateway.transact(vec![cas(Some(1), 2)]).await.unwrap_err();
                assert_eq!(err, StoreError::TransactionConflict { failed: vec![0] });

                let err = gateway.transact(vec![cas(None, 5)]).await.unwrap_err();
                assert_eq!(err, StoreError::TransactionConflict { failed: vec![0] });

                let stored = gateway.get(&key).await.unwrap().unwrap();
                assert_counter(&stored, "LastInvoiceNumber", 2);
            }

            // ==================================================================
            // Counters and index
            // ==================================================================

            #[tokio::test]
            async fn test_increment() {
                let gateway = $factory;
                let key = PrimaryKey::single("ACCOUNT#a1");
                gateway.put_if_absent(record(&key, "Account", None)).await.unwrap();

                assert_eq!(gateway.increment(&key, "LastInvoiceNumber", 1).await.unwrap(), 1);
                assert_eq!(gateway.increment(&key, "LastInvoiceNumber", 1).await.unwrap(), 2);
                assert_eq!(gateway.increment(&key, "LastInvoiceNumber", 5).await.unwrap(), 7);

                let seeded = PrimaryKey::single("ACCOUNT#a2");
                gateway
                    .put_if_absent(counter_record(&seeded, "LastInvoiceNumber", 41))
                    .await
                    .unwrap();
                assert_eq!(gateway.increment(&seeded, "LastInvoiceNumber", 1).await.unwrap(), 42);
            }

            #[tokio::test]
            async fn test_increment_missing_record() {
                let gateway = $factory;
                let err = gateway
                    .increment(&PrimaryKey::single("ACCOUNT#missing"), "LastInvoiceNumber", 1)
                    .await
                    .unwrap_err();

                assert!(matches!(err, StoreError::ConditionFailed { .. }));
                assert!(
                    gateway
                        .get(&PrimaryKey::single("ACCOUNT#missing"))
                        .await
                        .unwrap()
                        .is_none(),
                    "Incrementing must not create the record"
                );
            }

            #[tokio::test]
            async fn test_query_index_filters_and_orders() {
                let gateway = $factory;
                let items = [
                    ("INVOICE#i1#LINEITEM#b", "INVOICE#i1", "LINEITEM#b"),
                    ("INVOICE#i1#LINEITEM#a", "INVOICE#i1", "LINEITEM#a"),
                    ("INVOICE#i2#LINEITEM#c", "INVOICE#i2", "LINEITEM#c"),
                ];
                for (pk, gsi_pk, gsi_sk) in items {
                    let item = record(&PrimaryKey::single(pk), "LineItem", Some((gsi_pk, gsi_sk)));
                    gateway.put_if_absent(item).await.unwrap();
                }
                gateway.put_if_absent(marker("INVOICE#i1")).await.unwrap();

                let found = gateway.query_index("INVOICE#i1").await.unwrap();
                let sort_keys: Vec<_> = found
                    .iter()
                    .map(|item| item["GSI1SK"].as_s().unwrap().to_string())
                    .collect();
                assert_eq!(sort_keys, vec!["LINEITEM#a", "LINEITEM#b"]);

                assert!(gateway.query_index("INVOICE#none").await.unwrap().is_empty());
            }

            // ==================================================================
            // Concurrency
            // ==================================================================

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn test_concurrent_increments_are_distinct() {
                let gateway = $factory;
                let key = PrimaryKey::single("ACCOUNT#a1");
                gateway.put_if_absent(record(&key, "Account", None)).await.unwrap();

                let handles: Vec<_> = (0..50)
                    .map(|_| {
                        let gateway = gateway.clone();
                        let key = key.clone();
                        tokio::spawn(async move {
                            gateway.increment(&key, "LastInvoiceNumber", 1).await
                        })
                    })
                    .collect();

                let mut values = Vec::new();
                for result in futures::future::join_all(handles).await {
                    values.push(result.unwrap().unwrap());
                }
                values.sort();
                assert_eq!(values, (1..=50).collect::<Vec<i64>>());
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn test_concurrent_claims_have_one_winner() {
                let gateway = $factory;

                let handles: Vec<_> = (0..20)
                    .map(|i| {
                        let gateway = gateway.clone();
                        tokio::spawn(async move {
                            gateway
                                .transact(vec![
                                    WriteOp::put_unique(marker(&format!("CLIENT#c{}", i))),
                                    WriteOp::put_unique(marker("ACCOUNT#a#CLIENTEMAIL#same@x.com")),
                                ])
                                .await
                        })
                    })
                    .collect();

                let results = futures::future::join_all(handles).await;
                let winners = results
                    .into_iter()
                    .map(|r| r.unwrap())
                    .filter(|r| r.is_ok())
                    .count();
                assert_eq!(winners, 1);
            }
        }
    };
}
