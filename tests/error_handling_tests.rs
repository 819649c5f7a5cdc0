//! Tests for the typed error handling system
//!
//! These tests verify that:
//! - Every error kind carries a stable code
//! - Store errors convert to the matching domain kinds
//! - Error messages name the offending value
//! - Callers can match on specific kinds

use billing::prelude::*;

// =============================================================================
// Error Code Tests
// =============================================================================

mod error_code_tests {
    use super::*;

    #[test]
    fn test_duplicate_email_code() {
        let err = BillingError::DuplicateEmail {
            email: "a@x.com".to_string(),
        };
        assert_eq!(err.error_code(), "DUPLICATE_EMAIL");
    }

    #[test]
    fn test_duplicate_invoice_number_code() {
        let err = BillingError::DuplicateInvoiceNumber {
            account_id: "acc".to_string(),
            number: 3,
        };
        assert_eq!(err.error_code(), "DUPLICATE_INVOICE_NUMBER");
    }

    #[test]
    fn test_not_found_code() {
        let err = BillingError::NotFound {
            entity_type: "Account".to_string(),
            id: "acc".to_string(),
        };
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_invalid_field_code() {
        let err = BillingError::InvalidField {
            entity_type: "Invoice".to_string(),
            field: "number".to_string(),
            message: "expected an integer".to_string(),
        };
        assert_eq!(err.error_code(), "INVALID_FIELD");
    }

    #[test]
    fn test_unsupported_type_code() {
        let err = BillingError::UnsupportedType {
            type_name: "binary set".to_string(),
        };
        assert_eq!(err.error_code(), "UNSUPPORTED_TYPE");
    }
}

// =============================================================================
// Conflict Classification Tests
// =============================================================================

mod conflict_tests {
    use super::*;

    #[test]
    fn test_uniqueness_failures_are_conflicts() {
        let conflicts = [
            BillingError::DuplicateEmail {
                email: "a@x.com".to_string(),
            },
            BillingError::DuplicateInvoiceNumber {
                account_id: "acc".to_string(),
                number: 1,
            },
            BillingError::AlreadyExists {
                entity_type: "Client".to_string(),
                key: "CLIENT#c".to_string(),
            },
            BillingError::TransactionConflict { failed: vec![2] },
        ];
        for err in conflicts {
            assert!(err.is_conflict(), "{} should be a conflict", err);
        }
    }

    #[test]
    fn test_input_and_backend_failures_are_not_conflicts() {
        let others = [
            BillingError::MissingField {
                entity_type: "Account".to_string(),
                field: "email".to_string(),
            },
            BillingError::NotFound {
                entity_type: "Account".to_string(),
                id: "acc".to_string(),
            },
            BillingError::Store(StoreError::Backend("timeout".to_string())),
        ];
        for err in others {
            assert!(!err.is_conflict(), "{} should not be a conflict", err);
        }
    }
}

// =============================================================================
// Conversion Tests
// =============================================================================

mod conversion_tests {
    use super::*;

    #[test]
    fn test_unsupported_type_keeps_its_kind() {
        let err: BillingError = StoreError::UnsupportedType("B".to_string()).into();
        assert_eq!(
            err,
            BillingError::UnsupportedType {
                type_name: "B".to_string()
            }
        );
    }

    #[test]
    fn test_condition_failed_stays_a_store_error() {
        let store = StoreError::ConditionFailed {
            key: "ACCOUNT#a".to_string(),
        };
        let err: BillingError = store.clone().into();

        assert_eq!(err.error_code(), "STORE_ERROR");
        assert_eq!(err.to_string(), store.to_string());
    }

    #[test]
    fn test_billing_error_into_anyhow() {
        let err: anyhow::Error = BillingError::DuplicateEmail {
            email: "a@x.com".to_string(),
        }
        .into();

        assert!(matches!(
            err.downcast_ref::<BillingError>(),
            Some(BillingError::DuplicateEmail { .. })
        ));
    }
}

// =============================================================================
// Message Tests
// =============================================================================

mod message_tests {
    use super::*;

    #[test]
    fn test_duplicate_email_message() {
        let err = BillingError::DuplicateEmail {
            email: "a@x.com".to_string(),
        };
        assert_eq!(err.to_string(), "Email 'a@x.com' is already registered");
    }

    #[test]
    fn test_missing_field_message() {
        let err = BillingError::MissingField {
            entity_type: "Invoice".to_string(),
            field: "issued_on".to_string(),
        };
        assert_eq!(err.to_string(), "Missing required field 'issued_on' on Invoice");
    }

    #[test]
    fn test_store_error_messages() {
        assert_eq!(
            StoreError::AlreadyExists {
                key: "ACCOUNT#a".to_string()
            }
            .to_string(),
            "record 'ACCOUNT#a' already exists"
        );
        assert_eq!(
            StoreError::TransactionConflict { failed: vec![0, 2] }.to_string(),
            "transaction cancelled, failed operations: [0, 2]"
        );
    }
}

// =============================================================================
// Matching Tests
// =============================================================================

mod matching_tests {
    use super::*;

    fn describe(err: &BillingError) -> &'static str {
        match err {
            BillingError::DuplicateEmail { .. } => "choose another email",
            BillingError::DuplicateInvoiceNumber { .. } => "choose another number",
            BillingError::TransactionConflict { .. } => "retry",
            BillingError::NotFound { .. } => "create the parent first",
            _ => "fail",
        }
    }

    #[test]
    fn test_callers_can_branch_on_kind() {
        assert_eq!(
            describe(&BillingError::TransactionConflict { failed: vec![2] }),
            "retry"
        );
        assert_eq!(
            describe(&BillingError::Store(StoreError::Backend("x".to_string()))),
            "fail"
        );
    }
}
