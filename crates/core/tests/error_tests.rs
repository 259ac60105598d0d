// ═══════════════════════════════════════════════════════════════════
// Error Tests: CoreError variants, Display formatting, From impls
// ═══════════════════════════════════════════════════════════════════

use productivity_stats_core::errors::CoreError;
use productivity_stats_core::models::field::DataSource;
use uuid::Uuid;

// ── Display formatting ──────────────────────────────────────────────

mod display {
    use super::*;

    #[test]
    fn config_validation() {
        let err = CoreError::ConfigValidation("SCATTER_PLOT requires a Y axis field".into());
        assert_eq!(
            err.to_string(),
            "Invalid chart configuration: SCATTER_PLOT requires a Y axis field"
        );
    }

    #[test]
    fn missing_field() {
        let err = CoreError::MissingField {
            data_source: DataSource::Tasks,
            field_id: "deadline".into(),
        };
        assert_eq!(
            err.to_string(),
            "Field 'deadline' does not exist for data source TASKS"
        );
    }

    #[test]
    fn data_source_unavailable() {
        let err = CoreError::DataSourceUnavailable {
            data_source: DataSource::XpTransactions,
            reason: "timed out after 50 ms".into(),
        };
        assert_eq!(
            err.to_string(),
            "Data source XP_TRANSACTIONS unavailable: timed out after 50 ms"
        );
    }

    #[test]
    fn chart_not_found() {
        let id = Uuid::new_v4();
        let err = CoreError::ChartNotFound(id);
        assert_eq!(err.to_string(), format!("Chart not found: {id}"));
    }

    #[test]
    fn serialization() {
        let err = CoreError::Serialization("key must be a string".into());
        assert_eq!(err.to_string(), "Serialization error: key must be a string");
    }

    #[test]
    fn deserialization() {
        let err = CoreError::Deserialization("unexpected EOF".into());
        assert_eq!(err.to_string(), "Deserialization error: unexpected EOF");
    }
}

// ── Classification ──────────────────────────────────────────────────

mod classification {
    use super::*;

    #[test]
    fn config_errors_are_user_fixable() {
        assert!(CoreError::ConfigValidation("x".into()).is_config_error());
        assert!(CoreError::MissingField {
            data_source: DataSource::Categories,
            field_id: "colour".into(),
        }
        .is_config_error());
    }

    #[test]
    fn runtime_errors_are_not_config_errors() {
        assert!(!CoreError::DataSourceUnavailable {
            data_source: DataSource::CalendarEvents,
            reason: "offline".into(),
        }
        .is_config_error());
        assert!(!CoreError::ChartNotFound(Uuid::new_v4()).is_config_error());
    }
}

// ── From impls ──────────────────────────────────────────────────────

mod conversions {
    use super::*;

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn errors_are_debug() {
        let err = CoreError::ChartNotFound(Uuid::nil());
        assert!(format!("{err:?}").contains("ChartNotFound"));
    }
}
