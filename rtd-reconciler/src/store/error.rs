/// Errors reading or writing stored records.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("failed to encode {column}: {source}")]
    Encode {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored value in {column} is invalid: {reason}")]
    Corrupt { column: &'static str, reason: String },
}

/// Errors reading or advancing the delivery log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = StoreError::Corrupt {
            column: "ar_pt",
            reason: "not a time".into(),
        };
        assert_eq!(err.to_string(), "stored value in ar_pt is invalid: not a time");

        let err = LogError::from(sqlx::Error::RowNotFound);
        assert!(err.to_string().starts_with("database error"));
    }
}
