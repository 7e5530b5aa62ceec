use chrono::{DateTime, Utc};
use pipeline_core::{PipelineError, ProcessingStatus};
use serde::Serialize;

/// One source image and the state of its derived artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub id: i64,
    pub business_key: String,
    pub filename: String,
    pub thumbnail_ref: Option<String>,
    pub thumbnail_status: ProcessingStatus,
    pub caption_text: Option<String>,
    pub caption_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Both artifacts reached a terminal status
    pub fn is_settled(&self) -> bool {
        self.thumbnail_status.is_terminal() && self.caption_status.is_terminal()
    }
}

// Database row representation
#[derive(sqlx::FromRow)]
pub(crate) struct ImageRow {
    id: i64,
    business_key: String,
    filename: String,
    thumbnail_ref: Option<String>,
    thumbnail_status: String,
    caption_text: Option<String>,
    caption_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ImageRow> for ImageRecord {
    type Error = PipelineError;

    fn try_from(row: ImageRow) -> Result<Self, Self::Error> {
        Ok(ImageRecord {
            id: row.id,
            business_key: row.business_key,
            filename: row.filename,
            thumbnail_ref: row.thumbnail_ref,
            thumbnail_status: row.thumbnail_status.parse()?,
            caption_text: row.caption_text,
            caption_status: row.caption_status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::codes;

    fn row(thumbnail_status: &str) -> ImageRow {
        let now = Utc::now();
        ImageRow {
            id: 7,
            business_key: "uploads/a.png".into(),
            filename: "a.png".into(),
            thumbnail_ref: None,
            thumbnail_status: thumbnail_status.into(),
            caption_text: None,
            caption_status: "pending".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_conversion() {
        let record = ImageRecord::try_from(row("failed")).unwrap();
        assert_eq!(record.thumbnail_status, ProcessingStatus::Failed);
        assert_eq!(record.caption_status, ProcessingStatus::Pending);
        assert!(!record.is_settled());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = ImageRecord::try_from(row("processing")).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_STATUS);
    }
}
