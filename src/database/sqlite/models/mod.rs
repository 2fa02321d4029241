#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// Minimum notebook name length, counted in characters after trimming
pub const MIN_NOTEBOOK_NAME_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Notebook {
    pub id: i64,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
}

impl std::fmt::Display for FileStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            FileStatus::Uploaded => write!(f, "Uploaded"),
            FileStatus::Processing => write!(f, "Processing"),
            FileStatus::Processed => write!(f, "Processed"),
            FileStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FileStatus {
    /// Allowed edges: uploaded -> processing, processing -> processed | failed,
    /// failed -> processing, and processing -> processing for an interrupted run
    #[inline]
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (FileStatus::Uploaded, FileStatus::Processing)
                | (FileStatus::Processing, FileStatus::Processing)
                | (FileStatus::Processing, FileStatus::Processed)
                | (FileStatus::Processing, FileStatus::Failed)
                | (FileStatus::Failed, FileStatus::Processing)
        )
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        self == FileStatus::Processed
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Uploaded => "uploaded",
            FileStatus::Processing => "processing",
            FileStatus::Processed => "processed",
            FileStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub notebook_id: i64,
    pub original_filename: String,
    pub stored_filename: String,
    pub upload_date: NaiveDateTime,
    pub status: FileStatus,
    pub error_message: Option<String>,
    pub chunk_count: i64,
    pub processed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFileRecord {
    pub notebook_id: i64,
    pub original_filename: String,
    pub stored_filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatusUpdate {
    pub status: FileStatus,
    pub error_message: Option<String>,
    pub chunk_count: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileStatusCounts {
    pub uploaded: i64,
    pub processing: i64,
    pub processed: i64,
    pub failed: i64,
}

impl FileStatusCounts {
    #[inline]
    pub fn total(&self) -> i64 {
        self.uploaded + self.processing + self.processed + self.failed
    }

    /// Files a "Process Files" run would pick up
    #[inline]
    pub fn pending(&self) -> i64 {
        self.uploaded + self.processing + self.failed
    }

    #[inline]
    pub fn record(&mut self, status: FileStatus, count: i64) {
        match status {
            FileStatus::Uploaded => self.uploaded += count,
            FileStatus::Processing => self.processing += count,
            FileStatus::Processed => self.processed += count,
            FileStatus::Failed => self.failed += count,
        }
    }
}

impl Notebook {
    /// Name of the vector collection holding this notebook's chunks
    #[inline]
    pub fn collection_name(&self) -> String {
        collection_name(self.id)
    }

    /// Name of the upload directory under the data root
    #[inline]
    pub fn storage_dir_name(&self) -> String {
        format!("notebook_{}", self.id)
    }
}

#[inline]
pub fn collection_name(notebook_id: i64) -> String {
    format!("notebook_{notebook_id}")
}

/// Trim a notebook name and check its length, returning the normalized name
#[inline]
pub fn normalize_notebook_name(name: &str) -> Result<String, String> {
    let trimmed = name.trim();
    if trimmed.chars().count() < MIN_NOTEBOOK_NAME_CHARS {
        return Err(format!(
            "Notebook name must be at least {} characters long",
            MIN_NOTEBOOK_NAME_CHARS
        ));
    }
    Ok(trimmed.to_string())
}

impl FileRecord {
    #[inline]
    pub fn is_pending(&self) -> bool {
        !self.status.is_terminal()
    }
}
