//! Error types for the hvdc-extract crate.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    Unsupported(PathBuf),

    #[error("Failed to read workbook: {0}")]
    Workbook(String),

    #[error("Failed to parse XML: {0}")]
    Xml(String),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid source pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for ExtractError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<quick_xml::DeError> for ExtractError {
    fn from(e: quick_xml::DeError) -> Self {
        Self::Xml(e.to_string())
    }
}

impl ExtractError {
    /// Convert into the shared taxonomy, attributing the failure to `path`.
    pub fn for_document(self, path: &std::path::Path) -> hvdc_core::HvdcError {
        hvdc_core::HvdcError::Extraction {
            path: path.display().to_string(),
            reason: self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
