use serde::Serialize;
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumIter};

pub type DepixelResult<T> = Result<T, DepixelError>;

/// Failure of a single job. None of these ever abort sibling jobs.
#[derive(thiserror::Error, Debug)]
pub enum DepixelError {
    #[error("cannot decode {} as an RGBA raster: {message}", path.display())]
    InputFormat { path: PathBuf, message: String },

    #[error("vectorization failed: {0}")]
    Vectorization(String),

    #[error("malformed vector document: {0}")]
    MalformedDocument(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("failed to write {}: {message}", path.display())]
    OutputWrite { path: PathBuf, message: String },
}

/// Tag of a [`DepixelError`], used for summaries and JSON output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[strum(serialize = "input format")]
    InputFormat,
    #[strum(serialize = "vectorization")]
    Vectorization,
    #[strum(serialize = "malformed document")]
    MalformedDocument,
    #[strum(serialize = "render")]
    Render,
    #[strum(serialize = "output write")]
    OutputWrite,
}

impl DepixelError {
    pub fn input_format(path: &Path, message: impl ToString) -> Self {
        Self::InputFormat {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn vectorization(msg: impl Into<String>) -> Self {
        Self::Vectorization(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn output_write(path: &Path, message: impl ToString) -> Self {
        Self::OutputWrite {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InputFormat { .. } => FailureKind::InputFormat,
            Self::Vectorization(_) => FailureKind::Vectorization,
            Self::MalformedDocument(_) => FailureKind::MalformedDocument,
            Self::Render(_) => FailureKind::Render,
            Self::OutputWrite { .. } => FailureKind::OutputWrite,
        }
    }
}
