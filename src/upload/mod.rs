//! Upload backends
//!
//! This module defines the [`Uploader`] capability and ships one reference
//! backend, [`SmmsUploader`], for the SM.MS image host. Other backends
//! (object storage, self-hosted image services) implement the same trait and
//! are injected into the pipeline at construction time.

mod smms;
mod traits;

pub use smms::{smms_uploader, SmmsUploader};
pub use traits::{existing_url_from_message, UploadOutcome, Uploader, EXISTS_AT_MARKER};
