//! Command handlers grouped by concern.

pub(crate) mod listing;
pub(crate) mod transfer;
pub(crate) mod upload;
