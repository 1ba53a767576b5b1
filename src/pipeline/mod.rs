//! Pipeline stages for résumé analysis.
//!
//! Each submodule implements one transformation step; the orchestration
//! (ordering, persistence, status, cancellation) lives in
//! [`crate::analyze`].
//!
//! ## Data Flow
//!
//! ```text
//! PDF ──▶ render ──▶ encode ──▶ (blob store) … inference ──▶ parse
//!        (pdfium)    (PNG)                                (Feedback)
//! ```
//!
//! 1. [`render`]: rasterise page one; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`encode`]: PNG-encode the preview, base64-wrap it for vision APIs
//! 3. [`parse`]: extract the answer string and parse it into a validated
//!    [`crate::record::Feedback`]

pub mod encode;
pub mod parse;
pub mod render;
