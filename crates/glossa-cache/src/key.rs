//! Object key layout
//!
//! `{projectId}-{language}-{sanitizedFilename}` with no revision component, so
//! each resync overwrites the previous payload. Summaries live next to it under
//! `meta-{objectKey}`; the last synced manifest and its revision under
//! `manifest-{projectId}.json`.

/// Prefix of per-file summary objects
pub const SUMMARY_PREFIX: &str = "meta-";

/// Prefix of manifest snapshots
pub const MANIFEST_PREFIX: &str = "manifest-";

/// Replace path separators so the filename fits in one flat key
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(['/', '\\'], "-")
}

/// Payload key for one file
#[must_use]
pub fn object_key(project_id: &str, language: &str, filename: &str) -> String {
    format!("{project_id}-{language}-{}", sanitize_filename(filename))
}

/// Summary key for a payload key
#[must_use]
pub fn summary_key(object_key: &str) -> String {
    format!("{SUMMARY_PREFIX}{object_key}")
}

/// Key of a project's last synced manifest
#[must_use]
pub fn manifest_key(project_id: &str) -> String {
    format!("{MANIFEST_PREFIX}{project_id}.json")
}

/// Prefix covering every summary of a project
#[must_use]
pub fn project_summary_prefix(project_id: &str) -> String {
    format!("{SUMMARY_PREFIX}{project_id}-")
}
