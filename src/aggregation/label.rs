use crate::symbols::{LABEL_FOREIGN, LABEL_KERNEL, LABEL_UNKNOWN};

/// The separator between the parts of a display label.
pub const LABEL_DELIMITER: char = ':';

/// How display labels are cleaned up. This never affects aggregation keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelOptions {
    /// Removed from the start of the label, usually the profiled binary.
    pub strip_prefix: Option<String>,
    /// Removed from the end of the label.
    pub strip_suffix: Option<String>,
}

impl LabelOptions {
    pub fn strip_target(target: &str) -> Self {
        Self {
            strip_prefix: Some(target.to_string()),
            strip_suffix: None,
        }
    }
}

/// Join `parts` with [`LABEL_DELIMITER`] and sanitize the result.
pub fn build_label(parts: &[String], options: &LabelOptions) -> String {
    sanitize_label(&parts.join(&LABEL_DELIMITER.to_string()), options)
}

/// Collapse runs of the same sentinel segment, so `_unknown:_unknown` reads
/// `_unknown`, then strip the configured prefix and suffix.
///
/// A prefix or suffix is only stripped as whole segments, and never if that
/// would leave the label empty.
pub fn sanitize_label(label: &str, options: &LabelOptions) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in label.split(LABEL_DELIMITER) {
        let is_sentinel = [LABEL_UNKNOWN, LABEL_FOREIGN, LABEL_KERNEL].contains(&segment);
        if is_sentinel && segments.last() == Some(&segment) {
            continue;
        }
        segments.push(segment);
    }
    let mut label = segments.join(&LABEL_DELIMITER.to_string());

    if let Some(prefix) = options.strip_prefix.as_deref().filter(|p| !p.is_empty()) {
        if let Some(rest) = label.strip_prefix(prefix) {
            if rest.starts_with(LABEL_DELIMITER) {
                let rest = rest.trim_start_matches(LABEL_DELIMITER);
                if !rest.is_empty() {
                    label = rest.to_string();
                }
            }
        }
    }
    if let Some(suffix) = options.strip_suffix.as_deref().filter(|s| !s.is_empty()) {
        if let Some(rest) = label.strip_suffix(suffix) {
            if rest.ends_with(LABEL_DELIMITER) {
                let rest = rest.trim_end_matches(LABEL_DELIMITER);
                if !rest.is_empty() {
                    label = rest.to_string();
                }
            }
        }
    }
    label
}
