//! Rarity filter: keeps videos whose view count is below a threshold.

use crate::types::VideoDetail;

/// Returns `true` when `detail` has strictly fewer than `threshold` views.
pub fn is_rare(detail: &VideoDetail, threshold: u64) -> bool {
    detail.view_count < threshold
}

/// Keeps exactly the details with `view_count < threshold`, preserving order.
pub fn select_rare(details: &[VideoDetail], threshold: u64) -> Vec<VideoDetail> {
    details
        .iter()
        .filter(|d| is_rare(d, threshold))
        .cloned()
        .collect()
}
