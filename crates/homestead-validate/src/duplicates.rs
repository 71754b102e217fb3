// crates/homestead-validate/src/duplicates.rs
//
// Duplicate pre-check. A submission that repeats a listing, either by
// content or by source URI, is rejected before any tier runs.

use std::collections::HashSet;

use homestead_core::{DuplicateReport, Listing};

/// Count repeated content hashes and repeated normalized source URIs.
///
/// Listings without a source URL never collide on the URI check.
pub fn check_duplicates(listings: &[Listing]) -> DuplicateReport {
    let mut seen_hashes = HashSet::with_capacity(listings.len());
    let mut seen_uris = HashSet::with_capacity(listings.len());
    let mut duplicate_content = 0;
    let mut duplicate_uris = 0;

    for listing in listings {
        if !seen_hashes.insert(listing.content_hash()) {
            duplicate_content += 1;
        }
        if let Some(uri) = listing.normalized_source_uri() {
            if !seen_uris.insert(uri) {
                duplicate_uris += 1;
            }
        }
    }

    DuplicateReport {
        duplicate_content,
        duplicate_uris,
        passed: duplicate_content == 0 && duplicate_uris == 0,
    }
}
