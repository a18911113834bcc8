//! Batch identifiers for export runs.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Most ids one id search page returns
pub const MAX_EIDS_PER_SEARCH: usize = 2000;

/// Most ids one export request accepts
pub const MAX_EIDS_PER_EXPORT: usize = 100;

const PREFIX_LEN: usize = 6;

/// Random six-character prefix (lowercase letters and digits) for one run
pub fn batch_id_prefix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|b| (b as char).to_ascii_lowercase())
        .take(PREFIX_LEN)
        .collect()
}

/// Block indices for the running exported count: `(block2000, block100)`
pub fn block_indices(exported: usize) -> (usize, usize) {
    let block_search = exported / MAX_EIDS_PER_SEARCH;
    let block_export = (exported % MAX_EIDS_PER_SEARCH) / MAX_EIDS_PER_EXPORT;
    (block_search, block_export)
}

/// Batch id `{prefix}_{block2000}_{block100}`
pub fn batch_id(prefix: &str, exported: usize) -> String {
    let (block_search, block_export) = block_indices(exported);
    format!("{}_{}_{}", prefix, block_search, block_export)
}
