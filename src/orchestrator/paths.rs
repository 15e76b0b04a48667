//! Path propagation stage: collect search-path entries from unit directories

use crate::cache::{CacheName, PATHS_FILE};
use crate::orchestrator::StageWarning;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Collect the `paths.txt` entries of every unit, in unit order then line order.
///
/// A missing `paths.txt` contributes nothing. An unreadable one is reported
/// as a warning and its entries are dropped.
pub async fn collect_path_entries(
    cache_dir: &Path,
    units: &[CacheName],
) -> (Vec<PathBuf>, Vec<StageWarning>) {
    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    for name in units {
        let file = name.dir_in(cache_dir).join(PATHS_FILE);

        match tokio::fs::read_to_string(&file).await {
            Ok(content) => {
                let records = parse_path_records(&content);
                debug!("{} adds {} path entr(ies)", name, records.len());
                entries.extend(records);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                let warning = StageWarning::PathPropagation {
                    name: name.clone(),
                    path: file,
                    reason: e.to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    (entries, warnings)
}

/// One entry per non-blank line, taken as written apart from a CR ending
pub fn parse_path_records(content: &str) -> Vec<PathBuf> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(PathBuf::from)
        .collect()
}
