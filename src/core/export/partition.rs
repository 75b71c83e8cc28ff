//! Partition planning
//!
//! Entire-collection jobs split the UUID space into contiguous ranges;
//! id-list jobs cut the list into files of a fixed size. Each partition gets
//! one `SCHEDULED` [`ExportFile`] staged under `{tmp_root}/{job_id}/`.

use crate::domain::{ExportFile, IdRange, Job, PartitionScope, RecordId};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Split the full identifier space into `n` disjoint, exhaustive ranges
///
/// The first range starts at the nil UUID, each `to` equals the next `from`,
/// and the last range is unbounded.
///
/// # Examples
///
/// ```
/// use marcport::core::export::partition::split_id_space;
///
/// let ranges = split_id_space(3);
/// assert_eq!(ranges.len(), 3);
/// assert_eq!(ranges[0].to, Some(ranges[1].from));
/// assert!(ranges[2].to.is_none());
/// ```
pub fn split_id_space(n: usize) -> Vec<IdRange> {
    let n = n.max(1) as u128;
    let step = u128::MAX / n;
    (0..n)
        .map(|i| IdRange {
            from: RecordId::from_u128(i * step),
            to: (i + 1 < n).then(|| RecordId::from_u128((i + 1) * step)),
        })
        .collect()
}

/// Cut an identifier list into chunks of at most `per_file`
pub fn chunk_ids(ids: &[String], per_file: usize) -> Vec<Vec<String>> {
    ids.chunks(per_file.max(1)).map(<[String]>::to_vec).collect()
}

/// Drop repeated identifiers, keeping first occurrences in order
///
/// UUIDs compare by value, so the simple and hyphenated spellings of one
/// identifier are duplicates. Returns the unique identifiers and the
/// repeated ones.
pub fn dedupe_ids(ids: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(ids.len());
    let mut duplicates = Vec::new();
    for id in ids {
        let key = match id.trim().parse::<RecordId>() {
            Ok(record_id) => record_id.to_string(),
            Err(_) => id.trim().to_ascii_lowercase(),
        };
        if seen.insert(key) {
            unique.push(id);
        } else {
            duplicates.push(id);
        }
    }
    (unique, duplicates)
}

/// Local staging path of partition `sequence`
pub fn partition_path(tmp_root: &Path, job: &Job, sequence: usize, extension: &str) -> PathBuf {
    tmp_root
        .join(job.id.to_string())
        .join(format!("{}-{sequence}.{extension}", job.artifact_stem()))
}

/// Create the scheduled file rows for `scopes`, numbered from 1
pub fn prepare_files(
    job: &Job,
    scopes: Vec<PartitionScope>,
    tmp_root: &Path,
    extension: &str,
) -> Vec<ExportFile> {
    scopes
        .into_iter()
        .enumerate()
        .map(|(i, scope)| {
            let sequence = i + 1;
            ExportFile::scheduled(
                job.id,
                sequence,
                partition_path(tmp_root, job, sequence, extension),
                scope,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobBuilder;
    use test_case::test_case;
    use uuid::Uuid;

    #[test_case(1)]
    #[test_case(2)]
    #[test_case(7)]
    #[test_case(16)]
    fn test_ranges_cover_space_without_overlap(n: usize) {
        let ranges = split_id_space(n);
        assert_eq!(ranges.len(), n);
        assert_eq!(ranges[0].from, RecordId::from_u128(0));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].to, Some(pair[1].from));
            assert!(pair[0].from < pair[1].from);
        }
        assert!(ranges[n - 1].to.is_none());

        for probe in [0u128, 1, u128::MAX / 3, u128::MAX / 2, u128::MAX - 1, u128::MAX] {
            let id = RecordId::from_u128(probe);
            let owners = ranges.iter().filter(|r| r.contains(&id)).count();
            assert_eq!(owners, 1, "id {probe} owned by {owners} ranges");
        }
    }

    #[test]
    fn test_zero_partitions_means_one() {
        assert_eq!(split_id_space(0).len(), 1);
    }

    #[test]
    fn test_chunk_ids() {
        let ids: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        let chunks = chunk_ids(&ids, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], vec!["4"]);
        assert!(chunk_ids(&[], 2).is_empty());
    }

    #[test]
    fn test_dedupe_ids() {
        let (unique, dups) = dedupe_ids(vec![
            "A".to_string(),
            "b".to_string(),
            "a".to_string(),
            "b".to_string(),
        ]);
        assert_eq!(unique, vec!["A", "b"]);
        assert_eq!(dups, vec!["a", "b"]);
    }

    #[test]
    fn test_dedupe_ids_compares_uuid_values() {
        let (unique, dups) = dedupe_ids(vec![
            "7d44b88c-4199-4bad-97dc-d78268e01398".to_string(),
            "7D44B88C41994BAD97DCD78268E01398".to_string(),
            " 7d44b88c-4199-4bad-97dc-d78268e01398".to_string(),
        ]);
        assert_eq!(unique, vec!["7d44b88c-4199-4bad-97dc-d78268e01398"]);
        assert_eq!(dups.len(), 2);
    }

    #[test]
    fn test_prepare_files() {
        let job = JobBuilder::new(42, Uuid::nil()).file_base_name("books").build();
        let files = prepare_files(
            &job,
            vec![
                PartitionScope::Range(IdRange::full()),
                PartitionScope::Ids { ids: vec![] },
            ],
            Path::new("/tmp/marcport"),
            "mrc",
        );
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].sequence, 2);
        assert_eq!(
            files[1].file_location,
            PathBuf::from(format!("/tmp/marcport/{}/books-42-2.mrc", job.id))
        );
    }
}
