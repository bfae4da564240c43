//! Wheel metadata extraction (§4.4): opens the downloaded archive as a
//! zip, locates the `<name>-<ver>.dist-info/METADATA` member, and parses
//! it with [`WheelCoreMetadata`].

use crate::types::{PackageName, WheelCoreMetaDataError, WheelCoreMetadata, WheelFilename};
use pep440_rs::Version;
use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::str::FromStr;
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum WheelMetadataError {
    #[error(".dist-info/ directory missing from wheel")]
    DistInfoMissing,

    #[error("found multiple .dist-info directories in wheel")]
    MultipleDistInfoDirs,

    #[error(".dist-info/METADATA missing from wheel")]
    MetadataMissing,

    #[error("invalid METADATA")]
    InvalidMetadata(#[from] WheelCoreMetaDataError),

    #[error("name mismatch between dist-info/METADATA and filename ({metadata} != {filename})")]
    NameMismatch { metadata: String, filename: String },

    #[error("version mismatch between dist-info/METADATA and filename ({metadata} != {filename})")]
    VersionMismatch { metadata: Version, filename: Version },

    #[error("failed to read wheel archive: {0}")]
    Zip(#[from] ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Finds the sole `<name>-<version>.dist-info` directory among a wheel's
/// top-level entries, the way PEP 427 requires exactly one to exist.
fn find_dist_info<'a>(
    top_level_names: impl IntoIterator<Item = &'a str>,
    name: &PackageName,
    version: &Version,
) -> Result<&'a str, WheelMetadataError> {
    let mut candidates = top_level_names.into_iter().filter(|dir_name| {
        let Some(candidate) = dir_name.strip_suffix(".dist-info") else {
            return false;
        };
        let Some((candidate_name, candidate_version)) = candidate.rsplit_once('-') else {
            return false;
        };
        let Ok(candidate_name) = PackageName::from_str(candidate_name) else {
            return false;
        };
        let Ok(candidate_version) = Version::from_str(candidate_version) else {
            return false;
        };
        &candidate_name == name && &candidate_version == version
    });

    let candidate = candidates.next().ok_or(WheelMetadataError::DistInfoMissing)?;
    if candidates.next().is_some() {
        return Err(WheelMetadataError::MultipleDistInfoDirs);
    }
    Ok(candidate)
}

/// Extracts and parses `METADATA` from a downloaded wheel archive,
/// cross-checking its `Name`/`Version` against the filename the archive
/// was advertised under.
pub fn extract_metadata(
    bytes: Vec<u8>,
    filename: &WheelFilename,
) -> Result<WheelCoreMetadata, WheelMetadataError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let top_level_names: HashSet<String> = (0..archive.len())
        .map(|i| {
            let entry_name = archive.by_index(i).map(|f| f.name().to_owned());
            entry_name
        })
        .collect::<Result<HashSet<_>, ZipError>>()?
        .into_iter()
        .map(|full_name| {
            full_name
                .split_once('/')
                .map_or(full_name.clone(), |(base, _)| base.to_owned())
        })
        .collect();

    let dist_info = find_dist_info(
        top_level_names.iter().map(String::as_str),
        &filename.distribution,
        &filename.version,
    )?
    .to_owned();

    let metadata_path = format!("{dist_info}/METADATA");
    let mut entry = archive
        .by_name(&metadata_path)
        .map_err(|_| WheelMetadataError::MetadataMissing)?;
    let mut metadata_blob = Vec::new();
    entry.read_to_end(&mut metadata_blob)?;
    drop(entry);

    let metadata = WheelCoreMetadata::try_from(metadata_blob.as_slice())?;

    if metadata.name != filename.distribution {
        return Err(WheelMetadataError::NameMismatch {
            metadata: metadata.name.as_source_str().to_owned(),
            filename: filename.distribution.as_source_str().to_owned(),
        });
    }
    if metadata.version != filename.version {
        return Err(WheelMetadataError::VersionMismatch {
            metadata: metadata.version,
            filename: filename.version.clone(),
        });
    }

    Ok(metadata)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_test_wheel() -> Vec<u8> {
        let mut buf = Vec::new();
        let cursor = Cursor::new(&mut buf);
        let mut zip = zip::ZipWriter::new(cursor);
        zip.start_file::<_, ()>("attrs-18.2.0.dist-info/METADATA", FileOptions::default())
            .unwrap();
        zip.write_all(b"Name: attrs\nVersion: 18.2.0\n\n").unwrap();
        zip.finish().unwrap();
        buf
    }

    #[test]
    fn extracts_matching_metadata() {
        let bytes = build_test_wheel();
        let filename =
            WheelFilename::from_filename("attrs-18.2.0-py3-none-any.whl", &"attrs".parse().unwrap())
                .unwrap();
        let metadata = extract_metadata(bytes, &filename).unwrap();
        assert_eq!(metadata.name.as_str(), "attrs");
    }

    #[test]
    fn rejects_version_mismatch() {
        let bytes = build_test_wheel();
        let filename =
            WheelFilename::from_filename("attrs-99.0.0-py3-none-any.whl", &"attrs".parse().unwrap())
                .unwrap();
        assert!(matches!(
            extract_metadata(bytes, &filename),
            Err(WheelMetadataError::VersionMismatch { .. })
        ));
    }
}
