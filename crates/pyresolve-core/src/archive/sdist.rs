//! Source distribution unpacking and build-backend introspection.
//!
//! Unpacking dispatches on the archive's declared [`SDistFormat`]. The
//! unpacked tree is then handed to a subprocess-isolated introspector
//! rather than having `setup.py` executed in-process: a fixed snippet
//! runs under `python3 -I` and reports back over stdout as a single JSON
//! object.

use crate::types::{parse_requires_dist, NormalizedPackageName, Requirement, SDistFormat};
use flate2::read::GzDecoder;
use std::io::Cursor;
use std::path::Path;
use std::process::Stdio;
use tar::Archive;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use zip::ZipArchive;

#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum SDistError {
    #[error("failed to unpack sdist archive: {0}")]
    Unpack(#[from] std::io::Error),

    #[error("failed to unpack zip sdist: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("python3 introspection subprocess is not on PATH")]
    PythonNotFound,

    #[error("python3 introspection subprocess exited with {status}: {stderr}")]
    IntrospectionFailed { status: String, stderr: String },

    #[error("introspection output was not valid JSON: {0}")]
    InvalidIntrospectionOutput(#[from] serde_json::Error),

    #[error("introspected package name '{found}' does not match the expected candidate name '{expected}'")]
    NameMismatch { found: String, expected: String },
}

/// Unpacks `bytes` (the downloaded sdist archive) into `dest`, which must
/// already exist and be empty. Returns the single top-level directory the
/// archive extracted into, per the sdist convention of one top-level
/// `<name>-<version>/` directory.
pub fn unpack(bytes: &[u8], format: SDistFormat, dest: &Path) -> Result<std::path::PathBuf, SDistError> {
    match format {
        SDistFormat::TarGz => {
            let decoder = GzDecoder::new(Cursor::new(bytes));
            Archive::new(decoder).unpack(dest)?;
        }
        SDistFormat::TarBz2 => {
            let decoder = bzip2::read::BzDecoder::new(Cursor::new(bytes));
            Archive::new(decoder).unpack(dest)?;
        }
        SDistFormat::Zip => {
            let mut archive = ZipArchive::new(Cursor::new(bytes))?;
            archive.extract(dest)?;
        }
    }

    let mut entries = std::fs::read_dir(dest)?.filter_map(|e| e.ok());
    let first = entries.next().ok_or(SDistError::Unpack(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "sdist archive unpacked to an empty directory",
    )))?;
    Ok(first.path())
}

/// The fixed introspection snippet piped to `python3 -I` (§4.4 `[ADDED]`).
/// Reads `pyproject.toml` if a PEP 517 `build-system` table is present,
/// otherwise falls back to a `setup.py egg_info`-driven read of the
/// generated `PKG-INFO`/`requires.txt`, and always emits exactly one JSON
/// object on stdout.
const INTROSPECTION_SNIPPET: &str = r#"
import json
import os
import subprocess
import sys

def read_pyproject():
    try:
        import tomllib
    except ImportError:
        return None
    path = "pyproject.toml"
    if not os.path.exists(path):
        return None
    with open(path, "rb") as fp:
        return tomllib.load(fp)

def egg_info_metadata():
    subprocess.run(
        [sys.executable, "setup.py", "egg_info", "--egg-base", "."],
        check=True,
        stdout=subprocess.DEVNULL,
        stderr=subprocess.DEVNULL,
    )
    egg_info_dirs = [d for d in os.listdir(".") if d.endswith(".egg-info")]
    if not egg_info_dirs:
        raise RuntimeError("setup.py egg_info produced no .egg-info directory")
    egg_info = egg_info_dirs[0]
    name = None
    version = None
    with open(os.path.join(egg_info, "PKG-INFO")) as fp:
        for line in fp:
            if line.startswith("Name:"):
                name = line[len("Name:"):].strip()
            elif line.startswith("Version:"):
                version = line[len("Version:"):].strip()
    install_requires = []
    requires_path = os.path.join(egg_info, "requires.txt")
    if os.path.exists(requires_path):
        with open(requires_path) as fp:
            for line in fp:
                line = line.strip()
                if not line or line.startswith("["):
                    break
                install_requires.append(line)
    return {
        "name": name,
        "version": version,
        "install_requires": install_requires,
        "setup_requires": [],
    }

pyproject = read_pyproject()
if pyproject is not None and "project" in pyproject:
    project = pyproject["project"]
    result = {
        "name": project.get("name"),
        "version": project.get("version"),
        "install_requires": project.get("dependencies", []),
        "setup_requires": pyproject.get("build-system", {}).get("requires", []),
    }
else:
    result = egg_info_metadata()

print(json.dumps(result))
"#;

#[derive(Debug, serde::Deserialize)]
struct IntrospectionResult {
    name: Option<String>,
    #[allow(dead_code)]
    version: Option<String>,
    install_requires: Vec<String>,
    setup_requires: Vec<String>,
}

/// Runs the introspection snippet against `package_dir` and returns the
/// requirement list it reports, checked against `expected_name`.
pub async fn introspect_requirements(
    package_dir: &Path,
    expected_name: &NormalizedPackageName,
) -> Result<Vec<Requirement>, SDistError> {
    which::which("python3").map_err(|_| SDistError::PythonNotFound)?;

    let mut child = Command::new("python3")
        .arg("-I")
        .arg("-c")
        .arg(INTROSPECTION_SNIPPET)
        .current_dir(package_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // The snippet is self-contained and reads nothing from stdin; closing
    // it immediately lets the child observe EOF rather than block.
    if let Some(mut stdin) = child.stdin.take() {
        stdin.shutdown().await.ok();
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(SDistError::IntrospectionFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let parsed: IntrospectionResult = serde_json::from_slice(&output.stdout)?;

    if !parsed.setup_requires.is_empty() {
        tracing::warn!(
            name = %expected_name,
            "sdist declares setup_requires; its build-time dependencies are not verified",
        );
    }

    let found_name = parsed.name.unwrap_or_default();
    let canonical: NormalizedPackageName = found_name
        .parse()
        .map_err(|_| SDistError::NameMismatch {
            found: found_name.clone(),
            expected: expected_name.to_string(),
        })?;
    if &canonical != expected_name {
        return Err(SDistError::NameMismatch {
            found: found_name,
            expected: expected_name.to_string(),
        });
    }

    Ok(parsed
        .install_requires
        .into_iter()
        .filter_map(|raw| match parse_requires_dist(&raw) {
            Ok(req) => Some(Requirement::from_pep508(req)),
            Err(e) => {
                tracing::warn!("ignoring install_requires entry '{raw}': {e}");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unpacks_tar_gz_into_its_single_top_level_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = tar::Builder::new(Vec::new());
        let data = b"print('hi')";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_cksum();
        builder
            .append_data(&mut header, "attrs-18.2.0/setup.py", &data[..])
            .unwrap();
        let tar_bytes = builder.into_inner().unwrap();

        let mut gz_bytes = Vec::new();
        {
            use flate2::write::GzEncoder;
            use flate2::Compression;
            use std::io::Write;
            let mut encoder = GzEncoder::new(&mut gz_bytes, Compression::default());
            encoder.write_all(&tar_bytes).unwrap();
            encoder.finish().unwrap();
        }

        let extracted = unpack(&gz_bytes, SDistFormat::TarGz, dir.path()).unwrap();
        assert_eq!(extracted.file_name().unwrap(), "attrs-18.2.0");
    }
}
