//! HTTPS downloads with timeouts, streaming-to-disk, SHA-256 hashing, ZIP
//! extraction.
//!
//! Grounded in `downloader.py`'s `download_ofac`/`unzip_ofac`/`download_un`/
//! `_calculate_hash`. Every fetch is a single attempt; retries are left to
//! the caller.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::{DataConfig, HashVerificationConfig};
use crate::error::IngestError;

/// A fetched-and-verified artifact: its final on-disk path and SHA-256
/// hex digest.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub sha256_hex: String,
}

/// Downloads OFAC/UN source lists and extracts the OFAC ZIP.
pub struct Fetcher {
    data_dir: PathBuf,
    timeout: Duration,
    chunk_size: usize,
    client: reqwest::blocking::Client,
}

impl Fetcher {
    pub fn new(config: &DataConfig) -> Result<Self, IngestError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.fetch_timeout_seconds))
            .build()
            .map_err(|e| IngestError::FetchNet {
                source: "client".to_string(),
                message: e.to_string(),
            })?;

        let data_dir = PathBuf::from(&config.data_directory);
        fs::create_dir_all(&data_dir).map_err(|e| IngestError::FetchIo {
            source: data_dir.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            data_dir,
            timeout: Duration::from_secs(config.fetch_timeout_seconds),
            chunk_size: config.fetch_chunk_size_bytes,
            client,
        })
    }

    /// Downloads the OFAC SDN Enhanced ZIP to `<data_dir>/ofac_enhanced.zip`,
    /// then extracts the first `.XML` (case-insensitive) entry, renaming it
    /// to `<data_dir>/sdn_enhanced.xml`.
    pub fn fetch_ofac(&self, url: &str) -> Result<FetchedFile, IngestError> {
        let zip_path = self.data_dir.join("ofac_enhanced.zip");
        self.stream_to_file(url, &zip_path, "OFAC")?;
        self.unzip_ofac(&zip_path)
    }

    /// Downloads the UN Consolidated XML directly (no ZIP wrapper) to
    /// `<data_dir>/un_consolidated.xml`.
    pub fn fetch_un(&self, url: &str) -> Result<FetchedFile, IngestError> {
        let path = self.data_dir.join("un_consolidated.xml");
        self.stream_to_file(url, &path, "UN")
    }

    fn stream_to_file(&self, url: &str, dest: &Path, label: &str) -> Result<FetchedFile, IngestError> {
        info!(target: "sanctions_ingest", source = label, %url, "fetching sanctions list");

        let mut response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .map_err(|e| IngestError::FetchNet {
                source: label.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(IngestError::FetchHttp {
                source: label.to_string(),
                status: response.status().as_u16(),
            });
        }

        let tmp_path = dest.with_extension("part");
        let mut file = File::create(&tmp_path).map_err(|e| IngestError::FetchIo {
            source: label.to_string(),
            message: e.to_string(),
        })?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = response.read(&mut buf).map_err(|e| IngestError::FetchNet {
                source: label.to_string(),
                message: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).map_err(|e| IngestError::FetchIo {
                source: label.to_string(),
                message: e.to_string(),
            })?;
        }
        drop(file);

        fs::rename(&tmp_path, dest).map_err(|e| IngestError::FetchIo {
            source: label.to_string(),
            message: e.to_string(),
        })?;

        let sha256_hex = format!("{:x}", hasher.finalize());
        self.write_sidecar(dest, &sha256_hex)?;

        info!(
            target: "sanctions_ingest",
            source = label,
            path = %dest.display(),
            sha256 = %sha256_hex,
            "fetch complete"
        );

        Ok(FetchedFile {
            path: dest.to_path_buf(),
            sha256_hex,
        })
    }

    fn unzip_ofac(&self, zip_path: &Path) -> Result<FetchedFile, IngestError> {
        let file = File::open(zip_path).map_err(|e| IngestError::FetchIo {
            source: "OFAC".to_string(),
            message: e.to_string(),
        })?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| IngestError::FetchZip {
            source: "OFAC".to_string(),
            message: e.to_string(),
        })?;

        let xml_index = (0..archive.len())
            .find(|&i| {
                archive
                    .by_index(i)
                    .map(|f| f.name().to_uppercase().ends_with(".XML"))
                    .unwrap_or(false)
            })
            .ok_or_else(|| IngestError::FetchZip {
                source: "OFAC".to_string(),
                message: "no .XML entry found in ZIP archive".to_string(),
            })?;

        let final_path = self.data_dir.join("sdn_enhanced.xml");
        {
            let mut entry = archive.by_index(xml_index).map_err(|e| IngestError::FetchZip {
                source: "OFAC".to_string(),
                message: e.to_string(),
            })?;
            let mut out = File::create(&final_path).map_err(|e| IngestError::FetchIo {
                source: "OFAC".to_string(),
                message: e.to_string(),
            })?;
            std::io::copy(&mut entry, &mut out).map_err(|e| IngestError::FetchIo {
                source: "OFAC".to_string(),
                message: e.to_string(),
            })?;
        }

        let sha256_hex = hash_file(&final_path)?;
        self.write_sidecar(&final_path, &sha256_hex)?;

        info!(target: "sanctions_ingest", path = %final_path.display(), "extracted OFAC XML from ZIP");

        Ok(FetchedFile {
            path: final_path,
            sha256_hex,
        })
    }

    fn write_sidecar(&self, artifact_path: &Path, sha256_hex: &str) -> Result<(), IngestError> {
        let sidecar = artifact_path.with_extension(format!(
            "{}.sha256",
            artifact_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
        ));
        fs::write(&sidecar, sha256_hex).map_err(|e| IngestError::FetchIo {
            source: artifact_path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Compares `fetched` against a `known_hashes.json`-shaped side-channel
    /// if hash verification is enabled and the file is present next to the
    /// data directory. A mismatch is logged,
    /// not failed — the Open Question leaves enforcement to the operator.
    pub fn verify_known_hash(
        &self,
        source_key: &str,
        fetched: &FetchedFile,
        config: &HashVerificationConfig,
    ) {
        if !config.enabled {
            return;
        }
        let known_hashes_path = self.data_dir.join(&config.known_hashes_file);
        let Ok(contents) = fs::read_to_string(&known_hashes_path) else {
            return;
        };
        let Ok(map) = serde_json::from_str::<std::collections::HashMap<String, String>>(&contents)
        else {
            warn!(target: "security", known_hashes_path = %known_hashes_path.display(), "known_hashes.json is not valid JSON, skipping verification");
            return;
        };
        if let Some(expected) = map.get(source_key) {
            if !expected.eq_ignore_ascii_case(&fetched.sha256_hex) && config.alert_on_mismatch {
                warn!(
                    target: "security",
                    source = source_key,
                    expected = %expected,
                    actual = %fetched.sha256_hex,
                    "fetched file hash does not match known_hashes.json entry"
                );
            }
        }
    }
}

fn hash_file(path: &Path) -> Result<String, IngestError> {
    let mut file = File::open(path).map_err(|e| IngestError::FetchIo {
        source: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| IngestError::FetchIo {
            source: path.display().to_string(),
            message: e.to_string(),
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
