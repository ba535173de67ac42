//! Stable identifier (SID) mapping
//!
//! `map-sid*` functions substitute a national identity number (FNR) with the
//! stable person number (SNR) valid at a snapshot date and then encrypt the
//! SNR. Restoring decrypts the SNR and maps it back to the FNR.
//!
//! The lookup happens in [`PseudoFunc::init`]; `apply`/`restore` consume the
//! resolution for the same value. This keeps the snapshot resolved for a value
//! inside one session and is why these functions are never cached.

use super::{
    PseudoFunc, PseudoFuncOutput, TransformDirection, METADATA_MAP_FAILURE,
    METADATA_SNAPSHOT_DATE,
};
use crate::domain::{FuncError, PseudoError, Result};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Outcome of a SID lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidLookup {
    /// Mapped identifier, `None` when the snapshot has no mapping
    pub value: Option<String>,
    /// Snapshot the lookup was answered from
    pub snapshot_date: NaiveDate,
}

/// Lookup capability over a versioned SID index
pub trait SidService: Send + Sync {
    /// Maps an FNR to its SNR
    fn lookup_fnr(&self, fnr: &str, snapshot: Option<NaiveDate>) -> std::result::Result<SidLookup, FuncError>;

    /// Maps an SNR back to its FNR
    fn lookup_snr(&self, snr: &str, snapshot: Option<NaiveDate>) -> std::result::Result<SidLookup, FuncError>;

    /// Available snapshot dates, oldest first
    fn snapshots(&self) -> Vec<NaiveDate>;

    /// The snapshot that answers lookups at `requested`
    ///
    /// `None` selects the latest snapshot.
    fn resolve_snapshot(&self, requested: Option<NaiveDate>) -> std::result::Result<NaiveDate, FuncError>;
}

#[derive(Debug, Default)]
struct SidSnapshot {
    fnr_to_snr: HashMap<String, String>,
    snr_to_fnr: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SidIndexFile {
    snapshots: Vec<SidSnapshotFile>,
}

#[derive(Debug, Deserialize)]
struct SidSnapshotFile {
    snapshot_date: String,
    mappings: Vec<SidMappingFile>,
}

#[derive(Debug, Deserialize)]
struct SidMappingFile {
    fnr: String,
    snr: String,
}

/// SID index held in memory
///
/// The file format is JSON:
///
/// ```json
/// {"snapshots": [{"snapshot_date": "2023-04-25", "mappings": [{"fnr": "11854898347", "snr": "0001ha3"}]}]}
/// ```
#[derive(Debug, Default)]
pub struct InMemorySidIndex {
    snapshots: BTreeMap<NaiveDate, SidSnapshot>,
}

impl InMemorySidIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping to a snapshot
    pub fn with_mapping(
        mut self,
        snapshot_date: NaiveDate,
        fnr: impl Into<String>,
        snr: impl Into<String>,
    ) -> Self {
        self.insert(snapshot_date, fnr.into(), snr.into());
        self
    }

    fn insert(&mut self, snapshot_date: NaiveDate, fnr: String, snr: String) {
        let snapshot = self.snapshots.entry(snapshot_date).or_default();
        snapshot.snr_to_fnr.insert(snr.clone(), fnr.clone());
        snapshot.fnr_to_snr.insert(fnr, snr);
    }

    /// Loads an index file
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed or
    /// if a snapshot date is not `YYYY-MM-DD`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PseudoError::Configuration(format!(
                "Failed to read SID index {}: {e}",
                path.display()
            ))
        })?;
        let file: SidIndexFile = serde_json::from_str(&contents).map_err(|e| {
            PseudoError::Configuration(format!(
                "Failed to parse SID index {}: {e}",
                path.display()
            ))
        })?;

        let mut index = Self::new();
        for snapshot in file.snapshots {
            let date = NaiveDate::parse_from_str(&snapshot.snapshot_date, "%Y-%m-%d").map_err(
                |e| {
                    PseudoError::Configuration(format!(
                        "Invalid SID snapshot date '{}': {e}",
                        snapshot.snapshot_date
                    ))
                },
            )?;
            // Keep empty snapshots so they still count as available versions
            index.snapshots.entry(date).or_default();
            for mapping in snapshot.mappings {
                index.insert(date, mapping.fnr, mapping.snr);
            }
        }
        Ok(index)
    }

    fn snapshot_at(
        &self,
        requested: Option<NaiveDate>,
    ) -> std::result::Result<(NaiveDate, &SidSnapshot), FuncError> {
        let found = match requested {
            Some(date) => self.snapshots.range(..=date).next_back(),
            None => self.snapshots.iter().next_back(),
        };
        match (found, requested) {
            (Some((date, snapshot)), _) => Ok((*date, snapshot)),
            (None, _) if self.snapshots.is_empty() => Err(FuncError::SidUnavailable(
                "no SID snapshot is loaded".to_string(),
            )),
            (None, Some(date)) => Err(FuncError::InvalidInput(format!(
                "no SID snapshot exists on or before {date}"
            ))),
            (None, None) => Err(FuncError::SidUnavailable(
                "no SID snapshot is loaded".to_string(),
            )),
        }
    }
}

impl SidService for InMemorySidIndex {
    fn lookup_fnr(&self, fnr: &str, snapshot: Option<NaiveDate>) -> std::result::Result<SidLookup, FuncError> {
        let (snapshot_date, snapshot) = self.snapshot_at(snapshot)?;
        Ok(SidLookup {
            value: snapshot.fnr_to_snr.get(fnr).cloned(),
            snapshot_date,
        })
    }

    fn lookup_snr(&self, snr: &str, snapshot: Option<NaiveDate>) -> std::result::Result<SidLookup, FuncError> {
        let (snapshot_date, snapshot) = self.snapshot_at(snapshot)?;
        Ok(SidLookup {
            value: snapshot.snr_to_fnr.get(snr).cloned(),
            snapshot_date,
        })
    }

    fn snapshots(&self) -> Vec<NaiveDate> {
        self.snapshots.keys().copied().collect()
    }

    fn resolve_snapshot(&self, requested: Option<NaiveDate>) -> std::result::Result<NaiveDate, FuncError> {
        self.snapshot_at(requested).map(|(date, _)| date)
    }
}

/// SID mapping composed with an encryption function
pub struct MapSidFunc {
    sid: Arc<dyn SidService>,
    cipher: Box<dyn PseudoFunc>,
    snapshot: Option<NaiveDate>,
    pending: Mutex<HashMap<(TransformDirection, String), SidLookup>>,
}

impl MapSidFunc {
    /// Creates a mapping that encrypts SNRs with `cipher`
    pub fn new(
        sid: Arc<dyn SidService>,
        cipher: Box<dyn PseudoFunc>,
        snapshot: Option<NaiveDate>,
    ) -> Self {
        Self {
            sid,
            cipher,
            snapshot,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn take_pending(
        &self,
        direction: TransformDirection,
        value: &str,
    ) -> std::result::Result<SidLookup, FuncError> {
        self.pending
            .lock()
            .remove(&(direction, value.to_string()))
            .ok_or_else(|| FuncError::NotInitialized {
                func: self.cipher.algorithm().to_string(),
            })
    }

    fn failure_output(lookup: &SidLookup) -> PseudoFuncOutput {
        PseudoFuncOutput {
            value: None,
            ..Default::default()
        }
        .with_metadata(METADATA_SNAPSHOT_DATE, lookup.snapshot_date.to_string())
        .with_metadata(
            METADATA_MAP_FAILURE,
            format!("No SID mapping at snapshot {}", lookup.snapshot_date),
        )
    }
}

impl PseudoFunc for MapSidFunc {
    fn algorithm(&self) -> &str {
        self.cipher.algorithm()
    }

    fn init(&self, value: &str, direction: TransformDirection) -> std::result::Result<(), FuncError> {
        let lookup = match direction {
            TransformDirection::Apply => self.sid.lookup_fnr(value, self.snapshot)?,
            TransformDirection::Restore => match self.cipher.restore(value)?.value {
                Some(snr) => self.sid.lookup_snr(&snr, self.snapshot)?,
                None => {
                    return Err(FuncError::Decrypt(
                        "SID token decrypted to nothing".to_string(),
                    ))
                }
            },
        };
        self.pending
            .lock()
            .insert((direction, value.to_string()), lookup);
        Ok(())
    }

    fn apply(&self, value: &str) -> std::result::Result<PseudoFuncOutput, FuncError> {
        let lookup = self.take_pending(TransformDirection::Apply, value)?;
        let Some(snr) = lookup.value.as_deref() else {
            return Ok(Self::failure_output(&lookup));
        };
        let mut out = self.cipher.apply(snr)?;
        out.metadata.insert(
            METADATA_SNAPSHOT_DATE.to_string(),
            lookup.snapshot_date.to_string(),
        );
        Ok(out)
    }

    fn restore(&self, value: &str) -> std::result::Result<PseudoFuncOutput, FuncError> {
        let lookup = self.take_pending(TransformDirection::Restore, value)?;
        match lookup.value {
            Some(ref fnr) => Ok(PseudoFuncOutput::of(fnr.clone())
                .with_metadata(METADATA_SNAPSHOT_DATE, lookup.snapshot_date.to_string())),
            None => Ok(Self::failure_output(&lookup)),
        }
    }

    fn is_stateful(&self) -> bool {
        true
    }
}
