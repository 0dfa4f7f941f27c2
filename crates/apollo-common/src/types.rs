//! Document-store entities written by the loader
//!
//! The entity shapes follow the collections consumed by Apollo: `files`,
//! `assemblies`, `refseqs`, `refseqchunks`, `changes` and `counters`.
//! Field names serialize in camelCase so JSON payloads line up with the
//! documents Apollo itself writes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LoaderError;

/// MIME type recorded for every ingested FASTA source file.
pub const FASTA_CONTENT_TYPE: &str = "text/x-fasta";

/// Change type emitted for each ingested file.
pub const ADD_ASSEMBLY_FROM_FILE_CHANGE: &str = "AddAssemblyFromFileChange";

/// Name of the global counter that sequences change records.
pub const CHANGE_COUNTER_ID: &str = "changeCounter";

/// Prefix of the `user` tag stamped on every entity of one ingestion.
pub const USER_TAG_PREFIX: &str = "apollo-loader-";

/// Initial lifecycle marker; later transitions belong to downstream consumers.
pub const INITIAL_STATUS: i32 = 0;

/// Build the `user` tag for a counter value.
pub fn user_tag(sequence: i64) -> String {
    format!("{}{}", USER_TAG_PREFIX, sequence)
}

/// Input file formats accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Fasta,
}

impl std::str::FromStr for FileType {
    type Err = LoaderError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fasta" => Ok(FileType::Fasta),
            _ => Err(LoaderError::UnsupportedFileType(s.to_string())),
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Fasta => write!(f, "fasta"),
        }
    }
}

/// Checksum algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl std::str::FromStr for ChecksumAlgorithm {
    type Err = LoaderError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(ChecksumAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(ChecksumAlgorithm::Sha512),
            _ => Err(LoaderError::InvalidChecksumAlgorithm(s.to_string())),
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumAlgorithm::Sha256 => write!(f, "sha256"),
            ChecksumAlgorithm::Sha512 => write!(f, "sha512"),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A source file that has been compressed and registered.
///
/// `(basename, checksum)` is the identity; a second registration of the same
/// pair is what makes re-ingestion a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub id: Uuid,
    pub basename: String,
    pub checksum: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

impl SourceFile {
    pub fn fasta(basename: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            basename: basename.into(),
            checksum: checksum.into(),
            content_type: FASTA_CONTENT_TYPE.to_string(),
        }
    }
}

/// A named collection of reference sequences; one per ingested file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assembly {
    pub id: Uuid,
    pub name: String,
    pub user: String,
    pub status: i32,
}

impl Assembly {
    pub fn new(name: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            user: user.into(),
            status: INITIAL_STATUS,
        }
    }
}

/// One FASTA record within an assembly.
///
/// `length` stays 0 until every chunk of the record has been written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSequence {
    pub id: Uuid,
    #[serde(rename = "assembly")]
    pub assembly_id: Uuid,
    pub name: String,
    pub description: String,
    pub length: i64,
    pub chunk_size: i64,
    pub user: String,
    pub status: i32,
}

impl ReferenceSequence {
    pub fn new(
        assembly_id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
        chunk_size: i64,
        user: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            assembly_id,
            name: name.into(),
            description: description.into(),
            length: 0,
            chunk_size,
            user: user.into(),
            status: INITIAL_STATUS,
        }
    }
}

/// A fixed-size slice of a reference sequence's residues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SequenceChunk {
    pub id: Uuid,
    #[serde(rename = "refSeq")]
    pub refseq_id: Uuid,
    #[serde(rename = "n")]
    pub index: i64,
    pub sequence: String,
    pub user: String,
    pub status: i32,
}

impl SequenceChunk {
    pub fn new(refseq_id: Uuid, index: i64, sequence: String, user: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            refseq_id,
            index,
            sequence,
            user: user.into(),
            status: INITIAL_STATUS,
        }
    }
}

/// Single change carried inside a [`ChangeRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub type_name: String,
    pub assembly: Uuid,
    pub assembly_name: String,
    pub file_id: Uuid,
}

/// Audit entry for one ingestion, ordered by a global `sequence`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub id: Uuid,
    pub type_name: String,
    #[serde(rename = "assembly")]
    pub assembly_id: Uuid,
    pub changes: Vec<ChangeEntry>,
    pub user: String,
    pub sequence: i64,
}

impl ChangeRecord {
    /// Change record for an assembly created from `file`.
    pub fn add_assembly_from_file(assembly: &Assembly, file: &SourceFile, sequence: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            type_name: ADD_ASSEMBLY_FROM_FILE_CHANGE.to_string(),
            assembly_id: assembly.id,
            changes: vec![ChangeEntry {
                type_name: ADD_ASSEMBLY_FROM_FILE_CHANGE.to_string(),
                assembly: assembly.id,
                assembly_name: assembly.name.clone(),
                file_id: file.id,
            }],
            user: user_tag(sequence),
            sequence,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_str() {
        assert_eq!("fasta".parse::<FileType>().unwrap(), FileType::Fasta);
        assert_eq!("FASTA".parse::<FileType>().unwrap(), FileType::Fasta);

        let err = "gff".parse::<FileType>().unwrap_err();
        assert!(matches!(err, LoaderError::UnsupportedFileType(ref t) if t == "gff"));
    }

    #[test]
    fn test_checksum_algorithm_from_str() {
        assert_eq!("sha256".parse::<ChecksumAlgorithm>().unwrap(), ChecksumAlgorithm::Sha256);
        assert_eq!("SHA-512".parse::<ChecksumAlgorithm>().unwrap(), ChecksumAlgorithm::Sha512);
        assert!("md5".parse::<ChecksumAlgorithm>().is_err());
    }

    #[test]
    fn test_change_record_references_assembly_and_file() {
        let file = SourceFile::fasta("toy.fa", "abc");
        let assembly = Assembly::new("toy", user_tag(7));
        let change = ChangeRecord::add_assembly_from_file(&assembly, &file, 7);

        assert_eq!(change.user, "apollo-loader-7");
        assert_eq!(change.sequence, 7);
        assert_eq!(change.assembly_id, assembly.id);
        assert_eq!(change.changes.len(), 1);
        assert_eq!(change.changes[0].assembly_name, "toy");
        assert_eq!(change.changes[0].file_id, file.id);
    }

    #[test]
    fn test_entity_json_uses_camel_case() {
        let refseq = ReferenceSequence::new(Uuid::nil(), "chr1", "", 4, "apollo-loader-1");
        let json = serde_json::to_value(&refseq).unwrap();
        assert_eq!(json["chunkSize"], 4);
        assert_eq!(json["assembly"], Uuid::nil().to_string());

        let file = SourceFile::fasta("toy.fa", "abc");
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["type"], FASTA_CONTENT_TYPE);
    }
}
