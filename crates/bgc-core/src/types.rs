//! Row types for the BGC annotation schema.
//!
//! Each table has a row type, as read back from the database, and a `New*`
//! type carrying the columns of an insert. Identifiers are assigned by the
//! store. Nullable columns are `Option`s; NOT NULL columns are not.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BgcError, Result};

/// Identifier of a `gbk` row.
pub type GbkId = i64;
/// Identifier of a `bgc_region` row.
pub type RegionId = i64;
/// Identifier of a `bgc_region_type` row.
pub type RegionTypeId = i64;
/// Identifier of a `cds` row.
pub type CdsId = i64;
/// Identifier of an `hsp` row, shared with its `hsp_alignment` row.
pub type HspId = i64;
/// Identifier of an `hmm` row.
pub type HmmId = i64;
/// Identifier of an `hmm_db` row.
pub type HmmDbId = i64;

/// Strand of a coding sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// Stored value: `1` or `-1`.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
        }
    }
}

impl From<Strand> for i64 {
    fn from(strand: Strand) -> Self {
        strand.as_i64()
    }
}

impl TryFrom<i64> for Strand {
    type Error = BgcError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(Self::Forward),
            -1 => Ok(Self::Reverse),
            other => Err(BgcError::invalid_data(format!(
                "strand must be 1 or -1, found {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "+"),
            Self::Reverse => write!(f, "-"),
        }
    }
}

/// A source sequence record (`gbk`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomicRecord {
    pub id: GbkId,

    /// Record name.
    pub name: Option<String>,

    /// Annotation tool version the record was produced with.
    pub as_version: Option<String>,

    /// Nucleotide sequence.
    pub nt_seq: Option<String>,

    /// Path of the source file.
    pub path: String,
}

/// Columns of a new `gbk` row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewGenomicRecord {
    pub name: Option<String>,
    pub as_version: Option<String>,
    pub nt_seq: Option<String>,
    pub path: String,
}

impl NewGenomicRecord {
    /// Create a record for the given source path.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }
}

/// A predicted BGC region (`bgc_region`).
///
/// Regions form a tree through `parent_id`. A region without a parent is a
/// root; region numbers are unique among the children of one parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub parent_id: Option<RegionId>,
    pub region_number: i64,
    pub gbk_id: GbkId,

    /// Whether the region touches the edge of its contig.
    pub contig_edge: Option<bool>,

    pub nt_start: Option<i64>,
    pub nt_stop: Option<i64>,
}

/// Columns of a new `bgc_region` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRegion {
    pub parent_id: Option<RegionId>,
    pub region_number: i64,
    pub gbk_id: GbkId,
    pub contig_edge: Option<bool>,
    pub nt_start: Option<i64>,
    pub nt_stop: Option<i64>,
}

impl NewRegion {
    /// Create a root region of a record.
    pub fn new(gbk_id: GbkId, region_number: i64) -> Self {
        Self {
            parent_id: None,
            region_number,
            gbk_id,
            contig_edge: None,
            nt_start: None,
            nt_stop: None,
        }
    }

    /// Nest this region under `parent_id`.
    pub fn with_parent(mut self, parent_id: RegionId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the nucleotide coordinates.
    pub fn with_location(mut self, nt_start: i64, nt_stop: i64) -> Self {
        self.nt_start = Some(nt_start);
        self.nt_stop = Some(nt_stop);
        self
    }
}

/// A classification label on a region (`bgc_region_type`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionType {
    pub id: RegionTypeId,
    pub region_id: RegionId,
    #[serde(rename = "type")]
    pub region_type: String,
}

/// Columns of a new `bgc_region_type` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRegionType {
    pub region_id: RegionId,
    #[serde(rename = "type")]
    pub region_type: String,
}

impl NewRegionType {
    pub fn new(region_id: RegionId, region_type: &str) -> Self {
        Self {
            region_id,
            region_type: region_type.to_string(),
        }
    }
}

/// A predicted protein-coding gene (`cds`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingSequence {
    pub id: CdsId,
    pub region_id: RegionId,
    pub nt_start: i64,
    pub nt_stop: i64,
    pub strand: Strand,
    pub locus_tag: String,
    pub protein_id: Option<String>,
    pub product: Option<String>,

    /// Translated amino-acid sequence.
    pub aa_seq: String,
}

/// Columns of a new `cds` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCodingSequence {
    pub region_id: RegionId,
    pub nt_start: i64,
    pub nt_stop: i64,
    pub strand: Strand,
    pub locus_tag: String,
    pub protein_id: Option<String>,
    pub product: Option<String>,
    pub aa_seq: String,
}

impl NewCodingSequence {
    /// Create a coding sequence without protein id or product.
    pub fn new(
        region_id: RegionId,
        nt_start: i64,
        nt_stop: i64,
        strand: Strand,
        locus_tag: &str,
        aa_seq: &str,
    ) -> Self {
        Self {
            region_id,
            nt_start,
            nt_stop,
            strand,
            locus_tag: locus_tag.to_string(),
            protein_id: None,
            product: None,
            aa_seq: aa_seq.to_string(),
        }
    }
}

/// A file holding a collection of HMM profiles (`hmm_db`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmmDatabase {
    pub id: HmmDbId,
    pub path: String,

    /// Hex MD5 digest of the file contents.
    pub md5: String,
}

/// Columns of a new `hmm_db` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHmmDatabase {
    pub path: String,
    pub md5: String,
}

impl NewHmmDatabase {
    pub fn new(path: &str, md5: &str) -> Self {
        Self {
            path: path.to_string(),
            md5: md5.to_string(),
        }
    }

    /// Describe the HMM file at `path`, digesting its contents.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let name = path.to_str().ok_or_else(|| {
            BgcError::invalid_data(format!("HMM path is not valid UTF-8: {:?}", path))
        })?;
        let md5 = crate::checksum::file_md5(path)?;
        Ok(Self {
            path: name.to_string(),
            md5,
        })
    }
}

/// A single HMM profile (`hmm`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmmModel {
    pub id: HmmId,
    pub accession: String,
    pub name: String,
    pub db_id: HmmDbId,
    pub model_length: i64,
}

/// Columns of a new `hmm` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHmmModel {
    pub accession: String,
    pub name: String,
    pub db_id: HmmDbId,
    pub model_length: i64,
}

impl NewHmmModel {
    pub fn new(db_id: HmmDbId, accession: &str, name: &str, model_length: i64) -> Self {
        Self {
            accession: accession.to_string(),
            name: name.to_string(),
            db_id,
            model_length,
        }
    }
}

/// Alignment coordinates of an HSP (`hsp_alignment`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HspAlignment {
    pub hsp_id: HspId,
    pub model_start: i64,
    pub model_stop: i64,
    pub model_gaps: String,
    pub cds_start: i64,
    pub cds_stop: i64,
    pub cds_gaps: String,
}

/// Columns of a new `hsp_alignment` row. The HSP id is filled in by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHspAlignment {
    pub model_start: i64,
    pub model_stop: i64,
    pub model_gaps: String,
    pub cds_start: i64,
    pub cds_stop: i64,
    pub cds_gaps: String,
}

/// A hit of an HMM model on a coding sequence (`hsp` with its `hsp_alignment`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hsp {
    pub id: HspId,
    pub cds_id: CdsId,
    pub hmm_id: HmmId,
    pub bitscore: f64,
    pub alignment: HspAlignment,
}

/// A new HSP. Its alignment is written in the same transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHsp {
    pub cds_id: CdsId,
    pub hmm_id: HmmId,
    pub bitscore: f64,
    pub alignment: NewHspAlignment,
}

/// Row counts per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub gbk: u64,
    pub bgc_region: u64,
    pub bgc_region_type: u64,
    pub cds: u64,
    pub hsp: u64,
    pub hsp_alignment: u64,
    pub hmm: u64,
    pub hmm_db: u64,

    /// Database size in bytes.
    pub storage_bytes: u64,
}

/// How the stored records relate to a set of input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDataState {
    /// Nothing stored yet.
    NoData,
    /// Every stored record is in the input and the input has more.
    NewData,
    /// Some stored records are not in the input, and the input has nothing new.
    PartialData,
    /// The input adds records and also misses stored ones.
    MixedData,
    /// Stored records and input are the same.
    SameData,
}

impl InputDataState {
    /// Compare stored record paths with input paths.
    pub fn classify(stored: &HashSet<String>, input: &HashSet<String>) -> Self {
        if stored.is_empty() {
            return Self::NoData;
        }

        let has_new = input.difference(stored).next().is_some();
        let has_missing = stored.difference(input).next().is_some();

        match (has_new, has_missing) {
            (false, false) => Self::SameData,
            (true, false) => Self::NewData,
            (false, true) => Self::PartialData,
            (true, true) => Self::MixedData,
        }
    }
}

impl fmt::Display for InputDataState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoData => "no data",
            Self::NewData => "new data",
            Self::PartialData => "partial data",
            Self::MixedData => "mixed data",
            Self::SameData => "same data",
        };
        write!(f, "{}", s)
    }
}
