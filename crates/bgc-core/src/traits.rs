//! The storage interface external tooling writes and reads through.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    CdsId, CodingSequence, GbkId, GenomicRecord, HmmDatabase, HmmDbId, HmmId, HmmModel, Hsp,
    HspId, InputDataState, NewCodingSequence, NewGenomicRecord, NewHmmDatabase, NewHmmModel,
    NewHsp, NewRegion, NewRegionType, Region, RegionId, RegionType, RegionTypeId, TableCounts,
};

/// Storage layer trait.
///
/// Inserts return the assigned identifier. A write that violates a schema
/// constraint fails with [`crate::BgcError::Constraint`] and leaves the store
/// unchanged.
#[async_trait]
pub trait Store: Send + Sync {
    // Genomic records
    async fn insert_gbk(&self, gbk: NewGenomicRecord) -> Result<GbkId>;
    async fn get_gbk(&self, id: GbkId) -> Result<Option<GenomicRecord>>;
    async fn list_gbks(&self) -> Result<Vec<GenomicRecord>>;
    async fn delete_gbk(&self, id: GbkId) -> Result<()>;

    // Regions
    async fn insert_region(&self, region: NewRegion) -> Result<RegionId>;
    async fn get_region(&self, id: RegionId) -> Result<Option<Region>>;
    async fn regions_for_gbk(&self, gbk_id: GbkId) -> Result<Vec<Region>>;
    async fn child_regions(&self, parent_id: RegionId) -> Result<Vec<Region>>;

    /// The region itself followed by all of its descendants, at any depth.
    async fn region_subtree(&self, id: RegionId) -> Result<Vec<Region>>;
    async fn delete_region(&self, id: RegionId) -> Result<()>;

    // Region types
    async fn insert_region_type(&self, region_type: NewRegionType) -> Result<RegionTypeId>;
    async fn region_types(&self, region_id: RegionId) -> Result<Vec<RegionType>>;

    // Coding sequences
    async fn insert_cds(&self, cds: NewCodingSequence) -> Result<CdsId>;
    async fn get_cds(&self, id: CdsId) -> Result<Option<CodingSequence>>;
    async fn cds_for_region(&self, region_id: RegionId) -> Result<Vec<CodingSequence>>;

    // HMM databases and models
    async fn insert_hmm_db(&self, hmm_db: NewHmmDatabase) -> Result<HmmDbId>;
    async fn get_hmm_db(&self, id: HmmDbId) -> Result<Option<HmmDatabase>>;
    async fn get_hmm_db_by_path(&self, path: &str) -> Result<Option<HmmDatabase>>;
    async fn delete_hmm_db(&self, id: HmmDbId) -> Result<()>;
    async fn insert_hmm(&self, hmm: NewHmmModel) -> Result<HmmId>;
    async fn get_hmm(&self, id: HmmId) -> Result<Option<HmmModel>>;

    // HSPs
    /// Insert an HSP together with its alignment, atomically.
    async fn insert_hsp(&self, hsp: NewHsp) -> Result<HspId>;
    async fn get_hsp(&self, id: HspId) -> Result<Option<Hsp>>;
    async fn hsps_for_cds(&self, cds_id: CdsId) -> Result<Vec<Hsp>>;

    // Stats
    async fn table_counts(&self) -> Result<TableCounts>;

    /// Compare the stored record paths with a set of input paths.
    async fn input_state(&self, input_paths: &HashSet<String>) -> Result<InputDataState>;
}
