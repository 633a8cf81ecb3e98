//! SQLite-based storage implementation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, DatabaseName, ErrorCode, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use bgc_core::{
    BgcError, CdsId, CodingSequence, ConstraintKind, DatabaseConfig, DeletePolicy, GbkId,
    GenomicRecord, HmmDatabase, HmmDbId, HmmId, HmmModel, Hsp, HspAlignment, HspId,
    InputDataState, NewCodingSequence, NewGenomicRecord, NewHmmDatabase, NewHmmModel, NewHsp,
    NewRegion, NewRegionType, Region, RegionId, RegionType, RegionTypeId, Result, Store, Strand,
    TableCounts,
};

use crate::schema::{SCHEMA, SCHEMA_VERSION, TABLES};

const REGION_COLUMNS: &str =
    "id, parent_id, region_number, gbk_id, contig_edge, nt_start, nt_stop";

const REGION_COLUMNS_R: &str =
    "r.id, r.parent_id, r.region_number, r.gbk_id, r.contig_edge, r.nt_start, r.nt_stop";

/// Descendants of region `?1` with their depth below it. Depth is capped at
/// the table size so a parent cycle written through raw SQL still terminates.
const SUBTREE_WALK: &str = r#"
    WITH RECURSIVE walk(id, depth) AS (
        SELECT id, 0 FROM bgc_region WHERE id = ?1
        UNION
        SELECT r.id, w.depth + 1 FROM bgc_region r JOIN walk w ON r.parent_id = w.id
        WHERE w.depth < (SELECT COUNT(*) FROM bgc_region)
    )"#;

const CDS_COLUMNS: &str =
    "id, region_id, nt_start, nt_stop, strand, locus_tag, protein_id, product, aa_seq";

const HSP_SELECT: &str = r#"
    SELECT h.id, h.cds_id, h.hmm_id, h.bitscore,
           a.model_start, a.model_stop, a.model_gaps,
           a.cds_start, a.cds_stop, a.cds_gaps
    FROM hsp h
    LEFT JOIN hsp_alignment a ON a.hsp_id = h.id
"#;

/// SQLite-based store implementation.
///
/// A single connection guarded by a blocking Mutex. Foreign keys are enforced
/// on every connection the store opens.
pub struct SqliteStore {
    /// Connection wrapped in blocking Mutex.
    conn: Arc<Mutex<Connection>>,

    /// What deleting a row with dependents does.
    delete_policy: DeletePolicy,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>, config: &DatabaseConfig) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| sqlite_error("Failed to open database", e))?;

        Self::configure_connection(&conn, config, config.wal_mode)?;
        let store = Self::init(conn, config)?;

        info!("Database opened at {:?}", path);
        Ok(store)
    }

    /// Open an in-memory database.
    pub fn open_memory(config: &DatabaseConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| sqlite_error("Failed to open in-memory database", e))?;

        Self::configure_connection(&conn, config, false)?;
        let store = Self::init(conn, config)?;

        info!("In-memory database opened");
        Ok(store)
    }

    /// Create the schema, or check the version of an existing one.
    fn init(conn: Connection, config: &DatabaseConfig) -> Result<Self> {
        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| sqlite_error("Failed to read schema version", e))?;

        if version == 0 {
            let existing = user_tables(&conn)?;
            if !existing.is_empty() {
                return Err(BgcError::database(format!(
                    "Database has tables but no schema version: {}",
                    existing.join(", ")
                )));
            }

            conn.execute_batch(SCHEMA)
                .map_err(|e| sqlite_error("Failed to initialize schema", e))?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(|e| sqlite_error("Failed to set schema version", e))?;
        } else if version != SCHEMA_VERSION {
            return Err(BgcError::database(format!(
                "Unsupported schema version: {} (expected {})",
                version, SCHEMA_VERSION
            )));
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            delete_policy: config.delete_policy,
        })
    }

    fn configure_connection(conn: &Connection, config: &DatabaseConfig, wal: bool) -> Result<()> {
        if wal {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
                .map_err(|e| sqlite_error("Failed to enable WAL", e))?;
        }

        conn.execute_batch(&format!(
            r#"
            PRAGMA cache_size = {};
            PRAGMA busy_timeout = {};
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
            config.cache_size, config.busy_timeout_ms
        ))
        .map_err(|e| sqlite_error("Failed to configure connection", e))?;

        Ok(())
    }

    /// The delete policy this store applies.
    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    /// Names of the user tables in the database.
    pub fn table_names(&self) -> Result<Vec<String>> {
        self.with_conn(user_tables)
    }

    /// Execute raw SQL statements.
    ///
    /// Intended for short statements from external tooling. The batch runs
    /// in a single transaction: if any statement fails, none of them take
    /// effect. Constraint failures are reported the same way as for typed
    /// inserts. The batch must not contain its own `BEGIN`/`COMMIT`.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| sqlite_error("Failed to begin transaction", e))?;

            tx.execute_batch(sql)
                .map_err(|e| sqlite_error("Failed to execute query", e))?;

            tx.commit()
                .map_err(|e| sqlite_error("Failed to commit query", e))
        })
    }

    /// Copy the whole database into a file, replacing its contents.
    pub fn save_to_disk(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        self.with_conn(|conn| {
            conn.backup(DatabaseName::Main, path, None)
                .map_err(|e| sqlite_error("Failed to save database", e))
        })?;

        info!("Database saved to {:?}", path);
        Ok(())
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.conn.lock().map_err(|e| BgcError::database(e.to_string()))?;
        f(&conn)
    }

    /// Execute a mutable blocking operation on the connection.
    fn with_conn_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self.conn.lock().map_err(|e| BgcError::database(e.to_string()))?;
        f(&mut conn)
    }
}

#[async_trait]
impl Store for SqliteStore {
    // Genomic records

    async fn insert_gbk(&self, gbk: NewGenomicRecord) -> Result<GbkId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO gbk (name, as_version, nt_seq, path) VALUES (?1, ?2, ?3, ?4)",
                params![gbk.name, gbk.as_version, gbk.nt_seq, gbk.path],
            )
            .map_err(|e| sqlite_error("Failed to insert gbk", e))?;

            let id = conn.last_insert_rowid();
            debug!("Inserted gbk {}: {}", id, gbk.path);
            Ok(id)
        })
    }

    async fn get_gbk(&self, id: GbkId) -> Result<Option<GenomicRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, as_version, nt_seq, path FROM gbk WHERE id = ?1",
                params![id],
                Self::row_to_gbk,
            )
            .optional()
            .map_err(|e| sqlite_error("Failed to get gbk", e))
        })
    }

    async fn list_gbks(&self) -> Result<Vec<GenomicRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, as_version, nt_seq, path FROM gbk ORDER BY id")
                .map_err(|e| sqlite_error("Failed to list gbks", e))?;

            let records = stmt
                .query_map([], Self::row_to_gbk)
                .map_err(|e| sqlite_error("Failed to list gbks", e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| sqlite_error("Failed to list gbks", e))?;

            Ok(records)
        })
    }

    async fn delete_gbk(&self, id: GbkId) -> Result<()> {
        let policy = self.delete_policy;
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| sqlite_error("Failed to begin transaction", e))?;

            if policy == DeletePolicy::Cascade {
                delete_region_subtrees(&tx, "SELECT id FROM bgc_region WHERE gbk_id = ?1", id)?;
            }

            let deleted = tx
                .execute("DELETE FROM gbk WHERE id = ?1", params![id])
                .map_err(|e| rejected_delete("gbk", id, e))?;
            if deleted == 0 {
                return Err(BgcError::NotFound { table: "gbk", id });
            }

            tx.commit()
                .map_err(|e| sqlite_error("Failed to commit delete", e))?;

            debug!("Deleted gbk {} ({:?})", id, policy);
            Ok(())
        })
    }

    // Regions

    async fn insert_region(&self, region: NewRegion) -> Result<RegionId> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO bgc_region (parent_id, region_number, gbk_id, contig_edge,
                                        nt_start, nt_stop)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    region.parent_id,
                    region.region_number,
                    region.gbk_id,
                    region.contig_edge,
                    region.nt_start,
                    region.nt_stop,
                ],
            )
            .map_err(|e| sqlite_error("Failed to insert region", e))?;

            let id = conn.last_insert_rowid();
            debug!(
                "Inserted region {} (gbk {}, number {})",
                id, region.gbk_id, region.region_number
            );
            Ok(id)
        })
    }

    async fn get_region(&self, id: RegionId) -> Result<Option<Region>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM bgc_region WHERE id = ?1", REGION_COLUMNS),
                params![id],
                Self::row_to_region,
            )
            .optional()
            .map_err(|e| sqlite_error("Failed to get region", e))
        })
    }

    async fn regions_for_gbk(&self, gbk_id: GbkId) -> Result<Vec<Region>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM bgc_region WHERE gbk_id = ?1 ORDER BY id",
                REGION_COLUMNS
            );
            query_regions(conn, &sql, gbk_id)
        })
    }

    async fn child_regions(&self, parent_id: RegionId) -> Result<Vec<Region>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM bgc_region WHERE parent_id = ?1 ORDER BY region_number",
                REGION_COLUMNS
            );
            query_regions(conn, &sql, parent_id)
        })
    }

    async fn region_subtree(&self, id: RegionId) -> Result<Vec<Region>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} SELECT {} FROM bgc_region r \
                 JOIN (SELECT id, MIN(depth) AS depth FROM walk GROUP BY id) w ON w.id = r.id \
                 ORDER BY w.depth, r.id",
                SUBTREE_WALK,
                REGION_COLUMNS_R
            );
            query_regions(conn, &sql, id)
        })
    }

    async fn delete_region(&self, id: RegionId) -> Result<()> {
        let policy = self.delete_policy;
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| sqlite_error("Failed to begin transaction", e))?;

            let deleted = match policy {
                DeletePolicy::Cascade => {
                    delete_region_subtrees(&tx, "SELECT id FROM bgc_region WHERE id = ?1", id)?
                }
                DeletePolicy::Restrict => tx
                    .execute("DELETE FROM bgc_region WHERE id = ?1", params![id])
                    .map_err(|e| rejected_delete("bgc_region", id, e))?,
            };
            if deleted == 0 {
                return Err(BgcError::NotFound {
                    table: "bgc_region",
                    id,
                });
            }

            tx.commit()
                .map_err(|e| sqlite_error("Failed to commit delete", e))?;

            debug!("Deleted region {} ({:?})", id, policy);
            Ok(())
        })
    }

    // Region types

    async fn insert_region_type(&self, region_type: NewRegionType) -> Result<RegionTypeId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bgc_region_type (region_id, type) VALUES (?1, ?2)",
                params![region_type.region_id, region_type.region_type],
            )
            .map_err(|e| sqlite_error("Failed to insert region type", e))?;

            let id = conn.last_insert_rowid();
            debug!(
                "Inserted region type {} for region {}",
                region_type.region_type, region_type.region_id
            );
            Ok(id)
        })
    }

    async fn region_types(&self, region_id: RegionId) -> Result<Vec<RegionType>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, region_id, type FROM bgc_region_type \
                     WHERE region_id = ?1 ORDER BY id",
                )
                .map_err(|e| sqlite_error("Failed to get region types", e))?;

            let types = stmt
                .query_map(params![region_id], |row| {
                    Ok(RegionType {
                        id: row.get(0)?,
                        region_id: row.get(1)?,
                        region_type: row.get(2)?,
                    })
                })
                .map_err(|e| sqlite_error("Failed to get region types", e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| sqlite_error("Failed to get region types", e))?;

            Ok(types)
        })
    }

    // Coding sequences

    async fn insert_cds(&self, cds: NewCodingSequence) -> Result<CdsId> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO cds (region_id, nt_start, nt_stop, strand, locus_tag,
                                 protein_id, product, aa_seq)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    cds.region_id,
                    cds.nt_start,
                    cds.nt_stop,
                    cds.strand.as_i64(),
                    cds.locus_tag,
                    cds.protein_id,
                    cds.product,
                    cds.aa_seq,
                ],
            )
            .map_err(|e| sqlite_error("Failed to insert cds", e))?;

            let id = conn.last_insert_rowid();
            debug!("Inserted cds {}: {}", id, cds.locus_tag);
            Ok(id)
        })
    }

    async fn get_cds(&self, id: CdsId) -> Result<Option<CodingSequence>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM cds WHERE id = ?1", CDS_COLUMNS),
                params![id],
                Self::row_to_cds,
            )
            .optional()
            .map_err(|e| sqlite_error("Failed to get cds", e))
        })
    }

    async fn cds_for_region(&self, region_id: RegionId) -> Result<Vec<CodingSequence>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM cds WHERE region_id = ?1 ORDER BY nt_start, id",
                    CDS_COLUMNS
                ))
                .map_err(|e| sqlite_error("Failed to get cds", e))?;

            let genes = stmt
                .query_map(params![region_id], Self::row_to_cds)
                .map_err(|e| sqlite_error("Failed to get cds", e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| sqlite_error("Failed to get cds", e))?;

            Ok(genes)
        })
    }

    // HMM databases and models

    async fn insert_hmm_db(&self, hmm_db: NewHmmDatabase) -> Result<HmmDbId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO hmm_db (path, md5) VALUES (?1, ?2)",
                params![hmm_db.path, hmm_db.md5],
            )
            .map_err(|e| sqlite_error("Failed to insert hmm_db", e))?;

            let id = conn.last_insert_rowid();
            debug!("Inserted hmm_db {}: {}", id, hmm_db.path);
            Ok(id)
        })
    }

    async fn get_hmm_db(&self, id: HmmDbId) -> Result<Option<HmmDatabase>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, path, md5 FROM hmm_db WHERE id = ?1",
                params![id],
                Self::row_to_hmm_db,
            )
            .optional()
            .map_err(|e| sqlite_error("Failed to get hmm_db", e))
        })
    }

    async fn get_hmm_db_by_path(&self, path: &str) -> Result<Option<HmmDatabase>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, path, md5 FROM hmm_db WHERE path = ?1 ORDER BY id DESC LIMIT 1",
                params![path],
                Self::row_to_hmm_db,
            )
            .optional()
            .map_err(|e| sqlite_error("Failed to get hmm_db", e))
        })
    }

    async fn delete_hmm_db(&self, id: HmmDbId) -> Result<()> {
        let policy = self.delete_policy;
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| sqlite_error("Failed to begin transaction", e))?;

            if policy == DeletePolicy::Cascade {
                tx.execute(
                    r#"
                    DELETE FROM hsp_alignment WHERE hsp_id IN (
                        SELECT h.id FROM hsp h JOIN hmm m ON m.id = h.hmm_id
                        WHERE m.db_id = ?1
                    )
                    "#,
                    params![id],
                )
                .map_err(|e| sqlite_error("Failed to delete hsp alignments", e))?;
                tx.execute(
                    "DELETE FROM hsp WHERE hmm_id IN (SELECT id FROM hmm WHERE db_id = ?1)",
                    params![id],
                )
                .map_err(|e| sqlite_error("Failed to delete hsps", e))?;
                tx.execute("DELETE FROM hmm WHERE db_id = ?1", params![id])
                    .map_err(|e| sqlite_error("Failed to delete hmms", e))?;
            }

            let deleted = tx
                .execute("DELETE FROM hmm_db WHERE id = ?1", params![id])
                .map_err(|e| rejected_delete("hmm_db", id, e))?;
            if deleted == 0 {
                return Err(BgcError::NotFound { table: "hmm_db", id });
            }

            tx.commit()
                .map_err(|e| sqlite_error("Failed to commit delete", e))?;

            debug!("Deleted hmm_db {} ({:?})", id, policy);
            Ok(())
        })
    }

    async fn insert_hmm(&self, hmm: NewHmmModel) -> Result<HmmId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO hmm (accession, name, db_id, model_length) VALUES (?1, ?2, ?3, ?4)",
                params![hmm.accession, hmm.name, hmm.db_id, hmm.model_length],
            )
            .map_err(|e| sqlite_error("Failed to insert hmm", e))?;

            let id = conn.last_insert_rowid();
            debug!("Inserted hmm {}: {}", id, hmm.accession);
            Ok(id)
        })
    }

    async fn get_hmm(&self, id: HmmId) -> Result<Option<HmmModel>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, accession, name, db_id, model_length FROM hmm WHERE id = ?1",
                params![id],
                |row| {
                    Ok(HmmModel {
                        id: row.get(0)?,
                        accession: row.get(1)?,
                        name: row.get(2)?,
                        db_id: row.get(3)?,
                        model_length: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(|e| sqlite_error("Failed to get hmm", e))
        })
    }

    // HSPs

    async fn insert_hsp(&self, hsp: NewHsp) -> Result<HspId> {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| sqlite_error("Failed to begin transaction", e))?;

            tx.execute(
                "INSERT INTO hsp (cds_id, hmm_id, bitscore) VALUES (?1, ?2, ?3)",
                params![hsp.cds_id, hsp.hmm_id, hsp.bitscore],
            )
            .map_err(|e| sqlite_error("Failed to insert hsp", e))?;

            let id = tx.last_insert_rowid();
            let alignment = &hsp.alignment;

            tx.execute(
                r#"
                INSERT INTO hsp_alignment (hsp_id, model_start, model_stop, model_gaps,
                                           cds_start, cds_stop, cds_gaps)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    id,
                    alignment.model_start,
                    alignment.model_stop,
                    alignment.model_gaps,
                    alignment.cds_start,
                    alignment.cds_stop,
                    alignment.cds_gaps,
                ],
            )
            .map_err(|e| sqlite_error("Failed to insert hsp alignment", e))?;

            tx.commit()
                .map_err(|e| sqlite_error("Failed to commit hsp", e))?;

            debug!(
                "Inserted hsp {} (cds {}, hmm {}, bitscore {})",
                id, hsp.cds_id, hsp.hmm_id, hsp.bitscore
            );
            Ok(id)
        })
    }

    async fn get_hsp(&self, id: HspId) -> Result<Option<Hsp>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{} WHERE h.id = ?1", HSP_SELECT),
                params![id],
                Self::row_to_hsp,
            )
            .optional()
            .map_err(|e| sqlite_error("Failed to get hsp", e))
        })
    }

    async fn hsps_for_cds(&self, cds_id: CdsId) -> Result<Vec<Hsp>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("{} WHERE h.cds_id = ?1 ORDER BY h.id", HSP_SELECT))
                .map_err(|e| sqlite_error("Failed to get hsps", e))?;

            let hsps = stmt
                .query_map(params![cds_id], Self::row_to_hsp)
                .map_err(|e| sqlite_error("Failed to get hsps", e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| sqlite_error("Failed to get hsps", e))?;

            Ok(hsps)
        })
    }

    // Stats

    async fn table_counts(&self) -> Result<TableCounts> {
        self.with_conn(|conn| {
            let mut counts = [0u64; TABLES.len()];
            for (count, table) in counts.iter_mut().zip(TABLES) {
                *count = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })
                    .map_err(|e| sqlite_error("Failed to count rows", e))?;
            }
            let [gbk, bgc_region, bgc_region_type, cds, hmm_db, hmm, hsp, hsp_alignment] = counts;

            let page_count: u64 = conn
                .query_row("PRAGMA page_count", [], |row| row.get(0))
                .unwrap_or(0);
            let page_size: u64 = conn
                .query_row("PRAGMA page_size", [], |row| row.get(0))
                .unwrap_or(4096);

            Ok(TableCounts {
                gbk,
                bgc_region,
                bgc_region_type,
                cds,
                hsp,
                hsp_alignment,
                hmm,
                hmm_db,
                storage_bytes: page_count * page_size,
            })
        })
    }

    async fn input_state(&self, input_paths: &HashSet<String>) -> Result<InputDataState> {
        let stored = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT path FROM gbk")
                .map_err(|e| sqlite_error("Failed to read gbk paths", e))?;

            let paths = stmt
                .query_map([], |row| row.get(0))
                .map_err(|e| sqlite_error("Failed to read gbk paths", e))?
                .collect::<std::result::Result<HashSet<String>, _>>()
                .map_err(|e| sqlite_error("Failed to read gbk paths", e))?;

            Ok(paths)
        })?;

        Ok(InputDataState::classify(&stored, input_paths))
    }
}

// Helper methods
impl SqliteStore {
    fn row_to_gbk(row: &rusqlite::Row<'_>) -> rusqlite::Result<GenomicRecord> {
        Ok(GenomicRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            as_version: row.get(2)?,
            nt_seq: row.get(3)?,
            path: row.get(4)?,
        })
    }

    /// Convert a row selected with `REGION_COLUMNS` to a Region.
    fn row_to_region(row: &rusqlite::Row<'_>) -> rusqlite::Result<Region> {
        Ok(Region {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            region_number: row.get(2)?,
            gbk_id: row.get(3)?,
            contig_edge: row.get(4)?,
            nt_start: row.get(5)?,
            nt_stop: row.get(6)?,
        })
    }

    /// Convert a row selected with `CDS_COLUMNS` to a CodingSequence.
    fn row_to_cds(row: &rusqlite::Row<'_>) -> rusqlite::Result<CodingSequence> {
        let strand: i64 = row.get(4)?;
        let strand = Strand::try_from(strand)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Integer, Box::new(e)))?;

        Ok(CodingSequence {
            id: row.get(0)?,
            region_id: row.get(1)?,
            nt_start: row.get(2)?,
            nt_stop: row.get(3)?,
            strand,
            locus_tag: row.get(5)?,
            protein_id: row.get(6)?,
            product: row.get(7)?,
            aa_seq: row.get(8)?,
        })
    }

    fn row_to_hmm_db(row: &rusqlite::Row<'_>) -> rusqlite::Result<HmmDatabase> {
        Ok(HmmDatabase {
            id: row.get(0)?,
            path: row.get(1)?,
            md5: row.get(2)?,
        })
    }

    /// Convert a row selected with `HSP_SELECT` to an Hsp.
    ///
    /// An hsp row without an alignment row is a broken invariant and is
    /// reported as a conversion failure.
    fn row_to_hsp(row: &rusqlite::Row<'_>) -> rusqlite::Result<Hsp> {
        let id: HspId = row.get(0)?;
        let model_start: Option<i64> = row.get(4)?;
        let Some(model_start) = model_start else {
            let err = BgcError::invalid_data(format!("hsp {} has no alignment", id));
            return Err(rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Null,
                Box::new(err),
            ));
        };

        Ok(Hsp {
            id,
            cds_id: row.get(1)?,
            hmm_id: row.get(2)?,
            bitscore: row.get(3)?,
            alignment: HspAlignment {
                hsp_id: id,
                model_start,
                model_stop: row.get(5)?,
                model_gaps: row.get(6)?,
                cds_start: row.get(7)?,
                cds_stop: row.get(8)?,
                cds_gaps: row.get(9)?,
            },
        })
    }
}

/// Recursive CTE named `subtree` holding the ids of the regions selected by
/// `seed` and all of their descendants.
fn subtree_cte(seed: &str) -> String {
    format!(
        "WITH RECURSIVE subtree(id) AS ({} UNION \
         SELECT r.id FROM bgc_region r JOIN subtree s ON r.parent_id = s.id)",
        seed
    )
}

fn user_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .map_err(|e| sqlite_error("Failed to list tables", e))?;

    let names = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| sqlite_error("Failed to list tables", e))?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| sqlite_error("Failed to list tables", e))?;

    Ok(names)
}

fn query_regions(conn: &Connection, sql: &str, id: i64) -> Result<Vec<Region>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| sqlite_error("Failed to get regions", e))?;

    let regions = stmt
        .query_map(params![id], SqliteStore::row_to_region)
        .map_err(|e| sqlite_error("Failed to get regions", e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| sqlite_error("Failed to get regions", e))?;

    Ok(regions)
}

/// Delete the region subtrees selected by `seed` together with everything
/// that hangs off them. Returns the number of regions deleted.
fn delete_region_subtrees(conn: &Connection, seed: &str, id: i64) -> Result<usize> {
    let cte = subtree_cte(seed);
    let statements = [
        (
            "hsp alignments",
            format!(
                "{} DELETE FROM hsp_alignment WHERE hsp_id IN (\
                 SELECT h.id FROM hsp h JOIN cds c ON c.id = h.cds_id \
                 WHERE c.region_id IN (SELECT id FROM subtree))",
                cte
            ),
        ),
        (
            "hsps",
            format!(
                "{} DELETE FROM hsp WHERE cds_id IN (\
                 SELECT id FROM cds WHERE region_id IN (SELECT id FROM subtree))",
                cte
            ),
        ),
        (
            "cds",
            format!(
                "{} DELETE FROM cds WHERE region_id IN (SELECT id FROM subtree)",
                cte
            ),
        ),
        (
            "region types",
            format!(
                "{} DELETE FROM bgc_region_type WHERE region_id IN (SELECT id FROM subtree)",
                cte
            ),
        ),
    ];

    for (what, sql) in &statements {
        let deleted = conn
            .execute(sql, params![id])
            .map_err(|e| sqlite_error(&format!("Failed to delete {}", what), e))?;
        debug!("Cascade deleted {} {}", deleted, what);
    }

    let regions = conn
        .execute(
            &format!(
                "{} DELETE FROM bgc_region WHERE id IN (SELECT id FROM subtree)",
                cte
            ),
            params![id],
        )
        .map_err(|e| sqlite_error("Failed to delete regions", e))?;
    debug!("Cascade deleted {} regions", regions);

    Ok(regions)
}

/// Map the error of a restricted delete, logging rejections.
fn rejected_delete(table: &str, id: i64, e: rusqlite::Error) -> BgcError {
    let err = sqlite_error(&format!("Failed to delete {} {}", table, id), e);
    if err.constraint_kind() == Some(ConstraintKind::ForeignKey) {
        warn!("Delete of {} {} rejected: dependent rows exist", table, id);
    }
    err
}

/// Convert a SQLite error, classifying constraint violations.
fn sqlite_error(context: &str, e: rusqlite::Error) -> BgcError {
    match &e {
        rusqlite::Error::SqliteFailure(err, message) if err.code == ErrorCode::ConstraintViolation => {
            let kind = match err.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Some(ConstraintKind::Unique)
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(ConstraintKind::ForeignKey),
                ffi::SQLITE_CONSTRAINT_NOTNULL => Some(ConstraintKind::NotNull),
                _ => None,
            };
            let detail = message.clone().unwrap_or_else(|| e.to_string());
            match kind {
                Some(kind) => BgcError::constraint(kind, format!("{}: {}", context, detail)),
                None => BgcError::database(format!("{}: {}", context, detail)),
            }
        }
        rusqlite::Error::FromSqlConversionFailure(_, _, cause) => {
            BgcError::invalid_data(format!("{}: {}", context, cause))
        }
        _ => BgcError::database(format!("{}: {}", context, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgc_core::NewHspAlignment;

    fn memory_store(policy: DeletePolicy) -> SqliteStore {
        let config = DatabaseConfig {
            delete_policy: policy,
            ..DatabaseConfig::default()
        };
        SqliteStore::open_memory(&config).unwrap()
    }

    fn alignment() -> NewHspAlignment {
        NewHspAlignment {
            model_start: 1,
            model_stop: 100,
            model_gaps: "".to_string(),
            cds_start: 5,
            cds_stop: 104,
            cds_gaps: "12,40".to_string(),
        }
    }

    struct Fixture {
        db_id: HmmDbId,
        hmm_id: HmmId,
        gbk_id: GbkId,
        region_id: RegionId,
        cds_id: CdsId,
        hsp_id: HspId,
    }

    async fn populate(store: &SqliteStore) -> Fixture {
        let db_id = store
            .insert_hmm_db(NewHmmDatabase::new("/db/pfam.hmm", "abc123"))
            .await
            .unwrap();
        let hmm_id = store
            .insert_hmm(NewHmmModel::new(db_id, "PF00001", "test", 100))
            .await
            .unwrap();

        let gbk = NewGenomicRecord {
            name: Some("record".to_string()),
            as_version: Some("7.0".to_string()),
            nt_seq: Some("ATGAAATAG".to_string()),
            path: "/data/record.gbk".to_string(),
        };
        let gbk_id = store.insert_gbk(gbk).await.unwrap();
        let region_id = store
            .insert_region(NewRegion::new(gbk_id, 1).with_location(0, 9000))
            .await
            .unwrap();

        let mut cds = NewCodingSequence::new(region_id, 100, 400, Strand::Forward, "ctg1_1", "MKV");
        cds.protein_id = Some("WP_000001.1".to_string());
        cds.product = Some("polyketide synthase".to_string());
        let cds_id = store.insert_cds(cds).await.unwrap();

        let hsp_id = store
            .insert_hsp(NewHsp {
                cds_id,
                hmm_id,
                bitscore: 150.5,
                alignment: alignment(),
            })
            .await
            .unwrap();

        Fixture {
            db_id,
            hmm_id,
            gbk_id,
            region_id,
            cds_id,
            hsp_id,
        }
    }

    fn assert_constraint<T: std::fmt::Debug>(result: Result<T>, kind: ConstraintKind) {
        let err = result.unwrap_err();
        assert_eq!(err.constraint_kind(), Some(kind), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_open_memory() {
        let store = memory_store(DeletePolicy::Restrict);
        assert!(store.list_gbks().await.unwrap().is_empty());

        let tables = store.table_names().unwrap();
        for table in TABLES {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;

        let hmm_db = store.get_hmm_db(f.db_id).await.unwrap().unwrap();
        assert_eq!(hmm_db.path, "/db/pfam.hmm");
        assert_eq!(hmm_db.md5, "abc123");

        let hmm = store.get_hmm(f.hmm_id).await.unwrap().unwrap();
        assert_eq!(hmm.accession, "PF00001");
        assert_eq!(hmm.name, "test");
        assert_eq!(hmm.model_length, 100);
        assert_eq!(hmm.db_id, hmm_db.id);

        let gbk = store.get_gbk(f.gbk_id).await.unwrap().unwrap();
        assert_eq!(gbk.path, "/data/record.gbk");
        assert_eq!(gbk.as_version.as_deref(), Some("7.0"));

        let region = store.get_region(f.region_id).await.unwrap().unwrap();
        assert_eq!(region.gbk_id, gbk.id);
        assert_eq!(region.region_number, 1);
        assert_eq!(region.parent_id, None);

        let cds = store.get_cds(f.cds_id).await.unwrap().unwrap();
        assert_eq!(cds.region_id, region.id);
        assert_eq!(cds.strand, Strand::Forward);
        assert_eq!(cds.protein_id.as_deref(), Some("WP_000001.1"));

        let hsp = store.get_hsp(f.hsp_id).await.unwrap().unwrap();
        assert_eq!(hsp.cds_id, cds.id);
        assert_eq!(hsp.hmm_id, hmm.id);
        assert_eq!(hsp.bitscore, 150.5);
        assert_eq!(hsp.alignment.hsp_id, hsp.id);
        assert_eq!(hsp.alignment.cds_gaps, "12,40");

        let counts = store.table_counts().await.unwrap();
        assert_eq!(counts.hsp, 1);
        assert_eq!(counts.hsp_alignment, 1);
        assert_eq!(counts.gbk, 1);
    }

    #[tokio::test]
    async fn test_duplicate_region_number() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;

        store
            .insert_region(NewRegion::new(f.gbk_id, 1).with_parent(f.region_id))
            .await
            .unwrap();
        let duplicate = store
            .insert_region(NewRegion::new(f.gbk_id, 1).with_parent(f.region_id))
            .await;
        assert_constraint(duplicate, ConstraintKind::Unique);

        // Same number under another parent is fine.
        let other = store.insert_region(NewRegion::new(f.gbk_id, 2)).await.unwrap();
        store
            .insert_region(NewRegion::new(f.gbk_id, 1).with_parent(other))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_root_regions_numbered_per_record() {
        let store = memory_store(DeletePolicy::Restrict);
        let first = store.insert_gbk(NewGenomicRecord::new("a.gbk")).await.unwrap();
        let second = store.insert_gbk(NewGenomicRecord::new("b.gbk")).await.unwrap();

        store.insert_region(NewRegion::new(first, 1)).await.unwrap();
        store.insert_region(NewRegion::new(second, 1)).await.unwrap();

        assert_eq!(store.regions_for_gbk(first).await.unwrap().len(), 1);
        assert_eq!(store.regions_for_gbk(second).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_region_requires_gbk() {
        let store = memory_store(DeletePolicy::Restrict);
        let missing_gbk = store.insert_region(NewRegion::new(42, 1)).await;
        assert_constraint(missing_gbk, ConstraintKind::ForeignKey);

        let gbk_id = store.insert_gbk(NewGenomicRecord::new("a.gbk")).await.unwrap();
        let missing_parent = store
            .insert_region(NewRegion::new(gbk_id, 1).with_parent(42))
            .await;
        assert_constraint(missing_parent, ConstraintKind::ForeignKey);
    }

    #[tokio::test]
    async fn test_cds_requires_region() {
        let store = memory_store(DeletePolicy::Restrict);
        let result = store
            .insert_cds(NewCodingSequence::new(99, 1, 30, Strand::Reverse, "tag", "M"))
            .await;
        assert_constraint(result, ConstraintKind::ForeignKey);
        assert_eq!(store.table_counts().await.unwrap().cds, 0);
    }

    #[tokio::test]
    async fn test_cds_missing_required_fields() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;

        let null_locus_tag = store.execute_raw(&format!(
            "INSERT INTO cds (region_id, nt_start, nt_stop, strand, locus_tag, aa_seq) \
             VALUES ({}, 1, 30, 1, NULL, 'M')",
            f.region_id
        ));
        assert_constraint(null_locus_tag, ConstraintKind::NotNull);

        let null_aa_seq = store.execute_raw(&format!(
            "INSERT INTO cds (region_id, nt_start, nt_stop, strand, locus_tag) \
             VALUES ({}, 1, 30, 1, 'tag')",
            f.region_id
        ));
        assert_constraint(null_aa_seq, ConstraintKind::NotNull);

        assert_eq!(store.cds_for_region(f.region_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_region_types() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;
        let other = store.insert_region(NewRegion::new(f.gbk_id, 2)).await.unwrap();

        store
            .insert_region_type(NewRegionType::new(f.region_id, "NRPS"))
            .await
            .unwrap();
        let duplicate = store
            .insert_region_type(NewRegionType::new(f.region_id, "NRPS"))
            .await;
        assert_constraint(duplicate, ConstraintKind::Unique);

        store
            .insert_region_type(NewRegionType::new(other, "NRPS"))
            .await
            .unwrap();
        store
            .insert_region_type(NewRegionType::new(f.region_id, "T1PKS"))
            .await
            .unwrap();

        let types = store.region_types(f.region_id).await.unwrap();
        let labels: Vec<_> = types.iter().map(|t| t.region_type.as_str()).collect();
        assert_eq!(labels, vec!["NRPS", "T1PKS"]);

        let missing_region = store.insert_region_type(NewRegionType::new(999, "NRPS")).await;
        assert_constraint(missing_region, ConstraintKind::ForeignKey);
    }

    #[tokio::test]
    async fn test_hsp_insert_is_atomic() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;

        let result = store
            .insert_hsp(NewHsp {
                cds_id: f.cds_id,
                hmm_id: 12345,
                bitscore: 10.0,
                alignment: alignment(),
            })
            .await;
        assert_constraint(result, ConstraintKind::ForeignKey);

        let counts = store.table_counts().await.unwrap();
        assert_eq!(counts.hsp, 1);
        assert_eq!(counts.hsp_alignment, 1);
    }

    #[tokio::test]
    async fn test_alignment_requires_hsp() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;

        let orphan = store.execute_raw(
            "INSERT INTO hsp_alignment (hsp_id, model_start, model_stop, model_gaps, \
             cds_start, cds_stop, cds_gaps) VALUES (999, 1, 2, '', 1, 2, '')",
        );
        assert_constraint(orphan, ConstraintKind::ForeignKey);

        let null_id = store.execute_raw(
            "INSERT INTO hsp_alignment (hsp_id, model_start, model_stop, model_gaps, \
             cds_start, cds_stop, cds_gaps) VALUES (NULL, 1, 2, '', 1, 2, '')",
        );
        assert_constraint(null_id, ConstraintKind::NotNull);

        let second = store.execute_raw(&format!(
            "INSERT INTO hsp_alignment (hsp_id, model_start, model_stop, model_gaps, \
             cds_start, cds_stop, cds_gaps) VALUES ({}, 1, 2, '', 1, 2, '')",
            f.hsp_id
        ));
        assert_constraint(second, ConstraintKind::Unique);
    }

    #[tokio::test]
    async fn test_raw_batch_is_atomic() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;
        let before = store.table_counts().await.unwrap();

        let result = store.execute_raw(&format!(
            "INSERT INTO hsp (cds_id, hmm_id, bitscore) VALUES ({cds}, {hmm}, 9.0); \
             INSERT INTO hsp_alignment (hsp_id, model_start, model_stop, model_gaps, \
             cds_start, cds_stop, cds_gaps) \
             VALUES (last_insert_rowid(), 1, 2, NULL, 1, 2, '')",
            cds = f.cds_id,
            hmm = f.hmm_id
        ));
        assert_constraint(result, ConstraintKind::NotNull);

        assert_eq!(store.table_counts().await.unwrap(), before);
        assert_eq!(store.hsps_for_cds(f.cds_id).await.unwrap().len(), 1);

        // The connection is usable again after the rollback.
        store
            .execute_raw(&format!(
                "INSERT INTO bgc_region_type (region_id, type) VALUES ({}, 'NRPS')",
                f.region_id
            ))
            .unwrap();
        assert_eq!(store.table_counts().await.unwrap().bgc_region_type, 1);
    }

    #[tokio::test]
    async fn test_hsp_without_alignment_is_invalid() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;

        store
            .execute_raw(&format!(
                "INSERT INTO hsp (cds_id, hmm_id, bitscore) VALUES ({}, {}, 1.0)",
                f.cds_id, f.hmm_id
            ))
            .unwrap();

        let err = store.hsps_for_cds(f.cds_id).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");
    }

    #[tokio::test]
    async fn test_invalid_strand() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;

        store
            .execute_raw(&format!(
                "INSERT INTO cds (region_id, nt_start, nt_stop, strand, locus_tag, aa_seq) \
                 VALUES ({}, 1, 30, 0, 'tag', 'M')",
                f.region_id
            ))
            .unwrap();

        let err = store.cds_for_region(f.region_id).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");
    }

    #[tokio::test]
    async fn test_hsps_for_cds() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;

        store
            .insert_hsp(NewHsp {
                cds_id: f.cds_id,
                hmm_id: f.hmm_id,
                bitscore: 42.0,
                alignment: alignment(),
            })
            .await
            .unwrap();

        let hsps = store.hsps_for_cds(f.cds_id).await.unwrap();
        assert_eq!(hsps.len(), 2);
        assert_eq!(hsps[0].id, f.hsp_id);
        assert!(hsps.iter().all(|h| h.alignment.hsp_id == h.id));
    }

    #[tokio::test]
    async fn test_ids_are_not_reused() {
        let store = memory_store(DeletePolicy::Restrict);
        let first = store.insert_gbk(NewGenomicRecord::new("a.gbk")).await.unwrap();
        let second = store.insert_gbk(NewGenomicRecord::new("b.gbk")).await.unwrap();
        assert!(second > first);

        store.delete_gbk(second).await.unwrap();
        let third = store.insert_gbk(NewGenomicRecord::new("c.gbk")).await.unwrap();
        assert!(third > second);
    }

    #[tokio::test]
    async fn test_deep_region_hierarchy() {
        let store = memory_store(DeletePolicy::Cascade);
        let gbk_id = store.insert_gbk(NewGenomicRecord::new("a.gbk")).await.unwrap();

        let root = store.insert_region(NewRegion::new(gbk_id, 1)).await.unwrap();
        let mut chain = vec![root];
        for _ in 0..6 {
            let parent = *chain.last().unwrap();
            let child = store
                .insert_region(NewRegion::new(gbk_id, 1).with_parent(parent))
                .await
                .unwrap();
            chain.push(child);
        }

        let subtree = store.region_subtree(root).await.unwrap();
        let ids: Vec<_> = subtree.iter().map(|r| r.id).collect();
        assert_eq!(ids, chain);

        let children = store.child_regions(root).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, chain[1]);

        store.delete_region(chain[3]).await.unwrap();
        let remaining = store.region_subtree(root).await.unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(store.get_region(chain[6]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_region_subtree_missing() {
        let store = memory_store(DeletePolicy::Restrict);
        assert!(store.region_subtree(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_region_subtree_orders_by_depth() {
        let store = memory_store(DeletePolicy::Restrict);
        let gbk_id = store.insert_gbk(NewGenomicRecord::new("a.gbk")).await.unwrap();

        let root = store.insert_region(NewRegion::new(gbk_id, 1)).await.unwrap();
        let moved = store.insert_region(NewRegion::new(gbk_id, 2)).await.unwrap();
        let child = store
            .insert_region(NewRegion::new(gbk_id, 1).with_parent(root))
            .await
            .unwrap();

        // Reparent an older region under a newer one.
        store
            .execute_raw(&format!(
                "UPDATE bgc_region SET parent_id = {} WHERE id = {}",
                child, moved
            ))
            .unwrap();

        let ids: Vec<_> = store
            .region_subtree(root)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![root, child, moved]);
    }

    #[tokio::test]
    async fn test_delete_region_restrict() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;
        let child = store
            .insert_region(NewRegion::new(f.gbk_id, 1).with_parent(f.region_id))
            .await
            .unwrap();
        store
            .insert_region_type(NewRegionType::new(f.region_id, "NRPS"))
            .await
            .unwrap();
        let before = store.table_counts().await.unwrap();

        let result = store.delete_region(f.region_id).await;
        assert_constraint(result, ConstraintKind::ForeignKey);

        assert_eq!(store.table_counts().await.unwrap(), before);
        assert!(store.get_region(f.region_id).await.unwrap().is_some());

        // A leaf without dependents goes.
        store.delete_region(child).await.unwrap();
        assert!(store.get_region(child).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_gbk_restrict() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;
        let before = store.table_counts().await.unwrap();

        let result = store.delete_gbk(f.gbk_id).await;
        assert_constraint(result, ConstraintKind::ForeignKey);

        let after = store.table_counts().await.unwrap();
        assert_eq!(before, after);
        assert!(store.get_gbk(f.gbk_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_gbk_cascade() {
        let store = memory_store(DeletePolicy::Cascade);
        let f = populate(&store).await;
        let nested = store
            .insert_region(NewRegion::new(f.gbk_id, 1).with_parent(f.region_id))
            .await
            .unwrap();
        store
            .insert_region_type(NewRegionType::new(nested, "terpene"))
            .await
            .unwrap();

        // A second record is left alone.
        let other_gbk = store.insert_gbk(NewGenomicRecord::new("b.gbk")).await.unwrap();
        store.insert_region(NewRegion::new(other_gbk, 1)).await.unwrap();

        store.delete_gbk(f.gbk_id).await.unwrap();

        let counts = store.table_counts().await.unwrap();
        assert_eq!(counts.gbk, 1);
        assert_eq!(counts.bgc_region, 1);
        assert_eq!(counts.bgc_region_type, 0);
        assert_eq!(counts.cds, 0);
        assert_eq!(counts.hsp, 0);
        assert_eq!(counts.hsp_alignment, 0);
        assert_eq!(counts.hmm, 1);
        assert_eq!(counts.hmm_db, 1);
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let store = memory_store(DeletePolicy::Cascade);
        let err = store.delete_gbk(5).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");

        let err = store.delete_region(5).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");

        let err = store.delete_hmm_db(5).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_delete_hmm_db() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;
        assert_constraint(store.delete_hmm_db(f.db_id).await, ConstraintKind::ForeignKey);

        let store = memory_store(DeletePolicy::Cascade);
        let f = populate(&store).await;
        store.delete_hmm_db(f.db_id).await.unwrap();

        let counts = store.table_counts().await.unwrap();
        assert_eq!(counts.hmm_db, 0);
        assert_eq!(counts.hmm, 0);
        assert_eq!(counts.hsp, 0);
        assert_eq!(counts.hsp_alignment, 0);
        assert_eq!(counts.cds, 1);
    }

    #[tokio::test]
    async fn test_hmm_db_by_path() {
        let store = memory_store(DeletePolicy::Restrict);
        let f = populate(&store).await;

        let found = store.get_hmm_db_by_path("/db/pfam.hmm").await.unwrap().unwrap();
        assert_eq!(found.id, f.db_id);
        assert!(store.get_hmm_db_by_path("/db/other.hmm").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hmm_requires_db() {
        let store = memory_store(DeletePolicy::Restrict);
        let result = store.insert_hmm(NewHmmModel::new(3, "PF00002", "x", 50)).await;
        assert_constraint(result, ConstraintKind::ForeignKey);
    }

    #[tokio::test]
    async fn test_input_state() {
        let store = memory_store(DeletePolicy::Restrict);
        let input: HashSet<String> = ["a.gbk", "b.gbk"].iter().map(|s| s.to_string()).collect();
        assert_eq!(store.input_state(&input).await.unwrap(), InputDataState::NoData);

        store.insert_gbk(NewGenomicRecord::new("a.gbk")).await.unwrap();
        assert_eq!(store.input_state(&input).await.unwrap(), InputDataState::NewData);

        store.insert_gbk(NewGenomicRecord::new("b.gbk")).await.unwrap();
        assert_eq!(store.input_state(&input).await.unwrap(), InputDataState::SameData);
    }

    #[tokio::test]
    async fn test_save_to_disk() {
        let store = memory_store(DeletePolicy::Restrict);
        populate(&store).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bgc.db");
        store.save_to_disk(&path).unwrap();
        assert!(path.exists());

        let reopened = SqliteStore::open(&path, &DatabaseConfig::default()).unwrap();
        let counts = reopened.table_counts().await.unwrap();
        assert_eq!(counts.gbk, 1);
        assert_eq!(counts.hsp_alignment, 1);

        // Foreign keys are enforced on the reopened file too.
        let result = reopened.insert_region(NewRegion::new(77, 1)).await;
        assert_constraint(result, ConstraintKind::ForeignKey);
    }

    #[tokio::test]
    async fn test_schema_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bgc.db");
        drop(SqliteStore::open(&path, &DatabaseConfig::default()).unwrap());

        let conn = Connection::open(&path).unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1).unwrap();
        drop(conn);

        let err = SqliteStore::open(&path, &DatabaseConfig::default()).err().unwrap();
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn test_unversioned_database_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.db");

        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE gbk (id INTEGER PRIMARY KEY, description TEXT)")
            .unwrap();
        drop(conn);

        let err = SqliteStore::open(&path, &DatabaseConfig::default()).err().unwrap();
        assert_eq!(err.error_code(), "DATABASE_ERROR");

        let conn = Connection::open(&path).unwrap();
        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 0);
    }
}
