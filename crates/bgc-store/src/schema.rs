//! Database schema definitions.

/// Main schema SQL for initializing the database.
///
/// No table declares `ON DELETE` actions: foreign keys default to
/// `NO ACTION`, and cascading deletes are done by the store.
pub const SCHEMA: &str = r#"
-- Source sequence records
CREATE TABLE IF NOT EXISTS gbk (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    as_version TEXT,
    nt_seq TEXT,
    path TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_gbk_path ON gbk(path);

-- Predicted BGC regions, nested through parent_id
CREATE TABLE IF NOT EXISTS bgc_region (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER REFERENCES bgc_region(id),
    region_number INTEGER NOT NULL,
    gbk_id INTEGER NOT NULL REFERENCES gbk(id),
    contig_edge BOOLEAN,
    nt_start INTEGER,
    nt_stop INTEGER,
    UNIQUE (parent_id, region_number)
);

CREATE INDEX IF NOT EXISTS idx_bgc_region_gbk_id ON bgc_region(gbk_id);
CREATE INDEX IF NOT EXISTS idx_bgc_region_parent_id ON bgc_region(parent_id);

-- Classification labels of regions
CREATE TABLE IF NOT EXISTS bgc_region_type (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    region_id INTEGER NOT NULL,
    type TEXT NOT NULL,
    UNIQUE (region_id, type),
    FOREIGN KEY (region_id) REFERENCES bgc_region(id)
);

-- Coding sequences
CREATE TABLE IF NOT EXISTS cds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    region_id INTEGER NOT NULL REFERENCES bgc_region(id),
    nt_start INTEGER NOT NULL,
    nt_stop INTEGER NOT NULL,
    strand INTEGER NOT NULL,
    locus_tag TEXT NOT NULL,
    protein_id TEXT,
    product TEXT,
    aa_seq TEXT NOT NULL,
    UNIQUE (id, region_id)
);

CREATE INDEX IF NOT EXISTS idx_cds_region_id ON cds(region_id);

-- HMM database files
CREATE TABLE IF NOT EXISTS hmm_db (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    md5 TEXT NOT NULL
);

-- HMM profiles
CREATE TABLE IF NOT EXISTS hmm (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    accession TEXT NOT NULL,
    name TEXT NOT NULL,
    db_id INTEGER NOT NULL REFERENCES hmm_db(id),
    model_length INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_hmm_db_id ON hmm(db_id);

-- High-scoring pairs between coding sequences and HMM profiles
CREATE TABLE IF NOT EXISTS hsp (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cds_id INTEGER NOT NULL REFERENCES cds(id),
    hmm_id INTEGER NOT NULL REFERENCES hmm(id),
    bitscore REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_hsp_cds_id ON hsp(cds_id);
CREATE INDEX IF NOT EXISTS idx_hsp_hmm_id ON hsp(hmm_id);

-- Alignment detail, one row per hsp. WITHOUT ROWID keeps hsp_id from
-- becoming a rowid alias that would auto-assign on NULL.
CREATE TABLE IF NOT EXISTS hsp_alignment (
    hsp_id INTEGER NOT NULL PRIMARY KEY REFERENCES hsp(id),
    model_start INTEGER NOT NULL,
    model_stop INTEGER NOT NULL,
    model_gaps TEXT NOT NULL,
    cds_start INTEGER NOT NULL,
    cds_stop INTEGER NOT NULL,
    cds_gaps TEXT NOT NULL
) WITHOUT ROWID;
"#;

/// Tables created by [`SCHEMA`], parents before children.
pub const TABLES: [&str; 8] = [
    "gbk",
    "bgc_region",
    "bgc_region_type",
    "cds",
    "hmm_db",
    "hmm",
    "hsp",
    "hsp_alignment",
];

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;
