use crate::errors::ApiError;
use ark_bn254::Fr;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use zk_credentials::merkle::verify_sorted;
use zk_credentials::types::{fr_from_hex, fr_to_hex};
use zk_credentials::{Batch, BatchId, BatchMetadata, Commitment, MerkleProof};

pub type Db = Pool<Sqlite>;

/// A registry entry plus the accumulator shape needed to pick its key set.
#[derive(Clone, Debug)]
pub struct StoredBatch {
    pub batch: Batch,
    pub leaf_count: u64,
    pub depth: usize,
}

pub async fn connect(db_url: &str) -> Result<Db, ApiError> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .map_err(|_| ApiError::Internal)
}

pub async fn init_schema(db: &Db) -> Result<(), ApiError> {
    // Only roots and metadata are stored. Records and salts never reach the database.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS batches (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  root_hex TEXT NOT NULL,
  created_at TEXT NOT NULL,
  institution TEXT NOT NULL,
  course TEXT NOT NULL,
  year INTEGER NOT NULL,
  total_students INTEGER NOT NULL,
  leaf_count INTEGER NOT NULL,
  depth INTEGER NOT NULL,
  valid INTEGER NOT NULL
);
"#,
    )
    .execute(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    Ok(())
}

/// Register a new batch root. Ids are sequential; timestamps never go backwards.
///
/// One `INSERT ... SELECT` statement takes the write lock before it reads the previous
/// timestamp, so concurrent publishes queue on the busy timeout instead of failing.
pub async fn issue_batch(
    db: &Db,
    root: Fr,
    metadata: &BatchMetadata,
    leaf_count: u64,
    depth: usize,
) -> Result<BatchId, ApiError> {
    // Fixed-width UTC text, so `MAX` over strings orders by time.
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

    let result = sqlx::query(
        r#"INSERT INTO batches
           (root_hex, created_at, institution, course, year, total_students, leaf_count, depth, valid)
           SELECT ?, MAX(?, COALESCE((SELECT created_at FROM batches ORDER BY id DESC LIMIT 1), '')),
                  ?, ?, ?, ?, ?, ?, 1"#,
    )
    .bind(fr_to_hex(&root))
    .bind(now)
    .bind(metadata.institution.as_str())
    .bind(metadata.course.as_str())
    .bind(metadata.year as i64)
    .bind(metadata.total_students as i64)
    .bind(leaf_count as i64)
    .bind(depth as i64)
    .execute(db)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "failed to insert batch");
        ApiError::Internal
    })?;

    let id = result.last_insert_rowid() as BatchId;
    tracing::info!(batch_id = id, leaf_count, depth, "issued batch");
    Ok(id)
}

pub async fn get_batch(db: &Db, id: BatchId) -> Result<Option<StoredBatch>, ApiError> {
    let Ok(id) = i64::try_from(id) else { return Ok(None); };

    let row = sqlx::query(
        r#"SELECT id, root_hex, created_at, institution, course, year, total_students, leaf_count, depth, valid
           FROM batches WHERE id = ?"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    let Some(row) = row else { return Ok(None); };

    let id: i64 = row.get(0);
    let root_hex: String = row.get(1);
    let created_at: String = row.get(2);
    let year: i64 = row.get(5);
    let total_students: i64 = row.get(6);
    let leaf_count: i64 = row.get(7);
    let depth: i64 = row.get(8);
    let valid: i64 = row.get(9);

    let root = fr_from_hex(&root_hex).map_err(|_| ApiError::Internal)?;

    Ok(Some(StoredBatch {
        batch: Batch {
            id: id as BatchId,
            root,
            metadata: BatchMetadata {
                institution: row.get(3),
                course: row.get(4),
                year: year as u16,
                total_students: total_students as u64,
            },
            created_at: parse_time(&created_at)?,
            valid: valid == 1,
        },
        leaf_count: leaf_count as u64,
        depth: depth as usize,
    }))
}

/// Returns `false` if the batch does not exist. Revoking twice is a no-op.
pub async fn revoke_batch(db: &Db, id: BatchId) -> Result<bool, ApiError> {
    let Ok(id) = i64::try_from(id) else { return Ok(false); };

    let result = sqlx::query(r#"UPDATE batches SET valid = 0 WHERE id = ?"#)
        .bind(id)
        .execute(db)
        .await
        .map_err(|_| ApiError::Internal)?;

    let found = result.rows_affected() > 0;
    if found {
        tracing::info!(batch_id = id, "revoked batch");
    }
    Ok(found)
}

/// True iff the batch exists, is still valid and `proof` links `leaf` to its root.
pub async fn verify_membership(
    db: &Db,
    id: BatchId,
    leaf: &Commitment,
    proof: &MerkleProof,
) -> Result<bool, ApiError> {
    Ok(get_batch(db, id)
        .await?
        .is_some_and(|stored| stored.batch.valid && verify_sorted(leaf, proof, &stored.batch.root)))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, ApiError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|_| ApiError::Internal)?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zk_credentials::MerkleTree;

    async fn memory_db() -> Db {
        // One connection: every in-memory sqlite connection is its own database.
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_schema(&db).await.unwrap();
        db
    }

    fn metadata() -> BatchMetadata {
        BatchMetadata {
            institution: "Example University".into(),
            course: "MSc Chemistry".into(),
            year: 2025,
            total_students: 3,
        }
    }

    fn tree() -> MerkleTree {
        MerkleTree::build((1..=3u64).map(|v| Commitment(Fr::from(v))).collect()).unwrap()
    }

    #[tokio::test]
    async fn ids_are_sequential_and_rows_round_trip() {
        let db = memory_db().await;
        let tree = tree();

        let first = issue_batch(&db, tree.root(), &metadata(), 3, tree.depth()).await.unwrap();
        let second = issue_batch(&db, tree.root(), &metadata(), 3, tree.depth()).await.unwrap();
        assert_eq!((first, second), (1, 2));

        let a = get_batch(&db, first).await.unwrap().unwrap();
        let b = get_batch(&db, second).await.unwrap().unwrap();
        assert_eq!(a.batch.root, tree.root());
        assert_eq!(a.batch.metadata, metadata());
        assert_eq!(a.depth, 2);
        assert!(a.batch.valid);
        assert!(a.batch.created_at <= b.batch.created_at);

        assert!(get_batch(&db, 99).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_issues_all_succeed_in_order() {
        let path = std::env::temp_dir().join(format!("zkc-db-{}.sqlite", uuid::Uuid::new_v4()));
        let db = connect(&format!("sqlite:{}?mode=rwc", path.display())).await.unwrap();
        init_schema(&db).await.unwrap();
        let root = tree().root();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { issue_batch(&db, root, &metadata(), 3, 2).await })
            })
            .collect();
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        ids.sort();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());

        let mut previous = None;
        for id in ids {
            let created = get_batch(&db, id).await.unwrap().unwrap().batch.created_at;
            if let Some(previous) = previous {
                assert!(previous <= created, "batch {id} went back in time");
            }
            previous = Some(created);
        }

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn revocation_disables_membership() {
        let db = memory_db().await;
        let tree = tree();
        let id = issue_batch(&db, tree.root(), &metadata(), 3, tree.depth()).await.unwrap();

        let leaf = Commitment(Fr::from(2u64));
        let proof = tree.proof(&leaf).unwrap();
        assert!(verify_membership(&db, id, &leaf, &proof).await.unwrap());
        assert!(!verify_membership(&db, id, &Commitment(Fr::from(9u64)), &proof).await.unwrap());

        assert!(revoke_batch(&db, id).await.unwrap());
        assert!(revoke_batch(&db, id).await.unwrap());
        assert!(!revoke_batch(&db, 42).await.unwrap());
        assert!(!get_batch(&db, id).await.unwrap().unwrap().batch.valid);
        assert!(!verify_membership(&db, id, &leaf, &proof).await.unwrap());
    }
}
