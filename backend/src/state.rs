use crate::config::Config;
use crate::db::Db;
use crate::errors::ApiError;
use crate::sessions::SessionStore;
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use zk_credentials::{CircuitShape, ProofService, SortedPairing, ZkError};

type KeyCell = Arc<OnceCell<Arc<ProofService>>>;
type KeyCells = Arc<Mutex<HashMap<CircuitShape, KeyCell>>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    /// Full key sets, one per accumulator depth.
    provers: KeyCells,
    /// Verifying keys loaded without a proving key.
    verifiers: KeyCells,
}

/// Fetch or create the cell for `shape`. The map lock is released before the cell is awaited.
fn cell(cells: &KeyCells, shape: CircuitShape) -> KeyCell {
    let mut map = cells.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    map.entry(shape).or_default().clone()
}

fn cached(cells: &KeyCells, shape: CircuitShape) -> Option<Arc<ProofService>> {
    let map = cells.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    map.get(&shape).and_then(|cell| cell.get().cloned())
}

fn check_shape(shape: CircuitShape, service: &ProofService) -> Result<(), ZkError> {
    if service.shape() != shape {
        return Err(ZkError::KeyVersionMismatch {
            expected: format!("{shape:?}"),
            got: format!("{:?}", service.shape()),
        });
    }
    Ok(())
}

fn load_or_setup(shape: CircuitShape, dir: &Path) -> Result<ProofService, ZkError> {
    match ProofService::<SortedPairing>::load(dir) {
        Ok(service) => {
            check_shape(shape, &service)?;
            return Ok(service);
        }
        Err(ZkError::MissingArtifact(_)) => {}
        Err(e) => return Err(e),
    }

    // Trusted setup randomness (prototype).
    //
    // IMPORTANT: In production, use an MPC ceremony.
    let service = ProofService::<SortedPairing>::setup(shape, &mut OsRng)?;
    service.save(dir)?;
    Ok(service)
}

impl AppState {
    pub fn new(db: Db, config: Config) -> Self {
        Self {
            db,
            sessions: SessionStore::new(config.session_ttl),
            config: Arc::new(config),
            provers: Arc::default(),
            verifiers: Arc::default(),
        }
    }

    pub fn shape_for_depth(&self, depth: usize) -> CircuitShape {
        CircuitShape::new(self.config.subjects, depth)
    }

    fn checked_shape(&self, depth: usize) -> Result<CircuitShape, ApiError> {
        if depth > self.config.max_depth {
            return Err(ApiError::BadRequest(format!(
                "tree depth {depth} exceeds the configured maximum {}",
                self.config.max_depth
            )));
        }
        Ok(self.shape_for_depth(depth))
    }

    fn keys_dir(&self, shape: CircuitShape) -> PathBuf {
        self.config
            .data_dir
            .join("keys")
            .join(format!("s{}-d{}", shape.subjects, shape.depth))
    }

    /// Ensure the Groth16 key set for a batch depth exists on disk and in memory.
    ///
    /// This runs the trusted setup (prototype) on first use of a depth. Concurrent callers for
    /// the same depth share one setup; other depths are not held up by it.
    pub async fn ensure_keys(&self, depth: usize) -> Result<Arc<ProofService>, ApiError> {
        let shape = self.checked_shape(depth)?;
        let dir = self.keys_dir(shape);

        let key_cell = cell(&self.provers, shape);
        let service = key_cell
            .get_or_try_init(|| async move {
                let service = tokio::task::spawn_blocking(move || load_or_setup(shape, &dir))
                    .await
                    .map_err(|_| ApiError::Internal)??;
                tracing::info!(depth, key_id = %service.key_id(), "key set ready");
                Ok::<_, ApiError>(Arc::new(service))
            })
            .await?;
        Ok(service.clone())
    }

    /// Key set for verifying proofs at a batch depth. Never runs setup.
    ///
    /// A depth with no key set on disk is `NotFound`: nothing was ever proven against it.
    pub async fn verifier_keys(&self, depth: usize) -> Result<Arc<ProofService>, ApiError> {
        let shape = self.checked_shape(depth)?;
        if let Some(service) = cached(&self.provers, shape) {
            return Ok(service);
        }

        let dir = self.keys_dir(shape);
        let key_cell = cell(&self.verifiers, shape);
        let service = key_cell
            .get_or_try_init(|| async move {
                let loaded = tokio::task::spawn_blocking(move || ProofService::<SortedPairing>::load_verifier(&dir))
                    .await
                    .map_err(|_| ApiError::Internal)?;
                let service = match loaded {
                    Ok(service) => service,
                    Err(ZkError::MissingArtifact(_)) => {
                        return Err(ApiError::NotFound(format!("no key set for tree depth {depth}")));
                    }
                    Err(e) => return Err(e.into()),
                };
                check_shape(shape, &service)?;
                Ok(Arc::new(service))
            })
            .await?;
        Ok(service.clone())
    }
}
