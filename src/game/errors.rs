use thiserror::Error;

/// Errors that can arise while operating on live game state.
#[derive(Debug, Error)]
pub enum GameError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around JSON seed / save parsing errors.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (directory creation, seed files, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Session, save, merchant or item is not known.
    #[error("not found: {0}")]
    NotFound(String),

    /// Merchant does not carry the item at all.
    #[error("{merchant} does not stock {item}")]
    NotInStock { merchant: String, item: String },

    /// Malformed transaction or save payload.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not enough stock (requested {requested}, available {available})")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("not enough gold (need {need}, have {have})")]
    InsufficientFunds { need: u64, have: u64 },

    #[error("merchant doesn't have enough gold (needs {need}, has {have})")]
    InsufficientMerchantFunds { need: u64, have: u64 },

    /// Nothing could be placed into the player's inventory.
    #[error("no room in inventory for {item}")]
    InventoryFull { item: String },

    /// Shop policy refuses the transaction (doesn't buy, specialty mismatch).
    #[error("rejected: {0}")]
    PolicyRejected(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// A check that passed earlier in the same transaction no longer holds.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// Stable, snake_case code for transport responses.
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::Sled(_) | GameError::Bincode(_) | GameError::Io(_) => "storage",
            GameError::Json(_) => "invalid_content",
            GameError::NotFound(_) => "not_found",
            GameError::NotInStock { .. } => "not_in_stock",
            GameError::InvalidRequest(_) => "invalid_request",
            GameError::InsufficientStock { .. } => "insufficient_stock",
            GameError::InsufficientFunds { .. } => "insufficient_funds",
            GameError::InsufficientMerchantFunds { .. } => "insufficient_merchant_funds",
            GameError::InventoryFull { .. } => "inventory_full",
            GameError::PolicyRejected(_) => "policy_rejected",
            GameError::SchemaMismatch { .. } => "schema_mismatch",
            GameError::Internal(_) => "internal_failure",
        }
    }

    /// True for broken invariants, which are logged apart from ordinary rejections.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, GameError::Internal(_))
    }
}
