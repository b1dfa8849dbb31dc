/// Erreurs d'accès à l'inventaire (store de documents)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid document {path}: {source}")]
    InvalidDocument {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Erreurs fatales d'un calcul de conformité.
/// Les anomalies récupérables (core factor absent, primary introuvable...) ne remontent jamais ici.
#[derive(Debug, thiserror::Error)]
pub enum ComplianceError {
    #[error("data access failure: {0}")]
    Store(#[from] StoreError),
}
