//! Requests, validates, persists and erases pairings.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{Device, Pairing, PairingError, PairingService, PairingStore};

/// Pairing lifecycle on top of a service and a store.
///
/// Holds no pairing state of its own; the store is the only persistent copy.
#[derive(Clone)]
pub struct PairingManager {
    service: Arc<dyn PairingService>,
    store: Arc<dyn PairingStore>,
}

impl fmt::Debug for PairingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingManager").finish_non_exhaustive()
    }
}

impl PairingManager {
    /// Create a manager.
    pub fn new(service: Arc<dyn PairingService>, store: Arc<dyn PairingStore>) -> Self {
        Self { service, store }
    }

    /// Create a manager talking HTTP to `config.server_url`, persisting to
    /// `config.storage_path` or in memory.
    #[cfg(feature = "http")]
    pub fn from_config(config: &crate::config::GymoteConfig) -> Result<Self, PairingError> {
        use super::{FileStore, HttpPairingService, MemoryStore};

        let service = HttpPairingService::new(config.server_url.clone())?;
        let store: Arc<dyn PairingStore> = match &config.storage_path {
            Some(path) => Arc::new(FileStore::new(path.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::new(Arc::new(service), store))
    }

    /// Request a fresh pairing for a screen.
    pub async fn request_pairing(&self) -> Result<Pairing, PairingError> {
        let response = self.service.request_code().await?;
        if !response.is_complete() {
            return Err(PairingError::RequestFailed(
                "service returned an incomplete code".to_string(),
            ));
        }
        info!(code = %response.code, "pairing code issued");
        Ok(Pairing::new(response.code, response.hash, Device::Screen))
    }

    /// Exchange a short code for the remote side of a pairing.
    pub async fn resolve_pairing_from_code(&self, code: &str) -> Result<Pairing, PairingError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(PairingError::InvalidCode(code.to_string()));
        }

        let response = self.service.validate_code(code).await?;
        if !response.is_complete() {
            debug!(code, "code has no match");
            return Err(PairingError::InvalidCode(code.to_string()));
        }
        Ok(Pairing::new(response.code, response.hash, Device::Remote))
    }

    /// Validate a serialized pairing record.
    ///
    /// Returns `None` when the record is unparseable or rejected, erasing it
    /// from the store. A service failure also returns `None` but keeps the
    /// record. Only store failures are errors.
    pub async fn validate_stored_pairing(
        &self,
        record: &str,
    ) -> Result<Option<Pairing>, PairingError> {
        let pairing = match Pairing::from_record(record) {
            Ok(pairing) => pairing,
            Err(e) => {
                warn!(error = %e, "discarding unreadable pairing record");
                self.erase()?;
                return Ok(None);
            }
        };

        match self.service.validate_pairing(&pairing).await {
            Ok(true) => Ok(Some(pairing)),
            Ok(false) => {
                info!(code = %pairing.code, "stored pairing rejected");
                self.erase()?;
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "could not validate stored pairing, keeping record");
                Ok(None)
            }
        }
    }

    /// Load and validate the stored record, if there is one.
    pub async fn load_stored_pairing(&self) -> Result<Option<Pairing>, PairingError> {
        match self.store.load()? {
            Some(record) => self.validate_stored_pairing(&record).await,
            None => Ok(None),
        }
    }

    /// Persist `pairing`, replacing any previous record.
    pub fn persist(&self, pairing: &Pairing) -> Result<(), PairingError> {
        self.store.save(&pairing.to_record()?)?;
        debug!(code = %pairing.code, "pairing persisted");
        Ok(())
    }

    /// Remove the stored record.
    pub fn erase(&self) -> Result<(), PairingError> {
        self.store.remove()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::pairing::{CodeResponse, MemoryStore};

    /// Scripted service for tests.
    #[derive(Debug, Default)]
    pub(crate) struct MockService {
        pub code: Option<CodeResponse>,
        pub valid: Option<bool>,
        pub validated: Mutex<Vec<Pairing>>,
    }

    impl MockService {
        pub(crate) fn issuing(code: &str, hash: &str) -> Self {
            Self {
                code: Some(CodeResponse {
                    code: code.to_string(),
                    hash: hash.to_string(),
                }),
                valid: Some(true),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl PairingService for MockService {
        async fn request_code(&self) -> Result<CodeResponse, PairingError> {
            self.code
                .clone()
                .ok_or_else(|| PairingError::RequestFailed("offline".to_string()))
        }

        async fn validate_code(&self, code: &str) -> Result<CodeResponse, PairingError> {
            match &self.code {
                Some(response) if response.code == code => Ok(response.clone()),
                Some(_) => Ok(CodeResponse::default()),
                None => Err(PairingError::RequestFailed("offline".to_string())),
            }
        }

        async fn validate_pairing(&self, pairing: &Pairing) -> Result<bool, PairingError> {
            self.validated.lock().unwrap().push(pairing.clone());
            self.valid
                .ok_or_else(|| PairingError::RequestFailed("offline".to_string()))
        }
    }

    fn manager(service: MockService, store: Arc<MemoryStore>) -> PairingManager {
        PairingManager::new(Arc::new(service), store)
    }

    const RECORD: &str = r#"{"device":"screen","hash":"h1","code":"111111"}"#;

    #[tokio::test]
    async fn test_request_pairing() {
        let store = Arc::new(MemoryStore::new());
        let pairing = manager(MockService::issuing("123456", "h1"), store)
            .request_pairing()
            .await
            .unwrap();
        assert_eq!(pairing, Pairing::new("123456", "h1", Device::Screen));
    }

    #[tokio::test]
    async fn test_request_pairing_offline() {
        let store = Arc::new(MemoryStore::new());
        let err = manager(MockService::default(), store)
            .request_pairing()
            .await
            .unwrap_err();
        assert!(matches!(err, PairingError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_resolve_pairing_from_code() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(MockService::issuing("123456", "h1"), store);

        let pairing = manager.resolve_pairing_from_code(" 123456 ").await.unwrap();
        assert_eq!(pairing.device, Device::Remote);
        assert_eq!(pairing.hash, "h1");

        let err = manager.resolve_pairing_from_code("999999").await.unwrap_err();
        assert!(matches!(err, PairingError::InvalidCode(_)));

        let err = manager.resolve_pairing_from_code("").await.unwrap_err();
        assert!(matches!(err, PairingError::InvalidCode(_)));
    }

    #[tokio::test]
    async fn test_valid_stored_pairing() {
        let store = Arc::new(MemoryStore::with_record(RECORD));
        let pairing = manager(MockService::issuing("1", "h"), store.clone())
            .load_stored_pairing()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pairing.code, "111111");
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejected_pairing_is_erased() {
        let store = Arc::new(MemoryStore::with_record(RECORD));
        let service = MockService {
            valid: Some(false),
            ..MockService::default()
        };
        let result = manager(service, store.clone())
            .load_stored_pairing()
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_unparseable_record_is_erased() {
        let store = Arc::new(MemoryStore::with_record("{not json"));
        let result = manager(MockService::issuing("1", "h"), store.clone())
            .load_stored_pairing()
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_network_failure_keeps_record() {
        let store = Arc::new(MemoryStore::with_record(RECORD));
        let result = manager(MockService::default(), store.clone())
            .load_stored_pairing()
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(store.load().unwrap().as_deref(), Some(RECORD));
    }

    #[tokio::test]
    async fn test_persist_and_erase() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(MockService::default(), store.clone());
        assert_eq!(manager.load_stored_pairing().await.unwrap(), None);

        let pairing = Pairing::new("5", "h5", Device::Remote);
        manager.persist(&pairing).unwrap();
        assert_eq!(
            Pairing::from_record(&store.load().unwrap().unwrap()).unwrap(),
            pairing
        );

        manager.erase().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
