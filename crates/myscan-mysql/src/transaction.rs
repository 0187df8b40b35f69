//! Transaction bookkeeping for an attached MySQL database.
//!
//! Every transaction runs on its own [`Connection`], opened when the
//! transaction starts and released when it commits or rolls back. The
//! manager keeps the live transactions in a map guarded by a mutex; the map
//! lock is never held while a statement runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use myscan_core::error::{StateError, StateErrorKind, TransactionError, TransactionErrorKind};
use myscan_core::{Error, Result};

use crate::client::Driver;
use crate::config::{ConnectionOptions, redact_descriptor};
use crate::connection::Connection;

/// Identifies a transaction started by a [`TransactionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

struct Transaction {
    connection: Connection,
}

/// Starts, finishes and looks up transactions.
pub struct TransactionManager {
    driver: Arc<dyn Driver>,
    descriptor: String,
    options: ConnectionOptions,
    next_id: AtomicU64,
    transactions: Mutex<HashMap<TransactionId, Arc<Transaction>>>,
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("descriptor", &redact_descriptor(&self.descriptor))
            .field("options", &self.options)
            .field("active", &self.active_transactions())
            .finish_non_exhaustive()
    }
}

impl TransactionManager {
    pub fn new(
        driver: Arc<dyn Driver>,
        descriptor: impl Into<String>,
        options: ConnectionOptions,
    ) -> Self {
        Self {
            driver,
            descriptor: descriptor.into(),
            options,
            next_id: AtomicU64::new(1),
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Open a connection, begin a transaction on it and register it.
    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn start_transaction(&self) -> Result<TransactionId> {
        let connection =
            Connection::open_with_options(self.driver.as_ref(), &self.descriptor, self.options)?;
        connection.execute("START TRANSACTION")?;

        let id = TransactionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()?
            .insert(id, Arc::new(Transaction { connection }));
        tracing::debug!(%id, "Transaction started");
        Ok(id)
    }

    /// Commit and forget the transaction.
    ///
    /// If `COMMIT` fails the transaction stays registered so it can still be
    /// rolled back.
    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn commit_transaction(&self, id: TransactionId) -> Result<()> {
        let transaction = self.get(id)?;
        transaction.connection.execute("COMMIT")?;
        self.lock()?.remove(&id);
        tracing::debug!(%id, "Transaction committed");
        Ok(())
    }

    /// Roll back and forget the transaction.
    ///
    /// A failing `ROLLBACK` is logged and otherwise ignored; the transaction
    /// is unregistered either way.
    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback_transaction(&self, id: TransactionId) -> Result<()> {
        let transaction = self.get(id)?;
        if let Err(e) = transaction.connection.execute("ROLLBACK") {
            tracing::warn!(%id, error = %e, "Rollback failed; discarding transaction");
        }
        self.lock()?.remove(&id);
        Ok(())
    }

    /// Ask the server to checkpoint on the transaction's connection.
    #[allow(clippy::result_large_err)]
    pub fn checkpoint(&self, id: TransactionId) -> Result<()> {
        self.get(id)?.connection.execute("CHECKPOINT")
    }

    /// Run `f` against the transaction's connection.
    #[allow(clippy::result_large_err)]
    pub fn with_connection<T>(
        &self,
        id: TransactionId,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let transaction = self.get(id)?;
        f(&transaction.connection)
    }

    /// Number of transactions started and not yet finished.
    pub fn active_transactions(&self) -> usize {
        self.transactions.lock().map_or(0, |map| map.len())
    }

    #[allow(clippy::result_large_err)]
    fn get(&self, id: TransactionId) -> Result<Arc<Transaction>> {
        self.lock()?.get(&id).cloned().ok_or_else(|| {
            Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NotFound,
                message: format!("no active transaction {}", id),
            })
        })
    }

    #[allow(clippy::result_large_err)]
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<TransactionId, Arc<Transaction>>>> {
        self.transactions.lock().map_err(|_| {
            Error::State(StateError {
                kind: StateErrorKind::Poisoned,
                message: "transaction table lock poisoned".to_string(),
            })
        })
    }
}
