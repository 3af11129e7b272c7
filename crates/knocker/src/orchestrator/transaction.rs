//! Transaction guard.

use tracing::{debug, warn};

use crate::core::traits::Session;
use crate::error::{KnockerError, Result};

/// An open transaction on a [`Session`].
///
/// The guard does not hold the session borrow, so statements keep flowing
/// through the session while it is alive. It must be finished with
/// [`Transaction::commit`] or [`Transaction::rollback`]; dropping it
/// unfinished only logs, and the server rolls back when the connection
/// closes.
#[must_use = "a transaction must be committed or rolled back"]
#[derive(Debug)]
pub struct Transaction {
    finished: bool,
}

impl Transaction {
    /// Start a transaction.
    pub async fn begin(session: &mut dyn Session) -> Result<Self> {
        session
            .begin()
            .await
            .map_err(|e| KnockerError::transaction("begin", e))?;
        debug!("Transaction started on {}", session.db_type());
        Ok(Self { finished: false })
    }

    pub async fn commit(mut self, session: &mut dyn Session) -> Result<()> {
        self.finished = true;
        session
            .commit()
            .await
            .map_err(|e| KnockerError::transaction("commit", e))?;
        debug!("Transaction committed");
        Ok(())
    }

    pub async fn rollback(mut self, session: &mut dyn Session) -> Result<()> {
        self.finished = true;
        session
            .rollback()
            .await
            .map_err(|e| KnockerError::transaction("rollback", e))?;
        debug!("Transaction rolled back");
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Transaction dropped without commit or rollback; the server will roll it back");
        }
    }
}
