//! Pre-persistence callbacks for auditable entities.
//!
//! The persistence layer calls these immediately before writing a row. Ids are
//! minted from the [`DistributedSequence`] named after the table and actor
//! columns come from the session of the ambient request scope.

use chrono::Utc;

use reqscope_core::context;
use reqscope_core::kv::Result;

use crate::DistributedSequence;

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Row with the audit columns the hooks maintain.
pub trait Auditable {
    /// Primary key, `None` until one is assigned.
    fn id(&self) -> Option<i64>;
    fn set_id(&mut self, id: i64);
    /// Creation time, `None` when not set by the caller.
    fn created_at(&self) -> Option<i64>;
    fn set_created_at(&mut self, at: i64);
    fn set_updated_at(&mut self, at: i64);
    fn set_created_by(&mut self, user_id: i64);
    fn set_updated_by(&mut self, user_id: i64);
    fn set_deleted_by(&mut self, user_id: i64);
}

/// User id writes are attributed to: the operating user of the ambient
/// session, 0 for system writes outside any logged-in request.
fn current_actor() -> i64 {
    context::try_current()
        .and_then(|ctx| ctx.session())
        .map_or(0, |session| session.actor_id())
}

#[derive(Clone)]
pub struct PersistenceHooks {
    sequence: DistributedSequence,
}

impl PersistenceHooks {
    pub fn new(sequence: DistributedSequence) -> Self {
        Self { sequence }
    }

    /// Prepares a new row of `table`.
    ///
    /// A failure to mint the id aborts the insert; no id is ever guessed.
    pub async fn before_insert<E: Auditable>(&self, table: &str, entity: &mut E) -> Result<()> {
        let now = unix_now();
        if entity.created_at().is_none() {
            entity.set_created_at(now);
        }
        entity.set_updated_at(now);
        entity.set_created_by(current_actor());

        if entity.id().is_none() {
            let id = self.sequence.next(table).await.inspect_err(|err| {
                tracing::error!(table, error = %err, "Failed to mint primary key");
            })?;
            entity.set_id(id);
        }
        Ok(())
    }

    pub fn before_update<E: Auditable>(&self, entity: &mut E) {
        entity.set_updated_at(unix_now());
        entity.set_updated_by(current_actor());
    }

    pub fn before_soft_remove<E: Auditable>(&self, entity: &mut E) {
        entity.set_updated_at(unix_now());
        entity.set_deleted_by(current_actor());
    }
}
