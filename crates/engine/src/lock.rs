//! Named, time-bounded job locks backed by Redis.
//!
//! `SET key token NX EX lease` gives an atomic acquire-with-expiry; release is
//! a compare-and-delete so a run that outlived its lease cannot delete a lock
//! a successor now holds. Failure to acquire is contention, not an error —
//! the caller skips its cycle and tries again next tick. A crashed holder is
//! healed by the lease expiring.

use redis::aio::ConnectionManager;
use uuid::Uuid;

/// Delete the key only when it still stores our token.
const RELEASE_SCRIPT: &str =
    "if redis.call('get', KEYS[1]) == ARGV[1] then return redis.call('del', KEYS[1]) else return 0 end";

pub struct JobLock;

impl JobLock {
    /// Try to acquire the named lock for `lease_secs`.
    ///
    /// Returns the release token on success, `None` when another holder has
    /// the lock.
    pub async fn acquire(
        redis: &mut ConnectionManager,
        name: &str,
        lease_secs: u64,
    ) -> anyhow::Result<Option<String>> {
        let token = Uuid::new_v4().to_string();
        let key = format!("courier:lock:{}", name);

        // SET key token NX EX lease
        // Returns Some("OK") if the key was set (lock acquired)
        // Returns None if the key already exists (held elsewhere)
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(lease_secs)
            .query_async(redis)
            .await?;

        if result.is_some() {
            Ok(Some(token))
        } else {
            tracing::debug!(lock = name, "Lock held elsewhere, skipping cycle");
            Ok(None)
        }
    }

    /// Release the named lock if `token` still owns it.
    pub async fn release(
        redis: &mut ConnectionManager,
        name: &str,
        token: &str,
    ) -> anyhow::Result<()> {
        let key = format!("courier:lock:{}", name);

        let released: i64 = redis::cmd("EVAL")
            .arg(RELEASE_SCRIPT)
            .arg(1)
            .arg(&key)
            .arg(token)
            .query_async(redis)
            .await?;

        if released == 0 {
            // Lease expired mid-run; the next holder's lock was left intact.
            tracing::warn!(lock = name, "Lock was no longer held at release");
        }

        Ok(())
    }
}
