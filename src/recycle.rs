use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info};

use crate::context::ServerContext;

/// Periodically drops revocations of tokens that have expired on their own.
pub async fn start_recycle(ctx: Arc<ServerContext>) {
    let intv_secs = ctx.cfg.revoke_purge_seconds;
    info!("Recycle loop starting, interval: {intv_secs}s");
    let mut tk = tokio::time::interval(Duration::from_secs(intv_secs));
    loop {
        let _ = tk.tick().await;
        recycle_once(&ctx);
    }
}

fn recycle_once(ctx: &ServerContext) {
    let now = Utc::now().timestamp() as u64;
    match ctx.db.with_transaction(|tx| tx.purge_revoked_tokens(now)) {
        Ok(0) => debug!("No expired revoked token to recycle"),
        Ok(count) => info!("Recycled {count} expired revoked tokens"),
        Err(e) => error!("Failed to recycle revoked tokens: {e:#}"),
    }
}
