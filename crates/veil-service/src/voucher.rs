// ── Voucher redeemer ──
//
// Submits voucher codes to the daemon one at a time and reports each
// `(voucher, result)` pair through a callback — the endpoint turns
// those into broadcast events.

use std::sync::Arc;

use veil_model::VoucherResult;
use veil_sync::{Closed, CommandActor};

use crate::daemon::DaemonConnection;

pub struct VoucherRedeemer {
    actor: CommandActor<String>,
}

impl VoucherRedeemer {
    pub fn spawn(
        connection: DaemonConnection,
        on_result: impl Fn(String, VoucherResult) + Send + Sync + 'static,
    ) -> Self {
        let on_result = Arc::new(on_result);
        let actor = CommandActor::spawn(move |voucher: String| {
            let connection = connection.clone();
            let on_result = Arc::clone(&on_result);
            async move {
                let daemon = connection.wait().await;
                match daemon.submit_voucher(&voucher).await {
                    Ok(outcome) => on_result(voucher, outcome),
                    Err(e) => {
                        tracing::warn!(error = %e, "voucher submission failed");
                        on_result(voucher, VoucherResult::RpcError);
                    }
                }
            }
        });

        Self { actor }
    }

    pub fn submit(&self, voucher: String) -> Result<(), Closed> {
        self.actor.enqueue(voucher)
    }

    pub async fn shutdown(&self) {
        self.actor.shutdown().await;
    }
}
