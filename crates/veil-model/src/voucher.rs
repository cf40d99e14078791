// ── Voucher redemption results ──

use serde::{Deserialize, Serialize};

/// Outcome of submitting a voucher code to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoucherResult {
    Ok(VoucherSubmission),
    InvalidVoucher,
    VoucherAlreadyUsed,
    RpcError,
}

/// Details of a successful redemption.
///
/// `new_expiry` is in the fixed wire format (see [`crate::expiry`]); the
/// redeeming side uses it to invalidate its cached account expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherSubmission {
    pub time_added_secs: u64,
    pub new_expiry: String,
}
