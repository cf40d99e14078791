// ── Voucher redemption mirror ──
//
// Submits voucher codes and mirrors each result event. On a
// successful redemption the caller is expected to invalidate the
// cached account expiry with the pre-redemption value so the fetch
// loop re-converges.

use std::sync::Arc;

use veil_ipc::{Event, EventKind, Request, RequestSender, SendRequestError};
use veil_model::VoucherResult;
use veil_sync::EventNotifier;

use crate::dispatcher::EventDispatcher;

pub struct VoucherRedeemer {
    requests: RequestSender,
    last_result: Arc<EventNotifier<Option<(String, VoucherResult)>>>,
}

impl VoucherRedeemer {
    pub fn new(requests: RequestSender, dispatcher: &EventDispatcher) -> Self {
        let last_result = Arc::new(EventNotifier::new(None));

        dispatcher.register_handler(EventKind::VoucherSubmissionResult, {
            let last_result = Arc::clone(&last_result);
            move |event| {
                if let Event::VoucherSubmissionResult { voucher, result } = event {
                    last_result.notify(Some((voucher.clone(), result.clone())));
                }
            }
        });

        Self {
            requests,
            last_result,
        }
    }

    pub fn last_result(&self) -> Arc<EventNotifier<Option<(String, VoucherResult)>>> {
        Arc::clone(&self.last_result)
    }

    pub fn submit(&self, voucher: String) -> Result<(), SendRequestError> {
        self.requests.send(&Request::SubmitVoucher(voucher))
    }

    pub fn teardown(&self) {
        self.last_result.unsubscribe_all();
    }
}
