use tracing::debug;

use crate::models::analytics::{CashFlowEvent, CashReconciliation};
use crate::models::transaction::{TradeType, Transaction};
use super::ordering::{cash_delta, RateTable};

/// Fold a chronologically ordered transaction stream into a single running
/// cash balance, inferring the minimal deposits needed to keep it
/// non-negative at every step.
///
/// Real transaction logs are frequently missing historical deposit records.
/// The pre-check injects exactly the shortfall — never more — before the
/// transaction that would otherwise overdraw, so the reconstructed deposit
/// schedule is the smallest consistent one. The result is order-sensitive:
/// same-day inflows must already be sorted ahead of outflows.
#[must_use]
pub fn reconcile_cash(ordered: &[Transaction], rates: &RateTable) -> CashReconciliation {
    let mut out = CashReconciliation::default();

    // Running balance and running net contribution (deposits − withdrawals
    // + inferred, clamped at 0 on withdrawal overshoot).
    let mut prefix = 0.0_f64;
    let mut contrib_prefix = 0.0_f64;
    let mut min_prefix = 0.0_f64;

    for tx in ordered {
        let delta = cash_delta(tx, rates);

        // Pre-check: top up just enough to keep the balance non-negative.
        if prefix + delta < 0.0 {
            let shortfall = -(prefix + delta);
            debug!(date = %tx.date, shortfall, "injecting inferred deposit");
            out.inferred += shortfall;
            out.inferred_events.push(CashFlowEvent {
                date: tx.date,
                amount: shortfall,
            });
            prefix += shortfall;
            contrib_prefix += shortfall;
            out.peak_contribution = out.peak_contribution.max(contrib_prefix);
        }

        prefix += delta;
        min_prefix = min_prefix.min(prefix);

        if tx.trade_type == TradeType::Cash {
            if delta >= 0.0 {
                out.deposits += delta;
                out.deposit_events.push(CashFlowEvent {
                    date: tx.date,
                    amount: delta,
                });
                contrib_prefix += delta;
            } else {
                out.withdrawals += -delta;
                out.withdrawal_events.push(CashFlowEvent {
                    date: tx.date,
                    amount: -delta,
                });
                contrib_prefix = (contrib_prefix + delta).max(0.0);
            }
            out.peak_contribution = out.peak_contribution.max(contrib_prefix);
        }
    }

    out.ending_balance = prefix;
    out.effective_cash_in = out.deposits - out.withdrawals + out.inferred;
    out.min_balance = min_prefix;
    out
}
