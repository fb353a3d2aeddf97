use conciliador_core::{
    round_confidence, AllocationRecord, MatchMethod, Money, Movement, MovementKind, ReconcileConfig,
};

use crate::phases::{self, OpenInvoice, Payment};
use crate::suggest::{suggest, OpenBalance, Unplaced};

const PRE_RECONCILED_CONFIDENCE: f64 = 100.0;
const POST_PROCESSED_CONFIDENCE: f64 = 60.0;

/// Allocation state for one counterparty. Consumes the counterparty's
/// movements in date order and owns the open-invoice queue and output.
pub struct Reconciler<'a> {
    config: &'a ReconcileConfig,
    tolerance: Money,
    counterparty: Option<&'a str>,
    open: Vec<OpenInvoice<'a>>,
    records: Vec<AllocationRecord>,
    set_id: u32,
    history: Vec<Money>,
}

impl<'a> Reconciler<'a> {
    pub fn new(counterparty: Option<&'a str>, config: &'a ReconcileConfig) -> Self {
        Self {
            config,
            tolerance: config.tolerance(),
            counterparty,
            open: Vec::new(),
            records: Vec::new(),
            set_id: 0,
            history: Vec::new(),
        }
    }

    fn record(&self, method: MatchMethod) -> AllocationRecord {
        AllocationRecord::new(self.set_id, self.counterparty.map(str::to_string), method)
    }

    /// Runs the whole stream and returns the finished allocation list.
    pub fn run(mut self, movements: &'a [Movement]) -> Vec<AllocationRecord> {
        let (mut settled, mut matchable): (Vec<&Movement>, Vec<&Movement>) =
            movements.iter().partition(|m| m.pre_reconciled);

        settled.sort_by_key(|m| m.row_index);
        for movement in settled {
            self.emit_pre_reconciled(movement);
        }

        matchable.sort_by(|a, b| a.stream_cmp(b));
        for movement in matchable {
            match movement.kind() {
                MovementKind::Invoice => self.add_invoice(movement),
                MovementKind::Payment => self.process_payment(movement),
                MovementKind::Zero => {}
            }
        }

        self.flush_open();
        self.post_process();
        self.records
    }

    fn emit_pre_reconciled(&mut self, movement: &Movement) {
        let mut record = self.record(MatchMethod::PreReconciled);
        record.allocated = movement.net;
        record.confidence = PRE_RECONCILED_CONFIDENCE;
        record = match movement.kind() {
            MovementKind::Invoice => {
                record.residual = Some(Money::zero());
                record.with_invoice(movement)
            }
            _ => record.with_payment(movement),
        };
        self.records.push(record);
    }

    fn add_invoice(&mut self, movement: &'a Movement) {
        self.open.push(OpenInvoice::new(movement));
    }

    fn process_payment(&mut self, movement: &'a Movement) {
        let tol = self.tolerance;
        let mut pay = Payment::new(movement);
        let amount = pay.left;

        if pay.left.exceeds(tol) {
            phases::by_reference(&mut self.open, &mut pay, tol);
        }
        if pay.left.exceeds(tol) {
            phases::exact_amount(&mut self.open, &mut pay, tol);
        }
        if pay.left.exceeds(tol) {
            let max = self.config.max_combination_candidates;
            phases::combined_amount(&mut self.open, &mut pay, tol, max);
        }
        if pay.left.exceeds(tol) {
            phases::date_proximity(&mut self.open, &mut pay, tol);
        }
        if pay.left.exceeds(tol) {
            phases::fifo(&mut self.open, &mut pay, tol);
        }

        for alloc in &pay.allocations {
            let mut record = self
                .record(alloc.method)
                .with_invoice(self.open[alloc.invoice].movement)
                .with_payment(movement);
            record.allocated = alloc.take;
            record.residual = Some(alloc.residual);
            record.confidence = round_confidence(alloc.confidence);
            self.records.push(record);
        }

        self.open.retain(|inv| inv.remaining.exceeds(tol));

        if pay.left.exceeds(tol) {
            self.emit_unallocated(movement, pay.left);
        }

        self.history.push(amount);
        // Heuristic group boundary: a clean queue starts a new set.
        if self.open.is_empty() {
            self.set_id += 1;
        }
    }

    fn emit_unallocated(&mut self, movement: &Movement, left: Money) {
        let open: Vec<OpenBalance> = self
            .open
            .iter()
            .map(|inv| OpenBalance {
                key: inv.movement.key(),
                date: inv.movement.date,
                remaining: inv.remaining,
            })
            .collect();
        let unplaced = Unplaced {
            amount: left,
            concept: movement.concept.as_deref(),
            open: &open,
            history: self
                .config
                .suggest_from_history
                .then_some(self.history.as_slice()),
        };
        let suggestion = suggest(&unplaced, self.config.small_amount_threshold);
        tracing::debug!(
            counterparty = self.counterparty.unwrap_or(""),
            amount = %left,
            kind = ?suggestion.kind,
            "Unallocated payment"
        );

        let mut record = self.record(MatchMethod::Unallocated).with_payment(movement);
        record.allocated = -left;
        record.suggestion = Some(suggestion);
        self.records.push(record);
    }

    fn flush_open(&mut self) {
        let open = std::mem::take(&mut self.open);
        for inv in open {
            let mut record = self.record(MatchMethod::Open).with_invoice(inv.movement);
            record.residual = Some(inv.remaining);
            self.records.push(record);
        }
    }

    /// Pairs payments booked before their invoice: an unallocated amount and
    /// an open invoice of the same size settle each other.
    fn post_process(&mut self) {
        let tol = self.tolerance;
        for u in 0..self.records.len() {
            if self.records[u].method != MatchMethod::Unallocated {
                continue;
            }
            let amount = -self.records[u].allocated;
            let Some(o) = self.records.iter().position(|r| {
                r.method == MatchMethod::Open
                    && r.residual.is_some_and(|res| res.is_within(amount, tol))
            }) else {
                continue;
            };

            let payment = self.records[u].clone();
            let invoice = &mut self.records[o];
            invoice.method = MatchMethod::PostProcessed;
            invoice.allocated = amount;
            invoice.residual = invoice.residual.map(|res| res - amount);
            invoice.confidence = POST_PROCESSED_CONFIDENCE;
            invoice.take_payment_side(&payment);

            let payment = &mut self.records[u];
            payment.method = MatchMethod::PostProcessed;
            payment.allocated = Money::zero();
            payment.suggestion = None;
            payment.confidence = POST_PROCESSED_CONFIDENCE;
        }
    }
}

/// Reconciles the movements of a single counterparty.
pub fn reconcile_counterparty(
    counterparty: Option<&str>,
    movements: &[Movement],
    config: &ReconcileConfig,
) -> Vec<AllocationRecord> {
    Reconciler::new(counterparty, config).run(movements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use conciliador_core::{Collective, SuggestionKind};
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::str::FromStr;

    struct Ledger {
        rows: Vec<Movement>,
    }

    impl Ledger {
        fn new() -> Self {
            Self { rows: Vec::new() }
        }

        fn add(mut self, date: &str, doc: Option<&str>, concept: Option<&str>, amount: &str) -> Self {
            self.rows.push(Movement {
                counterparty: Some("ACME".into()),
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
                account: "430000001".into(),
                document: doc.map(str::to_string),
                concept: concept.map(str::to_string),
                net: Money::new(Decimal::from_str(amount).unwrap()),
                collective: Collective::Receivables,
                sheet: "Mayor".into(),
                row_index: self.rows.len(),
                pre_reconciled: false,
            });
            self
        }

        fn settled(mut self) -> Self {
            if let Some(last) = self.rows.last_mut() {
                last.pre_reconciled = true;
            }
            self
        }

        fn run(&self) -> Vec<AllocationRecord> {
            reconcile_counterparty(Some("ACME"), &self.rows, &ReconcileConfig::default())
        }
    }

    fn money(s: &str) -> Money {
        Money::new(Decimal::from_str(s).unwrap())
    }

    /// Allocations per invoice key plus final residual must equal the
    /// invoice; payment allocations plus remainder must equal the payment.
    fn assert_conserved(rows: &[Movement], records: &[AllocationRecord]) {
        let tol = Money::from_cents(1);
        let mut by_invoice: HashMap<String, Money> = HashMap::new();
        let mut last_residual: HashMap<String, Money> = HashMap::new();
        let mut by_payment: HashMap<String, Money> = HashMap::new();
        for r in records {
            if let Some(key) = &r.invoice_key {
                *by_invoice.entry(key.clone()).or_default() += r.allocated;
                if let Some(res) = r.residual {
                    last_residual.insert(key.clone(), res);
                }
            } else if let Some(key) = &r.payment_key {
                *by_payment.entry(key.clone()).or_default() += r.allocated.abs();
            }
            if r.invoice_key.is_some() {
                if let Some(key) = &r.payment_key {
                    *by_payment.entry(key.clone()).or_default() += r.allocated.abs();
                }
            }
        }
        for m in rows.iter().filter(|m| !m.pre_reconciled) {
            match m.kind() {
                MovementKind::Invoice => {
                    let key = m.key();
                    let total = by_invoice.get(&key).copied().unwrap_or_default()
                        + last_residual.get(&key).copied().unwrap_or_default();
                    assert!(total.is_within(m.net, tol), "invoice {key}: {total} vs {}", m.net);
                }
                MovementKind::Payment => {
                    let key = m.key();
                    let total = by_payment.get(&key).copied().unwrap_or_default();
                    assert!(total.is_within(-m.net, tol), "payment {key}: {total} vs {}", -m.net);
                }
                MovementKind::Zero => {}
            }
        }
    }

    #[test]
    fn reference_match_scenario() {
        let ledger = Ledger::new()
            .add("2024-01-01", Some("FAC 100"), None, "1000.00")
            .add("2024-01-20", None, Some("pago fac 100"), "-1000.00");
        let records = ledger.run();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.method, MatchMethod::Reference);
        assert!(r.confidence >= 95.0);
        assert_eq!(r.residual, Some(Money::zero()));
        assert_eq!(r.allocated, money("1000.00"));
        assert_eq!(r.invoice_document.as_deref(), Some("FAC 100"));
        assert_eq!(r.payment_concept.as_deref(), Some("pago fac 100"));
        assert_conserved(&ledger.rows, &records);
    }

    #[test]
    fn exact_match_scenario() {
        let ledger = Ledger::new()
            .add("2024-01-01", Some("FAC 100"), None, "1000.00")
            .add("2024-01-25", None, None, "-1000.00");
        let records = ledger.run();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].method, MatchMethod::Exact);
        assert_eq!(records[0].confidence, 90.0);
        assert_conserved(&ledger.rows, &records);
    }

    #[test]
    fn combined_amount_scenario() {
        let ledger = Ledger::new()
            .add("2024-01-01", None, None, "300.00")
            .add("2024-01-02", None, None, "700.00")
            .add("2024-01-15", None, Some("transfer bank"), "-1000.00");
        let records = ledger.run();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.method == MatchMethod::CombinedAmount && r.confidence == 85.0));
        assert_conserved(&ledger.rows, &records);
    }

    #[test]
    fn payment_before_invoice_is_post_processed() {
        let ledger = Ledger::new()
            .add("2024-01-05", None, Some("transferencia"), "-500.00")
            .add("2024-01-10", Some("FAC 7"), None, "500.00");
        let records = ledger.run();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.method == MatchMethod::PostProcessed && r.confidence == 60.0));

        let payment_side = &records[0];
        assert!(payment_side.invoice_key.is_none());
        assert_eq!(payment_side.allocated, Money::zero());
        assert!(payment_side.suggestion.is_none());

        let invoice_side = &records[1];
        assert_eq!(invoice_side.allocated, money("500.00"));
        assert_eq!(invoice_side.residual, Some(Money::zero()));
        assert_eq!(invoice_side.payment_key, payment_side.payment_key);
        assert_eq!(invoice_side.payment_date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_conserved(&ledger.rows, &records);
    }

    #[test]
    fn reference_beats_exact_amount() {
        let ledger = Ledger::new()
            .add("2024-01-01", Some("A/337748"), None, "1000.00")
            .add("2024-01-02", Some("A/337900"), None, "500.00")
            .add("2024-01-10", None, Some("transferencia factura 337748"), "-500.00");
        let records = ledger.run();
        let first = &records[0];
        assert_eq!(first.method, MatchMethod::Reference);
        assert_eq!(first.invoice_document.as_deref(), Some("A/337748"));
        assert_eq!(first.residual, Some(money("500.00")));
        assert_conserved(&ledger.rows, &records);
    }

    #[test]
    fn tolerance_boundary() {
        let within = Ledger::new()
            .add("2024-01-01", None, None, "100.00")
            .add("2024-01-02", None, None, "-100.009")
            .run();
        assert_eq!(within[0].method, MatchMethod::Exact);

        let outside = Ledger::new()
            .add("2024-01-01", None, None, "100.00")
            .add("2024-01-02", None, None, "-100.011")
            .run();
        assert_ne!(outside[0].method, MatchMethod::Exact);
    }

    #[test]
    fn unallocated_remainder_gets_suggestion() {
        let ledger = Ledger::new()
            .add("2024-01-01", None, None, "100.00")
            .add("2024-01-02", None, Some("pago"), "-130.00");
        let records = ledger.run();
        let last = records.last().unwrap();
        assert_eq!(last.method, MatchMethod::Unallocated);
        assert_eq!(last.allocated, money("-30.00"));
        assert_eq!(last.confidence, 0.0);
        let suggestion = last.suggestion.as_ref().unwrap();
        assert_eq!(suggestion.kind, SuggestionKind::SmallAmount);
        assert_conserved(&ledger.rows, &records);
    }

    #[test]
    fn open_invoices_are_flushed() {
        let ledger = Ledger::new()
            .add("2024-01-01", Some("F1"), None, "100.00")
            .add("2024-01-02", Some("F2"), None, "250.00");
        let records = ledger.run();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.method == MatchMethod::Open && r.confidence == 0.0));
        assert_eq!(records[1].residual, Some(money("250.00")));
        assert!(records.iter().all(|r| r.payment_key.is_none()));
    }

    #[test]
    fn set_id_advances_when_queue_empties() {
        let ledger = Ledger::new()
            .add("2024-01-01", None, None, "100.00")
            .add("2024-01-02", None, None, "-100.00")
            .add("2024-02-01", None, None, "200.00")
            .add("2024-02-03", None, None, "-50.00");
        let records = ledger.run();
        assert_eq!(records[0].set_id, 0);
        assert_eq!(records[1].set_id, 1);
        // Partial payment leaves the second invoice open in the same set.
        let open = records.iter().find(|r| r.method == MatchMethod::Open).unwrap();
        assert_eq!(open.set_id, 1);
        assert_eq!(open.residual, Some(money("150.00")));
        assert_conserved(&ledger.rows, &records);
    }

    #[test]
    fn pre_reconciled_rows_bypass_matching() {
        let ledger = Ledger::new()
            .add("2024-01-01", None, None, "100.00")
            .settled()
            .add("2024-01-02", None, None, "-100.00")
            .settled()
            .add("2024-01-03", None, None, "40.00");
        let records = ledger.run();
        assert_eq!(records[0].method, MatchMethod::PreReconciled);
        assert_eq!(records[0].residual, Some(Money::zero()));
        assert_eq!(records[0].confidence, 100.0);
        assert_eq!(records[1].method, MatchMethod::PreReconciled);
        assert_eq!(records[1].residual, None);
        assert!(records[1].invoice_key.is_none());
        assert_eq!(records[2].method, MatchMethod::Open);
    }

    #[test]
    fn zero_and_undated_movements() {
        let ledger = Ledger::new()
            .add("", None, None, "-80.00")
            .add("2024-03-01", None, None, "0")
            .add("2024-03-02", None, None, "80.00");
        let records = ledger.run();
        // The undated payment sorts last, after the invoice it then settles.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].method, MatchMethod::Exact);
        assert_eq!(records[0].confidence, 80.0);
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let ledger = Ledger::new()
            .add("2024-01-01", Some("FAC 1"), None, "300.00")
            .add("2024-01-03", Some("FAC 2"), None, "450.00")
            .add("2024-01-09", None, Some("varios"), "-600.00")
            .add("2024-02-01", None, Some("anticipo"), "-900.00");
        let a = serde_json::to_string(&ledger.run()).unwrap();
        let b = serde_json::to_string(&ledger.run()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn conservation_over_mixed_history() {
        let ledger = Ledger::new()
            .add("2024-01-01", Some("FAC 10"), None, "1210.00")
            .add("2024-01-04", Some("FAC 11"), None, "300.00")
            .add("2024-01-05", Some("FAC 12"), None, "99.99")
            .add("2024-01-20", None, Some("pago fac 11"), "-300.00")
            .add("2024-01-25", None, None, "-1000.00")
            .add("2024-02-10", None, None, "-310.00")
            .add("2024-02-11", Some("FAC 13"), None, "75.50")
            .add("2024-03-01", None, Some("liquidacion"), "-500.00");
        let records = ledger.run();
        assert_conserved(&ledger.rows, &records);
    }
}
