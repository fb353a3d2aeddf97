//! The five matching phases, tried in order for every payment.

use conciliador_core::{day_gap, MatchMethod, Money, Movement};
use rust_decimal::Decimal;

use crate::fuzzy;
use crate::references::extract_references;

/// Minimum reference score for the reference phase to consider an invoice.
const REFERENCE_THRESHOLD: f64 = 0.7;
/// Score given when the invoice's document text appears verbatim in the
/// payment concept.
const LITERAL_DOCUMENT_SCORE: f64 = 0.95;
const PROXIMITY_MAX_DAYS: i64 = 45;

/// An invoice waiting for payment. Borrows its movement.
#[derive(Debug, Clone)]
pub(crate) struct OpenInvoice<'a> {
    pub movement: &'a Movement,
    pub remaining: Money,
    pub references: Vec<String>,
    /// Lower-cased, trimmed document text.
    pub document: String,
}

impl<'a> OpenInvoice<'a> {
    pub fn new(movement: &'a Movement) -> Self {
        let document = movement.document.as_deref().unwrap_or_default();
        Self {
            movement,
            remaining: movement.net,
            references: extract_references(document),
            document: document.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Allocation {
    pub invoice: usize,
    pub take: Money,
    /// Invoice balance right after this allocation.
    pub residual: Money,
    pub method: MatchMethod,
    pub confidence: f64,
}

/// A payment being placed: what is left of it and what it has taken so far.
#[derive(Debug, Clone)]
pub(crate) struct Payment<'a> {
    pub movement: &'a Movement,
    pub left: Money,
    /// Lower-cased concept.
    pub concept: String,
    pub references: Vec<String>,
    pub allocations: Vec<Allocation>,
}

impl<'a> Payment<'a> {
    pub fn new(movement: &'a Movement) -> Self {
        let concept = movement.concept.as_deref().unwrap_or_default().to_lowercase();
        Self {
            movement,
            left: -movement.net,
            references: extract_references(&concept),
            concept,
            allocations: Vec::new(),
        }
    }

    fn allocate(
        &mut self,
        open: &mut [OpenInvoice<'_>],
        invoice: usize,
        take: Money,
        method: MatchMethod,
        confidence: f64,
    ) {
        let inv = &mut open[invoice];
        inv.remaining -= take;
        self.left -= take;
        self.allocations.push(Allocation {
            invoice,
            take,
            residual: inv.remaining,
            method,
            confidence,
        });
    }
}

fn dec(num: i64, scale: u32) -> Decimal {
    Decimal::new(num, scale)
}

fn within(value: Decimal, low: Decimal, high: Decimal) -> bool {
    value >= low && value <= high
}

fn reference_score(inv: &OpenInvoice<'_>, pay: &Payment<'_>) -> f64 {
    let mut best = 0.0;
    if inv.document.chars().count() >= 3 && pay.concept.contains(&inv.document) {
        best = LITERAL_DOCUMENT_SCORE;
    }
    for inv_ref in &inv.references {
        for pay_ref in &pay.references {
            best = f64::max(best, fuzzy::score(inv_ref, pay_ref, REFERENCE_THRESHOLD));
        }
    }
    best
}

/// Phase 1: invoices whose references show up in the payment concept, best
/// score first.
pub(crate) fn by_reference(open: &mut [OpenInvoice<'_>], pay: &mut Payment<'_>, tol: Money) {
    if pay.movement.concept.is_none() && pay.movement.document.is_none() {
        return;
    }

    let mut scored: Vec<(usize, f64)> = open
        .iter()
        .enumerate()
        .filter(|(_, inv)| inv.remaining.exceeds(tol))
        .map(|(i, inv)| (i, reference_score(inv, pay)))
        .filter(|(_, score)| *score >= REFERENCE_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    for (index, score) in scored {
        if !pay.left.exceeds(tol) {
            break;
        }
        let remaining = open[index].remaining;
        if !remaining.exceeds(tol) {
            continue;
        }
        let confidence = if score >= 0.9 {
            (95.0 + 5.0 * score).min(100.0)
        } else {
            80.0 + 15.0 * score
        };
        let take = remaining.min(pay.left);
        pay.allocate(open, index, take, MatchMethod::Reference, confidence);
    }
}

/// Phase 2: an invoice for exactly the amount left, closest date first.
pub(crate) fn exact_amount(open: &mut [OpenInvoice<'_>], pay: &mut Payment<'_>, tol: Money) {
    let pay_date = pay.movement.date;
    let mut candidates: Vec<(usize, Option<i64>)> = open
        .iter()
        .enumerate()
        .filter(|(_, inv)| inv.remaining.exceeds(tol) && inv.remaining.is_within(pay.left, tol))
        .map(|(i, inv)| (i, day_gap(inv.movement.date, pay_date)))
        .collect();
    candidates.sort_by_key(|(_, gap)| gap.unwrap_or(i64::MAX));

    let Some(&(index, gap)) = candidates.first() else {
        return;
    };
    let confidence = match gap {
        Some(days) if days <= 30 => 90.0,
        Some(days) if days <= 60 => 85.0,
        _ => 80.0,
    };
    let take = pay.left;
    pay.allocate(open, index, take, MatchMethod::Exact, confidence);
}

/// Phase 3: two, then three, open invoices adding up to the payment within
/// the larger of the tolerance and 1% of the amount left.
pub(crate) fn combined_amount(
    open: &mut [OpenInvoice<'_>],
    pay: &mut Payment<'_>,
    tol: Money,
    max_candidates: usize,
) {
    let pool: Vec<usize> = open
        .iter()
        .enumerate()
        .filter(|(_, inv)| inv.remaining.exceeds(tol))
        .map(|(i, _)| i)
        .collect();
    let pool = &pool[pool.len().saturating_sub(max_candidates)..];
    let amounts: Vec<Money> = pool.iter().map(|&i| open[i].remaining).collect();
    let margin = Money::new(tol.decimal().max(pay.left.decimal() * dec(1, 2)));
    let fits = |sum: Money| sum.is_within(pay.left, margin);
    let n = pool.len();

    let mut chosen: Option<(Vec<usize>, f64)> = None;
    'pairs: for a in 0..n {
        for b in a + 1..n {
            if fits(amounts[a] + amounts[b]) {
                chosen = Some((vec![pool[a], pool[b]], 85.0));
                break 'pairs;
            }
        }
    }
    if chosen.is_none() {
        'triples: for a in 0..n {
            for b in a + 1..n {
                for c in b + 1..n {
                    if fits(amounts[a] + amounts[b] + amounts[c]) {
                        chosen = Some((vec![pool[a], pool[b], pool[c]], 80.0));
                        break 'triples;
                    }
                }
            }
        }
    }

    let Some((members, confidence)) = chosen else {
        return;
    };
    for index in members {
        let take = open[index].remaining.min(pay.left);
        if take.decimal() > Decimal::ZERO {
            pay.allocate(open, index, take, MatchMethod::CombinedAmount, confidence);
        }
    }
}

/// Phase 4: an invoice dated up to 45 days before the payment for roughly
/// the same amount.
pub(crate) fn date_proximity(open: &mut [OpenInvoice<'_>], pay: &mut Payment<'_>, tol: Money) {
    let Some(pay_date) = pay.movement.date else {
        return;
    };
    let best = open
        .iter()
        .enumerate()
        .filter(|(_, inv)| inv.remaining.exceeds(tol))
        .filter_map(|(i, inv)| {
            let days = (pay_date - inv.movement.date?).num_days();
            if !(0..=PROXIMITY_MAX_DAYS).contains(&days) {
                return None;
            }
            let ratio = pay.left.ratio(inv.remaining)?;
            within(ratio, dec(8, 1), dec(12, 1)).then_some((i, days, ratio))
        })
        .min_by_key(|(_, days, _)| *days);

    let Some((index, days, ratio)) = best else {
        return;
    };
    let date_confidence = 75.0 - 0.5 * days as f64;
    let amount_confidence = if within(ratio, dec(95, 2), dec(105, 2)) { 70.0 } else { 65.0 };
    let take = open[index].remaining.min(pay.left);
    pay.allocate(
        open,
        index,
        take,
        MatchMethod::DateProximity,
        f64::min(date_confidence, amount_confidence),
    );
}

fn fifo_confidence(inv: &OpenInvoice<'_>, pay: &Payment<'_>, take: Money, position: usize, tol: Money) -> f64 {
    let mut confidence = 45.0;

    if let Some(coverage) = take.ratio(inv.remaining) {
        if within(coverage, dec(9, 1), dec(11, 1)) {
            confidence += 15.0;
        } else if within(coverage, dec(8, 1), dec(12, 1)) {
            confidence += 10.0;
        } else if coverage >= dec(4, 1) {
            confidence += 5.0;
        }
    }

    if let (Some(paid), Some(issued)) = (pay.movement.date, inv.movement.date) {
        let gap = (paid - issued).num_days();
        if gap >= -30 {
            confidence += if gap <= 45 {
                20.0
            } else if gap <= 75 {
                15.0
            } else if gap <= 120 {
                10.0
            } else if gap <= 180 {
                5.0
            } else {
                0.0
            };
        }
    }

    if position == 0 {
        confidence += 5.0;
    }
    // Both sides close together.
    if inv.remaining.is_within(pay.left, tol) {
        confidence += 5.0;
    }

    f64::min(confidence, 75.0)
}

/// Phase 5: whatever is left goes to the oldest open invoices.
pub(crate) fn fifo(open: &mut [OpenInvoice<'_>], pay: &mut Payment<'_>, tol: Money) {
    for index in 0..open.len() {
        if !pay.left.exceeds(tol) {
            break;
        }
        let inv = &open[index];
        if !inv.remaining.exceeds(tol) {
            continue;
        }
        let take = inv.remaining.min(pay.left);
        let confidence = fifo_confidence(inv, pay, take, index, tol);
        pay.allocate(open, index, take, MatchMethod::Fifo, confidence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use conciliador_core::Collective;

    fn movement(day: Option<u32>, doc: Option<&str>, concept: Option<&str>, cents: i64) -> Movement {
        Movement {
            counterparty: Some("ACME".into()),
            date: day.and_then(|d| NaiveDate::from_ymd_opt(2024, 1, 1).map(|s| s + chrono::Duration::days(d as i64 - 1))),
            account: "430000001".into(),
            document: doc.map(str::to_string),
            concept: concept.map(str::to_string),
            net: Money::from_cents(cents),
            collective: Collective::Receivables,
            sheet: "Mayor".into(),
            row_index: 0,
            pre_reconciled: false,
        }
    }

    fn tol() -> Money {
        Money::from_cents(1)
    }

    #[test]
    fn reference_prefers_document_in_concept() {
        let invoices = [
            movement(Some(1), Some("A/337748"), None, 100000),
            movement(Some(2), Some("A/337900"), None, 50000),
        ];
        let payment = movement(Some(10), None, Some("transferencia factura 337748"), -50000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);

        by_reference(&mut open, &mut pay, tol());
        assert_eq!(pay.allocations.len(), 1);
        let alloc = &pay.allocations[0];
        assert_eq!(alloc.invoice, 0);
        assert_eq!(alloc.method, MatchMethod::Reference);
        assert_eq!(alloc.take, Money::from_cents(50000));
        assert_eq!(alloc.residual, Money::from_cents(50000));
        assert_eq!(alloc.confidence, 100.0);
    }

    #[test]
    fn reference_needs_concept_or_document() {
        let invoices = [movement(Some(1), Some("100"), None, 10000)];
        let payment = movement(Some(2), None, None, -10000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        by_reference(&mut open, &mut pay, tol());
        assert!(pay.allocations.is_empty());
    }

    #[test]
    fn exact_picks_closest_date() {
        let invoices = [
            movement(Some(1), None, None, 30000),
            movement(None, None, None, 30000),
            movement(Some(80), None, None, 30000),
        ];
        let payment = movement(Some(90), None, None, -30000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        exact_amount(&mut open, &mut pay, tol());
        assert_eq!(pay.allocations[0].invoice, 2);
        assert_eq!(pay.allocations[0].confidence, 90.0);
        assert!(pay.left.is_zero());
    }

    #[test]
    fn exact_without_dates_scores_lowest() {
        let invoices = [movement(None, None, None, 30000)];
        let payment = movement(Some(90), None, None, -30000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        exact_amount(&mut open, &mut pay, tol());
        assert_eq!(pay.allocations[0].confidence, 80.0);
    }

    #[test]
    fn combined_pair_then_triple() {
        let invoices = [
            movement(Some(1), None, None, 10000),
            movement(Some(2), None, None, 20000),
            movement(Some(3), None, None, 40000),
        ];
        let payment = movement(Some(10), None, None, -70000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        combined_amount(&mut open, &mut pay, tol(), 40);
        assert_eq!(pay.allocations.len(), 3);
        assert!(pay.allocations.iter().all(|a| a.confidence == 80.0));
        assert!(pay.left.is_zero());

        let payment = movement(Some(10), None, None, -50000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        combined_amount(&mut open, &mut pay, tol(), 40);
        let picked: Vec<usize> = pay.allocations.iter().map(|a| a.invoice).collect();
        assert_eq!(picked, vec![0, 2]);
        assert!(pay.allocations.iter().all(|a| a.confidence == 85.0));
    }

    #[test]
    fn combined_respects_candidate_cap() {
        let invoices = [
            movement(Some(1), None, None, 10000),
            movement(Some(2), None, None, 20000),
            movement(Some(3), None, None, 40000),
        ];
        // 100 + 200 only fits if the oldest invoice is still in the pool.
        let payment = movement(Some(10), None, None, -30000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        combined_amount(&mut open, &mut pay, tol(), 2);
        assert!(pay.allocations.is_empty());
    }

    #[test]
    fn combined_within_one_percent_keeps_payment_whole() {
        let invoices = [movement(Some(1), None, None, 50000), movement(Some(2), None, None, 50500)];
        let payment = movement(Some(10), None, None, -100000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        combined_amount(&mut open, &mut pay, tol(), 40);
        let taken: Money = pay.allocations.iter().map(|a| a.take).sum();
        assert_eq!(taken, Money::from_cents(100000));
        assert_eq!(open[1].remaining, Money::from_cents(500));
    }

    #[test]
    fn proximity_confidence() {
        let invoices = [movement(Some(1), None, None, 100000)];
        let payment = movement(Some(11), None, None, -90000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        date_proximity(&mut open, &mut pay, tol());
        let alloc = &pay.allocations[0];
        assert_eq!(alloc.method, MatchMethod::DateProximity);
        // 10 days gives 70 on the date side; a 0.9 ratio caps at 65.
        assert_eq!(alloc.confidence, 65.0);
        assert_eq!(alloc.residual, Money::from_cents(10000));
    }

    #[test]
    fn proximity_ignores_invoices_after_payment() {
        let invoices = [movement(Some(20), None, None, 100000)];
        let payment = movement(Some(11), None, None, -100000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        date_proximity(&mut open, &mut pay, tol());
        assert!(pay.allocations.is_empty());
    }

    #[test]
    fn fifo_spreads_oldest_first() {
        let invoices = [movement(Some(1), None, None, 30000), movement(Some(5), None, None, 30000)];
        let payment = movement(Some(10), None, None, -40000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        fifo(&mut open, &mut pay, tol());

        assert_eq!(pay.allocations.len(), 2);
        // Full coverage, 9 days, head of queue.
        assert_eq!(pay.allocations[0].confidence, 75.0);
        assert_eq!(pay.allocations[0].take, Money::from_cents(30000));
        // A third of the second invoice, 5 days: 45 + 20.
        assert_eq!(pay.allocations[1].confidence, 65.0);
        assert_eq!(pay.allocations[1].residual, Money::from_cents(20000));
        assert!(pay.left.is_zero());
    }

    #[test]
    fn fifo_far_dates_score_low() {
        let invoices = [movement(Some(1), None, None, 100000)];
        let payment = movement(Some(300), None, None, -30000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        fifo(&mut open, &mut pay, tol());
        // 0.3 coverage, 299 days: base plus the head-of-queue bonus.
        assert_eq!(pay.allocations[0].confidence, 50.0);
    }

    #[test]
    fn reference_below_ninety_uses_linear_band() {
        let invoices = [movement(Some(1), Some("337748"), None, 50000)];
        let payment = movement(Some(5), None, Some("pago 337749"), -50000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        by_reference(&mut open, &mut pay, tol());
        // One digit off in six: score 5/6, so 80 + 15 * 5/6.
        assert_eq!(pay.allocations.len(), 1);
        assert!((pay.allocations[0].confidence - 92.5).abs() < 1e-9);
    }

    #[test]
    fn proximity_close_amount_band() {
        let invoices = [movement(Some(1), None, None, 100000)];
        let payment = movement(Some(5), None, None, -102000);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        date_proximity(&mut open, &mut pay, tol());
        // 4 days gives 73 on the date side; a 1.02 ratio caps at 70.
        assert_eq!(pay.allocations[0].confidence, 70.0);
        assert_eq!(pay.allocations[0].take, Money::from_cents(100000));
    }

    fn fifo_single(pay_day: u32, invoice_cents: i64, pay_cents: i64) -> f64 {
        let invoices = [movement(Some(1), None, None, invoice_cents)];
        let payment = movement(Some(pay_day), None, None, -pay_cents);
        let mut open: Vec<OpenInvoice> = invoices.iter().map(OpenInvoice::new).collect();
        let mut pay = Payment::new(&payment);
        fifo(&mut open, &mut pay, tol());
        pay.allocations[0].confidence
    }

    #[test]
    fn fifo_day_gap_bands() {
        // 0.3 coverage adds nothing; 45 base plus 5 for the head of the queue.
        assert_eq!(fifo_single(61, 100000, 30000), 65.0);
        assert_eq!(fifo_single(101, 100000, 30000), 60.0);
        assert_eq!(fifo_single(151, 100000, 30000), 55.0);
        assert_eq!(fifo_single(182, 100000, 30000), 50.0);
    }

    #[test]
    fn fifo_matching_amounts_bonus() {
        // Far apart in time: 45 + 15 coverage + 5 head of queue, then +5
        // because invoice and payment agree.
        assert_eq!(fifo_single(300, 100000, 100000), 70.0);
        assert_eq!(fifo_single(300, 100000, 105000), 65.0);
    }
}
