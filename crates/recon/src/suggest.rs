//! Diagnoses for payments the matcher could not place.

use chrono::NaiveDate;
use conciliador_core::{compare_dates, Money, Suggestion, SuggestionKind};
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

const ADVANCE_KEYWORDS: &[&str] = &["anticipo", "avance", "adelanto", "a cuenta", "provisió", "bestreta"];
const CREDIT_KEYWORDS: &[&str] = &["abono", "devolución", "credit", "nota", "reembolso", "retorn"];

re!(re_nc_word, r"\bnc\b");

/// Open balance as seen by the suggestion engine.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenBalance {
    pub key: String,
    pub date: Option<NaiveDate>,
    pub remaining: Money,
}

/// Everything known about an unallocated payment.
#[derive(Debug, Clone, Copy)]
pub struct Unplaced<'a> {
    /// Unallocated amount, positive.
    pub amount: Money,
    pub concept: Option<&'a str>,
    pub open: &'a [OpenBalance],
    /// Earlier payment amounts of the same counterparty.
    pub history: Option<&'a [Money]>,
}

fn suggestion(kind: SuggestionKind, confidence: f64, message: String, action: &str) -> Suggestion {
    Suggestion {
        kind,
        confidence,
        message,
        action: action.to_string(),
        invoice_ref: None,
    }
}

fn digits(amount: Money) -> String {
    amount.to_string().replace('.', "")
}

fn differs_in_two_digits(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.chars().zip(b.chars()).filter(|(x, y)| x != y).count() == 2
}

/// All applicable diagnoses, unsorted.
pub fn candidates(unplaced: &Unplaced<'_>, small_amount_threshold: Decimal) -> Vec<Suggestion> {
    let amount = unplaced.amount;
    let concept = unplaced.concept.unwrap_or_default().to_lowercase();
    let mut out = Vec::new();

    if amount.decimal() < small_amount_threshold {
        out.push(suggestion(
            SuggestionKind::SmallAmount,
            90.0,
            format!("Import petit ({amount}€) - Possible comissió bancària o arrodoniment"),
            "Classificar com a despesa bancària",
        ));
    }

    if ADVANCE_KEYWORDS.iter().any(|k| concept.contains(k)) {
        out.push(suggestion(
            SuggestionKind::AdvancePayment,
            85.0,
            "El concepte suggereix un pagament anticipat".to_string(),
            "Marcar com a pagament a compte",
        ));
    }

    if !unplaced.open.is_empty() {
        let mut by_date: Vec<&OpenBalance> = unplaced.open.iter().collect();
        by_date.sort_by(|a, b| compare_dates(a.date, b.date));
        let upcoming: Money = by_date.iter().take(3).map(|o| o.remaining).sum();
        let margin = amount.decimal() * Decimal::new(5, 2);
        if (upcoming - amount).abs().decimal() < margin {
            out.push(suggestion(
                SuggestionKind::FutureInvoices,
                75.0,
                format!("Import similar a factures pendents futures ({upcoming}€)"),
                "Revisar factures del proper trimestre",
            ));
        }

        let paid = digits(amount);
        if let Some(inv) = unplaced
            .open
            .iter()
            .find(|o| differs_in_two_digits(&paid, &digits(o.remaining)))
        {
            let mut s = suggestion(
                SuggestionKind::DigitError,
                60.0,
                format!("Possible error de digitació - Similar a factura de {}€", inv.remaining),
                "Verificar import amb el banc",
            );
            s.invoice_ref = Some(inv.key.clone());
            out.push(s);
        }
    }

    if let Some(history) = unplaced.history.filter(|h| h.len() >= 3) {
        let total: Money = history.iter().map(|m| m.abs()).sum();
        let average = total.decimal() / Decimal::from(history.len());
        if amount.decimal() > average * Decimal::TWO {
            out.push(suggestion(
                SuggestionKind::UnusualAmount,
                50.0,
                format!("Import inusualment alt (mitjana: {:.2}€)", average),
                "Verificar si inclou múltiples períodes",
            ));
        } else if amount.decimal() < average / Decimal::TWO {
            out.push(suggestion(
                SuggestionKind::PartialPayment,
                65.0,
                format!("Possible pagament parcial (mitjana: {:.2}€)", average),
                "Esperar resta del pagament",
            ));
        }
    }

    if CREDIT_KEYWORDS.iter().any(|k| concept.contains(k)) || re_nc_word().is_match(&concept) {
        out.push(suggestion(
            SuggestionKind::CreditNote,
            80.0,
            "El concepte suggereix una nota de crèdit".to_string(),
            "Buscar nota de crèdit corresponent",
        ));
    }

    out
}

/// The most confident diagnosis, or `Unknown` when nothing applies.
pub fn suggest(unplaced: &Unplaced<'_>, small_amount_threshold: Decimal) -> Suggestion {
    let mut all = candidates(unplaced, small_amount_threshold);
    all.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    all.into_iter().next().unwrap_or_else(|| {
        suggestion(
            SuggestionKind::Unknown,
            0.0,
            "No s'ha pogut determinar el motiu".to_string(),
            "Revisar manualment amb documentació bancària",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(key: &str, day: Option<u32>, cents: i64) -> OpenBalance {
        OpenBalance {
            key: key.to_string(),
            date: day.and_then(|d| NaiveDate::from_ymd_opt(2024, 1, d)),
            remaining: Money::from_cents(cents),
        }
    }

    fn run(cents: i64, concept: Option<&str>, open: &[OpenBalance], history: Option<&[Money]>) -> Suggestion {
        let unplaced = Unplaced {
            amount: Money::from_cents(cents),
            concept,
            open,
            history,
        };
        suggest(&unplaced, Decimal::from(50))
    }

    #[test]
    fn small_amount_wins() {
        let s = run(1250, Some("comision"), &[], None);
        assert_eq!(s.kind, SuggestionKind::SmallAmount);
        assert_eq!(s.confidence, 90.0);
        assert_eq!(s.message, "Import petit (12.50€) - Possible comissió bancària o arrodoniment");
        assert_eq!(s.action, "Classificar com a despesa bancària");
    }

    #[test]
    fn advance_payment_beats_credit_note() {
        let s = run(100000, Some("Anticipo abono"), &[], None);
        assert_eq!(s.kind, SuggestionKind::AdvancePayment);
    }

    #[test]
    fn credit_note_whole_word_only() {
        assert_eq!(run(100000, Some("ref NC 12"), &[], None).kind, SuggestionKind::CreditNote);
        assert_eq!(run(100000, Some("financiacion"), &[], None).kind, SuggestionKind::Unknown);
    }

    #[test]
    fn future_invoices_by_date_order() {
        let open = [
            open("c", None, 900000),
            open("a", Some(5), 30000),
            open("b", Some(2), 70000),
        ];
        // b and a sum to the payment; the undated c sorts third and overshoots.
        let s = run(100000, None, &open[1..], None);
        assert_eq!(s.kind, SuggestionKind::FutureInvoices);
        let s = run(100000, None, &open, None);
        assert_ne!(s.kind, SuggestionKind::FutureInvoices);
    }

    #[test]
    fn digit_error_points_at_invoice() {
        let open = [open("k1", Some(1), 50000), open("k2", Some(2), 13245)];
        let s = run(12345, None, &open, None);
        assert_eq!(s.kind, SuggestionKind::DigitError);
        assert_eq!(s.invoice_ref.as_deref(), Some("k2"));
    }

    #[test]
    fn history_bands() {
        let history = [Money::from_cents(10000); 3];
        assert_eq!(run(50000, None, &[], Some(&history[..])).kind, SuggestionKind::UnusualAmount);
        assert_eq!(run(6000, None, &[], Some(&history[..])).kind, SuggestionKind::Unknown);
        let big = [Money::from_cents(100000); 3];
        assert_eq!(run(10000, None, &[], Some(&big[..])).kind, SuggestionKind::PartialPayment);
        assert_eq!(run(10000, None, &[], Some(&big[..2])).kind, SuggestionKind::Unknown);
    }

    #[test]
    fn nothing_applies() {
        let s = run(100000, None, &[], None);
        assert_eq!(s.kind, SuggestionKind::Unknown);
        assert_eq!(s.confidence, 0.0);
        assert_eq!(s.message, "No s'ha pogut determinar el motiu");
    }
}
