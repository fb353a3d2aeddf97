use chrono::NaiveDate;
use conciliador_core::{compare_dates, AllocationRecord, Money, PendingItem};
use std::collections::HashMap;

/// Still-open invoices as of `today`, one row per invoice key. The latest
/// record for a key (by set id, then payment date) carries its final residual.
pub fn project(records: &[AllocationRecord], tolerance: Money, today: NaiveDate) -> Vec<PendingItem> {
    let mut touching: Vec<&AllocationRecord> =
        records.iter().filter(|r| r.invoice_key.is_some()).collect();
    touching.sort_by(|a, b| {
        a.set_id
            .cmp(&b.set_id)
            .then_with(|| compare_dates(a.payment_date, b.payment_date))
    });

    let mut order: Vec<&str> = Vec::new();
    let mut last: HashMap<&str, &AllocationRecord> = HashMap::new();
    for record in touching {
        let Some(key) = record.invoice_key.as_deref() else {
            continue;
        };
        if last.insert(key, record).is_none() {
            order.push(key);
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let record = last.get(key)?;
            let pending = record.residual?;
            if !pending.exceeds(tolerance) {
                return None;
            }
            Some(PendingItem {
                counterparty: record.counterparty.clone(),
                invoice_key: key.to_string(),
                pending,
                invoice_date: record.invoice_date,
                age_days: record
                    .invoice_date
                    .map(|date| (today - date).num_days().max(0)),
            })
        })
        .collect()
}
