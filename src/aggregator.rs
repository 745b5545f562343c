use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::categorizer::{categorize_batch, Classified};
use crate::models::{
    Category, MembershipType, PeriodSummary, ServiceCount, Transaction, UnmappedService,
    WeeklyAggregate,
};
use crate::week::{DateRange, WeekRange};

pub const DEFAULT_TOP_SERVICES: usize = 3;

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Output of one weekly fold.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekResult {
    pub aggregate: WeeklyAggregate,
    /// `Other` rows inside the week, in source order.
    pub unmapped: Vec<UnmappedService>,
    /// Rows dropped because their date falls outside the week.
    pub out_of_range: usize,
}

struct RevenueFold {
    revenue: BTreeMap<Category, f64>,
    counts: BTreeMap<Category, usize>,
    total: f64,
    patients: BTreeSet<String>,
}

fn fold_revenue(rows: &[Classified]) -> RevenueFold {
    let mut revenue: BTreeMap<Category, f64> = Category::ALL.iter().map(|c| (*c, 0.0)).collect();
    let mut counts: BTreeMap<Category, usize> = Category::ALL.iter().map(|c| (*c, 0)).collect();
    let mut patients = BTreeSet::new();

    for row in rows {
        *revenue.entry(row.category).or_default() += row.transaction.amount;
        *counts.entry(row.category).or_default() += 1;
        let patient = row.transaction.patient.trim();
        if !patient.is_empty() {
            patients.insert(patient.to_string());
        }
    }

    for value in revenue.values_mut() {
        *value = round_cents(*value);
    }
    // total is the sum of the rounded categories
    let total: f64 = revenue.values().sum();

    RevenueFold {
        revenue,
        counts,
        total,
        patients,
    }
}

/// Distinct patients per membership type, overall and for new signups only.
fn membership_counts(
    rows: &[Classified],
) -> (BTreeMap<MembershipType, usize>, BTreeMap<MembershipType, usize>) {
    let mut seen: BTreeSet<(MembershipType, &str)> = BTreeSet::new();
    let mut seen_new: BTreeSet<(MembershipType, &str)> = BTreeSet::new();
    for event in rows.iter().filter_map(|r| r.membership.as_ref()) {
        let patient = event.patient.trim();
        if patient.is_empty() {
            continue;
        }
        seen.insert((event.membership_type, patient));
        if event.is_new {
            seen_new.insert((event.membership_type, patient));
        }
    }

    let tally = |set: &BTreeSet<(MembershipType, &str)>| {
        let mut counts: BTreeMap<MembershipType, usize> =
            MembershipType::ALL.iter().map(|m| (*m, 0)).collect();
        for (kind, _) in set {
            *counts.entry(*kind).or_default() += 1;
        }
        counts
    };
    (tally(&seen), tally(&seen_new))
}

/// Most frequent descriptions in `category`; ties keep first-seen order.
fn top_services(rows: &[Classified], category: Category, limit: usize) -> Vec<ServiceCount> {
    let mut order: Vec<ServiceCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for row in rows.iter().filter(|r| r.category == category) {
        let desc = row.transaction.description.as_str();
        match index.get(desc) {
            Some(&i) => order[i].count += 1,
            None => {
                index.insert(desc, order.len());
                order.push(ServiceCount {
                    description: desc.to_string(),
                    count: 1,
                });
            }
        }
    }
    // stable sort keeps first-seen order among equal counts
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(limit);
    order
}

fn in_range(transactions: &[Transaction], range: DateRange) -> (Vec<Transaction>, usize) {
    let kept: Vec<Transaction> = transactions
        .iter()
        .filter(|t| range.contains(t.date))
        .cloned()
        .collect();
    let dropped = transactions.len() - kept.len();
    (kept, dropped)
}

/// Fold a batch into the aggregate for `week`. Rows outside the week are
/// ignored; the same input always yields the same output.
pub fn aggregate_week(week: WeekRange, transactions: &[Transaction], top_k: usize) -> WeekResult {
    let (kept, out_of_range) = in_range(transactions, week.range());
    let categorized = categorize_batch(&kept);
    let rows = &categorized.rows;

    let fold = fold_revenue(rows);
    let (membership_counts, new_membership_counts) = membership_counts(rows);
    let top_services = Category::TOP_SERVICES
        .iter()
        .map(|c| (*c, top_services(rows, *c, top_k)))
        .collect();

    tracing::debug!(
        week_start = %week.start(),
        rows = rows.len(),
        out_of_range,
        unmapped = categorized.unmapped.len(),
        "aggregated week"
    );

    WeekResult {
        aggregate: WeeklyAggregate {
            week_start: week.start(),
            week_end: week.end(),
            revenue_by_category: fold.revenue,
            transactions_by_category: fold.counts,
            total_revenue: fold.total,
            unique_customers: fold.patients.len(),
            membership_counts,
            new_membership_counts,
            top_services,
        },
        unmapped: categorized.unmapped,
        out_of_range,
    }
}

/// Same revenue fold over an arbitrary range, e.g. a calendar month.
pub fn aggregate_period(range: DateRange, transactions: &[Transaction]) -> PeriodSummary {
    let (kept, _) = in_range(transactions, range);
    let categorized = categorize_batch(&kept);
    let fold = fold_revenue(&categorized.rows);
    PeriodSummary {
        start: range.start,
        end: range.end,
        revenue_by_category: fold.revenue,
        transactions_by_category: fold.counts,
        total_revenue: fold.total,
        unique_customers: fold.patients.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::week::week_bounds;
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn txn(date: NaiveDate, patient: &str, description: &str, amount: f64) -> Transaction {
        Transaction {
            date,
            patient: patient.to_string(),
            description: description.to_string(),
            amount,
        }
    }

    fn week() -> WeekRange {
        week_bounds(ymd(2025, 8, 27)).unwrap()
    }

    fn sample() -> Vec<Transaction> {
        vec![
            txn(ymd(2025, 8, 25), "Jane Doe", "Hydration", 150.0),
            txn(ymd(2025, 8, 25), "Jane Doe", "Glutathione", 35.0),
            txn(ymd(2025, 8, 26), "Bob Roe", "Semaglutide Injection (Member)", 150.0),
            txn(ymd(2025, 8, 26), "Amy Poe", "B12 Injection (Member)", 20.0),
            txn(ymd(2025, 8, 27), "Amy Poe", "OFFICE VISIT Membership - Family (NEW)", 199.0),
            txn(ymd(2025, 8, 28), "Amy Poe", "Membership - Family", 199.0),
            txn(ymd(2025, 8, 29), "Cal Low", "Individual Membership", 99.0),
            txn(ymd(2025, 8, 30), "Dee Fox", "Energy", 175.0),
            txn(ymd(2025, 8, 31), "Eve Kim", "Gift Card", 50.0),
            txn(ymd(2025, 9, 1), "Out Side", "Hydration", 150.0),
            txn(ymd(2025, 8, 24), "Out Side", "Hydration", 150.0),
        ]
    }

    #[test]
    fn test_revenue_by_category() {
        let result = aggregate_week(week(), &sample(), DEFAULT_TOP_SERVICES);
        let agg = &result.aggregate;
        assert_eq!(agg.week_start, ymd(2025, 8, 25));
        assert_eq!(agg.week_end, ymd(2025, 8, 31));
        assert_eq!(agg.revenue_by_category[&Category::BaseInfusion], 325.0);
        assert_eq!(agg.revenue_by_category[&Category::InfusionAddon], 35.0);
        assert_eq!(agg.revenue_by_category[&Category::WeightLossMedication], 150.0);
        assert_eq!(agg.revenue_by_category[&Category::StandaloneInjection], 20.0);
        assert_eq!(agg.revenue_by_category[&Category::MembershipOrAdmin], 497.0);
        assert_eq!(agg.revenue_by_category[&Category::Other], 50.0);
        assert_eq!(agg.transactions_by_category[&Category::BaseInfusion], 2);
        assert_eq!(result.out_of_range, 2);
    }

    #[test]
    fn test_conservation() {
        let batch = vec![
            txn(ymd(2025, 8, 25), "A", "Hydration", 150.10),
            txn(ymd(2025, 8, 25), "A", "Zinc", 0.20),
            txn(ymd(2025, 8, 26), "B", "Mystery", 19.99),
            txn(ymd(2025, 8, 27), "C", "Lab Draw", 45.45),
        ];
        let agg = aggregate_week(week(), &batch, 3).aggregate;
        let by_cat: f64 = agg.revenue_by_category.values().sum();
        let direct: f64 = batch.iter().map(|t| t.amount).sum();
        assert!((by_cat - direct).abs() < 0.005, "{by_cat} vs {direct}");
        assert!((agg.total_revenue - direct).abs() < 0.005);
    }

    #[test]
    fn test_sub_cent_amounts_still_add_up() {
        let batch = vec![
            txn(ymd(2025, 8, 25), "A", "Hydration", 0.005),
            txn(ymd(2025, 8, 26), "B", "B12 Injection (Member)", 0.005),
        ];
        let agg = aggregate_week(week(), &batch, 3).aggregate;
        let by_cat: f64 = agg.revenue_by_category.values().sum();
        assert_eq!(agg.revenue_by_category[&Category::BaseInfusion], 0.01);
        assert_eq!(agg.revenue_by_category[&Category::StandaloneInjection], 0.01);
        assert_eq!(agg.total_revenue, by_cat);
        assert_eq!(agg.total_revenue, 0.02);
    }

    #[test]
    fn test_every_category_present() {
        let agg = aggregate_week(week(), &[], 3).aggregate;
        assert_eq!(agg.revenue_by_category.len(), Category::ALL.len());
        assert_eq!(agg.membership_counts.len(), MembershipType::ALL.len());
        assert_eq!(agg.unique_customers, 0);
        assert_eq!(agg.total_revenue, 0.0);
        assert_eq!(agg.top_services.len(), Category::TOP_SERVICES.len());
    }

    #[test]
    fn test_unique_customers_and_unmapped() {
        let result = aggregate_week(week(), &sample(), 3);
        // Jane, Bob, Amy, Cal, Dee, Eve; "Out Side" rows are out of range
        assert_eq!(result.aggregate.unique_customers, 6);
        assert_eq!(result.unmapped.len(), 1);
        assert_eq!(result.unmapped[0].description, "Gift Card");
    }

    #[test]
    fn test_membership_dedup() {
        let agg = aggregate_week(week(), &sample(), 3).aggregate;
        // Amy has two family rows, counted once
        assert_eq!(agg.membership_counts[&MembershipType::Family], 1);
        assert_eq!(agg.membership_counts[&MembershipType::Individual], 1);
        assert_eq!(agg.new_membership_counts[&MembershipType::Family], 1);
        assert_eq!(agg.new_membership_counts[&MembershipType::Individual], 0);
        for count in agg.membership_counts.values() {
            assert!(*count <= agg.unique_customers);
        }
    }

    #[test]
    fn test_duplicate_new_rows_counted_once() {
        let batch = vec![
            txn(ymd(2025, 8, 25), "Pat", "Concierge Membership (NEW)", 300.0),
            txn(ymd(2025, 8, 25), "Pat", "Concierge Membership (NEW)", 300.0),
            txn(ymd(2025, 8, 26), "Sam", "Concierge Membership (NEW)", 300.0),
        ];
        let agg = aggregate_week(week(), &batch, 3).aggregate;
        assert_eq!(agg.membership_counts[&MembershipType::Concierge], 2);
        assert_eq!(agg.new_membership_counts[&MembershipType::Concierge], 2);
        assert_eq!(agg.revenue_by_category[&Category::MembershipOrAdmin], 900.0);
    }

    #[test]
    fn test_top_services_ties_first_seen() {
        let d = ymd(2025, 8, 26);
        let batch = vec![
            txn(d, "A", "Energy", 1.0),
            txn(d, "B", "Immunity", 1.0),
            txn(d, "C", "Hydration", 1.0),
            txn(d, "D", "Alleviate", 1.0),
            txn(d, "E", "Hydration", 1.0),
            txn(d, "F", "Immunity", 1.0),
        ];
        let agg = aggregate_week(week(), &batch, 3).aggregate;
        let top: Vec<(&str, usize)> = agg.top_services[&Category::BaseInfusion]
            .iter()
            .map(|s| (s.description.as_str(), s.count))
            .collect();
        assert_eq!(top, vec![("Immunity", 2), ("Hydration", 2), ("Energy", 1)]);
        assert!(agg.top_services[&Category::StandaloneInjection].is_empty());
    }

    #[test]
    fn test_idempotent() {
        let a = aggregate_week(week(), &sample(), 3);
        let b = aggregate_week(week(), &sample(), 3);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a.aggregate).unwrap(),
            serde_json::to_string(&b.aggregate).unwrap()
        );
    }

    #[test]
    fn test_aggregate_period_month() {
        let range = crate::week::month_range(2025, 8).unwrap();
        let summary = aggregate_period(range, &sample());
        // everything but the September row
        assert_eq!(summary.total_revenue, 1227.0);
        assert_eq!(summary.unique_customers, 7);
        assert_eq!(summary.revenue_by_category[&Category::BaseInfusion], 475.0);
    }
}
