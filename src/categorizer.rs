use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Category, MembershipEvent, MembershipType, Transaction, UnmappedService};

/// One entry of the ordered rule table.
///
/// Matches when the lowercased description contains any `any` token and none
/// of the `unless` tokens.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub category: Category,
    pub any: &'static [&'static str],
    pub unless: &'static [&'static str],
}

impl Rule {
    pub fn matches(&self, lowered: &str) -> bool {
        self.any.iter().any(|t| lowered.contains(t))
            && !self.unless.iter().any(|t| lowered.contains(t))
    }
}

const WEIGHT_LOSS: &[&str] = &["semaglutide", "tirzepatide", "contrave"];

/// Highest priority first. The first matching rule wins; no match is `Other`.
pub const RULES: &[Rule] = &[
    Rule {
        category: Category::WeightLossMedication,
        any: WEIGHT_LOSS,
        unless: &[],
    },
    Rule {
        category: Category::MembershipOrAdmin,
        any: &["membership", "lab", "office visit", "consultation"],
        unless: &[],
    },
    Rule {
        category: Category::BaseInfusion,
        any: &[
            "saline 1l",
            "hydration",
            "performance & recovery",
            "energy",
            "immunity",
            "alleviate",
            "all inclusive",
            "lux beauty",
            "methylene blue infusion",
        ],
        unless: &[],
    },
    Rule {
        category: Category::StandaloneInjection,
        any: &[
            "b12 injection",
            "metabolism boost injection",
            "vitamin d injection",
            "glutathione injection",
            "biotin injection",
            "xeomin",
        ],
        unless: WEIGHT_LOSS,
    },
    Rule {
        category: Category::InfusionAddon,
        any: &[
            "vitamin d3",
            "glutathione",
            "nad",
            "toradol",
            "magnesium",
            "vitamin b12",
            "zofran",
            "biotin",
            "vitamin c",
            "zinc",
        ],
        unless: &[],
    },
];

/// Case-insensitive scan of [`RULES`]. Total: every description gets a category.
pub fn categorize(description: &str) -> Category {
    let lowered = description.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.category)
        .unwrap_or(Category::Other)
}

// ---------------------------------------------------------------------------
// Membership typing
// ---------------------------------------------------------------------------

fn new_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bnew\b").expect("static regex"))
}

/// `(NEW)` or the standalone word `new`, in any case. Words that merely
/// contain it ("Renewal", "News") do not count.
pub fn is_new_signup(description: &str) -> bool {
    new_word().is_match(description)
}

pub fn membership_type(description: &str) -> MembershipType {
    let d = description.to_lowercase();
    let has = |t: &str| d.contains(t);
    if has("family") && has("concierge") {
        MembershipType::FamilyConcierge
    } else if has("concierge") && has("drip") {
        MembershipType::DripConcierge
    } else if has("individual") {
        MembershipType::Individual
    } else if has("family") {
        MembershipType::Family
    } else if has("concierge") {
        MembershipType::Concierge
    } else if has("corporate") {
        MembershipType::Corporate
    } else {
        MembershipType::Unknown
    }
}

/// A membership signup is a membership/admin row that names a membership;
/// labs, office visits and consultations on their own are not signups.
pub fn membership_event(txn: &Transaction, category: Category) -> Option<MembershipEvent> {
    if category != Category::MembershipOrAdmin
        || !txn.description.to_lowercase().contains("membership")
    {
        return None;
    }
    Some(MembershipEvent {
        patient: txn.patient.clone(),
        membership_type: membership_type(&txn.description),
        is_new: is_new_signup(&txn.description),
    })
}

// ---------------------------------------------------------------------------
// Batch classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub transaction: Transaction,
    pub category: Category,
    pub membership: Option<MembershipEvent>,
}

pub fn classify(txn: &Transaction) -> Classified {
    let category = categorize(&txn.description);
    Classified {
        transaction: txn.clone(),
        category,
        membership: membership_event(txn, category),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Categorized {
    pub rows: Vec<Classified>,
    pub unmapped: Vec<UnmappedService>,
}

/// Classify a batch, feeding every `Other` row to the unmapped side-channel.
/// Unmapped rows keep their place (and revenue) in `rows`.
pub fn categorize_batch(transactions: &[Transaction]) -> Categorized {
    let mut out = Categorized::default();
    for txn in transactions {
        let classified = classify(txn);
        if classified.category == Category::Other {
            tracing::warn!(
                date = %txn.date,
                description = %txn.description,
                amount = txn.amount,
                "unmapped service"
            );
            out.unmapped.push(UnmappedService {
                date: txn.date,
                patient: txn.patient.clone(),
                description: txn.description.clone(),
                amount: txn.amount,
            });
        }
        out.rows.push(classified);
    }
    out
}
