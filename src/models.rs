use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single cell as the file reader hands it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Empty,
}

impl RawValue {
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            RawValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }
}

/// One source record: header name -> cell.
pub type RawRow = BTreeMap<String, RawValue>;

/// Canonical transaction, ready for categorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub patient: String,
    pub description: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BaseInfusion,
    InfusionAddon,
    StandaloneInjection,
    WeightLossMedication,
    MembershipOrAdmin,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::BaseInfusion,
        Category::InfusionAddon,
        Category::StandaloneInjection,
        Category::WeightLossMedication,
        Category::MembershipOrAdmin,
        Category::Other,
    ];

    /// Categories whose most frequent services are reported each week.
    pub const TOP_SERVICES: [Category; 3] = [
        Category::BaseInfusion,
        Category::StandaloneInjection,
        Category::MembershipOrAdmin,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::BaseInfusion => "base_infusion",
            Self::InfusionAddon => "infusion_addon",
            Self::StandaloneInjection => "standalone_injection",
            Self::WeightLossMedication => "weight_loss_medication",
            Self::MembershipOrAdmin => "membership_or_admin",
            Self::Other => "other",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BaseInfusion => "Base Infusions",
            Self::InfusionAddon => "Infusion Add-ons",
            Self::StandaloneInjection => "Injections",
            Self::WeightLossMedication => "Weight Loss",
            Self::MembershipOrAdmin => "Memberships & Admin",
            Self::Other => "Other",
        }
    }

    pub fn from_key(key: &str) -> Option<Category> {
        Self::ALL.iter().find(|c| c.key() == key).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipType {
    Individual,
    Family,
    Concierge,
    Corporate,
    FamilyConcierge,
    DripConcierge,
    Unknown,
}

impl MembershipType {
    pub const ALL: [MembershipType; 7] = [
        MembershipType::Individual,
        MembershipType::Family,
        MembershipType::Concierge,
        MembershipType::Corporate,
        MembershipType::FamilyConcierge,
        MembershipType::DripConcierge,
        MembershipType::Unknown,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Family => "family",
            Self::Concierge => "concierge",
            Self::Corporate => "corporate",
            Self::FamilyConcierge => "family_concierge",
            Self::DripConcierge => "drip_concierge",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_key(key: &str) -> Option<MembershipType> {
        Self::ALL.iter().find(|m| m.key() == key).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEvent {
    pub patient: String,
    pub membership_type: MembershipType,
    pub is_new: bool,
}

/// A transaction that matched no specific rule, kept for rule-table curation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmappedService {
    pub date: NaiveDate,
    pub patient: String,
    pub description: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCount {
    pub description: String,
    pub count: usize,
}

/// Immutable summary of one Monday-Sunday week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub revenue_by_category: BTreeMap<Category, f64>,
    pub transactions_by_category: BTreeMap<Category, usize>,
    pub total_revenue: f64,
    pub unique_customers: usize,
    pub membership_counts: BTreeMap<MembershipType, usize>,
    pub new_membership_counts: BTreeMap<MembershipType, usize>,
    pub top_services: BTreeMap<Category, Vec<ServiceCount>>,
}

/// Revenue summary over an arbitrary inclusive date range (e.g. a month).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub revenue_by_category: BTreeMap<Category, f64>,
    pub transactions_by_category: BTreeMap<Category, usize>,
    pub total_revenue: f64,
    pub unique_customers: usize,
}
