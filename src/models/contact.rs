use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Result, ScrapeError};
use crate::extraction::patterns::{GENERIC_EMAIL_PREFIXES, PERSONAL_DOMAINS};
use crate::extraction::{CardExtraction, FieldName};

const TOP_DOMAIN_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainType {
    Business,
    Personal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    High,
    Medium,
    Low,
}

/// What a caller demands of every record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPolicy {
    #[serde(default)]
    pub required_fields: Vec<FieldName>,
    /// Fill a missing name from the email mailbox (`jane.doe@` -> `Jane Doe`)
    #[serde(default)]
    pub derive_name_from_email: bool,
}

/// One structured contact built from a card's extracted fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub card_index: usize,
    pub match_confidence: u8,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub profile_url: Option<String>,
    pub domain: Option<String>,
    pub domain_type: DomainType,
    pub completeness: Completeness,
    #[serde(default)]
    pub name_derived: bool,
    pub field_confidence: BTreeMap<FieldName, f64>,
}

impl ContactRecord {
    pub fn from_extraction(
        card_index: usize,
        match_confidence: u8,
        extraction: &CardExtraction,
        policy: &RecordPolicy,
    ) -> Result<Self> {
        let field = |f: FieldName| extraction.value(f).map(str::to_string);

        let email = field(FieldName::Email);
        let mut name = field(FieldName::Name);
        let mut name_derived = false;
        if name.is_none() && policy.derive_name_from_email {
            name = email.as_deref().and_then(derive_name_from_email);
            name_derived = name.is_some();
        }

        let domain = email.as_deref().and_then(extract_domain);
        let phone = field(FieldName::Phone);

        let record = Self {
            card_index,
            match_confidence,
            completeness: completeness(name.is_some(), email.is_some(), phone.is_some()),
            domain_type: classify_domain(domain.as_deref()),
            domain,
            name,
            email,
            phone,
            title: field(FieldName::Title),
            location: field(FieldName::Location),
            profile_url: field(FieldName::ProfileUrl),
            name_derived,
            field_confidence: extraction
                .results
                .iter()
                .filter(|(_, r)| r.validated)
                .map(|(f, r)| (*f, r.confidence))
                .collect(),
        };

        for required in &policy.required_fields {
            if record.get(*required).is_none() {
                return Err(ScrapeError::MissingRequiredField(*required));
            }
        }
        Ok(record)
    }

    pub fn get(&self, field: FieldName) -> Option<&str> {
        match field {
            FieldName::Email => self.email.as_deref(),
            FieldName::Phone => self.phone.as_deref(),
            FieldName::Name => self.name.as_deref(),
            FieldName::Title => self.title.as_deref(),
            FieldName::ProfileUrl => self.profile_url.as_deref(),
            FieldName::Location => self.location.as_deref(),
        }
    }
}

pub fn extract_domain(email: &str) -> Option<String> {
    let (_, domain) = email.split_once('@')?;
    let domain = domain.trim().to_lowercase();
    (!domain.is_empty()).then_some(domain)
}

/// Unknown domains count as personal
pub fn classify_domain(domain: Option<&str>) -> DomainType {
    match domain {
        Some(d) if !PERSONAL_DOMAINS.contains(&d) => DomainType::Business,
        _ => DomainType::Personal,
    }
}

pub fn completeness(has_name: bool, has_email: bool, has_phone: bool) -> Completeness {
    if has_name && has_email && has_phone {
        Completeness::High
    } else if (has_name && has_email) || (has_email && has_phone) {
        Completeness::Medium
    } else {
        Completeness::Low
    }
}

/// Best-effort name from a mailbox; `None` for generic mailboxes.
pub fn derive_name_from_email(email: &str) -> Option<String> {
    let (mailbox, _) = email.split_once('@')?;
    let mailbox = mailbox.to_lowercase();
    if GENERIC_EMAIL_PREFIXES.contains(&mailbox.as_str()) {
        return None;
    }

    let parts: Vec<String> = mailbox
        .split(|c| matches!(c, '.' | '_' | '-'))
        .map(|part| part.chars().filter(|c| !c.is_ascii_digit()).collect::<String>())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) if part.chars().count() == 1 => format!("{}.", first.to_uppercase()),
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();

    (!parts.is_empty()).then(|| parts.join(" "))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: usize,
    pub percentage: f64,
}

/// Aggregate numbers over one batch of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub with_email: usize,
    pub with_name: usize,
    pub with_phone: usize,
    pub complete: usize,
    pub with_name_pct: f64,
    pub with_phone_pct: f64,
    pub complete_pct: f64,
    pub business_email_count: usize,
    pub personal_email_count: usize,
    pub unique_domains: usize,
    pub business_domains: usize,
    pub personal_domains: usize,
    /// Share of all records, ten at most
    pub top_domains: Vec<DomainCount>,
    /// Share of business emails, ten at most
    pub top_business_domains: Vec<DomainCount>,
}

impl BatchStats {
    pub fn from_records(records: &[ContactRecord]) -> Self {
        let total = records.len();
        let count = |pred: &dyn Fn(&ContactRecord) -> bool| records.iter().filter(|r| pred(r)).count();

        let with_email = count(&|r| r.email.is_some());
        let with_name = count(&|r| r.name.is_some());
        let with_phone = count(&|r| r.phone.is_some());
        let complete = count(&|r| r.completeness == Completeness::High);
        let business_email_count =
            count(&|r| r.email.is_some() && r.domain_type == DomainType::Business);
        let personal_email_count =
            count(&|r| r.email.is_some() && r.domain_type == DomainType::Personal);

        let mut domains: HashMap<&str, usize> = HashMap::new();
        let mut business: HashMap<&str, usize> = HashMap::new();
        let mut personal: HashSet<&str> = HashSet::new();
        for record in records {
            let Some(domain) = record.domain.as_deref() else {
                continue;
            };
            *domains.entry(domain).or_insert(0) += 1;
            match record.domain_type {
                DomainType::Business => *business.entry(domain).or_insert(0) += 1,
                DomainType::Personal => {
                    personal.insert(domain);
                }
            }
        }

        Self {
            total,
            with_email,
            with_name,
            with_phone,
            complete,
            with_name_pct: percentage(with_name, total),
            with_phone_pct: percentage(with_phone, total),
            complete_pct: percentage(complete, total),
            business_email_count,
            personal_email_count,
            unique_domains: domains.len(),
            business_domains: business.len(),
            personal_domains: personal.len(),
            top_domains: rank_domains(domains, total),
            top_business_domains: rank_domains(business, business_email_count),
        }
    }
}

/// Most frequent domains first, ties alphabetical
fn rank_domains(counts: HashMap<&str, usize>, denominator: usize) -> Vec<DomainCount> {
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_DOMAIN_LIMIT)
        .map(|(domain, n)| DomainCount {
            domain: domain.to_string(),
            count: n,
            percentage: percentage(n, denominator),
        })
        .collect()
}

/// Percentage rounded to one decimal
fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / total as f64).round() / 10.0
}
