use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

use super::contact::{BatchStats, ContactRecord};

const CSV_HEADERS: [&str; 11] = [
    "card_index",
    "name",
    "email",
    "phone",
    "title",
    "location",
    "profile_url",
    "domain",
    "domain_type",
    "completeness",
    "match_confidence",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// `contacts-2024-05-01T10-30-00-123Z.csv`
    pub fn file_name(self, at: DateTime<Utc>) -> String {
        format!(
            "contacts-{}.{}",
            at.format("%Y-%m-%dT%H-%M-%S-%3fZ"),
            self.extension()
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ExportMetadata<'a> {
    pub scraped_at: String,
    pub url: &'a str,
    pub total_contacts: usize,
    pub stats: BatchStats,
}

/// Document written by the JSON export
#[derive(Debug, Serialize)]
pub struct ContactExport<'a> {
    pub metadata: ExportMetadata<'a>,
    pub contacts: &'a [ContactRecord],
}

impl<'a> ContactExport<'a> {
    pub fn new(url: &'a str, contacts: &'a [ContactRecord], scraped_at: DateTime<Utc>) -> Self {
        Self {
            metadata: ExportMetadata {
                scraped_at: scraped_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                url,
                total_contacts: contacts.len(),
                stats: BatchStats::from_records(contacts),
            },
            contacts,
        }
    }
}

pub fn to_json(url: &str, records: &[ContactRecord], scraped_at: DateTime<Utc>) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ContactExport::new(url, records, scraped_at))?)
}

/// One row per record; absent fields are empty cells
pub fn to_csv(records: &[ContactRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADERS)?;
    for record in records {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        wtr.write_record([
            record.card_index.to_string(),
            opt(&record.name),
            opt(&record.email),
            opt(&record.phone),
            opt(&record.title),
            opt(&record.location),
            opt(&record.profile_url),
            opt(&record.domain),
            label(&record.domain_type)?,
            label(&record.completeness)?,
            record.match_confidence.to_string(),
        ])?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| ScrapeError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|e| ScrapeError::Internal(e.into()))
}

pub fn render(
    format: ExportFormat,
    url: &str,
    records: &[ContactRecord],
    scraped_at: DateTime<Utc>,
) -> Result<String> {
    match format {
        ExportFormat::Json => to_json(url, records, scraped_at),
        ExportFormat::Csv => to_csv(records),
    }
}

/// Serialized name of a unit enum variant
fn label<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Completeness, DomainType};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn record(index: usize, name: Option<&str>, email: &str, domain_type: DomainType) -> ContactRecord {
        ContactRecord {
            card_index: index,
            match_confidence: 92,
            name: name.map(str::to_string),
            email: Some(email.to_string()),
            phone: None,
            title: Some("Partner, Litigation".to_string()),
            location: None,
            profile_url: None,
            domain: email.split_once('@').map(|(_, d)| d.to_string()),
            domain_type,
            completeness: Completeness::Medium,
            name_derived: false,
            field_confidence: BTreeMap::new(),
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_csv_quotes_and_blanks() {
        let records = vec![
            record(0, Some("Doe, Jane"), "jane@firm.com", DomainType::Business),
            record(3, None, "sam@gmail.com", DomainType::Personal),
        ];
        let csv = to_csv(&records).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "card_index,name,email,phone,title,location,profile_url,domain,domain_type,completeness,match_confidence"
        );
        assert_eq!(
            lines[1],
            "0,\"Doe, Jane\",jane@firm.com,,\"Partner, Litigation\",,,firm.com,business,medium,92"
        );
        assert_eq!(
            lines[2],
            "3,,sam@gmail.com,,\"Partner, Litigation\",,,gmail.com,personal,medium,92"
        );
    }

    #[test]
    fn test_json_document_carries_metadata() {
        let records = vec![record(0, Some("Jane Doe"), "jane@firm.com", DomainType::Business)];
        let json = to_json("https://firm.example/team", &records, at()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["scraped_at"], "2024-05-01T10:30:00.000Z");
        assert_eq!(value["metadata"]["url"], "https://firm.example/team");
        assert_eq!(value["metadata"]["total_contacts"], 1);
        assert_eq!(value["metadata"]["stats"]["business_domains"], 1);
        assert_eq!(value["contacts"][0]["email"], "jane@firm.com");
    }

    #[test]
    fn test_format_names() {
        assert_eq!(ExportFormat::Csv.file_name(at()), "contacts-2024-05-01T10-30-00-000Z.csv");
        assert_eq!(
            serde_json::from_str::<ExportFormat>("\"csv\"").unwrap(),
            ExportFormat::Csv
        );
        assert_eq!(ExportFormat::default().content_type(), "application/json");
    }
}
