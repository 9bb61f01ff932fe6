use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const JOB_STATUSES: &[&str] = &["Open", "Closed"];
pub const DEFAULT_JOB_STATUS: &str = "Open";
pub const APPLIED_STATUS: &str = "Applied";

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$").expect("valid url regex"));

// --- Records ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCategory {
    pub id: i64,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub company_id: i64,
    pub location_id: Option<i64>,
    pub job_category_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: String, // "Open", "Closed"
    pub url: Option<String>,
    pub salary_bottom: Option<i64>,
    pub salary_top: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// A job with its associations loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    pub job: Job,
    pub company: Company,
    pub location: Option<Location>,
    pub category: JobCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: i64,
    pub job_id: i64,
    pub applicant: String,
    pub status: String,
    pub job_title: String,    // denormalized for listings
    pub company_name: String, // denormalized for listings
    pub created_at: String,
    pub updated_at: String,
}

// --- Nested attributes ---

/// Nested attributes describing a job, shaped like the form parameters
/// `{title, company_attributes: {...}, location_attributes: {...}, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobAttributes {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub url: Option<String>,
    pub salary_bottom: Option<i64>,
    pub salary_top: Option<i64>,
    #[serde(default)]
    pub company_attributes: CompanyAttributes,
    pub location_attributes: Option<LocationAttributes>,
    pub job_category_attributes: Option<JobCategoryAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyAttributes {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationAttributes {
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobCategoryAttributes {
    pub name: Option<String>,
}

/// Blank strings count as absent.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn present_owned(value: &Option<String>) -> Option<String> {
    present(value).map(str::to_string)
}

fn merge_field(target: &mut Option<String>, supplied: &Option<String>) {
    if let Some(v) = present(supplied) {
        *target = Some(v.to_string());
    }
}

fn url_is_valid(url: &str) -> bool {
    URL_RE.is_match(url)
}

// --- Company ---

impl Company {
    /// Unsaved company built from the full attribute mapping.
    pub fn from_attributes(attrs: &CompanyAttributes) -> Self {
        Self {
            id: 0,
            name: present_owned(&attrs.name).unwrap_or_default(),
            description: present_owned(&attrs.description),
            website: present_owned(&attrs.website),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// Merge every supplied mutable field; the name is the identity key and stays.
    pub fn merge(&mut self, attrs: &CompanyAttributes) {
        merge_field(&mut self.description, &attrs.description);
        merge_field(&mut self.website, &attrs.website);
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new("Company");
        if self.name.trim().is_empty() {
            errors.add("Name can't be blank");
        }
        if let Some(website) = &self.website {
            if !url_is_valid(website) {
                errors.add("Website is invalid");
            }
        }
        errors.into_result()
    }
}

// --- Location ---

impl LocationAttributes {
    /// The `(street1, city, region)` identity key, blanks normalised to `None`.
    pub fn identity(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        (
            present(&self.street1),
            present(&self.city),
            present(&self.region),
        )
    }
}

impl Location {
    pub fn from_attributes(attrs: &LocationAttributes) -> Self {
        Self {
            id: 0,
            street1: present_owned(&attrs.street1),
            street2: present_owned(&attrs.street2),
            city: present_owned(&attrs.city),
            region: present_owned(&attrs.region),
            postal_code: present_owned(&attrs.postal_code),
            country: present_owned(&attrs.country),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new("Location");
        if self.street1.is_none() && self.city.is_none() && self.region.is_none() {
            errors.add("Location must have a street, city, or region");
        }
        errors.into_result()
    }

    /// One-line address for listings.
    pub fn summary(&self) -> String {
        [&self.street1, &self.city, &self.region]
            .iter()
            .filter_map(|part| part.as_deref())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// --- Job ---

impl Job {
    pub fn from_attributes(
        attrs: &JobAttributes,
        company_id: i64,
        location_id: Option<i64>,
        job_category_id: i64,
    ) -> Self {
        Self {
            id: 0,
            company_id,
            location_id,
            job_category_id,
            title: present_owned(&attrs.title).unwrap_or_default(),
            description: present_owned(&attrs.description),
            status: present_owned(&attrs.status).unwrap_or_else(|| DEFAULT_JOB_STATUS.to_string()),
            url: present_owned(&attrs.url),
            salary_bottom: attrs.salary_bottom,
            salary_top: attrs.salary_top,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// Merge the supplied job-level fields. Title and company form the identity
    /// key and are left alone.
    pub fn merge(&mut self, attrs: &JobAttributes) {
        merge_field(&mut self.description, &attrs.description);
        merge_field(&mut self.url, &attrs.url);
        if let Some(status) = present(&attrs.status) {
            self.status = status.to_string();
        }
        if attrs.salary_bottom.is_some() {
            self.salary_bottom = attrs.salary_bottom;
        }
        if attrs.salary_top.is_some() {
            self.salary_top = attrs.salary_top;
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new("Job");
        if self.title.trim().is_empty() {
            errors.add("Title can't be blank");
        }
        if !JOB_STATUSES.contains(&self.status.as_str()) {
            errors.add("Status is not included in the list");
        }
        if let Some(url) = &self.url {
            if !url_is_valid(url) {
                errors.add("Url is invalid");
            }
        }
        if let Some(bottom) = self.salary_bottom {
            if bottom < 0 {
                errors.add("Salary bottom must be greater than or equal to 0");
            }
        }
        match (self.salary_bottom, self.salary_top) {
            (Some(bottom), Some(top)) if top < bottom => {
                errors.add("Salary top must be greater than or equal to salary bottom");
            }
            (None, Some(top)) if top < 0 => {
                errors.add("Salary top must be greater than or equal to 0");
            }
            _ => {}
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_attrs(title: &str) -> JobAttributes {
        JobAttributes {
            title: Some(title.to_string()),
            company_attributes: CompanyAttributes {
                name: Some("defaultco".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_deserialize_nested_attributes() {
        let attrs: JobAttributes = serde_json::from_str(
            r#"{
                "title": "realjob",
                "company_attributes": {"name": "defaultco"},
                "location_attributes": {"street1": "123 Fake St", "city": "Springfield", "region": "Illinois"},
                "job_category_attributes": {"name": "Software Development"}
            }"#,
        )
        .unwrap();

        assert_eq!(attrs.title.as_deref(), Some("realjob"));
        assert_eq!(attrs.company_attributes.name.as_deref(), Some("defaultco"));
        let location = attrs.location_attributes.unwrap();
        assert_eq!(
            location.identity(),
            (Some("123 Fake St"), Some("Springfield"), Some("Illinois"))
        );
        assert_eq!(
            attrs.job_category_attributes.unwrap().name.as_deref(),
            Some("Software Development")
        );
    }

    #[test]
    fn test_missing_company_block_deserializes_to_blank() {
        let attrs: JobAttributes = serde_json::from_str(r#"{"title": "realjob"}"#).unwrap();
        assert_eq!(attrs.company_attributes, CompanyAttributes::default());
        assert!(attrs.location_attributes.is_none());
    }

    #[test]
    fn test_job_defaults_to_open() {
        let job = Job::from_attributes(&job_attrs("realjob"), 1, None, 1);
        assert_eq!(job.status, "Open");
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_job_validation_messages() {
        let mut attrs = job_attrs("  ");
        attrs.status = Some("Pending".to_string());
        attrs.url = Some("not a url".to_string());
        attrs.salary_bottom = Some(90_000);
        attrs.salary_top = Some(60_000);

        let err = Job::from_attributes(&attrs, 1, None, 1).validate().unwrap_err();
        assert_eq!(err.entity, "Job");
        assert_eq!(
            err.messages,
            vec![
                "Title can't be blank",
                "Status is not included in the list",
                "Url is invalid",
                "Salary top must be greater than or equal to salary bottom",
            ]
        );
    }

    #[test]
    fn test_job_merge_keeps_unsupplied_fields() {
        let mut attrs = job_attrs("realjob");
        attrs.description = Some("Doing Real Things".to_string());
        attrs.url = Some("https://example.com/jobs/1".to_string());
        let mut job = Job::from_attributes(&attrs, 1, None, 1);

        let mut update = job_attrs("realjob");
        update.description = Some("".to_string());
        update.status = Some("Closed".to_string());
        job.merge(&update);

        assert_eq!(job.description.as_deref(), Some("Doing Real Things"));
        assert_eq!(job.url.as_deref(), Some("https://example.com/jobs/1"));
        assert_eq!(job.status, "Closed");
    }

    #[test]
    fn test_company_validation() {
        let company = Company::from_attributes(&CompanyAttributes {
            name: None,
            description: None,
            website: Some("ftp://defaultco".to_string()),
        });
        let err = company.validate().unwrap_err();
        assert_eq!(err.messages, vec!["Name can't be blank", "Website is invalid"]);
    }

    #[test]
    fn test_location_requires_some_address() {
        let blank = Location::from_attributes(&LocationAttributes {
            country: Some("USA".to_string()),
            ..Default::default()
        });
        assert!(blank.validate().is_err());

        let city_only = Location::from_attributes(&LocationAttributes {
            city: Some("Springfield".to_string()),
            ..Default::default()
        });
        assert!(city_only.validate().is_ok());
        assert_eq!(city_only.summary(), "Springfield");
    }
}
