//! Find-or-create resolution of a job and its associations from nested
//! attributes.
//!
//! Resolution order is company, location, category, job. A matched company or
//! job has the supplied attributes merged in and is written back even when
//! nothing changed. Categories are only ever looked up. The whole call runs in
//! one immediate transaction, so a failing step leaves nothing behind.

use tracing::{debug, info, info_span};

use crate::categories::CategoryCatalog;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    present, Company, CompanyAttributes, Job, JobAttributes, JobCategory, JobCategoryAttributes,
    JobListing, Location, LocationAttributes,
};

pub struct JobFactory<'a> {
    db: &'a Database,
    categories: CategoryCatalog,
}

impl<'a> JobFactory<'a> {
    /// Loads the category catalog from `db`.
    pub fn new(db: &'a Database) -> Result<Self> {
        let categories = CategoryCatalog::load(db)?;
        Ok(Self::with_catalog(db, categories))
    }

    pub fn with_catalog(db: &'a Database, categories: CategoryCatalog) -> Self {
        Self { db, categories }
    }

    pub fn categories(&self) -> &CategoryCatalog {
        &self.categories
    }

    /// Resolves `attrs` into a single persisted job with its company, location
    /// and category loaded.
    pub fn produce(&self, attrs: &JobAttributes) -> Result<JobListing> {
        let span = info_span!(
            "produce",
            title = present(&attrs.title).unwrap_or_default(),
            company = present(&attrs.company_attributes.name).unwrap_or_default(),
        );
        let _enter = span.enter();

        let tx = self.db.immediate_transaction()?;
        let listing = self.resolve(attrs)?;
        tx.commit()?;
        Ok(listing)
    }

    fn resolve(&self, attrs: &JobAttributes) -> Result<JobListing> {
        let company = self.resolve_company(&attrs.company_attributes)?;
        let location = attrs
            .location_attributes
            .as_ref()
            .map(|l| self.resolve_location(l))
            .transpose()?;
        let category = attrs
            .job_category_attributes
            .as_ref()
            .map(|c| self.resolve_category(c).clone());
        let job = self.resolve_job(attrs, &company, location.as_ref(), category.as_ref())?;
        self.db.load_listing(job)
    }

    fn resolve_company(&self, attrs: &CompanyAttributes) -> Result<Company> {
        let draft = Company::from_attributes(attrs);
        match self.db.find_company_by_name(&draft.name)? {
            Some(mut company) => {
                company.merge(attrs);
                company.validate()?;
                let company = self.db.update_company(&company)?;
                info!(company_id = company.id, name = %company.name, "updated company");
                Ok(company)
            }
            None => {
                draft.validate()?;
                let company = self.db.insert_company(&draft)?;
                info!(company_id = company.id, name = %company.name, "created company");
                Ok(company)
            }
        }
    }

    fn resolve_location(&self, attrs: &LocationAttributes) -> Result<Location> {
        let (street1, city, region) = attrs.identity();
        if let Some(location) = self.db.find_location(street1, city, region)? {
            debug!(location_id = location.id, "matched location");
            return Ok(location);
        }
        let draft = Location::from_attributes(attrs);
        draft.validate()?;
        let location = self.db.insert_location(&draft)?;
        info!(location_id = location.id, "created location");
        Ok(location)
    }

    fn resolve_category(&self, attrs: &JobCategoryAttributes) -> &JobCategory {
        match present(&attrs.name) {
            Some(name) => self.categories.resolve(name),
            None => self.categories.unknown(),
        }
    }

    fn resolve_job(
        &self,
        attrs: &JobAttributes,
        company: &Company,
        location: Option<&Location>,
        category: Option<&JobCategory>,
    ) -> Result<Job> {
        let location_id = location.map(|l| l.id);
        let draft = Job::from_attributes(
            attrs,
            company.id,
            location_id,
            category.unwrap_or_else(|| self.categories.unknown()).id,
        );

        match self.db.find_job(&draft.title, company.id)? {
            Some(mut job) => {
                job.merge(attrs);
                if location_id.is_some() {
                    job.location_id = location_id;
                }
                if let Some(category) = category {
                    job.job_category_id = category.id;
                }
                job.validate()?;
                let job = self.db.update_job(&job)?;
                info!(job_id = job.id, title = %job.title, "updated job");
                Ok(job)
            }
            None => {
                draft.validate()?;
                let job = self.db.insert_job(&draft)?;
                info!(job_id = job.id, title = %job.title, "created job");
                Ok(job)
            }
        }
    }
}
