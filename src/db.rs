use anyhow::{anyhow, Context};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::categories::SEED_CATEGORIES;
use crate::error::{Result, ValidationError};
use crate::models::{
    Company, Job, JobApplication, JobCategory, JobListing, Location, APPLIED_STATUS,
};

const COMPANY_COLUMNS: &str = "id, name, description, website, created_at, updated_at";
const LOCATION_COLUMNS: &str =
    "id, street1, street2, city, region, postal_code, country, created_at, updated_at";
const JOB_COLUMNS: &str = "id, company_id, location_id, job_category_id, title, description, \
     status, url, salary_bottom, salary_top, created_at, updated_at";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::configure(&conn)?;
        debug!(path = %path.display(), "opened database");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Fresh, initialised in-memory database.
    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    fn configure(conn: &Connection) -> anyhow::Result<()> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobboard") {
            proj_dirs.data_dir().join("jobboard.db")
        } else {
            PathBuf::from("jobboard.db")
        }
    }

    pub fn init(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                website TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                street1 TEXT,
                street2 TEXT,
                city TEXT,
                region TEXT,
                postal_code TEXT,
                country TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS job_categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                location_id INTEGER REFERENCES locations(id),
                job_category_id INTEGER NOT NULL REFERENCES job_categories(id),
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'Open' CHECK (status IN ('Open', 'Closed')),
                url TEXT,
                salary_bottom INTEGER,
                salary_top INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (company_id, title)
            );

            CREATE TABLE IF NOT EXISTS job_applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES jobs(id),
                applicant TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Applied',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_locations_identity ON locations(street1, city, region);
            CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company_id);
            CREATE INDEX IF NOT EXISTS idx_applications_applicant ON job_applications(applicant);
            CREATE INDEX IF NOT EXISTS idx_applications_job ON job_applications(job_id);
            "#,
        )?;
        self.seed_categories()?;
        info!(path = %self.path.display(), "database initialized");
        Ok(())
    }

    fn seed_categories(&self) -> anyhow::Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO job_categories (name, display_name, position) VALUES (?1, ?2, ?3)",
        )?;
        for (position, (name, display_name)) in SEED_CATEGORIES.iter().enumerate() {
            stmt.execute(params![name, display_name, position as i64])?;
        }
        Ok(())
    }

    pub fn ensure_initialized(&self) -> anyhow::Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!(
                "Database not initialized. Run 'jobboard init' first."
            ));
        }
        Ok(())
    }

    /// Starts a `BEGIN IMMEDIATE` transaction on this connection. Statements
    /// issued through `self` while it is alive belong to it.
    pub fn immediate_transaction(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    #[cfg(test)]
    fn count(&self, table: &'static str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    // --- Company operations ---

    pub fn find_company_by_name(&self, name: &str) -> Result<Option<Company>> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE name = ?1");
        Ok(self
            .conn
            .query_row(&sql, [name], Self::row_to_company)
            .optional()?)
    }

    pub fn get_company(&self, id: i64) -> Result<Option<Company>> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [id], Self::row_to_company)
            .optional()?)
    }

    pub fn insert_company(&self, company: &Company) -> Result<Company> {
        let now = now();
        self.conn.execute(
            "INSERT INTO companies (name, description, website, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![company.name, company.description, company.website, now],
        )?;
        self.reload_company(self.conn.last_insert_rowid())
    }

    /// Writes every mutable column and bumps `updated_at`, changed or not.
    pub fn update_company(&self, company: &Company) -> Result<Company> {
        self.conn.execute(
            "UPDATE companies SET description = ?1, website = ?2, updated_at = ?3 WHERE id = ?4",
            params![company.description, company.website, now(), company.id],
        )?;
        self.reload_company(company.id)
    }

    fn reload_company(&self, id: i64) -> Result<Company> {
        self.get_company(id)?
            .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
    }

    #[cfg(test)]
    pub fn count_companies(&self) -> Result<i64> {
        self.count("companies")
    }

    fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<Company> {
        Ok(Company {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            website: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    // --- Location operations ---

    /// Matches on `(street1, city, region)`; `None` only matches a stored NULL.
    pub fn find_location(
        &self,
        street1: Option<&str>,
        city: Option<&str>,
        region: Option<&str>,
    ) -> Result<Option<Location>> {
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM locations
             WHERE street1 IS ?1 AND city IS ?2 AND region IS ?3
             ORDER BY id LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![street1, city, region], Self::row_to_location)
            .optional()?)
    }

    pub fn get_location(&self, id: i64) -> Result<Option<Location>> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [id], Self::row_to_location)
            .optional()?)
    }

    pub fn insert_location(&self, location: &Location) -> Result<Location> {
        let now = now();
        self.conn.execute(
            "INSERT INTO locations (street1, street2, city, region, postal_code, country, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                location.street1,
                location.street2,
                location.city,
                location.region,
                location.postal_code,
                location.country,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_location(id)?
            .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
    }

    #[cfg(test)]
    pub fn count_locations(&self) -> Result<i64> {
        self.count("locations")
    }

    fn row_to_location(row: &rusqlite::Row) -> rusqlite::Result<Location> {
        Ok(Location {
            id: row.get(0)?,
            street1: row.get(1)?,
            street2: row.get(2)?,
            city: row.get(3)?,
            region: row.get(4)?,
            postal_code: row.get(5)?,
            country: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    // --- Category operations ---

    pub fn list_categories(&self) -> Result<Vec<JobCategory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, display_name FROM job_categories ORDER BY position, id",
        )?;
        let rows = stmt.query_map([], Self::row_to_category)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_category(&self, id: i64) -> Result<Option<JobCategory>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, display_name FROM job_categories WHERE id = ?1",
                [id],
                Self::row_to_category,
            )
            .optional()?)
    }

    #[cfg(test)]
    pub fn count_categories(&self) -> Result<i64> {
        self.count("job_categories")
    }

    fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<JobCategory> {
        Ok(JobCategory {
            id: row.get(0)?,
            name: row.get(1)?,
            display_name: row.get(2)?,
        })
    }

    // --- Job operations ---

    pub fn find_job(&self, title: &str, company_id: i64) -> Result<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE company_id = ?1 AND title = ?2");
        Ok(self
            .conn
            .query_row(&sql, params![company_id, title], Self::row_to_job)
            .optional()?)
    }

    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
        Ok(self.conn.query_row(&sql, [id], Self::row_to_job).optional()?)
    }

    pub fn insert_job(&self, job: &Job) -> Result<Job> {
        let now = now();
        self.conn.execute(
            "INSERT INTO jobs (company_id, location_id, job_category_id, title, description,
                               status, url, salary_bottom, salary_top, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                job.company_id,
                job.location_id,
                job.job_category_id,
                job.title,
                job.description,
                job.status,
                job.url,
                job.salary_bottom,
                job.salary_top,
                now
            ],
        )?;
        self.reload_job(self.conn.last_insert_rowid())
    }

    /// Writes every mutable column and bumps `updated_at`, changed or not.
    pub fn update_job(&self, job: &Job) -> Result<Job> {
        self.conn.execute(
            "UPDATE jobs SET location_id = ?1, job_category_id = ?2, description = ?3, status = ?4,
                             url = ?5, salary_bottom = ?6, salary_top = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                job.location_id,
                job.job_category_id,
                job.description,
                job.status,
                job.url,
                job.salary_bottom,
                job.salary_top,
                now(),
                job.id
            ],
        )?;
        self.reload_job(job.id)
    }

    fn reload_job(&self, id: i64) -> Result<Job> {
        self.get_job(id)?
            .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
    }

    #[cfg(test)]
    pub fn count_jobs(&self) -> Result<i64> {
        self.count("jobs")
    }

    /// Loads the job with its company, location and category.
    pub fn get_job_listing(&self, id: i64) -> Result<Option<JobListing>> {
        match self.get_job(id)? {
            Some(job) => Ok(Some(self.load_listing(job)?)),
            None => Ok(None),
        }
    }

    pub fn load_listing(&self, job: Job) -> Result<JobListing> {
        let company = self
            .get_company(job.company_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        let location = match job.location_id {
            Some(id) => self.get_location(id)?,
            None => None,
        };
        let category = self
            .get_category(job.job_category_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(JobListing {
            job,
            company,
            location,
            category,
        })
    }

    pub fn list_job_listings(&self) -> Result<Vec<JobListing>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC, id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let jobs = stmt
            .query_map([], Self::row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        jobs.into_iter().map(|job| self.load_listing(job)).collect()
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        Ok(Job {
            id: row.get(0)?,
            company_id: row.get(1)?,
            location_id: row.get(2)?,
            job_category_id: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            status: row.get(6)?,
            url: row.get(7)?,
            salary_bottom: row.get(8)?,
            salary_top: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    // --- Application operations ---

    pub fn create_application(&self, job_id: i64, applicant: &str) -> Result<JobApplication> {
        let mut errors = ValidationError::new("JobApplication");
        if applicant.trim().is_empty() {
            errors.add("Applicant can't be blank");
        }
        if self.get_job(job_id)?.is_none() {
            errors.add("Job must exist");
        }
        errors.into_result()?;

        let now = now();
        self.conn.execute(
            "INSERT INTO job_applications (job_id, applicant, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![job_id, applicant.trim(), APPLIED_STATUS, now],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(application_id = id, job_id, applicant, "created job application");

        let sql = format!("{} WHERE a.id = ?1", Self::APPLICATION_SELECT);
        Ok(self.conn.query_row(&sql, [id], Self::row_to_application)?)
    }

    const APPLICATION_SELECT: &'static str =
        "SELECT a.id, a.job_id, a.applicant, a.status, j.title, c.name, a.created_at, a.updated_at
         FROM job_applications a
         JOIN jobs j ON a.job_id = j.id
         JOIN companies c ON j.company_id = c.id";

    /// Applications of one applicant, or the whole feed when `applicant` is `None`.
    pub fn list_applications(&self, applicant: Option<&str>) -> Result<Vec<JobApplication>> {
        let mut sql = String::from(Self::APPLICATION_SELECT);
        if applicant.is_some() {
            sql.push_str(" WHERE a.applicant = ?1");
        }
        sql.push_str(" ORDER BY a.created_at DESC, a.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if let Some(a) = applicant {
            stmt.query_map([a], Self::row_to_application)?
        } else {
            stmt.query_map([], Self::row_to_application)?
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<JobApplication> {
        Ok(JobApplication {
            id: row.get(0)?,
            job_id: row.get(1)?,
            applicant: row.get(2)?,
            status: row.get(3)?,
            job_title: row.get(4)?,
            company_name: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

/// UTC timestamp with millisecond precision, sortable as text.
pub fn now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}
