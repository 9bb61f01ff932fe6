mod categories;
mod db;
mod error;
mod factory;
mod logging;
mod models;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use db::Database;
use factory::JobFactory;
use models::{
    CompanyAttributes, JobAttributes, JobCategoryAttributes, JobListing, LocationAttributes,
    DEFAULT_JOB_STATUS,
};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "jobboard")]
#[command(about = "Job board - post jobs, resolve companies and locations, track applications")]
struct Cli {
    /// Path to the SQLite database (defaults to the user data directory)
    #[arg(long, global = true, env = "JOBBOARD_DB")]
    db: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and seed job categories
    Init,

    /// Post a job, creating or updating its company and location
    Post {
        #[command(flatten)]
        job: JobArgs,

        /// Print the resulting job as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply to a job, posting it first if needed
    Apply {
        #[command(flatten)]
        job: JobArgs,

        /// Applicant handle
        #[arg(short, long)]
        applicant: String,
    },

    /// List an applicant's applications
    Applications {
        /// Applicant handle
        #[arg(short, long)]
        applicant: String,
    },

    /// List every application, newest first
    Feed,

    /// List all jobs
    Jobs,

    /// Show job details
    Show {
        /// Job ID
        id: i64,
    },

    /// List job categories
    Categories,
}

/// Job attributes, either from flags or a nested JSON document. Flags given
/// alongside `--file` override the document.
#[derive(Args, Debug, Default)]
struct JobArgs {
    /// Read nested job attributes from a JSON file ("-" for stdin)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Job title
    #[arg(short, long)]
    title: Option<String>,

    /// Job description
    #[arg(short, long)]
    description: Option<String>,

    /// Job status (Open, Closed)
    #[arg(long)]
    status: Option<String>,

    /// Job posting URL
    #[arg(long)]
    url: Option<String>,

    #[arg(long)]
    salary_bottom: Option<i64>,

    #[arg(long)]
    salary_top: Option<i64>,

    /// Company name
    #[arg(short, long)]
    company: Option<String>,

    #[arg(long)]
    company_description: Option<String>,

    #[arg(long)]
    company_website: Option<String>,

    #[arg(long)]
    street1: Option<String>,

    #[arg(long)]
    street2: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    postal_code: Option<String>,

    #[arg(long)]
    country: Option<String>,

    /// Job category name
    #[arg(long)]
    category: Option<String>,
}

fn override_with(target: &mut Option<String>, flag: Option<String>) {
    if flag.is_some() {
        *target = flag;
    }
}

impl JobArgs {
    fn into_attributes(self) -> Result<JobAttributes> {
        let mut attrs = match &self.file {
            Some(path) => read_attributes(path)?,
            None => JobAttributes::default(),
        };

        override_with(&mut attrs.title, self.title);
        override_with(&mut attrs.description, self.description);
        override_with(&mut attrs.status, self.status);
        override_with(&mut attrs.url, self.url);
        if self.salary_bottom.is_some() {
            attrs.salary_bottom = self.salary_bottom;
        }
        if self.salary_top.is_some() {
            attrs.salary_top = self.salary_top;
        }

        let company: &mut CompanyAttributes = &mut attrs.company_attributes;
        override_with(&mut company.name, self.company);
        override_with(&mut company.description, self.company_description);
        override_with(&mut company.website, self.company_website);

        let address = [
            &self.street1,
            &self.street2,
            &self.city,
            &self.region,
            &self.postal_code,
            &self.country,
        ];
        if address.iter().any(|field| field.is_some()) {
            let location = attrs
                .location_attributes
                .get_or_insert_with(LocationAttributes::default);
            override_with(&mut location.street1, self.street1);
            override_with(&mut location.street2, self.street2);
            override_with(&mut location.city, self.city);
            override_with(&mut location.region, self.region);
            override_with(&mut location.postal_code, self.postal_code);
            override_with(&mut location.country, self.country);
        }

        if let Some(name) = self.category {
            attrs.job_category_attributes = Some(JobCategoryAttributes { name: Some(name) });
        }

        Ok(attrs)
    }
}

/// Applying always targets an open job, reopening a closed one.
fn application_attributes(job: JobArgs) -> Result<JobAttributes> {
    let mut attrs = job.into_attributes()?;
    attrs.status = Some(DEFAULT_JOB_STATUS.to_string());
    Ok(attrs)
}

fn read_attributes(path: &Path) -> Result<JobAttributes> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read job attributes from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job attributes: {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Failed to parse job attributes JSON")
}

fn print_listing(listing: &JobListing) {
    let job = &listing.job;
    println!("Job #{}", job.id);
    println!("Title: {}", job.title);
    println!("Company: {}", listing.company.name);
    if let Some(desc) = &listing.company.description {
        println!("  {}", desc);
    }
    println!("Category: {}", listing.category.display_name);
    println!("Status: {}", job.status);
    if let Some(location) = &listing.location {
        println!("Location: {}", location.summary());
    }
    if let Some(url) = &job.url {
        println!("URL: {}", url);
    }
    match (job.salary_bottom, job.salary_top) {
        (Some(min), Some(max)) => println!("Salary: ${} - ${}", min, max),
        (Some(min), None) => println!("Salary: ${}+", min),
        (None, Some(max)) => println!("Salary: up to ${}", max),
        (None, None) => {}
    }
    println!("Created: {}", job.created_at);
    println!("Updated: {}", job.updated_at);
    if let Some(desc) = &job.description {
        println!("\n{}", textwrap::fill(desc, 76));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let path = cli.db.unwrap_or_else(Database::default_path);
    let db = Database::open(&path)?;

    if !matches!(cli.command, Commands::Init) {
        db.ensure_initialized()?;
    }

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Post { job, json } => {
            let attrs = job.into_attributes()?;
            let factory = JobFactory::new(&db)?;
            let listing = factory.produce(&attrs)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                println!(
                    "Saved job #{}: {} at {}",
                    listing.job.id, listing.job.title, listing.company.name
                );
            }
        }

        Commands::Apply { job, applicant } => {
            let attrs = application_attributes(job)?;
            let factory = JobFactory::new(&db)?;
            let listing = factory.produce(&attrs)?;
            let application = db.create_application(listing.job.id, &applicant)?;
            println!("Congratulations on your new application!");
            println!(
                "Application #{}: {} at {}",
                application.id, application.job_title, application.company_name
            );
        }

        Commands::Applications { applicant } => {
            let applications = db.list_applications(Some(&applicant))?;
            if applications.is_empty() {
                println!("No applications found for '{}'.", applicant);
            } else {
                print_applications(&applications);
            }
        }

        Commands::Feed => {
            let applications = db.list_applications(None)?;
            if applications.is_empty() {
                println!("No applications yet.");
            } else {
                print_applications(&applications);
            }
        }

        Commands::Jobs => {
            let listings = db.list_job_listings()?;
            if listings.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<6} {:<8} {:<28} {:<20} {:<16} {:<20}",
                    "ID", "STATUS", "TITLE", "COMPANY", "CITY", "CATEGORY"
                );
                println!("{}", "-".repeat(101));
                for listing in listings {
                    let city = listing
                        .location
                        .as_ref()
                        .and_then(|l| l.city.clone())
                        .unwrap_or_default();
                    println!(
                        "{:<6} {:<8} {:<28} {:<20} {:<16} {:<20}",
                        listing.job.id,
                        listing.job.status,
                        truncate(&listing.job.title, 26),
                        truncate(&listing.company.name, 18),
                        truncate(&city, 14),
                        truncate(&listing.category.display_name, 18)
                    );
                }
            }
        }

        Commands::Show { id } => match db.get_job_listing(id)? {
            Some(listing) => print_listing(&listing),
            None => println!("Job #{} not found.", id),
        },

        Commands::Categories => {
            let factory = JobFactory::new(&db)?;
            let catalog = factory.categories();
            println!("{:<24} {:<24}", "NAME", "DISPLAY NAME");
            println!("{}", "-".repeat(48));
            for category in catalog.all() {
                let marker = if category == catalog.unknown() { " (default)" } else { "" };
                println!(
                    "{:<24} {}{}",
                    truncate(&category.name, 22),
                    category.display_name,
                    marker
                );
            }
        }
    }

    Ok(())
}

fn print_applications(applications: &[models::JobApplication]) {
    println!(
        "{:<6} {:<16} {:<28} {:<20} {:<10} {:<20}",
        "ID", "APPLICANT", "JOB", "COMPANY", "STATUS", "APPLIED"
    );
    println!("{}", "-".repeat(105));
    for app in applications {
        println!(
            "{:<6} {:<16} {:<28} {:<20} {:<10} {:<20}",
            app.id,
            truncate(&app.applicant, 14),
            truncate(&app.job_title, 26),
            truncate(&app.company_name, 18),
            app.status,
            truncate(&app.created_at, 19)
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_args(args: &[&str]) -> JobArgs {
        let mut argv = vec!["jobboard", "post"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Post { job, .. } => job,
            _ => unreachable!(),
        }
    }

    fn apply_args(args: &[&str]) -> (JobArgs, String) {
        let mut argv = vec!["jobboard", "apply"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Apply { job, applicant } => (job, applicant),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_flags_build_nested_attributes() {
        let attrs = job_args(&[
            "--title",
            "realjob",
            "--company",
            "defaultco",
            "--city",
            "Springfield",
            "--category",
            "Design",
        ])
        .into_attributes()
        .unwrap();

        assert_eq!(attrs.title.as_deref(), Some("realjob"));
        assert_eq!(attrs.company_attributes.name.as_deref(), Some("defaultco"));
        assert_eq!(
            attrs.location_attributes.unwrap().city.as_deref(),
            Some("Springfield")
        );
        assert_eq!(
            attrs.job_category_attributes.unwrap().name.as_deref(),
            Some("Design")
        );
    }

    #[test]
    fn test_no_address_flags_means_no_location_block() {
        let attrs = job_args(&["--title", "realjob", "--company", "defaultco"])
            .into_attributes()
            .unwrap();
        assert!(attrs.location_attributes.is_none());
        assert!(attrs.job_category_attributes.is_none());
    }

    #[test]
    fn test_flags_override_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(
            &path,
            r#"{"title": "realjob", "description": "Doing Real Things",
                "company_attributes": {"name": "defaultco", "description": "A Real Company"}}"#,
        )
        .unwrap();

        let attrs = job_args(&[
            "--file",
            path.to_str().unwrap(),
            "--description",
            "Doing Other Things",
        ])
        .into_attributes()
        .unwrap();

        assert_eq!(attrs.title.as_deref(), Some("realjob"));
        assert_eq!(attrs.description.as_deref(), Some("Doing Other Things"));
        assert_eq!(
            attrs.company_attributes.description.as_deref(),
            Some("A Real Company")
        );
    }

    #[test]
    fn test_apply_flow_records_application() {
        let db = Database::open_in_memory().unwrap();
        let factory = JobFactory::new(&db).unwrap();
        let attrs = job_args(&["--title", "realjob", "--company", "defaultco"])
            .into_attributes()
            .unwrap();

        let listing = factory.produce(&attrs).unwrap();
        db.create_application(listing.job.id, "alice").unwrap();
        let listing = factory.produce(&attrs).unwrap();
        db.create_application(listing.job.id, "bob").unwrap();

        let mine = db.list_applications(Some("alice")).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].job_title, "realjob");
        assert_eq!(mine[0].company_name, "defaultco");
        assert_eq!(mine[0].status, "Applied");

        assert_eq!(db.list_applications(None).unwrap().len(), 2);
        assert_eq!(db.count_jobs().unwrap(), 1);
    }

    #[test]
    fn test_apply_reopens_closed_job() {
        let db = Database::open_in_memory().unwrap();
        let factory = JobFactory::new(&db).unwrap();
        let posted = job_args(&[
            "--title", "realjob", "--company", "defaultco", "--status", "Closed",
        ])
        .into_attributes()
        .unwrap();
        let closed = factory.produce(&posted).unwrap();
        assert_eq!(closed.job.status, "Closed");

        let (job, applicant) = apply_args(&[
            "--title", "realjob", "--company", "defaultco", "--status", "Closed",
            "--applicant", "alice",
        ]);
        let attrs = application_attributes(job).unwrap();
        let listing = factory.produce(&attrs).unwrap();
        let application = db.create_application(listing.job.id, &applicant).unwrap();

        assert_eq!(listing.job.id, closed.job.id);
        assert_eq!(listing.job.status, "Open");
        assert_eq!(application.job_id, closed.job.id);
        assert_eq!(db.count_jobs().unwrap(), 1);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("realjob", 10), "realjob");
        assert_eq!(truncate("Software Development", 10), "Softwar...");
    }
}
