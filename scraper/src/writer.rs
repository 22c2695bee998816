use std::fs::{self, File};
use std::path::Path;

use common::AcceptedRecord;
use serde::Serialize;

use crate::error::Result;

#[derive(Serialize)]
struct CsvRow<'a> {
    platform: &'a str,
    title: &'a str,
    company: &'a str,
    location: &'a str,
    description: &'a str,
    salary: &'a str,
    posted_date: &'a str,
    url: &'a str,
    skills: String,
    is_remote: bool,
    is_fresher: bool,
    salary_min: Option<i64>,
    added_at: String,
}

impl<'a> From<&'a AcceptedRecord> for CsvRow<'a> {
    fn from(job: &'a AcceptedRecord) -> Self {
        Self {
            platform: &job.record.source,
            title: &job.record.title,
            company: &job.record.company,
            location: &job.record.location,
            description: &job.record.description,
            salary: &job.record.salary,
            posted_date: &job.record.posted_date,
            url: &job.record.url,
            skills: job.classification.skills.join("|"),
            is_remote: job.classification.is_remote,
            is_fresher: job.classification.is_fresher,
            salary_min: job.salary_min,
            added_at: job.admitted_at.to_rfc3339(),
        }
    }
}

/// One header row, then one row per record, in the given order.
pub fn save_to_csv(jobs: &[AcceptedRecord], path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(ensure_parent(path.as_ref())?)?;
    write_csv(jobs, file)
}

pub fn write_csv<W: std::io::Write>(jobs: &[AcceptedRecord], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    if jobs.is_empty() {
        // serialize() only emits headers alongside the first row
        writer.write_record([
            "platform",
            "title",
            "company",
            "location",
            "description",
            "salary",
            "posted_date",
            "url",
            "skills",
            "is_remote",
            "is_fresher",
            "salary_min",
            "added_at",
        ])?;
    }
    for job in jobs {
        writer.serialize(CsvRow::from(job))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_to_json(jobs: &[AcceptedRecord], path: impl AsRef<Path>) -> Result<()> {
    let json_output = serde_json::to_string_pretty(jobs)?;
    fs::write(ensure_parent(path.as_ref())?, json_output)?;
    Ok(())
}

/// `.json` gets JSON, anything else CSV.
pub fn save(jobs: &[AcceptedRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        save_to_json(jobs, path)
    } else {
        save_to_csv(jobs, path)
    }
}

fn ensure_parent(path: &Path) -> Result<&Path> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{Classification, RawRecord, RecordIdentity};
    use tempfile::tempdir;

    fn job() -> AcceptedRecord {
        let record = RawRecord {
            source: "Indeed".to_string(),
            title: "Junior Software Engineer".to_string(),
            company: "TechCorp".to_string(),
            location: "Remote".to_string(),
            description: "Entry level, \"remote\" friendly".to_string(),
            salary: "$50,000 - $70,000".to_string(),
            posted_date: "2 days ago".to_string(),
            url: "https://www.indeed.com/viewjob?jk=1".to_string(),
        };
        AcceptedRecord {
            id: RecordIdentity::of(&record),
            record,
            classification: Classification {
                is_fresher: true,
                is_remote: true,
                skills: vec!["python".to_string(), "sql".to_string()],
            },
            salary_min: Some(50000),
            admitted_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_csv_header_and_row() {
        let mut out = Vec::new();
        write_csv(&[job()], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "platform,title,company,location,description,salary,posted_date,url,skills,is_remote,is_fresher,salary_min,added_at"
        );
        assert_eq!(
            lines.next().unwrap(),
            "Indeed,Junior Software Engineer,TechCorp,Remote,\"Entry level, \"\"remote\"\" friendly\",\"$50,000 - $70,000\",2 days ago,https://www.indeed.com/viewjob?jk=1,python|sql,true,true,50000,2024-05-01T12:00:00+00:00"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_csv_still_has_header() {
        let mut out = Vec::new();
        write_csv(&[], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("platform,title,company"));
    }

    #[test]
    fn test_save_dispatches_on_extension() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("out").join("jobs.json");
        let csv_path = dir.path().join("jobs.csv");

        save(&[job()], &json_path).unwrap();
        save(&[job()], &csv_path).unwrap();

        let parsed: Vec<AcceptedRecord> =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed, vec![job()]);
        assert!(fs::read_to_string(&csv_path)
            .unwrap()
            .starts_with("platform,"));
    }
}
