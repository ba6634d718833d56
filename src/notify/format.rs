// src/notify/format.rs
use chrono::{DateTime, FixedOffset, Utc};

use crate::model::Listing;

const RULE_WIDTH: usize = 70;

pub fn digest_subject(count: usize) -> String {
    format!("{count} new job posting(s) found")
}

/// "11/19/2025 - 09:51 AM EST (14:51 UTC)". Fixed UTC-5, no DST.
pub fn format_posted(ts: &DateTime<Utc>) -> String {
    let est = FixedOffset::west_opt(5 * 3600).map(|off| ts.with_timezone(&off));
    match est {
        Some(local) => format!(
            "{} EST ({} UTC)",
            local.format("%m/%d/%Y - %I:%M %p"),
            ts.format("%H:%M")
        ),
        None => ts.to_rfc3339(),
    }
}

/// Whole dollars with thousands separators.
pub fn format_money(v: f64) -> String {
    let whole = v.round().abs() as u64;
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    let sign = if v < 0.0 && whole > 0 { "-" } else { "" };
    format!("{sign}${out}")
}

fn salary_line(l: &Listing) -> Option<String> {
    match (l.salary_min, l.salary_max) {
        (Some(min), Some(max)) => Some(format!("{} - {}", format_money(min), format_money(max))),
        (Some(min), None) => Some(format!("from {}", format_money(min))),
        (None, Some(max)) => Some(format!("up to {}", format_money(max))),
        (None, None) => None,
    }
}

/// Plain-text digest body, newest posting first. Listings without a posted date go last.
pub fn digest_body(listings: &[Listing]) -> String {
    if listings.is_empty() {
        return "No new jobs found.".to_string();
    }

    let mut sorted: Vec<&Listing> = listings.iter().collect();
    // stable: equal dates keep discovery order
    sorted.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));

    let rule = "=".repeat(RULE_WIDTH);
    let sep = "-".repeat(RULE_WIDTH);

    let mut body = format!("Found {} new job posting(s)!\n\n{rule}\n\n", sorted.len());
    for (i, l) in sorted.iter().enumerate() {
        body.push_str(&format!("{}. {}\n", i + 1, l.title));
        body.push_str(&format!("   Company: {}\n", l.company));
        body.push_str(&format!(
            "   Location: {}\n",
            l.location.as_deref().unwrap_or("N/A")
        ));
        if let Some(salary) = salary_line(l) {
            body.push_str(&format!("   Salary: {salary}\n"));
        }
        body.push_str(&format!("   Apply: {}\n", l.url));
        match &l.posted_at {
            Some(ts) => body.push_str(&format!("   Posted: {}\n", format_posted(ts))),
            None => body.push_str("   Posted: N/A\n"),
        }
        body.push_str(&format!("\n{sep}\n\n"));
    }
    body.push_str("\nThis is an automated message from job-tracker.\n");
    body.push_str("Apply early for the best chances!");
    body
}

pub fn test_body() -> String {
    "Hello!\n\n\
     This is a test email from job-tracker.\n\n\
     If you are reading this, the SMTP configuration works and digests of new\n\
     job postings will be delivered to this address.\n"
        .to_string()
}
