//! Plain-text rendering for the command line.

pub mod dashboard;
pub mod profile;
pub mod search;
pub mod tree;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{person::Person, relation::RelationType};

pub const NOT_SET: &str = "Non renseigné";

/// `dd/mm/yyyy`, or "Non renseigné".
pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%d/%m/%Y").to_string(),
        None => NOT_SET.to_string(),
    }
}

pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    format_date(ts.map(|t| t.date_naive()))
}

/// Age in whole years of 365.25 days, at death or at `today`.
pub fn calculate_age(birth: Option<NaiveDate>, death: Option<NaiveDate>, today: NaiveDate) -> Option<i64> {
    let birth = birth?;
    let end = death.unwrap_or(today);
    let days = (end - birth).num_days() as f64;
    Some((days / 365.25).floor() as i64)
}

/// Label for a stored or editor relation type; unknown values are shown as is.
pub fn relationship_label(relation_type: &str) -> String {
    relation_type
        .parse::<RelationType>()
        .map(|kind| kind.label().to_string())
        .unwrap_or_else(|_| relation_type.to_string())
}

/// One-line summary used in lists and pickers.
pub fn person_line(person: &Person) -> String {
    let mut line = person.full_name();
    let lifespan = person.lifespan();
    if !lifespan.is_empty() {
        line.push_str(&format!(" ({lifespan})"));
    }
    if let Some(place) = person.birth_place.as_deref().filter(|p| !p.is_empty()) {
        line.push_str(&format!(", {place}"));
    }
    if person.is_certified() {
        line.push_str(" [certifié]");
    }
    line
}

/// Full record, field per line.
pub fn person_details(person: &Person, today: NaiveDate) -> String {
    let mut out = format!("{}\n", person.full_name());
    out.push_str(&format!("  Identifiant : {}\n", person.id));
    out.push_str(&format!("  Naissance : {}\n", format_date(person.birth_date)));
    out.push_str(&format!(
        "  Lieu de naissance : {}\n",
        person.birth_place.as_deref().unwrap_or(NOT_SET)
    ));
    if person.death_date.is_some() {
        out.push_str(&format!("  Décès : {}\n", format_date(person.death_date)));
    }
    if let Some(age) = calculate_age(person.birth_date, person.death_date, today) {
        out.push_str(&format!("  Âge : {age} ans\n"));
    }
    out.push_str(&format!("  Visibilité : {}\n", if person.is_public { "publique" } else { "privée" }));
    if let Some(hash) = person.blockchain_hash.as_deref().filter(|h| !h.is_empty()) {
        out.push_str(&format!("  Empreinte : {hash}\n"));
    }
    out
}
