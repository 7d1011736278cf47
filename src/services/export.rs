use std::io::Write;

use serde::Serialize;
use tracing::info;

use crate::{
    context::AppContext,
    error::Result,
    models::person::Person,
    services::people::PeopleService,
};

#[derive(Serialize)]
struct PersonRow<'a> {
    id: String,
    first_name: &'a str,
    name: &'a str,
    birth_date: Option<String>,
    death_date: Option<String>,
    birth_place: Option<&'a str>,
    is_public: bool,
    blockchain_hash: Option<&'a str>,
}

impl<'a> From<&'a Person> for PersonRow<'a> {
    fn from(p: &'a Person) -> Self {
        Self {
            id: p.id.to_string(),
            first_name: &p.first_name,
            name: &p.last_name,
            birth_date: p.birth_date.map(|d| d.to_string()),
            death_date: p.death_date.map(|d| d.to_string()),
            birth_place: p.birth_place.as_deref(),
            is_public: p.is_public,
            blockchain_hash: p.blockchain_hash.as_deref(),
        }
    }
}

/// Write `people` as CSV with a header row.
pub fn write_people_csv<W: Write>(people: &[Person], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for person in people {
        writer.serialize(PersonRow::from(person))?;
    }
    writer.flush()?;
    Ok(())
}

pub struct ExportService;

impl ExportService {
    /// Everything the signed-in user created, as CSV.
    pub async fn my_people_csv(ctx: &AppContext) -> Result<String> {
        let user = ctx.require_user()?;
        let people = PeopleService::list_by_user(ctx, user.id).await?;
        let mut buf = Vec::new();
        write_people_csv(&people, &mut buf)?;
        info!(user = %user.id, rows = people.len(), "Data exported");
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
