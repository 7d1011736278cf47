use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    backend::{Query, PEOPLE},
    context::AppContext,
    error::{AppError, Result},
    models::person::{NewPerson, Person, UpdatePerson},
    services::{certification, decode_row, decode_rows},
};

pub struct PeopleService;

impl PeopleService {
    pub async fn list_all(ctx: &AppContext) -> Result<Vec<Person>> {
        let token = ctx.access_token();
        let rows = ctx.backend().select(PEOPLE, &Query::new(), token.as_deref()).await?;
        Ok(decode_rows(rows))
    }

    pub async fn list_public(ctx: &AppContext) -> Result<Vec<Person>> {
        let token = ctx.access_token();
        let query = Query::new().eq("is_public", true);
        let rows = ctx.backend().select(PEOPLE, &query, token.as_deref()).await?;
        Ok(decode_rows(rows))
    }

    pub async fn list_by_user(ctx: &AppContext, user_id: Uuid) -> Result<Vec<Person>> {
        let token = ctx.access_token();
        let query = Query::new().eq("created_by", user_id.to_string());
        let rows = ctx.backend().select(PEOPLE, &query, token.as_deref()).await?;
        Ok(decode_rows(rows))
    }

    /// Latest people created by a user, newest first.
    pub async fn recent_by_user(ctx: &AppContext, user_id: Uuid, limit: usize) -> Result<Vec<Person>> {
        let token = ctx.access_token();
        let query = Query::new()
            .eq("created_by", user_id.to_string())
            .order_by("created_at", false)
            .limit(limit);
        let rows = ctx.backend().select(PEOPLE, &query, token.as_deref()).await?;
        Ok(decode_rows(rows))
    }

    pub async fn count_by_user(ctx: &AppContext, user_id: Uuid) -> Result<u64> {
        let token = ctx.access_token();
        let query = Query::new().select("id").eq("created_by", user_id.to_string());
        let rows = ctx.backend().select(PEOPLE, &query, token.as_deref()).await?;
        Ok(rows.len() as u64)
    }

    pub async fn get(ctx: &AppContext, id: Uuid) -> Result<Person> {
        let token = ctx.access_token();
        let query = Query::new().eq("id", id.to_string()).limit(1);
        let row = ctx
            .backend()
            .select(PEOPLE, &query, token.as_deref())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("personne {id}")))?;
        decode_row(row)
    }

    /// Insert a person owned by the signed-in user. With `certify`, the
    /// content hash of the record is stored alongside it.
    pub async fn create(ctx: &AppContext, mut person: NewPerson, certify: bool) -> Result<Person> {
        person.validate()?;
        let user = ctx.require_user()?;
        person.created_by = Some(user.id);
        if certify {
            person.blockchain_hash = Some(certification::generate_hash(&person)?);
        }

        let token = ctx.access_token();
        let row = ctx
            .backend()
            .insert(PEOPLE, serde_json::to_value(&person)?, token.as_deref())
            .await?;
        let created: Person = decode_row(row)?;
        info!(person = %created.id, user = %user.id, certified = certify, "Person added");
        Ok(created)
    }

    /// Patch a person. Date changes are checked against the stored record.
    pub async fn update(ctx: &AppContext, id: Uuid, changes: &UpdatePerson) -> Result<Person> {
        let patch = serde_json::to_value(changes)?;
        if patch.as_object().is_some_and(|o| o.is_empty()) {
            return Err(AppError::validation("Aucune modification"));
        }
        ctx.require_user()?;
        if changes.touches_dates() {
            let current = Self::get(ctx, id).await?;
            changes.validate_against(&current)?;
        }
        let token = ctx.access_token();
        let query = Query::new().eq("id", id.to_string());
        let row = ctx
            .backend()
            .update(PEOPLE, &query, patch, token.as_deref())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("personne {id}")))?;
        decode_row(row)
    }

    pub async fn delete(ctx: &AppContext, id: Uuid) -> Result<()> {
        ctx.require_user()?;
        let token = ctx.access_token();
        let query = Query::new().eq("id", id.to_string());
        ctx.backend().delete(PEOPLE, &query, token.as_deref()).await?;
        info!(person = %id, "Person deleted");
        Ok(())
    }

    /// Cheap round-trip used by the connection check.
    pub async fn ping(ctx: &AppContext) -> Result<Vec<Value>> {
        let query = Query::new().select("id").limit(1);
        ctx.backend().select(PEOPLE, &query, None).await
    }
}
