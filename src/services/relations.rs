use tracing::info;
use uuid::Uuid;

use crate::{
    backend::{Query, FAMILY_RELATIONS},
    context::AppContext,
    error::{AppError, Result},
    models::{
        person::Person,
        relation::{FamilyRelation, NewRelation, RelationType},
    },
    services::{decode_row, decode_rows},
};

/// Relation rows with both people expanded through their foreign keys.
pub const EXPANDED_SELECT: &str = "*,\
person:people!family_relations_person_id_fkey(*),\
parent:people!family_relations_parent_id_fkey(*)";

pub struct RelationService;

impl RelationService {
    pub async fn list_all(ctx: &AppContext) -> Result<Vec<FamilyRelation>> {
        let token = ctx.access_token();
        let query = Query::new().select(EXPANDED_SELECT);
        let rows = ctx.backend().select(FAMILY_RELATIONS, &query, token.as_deref()).await?;
        Ok(decode_rows(rows))
    }

    /// Relations whose subject is `person_id`.
    pub async fn list_for_person(ctx: &AppContext, person_id: Uuid) -> Result<Vec<FamilyRelation>> {
        let token = ctx.access_token();
        let query = Query::new().select(EXPANDED_SELECT).eq("person_id", person_id.to_string());
        let rows = ctx.backend().select(FAMILY_RELATIONS, &query, token.as_deref()).await?;
        Ok(decode_rows(rows))
    }

    pub async fn count_by_user(ctx: &AppContext, user_id: Uuid) -> Result<u64> {
        let token = ctx.access_token();
        let query = Query::new().select("id").eq("created_by", user_id.to_string());
        let rows = ctx.backend().select(FAMILY_RELATIONS, &query, token.as_deref()).await?;
        Ok(rows.len() as u64)
    }

    pub async fn create(ctx: &AppContext, mut relation: NewRelation) -> Result<FamilyRelation> {
        let user = ctx.require_user()?;
        relation.created_by = Some(user.id);
        let token = ctx.access_token();
        let row = ctx
            .backend()
            .insert(FAMILY_RELATIONS, serde_json::to_value(&relation)?, token.as_deref())
            .await?;
        let created: FamilyRelation = decode_row(row)?;
        info!(
            relation = %created.id,
            kind = %created.relation_type,
            subject = %created.person_id,
            "Relation created"
        );
        Ok(created)
    }

    pub async fn delete(ctx: &AppContext, id: Uuid) -> Result<()> {
        ctx.require_user()?;
        let token = ctx.access_token();
        let query = Query::new().eq("id", id.to_string());
        ctx.backend().delete(FAMILY_RELATIONS, &query, token.as_deref()).await?;
        Ok(())
    }
}

/// Checks a relation-editor submission and orients the record.
///
/// `target_id` is the raw value of the person picker; an empty value means
/// nothing was selected. `candidates` are the people the picker offered.
pub fn prepare_relation(
    center: &Person,
    candidates: &[Person],
    kind: RelationType,
    target_id: &str,
) -> Result<NewRelation> {
    let target_id = target_id.trim();
    if target_id.is_empty() {
        return Err(AppError::validation("Choisissez une personne"));
    }
    let target = Uuid::parse_str(target_id)
        .map_err(|_| AppError::validation(format!("Identifiant invalide : {target_id}")))?;
    if target == center.id {
        return Err(AppError::validation(
            "Une personne ne peut pas être reliée à elle-même",
        ));
    }
    if !candidates.iter().any(|p| p.id == target) {
        return Err(AppError::validation(format!("Personne inconnue : {target}")));
    }
    Ok(NewRelation::oriented(kind, center.id, target))
}

/// People the relation editor offers for `center`: everyone else.
pub fn relation_candidates<'a>(center: &Person, people: &'a [Person]) -> Vec<&'a Person> {
    people.iter().filter(|p| p.id != center.id).collect()
}

/// Validate and persist one relation from the editor. Validation
/// failures return before any backend call.
pub async fn add_relation(
    ctx: &AppContext,
    center: &Person,
    candidates: &[Person],
    kind: RelationType,
    target_id: &str,
) -> Result<FamilyRelation> {
    let relation = prepare_relation(center, candidates, kind, target_id)?;
    RelationService::create(ctx, relation).await
}
