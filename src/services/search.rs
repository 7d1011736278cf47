use serde::Deserialize;
use tracing::{error, info};

use crate::{
    backend::{Query, PEOPLE},
    context::AppContext,
    error::{AppError, Result},
    models::person::Person,
    services::decode_rows,
};

/// Structured criteria of the advanced search form. Blank fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SearchCriteria {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_year: Option<i32>,
    pub birth_place: Option<String>,
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        non_blank(&self.first_name).is_none()
            && non_blank(&self.last_name).is_none()
            && self.birth_year.is_none()
            && non_blank(&self.birth_place).is_none()
    }

    /// Query over the public people set, newest first.
    pub fn to_query(&self) -> Result<Query> {
        let mut query = Query::new().eq("is_public", true);
        if let Some(first) = non_blank(&self.first_name) {
            query = query.contains("first_name", first);
        }
        if let Some(last) = non_blank(&self.last_name) {
            query = query.contains("name", last);
        }
        if let Some(year) = self.birth_year {
            if !(1..=9999).contains(&year) {
                return Err(AppError::validation(format!("Année invalide : {year}")));
            }
            query = query
                .gte("birth_date", format!("{year:04}-01-01"))
                .lte("birth_date", format!("{year:04}-12-31"));
        }
        if let Some(place) = non_blank(&self.birth_place) {
            query = query.contains("birth_place", place);
        }
        Ok(query.order_by("created_at", false))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Figures shown above the results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSummary {
    pub public_people: usize,
    pub results: usize,
}

pub struct SearchService;

impl SearchService {
    pub async fn search(ctx: &AppContext, criteria: &SearchCriteria) -> Result<Vec<Person>> {
        let query = criteria.to_query()?;
        let token = ctx.access_token();
        let rows = ctx.backend().select(PEOPLE, &query, token.as_deref()).await?;
        let people: Vec<Person> = decode_rows(rows);
        info!(results = people.len(), unfiltered = criteria.is_empty(), "Search completed");
        Ok(people)
    }

    /// Search that degrades to no results on backend failure.
    pub async fn search_or_empty(ctx: &AppContext, criteria: &SearchCriteria) -> Result<Vec<Person>> {
        match Self::search(ctx, criteria).await {
            Ok(people) => Ok(people),
            Err(e) if e.is_client_side() => Err(e),
            Err(e) => {
                error!("Search failed: {}", e);
                Ok(Vec::new())
            }
        }
    }

    pub async fn summary(ctx: &AppContext, results: usize) -> SearchSummary {
        let query = Query::new().select("id").eq("is_public", true);
        let token = ctx.access_token();
        let public_people = match ctx.backend().select(PEOPLE, &query, token.as_deref()).await {
            Ok(rows) => rows.len(),
            Err(e) => {
                error!("Failed to count public people: {}", e);
                0
            }
        };
        SearchSummary { public_people, results }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::backend::Filter;
    use crate::models::person::NewPerson;
    use crate::services::people::{tests::signed_in_context, PeopleService};

    fn year(y: i32) -> SearchCriteria {
        SearchCriteria { birth_year: Some(y), ..Default::default() }
    }

    #[test]
    fn test_blank_fields_are_ignored() {
        let criteria = SearchCriteria {
            first_name: Some("   ".into()),
            last_name: Some("".into()),
            ..Default::default()
        };
        assert!(criteria.is_empty());
        let q = criteria.to_query().unwrap();
        assert_eq!(q.filters.len(), 1);
    }

    #[test]
    fn test_year_bounds_are_inclusive_calendar_year() {
        let q = year(1850).to_query().unwrap();
        assert!(q.filters.contains(&Filter::Gte("birth_date".into(), "1850-01-01".into())));
        assert!(q.filters.contains(&Filter::Lte("birth_date".into(), "1850-12-31".into())));
        assert!(year(0).to_query().is_err());
    }

    #[tokio::test]
    async fn test_birth_year_only_search() {
        let (ctx, _) = signed_in_context("search@example.org").await;
        let births = [
            ("Avant", NaiveDate::from_ymd_opt(1849, 12, 31).unwrap(), true),
            ("Janvier", NaiveDate::from_ymd_opt(1850, 1, 1).unwrap(), true),
            ("Juin", NaiveDate::from_ymd_opt(1850, 6, 15).unwrap(), true),
            ("Decembre", NaiveDate::from_ymd_opt(1850, 12, 31).unwrap(), true),
            ("Prive", NaiveDate::from_ymd_opt(1850, 3, 3).unwrap(), false),
            ("Apres", NaiveDate::from_ymd_opt(1851, 1, 1).unwrap(), true),
        ];
        for (name, born, public) in births {
            let mut p = NewPerson::new(name, "Leroy").unwrap().born(born);
            if !public {
                p = p.private();
            }
            PeopleService::create(&ctx, p, false).await.unwrap();
        }

        let found = SearchService::search(&ctx, &year(1850)).await.unwrap();
        let names: Vec<&str> = found.iter().map(|p| p.first_name.as_str()).collect();
        assert_eq!(names, vec!["Decembre", "Juin", "Janvier"]);
    }

    #[tokio::test]
    async fn test_name_and_place_substring_ignore_case() {
        let (ctx, _) = signed_in_context("search@example.org").await;
        PeopleService::create(&ctx, NewPerson::new("Jean-Marie", "Lefèvre").unwrap().born_in("Saint-Malo"), false)
            .await
            .unwrap();
        PeopleService::create(&ctx, NewPerson::new("Marie", "Lebrun").unwrap().born_in("Rennes"), false)
            .await
            .unwrap();

        let criteria = SearchCriteria { first_name: Some("MARIE".into()), ..Default::default() };
        assert_eq!(SearchService::search(&ctx, &criteria).await.unwrap().len(), 2);

        let criteria = SearchCriteria {
            first_name: Some("marie".into()),
            birth_place: Some("malo".into()),
            ..Default::default()
        };
        let found = SearchService::search(&ctx, &criteria).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].last_name, "Lefèvre");

        let summary = SearchService::summary(&ctx, found.len()).await;
        assert_eq!(summary, SearchSummary { public_people: 2, results: 1 });
    }

    #[tokio::test]
    async fn test_malformed_row_does_not_empty_results() {
        use crate::backend::TableBackend;
        use serde_json::json;

        let (ctx, backend) = signed_in_context("search@example.org").await;
        PeopleService::create(&ctx, NewPerson::new("Marc", "Durand").unwrap(), false).await.unwrap();
        let token = ctx.access_token();
        backend
            .insert(PEOPLE, json!({ "first_name": "X", "is_public": true }), token.as_deref())
            .await
            .unwrap();

        let found = SearchService::search_or_empty(&ctx, &SearchCriteria::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].full_name(), "Marc Durand");
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_empty() {
        let (ctx, backend) = signed_in_context("search@example.org").await;
        backend.fail_table(PEOPLE);
        let found = SearchService::search_or_empty(&ctx, &year(1850)).await.unwrap();
        assert!(found.is_empty());
        assert!(SearchService::search_or_empty(&ctx, &year(-3)).await.is_err());
    }
}
