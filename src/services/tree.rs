//! One-hop family tree around a selected person.

use std::collections::{HashMap, HashSet};

use tracing::error;
use uuid::Uuid;

use crate::{
    context::AppContext,
    error::Result,
    models::{
        person::Person,
        relation::{FamilyRelation, RelationLink, RelationType},
    },
    services::{people::PeopleService, relations::{self, RelationService}},
};

/// Immediate parents and children of `center`.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyTree {
    pub center: Person,
    pub parents: Vec<Person>,
    pub children: Vec<Person>,
}

/// Only parent/child links are followed. People missing from
/// `people` are dropped, the center never appears in its own groups, and
/// repeated links to the same person are collapsed.
pub fn assemble(
    center: &Person,
    people: &HashMap<Uuid, Person>,
    relations: &[FamilyRelation],
) -> FamilyTree {
    let mut parent_ids = Vec::new();
    let mut child_ids = Vec::new();

    for relation in relations {
        // Rows that break the link invariant are skipped, as are spouse/sibling rows.
        let Ok(RelationLink::ParentChild { child, parent }) = relation.link() else {
            continue;
        };
        if child == center.id {
            parent_ids.push(parent);
        }
        if parent == center.id {
            child_ids.push(child);
        }
    }

    FamilyTree {
        center: center.clone(),
        parents: resolve(center.id, &parent_ids, people),
        children: resolve(center.id, &child_ids, people),
    }
}

fn resolve(center: Uuid, ids: &[Uuid], people: &HashMap<Uuid, Person>) -> Vec<Person> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| **id != center && seen.insert(**id))
        .filter_map(|id| people.get(id).cloned())
        .collect()
}

/// State of the tree page: the data set plus the selected center.
#[derive(Debug, Clone, Default)]
pub struct TreeState {
    pub people: Vec<Person>,
    pub relations: Vec<FamilyRelation>,
    pub selected: Option<Uuid>,
    index: HashMap<Uuid, Person>,
}

impl TreeState {
    pub fn new(people: Vec<Person>, relations: Vec<FamilyRelation>) -> Self {
        let index = people.iter().map(|p| (p.id, p.clone())).collect();
        let selected = people.first().map(|p| p.id);
        Self { people, relations, selected, index }
    }

    /// Fetch public people and every relation. Failures leave an empty tree.
    pub async fn load(ctx: &AppContext) -> Self {
        match Self::fetch(ctx).await {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to load tree data: {}", e);
                Self::default()
            }
        }
    }

    async fn fetch(ctx: &AppContext) -> Result<Self> {
        let people = PeopleService::list_public(ctx).await?;
        let relations = RelationService::list_all(ctx).await?;
        Ok(Self::new(people, relations))
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn center(&self) -> Option<&Person> {
        self.selected.and_then(|id| self.index.get(&id))
    }

    /// Re-center on `id`. Unknown ids clear the selection.
    pub fn select(&mut self, id: Uuid) -> Option<&Person> {
        self.selected = self.index.contains_key(&id).then_some(id);
        self.center()
    }

    pub fn tree(&self) -> Option<FamilyTree> {
        self.center().map(|center| assemble(center, &self.index, &self.relations))
    }

    /// Persist a relation for the current center, then reload everything.
    /// The selection survives the reload when the person still exists.
    pub async fn add_relation(
        &mut self,
        ctx: &AppContext,
        kind: RelationType,
        target_id: &str,
    ) -> Result<FamilyRelation> {
        let center = self
            .center()
            .cloned()
            .ok_or_else(|| crate::error::AppError::validation("Aucune personne sélectionnée"))?;
        let candidates: Vec<Person> =
            relations::relation_candidates(&center, &self.people).into_iter().cloned().collect();
        let created = relations::add_relation(ctx, &center, &candidates, kind, target_id).await?;

        let selected = self.selected;
        *self = Self::load(ctx).await;
        if let Some(id) = selected {
            if self.index.contains_key(&id) {
                self.selected = Some(id);
            }
        }
        Ok(created)
    }
}
