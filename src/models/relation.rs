use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

use super::person::Person;

/// Relation kinds offered by the relation editor.
///
/// The kind names the role the center person plays towards the target:
/// `Parent` means "the center person is a parent of the target".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Parent,
    Child,
    Spouse,
    Sibling,
}

impl RelationType {
    pub const ALL: [RelationType; 4] = [
        RelationType::Parent,
        RelationType::Child,
        RelationType::Spouse,
        RelationType::Sibling,
    ];

    /// Value stored in `family_relations.relation_type`. Child links are
    /// stored as parent links with the roles swapped.
    pub fn stored_as(self) -> &'static str {
        match self {
            RelationType::Parent | RelationType::Child => "parent",
            RelationType::Spouse => "spouse",
            RelationType::Sibling => "sibling",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RelationType::Child => "Enfant de",
            RelationType::Parent => "Parent de",
            RelationType::Spouse => "Époux/Épouse de",
            RelationType::Sibling => "Frère/Sœur de",
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RelationType::Parent => "parent",
            RelationType::Child => "child",
            RelationType::Spouse => "spouse",
            RelationType::Sibling => "sibling",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RelationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "parent" => Ok(RelationType::Parent),
            "child" => Ok(RelationType::Child),
            "spouse" => Ok(RelationType::Spouse),
            "sibling" => Ok(RelationType::Sibling),
            other => {
                let known: Vec<String> = RelationType::ALL.iter().map(ToString::to_string).collect();
                Err(AppError::validation(format!(
                    "Type de relation inconnu : {other} (attendu : {})",
                    known.join(", ")
                )))
            }
        }
    }
}

/// A row of `family_relations`, optionally with FK-expanded people.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FamilyRelation {
    pub id: Uuid,
    pub person_id: Uuid,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub related_person_id: Option<Uuid>,
    pub relation_type: String,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub person: Option<Person>,
    #[serde(default, skip_serializing)]
    pub parent: Option<Person>,
}

/// Structural reading of a relation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationLink {
    ParentChild { child: Uuid, parent: Uuid },
    Symmetric { a: Uuid, b: Uuid, kind: RelationType },
}

impl FamilyRelation {
    /// Parent rows must carry `parent_id`; spouse/sibling rows must carry
    /// `related_person_id`.
    pub fn link(&self) -> Result<RelationLink> {
        match self.relation_type.as_str() {
            "parent" => self
                .parent_id
                .map(|parent| RelationLink::ParentChild { child: self.person_id, parent })
                .ok_or_else(|| {
                    AppError::validation(format!("Relation {} sans parent_id", self.id))
                }),
            "spouse" | "sibling" => {
                let kind = if self.relation_type == "spouse" {
                    RelationType::Spouse
                } else {
                    RelationType::Sibling
                };
                self.related_person_id
                    .map(|b| RelationLink::Symmetric { a: self.person_id, b, kind })
                    .ok_or_else(|| {
                        AppError::validation(format!("Relation {} sans related_person_id", self.id))
                    })
            }
            other => Err(AppError::validation(format!(
                "Relation {} de type inconnu : {other}",
                self.id
            ))),
        }
    }
}

/// Insert payload for `family_relations`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewRelation {
    pub person_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_person_id: Option<Uuid>,
    pub relation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
}

impl NewRelation {
    /// Orient a relation from the center person's point of view.
    pub fn oriented(kind: RelationType, center: Uuid, target: Uuid) -> Self {
        let (person_id, parent_id, related_person_id) = match kind {
            RelationType::Parent => (target, Some(center), None),
            RelationType::Child => (center, Some(target), None),
            RelationType::Spouse | RelationType::Sibling => (center, None, Some(target)),
        };

        Self {
            person_id,
            parent_id,
            related_person_id,
            relation_type: kind.stored_as().to_string(),
            created_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_every_kind_parses_back() {
        for kind in RelationType::ALL {
            assert_eq!(kind.to_string().parse::<RelationType>().unwrap(), kind);
        }
        let err = "cousin".parse::<RelationType>().unwrap_err();
        assert!(err.to_string().contains("parent, child, spouse, sibling"));
    }

    #[test]
    fn test_parent_and_child_are_inverse() {
        let (a, b) = ids();
        // A is parent of B, recorded from A's card.
        let from_a = NewRelation::oriented(RelationType::Parent, a, b);
        // B is child of A, recorded from B's card.
        let from_b = NewRelation::oriented(RelationType::Child, b, a);
        assert_eq!(from_a, from_b);
        assert_eq!(from_a.person_id, b);
        assert_eq!(from_a.parent_id, Some(a));
        assert_eq!(from_a.relation_type, "parent");
    }

    #[test]
    fn test_symmetric_kinds_use_related_person() {
        let (a, b) = ids();
        for kind in [RelationType::Spouse, RelationType::Sibling] {
            let rel = NewRelation::oriented(kind, a, b);
            assert_eq!(rel.person_id, a);
            assert_eq!(rel.parent_id, None);
            assert_eq!(rel.related_person_id, Some(b));
            assert_eq!(rel.relation_type, kind.to_string());
        }
    }

    #[test]
    fn test_link_rejects_parent_row_without_parent() {
        let rel = FamilyRelation {
            id: Uuid::new_v4(),
            person_id: Uuid::new_v4(),
            parent_id: None,
            related_person_id: Some(Uuid::new_v4()),
            relation_type: "parent".into(),
            created_by: None,
            created_at: None,
            person: None,
            parent: None,
        };
        assert!(rel.link().is_err());
    }

    #[test]
    fn test_relation_type_parsing() {
        assert_eq!("Sibling".parse::<RelationType>().unwrap(), RelationType::Sibling);
        assert!("cousin".parse::<RelationType>().is_err());
    }
}
