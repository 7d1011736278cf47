use crate::{
    models::person::Person,
    services::tree::{FamilyTree, TreeState},
};

use super::person_line;

pub const EMPTY_TREE: &str = "Vous n'avez pas encore ajouté de personnes.";

pub fn render_state(state: &TreeState) -> String {
    if state.is_empty() {
        return format!("Votre arbre généalogique\n\n{EMPTY_TREE}\n");
    }
    match state.tree() {
        Some(tree) => render_tree(&tree),
        None => "Sélectionnez une personne pour visualiser son arbre familial\n".to_string(),
    }
}

pub fn render_tree(tree: &FamilyTree) -> String {
    let mut out = String::new();
    if !tree.parents.is_empty() {
        out.push_str("Parents\n");
        push_cards(&mut out, &tree.parents);
        out.push('\n');
    }
    out.push_str("Personne centrale\n");
    out.push_str(&format!("  > {}\n", card(&tree.center)));
    if !tree.children.is_empty() {
        out.push_str("\nEnfants\n");
        push_cards(&mut out, &tree.children);
    }
    out
}

fn push_cards(out: &mut String, people: &[Person]) {
    for person in people {
        out.push_str(&format!("  - {}\n", card(person)));
    }
}

fn card(person: &Person) -> String {
    format!("{} [{}]", person_line(person), person.id)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn person(first: &str) -> Person {
        Person {
            id: Uuid::new_v4(),
            first_name: first.into(),
            last_name: "Petit".into(),
            birth_date: None,
            death_date: None,
            birth_place: None,
            is_public: true,
            created_by: None,
            created_at: None,
            blockchain_hash: None,
        }
    }

    #[test]
    fn test_empty_state_prompts_to_add_people() {
        let rendered = render_state(&TreeState::default());
        assert!(rendered.contains(EMPTY_TREE));
        assert!(!rendered.contains("Personne centrale"));
    }

    #[test]
    fn test_lone_person_shows_only_center() {
        let state = TreeState::new(vec![person("Lou")], Vec::new());
        let rendered = render_state(&state);
        assert!(rendered.contains("Personne centrale"));
        assert!(rendered.contains("Lou Petit"));
        assert!(!rendered.contains("Parents"));
        assert!(!rendered.contains("Enfants"));
    }

    #[test]
    fn test_groups_render_in_order() {
        let tree = FamilyTree {
            center: person("Luc"),
            parents: vec![person("Marc")],
            children: vec![person("Zoé")],
        };
        let rendered = render_tree(&tree);
        let parents = rendered.find("Marc").unwrap();
        let center = rendered.find("Luc").unwrap();
        let child = rendered.find("Zoé").unwrap();
        assert!(parents < center && center < child);
    }
}
