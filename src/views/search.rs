use crate::{models::person::Person, services::search::SearchSummary};

use super::person_line;

pub fn render_results(summary: &SearchSummary, people: &[Person]) -> String {
    let mut out = format!(
        "{} personne(s) publique(s), {} résultat(s)\n",
        summary.public_people, summary.results
    );
    if people.is_empty() {
        out.push_str("Aucun résultat. Essayez d'élargir vos critères.\n");
        return out;
    }
    for person in people {
        out.push_str(&format!("  - {} [{}]\n", person_line(person), person.id));
    }
    out
}
