use crate::models::{
    profile::Profile,
    stats::{Badge, UserStats},
};

use super::{format_timestamp, NOT_SET};

fn rank(stats: &UserStats) -> &'static str {
    if stats.badges().contains(&Badge::Expert) {
        "Généalogiste Expert"
    } else {
        "Généalogiste Débutant"
    }
}

pub fn render_stats(stats: &UserStats) -> String {
    let mut out = format!("{} points · {}\n", stats.total_points, rank(stats));
    out.push_str(&format!("  Personnes ajoutées : {}\n", stats.people_added));
    out.push_str(&format!("  Relations créées : {}\n", stats.relations_created));
    out.push_str(&format!("  Sources vérifiées : {}\n", stats.sources_verified));

    if stats.is_newcomer() {
        out.push_str("Ajoutez une personne ou vérifiez une source pour gagner vos premiers points.\n");
    }

    let badges = stats.badges();
    if badges.is_empty() {
        out.push_str("Aucun badge pour le moment.\n");
    } else {
        out.push_str("Badges\n");
        for badge in badges {
            out.push_str(&format!("  * {} : {}\n", badge.title(), badge.description()));
        }
    }
    out
}

pub fn render_profile(display_name: &str, profile: &Profile, stats: &UserStats) -> String {
    let mut out = format!("{display_name}\n");
    out.push_str(&format!("Membre depuis {}\n", format_timestamp(stats.member_since)));
    out.push_str(&format!("  Bio : {}\n", or_not_set(&profile.bio)));
    out.push_str(&format!("  Localisation : {}\n", or_not_set(&profile.location)));
    if !profile.interests.is_empty() {
        out.push_str(&format!("  Intérêts : {}\n", profile.interests.join(", ")));
    }
    out.push('\n');
    out.push_str(&render_stats(stats));
    out
}

fn or_not_set(value: &str) -> &str {
    if value.trim().is_empty() {
        NOT_SET
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_badges_listed() {
        let out = render_stats(&UserStats::from_counts(10, 0, 0));
        assert!(out.starts_with("100 points · Généalogiste Expert"));
        assert!(out.contains("Collector : 10 personnes ajoutées"));
        assert!(out.contains("Expert : 100 points atteints"));
        assert!(!out.contains("premiers points"));
    }

    #[test]
    fn test_newcomer_profile() {
        let out = render_profile("marie", &Profile::empty(Uuid::new_v4()), &UserStats::default());
        assert!(out.contains("Membre depuis Non renseigné"));
        assert!(out.contains("Bio : Non renseigné"));
        assert!(out.contains("Aucun badge"));
        assert!(out.contains("Généalogiste Débutant"));
        assert!(out.contains("vos premiers points"));

        let relations_only = render_stats(&UserStats::from_counts(0, 3, 0));
        assert!(relations_only.contains("vos premiers points"));
    }
}
