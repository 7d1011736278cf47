use crate::services::dashboard::Dashboard;

use super::{format_timestamp, person_line, profile::render_stats};

pub fn render(dashboard: &Dashboard) -> String {
    let mut out = format!("Bonjour {} !\n", dashboard.display_name);
    if !dashboard.connected {
        out.push_str("Connexion au serveur impossible, les données peuvent être incomplètes.\n");
    }
    out.push('\n');
    out.push_str(&render_stats(&dashboard.stats));
    out.push('\n');

    if dashboard.recent.is_empty() {
        out.push_str("Aucune personne ajoutée pour le moment.\n");
        return out;
    }
    out.push_str(&format!(
        "Ajouts récents ({} certifié(s))\n",
        dashboard.certified_count()
    ));
    for person in &dashboard.recent {
        out.push_str(&format!(
            "  - {} · ajouté le {}\n",
            person_line(person),
            format_timestamp(person.created_at)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::models::{profile::Profile, stats::UserStats};

    #[test]
    fn test_offline_empty_dashboard() {
        let dashboard = Dashboard {
            display_name: "marie".into(),
            profile: Profile::empty(Uuid::new_v4()),
            stats: UserStats::default(),
            recent: Vec::new(),
            connected: false,
        };
        let out = render(&dashboard);
        assert!(out.starts_with("Bonjour marie !"));
        assert!(out.contains("Connexion au serveur impossible"));
        assert!(out.contains("Aucune personne ajoutée"));
    }
}
