use std::collections::HashMap;

/// Aliases seen on match logs and squad URLs, mapped to one spelling per club.
const PREMIER_LEAGUE_ALIASES: &[(&str, &str)] = &[
    ("Brighton and Hove Albion", "Brighton"),
    ("Brighton And Hove Albion", "Brighton"),
    ("Manchester Utd", "Manchester United"),
    ("Newcastle United", "Newcastle"),
    ("Newcastle Utd", "Newcastle"),
    ("Tottenham Hotspur", "Tottenham"),
    ("West Ham United", "West Ham"),
    ("Wolverhampton Wanderers", "Wolves"),
    ("Sheffield Utd", "Sheffield United"),
    ("West Bromwich Albion", "West Brom"),
    ("Nott'ham Forest", "Nottingham Forest"),
];

/// Name lookup that returns the input unchanged when no alias is known.
#[derive(Debug, Clone, Default)]
pub struct TeamNames {
    aliases: HashMap<String, String>,
}

impl TeamNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn premier_league() -> Self {
        let mut names = Self::new();
        for (alias, canonical) in PREMIER_LEAGUE_ALIASES {
            names.insert(alias, canonical);
        }
        names
    }

    pub fn insert(&mut self, alias: &str, canonical: &str) {
        self.aliases
            .insert(alias.to_string(), canonical.to_string());
    }

    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// Display name from a squad URL slug: `.../Manchester-City-Stats` → `Manchester City`.
pub fn team_name_from_url(url: &str) -> Option<String> {
    let slug = url.trim_end_matches('/').rsplit('/').next()?;
    let slug = slug.strip_suffix("-Stats").unwrap_or(slug);
    let name = slug
        .split('-')
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() { None } else { Some(name) }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_pass_through() {
        let names = TeamNames::premier_league();
        assert_eq!(names.canonical("Manchester Utd"), "Manchester United");
        assert_eq!(names.canonical("Nott'ham Forest"), "Nottingham Forest");
        assert_eq!(names.canonical("Arsenal"), "Arsenal");
    }

    #[test]
    fn slug_to_display_name() {
        assert_eq!(
            team_name_from_url("https://fbref.com/en/squads/b8fd03ef/Manchester-City-Stats")
                .as_deref(),
            Some("Manchester City")
        );
        assert_eq!(
            team_name_from_url("https://fbref.com/en/squads/x/Brighton-and-Hove-Albion-Stats")
                .as_deref(),
            Some("Brighton And Hove Albion")
        );
        assert_eq!(team_name_from_url("https://fbref.com/en/squads/x/-Stats"), None);
    }
}
