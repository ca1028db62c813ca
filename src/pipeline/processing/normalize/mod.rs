//! Venue name canonicalization.
//!
//! Raw venue names arrive in whatever case the scraper found them in
//! ("LUMINATA", "luminata disco", "El Club by Odiseo"). The normalizer maps them
//! to one canonical spelling so that a venue is only ever created once per
//! transformation pass.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Built-in alias table: raw spelling -> canonical name
static DEFAULT_ALIASES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("LUMINATA", "Luminata Disco"),
        ("LUMINATA DISCO", "Luminata Disco"),
        ("ODISEO", "El Club by Odiseo"),
        ("El Club Odiseo", "El Club by Odiseo"),
        ("EL CLUB BY ODISEO", "El Club by Odiseo"),
        ("DODO", "Dodo Club"),
        ("DODO CLUB", "Dodo Club"),
        ("OW", "OW Club"),
        ("OW CLUB", "OW Club"),
    ]
});

#[derive(Debug, Clone)]
pub struct VenueNormalizer {
    exact: HashMap<String, String>,
    // keys lowercased for the second lookup pass
    folded: HashMap<String, String>,
}

impl VenueNormalizer {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        let folded = aliases
            .iter()
            .map(|(raw, canonical)| (raw.trim().to_lowercase(), canonical.clone()))
            .collect();
        let exact = aliases
            .into_iter()
            .map(|(raw, canonical)| (raw.trim().to_string(), canonical))
            .collect();
        Self { exact, folded }
    }

    /// Built-in table with `extra` entries layered on top
    pub fn with_default_aliases(extra: &HashMap<String, String>) -> Self {
        let mut aliases: HashMap<String, String> = DEFAULT_ALIASES
            .iter()
            .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
            .collect();
        aliases.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::new(aliases)
    }

    pub fn normalize(&self, raw_name: &str) -> String {
        let trimmed = raw_name.trim();
        if trimmed.is_empty() {
            return String::new();
        }

        if let Some(canonical) = self.exact.get(trimmed) {
            return canonical.clone();
        }
        if let Some(canonical) = self.folded.get(&trimmed.to_lowercase()) {
            return canonical.clone();
        }

        if is_single_case(trimmed) {
            title_case(trimmed)
        } else {
            trimmed.to_string()
        }
    }
}

impl Default for VenueNormalizer {
    fn default() -> Self {
        Self::with_default_aliases(&HashMap::new())
    }
}

/// True when no cased character disagrees with the others
fn is_single_case(s: &str) -> bool {
    let all_upper = s.chars().all(|c| !c.is_lowercase());
    let all_lower = s.chars().all(|c| !c.is_uppercase());
    all_upper || all_lower
}

/// Capitalize the first letter of every whitespace-delimited token and
/// lowercase the rest. Whitespace itself is preserved.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_token_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_token_start = true;
            out.push(c);
        } else if at_token_start {
            out.extend(c.to_uppercase());
            at_token_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> VenueNormalizer {
        let mut aliases = HashMap::new();
        aliases.insert("LUMINATA".to_string(), "Luminata Disco".to_string());
        aliases.insert("Sala Rem".to_string(), "Sala REM".to_string());
        VenueNormalizer::new(aliases)
    }

    #[test]
    fn empty_and_blank_names_stay_empty() {
        assert_eq!(normalizer().normalize(""), "");
        assert_eq!(normalizer().normalize("   "), "");
    }

    #[test]
    fn exact_alias_wins() {
        assert_eq!(normalizer().normalize("  LUMINATA "), "Luminata Disco");
    }

    #[test]
    fn alias_lookup_falls_back_to_case_insensitive() {
        assert_eq!(normalizer().normalize("luminata"), "Luminata Disco");
        assert_eq!(normalizer().normalize("SALA REM"), "Sala REM");
    }

    #[test]
    fn single_case_names_are_title_cased() {
        assert_eq!(normalizer().normalize("DODO CLUB"), "Dodo Club");
        assert_eq!(normalizer().normalize("el club by odiseo"), "El Club By Odiseo");
        assert_eq!(normalizer().normalize("ÁTICO  MURCIA"), "Ático  Murcia");
    }

    #[test]
    fn mixed_case_names_pass_through_trimmed() {
        assert_eq!(normalizer().normalize(" OW Club "), "OW Club");
        assert_eq!(normalizer().normalize("El Club by Odiseo"), "El Club by Odiseo");
    }

    #[test]
    fn default_table_knows_the_murcia_venues() {
        let n = VenueNormalizer::default();
        assert_eq!(n.normalize("LUMINATA"), "Luminata Disco");
        assert_eq!(n.normalize("dodo club"), "Dodo Club");
    }

    #[test]
    fn configured_aliases_override_defaults() {
        let mut extra = HashMap::new();
        extra.insert("LUMINATA".to_string(), "Luminata".to_string());
        assert_eq!(VenueNormalizer::with_default_aliases(&extra).normalize("LUMINATA"), "Luminata");
    }
}
