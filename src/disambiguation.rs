// src/disambiguation.rs
//
// Builds the follow-up query sent when the user answers "yes" to a
// correction prompt. Plant codes are local to one source dataset and the
// same number can name different plants elsewhere, so a plant name found
// next to the code is preferred over the bare code.

use once_cell::sync::Lazy;
use regex::Regex;

/// `"NAME" (123)` or `"NAME" (code 123)`
static QUOTED_NAME_THEN_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"]+)"\s*\(\s*(?:code\s*)?(\d+)\s*\)"#).expect("valid regex")
});

/// `123 (NAME)`
static CODE_THEN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+)\s*\(\s*([^()\d][^()]*?)\s*\)").expect("valid regex"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlantRef {
    pub name: String,
    pub code: String,
}

/// Collects `(name, code)` pairs mentioned in an assistant response, in
/// order of appearance and without duplicates.
pub fn plant_refs(text: &str) -> Vec<PlantRef> {
    let mut found: Vec<(usize, PlantRef)> = Vec::new();

    for caps in QUOTED_NAME_THEN_CODE.captures_iter(text) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        found.push((
            start,
            PlantRef {
                name: caps[1].trim().to_string(),
                code: caps[2].to_string(),
            },
        ));
    }
    for caps in CODE_THEN_NAME.captures_iter(text) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        found.push((
            start,
            PlantRef {
                name: caps[2].trim().to_string(),
                code: caps[1].to_string(),
            },
        ));
    }

    found.sort_by_key(|(start, _)| *start);
    let mut refs: Vec<PlantRef> = Vec::new();
    for (_, plant) in found {
        if !plant.name.is_empty() && !refs.contains(&plant) {
            refs.push(plant);
        }
    }
    refs
}

fn mentions_code(query: &str, code: &str) -> Option<Regex> {
    let re = Regex::new(&format!(r"\b{}\b", regex::escape(code))).ok()?;
    re.is_match(query).then_some(re)
}

/// Query to resubmit after the user accepts the alternate interpretation.
pub fn alternative_query(original_query: &str, response_text: &str, alternative_type: &str) -> String {
    let refs = plant_refs(response_text);

    for plant in &refs {
        if let Some(re) = mentions_code(original_query, &plant.code) {
            let quoted = format!("\"{}\"", plant.name);
            return re
                .replace(original_query, regex::NoExpand(&quoted))
                .into_owned();
        }
    }

    if let [plant] = refs.as_slice() {
        return format!("{} \"{}\"", original_query.trim_end(), plant.name);
    }

    let alternative_type = alternative_type.trim();
    if alternative_type.is_empty() {
        original_query.to_string()
    } else {
        format!("{} ({})", original_query.trim_end(), alternative_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_both_spellings() {
        let refs = plant_refs(r#"Found "ANGRA 1" (12) and also 45 (FURNAS)."#);
        assert_eq!(
            refs,
            vec![
                PlantRef {
                    name: "ANGRA 1".to_string(),
                    code: "12".to_string()
                },
                PlantRef {
                    name: "FURNAS".to_string(),
                    code: "45".to_string()
                },
            ]
        );
    }

    #[test]
    fn prefers_name_over_code_in_query() {
        let query = alternative_query(
            "what is the cvu of plant 12?",
            r#"No thermal plant 12 in this deck. Did you mean "ANGRA 1" (code 12)?"#,
            "nuclear",
        );
        assert_eq!(query, r#"what is the cvu of plant "ANGRA 1"?"#);
    }

    #[test]
    fn code_must_match_as_a_whole_word() {
        let query = alternative_query("minimum generation of 123", "see 12 (ANGRA 1)", "thermal");
        assert_eq!(query, r#"minimum generation of 123 "ANGRA 1""#);
    }

    #[test]
    fn falls_back_to_alternative_type() {
        let query = alternative_query("flow limits for 7", "Nothing found.", "hydro");
        assert_eq!(query, "flow limits for 7 (hydro)");

        let query = alternative_query("flow limits for 7", "Nothing found.", "  ");
        assert_eq!(query, "flow limits for 7");
    }

    #[test]
    fn ambiguous_names_without_code_match_fall_back() {
        let query = alternative_query(
            "cvu of plant x",
            r#""A" (1) or "B" (2)"#,
            "thermal",
        );
        assert_eq!(query, "cvu of plant x (thermal)");
    }

    #[test]
    fn parenthesized_numbers_are_not_names() {
        assert!(plant_refs("stage 3 (2025)").is_empty());
    }
}
