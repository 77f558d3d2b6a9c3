//! Polish honorific + vocative first name ("Pani Anno", "Panie Marku").
//!
//! Vocatives come from a fixed table of common first names; anything not in
//! the table gets no salutation rather than a guessed declension.

use std::sync::LazyLock;

use regex::Regex;

use crate::personalize::SalutationProvider;

/// A first-name token: letters only, Polish diacritics allowed, optional
/// hyphenated second part ("Anna-Maria").
static NAME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}+(-\p{L}+)?$").expect("valid name regex"));

/// Masculine names ending in `a`, lowercase.
const MASCULINE_ENDING_A: &[&str] = &[
    "barnaba",
    "bonawentura",
    "boryna",
    "jarema",
    "kosma",
    "kuba",
    "saba",
    "sasza",
];

/// Nominative (lowercase) → vocative.
const VOCATIVES: &[(&str, &str)] = &[
    // feminine
    ("agata", "Agato"),
    ("agnieszka", "Agnieszko"),
    ("aleksandra", "Aleksandro"),
    ("alicja", "Alicjo"),
    ("anna", "Anno"),
    ("barbara", "Barbaro"),
    ("beata", "Beato"),
    ("dominika", "Dominiko"),
    ("dorota", "Doroto"),
    ("ewa", "Ewo"),
    ("ewelina", "Ewelino"),
    ("grażyna", "Grażyno"),
    ("iwona", "Iwono"),
    ("joanna", "Joanno"),
    ("justyna", "Justyno"),
    ("karolina", "Karolino"),
    ("katarzyna", "Katarzyno"),
    ("magdalena", "Magdaleno"),
    ("małgorzata", "Małgorzato"),
    ("maria", "Mario"),
    ("marta", "Marto"),
    ("monika", "Moniko"),
    ("natalia", "Natalio"),
    ("paulina", "Paulino"),
    ("renata", "Renato"),
    ("urszula", "Urszulo"),
    ("weronika", "Weroniko"),
    ("zofia", "Zofio"),
    // masculine
    ("adam", "Adamie"),
    ("andrzej", "Andrzeju"),
    ("bartosz", "Bartoszu"),
    ("damian", "Damianie"),
    ("dariusz", "Dariuszu"),
    ("grzegorz", "Grzegorzu"),
    ("jakub", "Jakubie"),
    ("jan", "Janie"),
    ("janusz", "Januszu"),
    ("jarosław", "Jarosławie"),
    ("jerzy", "Jerzy"),
    ("kamil", "Kamilu"),
    ("krzysztof", "Krzysztofie"),
    ("kuba", "Kubo"),
    ("łukasz", "Łukaszu"),
    ("maciej", "Macieju"),
    ("marcin", "Marcinie"),
    ("marek", "Marku"),
    ("mariusz", "Mariuszu"),
    ("mateusz", "Mateuszu"),
    ("michał", "Michale"),
    ("paweł", "Pawle"),
    ("piotr", "Piotrze"),
    ("rafał", "Rafale"),
    ("robert", "Robercie"),
    ("sebastian", "Sebastianie"),
    ("stanisław", "Stanisławie"),
    ("tadeusz", "Tadeuszu"),
    ("tomasz", "Tomaszu"),
    ("wojciech", "Wojciechu"),
    ("zbigniew", "Zbigniewie"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Feminine,
    Masculine,
}

/// Salutations for Polish first names.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolishSalutations;

impl SalutationProvider for PolishSalutations {
    fn salutation_for(&self, display_name: &str) -> Option<String> {
        let first = extract_first_name(display_name)?;
        let vocative = to_vocative(first)?;
        match guess_gender(first)? {
            Gender::Feminine => Some(format!("Pani {vocative}")),
            Gender::Masculine => Some(format!("Panie {vocative}")),
        }
    }
}

/// First whitespace-delimited token, if any.
pub fn extract_first_name(full_name: &str) -> Option<&str> {
    full_name.split_whitespace().next()
}

/// Offline gender heuristic: `-a` is feminine apart from a few masculine
/// exceptions; any other letter ending is masculine.
pub fn guess_gender(first_name: &str) -> Option<Gender> {
    let name = first_name.trim().to_lowercase();
    let last = name.chars().last()?;
    if MASCULINE_ENDING_A.contains(&name.as_str()) {
        Some(Gender::Masculine)
    } else if last == 'a' {
        Some(Gender::Feminine)
    } else if last.is_alphabetic() {
        Some(Gender::Masculine)
    } else {
        None
    }
}

/// Vocative form of a known first name.
pub fn to_vocative(first_name: &str) -> Option<&'static str> {
    let name = first_name.trim();
    if !NAME_TOKEN.is_match(name) {
        return None;
    }
    let lower = name.to_lowercase();
    VOCATIVES
        .iter()
        .find(|(nominative, _)| *nominative == lower)
        .map(|(_, vocative)| *vocative)
}
