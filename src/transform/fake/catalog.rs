//! Faker catalog
//!
//! Every generator is addressed as `dataset.method` and draws all of its
//! randomness from the supplied RNG, so a seeded RNG yields a reproducible
//! value.

use crate::schema::{LogicalType, Value};
use rand::Rng;
use rand::rngs::StdRng;
use std::fmt;
use std::str::FromStr;

/// Language of generated names, places and text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl FromStr for Locale {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "fr" => Ok(Locale::Fr),
            other => Err(eyre::eyre!(
                "Unsupported fake locale '{}'. Supported: en, fr",
                other
            )),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::En => f.write_str("en"),
            Locale::Fr => f.write_str("fr"),
        }
    }
}

/// One named generator
pub struct Faker {
    pub dataset: &'static str,
    pub method: &'static str,
    pub description: &'static str,
    pub logical_type: LogicalType,
    pub generate: fn(&mut StdRng, Locale) -> Value,
}

impl Faker {
    pub fn path(&self) -> String {
        format!("{}.{}", self.dataset, self.method)
    }
}

impl fmt::Debug for Faker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Faker")
            .field("path", &self.path())
            .field("logical_type", &self.logical_type)
            .finish()
    }
}

/// Look up a generator by `dataset.method`, ignoring case
pub fn find(path: &str) -> Option<&'static Faker> {
    let (dataset, method) = path.trim().split_once('.')?;
    FAKERS.iter().find(|f| {
        f.dataset.eq_ignore_ascii_case(dataset) && f.method.eq_ignore_ascii_case(method)
    })
}

pub fn all() -> &'static [Faker] {
    FAKERS
}

static FAKERS: &[Faker] = &[
    Faker {
        dataset: "name",
        method: "firstname",
        description: "Given name",
        logical_type: LogicalType::Text,
        generate: first_name,
    },
    Faker {
        dataset: "name",
        method: "lastname",
        description: "Family name",
        logical_type: LogicalType::Text,
        generate: last_name,
    },
    Faker {
        dataset: "name",
        method: "fullname",
        description: "Given and family name",
        logical_type: LogicalType::Text,
        generate: full_name,
    },
    Faker {
        dataset: "internet",
        method: "email",
        description: "Email address",
        logical_type: LogicalType::Text,
        generate: email,
    },
    Faker {
        dataset: "internet",
        method: "username",
        description: "Login name",
        logical_type: LogicalType::Text,
        generate: username,
    },
    Faker {
        dataset: "internet",
        method: "domain",
        description: "Domain name",
        logical_type: LogicalType::Text,
        generate: domain,
    },
    Faker {
        dataset: "address",
        method: "city",
        description: "City name",
        logical_type: LogicalType::Text,
        generate: city,
    },
    Faker {
        dataset: "address",
        method: "country",
        description: "Country name",
        logical_type: LogicalType::Text,
        generate: country,
    },
    Faker {
        dataset: "address",
        method: "street",
        description: "Street address",
        logical_type: LogicalType::Text,
        generate: street,
    },
    Faker {
        dataset: "address",
        method: "zipcode",
        description: "Five digit postal code",
        logical_type: LogicalType::Text,
        generate: zipcode,
    },
    Faker {
        dataset: "phone",
        method: "number",
        description: "Phone number",
        logical_type: LogicalType::Text,
        generate: phone_number,
    },
    Faker {
        dataset: "company",
        method: "name",
        description: "Company name",
        logical_type: LogicalType::Text,
        generate: company_name,
    },
    Faker {
        dataset: "lorem",
        method: "word",
        description: "Single placeholder word",
        logical_type: LogicalType::Text,
        generate: lorem_word,
    },
    Faker {
        dataset: "lorem",
        method: "sentence",
        description: "Placeholder sentence",
        logical_type: LogicalType::Text,
        generate: lorem_sentence,
    },
    Faker {
        dataset: "random",
        method: "number",
        description: "Integer between 0 and 999999",
        logical_type: LogicalType::Integer,
        generate: random_number,
    },
    Faker {
        dataset: "random",
        method: "uuid",
        description: "Version 4 UUID",
        logical_type: LogicalType::Text,
        generate: random_uuid,
    },
];

const FIRST_NAMES_EN: &[&str] = &[
    "James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael", "Linda", "William",
    "Elizabeth", "David", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Daniel", "Nancy", "Matthew", "Lisa",
];

const FIRST_NAMES_FR: &[&str] = &[
    "Jean", "Marie", "Pierre", "Nathalie", "Michel", "Isabelle", "Philippe", "Sylvie", "Alain",
    "Catherine", "Nicolas", "Sophie", "Christophe", "Camille", "Julien", "Chloe", "Antoine",
    "Manon", "Laurent", "Helene", "Hugo", "Lea", "Louis", "Emma",
];

const LAST_NAMES_EN: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Wilson",
    "Anderson", "Taylor", "Thomas", "Moore", "Jackson", "Martin", "Lee", "Thompson", "White",
    "Harris", "Clark", "Lewis", "Walker", "Hall", "Young",
];

const LAST_NAMES_FR: &[&str] = &[
    "Martin", "Bernard", "Dubois", "Thomas", "Robert", "Richard", "Petit", "Durand", "Leroy",
    "Moreau", "Simon", "Laurent", "Lefebvre", "Michel", "Garcia", "David", "Bertrand", "Roux",
    "Vincent", "Fournier", "Morel", "Girard", "Andre", "Mercier",
];

const DOMAINS_EN: &[&str] = &[
    "example.com", "mail.com", "inbox.net", "webmail.org", "post.io", "letters.co",
];

const DOMAINS_FR: &[&str] = &[
    "exemple.fr", "courriel.fr", "boite.net", "poste.fr", "messagerie.org", "lettre.eu",
];

const CITIES_EN: &[&str] = &[
    "Springfield", "Riverside", "Fairview", "Madison", "Georgetown", "Salem", "Franklin",
    "Clinton", "Greenville", "Bristol", "Oxford", "Arlington",
];

const CITIES_FR: &[&str] = &[
    "Paris", "Lyon", "Marseille", "Toulouse", "Nice", "Nantes", "Strasbourg", "Montpellier",
    "Bordeaux", "Lille", "Rennes", "Grenoble",
];

const COUNTRIES_EN: &[&str] = &[
    "United States", "Canada", "United Kingdom", "Australia", "Ireland", "New Zealand",
    "Germany", "Japan", "Brazil", "India",
];

const COUNTRIES_FR: &[&str] = &[
    "France", "Belgique", "Suisse", "Canada", "Luxembourg", "Maroc", "Senegal", "Espagne",
    "Allemagne", "Italie",
];

const STREETS_EN: &[&str] = &[
    "Main", "Oak", "Pine", "Maple", "Cedar", "Elm", "Washington", "Lake", "Hill", "Park",
];

const STREET_SUFFIXES_EN: &[&str] = &["Street", "Avenue", "Road", "Lane", "Drive", "Court"];

const STREETS_FR: &[&str] = &[
    "de la Paix", "Victor Hugo", "de la Republique", "des Lilas", "du Moulin", "Pasteur",
    "Jean Jaures", "de l'Eglise", "des Ecoles", "du Stade",
];

const STREET_PREFIXES_FR: &[&str] = &["rue", "avenue", "boulevard", "place", "impasse", "chemin"];

const COMPANY_SUFFIXES_EN: &[&str] = &["Inc", "LLC", "Group", "and Sons", "Corp", "Partners"];

const COMPANY_SUFFIXES_FR: &[&str] = &["SA", "SARL", "et Fils", "Groupe", "SAS", "Associes"];

const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua",
    "enim", "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris",
];

fn pick(rng: &mut StdRng, list: &'static [&'static str]) -> &'static str {
    list[rng.gen_range(0..list.len())]
}

fn by_locale(
    locale: Locale,
    en: &'static [&'static str],
    fr: &'static [&'static str],
) -> &'static [&'static str] {
    match locale {
        Locale::En => en,
        Locale::Fr => fr,
    }
}

fn digits(rng: &mut StdRng, count: usize) -> String {
    (0..count)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn slug(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn first_name(rng: &mut StdRng, locale: Locale) -> Value {
    Value::from(pick(rng, by_locale(locale, FIRST_NAMES_EN, FIRST_NAMES_FR)))
}

fn last_name(rng: &mut StdRng, locale: Locale) -> Value {
    Value::from(pick(rng, by_locale(locale, LAST_NAMES_EN, LAST_NAMES_FR)))
}

fn full_name(rng: &mut StdRng, locale: Locale) -> Value {
    let first = pick(rng, by_locale(locale, FIRST_NAMES_EN, FIRST_NAMES_FR));
    let last = pick(rng, by_locale(locale, LAST_NAMES_EN, LAST_NAMES_FR));
    Value::Text(format!("{} {}", first, last))
}

fn email(rng: &mut StdRng, locale: Locale) -> Value {
    let first = pick(rng, by_locale(locale, FIRST_NAMES_EN, FIRST_NAMES_FR));
    let last = pick(rng, by_locale(locale, LAST_NAMES_EN, LAST_NAMES_FR));
    let number = rng.gen_range(1..100u32);
    let domain = pick(rng, by_locale(locale, DOMAINS_EN, DOMAINS_FR));
    Value::Text(format!("{}.{}{}@{}", slug(first), slug(last), number, domain))
}

fn username(rng: &mut StdRng, locale: Locale) -> Value {
    let first = pick(rng, by_locale(locale, FIRST_NAMES_EN, FIRST_NAMES_FR));
    Value::Text(format!("{}{}", slug(first), digits(rng, 4)))
}

fn domain(rng: &mut StdRng, locale: Locale) -> Value {
    Value::from(pick(rng, by_locale(locale, DOMAINS_EN, DOMAINS_FR)))
}

fn city(rng: &mut StdRng, locale: Locale) -> Value {
    Value::from(pick(rng, by_locale(locale, CITIES_EN, CITIES_FR)))
}

fn country(rng: &mut StdRng, locale: Locale) -> Value {
    Value::from(pick(rng, by_locale(locale, COUNTRIES_EN, COUNTRIES_FR)))
}

fn street(rng: &mut StdRng, locale: Locale) -> Value {
    let number = rng.gen_range(1..1000u32);
    let text = match locale {
        Locale::En => format!(
            "{} {} {}",
            number,
            pick(rng, STREETS_EN),
            pick(rng, STREET_SUFFIXES_EN)
        ),
        Locale::Fr => format!(
            "{} {} {}",
            number,
            pick(rng, STREET_PREFIXES_FR),
            pick(rng, STREETS_FR)
        ),
    };
    Value::Text(text)
}

fn zipcode(rng: &mut StdRng, _locale: Locale) -> Value {
    Value::Text(digits(rng, 5))
}

fn phone_number(rng: &mut StdRng, locale: Locale) -> Value {
    let text = match locale {
        Locale::En => format!(
            "({}) {}-{}",
            rng.gen_range(200..1000u32),
            digits(rng, 3),
            digits(rng, 4)
        ),
        Locale::Fr => format!(
            "0{} {} {} {} {}",
            rng.gen_range(1..10u32),
            digits(rng, 2),
            digits(rng, 2),
            digits(rng, 2),
            digits(rng, 2)
        ),
    };
    Value::Text(text)
}

fn company_name(rng: &mut StdRng, locale: Locale) -> Value {
    let last = pick(rng, by_locale(locale, LAST_NAMES_EN, LAST_NAMES_FR));
    let suffix = pick(rng, by_locale(locale, COMPANY_SUFFIXES_EN, COMPANY_SUFFIXES_FR));
    Value::Text(format!("{} {}", last, suffix))
}

fn lorem_word(rng: &mut StdRng, _locale: Locale) -> Value {
    Value::from(pick(rng, LOREM))
}

fn lorem_sentence(rng: &mut StdRng, _locale: Locale) -> Value {
    let count = rng.gen_range(5..11usize);
    let words: Vec<&str> = (0..count).map(|_| pick(rng, LOREM)).collect();
    let mut sentence = words.join(" ");
    if let Some(first) = sentence.get(0..1) {
        let upper = first.to_ascii_uppercase();
        sentence.replace_range(0..1, &upper);
    }
    sentence.push('.');
    Value::Text(sentence)
}

fn random_number(rng: &mut StdRng, _locale: Locale) -> Value {
    Value::Int(rng.gen_range(0..1_000_000i64))
}

fn random_uuid(rng: &mut StdRng, _locale: Locale) -> Value {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    Value::Text(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
}
