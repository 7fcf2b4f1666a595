//! Deterministic name and verb canonicalization.
//!
//! The extraction prompt asks the model to apply these rules, and every
//! fragment is passed through them again afterwards, so two articles naming
//! the same entity differently still land on the same node id.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Canonical relationship tokens the graph accepts.
pub const RELATIONSHIP_VOCABULARY: &[&str] = &[
    "FIRED",
    "HIRED",
    "SUED",
    "INVESTED_IN",
    "LAUNCHED",
    "PARTNERED_WITH",
    "ACQUIRED",
    "CRITICIZED",
    "COMPETES_WITH",
];

const RELATIONSHIP_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "FIRED",
        &[
            "FIRE", "FIRES", "FIRING", "DISMISSED", "DISMISS", "DISMISSES", "REMOVED",
            "REMOVE", "REMOVES", "OUSTED", "OUST", "OUSTS", "SACKED", "TERMINATED", "LET_GO",
        ],
    ),
    (
        "HIRED",
        &[
            "HIRE", "HIRES", "HIRING", "APPOINTED", "APPOINT", "APPOINTS", "RECRUITED",
            "RECRUIT", "RECRUITS", "JOINED", "JOIN", "JOINS", "BROUGHT_ON", "EMPLOYED",
            "REINSTATED",
        ],
    ),
    (
        "SUED",
        &[
            "SUE", "SUES", "SUING", "FILED_LAWSUIT", "FILED_LAWSUIT_AGAINST", "FILED_SUIT",
            "FILED_SUIT_AGAINST", "LAWSUIT", "LITIGATED",
        ],
    ),
    (
        "INVESTED_IN",
        &[
            "INVESTED", "INVEST", "INVEST_IN", "INVESTS_IN", "BOUGHT_STAKE", "BOUGHT_STAKE_IN",
            "TOOK_STAKE", "TOOK_STAKE_IN", "FUNDED", "BACKED",
        ],
    ),
    (
        "LAUNCHED",
        &[
            "LAUNCH", "LAUNCHES", "RELEASED", "RELEASE", "RELEASES", "UNVEILED", "UNVEIL",
            "UNVEILS", "INTRODUCED", "REVEALED", "DEBUTED", "SHIPPED",
        ],
    ),
    (
        "PARTNERED_WITH",
        &[
            "PARTNERED", "PARTNER", "PARTNERS", "PARTNERS_WITH", "PARTNER_WITH",
            "COLLABORATED_WITH", "COLLABORATES_WITH", "TEAMED_UP_WITH", "ALLIED_WITH",
        ],
    ),
    (
        "ACQUIRED",
        &["ACQUIRE", "ACQUIRES", "BOUGHT", "PURCHASED", "TOOK_OVER"],
    ),
    (
        "CRITICIZED",
        &["CRITICISED", "CRITICIZE", "CRITICIZES", "SLAMMED"],
    ),
    (
        "COMPETES_WITH",
        &["COMPETE_WITH", "COMPETED_WITH", "COMPETES", "RIVALS", "CHALLENGES"],
    ),
];

static RELATIONSHIPS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for canonical in RELATIONSHIP_VOCABULARY {
        map.insert(*canonical, *canonical);
    }
    for (canonical, synonyms) in RELATIONSHIP_SYNONYMS {
        for synonym in *synonyms {
            map.insert(*synonym, *canonical);
        }
    }
    map
});

// Keys are lowercase.
const ENTITY_ALIASES: &[(&str, &str)] = &[
    ("msft", "Microsoft"),
    ("microsoft", "Microsoft"),
    ("samuel altman", "Sam Altman"),
    ("sam altman", "Sam Altman"),
    ("nvda", "Nvidia"),
    ("nvidia", "Nvidia"),
    ("aapl", "Apple"),
    ("apple", "Apple"),
    ("googl", "Google"),
    ("open ai", "OpenAI"),
    ("openai", "OpenAI"),
    ("nyt", "The New York Times"),
    ("new york times", "The New York Times"),
    ("the new york times", "The New York Times"),
    ("deepmind", "Google DeepMind"),
    ("google deepmind", "Google DeepMind"),
    ("meta platforms", "Meta"),
    ("international business machines", "IBM"),
];

static ALIASES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| ENTITY_ALIASES.iter().copied().collect());

static LEGAL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i),?\s+(corp\.?|corporation|inc\.?|incorporated|ltd\.?|llc|l\.l\.c\.|plc|co\.|gmbh|s\.a\.)$",
    )
    .expect("legal suffix regex")
});

static TRAILING_ZERO_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*?)(?:\.0)+$").expect("version regex"));

const PRODUCT_QUALIFIERS: &[&str] = &[
    "gpu", "gpus", "model", "models", "chip", "chips", "series", "processor",
];

// Words that qualify a model rather than name its series (`M3 Max`, `H100 Tensor Core`).
const PRODUCT_VARIANTS: &[&str] = &[
    "pro", "max", "ultra", "mini", "plus", "turbo", "core", "tensor", "nvl", "lite", "air",
    "nano", "flash", "edge", "super", "ti", "xl", "se",
];

/// Trim markup artifacts and collapse internal whitespace.
pub fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*'))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical form of a company or person name.
pub fn canonical_entity(raw: &str) -> String {
    let mut name = clean_name(raw);
    if let Some(alias) = ALIASES.get(name.to_lowercase().as_str()) {
        return (*alias).to_string();
    }

    loop {
        let stripped = LEGAL_SUFFIX.replace(&name, "").trim().to_string();
        if stripped == name || stripped.is_empty() {
            break;
        }
        name = stripped;
    }

    match ALIASES.get(name.to_lowercase().as_str()) {
        Some(alias) => (*alias).to_string(),
        None => name,
    }
}

/// Canonical `[Brand/Series] [Model]` form of a product name.
pub fn canonical_product(raw: &str) -> String {
    let cleaned = clean_name(raw);
    let mut tokens: Vec<String> = cleaned.split(' ').map(str::to_string).collect();

    while tokens.len() > 1 {
        let last = tokens[tokens.len() - 1].to_lowercase();
        if PRODUCT_QUALIFIERS.contains(&last.as_str()) {
            tokens.pop();
        } else {
            break;
        }
    }

    let next_is_variant = tokens.get(2).is_some_and(|t| is_variant_token(t));
    if tokens.len() >= 2
        && is_model_token(&tokens[0])
        && is_series_token(&tokens[1])
        && !next_is_variant
    {
        tokens.swap(0, 1);
    }

    tokens
        .into_iter()
        .filter(|t| !t.is_empty())
        .map(|t| normalize_version(&t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical node id, dispatching on the coarse node type.
pub fn canonical_node_id(raw: &str, node_type: &str) -> String {
    if node_type.trim().eq_ignore_ascii_case("product") {
        canonical_product(raw)
    } else {
        canonical_entity(raw)
    }
}

/// Map a surface verb onto the canonical vocabulary. `None` means the
/// action is not representable and the edge must be skipped.
pub fn canonical_relationship(raw: &str) -> Option<&'static str> {
    let key = raw
        .trim()
        .to_uppercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    RELATIONSHIPS.get(key.as_str()).copied()
}

/// True if `token` is already a canonical relationship.
pub fn is_canonical_relationship(token: &str) -> bool {
    RELATIONSHIP_VOCABULARY.contains(&token)
}

fn is_model_token(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit()) && token.chars().any(|c| c.is_alphabetic())
}

fn is_series_token(token: &str) -> bool {
    token.len() > 1 && token.chars().all(|c| c.is_alphabetic()) && !is_variant_token(token)
}

fn is_variant_token(token: &str) -> bool {
    PRODUCT_VARIANTS.contains(&token.to_lowercase().as_str())
}

fn normalize_version(token: &str) -> String {
    TRAILING_ZERO_VERSION.replace(token, "$1").into_owned()
}
