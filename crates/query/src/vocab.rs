//! Closed vocabularies for the automotive-parts domain
//!
//! Category indicators are multilingual (English and German, the catalog's
//! main markets). Matching is substring-based over the normalized query, so
//! every indicator is lowercase.

use parts_search_core::Position;

/// One product category with its indicator phrases
pub struct CategoryEntry {
    /// Canonical category name
    pub name: &'static str,
    /// Lowercase phrases that indicate the category; first match wins
    pub indicators: &'static [&'static str],
}

/// The category vocabulary. Order matters: more specific categories come
/// before the generic ones that share an indicator word.
pub const CATEGORIES: &[CategoryEntry] = &[
    CategoryEntry {
        name: "brake pad",
        indicators: &["brake pad", "brake pads", "bremsbelag", "bremsbelaege", "bremsbeläge", "pad set"],
    },
    CategoryEntry {
        name: "brake disc",
        indicators: &["brake disc", "brake discs", "brake rotor", "bremsscheibe", "bremsscheiben"],
    },
    CategoryEntry {
        name: "brake caliper",
        indicators: &["brake caliper", "caliper", "bremssattel"],
    },
    CategoryEntry {
        name: "oil filter",
        indicators: &["oil filter", "oelfilter", "ölfilter"],
    },
    CategoryEntry {
        name: "air filter",
        indicators: &["air filter", "luftfilter"],
    },
    CategoryEntry {
        name: "fuel filter",
        indicators: &["fuel filter", "kraftstofffilter", "dieselfilter"],
    },
    CategoryEntry {
        name: "cabin filter",
        indicators: &["cabin filter", "pollen filter", "innenraumfilter", "pollenfilter"],
    },
    CategoryEntry {
        name: "spark plug",
        indicators: &["spark plug", "spark plugs", "zuendkerze", "zündkerze", "zuendkerzen"],
    },
    CategoryEntry {
        name: "glow plug",
        indicators: &["glow plug", "gluehkerze", "glühkerze"],
    },
    CategoryEntry {
        name: "wheel bearing",
        indicators: &["wheel bearing", "radlager", "hub bearing"],
    },
    CategoryEntry {
        name: "shock absorber",
        indicators: &["shock absorber", "shock", "stossdaempfer", "stoßdämpfer", "damper"],
    },
    CategoryEntry {
        name: "coil spring",
        indicators: &["coil spring", "fahrwerksfeder", "suspension spring"],
    },
    CategoryEntry {
        name: "control arm",
        indicators: &["control arm", "querlenker", "wishbone"],
    },
    CategoryEntry {
        name: "tie rod",
        indicators: &["tie rod", "spurstange", "track rod"],
    },
    CategoryEntry {
        name: "ball joint",
        indicators: &["ball joint", "traggelenk"],
    },
    CategoryEntry {
        name: "cv joint",
        indicators: &["cv joint", "gelenksatz", "drive shaft joint"],
    },
    CategoryEntry {
        name: "timing belt",
        indicators: &["timing belt", "zahnriemen", "cam belt"],
    },
    CategoryEntry {
        name: "drive belt",
        indicators: &["drive belt", "keilrippenriemen", "serpentine belt", "v-belt"],
    },
    CategoryEntry {
        name: "water pump",
        indicators: &["water pump", "wasserpumpe", "coolant pump"],
    },
    CategoryEntry {
        name: "fuel pump",
        indicators: &["fuel pump", "kraftstoffpumpe"],
    },
    CategoryEntry {
        name: "radiator",
        indicators: &["radiator", "kuehler", "kühler"],
    },
    CategoryEntry {
        name: "thermostat",
        indicators: &["thermostat"],
    },
    CategoryEntry {
        name: "clutch kit",
        indicators: &["clutch kit", "clutch", "kupplung", "kupplungssatz"],
    },
    CategoryEntry {
        name: "alternator",
        indicators: &["alternator", "lichtmaschine", "generator"],
    },
    CategoryEntry {
        name: "starter",
        indicators: &["starter motor", "starter", "anlasser"],
    },
    CategoryEntry {
        name: "battery",
        indicators: &["battery", "batterie", "autobatterie"],
    },
    CategoryEntry {
        name: "ignition coil",
        indicators: &["ignition coil", "zuendspule", "zündspule"],
    },
    CategoryEntry {
        name: "oxygen sensor",
        indicators: &["oxygen sensor", "lambda sensor", "lambdasonde", "o2 sensor"],
    },
    CategoryEntry {
        name: "abs sensor",
        indicators: &["abs sensor", "wheel speed sensor", "abs-sensor"],
    },
    CategoryEntry {
        name: "wiper blade",
        indicators: &["wiper blade", "wiper blades", "scheibenwischer", "wischblatt"],
    },
    CategoryEntry {
        name: "headlight",
        indicators: &["headlight", "headlamp", "scheinwerfer"],
    },
    CategoryEntry {
        name: "turbocharger",
        indicators: &["turbocharger", "turbolader", "turbo charger"],
    },
    CategoryEntry {
        name: "egr valve",
        indicators: &["egr valve", "agr-ventil", "agr ventil"],
    },
];

/// Related-category adjacency used for cross-sell suggestions
pub const RELATED_CATEGORIES: &[(&str, &[&str])] = &[
    ("brake pad", &["brake disc", "brake caliper"]),
    ("brake disc", &["brake pad", "abs sensor"]),
    ("brake caliper", &["brake pad", "brake disc"]),
    ("oil filter", &["air filter", "fuel filter"]),
    ("air filter", &["oil filter", "cabin filter"]),
    ("fuel filter", &["oil filter", "fuel pump"]),
    ("cabin filter", &["air filter"]),
    ("spark plug", &["ignition coil"]),
    ("glow plug", &["battery"]),
    ("ignition coil", &["spark plug"]),
    ("wheel bearing", &["abs sensor"]),
    ("shock absorber", &["coil spring"]),
    ("coil spring", &["shock absorber"]),
    ("control arm", &["ball joint", "tie rod"]),
    ("tie rod", &["control arm", "ball joint"]),
    ("ball joint", &["control arm"]),
    ("timing belt", &["water pump", "drive belt"]),
    ("drive belt", &["timing belt"]),
    ("water pump", &["timing belt", "thermostat"]),
    ("thermostat", &["water pump", "radiator"]),
    ("radiator", &["thermostat", "water pump"]),
    ("battery", &["alternator", "starter"]),
    ("alternator", &["battery", "drive belt"]),
    ("starter", &["battery"]),
    ("oxygen sensor", &["egr valve"]),
    ("turbocharger", &["air filter", "oil filter"]),
];

/// Known manufacturer names, canonical casing
pub const BRANDS: &[&str] = &[
    "Bosch", "Brembo", "ATE", "TRW", "Textar", "Ferodo", "Pagid", "Febi", "Meyle", "Lemforder",
    "Bilstein", "Sachs", "Monroe", "KYB", "Mann-Filter", "Mahle", "Hengst", "Purflux", "NGK",
    "Denso", "Champion", "Delphi", "Valeo", "Hella", "Osram", "Philips", "SKF", "FAG", "INA",
    "Gates", "Continental", "Dayco", "Pierburg", "Luk", "Elring", "Victor-Reinz", "Nissens",
    "Behr", "Wahler", "Varta", "Exide",
];

/// One vehicle make with the model names the parser recognizes
pub struct MakeEntry {
    pub name: &'static str,
    /// Lowercase aliases accepted for the make
    pub aliases: &'static [&'static str],
    /// Lowercase model names
    pub models: &'static [&'static str],
}

pub const MAKES: &[MakeEntry] = &[
    MakeEntry {
        name: "Toyota",
        aliases: &["toyota"],
        models: &["camry", "corolla", "rav4", "yaris", "hilux", "land cruiser", "prius", "avensis", "auris"],
    },
    MakeEntry {
        name: "Honda",
        aliases: &["honda"],
        models: &["civic", "accord", "cr-v", "crv", "jazz", "hr-v"],
    },
    MakeEntry {
        name: "Nissan",
        aliases: &["nissan"],
        models: &["qashqai", "juke", "micra", "navara", "x-trail", "leaf", "altima"],
    },
    MakeEntry {
        name: "Mazda",
        aliases: &["mazda"],
        models: &["mazda3", "mazda6", "cx-5", "cx-3", "mx-5"],
    },
    MakeEntry {
        name: "Volkswagen",
        aliases: &["volkswagen", "vw"],
        models: &["golf", "passat", "polo", "tiguan", "touran", "caddy", "transporter", "jetta", "touareg"],
    },
    MakeEntry {
        name: "Audi",
        aliases: &["audi"],
        models: &["a1", "a3", "a4", "a5", "a6", "a8", "q3", "q5", "q7", "tt"],
    },
    MakeEntry {
        name: "BMW",
        aliases: &["bmw"],
        models: &["1 series", "3 series", "5 series", "7 series", "x1", "x3", "x5", "e46", "e90", "f30", "g20"],
    },
    MakeEntry {
        name: "Mercedes-Benz",
        aliases: &["mercedes", "mercedes-benz", "benz"],
        models: &["a-class", "c-class", "e-class", "s-class", "glc", "gle", "sprinter", "vito", "w204", "w205", "w212"],
    },
    MakeEntry {
        name: "Opel",
        aliases: &["opel", "vauxhall"],
        models: &["astra", "corsa", "insignia", "vectra", "zafira", "mokka"],
    },
    MakeEntry {
        name: "Ford",
        aliases: &["ford"],
        models: &["focus", "fiesta", "mondeo", "kuga", "ranger", "transit", "mustang", "f-150"],
    },
    MakeEntry {
        name: "Chevrolet",
        aliases: &["chevrolet", "chevy"],
        models: &["cruze", "malibu", "silverado", "aveo", "captiva"],
    },
    MakeEntry {
        name: "Peugeot",
        aliases: &["peugeot"],
        models: &["208", "308", "508", "2008", "3008", "partner"],
    },
    MakeEntry {
        name: "Renault",
        aliases: &["renault"],
        models: &["clio", "megane", "scenic", "kangoo", "captur", "laguna"],
    },
    MakeEntry {
        name: "Citroen",
        aliases: &["citroen", "citroën"],
        models: &["c3", "c4", "c5", "berlingo", "picasso"],
    },
    MakeEntry {
        name: "Fiat",
        aliases: &["fiat"],
        models: &["500", "punto", "panda", "ducato", "tipo"],
    },
    MakeEntry {
        name: "Skoda",
        aliases: &["skoda", "škoda"],
        models: &["octavia", "fabia", "superb", "kodiaq", "rapid"],
    },
    MakeEntry {
        name: "Seat",
        aliases: &["seat"],
        models: &["ibiza", "leon", "ateca", "alhambra"],
    },
    MakeEntry {
        name: "Hyundai",
        aliases: &["hyundai"],
        models: &["i10", "i20", "i30", "tucson", "santa fe", "elantra", "sonata"],
    },
    MakeEntry {
        name: "Kia",
        aliases: &["kia"],
        models: &["ceed", "sportage", "sorento", "rio", "picanto", "optima"],
    },
    MakeEntry {
        name: "Volvo",
        aliases: &["volvo"],
        models: &["v40", "v60", "v70", "s60", "s90", "xc60", "xc90"],
    },
    MakeEntry {
        name: "Subaru",
        aliases: &["subaru"],
        models: &["impreza", "forester", "outback", "legacy"],
    },
    MakeEntry {
        name: "Mitsubishi",
        aliases: &["mitsubishi"],
        models: &["lancer", "outlander", "pajero", "l200", "asx"],
    },
    MakeEntry {
        name: "Suzuki",
        aliases: &["suzuki"],
        models: &["swift", "vitara", "jimny", "sx4"],
    },
    MakeEntry {
        name: "Lexus",
        aliases: &["lexus"],
        models: &["is", "es", "rx", "nx", "ct"],
    },
    MakeEntry {
        name: "Porsche",
        aliases: &["porsche"],
        models: &["911", "cayenne", "macan", "panamera", "boxster"],
    },
];

/// Lowercase indicator phrases for mounting positions
pub const POSITION_INDICATORS: &[(&str, Position)] = &[
    ("front", Position::Front),
    ("vorne", Position::Front),
    ("vorderachse", Position::Front),
    ("rear", Position::Rear),
    ("back", Position::Rear),
    ("hinten", Position::Rear),
    ("hinterachse", Position::Rear),
    ("left", Position::Left),
    ("links", Position::Left),
    ("right", Position::Right),
    ("rechts", Position::Right),
    ("upper", Position::Upper),
    ("oben", Position::Upper),
    ("lower", Position::Lower),
    ("unten", Position::Lower),
    ("inner", Position::Inner),
    ("innen", Position::Inner),
    ("outer", Position::Outer),
    ("aussen", Position::Outer),
    ("außen", Position::Outer),
    ("driver", Position::Driver),
    ("driver side", Position::Driver),
    ("fahrerseite", Position::Driver),
    ("passenger", Position::Passenger),
    ("passenger side", Position::Passenger),
    ("beifahrerseite", Position::Passenger),
];

/// Engine aspiration / fuel keywords recognized by the size-and-engine detector
pub const ASPIRATIONS: &[&str] = &["turbo", "supercharged", "hybrid", "diesel", "petrol"];

/// Find the category indicated by the normalized query, if any.
/// Returns the canonical name and the indicator phrase that matched.
pub fn detect_category(normalized: &str) -> Option<(&'static str, &'static str)> {
    for entry in CATEGORIES {
        for indicator in entry.indicators {
            if normalized.contains(indicator) {
                return Some((entry.name, indicator));
            }
        }
    }
    None
}

/// Canonical brand name for a token, if it is a known brand
pub fn match_brand(token: &str) -> Option<&'static str> {
    BRANDS
        .iter()
        .find(|b| b.eq_ignore_ascii_case(token))
        .copied()
}

/// True when `value` is in the brand vocabulary (any casing)
pub fn is_known_brand(value: &str) -> bool {
    match_brand(value).is_some()
}

/// Canonical make for a token, if it aliases a known make
pub fn match_make(token: &str) -> Option<&'static MakeEntry> {
    MAKES
        .iter()
        .find(|m| m.aliases.iter().any(|a| a.eq_ignore_ascii_case(token)))
}

/// Look up a make entry by canonical name (any casing)
pub fn make_by_name(name: &str) -> Option<&'static MakeEntry> {
    MAKES.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}

/// True when `value` is a known category name
pub fn is_known_category(value: &str) -> bool {
    CATEGORIES.iter().any(|c| c.name.eq_ignore_ascii_case(value))
}

/// Closest category by substring containment either way, for lenient fixups
pub fn closest_category(value: &str) -> Option<&'static str> {
    let lower = value.to_lowercase();
    CATEGORIES
        .iter()
        .find(|c| c.name.contains(&lower) || lower.contains(c.name))
        .map(|c| c.name)
}

/// Closest brand by substring containment either way, for lenient fixups
pub fn closest_brand(value: &str) -> Option<&'static str> {
    let lower = value.to_lowercase();
    BRANDS
        .iter()
        .find(|b| {
            let known = b.to_lowercase();
            known.contains(&lower) || lower.contains(&known)
        })
        .copied()
}

/// Related categories for cross-sell suggestions
pub fn related_categories(category: &str) -> &'static [&'static str] {
    RELATED_CATEGORIES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(category))
        .map(|(_, related)| *related)
        .unwrap_or(&[])
}
