//! Tables de classification : codes d'occupation du sol et règles de conflit
//!
//! Le niveau de conflit croise la vocation d'une zone (usage attendu) avec
//! l'occupation observée, exprimée en code de niveau 2 (Corine Land Cover).

use std::fmt;

/// Correspondance classe d'occupation du sol → code de niveau 2
pub const CLASS_CODES: &[(&str, &str)] = &[
    ("Agricultural Areas", "24"),
    ("Continental Waters", "51"),
    ("Continental Wetlands", "41"),
    ("Forest", "31"),
    ("Industry and Commercial", "12"),
    ("Little vegetation areas", "33"),
    ("Mining", "13"),
    ("Pastures", "23"),
    ("Shrublands and Grassland", "32"),
    ("Urban Zones", "11"),
];

/// Code de niveau 2 d'une classe, ou la classe elle-même si elle est inconnue
///
/// Une classe non répertoriée passe telle quelle et ne correspondra
/// à aucune règle (niveau `Unknown`).
pub fn level2_code(class_name: &str) -> &str {
    CLASS_CODES
        .iter()
        .find(|(name, _)| *name == class_name)
        .map(|(_, code)| *code)
        .unwrap_or(class_name)
}

/// Vocation d'une zone de référence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vocation {
    Agricola,
    Ganadera,
    Agroforestal,
    Forestal,
    ConservacionDeSuelos,
    CuerpoDeAgua,
    ZonasUrbanas,
}

impl Vocation {
    pub const ALL: [Vocation; 7] = [
        Vocation::Agricola,
        Vocation::Ganadera,
        Vocation::Agroforestal,
        Vocation::Forestal,
        Vocation::ConservacionDeSuelos,
        Vocation::CuerpoDeAgua,
        Vocation::ZonasUrbanas,
    ];

    /// Libellé tel qu'il figure dans l'attribut `Vocacion`
    pub fn label(self) -> &'static str {
        match self {
            Vocation::Agricola => "Agrícola",
            Vocation::Ganadera => "Ganadera",
            Vocation::Agroforestal => "Agroforestal",
            Vocation::Forestal => "Forestal",
            Vocation::ConservacionDeSuelos => "Conservación de Suelos",
            Vocation::CuerpoDeAgua => "Cuerpo de agua",
            Vocation::ZonasUrbanas => "Zonas urbanas",
        }
    }

    /// Correspondance exacte avec le libellé
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.label() == label)
    }

    /// Paliers de conflit, dans l'ordre de priorité (High, Moderate, No Conflict)
    pub fn tiers(self) -> &'static [(ConflictLevel, &'static [&'static str])] {
        use ConflictLevel::{High, Moderate, NoConflict};
        match self {
            Vocation::Agricola => &[
                (High, &["11", "12", "13", "31", "33", "41", "51"]),
                (Moderate, &["32", "22"]),
                (NoConflict, &["21", "23", "24"]),
            ],
            Vocation::Ganadera => &[
                (High, &["11", "12", "13", "31", "41", "51"]),
                (Moderate, &["21", "23", "24", "32", "33"]),
                (NoConflict, &["22"]),
            ],
            Vocation::Agroforestal | Vocation::ConservacionDeSuelos => &[
                (High, &["11", "12", "13", "41", "51"]),
                (Moderate, &["21", "22", "33"]),
                (NoConflict, &["23", "24", "31", "32"]),
            ],
            Vocation::Forestal => &[
                (High, &["11", "12", "13", "21", "22", "23", "24"]),
                (Moderate, &["33"]),
                (NoConflict, &["31", "32", "41", "51"]),
            ],
            Vocation::CuerpoDeAgua => &[
                (
                    High,
                    &["11", "12", "13", "21", "22", "23", "24", "31", "32", "33"],
                ),
                (NoConflict, &["41", "51"]),
            ],
            Vocation::ZonasUrbanas => &[(
                High,
                &[
                    "11", "12", "13", "21", "22", "23", "24", "31", "32", "33", "41", "51",
                ],
            )],
        }
    }
}

impl fmt::Display for Vocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Niveau de conflit entre vocation et occupation observée
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictLevel {
    High,
    Moderate,
    NoConflict,
    Unknown,
}

impl ConflictLevel {
    pub const ALL: [ConflictLevel; 4] = [
        ConflictLevel::High,
        ConflictLevel::Moderate,
        ConflictLevel::NoConflict,
        ConflictLevel::Unknown,
    ];

    /// Libellé écrit dans l'attribut `Conflict_Level`
    pub fn label(self) -> &'static str {
        match self {
            ConflictLevel::High => "High",
            ConflictLevel::Moderate => "Moderate",
            ConflictLevel::NoConflict => "No Conflict",
            ConflictLevel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConflictLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Niveau de conflit pour une vocation (absente si pas de zone) et un code
///
/// Le premier palier contenant le code l'emporte.
pub fn conflict_level(vocation: Option<Vocation>, level2: &str) -> ConflictLevel {
    vocation
        .and_then(|v| {
            v.tiers()
                .iter()
                .find(|(_, codes)| codes.contains(&level2))
                .map(|(level, _)| *level)
        })
        .unwrap_or(ConflictLevel::Unknown)
}
