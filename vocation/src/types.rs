//! Types de données pour le crate vocation

use std::fmt;
use std::sync::OnceLock;

use geo::Geometry;
use regex::Regex;

/// Jeu de données vectoriel en mémoire (un shapefile chargé)
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Schéma attributaire, dans l'ordre des colonnes
    pub fields: Vec<Field>,

    /// Features, dans l'ordre du fichier
    pub features: Vec<Feature>,

    /// Système de coordonnées partagé par toutes les features
    pub crs: Option<Crs>,
}

impl Dataset {
    /// Crée un jeu de données vide avec un schéma donné
    pub fn new(fields: Vec<Field>, crs: Option<Crs>) -> Self {
        Self {
            fields,
            features: Vec::new(),
            crs,
        }
    }

    /// Position d'un attribut dans le schéma
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Valeur d'un attribut pour une feature donnée
    pub fn value(&self, feature: usize, name: &str) -> Option<&Value> {
        let idx = self.field_index(name)?;
        self.features.get(feature)?.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Une feature : géométrie optionnelle + une valeur par champ du schéma
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Géométrie (None pour une "null shape")
    pub geometry: Option<Geometry<f64>>,

    /// Valeurs alignées sur `Dataset::fields`
    pub values: Vec<Value>,
}

/// Définition d'un champ attributaire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Type d'un champ attributaire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Logical,
    Date,
}

/// Valeur attributaire
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Logical(bool),
    Date(shapefile::dbase::Date),
    Null,
}

impl Value {
    /// Contenu textuel, si la valeur est du texte
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Représentation texte (None pour Null)
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Logical(b) => Some(b.to_string()),
            Value::Date(d) => Some(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())),
            Value::Null => None,
        }
    }
}

/// Système de coordonnées, tel que décrit par le fichier .prj
#[derive(Debug, Clone)]
pub struct Crs {
    wkt: String,
    epsg: Option<u32>,
}

fn epsg_authority() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:AUTHORITY|ID)\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#)
            .expect("static EPSG regex")
    })
}

impl Crs {
    /// Construit un CRS depuis le WKT d'un .prj
    ///
    /// Le code EPSG retenu est celui de la dernière autorité du WKT,
    /// qui porte sur le CRS de plus haut niveau.
    pub fn from_wkt(wkt: &str) -> Self {
        let wkt = wkt.trim().trim_start_matches('\u{feff}').to_string();
        let epsg = match wkt.strip_prefix("EPSG:") {
            Some(code) => code.parse().ok(),
            None => epsg_authority()
                .captures_iter(&wkt)
                .last()
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok()),
        };
        Self { wkt, epsg }
    }

    /// CRS connu par son seul code EPSG
    pub fn from_epsg(epsg: u32) -> Self {
        Self {
            wkt: format!("EPSG:{}", epsg),
            epsg: Some(epsg),
        }
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Définition passée à PROJ : "EPSG:n" si connu, sinon le WKT brut
    pub fn definition(&self) -> String {
        match self.epsg {
            Some(code) => format!("EPSG:{}", code),
            None => self.wkt.clone(),
        }
    }

    fn normalized_wkt(&self) -> String {
        self.wkt.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            _ => self.normalized_wkt() == other.normalized_wkt(),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg {
            Some(code) => write!(f, "EPSG:{}", code),
            None => write!(f, "custom WKT ({} chars)", self.wkt.len()),
        }
    }
}
