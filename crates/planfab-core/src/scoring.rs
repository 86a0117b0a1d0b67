//! Feature scoring of extracted page text against fabrication-plan
//! indicators.
//!
//! The scorer runs a fixed catalogue of independent, idempotent detectors
//! over normalized text (uppercased, French accents folded) and the
//! line-geometry signal of the rasterized page. Each detector yields a
//! bounded contribution; the aggregate score is a weighted sum normalized
//! to [0, 1]. The combination is monotonic: adding matching positive
//! evidence to a page's text never lowers its score.
//!
//! The catalogue and weights are data, not behavior. They are versioned as
//! [`CATALOG_VERSION`] and overridable through [`ScoreWeights`] so
//! deployments can retune without code changes.

use regex::Regex;

use crate::page::{FeatureVector, LineFeatures, PageText};

/// Version tag for the indicator catalogue and default weights.
///
/// Bump when the keyword tables, patterns or default weights change, so
/// stored scores can be traced back to the catalogue that produced them.
pub const CATALOG_VERSION: &str = "2025.1";

/// Positive vocabulary: terms found on French fabrication drawings,
/// weighted by how specific they are to that drawing type.
///
/// Title-block labels (DESSINE, DEMANDEUR, ...) dominate; generic drawing
/// vocabulary (SECTION, COUPE) contributes little on its own.
const POSITIVE_KEYWORDS: &[(&str, f32)] = &[
    ("PLAN DE FABRICATION", 4.0),
    ("DESSINE", 4.0),
    ("DEMANDEUR", 2.5),
    ("CLIENT", 2.0),
    ("MATIERE", 2.0),
    ("ECHELLE", 2.0),
    ("APPAREIL", 1.5),
    ("USINAGE", 1.5),
    ("TOLERANCE", 1.0),
    ("TOL", 1.0),
    ("DOSSIER", 1.0),
    ("INDICE", 1.0),
    ("NUANCE", 0.5),
    ("SECTION", 0.5),
    ("COUPE", 0.5),
];

/// Counter-vocabulary: terms typical of calculation notes, datasheets and
/// process diagrams that share title blocks with fabrication plans.
const NEGATIVE_KEYWORDS: &[(&str, f32)] = &[
    ("DONNEES PREVISIONNELLES", 2.0),
    ("CALCUL", 2.0),
    ("CONTRAINTE", 2.0),
    ("INJECTER", 1.0),
    ("ETANCHEITE", 1.0),
    ("DIAGRAMME", 1.0),
];

/// Cartouche field labels whose co-occurrence marks a title block.
const TITLE_BLOCK_FIELDS: &[&str] = &[
    "DESSINE",
    "DEMANDEUR",
    "CLIENT",
    "DOSSIER",
    "INDICE",
    "ECHELLE",
    "APPAREIL",
];

/// Single words accepted as technical tokens by the density detector.
///
/// Every word of every positive keyword appears here so that appending
/// positive evidence can only raise the recognized-token ratio.
const TECH_LEXICON: &[&str] = &[
    "PLAN",
    "FABRICATION",
    "DESSINE",
    "DEMANDEUR",
    "CLIENT",
    "MATIERE",
    "ECHELLE",
    "ECH",
    "APPAREIL",
    "USINAGE",
    "TOLERANCE",
    "TOL",
    "DOSSIER",
    "INDICE",
    "NUANCE",
    "SECTION",
    "COUPE",
    "ACIER",
    "INOX",
    "ALU",
    "EP",
    "DN",
    "MM",
];

/// French function words ignored by the density detector.
const STOPWORDS: &[&str] = &[
    "DE", "DU", "DES", "LA", "LE", "LES", "ET", "EN", "AU", "AUX", "UN", "UNE", "D", "L",
];

/// Weighted keyword sum at which the keyword detector saturates.
const KEYWORD_SATURATION: f32 = 6.0;

/// Weighted counter-keyword sum at which the penalty saturates.
const COUNTER_SATURATION: f32 = 4.0;

/// Number of distinct cartouche fields at which the title-block detector
/// saturates.
const TITLE_BLOCK_SATURATION: usize = 4;

/// Median segment length (pixels of the analyzed raster) above which the
/// geometry detector stops contributing.
const GEOMETRY_MEDIAN_CUTOFF: f32 = 220.0;

/// Per-detector weights for the aggregate score.
///
/// Positive weights are normalized so their saturated sum maps to 1.0;
/// `counter_keywords` and `long_lines` are penalties subtracted on the
/// same scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    /// Weighted positive vocabulary matches.
    pub keywords: f32,
    /// Penalty for counter-vocabulary matches.
    pub counter_keywords: f32,
    /// Cartouche field co-occurrence.
    pub title_block: f32,
    /// Scale notations such as `1:50` or `ECH.`.
    pub scale_notation: f32,
    /// Drawing-reference patterns.
    pub drawing_number: f32,
    /// Diameter, tolerance and plus-minus marks.
    pub tolerance_marks: f32,
    /// Ratio of recognized technical tokens to all tokens.
    pub technical_density: f32,
    /// Short, non-axial line segments typical of dimensioned drawings.
    pub line_geometry: f32,
    /// Penalty for a high ratio of very long frame lines.
    pub long_lines: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            keywords: 3.0,
            counter_keywords: 2.0,
            title_block: 2.0,
            scale_notation: 1.5,
            drawing_number: 1.0,
            tolerance_marks: 1.5,
            technical_density: 1.0,
            line_geometry: 2.0,
            long_lines: 1.0,
        }
    }
}

impl ScoreWeights {
    /// Sum of the positive detector weights, the normalization divisor.
    #[must_use = "total is computed but not used"]
    fn positive_total(&self) -> f32 {
        self.keywords
            + self.title_block
            + self.scale_notation
            + self.drawing_number
            + self.tolerance_marks
            + self.technical_density
            + self.line_geometry
    }
}

/// Scores a page's extracted text and layout signal.
///
/// Construction compiles the catalogue patterns once; the scorer is cheap
/// to share across pages and requests. Scoring is a pure function of its
/// inputs and never fails: empty or garbage text yields a score at or
/// near zero.
#[derive(Debug)]
pub struct FeatureScorer {
    weights: ScoreWeights,
    positive: Vec<(Regex, f32)>,
    negative: Vec<(Regex, f32)>,
    title_fields: Vec<Regex>,
    scale_re: Regex,
    drawing_re: Regex,
    dimension_re: Regex,
}

impl FeatureScorer {
    /// Scorer with the default catalogue weights.
    #[must_use = "scorer is created but not used"]
    pub fn new() -> Self {
        Self::with_weights(ScoreWeights::default())
    }

    /// Scorer with custom detector weights.
    #[must_use = "scorer is created but not used"]
    pub fn with_weights(weights: ScoreWeights) -> Self {
        let word_pattern =
            |term: &str| Regex::new(&format!(r"\b{}\b", regex::escape(term))).expect("catalogue terms are compile-time constants");

        Self {
            weights,
            positive: POSITIVE_KEYWORDS
                .iter()
                .map(|&(term, weight)| (word_pattern(term), weight))
                .collect(),
            negative: NEGATIVE_KEYWORDS
                .iter()
                .map(|&(term, weight)| (word_pattern(term), weight))
                .collect(),
            title_fields: TITLE_BLOCK_FIELDS.iter().map(|f| word_pattern(f)).collect(),
            scale_re: Regex::new(r"\b\d{1,3}\s*:\s*\d{1,4}\b|\bECH(?:ELLE)?\b")
                .expect("scale pattern is a compile-time constant"),
            drawing_re: Regex::new(r"\b[A-Z]{2,4}[- ]?\d{3,6}(?:[-./][A-Z0-9]{1,4})?\b")
                .expect("drawing-number pattern is a compile-time constant"),
            dimension_re: Regex::new(r"^\d+(?:[.,]\d+)?(?:MM|CM|M)?$|^\d+:\d+$")
                .expect("dimension pattern is a compile-time constant"),
        }
    }

    /// Score one page.
    ///
    /// Returns the normalized score in [0, 1] and the per-detector
    /// contributions behind it. Contributions are signed and already
    /// weight-normalized, so they sum to the pre-clamp score.
    #[must_use = "score is computed but not used"]
    pub fn score_page(&self, text: &PageText, lines: &LineFeatures) -> (f32, FeatureVector) {
        let normalized = normalize_text(&text.joined());

        let contributions = [
            ("keywords", self.keyword_strength(&normalized), self.weights.keywords),
            (
                "counter_keywords",
                self.counter_keyword_strength(&normalized),
                -self.weights.counter_keywords,
            ),
            (
                "title_block",
                self.title_block_strength(&normalized),
                self.weights.title_block,
            ),
            (
                "scale_notation",
                self.scale_strength(&normalized),
                self.weights.scale_notation,
            ),
            (
                "drawing_number",
                self.drawing_number_strength(&normalized),
                self.weights.drawing_number,
            ),
            (
                "tolerance_marks",
                tolerance_mark_strength(&normalized),
                self.weights.tolerance_marks,
            ),
            (
                "technical_density",
                self.technical_density(&normalized),
                self.weights.technical_density,
            ),
            ("line_geometry", line_geometry_strength(lines), self.weights.line_geometry),
            ("long_lines", long_line_strength(lines), -self.weights.long_lines),
        ];

        let divisor = self.weights.positive_total().max(f32::EPSILON);
        let mut features = FeatureVector::new();
        let mut total = 0.0_f32;
        for (name, strength, weight) in contributions {
            let contribution = strength * weight / divisor;
            total += contribution;
            features.insert(name.to_string(), contribution);
        }

        (total.clamp(0.0, 1.0), features)
    }

    /// Saturating weighted count of positive vocabulary matches.
    fn keyword_strength(&self, text: &str) -> f32 {
        let sum: f32 = self
            .positive
            .iter()
            .map(|(re, weight)| re.find_iter(text).count() as f32 * weight)
            .sum();
        (sum / KEYWORD_SATURATION).min(1.0)
    }

    /// Saturating weighted count of counter-vocabulary matches.
    fn counter_keyword_strength(&self, text: &str) -> f32 {
        let sum: f32 = self
            .negative
            .iter()
            .map(|(re, weight)| re.find_iter(text).count() as f32 * weight)
            .sum();
        (sum / COUNTER_SATURATION).min(1.0)
    }

    /// Fraction of distinct cartouche fields present, saturating at
    /// [`TITLE_BLOCK_SATURATION`].
    fn title_block_strength(&self, text: &str) -> f32 {
        let present = self
            .title_fields
            .iter()
            .filter(|re| re.is_match(text))
            .count();
        (present as f32 / TITLE_BLOCK_SATURATION as f32).min(1.0)
    }

    fn scale_strength(&self, text: &str) -> f32 {
        (self.scale_re.find_iter(text).count() as f32 * 0.5).min(1.0)
    }

    fn drawing_number_strength(&self, text: &str) -> f32 {
        (self.drawing_re.find_iter(text).count() as f32 * 0.5).min(1.0)
    }

    /// Ratio of recognized technical tokens to all non-stopword tokens.
    fn technical_density(&self, text: &str) -> f32 {
        let mut total = 0_usize;
        let mut technical = 0_usize;
        for raw in text.split_whitespace() {
            let token = raw.trim_matches(|c: char| !c.is_alphanumeric() && !is_mark_char(c));
            if token.is_empty() || STOPWORDS.contains(&token) {
                continue;
            }
            total += 1;
            if TECH_LEXICON.contains(&token)
                || self.dimension_re.is_match(token)
                || token.chars().any(is_mark_char)
            {
                technical += 1;
            }
        }
        if total == 0 {
            0.0
        } else {
            technical as f32 / total as f32
        }
    }
}

impl Default for FeatureScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Diameter, plus-minus and degree marks counted by the tolerance detector
/// and accepted as technical by the density detector.
fn is_mark_char(c: char) -> bool {
    matches!(c, 'Ø' | '∅' | '⌀' | '±' | '°')
}

/// Saturating count of diameter and tolerance marks.
fn tolerance_mark_strength(text: &str) -> f32 {
    let count = text.chars().filter(|&c| is_mark_char(c)).count();
    (count as f32 / 3.0).min(1.0)
}

/// Geometry contribution: short median segments and a high non-axial
/// ratio both point at a dimensioned fabrication drawing. Pages with no
/// detected segments contribute nothing.
fn line_geometry_strength(lines: &LineFeatures) -> f32 {
    if lines.line_count == 0 {
        return 0.0;
    }
    let shortness =
        ((GEOMETRY_MEDIAN_CUTOFF - lines.median_len) / GEOMETRY_MEDIAN_CUTOFF).clamp(0.0, 1.0);
    let diagonality = (lines.non_axial_ratio * 10.0).min(1.0);
    0.6 * shortness + 0.4 * diagonality
}

/// Penalty strength for sheets dominated by very long frame lines.
fn long_line_strength(lines: &LineFeatures) -> f32 {
    (lines.long_line_ratio * 3.0).min(1.0)
}

/// Uppercase, fold French accents to ASCII and collapse whitespace.
///
/// OCR output mixes cases and frequently drops diacritics; matching on
/// the folded form makes the catalogue insensitive to both.
#[must_use = "normalized text is returned but not used"]
pub fn normalize_text(text: &str) -> String {
    let upper = text.to_uppercase();
    let mut out = String::with_capacity(upper.len());
    for c in upper.chars() {
        match c {
            'À' | 'Â' | 'Ä' | 'Á' | 'Ã' => out.push('A'),
            'Ç' => out.push('C'),
            'É' | 'È' | 'Ê' | 'Ë' => out.push('E'),
            'Î' | 'Ï' | 'Í' | 'Ì' => out.push('I'),
            'Ô' | 'Ö' | 'Ó' | 'Ò' => out.push('O'),
            'Û' | 'Ü' | 'Ù' | 'Ú' => out.push('U'),
            'Ÿ' => out.push('Y'),
            'Œ' => out.push_str("OE"),
            'Æ' => out.push_str("AE"),
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
