//! Analysis result types

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Canonical pitch-class names (sharps), index 0 = C
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Circle of fifths for major keys: 1A = C, 2A = G, ..., 12A = F
const CIRCLE_OF_FIFTHS_MAJOR: [u32; 12] = [0, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10, 5];

/// Circle of fifths for minor keys: 1B = Am, 2B = Em, ..., 12B = Dm
const CIRCLE_OF_FIFTHS_MINOR: [u32; 12] = [9, 4, 11, 6, 1, 8, 3, 10, 5, 0, 7, 2];

/// Musical key: one of 12 tonics in major or minor mode
///
/// Serialized as its canonical name, e.g. `"C major"` or `"F# minor"`.
/// Equality, hashing and ordering use the tonic modulo 12, so `Major(12)`
/// and `Major(0)` are the same key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Key {
    /// Major key (0 = C, 1 = C#, ..., 11 = B)
    Major(u32),
    /// Minor key (0 = C, 1 = C#, ..., 11 = B)
    Minor(u32),
}

impl Key {
    /// Major key with the tonic reduced to a pitch class
    pub fn major(tonic: u32) -> Self {
        Key::Major(tonic % 12)
    }

    /// Minor key with the tonic reduced to a pitch class
    pub fn minor(tonic: u32) -> Self {
        Key::Minor(tonic % 12)
    }

    /// Same key with the tonic reduced to a pitch class
    pub fn normalized(&self) -> Self {
        match self {
            Key::Major(t) => Key::major(*t),
            Key::Minor(t) => Key::minor(*t),
        }
    }

    /// (mode, pitch class); majors order before minors
    fn identity(&self) -> (u8, u32) {
        match self {
            Key::Major(_) => (0, self.tonic()),
            Key::Minor(_) => (1, self.tonic()),
        }
    }

    /// Tonic pitch class (0-11)
    pub fn tonic(&self) -> u32 {
        match self {
            Key::Major(t) | Key::Minor(t) => *t % 12,
        }
    }

    /// True for major keys
    pub fn is_major(&self) -> bool {
        matches!(self, Key::Major(_))
    }

    /// Canonical name, e.g. `"C major"`, `"A minor"`
    pub fn name(&self) -> String {
        let note = NOTE_NAMES[self.tonic() as usize];
        match self {
            Key::Major(_) => format!("{} major", note),
            Key::Minor(_) => format!("{} minor", note),
        }
    }

    /// Relative major/minor: C major <-> A minor
    ///
    /// # Example
    ///
    /// ```
    /// use cadence_dsp::Key;
    ///
    /// assert_eq!(Key::Major(0).relative(), Key::Minor(9));
    /// assert_eq!(Key::Minor(9).relative(), Key::Major(0));
    /// ```
    pub fn relative(&self) -> Key {
        match self {
            Key::Major(t) => Key::Minor((t % 12 + 9) % 12),
            Key::Minor(t) => Key::Major((t % 12 + 3) % 12),
        }
    }

    /// Key in DJ numerical notation (`1A`-`12A` major, `1B`-`12B` minor)
    ///
    /// Relative keys share a number: `C major` is `1A`, `A minor` is `1B`.
    pub fn numerical(&self) -> String {
        let tonic = self.tonic();
        let (wheel, suffix) = match self {
            Key::Major(_) => (&CIRCLE_OF_FIFTHS_MAJOR, 'A'),
            Key::Minor(_) => (&CIRCLE_OF_FIFTHS_MINOR, 'B'),
        };
        let position = wheel.iter().position(|&x| x == tonic).unwrap_or(0);
        format!("{}{}", position + 1, suffix)
    }

    /// Parse DJ numerical notation; `None` on anything else
    pub fn from_numerical(notation: &str) -> Option<Self> {
        if notation.len() < 2 || !notation.is_ascii() {
            return None;
        }
        let (num_str, suffix) = notation.split_at(notation.len() - 1);
        let num: usize = num_str.parse().ok()?;
        if !(1..=12).contains(&num) {
            return None;
        }
        match suffix {
            "A" => Some(Key::Major(CIRCLE_OF_FIFTHS_MAJOR[num - 1])),
            "B" => Some(Key::Minor(CIRCLE_OF_FIFTHS_MINOR[num - 1])),
            _ => None,
        }
    }
}

/// Parse a note name (`C`, `C#`, `Db`, `Bb`, ...) into a pitch class
fn parse_note(note: &str) -> Option<u32> {
    let mut chars = note.chars();
    let base = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let offset: i32 = match chars.as_str() {
        "" => 0,
        "#" | "♯" => 1,
        "b" | "♭" => -1,
        _ => return None,
    };
    Some((base + offset).rem_euclid(12) as u32)
}

impl FromStr for Key {
    type Err = AnalysisError;

    /// Accepts `"C major"`, `"A minor"`, `"C"`, `"Am"`, `"Bbm"`, `"F#"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnalysisError::InvalidInput(format!("Unrecognized key: '{}'", s));
        let trimmed = s.trim();

        let mut parts = trimmed.split_whitespace();
        let first = parts.next().ok_or_else(invalid)?;
        match (parts.next(), parts.next()) {
            (Some(mode), None) => {
                let tonic = parse_note(first).ok_or_else(invalid)?;
                match mode.to_ascii_lowercase().as_str() {
                    "major" | "maj" => Ok(Key::Major(tonic)),
                    "minor" | "min" => Ok(Key::Minor(tonic)),
                    _ => Err(invalid()),
                }
            }
            (None, None) => {
                if let Some(note) = first.strip_suffix('m') {
                    if let Some(tonic) = parse_note(note) {
                        return Ok(Key::Minor(tonic));
                    }
                }
                parse_note(first).map(Key::Major).ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.name()
    }
}

impl TryFrom<String> for Key {
    type Error = AnalysisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Coarse tempo bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempoCategory {
    /// Below 90 BPM
    Slow,
    /// 90 to below 120 BPM
    Medium,
    /// 120 to below 140 BPM
    Fast,
    /// 140 BPM and above
    VeryFast,
}

impl TempoCategory {
    /// Bucket a BPM value
    pub fn from_bpm(bpm: f32) -> Self {
        if bpm < 90.0 {
            TempoCategory::Slow
        } else if bpm < 120.0 {
            TempoCategory::Medium
        } else if bpm < 140.0 {
            TempoCategory::Fast
        } else {
            TempoCategory::VeryFast
        }
    }
}

/// Alternative tempo reading of a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpmCandidate {
    /// Rounded BPM value
    pub value: f32,

    /// Relative confidence (0.0-1.0)
    pub confidence: f32,

    /// How the candidate relates to the estimate (e.g. "half-time")
    pub label: String,
}

/// Complete analysis result for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// BPM estimate, within `[min_bpm, max_bpm]`
    pub bpm: f32,

    /// Detected key
    pub key: Key,

    /// Overall energy (0.0-1.0)
    pub energy: f32,

    /// Danceability (0.0-1.0)
    pub danceability: f32,

    /// Valence / brightness (0.0-1.0)
    pub valence: f32,

    /// Tempo bucket of `bpm`
    pub tempo_category: TempoCategory,
}

/// Uncalibrated estimate used for calibration training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAnalysis {
    /// Pipeline output before any calibration
    pub result: AnalysisResult,

    /// Half-time / double-time alternatives of the raw BPM
    pub bpm_candidates: Vec<BpmCandidate>,

    /// Integrated loudness in LUFS; `None` for silent input
    #[serde(default)]
    pub loudness: Option<f32>,
}

impl RawAnalysis {
    /// Raw BPM
    pub fn bpm(&self) -> f32 {
        self.result.bpm
    }

    /// Raw key
    pub fn key(&self) -> Key {
        self.result.key
    }

    /// Raw integrated loudness
    pub fn loudness(&self) -> Option<f32> {
        self.loudness
    }
}
