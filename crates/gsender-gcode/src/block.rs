//! Single-line G-code blocks
//!
//! A block is one line of G-code split into letter/value words. Selector
//! letters (`G`, `M`, `L`) fold their number into the key, so `G1` and `G0`
//! are distinct flags; every other letter carries a value (`X` -> `"10.5"`).
//! Both views are derived once at parse time so call sites never repeat the
//! letter-category logic.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Letters whose number is part of the word's identity
pub const SELECTOR_LETTERS: [char; 3] = ['G', 'M', 'L'];

/// Linear axes tracked for motion, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

impl Axis {
    /// All linear axes in order
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Word letter for this axis
    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }

    /// Index into `[x, y, z]` arrays
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// One letter/value word as written in the line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    /// Upper-case word letter
    pub letter: char,
    /// Numeric text following the letter
    pub value: String,
}

impl Word {
    /// Whether this word is a selector (`G`, `M`, `L`)
    pub fn is_selector(&self) -> bool {
        SELECTOR_LETTERS.contains(&self.letter)
    }

    /// Canonical key: `G01` -> `"G1"`, `X10` -> `"X"`
    pub fn key(&self) -> String {
        if self.is_selector() {
            format!("{}{}", self.letter, normalize_number(&self.value))
        } else {
            self.letter.to_string()
        }
    }

    /// Numeric value of the word, `None` unless finite
    pub fn as_f64(&self) -> Option<f64> {
        finite(&self.value)
    }
}

/// Value side of a pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairValue {
    /// Selector word present in the block
    Present,
    /// Value carried by a non-selector letter
    Value(String),
}

/// A parsed line of G-code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcodeBlock {
    line: String,
    words: Vec<Word>,
    pairs: BTreeMap<String, PairValue>,
    flat_pairs: BTreeMap<char, String>,
    comment: Option<String>,
}

fn word_regex() -> &'static Regex {
    static WORD_REGEX: OnceLock<Regex> = OnceLock::new();
    WORD_REGEX.get_or_init(|| {
        Regex::new(r"([A-Z])\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+))").expect("invalid regex pattern")
    })
}

fn comment_regex() -> &'static Regex {
    static COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();
    COMMENT_REGEX
        .get_or_init(|| Regex::new(r"\(([^)]*)\)|;(.*)$").expect("invalid regex pattern"))
}

/// Parse a word value, dropping values that overflow to infinity
fn finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `"01"` -> `"1"`, `"38.20"` -> `"38.2"`
fn normalize_number(value: &str) -> String {
    match value.parse::<f64>() {
        Ok(number) => format!("{}", number),
        Err(_) => value.to_string(),
    }
}

/// Remove `( … )` and `; …` comments, returning the code and the first comment
pub fn strip_comments(line: &str) -> (String, Option<String>) {
    let regex = comment_regex();
    let comment = regex.captures(line).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim().to_string())
    });
    let code = regex.replace_all(line, " ").trim().to_string();
    (code, comment.filter(|c| !c.is_empty()))
}

impl GcodeBlock {
    /// Parse a line. Never fails; unreadable tokens are skipped.
    pub fn parse(line: &str) -> Self {
        let (code, comment) = strip_comments(line);
        let code = code.to_uppercase();

        let mut words = Vec::new();
        // `$` system commands and `%` tape markers are not G-code words
        if !code.starts_with('$') && !code.starts_with('%') {
            for caps in word_regex().captures_iter(&code) {
                let letter = caps[1].chars().next().unwrap_or_default();
                words.push(Word {
                    letter,
                    value: caps[2].to_string(),
                });
            }
        }

        let mut pairs = BTreeMap::new();
        let mut flat_pairs = BTreeMap::new();
        for word in &words {
            let value = if word.is_selector() {
                PairValue::Present
            } else {
                PairValue::Value(word.value.clone())
            };
            pairs.insert(word.key(), value);
            flat_pairs.insert(word.letter, word.value.clone());
        }

        Self {
            line: line.to_string(),
            words,
            pairs,
            flat_pairs,
            comment,
        }
    }

    /// Original source text
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Words in source order
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Canonical pairs keyed by `"G1"`, `"X"`, ...
    pub fn pairs(&self) -> &BTreeMap<String, PairValue> {
        &self.pairs
    }

    /// Last raw value per letter
    pub fn flat_pairs(&self) -> &BTreeMap<char, String> {
        &self.flat_pairs
    }

    /// First comment on the line
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Whether the block carries no words
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Whether a selector word such as `"G1"` or `"M6"` is present.
    /// `"G01"` and `"g1"` are accepted and normalised.
    pub fn has(&self, word: &str) -> bool {
        let word = word.trim().to_uppercase();
        let mut chars = word.chars();
        match chars.next() {
            Some(letter) if SELECTOR_LETTERS.contains(&letter) => {
                let key = format!("{}{}", letter, normalize_number(chars.as_str()));
                self.pairs.get(&key) == Some(&PairValue::Present)
            }
            _ => false,
        }
    }

    /// Value of a non-selector letter, e.g. `get("X")`
    pub fn get(&self, letter: &str) -> Option<&str> {
        match self.pairs.get(&letter.trim().to_uppercase()) {
            Some(PairValue::Value(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Numeric value of a non-selector letter
    pub fn get_f64(&self, letter: &str) -> Option<f64> {
        self.get(letter).and_then(finite)
    }

    /// Whether any word uses this letter
    pub fn has_letter(&self, letter: char) -> bool {
        self.flat_pairs.contains_key(&letter.to_ascii_uppercase())
    }

    /// Raw last value for a letter, selector or not
    pub fn get_letter(&self, letter: char) -> Option<&str> {
        self.flat_pairs
            .get(&letter.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Axes among X, Y, Z that this block names
    pub fn get_axes(&self) -> Vec<Axis> {
        Axis::ALL
            .into_iter()
            .filter(|axis| self.has_letter(axis.letter()))
            .collect()
    }

    /// Value for an axis word
    pub fn axis_value(&self, axis: Axis) -> Option<f64> {
        self.get_letter(axis.letter()).and_then(finite)
    }

    /// `G0` or `G1` move
    pub fn is_simple_motion(&self) -> bool {
        self.has("G0") || self.has("G1")
    }

    /// Block names the rotary A axis
    pub fn has_rotary_axis(&self) -> bool {
        self.has_letter('A')
    }

    /// Block requests a tool change
    pub fn is_tool_change(&self) -> bool {
        self.has("M6")
    }
}

impl fmt::Display for GcodeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words: Vec<String> = self
            .words
            .iter()
            .map(|w| format!("{}{}", w.letter, w.value))
            .collect();
        write!(f, "{}", words.join(" "))
    }
}
