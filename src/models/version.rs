use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A mod version as written by mod authors.
///
/// Ordering compares each component chunk-wise, treating digit runs as numbers,
/// so `1.10 > 1.9`. Two versions are equal when they compare equal, regardless
/// of how the raw string was written (`1.0 == 1.0.0`).
#[derive(Clone, Debug)]
pub struct Version {
    pub raw: Option<String>,
    pub major: String,
    pub minor: String,
    pub patch: String,
    pub build: Option<String>,
    pub release_candidate: Option<String>,
}

impl Default for Version {
    fn default() -> Self {
        Self {
            raw: None,
            major: "0".into(),
            minor: "0".into(),
            patch: "0".into(),
            build: None,
            release_candidate: None,
        }
    }
}

impl Version {
    /// Parses any version string. Never fails; garbage degrades to `0.0.0`.
    ///
    /// `"Starsector 0.95.1a-RC6"` keeps only `0-9 . -`, giving `0.95.1-6`:
    /// components `0`, `95`, `1` and release candidate `6`.
    pub fn parse(raw: &str) -> Self {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();

        let (numbers, release_candidate) = match cleaned.split_once('-') {
            Some((numbers, rc)) => (numbers, Some(rc)),
            None => (cleaned.as_str(), None),
        };

        let mut parts = numbers.split('.').map(str::to_owned);
        let mut component = || {
            parts
                .next()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "0".to_string())
        };
        let (major, minor, patch) = (component(), component(), component());
        let build = numbers.split('.').nth(3).map(str::to_owned);

        Self {
            raw: Some(raw.to_string()),
            major,
            minor,
            patch,
            build,
            release_candidate: release_candidate
                .filter(|rc| !rc.is_empty())
                .map(str::to_owned),
        }
    }

    /// Builds a version from already split components, as found in `.version` files.
    pub fn from_parts(major: &str, minor: &str, patch: &str) -> Self {
        Self {
            raw: None,
            major: Self::or_zero(major),
            minor: Self::or_zero(minor),
            patch: Self::or_zero(patch),
            build: None,
            release_candidate: None,
        }
    }

    fn or_zero(part: &str) -> String {
        if part.trim().is_empty() {
            "0".into()
        } else {
            part.trim().to_string()
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(raw) = &self.raw {
            return f.write_str(raw);
        }

        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(build) = &self.build {
            write!(f, ".{build}")?;
        }
        if let Some(rc) = &self.release_candidate {
            write!(f, "-{rc}")?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_recognizing_numbers(&self.major, &other.major)
            .then_with(|| compare_recognizing_numbers(&self.minor, &other.minor))
            .then_with(|| compare_recognizing_numbers(&self.patch, &other.patch))
            .then_with(|| {
                compare_recognizing_numbers(
                    self.build.as_deref().unwrap_or("0"),
                    other.build.as_deref().unwrap_or("0"),
                )
            })
            .then_with(|| match (&self.release_candidate, &other.release_candidate) {
                (None, None) => Ordering::Equal,
                // A final release outranks any of its release candidates.
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_recognizing_numbers(a, b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// Breaks a string into runs of letters and runs of digits, dropping anything else.
///
/// `"55hhb3vv-5 s"` becomes `["55", "hhb", "3", "vv", "5", "s"]`.
pub fn split_into_alpha_and_numeric(input: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut last_was_digit: Option<bool> = None;

    for c in input.chars() {
        let is_digit = c.is_ascii_digit();
        if last_was_digit != Some(is_digit) {
            chunks.push(String::new());
            last_was_digit = Some(is_digit);
        }
        if let Some(current) = chunks.last_mut() {
            if c.is_alphanumeric() {
                current.push(c);
            }
        }
    }

    chunks.retain(|chunk| !chunk.is_empty());
    chunks
}

/// String comparison that orders digit runs by numeric value instead of by character.
///
/// The shorter side is padded with `"0"` chunks, so `"1"` equals `"1.0"` chunk-wise.
pub fn compare_recognizing_numbers(a: &str, b: &str) -> Ordering {
    let a_chunks = split_into_alpha_and_numeric(a);
    let b_chunks = split_into_alpha_and_numeric(b);
    let len = a_chunks.len().max(b_chunks.len());

    (0..len)
        .map(|i| {
            let left = a_chunks.get(i).map(String::as_str).unwrap_or("0");
            let right = b_chunks.get(i).map(String::as_str).unwrap_or("0");
            compare_chunks(left, right)
        })
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn compare_chunks(left: &str, right: &str) -> Ordering {
    let is_numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if is_numeric(left) && is_numeric(right) {
        // Arbitrary-length integers: strip leading zeros, then longer is larger.
        let l = left.trim_start_matches('0');
        let r = right.trim_start_matches('0');
        l.len().cmp(&r.len()).then_with(|| l.cmp(r))
    } else {
        left.cmp(right)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Mod manifests write versions either as a string or as an object of parts.
#[derive(Deserialize)]
#[serde(untagged)]
enum VersionRepr {
    Text(String),
    Number(f64),
    Parts {
        #[serde(default)]
        major: Option<PartRepr>,
        #[serde(default)]
        minor: Option<PartRepr>,
        #[serde(default)]
        patch: Option<PartRepr>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PartRepr {
    Text(String),
    Number(i64),
}

impl PartRepr {
    fn into_string(self) -> String {
        match self {
            PartRepr::Text(s) => s,
            PartRepr::Number(n) => n.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = match VersionRepr::deserialize(deserializer)? {
            VersionRepr::Text(raw) => Version::parse(&raw),
            VersionRepr::Number(n) => Version::parse(&n.to_string()),
            VersionRepr::Parts {
                major,
                minor,
                patch,
            } => {
                let part = |p: Option<PartRepr>| p.map(PartRepr::into_string).unwrap_or_default();
                Version::from_parts(&part(major), &part(minor), &part(patch))
            }
        };
        Ok(version)
    }
}
