use crate::models::error::SError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Mod authors hand-write their JSON: comments (`#`, `//`, `/* */`) and trailing
/// commas are common. This strips both so `serde_json` can read the result.
pub fn sanitize(input: &str) -> String {
    let chars: Vec<char> = input.trim_start_matches('\u{feff}').chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    let mut in_string = false;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '#' => i = skip_line(&chars, i),
            '/' if chars.get(i + 1) == Some(&'/') => i = skip_line(&chars, i),
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn skip_line(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    i
}

/// Parses hand-written JSON into `T`.
pub fn from_lenient_str<T: DeserializeOwned>(input: &str) -> Result<T, SError> {
    serde_json::from_str(input)
        .or_else(|_| serde_json::from_str(&sanitize(input)))
        .map_err(SError::from)
}

/// Accepts `"1234"` as well as `1234` for id-like fields.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Repr>::deserialize(deserializer)?.map(|r| match r {
        Repr::Text(s) => s,
        Repr::Int(n) => n.to_string(),
        Repr::Float(f) => f.to_string(),
    }))
}
