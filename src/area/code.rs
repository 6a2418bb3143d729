use std::{fmt, str::FromStr, sync::LazyLock};

use anyhow::{Result, bail};
use regex::Regex;

use super::apportionment::state_seats;

static STATE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]{2}$").unwrap());
static DISTRICT_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{2}$").unwrap());

/// A validated sub-national area: a state (`"mn"`) or a congressional district (`"mn03"`).
///
/// District numbers are checked against the 2010 Census apportionment, which is what
/// the district-level targets are built on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AreaCode {
    code: String,
    district: Option<u8>,
}

impl AreaCode {
    /// Validate `area`, reporting every problem found rather than only the first.
    pub fn parse(area: &str) -> Result<Self> {
        let mut problems = Vec::new();

        if area.len() != 2 && area.len() != 4 {
            problems.push(format!("area '{area}' is not two or four in length"));
        }

        let state = area.get(0..2).unwrap_or(area);
        let seats = if !STATE_CODE.is_match(state) {
            problems.push(format!("state code '{state}' must be two lower-case letters"));
            None
        } else {
            let seats = state_seats(&state.to_ascii_uppercase());
            if seats.is_none() { problems.push(format!("state '{state}' is unknown")) }
            seats
        };

        let mut district = None;
        if area.len() == 4 {
            let suffix = area.get(2..4).unwrap_or("");
            match seats {
                Some(seats) if seats.census_2010 <= 1 => {
                    problems.push(format!("use area '{state}' for this one-district state"));
                }
                Some(seats) if DISTRICT_CODE.is_match(suffix) => {
                    let number = suffix.parse::<u8>().unwrap_or(0);
                    if number == 0 {
                        problems.push(format!("cd number '{number}' is non-positive"));
                    } else if number > seats.census_2010 {
                        problems.push(format!("cd number '{number}' exceeds {}", seats.census_2010));
                    } else {
                        district = Some(number);
                    }
                }
                Some(_) => problems.push(format!("cd number '{suffix}' is not a two-digit number")),
                None => {}
            }
        }

        if !problems.is_empty() {
            bail!("[area] {area} is not valid: {}", problems.join("; "));
        }

        Ok(Self { code: area.to_string(), district })
    }

    /// The area code as given, e.g. `"mn03"`.
    #[inline] pub fn as_str(&self) -> &str { &self.code }

    /// Two-letter lower-case state prefix.
    #[inline] pub fn state(&self) -> &str { &self.code[..2] }

    /// Congressional district number, if this is a district-level area.
    #[inline] pub fn district(&self) -> Option<u8> { self.district }

    /// File name of this area's target specification.
    pub fn targets_file_name(&self) -> String { format!("{}_targets.csv", self.code) }

    /// File name of this area's calibrated weights.
    pub fn weights_file_name(&self) -> String { format!("{}_tmd_weights.csv.gz", self.code) }

    /// File name of this area's diagnostic log.
    pub fn log_file_name(&self) -> String { format!("{}.log", self.code) }
}

impl FromStr for AreaCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl fmt::Display for AreaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(area: &str) -> String {
        AreaCode::parse(area).unwrap_err().to_string()
    }

    #[test]
    fn accepts_states_and_districts() {
        let mn = AreaCode::parse("mn").unwrap();
        assert_eq!(mn.state(), "mn");
        assert_eq!(mn.district(), None);

        let cd = AreaCode::parse("mn08").unwrap();
        assert_eq!(cd.state(), "mn");
        assert_eq!(cd.district(), Some(8));
        assert_eq!(cd.targets_file_name(), "mn08_targets.csv");
        assert_eq!(cd.weights_file_name(), "mn08_tmd_weights.csv.gz");

        assert!(AreaCode::parse("xx").is_ok());
    }

    #[test]
    fn rejects_bad_length() {
        assert!(message("mnn").contains("not two or four in length"));
        assert!(message("m").contains("not two or four in length"));
    }

    #[test]
    fn rejects_upper_case_and_unknown_states() {
        assert!(message("MN").contains("lower-case"));
        assert!(message("qq").contains("state 'qq' is unknown"));
    }

    #[test]
    fn rejects_district_for_single_district_state() {
        assert!(message("ak01").contains("use area 'ak'"));
    }

    #[test]
    fn checks_district_range_against_2010_seats() {
        assert!(message("mn00").contains("non-positive"));
        assert!(message("mn09").contains("exceeds 8"));
        // Montana had one seat after 2010, two after 2020.
        assert!(message("mt02").contains("use area 'mt'"));
        // California lost a seat in 2020, but districts follow 2010.
        assert!(AreaCode::parse("ca53").is_ok());
        assert!(message("mnx1").contains("not a two-digit number"));
    }

    #[test]
    fn reports_all_problems_together() {
        let msg = message("QQ123");
        assert!(msg.contains("not two or four in length"));
        assert!(msg.contains("lower-case"));
    }

    #[test]
    fn from_str_round_trip() {
        let area: AreaCode = "ny12".parse().unwrap();
        assert_eq!(area.to_string(), "ny12");
    }
}
