use std::fmt;

use anyhow::{Result, bail};

use super::microdata::columns;

/// Income bounds at or beyond this magnitude are treated as unbounded.
pub const UNBOUNDED_AGI: f64 = 8e99;

/// Which source subpopulation a target applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every record.
    All,
    /// Records drawn from the IRS public-use file (`data_source == 1`).
    Puf,
    /// Records drawn from the Current Population Survey (`data_source == 0`).
    Cps,
}

impl Scope {
    /// Decode a scope code from a target file (0, 1 or 2).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Scope::All),
            1 => Some(Scope::Puf),
            2 => Some(Scope::Cps),
            _ => None,
        }
    }

    /// Whether a record with the given source flag falls in this scope.
    #[inline]
    pub fn includes(&self, data_source: i64) -> bool {
        match self {
            Scope::All => true,
            Scope::Puf => data_source == 1,
            Scope::Cps => data_source == 0,
        }
    }
}

/// One row of an area target file, with codes kept exactly as read.
///
/// Codes are validated when the target matrix is built, so that errors can name the
/// offending line.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRow {
    pub varname: String,
    /// 0 = sum of the variable, 1 = count of records with the variable > 0.
    pub count: i64,
    /// 0 = all records, 1 = PUF records, 2 = CPS records.
    pub scope: i64,
    /// Inclusive lower income bound.
    pub agilo: f64,
    /// Exclusive upper income bound.
    pub agihi: f64,
    /// 0 = no filter, otherwise the required filing status.
    pub fstatus: i64,
    pub target: f64,
}

impl TargetRow {
    /// Whether this row is the area population target: an unrestricted
    /// sum of total persons over the full income range.
    pub fn is_population_target(&self) -> bool {
        self.varname == columns::PERSONS
            && self.count == 0
            && self.scope == 0
            && self.agilo < -UNBOUNDED_AGI
            && self.agihi > UNBOUNDED_AGI
            && self.fstatus == 0
    }
}

impl fmt::Display for TargetRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{},{},{},{}",
            self.varname, self.count, self.scope, self.agilo, self.agihi, self.fstatus, self.target)
    }
}

/// The ordered target rows for one area.
///
/// The first row must be the area population target; it sets the initial weight scale.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    label: String,
    rows: Vec<TargetRow>,
}

impl TargetSpec {
    /// Index of the population target among the rows.
    pub const POPULATION_ROW: usize = 0;

    /// `label` identifies the target set in error messages (usually the area code).
    pub fn new(label: impl Into<String>, rows: Vec<TargetRow>) -> Result<Self> {
        let label = label.into();
        if rows.is_empty() {
            bail!("[data::targets] {label}: target specification has no rows");
        }
        Ok(Self { label, rows })
    }

    #[inline] pub fn label(&self) -> &str { &self.label }

    #[inline] pub fn rows(&self) -> &[TargetRow] { &self.rows }

    #[inline] pub fn len(&self) -> usize { self.rows.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    /// Location of row `index` in the source file, e.g. `"mn:L2"` for the first row
    /// (line 1 is the CSV header).
    pub fn line(&self, index: usize) -> String {
        format!("{}:L{}", self.label, index + 2)
    }
}
