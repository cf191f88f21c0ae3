//! Semantic versions, version ranges, and the contract version gate.
//!
//! Plugins declare the contract versions they were built against as a range
//! expression (`"^1.0.0"`, `">=1.2 <3"`, `"1.x || 2.0.0 - 2.4"`). Each registry
//! holds the running [`CONTRACTS_VERSION`] and refuses plugins whose range does
//! not accept it.
//!
//! Range syntax follows npm conventions: x-ranges, primitive comparators,
//! caret, tilde, hyphen ranges, whitespace AND and `||` OR. A pre-release
//! version only satisfies a comparator set if one of the set's comparators
//! names the same `major.minor.patch` with a pre-release tag.

use std::cmp::Ordering;
use std::str::FromStr;

use thiserror::Error;

/// Contract version every registry enforces unless constructed otherwise.
pub const CONTRACTS_VERSION: Version = Version::new(1, 0, 0);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A version or range expression could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The input is not a `MAJOR.MINOR.PATCH[-PRE][+BUILD]` version.
    #[error("invalid version '{input}': {reason}")]
    InvalidVersion {
        /// The rejected input.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The input is not a valid range expression.
    #[error("invalid version range '{input}': {reason}")]
    InvalidRange {
        /// The rejected input.
        input: String,
        /// What was wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// One dot-separated pre-release identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prerelease {
    /// Purely numeric identifier, compared numerically.
    Numeric(u64),
    /// Alphanumeric identifier, compared lexically.
    Alpha(String),
}

impl Ord for Prerelease {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::Alpha(_)) => Ordering::Less,
            (Self::Alpha(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Alpha(a), Self::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Prerelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Prerelease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Alpha(s) => f.write_str(s),
        }
    }
}

/// A semantic version. Build metadata is accepted when parsing and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major version: bumped on breaking changes.
    pub major: u64,
    /// Minor version: bumped on additive changes.
    pub minor: u64,
    /// Patch version: bumped on fixes.
    pub patch: u64,
    /// Pre-release identifiers; empty for a release.
    pub pre: Vec<Prerelease>,
}

impl Version {
    /// Creates a release version.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
        }
    }

    /// Parses `MAJOR.MINOR.PATCH[-PRE][+BUILD]`, tolerating a leading `v` or `=`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = |reason: &str| VersionError::InvalidVersion {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix('=')
            .unwrap_or(trimmed)
            .trim_start_matches(['v', 'V']);
        if trimmed.is_empty() {
            return Err(invalid("empty version"));
        }

        let without_build = trimmed.split('+').next().unwrap_or_default();
        let (core, pre) = match without_build.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (without_build, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid("expected MAJOR.MINOR.PATCH"));
        }
        let number = |s: &str| s.parse::<u64>().map_err(|_| invalid("non-numeric component"));

        Ok(Self {
            major: number(parts[0])?,
            minor: number(parts[1])?,
            patch: number(parts[2])?,
            pre: match pre {
                Some(pre) => parse_prerelease(pre).ok_or_else(|| invalid("empty pre-release identifier"))?,
                None => Vec::new(),
            },
        })
    }

    /// Returns `true` if this version carries a pre-release tag.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    fn same_release(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor && self.patch == other.patch
    }
}

fn parse_prerelease(pre: &str) -> Option<Vec<Prerelease>> {
    pre.split('.')
        .map(|ident| {
            if ident.is_empty() {
                None
            } else if let Ok(n) = ident.parse::<u64>() {
                Some(Prerelease::Numeric(n))
            } else {
                Some(Prerelease::Alpha(ident.to_string()))
            }
        })
        .collect()
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            let pre: Vec<String> = self.pre.iter().map(ToString::to_string).collect();
            write!(f, "-{}", pre.join("."))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ranges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    fn any() -> Self {
        Self::new(Op::Gte, Version::new(0, 0, 0))
    }

    /// A comparator no version satisfies (`<0.0.0-0`).
    fn none() -> Self {
        Self::new(
            Op::Lt,
            Version {
                pre: vec![Prerelease::Numeric(0)],
                ..Version::new(0, 0, 0)
            },
        )
    }

    fn matches(&self, v: &Version) -> bool {
        let ord = v.cmp(&self.version);
        match self.op {
            Op::Eq => ord == Ordering::Equal,
            Op::Gt => ord == Ordering::Greater,
            Op::Gte => ord != Ordering::Less,
            Op::Lt => ord == Ordering::Less,
            Op::Lte => ord != Ordering::Greater,
        }
    }
}

/// A partially specified version as it appears inside a range (`1`, `1.2`, `1.x`).
#[derive(Debug, Clone)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Vec<Prerelease>,
}

impl Partial {
    fn floor(&self) -> Version {
        let full = self.patch.is_some();
        Version {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre: if full { self.pre.clone() } else { Vec::new() },
        }
    }
}

/// A parsed range expression: a disjunction of comparator sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReq {
    sets: Vec<Vec<Comparator>>,
}

impl VersionReq {
    /// Parses an npm-style range expression.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let sets = input
            .split("||")
            .map(|set| parse_set(input, set.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { sets })
    }

    /// Returns `true` if `version` satisfies this range.
    pub fn matches(&self, version: &Version) -> bool {
        self.sets.iter().any(|set| set_matches(set, version))
    }
}

impl FromStr for VersionReq {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn set_matches(set: &[Comparator], version: &Version) -> bool {
    if !set.iter().all(|c| c.matches(version)) {
        return false;
    }
    if !version.is_prerelease() {
        return true;
    }
    set.iter()
        .any(|c| c.version.is_prerelease() && c.version.same_release(version))
}

fn parse_set(input: &str, set: &str) -> Result<Vec<Comparator>, VersionError> {
    let tokens: Vec<&str> = set.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(vec![Comparator::any()]);
    }

    if tokens.len() == 3 && tokens[1] == "-" {
        let lower = parse_partial(input, tokens[0])?;
        let upper = parse_partial(input, tokens[2])?;
        return Ok(hyphen(&lower, &upper));
    }

    // Re-attach operators written with a space before the version (`>= 1.2`).
    let mut joined: Vec<String> = Vec::with_capacity(tokens.len());
    let mut pending: Option<&str> = None;
    for token in tokens {
        if is_operator(token) {
            if pending.is_some() {
                return Err(range_error(input, "dangling operator"));
            }
            pending = Some(token);
        } else {
            joined.push(format!("{}{}", pending.take().unwrap_or_default(), token));
        }
    }
    if pending.is_some() {
        return Err(range_error(input, "operator without version"));
    }

    let mut comparators = Vec::new();
    for token in &joined {
        comparators.extend(parse_comparator(input, token)?);
    }
    Ok(comparators)
}

fn is_operator(token: &str) -> bool {
    matches!(token, "^" | "~" | "~>" | ">" | ">=" | "<" | "<=" | "=")
}

fn range_error(input: &str, reason: &str) -> VersionError {
    VersionError::InvalidRange {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_comparator(input: &str, token: &str) -> Result<Vec<Comparator>, VersionError> {
    let (op, rest) = ["~>", ">=", "<=", ">", "<", "=", "^", "~"]
        .iter()
        .find_map(|op| token.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("", token));
    let p = parse_partial(input, rest)?;

    Ok(match op {
        "^" => caret(&p),
        "~" | "~>" => tilde(&p),
        ">" => greater_than(&p),
        ">=" => vec![Comparator::new(Op::Gte, p.floor())],
        "<" => match p.major {
            None => vec![Comparator::none()],
            Some(_) => vec![Comparator::new(Op::Lt, p.floor())],
        },
        "<=" => less_or_equal(&p),
        _ => x_range(&p),
    })
}

fn parse_partial(input: &str, raw: &str) -> Result<Partial, VersionError> {
    let raw = raw.trim_start_matches(['v', 'V']);
    let without_build = raw.split('+').next().unwrap_or_default();
    let (core, pre) = match without_build.split_once('-') {
        Some((core, pre)) => (core, parse_prerelease(pre).ok_or_else(|| range_error(input, "empty pre-release"))?),
        None => (without_build, Vec::new()),
    };

    let mut parts = [None, None, None];
    let pieces: Vec<&str> = if core.is_empty() { Vec::new() } else { core.split('.').collect() };
    if pieces.len() > 3 {
        return Err(range_error(input, "too many version components"));
    }
    let mut wildcard = false;
    for (slot, piece) in parts.iter_mut().zip(pieces) {
        if wildcard || matches!(piece, "x" | "X" | "*") {
            wildcard = true;
            continue;
        }
        *slot = Some(
            piece
                .parse::<u64>()
                .map_err(|_| range_error(input, "non-numeric version component"))?,
        );
    }

    Ok(Partial {
        major: parts[0],
        minor: parts[1],
        patch: parts[2],
        pre,
    })
}

fn x_range(p: &Partial) -> Vec<Comparator> {
    match (p.major, p.minor, p.patch) {
        (None, _, _) => vec![Comparator::any()],
        (Some(major), None, _) => vec![
            Comparator::new(Op::Gte, Version::new(major, 0, 0)),
            Comparator::new(Op::Lt, Version::new(major + 1, 0, 0)),
        ],
        (Some(major), Some(minor), None) => vec![
            Comparator::new(Op::Gte, Version::new(major, minor, 0)),
            Comparator::new(Op::Lt, Version::new(major, minor + 1, 0)),
        ],
        (Some(_), Some(_), Some(_)) => vec![Comparator::new(Op::Eq, p.floor())],
    }
}

fn caret(p: &Partial) -> Vec<Comparator> {
    let upper = match (p.major, p.minor, p.patch) {
        (None, _, _) => return vec![Comparator::any()],
        (Some(major), None, _) => Version::new(major + 1, 0, 0),
        (Some(0), Some(minor), None) => Version::new(0, minor + 1, 0),
        (Some(major), Some(_), None) => Version::new(major + 1, 0, 0),
        (Some(0), Some(0), Some(patch)) => Version::new(0, 0, patch + 1),
        (Some(0), Some(minor), Some(_)) => Version::new(0, minor + 1, 0),
        (Some(major), Some(_), Some(_)) => Version::new(major + 1, 0, 0),
    };
    vec![
        Comparator::new(Op::Gte, p.floor()),
        Comparator::new(Op::Lt, upper),
    ]
}

fn tilde(p: &Partial) -> Vec<Comparator> {
    let upper = match (p.major, p.minor) {
        (None, _) => return vec![Comparator::any()],
        (Some(major), None) => Version::new(major + 1, 0, 0),
        (Some(major), Some(minor)) => Version::new(major, minor + 1, 0),
    };
    vec![
        Comparator::new(Op::Gte, p.floor()),
        Comparator::new(Op::Lt, upper),
    ]
}

fn greater_than(p: &Partial) -> Vec<Comparator> {
    match (p.major, p.minor, p.patch) {
        (None, _, _) => vec![Comparator::none()],
        (Some(major), None, _) => vec![Comparator::new(Op::Gte, Version::new(major + 1, 0, 0))],
        (Some(major), Some(minor), None) => {
            vec![Comparator::new(Op::Gte, Version::new(major, minor + 1, 0))]
        }
        (Some(_), Some(_), Some(_)) => vec![Comparator::new(Op::Gt, p.floor())],
    }
}

fn less_or_equal(p: &Partial) -> Vec<Comparator> {
    match (p.major, p.minor, p.patch) {
        (None, _, _) => vec![Comparator::any()],
        (Some(major), None, _) => vec![Comparator::new(Op::Lt, Version::new(major + 1, 0, 0))],
        (Some(major), Some(minor), None) => {
            vec![Comparator::new(Op::Lt, Version::new(major, minor + 1, 0))]
        }
        (Some(_), Some(_), Some(_)) => vec![Comparator::new(Op::Lte, p.floor())],
    }
}

fn hyphen(lower: &Partial, upper: &Partial) -> Vec<Comparator> {
    let mut set = vec![Comparator::new(Op::Gte, lower.floor())];
    match (upper.major, upper.minor, upper.patch) {
        (None, _, _) => {}
        (Some(major), None, _) => set.push(Comparator::new(Op::Lt, Version::new(major + 1, 0, 0))),
        (Some(major), Some(minor), None) => {
            set.push(Comparator::new(Op::Lt, Version::new(major, minor + 1, 0)))
        }
        (Some(_), Some(_), Some(_)) => set.push(Comparator::new(Op::Lte, upper.floor())),
    }
    set
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Decides whether a plugin's declared compatibility range accepts the running
/// contract version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGate {
    contracts: Version,
}

impl VersionGate {
    /// Creates a gate enforcing `contracts`.
    pub fn new(contracts: Version) -> Self {
        Self { contracts }
    }

    /// The contract version this gate enforces.
    pub fn contracts(&self) -> &Version {
        &self.contracts
    }

    /// Returns `Ok(true)` if `range` accepts the contract version.
    pub fn accepts(&self, range: &str) -> Result<bool, VersionError> {
        Ok(VersionReq::parse(range)?.matches(&self.contracts))
    }
}

impl Default for VersionGate {
    fn default() -> Self {
        Self::new(CONTRACTS_VERSION)
    }
}
