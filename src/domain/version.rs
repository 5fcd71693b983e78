use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// 偽版本的基底
pub const PSEUDO_BASE: &str = "0.0.0";

/// 偽版本使用的短 revision 長度
pub const SHORT_REV_LEN: usize = 12;

static RELEASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)(?:-([0-9A-Za-z.-]+))?(?:\+[0-9A-Za-z.-]+)?$")
        .expect("release pattern compiles")
});

static REVISION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{7,40}$").expect("revision pattern compiles"));

/// A tagged release, compared by semantic precedence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Release {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

/// Resolved version of a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    Release(Release),
    /// `0.0.0-<rev>`, pinned directly to a revision.
    Pseudo { rev: String },
}

impl Release {
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = RELEASE_RE.captures(raw.trim())?;
        Some(Release {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
            patch: caps[3].parse().ok()?,
            pre: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }
}

impl Ord for Release {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl PartialOrd for Release {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

// 數字識別字小於字母識別字；前綴相同時較短者較小
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

impl Version {
    /// Builds a pseudo-version from a full or short revision hash.
    pub fn pseudo(revision: &str) -> Self {
        Version::Pseudo {
            rev: short_revision(revision),
        }
    }

    /// Parses a recorded version string. `0.0.0-<hex>` is read back as a pseudo-version.
    pub fn parse(raw: &str) -> Option<Self> {
        let release = Release::parse(raw)?;
        match &release.pre {
            Some(pre)
                if (release.major, release.minor, release.patch) == (0, 0, 0)
                    && is_revision(pre) =>
            {
                Some(Version::Pseudo { rev: pre.clone() })
            }
            _ => Some(Version::Release(release)),
        }
    }
}

/// Pseudo-versions sort below every release; two pseudo-versions fall back
/// to lexical revision order.
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Version::Release(a), Version::Release(b)) => a.cmp(b),
            (Version::Pseudo { .. }, Version::Release(_)) => Ordering::Less,
            (Version::Release(_), Version::Pseudo { .. }) => Ordering::Greater,
            (Version::Pseudo { rev: a }, Version::Pseudo { rev: b }) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Release(release) => release.fmt(f),
            Version::Pseudo { rev } => write!(f, "{}-{}", PSEUDO_BASE, rev),
        }
    }
}

pub fn is_revision(raw: &str) -> bool {
    REVISION_RE.is_match(raw)
}

pub fn short_revision(revision: &str) -> String {
    revision.chars().take(SHORT_REV_LEN).collect()
}
