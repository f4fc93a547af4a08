/// Missive timestamp.
///
/// Internally i64 milliseconds from unix epoch, matching the wire unit
/// of the `Timestamp` header.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Construct a new timestamp of "now".
    pub fn now() -> Self {
        std::time::SystemTime::now().into()
    }

    /// Construct a timestamp from i64 milliseconds since unix epoch.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Get the i64 milliseconds since unix epoch.
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// The absolute difference between two timestamps, regardless of
    /// which one is earlier. The replay window check needs to bound
    /// clock skew in either direction.
    pub fn abs_delta(&self, other: Timestamp) -> std::time::Duration {
        std::time::Duration::from_millis(self.0.abs_diff(other.0))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add<std::time::Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: std::time::Duration) -> Self::Output {
        Timestamp(self.0 + rhs.as_millis() as i64)
    }
}

impl std::ops::Sub<std::time::Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: std::time::Duration) -> Self::Output {
        Timestamp(self.0 - rhs.as_millis() as i64)
    }
}

impl From<std::time::SystemTime> for Timestamp {
    fn from(t: std::time::SystemTime) -> Self {
        Self(
            t.duration_since(std::time::SystemTime::UNIX_EPOCH)
                .expect("invalid system time")
                .as_millis() as i64,
        )
    }
}

impl From<Timestamp> for std::time::SystemTime {
    fn from(t: Timestamp) -> Self {
        std::time::SystemTime::UNIX_EPOCH
            + std::time::Duration::from_millis(t.0 as u64)
    }
}
