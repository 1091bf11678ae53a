//! Protocol version identity, ordering, compatibility rules, and wire codec.
//!
//! A [`Version`] is an opaque `major*1_000_000 + minor*10_000 + revision*100 + build` integer
//! identity. The mixed meaning of the "sent" legacy markers (`6_07_99_99`, `7_09_99_99`) and the
//! "recognised on receive" legacy markers (`6_08_00_99`, `5_06_00_99`) is load-bearing and
//! deliberately asymmetric: the two tables below must not be merged or simplified.

use std::fmt;

use crate::bytesrepr::{self, FromBytes, ToBytes};

/// An encoded protocol-version identity with a derived `(major, minor, revision, build)`
/// breakdown and a total order over that identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u32);

impl Version {
    /// Builds a version from its components. `minor`, `revision`, and `build` are expected to be
    /// in `0..=99`; values outside that range still encode, but no longer round-trip through
    /// `major()`/`minor()`/... cleanly.
    pub const fn new(major: u8, minor: u8, revision: u8, build: u8) -> Self {
        Version(
            major as u32 * 1_000_000
                + minor as u32 * 10_000
                + revision as u32 * 100
                + build as u32,
        )
    }

    /// Builds a version directly from its wire identity, e.g. a legacy signal constant.
    pub const fn from_id(id: u32) -> Self {
        Version(id)
    }

    /// The raw wire identity.
    pub const fn id(self) -> u32 {
        self.0
    }

    pub const fn major(self) -> u8 {
        (self.0 / 1_000_000) as u8
    }

    pub const fn minor(self) -> u8 {
        ((self.0 / 10_000) % 100) as u8
    }

    pub const fn revision(self) -> u8 {
        ((self.0 / 100) % 100) as u8
    }

    pub const fn build(self) -> u8 {
        (self.0 % 100) as u8
    }

    /// The oldest version this version's family still speaks wire-compatible framing with.
    ///
    /// The core does not need the full compatibility lattice, only this one property, which is
    /// consulted when computing the *advertised* minimum-compatible version (see
    /// [`advertised_min_compat_version`]).
    pub const fn minimum_compatibility_version(self) -> Version {
        if self.major() == 0 {
            return self;
        }
        Version::new(self.major() - 1, 0, 0, 99)
    }

    /// Symmetric wire-compatibility predicate, used from the receiver's viewpoint to validate a
    /// remote's reported version against the local one.
    pub fn is_compatible(self, other: Version) -> bool {
        if self == other || self.major() == other.major() {
            return true;
        }

        // Rolling-upgrade compatibility with the pre-fork lineage: a post-fork 1.x/2.x node is
        // compatible with the legacy 7.10.x predecessor release it forked from.
        let is_post_fork = |v: Version| v >= V_1_0_0 && v < V_3_0_0;
        let forks_from_7_10 = |v: Version| v.major() == 7 && v >= Version::new(7, 10, 0, 99);
        if (is_post_fork(self) && forks_from_7_10(other))
            || (is_post_fork(other) && forks_from_7_10(self))
        {
            return true;
        }

        // Adjacent majors are compatible down to the newer version's minimum compatibility
        // version.
        if self.major() + 1 == other.major() {
            return other >= self.minimum_compatibility_version();
        }
        if other.major() + 1 == self.major() {
            return self >= other.minimum_compatibility_version();
        }

        false
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.build() == 99 {
            write!(f, "{}.{}.{}", self.major(), self.minor(), self.revision())
        } else {
            write!(
                f,
                "{}.{}.{}.{}",
                self.major(),
                self.minor(),
                self.revision(),
                self.build()
            )
        }
    }
}

impl ToBytes for Version {
    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), bytesrepr::Error> {
        self.0.write_bytes(writer)
    }
}

impl FromBytes for Version {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), bytesrepr::Error> {
        let (id, rest) = u32::from_bytes(bytes)?;
        Ok((Version(id), rest))
    }
}

/// Writes `version`'s wire identity to `out`.
pub fn write_version(version: Version, out: &mut Vec<u8>) -> Result<(), bytesrepr::Error> {
    version.write_bytes(out)
}

/// Reads a [`Version`] from the front of `input`, returning it with the remainder.
pub fn read_version(input: &[u8]) -> Result<(Version, &[u8]), bytesrepr::Error> {
    Version::from_bytes(input)
}

/// First release of the 1.x family.
pub const V_1_0_0: Version = Version::new(1, 0, 0, 99);
/// First release of the 2.x family.
pub const V_2_0_0: Version = Version::new(2, 0, 0, 99);
/// First release of the 3.x family (the next major after the 2.x line).
pub const V_3_0_0: Version = Version::new(3, 0, 0, 99);
/// Legacy rolling-upgrade response version: the pre-fork release the 1.x/2.x line forked from.
pub const V_7_10_2: Version = Version::new(7, 10, 2, 99);

/// Sent (advertised) legacy signal for a local version in `[V_1_0_0, V_2_0_0)`. Deliberately not
/// the true minimum-compatibility version (6.8.0): this distinct identity lets a peer cheaply
/// discriminate a 1.x sender from a 7.x sender, which would otherwise both advertise 6.8.0 and be
/// indistinguishable. See [`RECV_LEGACY_SIGNAL_6_8`] / [`RECV_LEGACY_SIGNAL_5_6`] for the
/// orthogonal set of markers a sender of *that* legacy wire actually puts on the wire.
pub const SENT_MIN_COMPAT_1X: Version = Version::from_id(6_07_99_99);
/// Sent (advertised) legacy signal for a local version `>= V_2_0_0`. Same trick as
/// [`SENT_MIN_COMPAT_1X`] at the 2.x boundary.
pub const SENT_MIN_COMPAT_2X: Version = Version::from_id(7_09_99_99);

/// Legacy wire-version marker a 6.8.x-lineage peer reports; recognised on receive only. Paired
/// with [`RECV_LEGACY_SIGNAL_5_6`]; never sent by this implementation.
pub const RECV_LEGACY_SIGNAL_6_8: Version = Version::from_id(6_08_00_99);
/// Legacy wire-version marker a 5.6.x-lineage peer reports; recognised on receive only.
pub const RECV_LEGACY_SIGNAL_5_6: Version = Version::from_id(5_06_00_99);

/// Computes the minimum-compatible version advertised in an outbound handshake request.
///
/// See the module doc: this is sometimes deliberately different from
/// `local.minimum_compatibility_version()` to let the peer discriminate version families.
pub fn advertised_min_compat_version(local: Version) -> Version {
    if local >= V_1_0_0 && local < V_2_0_0 {
        SENT_MIN_COMPAT_1X
    } else if local >= V_2_0_0 {
        SENT_MIN_COMPAT_2X
    } else {
        local.minimum_compatibility_version()
    }
}

/// Chooses the response version for an inbound handshake, given the wire version the remote
/// reported (not the decoded payload version).
///
/// Note the predicate here (`< V_3_0_0`) is intentionally wider than the one
/// [`advertised_min_compat_version`] uses (`< V_2_0_0`): a local version in `[V_2_0_0, V_3_0_0)`
/// both advertises [`SENT_MIN_COMPAT_2X`] *and* remains eligible to answer with the legacy
/// [`V_7_10_2`]. This mirrors the source behaviour exactly; it is a rolling-upgrade window, not a
/// copy-paste bug, and must not be "fixed" to match the advertise-side bound.
pub fn select_response_version(local: Version, remote_wire_version: Version) -> Version {
    if local >= V_1_0_0
        && local < V_3_0_0
        && (remote_wire_version == RECV_LEGACY_SIGNAL_6_8
            || remote_wire_version == RECV_LEGACY_SIGNAL_5_6)
    {
        V_7_10_2
    } else {
        local
    }
}
