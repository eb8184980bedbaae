use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use std::fmt;
use std::ops;
use std::str::FromStr;

use crate::error::Error;

/// Address of a tube (or the start of an address range) in the tree.
///
/// Deep levels hold `4^depth` tubes, so ids outgrow `u64` quickly. Values that
/// are known to be small (anything inside a contiguous chunk) can be reduced
/// with `to_simple`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpatialId(BigUint);

impl SpatialId {
	pub fn zero() -> SpatialId {
		SpatialId(BigUint::zero())
	}

	pub fn one() -> SpatialId {
		SpatialId(BigUint::one())
	}

	/// Reduces to a machine word, if it fits.
	pub fn try_simple(&self) -> Option<usize> {
		self.0.to_usize()
	}

	/// Reduces to a machine word. Only valid where the value is known to fit.
	pub fn to_simple(&self) -> usize {
		match self.try_simple() {
			Some(v) => v,
			None => panic!("SpatialId {} does not fit a machine word", self),
		}
	}

	pub fn bit(&self, index: u64) -> bool {
		self.0.bit(index)
	}
}

impl From<u64> for SpatialId {
	fn from(v: u64) -> SpatialId {
		SpatialId(BigUint::from(v))
	}
}

impl From<usize> for SpatialId {
	fn from(v: usize) -> SpatialId {
		SpatialId(BigUint::from(v))
	}
}

impl fmt::Display for SpatialId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for SpatialId {
	type Err = Error;

	fn from_str(s: &str) -> Result<SpatialId, Error> {
		BigUint::from_str(s)
			.map(SpatialId)
			.map_err(|e| Error::Format(format!("bad id {:?}: {}", s, e)))
	}
}

impl ops::Add<&SpatialId> for &SpatialId {
	type Output = SpatialId;

	fn add(self, rhs: &SpatialId) -> SpatialId {
		SpatialId(&self.0 + &rhs.0)
	}
}

impl ops::Add<u64> for SpatialId {
	type Output = SpatialId;

	fn add(self, rhs: u64) -> SpatialId {
		SpatialId(self.0 + rhs)
	}
}

impl ops::AddAssign<&SpatialId> for SpatialId {
	fn add_assign(&mut self, rhs: &SpatialId) {
		self.0 += &rhs.0;
	}
}

impl ops::Sub<&SpatialId> for &SpatialId {
	type Output = SpatialId;

	fn sub(self, rhs: &SpatialId) -> SpatialId {
		SpatialId(&self.0 - &rhs.0)
	}
}

impl ops::Sub<u64> for SpatialId {
	type Output = SpatialId;

	fn sub(self, rhs: u64) -> SpatialId {
		SpatialId(self.0 - rhs)
	}
}

impl ops::Mul<&SpatialId> for &SpatialId {
	type Output = SpatialId;

	fn mul(self, rhs: &SpatialId) -> SpatialId {
		SpatialId(&self.0 * &rhs.0)
	}
}

impl ops::Div<&SpatialId> for &SpatialId {
	type Output = SpatialId;

	fn div(self, rhs: &SpatialId) -> SpatialId {
		SpatialId(&self.0 / &rhs.0)
	}
}

impl ops::Div<u64> for SpatialId {
	type Output = SpatialId;

	fn div(self, rhs: u64) -> SpatialId {
		SpatialId(self.0 / rhs)
	}
}

impl ops::Shl<usize> for &SpatialId {
	type Output = SpatialId;

	fn shl(self, bits: usize) -> SpatialId {
		SpatialId(&self.0 << bits)
	}
}

impl ops::Shl<usize> for SpatialId {
	type Output = SpatialId;

	fn shl(self, bits: usize) -> SpatialId {
		SpatialId(self.0 << bits)
	}
}

impl ops::Shr<usize> for &SpatialId {
	type Output = SpatialId;

	fn shr(self, bits: usize) -> SpatialId {
		SpatialId(&self.0 >> bits)
	}
}

#[cfg(test)]
mod tests {
	use crate::model::id::SpatialId;

	#[test]
	fn test_arithmetic_past_u64() {
		let big = SpatialId::one() << 100;
		let sum = &big + &SpatialId::from(5u64);
		assert!(sum > big);
		assert_eq!(&sum - &big, SpatialId::from(5u64));
		assert_eq!(big.try_simple(), None);
		assert_eq!((&sum - &big).to_simple(), 5);
	}

	#[test]
	fn test_parse_and_display() {
		let id: SpatialId = "1267650600228229401496703205376".parse().unwrap();
		assert_eq!(id, SpatialId::one() << 100);
		assert_eq!(id.to_string(), "1267650600228229401496703205376");
		assert!("abc".parse::<SpatialId>().is_err());
	}

	#[test]
	#[should_panic]
	fn test_to_simple_overflow() {
		(SpatialId::one() << 80).to_simple();
	}
}
