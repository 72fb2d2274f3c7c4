//! Bitwise mask arithmetic
//!
//! Every function here is pure. Operands of a binary operation must share
//! an address family. Masks are arbitrary bit patterns: nothing requires the
//! one-bits to be contiguous.

use super::{Address, AddressFamily};
use crate::error::{Error, Result};

/// Build a mask with exactly `prefix_len` leading one-bits
///
/// # Errors
///
/// [`Error::PrefixOutOfRange`] when `prefix_len` is negative or wider than
/// the family.
pub fn cidr_to_mask(family: AddressFamily, prefix_len: i64) -> Result<Address> {
    let width = family.bit_width();
    if prefix_len < 0 || prefix_len > i64::from(width) {
        return Err(Error::PrefixOutOfRange {
            prefix: prefix_len,
            family,
            width,
        });
    }

    let full = family.full_bits();
    // checked_shr: a shift by the full 128 bits would overflow
    let host_bits = full.checked_shr(prefix_len as u32).unwrap_or(0);
    Ok(Address::from_bits(family, full & !host_bits))
}

/// Convert a numeric prefix length coming from configuration into an integer
///
/// # Errors
///
/// [`Error::NonIntegerPrefix`] for fractional, infinite or NaN values.
pub fn prefix_length_from_number(value: f64) -> Result<i64> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(Error::NonIntegerPrefix(value));
    }
    Ok(value as i64)
}

/// Bitwise AND of `address` and `mask`
pub fn apply_mask(address: Address, mask: Address) -> Result<Address> {
    let family = same_family(address, mask)?;
    Ok(Address::from_bits(family, address.bits() & mask.bits()))
}

/// Bitwise NOT over every bit of `mask`
pub fn invert_mask(mask: Address) -> Address {
    let family = mask.family();
    Address::from_bits(family, !mask.bits() & family.full_bits())
}

/// Bitwise OR of two addresses
pub fn merge(a: Address, b: Address) -> Result<Address> {
    let family = same_family(a, b)?;
    Ok(Address::from_bits(family, a.bits() | b.bits()))
}

fn same_family(a: Address, b: Address) -> Result<AddressFamily> {
    if a.family() != b.family() {
        return Err(Error::FamilyMismatch {
            expected: a.family(),
            actual: b.family(),
        });
    }
    Ok(a.family())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v6(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn cidr_to_mask_matches_canonical_text() {
        let cases: &[(i64, &str)] = &[
            (0, "::"),
            (1, "8000::"),
            (2, "c000::"),
            (3, "e000::"),
            (4, "f000::"),
            (5, "f800::"),
            (6, "fc00::"),
            (8, "ff00::"),
            (60, "ffff:ffff:ffff:fff0::"),
            (62, "ffff:ffff:ffff:fffc::"),
            (64, "ffff:ffff:ffff:ffff::"),
            (128, "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"),
        ];
        for &(prefix, expected) in cases {
            let mask = cidr_to_mask(AddressFamily::V6, prefix).unwrap();
            assert_eq!(mask.to_string(), expected, "prefix /{prefix}");
        }
    }

    #[test]
    fn cidr_to_mask_sets_exactly_prefix_leading_ones() {
        for prefix in 0..=128u32 {
            let mask = cidr_to_mask(AddressFamily::V6, i64::from(prefix)).unwrap();
            assert_eq!(mask.bits().leading_ones(), prefix);
            assert_eq!(mask.bits().count_ones(), prefix);
        }
    }

    #[test]
    fn cidr_to_mask_for_v4() {
        assert_eq!(
            cidr_to_mask(AddressFamily::V4, 24).unwrap().to_string(),
            "255.255.255.0"
        );
        assert_eq!(
            cidr_to_mask(AddressFamily::V4, 32).unwrap().to_string(),
            "255.255.255.255"
        );
        assert!(cidr_to_mask(AddressFamily::V4, 33).is_err());
    }

    #[test]
    fn cidr_to_mask_rejects_out_of_range() {
        for prefix in [-1, 129] {
            let err = cidr_to_mask(AddressFamily::V6, prefix).unwrap_err();
            assert!(matches!(err, Error::PrefixOutOfRange { prefix: p, width: 128, .. } if p == prefix));
        }
    }

    #[test]
    fn fractional_prefix_is_a_type_error() {
        assert!(matches!(
            prefix_length_from_number(1.5),
            Err(Error::NonIntegerPrefix(v)) if v == 1.5
        ));
        assert!(prefix_length_from_number(f64::NAN).is_err());
        assert_eq!(prefix_length_from_number(64.0).unwrap(), 64);
    }

    #[test]
    fn apply_mask_is_bitwise_and() {
        let cases = [
            ("2001:0db8:85a3::8a2e:0370:7334", "ffff:ffff:ffff:ffff::", "2001:db8:85a3::"),
            ("fe80::1ff:fe23:4567:890a", "ffff:ffff:ffff:ffff::", "fe80::"),
            ("1234:5678:9abc:def0:1234:5678:9abc:def0", "ffff:ffff::", "1234:5678::"),
            ("::1", "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ff00", "::"),
            ("2001:0db8:85a3::8a2e:370:7334", "::ffff:ffff:ffff:ffff", "::8a2e:370:7334"),
            ("2001:0db8:85a3::8a2e:370:7334", "f000::1861:0000", "2000::60:0"),
        ];
        for (ip, mask, expected) in cases {
            assert_eq!(apply_mask(v6(ip), v6(mask)).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn invert_mask_flips_every_bit() {
        let cases = [
            ("::", "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"),
            ("8000::", "7fff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"),
            ("f000::", "fff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"),
            ("ffff:ffff:ffff:fff0::", "::f:ffff:ffff:ffff:ffff"),
            ("ffff:ffff:ffff:fffc::", "::3:ffff:ffff:ffff:ffff"),
            ("ffff:ffff:ffff:ffff::", "::ffff:ffff:ffff:ffff"),
            ("ff00:ff00:ff00:ff00:ff00:ff00:ff00:ff00", "ff:ff:ff:ff:ff:ff:ff:ff"),
            ("abcd:1234:abcd:7890::1", "5432:edcb:5432:876f:ffff:ffff:ffff:fffe"),
        ];
        for (a, b) in cases {
            assert_eq!(invert_mask(v6(a)).to_string(), b);
            assert_eq!(invert_mask(v6(b)).to_string(), a);
        }
    }

    #[test]
    fn host_masks_render_as_hex_groups() {
        let host = invert_mask(cidr_to_mask(AddressFamily::V6, 80).unwrap());
        assert_eq!(host.to_string(), "::ffff:ffff:ffff");

        let suffix = apply_mask(v6("2001:db8::1:203:405"), host).unwrap();
        assert_eq!(suffix.to_string(), "::1:203:405");
        let merged = merge(v6("2001:db8:aa::"), suffix).unwrap();
        assert_eq!(merged.to_string(), "2001:db8:aa::1:203:405");
    }

    #[test]
    fn double_inversion_preserves_masking() {
        let address = v6("2001:db8:85a3::8a2e:370:7334");
        for mask in ["f000::1861:0000", "ffff:ffff:ffff:ffff::", "::", "ff00:ff00::ff"] {
            let mask = v6(mask);
            assert_eq!(invert_mask(invert_mask(mask)), mask);
            assert_eq!(
                apply_mask(address, invert_mask(invert_mask(mask))).unwrap(),
                apply_mask(address, mask).unwrap()
            );
        }
    }

    #[test]
    fn merge_is_commutative_or() {
        let cases = [
            ("::", "::", "::"),
            ("::", "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff", "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"),
            ("8000::", "4000::", "c000::"),
            (
                "ff00:ff00:ff00:ff00:ff00:ff00:ff00:ff00",
                "00ff:00ff:00ff:00ff:00ff:00ff:00ff:00ff",
                "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff",
            ),
            ("abcd:1234:abcd:7890::1", "::", "abcd:1234:abcd:7890::1"),
            ("2210:b7ac:7523:7a00::", "::efea:97a", "2210:b7ac:7523:7a00::efea:97a"),
        ];
        for (a, b, expected) in cases {
            assert_eq!(merge(v6(a), v6(b)).unwrap().to_string(), expected);
            assert_eq!(merge(v6(b), v6(a)).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let a = v6("2001:db8::abcd");
        assert_eq!(merge(a, a).unwrap(), a);
    }

    #[test]
    fn mixed_families_are_rejected() {
        let v4: Address = "10.0.0.1".parse().unwrap();
        assert!(matches!(
            merge(v6("::1"), v4),
            Err(Error::FamilyMismatch { .. })
        ));
        assert!(apply_mask(v4, v6("ffff::")).is_err());
    }
}
