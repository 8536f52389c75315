//! Adobe Glyph List lookups.
//!
//! `/Differences` arrays and simple-font encodings name glyphs
//! (`/Agrave`, `/quotesingle`, `/fi`); this module resolves those names to
//! Unicode. The table is the working subset of the AGL that Latin-script
//! documents actually hit, backed by the algorithmic `uniXXXX`/`uXXXXXX`
//! forms for everything modern generators emit.

use phf::phf_map;

static GLYPH_NAMES: phf::Map<&'static str, u32> = phf_map! {
    // ASCII
    "space" => 0x0020, "exclam" => 0x0021, "quotedbl" => 0x0022,
    "numbersign" => 0x0023, "dollar" => 0x0024, "percent" => 0x0025,
    "ampersand" => 0x0026, "quotesingle" => 0x0027, "parenleft" => 0x0028,
    "parenright" => 0x0029, "asterisk" => 0x002A, "plus" => 0x002B,
    "comma" => 0x002C, "hyphen" => 0x002D, "period" => 0x002E,
    "slash" => 0x002F, "zero" => 0x0030, "one" => 0x0031, "two" => 0x0032,
    "three" => 0x0033, "four" => 0x0034, "five" => 0x0035, "six" => 0x0036,
    "seven" => 0x0037, "eight" => 0x0038, "nine" => 0x0039,
    "colon" => 0x003A, "semicolon" => 0x003B, "less" => 0x003C,
    "equal" => 0x003D, "greater" => 0x003E, "question" => 0x003F,
    "at" => 0x0040,
    "A" => 0x0041, "B" => 0x0042, "C" => 0x0043, "D" => 0x0044,
    "E" => 0x0045, "F" => 0x0046, "G" => 0x0047, "H" => 0x0048,
    "I" => 0x0049, "J" => 0x004A, "K" => 0x004B, "L" => 0x004C,
    "M" => 0x004D, "N" => 0x004E, "O" => 0x004F, "P" => 0x0050,
    "Q" => 0x0051, "R" => 0x0052, "S" => 0x0053, "T" => 0x0054,
    "U" => 0x0055, "V" => 0x0056, "W" => 0x0057, "X" => 0x0058,
    "Y" => 0x0059, "Z" => 0x005A,
    "bracketleft" => 0x005B, "backslash" => 0x005C, "bracketright" => 0x005D,
    "asciicircum" => 0x005E, "underscore" => 0x005F, "grave" => 0x0060,
    "a" => 0x0061, "b" => 0x0062, "c" => 0x0063, "d" => 0x0064,
    "e" => 0x0065, "f" => 0x0066, "g" => 0x0067, "h" => 0x0068,
    "i" => 0x0069, "j" => 0x006A, "k" => 0x006B, "l" => 0x006C,
    "m" => 0x006D, "n" => 0x006E, "o" => 0x006F, "p" => 0x0070,
    "q" => 0x0071, "r" => 0x0072, "s" => 0x0073, "t" => 0x0074,
    "u" => 0x0075, "v" => 0x0076, "w" => 0x0077, "x" => 0x0078,
    "y" => 0x0079, "z" => 0x007A,
    "braceleft" => 0x007B, "bar" => 0x007C, "braceright" => 0x007D,
    "asciitilde" => 0x007E,

    // Quotes, dashes, and other typography
    "quoteleft" => 0x2018, "quoteright" => 0x2019,
    "quotedblleft" => 0x201C, "quotedblright" => 0x201D,
    "quotesinglbase" => 0x201A, "quotedblbase" => 0x201E,
    "guillemotleft" => 0x00AB, "guillemotright" => 0x00BB,
    "guilsinglleft" => 0x2039, "guilsinglright" => 0x203A,
    "endash" => 0x2013, "emdash" => 0x2014, "bullet" => 0x2022,
    "dagger" => 0x2020, "daggerdbl" => 0x2021, "ellipsis" => 0x2026,
    "perthousand" => 0x2030, "minus" => 0x2212, "fraction" => 0x2044,
    "periodcentered" => 0x00B7, "trademark" => 0x2122,
    "registered" => 0x00AE, "copyright" => 0x00A9, "degree" => 0x00B0,
    "plusminus" => 0x00B1, "multiply" => 0x00D7, "divide" => 0x00F7,
    "logicalnot" => 0x00AC, "mu" => 0x00B5, "paragraph" => 0x00B6,
    "section" => 0x00A7, "currency" => 0x00A4, "cent" => 0x00A2,
    "sterling" => 0x00A3, "yen" => 0x00A5, "florin" => 0x0192,
    "Euro" => 0x20AC, "euro" => 0x20AC, "brokenbar" => 0x00A6,
    "exclamdown" => 0x00A1, "questiondown" => 0x00BF,
    "onequarter" => 0x00BC, "onehalf" => 0x00BD, "threequarters" => 0x00BE,
    "onesuperior" => 0x00B9, "twosuperior" => 0x00B2, "threesuperior" => 0x00B3,
    "ordfeminine" => 0x00AA, "ordmasculine" => 0x00BA,
    "dotlessi" => 0x0131, "dotaccent" => 0x02D9, "ring" => 0x02DA,
    "cedilla" => 0x00B8, "ogonek" => 0x02DB, "caron" => 0x02C7,
    "breve" => 0x02D8, "macron" => 0x00AF, "circumflex" => 0x02C6,
    "tilde" => 0x02DC, "hungarumlaut" => 0x02DD, "acute" => 0x00B4,
    "dieresis" => 0x00A8,

    // Ligatures
    "fi" => 0xFB01, "fl" => 0xFB02, "ff" => 0xFB00,
    "ffi" => 0xFB03, "ffl" => 0xFB04,

    // Accented Latin, uppercase
    "Agrave" => 0x00C0, "Aacute" => 0x00C1, "Acircumflex" => 0x00C2,
    "Atilde" => 0x00C3, "Adieresis" => 0x00C4, "Aring" => 0x00C5,
    "AE" => 0x00C6, "Ccedilla" => 0x00C7, "Egrave" => 0x00C8,
    "Eacute" => 0x00C9, "Ecircumflex" => 0x00CA, "Edieresis" => 0x00CB,
    "Igrave" => 0x00CC, "Iacute" => 0x00CD, "Icircumflex" => 0x00CE,
    "Idieresis" => 0x00CF, "Eth" => 0x00D0, "Ntilde" => 0x00D1,
    "Ograve" => 0x00D2, "Oacute" => 0x00D3, "Ocircumflex" => 0x00D4,
    "Otilde" => 0x00D5, "Odieresis" => 0x00D6, "Oslash" => 0x00D8,
    "Ugrave" => 0x00D9, "Uacute" => 0x00DA, "Ucircumflex" => 0x00DB,
    "Udieresis" => 0x00DC, "Yacute" => 0x00DD, "Thorn" => 0x00DE,
    "Scaron" => 0x0160, "Zcaron" => 0x017D, "OE" => 0x0152,
    "Ydieresis" => 0x0178, "Lslash" => 0x0141,

    // Accented Latin, lowercase
    "agrave" => 0x00E0, "aacute" => 0x00E1, "acircumflex" => 0x00E2,
    "atilde" => 0x00E3, "adieresis" => 0x00E4, "aring" => 0x00E5,
    "ae" => 0x00E6, "ccedilla" => 0x00E7, "egrave" => 0x00E8,
    "eacute" => 0x00E9, "ecircumflex" => 0x00EA, "edieresis" => 0x00EB,
    "igrave" => 0x00EC, "iacute" => 0x00ED, "icircumflex" => 0x00EE,
    "idieresis" => 0x00EF, "eth" => 0x00F0, "ntilde" => 0x00F1,
    "ograve" => 0x00F2, "oacute" => 0x00F3, "ocircumflex" => 0x00F4,
    "otilde" => 0x00F5, "odieresis" => 0x00F6, "oslash" => 0x00F8,
    "ugrave" => 0x00F9, "uacute" => 0x00FA, "ucircumflex" => 0x00FB,
    "udieresis" => 0x00FC, "yacute" => 0x00FD, "thorn" => 0x00FE,
    "ydieresis" => 0x00FF, "scaron" => 0x0161, "zcaron" => 0x017E,
    "oe" => 0x0153, "lslash" => 0x0142, "germandbls" => 0x00DF,

    // Greek (common in scientific documents)
    "Alpha" => 0x0391, "Beta" => 0x0392, "Gamma" => 0x0393,
    "Delta" => 0x0394, "Epsilon" => 0x0395, "Zeta" => 0x0396,
    "Eta" => 0x0397, "Theta" => 0x0398, "Iota" => 0x0399,
    "Kappa" => 0x039A, "Lambda" => 0x039B, "Mu" => 0x039C,
    "Nu" => 0x039D, "Xi" => 0x039E, "Omicron" => 0x039F,
    "Pi" => 0x03A0, "Rho" => 0x03A1, "Sigma" => 0x03A3,
    "Tau" => 0x03A4, "Upsilon" => 0x03A5, "Phi" => 0x03A6,
    "Chi" => 0x03A7, "Psi" => 0x03A8, "Omega" => 0x03A9,
    "alpha" => 0x03B1, "beta" => 0x03B2, "gamma" => 0x03B3,
    "delta" => 0x03B4, "epsilon" => 0x03B5, "zeta" => 0x03B6,
    "eta" => 0x03B7, "theta" => 0x03B8, "iota" => 0x03B9,
    "kappa" => 0x03BA, "lambda" => 0x03BB, "nu" => 0x03BD,
    "xi" => 0x03BE, "omicron" => 0x03BF, "pi" => 0x03C0,
    "rho" => 0x03C1, "sigma" => 0x03C3, "sigma1" => 0x03C2,
    "tau" => 0x03C4, "upsilon" => 0x03C5, "phi" => 0x03C6,
    "chi" => 0x03C7, "psi" => 0x03C8, "omega" => 0x03C9,

    // Math and symbols
    "infinity" => 0x221E, "partialdiff" => 0x2202, "summation" => 0x2211,
    "product" => 0x220F, "integral" => 0x222B, "radical" => 0x221A,
    "approxequal" => 0x2248, "notequal" => 0x2260, "lessequal" => 0x2264,
    "greaterequal" => 0x2265, "arrowleft" => 0x2190, "arrowup" => 0x2191,
    "arrowright" => 0x2192, "arrowdown" => 0x2193, "arrowboth" => 0x2194,
    "lozenge" => 0x25CA, "apple" => 0xF8FF,

    // Space variants
    "nbspace" => 0x00A0, "sfthyphen" => 0x00AD,
};

/// Resolve a glyph name to its Unicode code point.
///
/// Resolution order: the literal AGL entry, then the algorithmic
/// `uniXXXX` / `uXXXX[XX]` forms, then the name with any `.suffix`
/// stripped (e.g. `fi.liga`). Unmappable names return `None`.
pub fn glyph_name_to_unicode(name: &str) -> Option<u32> {
    if let Some(&code) = GLYPH_NAMES.get(name) {
        return Some(code);
    }

    // uniXXXX: exactly four hex digits.
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() == 4 {
            if let Ok(code) = u32::from_str_radix(hex, 16) {
                return Some(code);
            }
        }
    }
    // uXXXX / uXXXXX / uXXXXXX: four to six hex digits.
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            if let Ok(code) = u32::from_str_radix(hex, 16) {
                if code <= 0x10FFFF {
                    return Some(code);
                }
            }
        }
    }
    // Suffixed variants: `fi.liga`, `one.oldstyle`.
    if let Some(base) = name.split('.').next() {
        if base != name && !base.is_empty() {
            return glyph_name_to_unicode(base);
        }
    }

    None
}

/// Resolve a glyph name to a char, dropping unmappable values.
pub fn glyph_name_to_char(name: &str) -> Option<char> {
    glyph_name_to_unicode(name).and_then(char::from_u32)
}
