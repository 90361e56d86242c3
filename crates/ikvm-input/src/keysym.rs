//! X keysym to HID usage translation.
//!
//! The HID report wire format itself is out of scope (delegated to the HID
//! layer); this module only owns the one piece of translation policy the
//! core cares about: the vendor override for the UK-layout `Intlbackslash`
//! key, which plain X keysym tables collapse onto the same code as `\`.

/// `XK_Intlbackslash`, used to disambiguate UK-layout backslash from the US
/// `\` key, which would otherwise map to the same HID usage.
pub const XK_INTLBACKSLASH: u32 = 0x0100_005C;

/// NumLock keysym, used by the server's LED probe sequence.
pub const XK_NUM_LOCK: u32 = 0xFF7F;

/// Translates an X keysym to a HID keyboard usage code.
///
/// Delegates to the standard table for everything except
/// [`XK_INTLBACKSLASH`], which the reference implementation special-cases.
pub fn keysym_to_hid_usage(keysym: u32) -> Option<u8> {
    if keysym == XK_INTLBACKSLASH {
        return Some(0x64); // USB HID usage "Keyboard Non-US \ and |"
    }
    standard_table::lookup(keysym)
}

mod standard_table {
    /// Minimal ASCII/function-key subset of the X keysym -> USB HID usage
    /// table; a full table is a static lookup the HID layer is assumed to
    /// already own per-platform.
    pub(super) fn lookup(keysym: u32) -> Option<u8> {
        match keysym {
            0xFF7F => Some(0x53), // NumLock
            0xFFE5 => Some(0x39), // CapsLock
            0xFF14 => Some(0x47), // ScrollLock
            0x0061..=0x007A => Some(0x04 + (keysym as u8 - b'a')), // a-z
            0x0030 => Some(0x27), // '0'
            0x0031..=0x0039 => Some(0x1E + (keysym as u8 - b'1')), // 1-9
            0xFF0D => Some(0x28), // Return
            0xFF1B => Some(0x29), // Escape
            0xFF08 => Some(0x2A), // BackSpace
            0xFF09 => Some(0x2B), // Tab
            0x0020 => Some(0x2C), // space
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intlbackslash_override() {
        assert_eq!(keysym_to_hid_usage(XK_INTLBACKSLASH), Some(0x64));
    }

    #[test]
    fn test_standard_letter() {
        assert_eq!(keysym_to_hid_usage(b'a' as u32), Some(0x04));
    }

    #[test]
    fn test_numlock_keysym() {
        assert_eq!(keysym_to_hid_usage(XK_NUM_LOCK), Some(0x53));
    }

    #[test]
    fn test_unknown_keysym() {
        assert_eq!(keysym_to_hid_usage(0xDEAD_BEEF), None);
    }
}
