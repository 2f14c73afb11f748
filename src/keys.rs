// src/keys.rs

use bitflags::bitflags;
use log::trace;
use serde::{Deserialize, Serialize};
use x11::keysym;

bitflags! {
    /// Represents a keyboard modifier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2; // Also known as Option on macOS
        const SUPER = 1 << 3; // Also known as Windows key or Command key
        const CAPS_LOCK = 1 << 4;
        const NUM_LOCK = 1 << 5;
    }
}

// Core X modifier masks. xkb uses the same bit positions for the real
// modifiers, so Wayland `wl_keyboard.modifiers` masks decode the same way.
const SHIFT_MASK: u32 = 1 << 0;
const LOCK_MASK: u32 = 1 << 1;
const CONTROL_MASK: u32 = 1 << 2;
const MOD1_MASK: u32 = 1 << 3;
const MOD2_MASK: u32 = 1 << 4;
const MOD4_MASK: u32 = 1 << 6;

impl Modifiers {
    /// Decodes an X core (or xkb) modifier state mask.
    pub fn from_x_state(state: u32) -> Self {
        let mut modifiers = Modifiers::empty();
        if state & SHIFT_MASK != 0 {
            modifiers.insert(Modifiers::SHIFT);
        }
        if state & LOCK_MASK != 0 {
            modifiers.insert(Modifiers::CAPS_LOCK);
        }
        if state & CONTROL_MASK != 0 {
            modifiers.insert(Modifiers::CONTROL);
        }
        if state & MOD1_MASK != 0 {
            modifiers.insert(Modifiers::ALT);
        }
        if state & MOD2_MASK != 0 {
            modifiers.insert(Modifiers::NUM_LOCK);
        }
        if state & MOD4_MASK != 0 {
            modifiers.insert(Modifiers::SUPER);
        }
        modifiers
    }

    /// Whether a key press under these modifiers may still produce text.
    /// Control, Alt and Super chords are commands, not typing.
    pub fn permits_text(self) -> bool {
        !self.intersects(Modifiers::CONTROL | Modifiers::ALT | Modifiers::SUPER)
    }
}

/// Represents a key symbol.
///
/// The application-level key enum both backends translate into. Printable
/// keys carry their character; everything else has a named variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum KeySymbol {
    Char(char),

    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    F21,
    F22,
    F23,
    F24,

    Shift,
    Control,
    Alt,
    Super,
    CapsLock,
    NumLock,

    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Insert,
    Delete,

    Enter,
    Backspace,
    Tab,
    Escape,
    PrintScreen,
    ScrollLock,
    Pause,

    Keypad0,
    Keypad1,
    Keypad2,
    Keypad3,
    Keypad4,
    Keypad5,
    Keypad6,
    Keypad7,
    Keypad8,
    Keypad9,
    KeypadEnter,
    KeypadPlus,
    KeypadMinus,
    KeypadMultiply,
    KeypadDivide,
    KeypadDecimal,
    KeypadEquals,

    Menu,

    #[default]
    Unknown,
}

impl KeySymbol {
    /// Returns true if the key symbol represents a modifier key.
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            KeySymbol::Shift
                | KeySymbol::Control
                | KeySymbol::Alt
                | KeySymbol::Super
                | KeySymbol::CapsLock
                | KeySymbol::NumLock
        )
    }
}

/// Maps a Latin-1 keysym to the character it types, if any.
///
/// Keysyms in 0x20..=0x7e and 0xa0..=0xff are defined to equal their
/// Latin-1 code points; everything else is a function key or unmapped.
pub fn keysym_to_char(sym: u32) -> Option<char> {
    match sym {
        0x20..=0x7e | 0xa0..=0xff => char::from_u32(sym),
        _ => None,
    }
}

/// Translates an X keysym into a `KeySymbol`.
///
/// Printable keysyms become `KeySymbol::Char`; named keys (navigation,
/// function, keypad, modifiers) map to their variants.
pub fn keysym_to_symbol(sym: u32) -> KeySymbol {
    if let Some(c) = keysym_to_char(sym) {
        return KeySymbol::Char(c);
    }

    match sym {
        keysym::XK_Shift_L | keysym::XK_Shift_R => KeySymbol::Shift,
        keysym::XK_Control_L | keysym::XK_Control_R => KeySymbol::Control,
        keysym::XK_Alt_L | keysym::XK_Alt_R | keysym::XK_Meta_L | keysym::XK_Meta_R => {
            KeySymbol::Alt
        }
        keysym::XK_Super_L | keysym::XK_Super_R | keysym::XK_Hyper_L | keysym::XK_Hyper_R => {
            KeySymbol::Super
        }
        keysym::XK_Caps_Lock => KeySymbol::CapsLock,
        keysym::XK_Num_Lock => KeySymbol::NumLock,

        keysym::XK_Return => KeySymbol::Enter,
        keysym::XK_KP_Enter => KeySymbol::KeypadEnter,
        keysym::XK_BackSpace => KeySymbol::Backspace,
        keysym::XK_Tab | keysym::XK_KP_Tab | keysym::XK_ISO_Left_Tab => KeySymbol::Tab,
        keysym::XK_Escape => KeySymbol::Escape,

        keysym::XK_Home | keysym::XK_KP_Home => KeySymbol::Home,
        keysym::XK_Left | keysym::XK_KP_Left => KeySymbol::Left,
        keysym::XK_Up | keysym::XK_KP_Up => KeySymbol::Up,
        keysym::XK_Right | keysym::XK_KP_Right => KeySymbol::Right,
        keysym::XK_Down | keysym::XK_KP_Down => KeySymbol::Down,
        keysym::XK_Page_Up | keysym::XK_KP_Page_Up => KeySymbol::PageUp,
        keysym::XK_Page_Down | keysym::XK_KP_Page_Down => KeySymbol::PageDown,
        keysym::XK_End | keysym::XK_KP_End => KeySymbol::End,
        keysym::XK_Insert | keysym::XK_KP_Insert => KeySymbol::Insert,
        keysym::XK_Delete | keysym::XK_KP_Delete => KeySymbol::Delete,

        keysym::XK_F1 => KeySymbol::F1,
        keysym::XK_F2 => KeySymbol::F2,
        keysym::XK_F3 => KeySymbol::F3,
        keysym::XK_F4 => KeySymbol::F4,
        keysym::XK_F5 => KeySymbol::F5,
        keysym::XK_F6 => KeySymbol::F6,
        keysym::XK_F7 => KeySymbol::F7,
        keysym::XK_F8 => KeySymbol::F8,
        keysym::XK_F9 => KeySymbol::F9,
        keysym::XK_F10 => KeySymbol::F10,
        keysym::XK_F11 => KeySymbol::F11,
        keysym::XK_F12 => KeySymbol::F12,
        keysym::XK_F13 => KeySymbol::F13,
        keysym::XK_F14 => KeySymbol::F14,
        keysym::XK_F15 => KeySymbol::F15,
        keysym::XK_F16 => KeySymbol::F16,
        keysym::XK_F17 => KeySymbol::F17,
        keysym::XK_F18 => KeySymbol::F18,
        keysym::XK_F19 => KeySymbol::F19,
        keysym::XK_F20 => KeySymbol::F20,
        keysym::XK_F21 => KeySymbol::F21,
        keysym::XK_F22 => KeySymbol::F22,
        keysym::XK_F23 => KeySymbol::F23,
        keysym::XK_F24 => KeySymbol::F24,

        keysym::XK_KP_0 => KeySymbol::Keypad0,
        keysym::XK_KP_1 => KeySymbol::Keypad1,
        keysym::XK_KP_2 => KeySymbol::Keypad2,
        keysym::XK_KP_3 => KeySymbol::Keypad3,
        keysym::XK_KP_4 => KeySymbol::Keypad4,
        keysym::XK_KP_5 | keysym::XK_KP_Begin => KeySymbol::Keypad5,
        keysym::XK_KP_6 => KeySymbol::Keypad6,
        keysym::XK_KP_7 => KeySymbol::Keypad7,
        keysym::XK_KP_8 => KeySymbol::Keypad8,
        keysym::XK_KP_9 => KeySymbol::Keypad9,
        keysym::XK_KP_Decimal | keysym::XK_KP_Separator => KeySymbol::KeypadDecimal,
        keysym::XK_KP_Add => KeySymbol::KeypadPlus,
        keysym::XK_KP_Subtract => KeySymbol::KeypadMinus,
        keysym::XK_KP_Multiply => KeySymbol::KeypadMultiply,
        keysym::XK_KP_Divide => KeySymbol::KeypadDivide,
        keysym::XK_KP_Equal => KeySymbol::KeypadEquals,
        keysym::XK_KP_Space => KeySymbol::Char(' '),

        keysym::XK_Print | keysym::XK_Sys_Req => KeySymbol::PrintScreen,
        keysym::XK_Scroll_Lock => KeySymbol::ScrollLock,
        keysym::XK_Pause | keysym::XK_Break => KeySymbol::Pause,
        keysym::XK_Menu => KeySymbol::Menu,

        _ => {
            trace!("Unhandled keysym 0x{:X}, mapping to KeySymbol::Unknown", sym);
            KeySymbol::Unknown
        }
    }
}

/// The text a key press contributes, if the modifiers permit it.
///
/// Only printable characters qualify: control characters produced by the
/// server's own lookup (e.g. `\r`, `\x1b`, `^C`) are dropped.
pub fn printable_text(text: &str, modifiers: Modifiers) -> Option<String> {
    if text.is_empty() || !modifiers.permits_text() {
        return None;
    }
    if text.chars().any(|c| c.is_control() || c == '\u{FFFD}') {
        return None;
    }
    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_decode_core_modifier_masks() {
        let mods = Modifiers::from_x_state(SHIFT_MASK | CONTROL_MASK | MOD4_MASK);
        assert_eq!(
            mods,
            Modifiers::SHIFT | Modifiers::CONTROL | Modifiers::SUPER
        );
        assert_eq!(Modifiers::from_x_state(0), Modifiers::empty());
        assert!(Modifiers::from_x_state(LOCK_MASK).contains(Modifiers::CAPS_LOCK));
    }

    #[test]
    fn it_should_map_named_keysyms() {
        assert_eq!(keysym_to_symbol(keysym::XK_Return), KeySymbol::Enter);
        assert_eq!(keysym_to_symbol(keysym::XK_Escape), KeySymbol::Escape);
        assert_eq!(keysym_to_symbol(keysym::XK_KP_Left), KeySymbol::Left);
        assert_eq!(keysym_to_symbol(keysym::XK_F12), KeySymbol::F12);
        assert_eq!(keysym_to_symbol(keysym::XK_Shift_R), KeySymbol::Shift);
        assert_eq!(keysym_to_symbol(0x1234_5678), KeySymbol::Unknown);
    }

    #[test]
    fn it_should_map_latin1_keysyms_to_chars() {
        assert_eq!(keysym_to_symbol(keysym::XK_a), KeySymbol::Char('a'));
        assert_eq!(keysym_to_symbol(keysym::XK_A), KeySymbol::Char('A'));
        assert_eq!(keysym_to_symbol(keysym::XK_space), KeySymbol::Char(' '));
        assert_eq!(keysym_to_char(keysym::XK_eacute), Some('é'));
        assert_eq!(keysym_to_char(keysym::XK_BackSpace), None);
    }

    #[test]
    fn it_should_only_pass_printable_text_without_command_modifiers() {
        assert_eq!(printable_text("a", Modifiers::SHIFT), Some("a".to_string()));
        assert_eq!(printable_text("a", Modifiers::CONTROL), None);
        assert_eq!(printable_text("\r", Modifiers::empty()), None);
        assert_eq!(printable_text("\u{1b}", Modifiers::empty()), None);
        assert_eq!(printable_text("", Modifiers::empty()), None);
    }
}
