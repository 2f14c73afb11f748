// src/platform/wayland/input.rs

//! Pure translation from `wl_pointer`/`wl_keyboard` units into the same
//! `WindowEvent` shapes the X11 backend produces.

use crate::geometry::Point;
use crate::keys::{self, KeySymbol, Modifiers};
use crate::platform::{MouseButton, WindowEvent};
use x11::keysym;

/// evdev keycodes are X keycodes minus 8.
pub const EVDEV_OFFSET: u32 = 8;

/// `XK_VoidSymbol`: keys with no mapping.
const XK_VOID_SYMBOL: u32 = 0x00FF_FFFF;

/// linux/input-event-codes.h
const BTN_LEFT: u32 = 0x110;
const BTN_RIGHT: u32 = 0x111;
const BTN_MIDDLE: u32 = 0x112;
const BTN_SIDE: u32 = 0x113;
const BTN_EXTRA: u32 = 0x114;

/// `wl_pointer.axis` units per scroll line.
const AXIS_UNITS_PER_LINE: f64 = 10.0;

const WL_POINTER_BUTTON_STATE_PRESSED: u32 = 1;
const WL_KEYBOARD_KEY_STATE_PRESSED: u32 = 1;
const WL_POINTER_AXIS_HORIZONTAL_SCROLL: u32 = 1;

/// Converts a 24.8 fixed-point value.
pub fn fixed_to_f64(raw: i32) -> f64 {
    raw as f64 / 256.0
}

pub fn surface_point(sx: i32, sy: i32) -> Point {
    Point::new(fixed_to_f64(sx), fixed_to_f64(sy))
}

pub fn pointer_button(code: u32) -> MouseButton {
    match code {
        BTN_LEFT => MouseButton::Left,
        BTN_RIGHT => MouseButton::Right,
        BTN_MIDDLE => MouseButton::Middle,
        BTN_SIDE => MouseButton::Back,
        BTN_EXTRA => MouseButton::Forward,
        other => MouseButton::Other(other),
    }
}

pub fn button_event(
    position: Point,
    code: u32,
    state: u32,
    modifiers: Modifiers,
) -> WindowEvent {
    let button = pointer_button(code);
    if state == WL_POINTER_BUTTON_STATE_PRESSED {
        WindowEvent::PointerPressed {
            position,
            button,
            modifiers,
        }
    } else {
        WindowEvent::PointerReleased {
            position,
            button,
            modifiers,
        }
    }
}

pub fn axis_event(position: Point, axis: u32, value: i32, modifiers: Modifiers) -> WindowEvent {
    let lines = fixed_to_f64(value) / AXIS_UNITS_PER_LINE;
    let (delta_x, delta_y) = if axis == WL_POINTER_AXIS_HORIZONTAL_SCROLL {
        (lines, 0.0)
    } else {
        (0.0, lines)
    };
    WindowEvent::Scroll {
        position,
        delta_x,
        delta_y,
        modifiers,
    }
}

/// xkb modifier masks share bit positions with the X core masks.
pub fn modifiers_from_xkb(depressed: u32, latched: u32, locked: u32) -> Modifiers {
    Modifiers::from_x_state(depressed | latched | locked)
}

fn printable_pair(x_keycode: u32) -> Option<(char, char)> {
    fn nth(row: &str, i: u32) -> Option<char> {
        row.chars().nth(i as usize)
    }
    let lower_upper = |lower: &str, upper: &str, i: u32| Some((nth(lower, i)?, nth(upper, i)?));
    match x_keycode {
        10..=19 => lower_upper("1234567890", "!@#$%^&*()", x_keycode - 10),
        20 => Some(('-', '_')),
        21 => Some(('=', '+')),
        24..=33 => lower_upper("qwertyuiop", "QWERTYUIOP", x_keycode - 24),
        34 => Some(('[', '{')),
        35 => Some((']', '}')),
        38..=46 => lower_upper("asdfghjkl", "ASDFGHJKL", x_keycode - 38),
        47 => Some((';', ':')),
        48 => Some(('\'', '"')),
        49 => Some(('`', '~')),
        51 => Some(('\\', '|')),
        52..=58 => lower_upper("zxcvbnm", "ZXCVBNM", x_keycode - 52),
        59 => Some((',', '<')),
        60 => Some(('.', '>')),
        61 => Some(('/', '?')),
        65 => Some((' ', ' ')),
        _ => None,
    }
}

fn named_keysym(x_keycode: u32) -> Option<u32> {
    let sym = match x_keycode {
        9 => keysym::XK_Escape,
        22 => keysym::XK_BackSpace,
        23 => keysym::XK_Tab,
        36 => keysym::XK_Return,
        37 => keysym::XK_Control_L,
        50 => keysym::XK_Shift_L,
        62 => keysym::XK_Shift_R,
        63 => keysym::XK_KP_Multiply,
        64 => keysym::XK_Alt_L,
        66 => keysym::XK_Caps_Lock,
        67..=76 => keysym::XK_F1 + (x_keycode - 67),
        77 => keysym::XK_Num_Lock,
        78 => keysym::XK_Scroll_Lock,
        79 => keysym::XK_KP_7,
        80 => keysym::XK_KP_8,
        81 => keysym::XK_KP_9,
        82 => keysym::XK_KP_Subtract,
        83 => keysym::XK_KP_4,
        84 => keysym::XK_KP_5,
        85 => keysym::XK_KP_6,
        86 => keysym::XK_KP_Add,
        87 => keysym::XK_KP_1,
        88 => keysym::XK_KP_2,
        89 => keysym::XK_KP_3,
        90 => keysym::XK_KP_0,
        91 => keysym::XK_KP_Decimal,
        95 => keysym::XK_F11,
        96 => keysym::XK_F12,
        104 => keysym::XK_KP_Enter,
        105 => keysym::XK_Control_R,
        106 => keysym::XK_KP_Divide,
        107 => keysym::XK_Print,
        108 => keysym::XK_Alt_R,
        110 => keysym::XK_Home,
        111 => keysym::XK_Up,
        112 => keysym::XK_Page_Up,
        113 => keysym::XK_Left,
        114 => keysym::XK_Right,
        115 => keysym::XK_End,
        116 => keysym::XK_Down,
        117 => keysym::XK_Page_Down,
        118 => keysym::XK_Insert,
        119 => keysym::XK_Delete,
        127 => keysym::XK_Pause,
        133 => keysym::XK_Super_L,
        134 => keysym::XK_Super_R,
        135 => keysym::XK_Menu,
        _ => return None,
    };
    Some(sym)
}

/// Keysym for an X keycode under a US layout. Caps Lock only affects letters.
pub fn us_keysym(x_keycode: u32, modifiers: Modifiers) -> u32 {
    if let Some((lower, upper)) = printable_pair(x_keycode) {
        let shift = modifiers.contains(Modifiers::SHIFT);
        let upper_case = if lower.is_ascii_alphabetic() {
            shift ^ modifiers.contains(Modifiers::CAPS_LOCK)
        } else {
            shift
        };
        return if upper_case { upper } else { lower } as u32;
    }
    named_keysym(x_keycode).unwrap_or(XK_VOID_SYMBOL)
}

/// Translates `wl_keyboard.key`. A press yields `KeyDown` and, for
/// printable keys the modifiers allow, `TextInput`.
pub fn key_events(evdev_key: u32, state: u32, modifiers: Modifiers) -> Vec<WindowEvent> {
    let sym = evdev_key
        .checked_add(EVDEV_OFFSET)
        .map_or(XK_VOID_SYMBOL, |x_keycode| us_keysym(x_keycode, modifiers));
    let symbol = keys::keysym_to_symbol(sym);
    if state != WL_KEYBOARD_KEY_STATE_PRESSED {
        return vec![WindowEvent::KeyUp { symbol, modifiers }];
    }
    let mut events = vec![WindowEvent::KeyDown { symbol, modifiers }];
    if let KeySymbol::Char(c) = symbol {
        if let Some(text) = keys::printable_text(c.encode_utf8(&mut [0; 4]), modifiers) {
            events.push(WindowEvent::TextInput { text });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn it_should_decode_fixed_point_coordinates() {
        assert_eq!(surface_point(10 * 256 + 128, 256), Point::new(10.5, 1.0));
        assert_eq!(fixed_to_f64(-512), -2.0);
    }

    #[test_log::test]
    fn it_should_map_evdev_buttons() {
        assert_eq!(pointer_button(0x110), MouseButton::Left);
        assert_eq!(pointer_button(0x111), MouseButton::Right);
        assert_eq!(pointer_button(0x112), MouseButton::Middle);
        assert_eq!(pointer_button(0x119), MouseButton::Other(0x119));
    }

    #[test_log::test]
    fn it_should_scale_axis_values_to_lines() {
        let ev = axis_event(Point::default(), 0, 10 * 256, Modifiers::empty());
        assert_eq!(
            ev,
            WindowEvent::Scroll {
                position: Point::default(),
                delta_x: 0.0,
                delta_y: 1.0,
                modifiers: Modifiers::empty(),
            }
        );
    }

    #[test_log::test]
    fn it_should_offset_evdev_keycodes_into_x_space() {
        // evdev KEY_A = 30, X keycode 38.
        let events = key_events(30, 1, Modifiers::empty());
        assert_eq!(
            events,
            vec![
                WindowEvent::KeyDown {
                    symbol: KeySymbol::Char('a'),
                    modifiers: Modifiers::empty(),
                },
                WindowEvent::TextInput { text: "a".into() },
            ]
        );
        // evdev KEY_ESC = 1.
        assert_eq!(
            key_events(1, 0, Modifiers::empty()),
            vec![WindowEvent::KeyUp {
                symbol: KeySymbol::Escape,
                modifiers: Modifiers::empty(),
            }]
        );
    }

    #[test_log::test]
    fn it_should_map_out_of_range_keycodes_to_unknown() {
        assert_eq!(
            key_events(u32::MAX, 1, Modifiers::empty()),
            vec![WindowEvent::KeyDown {
                symbol: KeySymbol::Unknown,
                modifiers: Modifiers::empty(),
            }]
        );
        assert_eq!(us_keysym(250, Modifiers::empty()), XK_VOID_SYMBOL);
    }

    #[test_log::test]
    fn it_should_apply_shift_and_caps_lock() {
        assert_eq!(us_keysym(38, Modifiers::SHIFT), 'A' as u32);
        assert_eq!(us_keysym(38, Modifiers::CAPS_LOCK), 'A' as u32);
        assert_eq!(us_keysym(38, Modifiers::SHIFT | Modifiers::CAPS_LOCK), 'a' as u32);
        assert_eq!(us_keysym(10, Modifiers::CAPS_LOCK), '1' as u32);
        assert_eq!(us_keysym(10, Modifiers::SHIFT), '!' as u32);
    }

    #[test_log::test]
    fn it_should_not_type_under_control() {
        let events = key_events(46, 1, Modifiers::CONTROL);
        assert_eq!(events.len(), 1);
    }

    #[test_log::test]
    fn it_should_merge_xkb_masks() {
        assert_eq!(
            modifiers_from_xkb(1, 0, 2),
            Modifiers::SHIFT | Modifiers::CAPS_LOCK
        );
    }
}
