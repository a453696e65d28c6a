//! Canonical button bitfield.
//!
//! The layout is the XInput wire layout, so the XInput adapter passes its
//! report bytes straight through. Every other adapter maps into it. Names
//! follow the SNES-style cluster: `B` is the bottom face button, `A` the right
//! one, `Y` the left one and `X` the top one.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ButtonState: u16 {
        const UP     = 0x0001;
        const DOWN   = 0x0002;
        const LEFT   = 0x0004;
        const RIGHT  = 0x0008;
        const START  = 0x0010;
        const SELECT = 0x0020;
        /// Left stick click.
        const L3     = 0x0040;
        /// Right stick click.
        const R3     = 0x0080;
        /// Left shoulder.
        const L      = 0x0100;
        /// Right shoulder.
        const R      = 0x0200;
        const HOME   = 0x0400;
        /// Bottom face button.
        const B      = 0x1000;
        /// Right face button.
        const A      = 0x2000;
        /// Left face button.
        const Y      = 0x4000;
        /// Top face button.
        const X      = 0x8000;
    }
}

impl ButtonState {
    /// Wrap a raw bitfield, keeping bits without a name.
    pub const fn from_raw(bits: u16) -> Self {
        Self::from_bits_retain(bits)
    }

    /// Buttons whose state differs between `self` and `previous`.
    pub fn changed_since(self, previous: ButtonState) -> ButtonState {
        self.symmetric_difference(previous)
    }

    /// D-pad bits for a hat switch value (0 = up, clockwise in 45° steps).
    /// Values of 8 and above are the neutral position.
    pub fn from_hat(hat: u8) -> ButtonState {
        match hat {
            0 => Self::UP,
            1 => Self::UP | Self::RIGHT,
            2 => Self::RIGHT,
            3 => Self::DOWN | Self::RIGHT,
            4 => Self::DOWN,
            5 => Self::DOWN | Self::LEFT,
            6 => Self::LEFT,
            7 => Self::UP | Self::LEFT,
            _ => Self::empty(),
        }
    }
}

impl Serialize for ButtonState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.bits())
    }
}

impl<'de> Deserialize<'de> for ButtonState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u16::deserialize(deserializer).map(Self::from_bits_retain)
    }
}
