//! Engine polygon flags
//!
//! Bit values match the host engine's `PF_*` constants so raw flag words can be
//! passed through unchanged with [`PolyFlags::from_bits_retain`].

bitflags::bitflags! {
    /// Per-polygon render flags sent by the host engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PolyFlags: u32 {
        const INVISIBLE = 0x0000_0001;
        const MASKED = 0x0000_0002;
        const TRANSLUCENT = 0x0000_0004;
        const NOT_SOLID = 0x0000_0008;
        const ENVIRONMENT = 0x0000_0010;
        const SEMISOLID = 0x0000_0020;
        const MODULATED = 0x0000_0040;
        const FAKE_BACKDROP = 0x0000_0080;
        const TWO_SIDED = 0x0000_0100;
        const AUTO_U_PAN = 0x0000_0200;
        const AUTO_V_PAN = 0x0000_0400;
        const NO_SMOOTH = 0x0000_0800;
        const SPECIAL_POLY = 0x0000_1000;
        const SMALL_WAVY = 0x0000_2000;
        const FLAT = 0x0000_4000;
        const LOW_SHADOW_DETAIL = 0x0000_8000;
        const NO_MERGE = 0x0001_0000;
        /// Rune reuses this bit for per-primitive alpha blending.
        const ALPHA_BLEND = 0x0002_0000;
        const DIRTY_SHADOWS = 0x0004_0000;
        const BRIGHT_CORNERS = 0x0008_0000;
        const SPECIAL_LIT = 0x0010_0000;
        const GOURAUD = 0x0020_0000;
        const UNLIT = 0x0040_0000;
        const HIGH_SHADOW_DETAIL = 0x0080_0000;
        const MEMORIZED = 0x0100_0000;
        const SELECTED = 0x0200_0000;
        const PORTAL = 0x0400_0000;
        const MIRRORED = 0x0800_0000;
        const HIGHLIGHTED = 0x1000_0000;
        const RENDER_FOG = 0x4000_0000;
        const OCCLUDE = 0x8000_0000;
    }
}

impl PolyFlags {
    /// Flags that can select a blend state.
    pub const BLEND: PolyFlags = PolyFlags::INVISIBLE
        .union(PolyFlags::MASKED)
        .union(PolyFlags::TRANSLUCENT)
        .union(PolyFlags::MODULATED)
        .union(PolyFlags::ALPHA_BLEND);

    /// Builds flags from a raw host word, keeping unknown bits.
    pub fn from_raw(raw: u32) -> Self {
        Self::from_bits_retain(raw)
    }

    /// Primitives that are neither translucent nor modulated write depth.
    pub fn with_implied_occlude(self) -> Self {
        if self.intersects(PolyFlags::TRANSLUCENT | PolyFlags::MODULATED) {
            self
        } else {
            self | PolyFlags::OCCLUDE
        }
    }

    /// Whether depth writes are enabled for this primitive.
    pub fn writes_depth(self) -> bool {
        self.contains(PolyFlags::OCCLUDE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_implies_occlude() {
        let flags = PolyFlags::MASKED.with_implied_occlude();
        assert!(flags.writes_depth());
        assert!(flags.contains(PolyFlags::MASKED));
    }

    #[test]
    fn test_translucent_and_modulated_do_not_occlude() {
        assert!(!PolyFlags::TRANSLUCENT.with_implied_occlude().writes_depth());
        assert!(!PolyFlags::MODULATED.with_implied_occlude().writes_depth());
    }

    #[test]
    fn test_raw_roundtrip_keeps_unknown_bits() {
        let raw = 0x2000_0004;
        let flags = PolyFlags::from_raw(raw);
        assert_eq!(flags.bits(), raw);
        assert!(flags.contains(PolyFlags::TRANSLUCENT));
    }
}
