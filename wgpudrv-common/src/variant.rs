//! Engine variants
//!
//! The supported games share one renderer but disagree on a few details:
//! blend precedence, how first-person weapons are drawn, how many display
//! modes they accept, and whether alpha blending and distance fog exist.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EngineVariant {
    Unreal,
    #[default]
    UnrealTournament,
    DeusEx,
    Rune,
}

impl EngineVariant {
    /// Modulated primitives take precedence over translucent ones.
    pub fn modulate_before_translucent(self) -> bool {
        matches!(self, EngineVariant::DeusEx)
    }

    /// The engine has per-primitive alpha blending and distance fog.
    pub fn supports_alpha_blend(self) -> bool {
        matches!(self, EngineVariant::Rune)
    }

    /// Weapons are detected by depth and drawn after a depth clear.
    pub fn weapon_depth_workaround(self) -> bool {
        matches!(self, EngineVariant::Unreal | EngineVariant::UnrealTournament)
    }

    /// Maximum number of display modes the engine's menu can list.
    pub fn mode_list_limit(self) -> Option<usize> {
        match self {
            EngineVariant::Unreal | EngineVariant::DeusEx => Some(16),
            EngineVariant::UnrealTournament | EngineVariant::Rune => None,
        }
    }

    pub fn default_alpha_to_coverage(self) -> bool {
        matches!(self, EngineVariant::DeusEx)
    }
}
